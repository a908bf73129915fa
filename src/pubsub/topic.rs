use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use crossbeam_channel as xch;
use super::message::Message;

/// Fan-out point for one stream of messages.
///
/// Every subscriber owns a bounded FIFO of its own, so a slow consumer only
/// loses its own messages and never stalls the producer. Delivery order per
/// subscriber is publish order.
pub struct Topic<T: Message>{
    name: String,
    capacity: usize,
    subscribers: Mutex<Vec<xch::Sender<T>>>,
    epoch: AtomicU64,
}

impl<T: Message> Topic<T>{
    pub fn new(name: &str, capacity: usize) -> Self{
        Topic{
            name: name.to_string(),
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn shared(name: &str, capacity: usize) -> Arc<Self>{
        Arc::new(Self::new(name, capacity))
    }

    pub fn name(&self) -> &str{
        &self.name
    }

    pub fn capacity(&self) -> usize{
        self.capacity
    }

    //returns the epoch assigned to this message
    pub fn publish(&self, msg: T) -> u64{
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let mut subscribers = self.lock_subscribers();

        subscribers.retain(|tx|{
            match tx.try_send(msg.clone()){
                Ok(()) => true,
                Err(xch::TrySendError::Full(_)) =>{
                    tracing::trace!(topic = %self.name, epoch, "subscriber queue full, message dropped");
                    true
                }
                Err(xch::TrySendError::Disconnected(_)) => false,
            }
        });

        epoch
    }

    pub fn latest_epoch(&self) -> u64{
        self.epoch.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize{
        self.lock_subscribers().len()
    }

    pub(crate) fn attach(&self) -> xch::Receiver<T>{
        let (tx, rx) = xch::bounded(self.capacity);
        self.lock_subscribers().push(tx);
        rx
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<xch::Sender<T>>>{
        match self.subscribers.lock(){
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
