use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use crossbeam_channel as xch;
use super::topic::Topic;
use super::message::Message;

/// Receiving end of a [`Topic`]. Only sees messages published after it was
/// created.
pub struct Subscriber<T: Message>{
    topic: Arc<Topic<T>>,
    rx: xch::Receiver<T>,
    last_seen_epoch: AtomicU64,
}

impl<T: Message> Subscriber<T>{
    pub fn new(topic: Arc<Topic<T>>) -> Self{
        let rx = topic.attach();
        let last_seen_epoch = AtomicU64::new(topic.latest_epoch());
        Subscriber{
            topic,
            rx,
            last_seen_epoch,
        }
    }

    pub fn try_recv(&self) -> Option<T>{
        self.rx.try_recv().ok()
    }

    /// Blocks up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T>{
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drains the queue and keeps only the newest message.
    pub fn latest(&self) -> Option<T>{
        self.rx.try_iter().last()
    }

    pub fn pending(&self) -> usize{
        self.rx.len()
    }

    pub fn has_new(&self) -> bool{
        let current = self.topic.latest_epoch();
        let last = self.last_seen_epoch.load(Ordering::SeqCst);
        current > last
    }

    pub fn mark_seen(&self){
        let current = self.topic.latest_epoch();
        self.last_seen_epoch.store(current, Ordering::SeqCst);
    }

    pub fn topic_name(&self) -> &str{
        self.topic.name()
    }
}
