use std::sync::Arc;
use super::topic::Topic;
use super::message::Message;
use super::subscriber::Subscriber;

/// Write end of a topic. Every clone feeds the same subscribers, so the
/// reader worker and the control loop can each hold one.
pub struct Publisher<T: Message>{
    topic: Arc<Topic<T>>,
}

impl<T: Message> Publisher<T>{
    pub fn new(topic: Arc<Topic<T>>) -> Self{
        Publisher{ topic }
    }

    /// Fans `msg` out and returns the topic's new epoch.
    pub fn publish(&self, msg: T) -> u64{
        self.topic.publish(msg)
    }

    pub fn has_subscribers(&self) -> bool{
        self.topic.subscriber_count() > 0
    }

    /// Attaches a new consumer. It only sees messages published after this.
    pub fn subscribe(&self) -> Subscriber<T>{
        Subscriber::new(Arc::clone(&self.topic))
    }

    pub fn topic_name(&self) -> &str{
        self.topic.name()
    }
}

impl<T: Message> Clone for Publisher<T>{
    fn clone(&self) -> Self{
        Publisher{ topic: Arc::clone(&self.topic) }
    }
}
