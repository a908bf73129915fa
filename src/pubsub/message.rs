pub trait Message: Clone + Send + 'static{}

//blanket impl, anything cloneable and sendable can ride a topic
impl<T: Clone + Send + 'static> Message for T{}
