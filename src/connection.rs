use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Link or controller connection status. The serial peer and the input
/// device each carry their own copy; one going away does not affect the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState{
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState{
    fn from_u8(val: u8) -> Self{
        match val{
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(self) -> bool{
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result{
        let s = match self{
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Lock-free cell so worker threads and observers can share one state.
#[derive(Debug, Clone, Default)]
pub struct SharedConnectionState(Arc<AtomicU8>);

impl SharedConnectionState{
    pub fn new(state: ConnectionState) -> Self{
        SharedConnectionState(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> ConnectionState{
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState){
        self.0.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_shared_state_is_shared_between_clones(){
        let a = SharedConnectionState::new(ConnectionState::Connecting);
        let b = a.clone();
        b.set(ConnectionState::Connected);
        assert_eq!(a.get(), ConnectionState::Connected);
        assert!(a.get().is_connected());
    }

    #[test]
    fn test_unknown_discriminant_reads_as_disconnected(){
        assert_eq!(ConnectionState::from_u8(42), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::default().to_string(), "disconnected");
    }
}
