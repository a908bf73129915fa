pub mod config;
pub mod connection;
pub mod error;
pub mod pubsub;
pub mod rov;
pub mod uart;

pub use config::RovConfig;
pub use connection::{ConnectionState, SharedConnectionState};
pub use error::{ConfigError, FrameError, LinkError, Result};
#[cfg(feature = "gamepad")]
pub use error::InputError;

pub use pubsub::{
    Message, Topic,
    Publisher, Subscriber,
    ControlChannel, TelemetryChannel,
};

pub use rov::{ControlLoop, ControlSnapshot};
pub use uart::{InboundTelemetry, LinkOptions, LinkSender, OutboundMessage, PortFilter, SerialLink};
