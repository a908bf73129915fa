//! In-process fan-out used for telemetry coming off the wire and for the
//! per-tick control snapshots handed to the UI layer.

pub mod message;
pub mod topic;
pub mod publisher;
pub mod subscriber;

pub use message::Message;
pub use topic::Topic;
pub use publisher::Publisher;
pub use subscriber::Subscriber;

use crate::rov::ControlSnapshot;
use crate::uart::InboundTelemetry;

pub const TELEMETRY_TOPIC: &str = "/rov/telemetry";
pub const CONTROL_TOPIC: &str = "/rov/control";

/// Decoded telemetry from the microcontroller, one message per wire line.
pub type TelemetryChannel = Topic<InboundTelemetry>;

/// Per-tick control state for display.
pub type ControlChannel = Topic<ControlSnapshot>;
