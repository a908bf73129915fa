/**
 * ROV Control Module
 *
 * Operator-side control path:
 * - Stick to thruster pulsewidth mapping
 * - Stepped claw control
 * - Command rate limiting for the slow serial link
 * - The fixed-tick loop tying them to an input device
 */

pub mod claw;
pub mod controller;
#[cfg(feature = "gamepad")]
pub mod gamepad;
pub mod input;
pub mod mapper;
pub mod rate_limiter;

pub use claw::{ClawPair, ClawState, ClawStateMachine};
pub use controller::{ControlLoop, ControlSnapshot};
pub use input::{InputFrame, InputSource, ScriptedInput};
pub use mapper::{ThrusterCommandSet, ThrusterMapper};
pub use rate_limiter::CommandRateLimiter;
