//! Runtime configuration.
//!
//! Everything has a default, so an empty file (or no file) gives the stock
//! vehicle. Values are checked by [`RovConfig::validate`] after parsing.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rov::claw::{ClawBinding, ClawStateMachine, DEFAULT_STEP, DEFAULT_THRESHOLD};
use crate::rov::mapper::{
    AxisWiring, PulseRange, ReversedThrusters, ThrusterMapper, CLAW_RANGE, DEFAULT_DEADZONE,
    DEFAULT_DIFFERENTIAL_DEADZONE, NEUTRAL,
};
use crate::uart::DEFAULT_BAUD;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RovConfig {
    pub serial: SerialCfg,
    pub mapping: MappingCfg,
    pub claw: ClawCfg,
    pub control: ControlCfg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// How long the writer waits on an empty queue before rechecking stop.
    pub write_poll_ms: u64,
    pub queue_capacity: usize,
    /// Exact device, bypasses discovery.
    pub port: Option<String>,
    /// Replaces the per-OS prefix used during discovery.
    pub port_prefix: Option<String>,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD,
            read_timeout_ms: 100,
            write_poll_ms: 20,
            queue_capacity: 64,
            port: None,
            port_prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingCfg {
    pub deadzone: f32,
    pub differential_deadzone: f32,
    pub wiring: AxisWiring,
    pub reversed: ReversedThrusters,
}

impl Default for MappingCfg {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            differential_deadzone: DEFAULT_DIFFERENTIAL_DEADZONE,
            wiring: AxisWiring::default(),
            reversed: ReversedThrusters::default(),
        }
    }
}

impl From<&MappingCfg> for ThrusterMapper {
    fn from(cfg: &MappingCfg) -> Self {
        ThrusterMapper {
            deadzone: cfg.deadzone,
            differential_deadzone: cfg.differential_deadzone,
            reversed: cfg.reversed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClawCfg {
    pub step: i32,
    pub threshold: f32,
    pub min: i32,
    pub max: i32,
    pub primary: ClawBinding,
    pub secondary: ClawBinding,
}

impl Default for ClawCfg {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            threshold: DEFAULT_THRESHOLD,
            min: CLAW_RANGE.min,
            max: CLAW_RANGE.max,
            primary: ClawBinding::TRIGGERS,
            secondary: ClawBinding::BUMPERS,
        }
    }
}

impl From<&ClawCfg> for ClawStateMachine {
    fn from(cfg: &ClawCfg) -> Self {
        ClawStateMachine {
            step: cfg.step,
            threshold: cfg.threshold,
            range: PulseRange { min: cfg.min, max: cfg.max },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    pub tick_ms: u64,
    pub send_interval_ms: u64,
    pub reconnect_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            send_interval_ms: 500,
            reconnect_ms: 1000,
        }
    }
}

impl ControlCfg {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_ms)
    }
}

impl RovConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: RovConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bail = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        // Serial
        if self.serial.baud_rate == 0 {
            return bail("serial.baud_rate must be > 0");
        }
        if self.serial.read_timeout_ms == 0 {
            return bail("serial.read_timeout_ms must be >= 1");
        }
        if self.serial.write_poll_ms == 0 || self.serial.write_poll_ms > 1000 {
            return bail("serial.write_poll_ms must be in [1, 1000]");
        }
        if self.serial.queue_capacity == 0 {
            return bail("serial.queue_capacity must be >= 1");
        }
        if matches!(self.serial.port.as_deref(), Some("")) {
            return bail("serial.port must not be empty");
        }
        if matches!(self.serial.port_prefix.as_deref(), Some("")) {
            return bail("serial.port_prefix must not be empty");
        }

        // Mapping
        if !(0.0..1.0).contains(&self.mapping.deadzone) {
            return bail("mapping.deadzone must be in [0.0, 1.0)");
        }
        if !(0.0..1.0).contains(&self.mapping.differential_deadzone) {
            return bail("mapping.differential_deadzone must be in [0.0, 1.0)");
        }

        // Claw
        if self.claw.step <= 0 {
            return bail("claw.step must be > 0");
        }
        if !(0.0..1.0).contains(&self.claw.threshold) {
            return bail("claw.threshold must be in [0.0, 1.0)");
        }
        if self.claw.min >= self.claw.max {
            return bail("claw.min must be below claw.max");
        }
        if !(self.claw.min..=self.claw.max).contains(&NEUTRAL) {
            return bail("claw range must contain the neutral pulsewidth");
        }
        if self.claw.min < CLAW_RANGE.min || self.claw.max > CLAW_RANGE.max {
            return bail("claw range must stay within [1100, 2100]");
        }

        // Control
        if self.control.tick_ms == 0 {
            return bail("control.tick_ms must be >= 1");
        }
        if self.control.send_interval_ms < self.control.tick_ms {
            return bail("control.send_interval_ms must be >= control.tick_ms");
        }
        if self.control.reconnect_ms == 0 {
            return bail("control.reconnect_ms must be >= 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rov::claw::ClawControl;
    use crate::rov::mapper::StickAxis;
    use rstest::rstest;

    #[test]
    fn test_empty_file_is_stock_vehicle() {
        let cfg = RovConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RovConfig::default());
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.control.send_interval(), Duration::from_millis(500));
        assert_eq!(cfg.claw.primary, ClawBinding::TRIGGERS);
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let text = toml::to_string(&RovConfig::default()).unwrap();
        assert_eq!(RovConfig::from_toml_str(&text).unwrap(), RovConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let cfg = RovConfig::from_toml_str(
            r#"
            [serial]
            port = "/dev/ttyACM3"

            [mapping.wiring]
            forward = { axis = "right_y", inverted = true }
            turn = { axis = "right_x" }
            vertical = { axis = "left_y" }
            pitch = { axis = "left_x" }

            [mapping.reversed]
            right = true

            [claw]
            step = 10
            primary = { open = "left_trigger", close = "right_trigger" }
            "#,
        )
        .unwrap();

        assert_eq!(cfg.serial.port.as_deref(), Some("/dev/ttyACM3"));
        assert_eq!(cfg.serial.queue_capacity, 64);
        assert_eq!(cfg.mapping.wiring.forward.axis, StickAxis::RightY);
        assert!(cfg.mapping.wiring.forward.inverted);
        assert!(!cfg.mapping.wiring.turn.inverted);
        assert!(cfg.mapping.reversed.right);
        assert!(!cfg.mapping.reversed.left);
        assert_eq!(cfg.claw.primary.open, ClawControl::LeftTrigger);
        assert_eq!(cfg.claw.secondary, ClawBinding::BUMPERS);
        assert_eq!(ClawStateMachine::from(&cfg.claw).step, 10);
    }

    #[rstest]
    #[case("[serial]\nbaud_rate = 0")]
    #[case("[serial]\nqueue_capacity = 0")]
    #[case("[serial]\nport = \"\"")]
    #[case("[mapping]\ndeadzone = 1.5")]
    #[case("[claw]\nstep = 0")]
    #[case("[claw]\nmin = 1600")]
    #[case("[claw]\nmax = 2500")]
    #[case("[control]\ntick_ms = 0")]
    #[case("[control]\nsend_interval_ms = 5")]
    fn test_rejects_invalid(#[case] text: &str) {
        assert!(matches!(RovConfig::from_toml_str(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(RovConfig::from_toml_str("[serial"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            RovConfig::from_toml_str("[claw]\nprimary = { open = \"thumb\", close = \"left_trigger\" }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = RovConfig::load(Path::new("/nonexistent/rov.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
