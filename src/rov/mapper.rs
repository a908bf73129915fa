/**
 * Pulsewidth Mapper
 *
 * Turns normalized stick readings into thruster pulsewidths.
 *
 * 1100: full reverse
 * 1500: no thrust
 * 1900: full forward
 *
 * Paired thrusters use an asymmetric differential: only one motor of a pair
 * is ever pushed away from the shared base value.
 */

use serde::{Deserialize, Serialize};

/// Actuation value in microseconds.
pub type Pulsewidth = i32;

pub const NEUTRAL: Pulsewidth = 1500;
pub const DEFAULT_DEADZONE: f32 = 0.1;
pub const DEFAULT_DIFFERENTIAL_DEADZONE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    pub min: Pulsewidth,
    pub max: Pulsewidth,
}

impl PulseRange {
    pub fn clamp(&self, pw: Pulsewidth) -> Pulsewidth {
        pw.clamp(self.min, self.max)
    }

    pub fn contains(&self, pw: Pulsewidth) -> bool {
        (self.min..=self.max).contains(&pw)
    }
}

pub const THRUSTER_RANGE: PulseRange = PulseRange { min: 1100, max: 1900 };
pub const CLAW_RANGE: PulseRange = PulseRange { min: 1100, max: 2100 };

/// Direct mapping with the default deadzone.
pub fn map_axis(value: Option<f32>) -> Pulsewidth {
    map_axis_with(value, DEFAULT_DEADZONE)
}

pub fn map_axis_with(value: Option<f32>, deadzone: f32) -> Pulsewidth {
    match value {
        Some(v) if v.is_finite() && v.abs() >= deadzone => {
            let raw = (400.0 * (f64::from(v) + 1.0) + 1100.0).round() as Pulsewidth;
            THRUSTER_RANGE.clamp(raw)
        }
        _ => NEUTRAL,
    }
}

/// Signed offset from neutral, used to skew one motor of a pair.
pub fn map_differential(value: Option<f32>) -> i32 {
    map_differential_with(value, DEFAULT_DIFFERENTIAL_DEADZONE, DEFAULT_DEADZONE)
}

pub fn map_differential_with(value: Option<f32>, differential_deadzone: f32, deadzone: f32) -> i32 {
    match value {
        Some(v) if v.is_finite() && v.abs() >= differential_deadzone => {
            map_axis_with(Some(v), deadzone) - NEUTRAL
        }
        _ => 0,
    }
}

/// Splits a base value and an offset across a motor pair.
///
/// A positive offset slows the second motor, a negative one speeds up the
/// first. The other motor always stays on `base`.
pub fn compose_pair(base: Pulsewidth, offset: i32) -> (Pulsewidth, Pulsewidth) {
    let (first, second) = if offset >= 0 {
        (base, base - offset)
    } else {
        (base + offset.abs(), base)
    };
    (THRUSTER_RANGE.clamp(first), THRUSTER_RANGE.clamp(second))
}

/// Mirror about neutral, for thrusters mounted or wired backwards.
pub fn reverse(pw: Pulsewidth) -> Pulsewidth {
    2 * NEUTRAL - pw
}

/// Physical stick axes a gamepad reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

/// Raw stick readings in [-1, 1]. Positive X is right, positive Y is a stick
/// pushed away from the operator. `None` means the device has no such axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StickAxes {
    pub left_x: Option<f32>,
    pub left_y: Option<f32>,
    pub right_x: Option<f32>,
    pub right_y: Option<f32>,
}

impl StickAxes {
    pub fn get(&self, axis: StickAxis) -> Option<f32> {
        match axis {
            StickAxis::LeftX => self.left_x,
            StickAxis::LeftY => self.left_y,
            StickAxis::RightX => self.right_x,
            StickAxis::RightY => self.right_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSource {
    pub axis: StickAxis,
    #[serde(default)]
    pub inverted: bool,
}

impl AxisSource {
    pub const fn new(axis: StickAxis) -> Self {
        Self { axis, inverted: false }
    }

    pub const fn inverted(axis: StickAxis) -> Self {
        Self { axis, inverted: true }
    }

    fn read(&self, sticks: &StickAxes) -> Option<f32> {
        sticks
            .get(self.axis)
            .filter(|v| v.is_finite())
            .map(|v| if self.inverted { -v } else { v })
            .map(|v| v.clamp(-1.0, 1.0))
    }
}

/// Which stick drives which motion. Hull layouts differ, so this is data
/// rather than code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisWiring {
    pub forward: AxisSource,
    pub turn: AxisSource,
    pub vertical: AxisSource,
    pub pitch: AxisSource,
}

impl Default for AxisWiring {
    fn default() -> Self {
        Self {
            forward: AxisSource::new(StickAxis::LeftY),
            turn: AxisSource::new(StickAxis::LeftX),
            vertical: AxisSource::new(StickAxis::RightY),
            pitch: AxisSource::new(StickAxis::RightX),
        }
    }
}

impl AxisWiring {
    pub fn resolve(&self, sticks: &StickAxes) -> MotionAxes {
        MotionAxes {
            forward: self.forward.read(sticks),
            turn: self.turn.read(sticks),
            vertical: self.vertical.read(sticks),
            pitch: self.pitch.read(sticks),
        }
    }
}

/// Logical motion intent for one tick, each in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionAxes {
    pub forward: Option<f32>,
    pub turn: Option<f32>,
    pub vertical: Option<f32>,
    pub pitch: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrusterCommandSet {
    pub left: Pulsewidth,
    pub right: Pulsewidth,
    pub top_left: Pulsewidth,
    pub top_right: Pulsewidth,
}

impl Default for ThrusterCommandSet {
    fn default() -> Self {
        Self::neutral()
    }
}

impl ThrusterCommandSet {
    pub const fn neutral() -> Self {
        Self {
            left: NEUTRAL,
            right: NEUTRAL,
            top_left: NEUTRAL,
            top_right: NEUTRAL,
        }
    }

    /// Wire order: left, right, top-left, top-right.
    pub fn to_array(&self) -> [Pulsewidth; 4] {
        [self.left, self.right, self.top_left, self.top_right]
    }
}

/// Per-thruster reversal flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversedThrusters {
    pub left: bool,
    pub right: bool,
    pub top_left: bool,
    pub top_right: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrusterMapper {
    pub deadzone: f32,
    pub differential_deadzone: f32,
    pub reversed: ReversedThrusters,
}

impl Default for ThrusterMapper {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            differential_deadzone: DEFAULT_DIFFERENTIAL_DEADZONE,
            reversed: ReversedThrusters::default(),
        }
    }
}

impl ThrusterMapper {
    pub fn map_axis(&self, value: Option<f32>) -> Pulsewidth {
        map_axis_with(value, self.deadzone)
    }

    pub fn map_differential(&self, value: Option<f32>) -> i32 {
        map_differential_with(value, self.differential_deadzone, self.deadzone)
    }

    /// Horizontal pair: forward is the base, turn skews one side.
    /// Vertical pair: vertical is the base, pitch skews one side.
    pub fn map(&self, axes: &MotionAxes) -> ThrusterCommandSet {
        let (left, right) = compose_pair(self.map_axis(axes.forward), self.map_differential(axes.turn));
        let (top_left, top_right) = compose_pair(self.map_axis(axes.vertical), self.map_differential(axes.pitch));

        let flip = |pw: Pulsewidth, reversed: bool| if reversed { reverse(pw) } else { pw };
        ThrusterCommandSet {
            left: flip(left, self.reversed.left),
            right: flip(right, self.reversed.right),
            top_left: flip(top_left, self.reversed.top_left),
            top_right: flip(top_right, self.reversed.top_right),
        }
    }
}
