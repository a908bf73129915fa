/**
 * Claw State Machine
 *
 * Grippers are stepped, not positioned: holding "open" walks the pulsewidth
 * up one step per tick, holding "close" walks it down, releasing both holds
 * it where it is.
 */

use serde::{Deserialize, Serialize};

use super::input::Controls;
use super::mapper::{PulseRange, Pulsewidth, CLAW_RANGE, NEUTRAL};

pub const DEFAULT_STEP: i32 = 7;
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Position of one claw. Only [`ClawStateMachine::step`] moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClawState(Pulsewidth);

impl Default for ClawState {
    fn default() -> Self {
        ClawState(NEUTRAL)
    }
}

impl ClawState {
    pub fn pulsewidth(self) -> Pulsewidth {
        self.0
    }
}

/// Momentary controls a claw can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClawControl {
    LeftTrigger,
    RightTrigger,
    LeftBumper,
    RightBumper,
}

impl ClawControl {
    pub fn level(self, controls: &Controls) -> f32 {
        let pressed = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            ClawControl::LeftTrigger => controls.left_trigger,
            ClawControl::RightTrigger => controls.right_trigger,
            ClawControl::LeftBumper => pressed(controls.left_bumper),
            ClawControl::RightBumper => pressed(controls.right_bumper),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClawBinding {
    pub open: ClawControl,
    pub close: ClawControl,
}

impl ClawBinding {
    pub const TRIGGERS: ClawBinding = ClawBinding {
        open: ClawControl::RightTrigger,
        close: ClawControl::LeftTrigger,
    };
    pub const BUMPERS: ClawBinding = ClawBinding {
        open: ClawControl::RightBumper,
        close: ClawControl::LeftBumper,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClawStateMachine {
    pub step: i32,
    pub threshold: f32,
    pub range: PulseRange,
}

impl Default for ClawStateMachine {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            threshold: DEFAULT_THRESHOLD,
            range: CLAW_RANGE,
        }
    }
}

impl ClawStateMachine {
    /// One tick. Open is checked first, so it wins when both are held.
    pub fn step(&self, state: ClawState, open: f32, close: f32) -> ClawState {
        let pw = if open > self.threshold {
            (state.0 + self.step).min(self.range.max)
        } else if close > self.threshold {
            (state.0 - self.step).max(self.range.min)
        } else {
            state.0
        };
        ClawState(pw)
    }

    pub fn step_bound(&self, state: ClawState, binding: ClawBinding, controls: &Controls) -> ClawState {
        self.step(state, binding.open.level(controls), binding.close.level(controls))
    }
}

/// Both grippers, carried by the control loop from tick to tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClawPair {
    pub primary: ClawState,
    pub secondary: ClawState,
}
