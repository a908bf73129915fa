//! Human input sources sampled by the control loop.

use std::collections::VecDeque;

use super::mapper::StickAxes;

/// Triggers in [0, 1], bumpers as pressed/released.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub left_bumper: bool,
    pub right_bumper: bool,
}

/// Everything the loop needs from the device for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub sticks: StickAxes,
    pub controls: Controls,
    /// Held state of the screenshot button; the loop detects the edge.
    pub screenshot: bool,
}

pub trait InputSource {
    /// Looks for a device to attach to and returns its name.
    fn discover(&mut self) -> Option<String>;

    /// Current state of the attached device, or `None` if it is gone.
    fn poll(&mut self) -> Option<InputFrame>;
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn discover(&mut self) -> Option<String> {
        (**self).discover()
    }

    fn poll(&mut self) -> Option<InputFrame> {
        (**self).poll()
    }
}

/// Plays back a fixed sequence of frames. `None` entries simulate the device
/// dropping off. Once the script runs out the last entry repeats.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    name: String,
    script: VecDeque<Option<InputFrame>>,
    last: Option<InputFrame>,
    attachable: bool,
}

impl ScriptedInput {
    pub fn new(name: &str, script: Vec<Option<InputFrame>>) -> Self {
        Self {
            name: name.to_string(),
            script: script.into(),
            last: None,
            attachable: true,
        }
    }

    /// Same frame every tick.
    pub fn constant(name: &str, frame: InputFrame) -> Self {
        Self::new(name, vec![Some(frame)])
    }

    /// Sticks centred, nothing pressed.
    pub fn idle(name: &str) -> Self {
        Self::constant(name, InputFrame::default())
    }

    /// A source that never finds a device.
    pub fn absent() -> Self {
        Self {
            attachable: false,
            ..Self::new("", Vec::new())
        }
    }
}

impl InputSource for ScriptedInput {
    fn discover(&mut self) -> Option<String> {
        self.attachable.then(|| self.name.clone())
    }

    fn poll(&mut self) -> Option<InputFrame> {
        if !self.attachable {
            return None;
        }
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}
