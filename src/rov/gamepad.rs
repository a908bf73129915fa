//! Gamepad input through `gilrs`. Enabled with the `gamepad` feature.

use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};

use super::input::{Controls, InputFrame, InputSource};
use crate::error::InputError;
use super::mapper::StickAxes;

pub const SCREENSHOT_BUTTON: Button = Button::North;

pub struct GamepadInput {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

impl GamepadInput {
    pub fn new() -> Result<Self, InputError> {
        let gilrs = Gilrs::new().map_err(InputError::Backend)?;
        Ok(Self { gilrs, active: None })
    }

    fn pump(&mut self) {
        while let Some(ev) = self.gilrs.next_event() {
            if ev.event == EventType::Disconnected && Some(ev.id) == self.active {
                tracing::warn!("gamepad disconnected");
                self.active = None;
            }
        }
    }
}

impl InputSource for GamepadInput {
    fn discover(&mut self) -> Option<String> {
        self.pump();
        let (id, pad) = self.gilrs.gamepads().next()?;
        let name = pad.name().to_string();
        self.active = Some(id);
        Some(name)
    }

    fn poll(&mut self) -> Option<InputFrame> {
        self.pump();
        let pad = self.gilrs.connected_gamepad(self.active?)?;

        let axis = |a: Axis| pad.axis_data(a).map(|d| d.value());
        let trigger = |b: Button| pad.button_data(b).map(|d| d.value()).unwrap_or(0.0);

        //gilrs already reports pushed-forward as positive Y
        let sticks = StickAxes {
            left_x: axis(Axis::LeftStickX),
            left_y: axis(Axis::LeftStickY),
            right_x: axis(Axis::RightStickX),
            right_y: axis(Axis::RightStickY),
        };

        Some(InputFrame {
            sticks,
            controls: Controls {
                left_trigger: trigger(Button::LeftTrigger2),
                right_trigger: trigger(Button::RightTrigger2),
                left_bumper: pad.is_pressed(Button::LeftTrigger),
                right_bumper: pad.is_pressed(Button::RightTrigger),
            },
            screenshot: pad.is_pressed(SCREENSHOT_BUTTON),
        })
    }
}
