// Gamepad teleop: left stick Y = forward/back, right stick X = turn,
// D-pad = held directions, South = emergency stop, triggers = speed
//
// Single-stick mode drives the eight-way mapping from the left stick alone.
use std::thread;
use std::time::Duration;

use gilrs::{Axis as PadAxis, Button, Event, EventType, Gilrs};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::SPEED_STEP;
use crate::controller::InputEvent;
use crate::drive::{Axis, StickVector};
use crate::messages::Direction;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Map a stick axis change
pub fn map_axis(axis: PadAxis, value: f32) -> Option<InputEvent> {
    let axis = match axis {
        PadAxis::LeftStickY => Axis::Forward, // up is positive
        PadAxis::RightStickX => Axis::Turn,   // right is positive
        _ => return None,
    };
    Some(InputEvent::AxisMoved { axis, value })
}

/// Map a button press/release
pub fn map_button(button: Button, pressed: bool) -> Option<InputEvent> {
    let direction = match button {
        Button::DPadUp => Some(Direction::Forward),
        Button::DPadDown => Some(Direction::Backward),
        Button::DPadLeft => Some(Direction::PivotLeft),
        Button::DPadRight => Some(Direction::PivotRight),
        _ => None,
    };
    if let Some(direction) = direction {
        return Some(if pressed {
            InputEvent::DirectionPressed(direction)
        } else {
            InputEvent::DirectionReleased(direction)
        });
    }

    if !pressed {
        return None;
    }
    match button {
        Button::South => Some(InputEvent::EmergencyStop),
        Button::RightTrigger => Some(InputEvent::AdjustSpeed(SPEED_STEP as i16)),
        Button::LeftTrigger => Some(InputEvent::AdjustSpeed(-(SPEED_STEP as i16))),
        Button::Select => Some(InputEvent::Calibrate),
        _ => None,
    }
}

/// Turns raw pad events into input events; keeps the left stick position
/// for single-stick mode
#[derive(Debug, Default)]
pub struct PadMapper {
    single_stick: bool,
    stick: StickVector,
}

impl PadMapper {
    pub fn new(single_stick: bool) -> Self {
        Self {
            single_stick,
            stick: StickVector::default(),
        }
    }

    /// Left stick update in single-stick mode
    ///
    /// gilrs reports up as positive; the stick vector is y-down.
    pub fn map_stick(&mut self, axis: PadAxis, value: f32) -> Option<InputEvent> {
        match axis {
            PadAxis::LeftStickX => self.stick = StickVector::new(value, self.stick.y),
            PadAxis::LeftStickY => self.stick = StickVector::new(self.stick.x, -value),
            _ => return None,
        }
        if self.stick.x == 0.0 && self.stick.y == 0.0 {
            Some(InputEvent::StickReleased)
        } else {
            Some(InputEvent::StickMoved(self.stick))
        }
    }

    pub fn map_event(&mut self, event: EventType) -> Vec<InputEvent> {
        match event {
            EventType::AxisChanged(axis, value, _) if self.single_stick => {
                self.map_stick(axis, value).into_iter().collect()
            }
            EventType::AxisChanged(axis, value, _) => map_axis(axis, value).into_iter().collect(),
            EventType::ButtonPressed(button, _) => map_button(button, true).into_iter().collect(),
            EventType::ButtonReleased(button, _) => {
                map_button(button, false).into_iter().collect()
            }
            // Pad unplugged mid-drive: let go of the sticks
            EventType::Disconnected if self.single_stick => {
                self.stick = StickVector::default();
                vec![InputEvent::StickReleased]
            }
            EventType::Disconnected => vec![
                InputEvent::AxisReleased { axis: Axis::Forward },
                InputEvent::AxisReleased { axis: Axis::Turn },
            ],
            _ => Vec::new(),
        }
    }
}

/// Spawn the blocking gamepad reader; events go to `tx` until it closes
///
/// When no gamepad backend is available this logs once and the thread exits.
pub fn spawn(tx: mpsc::Sender<InputEvent>, single_stick: bool) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut mapper = PadMapper::new(single_stick);
        let mut gilrs = match Gilrs::new() {
            Ok(gilrs) => gilrs,
            Err(e) => {
                warn!("Gamepad support unavailable: {}", e);
                return;
            }
        };
        for (_id, pad) in gilrs.gamepads() {
            info!("Gamepad: {}", pad.name());
        }

        loop {
            while let Some(Event { event, .. }) = gilrs.next_event() {
                if let EventType::Connected = event {
                    info!("Gamepad connected");
                }
                for input in mapper.map_event(event) {
                    if tx.blocking_send(input).is_err() {
                        return;
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    })
}
