// Keyboard teleop: WASD/arrows move, Q/E pivot, Z/C/X/V diagonals, Space stop,
// +/- speed, K calibrate, T motor test, Backspace emergency stop, Esc quit
use std::io::{self, stdout};

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use tracing::{debug, warn};

use crate::config::{KEY_HOLD_TIMEOUT_MS, SPEED_STEP};
use crate::controller::InputEvent;
use crate::messages::Direction;

/// Result of a key event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    Input(InputEvent),
    Quit,
}

/// Held-direction key map
pub fn direction_for_key(code: KeyCode) -> Option<Direction> {
    let direction = match code {
        KeyCode::Up => Direction::Forward,
        KeyCode::Down => Direction::Backward,
        KeyCode::Left => Direction::Left,
        KeyCode::Right => Direction::Right,
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'w' => Direction::Forward,
            's' => Direction::Backward,
            'a' => Direction::Left,
            'd' => Direction::Right,
            ' ' => Direction::Stop,
            'q' => Direction::PivotLeft,
            'e' => Direction::PivotRight,
            'z' => Direction::ForwardLeft,
            'c' => Direction::ForwardRight,
            'x' => Direction::BackwardLeft,
            'v' => Direction::BackwardRight,
            _ => return None,
        },
        _ => return None,
    };
    Some(direction)
}

#[derive(Debug, Clone, Copy)]
struct HeldKey {
    direction: Direction,
    last_seen: u64,
}

/// Turns terminal key events into controller input
///
/// Terminals that cannot report key releases only send repeated presses
/// while a key is held, so a release is synthesized once those stop.
#[derive(Debug)]
pub struct KeyboardInput {
    reports_release: bool,
    held: Option<HeldKey>,
}

impl KeyboardInput {
    pub fn new(reports_release: bool) -> Self {
        Self {
            reports_release,
            held: None,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, now_ms: u64) -> Option<KeyAction> {
        let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key.code == KeyCode::Esc {
            return Some(KeyAction::Quit);
        }

        if let Some(direction) = direction_for_key(key.code) {
            return self.on_direction_key(direction, key.kind, now_ms);
        }

        if key.kind != KeyEventKind::Press {
            return None;
        }
        let event = match key.code {
            KeyCode::Char('+') | KeyCode::Char('=') => InputEvent::AdjustSpeed(SPEED_STEP as i16),
            KeyCode::Char('-') => InputEvent::AdjustSpeed(-(SPEED_STEP as i16)),
            KeyCode::Char('k') | KeyCode::Char('K') => InputEvent::Calibrate,
            KeyCode::Char('t') | KeyCode::Char('T') => InputEvent::RunMotorTest,
            KeyCode::Backspace => InputEvent::EmergencyStop,
            _ => return None,
        };
        Some(KeyAction::Input(event))
    }

    /// Synthesized release for terminals without release events
    pub fn poll(&mut self, now_ms: u64) -> Option<InputEvent> {
        if self.reports_release {
            return None;
        }
        let held = self.held?;
        if now_ms.saturating_sub(held.last_seen) <= KEY_HOLD_TIMEOUT_MS {
            return None;
        }
        self.held = None;
        debug!("No repeat for {}, releasing", held.direction.as_str());
        Some(InputEvent::DirectionReleased(held.direction))
    }

    fn on_direction_key(
        &mut self,
        direction: Direction,
        kind: KeyEventKind,
        now_ms: u64,
    ) -> Option<KeyAction> {
        match kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                let repeat = self.held.is_some_and(|h| h.direction == direction);
                self.held = Some(HeldKey {
                    direction,
                    last_seen: now_ms,
                });
                if repeat {
                    None
                } else {
                    Some(KeyAction::Input(InputEvent::DirectionPressed(direction)))
                }
            }
            KeyEventKind::Release => {
                if self.held.is_some_and(|h| h.direction == direction) {
                    self.held = None;
                    Some(KeyAction::Input(InputEvent::DirectionReleased(direction)))
                } else {
                    None
                }
            }
        }
    }
}

/// Raw mode for the lifetime of the guard, with key release reporting when
/// the terminal supports it
pub struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let enhanced = supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        } else {
            warn!("Terminal does not report key releases; releasing after {}ms idle", KEY_HOLD_TIMEOUT_MS);
        }
        Ok(Self { enhanced })
    }

    pub fn reports_release(&self) -> bool {
        self.enhanced
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}
