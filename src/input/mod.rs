// Input sources feeding the controller
//
// - Keyboard (crossterm, raw terminal mode)
// - Gamepad (gilrs, background thread)

pub mod gamepad;
pub mod keyboard;

pub use keyboard::{KeyAction, KeyboardInput, TerminalGuard};
