// Transmission gate: turns the ramped motor speeds into a PWM payload and
// only lets it through when the link is up and the payload changed.

use tracing::{debug, trace};

use crate::drive::MotorActual;
use crate::messages::Command;
use crate::transport::Transport;

/// Percent -> firmware PWM scale
pub const PWM_SCALE: f32 = 10.0;
pub const PWM_LIMIT: i32 = 1000;

/// Integer motor pair on the PWM scale (-1000..=1000)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PwmPayload {
    pub left: i32,
    pub right: i32,
}

impl PwmPayload {
    pub const ZERO: PwmPayload = PwmPayload { left: 0, right: 0 };

    pub fn from_actual(actual: MotorActual) -> Self {
        let scale = |v: f32| ((v * PWM_SCALE).round() as i32).clamp(-PWM_LIMIT, PWM_LIMIT);
        Self {
            left: scale(actual.left),
            right: scale(actual.right),
        }
    }

    pub fn command(&self) -> Command {
        Command::Custom {
            left: self.left,
            right: self.right,
        }
    }
}

/// What happened to an offered payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Sent,
    /// Same as the last sent payload
    Unchanged,
    /// Link not connected
    Offline,
    /// Transport refused the frame
    Dropped,
}

#[derive(Debug, Default)]
pub struct TransmissionGate {
    last_sent: Option<PwmPayload>,
}

impl TransmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sent(&self) -> Option<PwmPayload> {
        self.last_sent
    }

    /// Record a payload that reached the car through another command (e.g. stop)
    pub fn record(&mut self, payload: PwmPayload) {
        self.last_sent = Some(payload);
    }

    /// Send `payload` if connected and different from the last one sent
    pub fn offer<T: Transport + ?Sized>(
        &mut self,
        payload: PwmPayload,
        connected: bool,
        transport: &mut T,
    ) -> GateOutcome {
        if !connected {
            return GateOutcome::Offline;
        }
        if self.last_sent == Some(payload) {
            return GateOutcome::Unchanged;
        }

        match transport.send(&payload.command()) {
            Ok(()) => {
                trace!("Sent motor payload: left={}, right={}", payload.left, payload.right);
                self.last_sent = Some(payload);
                GateOutcome::Sent
            }
            Err(e) => {
                debug!("Dropped motor payload: {}", e);
                GateOutcome::Dropped
            }
        }
    }
}
