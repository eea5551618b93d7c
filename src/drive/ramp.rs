// Velocity ramp: moves the actual motor speed toward the target by at most
// a fixed step per tick.

use super::kinematics::{MotorTarget, SPEED_LIMIT};

/// Smoothed motor speeds in percent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorActual {
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone)]
pub struct Ramp {
    max_step: f32,
    actual: MotorActual,
}

impl Ramp {
    /// `ramp_ms` is the time to go from 0 to full speed; 0 disables smoothing
    pub fn new(tick_ms: u64, ramp_ms: u64) -> Self {
        let max_step = if ramp_ms == 0 {
            f32::INFINITY
        } else {
            // Integer product first so common settings give an exact step (50/2000 -> 2.5)
            (SPEED_LIMIT as u64).saturating_mul(tick_ms) as f32 / ramp_ms as f32
        };
        Self {
            max_step,
            actual: MotorActual::default(),
        }
    }

    pub fn max_step(&self) -> f32 {
        self.max_step
    }

    pub fn actual(&self) -> MotorActual {
        self.actual
    }

    /// Advance one tick toward `target`
    pub fn step(&mut self, target: MotorTarget) -> MotorActual {
        self.actual.left = approach(self.actual.left, target.left as f32, self.max_step);
        self.actual.right = approach(self.actual.right, target.right as f32, self.max_step);
        self.actual
    }

    /// Jump straight to zero
    pub fn reset(&mut self) {
        self.actual = MotorActual::default();
    }
}

fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}
