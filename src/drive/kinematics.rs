// Differential drive mixer
// Combines a forward scalar and a turn scalar into left/right motor targets.

/// Motor targets are percentages in [-SPEED_LIMIT, SPEED_LIMIT]
pub const SPEED_LIMIT: i32 = 100;

/// Logical input axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Forward/back, positive = forward
    Forward,
    /// Left/right, positive = turn right
    Turn,
}

/// Latest reading of one axis
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisSample {
    pub value: f32, // [-1, 1]
    pub timestamp_ms: u64,
}

impl AxisSample {
    pub fn new(value: f32, timestamp_ms: u64) -> Self {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(-1.0, 1.0)
        };
        Self {
            value,
            timestamp_ms,
        }
    }

    /// Value scaled to [-100, 100]
    pub fn scaled(&self) -> i32 {
        (self.value * SPEED_LIMIT as f32).round() as i32
    }
}

/// Left/right motor targets in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorTarget {
    pub left: i32,
    pub right: i32,
}

impl MotorTarget {
    pub fn new(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(-SPEED_LIMIT, SPEED_LIMIT),
            right: right.clamp(-SPEED_LIMIT, SPEED_LIMIT),
        }
    }

    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

/// Mix forward and turn scalars (each in [-100, 100]) into motor targets
///
/// Pure turn-in-place when `forward == 0`, straight travel when `turn == 0`.
pub fn mix(forward: i32, turn: i32) -> MotorTarget {
    MotorTarget::new(forward + turn, forward - turn)
}

/// Latest sample of both axes
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisState {
    forward: AxisSample,
    turn: AxisSample,
}

impl AxisState {
    pub fn update(&mut self, axis: Axis, value: f32, now_ms: u64) {
        let sample = AxisSample::new(value, now_ms);
        match axis {
            Axis::Forward => self.forward = sample,
            Axis::Turn => self.turn = sample,
        }
    }

    pub fn release(&mut self, axis: Axis, now_ms: u64) {
        self.update(axis, 0.0, now_ms);
    }

    pub fn sample(&self, axis: Axis) -> AxisSample {
        match axis {
            Axis::Forward => self.forward,
            Axis::Turn => self.turn,
        }
    }

    /// Motor targets for the current pair of samples
    pub fn target(&self) -> MotorTarget {
        mix(self.forward.scaled(), self.turn.scaled())
    }
}
