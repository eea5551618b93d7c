// Scripted motor test: drives each direction briefly with stops in between.

use crate::messages::{Command, Direction};

/// (direction, how long to hold it before the next step)
pub const MOTOR_TEST_STEPS: [(Direction, u64); 8] = [
    (Direction::Forward, 1000),
    (Direction::Stop, 500),
    (Direction::Backward, 1000),
    (Direction::Stop, 500),
    (Direction::Left, 1000),
    (Direction::Stop, 500),
    (Direction::Right, 1000),
    (Direction::Stop, 500),
];

#[derive(Debug)]
pub struct MotorTest {
    index: usize,
    next_at: u64,
}

impl MotorTest {
    /// Start the sequence; returns it with the first command to send
    pub fn start(now_ms: u64) -> (Self, Command) {
        let (direction, hold) = MOTOR_TEST_STEPS[0];
        let test = Self {
            index: 0,
            next_at: now_ms + hold,
        };
        (test, Command::Move { direction })
    }

    /// Next step once the current one has run its time
    pub fn tick(&mut self, now_ms: u64) -> Option<Command> {
        if self.is_finished() || now_ms < self.next_at {
            return None;
        }
        self.index += 1;
        let &(direction, hold) = MOTOR_TEST_STEPS.get(self.index)?;
        self.next_at = now_ms + hold;
        Some(Command::Move { direction })
    }

    pub fn step(&self) -> usize {
        self.index
    }

    /// True once the final step has been sent
    pub fn is_finished(&self) -> bool {
        self.index + 1 >= MOTOR_TEST_STEPS.len()
    }
}
