// Held discrete commands
// A direction is sent once on press, repeated at a fixed interval while held,
// and followed by a single stop on release.

use tracing::debug;

use crate::messages::{Command, Direction};

#[derive(Debug, Clone, Copy)]
struct Held {
    direction: Direction,
    next_due: u64,
}

#[derive(Debug)]
pub struct CommandRepeater {
    interval_ms: u64,
    held: Option<Held>,
}

impl CommandRepeater {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            held: None,
        }
    }

    pub fn active(&self) -> Option<Direction> {
        self.held.map(|h| h.direction)
    }

    /// Start holding `direction`; returns the commands to send now
    ///
    /// Pressing the direction that is already held does nothing. Pressing a
    /// different one stops the current direction first.
    pub fn press(&mut self, direction: Direction, now_ms: u64) -> Vec<Command> {
        let mut out = Vec::new();
        if self.active() == Some(direction) {
            return out;
        }
        if let Some(stop) = self.release_active() {
            out.push(stop);
        }

        debug!("Holding {}", direction.as_str());
        self.held = Some(Held {
            direction,
            next_due: now_ms + self.interval_ms,
        });
        out.push(Command::Move { direction });
        out
    }

    /// Release `direction`; returns a stop if it was the held one
    pub fn release(&mut self, direction: Direction) -> Option<Command> {
        if self.active() != Some(direction) {
            return None;
        }
        self.release_active()
    }

    /// Repeat the held command when its interval has elapsed
    pub fn tick(&mut self, now_ms: u64) -> Option<Command> {
        let held = self.held.as_mut()?;
        if now_ms < held.next_due {
            return None;
        }
        // Skip any intervals missed while the loop was busy
        while held.next_due <= now_ms {
            held.next_due += self.interval_ms;
        }
        Some(Command::Move {
            direction: held.direction,
        })
    }

    /// Forget the held command without sending anything (link teardown)
    pub fn cancel(&mut self) -> bool {
        self.held.take().is_some()
    }

    fn release_active(&mut self) -> Option<Command> {
        let held = self.held.take()?;
        debug!("Released {}", held.direction.as_str());
        (held.direction != Direction::Stop).then(Command::stop)
    }
}
