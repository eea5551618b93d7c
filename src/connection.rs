// Connection state machine
//
// Disconnected -> Connecting -> Connected -> Disconnected -> (fixed delay) -> Connecting ...
// Retries forever with a fixed delay. The transport is driven by the caller;
// this type only decides when to connect and publishes the state.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

pub struct ConnectionManager {
    state: ConnectionState,
    reconnect_delay_ms: u64,
    reconnect_at: Option<u64>,
    attempts: u64,
    observers: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(reconnect_delay: Duration) -> Self {
        let (observers, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state: ConnectionState::Disconnected,
            reconnect_delay_ms: reconnect_delay.as_millis() as u64,
            // First attempt is due immediately
            reconnect_at: Some(0),
            attempts: 0,
            observers,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Connect attempts started so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// When the next attempt is due, if one is scheduled
    pub fn reconnect_at(&self) -> Option<u64> {
        self.reconnect_at
    }

    /// Read-only view of the state for the rest of the system
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.observers.subscribe()
    }

    /// Returns true (and moves to Connecting) when an attempt is due
    pub fn poll_reconnect(&mut self, now_ms: u64) -> bool {
        match self.reconnect_at {
            Some(due) if now_ms >= due && self.state == ConnectionState::Disconnected => {
                self.reconnect_at = None;
                self.attempts += 1;
                self.transition(ConnectionState::Connecting);
                info!("Connecting (attempt {})", self.attempts);
                true
            }
            _ => false,
        }
    }

    /// Transport signalled open. Returns false if no attempt was in flight.
    pub fn on_open(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            warn!("Open signal while {:?}, ignoring", self.state);
            return false;
        }
        self.transition(ConnectionState::Connected);
        info!("Connected");
        true
    }

    /// Transport signalled error or close. Schedules the next attempt.
    ///
    /// Returns false when already disconnected (e.g. close right after an error).
    pub fn on_closed(&mut self, now_ms: u64, reason: &str) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        let was = self.state;
        self.transition(ConnectionState::Disconnected);
        self.reconnect_at = Some(now_ms.saturating_add(self.reconnect_delay_ms));
        warn!(
            "Link lost while {:?} ({}), retrying in {}ms",
            was, reason, self.reconnect_delay_ms
        );
        true
    }

    fn transition(&mut self, next: ConnectionState) {
        self.state = next;
        self.observers.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Duration::from_millis(3000))
    }

    #[test]
    fn test_first_attempt_is_immediate() {
        let mut conn = manager();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.poll_reconnect(0));
        assert_eq!(conn.state(), ConnectionState::Connecting);
        // Only one attempt in flight
        assert!(!conn.poll_reconnect(10));
        assert!(conn.on_open());
        assert!(conn.is_connected());
    }

    #[test]
    fn test_close_schedules_exactly_one_attempt() {
        let mut conn = manager();
        conn.poll_reconnect(0);
        conn.on_open();

        assert!(conn.on_closed(1_000, "closed by peer"));
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        // Not before the delay
        assert!(!conn.poll_reconnect(3_999));
        assert!(conn.poll_reconnect(4_000));
        assert!(!conn.poll_reconnect(10_000));
        assert_eq!(conn.attempts(), 2);
    }

    #[test]
    fn test_error_then_close_reschedules_once() {
        let mut conn = manager();
        conn.poll_reconnect(0);
        conn.on_open();

        assert!(conn.on_closed(500, "io error"));
        assert!(!conn.on_closed(520, "close"));
        assert_eq!(conn.reconnect_at(), Some(3_500));
    }

    #[test]
    fn test_failed_connect_retries_forever() {
        let mut conn = manager();
        let mut now = 0;
        for attempt in 1..=5 {
            assert!(conn.poll_reconnect(now));
            assert_eq!(conn.attempts(), attempt);
            assert!(conn.on_closed(now, "connection refused"));
            now += 3_000;
        }
    }

    #[test]
    fn test_huge_delay_never_wraps() {
        let mut conn = ConnectionManager::new(Duration::from_millis(u64::MAX));
        conn.poll_reconnect(0);
        conn.on_open();
        assert!(conn.on_closed(10, "closed"));
        assert_eq!(conn.reconnect_at(), Some(u64::MAX));
        assert!(!conn.poll_reconnect(u64::MAX - 1));
        assert!(conn.poll_reconnect(u64::MAX));
    }

    #[test]
    fn test_stray_open_is_ignored() {
        let mut conn = manager();
        assert!(!conn.on_open());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_observers_see_transitions() {
        let mut conn = manager();
        let rx = conn.subscribe();
        conn.poll_reconnect(0);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
        conn.on_open();
        assert_eq!(*rx.borrow(), ConnectionState::Connected);
        conn.on_closed(0, "test");
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }
}
