//! Connection state machine (spec §4.7): `Connecting -> Connected ->
//! Reconnecting -> Closed`, idle timeouts, and exponential backoff with
//! jitter.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    fn to_tag(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Reconnecting => 2,
            ConnectionState::Closed => 3,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Connected,
            2 => ConnectionState::Reconnecting,
            _ => ConnectionState::Closed,
        }
    }
}

/// Tracks the connection's current state with atomic transitions, so the
/// I/O task and caller-facing code can both observe it without a lock.
pub struct ConnectionStateMachine {
    state: AtomicU8,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting.to_tag()),
        }
    }

    pub fn current(&self) -> ConnectionState {
        ConnectionState::from_tag(self.state.load(Ordering::Acquire))
    }

    /// Applies a transition if it is legal from the current state, per the
    /// table in spec §4.7. Returns the state actually reached.
    pub fn transition(&self, event: Event) -> ConnectionState {
        loop {
            let current = self.current();
            let next = match (current, event) {
                (ConnectionState::Connecting, Event::HandshakeOk) => ConnectionState::Connected,
                (ConnectionState::Connecting, Event::HandshakeFailed) => {
                    ConnectionState::Reconnecting
                }
                (ConnectionState::Connected, Event::SocketClosedOrReadIdle) => {
                    ConnectionState::Reconnecting
                }
                (ConnectionState::Connected, Event::WriteIdleElapsed) => ConnectionState::Connected,
                (ConnectionState::Connected, Event::Close) => ConnectionState::Closed,
                (ConnectionState::Reconnecting, Event::HandshakeOk) => ConnectionState::Connected,
                (ConnectionState::Reconnecting, Event::Close) => ConnectionState::Closed,
                (ConnectionState::Closed, _) => ConnectionState::Closed,
                // Any other (state, event) pair is a no-op: the event does
                // not apply to the current state.
                (other, _) => other,
            };
            if self
                .state
                .compare_exchange(
                    current.to_tag(),
                    next.to_tag(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return next;
            }
        }
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    HandshakeOk,
    HandshakeFailed,
    SocketClosedOrReadIdle,
    WriteIdleElapsed,
    Close,
}

/// Idle timeout policy; either timeout may be disabled by setting it to
/// zero.
#[derive(Debug, Clone, Copy)]
pub struct IdlePolicy {
    pub write_idle: Duration,
    pub read_idle: Duration,
}

impl IdlePolicy {
    pub fn write_idle_enabled(&self) -> bool {
        !self.write_idle.is_zero()
    }

    pub fn read_idle_enabled(&self) -> bool {
        !self.read_idle.is_zero()
    }
}

/// Exponential backoff with jitter, bounded at a configured max.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let exp = self.base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.max);
        let jitter = rng.gen_range(self.jitter_min..=self.jitter_max);
        capped.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_ok_moves_connecting_to_connected() {
        let sm = ConnectionStateMachine::new();
        assert_eq!(sm.transition(Event::HandshakeOk), ConnectionState::Connected);
    }

    #[test]
    fn handshake_failure_moves_connecting_to_reconnecting() {
        let sm = ConnectionStateMachine::new();
        assert_eq!(
            sm.transition(Event::HandshakeFailed),
            ConnectionState::Reconnecting
        );
    }

    #[test]
    fn write_idle_while_connected_stays_connected() {
        let sm = ConnectionStateMachine::new();
        sm.transition(Event::HandshakeOk);
        assert_eq!(
            sm.transition(Event::WriteIdleElapsed),
            ConnectionState::Connected
        );
    }

    #[test]
    fn closed_is_terminal() {
        let sm = ConnectionStateMachine::new();
        sm.transition(Event::HandshakeOk);
        sm.transition(Event::Close);
        assert_eq!(sm.current(), ConnectionState::Closed);
        assert_eq!(sm.transition(Event::HandshakeOk), ConnectionState::Closed);
    }

    #[test]
    fn reconnecting_then_handshake_ok_returns_to_connected() {
        let sm = ConnectionStateMachine::new();
        sm.transition(Event::HandshakeFailed);
        assert_eq!(sm.transition(Event::HandshakeOk), ConnectionState::Connected);
    }

    #[test]
    fn backoff_is_capped_at_max() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter_min: 1.0,
            jitter_max: 1.0,
        };
        let mut rng = rand::thread_rng();
        let delay = policy.delay_for_attempt(10, &mut rng);
        assert!(delay <= Duration::from_secs(1));
    }
}
