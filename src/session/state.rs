//! Session state machine
//!
//! Tracks a streaming session from creation to teardown:
//!
//! ```text
//! Idle ──connect──► Connecting ──ok──► Active
//!                        │               │
//!                        └──failure──►  Closed  ◄──disconnect / transport error
//! ```
//!
//! `Closed` is terminal. Closing from any phase is allowed and only the
//! first close reports a transition.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, no connect request yet
    Idle,
    /// Resolving credentials and opening the broker subscription
    Connecting,
    /// Forwarding telemetry
    Active,
    /// Torn down
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Current phase
    pub phase: SessionPhase,

    /// Creation time
    pub created_at: Instant,

    /// Time the session became active
    pub activated_at: Option<Instant>,

    /// Camera named by the connect request
    pub camera_serial: Option<String>,
}

impl SessionState {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            phase: SessionPhase::Idle,
            created_at: Instant::now(),
            activated_at: None,
            camera_serial: None,
        }
    }

    /// Idle → Connecting
    pub fn begin_connect(&mut self, serial: &str) -> Result<()> {
        self.require(SessionPhase::Idle)?;
        self.phase = SessionPhase::Connecting;
        self.camera_serial = Some(serial.to_string());
        Ok(())
    }

    /// Connecting → Active
    pub fn activate(&mut self) -> Result<()> {
        self.require(SessionPhase::Connecting)?;
        self.phase = SessionPhase::Active;
        self.activated_at = Some(Instant::now());
        Ok(())
    }

    /// Move to Closed, returning the phase left behind
    ///
    /// Returns `None` if the session was already closed.
    pub fn close(&mut self) -> Option<SessionPhase> {
        if self.phase == SessionPhase::Closed {
            return None;
        }
        let previous = self.phase;
        self.phase = SessionPhase::Closed;
        Some(previous)
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Time since creation
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time spent streaming, zero if never activated
    pub fn active_duration(&self) -> Duration {
        self.activated_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    fn require(&self, expected: SessionPhase) -> Result<()> {
        if self.phase != expected {
            return Err(Error::InvalidState {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(1);
        assert_eq!(state.phase, SessionPhase::Idle);

        state.begin_connect("CAM1").unwrap();
        assert_eq!(state.phase, SessionPhase::Connecting);
        assert_eq!(state.camera_serial.as_deref(), Some("CAM1"));

        state.activate().unwrap();
        assert!(state.is_active());
        assert!(state.activated_at.is_some());

        assert_eq!(state.close(), Some(SessionPhase::Active));
        assert!(state.is_closed());
    }

    #[test]
    fn test_connect_only_from_idle() {
        let mut state = SessionState::new(1);
        state.begin_connect("CAM1").unwrap();

        let err = state.begin_connect("CAM2").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                expected: SessionPhase::Idle,
                actual: SessionPhase::Connecting
            }
        ));
    }

    #[test]
    fn test_activate_requires_connecting() {
        let mut state = SessionState::new(1);
        assert!(state.activate().is_err());

        state.begin_connect("CAM1").unwrap();
        state.close();
        assert!(state.activate().is_err());
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_close_is_reported_once() {
        let mut state = SessionState::new(1);
        assert_eq!(state.close(), Some(SessionPhase::Idle));
        assert_eq!(state.close(), None);
        assert_eq!(state.active_duration(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_durations_follow_clock() {
        let mut state = SessionState::new(1);
        tokio::time::advance(Duration::from_secs(2)).await;
        state.begin_connect("CAM1").unwrap();
        state.activate().unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(state.age() >= Duration::from_secs(7));
        assert!(state.active_duration() >= Duration::from_secs(5));
        assert!(state.active_duration() < state.age());
    }
}
