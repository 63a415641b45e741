//! Statistics for streaming sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Live per-session counters
///
/// Updated from the forwarding and refresh tasks without locking.
#[derive(Debug)]
pub struct SessionStats {
    messages_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    messages_dropped: AtomicU64,
    token_refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            messages_forwarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            token_refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// Record one payload handed to the client channel
    pub fn record_forwarded(&self, bytes: usize) {
        self.messages_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record payloads lost because the client fell behind
    pub fn record_dropped(&self, count: u64) {
        self.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters, with zero durations
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_forwarded: self.messages_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            token_refreshes: self.token_refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            duration: Duration::ZERO,
            active_duration: Duration::ZERO,
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of [`SessionStats`] at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub messages_forwarded: u64,
    pub bytes_forwarded: u64,
    pub messages_dropped: u64,
    pub token_refreshes: u64,
    pub refresh_failures: u64,
    /// Time since the session was created
    #[serde(skip)]
    pub duration: Duration,
    /// Time spent streaming
    #[serde(skip)]
    pub active_duration: Duration,
}

impl StatsSnapshot {
    pub fn with_lifetime(mut self, age: Duration, active: Duration) -> Self {
        self.duration = age;
        self.active_duration = active;
        self
    }

    /// Forwarded payload throughput over the streaming time, bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.active_duration.as_secs();
        if secs > 0 {
            (self.bytes_forwarded * 8) / secs
        } else {
            0
        }
    }
}
