//! Wall-clock time source for credential expiry and rate-limit windows.
//!
//! All timestamps are whole seconds since the Unix epoch. Expiry and window
//! arithmetic is done against wall-clock time, never against a monotonic
//! deadline, because credential timestamps travel to the client and back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub type UnixSeconds = u64;

/// The system clock could not produce a usable timestamp.
#[derive(Debug, Clone, thiserror::Error)]
#[error("system clock unavailable: {0}")]
pub struct ClockError(String);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<UnixSeconds, ClockError>;
}

/// Clock backed by `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<UnixSeconds, ClockError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| ClockError(e.to_string()))
    }
}

/// Manually driven clock.
///
/// Clones share the same instant, so a test can hand one clone to the server
/// and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: UnixSeconds) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, instant: UnixSeconds) {
        self.now.store(instant, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<UnixSeconds, ClockError> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}
