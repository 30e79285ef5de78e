//! Fake clock for deterministic polling tests.
//!
//! Time only moves when someone advances it, so timeout behaviour does not
//! depend on how fast the test machine is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Manually advanced clock
#[derive(Debug, Default)]
pub struct FakeClock {
    current_ms: AtomicU64,
}

impl FakeClock {
    /// Clock starting at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `time_ms`
    #[must_use]
    pub fn starting_at(time_ms: u64) -> Self {
        Self {
            current_ms: AtomicU64::new(time_ms),
        }
    }

    /// Current fake time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Current fake time as Duration
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms())
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    /// Move time forward by milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to a fixed time
    pub fn set_ms(&self, time_ms: u64) {
        self.current_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl Clone for FakeClock {
    fn clone(&self) -> Self {
        Self::starting_at(self.now_ms())
    }
}

/// Shared clock handle
pub type Clock = Arc<FakeClock>;

/// Create a new shared clock
#[must_use]
pub fn create_clock() -> Clock {
    Arc::new(FakeClock::new())
}
