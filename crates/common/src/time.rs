//! Time abstraction for testability
//!
//! Token expiry is computed from wall-clock milliseconds. Production code uses
//! [`SystemClock`]; tests drive a [`MockClock`] forward instead of sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use lakeflow_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::at_millis(1_000);
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.millis_since_epoch(), 6_000);
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Trait for wall-clock reads
pub trait Clock: Send + Sync {
    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    ///
    /// Times before the epoch read as zero.
    fn millis_since_epoch(&self) -> i64 {
        let millis = self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        i64::try_from(millis).unwrap_or(i64::MAX)
    }
}

/// Real system clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed time, so a clock handed to a component can
/// still be advanced from the test.
#[derive(Debug, Clone)]
pub struct MockClock {
    base: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a mock clock starting at the current real time.
    #[must_use]
    pub fn new() -> Self {
        Self { base: SystemTime::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Create a mock clock starting at a fixed epoch offset.
    #[must_use]
    pub fn at_millis(millis: u64) -> Self {
        Self {
            base: UNIX_EPOCH + Duration::from_millis(millis),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Set the mock clock to an absolute elapsed time since creation
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn system_time(&self) -> SystemTime {
        self.base + *self.elapsed.lock()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for time.
    use super::*;

    /// Validates the system clock millis scenario.
    ///
    /// Assertions:
    /// - Ensures `millis > 0` evaluates to true.
    #[test]
    fn test_system_clock_millis() {
        let clock = SystemClock;
        let millis = clock.millis_since_epoch();
        assert!(millis > 0);
    }

    /// Validates `MockClock::at_millis` behavior for the advance scenario.
    ///
    /// Assertions:
    /// - Confirms `clock.millis_since_epoch()` equals `1_000 + 5_000`.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::at_millis(1_000);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.millis_since_epoch(), 6_000);
    }

    /// Validates `MockClock::set_elapsed` replacing previous progress.
    ///
    /// Assertions:
    /// - Confirms `clock.elapsed()` equals `Duration::from_secs(20)`.
    #[test]
    fn test_mock_clock_set_elapsed() {
        let clock = MockClock::new();

        clock.set_elapsed(Duration::from_secs(10));
        clock.set_elapsed(Duration::from_secs(20));
        assert_eq!(clock.elapsed(), Duration::from_secs(20));
    }

    #[test]
    fn clones_share_elapsed_time() {
        let clock = MockClock::at_millis(0);
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.millis_since_epoch(), 250);
    }
}
