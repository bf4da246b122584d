//! Time management for the measurement engine
//!
//! Provides a clock abstraction so the detector can run against:
//! - A hardware monotonic timer (production)
//! - The process monotonic clock (std hosts)
//! - A controllable mock clock (tests and simulation)
//!
//! Timestamps are **microseconds** from a monotonic origin: the
//! original measurement hardware stamps pulse edges with a 64-bit
//! microsecond timer, and session durations inherit that resolution.
//! Timestamps are meaningful only relative to other timestamps from
//! the same source, and never wrap within a session's lifetime
//! (sessions are seconds to minutes long).

use core::sync::atomic::{AtomicU64, Ordering};

use alloc::sync::Arc;

/// Timestamp in microseconds since the clock's origin
pub type Timestamp = u64;

/// Microseconds per millisecond, for config conversions
pub const US_PER_MS: u64 = 1_000;

/// Source of monotonic time for the measurement engine
///
/// Implementations might read a hardware timer peripheral, an RTOS
/// tick count, or the process monotonic clock depending on platform.
/// `now_us()` must be non-decreasing between calls on the same
/// instance; the detector computes durations by subtraction and
/// guards against (but does not correct for) a misbehaving clock.
pub trait TimeSource: Send {
    /// Get the current timestamp in microseconds
    fn now_us(&self) -> Timestamp;
}

/// Monotonic time source anchored at construction (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicTime {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self { origin: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicTime {
    fn now_us(&self) -> Timestamp {
        self.origin.elapsed().as_micros() as Timestamp
    }
}

/// Controllable time source for tests and simulation
///
/// Clones share one underlying instant, so a test can hold a handle
/// and advance time while the detector owns another handle:
///
/// ```
/// use flowgauge_core::time::{MockTime, TimeSource};
///
/// let clock = MockTime::new(0);
/// let handle = clock.clone();
/// handle.advance_ms(5);
/// assert_eq!(clock.now_us(), 5_000);
/// ```
#[derive(Debug, Clone)]
pub struct MockTime {
    now_us: Arc<AtomicU64>,
}

impl MockTime {
    /// Create a mock clock at the given starting timestamp
    pub fn new(start_us: Timestamp) -> Self {
        Self { now_us: Arc::new(AtomicU64::new(start_us)) }
    }

    /// Jump to an absolute timestamp
    pub fn set(&self, timestamp_us: Timestamp) {
        self.now_us.store(timestamp_us, Ordering::Release);
    }

    /// Advance by the given number of microseconds
    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::AcqRel);
    }

    /// Advance by the given number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * US_PER_MS);
    }
}

impl TimeSource for MockTime {
    fn now_us(&self) -> Timestamp {
        self.now_us.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_time_advances() {
        let clock = MockTime::new(1_000);
        assert_eq!(clock.now_us(), 1_000);

        clock.advance_us(500);
        assert_eq!(clock.now_us(), 1_500);

        clock.advance_ms(2);
        assert_eq!(clock.now_us(), 3_500);
    }

    #[test]
    fn mock_clones_share_the_instant() {
        let clock = MockTime::new(0);
        let handle = clock.clone();

        handle.set(42);
        assert_eq!(clock.now_us(), 42);
    }

    #[cfg(feature = "std")]
    #[test]
    fn monotonic_never_goes_backwards() {
        let clock = MonotonicTime::new();
        let a = clock.now_us();
        let b = clock.now_us();
        assert!(b >= a);
    }
}
