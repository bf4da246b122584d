//! Error Types for Session Measurement Failures
//!
//! ## Design Philosophy
//!
//! Flowgauge's error system is designed with embedded systems in mind:
//!
//! 1. **Small Size**: Each variant is kept minimal since errors are
//!    returned from the measuring loop on every failed confirmation.
//!
//! 2. **No Heap Allocation**: All error data is inline - no String, only
//!    `&'static str` for reasons. This ensures deterministic memory usage.
//!
//! 3. **Copy Semantics**: Errors implement Copy for efficient return from
//!    functions without move semantics complications.
//!
//! 4. **Actionable Information**: Each error carries enough context to
//!    decide the response without additional queries - in particular the
//!    sub-threshold pulse count on a startup timeout.
//!
//! ## Error Categories
//!
//! ### Fatal at initialization
//! - `Resource`: the counting hardware cannot be allocated or the
//!   configuration is unusable. Propagate and abort startup.
//!
//! ### Programming errors
//! - `InvalidState`: an operation was attempted in the wrong counting
//!   state (e.g. clearing a running counter). Should not occur in a
//!   correct integration.
//!
//! ### Expected, benign outcomes
//! - `StartupTimeout`: no genuine flow confirmed within the startup
//!   window - somebody bumped the sensor. The caller simply retries
//!   `measure_session()`.
//!
//! ### Unexpected but recoverable
//! - `DegenerateSession`: the computed duration was non-positive or
//!   non-finite, which indicates a clock or logic fault. Retryable, but
//!   worth logging loudly.

use thiserror_no_std::Error;

/// Result type for measurement operations
pub type MeterResult<T> = Result<T, MeterError>;

/// Measurement errors - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MeterError {
    /// Counting hardware unavailable or misconfigured
    #[error("counting resource unavailable: {reason}")]
    Resource {
        /// Why the resource could not be allocated
        reason: &'static str,
    },

    /// Operation attempted in the wrong counting state
    #[error("operation `{operation}` invalid in current state")]
    InvalidState {
        /// The operation that was rejected
        operation: &'static str,
    },

    /// No genuine flow confirmed within the startup window
    #[error("no flow confirmed within {window_ms} ms ({pulses} pulses seen)")]
    StartupTimeout {
        /// Sub-threshold pulse count observed when the window elapsed
        pulses: u32,
        /// The startup window that elapsed, in milliseconds
        window_ms: u32,
    },

    /// Session duration was non-positive or non-finite
    #[error("degenerate session duration: {duration_us} us")]
    DegenerateSession {
        /// The offending duration in microseconds
        duration_us: u64,
    },
}

impl MeterError {
    /// Whether the caller should simply call `measure_session()` again.
    ///
    /// A failed onset confirmation is an expected outcome, not a fault;
    /// a degenerate duration is unexpected but clears on retry. Resource
    /// and state errors need operator attention instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MeterError::StartupTimeout { .. } | MeterError::DegenerateSession { .. }
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MeterError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Resource { reason } =>
                defmt::write!(fmt, "counting resource unavailable: {}", reason),
            Self::InvalidState { operation } =>
                defmt::write!(fmt, "operation `{}` invalid in current state", operation),
            Self::StartupTimeout { pulses, window_ms } =>
                defmt::write!(fmt, "no flow within {} ms ({} pulses)", window_ms, pulses),
            Self::DegenerateSession { duration_us } =>
                defmt::write!(fmt, "degenerate duration: {} us", duration_us),
        }
    }
}
