//! Session detection and measurement engine for Flowgauge
//!
//! Turns the pulse train of a liquid flow sensor into bounded "pour
//! sessions": wait for flow to begin, confirm the onset is real flow
//! rather than noise, track pulses while flow continues, detect when
//! it stops, and convert the pulse/time data into a flow rate and a
//! dispensed volume.
//!
//! Key constraints:
//! - One interrupt-context producer, one foreground consumer
//! - No heap allocation in the interrupt path
//! - No blocking from interrupt context, ever
//!
//! ```no_run
//! use flowgauge_core::{
//!     config::SessionConfig,
//!     counter::SoftEdgeCounter,
//!     detector::{SessionDetector, SleepPacer},
//!     time::MonotonicTime,
//!     timer::ThreadTimer,
//! };
//!
//! let counter = SoftEdgeCounter::new(SessionConfig::default().glitch_filter_ns);
//! let probe = counter.probe().unwrap(); // hand to the GPIO interrupt
//! # drop(probe);
//! let mut detector = SessionDetector::new(
//!     counter,
//!     MonotonicTime::new(),
//!     ThreadTimer::spawn().unwrap(),
//!     SleepPacer::default(),
//!     SessionConfig::default(),
//! ).unwrap();
//!
//! match detector.measure_session() {
//!     Ok(session) => { /* report rate and volume */ }
//!     Err(e) if e.is_retryable() => { /* sensor bumped, just retry */ }
//!     Err(e) => { /* hardware fault */ }
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod capture;
pub mod config;
pub mod counter;
pub mod detector;
pub mod errors;
pub mod result;
pub mod signal;
pub mod time;
pub mod timer;

// Public API
pub use config::SessionConfig;
pub use counter::{EdgeCounter, PulseProbe, SoftEdgeCounter};
pub use detector::SessionDetector;
pub use errors::{MeterError, MeterResult};
pub use result::SessionResult;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
