//! Session results and the pulse-to-volume conversion
//!
//! A [`SessionResult`] is produced exactly once per completed session
//! and owned by the caller from then on; the engine keeps no reference
//! after returning it.
//!
//! The conversion is the sensor's calibration arithmetic:
//!
//! ```text
//! seconds  = duration_us / 1e6
//! rate_lpm = (pulses / seconds) * 60 / pulses_per_liter
//! volume_l = rate_lpm * (seconds / 60)     == pulses / pulses_per_liter
//! ```
//!
//! Onset confirmation guarantees forward-progressing timestamps, so a
//! zero or non-finite duration cannot happen in a correct integration -
//! but it is checked anyway and reported as `DegenerateSession` rather
//! than dividing by it.

use crate::capture::ImageBuffer;
use crate::errors::{MeterError, MeterResult};

/// The immutable outcome of one completed flow session
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionResult {
    /// Time from the session's first pulse to detected cessation
    pub duration_us: u64,
    /// Mean flow rate over the session, liters per minute
    pub rate_lpm: f32,
    /// Total dispensed volume, liters
    pub volume_l: f32,
    /// Snapshot captured at the dispensing site, if any
    pub image: Option<ImageBuffer>,
}

impl SessionResult {
    /// Convert raw session data into a physical result.
    ///
    /// `duration_us` must be positive; `pulses_per_liter` comes from
    /// the validated [`SessionConfig`](crate::config::SessionConfig),
    /// so it is finite and positive here.
    pub fn from_pulses(pulses: u32, duration_us: u64, pulses_per_liter: f32) -> MeterResult<Self> {
        let seconds = duration_us as f32 / 1e6;
        if duration_us == 0 || !seconds.is_finite() || seconds <= 0.0 {
            return Err(MeterError::DegenerateSession { duration_us });
        }

        let rate_lpm = (pulses as f32 / seconds) * 60.0 / pulses_per_liter;
        let volume_l = rate_lpm * (seconds / 60.0);

        Ok(Self { duration_us, rate_lpm, volume_l, image: None })
    }

    /// Session length in seconds
    pub fn duration_seconds(&self) -> f32 {
        self.duration_us as f32 / 1e6
    }

    /// Attach a captured frame, replacing any previous one
    pub fn attach_image(&mut self, image: ImageBuffer) {
        self.image = Some(image);
    }
}
