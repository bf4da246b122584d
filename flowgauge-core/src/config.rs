//! Session detection parameters
//!
//! All five knobs are read once at detector construction and never
//! mutated afterwards. The defaults match the reference hardware: a
//! turbine sensor emitting 6.6 pulses per liter, confirmed as real
//! flow by 3 pulses inside a 2 second window, considered stopped after
//! 1 second without a new pulse.

use crate::errors::{MeterError, MeterResult};

/// Immutable configuration for the session detector
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Pulses required within the startup window to confirm real flow
    pub startup_pulses: u32,

    /// Window for onset confirmation, in milliseconds
    pub startup_window_ms: u32,

    /// Gap without a new pulse that ends a session, in milliseconds
    pub idle_timeout_ms: u32,

    /// Minimum spacing between counted edges, in nanoseconds
    pub glitch_filter_ns: u32,

    /// Sensor calibration constant, pulses per liter
    pub pulses_per_liter: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_pulses: 3,
            startup_window_ms: 2_000,
            idle_timeout_ms: 1_000,
            glitch_filter_ns: 1_000,
            pulses_per_liter: 6.6,
        }
    }
}

impl SessionConfig {
    /// Override the onset confirmation threshold
    pub fn with_startup_pulses(mut self, pulses: u32) -> Self {
        self.startup_pulses = pulses;
        self
    }

    /// Override the onset confirmation window
    pub fn with_startup_window_ms(mut self, ms: u32) -> Self {
        self.startup_window_ms = ms;
        self
    }

    /// Override the idle timeout
    pub fn with_idle_timeout_ms(mut self, ms: u32) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    /// Override the glitch filter width
    pub fn with_glitch_filter_ns(mut self, ns: u32) -> Self {
        self.glitch_filter_ns = ns;
        self
    }

    /// Override the sensor calibration constant
    pub fn with_pulses_per_liter(mut self, ppl: f32) -> Self {
        self.pulses_per_liter = ppl;
        self
    }

    /// Reject configurations the state machine cannot run on.
    ///
    /// A zero threshold would confirm onset on noise, zero windows
    /// would time out instantly, and a non-positive calibration would
    /// poison every computed rate.
    pub fn validate(&self) -> MeterResult<()> {
        if self.startup_pulses == 0 {
            return Err(MeterError::Resource { reason: "startup pulse threshold is zero" });
        }
        if self.startup_window_ms == 0 {
            return Err(MeterError::Resource { reason: "startup window is zero" });
        }
        if self.idle_timeout_ms == 0 {
            return Err(MeterError::Resource { reason: "idle timeout is zero" });
        }
        if !self.pulses_per_liter.is_finite() || self.pulses_per_liter <= 0.0 {
            return Err(MeterError::Resource { reason: "pulses-per-liter not positive" });
        }
        Ok(())
    }
}
