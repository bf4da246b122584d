//! Session Detection State Machine
//!
//! ## Overview
//!
//! [`SessionDetector`] turns the raw pulse stream into bounded
//! sessions. One call to [`SessionDetector::measure_session`] walks
//! the full state machine:
//!
//! ```text
//!          measure_session()
//!                │
//!                ▼
//!   IDLE ─▶ AWAITING_CONFIRMATION ─▶ ACTIVE ─▶ COMPLETE (SessionResult)
//!                │                     │
//!                │ window elapses      │ idle gap elapses
//!                ▼                     ▼
//!         TIMED_OUT_EARLY         (end timestamp captured,
//!         (StartupTimeout)         counter stopped, result
//!                                  computed)
//! ```
//!
//! ## Onset confirmation
//!
//! Requiring N pulses inside a bounded window before committing to a
//! session is the core debounce strategy: it demands a minimum
//! instantaneous pulse rate at onset, so a bumped sensor or a stray
//! edge never opens a session. The watch point fires from interrupt
//! context on the Nth pulse; the timestamp it delivers is the
//! session's first pulse, which becomes t0.
//!
//! ## Idle detection
//!
//! During `ACTIVE` the foreground task samples the count roughly once
//! per millisecond, yielding between samples. Every strict increase
//! restarts the idle timer for the full timeout - the timer always
//! measures "time since last new pulse", never "time since session
//! start". A count sampled as unchanged never restarts it. When the
//! timer's signal is finally observed, the gap since the last observed
//! increase is re-checked against the timeout: a firing that raced a
//! restart is put back for the remainder instead of ending the session
//! early. Sessions have no overall cap - flow that keeps pulsing keeps
//! the session open indefinitely.
//!
//! ## Concurrency
//!
//! Exactly one session is in flight at a time; `measure_session` takes
//! `&mut self` and is not reentrant. The interrupt path touches only
//! the counting state and the two signals; everything else is owned by
//! the foreground task and needs no locking.

use crate::config::SessionConfig;
use crate::counter::EdgeCounter;
use crate::errors::{MeterError, MeterResult};
use crate::result::SessionResult;
use crate::time::{TimeSource, Timestamp, US_PER_MS};
use crate::timer::DeferredTimer;

// Macros for optional logging
#[cfg(feature = "log")]
macro_rules! log_info {
    ($($arg:tt)*) => { log::info!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_info {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{}};
}

/// Cooperative yield between count samples
///
/// The foreground task must not busy-spin at full priority while a
/// session is active; it pauses briefly between samples. Wrap a
/// closure in [`FnPacer`] to drive simulated time from a test rig.
pub trait Pacer {
    /// Yield until the next sample is due
    fn pause(&mut self);
}

/// Adapter running a closure on every pause
pub struct FnPacer<F: FnMut()>(pub F);

impl<F: FnMut()> Pacer for FnPacer<F> {
    fn pause(&mut self) {
        (self.0)()
    }
}

/// Pacer sleeping the calling thread (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SleepPacer {
    interval: core::time::Duration,
}

#[cfg(feature = "std")]
impl SleepPacer {
    /// Sleep for a custom interval between samples
    pub fn new(interval: core::time::Duration) -> Self {
        Self { interval }
    }
}

#[cfg(feature = "std")]
impl Default for SleepPacer {
    /// The ~1 ms poll interval the latency bound is quoted for
    fn default() -> Self {
        Self::new(core::time::Duration::from_millis(1))
    }
}

#[cfg(feature = "std")]
impl Pacer for SleepPacer {
    fn pause(&mut self) {
        std::thread::sleep(self.interval);
    }
}

/// The session detection and measurement engine
///
/// Owns the counting resource, the clock, the idle timer and the
/// pacer; constructed once at startup and driven by a single
/// foreground task.
pub struct SessionDetector<C, T, D, P>
where
    C: EdgeCounter,
    T: TimeSource,
    D: DeferredTimer,
    P: Pacer,
{
    counter: C,
    clock: T,
    idle_timer: D,
    pacer: P,
    config: SessionConfig,
}

impl<C, T, D, P> SessionDetector<C, T, D, P>
where
    C: EdgeCounter,
    T: TimeSource,
    D: DeferredTimer,
    P: Pacer,
{
    /// Build a detector over its collaborators.
    ///
    /// Fails with `Resource` if the configuration is degenerate; the
    /// configuration is immutable from here on.
    pub fn new(
        counter: C,
        clock: T,
        idle_timer: D,
        pacer: P,
        config: SessionConfig,
    ) -> MeterResult<Self> {
        config.validate()?;
        log_info!(
            "session detector: startup={} pulses in {} ms, idle={} ms, glitch={} ns",
            config.startup_pulses,
            config.startup_window_ms,
            config.idle_timeout_ms,
            config.glitch_filter_ns,
        );
        Ok(Self { counter, clock, idle_timer, pacer, config })
    }

    /// The configuration the detector was built with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Measure one complete flow session.
    ///
    /// Blocks until flow begins, is confirmed, and ends again; returns
    /// the computed [`SessionResult`]. On `StartupTimeout` the caller
    /// simply calls again - a failed confirmation is an expected
    /// outcome, not a fault. Every non-success path stops the counter
    /// before returning, so the next call starts from a clean
    /// baseline. Not reentrant: a second caller must be serialized
    /// externally.
    pub fn measure_session(&mut self) -> MeterResult<SessionResult> {
        let outcome = self.run_session();
        if outcome.is_err() {
            // Leave the hardware in an IDLE-equivalent state no matter
            // which stage failed.
            let _ = self.counter.stop();
            let _ = self.idle_timer.cancel();
        }
        outcome
    }

    fn run_session(&mut self) -> MeterResult<SessionResult> {
        let config = self.config;

        // IDLE -> AWAITING_CONFIRMATION: drain both signals, zero the
        // counter, start counting, arm the watch point.
        let _ = self.counter.take_watch();
        self.idle_timer.cancel()?;
        let _ = self.idle_timer.take_fired();
        self.counter.clear()?;
        self.counter.arm_watch(config.startup_pulses)?;
        self.counter.start()?;

        let t_onset = self.await_confirmation()?;

        // AWAITING_CONFIRMATION -> ACTIVE: the idle countdown starts
        // now and restarts on every observed pulse.
        let t_end = self.track_until_idle()?;

        // ACTIVE -> COMPLETE: stop, take the final count, convert.
        self.counter.stop()?;
        self.idle_timer.cancel()?;
        let pulses = self.counter.read();

        let result = SessionResult::from_pulses(
            pulses,
            t_end.saturating_sub(t_onset),
            config.pulses_per_liter,
        )?;
        log_info!(
            "session measured: {} pulses, {} s, {} L/min, {} L",
            pulses,
            result.duration_seconds(),
            result.rate_lpm,
            result.volume_l,
        );
        Ok(result)
    }

    /// Wait for the onset signal, bounded by the startup window.
    ///
    /// Returns the session's t0 (the first pulse's timestamp). The
    /// signal is checked before the deadline, so a confirmation
    /// landing in the same poll slice as the deadline is accepted.
    fn await_confirmation(&mut self) -> MeterResult<Timestamp> {
        let window_us = self.config.startup_window_ms as u64 * US_PER_MS;
        let deadline = self.clock.now_us().saturating_add(window_us);

        loop {
            if let Some(t_onset) = self.counter.take_watch() {
                return Ok(t_onset);
            }
            if self.clock.now_us() >= deadline {
                let pulses = self.counter.read();
                self.counter.stop()?;
                log_warn!(
                    "startup window timeout ({} ms): only {} pulses",
                    self.config.startup_window_ms,
                    pulses,
                );
                return Err(MeterError::StartupTimeout {
                    pulses,
                    window_ms: self.config.startup_window_ms,
                });
            }
            self.pacer.pause();
        }
    }

    /// Poll the count until the idle gap elapses; returns the end
    /// timestamp.
    fn track_until_idle(&mut self) -> MeterResult<Timestamp> {
        let idle_us = self.config.idle_timeout_ms as u64 * US_PER_MS;

        self.idle_timer.arm(idle_us)?;
        let mut last_count = self.counter.read();
        let mut last_change_us = self.clock.now_us();

        loop {
            let count = self.counter.read();
            if count > last_count {
                // Flow is still running: full timeout from this pulse.
                last_count = count;
                last_change_us = self.clock.now_us();
                self.idle_timer.arm(idle_us)?;
            }

            if self.idle_timer.take_fired() {
                let now = self.clock.now_us();
                let gap = now.saturating_sub(last_change_us);
                if gap >= idle_us {
                    return Ok(now);
                }
                // The firing raced a restart; keep the countdown
                // honest by re-arming for the remainder.
                self.idle_timer.arm(idle_us - gap)?;
            }

            self.pacer.pause();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::SoftEdgeCounter;
    use crate::time::MockTime;
    use crate::timer::ManualTimer;

    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    /// Simulated poll interval: 1 ms, as on the device
    const POLL_US: u64 = 1_000;

    /// Build a detector over a scripted pulse schedule (microsecond
    /// timestamps). The pacer advances the mock clock, feeds due
    /// pulses into the probe, and delivers due timer firings.
    fn scripted_detector(
        config: SessionConfig,
        pulse_schedule_us: &[u64],
    ) -> SessionDetector<SoftEdgeCounter, MockTime, ManualTimer<MockTime>, FnPacer<impl FnMut()>>
    {
        let clock = MockTime::new(0);
        let counter = SoftEdgeCounter::new(config.glitch_filter_ns);
        let probe = counter.probe().unwrap();
        let timer = ManualTimer::new(clock.clone());

        let sim_clock = clock.clone();
        let sim_timer = timer.clone();
        let mut schedule: VecDeque<u64> = pulse_schedule_us.iter().copied().collect();
        let pacer = FnPacer(move || {
            sim_clock.advance_us(POLL_US);
            let now = sim_clock.now_us();
            while schedule.front().is_some_and(|&t| t <= now) {
                let t = schedule.pop_front().unwrap();
                probe.pulse(t);
            }
            sim_timer.fire_due();
        });

        SessionDetector::new(counter, clock, timer, pacer, config).unwrap()
    }

    #[test]
    fn reference_session() {
        // Worked example: threshold 3, window 2000 ms, idle
        // 1000 ms, 6.6 pulses/L; pulses at 0/100/200 ms, then silence.
        let config = SessionConfig::default();
        let mut detector = scripted_detector(config, &[0, 100_000, 200_000]);

        let result = detector.measure_session().unwrap();

        // End lands one idle window after the last pulse, within poll
        // granularity: duration ~1200 ms from the FIRST pulse.
        let duration_ms = result.duration_us / 1_000;
        assert!(
            (1_200..=1_205).contains(&duration_ms),
            "duration {} ms outside expected window",
            duration_ms
        );
        assert!((result.volume_l - 3.0 / config.pulses_per_liter).abs() < 1e-4);
        assert!((result.rate_lpm - 22.7).abs() < 0.2);
    }

    #[test]
    fn startup_timeout_reports_subthreshold_count() {
        // Worked example: threshold 5, window 500 ms, 2 pulses.
        let config = SessionConfig::default()
            .with_startup_pulses(5)
            .with_startup_window_ms(500);
        let mut detector = scripted_detector(config, &[100_000, 300_000]);

        assert_eq!(
            detector.measure_session().unwrap_err(),
            MeterError::StartupTimeout { pulses: 2, window_ms: 500 }
        );
    }

    #[test]
    fn idle_timer_restarts_on_each_pulse() {
        // Pulses keep arriving 700 ms apart - inside the 1000 ms idle
        // window - so the session must span all of them.
        let config = SessionConfig::default();
        let pulses: Vec<u64> = (0..6).map(|i| i * 700_000).collect(); // 0..3.5 s
        let mut detector = scripted_detector(config, &pulses);

        let result = detector.measure_session().unwrap();
        let duration_ms = result.duration_us / 1_000;
        // Last pulse at 3500 ms + 1000 ms idle window
        assert!(
            (4_500..=4_510).contains(&duration_ms),
            "duration {} ms outside expected window",
            duration_ms
        );
        assert!((result.volume_l - 6.0 / config.pulses_per_liter).abs() < 1e-4);
    }

    #[test]
    fn unchanged_count_never_restarts_the_countdown() {
        // One confirmed burst, then nothing: the session must end one
        // idle window after the burst even though polling continues.
        let config = SessionConfig::default().with_startup_pulses(2);
        let mut detector = scripted_detector(config, &[0, 50_000]);

        let result = detector.measure_session().unwrap();
        let duration_ms = result.duration_us / 1_000;
        assert!(
            (1_050..=1_055).contains(&duration_ms),
            "duration {} ms outside expected window",
            duration_ms
        );
    }

    #[test]
    fn degenerate_config_rejected_at_construction() {
        let clock = MockTime::new(0);
        let counter = SoftEdgeCounter::new(0);
        let timer = ManualTimer::new(clock.clone());
        let result = SessionDetector::new(
            counter,
            clock,
            timer,
            FnPacer(|| {}),
            SessionConfig::default().with_pulses_per_liter(-1.0),
        );
        assert!(matches!(result, Err(MeterError::Resource { .. })));
    }
}
