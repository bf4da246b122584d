//! Shared simulation rig for detector integration tests
//!
//! Runs the detector against a scripted pulse schedule: the pacer
//! advances a mock clock in 1 ms poll steps, feeds due pulses into the
//! counter probe with their scheduled timestamps, and delivers due
//! idle-timer firings. Time is fully deterministic; wall-clock plays
//! no part.

#![allow(dead_code)]

use std::collections::VecDeque;

use flowgauge_core::{
    config::SessionConfig,
    counter::SoftEdgeCounter,
    detector::{FnPacer, SessionDetector},
    time::{MockTime, TimeSource},
    timer::ManualTimer,
};

/// Simulated poll interval, matching the device's ~1 ms yield
pub const POLL_US: u64 = 1_000;

/// Detector wired to the simulation rig
pub type SimDetector = SessionDetector<
    SoftEdgeCounter,
    MockTime,
    ManualTimer<MockTime>,
    FnPacer<Box<dyn FnMut()>>,
>;

/// Build a detector over a scripted pulse schedule (microsecond
/// timestamps, ascending). The schedule persists across
/// `measure_session` calls, so multi-session scripts work naturally.
pub fn scripted_detector(config: SessionConfig, schedule_us: Vec<u64>) -> SimDetector {
    let clock = MockTime::new(0);
    let counter = SoftEdgeCounter::new(config.glitch_filter_ns);
    let probe = counter.probe().expect("fresh counter probe");
    let timer = ManualTimer::new(clock.clone());

    let sim_clock = clock.clone();
    let sim_timer = timer.clone();
    let mut schedule: VecDeque<u64> = schedule_us.into_iter().collect();
    let pacer: Box<dyn FnMut()> = Box::new(move || {
        sim_clock.advance_us(POLL_US);
        let now = sim_clock.now_us();
        while schedule.front().is_some_and(|&t| t <= now) {
            let t = schedule.pop_front().unwrap();
            probe.pulse(t);
        }
        sim_timer.fire_due();
    });

    SessionDetector::new(counter, clock, timer, FnPacer(pacer), config)
        .expect("valid test configuration")
}

/// Milliseconds, rounded down, for tolerance-window assertions
pub fn duration_ms(duration_us: u64) -> u64 {
    duration_us / 1_000
}
