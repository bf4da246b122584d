//! Report Connectors for Completed Flow Sessions
//!
//! ## Overview
//!
//! The measurement engine hands over exactly one [`SessionResult`] per
//! completed session; everything downstream of that hand-over lives
//! here. A [`SessionReporter`] optionally attaches a camera frame to
//! the result and fans it out to any number of [`MeasurementSink`]s -
//! a structured-log sink ships with the crate, an HTTP sink behind the
//! `http` feature.
//!
//! ## Failure policy
//!
//! A sink failure must never lose a measurement or stall the metering
//! loop: failures are logged and counted, and the remaining sinks
//! still get the result. Likewise a failed image capture ships the
//! result without a picture. There is no retry logic here by design -
//! a deployment that wants redelivery puts a queueing sink in front of
//! its transport.
//!
//! ## The metering loop
//!
//! [`run_metering_loop`] is the device's main loop: measure a session,
//! report it, measure the next. A startup timeout is the normal "no
//! one is pouring" outcome and simply retries; a degenerate session is
//! logged loudly and retried; anything else aborts the loop.

use flowgauge_core::{
    capture::ImageSource,
    counter::EdgeCounter,
    detector::{Pacer, SessionDetector},
    errors::MeterError,
    result::SessionResult,
    time::TimeSource,
    timer::DeferredTimer,
};

use thiserror::Error;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpSink;

/// Errors raised by report sinks
#[derive(Debug, Error)]
pub enum ReportError {
    /// The transport could not deliver the report
    #[error("transport failure: {0}")]
    Transport(String),

    /// The receiving end refused the report
    #[error("server rejected report: HTTP {0}")]
    Rejected(u16),

    /// The report could not be encoded
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// The sink was built with unusable parameters
    #[error("configuration error: {0}")]
    Config(String),
}

/// Consumer of completed session results
///
/// Sinks take the result by reference and must not block longer than
/// their transport requires; the same result may be handed to several
/// sinks in sequence.
pub trait MeasurementSink {
    /// Short name for log lines
    fn name(&self) -> &'static str;

    /// Deliver one completed session
    fn submit(&mut self, session: &SessionResult) -> Result<(), ReportError>;
}

/// Sink writing the measured values to the log
///
/// Stands in for the device's local display: one line per session
/// with duration, rate and volume.
#[derive(Debug, Default)]
pub struct LogSink;

impl MeasurementSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn submit(&mut self, session: &SessionResult) -> Result<(), ReportError> {
        log::info!(
            "session: {:.2} s, {:.2} L/min, {:.3} L{}",
            session.duration_seconds(),
            session.rate_lpm,
            session.volume_l,
            if session.image.is_some() { ", image attached" } else { "" },
        );
        Ok(())
    }
}

/// Fans completed sessions out to the configured sinks
pub struct SessionReporter {
    sinks: Vec<Box<dyn MeasurementSink>>,
    failures: u64,
}

impl SessionReporter {
    /// Reporter with no sinks; results are still measured, just unseen
    pub fn new() -> Self {
        Self { sinks: Vec::new(), failures: 0 }
    }

    /// Append a sink to the fan-out
    pub fn with_sink(mut self, sink: Box<dyn MeasurementSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Total sink submissions that have failed so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Attach a frame (when a camera is present and delivers one) and
    /// hand the result to every sink.
    ///
    /// Capture and sink failures are logged and counted, never
    /// propagated - the measurement must survive a flaky reporter.
    pub fn report(&mut self, session: &mut SessionResult, camera: Option<&mut (dyn ImageSource + '_)>) {
        if let Some(camera) = camera {
            match camera.capture() {
                Ok(frame) => session.attach_image(frame),
                Err(e) => log::warn!("image capture failed: {e}"),
            }
        }

        for sink in &mut self.sinks {
            if let Err(e) = sink.submit(session) {
                self.failures += 1;
                log::warn!("sink `{}` failed: {e}", sink.name());
            }
        }
    }
}

impl Default for SessionReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Measure and report sessions until `max_sessions` have completed.
///
/// Startup timeouts retry silently (nobody is pouring yet), degenerate
/// sessions are logged and retried, and any other error aborts the
/// loop. Returns the number of sessions reported.
pub fn run_metering_loop<C, T, D, P>(
    detector: &mut SessionDetector<C, T, D, P>,
    reporter: &mut SessionReporter,
    mut camera: Option<&mut dyn ImageSource>,
    max_sessions: usize,
) -> Result<usize, MeterError>
where
    C: EdgeCounter,
    T: TimeSource,
    D: DeferredTimer,
    P: Pacer,
{
    let mut reported = 0;
    while reported < max_sessions {
        match detector.measure_session() {
            Ok(mut session) => {
                reporter.report(&mut session, camera.as_deref_mut());
                reported += 1;
            }
            Err(MeterError::StartupTimeout { .. }) => continue,
            Err(e @ MeterError::DegenerateSession { .. }) => {
                log::error!("unexpected measurement fault, retrying: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(reported)
}

#[cfg(test)]
mod tests {
    use super::*;

    use flowgauge_core::capture::{ImageBuffer, PixelFormat};

    use std::cell::RefCell;
    use std::rc::Rc;

    pub(crate) fn sample_session() -> SessionResult {
        SessionResult::from_pulses(3, 1_200_000, 6.6).unwrap()
    }

    pub(crate) fn sample_frame() -> ImageBuffer {
        ImageBuffer {
            data: vec![0xA5; 32],
            width: 8,
            height: 4,
            format: PixelFormat::Grayscale,
        }
    }

    struct RecordingSink {
        seen: Rc<RefCell<Vec<SessionResult>>>,
    }

    impl MeasurementSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn submit(&mut self, session: &SessionResult) -> Result<(), ReportError> {
            self.seen.borrow_mut().push(session.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl MeasurementSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn submit(&mut self, _session: &SessionResult) -> Result<(), ReportError> {
            Err(ReportError::Transport("cable unplugged".into()))
        }
    }

    struct StubCamera;

    impl ImageSource for StubCamera {
        fn capture(&mut self) -> flowgauge_core::MeterResult<ImageBuffer> {
            Ok(sample_frame())
        }
    }

    struct DeadCamera;

    impl ImageSource for DeadCamera {
        fn capture(&mut self) -> flowgauge_core::MeterResult<ImageBuffer> {
            Err(flowgauge_core::MeterError::Resource { reason: "camera offline" })
        }
    }

    #[test]
    fn fan_out_survives_a_failing_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reporter = SessionReporter::new()
            .with_sink(Box::new(FailingSink))
            .with_sink(Box::new(RecordingSink { seen: Rc::clone(&seen) }));

        let mut session = sample_session();
        reporter.report(&mut session, None);

        assert_eq!(reporter.failures(), 1);
        assert_eq!(seen.borrow().len(), 1, "later sinks must still run");
    }

    #[test]
    fn camera_frame_is_attached_before_sinks_run() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reporter =
            SessionReporter::new().with_sink(Box::new(RecordingSink { seen: Rc::clone(&seen) }));

        let mut camera = StubCamera;
        let mut session = sample_session();
        reporter.report(&mut session, Some(&mut camera));

        assert!(seen.borrow()[0].image.is_some());
    }

    #[test]
    fn capture_failure_ships_result_without_image() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reporter =
            SessionReporter::new().with_sink(Box::new(RecordingSink { seen: Rc::clone(&seen) }));

        let mut camera = DeadCamera;
        let mut session = sample_session();
        reporter.report(&mut session, Some(&mut camera));

        assert_eq!(reporter.failures(), 0, "capture failure is not a sink failure");
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].image.is_none());
    }
}
