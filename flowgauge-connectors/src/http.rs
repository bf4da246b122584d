//! HTTP report connector
//!
//! Posts one JSON document per completed session to a configured
//! endpoint. The image, when present, travels base64-encoded inside
//! the same document - session reports are rare (one per pour) and
//! small enough that a multipart upload is not worth its complexity.
//!
//! There is deliberately no retry or buffering here; see the crate
//! docs on failure policy.

use flowgauge_core::result::SessionResult;

use base64::Engine as _;
use serde::Serialize;

use crate::{MeasurementSink, ReportError};

/// Sink POSTing session reports as JSON
pub struct HttpSink {
    agent: ureq::Agent,
    endpoint: String,
    device_id: String,
}

impl HttpSink {
    /// Report to `endpoint`, tagging every document with `device_id`
    pub fn new(endpoint: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new(),
            endpoint: endpoint.into(),
            device_id: device_id.into(),
        }
    }
}

impl MeasurementSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn submit(&mut self, session: &SessionResult) -> Result<(), ReportError> {
        let payload = ReportPayload::from_session(&self.device_id, session);
        let body =
            serde_json::to_string(&payload).map_err(|e| ReportError::Serialize(e.to_string()))?;

        match self
            .agent
            .post(&self.endpoint)
            .set("content-type", "application/json")
            .send_string(&body)
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(ReportError::Rejected(code)),
            Err(e) => Err(ReportError::Transport(e.to_string())),
        }
    }
}

/// Wire format of one session report
#[derive(Debug, Serialize)]
struct ReportPayload<'a> {
    device_id: &'a str,
    duration_us: u64,
    rate_lpm: f32,
    volume_l: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImagePayload>,
}

#[derive(Debug, Serialize)]
struct ImagePayload {
    width: u16,
    height: u16,
    format: &'static str,
    data_b64: String,
}

impl<'a> ReportPayload<'a> {
    fn from_session(device_id: &'a str, session: &SessionResult) -> Self {
        let image = session.image.as_ref().map(|frame| ImagePayload {
            width: frame.width,
            height: frame.height,
            format: frame.format.name(),
            data_b64: base64::engine::general_purpose::STANDARD.encode(&frame.data),
        });
        Self {
            device_id,
            duration_us: session.duration_us,
            rate_lpm: session.rate_lpm,
            volume_l: session.volume_l,
            image,
        }
    }
}
