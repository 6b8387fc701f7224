use chrono::Utc;
use pill_watch_common::config::CameraConfig;
use pill_watch_common::frame::{FrameError, GrayFrame};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can hand the detector one grayscale frame on demand.
///
/// `None` means "no data this tick": the capture failed and the failure has
/// already been reported. Callers store it as an empty buffer slot.
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    async fn capture_frame(&mut self) -> Option<GrayFrame>;
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("HTTP request failed: {0}")]
    HttpRequest(reqwest::Error),
    #[error("HTTP body error: {0}")]
    HttpBody(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Networked camera exposing a single-still JPEG endpoint.
pub struct HttpCamera {
    client: reqwest::Client,
    url: String,
    next_seq: u64,
}

impl HttpCamera {
    pub fn new(config: &CameraConfig) -> Result<Self, CaptureError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(CaptureError::Client)?;
        Ok(Self {
            client,
            url: config.capture_url(),
            next_seq: 0,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode one still, surfacing the failure reason.
    pub async fn try_capture(&mut self) -> Result<GrayFrame, CaptureError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::HttpRequest)?;
        if !resp.status().is_success() {
            return Err(CaptureError::HttpStatus(resp.status().as_u16()));
        }
        let jpeg_data = resp.bytes().await.map_err(CaptureError::HttpBody)?;
        let now_ms = Utc::now().timestamp_millis();
        let frame = GrayFrame::decode(&jpeg_data, now_ms, seq)?;

        let (width, height) = frame.dimensions();
        debug!(seq, bytes = jpeg_data.len(), width, height, "captured frame");
        Ok(frame)
    }
}

impl FrameSource for HttpCamera {
    async fn capture_frame(&mut self) -> Option<GrayFrame> {
        match self.try_capture().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, url = self.url, "failed to capture camera frame");
                None
            }
        }
    }
}
