//! Camera abstraction.
//!
//! [`CameraSource`] wraps whatever produces video frames (a webcam, a file,
//! a synthetic generator).  [`HandTracker`](crate::tracker::HandTracker)
//! opens it once on start, pulls the newest [`VideoFrame`] on each tick and
//! closes it on stop.
//!
//! A [`VideoFrame`] owns its pixel buffer.  Handing a frame to the
//! inference worker moves it; a frame that is not used is dropped, which
//! releases the buffer.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// VideoFrame
// ---------------------------------------------------------------------------

/// One decoded camera frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Presentation time of the frame on the video's own clock (ms).
    pub presentation_time_ms: f64,
    /// Packed RGBA pixels, `width * height * 4` bytes.  May be empty for
    /// sources that only carry timing.
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    /// A frame with no pixel payload.
    pub fn timing_only(width: u32, height: u32, presentation_time_ms: f64) -> Self {
        Self {
            width,
            height,
            presentation_time_ms,
            pixels: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CameraConstraints
// ---------------------------------------------------------------------------

/// Capture request derived from the active mode profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CameraConstraints {
    pub fn from_profile(profile: &crate::config::ModeProfile) -> Self {
        Self {
            width: profile.camera_width,
            height: profile.camera_height,
            fps: profile.camera_fps,
        }
    }
}

// ---------------------------------------------------------------------------
// CameraError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring or reconfiguring the camera.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device found")]
    NoDevice,

    #[error("camera stream failed: {0}")]
    Stream(String),
}

// ---------------------------------------------------------------------------
// CameraSource
// ---------------------------------------------------------------------------

/// A source of video frames.
#[async_trait]
pub trait CameraSource: Send {
    /// Acquire the device and start streaming.
    async fn open(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError>;

    /// Change resolution / rate on a live stream.
    fn apply_constraints(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError>;

    /// The newest frame, if one arrived since the last call.  Never blocks.
    fn grab_frame(&mut self) -> Option<VideoFrame>;

    /// Stop all tracks.  Idempotent.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// MockCamera  (test-only)
// ---------------------------------------------------------------------------

/// Scriptable camera for tests.
///
/// Each [`grab_frame`](CameraSource::grab_frame) yields a frame whose
/// presentation time is read from a shared clock, so tests can freeze or
/// advance the video independently of the tracker's clock.
#[cfg(test)]
pub struct MockCamera {
    pub fail_open: Option<CameraError>,
    pub video_time_ms: std::sync::Arc<std::sync::Mutex<f64>>,
    pub open: bool,
    pub constraints: Option<CameraConstraints>,
    pub closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl MockCamera {
    pub fn new() -> Self {
        Self {
            fail_open: None,
            video_time_ms: std::sync::Arc::new(std::sync::Mutex::new(0.0)),
            open: false,
            constraints: None,
            closed: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn failing(err: CameraError) -> Self {
        Self {
            fail_open: Some(err),
            ..Self::new()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CameraSource for MockCamera {
    async fn open(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
        if let Some(err) = self.fail_open.clone() {
            return Err(err);
        }
        self.open = true;
        self.constraints = Some(*constraints);
        Ok(())
    }

    fn apply_constraints(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
        self.constraints = Some(*constraints);
        Ok(())
    }

    fn grab_frame(&mut self) -> Option<VideoFrame> {
        if !self.open {
            return None;
        }
        let t = *self.video_time_ms.lock().unwrap();
        let c = self.constraints?;
        Some(VideoFrame::timing_only(c.width, c.height, t))
    }

    fn close(&mut self) {
        self.open = false;
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
