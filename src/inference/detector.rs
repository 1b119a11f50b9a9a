//! The landmark-detection capability the backends drive.
//!
//! The model itself is external.  Anything that can turn a
//! [`VideoFrame`] into per-hand landmark lists implements [`HandDetector`];
//! the backends only ever talk to it through this trait.  Each backend owns
//! its own detector instance, created through a [`DetectorFactory`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::VideoFrame;
use crate::pose::{handedness, Category, RawLandmarkSet, Vec2};

// ---------------------------------------------------------------------------
// DetectorError
// ---------------------------------------------------------------------------

/// Errors reported by a [`HandDetector`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectorError {
    /// Runtime or model could not be loaded.
    #[error("detector initialisation failed: {0}")]
    Init(String),

    /// A single detection pass failed.
    #[error("detection failed: {0}")]
    Inference(String),

    /// `detect` was called before a successful `init`.
    #[error("detector not initialised")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// DetectorOptions
// ---------------------------------------------------------------------------

/// Everything a detector needs to (re)initialise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorOptions {
    pub wasm_url: String,
    pub model_url: String,
    pub max_hands: usize,
}

impl DetectorOptions {
    pub fn from_config(config: &crate::config::TrackerConfig) -> Self {
        Self {
            wasm_url: config.detector.wasm_url.clone(),
            model_url: config.detector.model_url.clone(),
            max_hands: config.effective_max_hands(),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectionResult
// ---------------------------------------------------------------------------

/// Raw detector output for one frame.
///
/// This is also the `result` payload of the worker protocol, so field names
/// follow the detector's JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// One landmark list per detected hand.
    pub landmarks: Vec<Vec<Vec2>>,
    /// Per-hand classification lists, parallel to `landmarks`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handednesses: Option<Vec<Vec<Category>>>,
}

impl DetectionResult {
    /// Convert to [`RawLandmarkSet`]s in detector order.
    ///
    /// Hands whose landmark list is not exactly 21 points long are skipped.
    pub fn hands(&self) -> impl Iterator<Item = RawLandmarkSet> + '_ {
        let labels = self.handednesses.as_deref();
        self.landmarks.iter().enumerate().filter_map(move |(i, pts)| {
            let (label, score) = handedness::resolve(labels, i);
            let raw = RawLandmarkSet::from_points(pts, label, score);
            if raw.is_none() {
                log::debug!("detector: skipping hand {i} with {} landmarks", pts.len());
            }
            raw
        })
    }
}

/// One finished detection pass, whichever backend ran it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Timestamp the frame was submitted with.
    pub timestamp_ms: f64,
    /// Wall time spent inside the detector.
    pub infer_ms: f64,
    /// `None` when the detector produced nothing or the pass failed.
    pub result: Option<DetectionResult>,
}

// ---------------------------------------------------------------------------
// HandDetector
// ---------------------------------------------------------------------------

/// A hand-landmark detector instance.
///
/// Implementations are moved onto the worker thread, hence `Send`.
pub trait HandDetector: Send {
    /// Load the runtime and model.  May be slow.
    fn init(&mut self, options: &DetectorOptions) -> Result<(), DetectorError>;

    /// Apply new options to an initialised detector.  The default
    /// re-runs [`init`](Self::init).
    fn configure(&mut self, options: &DetectorOptions) -> Result<(), DetectorError> {
        self.init(options)
    }

    /// Detect hands in `frame`.  `Ok(None)` means the detector produced no
    /// result for this frame.
    fn detect(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: f64,
    ) -> Result<Option<DetectionResult>, DetectorError>;

    /// Release the model.
    fn close(&mut self) {}
}

// Compile-time assertion: Box<dyn HandDetector> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn HandDetector>) {}
};

/// Builds fresh detector instances.  Called once per backend and again on
/// every restart.
pub type DetectorFactory = Arc<dyn Fn() -> Box<dyn HandDetector> + Send + Sync>;

// ---------------------------------------------------------------------------
// MockDetector  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockControl, MockDetector};

#[cfg(test)]
mod mock {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Shared knobs and counters for every [`MockDetector`] a factory builds.
    #[derive(Default)]
    pub struct MockControl {
        pub fail_init: bool,
        pub fail_detect: bool,
        pub result: Option<DetectionResult>,
        pub delay: Option<Duration>,
        pub init_delay: Option<Duration>,
        pub inits: usize,
        pub detects: usize,
        pub closes: usize,
        pub last_options: Option<DetectorOptions>,
        pub timestamps: Vec<f64>,
    }

    /// Detector double driven by a shared [`MockControl`].
    pub struct MockDetector {
        control: Arc<Mutex<MockControl>>,
        ready: bool,
    }

    impl MockDetector {
        /// A factory whose detectors all share `control`.
        pub fn factory(control: Arc<Mutex<MockControl>>) -> DetectorFactory {
            Arc::new(move || Self::boxed(Arc::clone(&control)))
        }

        pub fn boxed(control: Arc<Mutex<MockControl>>) -> Box<dyn HandDetector> {
            Box::new(MockDetector {
                control,
                ready: false,
            })
        }

        pub fn control() -> Arc<Mutex<MockControl>> {
            Arc::new(Mutex::new(MockControl::default()))
        }

        /// Detector output reporting `hands` in order, labelled by their
        /// handedness.
        pub fn result_with(hands: &[RawLandmarkSet]) -> DetectionResult {
            DetectionResult {
                landmarks: hands.iter().map(|h| h.landmarks.to_vec()).collect(),
                handednesses: Some(
                    hands
                        .iter()
                        .map(|h| vec![Category::named(h.handedness.as_str(), h.score)])
                        .collect(),
                ),
            }
        }
    }

    impl HandDetector for MockDetector {
        fn init(&mut self, options: &DetectorOptions) -> Result<(), DetectorError> {
            let init_delay = self.control.lock().unwrap().init_delay;
            if let Some(d) = init_delay {
                std::thread::sleep(d);
            }
            let mut c = self.control.lock().unwrap();
            c.inits += 1;
            c.last_options = Some(options.clone());
            if c.fail_init {
                return Err(DetectorError::Init("mock init failure".into()));
            }
            self.ready = true;
            Ok(())
        }

        fn detect(
            &mut self,
            _frame: &VideoFrame,
            timestamp_ms: f64,
        ) -> Result<Option<DetectionResult>, DetectorError> {
            if !self.ready {
                return Err(DetectorError::NotInitialised);
            }
            let (delay, outcome) = {
                let mut c = self.control.lock().unwrap();
                c.detects += 1;
                c.timestamps.push(timestamp_ms);
                let outcome = if c.fail_detect {
                    Err(DetectorError::Inference("mock detect failure".into()))
                } else {
                    Ok(c.result.clone())
                };
                (c.delay, outcome)
            };
            if let Some(d) = delay {
                std::thread::sleep(d);
            }
            outcome
        }

        fn close(&mut self) {
            self.control.lock().unwrap().closes += 1;
            self.ready = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
