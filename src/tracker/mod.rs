//! Hand tracking session.
//!
//! ```text
//! CameraSource ─▶ AdaptiveScheduler ─▶ InferenceRouter ─▶ extract ─▶ TemporalFilter
//!                                                                       │
//!                                   HandTracker::update(t, dt) ◀── HandsFrame
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use handpose_control::config::TrackerConfig;
//! use handpose_control::inference::DetectorFactory;
//! use handpose_control::camera::CameraSource;
//! use handpose_control::tracker::HandTracker;
//!
//! # async fn example(factory: DetectorFactory, camera: Box<dyn CameraSource>) {
//! let mut tracker = HandTracker::new(TrackerConfig::default(), factory);
//! tracker.start(camera).await.expect("camera permission");
//!
//! let hands = tracker.update(0.016, 0.016);
//! println!("{} hand(s)", hands.count);
//! tracker.stop();
//! # }
//! ```

pub mod session;
pub mod state;

pub use session::{HandTracker, RestartHandle, TrackerError};
pub use state::{RestartStatus, TrackerState, TrackerStats};
