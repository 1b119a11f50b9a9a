//! Hand geometry: landmark types, handedness resolution and feature
//! extraction.
//!
//! # Pipeline position
//!
//! ```text
//! detector output ──▶ RawLandmarkSet ──extract()──▶ HandPose ──▶ TemporalFilter
//!                       (21 × Vec2,                  (center, wrist,
//!                        handedness)                  pinch, open, fist)
//! ```

pub mod extract;
pub mod handedness;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use extract::{extract, pinch_from_distance};
pub use handedness::Category;
pub use types::{clamp01, Handedness, HandPose, HandsFrame, RawLandmarkSet, Vec2, LANDMARK_COUNT};
