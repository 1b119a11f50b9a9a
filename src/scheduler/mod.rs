//! Inference pacing.
//!
//! ```text
//! video frame ─▶ AdaptiveScheduler::should_infer ─yes─▶ backend
//!                     ▲                                    │
//!                     └──── record_latency(infer_ms) ◀─────┘
//! ```

pub mod adaptive;

pub use adaptive::AdaptiveScheduler;
