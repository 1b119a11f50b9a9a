//! Hand-landmark inference backends.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     InferenceRouter                        │
//! │                                                            │
//! │   ┌──────────────────┐  error   ┌───────────────────────┐  │
//! │   │  WorkerBackend   │ ───────▶ │  MainThreadBackend    │  │
//! │   │  hand-worker     │ (latched)│  detect() inline      │  │
//! │   │  one in flight   │          │                       │  │
//! │   └────────┬─────────┘          └───────────┬───────────┘  │
//! │            │ WorkerRequest / WorkerReply    │              │
//! │            ▼                                ▼              │
//! │      Box<dyn HandDetector>          Box<dyn HandDetector>  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each backend owns its own detector built from a shared
//! [`DetectorFactory`].  Nothing is shared between the two threads apart
//! from the messages.

pub mod detector;
pub mod main_thread;
pub mod protocol;
pub mod router;
pub mod worker;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use detector::{
    Completion, DetectionResult, DetectorError, DetectorFactory, DetectorOptions, HandDetector,
};
pub use main_thread::MainThreadBackend;
pub use protocol::{WorkerReply, WorkerRequest, WorkerResult};
pub use router::{BackendError, BackendKind, InferenceRouter, Routed};
pub use worker::{Dispatch, WorkerBackend, WorkerEvent, WorkerStatus};

#[cfg(test)]
pub use detector::{MockControl, MockDetector};
