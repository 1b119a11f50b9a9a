//! Tracker lifecycle and diagnostics.
//!
//! [`TrackerState`] is the session state machine; [`TrackerStats`] is a
//! snapshot a caller can log or display.  [`RestartStatus`] is what a
//! [`RestartHandle`](super::RestartHandle) eventually resolves to.

use serde::Serialize;

use crate::inference::BackendKind;

// ---------------------------------------------------------------------------
// TrackerState
// ---------------------------------------------------------------------------

/// Session lifecycle.
///
/// ```text
/// Stopped ──start()──▶ Starting ──camera + backend up──▶ Running
///                         │                                 │
///                         └──error──▶ Stopped ◀──stop()─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerState {
    #[default]
    Stopped,
    /// Camera and detector are being acquired.
    Starting,
    /// Frames are flowing.
    Running,
}

impl TrackerState {
    /// ```
    /// use handpose_control::tracker::TrackerState;
    ///
    /// assert!(TrackerState::Running.is_running());
    /// assert!(!TrackerState::Starting.is_running());
    /// ```
    pub fn is_running(&self) -> bool {
        matches!(self, TrackerState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackerState::Stopped => "Stopped",
            TrackerState::Starting => "Starting",
            TrackerState::Running => "Running",
        }
    }
}

// ---------------------------------------------------------------------------
// RestartStatus
// ---------------------------------------------------------------------------

/// Progress of a detector restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RestartStatus {
    /// Backends are still coming up.
    Pending,
    /// A backend is ready again.
    Completed,
    /// Every backend failed to come up.  Tracking continues without
    /// inference.
    Failed,
    /// The tracker stopped before the restart settled.
    Abandoned,
}

impl RestartStatus {
    pub fn is_done(&self) -> bool {
        !matches!(self, RestartStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// TrackerStats
// ---------------------------------------------------------------------------

/// Point-in-time diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub state: TrackerState,
    pub backend: BackendKind,
    pub safe_mode: bool,
    pub infer_enabled: bool,
    /// EMA of inference latency (ms).
    pub infer_ms_ema: f64,
    /// Live scheduling interval (ms).
    pub interval_ms: f64,
    /// Inferences that completed and were filtered.
    pub frames_inferred: u64,
    /// Frames released because the worker was busy.
    pub frames_dropped: u64,
    /// Times cached hands were discarded as stale.
    pub stale_clears: u64,
    /// Message of the failure that disabled the worker, if any.
    pub last_worker_error: Option<String>,
    /// Inference is inside a restart pause window.
    pub paused: bool,
    /// Hands in the current cache.
    pub hands: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
