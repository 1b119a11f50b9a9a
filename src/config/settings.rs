//! Tracker settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//!
//! Only `max_hands`, `mirror_x` and `safe_mode` are runtime options of the
//! tracker.  The `detector` and `scheduler` sections locate the model assets
//! and hold the tuning constants for the two operating profiles.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// DetectorConfig
// ---------------------------------------------------------------------------

/// Location of the landmark-detection runtime and model, and how to host it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Master switch.  When `false` the tracker never schedules inference
    /// and reports empty frames.
    pub enabled: bool,
    /// Run detection on the dedicated worker thread when possible.  When
    /// `false` (or after a worker failure) detection runs on the caller's
    /// thread.
    pub prefer_worker: bool,
    /// Location of the detector runtime files, passed verbatim to
    /// [`HandDetector::init`](crate::inference::HandDetector::init).
    pub wasm_url: String,
    /// Location of the hand-landmark model file.
    pub model_url: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let paths = AppPaths::new();
        Self {
            enabled: true,
            prefer_worker: true,
            wasm_url: paths.wasm_dir.display().to_string(),
            model_url: paths.model_file.display().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ModeProfile
// ---------------------------------------------------------------------------

/// Scheduling and capture constants for one operating mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeProfile {
    /// Upper bound on inference rate.  `1000 / target_fps` is the minimum
    /// interval between two inferences.
    pub target_fps: f64,
    /// Per-inference latency the scheduler tries to stay under (ms).
    pub budget_ms: f64,
    /// Multiplier applied to the latency EMA to derive the desired interval.
    pub interval_mul: f64,
    /// Longest interval the scheduler will back off to (ms).
    pub max_interval_ms: f64,
    /// Cached hands are discarded when no inference completed for this long
    /// while the video kept advancing (ms).
    pub stale_ms: f64,
    /// Requested camera width in pixels.
    pub camera_width: u32,
    /// Requested camera height in pixels.
    pub camera_height: u32,
    /// Camera frame-rate request.
    pub camera_fps: u32,
    /// Hand-count cap for the detector in this mode.  `None` uses the
    /// top-level `max_hands`.
    pub max_hands: Option<usize>,
    /// Publish all 21 smoothed landmarks per hand.
    pub emit_landmarks: bool,
}

impl ModeProfile {
    /// Profile used while safe mode is off.
    pub fn normal() -> Self {
        Self {
            target_fps: 30.0,
            budget_ms: 22.0,
            interval_mul: 1.15,
            max_interval_ms: 100.0,
            stale_ms: 500.0,
            camera_width: 640,
            camera_height: 480,
            camera_fps: 30,
            max_hands: None,
            emit_landmarks: true,
        }
    }

    /// Reduced-power profile: lower resolution and rate, wider back-off,
    /// single hand, no landmark output.
    pub fn reduced() -> Self {
        Self {
            target_fps: 20.0,
            budget_ms: 30.0,
            interval_mul: 1.5,
            max_interval_ms: 160.0,
            stale_ms: 750.0,
            camera_width: 480,
            camera_height: 360,
            camera_fps: 24,
            max_hands: Some(1),
            emit_landmarks: false,
        }
    }

    /// Minimum spacing between two inferences in milliseconds.
    pub fn min_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1.0)
    }
}

impl Default for ModeProfile {
    fn default() -> Self {
        Self::normal()
    }
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

/// Adaptive scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Smoothing factor of the inference-latency EMA.
    pub ema_alpha: f64,
    /// How long inference stays suppressed after a forced detector
    /// restart (ms).
    pub restart_pause_ms: f64,
    /// Profile while safe mode is off.
    pub normal: ModeProfile,
    /// Profile while safe mode is on.
    pub reduced: ModeProfile,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.12,
            restart_pause_ms: 4_000.0,
            normal: ModeProfile::normal(),
            reduced: ModeProfile::reduced(),
        }
    }
}

impl SchedulerConfig {
    /// Profile for the given safe-mode flag.
    pub fn profile(&self, safe_mode: bool) -> &ModeProfile {
        if safe_mode {
            &self.reduced
        } else {
            &self.normal
        }
    }
}

// ---------------------------------------------------------------------------
// TrackerConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use handpose_control::config::TrackerConfig;
///
/// // Load (returns Default when file is missing)
/// let config = TrackerConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of hands the detector reports per frame.
    pub max_hands: usize,
    /// Flip every landmark's x coordinate (`1 - x`) so interaction feels
    /// like a mirror.
    pub mirror_x: bool,
    /// Start in the reduced-power profile.
    pub safe_mode: bool,
    /// Detector asset locations and hosting.
    pub detector: DetectorConfig,
    /// Scheduler tuning.
    pub scheduler: SchedulerConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_hands: 2,
            mirror_x: true,
            safe_mode: false,
            detector: DetectorConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(TrackerConfig::default())` when the file does not exist
    /// yet so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Active profile for the current `safe_mode` flag.
    pub fn profile(&self) -> &ModeProfile {
        self.scheduler.profile(self.safe_mode)
    }

    /// Hand count the detector should be configured with right now.
    pub fn effective_max_hands(&self) -> usize {
        let cap = self.profile().max_hands.unwrap_or(self.max_hands);
        cap.min(self.max_hands).max(1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
