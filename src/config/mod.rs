//! Configuration module.
//!
//! Provides `TrackerConfig` (top-level settings), the detector and scheduler
//! sub-configs, `AppPaths` for cross-platform directories, and TOML
//! persistence via `TrackerConfig::load` / `TrackerConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{DetectorConfig, ModeProfile, SchedulerConfig, TrackerConfig};
