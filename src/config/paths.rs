//! Where settings and detector assets live on disk.
//!
//! ```text
//! <config_dir>/handpose-control/settings.toml
//! <data_local_dir>/handpose-control/detector/
//!     wasm/                    runtime files handed to the detector
//!     hand_landmarker.task     landmark model
//! ```
//!
//! `config_dir` and `data_local_dir` come from `dirs`; on platforms where
//! either is unknown the current directory is used instead.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "handpose-control";
const MODEL_FILE: &str = "hand_landmarker.task";

#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Root of the detector's runtime and model files.
    pub detector_dir: PathBuf,
    pub wasm_dir: PathBuf,
    pub model_file: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let config_root = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_root = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_roots(&config_root, &data_root)
    }

    /// Lay the tree out under explicit roots.
    pub fn with_roots(config_root: &Path, data_root: &Path) -> Self {
        let config_dir = config_root.join(APP_DIR);
        let detector_dir = data_root.join(APP_DIR).join("detector");
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            wasm_dir: detector_dir.join("wasm"),
            model_file: detector_dir.join(MODEL_FILE),
            detector_dir,
        }
    }

    /// `true` when the model file is present.  The runtime directory is not
    /// checked; detectors that need it report that on init.
    pub fn model_installed(&self) -> bool {
        self.model_file.is_file()
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
