// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::LensPosition;
use crate::constants::ResolutionTier;
use crate::constants::detector::DEFAULT_MAX_DIMENSION;
use crate::constants::scan_line::DEFAULT_REDRAW_FPS;
use crate::constants::throttle::{DEFAULT_FRAME_QUEUE_DEPTH, DEFAULT_MAX_DETECTIONS_PER_SECOND};
use crate::errors::ConfigError;
use crate::frame_processor::Symbology;
use crate::overlay::ScanLineStyle;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name under the platform config dir
const APP_DIR: &str = "qrscan";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lens used when the host does not ask for one
    pub default_lens: LensPosition,
    /// Resolution tier used when the host does not ask for one
    pub default_resolution: ResolutionTier,
    /// Upper bound on detection calls per second
    pub max_detections_per_second: f64,
    /// Frames buffered between the camera and the frame context
    pub frame_queue_depth: usize,
    /// Overlay redraw rate while animating
    pub redraw_fps: u32,
    /// Frames are downscaled to this size before QR detection
    pub detector_max_dimension: u32,
    /// Symbologies reported to the host (empty = all)
    pub symbologies: Vec<Symbology>,
    /// Scan line appearance
    pub scan_line: ScanLineStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_lens: LensPosition::Back,
            default_resolution: ResolutionTier::Medium,
            max_detections_per_second: DEFAULT_MAX_DETECTIONS_PER_SECOND,
            frame_queue_depth: DEFAULT_FRAME_QUEUE_DEPTH,
            redraw_fps: DEFAULT_REDRAW_FPS,
            detector_max_dimension: DEFAULT_MAX_DIMENSION,
            symbologies: Vec::new(),
            scan_line: ScanLineStyle::default(),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults
    ///
    /// A missing file is normal on first run; any other failure is logged.
    pub fn load() -> Self {
        let path = match Self::path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Using default configuration");
                return Self::default();
            }
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }
}
