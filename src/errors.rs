// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner
//!
//! Errors are split by how far they propagate:
//!
//! - [`CaptureError`] and [`StillImageReadError`] are fatal to the call that
//!   produced them and are returned as a rejected result.
//! - [`DeviceControlError`] and [`DetectionServiceError`] are recoverable.
//!   The session keeps running and the failure is surfaced as an event.

use crate::backends::camera::types::{BackendError, LensPosition};
use std::fmt;
use std::path::PathBuf;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Top-level error surfaced by the facade
#[derive(Debug, Clone)]
pub enum ScanError {
    /// Session start/stop errors
    Capture(CaptureError),
    /// Torch or zoom control failures
    DeviceControl(DeviceControlError),
    /// A single detection call failed
    Detection(DetectionServiceError),
    /// One-shot image read failed
    StillImage(StillImageReadError),
    /// Configuration errors
    Config(ConfigError),
}

/// Errors that abort a `start` attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// No camera for the requested lens
    DeviceNotFound(LensPosition),
    /// Input or output could not be attached to the session
    SessionConfig(String),
    /// A later start or stop superseded this operation
    Cancelled,
    /// The controller's execution contexts have shut down
    ContextClosed,
}

/// Which device control a [`DeviceControlError`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceControl {
    Torch,
    Zoom,
}

impl fmt::Display for DeviceControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceControl::Torch => write!(f, "Torch"),
            DeviceControl::Zoom => write!(f, "Zoom"),
        }
    }
}

/// Device control failure (recoverable)
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceControlError {
    /// The device refused the configuration lock
    LockFailed {
        control: DeviceControl,
        reason: String,
    },
}

/// A detection call failed for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionServiceError(pub String);

/// Still-image read failures
#[derive(Debug, Clone, PartialEq)]
pub enum StillImageReadError {
    /// The path does not exist or is not a file
    NotFound(PathBuf),
    /// The file could not be decoded as an image
    Decode(String),
    /// The detection service failed on the decoded image
    Detection(DetectionServiceError),
}

/// Configuration load/save failures
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Reading or writing the file failed
    Io(String),
    /// The file is not valid configuration JSON
    Parse(String),
    /// No configuration directory is available on this system
    NoConfigDir,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Capture(e) => write!(f, "Camera error: {}", e),
            ScanError::DeviceControl(e) => write!(f, "{}", e),
            ScanError::Detection(e) => write!(f, "{}", e),
            ScanError::StillImage(e) => write!(f, "{}", e),
            ScanError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceNotFound(lens) => write!(f, "No {} camera device", lens),
            CaptureError::SessionConfig(msg) => write!(f, "Session configuration failed: {}", msg),
            CaptureError::Cancelled => write!(f, "Operation superseded"),
            CaptureError::ContextClosed => write!(f, "Capture session is shut down"),
        }
    }
}

impl fmt::Display for DeviceControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceControlError::LockFailed { control, reason } => {
                write!(f, "{} error: {}", control, reason)
            }
        }
    }
}

impl fmt::Display for DetectionServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Detection failed: {}", self.0)
    }
}

impl fmt::Display for StillImageReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StillImageReadError::NotFound(path) => {
                write!(f, "Image not found: {}", path.display())
            }
            StillImageReadError::Decode(msg) => write!(f, "Failed to decode image: {}", msg),
            StillImageReadError::Detection(e) => {
                write!(f, "Failed to read barcodes from image: {}", e)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Invalid config: {}", msg),
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
        }
    }
}

impl std::error::Error for ScanError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for DeviceControlError {}
impl std::error::Error for DetectionServiceError {}
impl std::error::Error for StillImageReadError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to ScanError
impl From<CaptureError> for ScanError {
    fn from(err: CaptureError) -> Self {
        ScanError::Capture(err)
    }
}

impl From<DeviceControlError> for ScanError {
    fn from(err: DeviceControlError) -> Self {
        ScanError::DeviceControl(err)
    }
}

impl From<DetectionServiceError> for ScanError {
    fn from(err: DetectionServiceError) -> Self {
        ScanError::Detection(err)
    }
}

impl From<StillImageReadError> for ScanError {
    fn from(err: StillImageReadError) -> Self {
        ScanError::StillImage(err)
    }
}

impl From<ConfigError> for ScanError {
    fn from(err: ConfigError) -> Self {
        ScanError::Config(err)
    }
}

// Backend failures while building the session graph abort the start
impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        CaptureError::SessionConfig(err.to_string())
    }
}

impl From<DetectionServiceError> for StillImageReadError {
    fn from(err: DetectionServiceError) -> Self {
        StillImageReadError::Detection(err)
    }
}

impl From<image::ImageError> for StillImageReadError {
    fn from(err: image::ImageError) -> Self {
        StillImageReadError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_maps_to_session_config() {
        let err: CaptureError = BackendError::InputRejected("busy".to_string()).into();
        assert!(matches!(err, CaptureError::SessionConfig(_)));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CaptureError::DeviceNotFound(LensPosition::Front).to_string(),
            "No front camera device"
        );
        let err = DeviceControlError::LockFailed {
            control: DeviceControl::Torch,
            reason: "locked".to_string(),
        };
        assert_eq!(err.to_string(), "Torch error: locked");
    }
}
