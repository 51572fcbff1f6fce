// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture resolution tiers requested by the host
///
/// The host passes a plain integer (0..=3). Anything outside that range
/// falls back to [`ResolutionTier::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// 640x480
    Low,
    /// 1280x720 (default)
    #[default]
    Medium,
    /// 1920x1080
    High,
    /// 3840x2160, falls back to High when the session cannot do 4K
    UltraHigh,
}

impl ResolutionTier {
    /// All tiers, lowest first
    pub const ALL: [ResolutionTier; 4] = [
        ResolutionTier::Low,
        ResolutionTier::Medium,
        ResolutionTier::High,
        ResolutionTier::UltraHigh,
    ];

    /// Map the host's integer tier to a tier
    pub fn from_index(index: i32) -> Self {
        match index {
            0 => ResolutionTier::Low,
            2 => ResolutionTier::High,
            3 => ResolutionTier::UltraHigh,
            _ => ResolutionTier::Medium,
        }
    }

    /// Integer tier as the host sees it
    pub fn index(&self) -> i32 {
        match self {
            ResolutionTier::Low => 0,
            ResolutionTier::Medium => 1,
            ResolutionTier::High => 2,
            ResolutionTier::UltraHigh => 3,
        }
    }

    /// Session preset dimensions (landscape sensor orientation)
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ResolutionTier::Low => (640, 480),
            ResolutionTier::Medium => (1280, 720),
            ResolutionTier::High => (1920, 1080),
            ResolutionTier::UltraHigh => (3840, 2160),
        }
    }

    /// Tier to try when this one is not supported by the session
    pub fn fallback(&self) -> Option<Self> {
        match self {
            ResolutionTier::UltraHigh => Some(ResolutionTier::High),
            _ => None,
        }
    }

    /// Display name for logs and CLI output
    pub fn display_name(&self) -> &'static str {
        match self {
            ResolutionTier::Low => "480p",
            ResolutionTier::Medium => "720p",
            ResolutionTier::High => "1080p",
            ResolutionTier::UltraHigh => "4K",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Detection throttling
pub mod throttle {
    /// Maximum detection calls per second
    pub const DEFAULT_MAX_DETECTIONS_PER_SECOND: f64 = 12.0;

    /// Depth of the queue between frame delivery and the frame context.
    /// Frames arriving while it is full are discarded.
    pub const DEFAULT_FRAME_QUEUE_DEPTH: usize = 2;
}

/// Scan line animation and styling
pub mod scan_line {
    use super::Duration;

    /// Duration of one sweep (top to bottom)
    pub const DEFAULT_SWEEP_DURATION: Duration = Duration::from_millis(2000);

    /// Lower bound for a sweep so the line never strobes
    pub const MIN_HALF_PERIOD_SECS: f64 = 0.2;

    /// Ease-in-ease-out control points
    pub const BEZIER_X1: f64 = 0.42;
    pub const BEZIER_Y1: f64 = 0.0;
    pub const BEZIER_X2: f64 = 0.58;
    pub const BEZIER_Y2: f64 = 1.0;

    /// Line width as a fraction of the view width
    pub const LINE_WIDTH_FACTOR: f64 = 0.90;

    /// Line thickness in points
    pub const LINE_HEIGHT: f64 = 2.0;

    /// Trail length in points
    pub const TRAIL_LENGTH: f64 = 130.0;

    /// Trail alpha next to the line (0x55)
    pub const TRAIL_ALPHA_NEAR: f64 = 85.0 / 255.0;

    /// Trail alpha at the middle stop (0x2A)
    pub const TRAIL_ALPHA_MID: f64 = 42.0 / 255.0;

    /// Top bound = status bar height * (3 + this factor)
    pub const STATUS_BAR_OFFSET_FACTOR: f64 = 0.10;

    /// Bottom bound as a fraction of the view height
    pub const BOTTOM_FACTOR: f64 = 0.70;

    /// Gradient stop of the mid colour when moving down / up
    pub const TRAIL_MID_STOP_DOWN: f64 = 0.65;
    pub const TRAIL_MID_STOP_UP: f64 = 0.35;

    /// Default overlay redraw rate
    pub const DEFAULT_REDRAW_FPS: u32 = 60;
}

/// Detector defaults
pub mod detector {
    /// Frames are downscaled to this maximum dimension before detection
    pub const DEFAULT_MAX_DIMENSION: u32 = 640;
}

/// Zoom limits
pub mod zoom {
    /// Minimum zoom factor of every device
    pub const MIN_ZOOM_RATIO: f32 = 1.0;
}
