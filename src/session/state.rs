// SPDX-License-Identifier: GPL-3.0-only

//! Session state shared between the controller's contexts

use crate::backends::camera::{CameraDevice, LensPosition};
use crate::constants::ResolutionTier;
use crate::constants::zoom::MIN_ZOOM_RATIO;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Building the session graph
    Configuring,
    /// Frames flowing, overlay animating
    Running,
    /// Graph kept, frames disabled, freeze image shown
    Paused,
    /// Graph teardown queued
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
        };
        write!(f, "{}", name)
    }
}

/// Value of the generation counter at the time an operation started
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic generation counter
///
/// Every `start` and `stop` mints a new epoch. Work queued on behalf of an
/// older epoch checks [`is_current`](Self::is_current) before touching any
/// state and does nothing when it has been superseded.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint and return a new current epoch
    pub fn advance(&self) -> Epoch {
        Epoch(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Epoch {
        Epoch(self.0.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}

/// Snapshot of the capture session, published by the configuration context
#[derive(Clone, Default)]
pub struct Session {
    pub state: SessionState,
    pub lens: Option<LensPosition>,
    pub resolution: Option<ResolutionTier>,
    /// Epoch of the operation that produced this snapshot
    pub generation: Epoch,
    /// Device bound to the running session
    pub device: Option<Arc<dyn CameraDevice>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Running | SessionState::Paused)
    }

    pub fn zoom_ratio(&self) -> f32 {
        self.device
            .as_ref()
            .map(|d| d.zoom_factor())
            .unwrap_or(MIN_ZOOM_RATIO)
    }

    pub fn max_zoom_ratio(&self) -> f32 {
        self.device
            .as_ref()
            .map(|d| d.max_zoom_factor().max(MIN_ZOOM_RATIO))
            .unwrap_or(MIN_ZOOM_RATIO)
    }

    pub fn is_torch_available(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.has_torch())
    }

    pub fn is_torch_enabled(&self) -> bool {
        self.device
            .as_ref()
            .is_some_and(|d| d.has_torch() && d.torch_enabled())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("lens", &self.lens)
            .field("resolution", &self.resolution)
            .field("generation", &self.generation)
            .field("device", &self.device.as_ref().map(|d| d.id().to_string()))
            .finish()
    }
}
