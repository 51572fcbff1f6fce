// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The scanner never talks to camera hardware directly. It consumes three
//! traits that a platform layer implements:
//!
//! ```text
//! ┌─────────────────────┐
//! │ CaptureSession      │  ← session graph: preset, input, frame output
//! │  Controller         │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐     ┌──────────────────┐
//! │  CameraProvider     │ ──► │  CameraDevice     │  ← torch / zoom
//! └──────────┬──────────┘     └──────────────────┘
//!            │ create_session
//!            ▼
//! ┌─────────────────────┐
//! │  CaptureSession     │  ← begin/commit bracket, start/stop running
//! └─────────────────────┘
//! ```
//!
//! [`synthetic`] provides an in-process implementation used by the CLI and
//! the tests.

pub mod frame_loop;
pub mod synthetic;
pub mod types;

pub use types::*;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A physical camera and its control surface
///
/// Control setters take the device's configuration lock internally and
/// report [`BackendError::LockFailed`] when it cannot be taken.
pub trait CameraDevice: Send + Sync {
    /// Stable identifier
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Which side of the device the lens faces
    fn lens(&self) -> LensPosition;

    /// Whether the device has a torch LED
    fn has_torch(&self) -> bool;

    /// Whether the torch is currently on
    fn torch_enabled(&self) -> bool;

    /// Switch the torch on or off
    fn set_torch(&self, on: bool) -> BackendResult<()>;

    /// Current zoom factor
    fn zoom_factor(&self) -> f32;

    /// Maximum zoom factor of the active format
    fn max_zoom_factor(&self) -> f32;

    /// Apply a zoom factor (callers clamp beforehand)
    fn set_zoom_factor(&self, factor: f32) -> BackendResult<()>;
}

/// A capture session graph
///
/// All methods are called from a single serial context. Graph mutations
/// happen between [`begin_configuration`](Self::begin_configuration) and
/// [`commit_configuration`](Self::commit_configuration); use
/// [`ConfigurationGuard`] rather than calling them directly.
pub trait CaptureSession: Send {
    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    /// Whether the session can produce frames at this preset
    fn supports_preset(&self, preset: SessionPreset) -> bool;

    fn set_preset(&mut self, preset: SessionPreset);

    fn remove_all_inputs(&mut self);

    fn remove_all_outputs(&mut self);

    /// Attach the device as the session's video input
    fn add_input(&mut self, device: Arc<dyn CameraDevice>) -> BackendResult<()>;

    /// Attach a frame-delivery output
    fn add_output(&mut self, sink: FrameSink, settings: ConnectionSettings) -> BackendResult<()>;

    /// Enable or disable frame delivery without touching the graph
    fn set_connection_enabled(&mut self, enabled: bool);

    /// Begin producing frames
    fn start_running(&mut self);

    /// Stop producing frames
    fn stop_running(&mut self);

    fn is_running(&self) -> bool;
}

/// Source of camera devices and capture sessions
pub trait CameraProvider: Send + Sync {
    /// Enumerate available cameras
    fn enumerate_cameras(&self) -> Vec<Arc<dyn CameraDevice>>;

    /// Default camera for a lens position
    fn default_device(&self, lens: LensPosition) -> Option<Arc<dyn CameraDevice>> {
        self.enumerate_cameras()
            .into_iter()
            .find(|device| device.lens() == lens)
    }

    /// Create the session a controller will own for its whole lifetime
    fn create_session(&self) -> Box<dyn CaptureSession>;
}

/// Open configuration bracket on a capture session
///
/// Created with [`ConfigurationGuard::begin`]; commits when dropped, so every
/// exit path (including `?`) closes the bracket.
pub struct ConfigurationGuard<'a, S: CaptureSession + ?Sized> {
    session: &'a mut S,
}

impl<'a, S: CaptureSession + ?Sized> ConfigurationGuard<'a, S> {
    pub fn begin(session: &'a mut S) -> Self {
        session.begin_configuration();
        Self { session }
    }
}

impl<S: CaptureSession + ?Sized> Deref for ConfigurationGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
    }
}

impl<S: CaptureSession + ?Sized> DerefMut for ConfigurationGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session
    }
}

impl<S: CaptureSession + ?Sized> Drop for ConfigurationGuard<'_, S> {
    fn drop(&mut self) {
        self.session.commit_configuration();
    }
}
