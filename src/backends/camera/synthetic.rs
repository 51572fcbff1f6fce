// SPDX-License-Identifier: GPL-3.0-only

//! In-process camera backend
//!
//! Emulates a camera device and its capture session without hardware.
//! Frames either come from a still image replayed at a fixed rate (CLI demo)
//! or are pushed by hand through a [`FrameInjector`] (tests).

use super::frame_loop::{FrameLoopController, LoopAction};
use super::types::*;
use super::{CameraDevice, CameraProvider, CaptureSession};
use crate::constants::zoom::MIN_ZOOM_RATIO;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// An emulated camera device
#[derive(Debug)]
pub struct SyntheticCamera {
    id: String,
    name: String,
    lens: LensPosition,
    has_torch: bool,
    torch: AtomicBool,
    zoom: Mutex<f32>,
    max_zoom: f32,
    lock_fails: AtomicBool,
}

impl SyntheticCamera {
    pub fn new(lens: LensPosition) -> Self {
        Self {
            id: format!("synthetic-{}", lens),
            name: format!("Synthetic {} camera", lens),
            lens,
            has_torch: lens == LensPosition::Back,
            torch: AtomicBool::new(false),
            zoom: Mutex::new(MIN_ZOOM_RATIO),
            max_zoom: 8.0,
            lock_fails: AtomicBool::new(false),
        }
    }

    pub fn with_torch(mut self, has_torch: bool) -> Self {
        self.has_torch = has_torch;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: f32) -> Self {
        self.max_zoom = max_zoom.max(MIN_ZOOM_RATIO);
        self
    }

    /// Make every subsequent configuration lock fail (or succeed again)
    pub fn set_lock_failure(&self, fails: bool) {
        self.lock_fails.store(fails, Ordering::SeqCst);
    }

    fn lock(&self) -> BackendResult<()> {
        if self.lock_fails.load(Ordering::SeqCst) {
            Err(BackendError::LockFailed(format!("{} is busy", self.name)))
        } else {
            Ok(())
        }
    }
}

impl CameraDevice for SyntheticCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lens(&self) -> LensPosition {
        self.lens
    }

    fn has_torch(&self) -> bool {
        self.has_torch
    }

    fn torch_enabled(&self) -> bool {
        self.torch.load(Ordering::SeqCst)
    }

    fn set_torch(&self, on: bool) -> BackendResult<()> {
        self.lock()?;
        self.torch.store(on, Ordering::SeqCst);
        Ok(())
    }

    fn zoom_factor(&self) -> f32 {
        self.zoom.lock().map(|z| *z).unwrap_or(MIN_ZOOM_RATIO)
    }

    fn max_zoom_factor(&self) -> f32 {
        self.max_zoom
    }

    fn set_zoom_factor(&self, factor: f32) -> BackendResult<()> {
        self.lock()?;
        let mut zoom = self
            .zoom
            .lock()
            .map_err(|_| BackendError::LockFailed("zoom state poisoned".to_string()))?;
        *zoom = factor;
        Ok(())
    }
}

/// Where a synthetic session gets its frames
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Frames are pushed through a [`FrameInjector`]
    Manual,
    /// A still frame replayed at `fps` while running
    Still { frame: FrameSample, fps: u32 },
}

impl FrameSource {
    /// Replay an image file at `fps`
    pub fn from_image(path: &Path, fps: u32) -> BackendResult<Self> {
        info!(path = %path.display(), "Loading image file");

        let img = image::open(path).map_err(|e| {
            BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        info!(width, height, "Image loaded successfully");

        Ok(FrameSource::Still {
            frame: FrameSample::from_rgba(width, height, rgba.into_raw(), Instant::now()),
            fps,
        })
    }
}

/// State shared between the session, its delivery thread and injectors
#[derive(Default)]
struct SessionShared {
    output: Mutex<Option<(FrameSink, ConnectionSettings)>>,
    enabled: AtomicBool,
    running: AtomicBool,
    configuring: AtomicBool,
    sequence: AtomicU64,
    /// Start/stop or nested begin calls made inside an open bracket
    bracket_violations: AtomicUsize,
    commits: AtomicUsize,
}

impl SessionShared {
    /// Deliver one frame if the session is running with an enabled output
    fn deliver(&self, sample: FrameSample) -> bool {
        if !self.running.load(Ordering::SeqCst) || !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        let output = match self.output.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return false,
        };
        let Some((sink, settings)) = output else {
            return false;
        };
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let sample = FrameSample {
            orientation: settings.orientation,
            sequence,
            ..sample
        };
        sink.deliver(sample);
        true
    }
}

/// Handle for pushing frames into a synthetic session by hand
#[derive(Clone)]
pub struct FrameInjector {
    shared: Arc<SessionShared>,
}

impl FrameInjector {
    /// Push a frame as if the sensor produced it
    ///
    /// Returns false when the session is not running, has no output, or the
    /// connection is disabled (the frame is dropped like real hardware would).
    pub fn push(&self, sample: FrameSample) -> bool {
        self.shared.deliver(sample)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_connection_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    pub fn has_output(&self) -> bool {
        self.shared
            .output
            .lock()
            .map(|o| o.is_some())
            .unwrap_or(false)
    }

    /// Settings of the attached output, if any
    pub fn connection_settings(&self) -> Option<ConnectionSettings> {
        self.shared
            .output
            .lock()
            .ok()
            .and_then(|o| o.as_ref().map(|(_, settings)| *settings))
    }

    /// Number of times the graph was started, stopped or re-opened while a
    /// configuration bracket was already open
    pub fn bracket_violations(&self) -> usize {
        self.shared.bracket_violations.load(Ordering::SeqCst)
    }

    /// Number of committed configuration brackets
    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }
}

/// Emulated capture session
pub struct SyntheticSession {
    shared: Arc<SessionShared>,
    source: FrameSource,
    max_preset: SessionPreset,
    preset: Option<SessionPreset>,
    inputs: Vec<Arc<dyn CameraDevice>>,
    reject_inputs: bool,
    frame_loop: Option<FrameLoopController>,
}

impl SyntheticSession {
    fn check_bracket_closed(&self, operation: &str) {
        if self.shared.configuring.load(Ordering::SeqCst) {
            warn!(operation, "Session graph touched inside an open configuration bracket");
            self.shared.bracket_violations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn check_bracket_open(&self, operation: &str) {
        if !self.shared.configuring.load(Ordering::SeqCst) {
            warn!(operation, "Session graph mutated outside a configuration bracket");
            self.shared.bracket_violations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl CaptureSession for SyntheticSession {
    fn begin_configuration(&mut self) {
        self.check_bracket_closed("begin_configuration");
        self.shared.configuring.store(true, Ordering::SeqCst);
    }

    fn commit_configuration(&mut self) {
        self.shared.configuring.store(false, Ordering::SeqCst);
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
    }

    fn supports_preset(&self, preset: SessionPreset) -> bool {
        preset.width <= self.max_preset.width && preset.height <= self.max_preset.height
    }

    fn set_preset(&mut self, preset: SessionPreset) {
        self.check_bracket_open("set_preset");
        debug!(%preset, "Session preset set");
        self.preset = Some(preset);
    }

    fn remove_all_inputs(&mut self) {
        self.check_bracket_open("remove_all_inputs");
        self.inputs.clear();
    }

    fn remove_all_outputs(&mut self) {
        self.check_bracket_open("remove_all_outputs");
        if let Ok(mut output) = self.shared.output.lock() {
            *output = None;
        }
    }

    fn add_input(&mut self, device: Arc<dyn CameraDevice>) -> BackendResult<()> {
        self.check_bracket_open("add_input");
        if self.reject_inputs {
            return Err(BackendError::InputRejected(device.name().to_string()));
        }
        if !self.inputs.is_empty() {
            return Err(BackendError::InputRejected(
                "session already has a video input".to_string(),
            ));
        }
        self.inputs.push(device);
        Ok(())
    }

    fn add_output(&mut self, sink: FrameSink, settings: ConnectionSettings) -> BackendResult<()> {
        self.check_bracket_open("add_output");
        let mut output = self
            .shared
            .output
            .lock()
            .map_err(|_| BackendError::OutputRejected("output slot poisoned".to_string()))?;
        if output.is_some() {
            return Err(BackendError::OutputRejected(
                "session already has a frame output".to_string(),
            ));
        }
        *output = Some((sink, settings));
        self.shared.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_connection_enabled(&mut self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    fn start_running(&mut self) {
        self.check_bracket_closed("start_running");
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(preset = ?self.preset, "Synthetic session running");

        if let FrameSource::Still { frame, fps } = &self.source {
            let frame = frame.clone();
            let shared = Arc::clone(&self.shared);
            self.frame_loop = Some(FrameLoopController::start(
                "synthetic-camera",
                *fps,
                move |_| {
                    if !shared.running.load(Ordering::SeqCst) {
                        return LoopAction::Stop;
                    }
                    shared.deliver(frame.restamped(Instant::now(), 0));
                    LoopAction::Continue
                },
            ));
        }
    }

    fn stop_running(&mut self) {
        self.check_bracket_closed("stop_running");
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(mut frame_loop) = self.frame_loop.take() {
            frame_loop.stop();
        }
        info!("Synthetic session stopped");
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

/// Provider of synthetic devices and the session they share
pub struct SyntheticProvider {
    devices: Vec<Arc<SyntheticCamera>>,
    source: FrameSource,
    max_preset: SessionPreset,
    reject_inputs: bool,
    shared: Arc<SessionShared>,
}

impl SyntheticProvider {
    /// Front and back cameras fed by hand
    pub fn new() -> Self {
        Self::with_devices(vec![
            Arc::new(SyntheticCamera::new(LensPosition::Back)),
            Arc::new(SyntheticCamera::new(LensPosition::Front)),
        ])
    }

    pub fn with_devices(devices: Vec<Arc<SyntheticCamera>>) -> Self {
        Self {
            devices,
            source: FrameSource::Manual,
            max_preset: SessionPreset {
                width: 1920,
                height: 1080,
            },
            reject_inputs: false,
            shared: Arc::new(SessionShared::default()),
        }
    }

    pub fn with_source(mut self, source: FrameSource) -> Self {
        self.source = source;
        self
    }

    /// Largest preset the session accepts
    pub fn with_max_preset(mut self, width: u32, height: u32) -> Self {
        self.max_preset = SessionPreset { width, height };
        self
    }

    /// Make the session refuse every device input
    pub fn rejecting_inputs(mut self) -> Self {
        self.reject_inputs = true;
        self
    }

    /// Injector for the session created by this provider
    pub fn injector(&self) -> FrameInjector {
        FrameInjector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Concrete device for a lens (to flip failure switches in tests)
    pub fn device(&self, lens: LensPosition) -> Option<Arc<SyntheticCamera>> {
        self.devices.iter().find(|d| d.lens == lens).cloned()
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraProvider for SyntheticProvider {
    fn enumerate_cameras(&self) -> Vec<Arc<dyn CameraDevice>> {
        self.devices
            .iter()
            .map(|d| Arc::clone(d) as Arc<dyn CameraDevice>)
            .collect()
    }

    fn create_session(&self) -> Box<dyn CaptureSession> {
        Box::new(SyntheticSession {
            shared: Arc::clone(&self.shared),
            source: self.source.clone(),
            max_preset: self.max_preset,
            preset: None,
            inputs: Vec::new(),
            reject_inputs: self.reject_inputs,
            frame_loop: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::ConfigurationGuard;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            orientation: Orientation::Up,
            mirrored: false,
        }
    }

    #[test]
    fn test_injector_requires_running_session() {
        let provider = SyntheticProvider::new();
        let injector = provider.injector();
        let mut session = provider.create_session();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);

        {
            let mut graph = ConfigurationGuard::begin(session.as_mut());
            graph
                .add_output(
                    FrameSink::new(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                    settings(),
                )
                .unwrap();
        }

        let frame = FrameSample::from_luma(1, 1, vec![0], Instant::now());
        assert!(!injector.push(frame.clone()));

        session.start_running();
        assert!(injector.push(frame.clone()));

        session.set_connection_enabled(false);
        assert!(!injector.push(frame));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(injector.bracket_violations(), 0);
    }

    #[test]
    fn test_mutation_outside_bracket_is_counted() {
        let provider = SyntheticProvider::new();
        let injector = provider.injector();
        let mut session = provider.create_session();
        session.remove_all_inputs();
        assert_eq!(injector.bracket_violations(), 1);
    }

    #[test]
    fn test_lock_failure() {
        let camera = SyntheticCamera::new(LensPosition::Back);
        camera.set_lock_failure(true);
        assert!(matches!(
            camera.set_torch(true),
            Err(BackendError::LockFailed(_))
        ));
        assert!(!camera.torch_enabled());
    }

    #[test]
    fn test_default_device_by_lens() {
        let provider = SyntheticProvider::new();
        let front = provider.default_device(LensPosition::Front).unwrap();
        assert_eq!(front.lens(), LensPosition::Front);

        let back_only = SyntheticProvider::with_devices(vec![Arc::new(SyntheticCamera::new(
            LensPosition::Back,
        ))]);
        assert!(back_only.default_device(LensPosition::Front).is_none());
    }
}
