// SPDX-License-Identifier: GPL-3.0-only

//! Configuration context
//!
//! Owns the capture session graph and the bound device. Commands are
//! processed strictly in submission order, one at a time, which makes this
//! task the only place the graph is ever mutated.

use super::state::{Epoch, Generation, Session, SessionState};
use crate::backends::camera::{
    CameraDevice, CameraProvider, CaptureSession, ConfigurationGuard, ConnectionSettings,
    FrameSink, LensPosition, Orientation, SessionPreset,
};
use crate::constants::ResolutionTier;
use crate::constants::zoom::MIN_ZOOM_RATIO;
use crate::errors::{CaptureError, DeviceControl, DeviceControlError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Torch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchRequest {
    On,
    Off,
    Toggle,
}

pub(crate) enum ConfigCommand {
    Start {
        epoch: Epoch,
        lens: LensPosition,
        tier: ResolutionTier,
        sink: FrameSink,
        reply: oneshot::Sender<Result<(), CaptureError>>,
    },
    Teardown {
        epoch: Epoch,
    },
    SetPaused {
        epoch: Epoch,
        paused: bool,
        reply: oneshot::Sender<bool>,
    },
    Torch {
        request: TorchRequest,
        reply: oneshot::Sender<Result<(), DeviceControlError>>,
    },
    Zoom {
        ratio: f32,
        reply: oneshot::Sender<Result<(), DeviceControlError>>,
    },
}

pub(crate) struct ConfigurationContext {
    provider: Arc<dyn CameraProvider>,
    session: Box<dyn CaptureSession>,
    device: Option<Arc<dyn CameraDevice>>,
    generation: Generation,
    state: watch::Sender<Session>,
}

impl ConfigurationContext {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        generation: Generation,
        state: watch::Sender<Session>,
    ) -> Self {
        let session = provider.create_session();
        Self {
            provider,
            session,
            device: None,
            generation,
            state,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ConfigCommand>) {
        debug!("Configuration context started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        if self.session.is_running() {
            self.teardown(self.generation.current());
        }
        debug!("Configuration context stopped");
    }

    fn handle(&mut self, command: ConfigCommand) {
        match command {
            ConfigCommand::Start {
                epoch,
                lens,
                tier,
                sink,
                reply,
            } => {
                let _ = reply.send(self.start(epoch, lens, tier, sink));
            }
            ConfigCommand::Teardown { epoch } => self.teardown(epoch),
            ConfigCommand::SetPaused {
                epoch,
                paused,
                reply,
            } => {
                let _ = reply.send(self.set_paused(epoch, paused));
            }
            ConfigCommand::Torch { request, reply } => {
                let _ = reply.send(self.torch(request));
            }
            ConfigCommand::Zoom { ratio, reply } => {
                let _ = reply.send(self.zoom(ratio));
            }
        }
    }

    fn publish(&self, update: impl FnOnce(&mut Session)) {
        self.state.send_modify(update);
    }

    fn start(
        &mut self,
        epoch: Epoch,
        lens: LensPosition,
        tier: ResolutionTier,
        sink: FrameSink,
    ) -> Result<(), CaptureError> {
        if !self.generation.is_current(epoch) {
            debug!(%epoch, "Start superseded before configuration");
            return Err(CaptureError::Cancelled);
        }

        self.publish(|s| {
            s.state = SessionState::Configuring;
            s.lens = Some(lens);
            s.resolution = Some(tier);
            s.generation = epoch;
        });

        // A restart replaces the running graph
        if self.session.is_running() {
            self.session.stop_running();
        }

        let Some(device) = self.provider.default_device(lens) else {
            warn!(%lens, "No camera for lens");
            self.clear_graph();
            self.reset_idle(epoch);
            return Err(CaptureError::DeviceNotFound(lens));
        };

        info!(
            device = device.name(),
            %lens,
            resolution = %tier,
            %epoch,
            "Configuring capture session"
        );

        let configured = {
            let mut graph = ConfigurationGuard::begin(self.session.as_mut());
            configure_graph(&mut *graph, Arc::clone(&device), lens, tier, sink)
        };

        if let Err(err) = configured {
            warn!(error = %err, "Session configuration failed");
            self.clear_graph();
            self.reset_idle(epoch);
            return Err(err.into());
        }

        if !self.generation.is_current(epoch) {
            debug!(%epoch, "Start superseded after configuration");
            return Err(CaptureError::Cancelled);
        }

        self.session.start_running();
        self.device = Some(Arc::clone(&device));
        self.publish(|s| {
            s.state = SessionState::Running;
            s.device = Some(device);
        });
        info!(%epoch, "Capture session running");
        Ok(())
    }

    fn clear_graph(&mut self) {
        let mut graph = ConfigurationGuard::begin(self.session.as_mut());
        graph.remove_all_outputs();
        graph.remove_all_inputs();
    }

    fn reset_idle(&mut self, epoch: Epoch) {
        self.device = None;
        self.publish(|s| {
            *s = Session {
                generation: epoch,
                ..Session::default()
            };
        });
    }

    fn teardown(&mut self, epoch: Epoch) {
        self.publish(|s| s.state = SessionState::Stopping);

        self.session.set_connection_enabled(false);
        self.clear_graph();
        if self.session.is_running() {
            self.session.stop_running();
        }
        self.reset_idle(epoch);
        info!(%epoch, "Capture session torn down");
    }

    /// Returns whether the state changed
    fn set_paused(&mut self, epoch: Epoch, paused: bool) -> bool {
        let (from, to) = if paused {
            (SessionState::Running, SessionState::Paused)
        } else {
            (SessionState::Paused, SessionState::Running)
        };
        if !self.generation.is_current(epoch) || self.state.borrow().state != from {
            return false;
        }

        self.session.set_connection_enabled(!paused);
        self.publish(|s| s.state = to);
        debug!(state = %to, "Frame delivery toggled");
        true
    }

    fn torch(&mut self, request: TorchRequest) -> Result<(), DeviceControlError> {
        let Some(device) = self.device.as_ref() else {
            return Ok(());
        };
        if !device.has_torch() {
            debug!("Torch requested on a device without one");
            return Ok(());
        }

        let on = match request {
            TorchRequest::On => true,
            TorchRequest::Off => false,
            TorchRequest::Toggle => !device.torch_enabled(),
        };
        device
            .set_torch(on)
            .map_err(|e| DeviceControlError::LockFailed {
                control: DeviceControl::Torch,
                reason: e.to_string(),
            })?;
        debug!(on, "Torch set");
        Ok(())
    }

    fn zoom(&mut self, ratio: f32) -> Result<(), DeviceControlError> {
        let Some(device) = self.device.as_ref() else {
            return Ok(());
        };
        let clamped = clamp_zoom(ratio, device.max_zoom_factor());
        device
            .set_zoom_factor(clamped)
            .map_err(|e| DeviceControlError::LockFailed {
                control: DeviceControl::Zoom,
                reason: e.to_string(),
            })?;
        debug!(requested = ratio, applied = clamped, "Zoom set");
        Ok(())
    }
}

/// Build the graph for one run (called inside an open bracket)
fn configure_graph(
    graph: &mut dyn CaptureSession,
    device: Arc<dyn CameraDevice>,
    lens: LensPosition,
    tier: ResolutionTier,
    sink: FrameSink,
) -> Result<(), crate::backends::camera::BackendError> {
    let preset = select_preset(graph, tier);
    graph.set_preset(preset);
    graph.remove_all_inputs();
    graph.remove_all_outputs();
    graph.add_input(device)?;
    graph.add_output(
        sink,
        ConnectionSettings {
            orientation: Orientation::Up,
            mirrored: lens.mirrored(),
        },
    )?;
    Ok(())
}

/// Preset for a tier, falling back when the session cannot produce it
fn select_preset(session: &dyn CaptureSession, tier: ResolutionTier) -> SessionPreset {
    let preset_of = |tier: ResolutionTier| {
        let (width, height) = tier.dimensions();
        SessionPreset { width, height }
    };

    let preset = preset_of(tier);
    if session.supports_preset(preset) {
        return preset;
    }
    match tier.fallback() {
        Some(fallback) => {
            debug!(requested = %preset, fallback = %fallback, "Preset unsupported, falling back");
            preset_of(fallback)
        }
        None => preset,
    }
}

/// Clamp a requested zoom ratio into `[1.0, max]`
pub(crate) fn clamp_zoom(ratio: f32, max: f32) -> f32 {
    let max = max.max(MIN_ZOOM_RATIO);
    if ratio.is_nan() {
        return MIN_ZOOM_RATIO;
    }
    ratio.clamp(MIN_ZOOM_RATIO, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticProvider;

    #[test]
    fn test_clamp_zoom() {
        assert_eq!(clamp_zoom(-5.0, 8.0), 1.0);
        assert_eq!(clamp_zoom(0.5, 8.0), 1.0);
        assert_eq!(clamp_zoom(3.0, 8.0), 3.0);
        assert_eq!(clamp_zoom(18.0, 8.0), 8.0);
        assert_eq!(clamp_zoom(f32::NAN, 8.0), 1.0);
        assert_eq!(clamp_zoom(2.0, 0.5), 1.0);
    }

    #[test]
    fn test_ultra_high_falls_back() {
        let provider = SyntheticProvider::new().with_max_preset(1920, 1080);
        let session = provider.create_session();
        let preset = select_preset(session.as_ref(), ResolutionTier::UltraHigh);
        assert_eq!((preset.width, preset.height), (1920, 1080));

        let provider = SyntheticProvider::new().with_max_preset(3840, 2160);
        let session = provider.create_session();
        let preset = select_preset(session.as_ref(), ResolutionTier::UltraHigh);
        assert_eq!((preset.width, preset.height), (3840, 2160));
    }
}
