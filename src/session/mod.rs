// SPDX-License-Identifier: GPL-3.0-only

//! Capture session controller
//!
//! The controller runs three tasks, each owning its state outright:
//!
//! ```text
//!              ┌──────────────────────────┐
//!  start/stop ─►  configuration context    │  session graph, bound device
//!  torch/zoom  └────────────┬─────────────┘
//!                           │ FrameSink (try_send, late frames dropped)
//!              ┌────────────▼─────────────┐
//!              │      frame context        │  throttle, freeze buffer,
//!              └────────────┬─────────────┘  detection completions
//!                           │ ScanEvent (broadcast)
//!              ┌────────────▼─────────────┐
//!              │       UI context          │  preview host, scan line
//!              └──────────────────────────┘
//! ```
//!
//! Every `start` and `stop` mints a new [`Epoch`]. Each context checks the
//! epoch carried by a message before acting on it, so work belonging to a
//! superseded start or stop is dropped wherever it happens to be.

pub mod configuration;
pub(crate) mod frame_context;
pub mod state;
pub mod ui;

pub use configuration::TorchRequest;
pub use state::{Epoch, Generation, Session, SessionState};
pub use ui::{HeadlessPreview, PreviewHost, PreviewState};

use crate::backends::camera::{CameraProvider, FrameSink, LensPosition};
use crate::config::Config;
use crate::constants::ResolutionTier;
use crate::constants::scan_line::DEFAULT_REDRAW_FPS;
use crate::constants::throttle::{DEFAULT_FRAME_QUEUE_DEPTH, DEFAULT_MAX_DETECTIONS_PER_SECOND};
use crate::constants::zoom::MIN_ZOOM_RATIO;
use crate::errors::{CaptureError, DeviceControlError, ScanError};
use crate::frame_processor::{
    DetectionResult, DetectionService, FreezeImage, FrameThrottle, Symbology,
};
use crate::overlay::{ScanLineStyle, Viewport};
use configuration::{ConfigCommand, ConfigurationContext};
use frame_context::{FrameContext, FrameControl, FrameMessage};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};
use ui::{UiCommand, UiContext};

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 64;

/// Notification from a running session
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A detection call completed (possibly with no symbols)
    Detection(DetectionResult),
    /// A recoverable failure (detection or device control)
    Error(ScanError),
    /// The session was stopped
    Stopped,
}

/// Tunables for a controller
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub max_detections_per_second: f64,
    pub frame_queue_depth: usize,
    pub redraw_fps: u32,
    pub scan_line: ScanLineStyle,
    /// Symbologies reported to listeners (empty = all)
    pub symbologies: Vec<Symbology>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            max_detections_per_second: DEFAULT_MAX_DETECTIONS_PER_SECOND,
            frame_queue_depth: DEFAULT_FRAME_QUEUE_DEPTH,
            redraw_fps: DEFAULT_REDRAW_FPS,
            scan_line: ScanLineStyle::default(),
            symbologies: Vec::new(),
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_detections_per_second: config.max_detections_per_second,
            frame_queue_depth: config.frame_queue_depth,
            redraw_fps: config.redraw_fps,
            scan_line: config.scan_line.clone(),
            symbologies: config.symbologies.clone(),
        }
    }
}

/// Drives one camera session: lifecycle, frame pipeline, overlay and
/// device controls
///
/// Must be created inside a Tokio runtime. Dropping the controller closes
/// its contexts; the configuration context stops a running session on its
/// way out.
pub struct CaptureSessionController {
    generation: Generation,
    config_tx: mpsc::UnboundedSender<ConfigCommand>,
    frame_control_tx: mpsc::UnboundedSender<FrameControl>,
    frame_tx: mpsc::Sender<FrameMessage>,
    ui_tx: mpsc::UnboundedSender<UiCommand>,
    session: watch::Receiver<Session>,
    events: broadcast::Sender<ScanEvent>,
}

impl CaptureSessionController {
    /// Spawn the controller's contexts
    pub fn spawn(
        provider: Arc<dyn CameraProvider>,
        detector: Arc<dyn DetectionService>,
        preview: Box<dyn PreviewHost>,
        options: ControllerOptions,
    ) -> Self {
        let generation = Generation::new();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (session_tx, session_rx) = watch::channel(Session::default());

        let (config_tx, config_rx) = mpsc::unbounded_channel();
        let configuration = ConfigurationContext::new(provider, generation.clone(), session_tx);
        tokio::spawn(configuration.run(config_rx));

        let (frame_control_tx, frame_control_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::channel(options.frame_queue_depth.max(1));
        let frames = FrameContext::new(
            generation.clone(),
            detector,
            FrameThrottle::with_rate(options.max_detections_per_second),
            options.symbologies,
            frame_control_tx.clone(),
            events.clone(),
        );
        tokio::spawn(frames.run(frame_control_rx, frame_rx));

        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let ui = UiContext::new(
            preview,
            generation.clone(),
            options.scan_line,
            options.redraw_fps,
        );
        tokio::spawn(ui.run(ui_rx));

        info!(
            max_detections_per_second = options.max_detections_per_second,
            queue_depth = options.frame_queue_depth,
            "Capture session controller ready"
        );

        Self {
            generation,
            config_tx,
            frame_control_tx,
            frame_tx,
            ui_tx,
            session: session_rx,
            events,
        }
    }

    /// Listen for detections, errors and stops
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Watch the session snapshot
    pub fn watch_session(&self) -> watch::Receiver<Session> {
        self.session.clone()
    }

    /// Current session snapshot
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.session.borrow().state
    }

    /// Start scanning with `lens` at `tier`
    ///
    /// Resolves once the session runs and the preview is attached. A start
    /// overtaken by a later start or stop resolves with
    /// [`CaptureError::Cancelled`] and leaves no trace.
    pub async fn start(&self, lens: LensPosition, tier: ResolutionTier) -> Result<(), CaptureError> {
        let epoch = self.generation.advance();
        info!(%lens, resolution = %tier, %epoch, "Starting scan");

        self.frame_control_tx
            .send(FrameControl::Reset { epoch })
            .map_err(|_| CaptureError::ContextClosed)?;

        let frame_tx = self.frame_tx.clone();
        let sink = FrameSink::new(move |sample| {
            if frame_tx.try_send(FrameMessage { epoch, sample }).is_err() {
                trace!(%epoch, "Late frame discarded");
            }
        });

        let (reply, configured) = oneshot::channel();
        self.config_tx
            .send(ConfigCommand::Start {
                epoch,
                lens,
                tier,
                sink,
                reply,
            })
            .map_err(|_| CaptureError::ContextClosed)?;
        configured.await.map_err(|_| CaptureError::ContextClosed)??;

        if !self.generation.is_current(epoch) {
            return Err(CaptureError::Cancelled);
        }

        let (reply, attached) = oneshot::channel();
        self.ui_tx
            .send(UiCommand::Attach { epoch, lens, reply })
            .map_err(|_| CaptureError::ContextClosed)?;
        if !attached.await.map_err(|_| CaptureError::ContextClosed)? {
            return Err(CaptureError::Cancelled);
        }

        Ok(())
    }

    /// Stop scanning
    ///
    /// The preview is torn down before this returns; the session graph is
    /// released afterwards on the configuration context.
    pub async fn stop(&self) {
        let epoch = self.generation.advance();
        info!(%epoch, "Stopping scan");

        let (reply, detached) = oneshot::channel();
        if self.ui_tx.send(UiCommand::Detach { reply }).is_ok() {
            let _ = detached.await;
        }
        let _ = self.frame_control_tx.send(FrameControl::Reset { epoch });
        let _ = self.config_tx.send(ConfigCommand::Teardown { epoch });
        let _ = self.events.send(ScanEvent::Stopped);
    }

    /// Freeze the preview on the last detected frame
    ///
    /// Only acts on a running session.
    pub async fn pause(&self) -> Result<(), CaptureError> {
        let epoch = self.generation.current();
        if self.state() != SessionState::Running {
            debug!(state = %self.state(), "Pause ignored");
            return Ok(());
        }

        let (reply, toggled) = oneshot::channel();
        self.config_tx
            .send(ConfigCommand::SetPaused {
                epoch,
                paused: true,
                reply,
            })
            .map_err(|_| CaptureError::ContextClosed)?;
        if !toggled.await.map_err(|_| CaptureError::ContextClosed)? {
            return Ok(());
        }

        let (reply, freeze) = oneshot::channel();
        self.frame_control_tx
            .send(FrameControl::Pause { epoch, reply })
            .map_err(|_| CaptureError::ContextClosed)?;
        let freeze = freeze.await.map_err(|_| CaptureError::ContextClosed)?;
        debug!(has_freeze = freeze.is_some(), "Scan paused");

        let (reply, shown) = oneshot::channel();
        self.ui_tx
            .send(UiCommand::Pause {
                epoch,
                freeze,
                reply,
            })
            .map_err(|_| CaptureError::ContextClosed)?;
        shown.await.map_err(|_| CaptureError::ContextClosed)
    }

    /// Continue a paused scan
    ///
    /// Only acts on a paused session.
    pub async fn resume(&self) -> Result<(), CaptureError> {
        let epoch = self.generation.current();
        if self.state() != SessionState::Paused {
            debug!(state = %self.state(), "Resume ignored");
            return Ok(());
        }

        let (reply, toggled) = oneshot::channel();
        self.config_tx
            .send(ConfigCommand::SetPaused {
                epoch,
                paused: false,
                reply,
            })
            .map_err(|_| CaptureError::ContextClosed)?;
        if !toggled.await.map_err(|_| CaptureError::ContextClosed)? {
            return Ok(());
        }

        self.frame_control_tx
            .send(FrameControl::Resume { epoch })
            .map_err(|_| CaptureError::ContextClosed)?;

        let (reply, resumed) = oneshot::channel();
        self.ui_tx
            .send(UiCommand::Resume { epoch, reply })
            .map_err(|_| CaptureError::ContextClosed)?;
        resumed.await.map_err(|_| CaptureError::ContextClosed)?;
        debug!("Scan resumed");
        Ok(())
    }

    /// Image the paused view shows (or would show)
    pub async fn freeze_image(&self) -> Option<FreezeImage> {
        let (reply, image) = oneshot::channel();
        self.frame_control_tx
            .send(FrameControl::Snapshot { reply })
            .ok()?;
        image.await.ok().flatten()
    }

    /// Forward a new layout to the preview and the overlay
    pub fn resize_preview(&self, viewport: Viewport) {
        let _ = self.ui_tx.send(UiCommand::Resize { viewport });
    }

    async fn device_control(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), DeviceControlError>>) -> ConfigCommand,
    ) -> Result<(), DeviceControlError> {
        let (reply, done) = oneshot::channel();
        if self.config_tx.send(command(reply)).is_err() {
            return Ok(());
        }
        let result = done.await.unwrap_or(Ok(()));
        if let Err(err) = &result {
            warn!(error = %err, "Device control failed");
            let _ = self.events.send(ScanEvent::Error(err.clone().into()));
        }
        result
    }

    pub async fn set_torch(&self, request: TorchRequest) -> Result<(), DeviceControlError> {
        self.device_control(|reply| ConfigCommand::Torch { request, reply })
            .await
    }

    pub async fn enable_torch(&self) -> Result<(), DeviceControlError> {
        self.set_torch(TorchRequest::On).await
    }

    pub async fn disable_torch(&self) -> Result<(), DeviceControlError> {
        self.set_torch(TorchRequest::Off).await
    }

    pub async fn toggle_torch(&self) -> Result<(), DeviceControlError> {
        self.set_torch(TorchRequest::Toggle).await
    }

    /// Apply a zoom ratio, clamped to `[1.0, max_zoom_ratio()]`
    pub async fn set_zoom_ratio(&self, ratio: f32) -> Result<(), DeviceControlError> {
        self.device_control(|reply| ConfigCommand::Zoom { ratio, reply })
            .await
    }

    pub fn zoom_ratio(&self) -> f32 {
        self.session.borrow().zoom_ratio()
    }

    pub fn min_zoom_ratio(&self) -> f32 {
        MIN_ZOOM_RATIO
    }

    pub fn max_zoom_ratio(&self) -> f32 {
        self.session.borrow().max_zoom_ratio()
    }

    pub fn is_torch_available(&self) -> bool {
        self.session.borrow().is_torch_available()
    }

    pub fn is_torch_enabled(&self) -> bool {
        self.session.borrow().is_torch_enabled()
    }
}
