// SPDX-License-Identifier: MPL-2.0

//! Host-facing scanner API
//!
//! [`ScanController`] is the surface a host bridge calls: loosely typed
//! start options in, JSON-serializable events out. It wraps a
//! [`CaptureSessionController`] and adds one-shot scanning, still-image
//! reading and permission queries.

use crate::backends::camera::{CameraProvider, LensPosition};
use crate::config::Config;
use crate::constants::ResolutionTier;
use crate::errors::{CaptureError, ScanError, ScanResult};
use crate::frame_processor::types::retain_allowed;
use crate::frame_processor::{DetectedSymbol, DetectionService, FreezeImage, QrDetector, Symbology};
use crate::overlay::Viewport;
use crate::session::{
    CaptureSessionController, ControllerOptions, PreviewHost, ScanEvent, SessionState,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the host event channel
const HOST_EVENT_CAPACITY: usize = 64;

/// Options passed by the host to `start_scan`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartOptions {
    #[serde(rename = "lensFacing")]
    pub lens: LensPosition,
    /// Resolution tier index, 0..=3 (anything else means Medium)
    pub resolution: i32,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            lens: LensPosition::Back,
            resolution: ResolutionTier::Medium.index(),
        }
    }
}

impl From<&Config> for StartOptions {
    fn from(config: &Config) -> Self {
        Self {
            lens: config.default_lens,
            resolution: config.default_resolution.index(),
        }
    }
}

impl StartOptions {
    pub fn tier(&self) -> ResolutionTier {
        ResolutionTier::from_index(self.resolution)
    }
}

/// Event delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    /// One or more symbols found in a frame
    BarcodesScanned { barcodes: Vec<DetectedSymbol> },
    /// A recoverable failure while scanning
    ScanError { message: String },
}

impl HostEvent {
    /// Host-visible form of a session event (empty detections and stops are
    /// not reported)
    pub fn from_scan_event(event: &ScanEvent) -> Option<Self> {
        match event {
            ScanEvent::Detection(result) if !result.is_empty() => Some(HostEvent::BarcodesScanned {
                barcodes: result.symbols.clone(),
            }),
            ScanEvent::Detection(_) | ScanEvent::Stopped => None,
            ScanEvent::Error(err) => Some(HostEvent::ScanError {
                message: err.to_string(),
            }),
        }
    }
}

/// Camera permission as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub camera: PermissionState,
}

/// Platform permission source
pub trait PermissionProvider: Send + Sync {
    fn check(&self) -> PermissionState;

    /// Ask the user; returns the state afterwards
    fn request(&self) -> PermissionState;
}

/// Permission provider with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions(pub PermissionState);

impl Default for StaticPermissions {
    fn default() -> Self {
        StaticPermissions(PermissionState::Granted)
    }
}

impl PermissionProvider for StaticPermissions {
    fn check(&self) -> PermissionState {
        self.0
    }

    fn request(&self) -> PermissionState {
        self.0
    }
}

/// Scanner facade
pub struct ScanController {
    controller: CaptureSessionController,
    still_reader: QrDetector,
    symbologies: Vec<Symbology>,
    defaults: StartOptions,
    permissions: Arc<dyn PermissionProvider>,
    host_events: broadcast::Sender<HostEvent>,
    forwarder: JoinHandle<()>,
}

impl ScanController {
    /// Create the facade and its session controller (inside a Tokio runtime)
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        detector: Arc<dyn DetectionService>,
        preview: Box<dyn PreviewHost>,
        permissions: Arc<dyn PermissionProvider>,
        config: &Config,
    ) -> Self {
        let controller = CaptureSessionController::spawn(
            provider,
            detector,
            preview,
            ControllerOptions::from(config),
        );

        let (host_events, _) = broadcast::channel(HOST_EVENT_CAPACITY);
        let forwarder = tokio::spawn(forward_events(controller.subscribe(), host_events.clone()));

        Self {
            controller,
            still_reader: QrDetector::with_max_dimension(config.detector_max_dimension),
            symbologies: config.symbologies.clone(),
            defaults: StartOptions::from(config),
            permissions,
            host_events,
            forwarder,
        }
    }

    /// Host events (`barcodesScanned`, `scanError`)
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.host_events.subscribe()
    }

    /// The underlying session controller
    pub fn controller(&self) -> &CaptureSessionController {
        &self.controller
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// Lens and resolution from the configuration
    pub fn default_start_options(&self) -> StartOptions {
        self.defaults.clone()
    }

    /// Start continuous scanning
    ///
    /// A start superseded by a later start or stop is not an error.
    pub async fn start_scan(&self, options: StartOptions) -> ScanResult<()> {
        match self.controller.start(options.lens, options.tier()).await {
            Ok(()) => Ok(()),
            Err(CaptureError::Cancelled) => {
                debug!("Start superseded");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn stop_scan(&self) -> ScanResult<()> {
        self.controller.stop().await;
        Ok(())
    }

    pub async fn pause_scan(&self) -> ScanResult<()> {
        Ok(self.controller.pause().await?)
    }

    pub async fn resume_scan(&self) -> ScanResult<()> {
        Ok(self.controller.resume().await?)
    }

    /// Image shown while paused
    pub async fn freeze_image(&self) -> Option<FreezeImage> {
        self.controller.freeze_image().await
    }

    pub fn resize_preview(&self, viewport: Viewport) {
        self.controller.resize_preview(viewport);
    }

    pub async fn set_zoom_ratio(&self, ratio: f32) -> ScanResult<()> {
        Ok(self.controller.set_zoom_ratio(ratio).await?)
    }

    pub fn zoom_ratio(&self) -> f32 {
        self.controller.zoom_ratio()
    }

    pub fn min_zoom_ratio(&self) -> f32 {
        self.controller.min_zoom_ratio()
    }

    pub fn max_zoom_ratio(&self) -> f32 {
        self.controller.max_zoom_ratio()
    }

    pub async fn enable_torch(&self) -> ScanResult<()> {
        Ok(self.controller.enable_torch().await?)
    }

    pub async fn disable_torch(&self) -> ScanResult<()> {
        Ok(self.controller.disable_torch().await?)
    }

    pub async fn toggle_torch(&self) -> ScanResult<()> {
        Ok(self.controller.toggle_torch().await?)
    }

    pub fn is_torch_available(&self) -> bool {
        self.controller.is_torch_available()
    }

    pub fn is_torch_enabled(&self) -> bool {
        self.controller.is_torch_enabled()
    }

    /// Detect codes in an image file
    pub async fn read_barcodes_from_image(
        &self,
        path: impl AsRef<Path>,
    ) -> ScanResult<Vec<DetectedSymbol>> {
        let mut symbols = self.still_reader.read_image(path).await?;
        retain_allowed(&mut symbols, &self.symbologies);
        Ok(symbols)
    }

    /// Scan until the first code, then stop
    ///
    /// Uses the configured default lens and resolution; see
    /// [`scan_with`](Self::scan_with).
    pub async fn scan(&self) -> ScanResult<Vec<DetectedSymbol>> {
        self.scan_with(self.default_start_options()).await
    }

    /// Scan with `options` until the first code, then stop
    ///
    /// Per-frame detection errors are ignored; a stop issued meanwhile
    /// resolves with [`CaptureError::Cancelled`].
    pub async fn scan_with(&self, options: StartOptions) -> ScanResult<Vec<DetectedSymbol>> {
        let mut events = self.controller.subscribe();
        self.controller.start(options.lens, options.tier()).await?;
        info!(lens = %options.lens, "One-shot scan started");

        let outcome = loop {
            match events.recv().await {
                Ok(ScanEvent::Detection(result)) if !result.is_empty() => break Ok(result.symbols),
                Ok(ScanEvent::Stopped) => break Err(ScanError::Capture(CaptureError::Cancelled)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "One-shot scan lagged behind events");
                    continue;
                }
                Err(RecvError::Closed) => {
                    break Err(ScanError::Capture(CaptureError::ContextClosed));
                }
            }
        };

        if outcome.is_ok() {
            self.controller.stop().await;
        }
        outcome
    }

    pub fn check_permissions(&self) -> PermissionStatus {
        PermissionStatus {
            camera: self.permissions.check(),
        }
    }

    pub async fn request_permissions(&self) -> PermissionStatus {
        let permissions = Arc::clone(&self.permissions);
        let camera = tokio::task::spawn_blocking(move || permissions.request())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Permission request failed");
                PermissionState::Denied
            });
        PermissionStatus { camera }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn forward_events(
    mut events: broadcast::Receiver<ScanEvent>,
    host_events: broadcast::Sender<HostEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(host_event) = HostEvent::from_scan_event(&event) {
                    let _ = host_events.send(host_event);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Host event forwarder lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::{Quad, Symbology};

    #[test]
    fn test_start_options_from_host_json() {
        let options: StartOptions =
            serde_json::from_str(r#"{"lensFacing": "FRONT", "resolution": 2}"#).unwrap();
        assert_eq!(options.lens, LensPosition::Front);
        assert_eq!(options.tier(), ResolutionTier::High);

        let options: StartOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.lens, LensPosition::Back);
        assert_eq!(options.tier(), ResolutionTier::Medium);

        let options: StartOptions = serde_json::from_str(r#"{"resolution": 9}"#).unwrap();
        assert_eq!(options.tier(), ResolutionTier::Medium);

        let options: StartOptions =
            serde_json::from_str(r#"{"lensFacing": "front", "resolution": 0}"#).unwrap();
        assert_eq!(options.lens, LensPosition::Front);
        assert_eq!(options.tier(), ResolutionTier::Low);
    }

    #[test]
    fn test_start_options_from_config() {
        let config = Config {
            default_lens: LensPosition::Front,
            default_resolution: ResolutionTier::UltraHigh,
            ..Config::default()
        };
        let options = StartOptions::from(&config);
        assert_eq!(options.lens, LensPosition::Front);
        assert_eq!(options.tier(), ResolutionTier::UltraHigh);
    }

    #[test]
    fn test_host_event_json() {
        let event = HostEvent::BarcodesScanned {
            barcodes: vec![DetectedSymbol::new("hello", Symbology::QrCode, Quad::default())],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "barcodesScanned");
        assert_eq!(json["barcodes"][0]["rawValue"], "hello");

        let event = HostEvent::ScanError {
            message: "Torch error: busy".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "scanError");
        assert_eq!(json["message"], "Torch error: busy");
    }

    #[test]
    fn test_permission_json() {
        let status = PermissionStatus {
            camera: PermissionState::Prompt,
        };
        assert_eq!(serde_json::to_string(&status).unwrap(), r#"{"camera":"prompt"}"#);
    }
}
