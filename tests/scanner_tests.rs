// SPDX-License-Identifier: MPL-2.0

//! Tests for the host-facing scanner facade

mod common;

use common::{EVENT_TIMEOUT, ERROR_MARKER, MarkerDetector, marker_frame};
use qrscan::backends::camera::LensPosition;
use qrscan::backends::camera::synthetic::{FrameInjector, SyntheticProvider};
use qrscan::constants::ResolutionTier;
use qrscan::errors::{CaptureError, StillImageReadError};
use qrscan::overlay::Viewport;
use qrscan::scanner::{PermissionState, StaticPermissions};
use qrscan::session::{HeadlessPreview, SessionState};
use qrscan::{Config, HostEvent, ScanController, ScanError, StartOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

fn scanner_with(config: &Config, permissions: PermissionState) -> (ScanController, FrameInjector) {
    let provider = SyntheticProvider::new();
    let injector = provider.injector();
    let scanner = ScanController::new(
        Arc::new(provider),
        Arc::new(MarkerDetector::new(3)),
        Box::new(HeadlessPreview::new(Viewport::default())),
        Arc::new(StaticPermissions(permissions)),
        config,
    );
    (scanner, injector)
}

fn new_scanner() -> (ScanController, FrameInjector) {
    scanner_with(&Config::default(), PermissionState::Granted)
}

async fn next_host_event(events: &mut broadcast::Receiver<HostEvent>) -> HostEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a host event")
        .expect("host event channel closed")
}

async fn wait_until_running(scanner: &ScanController) {
    let mut session = scanner.controller().watch_session();
    tokio::time::timeout(
        EVENT_TIMEOUT,
        session.wait_for(|s| s.state == SessionState::Running),
    )
    .await
    .expect("timed out waiting for a running session")
    .expect("session watch closed");
}

#[tokio::test]
async fn test_barcodes_scanned_event() {
    let (scanner, injector) = new_scanner();
    let mut events = scanner.subscribe();

    scanner.start_scan(StartOptions::default()).await.unwrap();

    // Empty detections are not forwarded to the host
    let base = Instant::now();
    assert!(injector.push(marker_frame(1, base)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(injector.push(marker_frame(3, base + Duration::from_millis(100))));

    match next_host_event(&mut events).await {
        HostEvent::BarcodesScanned { barcodes } => {
            assert_eq!(barcodes.len(), 1);
            assert_eq!(barcodes[0].payload, "code-3");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_scan_error_event() {
    let (scanner, injector) = new_scanner();
    let mut events = scanner.subscribe();

    scanner.start_scan(StartOptions::default()).await.unwrap();
    assert!(injector.push(marker_frame(ERROR_MARKER, Instant::now())));

    match next_host_event(&mut events).await {
        HostEvent::ScanError { message } => assert!(message.contains("sensor noise")),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(scanner.state(), SessionState::Running);
}

#[tokio::test]
async fn test_start_scan_uses_host_options() {
    let (scanner, injector) = new_scanner();
    let options: StartOptions =
        serde_json::from_str(r#"{"lensFacing": "FRONT", "resolution": 0}"#).unwrap();

    scanner.start_scan(options).await.unwrap();
    let session = scanner.controller().session();
    assert_eq!(session.lens, Some(LensPosition::Front));
    assert!(injector.connection_settings().unwrap().mirrored);

    scanner.stop_scan().await.unwrap();
}

#[tokio::test]
async fn test_superseded_start_is_not_an_error() {
    let (scanner, _injector) = new_scanner();

    let (first, second) = tokio::join!(
        scanner.start_scan(StartOptions::default()),
        scanner.start_scan(StartOptions::default()),
    );
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(scanner.state(), SessionState::Running);
}

#[tokio::test]
async fn test_scan_resolves_on_first_code_and_stops() {
    let (scanner, injector) = new_scanner();

    let driver = async {
        wait_until_running(&scanner).await;
        let base = Instant::now();
        for i in 0..5u64 {
            injector.push(marker_frame(3, base + Duration::from_millis(50 * i)));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    let (symbols, ()) = tokio::join!(scanner.scan(), driver);

    let symbols = symbols.unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].payload, "code-3");

    let mut session = scanner.controller().watch_session();
    tokio::time::timeout(EVENT_TIMEOUT, session.wait_for(|s| s.state == SessionState::Idle))
        .await
        .unwrap()
        .unwrap();
    assert!(!injector.is_running());
}

#[tokio::test]
async fn test_scan_uses_configured_lens_and_resolution() {
    let config = Config {
        default_lens: LensPosition::Front,
        default_resolution: ResolutionTier::High,
        ..Config::default()
    };
    let (scanner, injector) = scanner_with(&config, PermissionState::Granted);
    assert_eq!(scanner.default_start_options(), StartOptions::from(&config));

    let driver = async {
        wait_until_running(&scanner).await;
        let session = scanner.controller().session();
        assert!(injector.push(marker_frame(3, Instant::now())));
        session
    };
    let (symbols, session) = tokio::join!(scanner.scan(), driver);

    assert_eq!(symbols.unwrap().len(), 1);
    assert_eq!(session.lens, Some(LensPosition::Front));
    assert_eq!(session.resolution, Some(ResolutionTier::High));
}

#[tokio::test]
async fn test_scan_is_cancelled_by_stop() {
    let (scanner, _injector) = new_scanner();

    let stopper = async {
        wait_until_running(&scanner).await;
        scanner.stop_scan().await.unwrap();
    };
    let (outcome, ()) = tokio::join!(scanner.scan(), stopper);

    assert!(matches!(
        outcome,
        Err(ScanError::Capture(CaptureError::Cancelled))
    ));
}

#[tokio::test]
async fn test_read_missing_image() {
    let (scanner, _injector) = new_scanner();
    let path = std::env::temp_dir().join("qrscan_test_missing_image.png");
    let _ = std::fs::remove_file(&path);

    let result = scanner.read_barcodes_from_image(&path).await;
    assert!(matches!(
        result,
        Err(ScanError::StillImage(StillImageReadError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_read_blank_image_finds_nothing() {
    let (scanner, _injector) = new_scanner();
    let path = std::env::temp_dir().join(format!("qrscan_test_blank_{}.png", std::process::id()));
    image::GrayImage::from_pixel(64, 64, image::Luma([255])).save(&path).unwrap();

    let symbols = scanner.read_barcodes_from_image(&path).await.unwrap();
    assert!(symbols.is_empty());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_permissions() {
    let (scanner, _injector) = scanner_with(&Config::default(), PermissionState::Prompt);
    assert_eq!(scanner.check_permissions().camera, PermissionState::Prompt);
    assert_eq!(
        scanner.request_permissions().await.camera,
        PermissionState::Prompt
    );

    let (scanner, _injector) = new_scanner();
    assert_eq!(scanner.check_permissions().camera, PermissionState::Granted);
}

#[tokio::test]
async fn test_pause_and_freeze_through_facade() {
    let (scanner, injector) = new_scanner();
    let mut events = scanner.subscribe();

    scanner.start_scan(StartOptions::default()).await.unwrap();
    assert!(injector.push(marker_frame(3, Instant::now())));
    next_host_event(&mut events).await;

    scanner.pause_scan().await.unwrap();
    assert_eq!(scanner.state(), SessionState::Paused);
    assert_eq!(scanner.freeze_image().await.unwrap().luma_at(0, 0), 3);

    scanner.resume_scan().await.unwrap();
    assert_eq!(scanner.state(), SessionState::Running);
}
