// SPDX-License-Identifier: MPL-2.0

//! Shared helpers for integration tests

#![allow(dead_code)]

use futures::future::BoxFuture;
use qrscan::backends::camera::FrameSample;
use qrscan::errors::DetectionServiceError;
use qrscan::frame_processor::{DetectedSymbol, DetectionResult, DetectionService, Quad, Symbology};
use qrscan::session::{ControllerOptions, ScanEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Frames filled with this value make the detector fail
pub const ERROR_MARKER: u8 = 0xEE;

/// How long tests wait for an event before failing
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Detector that "finds" a code in frames filled with a given value
pub struct MarkerDetector {
    hit: u8,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MarkerDetector {
    pub fn new(hit: u8) -> Self {
        Self {
            hit,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call takes `delay` to complete
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetectionService for MarkerDetector {
    fn detect(
        &self,
        frame: Arc<FrameSample>,
    ) -> BoxFuture<'static, Result<Vec<DetectedSymbol>, DetectionServiceError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let marker = frame.luma_at(0, 0);
        let hit = self.hit;
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if marker == ERROR_MARKER {
                Err(DetectionServiceError("sensor noise".to_string()))
            } else if marker == hit {
                Ok(vec![DetectedSymbol::new(
                    format!("code-{}", marker),
                    Symbology::QrCode,
                    Quad::from_rect(1.0, 1.0, 2.0, 2.0),
                )])
            } else {
                Ok(Vec::new())
            }
        })
    }
}

/// 4x4 grayscale frame filled with `marker`
pub fn marker_frame(marker: u8, captured_at: Instant) -> FrameSample {
    FrameSample::from_luma(4, 4, vec![marker; 16], captured_at)
}

/// Options allowing `rate` detections per second
pub fn options(rate: f64) -> ControllerOptions {
    ControllerOptions {
        max_detections_per_second: rate,
        ..ControllerOptions::default()
    }
}

/// Next event, failing the test after [`EVENT_TIMEOUT`]
pub async fn next_event(events: &mut broadcast::Receiver<ScanEvent>) -> ScanEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a scan event")
        .expect("event channel closed")
}

/// Next detection completion, skipping other events
pub async fn next_detection(events: &mut broadcast::Receiver<ScanEvent>) -> DetectionResult {
    loop {
        if let ScanEvent::Detection(result) = next_event(events).await {
            return result;
        }
    }
}
