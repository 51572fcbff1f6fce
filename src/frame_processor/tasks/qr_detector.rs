// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! This module implements QR code detection using the rqrr crate.
//! Frames are reduced to luma (downscaled when large), searched for QR
//! grids, and every grid that decodes becomes a [`DetectedSymbol`] with
//! corner points in original frame coordinates.

use super::DetectionService;
use crate::backends::camera::types::FrameSample;
use crate::constants::detector::DEFAULT_MAX_DIMENSION;
use crate::errors::{DetectionServiceError, StillImageReadError};
use crate::frame_processor::types::{DetectedSymbol, Point, Quad, Symbology};
use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// QR code detector
///
/// Analyzes camera frames to detect and decode QR codes.
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Decode an image file and detect codes in it
    ///
    /// Decoding and detection both run on the blocking pool.
    pub async fn read_image(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<DetectedSymbol>, StillImageReadError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let max_dim = self.max_dimension;

        tokio::task::spawn_blocking(move || read_image_sync(&path, max_dim))
            .await
            .map_err(|e| {
                warn!(error = %e, "Image read task failed");
                StillImageReadError::Detection(DetectionServiceError(e.to_string()))
            })?
    }
}

impl DetectionService for QrDetector {
    fn detect(
        &self,
        frame: Arc<FrameSample>,
    ) -> BoxFuture<'static, Result<Vec<DetectedSymbol>, DetectionServiceError>> {
        let max_dim = self.max_dimension;

        // Run detection in a blocking task to avoid blocking the async runtime
        async move {
            tokio::task::spawn_blocking(move || detect_sync(&frame, max_dim))
                .await
                .map_err(|e| {
                    warn!(error = %e, "QR detection task panicked");
                    DetectionServiceError(e.to_string())
                })
        }
        .boxed()
    }
}

fn read_image_sync(path: &Path, max_dim: u32) -> Result<Vec<DetectedSymbol>, StillImageReadError> {
    if !path.is_file() {
        return Err(StillImageReadError::NotFound(path.to_path_buf()));
    }

    let luma = image::open(path)?.to_luma8();
    let (width, height) = luma.dimensions();
    debug!(path = %path.display(), width, height, "Decoded still image");

    let frame = FrameSample::from_luma(width, height, luma.into_raw(), Instant::now());
    Ok(detect_sync(&frame, max_dim))
}

/// Synchronous QR detection (runs in blocking task)
fn detect_sync(frame: &FrameSample, max_dimension: u32) -> Vec<DetectedSymbol> {
    let start = Instant::now();

    let width = frame.width;
    let height = frame.height;
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let (luma, proc_width, proc_height, scale) = if width > max_dimension
        || height > max_dimension
    {
        let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
        let new_width = ((width as f32 / scale) as u32).max(1);
        let new_height = ((height as f32 / scale) as u32).max(1);
        (
            downscale_luma(frame, new_width, new_height),
            new_width,
            new_height,
            scale,
        )
    } else {
        (copy_luma(frame), width, height, 1.0)
    };

    trace!(
        proc_width,
        proc_height,
        scale,
        conversion_ms = start.elapsed().as_millis(),
        "Prepared luma image for processing"
    );

    let row = proc_width as usize;
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(proc_width as usize, proc_height as usize, |x, y| {
            luma.get(y * row + x).copied().unwrap_or(0)
        });
    let grids = prepared.detect_grids();

    trace!(
        count = grids.len(),
        detection_ms = start.elapsed().as_millis(),
        "QR grid search complete"
    );

    let mut detections = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = %e, "Failed to decode QR code");
                continue;
            }
        };

        let corners = Quad(grid.bounds.map(|p| Point::new(p.x as f32, p.y as f32))).scaled(scale);
        let center = corners.centroid();
        debug!(
            content = %content,
            x = center.x,
            y = center.y,
            "Detected QR code"
        );

        detections.push(DetectedSymbol::new(content, Symbology::QrCode, corners));
    }

    if !detections.is_empty() {
        debug!(
            count = detections.len(),
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
    }

    detections
}

/// Tightly packed luma plane of the frame
fn copy_luma(frame: &FrameSample) -> Vec<u8> {
    let mut result = Vec::with_capacity((frame.width * frame.height) as usize);
    for y in 0..frame.height {
        for x in 0..frame.width {
            result.push(frame.luma_at(x, y));
        }
    }
    result
}

/// Downscale the luma plane using bilinear interpolation
fn downscale_luma(frame: &FrameSample, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = frame.width;
    let src_height = frame.height;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as u32;
            let y0 = src_y as u32;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let p00 = frame.luma_at(x0, y0) as f32;
            let p01 = frame.luma_at(x1, y0) as f32;
            let p10 = frame.luma_at(x0, y1) as f32;
            let p11 = frame.luma_at(x1, y1) as f32;

            let value = p00 * (1.0 - x_frac) * (1.0 - y_frac)
                + p01 * x_frac * (1.0 - y_frac)
                + p10 * (1.0 - x_frac) * y_frac
                + p11 * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    #[test]
    fn test_copy_luma_removes_stride() {
        // 2x2 RGBA frame with 2 bytes of padding per row
        let data: Vec<u8> = vec![
            255, 255, 255, 255, // white
            0, 0, 0, 255, // black
            0, 0, // stride padding
            0, 0, 0, 255, // black
            255, 255, 255, 255, // white
            0, 0, // stride padding
        ];
        let mut frame = FrameSample::from_rgba(2, 2, data, Instant::now());
        frame.stride = 10;
        assert_eq!(frame.format, PixelFormat::Rgba);

        let result = copy_luma(&frame);
        assert_eq!(result.len(), 4);
        assert!(result[0] > 250);
        assert_eq!(result[1], 0);
        assert_eq!(result[2], 0);
        assert!(result[3] > 250);
    }

    #[test]
    fn test_downscale_luma() {
        // 4x2 luma gradient
        let data: Vec<u8> = vec![0, 85, 170, 255, 0, 85, 170, 255];
        let frame = FrameSample::from_luma(4, 2, data, Instant::now());

        let result = downscale_luma(&frame, 2, 1);
        assert_eq!(result.len(), 2);
        assert!(result[0] < 100);
        assert!(result[1] > 150);
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = FrameSample::from_luma(64, 48, vec![255; 64 * 48], Instant::now());
        assert!(detect_sync(&frame, 640).is_empty());
    }

    #[test]
    fn test_empty_frame_has_no_codes() {
        let frame = FrameSample::from_luma(0, 0, Vec::new(), Instant::now());
        assert!(detect_sync(&frame, 640).is_empty());
    }

    #[tokio::test]
    async fn test_detect_through_service() {
        let detector = QrDetector::with_max_dimension(32);
        let frame = Arc::new(FrameSample::from_luma(
            100,
            50,
            vec![128; 100 * 50],
            Instant::now(),
        ));
        let symbols = detector.detect(frame).await.unwrap();
        assert!(symbols.is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_image() {
        let detector = QrDetector::new();
        let path = std::env::temp_dir().join("qrscan-missing-image-test.png");
        let err = detector.read_image(&path).await.unwrap_err();
        assert_eq!(err, StillImageReadError::NotFound(path));
    }

    #[tokio::test]
    async fn test_read_undecodable_image() {
        let path = std::env::temp_dir().join(format!("qrscan-garbage-{}.png", std::process::id()));
        std::fs::write(&path, b"not an image").unwrap();

        let err = QrDetector::new().read_image(&path).await.unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, StillImageReadError::Decode(_)));
    }

    #[tokio::test]
    async fn test_read_blank_png() {
        let path = std::env::temp_dir().join(format!("qrscan-blank-{}.png", std::process::id()));
        image::GrayImage::from_pixel(40, 40, image::Luma([255])).save(&path).unwrap();

        let symbols = QrDetector::new().read_image(&path).await.unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(symbols.is_empty());
    }
}
