// SPDX-License-Identifier: MPL-2.0

//! Detection tasks
//!
//! The session controller only knows the [`DetectionService`] seam. The
//! built-in implementation is [`qr_detector::QrDetector`].

pub mod qr_detector;

use crate::backends::camera::types::FrameSample;
use crate::errors::DetectionServiceError;
use crate::frame_processor::types::DetectedSymbol;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Asynchronous barcode detector
///
/// Implementations may complete on any thread. A call that returns an empty
/// list found nothing; an error affects only that frame.
pub trait DetectionService: Send + Sync {
    fn detect(
        &self,
        frame: Arc<FrameSample>,
    ) -> BoxFuture<'static, Result<Vec<DetectedSymbol>, DetectionServiceError>>;
}
