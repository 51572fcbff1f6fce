// SPDX-License-Identifier: MPL-2.0

//! Frame processing for barcode detection
//!
//! Frames delivered by the camera pass through the [`throttle::FrameThrottle`]
//! before reaching a [`tasks::DetectionService`]. Frames that produced a
//! detection are kept in the [`freeze::FreezeFrameBuffer`] so a paused
//! preview can show them.

pub mod freeze;
pub mod tasks;
pub mod throttle;
pub mod types;

pub use freeze::{FreezeFrameBuffer, FreezeImage};
pub use tasks::DetectionService;
pub use tasks::qr_detector::QrDetector;
pub use throttle::{Admission, FrameThrottle};
pub use types::{DetectedSymbol, DetectionResult, Point, Quad, Symbology};
