// SPDX-License-Identifier: GPL-3.0-only

//! Freeze-frame store
//!
//! When scanning is paused the preview is replaced by a still image. That
//! image must be the frame that produced the most recent successful
//! detection, not whatever frame happened to arrive last. Detected frames
//! go into two slots: a new one is written to the inactive slot and only
//! then published by flipping the active index. The last raw frame is kept
//! separately as a fallback until the first detection.

use crate::backends::camera::types::FrameSample;
use std::sync::Arc;

/// Image kept for the freeze view
pub type FreezeImage = Arc<FrameSample>;

/// Double-buffered freeze image store
#[derive(Debug, Default)]
pub struct FreezeFrameBuffer {
    slots: [Option<FreezeImage>; 2],
    active: usize,
    has_detected_once: bool,
    last_raw: Option<FreezeImage>,
}

impl FreezeFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the latest delivered frame
    pub fn record_raw(&mut self, image: FreezeImage) {
        self.last_raw = Some(image);
    }

    /// Store the frame that produced a non-empty detection
    pub fn record_detected(&mut self, image: FreezeImage) {
        let inactive = 1 - self.active;
        self.slots[inactive] = Some(image);
        self.active = inactive;
        self.has_detected_once = true;
    }

    /// Image to show while paused
    ///
    /// The last detected frame once there has been a detection, otherwise the
    /// last raw frame, otherwise nothing.
    pub fn current_freeze_image(&self) -> Option<FreezeImage> {
        if self.has_detected_once {
            self.slots[self.active].clone()
        } else {
            self.last_raw.clone()
        }
    }

    pub fn has_detected_once(&self) -> bool {
        self.has_detected_once
    }

    /// Drop every stored image
    pub fn clear(&mut self) {
        self.slots = [None, None];
        self.active = 0;
        self.has_detected_once = false;
        self.last_raw = None;
    }
}
