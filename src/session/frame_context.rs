// SPDX-License-Identifier: GPL-3.0-only

//! Frame context
//!
//! Owns the throttle and the freeze buffer. Frames arrive on a bounded
//! queue filled from the capture thread with `try_send`, so a busy context
//! drops late frames instead of building a backlog. Control messages and
//! detection completions share an unbounded queue that is always drained
//! before the next frame is looked at.

use super::ScanEvent;
use super::state::{Epoch, Generation};
use crate::backends::camera::FrameSample;
use crate::errors::{DetectionServiceError, ScanError};
use crate::frame_processor::types::retain_allowed;
use crate::frame_processor::{
    Admission, DetectedSymbol, DetectionResult, DetectionService, FreezeFrameBuffer, FreezeImage,
    FrameThrottle, Symbology,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, trace, warn};

/// A frame tagged with the epoch of the output that delivered it
#[derive(Debug)]
pub(crate) struct FrameMessage {
    pub epoch: Epoch,
    pub sample: FrameSample,
}

pub(crate) enum FrameControl {
    /// New start or stop: forget history, accept frames again
    Reset { epoch: Epoch },
    /// Stop admitting frames and report the freeze image
    Pause {
        epoch: Epoch,
        reply: oneshot::Sender<Option<FreezeImage>>,
    },
    /// Admit frames again, next one immediately
    Resume { epoch: Epoch },
    /// A detection call finished
    Completed {
        epoch: Epoch,
        admission: Admission,
        frame: Arc<FrameSample>,
        result: Result<Vec<DetectedSymbol>, DetectionServiceError>,
    },
    /// Current freeze image without pausing
    Snapshot {
        reply: oneshot::Sender<Option<FreezeImage>>,
    },
}

pub(crate) struct FrameContext {
    generation: Generation,
    detector: Arc<dyn DetectionService>,
    throttle: FrameThrottle,
    freeze: FreezeFrameBuffer,
    symbologies: Vec<Symbology>,
    paused: bool,
    control_tx: mpsc::UnboundedSender<FrameControl>,
    events: broadcast::Sender<ScanEvent>,
}

impl FrameContext {
    pub fn new(
        generation: Generation,
        detector: Arc<dyn DetectionService>,
        throttle: FrameThrottle,
        symbologies: Vec<Symbology>,
        control_tx: mpsc::UnboundedSender<FrameControl>,
        events: broadcast::Sender<ScanEvent>,
    ) -> Self {
        Self {
            generation,
            detector,
            throttle,
            freeze: FreezeFrameBuffer::new(),
            symbologies,
            paused: false,
            control_tx,
            events,
        }
    }

    pub async fn run(
        mut self,
        mut control_rx: mpsc::UnboundedReceiver<FrameControl>,
        mut frame_rx: mpsc::Receiver<FrameMessage>,
    ) {
        debug!("Frame context started");
        loop {
            tokio::select! {
                biased;
                control = control_rx.recv() => match control {
                    Some(control) => self.handle_control(control),
                    None => break,
                },
                frame = frame_rx.recv() => match frame {
                    Some(frame) => self.handle_frame(frame),
                    None => break,
                },
            }
        }
        debug!("Frame context stopped");
    }

    fn handle_control(&mut self, control: FrameControl) {
        match control {
            FrameControl::Reset { epoch } => {
                trace!(%epoch, "Frame context reset");
                self.throttle.reset();
                self.freeze.clear();
                self.paused = false;
            }
            FrameControl::Pause { epoch, reply } => {
                if self.generation.is_current(epoch) {
                    self.paused = true;
                }
                let _ = reply.send(self.freeze.current_freeze_image());
            }
            FrameControl::Resume { epoch } => {
                if self.generation.is_current(epoch) {
                    self.paused = false;
                    self.throttle.reset();
                }
            }
            FrameControl::Completed {
                epoch,
                admission,
                frame,
                result,
            } => self.handle_completion(epoch, admission, frame, result),
            FrameControl::Snapshot { reply } => {
                let _ = reply.send(self.freeze.current_freeze_image());
            }
        }
    }

    fn handle_frame(&mut self, message: FrameMessage) {
        if self.paused || !self.generation.is_current(message.epoch) {
            trace!(epoch = %message.epoch, "Frame dropped");
            return;
        }

        let frame = Arc::new(message.sample);
        self.freeze.record_raw(Arc::clone(&frame));

        if !self.throttle.should_process(frame.captured_at) {
            return;
        }

        let admission = self.throttle.admission();
        trace!(sequence = frame.sequence, %admission, "Frame admitted for detection");
        let detection = self.detector.detect(Arc::clone(&frame));
        let control_tx = self.control_tx.clone();
        let epoch = message.epoch;
        tokio::spawn(async move {
            let result = detection.await;
            let _ = control_tx.send(FrameControl::Completed {
                epoch,
                admission,
                frame,
                result,
            });
        });
    }

    fn handle_completion(
        &mut self,
        epoch: Epoch,
        admission: Admission,
        frame: Arc<FrameSample>,
        result: Result<Vec<DetectedSymbol>, DetectionServiceError>,
    ) {
        if !self.generation.is_current(epoch) {
            trace!(%epoch, "Stale detection result discarded");
            return;
        }

        // Admitted before a resume: the slot now belongs to a newer call
        if !self.throttle.complete(admission) {
            trace!(%admission, "Detection from before the last reset discarded");
            return;
        }

        match result {
            Ok(mut symbols) => {
                retain_allowed(&mut symbols, &self.symbologies);
                if !symbols.is_empty() {
                    debug!(
                        sequence = frame.sequence,
                        count = symbols.len(),
                        "Barcodes detected"
                    );
                    self.freeze.record_detected(Arc::clone(&frame));
                }
                let _ = self
                    .events
                    .send(ScanEvent::Detection(DetectionResult { symbols, frame }));
            }
            Err(err) => {
                warn!(error = %err, sequence = frame.sequence, "Detection failed");
                let _ = self.events.send(ScanEvent::Error(ScanError::Detection(err)));
            }
        }
    }
}
