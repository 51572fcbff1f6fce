// SPDX-License-Identifier: GPL-3.0-only
//! Paced frame loop thread
//!
//! Runs a frame-producing closure on its own thread at a fixed rate until the
//! closure asks to stop or the controller is stopped. Used by the synthetic
//! camera to emulate a sensor's delivery thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest single sleep, so a stop request is noticed quickly
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(5);

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep producing frames
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a paced loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let mut controller = FrameLoopController::start("camera", 30, move |tick| {
///     sink.deliver(next_frame(tick));
///     LoopAction::Continue
/// });
///
/// controller.stop();
/// ```
pub struct FrameLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl FrameLoopController {
    /// Start the loop at `fps` iterations per second
    ///
    /// The closure receives the iteration index, starting at 0.
    pub fn start<F>(name: &str, fps: u32, mut loop_fn: F) -> Self
    where
        F: FnMut(u64) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        info!(name = %name, fps, "Starting frame loop");

        let thread_handle = thread::spawn(move || {
            let started = Instant::now();
            let mut tick: u64 = 0;

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                if loop_fn(tick) == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }
                tick += 1;

                // Sleep until the next deadline in short slices
                let deadline = started + period.mul_f64(tick as f64);
                loop {
                    let now = Instant::now();
                    if now >= deadline || stop_signal_clone.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::sleep((deadline - now).min(MAX_SLEEP_SLICE));
                }
            }

            info!(name = %name_clone, frames = tick, "Frame loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.thread_handle.take()
            && let Err(e) = handle.join()
        {
            warn!(name = %self.name, "Frame loop thread panicked: {:?}", e);
        }
    }
}

impl Drop for FrameLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU64::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = FrameLoopController::start("test-loop", 1000, move |tick| {
            counter_clone.store(tick, Ordering::SeqCst);
            if tick >= 4 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        while controller.is_running() {
            thread::sleep(Duration::from_millis(1));
        }
        controller.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_loop_is_paced() {
        let counter = Arc::new(AtomicU64::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = FrameLoopController::start("test-paced", 20, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            LoopAction::Continue
        });

        thread::sleep(Duration::from_millis(120));
        controller.stop();

        // 20 fps for 120ms is ~3 iterations; never anywhere near unpaced
        let count = counter.load(Ordering::SeqCst);
        assert!(count >= 1);
        assert!(count <= 6, "loop ran {} times", count);
    }

    #[test]
    fn test_drop_stops_loop() {
        let controller = FrameLoopController::start("test-drop", 100, |_| LoopAction::Continue);
        assert!(controller.is_running());
        drop(controller);
    }
}
