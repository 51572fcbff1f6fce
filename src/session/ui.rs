// SPDX-License-Identifier: GPL-3.0-only

//! UI context
//!
//! Everything visible goes through a [`PreviewHost`]: the camera preview
//! layer, the freeze image and the scan line overlay. The context owns the
//! host and the animator and redraws the overlay on a fixed interval while
//! the animation runs.

use super::state::{Epoch, Generation};
use crate::backends::camera::LensPosition;
use crate::frame_processor::FreezeImage;
use crate::overlay::{ScanLineAnimator, ScanLineStyle, Viewport};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// View layer the controller draws into
///
/// All methods are called from the UI context only.
pub trait PreviewHost: Send + 'static {
    /// Insert the live preview for `lens` (mirrored for the front camera)
    fn attach_preview(&mut self, lens: LensPosition, mirrored: bool);

    /// Remove the live preview
    fn detach_preview(&mut self);

    /// Cover the preview with a still image (`None` shows nothing over it)
    fn show_freeze(&mut self, image: Option<FreezeImage>);

    fn hide_freeze(&mut self);

    /// Current layout of the preview area
    fn viewport(&self) -> Viewport;

    /// New layout size for the preview area
    fn resize(&mut self, viewport: Viewport);

    /// Redraw the overlay at the animator's current position
    fn draw_overlay(&mut self, animator: &ScanLineAnimator);

    /// Remove the overlay from the view
    fn clear_overlay(&mut self);
}

pub(crate) enum UiCommand {
    Attach {
        epoch: Epoch,
        lens: LensPosition,
        reply: oneshot::Sender<bool>,
    },
    Detach {
        reply: oneshot::Sender<()>,
    },
    Pause {
        epoch: Epoch,
        freeze: Option<FreezeImage>,
        reply: oneshot::Sender<()>,
    },
    Resume {
        epoch: Epoch,
        reply: oneshot::Sender<()>,
    },
    Resize {
        viewport: Viewport,
    },
}

pub(crate) struct UiContext {
    host: Box<dyn PreviewHost>,
    generation: Generation,
    style: ScanLineStyle,
    animator: Option<ScanLineAnimator>,
    redraw_period: Duration,
}

impl UiContext {
    pub fn new(
        host: Box<dyn PreviewHost>,
        generation: Generation,
        style: ScanLineStyle,
        redraw_fps: u32,
    ) -> Self {
        Self {
            host,
            generation,
            style,
            animator: None,
            redraw_period: Duration::from_secs_f64(1.0 / redraw_fps.max(1) as f64),
        }
    }

    fn is_animating(&self) -> bool {
        self.animator.as_ref().is_some_and(|a| a.is_running())
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<UiCommand>) {
        let mut redraw = tokio::time::interval(self.redraw_period);
        redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(period_ms = self.redraw_period.as_millis(), "UI context started");

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = redraw.tick(), if self.is_animating() => self.redraw(),
            }
        }

        if self.animator.take().is_some() {
            self.host.clear_overlay();
            self.host.detach_preview();
        }
        debug!("UI context stopped");
    }

    fn redraw(&mut self) {
        if let Some(animator) = self.animator.as_mut() {
            animator.tick(Instant::now());
            self.host.draw_overlay(animator);
        }
    }

    fn handle(&mut self, command: UiCommand) {
        match command {
            UiCommand::Attach { epoch, lens, reply } => {
                if !self.generation.is_current(epoch) {
                    trace!(%epoch, "Preview attach superseded");
                    let _ = reply.send(false);
                    return;
                }
                self.host.attach_preview(lens, lens.mirrored());
                let mut animator = ScanLineAnimator::new(self.style.clone(), self.host.viewport());
                animator.start(Instant::now());
                self.host.draw_overlay(&animator);
                self.animator = Some(animator);
                debug!(%lens, %epoch, "Preview attached");
                let _ = reply.send(true);
            }
            UiCommand::Detach { reply } => {
                if let Some(mut animator) = self.animator.take() {
                    animator.stop();
                    self.host.clear_overlay();
                }
                self.host.detach_preview();
                self.host.hide_freeze();
                let _ = reply.send(());
            }
            UiCommand::Pause {
                epoch,
                freeze,
                reply,
            } => {
                if self.generation.is_current(epoch) {
                    if let Some(animator) = self.animator.as_mut() {
                        animator.pause(Instant::now());
                    }
                    self.host.show_freeze(freeze);
                }
                let _ = reply.send(());
            }
            UiCommand::Resume { epoch, reply } => {
                if self.generation.is_current(epoch) {
                    self.host.hide_freeze();
                    if let Some(animator) = self.animator.as_mut() {
                        animator.resume(Instant::now());
                    }
                }
                let _ = reply.send(());
            }
            UiCommand::Resize { viewport } => {
                self.host.resize(viewport);
                if let Some(animator) = self.animator.as_mut() {
                    animator.set_viewport(viewport);
                    self.host.draw_overlay(animator);
                }
            }
        }
    }
}

/// What a [`HeadlessPreview`] has been asked to show
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    /// Lens and mirroring of the attached preview
    pub attached: Option<(LensPosition, bool)>,
    pub attach_count: usize,
    pub detach_count: usize,
    /// Freeze image currently shown
    pub freeze: Option<FreezeImage>,
    pub freeze_visible: bool,
    pub overlay_visible: bool,
    /// Number of overlay redraws
    pub overlay_draws: u64,
    /// Line position of the last redraw
    pub line_y: Option<f64>,
    pub viewport: Viewport,
}

/// Preview host without a display
///
/// Records every request so the CLI and tests can see what a real view
/// would show. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPreview {
    state: Arc<Mutex<PreviewState>>,
}

impl HeadlessPreview {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: Arc::new(Mutex::new(PreviewState {
                viewport,
                ..PreviewState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PreviewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the recorded state
    pub fn snapshot(&self) -> PreviewState {
        self.lock().clone()
    }
}

impl PreviewHost for HeadlessPreview {
    fn attach_preview(&mut self, lens: LensPosition, mirrored: bool) {
        let mut state = self.lock();
        state.attached = Some((lens, mirrored));
        state.attach_count += 1;
    }

    fn detach_preview(&mut self) {
        let mut state = self.lock();
        if state.attached.take().is_some() {
            state.detach_count += 1;
        }
    }

    fn show_freeze(&mut self, image: Option<FreezeImage>) {
        let mut state = self.lock();
        state.freeze_visible = image.is_some();
        state.freeze = image;
    }

    fn hide_freeze(&mut self) {
        let mut state = self.lock();
        state.freeze = None;
        state.freeze_visible = false;
    }

    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn resize(&mut self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    fn draw_overlay(&mut self, animator: &ScanLineAnimator) {
        let mut state = self.lock();
        state.overlay_visible = true;
        state.overlay_draws += 1;
        state.line_y = Some(animator.current_frame().y);
    }

    fn clear_overlay(&mut self) {
        let mut state = self.lock();
        state.overlay_visible = false;
        state.line_y = None;
    }
}
