// SPDX-License-Identifier: GPL-3.0-only

//! Scan line animator
//!
//! The line sweeps from a top bound below the status bar down to 70% of the
//! view height and back, eased on each half sweep. A gradient trail is drawn
//! on the side the line is coming from and never overlaps the line itself.

use super::animation::{AnimationClock, ClockState, CubicBezier, sweep_progress};
use super::{Color, DrawSurface, GradientStop, Rect, Viewport};
use crate::constants::scan_line as defaults;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::trace;

/// Trails at or below this height (points) are not drawn
const MIN_TRAIL_HEIGHT: f64 = 0.5;

/// Visual parameters of the scan line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanLineStyle {
    /// Duration of one top-to-bottom sweep in milliseconds
    pub duration_ms: u64,
    /// Line width as a fraction of the view width
    pub line_width_factor: f64,
    /// Line thickness in points
    pub line_height: f64,
    pub color: Color,
    /// Trail length in points
    pub trail_length: f64,
    /// Trail alpha next to the line
    pub trail_alpha_near: f64,
    /// Trail alpha at the middle stop
    pub trail_alpha_mid: f64,
    /// Added to 3x the status bar height to get the top bound
    pub status_bar_offset_factor: f64,
    /// Bottom bound as a fraction of the view height
    pub bottom_factor: f64,
}

impl Default for ScanLineStyle {
    fn default() -> Self {
        Self {
            duration_ms: defaults::DEFAULT_SWEEP_DURATION.as_millis() as u64,
            line_width_factor: defaults::LINE_WIDTH_FACTOR,
            line_height: defaults::LINE_HEIGHT,
            color: Color::WHITE,
            trail_length: defaults::TRAIL_LENGTH,
            trail_alpha_near: defaults::TRAIL_ALPHA_NEAR,
            trail_alpha_mid: defaults::TRAIL_ALPHA_MID,
            status_bar_offset_factor: defaults::STATUS_BAR_OFFSET_FACTOR,
            bottom_factor: defaults::BOTTOM_FACTOR,
        }
    }
}

impl ScanLineStyle {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Y of the line at progress 0
    pub fn top(&self, viewport: &Viewport) -> f64 {
        viewport.status_bar_height * (3.0 + self.status_bar_offset_factor)
    }

    /// Y of the line at progress 1
    pub fn bottom(&self, viewport: &Viewport) -> f64 {
        viewport.height * self.bottom_factor
    }

    fn trail_stops(&self, going_down: bool) -> Vec<GradientStop> {
        let far = self.color.with_alpha(0.0);
        let mid = self.color.with_alpha(self.trail_alpha_mid);
        let near = self.color.with_alpha(self.trail_alpha_near);
        if going_down {
            vec![
                GradientStop::new(0.0, far),
                GradientStop::new(defaults::TRAIL_MID_STOP_DOWN, mid),
                GradientStop::new(1.0, near),
            ]
        } else {
            vec![
                GradientStop::new(0.0, near),
                GradientStop::new(defaults::TRAIL_MID_STOP_UP, mid),
                GradientStop::new(1.0, far),
            ]
        }
    }
}

/// Result of one animation tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanLineFrame {
    /// Line center in points (not yet snapped)
    pub y: f64,
    /// Eased sweep progress, 0 = top, 1 = bottom
    pub progress: f64,
    pub going_down: bool,
}

/// Rectangles to draw for the current line position
#[derive(Debug, Clone, PartialEq)]
pub struct ScanLineGeometry {
    pub line: Rect,
    pub trail: Option<(Rect, Vec<GradientStop>)>,
}

/// Drives the scan line: timing, position and drawing
#[derive(Debug, Clone)]
pub struct ScanLineAnimator {
    style: ScanLineStyle,
    curve: CubicBezier,
    clock: AnimationClock,
    viewport: Viewport,
    current_y: f64,
    last_y: Option<f64>,
    going_down: bool,
}

impl ScanLineAnimator {
    pub fn new(style: ScanLineStyle, viewport: Viewport) -> Self {
        let current_y = style.top(&viewport);
        Self {
            style,
            curve: CubicBezier::EASE_IN_OUT,
            clock: AnimationClock::new(),
            viewport,
            current_y,
            last_y: None,
            going_down: true,
        }
    }

    pub fn with_curve(mut self, curve: CubicBezier) -> Self {
        self.curve = curve;
        self
    }

    /// Start sweeping from the top
    pub fn start(&mut self, now: Instant) {
        self.clock.start(now);
        self.reset_position();
    }

    /// Stop and park the line at the top
    pub fn stop(&mut self) {
        self.clock.stop();
        self.reset_position();
    }

    pub fn pause(&mut self, now: Instant) {
        self.clock.pause(now);
    }

    pub fn resume(&mut self, now: Instant) {
        self.clock.resume(now);
    }

    pub fn state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Apply a new layout; a stopped line is re-parked at the new top
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if self.clock.state() == ClockState::Stopped {
            self.reset_position();
        }
    }

    fn reset_position(&mut self) {
        self.current_y = self.style.top(&self.viewport);
        self.last_y = None;
        self.going_down = true;
    }

    /// Elapsed animation time at `now`, pauses excluded
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.clock.elapsed(now)
    }

    /// Advance the animation to `now`
    ///
    /// Only a running animation moves; stopped and paused animators return
    /// their current position unchanged.
    pub fn tick(&mut self, now: Instant) -> ScanLineFrame {
        if !self.clock.is_running() {
            return self.current_frame();
        }

        let progress = sweep_progress(self.clock.elapsed(now), self.style.duration(), &self.curve);
        let top = self.style.top(&self.viewport);
        let bottom = self.style.bottom(&self.viewport);
        let y = top + (bottom - top) * progress;

        self.going_down = self.last_y.is_none_or(|last| y >= last);
        self.last_y = Some(y);
        self.current_y = y;

        trace!(y, progress, going_down = self.going_down, "Scan line tick");
        ScanLineFrame {
            y,
            progress,
            going_down: self.going_down,
        }
    }

    /// Position as of the last tick
    pub fn current_frame(&self) -> ScanLineFrame {
        let top = self.style.top(&self.viewport);
        let bottom = self.style.bottom(&self.viewport);
        let span = bottom - top;
        let progress = if span.abs() > f64::EPSILON {
            (self.current_y - top) / span
        } else {
            0.0
        };
        ScanLineFrame {
            y: self.current_y,
            progress,
            going_down: self.going_down,
        }
    }

    /// Rectangles for the line and its trail, `None` for an empty view
    pub fn geometry(&self) -> Option<ScanLineGeometry> {
        let vp = &self.viewport;
        if vp.is_empty() {
            return None;
        }

        let width = vp.width * self.style.line_width_factor;
        let x = (vp.width - width) / 2.0;
        let y = vp.snap(self.current_y);
        let half_line = self.style.line_height / 2.0;
        let line_top = y - half_line;
        let line_bottom = y + half_line;
        let min_height = 1.0 / vp.scale;

        let trail = if self.going_down {
            let trail_top = (line_top - self.style.trail_length).max(0.0);
            let available = line_top - trail_top;
            (available > 0.0).then(|| {
                let height = available.max(min_height);
                Rect::new(x, line_top - height, width, height)
            })
        } else {
            let trail_bottom = (line_bottom + self.style.trail_length).min(vp.height);
            let available = trail_bottom - line_bottom;
            (available > 0.0).then(|| {
                let height = available.max(min_height);
                Rect::new(x, line_bottom, width, height)
            })
        }
        .filter(|rect| rect.height > MIN_TRAIL_HEIGHT)
        .map(|rect| (rect, self.style.trail_stops(self.going_down)));

        Some(ScanLineGeometry {
            line: Rect::new(x, line_top, width, self.style.line_height),
            trail,
        })
    }

    /// Draw the trail and then the line
    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        let Some(geometry) = self.geometry() else {
            return;
        };
        if let Some((rect, stops)) = &geometry.trail {
            surface.fill_vertical_gradient(*rect, stops);
        }
        surface.fill_rect(geometry.line, self.style.color);
    }
}
