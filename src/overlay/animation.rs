// SPDX-License-Identifier: GPL-3.0-only

//! Animation timing
//!
//! [`AnimationClock`] measures elapsed time excluding pauses, so pausing and
//! resuming never makes the animation jump. [`CubicBezier`] is the easing
//! curve applied to each half sweep.

use crate::constants::scan_line::{BEZIER_X1, BEZIER_X2, BEZIER_Y1, BEZIER_Y2};
use std::time::{Duration, Instant};

/// Newton-Raphson iterations before giving up
const NEWTON_ITERATIONS: usize = 8;
/// Derivative magnitude below which Newton stops
const NEWTON_MIN_SLOPE: f64 = 1e-6;
/// Step size at which Newton is considered converged
const NEWTON_PRECISION: f64 = 1e-7;
/// Largest x error accepted from Newton before bisecting instead
const SOLVE_TOLERANCE: f64 = 1e-6;
/// Bisection steps used when Newton does not converge
const BISECTION_ITERATIONS: usize = 12;

/// Cubic bezier easing curve through (0,0) and (1,1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    /// Standard ease-in-out (0.42, 0, 0.58, 1)
    pub const EASE_IN_OUT: CubicBezier = CubicBezier {
        x1: BEZIER_X1,
        y1: BEZIER_Y1,
        x2: BEZIER_X2,
        y2: BEZIER_Y2,
    };

    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Eased value for input `x` in `[0, 1]`
    pub fn ease(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        let t = self.solve_parameter(x);
        bezier(t, self.y1, self.y2)
    }

    /// Curve x coordinate at parameter `t`
    pub fn x_at(&self, t: f64) -> f64 {
        bezier(t, self.x1, self.x2)
    }

    /// Curve parameter `t` whose x coordinate is `x`
    pub fn solve_parameter(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let error = bezier(t, self.x1, self.x2) - x;
            let slope = bezier_derivative(t, self.x1, self.x2);
            if slope.abs() < NEWTON_MIN_SLOPE {
                break;
            }
            let next = t - error / slope;
            if (next - t).abs() < NEWTON_PRECISION {
                t = next;
                break;
            }
            t = next.clamp(0.0, 1.0);
        }

        let converged = (0.0..=1.0).contains(&t)
            && (bezier(t, self.x1, self.x2) - x).abs() <= SOLVE_TOLERANCE;
        if converged { t } else { self.bisect(x) }
    }

    fn bisect(&self, x: f64) -> f64 {
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..BISECTION_ITERATIONS {
            let mid = (lo + hi) * 0.5;
            if bezier(mid, self.x1, self.x2) < x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (lo + hi) * 0.5
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        Self::EASE_IN_OUT
    }
}

/// One axis of a bezier with P0 = 0, P1 = a1, P2 = a2, P3 = 1
fn bezier(t: f64, a1: f64, a2: f64) -> f64 {
    let c = 3.0 * a1;
    let b = 3.0 * (a2 - a1) - c;
    let a = 1.0 - c - b;
    ((a * t + b) * t + c) * t
}

fn bezier_derivative(t: f64, a1: f64, a2: f64) -> f64 {
    let c = 3.0 * a1;
    let b = 3.0 * (a2 - a1) - c;
    let a = 1.0 - c - b;
    (3.0 * a * t + 2.0 * b) * t + c
}

/// Position of the sweep for `elapsed` time
///
/// One half period moves top to bottom, the next bottom to top. Returns the
/// eased progress (0 = top, 1 = bottom).
pub fn sweep_progress(elapsed: Duration, half_period: Duration, curve: &CubicBezier) -> f64 {
    let half = half_period
        .as_secs_f64()
        .max(crate::constants::scan_line::MIN_HALF_PERIOD_SECS);
    let phase = (elapsed.as_secs_f64() / half) % 2.0;
    if phase < 1.0 {
        curve.ease(phase)
    } else {
        1.0 - curve.ease(phase - 1.0)
    }
}

/// Clock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Pause-aware animation clock
#[derive(Debug, Clone, Default)]
pub struct AnimationClock {
    state: ClockState,
    start: Option<Instant>,
    accumulated_pause: Duration,
    paused_at: Option<Instant>,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from zero (restarts a running clock)
    pub fn start(&mut self, now: Instant) {
        self.state = ClockState::Running;
        self.start = Some(now);
        self.accumulated_pause = Duration::ZERO;
        self.paused_at = None;
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }

    /// Freeze elapsed time (only while running)
    pub fn pause(&mut self, now: Instant) {
        if self.state != ClockState::Running {
            return;
        }
        self.state = ClockState::Paused;
        self.paused_at = Some(now);
    }

    /// Continue from where the clock was paused (only while paused)
    pub fn resume(&mut self, now: Instant) {
        if self.state != ClockState::Paused {
            return;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.accumulated_pause += now.saturating_duration_since(paused_at);
        }
        self.state = ClockState::Running;
    }

    /// Running time excluding pauses
    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(start) = self.start else {
            return Duration::ZERO;
        };
        let reference = match (self.state, self.paused_at) {
            (ClockState::Paused, Some(paused_at)) => paused_at,
            _ => now,
        };
        reference
            .saturating_duration_since(start)
            .saturating_sub(self.accumulated_pause)
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == ClockState::Paused
    }
}
