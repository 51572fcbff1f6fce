// SPDX-License-Identifier: GPL-3.0-only

//! Detection rate limiter
//!
//! Cameras deliver 30-60 frames per second; the detector only needs a
//! fraction of them. The throttle admits a frame only when no detection is
//! outstanding and at least `min_interval` has passed since the previous
//! admission, which bounds both concurrency (one call in flight) and rate.
//!
//! Every admission and every reset advances an [`Admission`] number. A
//! detection admitted before a reset may still finish afterwards; its
//! completion carries an outdated number and is ignored.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::trace;

/// Number identifying one admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Admission(u64);

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rate limiter + in-flight guard for detection calls
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_processed_at: Option<Instant>,
    in_flight: bool,
    admission: Admission,
}

impl FrameThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_processed_at: None,
            in_flight: false,
            admission: Admission::default(),
        }
    }

    /// Throttle allowing at most `rate` detections per second
    pub fn with_rate(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            crate::constants::throttle::DEFAULT_MAX_DETECTIONS_PER_SECOND
        };
        Self::new(Duration::from_secs_f64(1.0 / rate))
    }

    /// Decide whether the frame captured at `now` goes to the detector
    ///
    /// Admission marks a detection as in flight; the caller must hand the
    /// [`admission`](Self::admission) number back to
    /// [`complete`](Self::complete) when it finishes, successfully or not.
    pub fn should_process(&mut self, now: Instant) -> bool {
        if self.in_flight {
            trace!("Frame skipped, detection in flight");
            return false;
        }
        if let Some(last) = self.last_processed_at
            && now.saturating_duration_since(last) < self.min_interval
        {
            return false;
        }
        self.in_flight = true;
        self.last_processed_at = Some(now);
        self.admission.0 += 1;
        true
    }

    /// Number of the latest admission (or reset)
    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Mark the outstanding detection as finished
    pub fn release(&mut self) {
        self.in_flight = false;
    }

    /// Release the detection admitted as `admission`
    ///
    /// Returns `false`, leaving the throttle untouched, when a reset or a
    /// later admission has superseded it.
    pub fn complete(&mut self, admission: Admission) -> bool {
        if admission != self.admission || !self.in_flight {
            trace!(%admission, current = %self.admission, "Outdated completion ignored");
            return false;
        }
        self.in_flight = false;
        true
    }

    /// Forget all history so the next frame is admitted immediately
    ///
    /// Detections admitted before the reset can no longer release the
    /// throttle.
    pub fn reset(&mut self) {
        self.in_flight = false;
        self.last_processed_at = None;
        self.admission.0 += 1;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::with_rate(crate::constants::throttle::DEFAULT_MAX_DETECTIONS_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic arrival offsets in microseconds (xorshift)
    fn arrivals(seed: u64, count: usize, max_gap_us: u64) -> Vec<u64> {
        let mut state = seed;
        let mut t = 0;
        (0..count)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                t += state % max_gap_us;
                t
            })
            .collect()
    }

    #[test]
    fn test_first_frame_admitted() {
        let mut throttle = FrameThrottle::default();
        assert!(throttle.should_process(Instant::now()));
        assert!(throttle.is_in_flight());
    }

    #[test]
    fn test_in_flight_blocks_admission() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(10));
        let base = Instant::now();
        assert!(throttle.should_process(base));
        assert!(!throttle.should_process(base + Duration::from_secs(1)));
        throttle.release();
        assert!(throttle.should_process(base + Duration::from_secs(1)));
    }

    #[test]
    fn test_interval_blocks_admission() {
        let mut throttle = FrameThrottle::with_rate(12.0);
        let base = Instant::now();
        assert!(throttle.should_process(base));
        throttle.release();
        assert!(!throttle.should_process(base + Duration::from_millis(33)));
        assert!(!throttle.should_process(base + Duration::from_millis(66)));
        assert!(throttle.should_process(base + Duration::from_millis(84)));
    }

    #[test]
    fn test_reset_admits_immediately() {
        let mut throttle = FrameThrottle::with_rate(12.0);
        let base = Instant::now();
        assert!(throttle.should_process(base));
        throttle.reset();
        assert!(throttle.should_process(base + Duration::from_millis(1)));
    }

    #[test]
    fn test_completion_before_reset_is_ignored() {
        let mut throttle = FrameThrottle::with_rate(12.0);
        let base = Instant::now();

        assert!(throttle.should_process(base));
        let before_reset = throttle.admission();
        throttle.reset();

        assert!(throttle.should_process(base + Duration::from_millis(1)));
        let after_reset = throttle.admission();
        assert!(after_reset > before_reset);

        // The old call finishing must not free the slot of the new one
        assert!(!throttle.complete(before_reset));
        assert!(throttle.is_in_flight());
        assert!(!throttle.should_process(base + Duration::from_secs(1)));

        assert!(throttle.complete(after_reset));
        assert!(!throttle.is_in_flight());
        assert!(!throttle.complete(after_reset));
    }

    #[test]
    fn test_admissions_bounded_in_any_window() {
        let interval = Duration::from_secs_f64(1.0 / 12.0);
        let window = Duration::from_millis(500);
        let bound = (window.as_secs_f64() / interval.as_secs_f64()).ceil() as usize;

        for seed in [1u64, 7, 42, 1234, 98765] {
            let mut throttle = FrameThrottle::new(interval);
            let base = Instant::now();
            let mut admitted = Vec::new();

            for offset in arrivals(seed, 400, 40_000) {
                let now = base + Duration::from_micros(offset);
                if throttle.should_process(now) {
                    // Only one outstanding call at a time
                    assert!(!throttle.should_process(now));
                    admitted.push(now);
                    throttle.release();
                }
            }

            for (i, start) in admitted.iter().enumerate() {
                let in_window = admitted[i..]
                    .iter()
                    .take_while(|t| t.duration_since(*start) < window)
                    .count();
                assert!(
                    in_window <= bound,
                    "seed {}: {} admissions in {:?}",
                    seed,
                    in_window,
                    window
                );
            }
        }
    }

    #[test]
    fn test_invalid_rate_falls_back_to_default() {
        let throttle = FrameThrottle::with_rate(0.0);
        assert_eq!(throttle.min_interval(), FrameThrottle::default().min_interval());
    }
}
