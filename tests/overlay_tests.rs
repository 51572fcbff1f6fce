// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the scan line overlay

use qrscan::overlay::{
    DrawOp, RasterSurface, RecordingSurface, ScanLineAnimator, ScanLineStyle, Viewport,
};
use std::time::{Duration, Instant};

const EPSILON: f64 = 1e-9;

fn viewport() -> Viewport {
    Viewport::new(400.0, 800.0).with_status_bar(40.0).with_scale(2.0)
}

fn started(base: Instant) -> ScanLineAnimator {
    let mut animator = ScanLineAnimator::new(ScanLineStyle::default(), viewport());
    animator.start(base);
    animator
}

#[test]
fn test_sweep_stays_in_bounds_and_trail_follows() {
    let style = ScanLineStyle::default();
    let vp = viewport();
    let top = style.top(&vp);
    let bottom = style.bottom(&vp);

    let base = Instant::now();
    let mut animator = started(base);

    for step in 0..500u64 {
        let frame = animator.tick(base + Duration::from_millis(16 * step));
        assert!(
            frame.y >= top - EPSILON && frame.y <= bottom + EPSILON,
            "line left its bounds at step {}: {}",
            step,
            frame.y
        );

        let geometry = animator.geometry().unwrap();
        let Some((trail, _)) = geometry.trail else {
            continue;
        };
        assert!(trail.y >= -EPSILON && trail.bottom() <= vp.height + EPSILON);
        if frame.going_down {
            assert!(trail.bottom() <= geometry.line.y + EPSILON, "step {}", step);
        } else {
            assert!(trail.y >= geometry.line.bottom() - EPSILON, "step {}", step);
        }
    }
}

#[test]
fn test_sweep_is_periodic() {
    let base = Instant::now();
    let mut first = started(base);
    let mut second = started(base);

    // One period is a sweep down plus a sweep up
    for ms in [0u64, 300, 1000, 1700, 2600, 3900] {
        let a = first.tick(base + Duration::from_millis(ms));
        let b = second.tick(base + Duration::from_millis(ms + 4000));
        assert!((a.y - b.y).abs() < 1e-6, "at {} ms: {} vs {}", ms, a.y, b.y);
    }
}

#[test]
fn test_pause_holds_position() {
    let base = Instant::now();
    let mut paused = started(base);
    let mut reference = started(base);

    let before = paused.tick(base + Duration::from_millis(500));
    paused.pause(base + Duration::from_millis(500));
    let held = paused.tick(base + Duration::from_millis(1200));
    assert_eq!(held.y, before.y);

    paused.resume(base + Duration::from_millis(1500));
    let resumed = paused.tick(base + Duration::from_millis(2000));
    let expected = reference.tick(base + Duration::from_millis(1000));
    assert!((resumed.y - expected.y).abs() < 1e-6);
}

#[test]
fn test_trail_is_drawn_before_line() {
    let base = Instant::now();
    let mut animator = started(base);
    animator.tick(base + Duration::from_millis(800));

    let mut surface = RecordingSurface::new();
    animator.draw(&mut surface);

    assert_eq!(surface.ops.len(), 2);
    assert!(matches!(surface.ops[0], DrawOp::Gradient(_, _)));
    assert!(matches!(surface.ops[1], DrawOp::Rect(_, _)));
}

#[test]
fn test_raster_render_at_top() {
    let base = Instant::now();
    let mut animator = started(base);
    animator.tick(base);

    let vp = viewport();
    let mut surface = RasterSurface::new(&vp);
    animator.draw(&mut surface);
    let image = surface.into_image();
    assert_eq!(image.dimensions(), (800, 1600));

    // Line centred on y = 124 pt, 2 pt thick, at 2x: rows 246..250
    assert_eq!(image.get_pixel(400, 248).0, [255, 255, 255, 255]);

    // Outside the line's width nothing is drawn
    assert_eq!(image.get_pixel(10, 248).0[3], 0);

    // Moving down: the trail fades in above the line, nothing below it
    let near = image.get_pixel(400, 245).0[3];
    assert!((70..=90).contains(&near), "alpha next to line: {}", near);
    assert!(image.get_pixel(400, 0).0[3] <= 1);
    assert_eq!(image.get_pixel(400, 260).0[3], 0);
}

#[test]
fn test_empty_viewport_draws_nothing() {
    let mut animator = ScanLineAnimator::new(ScanLineStyle::default(), Viewport::new(0.0, 0.0));
    let base = Instant::now();
    animator.start(base);
    animator.tick(base + Duration::from_millis(100));

    let mut surface = RecordingSurface::new();
    animator.draw(&mut surface);
    assert!(surface.ops.is_empty());
}
