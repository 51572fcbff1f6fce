// SPDX-License-Identifier: MPL-2.0

//! Scan line overlay
//!
//! The overlay is a horizontal line sweeping up and down over the preview
//! with a fading trail behind it. Geometry is computed in points; a
//! [`DrawSurface`] maps points to device pixels.
//!
//! # Coordinate System
//!
//! The origin is the top-left corner of the view, y grows downwards.
//! `Viewport::scale` is the number of device pixels per point.

pub mod animation;
pub mod scan_line;

pub use animation::{AnimationClock, ClockState, CubicBezier};
pub use scan_line::{ScanLineAnimator, ScanLineFrame, ScanLineGeometry, ScanLineStyle};

use serde::{Deserialize, Serialize};

/// RGBA color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with a different alpha
    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }

    fn lerp(self, other: Color, t: f64) -> Color {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Color::rgba(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

/// Axis-aligned rectangle in points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// One color stop of a vertical gradient (`offset` 0 = top, 1 = bottom)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Color,
}

impl GradientStop {
    pub fn new(offset: f64, color: Color) -> Self {
        Self { offset, color }
    }
}

/// Color of a multi-stop gradient at `t` (stops sorted by offset)
pub fn gradient_color_at(stops: &[GradientStop], t: f64) -> Color {
    let Some(first) = stops.first() else {
        return Color::rgba(0.0, 0.0, 0.0, 0.0);
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let local = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            return a.color.lerp(b.color, local);
        }
    }
    stops[stops.len() - 1].color
}

/// Size and pixel density of the view the overlay draws into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
    /// Height of the status bar / top safe area in points
    pub status_bar_height: f64,
    /// Device pixels per point
    pub scale: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            status_bar_height: 0.0,
            scale: 1.0,
        }
    }

    pub fn with_status_bar(mut self, status_bar_height: f64) -> Self {
        self.status_bar_height = status_bar_height;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = if scale > 0.0 { scale } else { 1.0 };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Round a coordinate to the device pixel grid
    pub fn snap(&self, value: f64) -> f64 {
        (value * self.scale).round() / self.scale
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::new(390.0, 844.0)
            .with_status_bar(47.0)
            .with_scale(3.0)
    }
}

/// Drawing target for the overlay
pub trait DrawSurface {
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Fill `rect` with a gradient running from its top edge to its bottom edge
    fn fill_vertical_gradient(&mut self, rect: Rect, stops: &[GradientStop]);
}

/// Software surface backed by an RGBA image
///
/// Used by the CLI to render overlay frames and by tests.
pub struct RasterSurface {
    image: image::RgbaImage,
    scale: f64,
}

impl RasterSurface {
    /// Transparent surface covering `viewport` at its pixel density
    pub fn new(viewport: &Viewport) -> Self {
        let width = (viewport.width * viewport.scale).round().max(0.0) as u32;
        let height = (viewport.height * viewport.scale).round().max(0.0) as u32;
        Self {
            image: image::RgbaImage::new(width, height),
            scale: viewport.scale,
        }
    }

    /// Draw over an existing image (e.g. a freeze frame)
    pub fn with_background(image: image::RgbaImage, scale: f64) -> Self {
        Self { image, scale }
    }

    pub fn image(&self) -> &image::RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> image::RgbaImage {
        self.image
    }

    /// Pixel rows and columns covered by `rect`, clipped to the image
    fn pixel_bounds(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let clip = |v: f64, max: u32| (v * self.scale).round().clamp(0.0, max as f64) as u32;
        let x0 = clip(rect.x, self.image.width());
        let x1 = clip(rect.right(), self.image.width());
        let y0 = clip(rect.y, self.image.height());
        let y1 = clip(rect.bottom(), self.image.height());
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn blend(&mut self, x: u32, y: u32, color: Color) {
        let pixel = self.image.get_pixel_mut(x, y);
        let alpha = color.a.clamp(0.0, 1.0);
        let dst_alpha = pixel.0[3] as f64 / 255.0;
        let out_alpha = alpha + dst_alpha * (1.0 - alpha);
        if out_alpha <= 0.0 {
            return;
        }
        let channel = |src: f64, dst: u8| {
            let dst = dst as f64 / 255.0;
            let value = (src * alpha + dst * dst_alpha * (1.0 - alpha)) / out_alpha;
            (value * 255.0).round().clamp(0.0, 255.0) as u8
        };
        pixel.0 = [
            channel(color.r, pixel.0[0]),
            channel(color.g, pixel.0[1]),
            channel(color.b, pixel.0[2]),
            (out_alpha * 255.0).round() as u8,
        ];
    }
}

impl DrawSurface for RasterSurface {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    fn fill_vertical_gradient(&mut self, rect: Rect, stops: &[GradientStop]) {
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(rect) else {
            return;
        };
        let top = rect.y * self.scale;
        let height = (rect.height * self.scale).max(f64::EPSILON);
        for y in y0..y1 {
            let t = ((y as f64 + 0.5 - top) / height).clamp(0.0, 1.0);
            let color = gradient_color_at(stops, t);
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }
}

/// Draw call captured by [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect(Rect, Color),
    Gradient(Rect, Vec<GradientStop>),
}

/// Surface that records draw calls instead of rasterizing them
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawSurface for RecordingSurface {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::Rect(rect, color));
    }

    fn fill_vertical_gradient(&mut self, rect: Rect, stops: &[GradientStop]) {
        self.ops.push(DrawOp::Gradient(rect, stops.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_color_at() {
        let stops = [
            GradientStop::new(0.0, Color::WHITE.with_alpha(0.0)),
            GradientStop::new(0.5, Color::WHITE.with_alpha(0.2)),
            GradientStop::new(1.0, Color::WHITE.with_alpha(0.4)),
        ];
        assert_eq!(gradient_color_at(&stops, -1.0).a, 0.0);
        assert!((gradient_color_at(&stops, 0.25).a - 0.1).abs() < 1e-9);
        assert!((gradient_color_at(&stops, 0.75).a - 0.3).abs() < 1e-9);
        assert_eq!(gradient_color_at(&stops, 2.0).a, 0.4);
    }

    #[test]
    fn test_viewport_snap() {
        let viewport = Viewport::new(100.0, 100.0).with_scale(2.0);
        assert_eq!(viewport.snap(10.2), 10.0);
        assert_eq!(viewport.snap(10.3), 10.5);
    }

    #[test]
    fn test_raster_fill_rect_scaled_and_clipped() {
        let viewport = Viewport::new(10.0, 10.0).with_scale(2.0);
        let mut surface = RasterSurface::new(&viewport);
        surface.fill_rect(Rect::new(8.0, 8.0, 5.0, 5.0), Color::WHITE);

        let image = surface.image();
        assert_eq!(image.dimensions(), (20, 20));
        assert_eq!(image.get_pixel(19, 19).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(15, 15).0[3], 0);
    }

    #[test]
    fn test_raster_gradient_increases_downwards() {
        let viewport = Viewport::new(4.0, 10.0);
        let mut surface = RasterSurface::new(&viewport);
        let stops = [
            GradientStop::new(0.0, Color::WHITE.with_alpha(0.0)),
            GradientStop::new(1.0, Color::WHITE.with_alpha(1.0)),
        ];
        surface.fill_vertical_gradient(Rect::new(0.0, 0.0, 4.0, 10.0), &stops);

        let image = surface.image();
        assert!(image.get_pixel(1, 1).0[3] < image.get_pixel(1, 8).0[3]);
    }
}
