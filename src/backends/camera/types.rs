// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Physical lens position of a camera
///
/// Serialized as "FRONT" / "BACK"; parsed leniently with
/// [`from_host`](LensPosition::from_host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LensPosition {
    Front,
    #[default]
    Back,
}

impl LensPosition {
    /// Parse the host's lens string ("FRONT" / "BACK"), defaulting to back
    pub fn from_host(value: &str) -> Self {
        if value.eq_ignore_ascii_case("front") {
            LensPosition::Front
        } else {
            LensPosition::Back
        }
    }

    /// Whether frames from this lens are mirrored for display
    pub fn mirrored(&self) -> bool {
        matches!(self, LensPosition::Front)
    }
}

impl<'de> Deserialize<'de> for LensPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_host(&value))
    }
}

impl std::fmt::Display for LensPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensPosition::Front => write!(f, "front"),
            LensPosition::Back => write!(f, "back"),
        }
    }
}

/// Orientation tag carried by each frame (clockwise rotation needed to
/// display it upright)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Upright (portrait connection)
    #[default]
    Up,
    /// 90 degrees clockwise
    Right,
    /// 180 degrees
    Down,
    /// 270 degrees clockwise
    Left,
}

impl Orientation {
    /// Create orientation from an integer degree value (normalised to 0-360).
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Orientation::Right,
            180 => Orientation::Down,
            270 => Orientation::Left,
            _ => Orientation::Up,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }
}

/// Pixel format of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luma only
    Gray8,
    /// 32-bit R G B A
    Rgba,
    /// 32-bit B G R A (common native camera layout)
    Bgra,
    /// Bi-planar 4:2:0: full-resolution Y plane followed by interleaved CbCr
    Nv12,
}

impl PixelFormat {
    /// Bytes of the first plane per pixel
    pub fn luma_bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 | PixelFormat::Nv12 => 1,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
        }
    }
}

/// Frame pixel storage, shared without copying between the frame context,
/// the detector and the freeze buffer
pub type FrameData = Arc<[u8]>;

/// A single camera frame
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub width: u32,
    pub height: u32,
    /// Pixel data (for NV12 the Y plane is followed by the CbCr plane)
    pub data: FrameData,
    pub format: PixelFormat,
    /// Row stride of the first plane in bytes
    pub stride: u32,
    /// When the frame was captured
    pub captured_at: Instant,
    pub orientation: Orientation,
    /// Monotonic frame counter assigned by the session
    pub sequence: u64,
}

impl FrameSample {
    /// Build an RGBA frame from tightly packed pixel data
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, captured_at: Instant) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Rgba,
            stride: width * 4,
            captured_at,
            orientation: Orientation::Up,
            sequence: 0,
        }
    }

    /// Build a grayscale frame from tightly packed luma data
    pub fn from_luma(width: u32, height: u32, data: Vec<u8>, captured_at: Instant) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at,
            orientation: Orientation::Up,
            sequence: 0,
        }
    }

    /// Same pixels, new capture time and sequence number
    pub fn restamped(&self, captured_at: Instant, sequence: u64) -> Self {
        Self {
            captured_at,
            sequence,
            ..self.clone()
        }
    }

    /// Luma value at (x, y), 0 when out of range
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let offset = y as usize * self.stride as usize
            + x as usize * self.format.luma_bytes_per_pixel();
        match self.format {
            PixelFormat::Gray8 | PixelFormat::Nv12 => self.data.get(offset).copied().unwrap_or(0),
            PixelFormat::Rgba => rgb_to_luma(&self.data, offset, 0, 2),
            PixelFormat::Bgra => rgb_to_luma(&self.data, offset, 2, 0),
        }
    }

    /// Convert to an RGBA image for display (the freeze frame as the user sees it)
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let offset = y as usize * self.stride as usize
                + x as usize * self.format.luma_bytes_per_pixel();
            let px = |i: usize| self.data.get(offset + i).copied().unwrap_or(0);
            match self.format {
                PixelFormat::Rgba => image::Rgba([px(0), px(1), px(2), px(3)]),
                PixelFormat::Bgra => image::Rgba([px(2), px(1), px(0), px(3)]),
                PixelFormat::Gray8 | PixelFormat::Nv12 => {
                    let l = px(0);
                    image::Rgba([l, l, l, 255])
                }
            }
        })
    }
}

fn rgb_to_luma(data: &[u8], offset: usize, r_index: usize, b_index: usize) -> u8 {
    let channel = |i: usize| data.get(offset + i).copied().unwrap_or(0) as u32;
    // BT.601 integer weights
    ((channel(r_index) * 77 + channel(1) * 150 + channel(b_index) * 29) >> 8) as u8
}

/// Session preset chosen for a resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPreset {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Settings applied to the frame-delivery connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub orientation: Orientation,
    pub mirrored: bool,
}

/// Destination for frames produced by a capture session
///
/// Called on the session's delivery thread; implementations must not block.
#[derive(Clone)]
pub struct FrameSink {
    deliver: Arc<dyn Fn(FrameSample) + Send + Sync>,
}

impl FrameSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(FrameSample) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Hand one frame to the consumer
    pub fn deliver(&self, sample: FrameSample) {
        (self.deliver)(sample)
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink").finish_non_exhaustive()
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The session refused the device input
    InputRejected(String),
    /// The session refused the frame output
    OutputRejected(String),
    /// The device could not be locked for configuration
    LockFailed(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::InputRejected(msg) => write!(f, "Cannot add camera input: {}", msg),
            BackendError::OutputRejected(msg) => write!(f, "Cannot add camera output: {}", msg),
            BackendError::LockFailed(msg) => write!(f, "Cannot lock device: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lens_from_host() {
        assert_eq!(LensPosition::from_host("FRONT"), LensPosition::Front);
        assert_eq!(LensPosition::from_host("BACK"), LensPosition::Back);
        assert_eq!(LensPosition::from_host("sideways"), LensPosition::Back);
    }

    #[test]
    fn test_lens_json_matches_host_parsing() {
        let parse = |json: &str| serde_json::from_str::<LensPosition>(json).unwrap();
        assert_eq!(parse(r#""front""#), LensPosition::Front);
        assert_eq!(parse(r#""Front""#), LensPosition::Front);
        assert_eq!(parse(r#""BACK""#), LensPosition::Back);
        assert_eq!(parse(r#""environment""#), LensPosition::Back);
        assert_eq!(serde_json::to_string(&LensPosition::Front).unwrap(), r#""FRONT""#);
    }

    #[test]
    fn test_orientation_from_degrees() {
        assert_eq!(Orientation::from_degrees(-90), Orientation::Left);
        assert_eq!(Orientation::from_degrees(450), Orientation::Right);
        assert_eq!(Orientation::from_degrees(0), Orientation::Up);
    }

    #[test]
    fn test_luma_from_rgba_and_bgra() {
        let now = Instant::now();
        let rgba = FrameSample::from_rgba(1, 1, vec![255, 255, 255, 255], now);
        assert!(rgba.luma_at(0, 0) >= 254);

        let mut red_bgra = FrameSample::from_rgba(1, 1, vec![0, 0, 255, 255], now);
        red_bgra.format = PixelFormat::Bgra;
        let red_rgba = FrameSample::from_rgba(1, 1, vec![255, 0, 0, 255], now);
        assert_eq!(red_bgra.luma_at(0, 0), red_rgba.luma_at(0, 0));
    }

    #[test]
    fn test_to_rgba_image_respects_stride() {
        let data = vec![
            10, 20, 0, // row 0 + padding
            30, 40, 0, // row 1 + padding
        ];
        let mut frame = FrameSample::from_luma(2, 2, data, Instant::now());
        frame.stride = 3;
        let img = frame.to_rgba_image();
        assert_eq!(img.get_pixel(1, 1).0, [40, 40, 40, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [30, 30, 30, 255]);
    }
}
