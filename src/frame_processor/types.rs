// SPDX-License-Identifier: MPL-2.0

//! Core types for detection results
//!
//! These types are produced by the detection service, flow through the
//! session controller and end up serialized in host events.

use crate::backends::camera::types::FrameSample;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Barcode symbology reported by the detection service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Symbology {
    QrCode,
    Aztec,
    DataMatrix,
    Pdf417,
    Code39,
    Code93,
    Code128,
    Codabar,
    Ean8,
    Ean13,
    UpcA,
    UpcE,
    Itf,
    Unknown,
}

impl Symbology {
    /// Whether `self` passes an allow-list (empty list allows everything)
    pub fn is_allowed(&self, allowed: &[Symbology]) -> bool {
        allowed.is_empty() || allowed.contains(self)
    }
}

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Bounding quadrilateral of a symbol
///
/// Corners are ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Axis-aligned rectangle as a quad
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Quad([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn bottom_right(&self) -> Point {
        self.0[2]
    }

    /// Mean of the four corners
    pub fn centroid(&self) -> Point {
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Scale every corner (e.g. from a downscaled detection image back to
    /// frame coordinates)
    pub fn scaled(&self, factor: f32) -> Self {
        Quad(self.0.map(|p| Point::new(p.x * factor, p.y * factor)))
    }
}

/// One decoded symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSymbol {
    /// Decoded payload
    #[serde(rename = "rawValue")]
    pub payload: String,
    #[serde(rename = "format")]
    pub symbology: Symbology,
    #[serde(rename = "cornerPoints")]
    pub corners: Quad,
}

impl DetectedSymbol {
    pub fn new(payload: impl Into<String>, symbology: Symbology, corners: Quad) -> Self {
        Self {
            payload: payload.into(),
            symbology,
            corners,
        }
    }
}

/// Symbols detected in one frame, together with that frame
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Symbols in detection order; empty means nothing was found
    pub symbols: Vec<DetectedSymbol>,
    /// The frame the detection ran on
    pub frame: Arc<FrameSample>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Drop symbols whose symbology is not in the allow-list
pub fn retain_allowed(symbols: &mut Vec<DetectedSymbol>, allowed: &[Symbology]) {
    symbols.retain(|s| s.symbology.is_allowed(allowed));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_json_shape() {
        let symbol = DetectedSymbol::new(
            "https://example.com",
            Symbology::QrCode,
            Quad::from_rect(10.0, 20.0, 5.0, 5.0),
        );
        let json = serde_json::to_value(&symbol).unwrap();
        assert_eq!(json["rawValue"], "https://example.com");
        assert_eq!(json["format"], "QR_CODE");
        assert_eq!(json["cornerPoints"][2]["x"], 15.0);
        assert_eq!(json["cornerPoints"][2]["y"], 25.0);
    }

    #[test]
    fn test_allow_list() {
        let mut symbols = vec![
            DetectedSymbol::new("a", Symbology::QrCode, Quad::default()),
            DetectedSymbol::new("b", Symbology::Ean13, Quad::default()),
        ];
        retain_allowed(&mut symbols, &[]);
        assert_eq!(symbols.len(), 2);

        retain_allowed(&mut symbols, &[Symbology::QrCode]);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].payload, "a");
    }

    #[test]
    fn test_quad_helpers() {
        let quad = Quad::from_rect(0.0, 0.0, 10.0, 20.0).scaled(2.0);
        assert_eq!(quad.bottom_right(), Point::new(20.0, 40.0));
        assert_eq!(quad.centroid(), Point::new(10.0, 20.0));
    }
}
