//! Common functionality for SSD-style object detection.
//!
//! Only the palm detector uses this today, but nothing in here is specific to palms.

pub mod nms;
pub mod ssd;

use nalgebra::{Point2, Vector2};

use crate::rect::Rect;

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value in
/// `0.0..=1.0`, and a detector-specific list of keypoints.
///
/// Coordinates are in whatever space the detector produced them in, usually network input pixels
/// at first, and input image pixels after [`Detection::transform`].
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
    keypoints: Vec<Point2<f32>>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Point2<f32>>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Returns the keypoints, in the order the detector defines.
    pub fn keypoints(&self) -> &[Point2<f32>] {
        &self.keypoints
    }

    /// Scales all coordinates by `scale`, then moves them by `offset`.
    ///
    /// Used to go from network input pixels back to the image the input was cropped from.
    #[must_use]
    pub fn transform(&self, scale: f32, offset: Vector2<f32>) -> Self {
        let map = |p: Point2<f32>| Point2::from(p.coords * scale + offset);
        let rect = self.rect;
        let center = map(rect.center());
        Self {
            confidence: self.confidence,
            rect: Rect::from_center(
                center.x,
                center.y,
                rect.width() * scale,
                rect.height() * scale,
            ),
            keypoints: self.keypoints.iter().copied().map(map).collect(),
        }
    }
}
