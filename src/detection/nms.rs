//! Non-Maximum Averaging.
//!
//! SSD networks report every object many times over, once for each anchor near it. This module
//! merges overlapping detections into a single one by computing their confidence-weighted average,
//! which jitters less between frames than keeping only the most confident detection.

use nalgebra::{Point2, Vector2};

use crate::rect::Rect;

use super::Detection;

/// Merges overlapping detections.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
        }
    }

    /// Merges `detections`, returning one detection per object, most confident first.
    ///
    /// Each merged detection has the confidence of the detection that seeded it. `detections` is
    /// left empty.
    pub fn process(&mut self, detections: &mut Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Ascending confidence, so the best remaining seed is always at the back.
        detections.sort_unstable_by(|a, b| a.confidence.total_cmp(&b.confidence));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            self.avg_buf.clear();
            detections.retain(|other| {
                if seed_rect.iou(&other.bounding_rect()) >= self.iou_thresh {
                    self.avg_buf.push(other.clone());
                    false
                } else {
                    true
                }
            });
            self.avg_buf.push(seed);

            out.push(average(&self.avg_buf));
        }

        self.avg_buf.clear();
        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of `dets`. The last detection is the seed.
fn average(dets: &[Detection]) -> Detection {
    let Some(seed) = dets.last() else {
        return Detection::new(0.0, Rect::from_center(0.0, 0.0, 0.0, 0.0));
    };

    let mut center = Vector2::<f32>::zeros();
    let mut size = Vector2::<f32>::zeros();
    let mut keypoints = vec![Vector2::<f32>::zeros(); seed.keypoints().len()];
    let mut divisor = 0.0f32;
    for det in dets {
        // Keypoint-less or mismatched detections would skew the keypoint average.
        if det.keypoints().len() != keypoints.len() {
            log::warn!(
                "skipping detection with {} keypoints while averaging (expected {})",
                det.keypoints().len(),
                keypoints.len(),
            );
            continue;
        }

        let factor = det.confidence();
        divisor += factor;
        let rect = det.bounding_rect();
        center += rect.center().coords * factor;
        size += Vector2::new(rect.width(), rect.height()) * factor;
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            *acc += kp.coords * factor;
        }
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    center /= divisor;
    size /= divisor;
    Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(center.x, center.y, size.x, size.y),
        keypoints
            .into_iter()
            .map(|acc| Point2::from(acc / divisor))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();

        let a = Detection::new(0.9, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(1.0, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 1.0);
        assert_eq!(detections[0].bounding_rect().center().x, 5.0);
        assert_eq!(detections[1].confidence(), 0.9);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();

        let rect = Rect::from_center(-1.0, 3.0, 2.0, 2.0);
        let a = Detection::with_keypoints(1.0, rect, vec![Point2::new(0.0, 0.0)]);
        let b = Detection::with_keypoints(0.5, rect.grow_rel(0.25), vec![Point2::new(3.0, 6.0)]);
        let mut input = vec![b, a];
        let detections = nms.process(&mut input);
        assert!(input.is_empty());
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(rect.center(), Point2::new(-1.0, 3.0));
        assert_relative_eq!(rect.width(), 7.0 / 3.0);
        assert_relative_eq!(rect.height(), 7.0 / 3.0);
        assert_eq!(d.keypoints(), [Point2::new(1.0, 2.0)]);
    }

    #[test]
    fn empty_input() {
        let mut nms = NonMaxSuppression::new();
        assert!(nms.process(&mut Vec::new()).is_empty());
    }
}
