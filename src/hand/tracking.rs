//! Single-hand tracking.
//!
//! Palm detection is only run while no hand is tracked. Once a palm is found, the region of
//! interest around it is handed to the landmark network, and every later frame reuses the region
//! derived from the previous frame's landmarks. When the landmark network stops seeing a hand,
//! tracking is lost and the next frame runs palm detection again.

use image::RgbaImage;
use nalgebra::{Point2, Vector2};

use crate::{detection::Detection, rect::Rect, timer::Timer};

use super::{
    detection::{Keypoint, PalmNetwork},
    landmark::{HandLandmarks, LandmarkNetwork},
};

/// Presence score below which tracking is considered lost.
pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.4;

/// How much larger than the detected palm the hand region is.
const PALM_TO_HAND_SCALE: f32 = 2.6;

/// How far the hand region is moved from the palm towards the fingers, relative to its height.
const PALM_TO_HAND_SHIFT: f32 = 0.5;

/// Margin added around the landmarks of the last frame, relative to their bounding box.
const ROI_PADDING: f32 = 0.3;

/// Something that finds at most one hand in a frame.
pub trait HandDetector {
    /// Returns the landmarks of the hand in `image`, or `None` if there is no (usable) hand.
    ///
    /// Landmarks are normalized to the dimensions of `image`.
    fn detect(&mut self, image: &RgbaImage) -> Option<HandLandmarks>;
}

/// Palm detection followed by landmark tracking, for a single hand.
pub struct HandTracker {
    palm: PalmNetwork,
    landmarks: LandmarkNetwork,
    roi: Option<Rect>,
}

impl HandTracker {
    /// Loads both networks via [`PalmNetwork::from_env`] and [`LandmarkNetwork::from_env`].
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(PalmNetwork::from_env()?, LandmarkNetwork::from_env()?))
    }

    pub fn new(palm: PalmNetwork, landmarks: LandmarkNetwork) -> Self {
        Self {
            palm,
            landmarks,
            roi: None,
        }
    }

    /// Returns the region of interest the landmark network will look at in the next frame, in
    /// pixels. `None` while no hand is tracked.
    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.palm.timers().chain(self.landmarks.timers())
    }

    fn track(&mut self, image: &RgbaImage) -> anyhow::Result<Option<HandLandmarks>> {
        let roi = match self.roi {
            Some(roi) => roi,
            None => match self.palm.detect(image)?.first() {
                Some(palm) => {
                    log::debug!("palm detected (confidence {:.2})", palm.confidence());
                    hand_roi(palm)
                }
                None => return Ok(None),
            },
        };

        let estimate = self.landmarks.estimate(image, roi)?;
        let presence = estimate.presence();
        if presence.is_nan() || presence < DEFAULT_PRESENCE_THRESHOLD {
            if self.roi.is_some() {
                log::debug!("hand lost (presence {:.2})", presence);
            }
            self.roi = None;
            return Ok(None);
        }

        let (w, h) = (image.width() as f32, image.height() as f32);
        let normalized = estimate
            .positions()
            .iter()
            .map(|p| [p.x / w, p.y / h])
            .collect::<Vec<_>>();
        let hand = HandLandmarks::from_slice(&normalized);
        self.roi = hand.as_ref().and_then(|hand| next_roi(hand, w, h));
        Ok(hand)
    }
}

impl HandDetector for HandTracker {
    fn detect(&mut self, image: &RgbaImage) -> Option<HandLandmarks> {
        match self.track(image) {
            Ok(hand) => hand,
            Err(e) => {
                log::error!("hand tracking failed: {:#}", e);
                self.roi = None;
                None
            }
        }
    }
}

/// Computes the hand region from a palm detection.
///
/// The region is a square around the palm, moved from the wrist towards the middle finger and
/// enlarged to fit the fingers.
fn hand_roi(palm: &Detection) -> Rect {
    let rect = palm.bounding_rect();
    let size = rect.width().max(rect.height());
    let square = Rect::from_center(rect.center().x, rect.center().y, size, size);

    let keypoints = palm.keypoints();
    let up = match (
        keypoints.get(Keypoint::Wrist as usize),
        keypoints.get(Keypoint::MiddleFingerMcp as usize),
    ) {
        (Some(wrist), Some(middle)) => (middle - wrist).try_normalize(f32::EPSILON),
        _ => None,
    }
    .unwrap_or_else(|| Vector2::new(0.0, -1.0));

    square
        .move_by(up * size * PALM_TO_HAND_SHIFT)
        .scale(PALM_TO_HAND_SCALE)
}

/// Computes the region to look at in the next frame from the landmarks in this one.
fn next_roi(hand: &HandLandmarks, width: f32, height: f32) -> Option<Rect> {
    let pixels = hand
        .positions()
        .iter()
        .map(|p| Point2::new(p.x * width, p.y * height));
    Rect::bounding(pixels).map(|rect| rect.grow_to_fit_aspect(1.0).grow_rel(ROI_PADDING))
}
