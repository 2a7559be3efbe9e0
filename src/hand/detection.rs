//! Palm detection.
//!
//! The first stage of hand tracking. MediaPipe's palm detection network (see
//! [`PalmNetwork::from_env`] for where it is loaded from) finds palms in the whole frame; the
//! landmark network then looks at a crop around the palm.
//!
//! Palms are detected instead of whole hands because they are roughly square, rigid, and do not
//! change shape when fingers move.

use std::{env, path::Path};

use anyhow::bail;
use image::RgbaImage;
use nalgebra::{Point2, Vector2};

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection,
    },
    nn::{self, Model},
    rect::Rect,
    timer::Timer,
};

/// Width and height of the square network input.
const INPUT_RES: u32 = 192;

/// Number of values per anchor in the box output: 4 box parameters, then 7 `x, y` keypoints.
const BOX_PARAMS: usize = 4 + 2 * NUM_KEYPOINTS;

const NUM_KEYPOINTS: usize = 7;

/// Minimum confidence for a palm detection to be reported.
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.4;

const ENV_VAR_PALM_MODEL: &str = "HANDSTEER_PALM_MODEL";
const DEFAULT_MODEL_PATH: &str = "3rdparty/onnx/palm_detection_lite.onnx";

/// Palm detection keypoints, in network output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist,
    IndexFingerMcp,
    MiddleFingerMcp,
    RingFingerMcp,
    PinkyMcp,
    ThumbCmc,
    ThumbMcp,
}

/// Palm detection network, running on the CPU via [`tract_onnx`].
pub struct PalmNetwork {
    model: Model,
    anchors: Anchors,
    nms: NonMaxSuppression,
    threshold: f32,
    raw_detections: Vec<Detection>,
    t_resize: Timer,
    t_infer: Timer,
    t_nms: Timer,
}

impl PalmNetwork {
    /// Loads the network from the path in `HANDSTEER_PALM_MODEL`, or from
    /// `3rdparty/onnx/palm_detection_lite.onnx` if the variable is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match env::var(ENV_VAR_PALM_MODEL) {
            Ok(path) => {
                log::debug!("model override: `{}` is set to '{}'", ENV_VAR_PALM_MODEL, path);
                Self::load(path)
            }
            Err(_) => Self::load(DEFAULT_MODEL_PATH),
        }
    }

    /// Loads and optimizes the network stored at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let model = nn::load_model(path.as_ref(), "palm detection")?;
        Ok(Self {
            model,
            anchors: anchors(),
            nms: NonMaxSuppression::new(),
            threshold: DEFAULT_DETECTION_THRESHOLD,
            raw_detections: Vec::new(),
            t_resize: Timer::new("palm resize"),
            t_infer: Timer::new("palm infer"),
            t_nms: Timer::new("palm NMS"),
        })
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_resize, &self.t_infer, &self.t_nms].into_iter()
    }

    /// Detects palms in `image`.
    ///
    /// Returned detections are in `image` pixel coordinates, most confident first. Keypoints are
    /// indexed by [`Keypoint`].
    pub fn detect(&mut self, image: &RgbaImage) -> anyhow::Result<Vec<Detection>> {
        // Letterbox the frame into the square input.
        let view = Rect::from_top_left(0.0, 0.0, image.width() as f32, image.height() as f32)
            .grow_to_fit_aspect(1.0);
        let input = self
            .t_resize
            .time(|| nn::crop_to_tensor(image, view, INPUT_RES))?;
        let outputs = self.t_infer.time(|| nn::run(&self.model, input))?;
        if outputs.len() < 2 {
            bail!("expected 2 network outputs, got {}", outputs.len());
        }
        let boxes = outputs[0].as_slice::<f32>()?;
        let scores = outputs[1].as_slice::<f32>()?;

        let _guard = self.t_nms.start();
        self.raw_detections.clear();
        decode_detections(
            &self.anchors,
            boxes,
            scores,
            self.threshold,
            &mut self.raw_detections,
        )?;

        let scale = view.width() / INPUT_RES as f32;
        let offset = Vector2::new(view.x(), view.y());
        Ok(self
            .nms
            .process(&mut self.raw_detections)
            .into_iter()
            .map(|det| det.transform(scale, offset))
            .collect())
    }
}

/// The anchors of the lite and full palm detection networks.
fn anchors() -> Anchors {
    Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)])
}

/// Turns raw network outputs into detections in network input pixels.
///
/// `boxes` holds [`BOX_PARAMS`] values per anchor, `scores` one logit per anchor. Only anchors
/// scoring at least `threshold` after the sigmoid are pushed to `out`.
fn decode_detections(
    anchors: &Anchors,
    boxes: &[f32],
    scores: &[f32],
    threshold: f32,
    out: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    let count = anchors.anchor_count();
    if scores.len() != count || boxes.len() != count * BOX_PARAMS {
        bail!(
            "unexpected palm detection output sizes {} and {} for {} anchors",
            boxes.len(),
            scores.len(),
            count,
        );
    }

    for (index, (params, &score)) in boxes.chunks_exact(BOX_PARAMS).zip(scores).enumerate() {
        let confidence = nn::sigmoid(score);
        if confidence.is_nan() || confidence < threshold {
            continue;
        }
        out.push(extract_detection(&anchors[index], params, confidence));
    }
    Ok(())
}

fn extract_detection(anchor: &Anchor, params: &[f32], confidence: f32) -> Detection {
    let res = INPUT_RES as f32;
    let (ax, ay) = (anchor.x_center() * res, anchor.y_center() * res);

    let rect = Rect::from_center(params[0] + ax, params[1] + ay, params[2], params[3]);
    let keypoints = params[4..]
        .chunks_exact(2)
        .map(|xy| Point2::new(xy[0] + ax, xy[1] + ay))
        .collect();
    Detection::with_keypoints(confidence, rect, keypoints)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn anchor_count() {
        assert_eq!(anchors().anchor_count(), 2016);
    }

    fn raw_outputs() -> (Vec<f32>, Vec<f32>) {
        let count = anchors().anchor_count();
        (vec![0.0; count * BOX_PARAMS], vec![-10.0; count])
    }

    #[test]
    fn decode_offsets_by_anchor() {
        let anchors = anchors();
        let (mut boxes, mut scores) = raw_outputs();
        // Anchor 50 is the first box of cell (1, 1) of the 24x24 layer.
        let params = &mut boxes[50 * BOX_PARAMS..51 * BOX_PARAMS];
        params[..4].copy_from_slice(&[2.0, -2.0, 40.0, 30.0]);
        params[4 + 2 * Keypoint::MiddleFingerMcp as usize] = 5.0;
        scores[50] = 3.0;

        let mut out = Vec::new();
        decode_detections(&anchors, &boxes, &scores, 0.4, &mut out).unwrap();
        assert_eq!(out.len(), 1);

        let det = &out[0];
        let rect = det.bounding_rect();
        assert_relative_eq!(det.confidence(), nn::sigmoid(3.0));
        assert_relative_eq!(rect.center().x, 12.0 + 2.0);
        assert_relative_eq!(rect.center().y, 12.0 - 2.0);
        assert_eq!((rect.width(), rect.height()), (40.0, 30.0));
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_relative_eq!(det.keypoints()[Keypoint::MiddleFingerMcp as usize].x, 17.0);
        assert_relative_eq!(det.keypoints()[Keypoint::Wrist as usize].y, 12.0);
    }

    #[test]
    fn decode_applies_threshold() {
        let anchors = anchors();
        let (boxes, mut scores) = raw_outputs();
        scores[0] = 0.0; // 0.5
        scores[1] = -1.0; // ~0.27
        scores[2] = f32::NAN;

        let mut out = Vec::new();
        decode_detections(&anchors, &boxes, &scores, 0.4, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence(), 0.5);
    }

    #[test]
    fn decode_rejects_wrong_sizes() {
        let anchors = anchors();
        let (boxes, scores) = raw_outputs();
        let mut out = Vec::new();
        assert!(decode_detections(&anchors, &boxes[1..], &scores, 0.4, &mut out).is_err());
        assert!(decode_detections(&anchors, &boxes, &scores[1..], 0.4, &mut out).is_err());
    }

    #[test]
    fn missing_model_is_an_error() {
        assert!(PalmNetwork::load("does/not/exist.onnx").is_err());
    }
}
