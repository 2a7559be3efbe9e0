//! Hand landmark estimation, landmark sets, and the finger-extension heuristics derived from them.
//!
//! The landmark network is MediaPipe's hand landmark model in ONNX form (see
//! [`LandmarkNetwork::from_env`] for where it is loaded from). It expects a roughly centered hand
//! filling most of its input, so it is run on a crop of the camera frame.

use std::{env, path::Path};

use anyhow::bail;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use image::RgbaImage;
use nalgebra::{Point2, Vector2};

use crate::{
    draw,
    nn::{self, Model},
    rect::Rect,
    timer::Timer,
};

/// Number of landmarks in a [`HandLandmarks`] set.
pub const NUM_LANDMARKS: usize = 21;

/// Width and height of the square network input.
const INPUT_RES: u32 = 224;

const ENV_VAR_HAND_MODEL: &str = "HANDSTEER_HAND_MODEL";
const DEFAULT_MODEL_PATH: &str = "3rdparty/onnx/hand_landmark_lite.onnx";

/// Hand landmark estimation network, running on the CPU via [`tract_onnx`].
pub struct LandmarkNetwork {
    model: Model,
    t_resize: Timer,
    t_infer: Timer,
}

impl LandmarkNetwork {
    /// Loads the network from the path in `HANDSTEER_HAND_MODEL`, or from
    /// `3rdparty/onnx/hand_landmark_lite.onnx` if the variable is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match env::var(ENV_VAR_HAND_MODEL) {
            Ok(path) => {
                log::debug!("model override: `{}` is set to '{}'", ENV_VAR_HAND_MODEL, path);
                Self::load(path)
            }
            Err(_) => Self::load(DEFAULT_MODEL_PATH),
        }
    }

    /// Loads and optimizes the network stored at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            model: nn::load_model(path.as_ref(), "hand landmark")?,
            t_resize: Timer::new("landmark resize"),
            t_infer: Timer::new("landmark infer"),
        })
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_resize, &self.t_infer].into_iter()
    }

    /// Estimates the landmarks of the hand inside `roi`.
    ///
    /// `roi` is widened to a square before cropping. The returned positions are in `image` pixel
    /// coordinates.
    pub fn estimate(&self, image: &RgbaImage, roi: Rect) -> anyhow::Result<LandmarkEstimate> {
        let view = roi.grow_to_fit_aspect(1.0);
        let input = self
            .t_resize
            .time(|| nn::crop_to_tensor(image, view, INPUT_RES))?;
        let outputs = self.t_infer.time(|| nn::run(&self.model, input))?;
        if outputs.len() < 2 {
            bail!("expected at least 2 network outputs, got {}", outputs.len());
        }

        let presence = match outputs[1].as_slice::<f32>()? {
            [presence] => *presence,
            other => bail!("expected a single presence score, got {}", other.len()),
        };
        Ok(LandmarkEstimate {
            presence,
            positions: decode_positions(outputs[0].as_slice::<f32>()?, view)?,
        })
    }
}

/// Output of [`LandmarkNetwork::estimate`].
#[derive(Debug, Clone)]
pub struct LandmarkEstimate {
    presence: f32,
    positions: Vec<Point2<f32>>,
}

impl LandmarkEstimate {
    /// Returns the network's confidence that the crop contains a hand. May be NaN.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the landmark positions in pixels of the estimated image, indexed by
    /// [`LandmarkIdx`].
    pub fn positions(&self) -> &[Point2<f32>] {
        &self.positions
    }
}

/// Maps the raw `x, y, z` landmark triples (in network input pixels) back through the crop `view`.
fn decode_positions(raw: &[f32], view: Rect) -> anyhow::Result<Vec<Point2<f32>>> {
    if raw.len() != NUM_LANDMARKS * 3 {
        bail!(
            "expected {} landmark values, got {}",
            NUM_LANDMARKS * 3,
            raw.len()
        );
    }

    let scale = view.width() / INPUT_RES as f32;
    let offset = Vector2::new(view.x(), view.y());
    Ok(raw
        .chunks_exact(3)
        .map(|xyz| Point2::new(xyz[0], xyz[1]) * scale + offset)
        .collect())
}

/// Normalized 2D landmark positions of one detected hand.
///
/// Values of this type always hold exactly [`NUM_LANDMARKS`] finite positions; malformed inputs
/// are rejected by the constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [Point2<f32>; NUM_LANDMARKS],
}

impl HandLandmarks {
    /// Creates a landmark set from normalized `[x, y]` positions, indexed by [`LandmarkIdx`].
    ///
    /// Returns `None` if any coordinate is NaN or infinite.
    pub fn new(positions: [[f32; 2]; NUM_LANDMARKS]) -> Option<Self> {
        Self::from_slice(&positions)
    }

    /// Creates a landmark set from a slice of normalized `[x, y]` positions.
    ///
    /// Returns `None` if the slice does not contain exactly [`NUM_LANDMARKS`] positions or if any
    /// coordinate is NaN or infinite.
    pub fn from_slice(positions: &[[f32; 2]]) -> Option<Self> {
        if positions.len() != NUM_LANDMARKS {
            log::trace!(
                "rejecting landmark set with {} positions (expected {})",
                positions.len(),
                NUM_LANDMARKS,
            );
            return None;
        }
        if positions.iter().flatten().any(|c| !c.is_finite()) {
            log::trace!("rejecting landmark set with non-finite coordinates");
            return None;
        }

        let mut points = [Point2::origin(); NUM_LANDMARKS];
        for (point, &[x, y]) in points.iter_mut().zip(positions) {
            *point = Point2::new(x, y);
        }
        Some(Self { positions: points })
    }

    /// Returns the normalized position of a landmark.
    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Point2<f32> {
        self.positions[idx as usize]
    }

    /// Returns all normalized positions, indexed by [`LandmarkIdx`].
    pub fn positions(&self) -> &[Point2<f32>; NUM_LANDMARKS] {
        &self.positions
    }

    /// Returns the normalized X coordinate of the wrist.
    pub fn wrist_x(&self) -> f32 {
        self.get(LandmarkIdx::Wrist).x
    }

    /// Draws the hand skeleton onto `image`, scaling the normalized positions to its size.
    pub fn draw(&self, image: &mut RgbaImage) {
        let (w, h) = (image.width() as f32, image.height() as f32);
        let to_pixel = |pos: Point2<f32>| ((pos.x * w) as i32, (pos.y * h) as i32);

        for &(a, b) in CONNECTIVITY {
            draw::line(image, to_pixel(self.get(a)), to_pixel(self.get(b)))
                .color(Rgb888::GREEN)
                .stroke_width(2);
        }
        for &pos in &self.positions {
            let (x, y) = to_pixel(pos);
            draw::marker(image, x, y);
        }
    }
}

/// Names for the hand landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the joint forming the knuckles near the palm.
/// - **IP**: Interphalangeal joint, the thumb's only joint above the MCP.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: The tip of the finger.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Pairs of landmarks connected by a bone, for drawing the hand skeleton.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// Which fingers are extended ("up") in a frame.
///
/// The pinky is not tracked, no gesture uses it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
}

impl FingerStates {
    /// Classifies each finger by comparing its tip against one reference joint.
    ///
    /// Index, middle and ring finger are up when the tip lies above (has a smaller Y than) the
    /// finger's MCP joint, which assumes an upright hand.
    ///
    /// The thumb is up when its tip lies left of (has a smaller X than) its IP joint. This only
    /// works for one hand facing the camera one way; the other hand, or the same hand turned
    /// around, reads inverted.
    pub fn from_landmarks(hand: &HandLandmarks) -> Self {
        use LandmarkIdx::*;

        let above = |tip, base| hand.get(tip).y < hand.get(base).y;
        Self {
            thumb: hand.get(ThumbTip).x < hand.get(ThumbIp).x,
            index: above(IndexFingerTip, IndexFingerMcp),
            middle: above(MiddleFingerTip, MiddleFingerMcp),
            ring: above(RingFingerTip, RingFingerMcp),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::hand::landmark::LandmarkIdx::*;

    /// A right hand held upright with every finger curled.
    fn fist() -> [[f32; 2]; NUM_LANDMARKS] {
        let mut pos = [[0.5, 0.5]; NUM_LANDMARKS];
        pos[Wrist as usize] = [0.5, 0.8];
        pos[ThumbIp as usize] = [0.4, 0.6];
        pos[ThumbTip as usize] = [0.45, 0.6];
        for (mcp, tip) in [
            (IndexFingerMcp, IndexFingerTip),
            (MiddleFingerMcp, MiddleFingerTip),
            (RingFingerMcp, RingFingerTip),
        ] {
            pos[mcp as usize] = [0.5, 0.5];
            pos[tip as usize] = [0.5, 0.55];
        }
        pos
    }

    fn extend(pos: &mut [[f32; 2]; NUM_LANDMARKS], tip: LandmarkIdx) {
        pos[tip as usize][1] = 0.3;
    }

    #[test]
    fn rejects_malformed() {
        assert!(HandLandmarks::from_slice(&[[0.0, 0.0]; 20]).is_none());
        assert!(HandLandmarks::from_slice(&[[0.0, 0.0]; 22]).is_none());
        assert!(HandLandmarks::from_slice(&[]).is_none());

        let mut pos = fist();
        pos[7][0] = f32::NAN;
        assert!(HandLandmarks::new(pos).is_none());
        pos[7][0] = f32::INFINITY;
        assert!(HandLandmarks::new(pos).is_none());
    }

    #[test]
    fn fist_has_no_fingers_up() {
        let hand = HandLandmarks::new(fist()).unwrap();
        assert_eq!(FingerStates::from_landmarks(&hand), FingerStates::default());
    }

    #[test]
    fn extended_fingers() {
        let mut pos = fist();
        extend(&mut pos, IndexFingerTip);
        extend(&mut pos, RingFingerTip);
        let hand = HandLandmarks::new(pos).unwrap();
        assert_eq!(
            FingerStates::from_landmarks(&hand),
            FingerStates {
                thumb: false,
                index: true,
                middle: false,
                ring: true,
            }
        );
    }

    #[test]
    fn tip_level_with_base_is_down() {
        let mut pos = fist();
        pos[MiddleFingerTip as usize] = pos[MiddleFingerMcp as usize];
        let hand = HandLandmarks::new(pos).unwrap();
        assert!(!FingerStates::from_landmarks(&hand).middle);
    }

    #[test]
    fn thumb_uses_x_axis() {
        let mut pos = fist();
        pos[ThumbTip as usize] = [0.3, 0.9];
        let hand = HandLandmarks::new(pos).unwrap();
        assert!(FingerStates::from_landmarks(&hand).thumb);

        // The same thumb in a mirrored image points the other way.
        let mirrored = HandLandmarks::new(pos.map(|[x, y]| [1.0 - x, y])).unwrap();
        assert!(!FingerStates::from_landmarks(&mirrored).thumb);
    }

    #[test]
    fn draw_stays_in_bounds() {
        let mut pos = fist();
        pos[PinkyTip as usize] = [1.5, -0.5];
        let hand = HandLandmarks::new(pos).unwrap();
        let mut image = RgbaImage::new(64, 48);
        hand.draw(&mut image);
        assert!(image.pixels().any(|px| px.0 == [0, 255, 0, 255]));
    }

    #[test]
    fn wrist_x() {
        let hand = HandLandmarks::new(fist()).unwrap();
        assert_eq!(hand.wrist_x(), 0.5);
        assert_eq!(hand.get(Wrist), Point2::new(0.5, 0.8));
        assert_eq!(hand.positions().len(), NUM_LANDMARKS);
    }

    fn raw_hand() -> Vec<f32> {
        (0..NUM_LANDMARKS)
            .flat_map(|i| [i as f32 * 10.0, 112.0, -3.0])
            .collect()
    }

    #[test]
    fn decode_maps_back_from_crop() {
        // A 448x448 crop starting at (100, 20): network pixels are doubled and offset.
        let view = Rect::from_top_left(100.0, 20.0, 448.0, 448.0);
        let positions = decode_positions(&raw_hand(), view).unwrap();
        assert_eq!(positions.len(), NUM_LANDMARKS);
        assert_relative_eq!(positions[Wrist as usize], Point2::new(100.0, 244.0));
        assert_relative_eq!(positions[ThumbCmc as usize], Point2::new(120.0, 244.0));
        assert_relative_eq!(positions[PinkyTip as usize], Point2::new(500.0, 244.0));
    }

    #[test]
    fn decode_rejects_malformed() {
        let view = Rect::from_top_left(0.0, 0.0, 224.0, 224.0);
        let mut raw = raw_hand();
        raw.pop();
        assert!(decode_positions(&raw, view).is_err());
        assert!(decode_positions(&[], view).is_err());
    }

    #[test]
    fn missing_model_is_an_error() {
        assert!(LandmarkNetwork::load("does/not/exist.onnx").is_err());
    }
}
