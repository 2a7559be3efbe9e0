//! Turning hand landmarks into key intents.
//!
//! [`GestureMapper`] is the "decide" half of the control loop: it consumes at most one
//! [`HandLandmarks`] set per frame and returns the [`KeyEvent`]s the keyboard should see, without
//! sending anything itself.

use crate::{
    filter::{Filter, MovingAvg},
    hand::landmark::{FingerStates, HandLandmarks},
    keys::{KeyEvent, KeyState},
};

/// Left edge of the neutral steering zone, as a fraction of the frame width.
pub const NEUTRAL_ZONE_LEFT: f32 = 0.4;

/// Right edge of the neutral steering zone, as a fraction of the frame width.
pub const NEUTRAL_ZONE_RIGHT: f32 = 0.6;

/// Number of frames the wrist position is averaged over.
pub const WRIST_WINDOW_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    Left,
    Right,
    Neutral,
}

impl Steer {
    /// Picks a steering direction from the horizontal wrist position, in pixels.
    ///
    /// Positions exactly on the edge of the neutral zone count as neutral. There is no hysteresis:
    /// a wrist hovering at the edge can flip between steering and neutral on every frame.
    pub fn from_wrist_x(wrist_x: f32, frame_width: f32) -> Self {
        if wrist_x < NEUTRAL_ZONE_LEFT * frame_width {
            Steer::Left
        } else if wrist_x > NEUTRAL_ZONE_RIGHT * frame_width {
            Steer::Right
        } else {
            Steer::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pedal {
    Accelerate,
    Brake,
    /// Neither accelerate nor brake.
    Coast,
}

impl Pedal {
    /// Index finger accelerates. Middle finger brakes, unless the index finger is also up.
    pub fn from_fingers(fingers: &FingerStates) -> Self {
        if fingers.index {
            Pedal::Accelerate
        } else if fingers.middle {
            Pedal::Brake
        } else {
            Pedal::Coast
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Engage,
    Disengage,
}

impl Special {
    /// Index, middle and ring finger up at once engage the special key.
    pub fn from_fingers(fingers: &FingerStates) -> Self {
        if fingers.index && fingers.middle && fingers.ring {
            Special::Engage
        } else {
            Special::Disengage
        }
    }
}

/// What the player asks for in one frame, one value per independent toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub steer: Steer,
    pub pedal: Pedal,
    pub special: Special,
}

impl Intent {
    /// Everything released, steering centered. Used for frames without a hand.
    pub const NEUTRAL: Self = Self {
        steer: Steer::Neutral,
        pedal: Pedal::Coast,
        special: Special::Disengage,
    };

    pub fn from_gesture(fingers: &FingerStates, wrist_x: f32, frame_width: f32) -> Self {
        Self {
            steer: Steer::from_wrist_x(wrist_x, frame_width),
            pedal: Pedal::from_fingers(fingers),
            special: Special::from_fingers(fingers),
        }
    }
}

/// Result of [`GestureMapper::update`] for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub intent: Intent,
    /// Key events needed to reach the new key state, in delivery order.
    pub events: Vec<KeyEvent>,
    /// The smoothed wrist position in pixels, if a hand was seen this frame.
    pub wrist_x: Option<f32>,
    /// Finger classification, if a hand was seen this frame.
    pub fingers: Option<FingerStates>,
}

/// Maps per-frame hand observations to debounced key transitions.
pub struct GestureMapper {
    frame_width: f32,
    wrist: MovingAvg,
    keys: KeyState,
}

impl GestureMapper {
    /// Creates a mapper for frames that are `frame_width` pixels wide, with all keys released.
    pub fn new(frame_width: u32) -> Self {
        Self {
            frame_width: frame_width as f32,
            wrist: MovingAvg::new(WRIST_WINDOW_LEN),
            keys: KeyState::RELEASED,
        }
    }

    /// Returns the key state after the last [`GestureMapper::update`].
    pub fn keys(&self) -> KeyState {
        self.keys
    }

    /// Replaces the mapper's idea of which keys are held with `keys`.
    ///
    /// The frame loop passes in what the keyboard actually holds after applying a frame's events,
    /// so that an injection that failed is attempted again on the next frame instead of being
    /// forgotten.
    pub fn sync_keys(&mut self, keys: KeyState) {
        if keys != self.keys {
            log::debug!("key state out of sync: expected {:?}, got {:?}", self.keys, keys);
            self.keys = keys;
        }
    }

    /// Processes one frame.
    ///
    /// A frame without a hand releases every key right away. It does not clear the wrist
    /// average, so the first frames after the hand reappears are still averaged with positions
    /// from before it was lost.
    pub fn update(&mut self, hand: Option<&HandLandmarks>) -> Decision {
        let (intent, wrist_x, fingers) = match hand {
            Some(hand) => {
                let fingers = FingerStates::from_landmarks(hand);
                let wrist_x = self.wrist.push(hand.wrist_x() * self.frame_width);
                let intent = Intent::from_gesture(&fingers, wrist_x, self.frame_width);
                (intent, Some(wrist_x), Some(fingers))
            }
            None => (Intent::NEUTRAL, None, None),
        };

        let (keys, events) = self.keys.transition(&intent);
        if keys != self.keys {
            log::trace!("{:?} -> {:?} via {:?}", self.keys, keys, events);
        }
        self.keys = keys;

        Decision {
            intent,
            events,
            wrist_x,
            fingers,
        }
    }
}
