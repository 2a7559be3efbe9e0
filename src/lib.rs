//! Drive a racing game with hand gestures seen through a webcam.
//!
//! Every camera frame goes through the same steps: the [`hand`] detector finds at most one hand,
//! the [`gesture`] mapper turns its landmarks into per-key intents and key transitions, and the
//! [`inject`] layer forwards those transitions to the operating system as synthetic key presses.
//!
//! The decision half ([`gesture::GestureMapper`] and [`keys::KeyState`]) is free of side effects,
//! so it can be driven frame by frame from tests without touching a real keyboard.
//!
//! # Gestures
//!
//! * The horizontal wrist position (averaged over the last 5 frames) steers: left of 40% of the
//!   frame width holds the left key, right of 60% holds the right key.
//! * An extended index finger accelerates. Otherwise an extended middle finger brakes.
//! * Extending index, middle and ring finger at once holds the special key.
//! * Losing the hand releases everything immediately.
//!
//! # Environment Variables
//!
//! * `HANDSTEER_WEBCAM_NAME`: Forces the device to use for [`Webcam`]s created without an explicit
//!   device name. If unset, the first device that supports a compatible image format will be used.
//! * `HANDSTEER_PALM_MODEL`: Path to the palm detection ONNX network loaded by
//!   [`PalmNetwork::from_env`]. Defaults to `3rdparty/onnx/palm_detection_lite.onnx`.
//! * `HANDSTEER_HAND_MODEL`: Path to the hand landmark ONNX network loaded by
//!   [`LandmarkNetwork::from_env`]. Defaults to `3rdparty/onnx/hand_landmark_lite.onnx`.
//! * `RUST_LOG`: Overrides the default log filter (see [`init_logger!`]).
//!
//! [`Webcam`]: webcam::Webcam
//! [`PalmNetwork::from_env`]: hand::detection::PalmNetwork::from_env
//! [`LandmarkNetwork::from_env`]: hand::landmark::LandmarkNetwork::from_env

use log::LevelFilter;

pub mod detection;
pub mod draw;
pub mod filter;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod inject;
pub mod keys;
mod nn;
pub mod rect;
pub mod resolution;
pub mod timer;
pub mod webcam;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `handsteer` will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `wgpu` will always log at *warn* level. `RUST_LOG` is applied on top of these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
