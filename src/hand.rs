//! Hand landmarks and their detection in camera frames.
//!
//! Finding a hand takes two networks: [`detection`] locates palms in the whole frame, and
//! [`landmark`] estimates the hand's landmarks on a crop around one. [`tracking`] ties them
//! together and skips palm detection while a hand is being tracked.
//!
//! Only a single hand is ever reported. Landmark coordinates are normalized to the frame, so
//! `(0.0, 0.0)` is the top left corner and `(1.0, 1.0)` the bottom right one, with Y pointing
//! *down* like in the camera image.

pub mod detection;
pub mod landmark;
pub mod tracking;
