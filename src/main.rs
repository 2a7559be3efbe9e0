use std::iter;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use handsteer::{
    draw,
    gesture::{Decision, GestureMapper},
    gui::Preview,
    hand::{
        landmark::HandLandmarks,
        tracking::{HandDetector, HandTracker},
    },
    inject::{EnigoInjector, KeyInjector, Keyboard},
    keys::KeyBindings,
    timer::{FpsCounter, Timer},
    webcam::{Webcam, WebcamOptions},
};
use image::{imageops, RgbaImage};
use itertools::Itertools;

const WINDOW_TITLE: &str = "Gesture Steering Control";

fn main() -> anyhow::Result<()> {
    handsteer::init_logger!();

    let mut webcam = Webcam::open(WebcamOptions::default())?;
    let resolution = webcam.resolution();
    let mut tracker = HandTracker::from_env()?;
    let mut preview = Preview::open(WINDOW_TITLE, resolution)?;
    let mut keyboard = Keyboard::new(EnigoInjector::new()?, KeyBindings::default());
    let mut mapper = GestureMapper::new(resolution.width());

    let mut fps = FpsCounter::new("handsteer");
    let t_annotate = Timer::new("annotate");
    loop {
        let mut frame = match webcam.read() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("failed to read from webcam: {:#}", e);
                break;
            }
        };
        // Mirror so that moving the hand to the left moves it left on screen, too.
        imageops::flip_horizontal_in_place(&mut frame);

        let hand = tracker.detect(&frame);
        let decision = mapper.update(hand.as_ref());
        keyboard.apply(&decision.events);
        mapper.sync_keys(keyboard.held());

        t_annotate.time(|| {
            if let Some(roi) = tracker.roi() {
                draw::rect(&mut frame, roi).color(Rgb888::CYAN);
            }
            annotate(&mut frame, hand.as_ref(), &decision, &keyboard);
        });
        preview.show(&frame)?;

        if preview.pump_events() {
            log::info!("quit requested, exiting");
            break;
        }

        fps.tick_with(
            webcam
                .timers()
                .chain(tracker.timers())
                .chain(iter::once(&t_annotate)),
        );
    }

    keyboard.release_all();
    Ok(())
}

fn annotate<I: KeyInjector>(
    frame: &mut RgbaImage,
    hand: Option<&HandLandmarks>,
    decision: &Decision,
    keyboard: &Keyboard<I>,
) {
    if let Some(hand) = hand {
        hand.draw(frame);
    }
    if let Some(wrist_x) = decision.wrist_x {
        let label = format!("Wrist X: {}", wrist_x as i32);
        draw::text(frame, 10, 30, &label)
            .align_left()
            .color(Rgb888::GREEN);
    }

    let held = keyboard
        .held()
        .held()
        .map(|key| format!("{} [{}]", key, keyboard.bindings().get(key)))
        .join(", ");
    let status = if held.is_empty() {
        "Keys: none".to_string()
    } else {
        format!("Keys: {}", held)
    };
    let bottom = frame.height() as i32 - 10;
    draw::text(frame, 10, bottom, &status)
        .align_left()
        .align_bottom()
        .color(Rgb888::YELLOW);
}
