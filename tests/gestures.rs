//! Drives the decide and act halves together, frame by frame, against a recording keyboard.

use handsteer::{
    gesture::{GestureMapper, WRIST_WINDOW_LEN},
    hand::landmark::{HandLandmarks, LandmarkIdx, NUM_LANDMARKS},
    inject::{Keyboard, RecordingInjector},
    keys::{Key, KeyAction, KeyBindings},
};

const WIDTH: u32 = 640;

#[derive(Clone, Copy)]
struct Pose {
    /// Wrist position, normalized.
    wrist_x: f32,
    index: bool,
    middle: bool,
    ring: bool,
}

impl Pose {
    fn fist(wrist_x: f32) -> Self {
        Self {
            wrist_x,
            index: false,
            middle: false,
            ring: false,
        }
    }

    fn random() -> Self {
        Self {
            wrist_x: fastrand::f32(),
            index: fastrand::bool(),
            middle: fastrand::bool(),
            ring: fastrand::bool(),
        }
    }

    fn landmarks(&self) -> HandLandmarks {
        use LandmarkIdx::*;

        let mut pos = [[0.5, 0.5]; NUM_LANDMARKS];
        pos[Wrist as usize] = [self.wrist_x, 0.9];
        for (up, mcp, tip) in [
            (self.index, IndexFingerMcp, IndexFingerTip),
            (self.middle, MiddleFingerMcp, MiddleFingerTip),
            (self.ring, RingFingerMcp, RingFingerTip),
        ] {
            pos[mcp as usize] = [0.5, 0.5];
            pos[tip as usize] = [0.5, if up { 0.25 } else { 0.6 }];
        }
        HandLandmarks::new(pos).unwrap()
    }
}

struct Rig {
    mapper: GestureMapper,
    keyboard: Keyboard<RecordingInjector>,
    injector: RecordingInjector,
}

impl Rig {
    fn new() -> Self {
        let injector = RecordingInjector::new();
        Self {
            mapper: GestureMapper::new(WIDTH),
            keyboard: Keyboard::new(injector.clone(), KeyBindings::default()),
            injector,
        }
    }

    fn frame(&mut self, pose: Option<Pose>) {
        let hand = pose.map(|pose| pose.landmarks());
        let decision = self.mapper.update(hand.as_ref());
        self.keyboard.apply(&decision.events);
        self.mapper.sync_keys(self.keyboard.held());
    }

    /// Feeds the same pose until the wrist average consists of it alone.
    fn settle(&mut self, pose: Pose) {
        for _ in 0..WRIST_WINDOW_LEN {
            self.frame(Some(pose));
        }
    }

    fn held(&self) -> Vec<char> {
        let mut held = self.injector.held();
        held.sort_unstable();
        held
    }
}

#[test]
fn steering_follows_wrist() {
    let mut rig = Rig::new();

    rig.settle(Pose::fist(0.2));
    assert_eq!(rig.held(), ['a']);

    rig.settle(Pose::fist(0.8));
    assert_eq!(rig.held(), ['d']);

    rig.settle(Pose::fist(0.5));
    assert!(rig.held().is_empty());
}

#[test]
fn accelerate_wins_over_brake() {
    let mut rig = Rig::new();
    let both = Pose {
        index: true,
        middle: true,
        ..Pose::fist(0.5)
    };
    rig.frame(Some(both));
    assert_eq!(rig.held(), ['w']);

    let brake = Pose {
        index: false,
        ..both
    };
    rig.frame(Some(brake));
    assert_eq!(rig.held(), ['s']);
}

#[test]
fn special_with_three_fingers() {
    let mut rig = Rig::new();
    rig.frame(Some(Pose {
        index: true,
        middle: true,
        ring: true,
        ..Pose::fist(0.5)
    }));
    assert_eq!(rig.held(), ['e', 'w']);
}

#[test]
fn losing_hand_releases_everything() {
    let mut rig = Rig::new();
    rig.settle(Pose {
        index: true,
        middle: true,
        ring: true,
        ..Pose::fist(0.1)
    });
    assert_eq!(rig.held(), ['a', 'e', 'w']);

    rig.frame(None);
    assert!(rig.held().is_empty());
    assert!(rig.keyboard.held().is_released());
}

#[test]
fn stable_gesture_is_quiet() {
    let mut rig = Rig::new();
    let pose = Pose {
        index: true,
        ..Pose::fist(0.9)
    };
    rig.settle(pose);
    let before = rig.injector.events().len();
    for _ in 0..20 {
        rig.frame(Some(pose));
    }
    assert_eq!(rig.injector.events().len(), before);
}

#[test]
fn random_frames_keep_invariants() {
    let mut rig = Rig::new();
    for _ in 0..2000 {
        let pose = if fastrand::u8(..) < 30 {
            None
        } else {
            Some(Pose::random())
        };
        rig.frame(pose);

        let held = rig.held();
        assert!(!(held.contains(&'w') && held.contains(&'s')), "{held:?}");
        assert!(!(held.contains(&'a') && held.contains(&'d')), "{held:?}");
        if pose.is_none() {
            assert!(held.is_empty(), "{held:?}");
        }

        // The keyboard's view and what was actually injected agree.
        let mut tracked = rig
            .keyboard
            .held()
            .held()
            .map(|key| KeyBindings::default().get(key))
            .collect::<Vec<_>>();
        tracked.sort_unstable();
        assert_eq!(tracked, held);
        assert_eq!(rig.keyboard.held(), rig.mapper.keys());
    }

    let Rig {
        mapper,
        keyboard,
        injector,
    } = rig;
    drop(mapper);
    drop(keyboard);

    // Every press has a matching release, and keys are never pressed twice in a row.
    let events = injector.events();
    for key in ['w', 's', 'a', 'd', 'e'] {
        let actions = events
            .iter()
            .filter(|(_, k)| *k == key)
            .map(|(action, _)| *action)
            .collect::<Vec<_>>();
        assert!(actions.len() % 2 == 0, "{key}: {actions:?}");
        for pair in actions.chunks(2) {
            assert_eq!(pair, [KeyAction::Press, KeyAction::Release], "{key}");
        }
    }
    assert!(injector.held().is_empty());
}

fn accelerate() -> Pose {
    Pose {
        index: true,
        ..Pose::fist(0.5)
    }
}

fn injected(rig: &Rig, key: char) -> Vec<KeyAction> {
    rig.injector
        .events()
        .into_iter()
        .filter(|(_, k)| *k == key)
        .map(|(action, _)| action)
        .collect()
}

#[test]
fn failed_release_is_not_pressed_again() {
    let mut rig = Rig::new();
    rig.frame(Some(accelerate()));

    rig.injector.fail_on('w');
    rig.frame(Some(Pose::fist(0.5)));
    assert_eq!(rig.held(), ['w']);
    assert_eq!(rig.mapper.keys(), rig.keyboard.held());

    rig.injector.recover('w');
    rig.frame(Some(accelerate()));
    assert_eq!(injected(&rig, 'w'), [KeyAction::Press]);
    assert_eq!(rig.held(), ['w']);

    rig.frame(Some(Pose::fist(0.5)));
    assert_eq!(injected(&rig, 'w'), [KeyAction::Press, KeyAction::Release]);
    assert!(rig.held().is_empty());
}

#[test]
fn failed_release_is_retried_next_frame() {
    let mut rig = Rig::new();
    rig.frame(Some(accelerate()));

    rig.injector.fail_on('w');
    rig.frame(None);
    assert_eq!(rig.held(), ['w']);

    rig.injector.recover('w');
    rig.frame(None);
    assert!(rig.held().is_empty());
    assert!(rig.mapper.keys().is_released());
}

#[test]
fn failed_press_is_retried_while_gesture_is_held() {
    let mut rig = Rig::new();
    rig.injector.fail_on('w');
    for _ in 0..10 {
        rig.frame(Some(accelerate()));
    }
    assert!(rig.held().is_empty());
    assert!(!rig.mapper.keys().is_held(Key::Accelerate));

    rig.injector.recover('w');
    rig.frame(Some(accelerate()));
    assert_eq!(rig.held(), ['w']);
    assert_eq!(injected(&rig, 'w'), [KeyAction::Press]);
}

#[test]
fn dropping_keyboard_releases_held_keys() {
    let mut rig = Rig::new();
    rig.settle(Pose {
        index: true,
        ..Pose::fist(0.05)
    });
    assert!(rig.keyboard.held().is_held(Key::SteerLeft));
    assert!(rig.keyboard.held().is_held(Key::Accelerate));

    let injector = rig.injector.clone();
    drop(rig);
    assert!(injector.held().is_empty());
}
