//! Logical game keys and the debounced key-state machine.
//!
//! [`KeyState`] is a plain value describing which keys are held down. Moving it towards an
//! [`Intent`] with [`KeyState::transition`] yields the new state together with the minimal list of
//! [`KeyEvent`]s that gets the real keyboard there. A key that is already held is never pressed
//! again, and a key that is not held is never released.

use std::fmt;

use crate::gesture::{Intent, Pedal, Special, Steer};

/// The logical keys the game is controlled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Accelerate,
    Brake,
    SteerLeft,
    SteerRight,
    Special,
}

impl Key {
    pub const ALL: [Key; 5] = [
        Key::Accelerate,
        Key::Brake,
        Key::SteerLeft,
        Key::SteerRight,
        Key::Special,
    ];
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Key::Accelerate => "accelerate",
            Key::Brake => "brake",
            Key::SteerLeft => "steer left",
            Key::SteerRight => "steer right",
            Key::Special => "special",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
}

/// A single key-down or key-up to be sent to the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self {
            key,
            action: KeyAction::Press,
        }
    }

    pub fn release(key: Key) -> Self {
        Self {
            key,
            action: KeyAction::Release,
        }
    }
}

/// Maps each logical [`Key`] to the character that is typed for it.
///
/// The default bindings are the usual `WASD` layout, with `E` as the special key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub accelerate: char,
    pub brake: char,
    pub steer_left: char,
    pub steer_right: char,
    pub special: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            accelerate: 'w',
            brake: 's',
            steer_left: 'a',
            steer_right: 'd',
            special: 'e',
        }
    }
}

impl KeyBindings {
    /// Returns the character bound to `key`.
    pub fn get(&self, key: Key) -> char {
        match key {
            Key::Accelerate => self.accelerate,
            Key::Brake => self.brake,
            Key::SteerLeft => self.steer_left,
            Key::SteerRight => self.steer_right,
            Key::Special => self.special,
        }
    }
}

/// The set of keys currently held down.
///
/// States produced by [`KeyState::transition`] never hold both steering keys, and never hold
/// accelerate and brake at the same time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    accelerate: bool,
    brake: bool,
    steer_left: bool,
    steer_right: bool,
    special: bool,
}

impl KeyState {
    /// A state with no keys held.
    pub const RELEASED: Self = Self {
        accelerate: false,
        brake: false,
        steer_left: false,
        steer_right: false,
        special: false,
    };

    pub fn is_held(&self, key: Key) -> bool {
        *self.slot(key)
    }

    /// Returns an iterator over the held keys, in [`Key::ALL`] order.
    pub fn held(&self) -> impl Iterator<Item = Key> + '_ {
        Key::ALL.into_iter().filter(|key| self.is_held(*key))
    }

    pub fn is_released(&self) -> bool {
        *self == Self::RELEASED
    }

    /// Records that `event` has been delivered.
    pub fn apply(&mut self, event: KeyEvent) {
        *self.slot_mut(event.key) = event.action == KeyAction::Press;
    }

    /// Computes the state that `intent` asks for, and the events leading there from `self`.
    ///
    /// Events are ordered by toggle: steering first, then accelerate/brake, then special. Within
    /// a toggle, a newly held key is pressed before the opposing key is released.
    pub fn transition(mut self, intent: &Intent) -> (Self, Vec<KeyEvent>) {
        let mut events = Vec::new();

        match intent.steer {
            Steer::Left => {
                self.hold(Key::SteerLeft, &mut events);
                self.lift(Key::SteerRight, &mut events);
            }
            Steer::Right => {
                self.hold(Key::SteerRight, &mut events);
                self.lift(Key::SteerLeft, &mut events);
            }
            Steer::Neutral => {
                self.lift(Key::SteerLeft, &mut events);
                self.lift(Key::SteerRight, &mut events);
            }
        }

        match intent.pedal {
            Pedal::Accelerate => {
                self.hold(Key::Accelerate, &mut events);
                self.lift(Key::Brake, &mut events);
            }
            Pedal::Brake => {
                self.hold(Key::Brake, &mut events);
                self.lift(Key::Accelerate, &mut events);
            }
            Pedal::Coast => {
                self.lift(Key::Accelerate, &mut events);
                self.lift(Key::Brake, &mut events);
            }
        }

        match intent.special {
            Special::Engage => self.hold(Key::Special, &mut events),
            Special::Disengage => self.lift(Key::Special, &mut events),
        }

        (self, events)
    }

    /// Returns the release events for every held key.
    pub fn release_all(&self) -> Vec<KeyEvent> {
        self.held().map(KeyEvent::release).collect()
    }

    fn hold(&mut self, key: Key, events: &mut Vec<KeyEvent>) {
        let slot = self.slot_mut(key);
        if !*slot {
            *slot = true;
            events.push(KeyEvent::press(key));
        }
    }

    fn lift(&mut self, key: Key, events: &mut Vec<KeyEvent>) {
        let slot = self.slot_mut(key);
        if *slot {
            *slot = false;
            events.push(KeyEvent::release(key));
        }
    }

    fn slot(&self, key: Key) -> &bool {
        match key {
            Key::Accelerate => &self.accelerate,
            Key::Brake => &self.brake,
            Key::SteerLeft => &self.steer_left,
            Key::SteerRight => &self.steer_right,
            Key::Special => &self.special,
        }
    }

    fn slot_mut(&mut self, key: Key) -> &mut bool {
        match key {
            Key::Accelerate => &mut self.accelerate,
            Key::Brake => &mut self.brake,
            Key::SteerLeft => &mut self.steer_left,
            Key::SteerRight => &mut self.steer_right,
            Key::Special => &mut self.special,
        }
    }
}
