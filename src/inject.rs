//! Delivering key events to the operating system.
//!
//! This is the "act" half of the control loop. [`Keyboard`] turns the [`KeyEvent`]s decided by
//! [`GestureMapper`] into calls on a [`KeyInjector`], and makes sure nothing stays pressed once it
//! goes away.
//!
//! [`GestureMapper`]: crate::gesture::GestureMapper

use std::{cell::RefCell, rc::Rc};

use anyhow::anyhow;
use enigo::{Direction, Enigo, Keyboard as _, Settings};

use crate::keys::{KeyAction, KeyBindings, KeyEvent, KeyState};

/// A sink for synthetic key presses.
pub trait KeyInjector {
    /// Presses and holds the key that types `key`.
    fn press(&mut self, key: char) -> anyhow::Result<()>;

    /// Releases the key that types `key`.
    fn release(&mut self, key: char) -> anyhow::Result<()>;
}

/// Injects key events through the platform's input system, using [`enigo`].
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    /// Connects to the platform's input system.
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("failed to connect to the input system: {:?}", e))?;
        Ok(Self { enigo })
    }

    fn send(&mut self, key: char, direction: Direction) -> anyhow::Result<()> {
        self.enigo
            .key(enigo::Key::Unicode(key), direction)
            .map_err(|e| anyhow!("failed to send {:?} for '{}': {:?}", direction, key, e))
    }
}

impl KeyInjector for EnigoInjector {
    fn press(&mut self, key: char) -> anyhow::Result<()> {
        self.send(key, Direction::Press)
    }

    fn release(&mut self, key: char) -> anyhow::Result<()> {
        self.send(key, Direction::Release)
    }
}

/// A [`KeyInjector`] that only records what it is asked to do.
///
/// Clones share the same log, so a clone kept outside a [`Keyboard`] can still be inspected after
/// the [`Keyboard`] is dropped.
#[derive(Debug, Clone, Default)]
pub struct RecordingInjector {
    log: Rc<RefCell<Vec<(KeyAction, char)>>>,
    failing: Rc<RefCell<Vec<char>>>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every successfully injected event so far, oldest first.
    pub fn events(&self) -> Vec<(KeyAction, char)> {
        self.log.borrow().clone()
    }

    /// Makes every later press or release of `key` fail.
    pub fn fail_on(&self, key: char) {
        self.failing.borrow_mut().push(key);
    }

    /// Lets `key` be injected again after [`RecordingInjector::fail_on`].
    pub fn recover(&self, key: char) {
        self.failing.borrow_mut().retain(|k| *k != key);
    }

    /// Returns the keys that are pressed according to the log.
    pub fn held(&self) -> Vec<char> {
        let mut held = Vec::new();
        for &(action, key) in self.log.borrow().iter() {
            match action {
                KeyAction::Press => held.push(key),
                KeyAction::Release => held.retain(|k| *k != key),
            }
        }
        held
    }

    fn record(&mut self, action: KeyAction, key: char) -> anyhow::Result<()> {
        if self.failing.borrow().contains(&key) {
            anyhow::bail!("injection of '{}' rejected", key);
        }
        self.log.borrow_mut().push((action, key));
        Ok(())
    }
}

impl KeyInjector for RecordingInjector {
    fn press(&mut self, key: char) -> anyhow::Result<()> {
        self.record(KeyAction::Press, key)
    }

    fn release(&mut self, key: char) -> anyhow::Result<()> {
        self.record(KeyAction::Release, key)
    }
}

/// Applies [`KeyEvent`]s through a [`KeyInjector`] and tracks which keys really are held.
///
/// Dropping a [`Keyboard`] releases every key it still holds.
pub struct Keyboard<I: KeyInjector> {
    injector: I,
    bindings: KeyBindings,
    /// Keys whose press went through and whose release has not.
    held: KeyState,
}

impl<I: KeyInjector> Keyboard<I> {
    pub fn new(injector: I, bindings: KeyBindings) -> Self {
        Self {
            injector,
            bindings,
            held: KeyState::RELEASED,
        }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Returns the keys that have been pressed and not yet released.
    pub fn held(&self) -> KeyState {
        self.held
    }

    /// Delivers `events` in order.
    ///
    /// Pressing a key that is already held, or releasing one that is not, does nothing. Failures
    /// are logged and skipped: a failed press leaves the key released and a failed release leaves
    /// it held, so a later press, release or [`Keyboard::release_all`] tries again.
    pub fn apply(&mut self, events: &[KeyEvent]) {
        for &event in events {
            let key = self.bindings.get(event.key);
            let held = self.held.is_held(event.key);
            if held == (event.action == KeyAction::Press) {
                log::trace!("skipping redundant {:?} of {}", event.action, event.key);
                continue;
            }

            let result = match event.action {
                KeyAction::Press => self.injector.press(key),
                KeyAction::Release => self.injector.release(key),
            };
            match result {
                Ok(()) => {
                    log::trace!("{:?} {} ('{}')", event.action, event.key, key);
                    self.held.apply(event);
                }
                Err(e) => log::error!("{} ({}): {:#}", event.key, key, e),
            }
        }
    }

    /// Releases every key that is still held.
    pub fn release_all(&mut self) {
        let events = self.held.release_all();
        if !events.is_empty() {
            log::debug!("releasing {} held key(s)", events.len());
        }
        self.apply(&events);
    }
}

impl<I: KeyInjector> Drop for Keyboard<I> {
    fn drop(&mut self) {
        self.release_all();
    }
}
