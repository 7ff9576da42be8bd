// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Key events and the press registry.
//!
//! Hardware and pointer input both end up here as [`KeyEvent`]s. The registry keeps
//! one press/release handler pair per note and tracks which notes are held down, so a
//! note pressed by one source can be released by the other.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::midi::{ParsedMidiMessage, NOTE_OFF, NOTE_ON};

/// Which way a key moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
}

/// A key press or release, from either a MIDI device or the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyEvent {
    pub note: u8,
    /// Velocity in [0, 1].
    pub velocity: f32,
    pub direction: Direction,
}

impl KeyEvent {
    /// A key press.
    pub fn down(note: u8, velocity: f32) -> KeyEvent {
        KeyEvent {
            note,
            velocity,
            direction: Direction::Down,
        }
    }

    /// A key release.
    pub fn up(note: u8) -> KeyEvent {
        KeyEvent {
            note,
            velocity: 0.0,
            direction: Direction::Up,
        }
    }
}

/// Classifies a parsed MIDI message as a key event. Only Note On and Note Off produce
/// events, and a Note On with zero velocity is a release. If a channel filter is given,
/// messages on other channels are ignored.
pub fn classify(message: &ParsedMidiMessage, channel_filter: Option<u8>) -> Option<KeyEvent> {
    if channel_filter.is_some_and(|channel| channel != message.channel) {
        return None;
    }

    let direction = match message.command {
        NOTE_ON if message.velocity > 0.0 => Direction::Down,
        NOTE_ON | NOTE_OFF => Direction::Up,
        _ => return None,
    };

    Some(KeyEvent {
        note: message.note,
        velocity: message.velocity,
        direction,
    })
}

/// What to do when a key that is already down is pressed again.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerBehavior {
    /// The repeated press is ignored.
    #[default]
    Ignore,
    /// The press handler runs again.
    Retrigger,
}

/// A press or release handler.
pub type Handler = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

struct Registration {
    generation: u64,
    on_press: Handler,
    on_release: Option<Handler>,
}

#[derive(Default)]
struct Inner {
    handlers: HashMap<u8, Registration>,
    pressed: HashSet<u8>,
    next_generation: u64,
    last_event: Option<KeyEvent>,
}

/// Maps notes to press/release handlers and arbitrates presses from multiple sources.
#[derive(Clone)]
pub struct PressRegistry {
    inner: Arc<Mutex<Inner>>,
    retrigger: RetriggerBehavior,
}

impl PressRegistry {
    /// Creates an empty registry.
    pub fn new(retrigger: RetriggerBehavior) -> PressRegistry {
        PressRegistry {
            inner: Arc::new(Mutex::new(Inner::default())),
            retrigger,
        }
    }

    /// Registers handlers for the note, replacing any earlier registration. The returned
    /// handle removes exactly this registration.
    pub fn register(&self, note: u8, on_press: Handler, on_release: Option<Handler>) -> Unregister {
        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        if inner
            .handlers
            .insert(
                note,
                Registration {
                    generation,
                    on_press,
                    on_release,
                },
            )
            .is_some()
        {
            debug!(note, "Replaced key handlers.");
        }

        Unregister {
            inner: Arc::downgrade(&self.inner),
            note,
            generation,
        }
    }

    /// Presses the note, as a pointer would.
    pub fn press(&self, note: u8, velocity: f32) -> bool {
        self.dispatch(KeyEvent::down(note, velocity))
    }

    /// Releases the note, as a pointer would.
    pub fn release(&self, note: u8) -> bool {
        self.dispatch(KeyEvent::up(note))
    }

    /// Applies the key event and runs the matching handler, if any. Returns true if a
    /// handler ran. Handlers run without the registry locked, so they may register or
    /// unregister.
    pub fn dispatch(&self, event: KeyEvent) -> bool {
        let handler = {
            let mut inner = self.inner.lock();
            inner.last_event = Some(event);

            match event.direction {
                Direction::Down => {
                    let newly_pressed = inner.pressed.insert(event.note);
                    if !newly_pressed && self.retrigger == RetriggerBehavior::Ignore {
                        debug!(note = event.note, "Key already down, ignoring press.");
                        return false;
                    }
                    inner
                        .handlers
                        .get(&event.note)
                        .map(|registration| registration.on_press.clone())
                }
                Direction::Up => {
                    if !inner.pressed.remove(&event.note) {
                        debug!(note = event.note, "Key is not down, ignoring release.");
                        return false;
                    }
                    inner
                        .handlers
                        .get(&event.note)
                        .and_then(|registration| registration.on_release.clone())
                }
            }
        };

        match handler {
            Some(handler) => {
                handler(&event);
                true
            }
            None => false,
        }
    }

    /// Returns true if the note is held down.
    pub fn is_pressed(&self, note: u8) -> bool {
        self.inner.lock().pressed.contains(&note)
    }

    /// Returns the notes that are held down, in ascending order.
    pub fn pressed_notes(&self) -> Vec<u8> {
        let mut notes: Vec<u8> = self.inner.lock().pressed.iter().copied().collect();
        notes.sort_unstable();
        notes
    }

    /// Returns true if handlers are registered for the note.
    pub fn is_registered(&self, note: u8) -> bool {
        self.inner.lock().handlers.contains_key(&note)
    }

    /// Returns the last key event the registry saw.
    pub fn last_event(&self) -> Option<KeyEvent> {
        self.inner.lock().last_event
    }
}

/// Removes one registration. Safe to call any number of times.
pub struct Unregister {
    inner: Weak<Mutex<Inner>>,
    note: u8,
    generation: u64,
}

impl Unregister {
    /// Removes the registration if it is still the current one for its note.
    pub fn unregister(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let mut inner = inner.lock();
        if inner
            .handlers
            .get(&self.note)
            .is_some_and(|registration| registration.generation == self.generation)
        {
            inner.handlers.remove(&self.note);
            debug!(note = self.note, "Unregistered key handlers.");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::midi;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler: Handler = {
            let count = count.clone();
            Arc::new(move |_: &KeyEvent| {
                count.fetch_add(1, Ordering::Relaxed);
            })
        };
        (count, handler)
    }

    fn classify_bytes(bytes: &[u8], channel_filter: Option<u8>) -> Option<KeyEvent> {
        midi::parse(bytes).and_then(|message| classify(&message, channel_filter))
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            Some(KeyEvent::down(60, 64.0 / 127.0)),
            classify_bytes(&[0x90, 60, 64], None)
        );
        assert_eq!(
            Some(KeyEvent {
                note: 60,
                velocity: 0.0,
                direction: Direction::Up,
            }),
            classify_bytes(&[0x90, 60, 0], None)
        );
        assert_eq!(
            Some(Direction::Up),
            classify_bytes(&[0x80, 60, 64], None).map(|event| event.direction)
        );
        assert_eq!(
            Some(Direction::Up),
            classify_bytes(&[0x80, 60], None).map(|event| event.direction)
        );
        // Control change and program change are ignored.
        assert_eq!(None, classify_bytes(&[0xB0, 7, 100], None));
        assert_eq!(None, classify_bytes(&[0xC0, 3], None));
    }

    #[test]
    fn test_classify_channel_filter() {
        assert!(classify_bytes(&[0x91, 60, 64], None).is_some());
        assert!(classify_bytes(&[0x91, 60, 64], Some(1)).is_some());
        assert_eq!(None, classify_bytes(&[0x91, 60, 64], Some(0)));
        assert_eq!(None, classify_bytes(&[0x81, 60, 64], Some(0)));
    }

    #[test]
    fn test_press_and_release() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (presses, on_press) = counter();
        let (releases, on_release) = counter();
        registry.register(60, on_press, Some(on_release));

        assert!(registry.press(60, 0.5));
        assert!(registry.is_pressed(60));
        assert!(registry.release(60));
        assert!(!registry.is_pressed(60));

        assert_eq!(1, presses.load(Ordering::Relaxed));
        assert_eq!(1, releases.load(Ordering::Relaxed));
        assert_eq!(Some(KeyEvent::up(60)), registry.last_event());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (first, first_handler) = counter();
        let (second, second_handler) = counter();

        let first_unregister = registry.register(60, first_handler, None);
        registry.register(60, second_handler, None);
        registry.press(60, 1.0);

        assert_eq!(0, first.load(Ordering::Relaxed));
        assert_eq!(1, second.load(Ordering::Relaxed));

        // The stale handle leaves the newer registration alone.
        first_unregister.unregister();
        assert!(registry.is_registered(60));
    }

    #[test]
    fn test_unregister_twice() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (presses, on_press) = counter();

        let unregister = registry.register(60, on_press, None);
        unregister.unregister();
        unregister.unregister();

        assert!(!registry.is_registered(60));
        assert!(!registry.press(60, 1.0));
        assert_eq!(0, presses.load(Ordering::Relaxed));

        // The press is still tracked without a handler.
        assert!(registry.is_pressed(60));
    }

    #[test]
    fn test_unregister_after_registry_dropped() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (_, on_press) = counter();
        let unregister = registry.register(60, on_press, None);
        drop(registry);
        unregister.unregister();
    }

    #[test]
    fn test_repeated_press_ignored() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (presses, on_press) = counter();
        registry.register(60, on_press, None);

        assert!(registry.press(60, 1.0));
        assert!(!registry.press(60, 1.0));
        assert_eq!(1, presses.load(Ordering::Relaxed));
    }

    #[test]
    fn test_repeated_press_retriggers() {
        let registry = PressRegistry::new(RetriggerBehavior::Retrigger);
        let (presses, on_press) = counter();
        registry.register(60, on_press, None);

        assert!(registry.press(60, 1.0));
        assert!(registry.press(60, 1.0));
        assert_eq!(2, presses.load(Ordering::Relaxed));
    }

    #[test]
    fn test_release_without_press() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (_, on_press) = counter();
        let (releases, on_release) = counter();
        registry.register(60, on_press, Some(on_release));

        assert!(!registry.release(60));
        registry.press(60, 1.0);
        assert!(registry.release(60));
        assert!(!registry.release(60));
        assert_eq!(1, releases.load(Ordering::Relaxed));
    }

    #[test]
    fn test_sources_share_pressed_state() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (presses, on_press) = counter();
        let (releases, on_release) = counter();
        registry.register(64, on_press, Some(on_release));

        // Pressed by the pointer, then pressed and released on the hardware.
        registry.press(64, 0.8);
        let down = classify_bytes(&[0x90, 64, 100], None).expect("expected event");
        assert!(!registry.dispatch(down));
        let up = classify_bytes(&[0x80, 64, 0], None).expect("expected event");
        assert!(registry.dispatch(up));

        // The pointer release finds nothing left to release.
        assert!(!registry.release(64));
        assert_eq!(1, presses.load(Ordering::Relaxed));
        assert_eq!(1, releases.load(Ordering::Relaxed));
        assert!(registry.pressed_notes().is_empty());
    }

    #[test]
    fn test_handler_can_reregister() {
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let (replacement_presses, replacement) = counter();
        let on_press: Handler = {
            let registry = registry.clone();
            Arc::new(move |event: &KeyEvent| {
                registry.register(event.note, replacement.clone(), None);
            })
        };
        registry.register(60, on_press, None);

        registry.press(60, 1.0);
        registry.release(60);
        registry.press(60, 1.0);
        assert_eq!(1, replacement_presses.load(Ordering::Relaxed));
    }
}
