//! Keyboard state shared between the (out of scope) remote front-end and
//! the interpreter's `INKEY$`/`KEYSTATE`/`KEYPRESSED` builtins.
//!
//! spec.md §3 "Key state" calls for "lock-free reads... wait-free on the
//! hot path": `KEYSTATE`/`KEYPRESSED` are checked from inside tight `FOR`
//! loops, so they're backed by a fixed array of `AtomicBool`, one per
//! recognized key name, indexed by a `match` rather than a hash lookup.
//! `INKEY$` is a one-shot "was a key typed since I last asked" read, which
//! only needs a short critical section around a single `Option<Box<str>>`
//! slot — contention there is bounded by how often a program polls
//! `INKEY$`, not by how fast the VM's instruction loop spins.

use core_interp::KeyInput;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Recognized key names, in the order their flag lives in `KeyState::flags`.
/// Unrecognized names (anything not in this list) read as permanently
/// false rather than growing the table — spec.md doesn't define a dynamic
/// key namespace, and a fixed set keeps the hot path a plain index.
const KNOWN_KEYS: &[&str] = &[
    "UP", "DOWN", "LEFT", "RIGHT", "SPACE", "ENTER", "ESC", "TAB", "SHIFT", "CTRL", "ALT",
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
    "T", "U", "V", "W", "X", "Y", "Z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

fn key_index(name: &str) -> Option<usize> {
    KNOWN_KEYS.iter().position(|k| k.eq_ignore_ascii_case(name))
}

/// Host-facing, `Send + Sync` keyboard state. One instance per session,
/// shared between the front-end's key-event intake and the interpreter's
/// read side via [`core_interp::KeyInput`].
pub struct KeyState {
    down: Vec<AtomicBool>,
    pressed_since_poll: Vec<AtomicBool>,
    inkey: Mutex<Option<Box<str>>>,
}

impl Default for KeyState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyState {
    pub fn new() -> Self {
        Self {
            down: (0..KNOWN_KEYS.len()).map(|_| AtomicBool::new(false)).collect(),
            pressed_since_poll: (0..KNOWN_KEYS.len()).map(|_| AtomicBool::new(false)).collect(),
            inkey: Mutex::new(None),
        }
    }

    /// Records a key going down: sets the live `down` flag, latches
    /// `pressed_since_poll` until `KEYPRESSED` consumes it, and pushes a
    /// one-slot `INKEY$` buffer (last key wins, matching the classic
    /// single-character type-ahead).
    pub fn key_down(&self, name: &str) {
        if let Some(i) = key_index(name) {
            self.down[i].store(true, Ordering::Relaxed);
            self.pressed_since_poll[i].store(true, Ordering::Relaxed);
        }
        if let Ok(mut slot) = self.inkey.lock() {
            *slot = Some(Box::from(name));
        }
    }

    pub fn key_up(&self, name: &str) {
        if let Some(i) = key_index(name) {
            self.down[i].store(false, Ordering::Relaxed);
        }
    }
}

impl KeyInput for KeyState {
    fn keystate(&self, key_name: &str) -> bool {
        key_index(key_name).map(|i| self.down[i].load(Ordering::Relaxed)).unwrap_or(false)
    }

    fn keypressed(&self, key_name: &str) -> bool {
        match key_index(key_name) {
            Some(i) => self.pressed_since_poll[i].swap(false, Ordering::Relaxed),
            None => false,
        }
    }

    fn inkey(&self) -> Rc<str> {
        let mut slot = match self.inkey.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match slot.take() {
            Some(name) => Rc::from(&*name),
            None => Rc::from(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_name_is_always_false() {
        let keys = KeyState::new();
        assert!(!keys.keystate("F13"));
        assert!(!keys.keypressed("F13"));
        keys.key_down("F13");
        assert!(!keys.keystate("F13"));
    }

    #[test]
    fn keystate_tracks_down_and_up() {
        let keys = KeyState::new();
        assert!(!keys.keystate("UP"));
        keys.key_down("UP");
        assert!(keys.keystate("UP"));
        keys.key_up("UP");
        assert!(!keys.keystate("UP"));
    }

    #[test]
    fn keypressed_consumes_the_latch() {
        let keys = KeyState::new();
        keys.key_down("A");
        assert!(keys.keypressed("A"));
        assert!(!keys.keypressed("A"));
    }

    #[test]
    fn inkey_is_one_shot_and_last_key_wins() {
        let keys = KeyState::new();
        assert_eq!(&*keys.inkey(), "");
        keys.key_down("A");
        keys.key_down("B");
        assert_eq!(&*keys.inkey(), "B");
        assert_eq!(&*keys.inkey(), "");
    }

    #[test]
    fn keystate_is_case_insensitive() {
        let keys = KeyState::new();
        keys.key_down("a");
        assert!(keys.keystate("A"));
    }
}
