//! Physical inputs: key bindings and the set of inputs currently held down.

use std::collections::HashMap;

use crate::config::KeyBinding;
use crate::pitch::Pitch;

/// A physical source of note presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// A computer-keyboard key, stored upper-case.
    Key(char),
    /// A mouse or touch press on an on-screen key.
    Pointer,
}

impl Input {
    pub fn key(c: char) -> Self {
        Input::Key(c.to_ascii_uppercase())
    }
}

/// Case-insensitive key → pitch lookup.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: HashMap<char, Pitch>,
}

impl Keymap {
    pub fn new(bindings: &[KeyBinding]) -> Self {
        Keymap {
            bindings: bindings
                .iter()
                .map(|b| (b.key.to_ascii_uppercase(), b.pitch))
                .collect(),
        }
    }

    pub fn resolve(&self, key: char) -> Option<Pitch> {
        self.bindings.get(&key.to_ascii_uppercase()).copied()
    }

    /// Label to show on the on-screen key for `pitch`.
    pub fn key_for(&self, pitch: Pitch) -> Option<char> {
        let mut keys: Vec<char> = self
            .bindings
            .iter()
            .filter(|(_, p)| **p == pitch)
            .map(|(k, _)| *k)
            .collect();
        keys.sort_unstable();
        keys.first().copied()
    }
}

/// Inputs currently held down and the pitch each one sounds.
#[derive(Debug, Clone, Default)]
pub struct PressedInputs {
    held: HashMap<Input, Pitch>,
}

impl PressedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press. Returns false if the input was already down
    /// (auto-repeat), in which case nothing should sound.
    pub fn press(&mut self, input: Input, pitch: Pitch) -> bool {
        if self.held.contains_key(&input) {
            return false;
        }
        self.held.insert(input, pitch);
        true
    }

    /// Record a release. Returns the pitch to stop, or `None` if the input
    /// was not down or another held input still sounds the same pitch.
    pub fn release(&mut self, input: Input) -> Option<Pitch> {
        let pitch = self.held.remove(&input)?;
        (!self.is_held(pitch)).then_some(pitch)
    }

    pub fn is_held(&self, pitch: Pitch) -> bool {
        self.held.values().any(|p| *p == pitch)
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_keymap;

    #[test]
    fn keymap_is_case_insensitive() {
        let keymap = Keymap::new(&default_keymap());
        assert_eq!(keymap.resolve('q'), Some(Pitch::C));
        assert_eq!(keymap.resolve('Q'), Some(Pitch::C));
        assert_eq!(keymap.resolve('y'), Some(Pitch::ASharp));
        assert_eq!(keymap.resolve('x'), None);
        assert_eq!(keymap.key_for(Pitch::A), Some('H'));
    }

    #[test]
    fn repeat_press_is_ignored() {
        let mut pressed = PressedInputs::new();
        assert!(pressed.press(Input::key('q'), Pitch::C));
        assert!(!pressed.press(Input::key('Q'), Pitch::C));
        assert_eq!(pressed.len(), 1);
    }

    #[test]
    fn release_waits_for_last_holder() {
        let mut pressed = PressedInputs::new();
        pressed.press(Input::key('q'), Pitch::C);
        pressed.press(Input::Pointer, Pitch::C);

        assert_eq!(pressed.release(Input::key('q')), None, "pointer still holds C");
        assert!(pressed.is_held(Pitch::C));
        assert_eq!(pressed.release(Input::Pointer), Some(Pitch::C));
        assert!(!pressed.is_held(Pitch::C));
    }

    #[test]
    fn releasing_unheld_input_is_noop() {
        let mut pressed = PressedInputs::new();
        assert_eq!(pressed.release(Input::key('s')), None);
    }

    #[test]
    fn clear_drops_everything() {
        let mut pressed = PressedInputs::new();
        pressed.press(Input::key('q'), Pitch::C);
        pressed.press(Input::key('s'), Pitch::D);
        pressed.clear();
        assert!(pressed.is_empty());
        assert!(!pressed.is_held(Pitch::D));
    }
}
