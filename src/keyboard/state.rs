//! Per-character pressed state used for dedup

use std::collections::HashMap;

/// Last reported state of every character seen so far.
///
/// A character that was never reported is implicitly up.
#[derive(Debug, Default, Clone)]
pub struct KeyState {
    keys: HashMap<char, bool>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pressed` for `key` and report whether it differs from the
    /// previously recorded value.
    pub fn transition(&mut self, key: char, pressed: bool) -> bool {
        let previous = self.keys.insert(key, pressed).unwrap_or(false);
        previous != pressed
    }

    pub fn is_pressed(&self, key: char) -> bool {
        self.keys.get(&key).copied().unwrap_or(false)
    }

    /// Characters currently held down
    pub fn pressed_keys(&self) -> Vec<char> {
        let mut keys: Vec<char> = self
            .keys
            .iter()
            .filter(|(_, &down)| down)
            .map(|(&k, _)| k)
            .collect();
        keys.sort_unstable();
        keys
    }
}
