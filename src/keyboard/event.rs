//! Raw keyboard events and the device_query key source

use super::{keymap, KeyCode};
use device_query::{DeviceQuery, DeviceState};

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

impl EventKind {
    pub fn is_press(&self) -> bool {
        matches!(self, Self::Press)
    }

    /// Word used in audit lines
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
        }
    }
}

/// Platform key as reported by a hook source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDescriptor {
    /// Key producing a character
    Char(char),
    /// Non-character key (modifiers, arrows, function keys)
    Named(&'static str),
    /// Scancode with no known meaning
    Unknown(u16),
}

impl KeyDescriptor {
    /// Lowercase printable character for this key, if it is exactly one.
    pub fn printable_char(&self) -> Option<char> {
        let c = match self {
            Self::Char(c) => *c,
            Self::Named(_) | Self::Unknown(_) => return None,
        };
        if c.is_control() || (c.is_whitespace() && c != ' ') {
            return None;
        }
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) => Some(l),
            _ => None,
        }
    }
}

impl From<KeyCode> for KeyDescriptor {
    fn from(code: KeyCode) -> Self {
        keymap::descriptor(code)
    }
}

/// A key transition captured by the hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub key: KeyDescriptor,
}

impl RawEvent {
    pub fn new(kind: EventKind, key: KeyDescriptor) -> Self {
        Self { kind, key }
    }

    pub fn press(key: KeyDescriptor) -> Self {
        Self::new(EventKind::Press, key)
    }

    pub fn release(key: KeyDescriptor) -> Self {
        Self::new(EventKind::Release, key)
    }
}

/// Something the hook thread can poll for key transitions
pub trait KeySource {
    /// Short name for log lines
    fn name(&self) -> &'static str;

    /// Append every transition observed since the previous poll to `out`.
    fn poll(&mut self, out: &mut Vec<RawEvent>);
}

/// Key source diffing the global key set reported by device_query
pub struct DeviceQuerySource {
    device_state: DeviceState,
    last_keys: Vec<device_query::Keycode>,
}

impl DeviceQuerySource {
    /// Connect to the platform input backend.
    ///
    /// Returns `None` when no display/input backend is reachable (device_query
    /// panics in that case, so the constructor is isolated).
    pub fn try_new() -> Option<Self> {
        let device_state = std::panic::catch_unwind(DeviceState::new).ok()?;
        Some(Self {
            device_state,
            last_keys: Vec::new(),
        })
    }
}

impl KeySource for DeviceQuerySource {
    fn name(&self) -> &'static str {
        "device_query"
    }

    fn poll(&mut self, out: &mut Vec<RawEvent>) {
        let current_keys = self.device_state.get_keys();

        for key in &current_keys {
            if !self.last_keys.contains(key) {
                out.push(RawEvent::press(KeyCode::from(*key).into()));
            }
        }

        for key in &self.last_keys {
            if !current_keys.contains(key) {
                out.push(RawEvent::release(KeyCode::from(*key).into()));
            }
        }

        self.last_keys = current_keys;
    }
}
