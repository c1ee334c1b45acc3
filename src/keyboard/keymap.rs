//! Key codes and their character meaning on a US layout
//!
//! Key codes are Linux evdev scancodes. The device_query source converts its
//! keycodes into the same space so both hook sources share one table.

use super::KeyDescriptor;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Represents a physical key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<device_query::Keycode> for KeyCode {
    fn from(keycode: device_query::Keycode) -> Self {
        use device_query::Keycode as DK;
        let code = match keycode {
            DK::Escape => 1,
            DK::Key1 => 2,
            DK::Key2 => 3,
            DK::Key3 => 4,
            DK::Key4 => 5,
            DK::Key5 => 6,
            DK::Key6 => 7,
            DK::Key7 => 8,
            DK::Key8 => 9,
            DK::Key9 => 10,
            DK::Key0 => 11,
            DK::Minus => 12,
            DK::Equal => 13,
            DK::Backspace => 14,
            DK::Tab => 15,
            DK::Q => 16,
            DK::W => 17,
            DK::E => 18,
            DK::R => 19,
            DK::T => 20,
            DK::Y => 21,
            DK::U => 22,
            DK::I => 23,
            DK::O => 24,
            DK::P => 25,
            DK::LeftBracket => 26,
            DK::RightBracket => 27,
            DK::Enter => 28,
            DK::LControl => 29,
            DK::A => 30,
            DK::S => 31,
            DK::D => 32,
            DK::F => 33,
            DK::G => 34,
            DK::H => 35,
            DK::J => 36,
            DK::K => 37,
            DK::L => 38,
            DK::Semicolon => 39,
            DK::Apostrophe => 40,
            DK::Grave => 41,
            DK::LShift => 42,
            DK::BackSlash => 43,
            DK::Z => 44,
            DK::X => 45,
            DK::C => 46,
            DK::V => 47,
            DK::B => 48,
            DK::N => 49,
            DK::M => 50,
            DK::Comma => 51,
            DK::Dot => 52,
            DK::Slash => 53,
            DK::RShift => 54,
            DK::LAlt => 56,
            DK::Space => 57,
            DK::CapsLock => 58,
            DK::RControl => 97,
            DK::RAlt => 100,
            DK::Up => 103,
            DK::Left => 105,
            DK::Right => 106,
            DK::Down => 108,
            DK::Delete => 111,
            DK::LMeta => 125,
            DK::RMeta => 126,
            _ => 0,
        };
        Self(code)
    }
}

/// Meaning of a scancode
#[derive(Debug, Clone, Copy)]
pub struct KeyInfo {
    /// Display name for the key
    pub name: &'static str,
    /// Character typed without modifiers, if any
    pub printable: Option<char>,
}

const LETTER_ROWS: [(u16, &str); 3] = [(16, "qwertyuiop"), (30, "asdfghjkl"), (44, "zxcvbnm")];

const SYMBOLS: [(u16, char); 13] = [
    (12, '-'),
    (13, '='),
    (26, '['),
    (27, ']'),
    (39, ';'),
    (40, '\''),
    (41, '`'),
    (43, '\\'),
    (51, ','),
    (52, '.'),
    (53, '/'),
    (57, ' '),
    (11, '0'),
];

const NAMED: [(u16, &str); 20] = [
    (1, "Escape"),
    (14, "Backspace"),
    (15, "Tab"),
    (28, "Enter"),
    (29, "LeftCtrl"),
    (42, "LeftShift"),
    (54, "RightShift"),
    (56, "LeftAlt"),
    (58, "CapsLock"),
    (97, "RightCtrl"),
    (100, "RightAlt"),
    (103, "Up"),
    (105, "Left"),
    (106, "Right"),
    (108, "Down"),
    (110, "Insert"),
    (111, "Delete"),
    (125, "LeftMeta"),
    (126, "RightMeta"),
    (127, "Menu"),
];

/// Static keymap for the character-producing and common named keys
pub static KEYMAP: LazyLock<HashMap<KeyCode, KeyInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    for (first, letters) in LETTER_ROWS {
        for (offset, c) in letters.chars().enumerate() {
            map.insert(
                KeyCode(first + offset as u16),
                KeyInfo { name: "Letter", printable: Some(c) },
            );
        }
    }

    // 1..9 sit on scancodes 2..10
    for (offset, c) in "123456789".chars().enumerate() {
        map.insert(
            KeyCode(2 + offset as u16),
            KeyInfo { name: "Digit", printable: Some(c) },
        );
    }

    for (code, c) in SYMBOLS {
        map.insert(KeyCode(code), KeyInfo { name: "Symbol", printable: Some(c) });
    }

    for (code, name) in NAMED {
        map.insert(KeyCode(code), KeyInfo { name, printable: None });
    }

    map
});

/// Translate a scancode into the descriptor handed to the dispatcher
pub fn descriptor(code: KeyCode) -> KeyDescriptor {
    match KEYMAP.get(&code) {
        Some(KeyInfo { printable: Some(c), .. }) => KeyDescriptor::Char(*c),
        Some(info) => KeyDescriptor::Named(info.name),
        None => KeyDescriptor::Unknown(code.0),
    }
}
