use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Side button 1 ("back").
    X1,
    /// Side button 2 ("forward").
    X2,
}

impl MouseButton {
    pub(crate) fn bit(self) -> u8 {
        match self {
            MouseButton::Left => 1 << 0,
            MouseButton::Right => 1 << 1,
            MouseButton::Middle => 1 << 2,
            MouseButton::X1 => 1 << 3,
            MouseButton::X2 => 1 << 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WheelAxis {
    Vertical,
    Horizontal,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const ALT = 1 << 1;
        const SHIFT = 1 << 2;
        const WIN = 1 << 3;
    }
}

/// Virtual-key code. Values follow the Win32 `VK_*` table so the Windows
/// hook can pass codes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const BACKSPACE: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ENTER: KeyCode = KeyCode(0x0D);
    pub const SHIFT: KeyCode = KeyCode(0x10);
    pub const CONTROL: KeyCode = KeyCode(0x11);
    pub const ALT: KeyCode = KeyCode(0x12);
    pub const PAUSE: KeyCode = KeyCode(0x13);
    pub const CAPS_LOCK: KeyCode = KeyCode(0x14);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const PAGE_UP: KeyCode = KeyCode(0x21);
    pub const PAGE_DOWN: KeyCode = KeyCode(0x22);
    pub const END: KeyCode = KeyCode(0x23);
    pub const HOME: KeyCode = KeyCode(0x24);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);
    pub const PRINT_SCREEN: KeyCode = KeyCode(0x2C);
    pub const INSERT: KeyCode = KeyCode(0x2D);
    pub const DELETE: KeyCode = KeyCode(0x2E);
    pub const LEFT_WIN: KeyCode = KeyCode(0x5B);
    pub const RIGHT_WIN: KeyCode = KeyCode(0x5C);
    pub const NUMPAD0: KeyCode = KeyCode(0x60);
    pub const F1: KeyCode = KeyCode(0x70);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0xA0);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0xA1);
    pub const LEFT_CONTROL: KeyCode = KeyCode(0xA2);
    pub const RIGHT_CONTROL: KeyCode = KeyCode(0xA3);
    pub const LEFT_ALT: KeyCode = KeyCode(0xA4);
    pub const RIGHT_ALT: KeyCode = KeyCode(0xA5);

    /// The modifier this key contributes when held, if any. Generic and
    /// left/right-specific codes map to the same flag.
    pub fn modifier(self) -> Option<Modifiers> {
        match self {
            KeyCode::CONTROL | KeyCode::LEFT_CONTROL | KeyCode::RIGHT_CONTROL => {
                Some(Modifiers::CTRL)
            }
            KeyCode::ALT | KeyCode::LEFT_ALT | KeyCode::RIGHT_ALT => Some(Modifiers::ALT),
            KeyCode::SHIFT | KeyCode::LEFT_SHIFT | KeyCode::RIGHT_SHIFT => Some(Modifiers::SHIFT),
            KeyCode::LEFT_WIN | KeyCode::RIGHT_WIN => Some(Modifiers::WIN),
            _ => None,
        }
    }

    /// Parses a key name as written in a hotkey combo (`"A"`, `"F5"`, `"PageUp"`).
    pub fn from_name(name: &str) -> Option<KeyCode> {
        let lower = name.trim().to_ascii_lowercase();
        let named = match lower.as_str() {
            "space" => Some(KeyCode::SPACE),
            "enter" | "return" => Some(KeyCode::ENTER),
            "tab" => Some(KeyCode::TAB),
            "esc" | "escape" => Some(KeyCode::ESCAPE),
            "backspace" => Some(KeyCode::BACKSPACE),
            "pause" => Some(KeyCode::PAUSE),
            "capslock" => Some(KeyCode::CAPS_LOCK),
            "pageup" | "pgup" => Some(KeyCode::PAGE_UP),
            "pagedown" | "pgdn" => Some(KeyCode::PAGE_DOWN),
            "end" => Some(KeyCode::END),
            "home" => Some(KeyCode::HOME),
            "left" => Some(KeyCode::LEFT),
            "up" => Some(KeyCode::UP),
            "right" => Some(KeyCode::RIGHT),
            "down" => Some(KeyCode::DOWN),
            "printscreen" | "prtsc" => Some(KeyCode::PRINT_SCREEN),
            "insert" | "ins" => Some(KeyCode::INSERT),
            "delete" | "del" => Some(KeyCode::DELETE),
            _ => None,
        };
        if named.is_some() {
            return named;
        }

        let mut chars = lower.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(KeyCode(ch.to_ascii_uppercase() as u32));
            }
            if ch.is_ascii_digit() {
                return Some(KeyCode(ch as u32));
            }
            return None;
        }

        if let Some(digit) = lower.strip_prefix("numpad") {
            let n: u32 = digit.parse().ok()?;
            return (n <= 9).then(|| KeyCode(KeyCode::NUMPAD0.0 + n));
        }

        if let Some(number) = lower.strip_prefix('f') {
            let n: u32 = number.parse().ok()?;
            return (1..=24).contains(&n).then(|| KeyCode(KeyCode::F1.0 + n - 1));
        }

        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputKind {
    PointerMove,
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    /// Raw wheel delta; one notch is 120 units.
    WheelDelta(i32),
    KeyDown(KeyCode),
    KeyUp(KeyCode),
}

/// One normalized OS input event. Lives only for the duration of the
/// hook callback that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub kind: InputKind,
    /// Pointer position for mouse-derived events; the last known pointer
    /// position for keyboard events.
    pub point: Point,
    /// Set by the handler to keep the event from reaching other applications.
    pub consumed: bool,
}

impl InputEvent {
    pub fn new(kind: InputKind, point: Point) -> Self {
        Self {
            kind,
            point,
            consumed: false,
        }
    }

    pub fn pointer_move(point: Point) -> Self {
        Self::new(InputKind::PointerMove, point)
    }

    pub fn button_down(button: MouseButton, point: Point) -> Self {
        Self::new(InputKind::ButtonDown(button), point)
    }

    pub fn button_up(button: MouseButton, point: Point) -> Self {
        Self::new(InputKind::ButtonUp(button), point)
    }

    pub fn wheel(delta: i32, point: Point) -> Self {
        Self::new(InputKind::WheelDelta(delta), point)
    }

    pub fn key_down(code: KeyCode) -> Self {
        Self::new(InputKind::KeyDown(code), Point::default())
    }

    pub fn key_up(code: KeyCode) -> Self {
        Self::new(InputKind::KeyUp(code), Point::default())
    }

    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn is_pointer_event(&self) -> bool {
        !matches!(self.kind, InputKind::KeyDown(_) | InputKind::KeyUp(_))
    }
}
