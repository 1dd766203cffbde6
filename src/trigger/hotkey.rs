use crate::models::{KeyCode, Modifiers};

/// A `Mod+Mod+Key` combo, matched against the modifiers held when `key`
/// goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl Hotkey {
    /// Parses `"Ctrl+Alt+S"`. Names are case-insensitive; the last part must
    /// be a non-modifier key and every other part a modifier. Returns `None`
    /// for anything else, including the empty string.
    pub fn parse(combo: &str) -> Option<Hotkey> {
        let parts: Vec<&str> = combo.split('+').map(str::trim).collect();
        let (last, rest) = parts.split_last()?;
        if last.is_empty() {
            return None;
        }

        let mut modifiers = Modifiers::empty();
        for part in rest {
            let modifier = parse_modifier(part)?;
            if modifiers.contains(modifier) {
                return None;
            }
            modifiers |= modifier;
        }

        let key = KeyCode::from_name(last)?;
        if key.modifier().is_some() {
            return None;
        }
        Some(Hotkey { modifiers, key })
    }

    pub fn matches(&self, held: Modifiers, key: KeyCode) -> bool {
        self.key == key && self.modifiers == held
    }
}

fn parse_modifier(name: &str) -> Option<Modifiers> {
    match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(Modifiers::CTRL),
        "alt" => Some(Modifiers::ALT),
        "shift" => Some(Modifiers::SHIFT),
        "win" | "meta" | "super" => Some(Modifiers::WIN),
        _ => None,
    }
}
