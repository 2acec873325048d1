//! Input vocabulary shared between the host and the client.
//!
//! The host (windowing layer, scripted driver, tests) produces `InputEvent`s;
//! the client folds them into its per-frame input state.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Movement keys currently held.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Keys: u8 {
        const FORWARD = 1 << 0; // W
        const LEFT = 1 << 1;    // A
        const BACK = 1 << 2;    // S
        const RIGHT = 1 << 3;   // D
    }
}

/// Logical key identifiers the walkthrough reacts to.
///
/// Deserializes from any name [`Key::from_host_name`] accepts, so scripts
/// may say `"W"`, `"KeyW"` or `"ShiftLeft"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Key {
    W,
    A,
    S,
    D,
    /// Run modifier. Each press toggles run on/off.
    Run,
}

impl Key {
    /// Held-key flag for movement keys; `None` for the run toggle.
    pub fn movement_flag(self) -> Option<Keys> {
        match self {
            Key::W => Some(Keys::FORWARD),
            Key::A => Some(Keys::LEFT),
            Key::S => Some(Keys::BACK),
            Key::D => Some(Keys::RIGHT),
            Key::Run => None,
        }
    }

    /// Parses a host key name (`"KeyW"`, `"w"`, `"ShiftLeft"`, ...).
    pub fn from_host_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "w" | "keyw" => Some(Key::W),
            "a" | "keya" => Some(Key::A),
            "s" | "keys" => Some(Key::S),
            "d" | "keyd" => Some(Key::D),
            "shift" | "shiftleft" | "shiftright" | "run" => Some(Key::Run),
            _ => None,
        }
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Key::from_host_name(&name).ok_or_else(|| format!("unknown key '{name}'"))
    }
}

/// Something the host observed since the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown { key: Key },
    KeyUp { key: Key },
    /// User gesture asking for pointer capture (e.g. a click).
    LockPointer,
    /// User gesture releasing pointer capture (e.g. Escape).
    ReleasePointer,
    /// Relative pointer motion.
    Look { dx: f32, dy: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_names_map_to_keys() {
        assert_eq!(Key::from_host_name("KeyW"), Some(Key::W));
        assert_eq!(Key::from_host_name("ShiftLeft"), Some(Key::Run));
        assert_eq!(Key::from_host_name("Space"), None);
    }

    #[test]
    fn events_parse_from_tagged_json() {
        let ev: InputEvent = serde_json::from_str(r#"{ "type": "key_down", "key": "W" }"#).unwrap();
        assert_eq!(ev, InputEvent::KeyDown { key: Key::W });
        let ev: InputEvent = serde_json::from_str(r#"{ "type": "lock_pointer" }"#).unwrap();
        assert_eq!(ev, InputEvent::LockPointer);
    }

    #[test]
    fn events_accept_host_key_names() {
        let ev: InputEvent =
            serde_json::from_str(r#"{ "type": "key_down", "key": "ShiftLeft" }"#).unwrap();
        assert_eq!(ev, InputEvent::KeyDown { key: Key::Run });
        let ev: InputEvent = serde_json::from_str(r#"{ "type": "key_up", "key": "KeyD" }"#).unwrap();
        assert_eq!(ev, InputEvent::KeyUp { key: Key::D });
        assert!(serde_json::from_str::<InputEvent>(r#"{ "type": "key_down", "key": "Space" }"#).is_err());
    }
}
