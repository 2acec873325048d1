//! Input handling.
//!
//! Host events are folded into an `InputState` between frames; the reconciler
//! reads a `MovementIntent` from it once per frame.

use std::path::Path;

use anyhow::Context;
use explorer_shared::input::{InputEvent, Key, Keys};
use serde::{Deserialize, Serialize};

/// Keys held right now plus the run toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    held: Keys,
    running: bool,
    /// Swallows key repeat on the run key.
    run_key_down: bool,
}

impl InputState {
    /// Applies a key event. Non-key events are ignored.
    pub fn apply(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::KeyDown { key: Key::Run } => {
                if !self.run_key_down {
                    self.run_key_down = true;
                    self.toggle_run();
                }
            }
            InputEvent::KeyUp { key: Key::Run } => self.run_key_down = false,
            InputEvent::KeyDown { key } => {
                if let Some(flag) = key.movement_flag() {
                    self.held.insert(flag);
                }
            }
            InputEvent::KeyUp { key } => {
                if let Some(flag) = key.movement_flag() {
                    self.held.remove(flag);
                }
            }
            _ => {}
        }
    }

    /// Flips between walking and running.
    pub fn toggle_run(&mut self) {
        self.running = !self.running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Releases every movement key, e.g. when focus is lost.
    pub fn release_all(&mut self) {
        self.held = Keys::empty();
        self.run_key_down = false;
    }

    pub fn intent(&self) -> MovementIntent {
        MovementIntent::from_keys(self.held)
    }
}

/// Per-frame movement request: `forward` and `strafe` in {-1, 0, 1}.
///
/// `strafe` is positive for `D` (towards the viewer's right).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementIntent {
    pub forward: f32,
    pub strafe: f32,
}

impl MovementIntent {
    pub fn from_keys(keys: Keys) -> Self {
        let axis = |pos: Keys, neg: Keys| {
            let mut v = 0.0;
            if keys.contains(pos) {
                v += 1.0;
            }
            if keys.contains(neg) {
                v -= 1.0;
            }
            v
        };
        Self {
            forward: axis(Keys::FORWARD, Keys::BACK),
            strafe: axis(Keys::RIGHT, Keys::LEFT),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.forward == 0.0 && self.strafe == 0.0
    }

    /// Unit-length copy, so diagonals are no faster than straight lines.
    pub fn normalized(&self) -> Self {
        let len = (self.forward * self.forward + self.strafe * self.strafe).sqrt();
        if len == 0.0 {
            return *self;
        }
        Self {
            forward: self.forward / len,
            strafe: self.strafe / len,
        }
    }
}

/// An input event scheduled for a specific frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    pub frame: u64,
    pub event: InputEvent,
}

/// Frame-indexed input used to drive the client without a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputScript {
    events: Vec<ScriptedEvent>,
}

impl InputScript {
    pub fn new(mut events: Vec<ScriptedEvent>) -> Self {
        events.sort_by_key(|e| e.frame);
        Self { events }
    }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let events: Vec<ScriptedEvent> = serde_json::from_str(s).context("parse input script")?;
        Ok(Self::new(events))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read input script {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// A short tour: capture the pointer, walk, start running, turn, stop,
    /// release.
    pub fn demo() -> Self {
        let at = |frame, event| ScriptedEvent { frame, event };
        Self::new(vec![
            at(0, InputEvent::LockPointer),
            at(1, InputEvent::KeyDown { key: Key::W }),
            at(60, InputEvent::KeyDown { key: Key::Run }),
            at(61, InputEvent::KeyUp { key: Key::Run }),
            at(90, InputEvent::Look { dx: 300.0, dy: 0.0 }),
            at(120, InputEvent::KeyDown { key: Key::A }),
            at(150, InputEvent::KeyUp { key: Key::A }),
            at(180, InputEvent::KeyUp { key: Key::W }),
            at(200, InputEvent::ReleasePointer),
        ])
    }

    /// Events scheduled for `frame`.
    pub fn events_at(&self, frame: u64) -> impl Iterator<Item = &InputEvent> {
        self.events
            .iter()
            .skip_while(move |e| e.frame < frame)
            .take_while(move |e| e.frame == frame)
            .map(|e| &e.event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
