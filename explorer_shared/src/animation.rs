//! Animation collaborator.
//!
//! The character model carries three clips. A player plays and fades them;
//! [`ClipDriver`] keeps exactly one clip current and cross-fades on change.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The closed set of character clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clip {
    Idle,
    Walk,
    Run,
}

impl Clip {
    /// Clip name as authored in the model file.
    pub fn name(self) -> &'static str {
        match self {
            Clip::Idle => "Idle",
            Clip::Walk => "Walk",
            Clip::Run => "Run",
        }
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Playback capability of a skinned model.
pub trait AnimationPlayer: Send + Sync {
    fn play(&mut self, clip: Clip);
    /// Rewinds a clip to its first frame.
    fn reset(&mut self, clip: Clip);
    fn fade_in(&mut self, clip: Clip, duration: f32);
    fn fade_out(&mut self, clip: Clip, duration: f32);
    fn advance(&mut self, dt_sec: f32);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Track {
    playing: bool,
    time: f32,
    weight: f32,
    target: f32,
    /// Weight change per second towards `target`.
    rate: f32,
}

/// Headless mixer: tracks clip time and blend weight.
#[derive(Debug, Default)]
pub struct ClipMixer {
    tracks: HashMap<Clip, Track>,
}

impl ClipMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, clip: Clip) -> f32 {
        self.tracks.get(&clip).map_or(0.0, |t| t.weight)
    }

    pub fn time(&self, clip: Clip) -> f32 {
        self.tracks.get(&clip).map_or(0.0, |t| t.time)
    }

    pub fn is_playing(&self, clip: Clip) -> bool {
        self.tracks.get(&clip).is_some_and(|t| t.playing)
    }

    fn fade(&mut self, clip: Clip, target: f32, duration: f32) {
        let track = self.tracks.entry(clip).or_default();
        track.target = target;
        if duration <= 0.0 {
            track.weight = target;
            track.rate = 0.0;
        } else {
            track.rate = 1.0 / duration;
        }
    }
}

impl AnimationPlayer for ClipMixer {
    fn play(&mut self, clip: Clip) {
        let track = self.tracks.entry(clip).or_default();
        if !track.playing && track.rate == 0.0 && track.target == 0.0 {
            // A bare play() with no fade shows the clip at full weight.
            track.weight = 1.0;
            track.target = 1.0;
        }
        track.playing = true;
    }

    fn reset(&mut self, clip: Clip) {
        let track = self.tracks.entry(clip).or_default();
        track.time = 0.0;
    }

    fn fade_in(&mut self, clip: Clip, duration: f32) {
        self.fade(clip, 1.0, duration);
    }

    fn fade_out(&mut self, clip: Clip, duration: f32) {
        self.fade(clip, 0.0, duration);
    }

    fn advance(&mut self, dt_sec: f32) {
        for track in self.tracks.values_mut() {
            if !track.playing {
                continue;
            }
            track.time += dt_sec;
            if track.weight < track.target {
                track.weight = (track.weight + track.rate * dt_sec).min(track.target);
            } else if track.weight > track.target {
                track.weight = (track.weight - track.rate * dt_sec).max(track.target);
            }
            if track.target == 0.0 && track.weight == 0.0 {
                track.playing = false;
            }
        }
    }
}

/// Keeps one clip current and cross-fades between clips.
pub struct ClipDriver {
    player: Box<dyn AnimationPlayer>,
    current: Clip,
    crossfade: f32,
}

impl ClipDriver {
    /// Wraps `player` and starts the idle clip.
    pub fn new(mut player: Box<dyn AnimationPlayer>, crossfade: f32) -> Self {
        player.play(Clip::Idle);
        Self {
            player,
            current: Clip::Idle,
            crossfade,
        }
    }

    pub fn current(&self) -> Clip {
        self.current
    }

    /// Switches to `clip` if it is not already current. Returns whether a
    /// transition happened.
    pub fn transition_to(&mut self, clip: Clip) -> bool {
        if clip == self.current {
            return false;
        }
        debug!(from = %self.current, to = %clip, "Clip transition");
        self.player.fade_out(self.current, self.crossfade);
        self.player.reset(clip);
        self.player.fade_in(clip, self.crossfade);
        self.player.play(clip);
        self.current = clip;
        true
    }

    pub fn advance(&mut self, dt_sec: f32) {
        self.player.advance(dt_sec);
    }
}
