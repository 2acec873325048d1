//! Configuration system.
//!
//! Loads walkthrough configuration from JSON strings/files. Every field has a
//! serde default so partial files are accepted.

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    /// Frames per second driven by the headless binary.
    #[serde(default = "default_frame_hz")]
    pub frame_hz: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            physics: PhysicsConfig::default(),
            map: MapConfig::default(),
            animation: AnimationConfig::default(),
            frame_hz: default_frame_hz(),
        }
    }
}

impl ExplorerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("parse config json")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("config {}", path.display()))
    }

    /// Rejects values the frame loop cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let m = &self.movement;
        if !(m.walk_speed > 0.0 && m.run_speed > 0.0) {
            bail!("movement speeds must be positive");
        }
        if !(m.collision_radius > 0.0 && m.character_height > 2.0 * m.collision_radius) {
            bail!("character height must exceed twice the collision radius");
        }
        if !(self.physics.fixed_step > 0.0) || self.physics.max_substeps == 0 {
            bail!("physics needs a positive fixed_step and at least one substep");
        }
        if self.frame_hz == 0 {
            bail!("frame_hz must be non-zero");
        }
        Ok(())
    }
}

/// Character movement tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MovementConfig {
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f32,
    #[serde(default = "default_run_speed")]
    pub run_speed: f32,
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f32,
    #[serde(default = "default_character_height")]
    pub character_height: f32,
    /// Radians of rotation per unit of pointer delta.
    #[serde(default = "default_look_sensitivity")]
    pub look_sensitivity: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: default_walk_speed(),
            run_speed: default_run_speed(),
            collision_radius: default_collision_radius(),
            character_height: default_character_height(),
            look_sensitivity: default_look_sensitivity(),
        }
    }
}

/// Physics parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PhysicsConfig {
    #[serde(default = "default_fixed_step")]
    pub fixed_step: f32,
    #[serde(default = "default_max_substeps")]
    pub max_substeps: u32,
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fixed_step: default_fixed_step(),
            max_substeps: default_max_substeps(),
            gravity: default_gravity(),
        }
    }
}

/// Map asset location and loading policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapConfig {
    #[serde(default = "default_map_path")]
    pub path: String,
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            path: default_map_path(),
            load_timeout_ms: default_load_timeout_ms(),
        }
    }
}

/// Clip transition tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnimationConfig {
    #[serde(default = "default_crossfade_secs")]
    pub crossfade_secs: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            crossfade_secs: default_crossfade_secs(),
        }
    }
}

fn default_frame_hz() -> u32 {
    60
}

fn default_walk_speed() -> f32 {
    2.5
}

fn default_run_speed() -> f32 {
    5.0
}

fn default_collision_radius() -> f32 {
    0.5
}

fn default_character_height() -> f32 {
    1.8
}

fn default_look_sensitivity() -> f32 {
    0.002
}

fn default_fixed_step() -> f32 {
    1.0 / 60.0
}

fn default_max_substeps() -> u32 {
    10
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -9.81, 0.0)
}

fn default_map_path() -> String {
    "maps/skeld.json".to_string()
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_crossfade_secs() -> f32 {
    0.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ExplorerConfig::from_json_str(r#"{ "movement": { "run_speed": 7.0 } }"#).unwrap();
        assert_eq!(cfg.movement.run_speed, 7.0);
        assert_eq!(cfg.movement.walk_speed, 2.5);
        assert_eq!(cfg.map.load_timeout_ms, 10_000);
        assert_eq!(cfg.physics.max_substeps, 10);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(ExplorerConfig::from_json_str("{}").unwrap(), ExplorerConfig::default());
    }

    #[test]
    fn rejects_capsule_shorter_than_its_caps() {
        let err = ExplorerConfig::from_json_str(
            r#"{ "movement": { "collision_radius": 1.0, "character_height": 1.5 } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("height"));
    }
}
