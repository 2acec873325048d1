//! Movement/collision reconciliation.
//!
//! Once per frame the reconciler turns held keys and the camera heading into a
//! displacement, validates it against physics and commits all, part, or none
//! of it. Sliding is axis-decomposed: when the full move is blocked, the X-only
//! and Z-only moves are each probed from the starting point and every one that
//! is free is committed.
//!
//! The camera eye is the authoritative position. The character body is always
//! derived from it (see [`CharacterTransform::from_eye`]), so the two views
//! cannot drift apart.
//!
//! Probes fail open: a backend that is not ready, or that returns an error,
//! is treated as reporting no collision.

use std::f32::consts::PI;

use explorer_shared::{
    animation::{Clip, ClipDriver},
    config::MovementConfig,
    math::{wrap_angle, yaw_of, Vec3},
    physics::PhysicsBackend,
};
use tracing::{debug, warn};

use crate::{
    input::InputState,
    look::{CameraRig, LookState},
};

/// Fixed offsets between the camera eye and the character model.
pub mod eye_rig {
    /// Eye height above the feet.
    pub const EYE_HEIGHT: f32 = 1.65;
    /// The model stands this far behind the eye, along the heading.
    pub const FORWARD_OFFSET: f32 = 0.25;
}

/// Where the character model stands and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterTransform {
    pub feet: Vec3,
    /// Model yaw. The model's authored forward is -Z, so this is the camera
    /// yaw plus PI.
    pub facing: f32,
}

impl CharacterTransform {
    /// Derives the body from the eye position and horizontal unit `heading`.
    pub fn from_eye(eye: Vec3, heading: Vec3) -> Self {
        Self {
            feet: eye - Vec3::Y * eye_rig::EYE_HEIGHT - heading * eye_rig::FORWARD_OFFSET,
            facing: wrap_angle(yaw_of(heading) + PI),
        }
    }
}

/// Camera rig plus the character body derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pawn {
    pub rig: CameraRig,
    pub body: CharacterTransform,
}

impl Pawn {
    pub fn new(rig: CameraRig) -> Self {
        let heading = heading_of(&rig).unwrap_or(Vec3::Z);
        Self {
            rig,
            body: CharacterTransform::from_eye(rig.eye, heading),
        }
    }

    /// Pawn whose feet stand at `feet`, looking along yaw.
    pub fn standing_at(feet: Vec3, yaw: f32) -> Self {
        let rig = CameraRig::new(Vec3::ZERO, yaw);
        let heading = heading_of(&rig).unwrap_or(Vec3::Z);
        let eye = feet + Vec3::Y * eye_rig::EYE_HEIGHT + heading * eye_rig::FORWARD_OFFSET;
        Self::new(CameraRig { eye, ..rig })
    }

    /// Moves the eye and re-derives the body.
    pub fn set_eye(&mut self, eye: Vec3, heading: Vec3) {
        self.rig.eye = eye;
        self.body = CharacterTransform::from_eye(eye, heading);
    }
}

/// Flattened, normalized camera heading.
fn heading_of(rig: &CameraRig) -> Option<Vec3> {
    rig.forward().flatten().try_normalize()
}

/// What a frame did to the character's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Pointer not captured; the body only tracked the camera.
    Unlocked,
    /// No movement keys held.
    Idle,
    /// Movement keys are held and the full move was free. With a zero frame
    /// time the move is empty but the gait still counts as moving.
    Moved,
    /// The full move was blocked; some single-axis moves were committed.
    Slid { x: bool, z: bool },
    /// Nothing could be committed.
    Blocked,
}

/// Per-frame movement resolver.
#[derive(Debug, Clone)]
pub struct Reconciler {
    cfg: MovementConfig,
    last_heading: Vec3,
    warned_not_ready: bool,
}

impl Reconciler {
    pub fn new(cfg: MovementConfig) -> Self {
        Self {
            cfg,
            last_heading: Vec3::Z,
            warned_not_ready: false,
        }
    }

    /// Speed the next move would use.
    pub fn speed(&self, input: &InputState) -> f32 {
        if input.is_running() {
            self.cfg.run_speed
        } else {
            self.cfg.walk_speed
        }
    }

    /// Displacement for this frame, before collision.
    pub fn displacement(&self, input: &InputState, heading: Vec3, dt_sec: f32) -> Vec3 {
        let intent = input.intent();
        if intent.is_idle() {
            return Vec3::ZERO;
        }
        let intent = intent.normalized();
        // `up x forward` points to the viewer's left; negate it for right.
        let right = heading.cross(Vec3::Y);
        let dir = (heading * intent.forward + right * intent.strafe).normalize_or_zero();
        dir * (self.speed(input) * dt_sec)
    }

    /// Runs one frame.
    pub fn update(
        &mut self,
        pawn: &mut Pawn,
        input: &InputState,
        look: LookState,
        dt_sec: f32,
        physics: &dyn PhysicsBackend,
        clips: &mut ClipDriver,
    ) -> MoveOutcome {
        let heading = match heading_of(&pawn.rig) {
            Some(h) => {
                self.last_heading = h;
                h
            }
            None => self.last_heading,
        };

        let outcome = if look.is_locked() {
            self.resolve_move(pawn, input, heading, dt_sec, physics)
        } else {
            pawn.set_eye(pawn.rig.eye, heading);
            MoveOutcome::Unlocked
        };

        let clip = match outcome {
            MoveOutcome::Unlocked | MoveOutcome::Idle => Clip::Idle,
            _ if input.is_running() => Clip::Run,
            _ => Clip::Walk,
        };
        clips.transition_to(clip);
        clips.advance(dt_sec);

        outcome
    }

    fn resolve_move(
        &mut self,
        pawn: &mut Pawn,
        input: &InputState,
        heading: Vec3,
        dt_sec: f32,
        physics: &dyn PhysicsBackend,
    ) -> MoveOutcome {
        let start = pawn.rig.eye;
        let delta = self.displacement(input, heading, dt_sec);
        if delta == Vec3::ZERO {
            pawn.set_eye(start, heading);
            return if input.intent().is_idle() {
                MoveOutcome::Idle
            } else {
                MoveOutcome::Moved
            };
        }

        if !self.blocked(physics, start + delta, heading) {
            pawn.set_eye(start + delta, heading);
            return MoveOutcome::Moved;
        }

        let x_step = Vec3::new(delta.x, 0.0, 0.0);
        let z_step = Vec3::new(0.0, 0.0, delta.z);
        let x_free = delta.x != 0.0 && !self.blocked(physics, start + x_step, heading);
        let z_free = delta.z != 0.0 && !self.blocked(physics, start + z_step, heading);

        let mut committed = start;
        if x_free {
            committed += x_step;
        }
        if z_free {
            committed += z_step;
        }
        pawn.set_eye(committed, heading);

        if x_free || z_free {
            debug!(x = x_free, z = z_free, "Sliding along obstacle");
            MoveOutcome::Slid { x: x_free, z: z_free }
        } else {
            MoveOutcome::Blocked
        }
    }

    /// Probes the body that an eye at `eye` would have.
    fn blocked(&mut self, physics: &dyn PhysicsBackend, eye: Vec3, heading: Vec3) -> bool {
        if !physics.is_ready() {
            if !self.warned_not_ready {
                warn!("Physics not ready, movement is unchecked");
                self.warned_not_ready = true;
            }
            return false;
        }
        self.warned_not_ready = false;

        let feet = CharacterTransform::from_eye(eye, heading).feet;
        match physics.check_character_collision(feet, self.cfg.collision_radius, self.cfg.character_height) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "Collision probe failed, treating as free");
                false
            }
        }
    }
}
