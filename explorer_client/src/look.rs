//! Camera rig and pointer-look capture.

use std::f32::consts::FRAC_PI_2;

use explorer_shared::math::{wrap_angle, Vec3};
use tracing::info;

/// Pitch stays this far away from straight up/down.
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Pointer capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookState {
    /// No capture; the camera is not being driven by the user.
    #[default]
    Unlocked,
    /// Capture active; the user steers the camera and the character.
    Locked,
}

impl LookState {
    /// Applies a lock request. Returns whether the state changed.
    pub fn lock(&mut self) -> bool {
        self.set(LookState::Locked)
    }

    /// Applies a release request. Returns whether the state changed.
    pub fn release(&mut self) -> bool {
        self.set(LookState::Unlocked)
    }

    pub fn is_locked(self) -> bool {
        self == LookState::Locked
    }

    fn set(&mut self, to: LookState) -> bool {
        if *self == to {
            return false;
        }
        info!(from = ?*self, to = ?to, "Pointer look");
        *self = to;
        true
    }
}

/// First-person camera: eye position plus yaw/pitch.
///
/// Yaw 0 looks down +Z; positive yaw turns towards +X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl CameraRig {
    pub fn new(eye: Vec3, yaw: f32) -> Self {
        Self {
            eye,
            yaw: wrap_angle(yaw),
            pitch: 0.0,
        }
    }

    /// World-space view direction.
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(sy * cp, sp, cy * cp)
    }

    /// Applies a pointer delta. Moving right turns right; moving down looks down.
    pub fn look(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw = wrap_angle(self.yaw - dx * sensitivity);
        self.pitch = (self.pitch - dy * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }
}
