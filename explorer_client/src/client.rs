//! Client implementation.
//!
//! `ExplorerClient` is the single context object for a walkthrough session.
//! It owns:
//! - The physics collaborator and its fixed-timestep stepper
//! - The clip driver for the character model
//! - Input state and pointer-look state
//! - The pawn (camera rig + derived character body)
//! - The active map
//!
//! Nothing here is global; the host constructs one client and calls
//! [`ExplorerClient::handle`] and [`ExplorerClient::frame`] from its frame
//! callback.

use std::time::Duration;

use explorer_shared::{
    animation::{AnimationPlayer, Clip, ClipDriver},
    config::ExplorerConfig,
    input::InputEvent,
    map::{generate_fallback, load_map_or_fallback, LoadedMap, MapOrigin, MapSource},
    math::Vec3,
    physics::{FixedStepper, PhysicsBackend, StaticBodyOptions},
};
use tracing::{debug, info, warn};

use crate::{
    input::InputState,
    look::{CameraRig, LookState},
    reconciler::{MoveOutcome, Pawn, Reconciler},
};

/// Longest frame the reconciler will integrate in one go.
pub const MAX_FRAME_DT: f32 = 0.1;

/// Client lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Constructed; physics and map not yet available.
    Booting,
    /// Map and physics set up.
    Ready,
}

/// Walkthrough session context.
pub struct ExplorerClient {
    pub cfg: ExplorerConfig,
    pub state: ClientState,

    physics: Box<dyn PhysicsBackend>,
    stepper: FixedStepper,
    clips: ClipDriver,
    reconciler: Reconciler,

    input: InputState,
    look: LookState,
    pawn: Pawn,

    /// Currently loaded map.
    pub current_map: Option<LoadedMap>,
    frame: u64,
    last_outcome: Option<MoveOutcome>,
}

impl ExplorerClient {
    /// Creates a client standing at the origin, looking down +Z.
    pub fn new(
        cfg: ExplorerConfig,
        physics: Box<dyn PhysicsBackend>,
        player: Box<dyn AnimationPlayer>,
    ) -> Self {
        let pawn = Pawn::standing_at(Vec3::ZERO, 0.0);
        Self {
            stepper: FixedStepper::new(&cfg.physics),
            clips: ClipDriver::new(player, cfg.animation.crossfade_secs),
            reconciler: Reconciler::new(cfg.movement),
            cfg,
            state: ClientState::Booting,
            physics,
            input: InputState::default(),
            look: LookState::default(),
            pawn,
            current_map: None,
            frame: 0,
            last_outcome: None,
        }
    }

    /// Initializes physics and loads the configured map, then builds static
    /// bodies for its collision surfaces.
    ///
    /// Never fails: a physics init error leaves collision unchecked, and map
    /// problems are absorbed by the fallback layout. The pawn is not moved.
    pub async fn boot(&mut self, source: &dyn MapSource) {
        let timeout = Duration::from_millis(self.cfg.map.load_timeout_ms);
        let path = self.cfg.map.path.clone();
        let physics = &mut self.physics;

        let (init, map) = tokio::join!(
            physics.init(),
            load_map_or_fallback(source, &path, timeout, generate_fallback)
        );
        if let Err(e) = init {
            warn!(error = %e, "Physics init failed, collision disabled");
        }

        self.install_map(map);
        self.state = ClientState::Ready;
    }

    /// Replaces the active map and registers its surfaces with physics.
    pub fn install_map(&mut self, map: LoadedMap) {
        let mut created = 0usize;
        if self.physics.is_ready() {
            self.physics.clear_static_bodies();
            for surface in &map.surfaces {
                match self
                    .physics
                    .create_static_body(surface, StaticBodyOptions::default())
                {
                    Ok(_) => created += 1,
                    Err(e) => warn!(surface = %surface.name, error = %e, "Skipping collision surface"),
                }
            }
        }
        info!(
            map = %map.asset.name,
            fallback = map.is_fallback(),
            surfaces = map.surfaces.len(),
            bodies = created,
            "Map installed"
        );
        self.current_map = Some(map);
    }

    /// Applies one host input event.
    pub fn handle(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::LockPointer => {
                self.look.lock();
            }
            InputEvent::ReleasePointer => {
                if self.look.release() {
                    self.input.release_all();
                }
            }
            InputEvent::Look { dx, dy } => {
                if self.look.is_locked() {
                    self.pawn
                        .rig
                        .look(dx, dy, self.cfg.movement.look_sensitivity);
                }
            }
            InputEvent::KeyDown { .. } | InputEvent::KeyUp { .. } => self.input.apply(event),
        }
    }

    /// Runs one frame: physics substeps, then movement and animation.
    pub fn frame(&mut self, dt_sec: f32) -> MoveOutcome {
        let dt = if dt_sec.is_finite() {
            dt_sec.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };

        let substeps = self.stepper.advance(self.physics.as_mut(), dt);
        let outcome = self.reconciler.update(
            &mut self.pawn,
            &self.input,
            self.look,
            dt,
            self.physics.as_ref(),
            &mut self.clips,
        );

        if self.last_outcome != Some(outcome) {
            debug!(frame = self.frame, ?outcome, substeps, "Movement outcome changed");
        }
        self.last_outcome = Some(outcome);
        self.frame += 1;
        outcome
    }

    /// Places the eye at `eye`, keeping the current view direction.
    pub fn teleport(&mut self, eye: Vec3) {
        let heading = self.pawn.rig.forward().flatten().try_normalize().unwrap_or(Vec3::Z);
        self.pawn.set_eye(eye, heading);
        info!(?eye, "Teleported");
    }

    /// Moves to the active map's spawn point, if it has one.
    pub fn move_to_spawn(&mut self) -> bool {
        let spawn = self.current_map.as_ref().and_then(|m| m.asset.spawn);
        match spawn {
            Some(eye) => {
                self.teleport(eye);
                true
            }
            None => false,
        }
    }

    pub fn pawn(&self) -> &Pawn {
        &self.pawn
    }

    /// Mutable camera access for hosts that drive the view directly.
    pub fn rig_mut(&mut self) -> &mut CameraRig {
        &mut self.pawn.rig
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn look(&self) -> LookState {
        self.look
    }

    pub fn current_clip(&self) -> Clip {
        self.clips.current()
    }

    pub fn physics(&self) -> &dyn PhysicsBackend {
        self.physics.as_ref()
    }

    /// Human-readable status lines.
    pub fn status(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("State: {:?}", self.state));
        out.push(format!("Frame: {}", self.frame));
        match &self.current_map {
            Some(map) => match &map.origin {
                MapOrigin::Loaded { path } => {
                    out.push(format!("Map: {} ({})", map.asset.name, path.display()))
                }
                MapOrigin::Fallback { reason } => {
                    out.push(format!("Map: {} (fallback: {})", map.asset.name, reason))
                }
            },
            None => out.push("Map: none".to_string()),
        }
        out.push(format!("Physics ready: {}", self.physics.is_ready()));
        out.push(format!("Look: {:?}", self.look));
        let feet = self.pawn.body.feet;
        out.push(format!(
            "Feet: ({:.2}, {:.2}, {:.2}) facing {:.2} rad",
            feet.x, feet.y, feet.z, self.pawn.body.facing
        ));
        out.push(format!(
            "Clip: {} (running: {})",
            self.clips.current(),
            self.input.is_running()
        ));
        out
    }
}
