//! Physics abstraction.
//!
//! The walkthrough only needs three things from physics: static bodies built
//! from map surfaces, a character overlap probe, and a stepped simulation.
//! [`AabbWorld`] answers the probe with exact capsule-vs-shape distances;
//! [`NullPhysics`] never collides.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    config::PhysicsConfig,
    map::{SurfaceDescriptor, SurfaceShape},
    math::{Aabb, Vec3},
};

/// Gap tolerated between the character capsule and a surface before it
/// counts as touching. Keeps a character standing on a floor from colliding.
pub const CONTACT_SLOP: f32 = 0.01;

/// Creation options for a static body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticBodyOptions {
    /// Offset added to the surface position.
    pub position: Vec3,
    /// Always 0 for map geometry.
    pub mass: f32,
    pub restitution: f32,
}

impl Default for StaticBodyOptions {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            mass: 0.0,
            restitution: 0.1,
        }
    }
}

/// Handle to a created body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(pub u32);

/// Physics collaborator.
#[async_trait]
pub trait PhysicsBackend: Send + Sync {
    /// Completes once the backend can take bodies and answer probes.
    async fn init(&mut self) -> anyhow::Result<()>;

    fn is_ready(&self) -> bool;

    fn create_static_body(
        &mut self,
        surface: &SurfaceDescriptor,
        opts: StaticBodyOptions,
    ) -> anyhow::Result<BodyId>;

    /// Removes every static body, ahead of installing another map.
    fn clear_static_bodies(&mut self) {}

    /// Whether an upright capsule with its base at `feet` overlaps anything.
    fn check_character_collision(&self, feet: Vec3, radius: f32, height: f32) -> anyhow::Result<bool>;

    /// Advances the simulation by one fixed step.
    fn step(&mut self, dt_sec: f32);
}

/// No-op physics.
#[derive(Default)]
pub struct NullPhysics {
    ready: bool,
}

#[async_trait]
impl PhysicsBackend for NullPhysics {
    async fn init(&mut self) -> anyhow::Result<()> {
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn create_static_body(
        &mut self,
        _surface: &SurfaceDescriptor,
        _opts: StaticBodyOptions,
    ) -> anyhow::Result<BodyId> {
        Ok(BodyId(0))
    }

    fn check_character_collision(&self, _feet: Vec3, _radius: f32, _height: f32) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn step(&mut self, _dt_sec: f32) {}
}

#[derive(Debug, Clone)]
struct StaticBody {
    name: String,
    shape: ShapeInWorld,
    _restitution: f32,
}

#[derive(Debug, Clone, Copy)]
enum ShapeInWorld {
    Box(Aabb),
    Sphere { center: Vec3, radius: f32 },
}

/// Static-geometry world answering character probes.
///
/// Boxes and convex fallbacks are treated as axis-aligned boxes; spheres are
/// exact. The character is an upright capsule.
pub struct AabbWorld {
    cfg: PhysicsConfig,
    ready: bool,
    bodies: Vec<StaticBody>,
    steps: u64,
}

impl AabbWorld {
    pub fn new(cfg: PhysicsConfig) -> Self {
        Self {
            cfg,
            ready: false,
            bodies: Vec::new(),
            steps: 0,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of fixed steps simulated so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Name of the first body the capsule overlaps, if any.
    pub fn first_overlap(&self, feet: Vec3, radius: f32, height: f32) -> Option<&str> {
        let capsule = Capsule::upright(feet, radius, height);
        self.bodies
            .iter()
            .find(|b| capsule.overlaps(&b.shape))
            .map(|b| b.name.as_str())
    }
}

#[async_trait]
impl PhysicsBackend for AabbWorld {
    async fn init(&mut self) -> anyhow::Result<()> {
        self.bodies.clear();
        self.steps = 0;
        self.ready = true;
        info!(gravity = ?self.cfg.gravity, fixed_step = self.cfg.fixed_step, "Physics initialized");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn create_static_body(
        &mut self,
        surface: &SurfaceDescriptor,
        opts: StaticBodyOptions,
    ) -> anyhow::Result<BodyId> {
        if !self.ready {
            anyhow::bail!("physics not initialized");
        }
        if opts.mass != 0.0 {
            anyhow::bail!("static body '{}' must have zero mass", surface.name);
        }
        let position = surface.position + opts.position;
        let shape = match surface.shape {
            SurfaceShape::Sphere { radius } => ShapeInWorld::Sphere {
                center: position,
                radius,
            },
            other => ShapeInWorld::Box(other.world_bounds(position)),
        };
        let id = BodyId(self.bodies.len() as u32);
        self.bodies.push(StaticBody {
            name: surface.name.clone(),
            shape,
            _restitution: opts.restitution,
        });
        debug!(body = id.0, name = %surface.name, "Static body created");
        Ok(id)
    }

    fn clear_static_bodies(&mut self) {
        self.bodies.clear();
    }

    fn check_character_collision(&self, feet: Vec3, radius: f32, height: f32) -> anyhow::Result<bool> {
        if !self.ready {
            anyhow::bail!("physics not initialized");
        }
        if !(feet.x.is_finite() && feet.y.is_finite() && feet.z.is_finite()) {
            anyhow::bail!("non-finite probe position {feet:?}");
        }
        Ok(self.first_overlap(feet, radius, height).is_some())
    }

    fn step(&mut self, _dt_sec: f32) {
        // Only static bodies exist; nothing to integrate.
        self.steps += 1;
    }
}

/// Upright capsule as a vertical segment plus radius.
#[derive(Debug, Clone, Copy)]
struct Capsule {
    base: Vec3,
    y0: f32,
    y1: f32,
    radius: f32,
}

impl Capsule {
    fn upright(feet: Vec3, radius: f32, height: f32) -> Self {
        let y0 = feet.y + radius;
        let y1 = (feet.y + height - radius).max(y0);
        Self {
            base: feet,
            y0,
            y1,
            radius,
        }
    }

    fn overlaps(&self, shape: &ShapeInWorld) -> bool {
        let reach = (self.radius - CONTACT_SLOP).max(0.0);
        match *shape {
            ShapeInWorld::Box(bb) => {
                // Vertical segment vs box separates into a horizontal and a
                // vertical gap.
                let dx = axis_gap(self.base.x, self.base.x, bb.min.x, bb.max.x);
                let dz = axis_gap(self.base.z, self.base.z, bb.min.z, bb.max.z);
                let dy = axis_gap(self.y0, self.y1, bb.min.y, bb.max.y);
                dx * dx + dy * dy + dz * dz < reach * reach
            }
            ShapeInWorld::Sphere { center, radius } => {
                let y = center.y.clamp(self.y0, self.y1);
                let closest = Vec3::new(self.base.x, y, self.base.z);
                let r = reach + radius;
                (center - closest).len_sq() < r * r
            }
        }
    }
}

/// Distance between intervals `[a0, a1]` and `[b0, b1]`, zero if they overlap.
fn axis_gap(a0: f32, a1: f32, b0: f32, b1: f32) -> f32 {
    if a1 < b0 {
        b0 - a1
    } else if b1 < a0 {
        a0 - b1
    } else {
        0.0
    }
}

/// Fixed timestep with an accumulator.
///
/// Frame time is banked and spent in `fixed_step` slices, at most
/// `max_substeps` per frame; time beyond that is dropped so a stalled frame
/// cannot trigger a burst of catch-up work.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    fixed_step: f32,
    max_substeps: u32,
    accumulator: f32,
}

impl FixedStepper {
    pub fn new(cfg: &PhysicsConfig) -> Self {
        Self {
            fixed_step: cfg.fixed_step,
            max_substeps: cfg.max_substeps,
            accumulator: 0.0,
        }
    }

    /// Banked time not yet simulated.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Advances `backend` for a frame of `dt_sec`. Returns the substeps run.
    ///
    /// Does nothing until the backend is ready.
    pub fn advance(&mut self, backend: &mut dyn PhysicsBackend, dt_sec: f32) -> u32 {
        if !backend.is_ready() || !(dt_sec > 0.0) {
            return 0;
        }
        self.accumulator += dt_sec;
        let mut steps = 0;
        while self.accumulator >= self.fixed_step && steps < self.max_substeps {
            backend.step(self.fixed_step);
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        if steps == self.max_substeps && self.accumulator >= self.fixed_step {
            debug!(dropped = self.accumulator, "Physics fell behind, dropping time");
            self.accumulator %= self.fixed_step;
        }
        steps
    }
}
