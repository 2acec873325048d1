//! Test doubles for the walkthrough collaborators.
//!
//! Everything here records what the client asked of it so scenarios can
//! assert on the interaction, not just the end state.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use explorer_shared::{
    animation::{AnimationPlayer, Clip},
    map::{MapAsset, MapSource, SurfaceDescriptor},
    math::Vec3,
    physics::{BodyId, PhysicsBackend, StaticBodyOptions},
};
use tokio::sync::watch;

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// One call made on a [`RecordingPlayer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCall {
    Play(Clip),
    Reset(Clip),
    FadeIn(Clip, f32),
    FadeOut(Clip, f32),
    Advance(f32),
}

/// Animation player that logs every call into a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlayer {
    calls: Arc<Mutex<Vec<PlayerCall>>>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls other than `Advance`.
    pub fn transitions(&self) -> Vec<PlayerCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, PlayerCall::Advance(_)))
            .collect()
    }

    fn record(&self, call: PlayerCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl AnimationPlayer for RecordingPlayer {
    fn play(&mut self, clip: Clip) {
        self.record(PlayerCall::Play(clip));
    }

    fn reset(&mut self, clip: Clip) {
        self.record(PlayerCall::Reset(clip));
    }

    fn fade_in(&mut self, clip: Clip, duration: f32) {
        self.record(PlayerCall::FadeIn(clip, duration));
    }

    fn fade_out(&mut self, clip: Clip, duration: f32) {
        self.record(PlayerCall::FadeOut(clip, duration));
    }

    fn advance(&mut self, dt_sec: f32) {
        self.record(PlayerCall::Advance(dt_sec));
    }
}

type Blocker = dyn Fn(Vec3) -> anyhow::Result<bool> + Send + Sync;

/// Physics whose probe answer is a closure over the probed feet position.
pub struct ScriptedPhysics {
    ready: bool,
    blocker: Box<Blocker>,
    probes: Arc<AtomicUsize>,
    steps: Arc<AtomicUsize>,
    bodies: Arc<AtomicUsize>,
}

impl ScriptedPhysics {
    pub fn new(blocker: impl Fn(Vec3) -> bool + Send + Sync + 'static) -> Self {
        Self::fallible(move |feet| Ok(blocker(feet)))
    }

    /// Probe that may error.
    pub fn fallible(blocker: impl Fn(Vec3) -> anyhow::Result<bool> + Send + Sync + 'static) -> Self {
        Self {
            ready: false,
            blocker: Box::new(blocker),
            probes: Arc::default(),
            steps: Arc::default(),
            bodies: Arc::default(),
        }
    }

    /// Never collides.
    pub fn open() -> Self {
        Self::new(|_| false)
    }

    /// Already initialized.
    pub fn ready(mut self) -> Self {
        self.ready = true;
        self
    }

    pub fn counters(&self) -> PhysicsCounters {
        PhysicsCounters {
            probes: Arc::clone(&self.probes),
            steps: Arc::clone(&self.steps),
            bodies: Arc::clone(&self.bodies),
        }
    }
}

/// Shared view of what a [`ScriptedPhysics`] was asked to do.
#[derive(Debug, Clone)]
pub struct PhysicsCounters {
    probes: Arc<AtomicUsize>,
    steps: Arc<AtomicUsize>,
    bodies: Arc<AtomicUsize>,
}

impl PhysicsCounters {
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> usize {
        self.bodies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhysicsBackend for ScriptedPhysics {
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
        let id = self.bodies.fetch_add(1, Ordering::SeqCst);
        Ok(BodyId(id as u32))
    }

    fn clear_static_bodies(&mut self) {
        self.bodies.store(0, Ordering::SeqCst);
    }

    fn check_character_collision(&self, feet: Vec3, _radius: f32, _height: f32) -> anyhow::Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        (self.blocker)(feet)
    }

    fn step(&mut self, _dt_sec: f32) {
        self.steps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Map source that never completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StallingSource;

#[async_trait]
impl MapSource for StallingSource {
    async fn load(&self, _path: &Path, progress: &watch::Sender<f32>) -> anyhow::Result<MapAsset> {
        let _ = progress.send(0.1);
        std::future::pending().await
    }
}

/// Map source that always errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSource;

#[async_trait]
impl MapSource for FailingSource {
    async fn load(&self, path: &Path, _progress: &watch::Sender<f32>) -> anyhow::Result<MapAsset> {
        anyhow::bail!("asset server refused {}", path.display())
    }
}

/// Map source serving a fixed asset.
#[derive(Debug, Clone)]
pub struct FixedSource(pub MapAsset);

#[async_trait]
impl MapSource for FixedSource {
    async fn load(&self, _path: &Path, progress: &watch::Sender<f32>) -> anyhow::Result<MapAsset> {
        let _ = progress.send(1.0);
        Ok(self.0.clone())
    }
}
