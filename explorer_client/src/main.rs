//! Headless walkthrough binary.
//!
//! Usage:
//!   cargo run -p explorer_client -- [--config explorer.json] [--map maps/skeld.json]
//!                                   [--frames 240] [--script input.json]
//!
//! Boots physics and the map (falling back to the built-in layout if the map
//! cannot be loaded in time), then runs a fixed number of frames at
//! `frame_hz`, feeding scripted input events. Without `--script` a short demo
//! tour is played.

use std::env;
use std::time::Duration;

use anyhow::Context;
use explorer_client::client::ExplorerClient;
use explorer_client::input::InputScript;
use explorer_shared::{
    animation::ClipMixer, config::ExplorerConfig, map::FileMapSource, physics::AabbWorld,
};
use tracing::info;

struct Args {
    config: Option<String>,
    map: Option<String>,
    frames: u64,
    script: Option<String>,
}

fn parse_args() -> Args {
    let mut parsed = Args {
        config: None,
        map: None,
        frames: 240,
        script: None,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(args[i + 1].clone());
                i += 2;
            }
            "--map" if i + 1 < args.len() => {
                parsed.map = Some(args[i + 1].clone());
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                parsed.frames = args[i + 1].parse().unwrap_or(240);
                i += 2;
            }
            "--script" if i + 1 < args.len() => {
                parsed.script = Some(args[i + 1].clone());
                i += 2;
            }
            _ => i += 1,
        }
    }
    parsed
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args();
    let mut cfg = match &args.config {
        Some(path) => ExplorerConfig::load(path).context("load config")?,
        None => ExplorerConfig::default(),
    };
    if let Some(map) = args.map {
        cfg.map.path = map;
    }
    let script = match &args.script {
        Some(path) => InputScript::load(path)?,
        None => InputScript::demo(),
    };
    info!(map = %cfg.map.path, frames = args.frames, scripted_events = script.len(), "Starting walkthrough");

    let physics = Box::new(AabbWorld::new(cfg.physics));
    let frame_hz = cfg.frame_hz;
    let mut client = ExplorerClient::new(cfg, physics, Box::new(ClipMixer::new()));
    client.boot(&FileMapSource).await;
    client.move_to_spawn();

    let frame_interval = Duration::from_secs_f32(1.0 / frame_hz as f32);
    let mut ticker = tokio::time::interval(frame_interval);
    let mut last = tokio::time::Instant::now();

    for frame in 0..args.frames {
        ticker.tick().await;
        let now = tokio::time::Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        for event in script.events_at(frame) {
            client.handle(event);
        }
        client.frame(dt);

        if frame % frame_hz as u64 == 0 {
            let body = client.pawn().body;
            info!(
                frame,
                x = body.feet.x,
                z = body.feet.z,
                facing = body.facing,
                clip = %client.current_clip(),
                "Walkthrough"
            );
        }
    }

    for line in client.status() {
        println!("{}", line);
    }
    Ok(())
}
