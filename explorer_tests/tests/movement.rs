//! Reconciler scenarios driven through the client context.

use explorer_client::client::ExplorerClient;
use explorer_client::reconciler::{eye_rig, MoveOutcome};
use explorer_shared::{
    animation::{Clip, ClipMixer},
    config::ExplorerConfig,
    input::{InputEvent, Key},
    math::{wrap_angle, Vec3},
};
use explorer_tests::{init_tracing, FixedSource, PlayerCall, RecordingPlayer, ScriptedPhysics};

const DT: f32 = 0.1;

async fn booted(physics: ScriptedPhysics, player: RecordingPlayer) -> ExplorerClient {
    let mut client = ExplorerClient::new(ExplorerConfig::default(), Box::new(physics), Box::new(player));
    client
        .boot(&FixedSource(explorer_shared::map::generate_fallback()))
        .await;
    client
}

fn press(client: &mut ExplorerClient, keys: &[Key]) {
    for &key in keys {
        client.handle(&InputEvent::KeyDown { key });
    }
}

#[tokio::test]
async fn running_forward_covers_run_speed_times_dt() -> anyhow::Result<()> {
    init_tracing();
    let mut client = booted(ScriptedPhysics::open(), RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::W, Key::Run]);
    assert!(client.input().is_running());

    let start = client.pawn().rig.eye;
    assert_eq!(client.frame(DT), MoveOutcome::Moved);

    let moved = client.pawn().rig.eye - start;
    assert!((moved.z - 0.5).abs() < 1e-5, "moved {moved:?}");
    assert!(moved.x.abs() < 1e-6);
    assert_eq!(client.current_clip(), Clip::Run);
    Ok(())
}

#[tokio::test]
async fn walking_uses_walk_speed_and_clip() -> anyhow::Result<()> {
    let mut client = booted(ScriptedPhysics::open(), RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::S]);

    let start = client.pawn().rig.eye;
    client.frame(DT);
    let moved = client.pawn().rig.eye - start;
    assert!((moved.z + 0.25).abs() < 1e-5);
    assert_eq!(client.current_clip(), Clip::Walk);
    Ok(())
}

#[tokio::test]
async fn diagonal_and_straight_cover_equal_distance() -> anyhow::Result<()> {
    let mut straight = booted(ScriptedPhysics::open(), RecordingPlayer::new()).await;
    let mut diagonal = booted(ScriptedPhysics::open(), RecordingPlayer::new()).await;
    for c in [&mut straight, &mut diagonal] {
        c.handle(&InputEvent::LockPointer);
    }
    press(&mut straight, &[Key::W]);
    press(&mut diagonal, &[Key::W, Key::D]);

    let s0 = straight.pawn().rig.eye;
    let d0 = diagonal.pawn().rig.eye;
    straight.frame(DT);
    diagonal.frame(DT);

    let s = straight.pawn().rig.eye.distance(s0);
    let d = diagonal.pawn().rig.eye.distance(d0);
    assert!((s - d).abs() < 1e-5, "straight {s} diagonal {d}");
    Ok(())
}

#[tokio::test]
async fn blocked_diagonal_commits_only_free_axes() -> anyhow::Result<()> {
    // Everything with feet.x beyond 0.05 is solid; the Z axis stays open.
    let physics = ScriptedPhysics::new(|feet| feet.x > 0.05).ready();
    let mut client = booted(physics, RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    // Facing +Z, A strafes towards +X.
    press(&mut client, &[Key::W, Key::A]);

    let start = client.pawn().rig.eye;
    let out = client.frame(DT);
    assert_eq!(out, MoveOutcome::Slid { x: false, z: true });

    let moved = client.pawn().rig.eye - start;
    let expected_z = 0.25 / std::f32::consts::SQRT_2;
    assert!(moved.x.abs() < 1e-6);
    assert!((moved.z - expected_z).abs() < 1e-5);
    Ok(())
}

#[tokio::test]
async fn diagonal_into_an_outside_corner_commits_both_axes() -> anyhow::Result<()> {
    // Solid only where both X and Z have moved off the start.
    let physics = ScriptedPhysics::new(|feet| feet.x.abs() > 1e-4 && feet.z > 1e-4).ready();
    let mut client = booted(physics, RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::W, Key::A]);

    let start = client.pawn().rig.eye;
    assert_eq!(client.frame(DT), MoveOutcome::Slid { x: true, z: true });

    let moved = client.pawn().rig.eye - start;
    let step = 0.25 / std::f32::consts::SQRT_2;
    assert!(moved.distance(Vec3::new(step, 0.0, step)) < 1e-5, "moved {moved:?}");
    Ok(())
}

#[tokio::test]
async fn fully_blocked_move_keeps_position_and_turns() -> anyhow::Result<()> {
    let physics = ScriptedPhysics::new(|_| true).ready();
    let mut client = booted(physics, RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::W, Key::D]);
    client.handle(&InputEvent::Look { dx: 250.0, dy: 0.0 });

    let start = client.pawn().rig.eye;
    assert_eq!(client.frame(DT), MoveOutcome::Blocked);
    assert_eq!(client.pawn().rig.eye, start);

    let yaw = client.pawn().rig.yaw;
    let facing = client.pawn().body.facing;
    assert!((facing - wrap_angle(yaw + std::f32::consts::PI)).abs() < 1e-5);
    // Keys are still held, so the clip reflects the attempted gait.
    assert_eq!(client.current_clip(), Clip::Walk);
    Ok(())
}

#[tokio::test]
async fn body_and_eye_never_drift() -> anyhow::Result<()> {
    let mut client = booted(ScriptedPhysics::new(|feet| feet.z > 1.0), RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::W, Key::A]);
    for i in 0..40 {
        if i % 10 == 0 {
            client.handle(&InputEvent::Look { dx: 40.0, dy: 15.0 });
        }
        client.frame(DT);
        let pawn = client.pawn();
        let heading = pawn.rig.forward().flatten().normalize_or_zero();
        let expected =
            pawn.rig.eye - Vec3::Y * eye_rig::EYE_HEIGHT - heading * eye_rig::FORWARD_OFFSET;
        assert!(pawn.body.feet.distance(expected) < 1e-4, "frame {i}");
    }
    Ok(())
}

#[tokio::test]
async fn probe_errors_fail_open() -> anyhow::Result<()> {
    let physics = ScriptedPhysics::fallible(|_| anyhow::bail!("broadphase exploded")).ready();
    let counters = physics.counters();
    let mut client = booted(physics, RecordingPlayer::new()).await;
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::W]);

    assert_eq!(client.frame(DT), MoveOutcome::Moved);
    assert_eq!(counters.probes(), 1);
    Ok(())
}

#[tokio::test]
async fn clip_transitions_pair_fade_out_with_fade_in_and_play() -> anyhow::Result<()> {
    let player = RecordingPlayer::new();
    let mut client = booted(ScriptedPhysics::open(), player.clone()).await;
    client.handle(&InputEvent::LockPointer);

    press(&mut client, &[Key::W]);
    client.frame(DT);
    press(&mut client, &[Key::Run]);
    client.frame(DT);
    client.frame(DT); // no change
    client.handle(&InputEvent::KeyUp { key: Key::W });
    client.frame(DT);

    let calls = player.transitions();
    assert_eq!(calls[0], PlayerCall::Play(Clip::Idle));
    let switches: Vec<_> = calls[1..].chunks(4).collect();
    let expected = [(Clip::Idle, Clip::Walk), (Clip::Walk, Clip::Run), (Clip::Run, Clip::Idle)];
    assert_eq!(switches.len(), expected.len());
    for (chunk, (from, to)) in switches.iter().zip(expected) {
        assert_eq!(
            *chunk,
            [
                PlayerCall::FadeOut(from, 0.2),
                PlayerCall::Reset(to),
                PlayerCall::FadeIn(to, 0.2),
                PlayerCall::Play(to),
            ]
        );
    }
    assert_eq!(client.current_clip(), Clip::Idle);
    Ok(())
}

#[tokio::test]
async fn animation_advances_while_unlocked() -> anyhow::Result<()> {
    let player = RecordingPlayer::new();
    let physics = ScriptedPhysics::open();
    let counters = physics.counters();
    let mut client = booted(physics, player.clone()).await;
    press(&mut client, &[Key::W]);

    for _ in 0..3 {
        assert_eq!(client.frame(DT), MoveOutcome::Unlocked);
    }
    let advances = player
        .calls()
        .into_iter()
        .filter(|c| matches!(c, PlayerCall::Advance(_)))
        .count();
    assert_eq!(advances, 3);
    assert_eq!(counters.probes(), 0);
    assert_eq!(client.current_clip(), Clip::Idle);
    Ok(())
}

#[tokio::test]
async fn physics_steps_at_fixed_rate() -> anyhow::Result<()> {
    let physics = ScriptedPhysics::open();
    let counters = physics.counters();
    let mut client = booted(physics, RecordingPlayer::new()).await;
    // 0.1 s at a 1/60 s step is six substeps; two frames make twelve.
    client.frame(DT);
    client.frame(DT);
    assert!((11..=12).contains(&counters.steps()), "steps {}", counters.steps());
    Ok(())
}

#[tokio::test]
async fn unbooted_client_moves_without_collision() -> anyhow::Result<()> {
    let physics = ScriptedPhysics::new(|_| true);
    let counters = physics.counters();
    let mut client = ExplorerClient::new(
        ExplorerConfig::default(),
        Box::new(physics),
        Box::new(ClipMixer::new()),
    );
    client.handle(&InputEvent::LockPointer);
    press(&mut client, &[Key::W]);
    assert_eq!(client.frame(DT), MoveOutcome::Moved);
    assert_eq!(counters.probes(), 0);
    assert_eq!(counters.steps(), 0);
    Ok(())
}
