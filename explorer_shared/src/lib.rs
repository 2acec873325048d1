//! `explorer_shared`
//!
//! Libraries shared by the walkthrough client and its tests.
//!
//! Design goals:
//! - Deterministic where practical.
//! - Collaborators (map, physics, animation) behind traits so the client can
//!   be driven headless and tested with doubles.
//! - No `unsafe`.

pub mod animation;
pub mod config;
pub mod input;
pub mod map;
pub mod math;
pub mod physics;
