//! `explorer_client`
//!
//! Client-side systems:
//! - Input capture and movement intent
//! - Camera rig and pointer-look capture
//! - Movement/collision reconciliation
//! - The session context that wires physics, map, and animation together

pub mod client;
pub mod input;
pub mod look;
pub mod reconciler;

pub use client::ExplorerClient;
