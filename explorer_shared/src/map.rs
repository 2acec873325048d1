//! Map collaborator.
//!
//! A map asset is a JSON scene description: named nodes with a translation and
//! a coarse geometry. Collision surfaces are picked out of the node list by a
//! name-pattern heuristic and resolved once to a [`SurfaceShape`].
//!
//! Loading goes through a [`MapSource`] with a bounded wait. When the source
//! fails, stalls past the timeout, or yields nothing collidable, a
//! deterministic fallback layout is generated instead.
//!
//! # Usage
//! ```ignore
//! let source = FileMapSource;
//! let map = load_map_or_fallback(&source, "maps/skeld.json", timeout, generate_fallback).await;
//! for surface in &map.surfaces { physics.create_static_body(surface, StaticBodyOptions::default())?; }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::math::{Aabb, Vec3};

/// Node-name fragments that mark a node as collidable.
pub const COLLISION_NAME_PATTERNS: &[&str] = &[
    "wall", "floor", "collision", "collider", "table", "bench", "door", "console", "crate",
    "barrier",
];

/// Node-name fragments that veto collision even if a pattern matches.
pub const NON_COLLIDING_NAME_PATTERNS: &[&str] = &["light", "decal", "sky"];

/// Geometry attached to a scene node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeGeometry {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Arbitrary mesh, carried as its vertex positions (node-local).
    Mesh { points: Vec<Vec3> },
}

impl NodeGeometry {
    /// Rejects degenerate or inverted extents.
    pub fn validate(&self) -> anyhow::Result<()> {
        let finite = |v: Vec3| v.x.is_finite() && v.y.is_finite() && v.z.is_finite();
        match self {
            NodeGeometry::Box { half_extents: h } => {
                if !finite(*h) || h.x < 0.0 || h.y < 0.0 || h.z < 0.0 {
                    bail!("box half extents must be finite and non-negative, got {h:?}");
                }
            }
            NodeGeometry::Sphere { radius } => {
                if !(radius.is_finite() && *radius > 0.0) {
                    bail!("sphere radius must be positive, got {radius}");
                }
            }
            NodeGeometry::Mesh { points } => {
                if let Some(p) = points.iter().find(|p| !finite(**p)) {
                    bail!("mesh point {p:?} is not finite");
                }
            }
        }
        Ok(())
    }
}

/// One node of the scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub name: String,
    #[serde(default)]
    pub translation: Vec3,
    pub geometry: NodeGeometry,
}

/// A loaded (or generated) map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapAsset {
    pub name: String,
    /// Suggested eye position. Never applied implicitly.
    #[serde(default)]
    pub spawn: Option<Vec3>,
    pub nodes: Vec<MapNode>,
}

/// Collision shape, decided once when the surface is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SurfaceShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Mesh approximated by its node-local bounding box.
    ConvexFallback { bounds: Aabb },
}

impl SurfaceShape {
    /// World-space bounds of this shape placed at `position`.
    pub fn world_bounds(&self, position: Vec3) -> Aabb {
        match *self {
            SurfaceShape::Box { half_extents } => Aabb::from_center_half(position, half_extents),
            SurfaceShape::Sphere { radius } => Aabb::from_center_half(position, Vec3::splat(radius)),
            SurfaceShape::ConvexFallback { bounds } => bounds.translated(position),
        }
    }
}

/// A collidable surface handed to the physics collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDescriptor {
    pub name: String,
    pub position: Vec3,
    pub shape: SurfaceShape,
}

/// Whether a node name passes the collision heuristic.
pub fn is_collision_candidate(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    COLLISION_NAME_PATTERNS.iter().any(|p| lower.contains(p))
        && !NON_COLLIDING_NAME_PATTERNS.iter().any(|p| lower.contains(p))
}

impl MapAsset {
    /// Parses a map from JSON.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let asset: Self = serde_json::from_str(s).context("parse map json")?;
        if asset.nodes.is_empty() {
            bail!("map '{}' has no nodes", asset.name);
        }
        for node in &asset.nodes {
            node.geometry
                .validate()
                .with_context(|| format!("map '{}' node '{}'", asset.name, node.name))?;
        }
        Ok(asset)
    }

    /// Extracts collision surfaces from the node list.
    pub fn collision_surfaces(&self) -> Vec<SurfaceDescriptor> {
        self.nodes
            .iter()
            .filter(|n| is_collision_candidate(&n.name))
            .filter_map(|n| {
                let shape = match &n.geometry {
                    NodeGeometry::Box { half_extents } => SurfaceShape::Box {
                        half_extents: *half_extents,
                    },
                    NodeGeometry::Sphere { radius } => SurfaceShape::Sphere { radius: *radius },
                    NodeGeometry::Mesh { points } => match Aabb::from_points(points) {
                        Some(bounds) => SurfaceShape::ConvexFallback { bounds },
                        None => {
                            debug!(node = %n.name, "Skipping mesh node without points");
                            return None;
                        }
                    },
                };
                Some(SurfaceDescriptor {
                    name: n.name.clone(),
                    position: n.translation,
                    shape,
                })
            })
            .collect()
    }
}

/// Builds the built-in layout used when the real map is unavailable.
///
/// A walled 40x40 room with a floor slab, two partition walls, a round table
/// and a crate. The origin is left clear so the character is never embedded.
pub fn generate_fallback() -> MapAsset {
    const HALF: f32 = 20.0;
    const WALL_H: f32 = 1.5;
    const WALL_T: f32 = 0.25;

    let wall = |name: &str, translation: Vec3, half_extents: Vec3| MapNode {
        name: name.to_string(),
        translation,
        geometry: NodeGeometry::Box { half_extents },
    };

    let nodes = vec![
        wall(
            "floor_main",
            Vec3::new(0.0, -0.1, 0.0),
            Vec3::new(HALF, 0.1, HALF),
        ),
        wall(
            "wall_north",
            Vec3::new(0.0, WALL_H, HALF),
            Vec3::new(HALF, WALL_H, WALL_T),
        ),
        wall(
            "wall_south",
            Vec3::new(0.0, WALL_H, -HALF),
            Vec3::new(HALF, WALL_H, WALL_T),
        ),
        wall(
            "wall_east",
            Vec3::new(HALF, WALL_H, 0.0),
            Vec3::new(WALL_T, WALL_H, HALF),
        ),
        wall(
            "wall_west",
            Vec3::new(-HALF, WALL_H, 0.0),
            Vec3::new(WALL_T, WALL_H, HALF),
        ),
        wall(
            "wall_partition_east",
            Vec3::new(10.0, WALL_H, -5.0),
            Vec3::new(WALL_T, WALL_H, 8.0),
        ),
        wall(
            "wall_partition_west",
            Vec3::new(-10.0, WALL_H, 5.0),
            Vec3::new(WALL_T, WALL_H, 8.0),
        ),
        MapNode {
            name: "table_round".to_string(),
            translation: Vec3::new(0.0, 0.5, 8.0),
            geometry: NodeGeometry::Sphere { radius: 1.2 },
        },
        MapNode {
            name: "crate_storage".to_string(),
            translation: Vec3::new(-6.0, 0.0, -6.0),
            geometry: NodeGeometry::Mesh {
                points: vec![
                    Vec3::new(-0.6, 0.0, -0.6),
                    Vec3::new(0.6, 0.0, 0.6),
                    Vec3::new(0.0, 1.2, 0.0),
                ],
            },
        },
        MapNode {
            name: "ceiling_light".to_string(),
            translation: Vec3::new(0.0, 3.0, 0.0),
            geometry: NodeGeometry::Sphere { radius: 0.3 },
        },
    ];

    MapAsset {
        name: "fallback".to_string(),
        spawn: None,
        nodes,
    }
}

/// Where a map asset can be fetched from.
#[async_trait]
pub trait MapSource: Send + Sync {
    /// Loads a map, reporting progress in `[0, 1]` on `progress`.
    async fn load(&self, path: &Path, progress: &watch::Sender<f32>) -> anyhow::Result<MapAsset>;
}

/// Reads JSON map assets from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileMapSource;

#[async_trait]
impl MapSource for FileMapSource {
    async fn load(&self, path: &Path, progress: &watch::Sender<f32>) -> anyhow::Result<MapAsset> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let total = file.metadata().await.map(|m| m.len()).unwrap_or(0);

        let mut data = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; 16 * 1024];
        loop {
            let n = file.read(&mut chunk).await.context("read map")?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            if total > 0 {
                let _ = progress.send((data.len() as f32 / total as f32).min(1.0));
            }
        }
        let _ = progress.send(1.0);

        let text = String::from_utf8(data).context("map is not utf-8")?;
        MapAsset::from_json_str(&text)
    }
}

/// How the active map came to be.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOrigin {
    Loaded { path: PathBuf },
    Fallback { reason: String },
}

/// A map ready to be handed to physics.
#[derive(Debug, Clone)]
pub struct LoadedMap {
    pub asset: MapAsset,
    pub surfaces: Vec<SurfaceDescriptor>,
    pub origin: MapOrigin,
}

impl LoadedMap {
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, MapOrigin::Fallback { .. })
    }
}

/// Loads `path` from `source`, waiting at most `timeout`.
///
/// Never fails: any error, a timeout, or a map without collision surfaces
/// substitutes the output of `fallback`, which runs at most once.
pub async fn load_map_or_fallback<S, F>(
    source: &S,
    path: impl AsRef<Path>,
    timeout: Duration,
    fallback: F,
) -> LoadedMap
where
    S: MapSource + ?Sized,
    F: FnOnce() -> MapAsset,
{
    let path = path.as_ref();
    info!(map = %path.display(), timeout_ms = timeout.as_millis() as u64, "Loading map");

    let (progress_tx, mut progress_rx) = watch::channel(0.0f32);
    let load = source.load(path, &progress_tx);
    tokio::pin!(load);

    let outcome = tokio::time::timeout(timeout, async {
        loop {
            tokio::select! {
                res = &mut load => break res,
                changed = progress_rx.changed() => {
                    if changed.is_ok() {
                        debug!(map = %path.display(), progress = *progress_rx.borrow(), "Map loading");
                    }
                }
            }
        }
    })
    .await;

    let reason = match outcome {
        Ok(Ok(asset)) => {
            let surfaces = asset.collision_surfaces();
            if !surfaces.is_empty() {
                info!(
                    map = %asset.name,
                    nodes = asset.nodes.len(),
                    surfaces = surfaces.len(),
                    "Map loaded"
                );
                return LoadedMap {
                    asset,
                    surfaces,
                    origin: MapOrigin::Loaded {
                        path: path.to_path_buf(),
                    },
                };
            }
            format!("map '{}' has no collision surfaces", asset.name)
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(_) => format!("timed out after {} ms", timeout.as_millis()),
    };

    warn!(map = %path.display(), %reason, "Map unavailable, generating fallback");
    let asset = fallback();
    let surfaces = asset.collision_surfaces();
    info!(map = %asset.name, surfaces = surfaces.len(), "Fallback map generated");
    LoadedMap {
        asset,
        surfaces,
        origin: MapOrigin::Fallback { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_matches_case_insensitively_and_honours_vetoes() {
        assert!(is_collision_candidate("Cafeteria_Wall_03"));
        assert!(is_collision_candidate("FLOOR"));
        assert!(!is_collision_candidate("wall_light"));
        assert!(!is_collision_candidate("vent_cover"));
    }

    #[test]
    fn geometry_resolves_to_tagged_shapes() {
        let asset = MapAsset {
            name: "t".into(),
            spawn: None,
            nodes: vec![
                MapNode {
                    name: "wall".into(),
                    translation: Vec3::ZERO,
                    geometry: NodeGeometry::Box {
                        half_extents: Vec3::splat(1.0),
                    },
                },
                MapNode {
                    name: "table".into(),
                    translation: Vec3::ZERO,
                    geometry: NodeGeometry::Sphere { radius: 2.0 },
                },
                MapNode {
                    name: "crate".into(),
                    translation: Vec3::new(1.0, 0.0, 0.0),
                    geometry: NodeGeometry::Mesh {
                        points: vec![Vec3::ZERO, Vec3::splat(1.0)],
                    },
                },
                MapNode {
                    name: "door_empty".into(),
                    translation: Vec3::ZERO,
                    geometry: NodeGeometry::Mesh { points: vec![] },
                },
            ],
        };
        let surfaces = asset.collision_surfaces();
        assert_eq!(surfaces.len(), 3);
        assert!(matches!(surfaces[0].shape, SurfaceShape::Box { .. }));
        assert!(matches!(surfaces[1].shape, SurfaceShape::Sphere { .. }));
        let bounds = surfaces[2].shape.world_bounds(surfaces[2].position);
        assert_eq!(bounds.min, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn fallback_is_deterministic_and_collidable() {
        let a = generate_fallback();
        assert_eq!(a, generate_fallback());
        assert!(a.spawn.is_none());
        let surfaces = a.collision_surfaces();
        assert!(!surfaces.is_empty());
        assert!(surfaces.iter().all(|s| s.name != "ceiling_light"));
    }

    #[test]
    fn map_json_parses() {
        let asset = MapAsset::from_json_str(
            r#"{
                "name": "skeld",
                "spawn": { "x": 0.0, "y": 1.65, "z": 0.0 },
                "nodes": [
                    { "name": "wall_a", "translation": { "x": 0.0, "y": 1.0, "z": 4.0 },
                      "geometry": { "kind": "box", "half_extents": { "x": 2.0, "y": 1.0, "z": 0.2 } } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(asset.name, "skeld");
        assert_eq!(asset.collision_surfaces().len(), 1);
    }

    #[test]
    fn negative_extents_are_rejected() {
        let sphere = r#"{ "name": "m", "nodes": [
            { "name": "table", "geometry": { "kind": "sphere", "radius": -1.0 } } ] }"#;
        let err = MapAsset::from_json_str(sphere).unwrap_err();
        assert!(format!("{err:#}").contains("node 'table'"), "{err:#}");

        let inverted = r#"{ "name": "m", "nodes": [
            { "name": "wall", "geometry": { "kind": "box",
              "half_extents": { "x": 1.0, "y": -1.0, "z": 1.0 } } } ] }"#;
        assert!(MapAsset::from_json_str(inverted).is_err());
    }

    #[tokio::test]
    async fn invalid_geometry_falls_back() {
        let path = std::env::temp_dir().join(format!("explorer-bad-map-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "name": "bad", "nodes": [
                { "name": "table", "geometry": { "kind": "sphere", "radius": -1.0 } } ] }"#,
        )
        .unwrap();
        let map = load_map_or_fallback(&FileMapSource, &path, Duration::from_secs(1), generate_fallback).await;
        std::fs::remove_file(&path).unwrap();
        match map.origin {
            MapOrigin::Fallback { reason } => assert!(reason.contains("radius"), "{reason}"),
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn map_without_nodes_is_rejected() {
        assert!(MapAsset::from_json_str(r#"{ "name": "empty", "nodes": [] }"#).is_err());
    }

    #[tokio::test]
    async fn missing_file_falls_back() {
        let map = load_map_or_fallback(
            &FileMapSource,
            "does/not/exist.json",
            Duration::from_secs(1),
            generate_fallback,
        )
        .await;
        assert!(map.is_fallback());
        assert!(!map.surfaces.is_empty());
    }
}
