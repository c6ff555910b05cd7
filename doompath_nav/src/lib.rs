// doompath_nav: navigation mesh generation and pathfinding for Doom-format
// levels.
//
// Given a level's sector/edge/thing geometry and a player's dimensions, the
// crate flood-fills a walkability lattice from the player starts, packs the
// walkable samples into rectangular areas, links adjacent areas (and
// teleporters) with connections, and answers A* queries over the result.
// It reads no WAD files itself; callers hand it a `LevelGeometry`.
//
// Module overview:
// - `types.rs`:       Arena ids, WorldPos, Direction, element/connection flags.
// - `error.rs`:       NavError, and the Diagnostic list for non-fatal level problems.
// - `config.rs`:      NavConfig: player dimensions, limits, thing table, presets.
// - `geometry.rs`:    Planes, world/lattice rectangles, polygon helpers.
// - `level.rs`:       Sector/Edge/Thing records and the LevelGeometry trait.
// - `level_map.rs`:   LevelMap, a blockmap-indexed LevelGeometry built from JSON or code.
// - `probe.rs`:       Capsule collision test against the level.
// - `grid.rs`:        Element lattice and the BFS flood fill that builds it.
// - `area.rs`:        Square packing and rectangle merging of elements into areas.
// - `connection.rs`:  Portals between adjacent areas and teleport links.
// - `mesh.rs`:        The finished Mesh, its spatial index, and `build_navigation()`.
// - `pathfinding.rs`: A* over areas with hazard-weighted costs.
//
// The companion crate `doompath_navgen` is the command-line front end that
// reads a level file and writes the mesh.
//
// **Critical constraint: determinism.** Building is a pure function of
// `(level, config)`. No `HashMap` iteration decides output order, no system
// time, no randomness. Use `BTreeMap` for ordered collections.

pub mod area;
pub mod config;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod level;
pub mod level_map;
pub mod mesh;
pub mod pathfinding;
pub mod probe;
pub mod types;

pub use config::NavConfig;
pub use error::{Diagnostic, NavError, NavResult};
pub use level::LevelGeometry;
pub use level_map::{LevelBuilder, LevelMap};
pub use mesh::{Mesh, NavBuild, build_navigation};
pub use pathfinding::{PathResult, Pathfinder};
pub use types::WorldPos;
