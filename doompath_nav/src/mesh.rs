// The finished navigation mesh and the pipeline that builds it.
//
// A `Mesh` owns the areas and connections produced from one level, plus the
// floor planes referenced by sloped areas. It is the structure handed to
// `pathfinding.rs` and written to disk by the `navgen` tool. Point lookup
// goes through an R-tree of area footprints; the index is rebuilt on load
// and never serialized.
//
// `build_navigation()` runs the full pipeline: seed the grid at start things
// and teleport destinations, flood it, pack and merge the elements into
// areas, link adjacent areas, then add teleport connections. Problems with
// the level that do not prevent a result (blocked spawns, leaks, broken
// teleporters) come back as diagnostics alongside the mesh.
//
// See also: `grid.rs`, `area.rs`, `connection.rs` for the pipeline stages,
// `level.rs` for the input geometry.
//
// **Critical constraint: determinism.** The same level and config always
// produce the same mesh, byte for byte. Every stage iterates in a fixed
// order and collections are `Vec` or `BTreeMap`.

use crate::area::{Area, Compactor};
use crate::config::NavConfig;
use crate::connection::{Connection, link, link_teleports};
use crate::error::{Diagnostic, NavResult};
use crate::geometry::{Plane, PlaneKey};
use crate::grid::{Grid, GridBuilder};
use crate::level::LevelGeometry;
use crate::types::{AreaId, ConnectionId, WorldPos};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

type AreaFootprint = GeomWithData<Rectangle<[f64; 2]>, AreaId>;

/// Areas and connections for one level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mesh {
    pub element_size: f64,
    areas: Vec<Area>,
    connections: Vec<Connection>,
    planes: BTreeMap<PlaneKey, Plane>,
    #[serde(skip)]
    index: RTree<AreaFootprint>,
}

impl PartialEq for Mesh {
    fn eq(&self, other: &Self) -> bool {
        self.element_size == other.element_size
            && self.areas == other.areas
            && self.connections == other.connections
            && self.planes == other.planes
    }
}

impl Mesh {
    pub fn new(
        element_size: f64,
        areas: Vec<Area>,
        connections: Vec<Connection>,
        planes: BTreeMap<PlaneKey, Plane>,
    ) -> Self {
        let mut mesh = Self {
            element_size,
            areas,
            connections,
            planes,
            index: RTree::new(),
        };
        mesh.rebuild_index();
        mesh
    }

    /// Rebuild the spatial index from the area footprints. Must be called
    /// after deserializing by any path other than `from_json`.
    pub fn rebuild_index(&mut self) {
        let footprints = self
            .areas
            .iter()
            .enumerate()
            .map(|(i, area)| {
                let w = &area.world;
                GeomWithData::new(
                    Rectangle::from_corners([w.x1, w.y1], [w.x2, w.y2]),
                    AreaId::from_index(i),
                )
            })
            .collect();
        self.index = RTree::bulk_load(footprints);
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn area(&self, id: AreaId) -> &Area {
        &self.areas[id.index()]
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.index()]
    }

    pub fn planes(&self) -> &BTreeMap<PlaneKey, Plane> {
        &self.planes
    }

    /// Append a connection and register it with both of its areas.
    pub(crate) fn push_connection(&mut self, connection: Connection) -> ConnectionId {
        let id = ConnectionId::from_index(self.connections.len());
        self.areas[connection.area_a.index()].connections.push(id);
        self.areas[connection.area_b.index()].connections.push(id);
        self.connections.push(connection);
        id
    }

    /// Height of an area's surface at a world point.
    pub fn surface_z(&self, id: AreaId, x: f64, y: f64) -> f64 {
        let area = self.area(id);
        match area.plane.and_then(|key| self.planes.get(&key)) {
            Some(plane) => plane.z_at(x, y),
            None => f64::from(area.z),
        }
    }

    /// The area whose footprint contains (x, y) and whose surface is
    /// closest to `z`. Ties go to the lower id.
    pub fn area_at(&self, x: f64, y: f64, z: f64) -> Option<AreaId> {
        self.index
            .locate_all_at_point(&[x, y])
            .map(|footprint| {
                let id = footprint.data;
                ((self.surface_z(id, x, y) - z).abs(), id)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    /// Areas whose footprint touches the segment from `a` to `b`, in id
    /// order.
    pub fn areas_intersecting_segment(&self, a: (f64, f64), b: (f64, f64)) -> Vec<AreaId> {
        let envelope = AABB::from_corners([a.0, a.1], [b.0, b.1]);
        let mut hits: Vec<AreaId> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .map(|footprint| footprint.data)
            .filter(|&id| self.area(id).world.intersects_segment(a, b))
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut mesh: Self = serde_json::from_str(json)?;
        mesh.rebuild_index();
        Ok(mesh)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything produced by one build.
#[derive(Clone, Debug)]
pub struct NavBuild {
    pub grid: Grid,
    pub mesh: Mesh,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the navigation mesh for a level.
pub fn build_navigation<L: LevelGeometry + ?Sized>(
    level: &L,
    config: &NavConfig,
) -> NavResult<NavBuild> {
    config.validate()?;

    let mut builder = GridBuilder::new(level, config);
    builder.seed(&level.spawn_points(config)?)?;

    for teleporter in level.teleporters() {
        // Unresolvable destinations are reported when linking.
        if let Some((x, y)) = level.teleport_destination(teleporter) {
            let z = level.floor_z_at(x, y)?;
            builder.seed_teleport(teleporter.source, WorldPos::new(x, y, z))?;
        }
    }

    let (mut grid, mut diagnostics) = builder.expand()?;

    let mut compactor = Compactor::new(&mut grid, config);
    let packed = compactor.pack();
    let merges = compactor.merge();
    debug!(packed, merges, "compacted grid");
    let mut areas = compactor.finish();

    let connections = link(&grid, &mut areas);
    let planes = used_planes(&grid, &areas);
    let mut mesh = Mesh::new(grid.element_size, areas, connections, planes);
    link_teleports(level, config, &grid, &mut mesh, &mut diagnostics)?;

    info!(
        elements = grid.len(),
        areas = mesh.areas().len(),
        connections = mesh.connections().len(),
        diagnostics = diagnostics.len(),
        "navigation built"
    );

    Ok(NavBuild {
        grid,
        mesh,
        diagnostics: diagnostics.into_vec(),
    })
}

fn used_planes(grid: &Grid, areas: &[Area]) -> BTreeMap<PlaneKey, Plane> {
    areas
        .iter()
        .filter_map(|area| area.plane)
        .filter_map(|key| grid.plane(key).map(|plane| (key, *plane)))
        .collect()
}
