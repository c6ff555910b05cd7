// Connections between areas.
//
// A connection is a portal between two areas: a world rectangle the player
// crosses, the pair of areas it joins, and which ways it may be crossed.
//
// `link()` derives portals from the grid. For each area and direction, the
// member elements whose neighbor in that direction belongs to another area
// are grouped by (boundary line, neighbor area); each contiguous run of
// such elements along the line becomes one connection whose rectangle is
// the run's extent on the boundary line (zero thickness across it). When
// the neighbor area already holds an equal connection back, the missing
// direction bit is added to it instead of creating a duplicate, so a
// passage walkable both ways is one record with `AB | BA`.
//
// `link_teleports()` runs on the assembled `Mesh` and adds one-way
// `AB | TELEPORT` connections from every area crossed by a teleporter's
// trigger edge to the area at its destination. The crossed areas come from
// the mesh's spatial index. Bad teleporters are reported as diagnostics and
// skipped.
//
// See also: `area.rs` for the areas being linked, `mesh.rs` for the index,
// `pathfinding.rs` for how connections are traversed.

use crate::area::Area;
use crate::config::NavConfig;
use crate::error::{Diagnostic, Diagnostics, NavResult};
use crate::geometry::WorldRect;
use crate::grid::Grid;
use crate::level::LevelGeometry;
use crate::mesh::Mesh;
use crate::types::{AreaId, ConnectionFlags, ConnectionId, Direction, EdgeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A traversable link between two areas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub rect: WorldRect,
    pub area_a: AreaId,
    pub area_b: AreaId,
    pub flags: ConnectionFlags,
    /// Trigger edge of a teleport connection.
    pub source_edge: Option<EdgeId>,
}

impl Connection {
    pub fn center(&self) -> (f64, f64) {
        self.rect.center()
    }

    pub fn is_teleport(&self) -> bool {
        self.flags.contains(ConnectionFlags::TELEPORT)
    }

    /// The area this connection leads to when entered from `from`, if it
    /// may be crossed in that direction.
    pub fn destination_from(&self, from: AreaId) -> Option<AreaId> {
        if from == self.area_a && self.flags.contains(ConnectionFlags::AB) {
            Some(self.area_b)
        } else if from == self.area_b && self.flags.contains(ConnectionFlags::BA) {
            Some(self.area_a)
        } else {
            None
        }
    }
}

/// Build portals between adjacent areas. Element area ids must be current.
pub fn link(grid: &Grid, areas: &mut [Area]) -> Vec<Connection> {
    let mut connections: Vec<Connection> = Vec::new();
    let size = grid.element_size;

    for index in 0..areas.len() {
        let from = AreaId::from_index(index);
        for dir in Direction::ALL {
            // (boundary line, neighbor area) -> positions along the line.
            let mut runs: BTreeMap<(i32, AreaId), Vec<i32>> = BTreeMap::new();
            for &member in &areas[index].elements {
                let element = grid.element(member);
                let Some(neighbor) = element.neighbor(dir) else {
                    continue;
                };
                let Some(to) = grid.element(neighbor).area else {
                    continue;
                };
                if to == from {
                    continue;
                }
                let (line, along) = match dir {
                    Direction::North => (element.y + 1, element.x),
                    Direction::South => (element.y, element.x),
                    Direction::East => (element.x + 1, element.y),
                    Direction::West => (element.x, element.y),
                };
                runs.entry((line, to)).or_default().push(along);
            }

            for ((line, to), mut positions) in runs {
                positions.sort_unstable();
                positions.dedup();
                let mut start = 0;
                for i in 1..=positions.len() {
                    if i < positions.len() && positions[i] == positions[i - 1] + 1 {
                        continue;
                    }
                    let rect = portal_rect(dir, line, positions[start], positions[i - 1], size);
                    add_portal(&mut connections, areas, from, to, rect);
                    start = i;
                }
            }
        }
    }

    let bidirectional = connections
        .iter()
        .filter(|c| c.flags.contains(ConnectionFlags::AB | ConnectionFlags::BA))
        .count();
    tracing::info!(
        connections = connections.len(),
        bidirectional,
        "linked areas"
    );
    connections
}

/// The world rectangle on boundary `line` covering cells `first..=last`.
fn portal_rect(dir: Direction, line: i32, first: i32, last: i32, size: f64) -> WorldRect {
    let at = f64::from(line) * size;
    let lo = f64::from(first) * size;
    let hi = f64::from(last + 1) * size;
    if dir.is_horizontal() {
        WorldRect::new(at, lo, at, hi)
    } else {
        WorldRect::new(lo, at, hi, at)
    }
}

fn add_portal(
    connections: &mut Vec<Connection>,
    areas: &mut [Area],
    from: AreaId,
    to: AreaId,
    rect: WorldRect,
) {
    let existing = areas[to.index()].connections.iter().copied().find(|&id| {
        let c = &connections[id.index()];
        c.area_a == to && c.area_b == from && c.rect == rect && !c.is_teleport()
    });
    if let Some(id) = existing {
        connections[id.index()].flags |= ConnectionFlags::BA;
        return;
    }

    let id = ConnectionId::from_index(connections.len());
    connections.push(Connection {
        rect,
        area_a: from,
        area_b: to,
        flags: ConnectionFlags::AB,
        source_edge: None,
    });
    areas[from.index()].connections.push(id);
    areas[to.index()].connections.push(id);
}

/// The area owning the element in the cell under (x, y) whose height is
/// closest to `z`, within `tolerance`.
pub fn area_near(grid: &Grid, x: f64, y: f64, z: f64, tolerance: f64) -> Option<AreaId> {
    let (cx, cy) = grid.cell_of(x, y);
    grid.column(cx, cy)
        .iter()
        .filter_map(|&id| {
            let element = grid.element(id);
            let dz = (grid.surface_z(id, x, y) - z).abs();
            (dz <= tolerance).then_some((dz, element.area?))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, area)| area)
}

/// Add one-way teleport connections for every teleporter in the level.
/// Returns the number of connections created.
pub fn link_teleports<L: LevelGeometry + ?Sized>(
    level: &L,
    config: &NavConfig,
    grid: &Grid,
    mesh: &mut Mesh,
    diagnostics: &mut Diagnostics,
) -> NavResult<usize> {
    let mut created = 0;
    for teleporter in level.teleporters() {
        let edge_id = teleporter.source;
        let Some(edge) = level.edges().get(edge_id.index()) else {
            diagnostics.push(Diagnostic::DanglingTeleport { edge: edge_id });
            continue;
        };
        let Some((x, y)) = level.teleport_destination(teleporter) else {
            diagnostics.push(Diagnostic::DanglingTeleport { edge: edge_id });
            continue;
        };
        let z = level.floor_z_at(x, y)?;
        let Some(destination) = area_near(grid, x, y, z, config.step_height) else {
            diagnostics.push(Diagnostic::TeleportWithoutArea { edge: edge_id, x, y });
            continue;
        };

        let rect = edge.bounds();
        for source in mesh.areas_intersecting_segment(edge.v1, edge.v2) {
            if source == destination {
                continue;
            }
            mesh.push_connection(Connection {
                rect,
                area_a: source,
                area_b: destination,
                flags: ConnectionFlags::AB | ConnectionFlags::TELEPORT,
                source_edge: Some(edge_id),
            });
            created += 1;
        }
    }

    tracing::info!(
        teleporters = level.teleporters().len(),
        connections = created,
        "linked teleporters"
    );
    Ok(created)
}
