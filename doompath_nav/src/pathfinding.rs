// A* pathfinding over the navigation mesh.
//
// Nodes are areas; edges are the connections an area may be left through.
// Each node remembers the point where the search entered it (the start
// point for the first area, otherwise the center of the connection crossed
// to reach it). Crossing a connection costs the distance from that entry
// point to the connection's center, scaled by the hazard multiplier of the
// area being entered. Teleport connections cost nothing.
//
// The open set is a `BinaryHeap` with reversed ordering, and scores live in
// `Vec`s indexed by `AreaId`. Stale heap entries are skipped on pop, and a
// closed area is never expanded again. The heuristic is the straight-line
// distance from a node's entry point to the goal point. Hazard multipliers
// are at least 1, so it never overestimates a walk; a teleport can make it
// overestimate, which costs optimality but not correctness.
//
// See also: `mesh.rs` for the `Mesh` being searched, `config.rs` for the
// hazard multipliers.
//
// **Critical constraint: determinism.** Ties in the open set break on area
// id and connections are visited in each area's stored order, so a search
// is a pure function of the mesh and its endpoints.

use crate::config::NavConfig;
use crate::mesh::Mesh;
use crate::types::{AreaId, ConnectionId, WorldPos};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// The result of a successful search.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Areas from start to goal, inclusive.
    pub areas: Vec<AreaId>,
    /// Connection crossed at each step (len = areas.len() - 1).
    pub connections: Vec<ConnectionId>,
    /// Total traversal cost.
    pub cost: f64,
    /// Number of areas expanded by the search.
    pub expanded: usize,
}

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    area: AreaId,
    f_score: f64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.area == other.area
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.area.cmp(&self.area))
    }
}

/// Searches one mesh with one config.
pub struct Pathfinder<'m> {
    mesh: &'m Mesh,
    config: &'m NavConfig,
}

impl<'m> Pathfinder<'m> {
    pub fn new(mesh: &'m Mesh, config: &'m NavConfig) -> Self {
        Self { mesh, config }
    }

    /// Find the cheapest route between two world points.
    ///
    /// Returns `None` if either point lies outside every area's footprint
    /// or no route exists. When both points resolve to the same area the
    /// path is that single area with zero cost.
    pub fn find(&self, start: WorldPos, end: WorldPos) -> Option<PathResult> {
        let mesh = self.mesh;
        let start_area = mesh.area_at(start.x, start.y, start.z)?;
        let goal = mesh.area_at(end.x, end.y, end.z)?;
        if start_area == goal {
            return Some(PathResult {
                areas: vec![start_area],
                connections: Vec::new(),
                cost: 0.0,
                expanded: 0,
            });
        }

        let n = mesh.areas().len();
        let goal_point = (end.x, end.y);
        // g_score[area] = cost of cheapest known path from start to area.
        let mut g_score = vec![f64::INFINITY; n];
        // came_from[area] = (previous area, connection crossed to get there).
        let mut came_from: Vec<Option<(AreaId, ConnectionId)>> = vec![None; n];
        let mut entry = vec![(start.x, start.y); n];
        let mut closed = vec![false; n];
        let mut expanded = 0;

        g_score[start_area.index()] = 0.0;
        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            area: start_area,
            f_score: distance(entry[start_area.index()], goal_point),
        });

        while let Some(current) = open.pop() {
            let ci = current.area.index();
            if closed[ci] {
                continue;
            }
            if current.area == goal {
                return Some(reconstruct_path(
                    &came_from,
                    start_area,
                    goal,
                    g_score[ci],
                    expanded,
                ));
            }
            closed[ci] = true;
            expanded += 1;

            let current_g = g_score[ci];
            for &connection_id in &mesh.area(current.area).connections {
                let connection = mesh.connection(connection_id);
                let Some(next) = connection.destination_from(current.area) else {
                    continue;
                };
                let ni = next.index();
                if closed[ni] {
                    continue;
                }

                let center = connection.center();
                let step = if connection.is_teleport() {
                    0.0
                } else {
                    distance(entry[ci], center)
                        * self.config.hazard_multiplier(mesh.area(next).flags)
                };
                let tentative_g = current_g + step;

                if tentative_g < g_score[ni] {
                    g_score[ni] = tentative_g;
                    came_from[ni] = Some((current.area, connection_id));
                    entry[ni] = center;
                    open.push(OpenEntry {
                        area: next,
                        f_score: tentative_g + distance(center, goal_point),
                    });
                }
            }
        }

        None
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

fn reconstruct_path(
    came_from: &[Option<(AreaId, ConnectionId)>],
    start: AreaId,
    goal: AreaId,
    cost: f64,
    expanded: usize,
) -> PathResult {
    let mut areas = vec![goal];
    let mut connections = Vec::new();
    let mut current = goal;

    while current != start {
        match came_from[current.index()] {
            Some((prev, connection)) => {
                areas.push(prev);
                connections.push(connection);
                current = prev;
            }
            None => break,
        }
    }

    areas.reverse();
    connections.reverse();
    PathResult {
        areas,
        connections,
        cost,
        expanded,
    }
}
