// Capsule collision probe.
//
// `Probe::probe(pos, radius, height)` answers "can a capsule of this size
// stand here?" against level geometry, returning the collision verdict and a
// `ProbeState` describing the tightest floor/ceiling envelope around the
// capsule's square footprint. The grid builder calls this once per candidate
// lattice cell.
//
// Resolution order:
// 1. The sector under the capsule center contributes its envelope. If the
//    sector has a vertical stack of sections (3D floors), the section whose
//    span contains the capsule bottom (or the bottom raised by
//    `step_height`) is used; otherwise the sector's own floor and ceiling.
//    Sloped floors and ceilings are sampled at the four footprint corners.
// 2. Every edge crossing the footprint either blocks (one-sided or flagged
//    `BLOCKING`) or contributes the envelope of the sector on each side.
// 3. Every thing with known dimensions overlapping the footprint acts as a
//    floor if the capsule could step onto its top, as a ceiling if the
//    capsule is wholly below it, and blocks otherwise.
// The envelope keeps the highest floor and the lowest ceiling seen.
//
// `ProbeState` is returned by value from each call, so callers never
// observe it being reused. Only the region query buffers are kept between
// calls.
//
// See also: `level.rs` for the queries used here, `grid.rs` for how the
// verdict and envelope drive the flood fill.

use crate::config::NavConfig;
use crate::error::NavResult;
use crate::geometry::{Plane, WorldRect};
use crate::level::{LevelGeometry, SectorFlags};
use crate::types::{EdgeId, SectorId, ThingId, WorldPos};

/// Result of one probe.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeState {
    pub pos: WorldPos,
    pub radius: f64,
    pub height: f64,
    /// Highest floor under the footprint.
    pub floor_z: f64,
    /// Lowest ceiling over the footprint.
    pub ceil_z: f64,
    /// An edge blocks the footprint.
    pub block_line: bool,
    /// A thing overlaps the capsule's vertical span.
    pub block_thing: bool,
    /// The floor plane is too steep to walk up.
    pub steep: bool,
    /// A contributing floor or ceiling can move during play.
    pub moves: bool,
    /// The special sector whose floor is under the capsule, if any.
    pub special_sector: Option<SectorId>,
    pub floor_plane: Option<Plane>,
}

impl ProbeState {
    fn new(pos: WorldPos, radius: f64, height: f64) -> Self {
        Self {
            pos,
            radius,
            height,
            floor_z: f64::NEG_INFINITY,
            ceil_z: f64::INFINITY,
            block_line: false,
            block_thing: false,
            steep: false,
            moves: false,
            special_sector: None,
            floor_plane: None,
        }
    }

    pub fn footprint(&self) -> WorldRect {
        WorldRect::around(self.pos.x, self.pos.y, self.radius)
    }

    pub fn top(&self) -> f64 {
        self.pos.z + self.height
    }
}

/// Collision tester bound to one level and config.
pub struct Probe<'a, L: LevelGeometry + ?Sized> {
    level: &'a L,
    config: &'a NavConfig,
    edges: Vec<EdgeId>,
    things: Vec<ThingId>,
}

impl<'a, L: LevelGeometry + ?Sized> Probe<'a, L> {
    pub fn new(level: &'a L, config: &'a NavConfig) -> Self {
        Self {
            level,
            config,
            edges: Vec::new(),
            things: Vec::new(),
        }
    }

    /// Test a capsule standing at `pos`. Returns `(collided, state)`.
    ///
    /// Fails only if the level names a sector it does not have.
    pub fn probe(
        &mut self,
        pos: WorldPos,
        radius: f64,
        height: f64,
    ) -> NavResult<(bool, ProbeState)> {
        let mut state = ProbeState::new(pos, radius, height);
        let base = self.level.locate_point(pos.x, pos.y);
        self.check_sector(&mut state, base)?;

        self.edges.clear();
        self.things.clear();
        let footprint = state.footprint();
        self.level
            .region_query(&footprint, &mut self.edges, &mut self.things);

        self.check_edges(&mut state, base)?;
        self.check_things(&mut state)?;

        let collided = if state.block_line || state.block_thing {
            true
        } else if state.top() > state.ceil_z {
            match state.special_sector {
                Some(id) => !self
                    .level
                    .sector(id)?
                    .flags
                    .contains(SectorFlags::CEILING_MOVES),
                None => true,
            }
        } else {
            state.pos.z < state.floor_z
        };

        Ok((collided, state))
    }

    fn check_edges(&self, state: &mut ProbeState, base: SectorId) -> NavResult<()> {
        let footprint = state.footprint();
        for &id in &self.edges {
            let Some(edge) = self.level.edges().get(id.index()) else {
                continue;
            };
            if !footprint.intersects_segment(edge.v1, edge.v2) {
                continue;
            }
            if edge.blocks() {
                state.block_line = true;
            }
            for side in [edge.front, edge.back].into_iter().flatten() {
                if side != base {
                    self.check_sector(state, side)?;
                }
            }
        }
        Ok(())
    }

    fn check_things(&self, state: &mut ProbeState) -> NavResult<()> {
        let footprint = state.footprint();
        let bottom = state.pos.z;
        let top = state.top();

        for &id in &self.things {
            let Some(thing) = self.level.things().get(id.index()) else {
                continue;
            };

            let (radius, height, hanging) = if self.config.bridge_custom_type == Some(thing.kind) {
                (f64::from(thing.args[0]), f64::from(thing.args[1]), false)
            } else if let Some(def) = self.config.thing_dimensions.get(&thing.kind) {
                (def.radius, def.height, def.hanging)
            } else {
                continue;
            };

            if !footprint.intersects(&WorldRect::around(thing.x, thing.y, radius)) {
                continue;
            }

            let thing_z = if hanging {
                self.level.ceil_z_at(thing.x, thing.y)? - height
            } else {
                self.level.floor_z_at(thing.x, thing.y)? + thing.z
            };
            let thing_top = thing_z + height;

            if bottom + self.config.step_height >= thing_top {
                state.floor_z = state.floor_z.max(thing_top);
                state.special_sector = None;
            } else if top <= thing_z {
                state.ceil_z = state.ceil_z.min(thing_z);
            } else {
                state.block_thing = true;
            }
        }
        Ok(())
    }

    /// Fold one sector's envelope into `state`.
    fn check_sector(&self, state: &mut ProbeState, id: SectorId) -> NavResult<()> {
        let level = self.level;
        let sector = level.sector(id)?;
        let (x, y, z) = (state.pos.x, state.pos.y, state.pos.z);
        let stepped = z + self.config.step_height;

        let mut floor_id = id;
        let mut ceil_id = id;
        for section in &sector.stack {
            let floor = level.floor_z(section.floor, x, y)?;
            let ceil = level.ceil_z(section.ceiling, x, y)?;
            if (z >= floor && z <= ceil) || (stepped >= floor && stepped <= ceil) {
                floor_id = section.floor;
                ceil_id = section.ceiling;
                break;
            }
        }

        let corners = state.footprint().corners();

        let floor_sector = level.sector(floor_id)?;
        let floor_z = match &floor_sector.floor_plane {
            Some(plane) => {
                if plane.is_steep(self.config.slope_steep) {
                    state.steep = true;
                }
                let mut highest = f64::NEG_INFINITY;
                for (cx, cy) in corners {
                    let z = if floor_id == id {
                        level.floor_z_at(cx, cy)?
                    } else {
                        plane.z_at(cx, cy)
                    };
                    highest = highest.max(z);
                }
                highest
            }
            None => floor_sector.floor_z,
        };

        let ceil_sector = level.sector(ceil_id)?;
        let ceil_z = match &ceil_sector.ceil_plane {
            Some(plane) => {
                let mut lowest = f64::INFINITY;
                for (cx, cy) in corners {
                    let z = if ceil_id == id {
                        level.ceil_z_at(cx, cy)?
                    } else {
                        plane.z_at(cx, cy)
                    };
                    lowest = lowest.min(z);
                }
                lowest
            }
            None => ceil_sector.ceil_z,
        };

        if floor_z >= state.floor_z && floor_sector.is_special() {
            state.special_sector = Some(floor_id);
        }
        if floor_sector.floor_plane.is_some() {
            state.floor_plane = floor_sector.floor_plane;
        }
        state.moves |= floor_sector.moves();

        state.floor_z = state.floor_z.max(floor_z);
        state.ceil_z = state.ceil_z.min(ceil_z);
        Ok(())
    }
}
