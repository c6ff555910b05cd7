// The level geometry seam.
//
// `LevelGeometry` is everything the navigation builders need to know about a
// level: point location (which sector contains a 2D point), floor and
// ceiling heights (honoring sloped planes), the vertical stack of sections
// inside a sector (3D floors), region queries over edges and things, and
// teleporter resolution. Parsing a level's on-disk format, building its BSP
// and building its blockmap all happen behind this trait.
//
// The data types exposed through the seam are plain tables indexed by the
// ids in `types.rs`: `Sector`, `Edge`, `Thing`, `Teleporter`. Sector flags
// (damage, moving floors, ignore) only take effect on sectors that also
// carry `SectorFlags::SPECIAL`.
//
// Sector ids coming out of the provider (point location, edge sides, stack
// sections) are checked against `sectors().len()` on every access through
// `sector()`. An out-of-range id means the provider is broken, and is fatal.
//
// See also: `level_map.rs` for the in-memory implementation, `probe.rs` for
// the only consumer of the height queries.

use crate::config::NavConfig;
use crate::error::{NavError, NavResult};
use crate::geometry::{Plane, WorldRect};
use crate::types::{EdgeId, SectorId, ThingId, WorldPos};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SectorFlags: u8 {
        /// Has gameplay effects (damage, movement); may own elements.
        const SPECIAL = 0x01;
        const FLOOR_MOVES = 0x02;
        const CEILING_MOVES = 0x04;
        /// Elements must not be placed on this sector's floor.
        const IGNORE = 0x08;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EdgeFlags: u8 {
        /// Impassable even though two-sided.
        const BLOCKING = 0x01;
    }
}

/// One walkable gap in a sector's vertical stack: the floor surface of
/// `floor` below and the ceiling surface of `ceiling` above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub floor: SectorId,
    pub ceiling: SectorId,
}

/// A convex floor/ceiling region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub floor_z: f64,
    pub ceil_z: f64,
    #[serde(default)]
    pub floor_plane: Option<Plane>,
    #[serde(default)]
    pub ceil_plane: Option<Plane>,
    #[serde(default)]
    pub flags: SectorFlags,
    /// Damage per hit dealt to a player standing on the floor.
    #[serde(default)]
    pub damage: i32,
    /// Vertically stacked sections, bottom first. Empty for a plain sector,
    /// which is a single gap between its own floor and ceiling.
    #[serde(default)]
    pub stack: Vec<Section>,
}

impl Sector {
    pub fn flat(floor_z: f64, ceil_z: f64) -> Self {
        Self {
            floor_z,
            ceil_z,
            floor_plane: None,
            ceil_plane: None,
            flags: SectorFlags::empty(),
            damage: 0,
            stack: Vec::new(),
        }
    }

    pub fn floor_at(&self, x: f64, y: f64) -> f64 {
        match &self.floor_plane {
            Some(plane) => plane.z_at(x, y),
            None => self.floor_z,
        }
    }

    pub fn ceil_at(&self, x: f64, y: f64) -> f64 {
        match &self.ceil_plane {
            Some(plane) => plane.z_at(x, y),
            None => self.ceil_z,
        }
    }

    pub fn is_special(&self) -> bool {
        self.flags.contains(SectorFlags::SPECIAL)
    }

    /// Floor or ceiling can move during play.
    pub fn moves(&self) -> bool {
        self.flags
            .intersects(SectorFlags::FLOOR_MOVES | SectorFlags::CEILING_MOVES)
    }
}

/// A 2D boundary segment. A missing side means the edge is a solid wall.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub v1: (f64, f64),
    pub v2: (f64, f64),
    pub front: Option<SectorId>,
    #[serde(default)]
    pub back: Option<SectorId>,
    #[serde(default)]
    pub flags: EdgeFlags,
}

impl Edge {
    pub fn is_two_sided(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }

    pub fn blocks(&self) -> bool {
        !self.is_two_sided() || self.flags.contains(EdgeFlags::BLOCKING)
    }

    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.v1.0 + self.v2.0) * 0.5,
            (self.v1.1 + self.v2.1) * 0.5,
        )
    }

    pub fn bounds(&self) -> WorldRect {
        WorldRect::new(self.v1.0, self.v1.1, self.v2.0, self.v2.1)
    }
}

/// A placed point-object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub x: f64,
    pub y: f64,
    /// Height above the floor at (x, y).
    #[serde(default)]
    pub z: f64,
    pub kind: u16,
    #[serde(default)]
    pub args: [i32; 5],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeleportDestination {
    /// Lands on a destination thing.
    Thing(ThingId),
    /// Lands on the midpoint of a destination edge.
    Edge(EdgeId),
}

/// A teleport trigger edge and where it sends the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teleporter {
    pub source: EdgeId,
    pub destination: TeleportDestination,
}

/// Read-only geometry queries over one level.
pub trait LevelGeometry {
    fn sectors(&self) -> &[Sector];

    fn edges(&self) -> &[Edge];

    fn things(&self) -> &[Thing];

    fn teleporters(&self) -> &[Teleporter];

    /// Bounding box of all level geometry.
    fn bounds(&self) -> WorldRect;

    /// The sector containing (x, y). Every point resolves to some sector.
    fn locate_point(&self, x: f64, y: f64) -> SectorId;

    /// Append the edges and things that may overlap `rect` to the output
    /// buffers, each at most once.
    fn region_query(&self, rect: &WorldRect, edges: &mut Vec<EdgeId>, things: &mut Vec<ThingId>);

    fn sector(&self, id: SectorId) -> NavResult<&Sector> {
        let sectors = self.sectors();
        sectors.get(id.index()).ok_or(NavError::SectorOutOfRange {
            sector: id.0,
            sector_count: sectors.len(),
        })
    }

    fn floor_z(&self, id: SectorId, x: f64, y: f64) -> NavResult<f64> {
        Ok(self.sector(id)?.floor_at(x, y))
    }

    fn ceil_z(&self, id: SectorId, x: f64, y: f64) -> NavResult<f64> {
        Ok(self.sector(id)?.ceil_at(x, y))
    }

    fn floor_z_at(&self, x: f64, y: f64) -> NavResult<f64> {
        self.floor_z(self.locate_point(x, y), x, y)
    }

    fn ceil_z_at(&self, x: f64, y: f64) -> NavResult<f64> {
        self.ceil_z(self.locate_point(x, y), x, y)
    }

    /// Where a teleporter lands, or `None` if it points at nothing.
    fn teleport_destination(&self, teleporter: &Teleporter) -> Option<(f64, f64)> {
        match teleporter.destination {
            TeleportDestination::Thing(id) => self.things().get(id.index()).map(|t| (t.x, t.y)),
            TeleportDestination::Edge(id) => self.edges().get(id.index()).map(Edge::midpoint),
        }
    }

    /// Player starts: things of the configured start types, on the floor
    /// under them. In thing order.
    fn spawn_points(&self, config: &NavConfig) -> NavResult<Vec<WorldPos>> {
        self.things()
            .iter()
            .filter(|thing| config.start_thing_types.contains(&thing.kind))
            .map(|thing| Ok(WorldPos::new(thing.x, thing.y, self.floor_z_at(thing.x, thing.y)?)))
            .collect()
    }
}
