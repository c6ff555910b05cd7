// In-memory level provider.
//
// `LevelMap` implements `LevelGeometry` from explicit tables: sectors with a
// polygon outline, edges, things and teleporters. It is what the `navgen`
// tool loads from a JSON level description and what the tests build with
// `LevelBuilder`.
//
// Point location tests the sector outlines in index order and falls back to
// the nearest outline, so every point resolves to some sector, the way a BSP
// leaf lookup always does. Region queries go through a uniform blockmap of
// `BLOCK_SIZE` cells stored as a flat `Vec` indexed `x + y * width` (same
// layout as a dense voxel grid). Edges are registered in every cell their
// segment crosses. Things are bucketed by their center only and found with a
// `THING_MARGIN` margin, so thing radii above the margin may be missed.
//
// The blockmap is derived data: it is not serialized and is rebuilt when a
// level is deserialized.
//
// See also: `level.rs` for the trait and table types.

use crate::error::{NavError, NavResult};
use crate::geometry::{WorldRect, distance_to_polygon, point_in_polygon};
use crate::level::{
    Edge, EdgeFlags, LevelGeometry, Sector, SectorFlags, TeleportDestination, Teleporter, Thing,
};
use crate::types::{EdgeId, SectorId, ThingId};
use serde::{Deserialize, Serialize};

/// Blockmap cell size in map units.
pub const BLOCK_SIZE: f64 = 128.0;

/// Extra reach when looking up things, covering their radius.
pub const THING_MARGIN: f64 = 64.0;

/// A sector plus its 2D outline, as stored in a level description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorShape {
    pub outline: Vec<(f64, f64)>,
    #[serde(flatten)]
    pub sector: Sector,
}

/// Serialized form of a `LevelMap`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelDescription {
    pub sectors: Vec<SectorShape>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub things: Vec<Thing>,
    #[serde(default)]
    pub teleporters: Vec<Teleporter>,
}

#[derive(Clone, Debug, Default)]
struct Blockmap {
    origin: (f64, f64),
    width: usize,
    height: usize,
    edges: Vec<Vec<EdgeId>>,
    things: Vec<Vec<ThingId>>,
}

impl Blockmap {
    fn build(bounds: &WorldRect, edges: &[Edge], things: &[Thing]) -> Self {
        let origin = (
            (bounds.x1 / BLOCK_SIZE).floor() * BLOCK_SIZE,
            (bounds.y1 / BLOCK_SIZE).floor() * BLOCK_SIZE,
        );
        let width = ((bounds.x2 - origin.0) / BLOCK_SIZE).floor() as usize + 1;
        let height = ((bounds.y2 - origin.1) / BLOCK_SIZE).floor() as usize + 1;
        let mut map = Self {
            origin,
            width,
            height,
            edges: vec![Vec::new(); width * height],
            things: vec![Vec::new(); width * height],
        };

        for (index, edge) in edges.iter().enumerate() {
            let id = EdgeId::from_index(index);
            if let Some((x1, y1, x2, y2)) = map.cell_range(&edge.bounds()) {
                for y in y1..=y2 {
                    for x in x1..=x2 {
                        if map.cell_rect(x, y).intersects_segment(edge.v1, edge.v2) {
                            let cell = x + y * width;
                            map.edges[cell].push(id);
                        }
                    }
                }
            }
        }

        for (index, thing) in things.iter().enumerate() {
            let point = WorldRect::new(thing.x, thing.y, thing.x, thing.y);
            if let Some((x, y, _, _)) = map.cell_range(&point) {
                let cell = x + y * width;
                map.things[cell].push(ThingId::from_index(index));
            }
        }

        map
    }

    fn cell_rect(&self, x: usize, y: usize) -> WorldRect {
        let x1 = self.origin.0 + x as f64 * BLOCK_SIZE;
        let y1 = self.origin.1 + y as f64 * BLOCK_SIZE;
        WorldRect::new(x1, y1, x1 + BLOCK_SIZE, y1 + BLOCK_SIZE)
    }

    /// Inclusive cell range covering `rect`, clamped to the map. `None` if
    /// the rectangle misses the map entirely.
    fn cell_range(&self, rect: &WorldRect) -> Option<(usize, usize, usize, usize)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let to_cell = |v: f64, origin: f64| ((v - origin) / BLOCK_SIZE).floor();
        let x1 = to_cell(rect.x1, self.origin.0);
        let y1 = to_cell(rect.y1, self.origin.1);
        let x2 = to_cell(rect.x2, self.origin.0);
        let y2 = to_cell(rect.y2, self.origin.1);
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        if x2 < 0.0 || y2 < 0.0 || x1 > max_x || y1 > max_y {
            return None;
        }
        Some((
            x1.max(0.0) as usize,
            y1.max(0.0) as usize,
            x2.min(max_x) as usize,
            y2.min(max_y) as usize,
        ))
    }
}

/// A level held entirely in memory.
#[derive(Clone, Debug)]
pub struct LevelMap {
    sectors: Vec<Sector>,
    outlines: Vec<Vec<(f64, f64)>>,
    edges: Vec<Edge>,
    things: Vec<Thing>,
    teleporters: Vec<Teleporter>,
    bounds: WorldRect,
    blockmap: Blockmap,
}

impl LevelMap {
    /// Validate a description and build the blockmap for it.
    pub fn from_description(description: LevelDescription) -> NavResult<Self> {
        let LevelDescription {
            sectors: shapes,
            edges,
            things,
            teleporters,
        } = description;

        let sector_count = shapes.len();
        let mut sectors = Vec::with_capacity(sector_count);
        let mut outlines = Vec::with_capacity(sector_count);
        for (index, shape) in shapes.into_iter().enumerate() {
            if shape.outline.len() < 3 {
                return Err(NavError::InvalidLevel(format!(
                    "sector {index} outline has {} points, needs at least 3",
                    shape.outline.len()
                )));
            }
            let mut sector = shape.sector;
            // Effects only apply to special sectors.
            if sector.damage > 0
                || sector.flags.intersects(
                    SectorFlags::FLOOR_MOVES | SectorFlags::CEILING_MOVES | SectorFlags::IGNORE,
                )
            {
                sector.flags |= SectorFlags::SPECIAL;
            }
            sectors.push(sector);
            outlines.push(shape.outline);
        }

        for (index, edge) in edges.iter().enumerate() {
            if edge.front.is_none() && edge.back.is_none() {
                return Err(NavError::InvalidLevel(format!("edge {index} has no sides")));
            }
            for side in [edge.front, edge.back].into_iter().flatten() {
                if side.index() >= sector_count {
                    return Err(NavError::SectorOutOfRange {
                        sector: side.0,
                        sector_count,
                    });
                }
            }
        }

        let bounds = outlines
            .iter()
            .flatten()
            .copied()
            .chain(edges.iter().flat_map(|e| [e.v1, e.v2]))
            .fold(None, |acc: Option<WorldRect>, (x, y)| {
                let point = WorldRect::new(x, y, x, y);
                Some(acc.map_or(point, |r| r.union(&point)))
            })
            .unwrap_or_default();

        let blockmap = Blockmap::build(&bounds, &edges, &things);

        Ok(Self {
            sectors,
            outlines,
            edges,
            things,
            teleporters,
            bounds,
            blockmap,
        })
    }

    pub fn from_json(json: &str) -> NavResult<Self> {
        let description: LevelDescription = serde_json::from_str(json)?;
        Self::from_description(description)
    }

    pub fn to_description(&self) -> LevelDescription {
        LevelDescription {
            sectors: self
                .sectors
                .iter()
                .zip(&self.outlines)
                .map(|(sector, outline)| SectorShape {
                    outline: outline.clone(),
                    sector: sector.clone(),
                })
                .collect(),
            edges: self.edges.clone(),
            things: self.things.clone(),
            teleporters: self.teleporters.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_description())
    }
}

impl LevelGeometry for LevelMap {
    fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn things(&self) -> &[Thing] {
        &self.things
    }

    fn teleporters(&self) -> &[Teleporter] {
        &self.teleporters
    }

    fn bounds(&self) -> WorldRect {
        self.bounds
    }

    fn locate_point(&self, x: f64, y: f64) -> SectorId {
        if let Some(index) = self
            .outlines
            .iter()
            .position(|outline| point_in_polygon(x, y, outline))
        {
            return SectorId::from_index(index);
        }

        let mut best = (f64::INFINITY, 0);
        for (index, outline) in self.outlines.iter().enumerate() {
            let distance = distance_to_polygon((x, y), outline);
            if distance < best.0 {
                best = (distance, index);
            }
        }
        SectorId::from_index(best.1)
    }

    fn region_query(&self, rect: &WorldRect, edges: &mut Vec<EdgeId>, things: &mut Vec<ThingId>) {
        let map = &self.blockmap;

        let edge_start = edges.len();
        if let Some((x1, y1, x2, y2)) = map.cell_range(rect) {
            for y in y1..=y2 {
                for x in x1..=x2 {
                    edges.extend_from_slice(&map.edges[x + y * map.width]);
                }
            }
        }
        edges[edge_start..].sort_unstable();
        let mut tail = edges.split_off(edge_start);
        tail.dedup();
        edges.extend(tail);

        if let Some((x1, y1, x2, y2)) = map.cell_range(&rect.expanded(THING_MARGIN)) {
            for y in y1..=y2 {
                for x in x1..=x2 {
                    things.extend_from_slice(&map.things[x + y * map.width]);
                }
            }
        }
    }
}

impl Serialize for LevelMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_description().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LevelMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let description = LevelDescription::deserialize(deserializer)?;
        Self::from_description(description).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// LevelBuilder
// ---------------------------------------------------------------------------

/// Incremental construction of a `LevelMap`.
#[derive(Clone, Debug, Default)]
pub struct LevelBuilder {
    description: LevelDescription,
}

impl LevelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sector(&mut self, outline: Vec<(f64, f64)>, sector: Sector) -> SectorId {
        self.description.sectors.push(SectorShape { outline, sector });
        SectorId::from_index(self.description.sectors.len() - 1)
    }

    /// An axis-aligned rectangular sector. Adds no edges.
    pub fn add_room(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, sector: Sector) -> SectorId {
        self.add_sector(vec![(x1, y1), (x2, y1), (x2, y2), (x1, y2)], sector)
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        self.description.edges.push(edge);
        EdgeId::from_index(self.description.edges.len() - 1)
    }

    /// A one-sided (solid) edge.
    pub fn add_wall(&mut self, v1: (f64, f64), v2: (f64, f64), front: SectorId) -> EdgeId {
        self.add_edge(Edge {
            v1,
            v2,
            front: Some(front),
            back: None,
            flags: EdgeFlags::empty(),
        })
    }

    /// A two-sided, passable edge.
    pub fn add_portal(
        &mut self,
        v1: (f64, f64),
        v2: (f64, f64),
        front: SectorId,
        back: SectorId,
    ) -> EdgeId {
        self.add_edge(Edge {
            v1,
            v2,
            front: Some(front),
            back: Some(back),
            flags: EdgeFlags::empty(),
        })
    }

    /// Walls along all four sides of a rectangle.
    pub fn add_box_walls(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, front: SectorId) {
        self.add_wall((x1, y1), (x2, y1), front);
        self.add_wall((x2, y1), (x2, y2), front);
        self.add_wall((x2, y2), (x1, y2), front);
        self.add_wall((x1, y2), (x1, y1), front);
    }

    pub fn add_thing(&mut self, thing: Thing) -> ThingId {
        self.description.things.push(thing);
        ThingId::from_index(self.description.things.len() - 1)
    }

    /// A thing of type `kind` at (x, y) with no args.
    pub fn add_thing_at(&mut self, kind: u16, x: f64, y: f64) -> ThingId {
        self.add_thing(Thing {
            x,
            y,
            z: 0.0,
            kind,
            args: [0; 5],
        })
    }

    pub fn add_teleporter(&mut self, source: EdgeId, destination: TeleportDestination) {
        self.description.teleporters.push(Teleporter {
            source,
            destination,
        });
    }

    pub fn build(self) -> NavResult<LevelMap> {
        LevelMap::from_description(self.description)
    }
}
