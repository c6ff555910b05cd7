// Walkability grid: flood fill over a 2D lattice.
//
// The level is sampled on a lattice of square cells `element_size` wide
// (player radius divided by the resolution). Cell `(x, y)` covers world
// `[x*s, (x+1)*s) x [y*s, (y+1)*s)` and is probed at its center. A cell can
// hold several elements at different heights (a bridge over a corridor, 3D
// floors), so elements are addressed by `(x, y, z)` where `z` is the
// resolved floor height rounded to an integer.
//
// Storage is an arena: `Grid::elements` is a `Vec<Element>` indexed by
// `ElementId`, with neighbor links stored as ids. A hashed column index maps
// `(x, y)` to the ids in that cell; it is derived data, skipped by serde and
// rebuilt on load.
//
// `GridBuilder` seeds the fill from start spots and teleport destinations,
// then expands breadth-first: each element probes its four lattice
// neighbors, stepping up, jumping or dropping as the movement tolerances
// allow. Rejected directions are counted per `Rejection` reason. Drops
// higher than the player can climb back produce one-way links; those are
// removed after the fill so every link in the finished grid is mutual.
//
// See also: `probe.rs` for the collision test, `area.rs` which packs the
// finished grid into areas.
//
// **Critical constraint: determinism.** The work queue is FIFO and
// directions are always tried in `Direction::ALL` order, so the same level
// and config always produce the same element ids.

use crate::config::NavConfig;
use crate::error::{Diagnostic, Diagnostics, NavResult};
use crate::geometry::{Plane, PlaneKey};
use crate::level::{LevelGeometry, SectorFlags};
use crate::probe::{Probe, ProbeState};
use crate::types::{AreaId, Direction, EdgeId, ElementFlags, ElementId, SectorId, WorldPos};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, VecDeque};

/// Elements added between two flood fill progress lines.
const PROGRESS_INTERVAL: usize = 5000;

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// One walkable sample of the lattice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Neighbor ids indexed by `Direction::index()`.
    pub neighbors: [Option<ElementId>; 4],
    pub flags: ElementFlags,
    /// Set only when the floor under the element can move.
    pub special_sector: Option<SectorId>,
    pub plane: Option<PlaneKey>,
    /// Owning area, assigned once by the compactor.
    #[serde(skip)]
    pub area: Option<AreaId>,
}

impl Element {
    pub(crate) fn new(x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            neighbors: [None; 4],
            flags: ElementFlags::empty(),
            special_sector: None,
            plane: None,
            area: None,
        }
    }

    pub fn neighbor(&self, dir: Direction) -> Option<ElementId> {
        self.neighbors[dir.index()]
    }

    /// Same special sector, same flags, and same surface: the same plane if
    /// either is sloped, the same height if both are flat.
    pub fn is_similar(&self, other: &Element) -> bool {
        if self.special_sector != other.special_sector || self.flags != other.flags {
            return false;
        }
        match (self.plane, other.plane) {
            (None, None) => self.z == other.z,
            (a, b) => a == b,
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Why a flood-fill direction was not followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    Leak,
    BlockLine,
    BlockThing,
    Ignore,
    TooHigh,
    SlopeTooSteep,
    CannotFit,
}

impl Rejection {
    pub const ALL: [Rejection; 7] = [
        Rejection::Leak,
        Rejection::BlockLine,
        Rejection::BlockThing,
        Rejection::Ignore,
        Rejection::TooHigh,
        Rejection::SlopeTooSteep,
        Rejection::CannotFit,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Flood-fill bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    pub seeds: usize,
    rejections: [u64; 7],
    pub one_way_links_removed: usize,
}

impl GridStats {
    pub fn rejections(&self, reason: Rejection) -> u64 {
        self.rejections[reason.index()]
    }

    fn reject(&mut self, reason: Rejection) {
        self.rejections[reason.index()] += 1;
    }
}

/// The finished walkability grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    pub element_size: f64,
    pub element_height: f64,
    elements: Vec<Element>,
    planes: BTreeMap<PlaneKey, Plane>,
    pub stats: GridStats,
    #[serde(skip)]
    columns: FxHashMap<(i32, i32), SmallVec<[ElementId; 2]>>,
}

impl Grid {
    pub fn new(element_size: f64, element_height: f64) -> Self {
        Self {
            element_size,
            element_height,
            elements: Vec::new(),
            planes: BTreeMap::new(),
            stats: GridStats::default(),
            columns: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.index()]
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        (0..self.elements.len()).map(ElementId::from_index)
    }

    /// Element ids in cell (x, y), in creation order.
    pub fn column(&self, x: i32, y: i32) -> &[ElementId] {
        self.columns.get(&(x, y)).map_or(&[], |ids| ids.as_slice())
    }

    pub fn element_at(&self, x: i32, y: i32, z: i32) -> Option<ElementId> {
        self.column(x, y)
            .iter()
            .copied()
            .find(|&id| self.elements[id.index()].z == z)
    }

    pub fn plane(&self, key: PlaneKey) -> Option<&Plane> {
        self.planes.get(&key)
    }

    pub fn planes(&self) -> &BTreeMap<PlaneKey, Plane> {
        &self.planes
    }

    /// Lattice cell containing a world point.
    pub fn cell_of(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.element_size).floor() as i32,
            (y / self.element_size).floor() as i32,
        )
    }

    pub fn cell_center(&self, x: i32, y: i32) -> (f64, f64) {
        (
            (f64::from(x) + 0.5) * self.element_size,
            (f64::from(y) + 0.5) * self.element_size,
        )
    }

    /// Height of an element's surface at a world point.
    pub fn surface_z(&self, id: ElementId, x: f64, y: f64) -> f64 {
        let element = self.element(id);
        match element.plane.and_then(|key| self.planes.get(&key)) {
            Some(plane) => plane.z_at(x, y),
            None => f64::from(element.z),
        }
    }

    /// True if every neighbor link has a matching link back.
    pub fn links_are_mutual(&self) -> bool {
        self.ids().all(|id| {
            Direction::ALL.iter().all(|&dir| match self.element(id).neighbor(dir) {
                Some(other) => self.element(other).neighbor(dir.opposite()) == Some(id),
                None => true,
            })
        })
    }

    pub(crate) fn add_element(&mut self, element: Element) -> ElementId {
        let id = ElementId::from_index(self.elements.len());
        self.columns
            .entry((element.x, element.y))
            .or_default()
            .push(id);
        self.elements.push(element);
        id
    }

    fn intern_plane(&mut self, plane: Plane) -> PlaneKey {
        let key = plane.key();
        self.planes.entry(key).or_insert(plane);
        key
    }

    fn rebuild_index(&mut self) {
        self.columns.clear();
        for (index, element) in self.elements.iter().enumerate() {
            self.columns
                .entry((element.x, element.y))
                .or_default()
                .push(ElementId::from_index(index));
        }
    }

    /// Drop every link whose target does not link back.
    fn remove_one_way_links(&mut self) -> usize {
        let mut removed = 0;
        for index in 0..self.elements.len() {
            let id = ElementId::from_index(index);
            for dir in Direction::ALL {
                let Some(other) = self.elements[index].neighbor(dir) else {
                    continue;
                };
                if self.elements[other.index()].neighbor(dir.opposite()) != Some(id) {
                    self.elements[index].neighbors[dir.index()] = None;
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut grid: Self = serde_json::from_str(json)?;
        grid.rebuild_index();
        Ok(grid)
    }
}

// ---------------------------------------------------------------------------
// GridBuilder
// ---------------------------------------------------------------------------

/// Breadth-first flood fill producing a `Grid`.
pub struct GridBuilder<'a, L: LevelGeometry + ?Sized> {
    level: &'a L,
    config: &'a NavConfig,
    probe: Probe<'a, L>,
    grid: Grid,
    queue: VecDeque<ElementId>,
    diagnostics: Diagnostics,
    leaks: FxHashSet<(i32, i32)>,
    /// Element count at the last progress line.
    progress_logged: usize,
}

impl<'a, L: LevelGeometry + ?Sized> GridBuilder<'a, L> {
    pub fn new(level: &'a L, config: &'a NavConfig) -> Self {
        Self {
            level,
            config,
            probe: Probe::new(level, config),
            grid: Grid::new(config.element_size(), config.player_height),
            queue: VecDeque::new(),
            diagnostics: Diagnostics::new(),
            leaks: FxHashSet::default(),
            progress_logged: 0,
        }
    }

    /// Seed the fill from start spots. Each point's `z` should be the floor
    /// height under it. Returns how many were accepted.
    pub fn seed(&mut self, points: &[WorldPos]) -> NavResult<usize> {
        let mut accepted = 0;
        for &pos in points {
            match self.settle(pos)? {
                Some(state) => {
                    self.add_seed(&state)?;
                    accepted += 1;
                }
                None => self.diagnostics.push(Diagnostic::SpawnBlocked {
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                }),
            }
        }
        Ok(accepted)
    }

    /// Seed the fill from a teleport destination.
    pub fn seed_teleport(&mut self, edge: EdgeId, pos: WorldPos) -> NavResult<bool> {
        match self.settle(pos)? {
            Some(state) => {
                self.add_seed(&state)?;
                Ok(true)
            }
            None => {
                self.diagnostics.push(Diagnostic::TeleportDestinationBlocked {
                    edge,
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                });
                Ok(false)
            }
        }
    }

    /// Probe a seed with the full player radius. A seed whose footprint
    /// overlaps a slightly higher floor is lifted onto it.
    fn settle(&mut self, pos: WorldPos) -> NavResult<Option<ProbeState>> {
        let radius = self.config.player_radius;
        let height = self.config.player_height;
        let (collided, state) = self.probe.probe(pos, radius, height)?;
        if !collided {
            return Ok(Some(state));
        }
        let rise = state.floor_z - pos.z;
        if state.block_line || state.block_thing || rise <= 0.0 || rise > self.config.step_height {
            return Ok(None);
        }
        let lifted = WorldPos::new(pos.x, pos.y, state.floor_z);
        let (collided, state) = self.probe.probe(lifted, radius, height)?;
        Ok(if collided { None } else { Some(state) })
    }

    fn add_seed(&mut self, state: &ProbeState) -> NavResult<()> {
        let (x, y) = self.grid.cell_of(state.pos.x, state.pos.y);
        let z = state.pos.z.round() as i32;
        if self.grid.element_at(x, y, z).is_none() {
            self.create_element(x, y, z, state)?;
            self.grid.stats.seeds += 1;
        }
        Ok(())
    }

    fn create_element(&mut self, x: i32, y: i32, z: i32, state: &ProbeState) -> NavResult<ElementId> {
        let mut element = Element::new(x, y, z);
        if let Some(special) = state.special_sector {
            element.flags = self.config.damage_flags(self.level.sector(special)?.damage);
            if state.moves {
                element.special_sector = Some(special);
            }
        }
        if let Some(plane) = state.floor_plane {
            element.plane = Some(self.grid.intern_plane(plane));
        }
        let id = self.grid.add_element(element);
        self.queue.push_back(id);
        Ok(id)
    }

    /// Run the fill to completion.
    pub fn expand(mut self) -> NavResult<(Grid, Diagnostics)> {
        while let Some(id) = self.queue.pop_front() {
            if self.progress_due() {
                tracing::debug!(
                    elements = self.grid.len(),
                    queued = self.queue.len(),
                    "flood fill progress"
                );
            }

            for dir in Direction::ALL {
                let origin = self.grid.element(id);
                let (dx, dy) = dir.offset();
                let (x, y, z) = (origin.x + dx, origin.y + dy, origin.z);

                let target = match self.grid.element_at(x, y, z) {
                    Some(existing) => Some(existing),
                    None => self.test_element(id, dir, x, y)?,
                };
                if let Some(target) = target {
                    self.grid.element_mut(id).neighbors[dir.index()] = Some(target);
                }
            }
        }

        let removed = self.grid.remove_one_way_links();
        self.grid.stats.one_way_links_removed = removed;

        let stats = &self.grid.stats;
        tracing::info!(
            elements = self.grid.len(),
            seeds = stats.seeds,
            one_way_links_removed = removed,
            leaks = stats.rejections(Rejection::Leak),
            "grid expanded"
        );
        for reason in Rejection::ALL {
            tracing::debug!(?reason, count = stats.rejections(reason), "rejected directions");
        }

        Ok((self.grid, self.diagnostics))
    }

    /// True once per `PROGRESS_INTERVAL` new elements.
    fn progress_due(&mut self) -> bool {
        let len = self.grid.len();
        if len < self.progress_logged + PROGRESS_INTERVAL {
            return false;
        }
        self.progress_logged = len;
        true
    }

    fn reject(&mut self, reason: Rejection) -> Option<ElementId> {
        self.grid.stats.reject(reason);
        None
    }

    /// Decide whether the element at `origin` can move one cell in `dir`,
    /// and to which element. Creates and enqueues the target if new.
    fn test_element(
        &mut self,
        origin: ElementId,
        dir: Direction,
        x: i32,
        y: i32,
    ) -> NavResult<Option<ElementId>> {
        let (cx, cy) = self.grid.cell_center(x, y);
        if !self.level.bounds().contains_point(cx, cy) {
            if self.leaks.insert((x, y)) {
                self.diagnostics.push(Diagnostic::GridLeak { x, y });
            }
            return Ok(self.reject(Rejection::Leak));
        }

        let origin_z = f64::from(self.grid.element(origin).z);
        let size = self.grid.element_size;
        let height = self.grid.element_height;
        let (collided, state) = self.probe.probe(WorldPos::new(cx, cy, origin_z), size, height)?;

        if let Some(special) = state.special_sector {
            if self.level.sector(special)?.flags.contains(SectorFlags::IGNORE) {
                return Ok(self.reject(Rejection::Ignore));
            }
        }

        let mut z = origin_z;
        let mut jump = false;
        if collided {
            if state.block_line {
                return Ok(self.reject(Rejection::BlockLine));
            }
            if state.block_thing {
                return Ok(self.reject(Rejection::BlockThing));
            }
            if state.floor_z > z {
                let rise = state.floor_z - z;
                if rise <= self.config.step_height {
                    z = state.floor_z;
                } else if self.config.jump_height > 0.0 && rise <= self.config.jump_height {
                    z = state.floor_z;
                    jump = true;
                } else if !state.moves {
                    return Ok(self.reject(Rejection::TooHigh));
                }
            }
        }

        // Steep slopes can be walked down, never up.
        if state.steep && state.floor_z > origin_z {
            return Ok(self.reject(Rejection::SlopeTooSteep));
        }

        if state.moves {
            z = state.floor_z;
        }
        z = z.min(state.floor_z);

        if (z < state.floor_z || z + height > state.ceil_z) && !state.moves {
            return Ok(self.reject(Rejection::CannotFit));
        }

        if jump {
            self.grid.element_mut(origin).flags |= dir.jump_flag();
        }

        let z = z.round() as i32;
        let target = match self.grid.element_at(x, y, z) {
            Some(existing) => existing,
            None => self.create_element(x, y, z, &state)?,
        };
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Sector;
    use crate::level_map::{LevelBuilder, LevelMap};

    fn walled_room(sector: Sector) -> LevelMap {
        let mut builder = LevelBuilder::new();
        let id = builder.add_room(0.0, 0.0, 256.0, 256.0, sector);
        builder.add_box_walls(0.0, 0.0, 256.0, 256.0, id);
        builder.build().unwrap()
    }

    fn build(level: &LevelMap, config: &NavConfig, seeds: &[WorldPos]) -> (Grid, Diagnostics) {
        let mut builder = GridBuilder::new(level, config);
        builder.seed(seeds).unwrap();
        builder.expand().unwrap()
    }

    #[test]
    fn flat_room_fills_completely() {
        let level = walled_room(Sector::flat(0.0, 128.0));
        let config = NavConfig::doom();
        let (grid, diagnostics) = build(&level, &config, &[WorldPos::new(128.0, 128.0, 0.0)]);

        assert!(diagnostics.is_empty());
        assert_eq!(grid.len(), 14 * 14);
        assert_eq!(grid.stats.seeds, 1);
        assert_eq!(grid.stats.one_way_links_removed, 0);
        assert!(grid.links_are_mutual());
        assert!(grid.stats.rejections(Rejection::BlockLine) > 0);
        assert_eq!(grid.stats.rejections(Rejection::TooHigh), 0);

        for x in 1..=14 {
            for y in 1..=14 {
                let id = grid.element_at(x, y, 0).unwrap();
                let element = grid.element(id);
                let linked = Direction::ALL
                    .iter()
                    .filter(|&&d| element.neighbor(d).is_some())
                    .count();
                let border = [x == 1, x == 14, y == 1, y == 14]
                    .iter()
                    .filter(|&&b| b)
                    .count();
                assert_eq!(linked, 4 - border);
            }
        }
    }

    #[test]
    fn blocked_spawn_is_reported() {
        let level = walled_room(Sector::flat(0.0, 128.0));
        let config = NavConfig::doom();
        let mut builder = GridBuilder::new(&level, &config);
        let accepted = builder
            .seed(&[WorldPos::new(4.0, 128.0, 0.0), WorldPos::new(128.0, 128.0, 0.0)])
            .unwrap();
        assert_eq!(accepted, 1);
        let (_, diagnostics) = builder.expand().unwrap();
        assert_eq!(
            diagnostics.entries(),
            &[Diagnostic::SpawnBlocked {
                x: 4.0,
                y: 128.0,
                z: 0.0
            }]
        );
    }

    #[test]
    fn ledge_drop_links_are_removed() {
        let mut builder = LevelBuilder::new();
        let low = builder.add_room(0.0, 0.0, 128.0, 128.0, Sector::flat(0.0, 200.0));
        let high = builder.add_room(128.0, 0.0, 256.0, 128.0, Sector::flat(64.0, 200.0));
        builder.add_wall((0.0, 0.0), (128.0, 0.0), low);
        builder.add_wall((0.0, 128.0), (0.0, 0.0), low);
        builder.add_wall((128.0, 128.0), (0.0, 128.0), low);
        builder.add_portal((128.0, 0.0), (128.0, 128.0), low, high);
        builder.add_wall((128.0, 0.0), (256.0, 0.0), high);
        builder.add_wall((256.0, 0.0), (256.0, 128.0), high);
        builder.add_wall((256.0, 128.0), (128.0, 128.0), high);
        let level = builder.build().unwrap();
        let config = NavConfig::doom();

        let (grid, _) = build(
            &level,
            &config,
            &[
                WorldPos::new(48.0, 64.0, 0.0),
                WorldPos::new(200.0, 64.0, 64.0),
            ],
        );

        // Columns 1..=6 are low, 7..=14 are on the ledge (7 overlaps it).
        assert_eq!(grid.len(), 6 * 6 + 8 * 6);
        assert_eq!(grid.stats.one_way_links_removed, 6);
        assert!(grid.stats.rejections(Rejection::TooHigh) > 0);
        assert!(grid.links_are_mutual());
        for y in 1..=6 {
            assert!(grid.element_at(7, y, 64).is_some());
            let low_edge = grid.element_at(6, y, 0).unwrap();
            assert_eq!(grid.element(low_edge).neighbor(Direction::East), None);
        }
    }

    /// A flat floor at 0 (x 0..128), a ramp rising 2 units per unit
    /// (x 128..256) and a landing at 256 (x 256..384).
    fn steep_ramp() -> LevelMap {
        let mut builder = LevelBuilder::new();
        let low = builder.add_room(0.0, 0.0, 128.0, 128.0, Sector::flat(0.0, 512.0));
        let mut ramp = Sector::flat(0.0, 512.0);
        ramp.floor_plane =
            Plane::from_points([128.0, 0.0, 0.0], [129.0, 0.0, 2.0], [128.0, 1.0, 0.0]);
        let ramp = builder.add_room(128.0, 0.0, 256.0, 128.0, ramp);
        let high = builder.add_room(256.0, 0.0, 384.0, 128.0, Sector::flat(256.0, 512.0));
        builder.add_portal((128.0, 0.0), (128.0, 128.0), low, ramp);
        builder.add_portal((256.0, 0.0), (256.0, 128.0), ramp, high);
        builder.add_box_walls(0.0, 0.0, 384.0, 128.0, low);
        builder.build().unwrap()
    }

    #[test]
    fn steep_slope_cannot_be_climbed() {
        let level = steep_ramp();
        let config = NavConfig::doom();
        let (grid, _) = build(&level, &config, &[WorldPos::new(64.0, 64.0, 0.0)]);

        assert_eq!(grid.len(), 6 * 6);
        assert!(grid.elements().iter().all(|e| e.x <= 6 && e.z == 0));
        assert_eq!(grid.stats.rejections(Rejection::SlopeTooSteep), 6);
        assert_eq!(grid.stats.rejections(Rejection::TooHigh), 0);
    }

    #[test]
    fn steep_slope_can_be_walked_down() {
        let level = steep_ramp();
        let config = NavConfig::doom();
        let (grid, _) = build(&level, &config, &[WorldPos::new(320.0, 64.0, 256.0)]);

        for x in 1..=22 {
            for y in 1..=6 {
                assert_eq!(grid.column(x, y).len(), 1, "column ({x}, {y})");
            }
        }
        let z_at = |x: i32| grid.element(grid.column(x, 3)[0]).z;
        assert_eq!(z_at(22), 256);
        assert_eq!(z_at(14), 240);
        assert_eq!(z_at(7), 16);
        assert_eq!(z_at(6), 0);
        assert_eq!(z_at(1), 0);
        assert!((1..22).all(|x| z_at(x) <= z_at(x + 1)));

        // Stepping back onto the ramp from the flat floor is refused, so the
        // drop links off the ramp are one-way and get removed.
        assert!(grid.stats.rejections(Rejection::SlopeTooSteep) > 0);
        assert!(grid.stats.one_way_links_removed >= 6);
        for y in 1..=6 {
            let bottom = grid.element_at(6, y, 0).unwrap();
            assert_eq!(grid.element(bottom).neighbor(Direction::East), None);
        }
    }

    #[test]
    fn moving_floor_snaps_to_lift() {
        let mut builder = LevelBuilder::new();
        let floor = builder.add_room(0.0, 0.0, 128.0, 128.0, Sector::flat(0.0, 256.0));
        let mut lift = Sector::flat(128.0, 256.0);
        lift.flags = SectorFlags::SPECIAL | SectorFlags::FLOOR_MOVES;
        let lift = builder.add_room(128.0, 0.0, 256.0, 128.0, lift);
        builder.add_portal((128.0, 0.0), (128.0, 128.0), floor, lift);
        builder.add_box_walls(0.0, 0.0, 256.0, 128.0, floor);
        let level = builder.build().unwrap();
        let config = NavConfig::doom();

        let (grid, _) = build(&level, &config, &[WorldPos::new(64.0, 64.0, 0.0)]);

        // Columns 1..=6 on the floor, 7..=14 on the raised lift (7 overlaps it).
        assert_eq!(grid.len(), 6 * 6 + 8 * 6);
        assert_eq!(grid.stats.rejections(Rejection::TooHigh), 0);
        assert_eq!(grid.stats.one_way_links_removed, 0);
        for element in grid.elements() {
            if element.x >= 7 {
                assert_eq!(element.z, 128);
                assert_eq!(element.special_sector, Some(lift));
                assert_eq!(element.flags, ElementFlags::empty());
            } else {
                assert_eq!(element.z, 0);
                assert_eq!(element.special_sector, None);
            }
        }
        for y in 1..=6 {
            let edge = grid.element_at(6, y, 0).unwrap();
            let up = grid.element(edge).neighbor(Direction::East).unwrap();
            assert_eq!(grid.element(up).z, 128);
        }
    }

    #[test]
    fn low_ceiling_cannot_fit() {
        let mut builder = LevelBuilder::new();
        let floor = builder.add_room(0.0, 0.0, 128.0, 128.0, Sector::flat(0.0, 128.0));
        let crawl = builder.add_room(128.0, 0.0, 256.0, 128.0, Sector::flat(0.0, 40.0));
        builder.add_portal((128.0, 0.0), (128.0, 128.0), floor, crawl);
        builder.add_box_walls(0.0, 0.0, 256.0, 128.0, floor);
        let level = builder.build().unwrap();
        let config = NavConfig::doom();

        let (grid, _) = build(&level, &config, &[WorldPos::new(64.0, 64.0, 0.0)]);

        assert_eq!(grid.len(), 6 * 6);
        assert!(grid.elements().iter().all(|e| e.x <= 6));
        assert_eq!(grid.stats.rejections(Rejection::CannotFit), 6);
        assert_eq!(grid.stats.rejections(Rejection::TooHigh), 0);
    }

    #[test]
    fn progress_is_logged_once_per_interval() {
        let level = walled_room(Sector::flat(0.0, 128.0));
        let config = NavConfig::doom();
        let mut builder = GridBuilder::new(&level, &config);
        assert!(!builder.progress_due());

        for i in 0..PROGRESS_INTERVAL as i32 {
            builder.grid.add_element(Element::new(i, 0, 0));
        }
        assert!(builder.progress_due());
        // Same count on the next pop: nothing new to report.
        assert!(!builder.progress_due());

        builder.grid.add_element(Element::new(-1, 0, 0));
        assert!(!builder.progress_due());
        for i in 0..PROGRESS_INTERVAL as i32 {
            builder.grid.add_element(Element::new(i, 1, 0));
        }
        assert!(builder.progress_due());
    }

    #[test]
    fn jumping_flags_origin() {
        let mut builder = LevelBuilder::new();
        let low = builder.add_room(0.0, 0.0, 128.0, 128.0, Sector::flat(0.0, 200.0));
        let high = builder.add_room(128.0, 0.0, 256.0, 128.0, Sector::flat(30.0, 200.0));
        builder.add_portal((128.0, 0.0), (128.0, 128.0), low, high);
        builder.add_box_walls(0.0, 0.0, 256.0, 128.0, low);
        let level = builder.build().unwrap();
        let config = NavConfig::zdoom();

        let (grid, _) = build(&level, &config, &[WorldPos::new(48.0, 64.0, 0.0)]);
        let origin = grid.element_at(6, 3, 0).unwrap();
        let element = grid.element(origin);
        assert!(element.flags.contains(ElementFlags::JUMP_EAST));
        let target = element.neighbor(Direction::East).unwrap();
        assert_eq!(grid.element(target).z, 30);
    }

    #[test]
    fn damage_sets_hazard_flags() {
        let mut sector = Sector::flat(0.0, 128.0);
        sector.damage = 5;
        let level = walled_room(sector);
        let config = NavConfig::doom();
        let (grid, _) = build(&level, &config, &[WorldPos::new(128.0, 128.0, 0.0)]);
        assert!(
            grid.elements()
                .iter()
                .all(|e| e.flags == ElementFlags::DAMAGE_LOW && e.special_sector.is_none())
        );
    }

    #[test]
    fn ignored_sector_gets_no_elements() {
        let mut builder = LevelBuilder::new();
        let floor = builder.add_room(0.0, 0.0, 128.0, 128.0, Sector::flat(0.0, 128.0));
        let mut pit = Sector::flat(0.0, 128.0);
        pit.flags = SectorFlags::IGNORE;
        let pit = builder.add_room(128.0, 0.0, 256.0, 128.0, pit);
        builder.add_portal((128.0, 0.0), (128.0, 128.0), floor, pit);
        builder.add_box_walls(0.0, 0.0, 256.0, 128.0, floor);
        let level = builder.build().unwrap();
        let config = NavConfig::doom();

        let (grid, _) = build(&level, &config, &[WorldPos::new(48.0, 64.0, 0.0)]);
        assert!(grid.elements().iter().all(|e| e.x <= 6));
        assert!(grid.stats.rejections(Rejection::Ignore) > 0);
    }

    #[test]
    fn unsealed_room_leaks() {
        let mut builder = LevelBuilder::new();
        builder.add_room(0.0, 0.0, 256.0, 256.0, Sector::flat(0.0, 128.0));
        let level = builder.build().unwrap();
        let config = NavConfig::doom();
        let (grid, diagnostics) = build(&level, &config, &[WorldPos::new(128.0, 128.0, 0.0)]);

        assert_eq!(grid.len(), 16 * 16);
        assert_eq!(diagnostics.len(), 64);
        assert!(
            diagnostics
                .entries()
                .iter()
                .all(|d| matches!(d, Diagnostic::GridLeak { .. }))
        );
    }

    #[test]
    fn similarity_rules() {
        let mut a = Element::new(0, 0, 0);
        let mut b = Element::new(1, 0, 0);
        assert!(a.is_similar(&b));
        b.z = 8;
        assert!(!a.is_similar(&b));

        let key = PlaneKey(42);
        a.plane = Some(key);
        b.plane = Some(key);
        assert!(a.is_similar(&b), "same plane, different heights");

        b.flags = ElementFlags::DAMAGE_HIGH;
        assert!(!a.is_similar(&b));
    }

    #[test]
    fn json_roundtrip_rebuilds_index() {
        let level = walled_room(Sector::flat(0.0, 128.0));
        let config = NavConfig::doom();
        let (grid, _) = build(&level, &config, &[WorldPos::new(128.0, 128.0, 0.0)]);
        let restored = Grid::from_json(&grid.to_json().unwrap()).unwrap();
        assert_eq!(restored.len(), grid.len());
        assert_eq!(restored.element_at(5, 5, 0), grid.element_at(5, 5, 0));
        assert_eq!(restored.stats, grid.stats);
    }
}
