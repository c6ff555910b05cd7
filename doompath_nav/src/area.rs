// Area compaction: packing elements into rectangles.
//
// The compactor turns the element grid into a much smaller set of
// rectangular areas, each a block of mutually similar, mutually linked
// elements. Two phases:
//
// - `pack()`: multi-pass square packing. For each side length from the
//   configured maximum down to 1, elements are scanned in row-major order
//   (`y`, then `x`, then `z`) and every unowned element that anchors a
//   complete square becomes the south-west corner of a new area. A square
//   is complete when every cell holds an unowned element similar to the
//   anchor, reached through north/east links that agree with each other.
//   The size-1 pass guarantees every element ends up owned.
// - `merge()`: repeated passes that let an area absorb the neighbor across
//   one of its sides when the two are similar, the shared sides match
//   exactly, and the union stays within the merged-size ceiling. A pass
//   moves on to the next area after each merge. Passes repeat until one
//   merges nothing, so calling `merge()` again is a no-op.
//
// Absorbed areas are only marked dead during merging; `finish()` compacts
// the survivors into a dense `Vec<Area>` and repoints every element's
// owning area at the new ids.
//
// See also: `grid.rs` for `Element::is_similar`, `connection.rs` which
// links the finished areas.
//
// **Critical constraint: determinism.** Scan order is fixed and ties are
// broken by element id, so area ids are stable for a given grid.

use crate::config::NavConfig;
use crate::geometry::{LatticeRect, PlaneKey, WorldRect};
use crate::grid::Grid;
use crate::types::{AreaId, ConnectionId, Direction, ElementFlags, ElementId, SectorId};
use serde::{Deserialize, Serialize};

/// A rectangular cluster of similar elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Footprint in lattice cells.
    pub rect: LatticeRect,
    /// Footprint in map units.
    pub world: WorldRect,
    /// Height of the first member element.
    pub z: i32,
    /// Moving special sector under the area, if any.
    pub sector: Option<SectorId>,
    pub flags: ElementFlags,
    pub plane: Option<PlaneKey>,
    /// Member elements; the first is the representative.
    #[serde(skip)]
    pub elements: Vec<ElementId>,
    /// Connections touching this area, outgoing or incoming.
    pub connections: Vec<ConnectionId>,
}

impl Area {
    pub fn representative(&self) -> Option<ElementId> {
        self.elements.first().copied()
    }
}

/// Packs a grid's elements into areas, then merges them.
pub struct Compactor<'g> {
    grid: &'g mut Grid,
    areas: Vec<Area>,
    dead: Vec<bool>,
    max_square: i32,
    max_merged: i32,
}

impl<'g> Compactor<'g> {
    pub fn new(grid: &'g mut Grid, config: &NavConfig) -> Self {
        let size = grid.element_size;
        let max_square = (f64::from(config.max_area_size) / size).floor() as i32;
        let max_merged = (f64::from(config.max_area_size_merged) / size).floor() as i32;
        Self::with_limits(grid, max_square, max_merged)
    }

    /// Limits are in lattice cells.
    pub fn with_limits(grid: &'g mut Grid, max_square: i32, max_merged: i32) -> Self {
        Self {
            grid,
            areas: Vec::new(),
            dead: Vec::new(),
            max_square: max_square.max(1),
            max_merged: max_merged.max(max_square).max(1),
        }
    }

    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.areas
            .iter()
            .zip(&self.dead)
            .filter(|(_, dead)| !**dead)
            .map(|(area, _)| area)
    }

    /// Number of live areas.
    pub fn len(&self) -> usize {
        self.dead.iter().filter(|dead| !**dead).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim every unowned element into square areas. Returns the number of
    /// areas created.
    pub fn pack(&mut self) -> usize {
        let mut order: Vec<ElementId> = self.grid.ids().collect();
        order.sort_by_key(|&id| {
            let e = self.grid.element(id);
            (e.y, e.x, e.z, id)
        });

        let before = self.areas.len();
        let mut members = Vec::new();
        for size in (1..=self.max_square).rev() {
            let mut created = 0;
            for &anchor in &order {
                if self.grid.element(anchor).area.is_some() {
                    continue;
                }
                if self.square_at(anchor, size, &mut members) {
                    self.add_area(size, &members);
                    created += 1;
                }
            }
            if created > 0 {
                tracing::debug!(size, created, "packed squares");
            }
        }

        let created = self.areas.len() - before;
        tracing::info!(
            elements = self.grid.len(),
            areas = created,
            "packed elements into areas"
        );
        created
    }

    /// Collect the `size` by `size` square anchored at `anchor` into
    /// `members`, row by row. False if any cell is missing, owned,
    /// dissimilar, or reached inconsistently.
    fn square_at(&self, anchor: ElementId, size: i32, members: &mut Vec<ElementId>) -> bool {
        let grid = &*self.grid;
        let anchor_element = grid.element(anchor);
        members.clear();

        let mut row_start = Some(anchor);
        for row in 0..size {
            let Some(start) = row_start else {
                return false;
            };
            let mut current = start;
            for col in 0..size {
                let element = grid.element(current);
                if element.area.is_some() || !element.is_similar(anchor_element) {
                    return false;
                }
                // The cell below must link up to this one.
                if row > 0 {
                    let below = members[((row - 1) * size + col) as usize];
                    if grid.element(below).neighbor(Direction::North) != Some(current) {
                        return false;
                    }
                }
                members.push(current);
                if col + 1 < size {
                    match element.neighbor(Direction::East) {
                        Some(next) => current = next,
                        None => return false,
                    }
                }
            }
            if row + 1 < size {
                row_start = grid.element(start).neighbor(Direction::North);
            }
        }
        true
    }

    fn add_area(&mut self, size: i32, members: &[ElementId]) {
        let id = AreaId::from_index(self.areas.len());
        let anchor = self.grid.element(members[0]);
        let rect = LatticeRect::square(anchor.x, anchor.y, size);
        let area = Area {
            rect,
            world: rect.to_world(self.grid.element_size),
            z: anchor.z,
            sector: anchor.special_sector,
            flags: anchor.flags,
            plane: anchor.plane,
            elements: members.to_vec(),
            connections: Vec::new(),
        };
        for &member in members {
            self.grid.element_mut(member).area = Some(id);
        }
        self.areas.push(area);
        self.dead.push(false);
    }

    /// Merge until a pass merges nothing. Returns the total merges.
    pub fn merge(&mut self) -> usize {
        let mut total = 0;
        let mut passes = 0;
        loop {
            let merged = self.merge_pass();
            passes += 1;
            tracing::debug!(pass = passes, merged, "merge pass");
            if merged == 0 {
                break;
            }
            total += merged;
        }
        tracing::info!(merged = total, passes, areas = self.len(), "merged areas");
        total
    }

    /// One pass over all live areas.
    pub fn merge_pass(&mut self) -> usize {
        let mut merged = 0;
        for index in 0..self.areas.len() {
            if self.dead[index] {
                continue;
            }
            for dir in Direction::ALL {
                if let Some(other) = self.mergeable_neighbor(index, dir) {
                    self.absorb(index, other);
                    merged += 1;
                    break;
                }
            }
        }
        merged
    }

    /// The area across side `dir` of area `index`, if the two may merge.
    fn mergeable_neighbor(&self, index: usize, dir: Direction) -> Option<usize> {
        let area = &self.areas[index];
        let rect = area.rect;

        // Corner cell on that side, at the low end of the side.
        let (cx, cy) = match dir {
            Direction::North => (rect.x1, rect.y2 - 1),
            Direction::East => (rect.x2 - 1, rect.y1),
            Direction::South => (rect.x1, rect.y1),
            Direction::West => (rect.x1, rect.y1),
        };
        let id = AreaId::from_index(index);
        let corner = self
            .grid
            .column(cx, cy)
            .iter()
            .copied()
            .find(|&e| self.grid.element(e).area == Some(id))?;
        let across = self.grid.element(corner).neighbor(dir)?;
        let other_id = self.grid.element(across).area?;
        let other_index = other_id.index();
        if other_index == index || self.dead[other_index] {
            return None;
        }

        let other = &self.areas[other_index];
        let sides_match = match dir {
            Direction::North => other.rect.y1 == rect.y2 && other.rect.x1 == rect.x1 && other.rect.x2 == rect.x2,
            Direction::South => other.rect.y2 == rect.y1 && other.rect.x1 == rect.x1 && other.rect.x2 == rect.x2,
            Direction::East => other.rect.x1 == rect.x2 && other.rect.y1 == rect.y1 && other.rect.y2 == rect.y2,
            Direction::West => other.rect.x2 == rect.x1 && other.rect.y1 == rect.y1 && other.rect.y2 == rect.y2,
        };
        if !sides_match {
            return None;
        }

        let union = rect.union(&other.rect);
        if union.width() > self.max_merged || union.height() > self.max_merged {
            return None;
        }

        let (Some(a), Some(b)) = (area.representative(), other.representative()) else {
            return None;
        };
        if !self.grid.element(a).is_similar(self.grid.element(b)) {
            return None;
        }
        Some(other_index)
    }

    fn absorb(&mut self, index: usize, other: usize) {
        let id = AreaId::from_index(index);
        let absorbed = std::mem::take(&mut self.areas[other].elements);
        for &member in &absorbed {
            self.grid.element_mut(member).area = Some(id);
        }
        let other_rect = self.areas[other].rect;
        let element_size = self.grid.element_size;
        let area = &mut self.areas[index];
        area.rect = area.rect.union(&other_rect);
        area.world = area.rect.to_world(element_size);
        area.elements.extend(absorbed);
        self.dead[other] = true;
    }

    /// Drop absorbed areas and renumber the survivors densely.
    pub fn finish(self) -> Vec<Area> {
        let Self {
            grid, areas, dead, ..
        } = self;
        let mut live = Vec::with_capacity(areas.len());
        for (area, dead) in areas.into_iter().zip(dead) {
            if dead {
                continue;
            }
            let id = AreaId::from_index(live.len());
            for &member in &area.elements {
                grid.element_mut(member).area = Some(id);
            }
            live.push(area);
        }
        live
    }
}
