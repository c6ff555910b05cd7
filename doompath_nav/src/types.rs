// Core types shared across the navigation pipeline.
//
// Defines the index ids that address the element, area and connection
// arenas (and the level's sectors, edges and things), the world-space
// position type, the four lattice directions, and the flag sets carried by
// elements and connections.
//
// Every cross-reference in the pipeline is one of these ids, never an owned
// pointer: an area can absorb another area's elements by repointing ids, and
// connections can be deduplicated by comparing `(rect, area_a, area_b)`.
//
// See also: `grid.rs` for the element arena, `area.rs` for the area arena,
// `connection.rs` for the connection arena, `level.rs` for the sector /
// edge / thing tables the level ids index into.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Arena index ids
// ---------------------------------------------------------------------------

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Position of this id in its arena.
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) const fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_id!(
    /// An element (walkable lattice sample) in `Grid::elements`.
    ElementId
);
index_id!(
    /// A navigation area in `Mesh::areas`.
    AreaId
);
index_id!(
    /// A connection (portal or teleport link) in `Mesh::connections`.
    ConnectionId
);
index_id!(
    /// A sector (convex floor/ceiling sub-volume) of the level.
    SectorId
);
index_id!(
    /// An edge (linedef) of the level.
    EdgeId
);
index_id!(
    /// A point-object (thing) of the level.
    ThingId
);

// ---------------------------------------------------------------------------
// World positions
// ---------------------------------------------------------------------------

/// A point in level space. `x`/`y` are map units, `z` is height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPos {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for WorldPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Lattice directions
// ---------------------------------------------------------------------------

/// One of the four lattice directions. North is +y, east is +x.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions in neighbor-table order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Slot of this direction in an element's neighbor table.
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Lattice step `(dx, dy)` for one move in this direction.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// True for east/west, whose boundary lines are vertical (constant x).
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    /// The flag set on an element whose neighbor in this direction can only
    /// be reached by jumping.
    pub const fn jump_flag(self) -> ElementFlags {
        match self {
            Direction::North => ElementFlags::JUMP_NORTH,
            Direction::East => ElementFlags::JUMP_EAST,
            Direction::South => ElementFlags::JUMP_SOUTH,
            Direction::West => ElementFlags::JUMP_WEST,
        }
    }
}

// ---------------------------------------------------------------------------
// Flag sets
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Hazard and movement flags of an element, copied to the area that
    /// owns it. Two elements with different flags are never similar.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ElementFlags: u16 {
        const DAMAGE_LOW = 0x0001;
        const DAMAGE_MEDIUM = 0x0002;
        const DAMAGE_HIGH = 0x0004;
        const JUMP_NORTH = 0x0008;
        const JUMP_EAST = 0x0010;
        const JUMP_SOUTH = 0x0020;
        const JUMP_WEST = 0x0040;
    }
}

bitflags::bitflags! {
    /// Traversal directions of a connection.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ConnectionFlags: u8 {
        /// Traversable from `area_a` into `area_b`.
        const AB = 0x1;
        /// Traversable from `area_b` into `area_a`.
        const BA = 0x2;
        /// A teleport link; always `AB` only and free to traverse.
        const TELEPORT = 0x4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_directions_cancel_offsets() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.offset();
            let (ox, oy) = dir.opposite().offset();
            assert_eq!((dx + ox, dy + oy), (0, 0));
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn direction_indices_are_distinct() {
        let mut seen = [false; 4];
        for dir in Direction::ALL {
            assert!(!seen[dir.index()]);
            seen[dir.index()] = true;
        }
    }

    #[test]
    fn jump_flags_are_distinct_and_not_hazards() {
        let hazards =
            ElementFlags::DAMAGE_LOW | ElementFlags::DAMAGE_MEDIUM | ElementFlags::DAMAGE_HIGH;
        let mut all = ElementFlags::empty();
        for dir in Direction::ALL {
            let flag = dir.jump_flag();
            assert!(!all.intersects(flag));
            assert!(!hazards.intersects(flag));
            all |= flag;
        }
    }
}
