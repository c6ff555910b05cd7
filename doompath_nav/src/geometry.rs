// Planar geometry primitives.
//
// - `Plane`: a sloped floor or ceiling, `a*x + b*y + c*z + d = 0`, sampled
//   at arbitrary (x, y). `PlaneKey` is its content-derived identity (CRC-32
//   of the four coefficients) used to deduplicate planes in a saved mesh.
// - `WorldRect`: an axis-aligned rectangle in map units with inclusive
//   bounds. Connection portals are degenerate `WorldRect`s (zero extent
//   across the boundary they lie on).
// - `LatticeRect`: a half-open rectangle of lattice cells, the footprint of
//   an area.
// - Free functions for point-in-polygon and point/segment distance, used by
//   the in-memory level provider.
//
// See also: `level.rs` where sectors carry optional planes, `area.rs` and
// `connection.rs` for the rectangle users.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Planes
// ---------------------------------------------------------------------------

/// Content-derived identity of a plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaneKey(pub u32);

impl fmt::Display for PlaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A sloped surface. `c` is never zero (vertical planes are walls).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub invc: f64,
}

impl Plane {
    /// Returns `None` for a vertical plane.
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Option<Self> {
        if c == 0.0 {
            return None;
        }
        Some(Self {
            a,
            b,
            c,
            d,
            invc: 1.0 / c,
        })
    }

    /// The plane through three points, normalized with an upward-facing
    /// normal (`c > 0`).
    pub fn from_points(p1: [f64; 3], p2: [f64; 3], p3: [f64; 3]) -> Option<Self> {
        let u = [p2[0] - p1[0], p2[1] - p1[1], p2[2] - p1[2]];
        let v = [p3[0] - p1[0], p3[1] - p1[1], p3[2] - p1[2]];
        let mut n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len == 0.0 {
            return None;
        }
        if n[2] < 0.0 {
            n = [-n[0], -n[1], -n[2]];
        }
        let [a, b, c] = [n[0] / len, n[1] / len, n[2] / len];
        let d = -(a * p1[0] + b * p1[1] + c * p1[2]);
        Self::new(a, b, c, d)
    }

    /// Height of the plane at (x, y).
    pub fn z_at(&self, x: f64, y: f64) -> f64 {
        -(self.invc * (self.a * x + self.b * y + self.d))
    }

    /// True if a floor on this plane is too steep to walk up.
    pub fn is_steep(&self, slope_steep: f64) -> bool {
        self.c.abs() < slope_steep
    }

    pub fn key(&self) -> PlaneKey {
        let mut hasher = crc32fast::Hasher::new();
        for coefficient in [self.a, self.b, self.c, self.d] {
            hasher.update(&coefficient.to_le_bytes());
        }
        PlaneKey(hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// Rectangles
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in map units. Bounds are inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl WorldRect {
    /// Build from any two corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn around(x: f64, y: f64, radius: f64) -> Self {
        Self::new(x - radius, y - radius, x + radius, y + radius)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x1, self.y1),
            (self.x2, self.y1),
            (self.x2, self.y2),
            (self.x1, self.y2),
        ]
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    pub fn intersects(&self, other: &WorldRect) -> bool {
        self.x1 <= other.x2 && other.x1 <= self.x2 && self.y1 <= other.y2 && other.y1 <= self.y2
    }

    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            x1: self.x1 - margin,
            y1: self.y1 - margin,
            x2: self.x2 + margin,
            y2: self.y2 + margin,
        }
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &WorldRect) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Liang-Barsky clip of the segment `a`-`b` against this rectangle.
    pub fn intersects_segment(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        for (p, q) in [
            (-dx, a.0 - self.x1),
            (dx, self.x2 - a.0),
            (-dy, a.1 - self.y1),
            (dy, self.y2 - a.1),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
        true
    }
}

/// Half-open rectangle of lattice cells: `x1..x2` by `y1..y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LatticeRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LatticeRect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// A `size` by `size` square with its south-west cell at (x, y).
    pub const fn square(x: i32, y: i32, size: i32) -> Self {
        Self::new(x, y, x + size, y + size)
    }

    pub const fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub const fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub const fn cell_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    pub fn union(&self, other: &LatticeRect) -> Self {
        Self::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// World-space extent of the cells.
    pub fn to_world(&self, element_size: f64) -> WorldRect {
        WorldRect {
            x1: f64::from(self.x1) * element_size,
            y1: f64::from(self.y1) * element_size,
            x2: f64::from(self.x2) * element_size,
            y2: f64::from(self.y2) * element_size,
        }
    }
}

// ---------------------------------------------------------------------------
// 2D helpers
// ---------------------------------------------------------------------------

/// Even-odd point-in-polygon test. Points on an edge may go either way.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let cx = a.0 + t * dx;
    let cy = a.1 + t * dy;
    (p.0 - cx).hypot(p.1 - cy)
}

/// Distance from `p` to the boundary of a polygon.
pub fn distance_to_polygon(p: (f64, f64), polygon: &[(f64, f64)]) -> f64 {
    let mut best = f64::INFINITY;
    for (i, &a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        best = best.min(distance_to_segment(p, a, b));
    }
    best
}
