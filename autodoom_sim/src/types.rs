// Core types shared across the navigation subsystem.
//
// Defines the 16.16 fixed-point scalar (`Fixed`) used for every map
// coordinate and height, the 2D point type (`V2Fixed`), and the
// strongly-typed index newtypes used to address the flat arenas that replace
// pointer graphs: level sectors/lines/things, and the navigation graph's
// vertices, lines, segments, regions, neighbors and meta-sectors.
//
// All IDs are dense `u32` indices assigned in creation order. They derive
// `Serialize`/`Deserialize` so the built graph can be cached.
//
// **Critical constraint: determinism.** Fixed-point math is integer math.
// Products of two map-scale coordinates overflow `i32`, so anything that
// multiplies coordinates goes through `fixed_mul64()` and compares in `i64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

// ---------------------------------------------------------------------------
// Fixed-point scalar
// ---------------------------------------------------------------------------

/// A 16.16 fixed-point value: map units in the high half, fraction in the low.
pub type Fixed = i32;

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// Floor height reported by anything that has no usable floor.
pub const NO_FLOOR: Fixed = Fixed::MAX;
/// Ceiling height reported by anything that has no usable ceiling.
pub const NO_CEILING: Fixed = Fixed::MIN;

/// Whole map units to fixed point.
pub const fn units(n: i32) -> Fixed {
    n << FRACBITS
}

/// Product of two fixed values, kept in 64 bits.
#[inline]
pub fn fixed_mul64(a: Fixed, b: Fixed) -> i64 {
    (a as i64 * b as i64) >> FRACBITS
}

pub fn fixed_to_f64(v: Fixed) -> f64 {
    v as f64 / FRACUNIT as f64
}

/// Saturates instead of wrapping for values outside the fixed range.
pub fn f64_to_fixed(v: f64) -> Fixed {
    let scaled = (v * FRACUNIT as f64).round();
    scaled.clamp(Fixed::MIN as f64, Fixed::MAX as f64) as Fixed
}

// ---------------------------------------------------------------------------
// 2D points
// ---------------------------------------------------------------------------

/// A point (or direction vector) on the map plane, in fixed point.
///
/// X grows east, Y grows north. Boundary segments are wound so that the
/// region owning them lies on their right-hand side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct V2Fixed {
    pub x: Fixed,
    pub y: Fixed,
}

impl V2Fixed {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Build from whole map units.
    pub const fn from_units(x: i32, y: i32) -> Self {
        Self {
            x: units(x),
            y: units(y),
        }
    }

    pub fn to_f64(self) -> (f64, f64) {
        (fixed_to_f64(self.x), fixed_to_f64(self.y))
    }

    /// Euclidean length, saturating at `Fixed::MAX`.
    pub fn length(self) -> Fixed {
        let (x, y) = self.to_f64();
        f64_to_fixed(x.hypot(y))
    }

    /// Euclidean distance to `other`, saturating at `Fixed::MAX`.
    pub fn distance(self, other: Self) -> Fixed {
        let (ax, ay) = self.to_f64();
        let (bx, by) = other.to_f64();
        f64_to_fixed((ax - bx).hypot(ay - by))
    }

    /// Midpoint, computed without overflowing.
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: ((self.x as i64 + other.x as i64) / 2) as Fixed,
            y: ((self.y as i64 + other.y as i64) / 2) as Fixed,
        }
    }
}

impl Add for V2Fixed {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.wrapping_add(rhs.x), self.y.wrapping_add(rhs.y))
    }
}

impl Sub for V2Fixed {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.wrapping_sub(rhs.x), self.y.wrapping_sub(rhs.y))
    }
}

impl Neg for V2Fixed {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(self.x.wrapping_neg(), self.y.wrapping_neg())
    }
}

impl fmt::Display for V2Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.to_f64();
        write!(f, "({x:.3}, {y:.3})")
    }
}

/// Axis-aligned bounding box in fixed point. `top`/`bottom` are Y extents,
/// `left`/`right` are X extents (engine naming).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub top: Fixed,
    pub bottom: Fixed,
    pub left: Fixed,
    pub right: Fixed,
}

impl BBox {
    /// An inverted box that any `add_point` call will overwrite.
    pub const EMPTY: Self = Self {
        top: Fixed::MIN,
        bottom: Fixed::MAX,
        left: Fixed::MAX,
        right: Fixed::MIN,
    };

    /// Box of half-size `radius` centred on `center`, saturating at the map edge.
    pub fn around(center: V2Fixed, radius: Fixed) -> Self {
        Self {
            top: center.y.saturating_add(radius),
            bottom: center.y.saturating_sub(radius),
            left: center.x.saturating_sub(radius),
            right: center.x.saturating_add(radius),
        }
    }

    pub fn add_point(&mut self, p: V2Fixed) {
        self.top = self.top.max(p.y);
        self.bottom = self.bottom.min(p.y);
        self.left = self.left.min(p.x);
        self.right = self.right.max(p.x);
    }

    /// True if the boxes overlap or touch.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.bottom > self.top
    }
}

// ---------------------------------------------------------------------------
// Index IDs
// ---------------------------------------------------------------------------

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// The arena slot this ID addresses.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Level snapshot (real world state).
index_id!(/// Index of a real sector in the level snapshot.
SectorId);
index_id!(/// Index of a real linedef in the level snapshot.
LineId);
index_id!(/// Index of a map object in the level snapshot.
ThingId);

// Navigation graph arenas.
index_id!(/// Index of a navigation-graph vertex.
VertexId);
index_id!(/// Index of a navigation line (a boundary line between two meta-sectors).
NavLineId);
index_id!(/// Index of a boundary segment.
SegId);
index_id!(/// Index of a convex leaf region ("subsector").
RegionId);
index_id!(/// Index of a directed neighbor edge.
NeighborId);
index_id!(/// Index of a BSP tree node.
NodeId);

/// Index into the meta-sector arena, or the shared void meta-sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetaSectorId(pub u32);

impl MetaSectorId {
    /// The shared void: no floor, no ceiling, never passable.
    pub const VOID: Self = Self(u32::MAX);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_void(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for MetaSectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_void() {
            write!(f, "MetaSectorId(void)")
        } else {
            write!(f, "MetaSectorId({})", self.0)
        }
    }
}
