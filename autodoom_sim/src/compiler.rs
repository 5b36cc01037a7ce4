// Pull interface to the geometry compiler.
//
// The navigation graph is built from the output of a binary space
// partitioning step that is not part of this crate. That output is consumed
// one record at a time through `GeometrySource`, stream by stream, in a
// fixed order: vertices, meta-sector heights, lines, boundary segments, leaf
// regions, tree nodes. Records refer to earlier streams by dense index.
//
// `CompiledGeometry` is the plain in-memory form of that output, with one
// cursor per stream. Compilers fill its vectors; `NavGraph::build()` pulls
// from it. `grid_map.rs` produces one for square-cell test maps.

use crate::types::{Fixed, LineId, V2Fixed};
use serde::{Deserialize, Serialize};

/// A boundary line between two meta-sectors (or a meta-sector and the void).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub v1: u32,
    pub v2: u32,
    /// Meta-sector on the right, walking `v1` to `v2`. `None` is the void.
    pub right_msec: Option<u32>,
    pub left_msec: Option<u32>,
    /// The level line carrying a special, if this line is one.
    pub special_line: Option<LineId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub v1: u32,
    pub v2: u32,
    /// The segment runs against its line's direction.
    pub is_back: bool,
    /// Owning line. `None` for partition-only (mini) segments.
    pub line: Option<u32>,
    /// The same boundary seen from the adjacent leaf.
    pub partner: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafRecord {
    pub first_seg: u32,
    pub seg_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub x: Fixed,
    pub y: Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
    pub right: u32,
    pub left: u32,
    pub right_is_leaf: bool,
    pub left_is_leaf: bool,
}

/// One-record-at-a-time access to compiler output. Each method returns
/// `None` once its stream is exhausted.
pub trait GeometrySource {
    fn next_vertex(&mut self) -> Option<V2Fixed>;
    /// Real `(floor, ceiling)` of the next meta-sector, as the compiler saw it.
    fn next_meta_sector_heights(&mut self) -> Option<(Fixed, Fixed)>;
    fn next_line(&mut self) -> Option<LineRecord>;
    fn next_boundary_segment(&mut self) -> Option<SegmentRecord>;
    fn next_leaf_region(&mut self) -> Option<LeafRecord>;
    fn next_tree_node(&mut self) -> Option<NodeRecord>;
}

#[derive(Clone, Copy, Debug, Default)]
struct Cursors {
    vertex: usize,
    msec: usize,
    line: usize,
    segment: usize,
    leaf: usize,
    node: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompiledGeometry {
    pub vertices: Vec<V2Fixed>,
    pub meta_sector_heights: Vec<(Fixed, Fixed)>,
    pub lines: Vec<LineRecord>,
    pub segments: Vec<SegmentRecord>,
    pub leaves: Vec<LeafRecord>,
    pub nodes: Vec<NodeRecord>,
    #[serde(skip)]
    cursors: Cursors,
}

impl CompiledGeometry {
    /// Wrap finished compiler output, with every stream at its first record.
    pub fn new(
        vertices: Vec<V2Fixed>,
        meta_sector_heights: Vec<(Fixed, Fixed)>,
        lines: Vec<LineRecord>,
        segments: Vec<SegmentRecord>,
        leaves: Vec<LeafRecord>,
        nodes: Vec<NodeRecord>,
    ) -> Self {
        Self {
            vertices,
            meta_sector_heights,
            lines,
            segments,
            leaves,
            nodes,
            cursors: Cursors::default(),
        }
    }

    /// Restart every stream from its first record.
    pub fn rewind(&mut self) {
        self.cursors = Cursors::default();
    }
}

fn next_of<T: Copy>(items: &[T], cursor: &mut usize) -> Option<T> {
    let item = items.get(*cursor).copied()?;
    *cursor += 1;
    Some(item)
}

impl GeometrySource for CompiledGeometry {
    fn next_vertex(&mut self) -> Option<V2Fixed> {
        next_of(&self.vertices, &mut self.cursors.vertex)
    }

    fn next_meta_sector_heights(&mut self) -> Option<(Fixed, Fixed)> {
        next_of(&self.meta_sector_heights, &mut self.cursors.msec)
    }

    fn next_line(&mut self) -> Option<LineRecord> {
        next_of(&self.lines, &mut self.cursors.line)
    }

    fn next_boundary_segment(&mut self) -> Option<SegmentRecord> {
        next_of(&self.segments, &mut self.cursors.segment)
    }

    fn next_leaf_region(&mut self) -> Option<LeafRecord> {
        next_of(&self.leaves, &mut self.cursors.leaf)
    }

    fn next_tree_node(&mut self) -> Option<NodeRecord> {
        next_of(&self.nodes, &mut self.cursors.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_independent_and_rewindable() {
        let mut geo = CompiledGeometry {
            vertices: vec![V2Fixed::from_units(0, 0), V2Fixed::from_units(64, 0)],
            leaves: vec![LeafRecord {
                first_seg: 0,
                seg_count: 3,
            }],
            ..CompiledGeometry::default()
        };
        assert_eq!(geo.next_vertex(), Some(V2Fixed::from_units(0, 0)));
        assert_eq!(geo.next_leaf_region().map(|l| l.seg_count), Some(3));
        assert_eq!(geo.next_leaf_region(), None);
        assert_eq!(geo.next_vertex(), Some(V2Fixed::from_units(64, 0)));
        assert_eq!(geo.next_vertex(), None);
        assert_eq!(geo.next_tree_node(), None);

        geo.rewind();
        assert_eq!(geo.next_vertex(), Some(V2Fixed::from_units(0, 0)));
    }

    #[test]
    fn constructed_geometry_streams_from_the_start() {
        let mut geo = CompiledGeometry::new(
            vec![V2Fixed::from_units(0, 0)],
            vec![(0, 128)],
            Vec::new(),
            Vec::new(),
            vec![LeafRecord {
                first_seg: 0,
                seg_count: 4,
            }],
            Vec::new(),
        );
        assert_eq!(geo.next_meta_sector_heights(), Some((0, 128)));
        assert_eq!(geo.next_vertex(), Some(V2Fixed::from_units(0, 0)));
        assert_eq!(geo.next_leaf_region().map(|l| l.seg_count), Some(4));
        assert_eq!(geo.next_line(), None);
        assert_eq!(geo.next_boundary_segment(), None);
    }
}
