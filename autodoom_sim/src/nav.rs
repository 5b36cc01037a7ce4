// Navigation graph for bot pathfinding.
//
// The graph is the set of convex leaf regions produced by the geometry
// compiler, connected by directed `Neighbor` edges. Each neighbor records
// the boundary it crosses (segment and line, if any), a witness point and
// direction on that boundary, and the centroid-to-centroid distance used as
// the base search cost. The BSP tree is kept for point location, and a block
// grid (`blockmap.rs`) serves box and line queries.
//
// All storage uses `Vec` indexed by the dense IDs in `types.rs`. The only
// state that changes after the build is the occupancy index (which things
// and trigger lines sit in which region); it is rebuilt per level and never
// persisted.
//
// See also: `compiler.rs` for the pull protocol the builder consumes,
// `metasector.rs` for the height queries behind `can_pass()`,
// `pathfinding.rs` for the searches over this graph, `cache.rs` for the
// on-disk form.
//
// **Critical constraint: determinism.** IDs are assigned in pull order,
// neighbor lists are filled in segment order then vertex order, and every
// query that returns a set returns it sorted.

use crate::blockmap::BlockMap;
use crate::compiler::GeometrySource;
use crate::config::NavConfig;
use crate::error::NavError;
use crate::geometry::{average_point, box_on_line_side, point_on_side, polygon_centroid, segments_intersect};
use crate::heights::{HeightSource, InstantHeights};
use crate::level::Level;
use crate::line_special::{Trigger, line_special};
use crate::metasector::MetaSectorTable;
use crate::types::{
    BBox, Fixed, LineId, MetaSectorId, NO_CEILING, NO_FLOOR, NavLineId, NeighborId, NodeId, RegionId, SectorId, SegId,
    ThingId, V2Fixed, VertexId, units,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Owner of a segment no leaf region claimed.
const NO_REGION: RegionId = RegionId(u32::MAX);

/// A boundary line between two meta-sectors. Index 0 of `msec` is the right
/// (front) side walking `v[0]` to `v[1]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavLine {
    pub v: [VertexId; 2],
    pub msec: [MetaSectorId; 2],
    /// The level line carrying a special, if any.
    pub special_line: Option<LineId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Seg {
    pub v: [VertexId; 2],
    pub p1: V2Fixed,
    pub p2: V2Fixed,
    pub dx: Fixed,
    pub dy: Fixed,
    /// `None` for partition-only segments.
    pub line: Option<NavLineId>,
    /// Runs against its line's direction, so the owner is on the line's back.
    pub is_back: bool,
    pub partner: Option<SegId>,
    pub owner: RegionId,
    pub bbox: BBox,
    pub mid: V2Fixed,
}

impl Seg {
    pub fn dir(&self) -> V2Fixed {
        V2Fixed::new(self.dx, self.dy)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub first_seg: SegId,
    pub seg_count: u32,
    pub msector: MetaSectorId,
    pub centroid: V2Fixed,
    /// Outgoing edges, in creation order.
    pub neighbors: SmallVec<[NeighborId; 8]>,
}

impl Region {
    pub fn seg_range(&self) -> std::ops::Range<usize> {
        let first = self.first_seg.index();
        first..first + self.seg_count as usize
    }
}

/// A directed edge `from` -> `to`. Edges come in reciprocal pairs that
/// share the same line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: NeighborId,
    pub from: RegionId,
    pub to: RegionId,
    /// The crossed boundary segment, owned by `from`. `None` for corner
    /// neighbors that only share a vertex.
    pub seg: Option<SegId>,
    pub line: Option<NavLineId>,
    /// Witness point on the boundary (the shared vertex for corners).
    pub point: V2Fixed,
    /// Boundary direction; zero for corners.
    pub dir: V2Fixed,
    pub dist: Fixed,
}

impl Neighbor {
    pub fn is_corner(&self) -> bool {
        self.seg.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeChild {
    Node(NodeId),
    Leaf(RegionId),
}

/// A partition line. `children[0]` is the right (front) side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeNode {
    pub origin: V2Fixed,
    pub dir: V2Fixed,
    pub children: [NodeChild; 2],
}

/// Per-region lists of dynamic objects. Not persisted.
#[derive(Clone, Debug, Default)]
struct Occupancy {
    things: Vec<SmallVec<[ThingId; 4]>>,
    lines: Vec<SmallVec<[(LineId, V2Fixed); 2]>>,
    thing_regions: BTreeMap<ThingId, SmallVec<[RegionId; 4]>>,
}

impl Occupancy {
    fn reset(&mut self, regions: usize) {
        self.things = vec![SmallVec::new(); regions];
        self.lines = vec![SmallVec::new(); regions];
        self.thing_regions.clear();
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NavGraph {
    pub vertices: Vec<V2Fixed>,
    pub lines: Vec<NavLine>,
    pub segs: Vec<Seg>,
    pub regions: Vec<Region>,
    pub neighbors: Vec<Neighbor>,
    /// BSP nodes in compiler order; the root is last.
    pub nodes: Vec<TreeNode>,
    pub metasectors: MetaSectorTable,
    pub blockmap: BlockMap,
    pub step_height: Fixed,
    pub agent_radius: Fixed,
    /// How far from a switch an agent can press it.
    pub use_range: Fixed,
    #[serde(skip)]
    occupancy: Occupancy,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

fn vertex_index(index: u32, count: usize, what: impl FnOnce() -> String) -> Result<VertexId, NavError> {
    if (index as usize) < count {
        Ok(VertexId(index))
    } else {
        Err(NavError::VertexOutOfRange {
            what: what(),
            vertex: index,
            count,
        })
    }
}

/// Fraction (16.16) along `origin + t * dir` where it meets the line through
/// `p` along `ldir`. `None` for parallel lines.
fn intercept_fraction(origin: V2Fixed, dir: V2Fixed, p: V2Fixed, ldir: V2Fixed) -> Option<Fixed> {
    let cross = |ux: i128, uy: i128, vx: i128, vy: i128| ux * vy - uy * vx;
    let den = cross(dir.x as i128, dir.y as i128, ldir.x as i128, ldir.y as i128);
    if den == 0 {
        return None;
    }
    let num = cross(
        p.x as i128 - origin.x as i128,
        p.y as i128 - origin.y as i128,
        ldir.x as i128,
        ldir.y as i128,
    );
    let frac = (num << 16) / den;
    Some(frac.clamp(0, 1 << 16) as Fixed)
}

impl NavGraph {
    /// Build the graph by pulling every stream of `source` in order.
    ///
    /// `metasectors` must have one entry per meta-sector height record the
    /// compiler emits. Any out-of-range index aborts the build.
    pub fn build<S: GeometrySource + ?Sized>(
        source: &mut S,
        metasectors: MetaSectorTable,
        config: &NavConfig,
    ) -> Result<Self, NavError> {
        let mut graph = NavGraph {
            metasectors,
            step_height: config.step_height_fixed(),
            agent_radius: config.agent_radius_fixed(),
            use_range: units(config.use_range),
            ..NavGraph::default()
        };

        while let Some(v) = source.next_vertex() {
            graph.vertices.push(v);
        }
        if graph.vertices.is_empty() {
            return Err(NavError::EmptyGeometry("no vertices".into()));
        }

        let mut msec_records = 0;
        while source.next_meta_sector_heights().is_some() {
            msec_records += 1;
        }
        if msec_records != graph.metasectors.len() {
            return Err(NavError::MetaSectorCountMismatch {
                expected: graph.metasectors.len(),
                got: msec_records,
            });
        }

        graph.pull_lines(source)?;
        graph.pull_segments(source)?;
        graph.pull_regions(source)?;
        graph.pull_nodes(source)?;

        graph.add_boundary_neighbors();
        graph.add_corner_neighbors();
        graph.compute_distances();
        graph.build_blockmap(config.block_size_fixed());
        graph.validate()?;
        graph.reset_occupancy();

        info!(
            vertices = graph.vertices.len(),
            lines = graph.lines.len(),
            segs = graph.segs.len(),
            regions = graph.regions.len(),
            neighbors = graph.neighbors.len(),
            nodes = graph.nodes.len(),
            "navigation graph built"
        );
        Ok(graph)
    }

    fn pull_lines<S: GeometrySource + ?Sized>(&mut self, source: &mut S) -> Result<(), NavError> {
        let vcount = self.vertices.len();
        let mcount = self.metasectors.len();
        while let Some(rec) = source.next_line() {
            let index = self.lines.len();
            let msec = |m: Option<u32>| match m {
                None => Ok(MetaSectorId::VOID),
                Some(i) if (i as usize) < mcount => Ok(MetaSectorId(i)),
                Some(i) => Err(NavError::MetaSectorOutOfRange {
                    what: format!("line {index}"),
                    msec: i,
                    count: mcount,
                }),
            };
            let line = NavLine {
                v: [
                    vertex_index(rec.v1, vcount, || format!("line {index}"))?,
                    vertex_index(rec.v2, vcount, || format!("line {index}"))?,
                ],
                msec: [msec(rec.right_msec)?, msec(rec.left_msec)?],
                special_line: rec.special_line,
            };
            self.lines.push(line);
        }
        Ok(())
    }

    fn pull_segments<S: GeometrySource + ?Sized>(&mut self, source: &mut S) -> Result<(), NavError> {
        let vcount = self.vertices.len();
        let mut partners = Vec::new();
        while let Some(rec) = source.next_boundary_segment() {
            let index = self.segs.len();
            let v1 = vertex_index(rec.v1, vcount, || format!("segment {index}"))?;
            let v2 = vertex_index(rec.v2, vcount, || format!("segment {index}"))?;
            let line = match rec.line {
                None => None,
                Some(l) if (l as usize) < self.lines.len() => Some(NavLineId(l)),
                Some(l) => {
                    return Err(NavError::LineOutOfRange {
                        what: format!("segment {index}"),
                        line: l,
                        count: self.lines.len(),
                    });
                }
            };
            let p1 = self.vertices[v1.index()];
            let p2 = self.vertices[v2.index()];
            let mut bbox = BBox::EMPTY;
            bbox.add_point(p1);
            bbox.add_point(p2);
            self.segs.push(Seg {
                v: [v1, v2],
                p1,
                p2,
                dx: p2.x.wrapping_sub(p1.x),
                dy: p2.y.wrapping_sub(p1.y),
                line,
                is_back: rec.is_back,
                partner: None,
                owner: NO_REGION,
                bbox,
                mid: p1.midpoint(p2),
            });
            partners.push(rec.partner);
        }
        if self.segs.is_empty() {
            return Err(NavError::EmptyGeometry("no boundary segments".into()));
        }
        let count = self.segs.len();
        for (i, partner) in partners.into_iter().enumerate() {
            if let Some(p) = partner {
                if p as usize >= count {
                    return Err(NavError::SegmentOutOfRange {
                        what: format!("segment {i} partner"),
                        seg: p,
                        count,
                    });
                }
                self.segs[i].partner = Some(SegId(p));
            }
        }
        Ok(())
    }

    fn pull_regions<S: GeometrySource + ?Sized>(&mut self, source: &mut S) -> Result<(), NavError> {
        while let Some(rec) = source.next_leaf_region() {
            let id = RegionId(self.regions.len() as u32);
            if rec.seg_count == 0 {
                return Err(NavError::EmptyGeometry(format!("leaf region {} has no segments", id.0)));
            }
            let end = rec.first_seg as u64 + rec.seg_count as u64;
            if end > self.segs.len() as u64 {
                return Err(NavError::SegmentOutOfRange {
                    what: format!("leaf region {}", id.0),
                    seg: (end - 1).min(u32::MAX as u64) as u32,
                    count: self.segs.len(),
                });
            }
            let range = rec.first_seg as usize..end as usize;
            for seg in &mut self.segs[range.clone()] {
                seg.owner = id;
            }

            let segs = &self.segs[range];
            let lines = &self.lines;
            let msector = segs
                .iter()
                .find_map(|s| s.line.map(|l| lines[l.index()].msec[s.is_back as usize]))
                .unwrap_or(MetaSectorId::VOID);
            let centroid = polygon_centroid(segs.iter().map(|s| (s.p1, s.p2)))
                .or_else(|| average_point(segs.iter().map(|s| s.p1)))
                .unwrap_or(V2Fixed::ZERO);

            self.regions.push(Region {
                id,
                first_seg: SegId(rec.first_seg),
                seg_count: rec.seg_count,
                msector,
                centroid,
                neighbors: SmallVec::new(),
            });
        }
        if self.regions.is_empty() {
            return Err(NavError::EmptyGeometry("no leaf regions".into()));
        }
        let orphans = self.segs.iter().filter(|s| s.owner == NO_REGION).count();
        if orphans > 0 {
            warn!(orphans, "boundary segments not owned by any leaf region");
        }
        Ok(())
    }

    fn pull_nodes<S: GeometrySource + ?Sized>(&mut self, source: &mut S) -> Result<(), NavError> {
        let records: Vec<_> = std::iter::from_fn(|| source.next_tree_node()).collect();
        let region_count = self.regions.len();
        for (i, rec) in records.iter().enumerate() {
            let child = |index: u32, is_leaf: bool| {
                if is_leaf {
                    if (index as usize) < region_count {
                        Ok(NodeChild::Leaf(RegionId(index)))
                    } else {
                        Err(NavError::RegionOutOfRange {
                            what: format!("tree node {i}"),
                            region: index,
                            count: region_count,
                        })
                    }
                } else if (index as usize) < records.len() {
                    Ok(NodeChild::Node(NodeId(index)))
                } else {
                    Err(NavError::NodeChildOutOfRange {
                        node: i,
                        child: index,
                        count: records.len(),
                    })
                }
            };
            let children = [
                child(rec.right, rec.right_is_leaf)?,
                child(rec.left, rec.left_is_leaf)?,
            ];
            self.nodes.push(TreeNode {
                origin: V2Fixed::new(rec.x, rec.y),
                dir: V2Fixed::new(rec.dx, rec.dy),
                children,
            });
        }
        Ok(())
    }

    /// Append an edge to `from`'s list. The distance is filled in later by
    /// `compute_distances()`, once every centroid is known.
    fn add_neighbor(&mut self, from: RegionId, to: RegionId, seg: Option<SegId>, point: V2Fixed) -> NeighborId {
        let id = NeighborId(self.neighbors.len() as u32);
        let (line, dir) = match seg {
            Some(s) => {
                let s = &self.segs[s.index()];
                (s.line, s.dir())
            }
            None => (None, V2Fixed::ZERO),
        };
        self.neighbors.push(Neighbor {
            id,
            from,
            to,
            seg,
            line,
            point,
            dir,
            dist: 0,
        });
        self.regions[from.index()].neighbors.push(id);
        id
    }

    /// One reciprocal pair per partnered segment pair.
    fn add_boundary_neighbors(&mut self) {
        for i in 0..self.segs.len() {
            let Some(partner) = self.segs[i].partner else {
                continue;
            };
            let p = partner.index();
            // Matched pairs are handled from their lower index.
            if p < i && self.segs[p].partner == Some(SegId(i as u32)) {
                continue;
            }
            let (a, b) = (self.segs[i].owner, self.segs[p].owner);
            if a == NO_REGION || b == NO_REGION {
                continue;
            }
            if a == b {
                warn!(seg = i, region = a.0, "segment pair joins a region to itself; skipped");
                continue;
            }
            let (pa, pb) = (self.segs[i].p1, self.segs[p].p1);
            self.add_neighbor(a, b, Some(SegId(i as u32)), pa);
            self.add_neighbor(b, a, Some(partner), pb);
        }
    }

    /// Regions that meet only at a vertex get a reciprocal corner pair.
    fn add_corner_neighbors(&mut self) {
        let mut at_vertex: BTreeMap<VertexId, BTreeSet<RegionId>> = BTreeMap::new();
        for seg in &self.segs {
            if seg.owner == NO_REGION {
                continue;
            }
            for v in seg.v {
                at_vertex.entry(v).or_default().insert(seg.owner);
            }
        }

        let mut joined: BTreeSet<(RegionId, RegionId)> = self.neighbors.iter().map(|n| (n.from, n.to)).collect();
        for (v, regions) in at_vertex {
            let regions: Vec<RegionId> = regions.into_iter().collect();
            let point = self.vertices[v.index()];
            for (i, &a) in regions.iter().enumerate() {
                for &b in &regions[i + 1..] {
                    if joined.contains(&(a, b)) {
                        continue;
                    }
                    self.add_neighbor(a, b, None, point);
                    self.add_neighbor(b, a, None, point);
                    joined.insert((a, b));
                    joined.insert((b, a));
                }
            }
        }
    }

    fn compute_distances(&mut self) {
        let regions = &self.regions;
        self.neighbors.par_iter_mut().for_each(|n| {
            let a = regions[n.from.index()].centroid;
            let b = regions[n.to.index()].centroid;
            n.dist = if n.seg.is_some() {
                a.distance(b)
            } else {
                a.distance(n.point).saturating_add(n.point.distance(b))
            };
        });
    }

    fn build_blockmap(&mut self, block_size: Fixed) {
        let mut bounds = BBox::EMPTY;
        for &v in &self.vertices {
            bounds.add_point(v);
        }
        let pad = self.agent_radius / 2 + units(8);
        let mut blockmap = BlockMap::new(bounds, block_size, pad);
        for (i, seg) in self.segs.iter().enumerate() {
            blockmap.insert_seg(SegId(i as u32), seg.p1, seg.p2);
        }
        for (i, line) in self.lines.iter().enumerate() {
            let a = self.vertices[line.v[0].index()];
            let b = self.vertices[line.v[1].index()];
            blockmap.insert_line(NavLineId(i as u32), a, b);
        }
        self.blockmap = blockmap;
    }

    /// Check every stored index and the shape of the tree. Run after the
    /// build and after loading a cached graph.
    pub fn validate(&self) -> Result<(), NavError> {
        let (vcount, lcount, scount, rcount) = (
            self.vertices.len(),
            self.lines.len(),
            self.segs.len(),
            self.regions.len(),
        );
        let mcount = self.metasectors.len();
        let check_msec = |m: MetaSectorId, what: String| {
            if m.is_void() || m.index() < mcount {
                Ok(())
            } else {
                Err(NavError::MetaSectorOutOfRange {
                    what,
                    msec: m.0,
                    count: mcount,
                })
            }
        };
        let check_region = |r: RegionId, what: String| {
            if r.index() < rcount {
                Ok(())
            } else {
                Err(NavError::RegionOutOfRange {
                    what,
                    region: r.0,
                    count: rcount,
                })
            }
        };

        for (i, line) in self.lines.iter().enumerate() {
            for v in line.v {
                vertex_index(v.0, vcount, || format!("line {i}"))?;
            }
            for m in line.msec {
                check_msec(m, format!("line {i}"))?;
            }
        }
        for (i, seg) in self.segs.iter().enumerate() {
            for v in seg.v {
                vertex_index(v.0, vcount, || format!("segment {i}"))?;
            }
            if let Some(l) = seg.line.filter(|l| l.index() >= lcount) {
                return Err(NavError::LineOutOfRange {
                    what: format!("segment {i}"),
                    line: l.0,
                    count: lcount,
                });
            }
            if let Some(p) = seg.partner.filter(|p| p.index() >= scount) {
                return Err(NavError::SegmentOutOfRange {
                    what: format!("segment {i} partner"),
                    seg: p.0,
                    count: scount,
                });
            }
            if seg.owner != NO_REGION {
                check_region(seg.owner, format!("segment {i}"))?;
            }
        }
        for (i, region) in self.regions.iter().enumerate() {
            if region.id.index() != i {
                return Err(NavError::RegionOutOfRange {
                    what: format!("region slot {i}"),
                    region: region.id.0,
                    count: rcount,
                });
            }
            let range = region.seg_range();
            if region.seg_count == 0 || range.end > scount {
                return Err(NavError::SegmentOutOfRange {
                    what: format!("leaf region {i}"),
                    seg: range.end.saturating_sub(1) as u32,
                    count: scount,
                });
            }
            check_msec(region.msector, format!("leaf region {i}"))?;
            for &n in &region.neighbors {
                match self.neighbors.get(n.index()) {
                    Some(nb) if nb.from == region.id => {}
                    _ => {
                        return Err(NavError::BadLevel(format!(
                            "leaf region {i} lists neighbor {} it does not own",
                            n.0
                        )));
                    }
                }
            }
        }
        for (i, n) in self.neighbors.iter().enumerate() {
            check_region(n.from, format!("neighbor {i}"))?;
            check_region(n.to, format!("neighbor {i}"))?;
            if let Some(s) = n.seg.filter(|s| s.index() >= scount) {
                return Err(NavError::SegmentOutOfRange {
                    what: format!("neighbor {i}"),
                    seg: s.0,
                    count: scount,
                });
            }
            if let Some(l) = n.line.filter(|l| l.index() >= lcount) {
                return Err(NavError::LineOutOfRange {
                    what: format!("neighbor {i}"),
                    line: l.0,
                    count: lcount,
                });
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            for child in node.children {
                match child {
                    NodeChild::Leaf(r) => check_region(r, format!("tree node {i}"))?,
                    NodeChild::Node(n) if n.index() >= self.nodes.len() => {
                        return Err(NavError::NodeChildOutOfRange {
                            node: i,
                            child: n.0,
                            count: self.nodes.len(),
                        });
                    }
                    NodeChild::Node(_) => {}
                }
            }
        }

        if let Some(root) = self.nodes.len().checked_sub(1) {
            let mut seen = vec![false; self.nodes.len()];
            let mut stack = vec![root];
            while let Some(i) = stack.pop() {
                if seen[i] {
                    return Err(NavError::TreeNodeRevisited(i));
                }
                seen[i] = true;
                for child in self.nodes[i].children {
                    if let NodeChild::Node(n) = child {
                        stack.push(n.index());
                    }
                }
            }
        }
        Ok(())
    }

    /// Check the graph against the level it is used with: the meta-sector
    /// table must fit the level's sectors and special lines must exist.
    pub fn validate_level(&self, level: &Level) -> Result<(), NavError> {
        self.metasectors.validate(level.sector_count())?;
        for (i, line) in self.lines.iter().enumerate() {
            if let Some(l) = line.special_line.filter(|l| l.index() >= level.lines.len()) {
                return Err(NavError::LineOutOfRange {
                    what: format!("navigation line {i}"),
                    line: l.0,
                    count: level.lines.len(),
                });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.index()]
    }

    pub fn neighbor(&self, id: NeighborId) -> &Neighbor {
        &self.neighbors[id.index()]
    }

    pub fn seg(&self, id: SegId) -> &Seg {
        &self.segs[id.index()]
    }

    pub fn line(&self, id: NavLineId) -> &NavLine {
        &self.lines[id.index()]
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Outgoing edges of `region`, in creation order.
    pub fn neighbors_of(&self, region: RegionId) -> impl Iterator<Item = &Neighbor> + '_ {
        self.regions[region.index()].neighbors.iter().map(|&n| &self.neighbors[n.index()])
    }

    pub fn region_floor<H: HeightSource + ?Sized>(&self, region: RegionId, h: &H) -> Fixed {
        self.metasectors.floor_height(self.region(region).msector, h)
    }

    pub fn region_ceiling<H: HeightSource + ?Sized>(&self, region: RegionId, h: &H) -> Fixed {
        self.metasectors.ceiling_height(self.region(region).msector, h)
    }

    pub fn region_floor_sector<H: HeightSource + ?Sized>(&self, region: RegionId, h: &H) -> Option<SectorId> {
        self.metasectors.floor_sector(self.region(region).msector, h)
    }

    // -----------------------------------------------------------------------
    // Spatial queries
    // -----------------------------------------------------------------------

    /// The leaf region containing `p`. With no tree (a single region) this
    /// is region 0.
    pub fn point_to_region(&self, p: V2Fixed) -> RegionId {
        let Some(mut node) = self.nodes.len().checked_sub(1) else {
            return RegionId(0);
        };
        for _ in 0..self.nodes.len() {
            let n = &self.nodes[node];
            match n.children[point_on_side(p, n.origin, n.dir)] {
                NodeChild::Leaf(r) => return r,
                NodeChild::Node(next) => node = next.index(),
            }
        }
        RegionId(0)
    }

    fn touch_seg(&self, seg: SegId, out: &mut BTreeSet<RegionId>) {
        let seg = &self.segs[seg.index()];
        if seg.owner != NO_REGION {
            out.insert(seg.owner);
        }
        if let Some(p) = seg.partner {
            let owner = self.segs[p.index()].owner;
            if owner != NO_REGION {
                out.insert(owner);
            }
        }
    }

    /// Regions overlapped by `bbox`, sorted. Always includes the region
    /// containing the box centre.
    pub fn regions_touched_by_box(&self, bbox: &BBox) -> Vec<RegionId> {
        let mut out = BTreeSet::new();
        if bbox.is_empty() {
            return Vec::new();
        }
        let center = V2Fixed::new(
            ((bbox.left as i64 + bbox.right as i64) / 2) as Fixed,
            ((bbox.bottom as i64 + bbox.top as i64) / 2) as Fixed,
        );
        out.insert(self.point_to_region(center));
        for cell in self.blockmap.cells_in_box(bbox) {
            for &seg in self.blockmap.segs(cell) {
                let s = &self.segs[seg.index()];
                if s.bbox.intersects(bbox) && box_on_line_side(bbox, s.p1, s.dir()).is_none() {
                    self.touch_seg(seg, &mut out);
                }
            }
        }
        out.into_iter().collect()
    }

    /// Regions crossed by the segment `a`-`b`, sorted. Always includes the
    /// regions containing both endpoints.
    pub fn regions_touched_by_line(&self, a: V2Fixed, b: V2Fixed) -> Vec<RegionId> {
        let mut out = BTreeSet::new();
        out.insert(self.point_to_region(a));
        out.insert(self.point_to_region(b));
        for cell in self.blockmap.cells_on_line(a, b) {
            for &seg in self.blockmap.segs(cell) {
                let s = &self.segs[seg.index()];
                if segments_intersect(a, b, s.p1, s.p2) {
                    self.touch_seg(seg, &mut out);
                }
            }
        }
        out.into_iter().collect()
    }

    /// Walk the trace `a`-`b` through the block grid and report every
    /// navigation line it crosses, nearest first, with the 16.16 fraction of
    /// the trace at the crossing. Stops and returns false as soon as `hit`
    /// does; returns true once every crossing has been reported.
    pub fn path_traverse<F>(&self, a: V2Fixed, b: V2Fixed, mut hit: F) -> bool
    where
        F: FnMut(NavLineId, &NavLine, Fixed) -> bool,
    {
        let dir = V2Fixed::new(b.x.wrapping_sub(a.x), b.y.wrapping_sub(a.y));
        let mut seen = vec![false; self.lines.len()];
        let mut intercepts: Vec<(Fixed, NavLineId)> = Vec::new();
        for cell in self.blockmap.cells_on_line(a, b) {
            for &id in self.blockmap.lines(cell) {
                let Some(flag) = seen.get_mut(id.index()) else {
                    continue;
                };
                if *flag {
                    continue;
                }
                *flag = true;
                let line = &self.lines[id.index()];
                let p1 = self.vertices[line.v[0].index()];
                let p2 = self.vertices[line.v[1].index()];
                if point_on_side(p1, a, dir) == point_on_side(p2, a, dir) {
                    continue;
                }
                let ldir = V2Fixed::new(p2.x.wrapping_sub(p1.x), p2.y.wrapping_sub(p1.y));
                if point_on_side(a, p1, ldir) == point_on_side(b, p1, ldir) {
                    continue;
                }
                if let Some(frac) = intercept_fraction(a, dir, p1, ldir) {
                    intercepts.push((frac, id));
                }
            }
        }
        intercepts.sort_unstable();
        intercepts
            .into_iter()
            .all(|(frac, id)| hit(id, &self.lines[id.index()], frac))
    }

    /// Whether the straight walk `a`-`b` crosses no solid wall: no line with
    /// the void on either side.
    pub fn sight_clear(&self, a: V2Fixed, b: V2Fixed) -> bool {
        self.path_traverse(a, b, |_, line, _| !line.msec.iter().any(|m| m.is_void()))
    }

    // -----------------------------------------------------------------------
    // Passability
    // -----------------------------------------------------------------------

    /// Can an agent of `height` move from `from` into `to`, given the heights
    /// in `h`? Either of the destination's two floors may satisfy the step
    /// limit, so a moving platform is passable at both ends of its travel.
    pub fn can_pass<H: HeightSource + ?Sized>(&self, from: RegionId, to: RegionId, height: Fixed, h: &H) -> bool {
        let m0 = self.regions[from.index()].msector;
        let m1 = self.regions[to.index()].msector;
        if m0 == m1 {
            return true;
        }
        let t = &self.metasectors;
        let f1 = t.floor_height(m1, h);
        let a1 = t.alt_floor_height(m1, h);
        let c1 = t.ceiling_height(m1, h);
        if (f1 == NO_FLOOR && a1 == NO_FLOOR) || c1 == NO_CEILING {
            return false;
        }
        let f0 = t.floor_height(m0, h) as i64;
        let a0 = t.alt_floor_height(m0, h) as i64;
        let c0 = t.ceiling_height(m0, h) as i64;
        let (f1, a1, c1) = (f1 as i64, a1 as i64, c1 as i64);
        let step = self.step_height as i64;
        let height = height as i64;

        if f1 - f0 > step && a1 - a0 > step {
            return false;
        }
        !((c1 - f0 < height && c1 - a0 < height)
            || (c1 - f1 < height && c1 - a1 < height)
            || (c0 - f1 < height && c0 - a1 < height))
    }

    /// `can_pass()` on this tick's real heights, without the alternate floor.
    pub fn can_pass_now(&self, from: RegionId, to: RegionId, height: Fixed, level: &Level) -> bool {
        let m0 = self.regions[from.index()].msector;
        let m1 = self.regions[to.index()].msector;
        if m0 == m1 {
            return true;
        }
        let h = InstantHeights(level);
        let t = &self.metasectors;
        let f1 = t.floor_height(m1, &h);
        let c1 = t.ceiling_height(m1, &h);
        if f1 == NO_FLOOR || c1 == NO_CEILING {
            return false;
        }
        let f0 = t.floor_height(m0, &h) as i64;
        let c0 = t.ceiling_height(m0, &h) as i64;
        let (f1, c1) = (f1 as i64, c1 as i64);
        let height = height as i64;
        f1 - f0 <= self.step_height as i64 && c1 - f0 >= height && c1 - f1 >= height && c0 - f1 >= height
    }

    // -----------------------------------------------------------------------
    // Occupancy
    // -----------------------------------------------------------------------

    /// Empty every per-region object list. Needed after a cache load.
    pub fn reset_occupancy(&mut self) {
        self.occupancy.reset(self.regions.len());
    }

    /// Register `thing` in every region its box (own radius plus the agent
    /// radius) overlaps. Replaces any earlier registration.
    pub fn set_thing_position(&mut self, thing: ThingId, pos: V2Fixed, radius: Fixed) {
        self.unset_thing_position(thing);
        let bbox = BBox::around(pos, radius.saturating_add(self.agent_radius));
        let regions = self.regions_touched_by_box(&bbox);
        for &r in &regions {
            if let Some(list) = self.occupancy.things.get_mut(r.index()) {
                list.push(thing);
            }
        }
        self.occupancy.thing_regions.insert(thing, regions.into_iter().collect());
    }

    pub fn unset_thing_position(&mut self, thing: ThingId) {
        let Some(regions) = self.occupancy.thing_regions.remove(&thing) else {
            return;
        };
        for r in regions {
            if let Some(list) = self.occupancy.things.get_mut(r.index()) {
                list.retain(|t| *t != thing);
            }
        }
    }

    fn register_line(&mut self, line: LineId, mid: V2Fixed, regions: Vec<RegionId>) {
        for r in regions {
            if let Some(list) = self.occupancy.lines.get_mut(r.index()) {
                if !list.iter().any(|(l, _)| *l == line) {
                    list.push((line, mid));
                }
            }
        }
    }

    /// Register a trigger line, with its midpoint, in every region it touches.
    pub fn set_line_position(&mut self, line: LineId, a: V2Fixed, b: V2Fixed) {
        let regions = self.regions_touched_by_line(a, b);
        self.register_line(line, a.midpoint(b), regions);
    }

    /// Register a switch or door line in every region within `use_range`.
    pub fn set_use_line_position(&mut self, line: LineId, a: V2Fixed, b: V2Fixed) {
        let mut reach = BBox::EMPTY;
        reach.add_point(a);
        reach.add_point(b);
        reach.left = reach.left.saturating_sub(self.use_range);
        reach.bottom = reach.bottom.saturating_sub(self.use_range);
        reach.right = reach.right.saturating_add(self.use_range);
        reach.top = reach.top.saturating_add(self.use_range);
        let mut regions = self.regions_touched_by_line(a, b);
        regions.extend(self.regions_touched_by_box(&reach));
        regions.sort_unstable();
        regions.dedup();
        self.register_line(line, a.midpoint(b), regions);
    }

    /// Reset occupancy and register every thing and special line of `level`.
    pub fn register_level_objects(&mut self, level: &Level) {
        self.reset_occupancy();
        for (i, thing) in level.things.iter().enumerate() {
            self.set_thing_position(ThingId(i as u32), thing.pos, thing.radius);
        }
        let mut registered = 0;
        for (i, line) in level.lines.iter().enumerate() {
            let Some(special) = line_special(line) else {
                continue;
            };
            let id = LineId(i as u32);
            match special.activation.trigger() {
                Trigger::Switch | Trigger::Manual => self.set_use_line_position(id, line.v1, line.v2),
                Trigger::Walk | Trigger::Gun => self.set_line_position(id, line.v1, line.v2),
            }
            registered += 1;
        }
        info!(things = level.things.len(), lines = registered, "registered level objects");
    }

    pub fn things_in(&self, region: RegionId) -> &[ThingId] {
        self.occupancy.things.get(region.index()).map_or(&[], |l| l.as_slice())
    }

    pub fn lines_in(&self, region: RegionId) -> &[(LineId, V2Fixed)] {
        self.occupancy.lines.get(region.index()).map_or(&[], |l| l.as_slice())
    }

    pub fn regions_of_thing(&self, thing: ThingId) -> &[RegionId] {
        self.occupancy.thing_regions.get(&thing).map_or(&[], |r| r.as_slice())
    }
}
