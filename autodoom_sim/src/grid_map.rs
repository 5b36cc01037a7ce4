// Square-cell reference compiler.
//
// Builds a complete level from a grid of square cells: the `Level`
// snapshot, the `CompiledGeometry` a BSP compiler would emit for it, and the
// meta-sector table. Every open cell is its own sector and its own convex
// leaf region, so region and sector indices coincide (row-major over open
// cells). Closed cells are solid rock.
//
// Line directions: vertical lines run north with the east cell in front,
// horizontal lines run east with the south cell in front. One-sided lines
// turn so the open cell is in front. `flip_edge()` reverses a two-sided
// line, which matters for specials that act on the back sector.
//
// The partition tree halves the grid along its longer axis until a single
// cell remains; subtrees with no open cell collapse away.
//
// See also: `compiler.rs` for the record formats, `nav.rs` for the graph
// built from them. Used by tests, the scenario crate and the benches.

use crate::compiler::{CompiledGeometry, LeafRecord, LineRecord, NodeRecord, SegmentRecord};
use crate::config::NavConfig;
use crate::error::NavError;
use crate::level::{Level, Line, Sector, SectorDamage, Thing, ThingKind};
use crate::metasector::MetaSectorTable;
use crate::nav::NavGraph;
use crate::types::{LineId, RegionId, SectorId, V2Fixed, units};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Side {
    West,
    North,
    East,
    South,
}

impl Side {
    /// Segment order within a cell's leaf: clockwise from the west wall.
    const ALL: [Side; 4] = [Side::West, Side::North, Side::East, Side::South];

    fn index(self) -> u32 {
        self as u32
    }

    fn opposite(self) -> Side {
        match self {
            Side::West => Side::East,
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
        }
    }
}

/// A unit edge of the grid, named by its lower-left grid vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    Vertical { x: u32, y: u32 },
    Horizontal { x: u32, y: u32 },
}

fn edge_of(cx: u32, cy: u32, side: Side) -> Edge {
    match side {
        Side::West => Edge::Vertical { x: cx, y: cy },
        Side::East => Edge::Vertical { x: cx + 1, y: cy },
        Side::South => Edge::Horizontal { x: cx, y: cy },
        Side::North => Edge::Horizontal { x: cx, y: cy + 1 },
    }
}

/// Heights and attributes of one open cell, in whole map units.
#[derive(Clone, Debug, PartialEq)]
pub struct CellSpec {
    pub floor: i32,
    pub ceiling: i32,
    pub floor_pic: u16,
    pub tag: i32,
    pub damage: SectorDamage,
}

impl CellSpec {
    pub fn new(floor: i32, ceiling: i32) -> Self {
        Self {
            floor,
            ceiling,
            floor_pic: 0,
            tag: 0,
            damage: SectorDamage::default(),
        }
    }

    pub fn with_tag(mut self, tag: i32) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_floor_pic(mut self, pic: u16) -> Self {
        self.floor_pic = pic;
        self
    }

    pub fn with_damage(mut self, amount: i32, interval: u32) -> Self {
        self.damage = SectorDamage { amount, interval };
        self
    }

    fn sector(&self) -> Sector {
        Sector::new(units(self.floor), units(self.ceiling))
            .with_tag(self.tag)
            .with_floor_pic(self.floor_pic)
            .with_damage(self.damage.amount, self.damage.interval)
    }
}

#[derive(Clone, Debug)]
pub struct GridMap {
    width: u32,
    height: u32,
    cell_size: i32,
    cells: Vec<Option<CellSpec>>,
    specials: BTreeMap<Edge, (u16, i32)>,
    flipped: BTreeSet<Edge>,
    things: Vec<(ThingKind, u32, u32)>,
}

impl GridMap {
    /// An all-solid grid of `width` x `height` cells, `cell_size` units wide.
    pub fn new(width: u32, height: u32, cell_size: i32) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![None; (width * height) as usize],
            specials: BTreeMap::new(),
            flipped: BTreeSet::new(),
            things: Vec::new(),
        }
    }

    fn cell_index(&self, cx: u32, cy: u32) -> Option<usize> {
        (cx < self.width && cy < self.height).then(|| (cy * self.width + cx) as usize)
    }

    pub fn set_cell(&mut self, cx: u32, cy: u32, spec: CellSpec) -> &mut Self {
        match self.cell_index(cx, cy) {
            Some(i) => self.cells[i] = Some(spec),
            None => warn!(cx, cy, "cell outside the grid ignored"),
        }
        self
    }

    /// Open every cell in the inclusive rectangle.
    pub fn fill(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, spec: CellSpec) -> &mut Self {
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                self.set_cell(cx, cy, spec.clone());
            }
        }
        self
    }

    pub fn clear_cell(&mut self, cx: u32, cy: u32) -> &mut Self {
        if let Some(i) = self.cell_index(cx, cy) {
            self.cells[i] = None;
        }
        self
    }

    pub fn set_edge_special(&mut self, cx: u32, cy: u32, side: Side, special: u16, tag: i32) -> &mut Self {
        self.specials.insert(edge_of(cx, cy, side), (special, tag));
        self
    }

    /// Reverse the line on this edge. Only two-sided lines can be flipped.
    pub fn flip_edge(&mut self, cx: u32, cy: u32, side: Side) -> &mut Self {
        self.flipped.insert(edge_of(cx, cy, side));
        self
    }

    /// Place a thing at the centre of a cell.
    pub fn add_thing(&mut self, kind: ThingKind, cx: u32, cy: u32) -> &mut Self {
        self.things.push((kind, cx, cy));
        self
    }

    fn vertex_index(&self, (x, y): (u32, u32)) -> u32 {
        y * (self.width + 1) + x
    }

    fn vertex_at(&self, (x, y): (u32, u32)) -> V2Fixed {
        V2Fixed::from_units(x as i32 * self.cell_size, y as i32 * self.cell_size)
    }

    pub fn build(&self) -> Result<GridLevel, NavError> {
        let (w, h) = (self.width, self.height);
        let mut cell_sector = vec![None; self.cells.len()];
        let mut sectors = Vec::new();
        for (i, cell) in self.cells.iter().enumerate() {
            if let Some(spec) = cell {
                cell_sector[i] = Some(SectorId(sectors.len() as u32));
                sectors.push(spec.sector());
            }
        }
        if sectors.is_empty() {
            return Err(NavError::EmptyGeometry("grid map has no open cells".into()));
        }
        let sector_at = |cx: u32, cy: u32| self.cell_index(cx, cy).and_then(|i| cell_sector[i]);

        let mut lines = Vec::new();
        let mut line_records = Vec::new();
        let mut edge_lines: BTreeMap<Edge, (LineId, (u32, u32))> = BTreeMap::new();
        let vertical = (0..=w).flat_map(|x| (0..h).map(move |y| Edge::Vertical { x, y }));
        let horizontal = (0..=h).flat_map(|y| (0..w).map(move |x| Edge::Horizontal { x, y }));
        for edge in vertical.chain(horizontal) {
            let (a, b, right, left) = match edge {
                Edge::Vertical { x, y } => (
                    (x, y),
                    (x, y + 1),
                    sector_at(x, y),
                    x.checked_sub(1).and_then(|wx| sector_at(wx, y)),
                ),
                Edge::Horizontal { x, y } => (
                    (x, y),
                    (x + 1, y),
                    y.checked_sub(1).and_then(|sy| sector_at(x, sy)),
                    sector_at(x, y),
                ),
            };
            let flip = match (right, left) {
                (None, None) => continue,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some(_), Some(_)) => self.flipped.contains(&edge),
            };
            let (v1, v2, front, back) = if flip { (b, a, left, right) } else { (a, b, right, left) };
            let Some(front) = front else {
                continue;
            };
            let (special, tag) = self.specials.get(&edge).copied().unwrap_or((0, 0));
            let id = LineId(lines.len() as u32);
            lines.push(Line::new(self.vertex_at(v1), self.vertex_at(v2), front, back).with_special(special, tag));
            line_records.push(LineRecord {
                v1: self.vertex_index(v1),
                v2: self.vertex_index(v2),
                right_msec: Some(front.0),
                left_msec: back.map(|s| s.0),
                special_line: (special != 0).then_some(id),
            });
            edge_lines.insert(edge, (id, v1));
        }

        let mut things = Vec::new();
        for &(kind, cx, cy) in &self.things {
            let Some(sector) = sector_at(cx, cy) else {
                return Err(NavError::BadLevel(format!("thing placed in solid cell ({cx}, {cy})")));
            };
            things.push(Thing::new(kind, self.cell_center(cx, cy), sector));
        }
        let level = Level::new(sectors, lines, things)?;
        let metasectors = MetaSectorTable::simple_per_sector(&level);

        let mut segments = Vec::new();
        let mut leaves = Vec::new();
        for cy in 0..h {
            for cx in 0..w {
                if sector_at(cx, cy).is_none() {
                    continue;
                }
                leaves.push(LeafRecord {
                    first_seg: segments.len() as u32,
                    seg_count: 4,
                });
                for side in Side::ALL {
                    let (start, end) = match side {
                        Side::West => ((cx, cy), (cx, cy + 1)),
                        Side::North => ((cx, cy + 1), (cx + 1, cy + 1)),
                        Side::East => ((cx + 1, cy + 1), (cx + 1, cy)),
                        Side::South => ((cx + 1, cy), (cx, cy)),
                    };
                    let across = match side {
                        Side::West => cx.checked_sub(1).map(|x| (x, cy)),
                        Side::North => Some((cx, cy + 1)),
                        Side::East => Some((cx + 1, cy)),
                        Side::South => cy.checked_sub(1).map(|y| (cx, y)),
                    };
                    let partner = across
                        .and_then(|(x, y)| sector_at(x, y))
                        .map(|s| s.0 * 4 + side.opposite().index());
                    let line = edge_lines.get(&edge_of(cx, cy, side)).copied();
                    segments.push(SegmentRecord {
                        v1: self.vertex_index(start),
                        v2: self.vertex_index(end),
                        is_back: line.is_some_and(|(_, line_start)| line_start != start),
                        line: line.map(|(id, _)| id.0),
                        partner,
                    });
                }
            }
        }

        let mut nodes = Vec::new();
        self.build_tree((0, 0, w, h), &sector_at, &mut nodes);

        let geometry = CompiledGeometry::new(
            (0..=h)
                .flat_map(|y| (0..=w).map(move |x| (x, y)))
                .map(|p| self.vertex_at(p))
                .collect(),
            level.sectors.iter().map(|s| (s.floor, s.ceiling)).collect(),
            line_records,
            segments,
            leaves,
            nodes,
        );

        Ok(GridLevel {
            level,
            geometry,
            metasectors,
            width: w,
            height: h,
            cell_size: self.cell_size,
            cell_sector,
            edge_lines: edge_lines.into_iter().map(|(e, (id, _))| (e, id)).collect(),
        })
    }

    /// Partition the half-open cell rectangle `(x0, y0, x1, y1)`. Returns the
    /// subtree root as `(index, is_leaf)`, or `None` if it holds no open cell.
    fn build_tree(
        &self,
        (x0, y0, x1, y1): (u32, u32, u32, u32),
        sector_at: &dyn Fn(u32, u32) -> Option<SectorId>,
        nodes: &mut Vec<NodeRecord>,
    ) -> Option<(u32, bool)> {
        let (wd, ht) = (x1 - x0, y1 - y0);
        if wd == 0 || ht == 0 {
            return None;
        }
        if wd == 1 && ht == 1 {
            return sector_at(x0, y0).map(|s| (s.0, true));
        }
        let cs = self.cell_size;
        // Right is east of a vertical cut and south of a horizontal one.
        let (record, right, left) = if wd >= ht {
            let mid = x0 + wd / 2;
            let east = self.build_tree((mid, y0, x1, y1), sector_at, nodes);
            let west = self.build_tree((x0, y0, mid, y1), sector_at, nodes);
            let record = NodeRecord {
                x: units(mid as i32 * cs),
                y: 0,
                dx: 0,
                dy: units(cs),
                right: 0,
                left: 0,
                right_is_leaf: false,
                left_is_leaf: false,
            };
            (record, east, west)
        } else {
            let mid = y0 + ht / 2;
            let north = self.build_tree((x0, mid, x1, y1), sector_at, nodes);
            let south = self.build_tree((x0, y0, x1, mid), sector_at, nodes);
            let record = NodeRecord {
                x: 0,
                y: units(mid as i32 * cs),
                dx: units(cs),
                dy: 0,
                right: 0,
                left: 0,
                right_is_leaf: false,
                left_is_leaf: false,
            };
            (record, south, north)
        };
        match (right, left) {
            (Some(r), Some(l)) => {
                nodes.push(NodeRecord {
                    right: r.0,
                    right_is_leaf: r.1,
                    left: l.0,
                    left_is_leaf: l.1,
                    ..record
                });
                Some((nodes.len() as u32 - 1, false))
            }
            (one, None) | (None, one) => one,
        }
    }

    fn cell_center(&self, cx: u32, cy: u32) -> V2Fixed {
        let half = units(self.cell_size) / 2;
        V2Fixed::new(
            units(cx as i32 * self.cell_size) + half,
            units(cy as i32 * self.cell_size) + half,
        )
    }
}

/// A built grid map with cell-addressed lookups.
#[derive(Clone, Debug)]
pub struct GridLevel {
    pub level: Level,
    pub geometry: CompiledGeometry,
    pub metasectors: MetaSectorTable,
    width: u32,
    height: u32,
    cell_size: i32,
    cell_sector: Vec<Option<SectorId>>,
    edge_lines: BTreeMap<Edge, LineId>,
}

impl GridLevel {
    pub fn sector(&self, cx: u32, cy: u32) -> Option<SectorId> {
        if cx < self.width && cy < self.height {
            self.cell_sector[(cy * self.width + cx) as usize]
        } else {
            None
        }
    }

    /// Leaf region of an open cell. Same index as its sector.
    pub fn region(&self, cx: u32, cy: u32) -> Option<RegionId> {
        self.sector(cx, cy).map(|s| RegionId(s.0))
    }

    pub fn center(&self, cx: u32, cy: u32) -> V2Fixed {
        let half = units(self.cell_size) / 2;
        V2Fixed::new(
            units(cx as i32 * self.cell_size) + half,
            units(cy as i32 * self.cell_size) + half,
        )
    }

    /// The level line on one side of a cell, if that edge has one.
    pub fn line_at(&self, cx: u32, cy: u32, side: Side) -> Option<LineId> {
        self.edge_lines.get(&edge_of(cx, cy, side)).copied()
    }

    /// Run the navigation graph builder over a fresh copy of the geometry.
    pub fn build_graph(&self, config: &NavConfig) -> Result<NavGraph, NavError> {
        let mut geometry = self.geometry.clone();
        geometry.rewind();
        NavGraph::build(&mut geometry, self.metasectors.clone(), config)
    }
}
