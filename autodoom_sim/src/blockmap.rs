// Broad-phase grid over the navigation graph.
//
// A regular grid of square cells covering the map's bounding box, padded on
// the low side. Each cell lists the boundary segments and navigation lines
// passing through it. Lines are rasterized with an incremental grid walk
// (Amanatides & Woo), so a query touches only the cells a line or box
// overlaps.
//
// See also: `nav.rs` for the region queries and `path_traverse()` built on
// these cell lists.

use crate::types::{BBox, Fixed, NavLineId, SegId, V2Fixed};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockMap {
    origin: V2Fixed,
    block_size: Fixed,
    width: i32,
    height: i32,
    seg_cells: Vec<Vec<SegId>>,
    line_cells: Vec<Vec<NavLineId>>,
}

impl BlockMap {
    /// Grid covering `bounds`, with the origin moved down-left by `pad`.
    pub fn new(bounds: BBox, block_size: Fixed, pad: Fixed) -> Self {
        let block_size = block_size.max(1);
        if bounds.is_empty() {
            return Self {
                block_size,
                ..Self::default()
            };
        }
        let origin = V2Fixed::new(
            bounds.left.saturating_sub(pad),
            bounds.bottom.saturating_sub(pad),
        );
        let span = |lo: Fixed, hi: Fixed| ((hi as i64 - lo as i64) / block_size as i64 + 1) as i32;
        let width = span(origin.x, bounds.right);
        let height = span(origin.y, bounds.top);
        let cells = (width as usize) * (height as usize);
        Self {
            origin,
            block_size,
            width,
            height,
            seg_cells: vec![Vec::new(); cells],
            line_cells: vec![Vec::new(); cells],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn origin(&self) -> V2Fixed {
        self.origin
    }

    /// Grid coordinates of the cell containing `p`. May lie outside the grid.
    pub fn cell_coords(&self, p: V2Fixed) -> (i32, i32) {
        let bs = self.block_size as i64;
        let cx = (p.x as i64 - self.origin.x as i64).div_euclid(bs);
        let cy = (p.y as i64 - self.origin.y as i64).div_euclid(bs);
        (cx as i32, cy as i32)
    }

    fn index(&self, cx: i32, cy: i32) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.width || cy >= self.height {
            None
        } else {
            Some(cy as usize * self.width as usize + cx as usize)
        }
    }

    /// Cells crossed by segment `a`-`b`, in walk order.
    pub fn cells_on_line(&self, a: V2Fixed, b: V2Fixed) -> Vec<usize> {
        let bs = self.block_size as f64;
        let to_grid = |p: V2Fixed| {
            (
                (p.x as f64 - self.origin.x as f64) / bs,
                (p.y as f64 - self.origin.y as f64) / bs,
            )
        };
        let (x0, y0) = to_grid(a);
        let (x1, y1) = to_grid(b);
        let (mut cx, mut cy) = (x0.floor() as i32, y0.floor() as i32);
        let end = (x1.floor() as i32, y1.floor() as i32);
        let (dx, dy) = (x1 - x0, y1 - y0);

        let axis = |d: f64, start: f64, cell: i32| -> (i32, f64, f64) {
            if d > 0.0 {
                (1, ((cell + 1) as f64 - start) / d, 1.0 / d)
            } else if d < 0.0 {
                (-1, (cell as f64 - start) / d, -1.0 / d)
            } else {
                (0, f64::INFINITY, f64::INFINITY)
            }
        };
        let (step_x, mut t_max_x, t_delta_x) = axis(dx, x0, cx);
        let (step_y, mut t_max_y, t_delta_y) = axis(dy, y0, cy);

        let mut out = Vec::new();
        out.extend(self.index(cx, cy));
        let max_steps = (end.0 - cx).unsigned_abs() + (end.1 - cy).unsigned_abs();
        for _ in 0..max_steps {
            if (cx, cy) == end {
                break;
            }
            if t_max_x < t_max_y {
                cx += step_x;
                t_max_x += t_delta_x;
            } else {
                cy += step_y;
                t_max_y += t_delta_y;
            }
            out.extend(self.index(cx, cy));
        }
        out
    }

    /// Cells overlapped by `bbox`, clamped to the grid.
    pub fn cells_in_box(&self, bbox: &BBox) -> Vec<usize> {
        if self.width == 0 || bbox.is_empty() {
            return Vec::new();
        }
        let (x0, y0) = self.cell_coords(V2Fixed::new(bbox.left, bbox.bottom));
        let (x1, y1) = self.cell_coords(V2Fixed::new(bbox.right, bbox.top));
        let (x0, x1) = (x0.max(0), x1.min(self.width - 1));
        let (y0, y1) = (y0.max(0), y1.min(self.height - 1));
        let mut out = Vec::new();
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                out.extend(self.index(cx, cy));
            }
        }
        out
    }

    pub fn insert_seg(&mut self, seg: SegId, a: V2Fixed, b: V2Fixed) {
        for cell in self.cells_on_line(a, b) {
            self.seg_cells[cell].push(seg);
        }
    }

    pub fn insert_line(&mut self, line: NavLineId, a: V2Fixed, b: V2Fixed) {
        for cell in self.cells_on_line(a, b) {
            self.line_cells[cell].push(line);
        }
    }

    pub fn segs(&self, cell: usize) -> &[SegId] {
        self.seg_cells.get(cell).map_or(&[], |c| c.as_slice())
    }

    pub fn lines(&self, cell: usize) -> &[NavLineId] {
        self.line_cells.get(cell).map_or(&[], |c| c.as_slice())
    }
}
