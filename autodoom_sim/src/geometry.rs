// Planar geometry primitives on fixed-point coordinates.
//
// Side tests, box-versus-line classification, segment intersection, point
// projection and polygon centroids. Side and intersection tests multiply
// coordinate differences, which overflow 64 bits at the extremes of the
// fixed-point range, so they are evaluated in `i128`. Centroids and
// projections go through `f64` and are converted back with saturation.
//
// Conventions follow the engine: a partition line or segment runs from its
// origin along its direction; side 0 is the right-hand (front) side, side 1
// the left-hand (back) side. Points exactly on an axis-aligned partition
// belong to the side the engine's fast path assigns them.

use crate::types::{BBox, V2Fixed, f64_to_fixed, fixed_to_f64};

/// Which side of the directed line (`origin`, `dir`) `pos` is on: 0 for
/// front (right), 1 for back (left).
pub fn point_on_side(pos: V2Fixed, origin: V2Fixed, dir: V2Fixed) -> usize {
    if dir.x == 0 {
        return if pos.x <= origin.x {
            (dir.y > 0) as usize
        } else {
            (dir.y < 0) as usize
        };
    }
    if dir.y == 0 {
        return if pos.y <= origin.y {
            (dir.x < 0) as usize
        } else {
            (dir.x > 0) as usize
        };
    }
    let dx = pos.x as i128 - origin.x as i128;
    let dy = pos.y as i128 - origin.y as i128;
    let left = dir.y as i128 * dx;
    let right = dy * dir.x as i128;
    (right >= left) as usize
}

/// Classify a box against the infinite line through `origin` along `dir`:
/// `Some(side)` if the whole box is on one side, `None` if the line crosses it.
pub fn box_on_line_side(bbox: &BBox, origin: V2Fixed, dir: V2Fixed) -> Option<usize> {
    let corners = [
        V2Fixed::new(bbox.left, bbox.top),
        V2Fixed::new(bbox.right, bbox.top),
        V2Fixed::new(bbox.left, bbox.bottom),
        V2Fixed::new(bbox.right, bbox.bottom),
    ];
    let first = point_on_side(corners[0], origin, dir);
    if corners[1..]
        .iter()
        .all(|&c| point_on_side(c, origin, dir) == first)
    {
        Some(first)
    } else {
        None
    }
}

fn cross(o: V2Fixed, a: V2Fixed, b: V2Fixed) -> i128 {
    let ax = a.x as i128 - o.x as i128;
    let ay = a.y as i128 - o.y as i128;
    let bx = b.x as i128 - o.x as i128;
    let by = b.y as i128 - o.y as i128;
    ax * by - ay * bx
}

fn on_segment(a: V2Fixed, b: V2Fixed, p: V2Fixed) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// True if segments `a1`-`a2` and `b1`-`b2` share at least one point.
pub fn segments_intersect(a1: V2Fixed, a2: V2Fixed, b1: V2Fixed, b2: V2Fixed) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
        return true;
    }
    (d1 == 0 && on_segment(b1, b2, a1))
        || (d2 == 0 && on_segment(b1, b2, a2))
        || (d3 == 0 && on_segment(a1, a2, b1))
        || (d4 == 0 && on_segment(a1, a2, b2))
}

/// Closest point to `p` on segment `a`-`b`.
pub fn project_onto_segment(p: V2Fixed, a: V2Fixed, b: V2Fixed) -> V2Fixed {
    let (px, py) = p.to_f64();
    let (ax, ay) = a.to_f64();
    let (bx, by) = b.to_f64();
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return a;
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    V2Fixed::new(f64_to_fixed(ax + t * dx), f64_to_fixed(ay + t * dy))
}

/// Area-weighted centroid of the closed polygon described by its edges.
///
/// Works for either winding: the signed area divides out. Returns `None` for
/// degenerate (zero-area) polygons.
pub fn polygon_centroid<I>(edges: I) -> Option<V2Fixed>
where
    I: IntoIterator<Item = (V2Fixed, V2Fixed)>,
{
    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (p0, p1) in edges {
        let (x0, y0) = p0.to_f64();
        let (x1, y1) = p1.to_f64();
        let term = x0 * y1 - x1 * y0;
        area += term;
        cx += term * (x0 + x1);
        cy += term * (y0 + y1);
    }
    area /= 2.0;
    if area.abs() < 1e-9 {
        return None;
    }
    cx /= 6.0 * area;
    cy /= 6.0 * area;
    Some(V2Fixed::new(f64_to_fixed(cx), f64_to_fixed(cy)))
}

/// Plain average of a set of points. Fallback centre for degenerate polygons.
pub fn average_point<I>(points: I) -> Option<V2Fixed>
where
    I: IntoIterator<Item = V2Fixed>,
{
    let mut n = 0usize;
    let (mut sx, mut sy) = (0.0, 0.0);
    for p in points {
        sx += fixed_to_f64(p.x);
        sy += fixed_to_f64(p.y);
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(V2Fixed::new(
        f64_to_fixed(sx / n as f64),
        f64_to_fixed(sy / n as f64),
    ))
}
