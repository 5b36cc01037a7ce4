// Route search over the navigation graph.
//
// Two searches share one `PathFinder`:
//
// - `find_goal()`: Dijkstra from the region containing a start point, with a
//   `BinaryHeap` open set (min-heap via reversed ordering). It stops at the
//   first region the goal callback accepts and walks predecessor links back
//   to build a `PathResult`.
// - `reachable_set()`: breadth-first flood from a region, collecting every
//   region the predicate marks `Add` until one marks `Done`.
//
// Both expand only edges `NavGraph::can_pass()` admits under the supplied
// heights, so a search run inside a `SimulationSession` sees hypothetical
// door and lift positions. Walk teleporters crossed from their front side
// replace the geometric neighbor with the destination region at zero
// length; destinations are resolved once per line and memoized, misses
// included, until `reset_level()`.
//
// Per-region scratch lives in `SearchBuffers`, one per search mode. A
// region's slot is valid only while its visit mark equals the buffer's
// `valid_count`, so a new search just increments the count. Only when the
// counter wraps are the marks zeroed.
//
// "No route" is a normal answer (`None` or an empty set), never an error.
//
// See also: `nav.rs` for the graph and `can_pass()`, `state_stack.rs` for
// hypothetical heights.
//
// **Critical constraint: determinism.** Costs are integers in fixed point,
// heap ties break on region ID, and neighbor lists are walked in creation
// order. Identical inputs give identical paths.

use crate::config::NavConfig;
use crate::geometry::project_onto_segment;
use crate::heights::HeightSource;
use crate::level::Level;
use crate::line_special::line_special;
use crate::nav::{NavGraph, Neighbor};
use crate::types::{Fixed, LineId, NeighborId, RegionId, V2Fixed};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};
use tracing::debug;

/// Where a route ends inside the goal region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathEnd {
    Point(V2Fixed),
    /// A line to walk over or use, with the spot to aim for.
    TriggerLine { line: LineId, point: V2Fixed },
}

impl PathEnd {
    pub fn point(&self) -> V2Fixed {
        match *self {
            PathEnd::Point(p) | PathEnd::TriggerLine { point: p, .. } => p,
        }
    }
}

/// One edge of a route. For teleport steps `to` is the destination region,
/// not the neighbor's geometric target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub neighbor: NeighborId,
    pub from: RegionId,
    pub to: RegionId,
    pub teleport: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResult {
    /// Steps from the goal back to the start.
    steps_rev: Vec<PathStep>,
    pub start: V2Fixed,
    pub start_region: RegionId,
    pub end: PathEnd,
    /// The goal region.
    pub last: RegionId,
    pub total_cost: i64,
    /// Every region on the route, start and goal included.
    visited: BTreeSet<RegionId>,
}

impl PathResult {
    /// Steps in walking order.
    pub fn steps(&self) -> impl DoubleEndedIterator<Item = &PathStep> + '_ {
        self.steps_rev.iter().rev()
    }

    pub fn steps_rev(&self) -> &[PathStep] {
        &self.steps_rev
    }

    pub fn len(&self) -> usize {
        self.steps_rev.len()
    }

    /// True when the start region already satisfies the goal.
    pub fn is_empty(&self) -> bool {
        self.steps_rev.is_empty()
    }

    /// Is `region` on the route? Used to notice an agent drifting off it.
    pub fn contains(&self, region: RegionId) -> bool {
        self.visited.contains(&region)
    }

    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.visited.iter().copied()
    }

    /// The step leaving `region`, if the route passes through it.
    pub fn next_step_from(&self, region: RegionId) -> Option<&PathStep> {
        self.steps().find(|s| s.from == region)
    }

    /// Where an agent at `pos` should head next: its projection onto the
    /// boundary it has to cross, or the end point once in the goal region.
    pub fn steer_point(&self, graph: &NavGraph, pos: V2Fixed) -> V2Fixed {
        let region = graph.point_to_region(pos);
        let Some(step) = self.next_step_from(region) else {
            return self.end.point();
        };
        let neighbor = graph.neighbor(step.neighbor);
        match neighbor.seg {
            Some(seg) => {
                let seg = graph.seg(seg);
                project_onto_segment(pos, seg.p1, seg.p2)
            }
            None => neighbor.point,
        }
    }
}

/// Verdict of a `reachable_set()` predicate on one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reach {
    Ignore,
    Add,
    /// Stop the flood here.
    Done,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReachableSet {
    /// Regions marked `Add`, in breadth-first order.
    pub regions: Vec<RegionId>,
    /// The region that ended the search early.
    pub done: Option<RegionId>,
}

impl ReachableSet {
    pub fn found_any(&self) -> bool {
        self.done.is_some() || !self.regions.is_empty()
    }
}

/// Memoized destination of a walk teleporter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeleportTarget {
    pub line: LineId,
    pub point: V2Fixed,
    pub region: RegionId,
}

// ---------------------------------------------------------------------------
// Search scratch
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct SearchBuffers {
    valid_count: u32,
    visit: Vec<u32>,
    closed: Vec<u32>,
    dist: Vec<i64>,
    prev: Vec<Option<PathStep>>,
}

impl SearchBuffers {
    /// Start a new search over `regions` regions.
    fn begin(&mut self, regions: usize) {
        if self.visit.len() != regions {
            self.visit = vec![0; regions];
            self.closed = vec![0; regions];
            self.dist = vec![0; regions];
            self.prev = vec![None; regions];
            self.valid_count = 0;
        }
        self.valid_count = self.valid_count.wrapping_add(1);
        if self.valid_count == 0 {
            self.visit.fill(0);
            self.closed.fill(0);
            self.valid_count = 1;
        }
    }

    fn seen(&self, r: RegionId) -> bool {
        self.visit[r.index()] == self.valid_count
    }

    fn is_closed(&self, r: RegionId) -> bool {
        self.closed[r.index()] == self.valid_count
    }

    fn close(&mut self, r: RegionId) {
        self.closed[r.index()] = self.valid_count;
    }

    fn mark(&mut self, r: RegionId, dist: i64, prev: Option<PathStep>) {
        let i = r.index();
        self.visit[i] = self.valid_count;
        self.dist[i] = dist;
        self.prev[i] = prev;
    }
}

/// Entry in the Dijkstra open set (min-heap via reversed ordering).
#[derive(PartialEq, Eq)]
struct OpenEntry {
    region: RegionId,
    cost: i64,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest cost is "greatest".
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.region.cmp(&self.region))
    }
}

/// The teleport taken when crossing `neighbor`, if any. The line must be a
/// walk teleporter crossed from its front side, and its tag must lead to a
/// destination marker.
fn resolve_teleport(
    cache: &mut FxHashMap<LineId, Option<TeleportTarget>>,
    graph: &NavGraph,
    level: &Level,
    neighbor: &Neighbor,
) -> Option<TeleportTarget> {
    let line_id = graph.line(neighbor.line?).special_line?;
    let line = level.line(line_id);
    if !line_special(line).is_some_and(|s| s.is_walk_teleport()) {
        return None;
    }
    let seg = graph.seg(neighbor.seg?);
    if (seg.dx ^ line.dx()) < 0 || (seg.dy ^ line.dy()) < 0 {
        return None;
    }
    *cache.entry(line_id).or_insert_with(|| {
        let thing = level.teleport_destination(line.tag)?;
        let point = level.thing(thing).pos;
        Some(TeleportTarget {
            line: line_id,
            point,
            region: graph.point_to_region(point),
        })
    })
}

// ---------------------------------------------------------------------------
// PathFinder
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct PathFinder {
    agent_height: Fixed,
    hazard_penalty: f64,
    shortest: SearchBuffers,
    reach: SearchBuffers,
    teleports: FxHashMap<LineId, Option<TeleportTarget>>,
}

impl PathFinder {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            agent_height: config.agent_height_fixed(),
            hazard_penalty: config.hazard_penalty,
            shortest: SearchBuffers::default(),
            reach: SearchBuffers::default(),
            teleports: FxHashMap::default(),
        }
    }

    pub fn with_agent_height(mut self, height: Fixed) -> Self {
        self.agent_height = height;
        self
    }

    pub fn agent_height(&self) -> Fixed {
        self.agent_height
    }

    /// Forget everything tied to the current level.
    pub fn reset_level(&mut self) {
        self.teleports.clear();
        self.shortest = SearchBuffers::default();
        self.reach = SearchBuffers::default();
    }

    /// Cost multiplier for entering `region`: 1 for harmless floors.
    fn hazard_factor<H: HeightSource + ?Sized>(
        penalty: f64,
        graph: &NavGraph,
        level: &Level,
        heights: &H,
        region: RegionId,
    ) -> f64 {
        match graph.region_floor_sector(region, heights) {
            Some(sector) => 1.0 + penalty * level.sector(sector).damage.per_tic(),
            None => 1.0,
        }
    }

    /// Cheapest route from `start` to the first region `goal` accepts.
    pub fn find_goal<H, G>(
        &mut self,
        graph: &NavGraph,
        level: &Level,
        heights: &H,
        start: V2Fixed,
        mut goal: G,
    ) -> Option<PathResult>
    where
        H: HeightSource + ?Sized,
        G: FnMut(RegionId) -> Option<PathEnd>,
    {
        let start_region = graph.point_to_region(start);
        let buf = &mut self.shortest;
        buf.begin(graph.region_count());
        buf.mark(start_region, 0, None);

        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            region: start_region,
            cost: 0,
        });
        let mut expanded = 0usize;

        while let Some(OpenEntry { region, cost }) = open.pop() {
            if buf.is_closed(region) || cost > buf.dist[region.index()] {
                continue;
            }
            buf.close(region);
            expanded += 1;

            if let Some(end) = goal(region) {
                let result = build_result(buf, graph.region_count(), start, start_region, region, end);
                debug!(steps = result.len(), cost = result.total_cost, expanded, "route found");
                return Some(result);
            }

            for nb in graph.neighbors_of(region) {
                if !graph.can_pass(region, nb.to, self.agent_height, heights) {
                    continue;
                }
                let (to, length, teleport) = match resolve_teleport(&mut self.teleports, graph, level, nb) {
                    Some(t) => (t.region, 0, true),
                    None => (nb.to, nb.dist, false),
                };
                if buf.is_closed(to) {
                    continue;
                }
                let factor = Self::hazard_factor(self.hazard_penalty, graph, level, heights, to);
                let next = cost + (length as f64 * factor).round() as i64;
                if !buf.seen(to) || next < buf.dist[to.index()] {
                    let step = PathStep {
                        neighbor: nb.id,
                        from: region,
                        to,
                        teleport,
                    };
                    buf.mark(to, next, Some(step));
                    open.push(OpenEntry { region: to, cost: next });
                }
            }
        }
        debug!(expanded, "no route");
        None
    }

    /// Breadth-first flood from `start` over passable edges.
    pub fn reachable_set<H, P>(
        &mut self,
        graph: &NavGraph,
        level: &Level,
        heights: &H,
        start: RegionId,
        mut pred: P,
    ) -> ReachableSet
    where
        H: HeightSource + ?Sized,
        P: FnMut(RegionId) -> Reach,
    {
        let buf = &mut self.reach;
        buf.begin(graph.region_count());
        buf.mark(start, 0, None);
        let mut queue = VecDeque::from([start]);
        let mut out = ReachableSet::default();

        while let Some(region) = queue.pop_front() {
            match pred(region) {
                Reach::Ignore => {}
                Reach::Add => out.regions.push(region),
                Reach::Done => {
                    out.done = Some(region);
                    break;
                }
            }
            let depth = buf.dist[region.index()];
            for nb in graph.neighbors_of(region) {
                if !graph.can_pass(region, nb.to, self.agent_height, heights) {
                    continue;
                }
                let (to, teleport) = match resolve_teleport(&mut self.teleports, graph, level, nb) {
                    Some(t) => (t.region, true),
                    None => (nb.to, false),
                };
                if buf.seen(to) {
                    continue;
                }
                let step = PathStep {
                    neighbor: nb.id,
                    from: region,
                    to,
                    teleport,
                };
                buf.mark(to, depth + 1, Some(step));
                queue.push_back(to);
            }
        }
        out
    }
}

fn build_result(
    buf: &SearchBuffers,
    region_count: usize,
    start: V2Fixed,
    start_region: RegionId,
    last: RegionId,
    end: PathEnd,
) -> PathResult {
    let mut steps_rev = Vec::new();
    let mut visited = BTreeSet::from([start_region, last]);
    let mut cur = last;
    // Predecessor chains are acyclic; the bound only guards corrupt input.
    for _ in 0..region_count {
        if cur == start_region {
            break;
        }
        let Some(step) = buf.prev[cur.index()] else {
            break;
        };
        steps_rev.push(step);
        visited.insert(step.from);
        cur = step.from;
    }
    PathResult {
        steps_rev,
        start,
        start_region,
        end,
        last,
        total_cost: buf.dist[last.index()],
        visited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_map::{CellSpec, GridLevel, GridMap, Side};
    use crate::heights::CommittedHeights;
    use crate::level::ThingKind;
    use crate::types::units;

    fn corridor(len: u32) -> (GridLevel, NavGraph) {
        let mut map = GridMap::new(len, 1, 64);
        map.fill(0, 0, len - 1, 0, CellSpec::new(0, 128));
        let grid = map.build().unwrap();
        let graph = grid.build_graph(&NavConfig::default()).unwrap();
        (grid, graph)
    }

    fn goal_region(target: RegionId, point: V2Fixed) -> impl FnMut(RegionId) -> Option<PathEnd> {
        move |r| (r == target).then_some(PathEnd::Point(point))
    }

    #[test]
    fn corridor_route() {
        let (grid, graph) = corridor(5);
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(4, 0).unwrap();
        let path = finder
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 0),
                goal_region(goal, grid.center(4, 0)),
            )
            .unwrap();

        assert_eq!(path.len(), 4);
        assert_eq!(path.total_cost, units(256) as i64);
        assert_eq!(path.last, goal);
        let mut expect = grid.region(0, 0).unwrap();
        for step in path.steps() {
            assert_eq!(step.from, expect);
            assert!(!step.teleport);
            expect = step.to;
        }
        assert_eq!(expect, goal);
        assert!(path.contains(grid.region(2, 0).unwrap()));
    }

    #[test]
    fn start_region_can_be_the_goal() {
        let (grid, graph) = corridor(2);
        let mut finder = PathFinder::new(&NavConfig::default());
        let start = grid.region(0, 0).unwrap();
        let path = finder
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 0),
                goal_region(start, grid.center(0, 0)),
            )
            .unwrap();
        assert!(path.is_empty());
        assert_eq!(path.total_cost, 0);
    }

    #[test]
    fn blocked_route_is_none() {
        let mut map = GridMap::new(3, 1, 64);
        map.set_cell(0, 0, CellSpec::new(0, 128));
        map.set_cell(1, 0, CellSpec::new(64, 128));
        map.set_cell(2, 0, CellSpec::new(64, 128));
        let grid = map.build().unwrap();
        let graph = grid.build_graph(&NavConfig::default()).unwrap();
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(2, 0).unwrap();
        let found = finder.find_goal(
            &graph,
            &grid.level,
            &CommittedHeights(&grid.level),
            grid.center(0, 0),
            goal_region(goal, grid.center(2, 0)),
        );
        assert!(found.is_none());

        // Going down the ledge is fine.
        let back = grid.region(0, 0).unwrap();
        let found = finder.find_goal(
            &graph,
            &grid.level,
            &CommittedHeights(&grid.level),
            grid.center(2, 0),
            goal_region(back, grid.center(0, 0)),
        );
        assert_eq!(found.map(|p| p.len()), Some(2));
    }

    /// A ring of eight cells around a solid centre. The two shortest routes
    /// from west to east cut the corners through the north or south cell.
    fn ring(north: CellSpec, south: CellSpec) -> (GridLevel, NavGraph) {
        let mut map = GridMap::new(3, 3, 64);
        map.fill(0, 0, 2, 2, CellSpec::new(0, 128));
        map.clear_cell(1, 1);
        map.set_cell(1, 2, north);
        map.set_cell(1, 0, south);
        let grid = map.build().unwrap();
        let graph = grid.build_graph(&NavConfig::default()).unwrap();
        (grid, graph)
    }

    fn ring_route(grid: &GridLevel, graph: &NavGraph) -> PathResult {
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(2, 1).unwrap();
        finder
            .find_goal(
                graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 1),
                goal_region(goal, grid.center(2, 1)),
            )
            .unwrap()
    }

    #[test]
    fn hazard_pushes_route_to_safe_side() {
        let safe = CellSpec::new(0, 128);
        let slime = CellSpec::new(0, 128).with_damage(10, 32);

        let (grid, graph) = ring(slime.clone(), safe.clone());
        let path = ring_route(&grid, &graph);
        assert!(path.contains(grid.region(1, 0).unwrap()));
        assert!(!path.contains(grid.region(1, 2).unwrap()));

        let (grid, graph) = ring(safe, slime);
        let path = ring_route(&grid, &graph);
        assert!(path.contains(grid.region(1, 2).unwrap()));
        assert!(!path.contains(grid.region(1, 0).unwrap()));
    }

    #[test]
    fn hazard_penalty_scales_cost() {
        let mut map = GridMap::new(2, 1, 64);
        map.set_cell(0, 0, CellSpec::new(0, 128));
        map.set_cell(1, 0, CellSpec::new(0, 128).with_damage(20, 32));
        let grid = map.build().unwrap();
        let graph = grid.build_graph(&NavConfig::default()).unwrap();
        let goal = grid.region(1, 0).unwrap();
        let config = NavConfig {
            hazard_penalty: 2.0,
            ..NavConfig::default()
        };
        let path = PathFinder::new(&config)
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 0),
                goal_region(goal, grid.center(1, 0)),
            )
            .unwrap();
        // 1 + 2 * 20/32 = 2.25
        assert_eq!(path.total_cost, (units(64) as f64 * 2.25).round() as i64);
    }

    /// Cells 0..3 in a row, plus an isolated cell 5 holding the destination
    /// of a walk teleporter on the line between cells 0 and 1.
    fn teleport_map(dest_tag: i32) -> (GridLevel, NavGraph) {
        let mut map = GridMap::new(6, 1, 64);
        map.fill(0, 0, 2, 0, CellSpec::new(0, 128));
        map.set_cell(5, 0, CellSpec::new(0, 128).with_tag(7));
        map.set_edge_special(1, 0, Side::West, 97, dest_tag);
        map.add_thing(ThingKind::TeleportDestination, 5, 0);
        let grid = map.build().unwrap();
        let graph = grid.build_graph(&NavConfig::default()).unwrap();
        (grid, graph)
    }

    #[test]
    fn front_side_crossing_teleports() {
        let (grid, graph) = teleport_map(7);
        let mut finder = PathFinder::new(&NavConfig::default());
        let dest = grid.region(5, 0).unwrap();
        let path = finder
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(1, 0),
                goal_region(dest, grid.center(5, 0)),
            )
            .unwrap();
        assert_eq!(path.len(), 1);
        let step = path.steps().next().unwrap();
        assert!(step.teleport);
        assert_eq!(step.from, grid.region(1, 0).unwrap());
        assert_eq!(step.to, dest);
        assert_eq!(graph.neighbor(step.neighbor).to, grid.region(0, 0).unwrap());
        assert_eq!(path.total_cost, 0);
    }

    #[test]
    fn back_side_crossing_walks_through() {
        let (grid, graph) = teleport_map(7);
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(2, 0).unwrap();
        let path = finder
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 0),
                goal_region(goal, grid.center(2, 0)),
            )
            .unwrap();
        assert_eq!(path.len(), 2);
        assert!(path.steps().all(|s| !s.teleport));
    }

    #[test]
    fn missing_destination_is_memoized() {
        let (grid, graph) = teleport_map(9);
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(0, 0).unwrap();
        let path = finder
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(1, 0),
                goal_region(goal, grid.center(0, 0)),
            )
            .unwrap();
        assert!(path.steps().all(|s| !s.teleport));
        let line = grid.line_at(1, 0, Side::West).unwrap();
        assert_eq!(finder.teleports.get(&line), Some(&None));

        finder.reset_level();
        assert!(finder.teleports.is_empty());
    }

    #[test]
    fn repeated_searches_agree() {
        let (grid, graph) = ring(CellSpec::new(0, 128), CellSpec::new(0, 128));
        let first = ring_route(&grid, &graph);
        let second = ring_route(&grid, &graph);
        assert_eq!(first, second);

        // Same finder, back to back.
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(2, 1).unwrap();
        let mut run = || {
            finder.find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 1),
                goal_region(goal, grid.center(2, 1)),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn valid_count_wraps_cleanly() {
        let (grid, graph) = corridor(4);
        let mut finder = PathFinder::new(&NavConfig::default());
        let heights = CommittedHeights(&grid.level);
        let goal = grid.region(3, 0).unwrap();
        let before = finder
            .find_goal(&graph, &grid.level, &heights, grid.center(0, 0), goal_region(goal, grid.center(3, 0)))
            .unwrap();

        // Stale marks equal to the post-wrap count would look current.
        finder.shortest.valid_count = u32::MAX;
        finder.shortest.visit.fill(1);
        finder.shortest.closed.fill(1);
        let after = finder
            .find_goal(&graph, &grid.level, &heights, grid.center(0, 0), goal_region(goal, grid.center(3, 0)))
            .unwrap();
        assert_eq!(finder.shortest.valid_count, 1);
        assert_eq!(before, after);
    }

    #[test]
    fn reachable_set_floods_and_stops() {
        let mut map = GridMap::new(4, 1, 64);
        map.fill(0, 0, 2, 0, CellSpec::new(0, 128));
        map.set_cell(3, 0, CellSpec::new(80, 128));
        let grid = map.build().unwrap();
        let graph = grid.build_graph(&NavConfig::default()).unwrap();
        let heights = CommittedHeights(&grid.level);
        let mut finder = PathFinder::new(&NavConfig::default());
        let start = grid.region(0, 0).unwrap();

        let all = finder.reachable_set(&graph, &grid.level, &heights, start, |_| Reach::Add);
        let expected: Vec<_> = (0..3).map(|x| grid.region(x, 0).unwrap()).collect();
        assert_eq!(all.regions, expected);
        assert_eq!(all.done, None);

        let stop = grid.region(1, 0).unwrap();
        let early = finder.reachable_set(&graph, &grid.level, &heights, start, |r| {
            if r == stop { Reach::Done } else { Reach::Ignore }
        });
        assert_eq!(early.done, Some(stop));
        assert!(early.found_any());

        let none = finder.reachable_set(&graph, &grid.level, &heights, start, |_| Reach::Ignore);
        assert!(!none.found_any());
    }

    #[test]
    fn steer_point_projects_onto_next_boundary() {
        let (grid, graph) = corridor(3);
        let mut finder = PathFinder::new(&NavConfig::default());
        let goal = grid.region(2, 0).unwrap();
        let end = V2Fixed::from_units(150, 20);
        let path = finder
            .find_goal(
                &graph,
                &grid.level,
                &CommittedHeights(&grid.level),
                grid.center(0, 0),
                goal_region(goal, end),
            )
            .unwrap();
        let pos = V2Fixed::from_units(20, 40);
        assert_eq!(path.steer_point(&graph, pos), V2Fixed::from_units(64, 40));
        assert_eq!(path.steer_point(&graph, V2Fixed::from_units(170, 30)), end);
        assert_eq!(
            path.next_step_from(grid.region(1, 0).unwrap()).map(|s| s.to),
            Some(goal)
        );
    }
}
