// Test-only bot harness for end-to-end navigation scenarios.
//
// Wraps a square-cell map built by `GridMap` together with the real
// `NavGraph`, `LevelStateStack` and `PathFinder`, and exposes a small
// cell-addressed API: route between cells, route as if a line had been
// activated, and the simplest form of the decision a bot makes when stuck
// ("which reachable switch or door opens a way to the goal?").
//
// The only test-specific code here is the cell addressing and the
// activation loop. Graph building, simulation and search use the same code
// paths a game would.
//
// See also: `tests/scenarios.rs` for the scenarios themselves.

use autodoom_sim::config::NavConfig;
use autodoom_sim::grid_map::{GridLevel, GridMap};
use autodoom_sim::heights::CommittedHeights;
use autodoom_sim::nav::NavGraph;
use autodoom_sim::pathfinding::{PathEnd, PathFinder, PathResult, Reach};
use autodoom_sim::state_stack::{AgentProfile, LevelStateStack};
use autodoom_sim::types::{LineId, RegionId, V2Fixed};

/// A cell coordinate on the scenario grid.
pub type Cell = (u32, u32);

pub struct Scenario {
    pub grid: GridLevel,
    pub graph: NavGraph,
    pub stack: LevelStateStack,
    pub finder: PathFinder,
    pub agent: AgentProfile,
    pub config: NavConfig,
}

impl Scenario {
    pub fn new(map: &GridMap) -> Self {
        Self::with_config(map, NavConfig::default())
    }

    pub fn with_config(map: &GridMap, config: NavConfig) -> Self {
        let grid = map.build().expect("scenario map failed to build");
        let mut graph = grid
            .build_graph(&config)
            .expect("scenario graph failed to build");
        graph.register_level_objects(&grid.level);
        let mut stack = LevelStateStack::new(config.compat);
        stack.init_level(&grid.level);
        Self {
            finder: PathFinder::new(&config),
            agent: AgentProfile::from_config(&config),
            grid,
            graph,
            stack,
            config,
        }
    }

    /// Region of an open cell. Panics on rock.
    pub fn region(&self, cell: Cell) -> RegionId {
        self.grid
            .region(cell.0, cell.1)
            .unwrap_or_else(|| panic!("cell {cell:?} is solid"))
    }

    pub fn center(&self, cell: Cell) -> V2Fixed {
        self.grid.center(cell.0, cell.1)
    }

    fn goal(&self, to: Cell) -> impl FnMut(RegionId) -> Option<PathEnd> + use<> {
        let target = self.region(to);
        let point = self.center(to);
        move |r| (r == target).then_some(PathEnd::Point(point))
    }

    /// Can the agent step between two adjacent cells, on committed heights?
    pub fn can_pass(&self, from: Cell, to: Cell) -> bool {
        self.graph.can_pass(
            self.region(from),
            self.region(to),
            self.agent.height,
            &CommittedHeights(&self.grid.level),
        )
    }

    /// Cheapest route between cell centres on committed heights.
    pub fn route(&mut self, from: Cell, to: Cell) -> Option<PathResult> {
        let start = self.center(from);
        let goal = self.goal(to);
        let level = &self.grid.level;
        self.finder
            .find_goal(&self.graph, level, &CommittedHeights(level), start, goal)
    }

    /// Route as if `line` had been activated. `None` if the activation
    /// changes nothing or still leaves no route. The simulation is undone
    /// before returning.
    pub fn route_after(&mut self, line: LineId, from: Cell, to: Cell) -> Option<PathResult> {
        let start = self.center(from);
        let goal = self.goal(to);
        let level = &self.grid.level;
        let mut session = self.stack.session(level);
        if !session.push(line, &self.agent, None) {
            return None;
        }
        self.finder
            .find_goal(&self.graph, level, &session, start, goal)
    }

    /// Every region reachable from `from` right now.
    pub fn reachable(&mut self, from: Cell) -> Vec<RegionId> {
        let start = self.region(from);
        let level = &self.grid.level;
        self.finder
            .reachable_set(&self.graph, level, &CommittedHeights(level), start, |_| {
                Reach::Add
            })
            .regions
    }

    /// First trigger line within reach whose activation opens a route to
    /// `to`, with that route. Lines are tried in index order.
    pub fn find_activation(&mut self, from: Cell, to: Cell) -> Option<(LineId, PathResult)> {
        let mut candidates: Vec<LineId> = self
            .reachable(from)
            .into_iter()
            .flat_map(|r| self.graph.lines_in(r).iter().map(|&(line, _)| line))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
            .into_iter()
            .find_map(|line| self.route_after(line, from, to).map(|path| (line, path)))
    }
}
