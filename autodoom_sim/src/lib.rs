// autodoom_sim — bot navigation for classic sector-based levels.
//
// This crate lets an autonomous agent find its way around a level whose
// floors and ceilings move: it builds a navigation graph from the output of
// a BSP geometry compiler, answers "what would this switch do" by simulating
// line specials on a stack of hypothetical sector heights, and searches the
// graph for routes under those heights. It never mutates the level; the
// game feeds it read-only snapshots.
//
// Module overview:
// - `types.rs`:        Fixed-point scalars and points, bounding boxes, dense index IDs.
// - `error.rs`:        `NavError`, the crate-wide error type.
// - `config.rs`:       `NavConfig` + `CompatFlags`, all tunable parameters (JSON-loadable).
// - `level.rs`:        Level snapshot (sectors, lines, things) and surrounding-height searches.
// - `line_special.rs`: Classic line special table: activation, keys, height effects.
// - `heights.rs`:      `HeightSource` trait: instant, committed and simulated heights.
// - `metasector.rs`:   MetaSector model: uniform floor/ceiling view over sectors, things, lines.
// - `state_stack.rs`:  Level State Stack and `SimulationSession` (speculative push/pop).
// - `geometry.rs`:     Side tests, intersections, projections, centroids.
// - `compiler.rs`:     Pull protocol to the geometry compiler + `CompiledGeometry`.
// - `grid_map.rs`:     Reference compiler for square-cell maps (tests, scenarios, benches).
// - `blockmap.rs`:     Broad-phase block grid of segments and lines.
// - `nav.rs`:          Navigation graph: regions, neighbors, BSP lookup, `can_pass()`, occupancy.
// - `pathfinding.rs`:  Dijkstra route search and breadth-first reachable sets.
// - `cache.rs`:        Hash-keyed on-disk cache of built graphs.
//
// **Critical constraint: determinism.** Every answer is a pure function of
// the level snapshot, the config and the simulator stack. Integer costs,
// ordered collections and creation-order iteration keep searches
// reproducible; the only `HashMap` is the teleport memo, which is never
// iterated.

pub mod blockmap;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid_map;
pub mod heights;
pub mod level;
pub mod line_special;
pub mod metasector;
pub mod nav;
pub mod pathfinding;
pub mod state_stack;
pub mod types;

pub use config::NavConfig;
pub use error::NavError;
pub use nav::NavGraph;
pub use pathfinding::PathFinder;
pub use state_stack::{LevelStateStack, SimulationSession};
