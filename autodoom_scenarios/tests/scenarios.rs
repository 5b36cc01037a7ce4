// End-to-end navigation scenarios.
//
// Each test builds a small cell map, runs it through the real graph builder,
// simulator and path finder (via `Scenario`), and checks the decision a bot
// would make: which route it takes, which switch it would use, and that the
// speculative state is gone afterwards.

use autodoom_scenarios::Scenario;
use autodoom_sim::cache::{CacheOutcome, level_hash, load_or_build};
use autodoom_sim::grid_map::{CellSpec, GridMap, Side};
use autodoom_sim::heights::HeightSource;
use autodoom_sim::level::{Level, ThingKind};
use autodoom_sim::line_special::{Key, KeySet};
use autodoom_sim::types::units;

/// Cell size used by every scenario, in map units.
const CELL: i32 = 64;

fn room() -> CellSpec {
    CellSpec::new(0, 128)
}

/// Three cells in a row with a closed door in the middle. The door sector
/// is behind both of its lines, as a manual door must be.
fn door_map(special: u16) -> GridMap {
    let mut map = GridMap::new(3, 1, CELL);
    map.set_cell(0, 0, room())
        .set_cell(1, 0, CellSpec::new(0, 0))
        .set_cell(2, 0, room())
        .flip_edge(1, 0, Side::West)
        .set_edge_special(1, 0, Side::West, special, 0)
        .set_edge_special(1, 0, Side::East, special, 0);
    map
}

#[test]
fn closed_door_blocks_until_simulated_open() {
    let mut s = Scenario::new(&door_map(1));
    assert!(!s.can_pass((0, 0), (1, 0)));
    assert!(s.route((0, 0), (2, 0)).is_none());

    let line = s.grid.line_at(1, 0, Side::West).unwrap();
    let path = s.route_after(line, (0, 0), (2, 0)).expect("door should open a route");
    assert_eq!(path.len(), 2);
    assert!(path.contains(s.region((1, 0))));
    assert!(s.stack.is_idle());

    // The simulated door never touched the real level.
    assert!(s.route((0, 0), (2, 0)).is_none());
}

#[test]
fn door_push_and_pop_are_exact() {
    let mut s = Scenario::new(&door_map(1));
    let line = s.grid.line_at(1, 0, Side::West).unwrap();
    let door = s.grid.sector(1, 0).unwrap();
    let (from, into) = (s.region((0, 0)), s.region((1, 0)));
    let height = s.agent.height;

    let level = &s.grid.level;
    let mut session = s.stack.session(level);
    assert!(!s.graph.can_pass(from, into, height, &session));
    assert!(session.push(line, &s.agent, None));
    assert_eq!(session.ceiling(door), units(124));
    assert!(session.is_ceiling_terminal(door));
    assert!(s.graph.can_pass(from, into, height, &session));

    // A raise door is terminal once open; activating it again changes nothing.
    assert!(!session.push(line, &s.agent, None));
    assert_eq!(session.depth(), 1);

    session.pop().unwrap();
    assert!(!s.graph.can_pass(from, into, height, &session));
    assert_eq!(session.sector_depth(door), 0);
    assert!(session.pop().is_err());
}

#[test]
fn bot_finds_the_door_it_needs() {
    let mut s = Scenario::new(&door_map(1));
    let (line, path) = s.find_activation((0, 0), (2, 0)).expect("a door in reach");
    let door_lines = [
        s.grid.line_at(1, 0, Side::West).unwrap(),
        s.grid.line_at(1, 0, Side::East).unwrap(),
    ];
    assert!(door_lines.contains(&line));
    assert_eq!(path.last, s.region((2, 0)));
    assert!(s.stack.is_idle());
}

#[test]
fn locked_door_needs_its_key() {
    let mut s = Scenario::new(&door_map(26));
    assert!(s.find_activation((0, 0), (2, 0)).is_none());

    s.agent = s.agent.with_keys(KeySet::NONE.with(Key::Yellow));
    assert!(s.find_activation((0, 0), (2, 0)).is_none());

    s.agent = s.agent.with_keys(KeySet::NONE.with(Key::Blue));
    assert!(s.find_activation((0, 0), (2, 0)).is_some());
}

#[test]
fn walk_line_lowers_lift_to_upper_ledge() {
    let mut map = GridMap::new(3, 1, CELL);
    map.set_cell(0, 0, CellSpec::new(0, 256))
        .set_cell(1, 0, CellSpec::new(128, 256).with_tag(5))
        .set_cell(2, 0, CellSpec::new(128, 256))
        .set_edge_special(0, 0, Side::West, 88, 5);
    let mut s = Scenario::new(&map);
    assert!(s.route((0, 0), (2, 0)).is_none());

    let (line, path) = s.find_activation((0, 0), (2, 0)).expect("lift switch in reach");
    assert_eq!(Some(line), s.grid.line_at(0, 0, Side::West));
    assert_eq!(path.len(), 2);
}

#[test]
fn stairs_rise_away_from_the_switch() {
    let mut map = GridMap::new(5, 1, CELL);
    map.fill(0, 0, 4, 0, CellSpec::new(0, 256).with_floor_pic(9))
        .set_cell(4, 0, CellSpec::new(0, 256).with_floor_pic(9).with_tag(3))
        .set_edge_special(4, 0, Side::East, 7, 3);
    let mut s = Scenario::new(&map);
    let line = s.grid.line_at(4, 0, Side::East).unwrap();
    let sectors: Vec<_> = (0..5).map(|x| s.grid.sector(x, 0).unwrap()).collect();

    let level = &s.grid.level;
    let mut session = s.stack.session(level);
    assert!(session.push(line, &s.agent, None));
    assert_eq!(session.depth(), 1);
    assert_eq!(session.last_pushed().len(), 5);
    let floors: Vec<_> = sectors.iter().map(|&sec| session.floor(sec)).collect();
    assert_eq!(floors, [40, 32, 24, 16, 8].map(units));

    session.pop().unwrap();
    for &sec in &sectors {
        assert_eq!(session.sector_depth(sec), 0);
        assert_eq!(session.floor(sec), 0);
    }
}

#[test]
fn walk_teleporter_only_fires_from_the_front() {
    let mut map = GridMap::new(6, 1, CELL);
    map.fill(0, 0, 2, 0, room())
        .set_cell(5, 0, room().with_tag(7))
        .set_edge_special(1, 0, Side::West, 97, 7)
        .add_thing(ThingKind::TeleportDestination, 5, 0);
    let mut s = Scenario::new(&map);
    let target = s.region((5, 0));

    // Crossing westwards out of (1, 0) is crossing from the front.
    let path = s.route((1, 0), (5, 0)).expect("teleport route");
    assert_eq!(path.len(), 1);
    let step = path.steps().next().unwrap();
    assert!(step.teleport);
    assert_eq!(step.to, target);
    assert_eq!(path.total_cost, 0);

    // From (0, 0) the bot has to step east first, then back through the line.
    let path = s.route((0, 0), (5, 0)).expect("teleport route");
    assert_eq!(path.len(), 2);
    let steps: Vec<_> = path.steps().collect();
    assert!(!steps[0].teleport);
    assert!(steps[1].teleport);

    // The destination room has no way back.
    assert!(s.route((5, 0), (0, 0)).is_none());
}

/// A 3x3 ring around a solid centre; `hurt` marks one cell as damaging.
fn ring_map(hurt: (u32, u32)) -> GridMap {
    let mut map = GridMap::new(3, 3, CELL);
    map.fill(0, 0, 2, 2, room())
        .clear_cell(1, 1)
        .set_cell(hurt.0, hurt.1, room().with_damage(10, 32));
    map
}

#[test]
fn route_avoids_damaging_floor() {
    let mut s = Scenario::new(&ring_map((1, 2)));
    let path = s.route((0, 1), (2, 1)).expect("route around the ring");
    assert!(!path.contains(s.region((1, 2))));

    let mut s = Scenario::new(&ring_map((1, 0)));
    let path = s.route((0, 1), (2, 1)).expect("route around the ring");
    assert!(!path.contains(s.region((1, 0))));
}

#[test]
fn zero_penalty_ignores_damage() {
    let hurt = Scenario::with_config(
        &ring_map((1, 2)),
        autodoom_sim::NavConfig {
            hazard_penalty: 0.0,
            ..Default::default()
        },
    )
    .route((0, 1), (2, 1))
    .expect("route");
    let safe = Scenario::new(&ring_map((1, 0))).route((0, 1), (2, 1)).expect("route");
    assert!(hurt.total_cost <= safe.total_cost);
}

#[test]
fn reachable_stops_at_closed_doors() {
    let mut s = Scenario::new(&door_map(1));
    assert_eq!(s.reachable((0, 0)), vec![s.region((0, 0))]);
    assert_eq!(s.reachable((2, 0)), vec![s.region((2, 0))]);
}

#[test]
fn identical_maps_give_identical_routes() {
    let map = ring_map((1, 2));
    let a = Scenario::new(&map).route((0, 0), (2, 2));
    let b = Scenario::new(&map).route((0, 0), (2, 2));
    assert!(a.is_some());
    assert_eq!(a, b);
}

#[test]
fn level_json_round_trip_keeps_the_cache_key() {
    let s = Scenario::new(&door_map(1));
    let json = s.grid.level.to_json().unwrap();
    let back = Level::from_json(&json).unwrap();
    assert_eq!(
        level_hash(&s.grid.level, &s.grid.metasectors, &s.config).unwrap(),
        level_hash(&back, &s.grid.metasectors, &s.config).unwrap()
    );
}

#[test]
fn cache_rebuilds_when_a_special_changes() {
    let path = std::env::temp_dir().join(format!("autodoom_scenario_{}.nav", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let s = Scenario::new(&door_map(1));
    let build = || s.grid.build_graph(&s.config);
    let (_, outcome) = load_or_build(&path, &s.grid.level, &s.grid.metasectors, &s.config, build).unwrap();
    assert_eq!(outcome, CacheOutcome::Rebuilt);
    let (cached, outcome) = load_or_build(&path, &s.grid.level, &s.grid.metasectors, &s.config, build).unwrap();
    assert_eq!(outcome, CacheOutcome::Loaded);
    assert_eq!(cached.region_count(), s.graph.region_count());

    let locked = Scenario::new(&door_map(26));
    let (_, outcome) = load_or_build(&path, &locked.grid.level, &locked.grid.metasectors, &locked.config, || {
        locked.grid.build_graph(&locked.config)
    })
    .unwrap();
    assert_eq!(outcome, CacheOutcome::Rebuilt);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn cache_rebuilds_when_use_range_changes() {
    let path = std::env::temp_dir().join(format!("autodoom_use_range_{}.nav", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let map = door_map(1);

    let short = Scenario::with_config(
        &map,
        autodoom_sim::NavConfig {
            use_range: 8,
            ..Default::default()
        },
    );
    let (_, outcome) = load_or_build(&path, &short.grid.level, &short.grid.metasectors, &short.config, || {
        short.grid.build_graph(&short.config)
    })
    .unwrap();
    assert_eq!(outcome, CacheOutcome::Rebuilt);

    let long = Scenario::with_config(
        &map,
        autodoom_sim::NavConfig {
            use_range: 512,
            ..Default::default()
        },
    );
    let (graph, outcome) = load_or_build(&path, &long.grid.level, &long.grid.metasectors, &long.config, || {
        long.grid.build_graph(&long.config)
    })
    .unwrap();
    assert_eq!(outcome, CacheOutcome::Rebuilt);
    assert_eq!(graph.use_range, units(512));

    let _ = std::fs::remove_file(&path);
}
