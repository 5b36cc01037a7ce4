// On-disk cache of built navigation graphs.
//
// File layout: the 8-byte magic `ADNAV001`, the little-endian `u32` content
// hash of the level the graph was built from, then the bincode-encoded
// `NavGraph`. The hash covers the level's lines, its sector count, the
// meta-sector table and every config value the graph stores or is shaped by
// (step height, block size, agent radius, use range), so any edit that could
// change the graph changes the key. A wrong magic or hash, or a payload that
// fails validation, is treated as a miss: the graph is rebuilt and the file
// rewritten.
//
// Occupancy is never cached; loaded graphs start with it empty.
//
// See also: `nav.rs` for `NavGraph::validate()`.

use crate::config::NavConfig;
use crate::error::NavError;
use crate::level::Level;
use crate::metasector::MetaSectorTable;
use crate::nav::NavGraph;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CACHE_MAGIC: &[u8; 8] = b"ADNAV001";

/// How `load_or_build()` produced its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    Loaded,
    Rebuilt,
}

/// Content hash keying a cached graph.
pub fn level_hash(level: &Level, metasectors: &MetaSectorTable, config: &NavConfig) -> Result<u32, NavError> {
    let params = (config.step_height, config.block_size, config.agent_radius, config.use_range);
    let bytes = bincode::serialize(&(&level.lines, level.sector_count() as u64, metasectors, params))?;
    Ok(crc32fast::hash(&bytes))
}

pub fn encode(graph: &NavGraph, hash: u32) -> Result<Vec<u8>, NavError> {
    let mut out = Vec::with_capacity(CACHE_MAGIC.len() + 4);
    out.extend_from_slice(CACHE_MAGIC);
    out.extend_from_slice(&hash.to_le_bytes());
    bincode::serialize_into(&mut out, graph)?;
    Ok(out)
}

/// Decode and validate a cached graph built for `expected_hash`.
pub fn decode(bytes: &[u8], expected_hash: u32) -> Result<NavGraph, NavError> {
    let header = CACHE_MAGIC.len() + 4;
    if bytes.len() < header || &bytes[..CACHE_MAGIC.len()] != CACHE_MAGIC {
        return Err(NavError::CacheMagic);
    }
    let mut hash = [0u8; 4];
    hash.copy_from_slice(&bytes[CACHE_MAGIC.len()..header]);
    let found = u32::from_le_bytes(hash);
    if found != expected_hash {
        return Err(NavError::CacheHashMismatch {
            expected: expected_hash,
            found,
        });
    }
    let mut graph: NavGraph = bincode::deserialize(&bytes[header..])?;
    graph.validate()?;
    graph.reset_occupancy();
    Ok(graph)
}

pub fn save(path: &Path, graph: &NavGraph, hash: u32) -> Result<(), NavError> {
    fs::write(path, encode(graph, hash)?)?;
    Ok(())
}

pub fn load(path: &Path, expected_hash: u32) -> Result<NavGraph, NavError> {
    decode(&fs::read(path)?, expected_hash)
}

/// Load the cached graph for `level`, or run `build` and rewrite the cache.
///
/// A cache that cannot be written is logged and otherwise ignored; build
/// errors are returned.
pub fn load_or_build<F>(
    path: &Path,
    level: &Level,
    metasectors: &MetaSectorTable,
    config: &NavConfig,
    build: F,
) -> Result<(NavGraph, CacheOutcome), NavError>
where
    F: FnOnce() -> Result<NavGraph, NavError>,
{
    let hash = level_hash(level, metasectors, config)?;
    match load(path, hash).and_then(|g| g.validate_level(level).map(|()| g)) {
        Ok(graph) => {
            info!(path = %path.display(), hash, "navigation cache hit");
            return Ok((graph, CacheOutcome::Loaded));
        }
        Err(NavError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no navigation cache");
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "navigation cache rejected");
        }
    }

    let graph = build()?;
    if let Err(e) = save(path, &graph, hash) {
        warn!(path = %path.display(), error = %e, "could not write navigation cache");
    }
    Ok((graph, CacheOutcome::Rebuilt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_map::{CellSpec, GridLevel, GridMap};

    fn grid() -> GridLevel {
        let mut map = GridMap::new(3, 2, 64);
        map.fill(0, 0, 2, 1, CellSpec::new(0, 128));
        map.build().unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("autodoom_{}_{name}.nav", std::process::id()))
    }

    #[test]
    fn encoded_graph_decodes_identically() {
        let grid = grid();
        let config = NavConfig::default();
        let graph = grid.build_graph(&config).unwrap();
        let hash = level_hash(&grid.level, &grid.metasectors, &config).unwrap();
        let bytes = encode(&graph, hash).unwrap();
        assert_eq!(&bytes[..8], CACHE_MAGIC);

        let loaded = decode(&bytes, hash).unwrap();
        assert_eq!(loaded.region_count(), graph.region_count());
        assert_eq!(loaded.neighbors.len(), graph.neighbors.len());
        for r in &graph.regions {
            assert_eq!(loaded.point_to_region(r.centroid), r.id);
        }
    }

    #[test]
    fn wrong_header_or_hash_is_rejected() {
        let grid = grid();
        let config = NavConfig::default();
        let graph = grid.build_graph(&config).unwrap();
        let bytes = encode(&graph, 42).unwrap();

        assert!(matches!(
            decode(&bytes, 43),
            Err(NavError::CacheHashMismatch { expected: 43, found: 42 })
        ));
        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(matches!(decode(&bad, 42), Err(NavError::CacheMagic)));
        assert!(matches!(decode(&bytes[..5], 42), Err(NavError::CacheMagic)));
        assert!(decode(&bytes[..bytes.len() / 2], 42).is_err());
    }

    #[test]
    fn hash_tracks_level_and_parameters() {
        let grid = grid();
        let config = NavConfig::default();
        let base = level_hash(&grid.level, &grid.metasectors, &config).unwrap();
        assert_eq!(base, level_hash(&grid.level, &grid.metasectors, &config).unwrap());

        let mut level = grid.level.clone();
        level.lines[0].special = 1;
        assert_ne!(base, level_hash(&level, &grid.metasectors, &config).unwrap());

        let taller = NavConfig {
            step_height: 32,
            ..NavConfig::default()
        };
        assert_ne!(base, level_hash(&grid.level, &grid.metasectors, &taller).unwrap());

        let longer_reach = NavConfig {
            use_range: 512,
            ..NavConfig::default()
        };
        assert_ne!(base, level_hash(&grid.level, &grid.metasectors, &longer_reach).unwrap());
    }

    #[test]
    fn load_or_build_round_trip() {
        let grid = grid();
        let config = NavConfig::default();
        let path = temp_path("round_trip");
        let _ = fs::remove_file(&path);

        let build = || grid.build_graph(&config);
        let (first, outcome) = load_or_build(&path, &grid.level, &grid.metasectors, &config, build).unwrap();
        assert_eq!(outcome, CacheOutcome::Rebuilt);
        let (second, outcome) = load_or_build(&path, &grid.level, &grid.metasectors, &config, build).unwrap();
        assert_eq!(outcome, CacheOutcome::Loaded);
        assert_eq!(first.region_count(), second.region_count());

        // A different level under the same path forces a rebuild.
        let mut map = GridMap::new(2, 1, 64);
        map.fill(0, 0, 1, 0, CellSpec::new(0, 96));
        let other = map.build().unwrap();
        let (graph, outcome) = load_or_build(&path, &other.level, &other.metasectors, &config, || {
            other.build_graph(&config)
        })
        .unwrap();
        assert_eq!(outcome, CacheOutcome::Rebuilt);
        assert_eq!(graph.region_count(), 2);

        let _ = fs::remove_file(&path);
    }
}
