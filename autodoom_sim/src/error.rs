// Error taxonomy for the navigation subsystem.
//
// Build-time data errors abort the level load: navigation cannot proceed
// without a valid graph, so the caller disables bots for that level instead
// of crashing. Simulation misuse (popping an empty stack) is reported the
// same way. Search failures are never errors; "no route yet" is `None`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("{what} references vertex {vertex}, but only {count} vertices exist")]
    VertexOutOfRange {
        what: String,
        vertex: u32,
        count: usize,
    },

    #[error("{what} references line {line}, but only {count} lines exist")]
    LineOutOfRange {
        what: String,
        line: u32,
        count: usize,
    },

    #[error("{what} references segment {seg}, but only {count} segments exist")]
    SegmentOutOfRange {
        what: String,
        seg: u32,
        count: usize,
    },

    #[error("{what} references meta-sector {msec}, but only {count} meta-sectors exist")]
    MetaSectorOutOfRange {
        what: String,
        msec: u32,
        count: usize,
    },

    #[error("{what} references region {region}, but only {count} regions exist")]
    RegionOutOfRange {
        what: String,
        region: u32,
        count: usize,
    },

    #[error("tree node {node} has child {child}, but only {count} nodes exist")]
    NodeChildOutOfRange { node: usize, child: u32, count: usize },

    #[error("tree node {0} is reachable along more than one path")]
    TreeNodeRevisited(usize),

    #[error("compiler produced {got} meta-sector records for {expected} meta-sectors")]
    MetaSectorCountMismatch { expected: usize, got: usize },

    #[error("level geometry is empty: {0}")]
    EmptyGeometry(String),

    #[error("compound meta-sector {0} has no members")]
    EmptyCompound(u32),

    #[error("compound meta-sector {compound} lists compound {member} as a member")]
    NestedCompound { compound: u32, member: u32 },

    #[error("level snapshot is inconsistent: {0}")]
    BadLevel(String),

    #[error("pop() called on an empty level state stack")]
    PopEmptyStack,

    #[error("navigation cache has an unknown header")]
    CacheMagic,

    #[error("navigation cache hash {found:#010x} does not match level hash {expected:#010x}")]
    CacheHashMismatch { expected: u32, found: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
