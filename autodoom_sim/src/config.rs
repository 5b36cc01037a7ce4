// Data-driven navigation configuration.
//
// All tunable navigation parameters live in `NavConfig`, loaded from JSON or
// taken from `Default`. Graph building, movement legality, hazard costs and
// the speculative simulator read their constants from here instead of using
// magic numbers.
//
// Legacy compatibility switches that change the hypothetical outcome of some
// line specials are grouped in `CompatFlags`. They must match the rules the
// running game applies, otherwise the simulator predicts heights the real
// mechanism never reaches.
//
// See also: `nav.rs` (step height, block size), `state_stack.rs` (compat
// flags), `pathfinding.rs` (hazard penalty, agent height).
//
// **Critical constraint: determinism.** Every agent and every search run
// against the same config must reach the same answer.

use crate::error::NavError;
use crate::types::{Fixed, units};
use serde::{Deserialize, Serialize};

/// Legacy rule switches affecting stairs, donuts and texture-height raises.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatFlags {
    /// Stair steps add their increment before the terminal check (old
    /// behavior) rather than after it.
    pub stairs: bool,
    /// Old surrounding-height search defaults and texture-height rules.
    pub model: bool,
    /// Donuts ignore an already-committed moat floor.
    pub floors: bool,
    /// A recording made with the old stair ordering is being replayed.
    /// Behaves like `stairs`.
    pub legacy_stairs: bool,
}

impl CompatFlags {
    /// True when either legacy stair ordering switch is set.
    pub fn old_stair_order(&self) -> bool {
        self.stairs || self.legacy_stairs
    }
}

/// Tunable parameters for graph construction and search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavConfig {
    /// Largest floor step an agent can climb, in map units.
    pub step_height: i32,
    /// Side of one broad-phase grid cell, in map units.
    pub block_size: i32,
    /// Default agent height for clearance checks, in map units.
    pub agent_height: i32,
    /// Agent radius, in map units. Pads thing registration boxes and the grid
    /// origin.
    pub agent_radius: i32,
    /// Scale applied to a sector's damage per tic when computing the edge
    /// cost factor. Zero disables hazard avoidance.
    pub hazard_penalty: f64,
    /// Reach used when registering switch lines into regions, in map units.
    pub use_range: i32,
    pub compat: CompatFlags,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            step_height: 24,
            block_size: 128,
            agent_height: 56,
            agent_radius: 16,
            hazard_penalty: 4.0,
            use_range: 64,
            compat: CompatFlags::default(),
        }
    }
}

impl NavConfig {
    pub fn from_json(json: &str) -> Result<Self, NavError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, NavError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn step_height_fixed(&self) -> Fixed {
        units(self.step_height)
    }

    pub fn block_size_fixed(&self) -> Fixed {
        units(self.block_size)
    }

    pub fn agent_height_fixed(&self) -> Fixed {
        units(self.agent_height)
    }

    pub fn agent_radius_fixed(&self) -> Fixed {
        units(self.agent_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = NavConfig::default();
        let json = config.to_json().unwrap();
        let restored = NavConfig::from_json(&json).unwrap();
        assert_eq!(config.step_height, restored.step_height);
        assert_eq!(config.block_size, restored.block_size);
        assert_eq!(config.hazard_penalty, restored.hazard_penalty);
        assert_eq!(config.compat, restored.compat);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "step_height": 32,
            "block_size": 64,
            "agent_height": 40,
            "agent_radius": 20,
            "hazard_penalty": 0.0,
            "use_range": 64,
            "compat": {
                "stairs": true,
                "model": false,
                "floors": false,
                "legacy_stairs": false
            }
        }"#;
        let config = NavConfig::from_json(json).unwrap();
        assert_eq!(config.step_height_fixed(), units(32));
        assert_eq!(config.block_size_fixed(), units(64));
        assert_eq!(config.agent_height_fixed(), units(40));
        assert!(config.compat.old_stair_order());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(matches!(
            NavConfig::from_json("{\"step_height\": \"high\"}"),
            Err(NavError::Json(_))
        ));
    }

    #[test]
    fn default_matches_engine_constants() {
        let config = NavConfig::default();
        assert_eq!(config.step_height, 24);
        assert_eq!(config.block_size, 128);
        assert_eq!(config.agent_height, 56);
        assert!(!config.compat.old_stair_order());
    }
}
