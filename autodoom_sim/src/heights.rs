// Effective sector heights.
//
// Everything that asks "how high is this floor" goes through a
// `HeightSource`, so the same meta-sector, movement and search code can run
// against real heights, against committed heights (what a mechanism already
// in motion will settle at), or against the speculative simulator.
//
// - `InstantHeights`: the heights the engine reports this tick.
// - `CommittedHeights`: instant heights corrected for active movers; the
//   alternate floor is the instant floor, so a lift in motion is passable at
//   either end. This is the empty-stack baseline of the simulator.
// - `SimulationSession` (see `state_stack.rs`): the top of each sector's
//   hypothetical stack, falling back to committed heights.

use crate::level::Level;
use crate::types::{Fixed, SectorId};

/// Read-only view of sector floor/ceiling heights.
pub trait HeightSource {
    fn floor(&self, sector: SectorId) -> Fixed;
    fn ceiling(&self, sector: SectorId) -> Fixed;
    /// Second reachable floor height of an oscillating platform. Equals
    /// `floor` for anything that does not oscillate.
    fn alt_floor(&self, sector: SectorId) -> Fixed;
}

/// Real heights as of this tick.
#[derive(Clone, Copy)]
pub struct InstantHeights<'a>(pub &'a Level);

impl HeightSource for InstantHeights<'_> {
    fn floor(&self, sector: SectorId) -> Fixed {
        self.0.sector(sector).floor
    }

    fn ceiling(&self, sector: SectorId) -> Fixed {
        self.0.sector(sector).ceiling
    }

    fn alt_floor(&self, sector: SectorId) -> Fixed {
        self.0.sector(sector).floor
    }
}

/// Real heights with active movers resolved to their destinations.
#[derive(Clone, Copy)]
pub struct CommittedHeights<'a>(pub &'a Level);

impl HeightSource for CommittedHeights<'_> {
    fn floor(&self, sector: SectorId) -> Fixed {
        self.0.sector(sector).committed_floor()
    }

    fn ceiling(&self, sector: SectorId) -> Fixed {
        self.0.sector(sector).committed_ceiling()
    }

    fn alt_floor(&self, sector: SectorId) -> Fixed {
        self.0.sector(sector).floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{Level, Sector};
    use crate::types::units;

    fn one_sector_level(sector: Sector) -> Level {
        Level::new(vec![sector], Vec::new(), Vec::new()).unwrap()
    }

    #[test]
    fn instant_heights_are_raw() {
        let mut sector = Sector::new(units(0), units(128));
        sector.floor_target = Some(units(64));
        let level = one_sector_level(sector);
        let h = InstantHeights(&level);
        assert_eq!(h.floor(SectorId(0)), 0);
        assert_eq!(h.alt_floor(SectorId(0)), 0);
        assert_eq!(h.ceiling(SectorId(0)), units(128));
    }

    #[test]
    fn committed_heights_follow_movers() {
        let mut sector = Sector::new(units(0), units(8));
        sector.floor_target = Some(units(-64));
        sector.ceiling_target = Some(units(72));
        let level = one_sector_level(sector);
        let h = CommittedHeights(&level);
        assert_eq!(h.floor(SectorId(0)), units(-64));
        assert_eq!(h.alt_floor(SectorId(0)), 0);
        assert_eq!(h.ceiling(SectorId(0)), units(72));
    }
}
