// Meta-sectors: uniform vertical bounds for navigation regions.
//
// A region of the navigation graph never asks a real sector for its heights
// directly. It asks its meta-sector, which may wrap one sector, a solid thing
// standing in a sector, the band between the two sides of a line, or a group
// of overlapping sectors. The variant set is closed, so it is a plain enum
// with one `match` per query.
//
// All queries take a `HeightSource`, so the same table answers for real,
// committed or simulated heights. A compound takes the most restrictive band
// of its members (highest floor, lowest ceiling), and the owning sector of a
// compound is the member that wins that comparison under the heights being
// queried, not under the real heights.
//
// The void meta-sector (`MetaSectorId::VOID`) and a one-sided line report
// `NO_FLOOR`/`NO_CEILING`, which `can_pass` always rejects.
//
// See also: `heights.rs` for the height sources, `nav.rs` for `can_pass`,
// `state_stack.rs` for the simulated heights.

use crate::error::NavError;
use crate::heights::HeightSource;
use crate::level::Level;
use crate::types::{Fixed, LineId, MetaSectorId, NO_CEILING, NO_FLOOR, SectorId, ThingId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaSector {
    Simple {
        sector: SectorId,
    },
    /// A solid thing. Standing things raise the floor by their height;
    /// hanging things lower the ceiling by it.
    Thing {
        sector: SectorId,
        thing: ThingId,
        height: Fixed,
        hanging: bool,
    },
    /// The band shared by both sides of a line. One-sided lines are walls.
    Line {
        front: SectorId,
        back: Option<SectorId>,
    },
    Compound {
        members: SmallVec<[MetaSectorId; 4]>,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetaSectorTable {
    entries: Vec<MetaSector>,
    /// The meta-sector standing for each real sector.
    sector_meta: Vec<MetaSectorId>,
}

impl MetaSectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// One simple meta-sector per real sector, with matching indices.
    pub fn simple_per_sector(level: &Level) -> Self {
        let mut table = Self::new();
        for i in 0..level.sector_count() {
            let sector = SectorId(i as u32);
            let id = table.push(MetaSector::Simple { sector });
            table.sector_meta.push(id);
        }
        table
    }

    /// Simple meta-sectors for every sector, plus one compound per group of
    /// overlapping sectors. `overlaps` lists sector pairs known to overlap;
    /// groups are their transitive closure. Members of a group map to its
    /// compound.
    pub fn from_overlaps(level: &Level, overlaps: &[(SectorId, SectorId)]) -> Result<Self, NavError> {
        let count = level.sector_count();
        let mut table = Self::simple_per_sector(level);
        let mut parent: Vec<usize> = (0..count).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for &(a, b) in overlaps {
            for s in [a, b] {
                if s.index() >= count {
                    return Err(NavError::BadLevel(format!(
                        "overlap references sector {} of {count}",
                        s.0
                    )));
                }
            }
            let ra = find(&mut parent, a.index());
            let rb = find(&mut parent, b.index());
            // Smallest index is the root so grouping is order independent.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent[hi] = lo;
        }

        let mut groups: Vec<SmallVec<[MetaSectorId; 4]>> = vec![SmallVec::new(); count];
        for i in 0..count {
            let root = find(&mut parent, i);
            groups[root].push(MetaSectorId(i as u32));
        }
        for members in groups.into_iter().filter(|g| g.len() > 1) {
            let sectors: SmallVec<[usize; 4]> = members.iter().map(|m| m.index()).collect();
            let id = table.add(MetaSector::Compound { members })?;
            for s in sectors {
                table.sector_meta[s] = id;
            }
        }
        Ok(table)
    }

    fn push(&mut self, msec: MetaSector) -> MetaSectorId {
        let id = MetaSectorId(self.entries.len() as u32);
        self.entries.push(msec);
        id
    }

    /// Add a meta-sector, checking compound membership.
    pub fn add(&mut self, msec: MetaSector) -> Result<MetaSectorId, NavError> {
        if let MetaSector::Compound { members } = &msec {
            let id = self.entries.len() as u32;
            if members.is_empty() {
                return Err(NavError::EmptyCompound(id));
            }
            for &m in members {
                match self.entries.get(m.index()) {
                    None => {
                        return Err(NavError::MetaSectorOutOfRange {
                            what: format!("compound meta-sector {id}"),
                            msec: m.0,
                            count: self.entries.len(),
                        });
                    }
                    Some(MetaSector::Compound { .. }) => {
                        return Err(NavError::NestedCompound { compound: id, member: m.0 });
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(self.push(msec))
    }

    /// Meta-sector for a solid thing, standing or hanging.
    pub fn add_thing(&mut self, level: &Level, thing: ThingId, hanging: bool) -> MetaSectorId {
        let t = level.thing(thing);
        self.push(MetaSector::Thing {
            sector: t.sector,
            thing,
            height: t.height,
            hanging,
        })
    }

    pub fn add_line(&mut self, level: &Level, line: LineId) -> MetaSectorId {
        let l = level.line(line);
        self.push(MetaSector::Line {
            front: l.front,
            back: l.back,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: MetaSectorId) -> Option<&MetaSector> {
        if id.is_void() {
            None
        } else {
            self.entries.get(id.index())
        }
    }

    pub fn for_sector(&self, sector: SectorId) -> MetaSectorId {
        self.sector_meta
            .get(sector.index())
            .copied()
            .unwrap_or(MetaSectorId::VOID)
    }

    /// Check every sector and member reference against a level.
    pub fn validate(&self, sector_count: usize) -> Result<(), NavError> {
        let check = |what: &str, s: SectorId| {
            if s.index() >= sector_count {
                Err(NavError::BadLevel(format!(
                    "{what} references sector {} of {sector_count}",
                    s.0
                )))
            } else {
                Ok(())
            }
        };
        for (i, msec) in self.entries.iter().enumerate() {
            let what = format!("meta-sector {i}");
            match msec {
                MetaSector::Simple { sector } | MetaSector::Thing { sector, .. } => {
                    check(&what, *sector)?;
                }
                MetaSector::Line { front, back } => {
                    check(&what, *front)?;
                    if let Some(back) = back {
                        check(&what, *back)?;
                    }
                }
                MetaSector::Compound { members } => {
                    if members.is_empty() {
                        return Err(NavError::EmptyCompound(i as u32));
                    }
                    if let Some(m) = members.iter().find(|m| m.index() >= self.entries.len()) {
                        return Err(NavError::MetaSectorOutOfRange {
                            what,
                            msec: m.0,
                            count: self.entries.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Height queries
    // -----------------------------------------------------------------------

    pub fn floor_height<H: HeightSource + ?Sized>(&self, id: MetaSectorId, h: &H) -> Fixed {
        let Some(msec) = self.get(id) else {
            return NO_FLOOR;
        };
        match msec {
            MetaSector::Simple { sector } => h.floor(*sector),
            MetaSector::Thing {
                sector,
                height,
                hanging,
                ..
            } => {
                if *hanging {
                    h.floor(*sector)
                } else {
                    h.floor(*sector).saturating_add(*height)
                }
            }
            MetaSector::Line { front, back } => match back {
                Some(back) => h.floor(*front).max(h.floor(*back)),
                None => NO_FLOOR,
            },
            MetaSector::Compound { members } => self
                .flat_members(members)
                .map(|m| self.floor_height(m, h))
                .max()
                .unwrap_or(NO_FLOOR),
        }
    }

    pub fn alt_floor_height<H: HeightSource + ?Sized>(&self, id: MetaSectorId, h: &H) -> Fixed {
        let Some(msec) = self.get(id) else {
            return NO_FLOOR;
        };
        match msec {
            MetaSector::Simple { sector } => h.alt_floor(*sector),
            MetaSector::Thing {
                sector,
                height,
                hanging,
                ..
            } => {
                if *hanging {
                    h.alt_floor(*sector)
                } else {
                    h.alt_floor(*sector).saturating_add(*height)
                }
            }
            MetaSector::Line { front, back } => match back {
                Some(back) => h.alt_floor(*front).max(h.alt_floor(*back)),
                None => NO_FLOOR,
            },
            MetaSector::Compound { members } => self
                .flat_members(members)
                .map(|m| self.alt_floor_height(m, h))
                .max()
                .unwrap_or(NO_FLOOR),
        }
    }

    pub fn ceiling_height<H: HeightSource + ?Sized>(&self, id: MetaSectorId, h: &H) -> Fixed {
        let Some(msec) = self.get(id) else {
            return NO_CEILING;
        };
        match msec {
            MetaSector::Simple { sector } => h.ceiling(*sector),
            MetaSector::Thing {
                sector,
                height,
                hanging,
                ..
            } => {
                if *hanging {
                    h.ceiling(*sector).saturating_sub(*height)
                } else {
                    h.ceiling(*sector)
                }
            }
            MetaSector::Line { front, back } => match back {
                Some(back) => h.ceiling(*front).min(h.ceiling(*back)),
                None => NO_CEILING,
            },
            MetaSector::Compound { members } => self
                .flat_members(members)
                .map(|m| self.ceiling_height(m, h))
                .min()
                .unwrap_or(NO_CEILING),
        }
    }

    /// The real sector whose floor bounds this meta-sector from below.
    pub fn floor_sector<H: HeightSource + ?Sized>(&self, id: MetaSectorId, h: &H) -> Option<SectorId> {
        match self.get(id)? {
            MetaSector::Simple { sector } | MetaSector::Thing { sector, .. } => Some(*sector),
            MetaSector::Line { front, back } => match back {
                Some(back) if h.floor(*back) > h.floor(*front) => Some(*back),
                _ => Some(*front),
            },
            MetaSector::Compound { members } => {
                let mut best: Option<(Fixed, MetaSectorId)> = None;
                for m in self.flat_members(members) {
                    let f = self.floor_height(m, h);
                    if best.is_none_or(|(bf, _)| f > bf) {
                        best = Some((f, m));
                    }
                }
                self.floor_sector(best?.1, h)
            }
        }
    }

    /// The real sector whose ceiling bounds this meta-sector from above.
    pub fn ceiling_sector<H: HeightSource + ?Sized>(&self, id: MetaSectorId, h: &H) -> Option<SectorId> {
        match self.get(id)? {
            MetaSector::Simple { sector } | MetaSector::Thing { sector, .. } => Some(*sector),
            MetaSector::Line { front, back } => match back {
                Some(back) if h.ceiling(*back) < h.ceiling(*front) => Some(*back),
                _ => Some(*front),
            },
            MetaSector::Compound { members } => {
                let mut best: Option<(Fixed, MetaSectorId)> = None;
                for m in self.flat_members(members) {
                    let c = self.ceiling_height(m, h);
                    if best.is_none_or(|(bc, _)| c < bc) {
                        best = Some((c, m));
                    }
                }
                self.ceiling_sector(best?.1, h)
            }
        }
    }

    /// Compound members that are not themselves compounds.
    fn flat_members<'a>(&'a self, members: &'a [MetaSectorId]) -> impl Iterator<Item = MetaSectorId> + 'a {
        members
            .iter()
            .copied()
            .filter(|&m| !matches!(self.get(m), Some(MetaSector::Compound { .. }) | None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heights::InstantHeights;
    use crate::level::{Line, Sector, Thing, ThingKind};
    use crate::types::{V2Fixed, units};

    fn level() -> Level {
        let sectors = vec![
            Sector::new(units(0), units(128)),
            Sector::new(units(16), units(96)),
            Sector::new(units(-8), units(200)),
        ];
        let lines = vec![
            Line::new(
                V2Fixed::from_units(64, 0),
                V2Fixed::from_units(64, 64),
                SectorId(1),
                Some(SectorId(0)),
            ),
            Line::new(
                V2Fixed::from_units(0, 0),
                V2Fixed::from_units(0, 64),
                SectorId(0),
                None,
            ),
        ];
        let mut barrel = Thing::new(ThingKind::Obstacle, V2Fixed::from_units(32, 32), SectorId(0));
        barrel.height = units(32);
        let mut lamp = Thing::new(ThingKind::HangingObstacle, V2Fixed::from_units(16, 16), SectorId(0));
        lamp.height = units(40);
        Level::new(sectors, lines, vec![barrel, lamp]).unwrap()
    }

    #[test]
    fn simple_meta_sectors_mirror_sectors() {
        let level = level();
        let table = MetaSectorTable::simple_per_sector(&level);
        let h = InstantHeights(&level);
        assert_eq!(table.len(), 3);
        let m = table.for_sector(SectorId(1));
        assert_eq!(table.floor_height(m, &h), units(16));
        assert_eq!(table.ceiling_height(m, &h), units(96));
        assert_eq!(table.floor_sector(m, &h), Some(SectorId(1)));
    }

    #[test]
    fn compound_takes_most_restrictive_band() {
        let level = level();
        let table = MetaSectorTable::from_overlaps(&level, &[(SectorId(2), SectorId(1))]).unwrap();
        let h = InstantHeights(&level);
        let m = table.for_sector(SectorId(2));
        assert_eq!(m, table.for_sector(SectorId(1)));
        assert_ne!(m, table.for_sector(SectorId(0)));
        assert_eq!(table.floor_height(m, &h), units(16));
        assert_eq!(table.ceiling_height(m, &h), units(96));
        assert_eq!(table.floor_sector(m, &h), Some(SectorId(1)));
        assert_eq!(table.ceiling_sector(m, &h), Some(SectorId(1)));
    }

    #[test]
    fn overlap_groups_are_transitive() {
        let level = level();
        let table = MetaSectorTable::from_overlaps(
            &level,
            &[(SectorId(0), SectorId(1)), (SectorId(2), SectorId(1))],
        )
        .unwrap();
        let m = table.for_sector(SectorId(0));
        assert_eq!(m, table.for_sector(SectorId(2)));
        match table.get(m) {
            Some(MetaSector::Compound { members }) => assert_eq!(members.len(), 3),
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    fn compound_owner_follows_queried_heights() {
        struct Raised<'a>(InstantHeights<'a>);
        impl HeightSource for Raised<'_> {
            fn floor(&self, s: SectorId) -> Fixed {
                if s == SectorId(2) { units(40) } else { self.0.floor(s) }
            }
            fn ceiling(&self, s: SectorId) -> Fixed {
                self.0.ceiling(s)
            }
            fn alt_floor(&self, s: SectorId) -> Fixed {
                self.floor(s)
            }
        }
        let level = level();
        let table = MetaSectorTable::from_overlaps(&level, &[(SectorId(1), SectorId(2))]).unwrap();
        let m = table.for_sector(SectorId(1));
        let raised = Raised(InstantHeights(&level));
        assert_eq!(table.floor_sector(m, &raised), Some(SectorId(2)));
        assert_eq!(table.floor_height(m, &raised), units(40));
    }

    #[test]
    fn thing_meta_sectors() {
        let level = level();
        let mut table = MetaSectorTable::simple_per_sector(&level);
        let h = InstantHeights(&level);
        let barrel = table.add_thing(&level, ThingId(0), false);
        let lamp = table.add_thing(&level, ThingId(1), true);
        assert_eq!(table.floor_height(barrel, &h), units(32));
        assert_eq!(table.ceiling_height(barrel, &h), units(128));
        assert_eq!(table.floor_height(lamp, &h), units(0));
        assert_eq!(table.ceiling_height(lamp, &h), units(88));
    }

    #[test]
    fn line_meta_sectors() {
        let level = level();
        let mut table = MetaSectorTable::simple_per_sector(&level);
        let h = InstantHeights(&level);
        let two_sided = table.add_line(&level, LineId(0));
        let wall = table.add_line(&level, LineId(1));
        assert_eq!(table.floor_height(two_sided, &h), units(16));
        assert_eq!(table.ceiling_height(two_sided, &h), units(96));
        assert_eq!(table.floor_sector(two_sided, &h), Some(SectorId(1)));
        assert_eq!(table.floor_height(wall, &h), NO_FLOOR);
        assert_eq!(table.alt_floor_height(wall, &h), NO_FLOOR);
        assert_eq!(table.ceiling_height(wall, &h), NO_CEILING);
    }

    #[test]
    fn void_is_impassable() {
        let level = level();
        let table = MetaSectorTable::simple_per_sector(&level);
        let h = InstantHeights(&level);
        assert_eq!(table.floor_height(MetaSectorId::VOID, &h), NO_FLOOR);
        assert_eq!(table.ceiling_height(MetaSectorId::VOID, &h), NO_CEILING);
        assert_eq!(table.floor_sector(MetaSectorId::VOID, &h), None);
    }

    #[test]
    fn malformed_compounds_are_rejected() {
        let level = level();
        let mut table = MetaSectorTable::simple_per_sector(&level);
        assert!(matches!(
            table.add(MetaSector::Compound {
                members: SmallVec::new()
            }),
            Err(NavError::EmptyCompound(3))
        ));
        assert!(matches!(
            table.add(MetaSector::Compound {
                members: SmallVec::from_slice(&[MetaSectorId(9)])
            }),
            Err(NavError::MetaSectorOutOfRange { msec: 9, .. })
        ));
        let c = table
            .add(MetaSector::Compound {
                members: SmallVec::from_slice(&[MetaSectorId(0), MetaSectorId(1)]),
            })
            .unwrap();
        assert!(matches!(
            table.add(MetaSector::Compound {
                members: SmallVec::from_slice(&[c])
            }),
            Err(NavError::NestedCompound { .. })
        ));
        assert!(table.validate(level.sector_count()).is_ok());
        assert!(table.validate(1).is_err());
    }
}
