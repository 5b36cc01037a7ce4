// Read-only snapshot of the real level.
//
// The navigation subsystem never mutates the world. It consumes a `Level`
// holding the real sectors (heights, floor texture, tag, damage, active
// movers), lines (endpoints, sides, special, tag, lower texture heights) and
// things (kind, position, size, containing sector). The snapshot is built
// programmatically or loaded from JSON; `finalize()` validates indices and
// derives the sector-to-line adjacency used by the surrounding-height
// searches.
//
// The surrounding-height helpers mirror the engine's rules for choosing
// where a floor or ceiling mechanism stops. They read heights through a
// `HeightSource`, so the simulator can chain hypothetical activations.
//
// See also: `heights.rs` for the height sources, `state_stack.rs` for the
// simulator built on these helpers, `grid_map.rs` for a builder producing
// snapshots of simple test levels.

use crate::error::NavError;
use crate::heights::HeightSource;
use crate::types::{BBox, Fixed, LineId, SectorId, ThingId, V2Fixed, units};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sectors
// ---------------------------------------------------------------------------

/// Floor damage dealt to anything standing in a sector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorDamage {
    /// Health lost per hit.
    pub amount: i32,
    /// Tics between hits. Zero means the sector is harmless.
    pub interval: u32,
}

impl SectorDamage {
    pub fn is_harmful(&self) -> bool {
        self.amount > 0 && self.interval > 0
    }

    /// Damage per tic, zero for harmless sectors.
    pub fn per_tic(&self) -> f64 {
        if self.is_harmful() {
            self.amount as f64 / self.interval as f64
        } else {
            0.0
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sector {
    pub floor: Fixed,
    pub ceiling: Fixed,
    #[serde(default)]
    pub floor_pic: u16,
    #[serde(default)]
    pub tag: i32,
    #[serde(default)]
    pub damage: SectorDamage,
    /// Destination of an active floor mover, if any.
    #[serde(default)]
    pub floor_target: Option<Fixed>,
    /// Destination of an active ceiling mover, if any.
    #[serde(default)]
    pub ceiling_target: Option<Fixed>,
    /// Lines bordering this sector, derived by `Level::finalize()`.
    #[serde(skip)]
    pub lines: Vec<LineId>,
}

impl Sector {
    pub fn new(floor: Fixed, ceiling: Fixed) -> Self {
        Self {
            floor,
            ceiling,
            floor_pic: 0,
            tag: 0,
            damage: SectorDamage::default(),
            floor_target: None,
            ceiling_target: None,
            lines: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: i32) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_floor_pic(mut self, pic: u16) -> Self {
        self.floor_pic = pic;
        self
    }

    pub fn with_damage(mut self, amount: i32, interval: u32) -> Self {
        self.damage = SectorDamage { amount, interval };
        self
    }

    pub fn committed_floor(&self) -> Fixed {
        self.floor_target.unwrap_or(self.floor)
    }

    pub fn committed_ceiling(&self) -> Fixed {
        self.ceiling_target.unwrap_or(self.ceiling)
    }
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Line {
    pub v1: V2Fixed,
    pub v2: V2Fixed,
    /// Sector on the right-hand side, walking from `v1` to `v2`.
    pub front: SectorId,
    /// Sector on the left-hand side; `None` for one-sided walls.
    #[serde(default)]
    pub back: Option<SectorId>,
    #[serde(default)]
    pub special: u16,
    #[serde(default)]
    pub tag: i32,
    /// Height of the lower texture on the front and back side, if set.
    #[serde(default)]
    pub lower_texture_height: [Option<Fixed>; 2],
}

impl Line {
    pub fn new(v1: V2Fixed, v2: V2Fixed, front: SectorId, back: Option<SectorId>) -> Self {
        Self {
            v1,
            v2,
            front,
            back,
            special: 0,
            tag: 0,
            lower_texture_height: [None, None],
        }
    }

    pub fn with_special(mut self, special: u16, tag: i32) -> Self {
        self.special = special;
        self.tag = tag;
        self
    }

    pub fn dx(&self) -> Fixed {
        self.v2.x.wrapping_sub(self.v1.x)
    }

    pub fn dy(&self) -> Fixed {
        self.v2.y.wrapping_sub(self.v1.y)
    }

    pub fn is_two_sided(&self) -> bool {
        self.back.is_some()
    }

    pub fn midpoint(&self) -> V2Fixed {
        self.v1.midpoint(self.v2)
    }

    pub fn bbox(&self) -> BBox {
        let mut bbox = BBox::EMPTY;
        bbox.add_point(self.v1);
        bbox.add_point(self.v2);
        bbox
    }
}

// ---------------------------------------------------------------------------
// Things
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThingKind {
    Player,
    Monster,
    Pickup,
    /// Marks where walk teleporters in tagged sectors deliver their user.
    TeleportDestination,
    /// A solid object standing on the floor.
    Obstacle,
    /// A solid object hanging from the ceiling.
    HangingObstacle,
    Decoration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thing {
    pub kind: ThingKind,
    pub pos: V2Fixed,
    pub radius: Fixed,
    pub height: Fixed,
    pub sector: SectorId,
}

impl Thing {
    pub fn new(kind: ThingKind, pos: V2Fixed, sector: SectorId) -> Self {
        Self {
            kind,
            pos,
            radius: units(20),
            height: units(16),
            sector,
        }
    }

    pub fn is_solid(&self) -> bool {
        matches!(self.kind, ThingKind::Obstacle | ThingKind::HangingObstacle)
    }
}

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Level {
    pub sectors: Vec<Sector>,
    pub lines: Vec<Line>,
    #[serde(default)]
    pub things: Vec<Thing>,
}

impl Level {
    /// Build and finalize a snapshot.
    pub fn new(sectors: Vec<Sector>, lines: Vec<Line>, things: Vec<Thing>) -> Result<Self, NavError> {
        let mut level = Self {
            sectors,
            lines,
            things,
        };
        level.finalize()?;
        Ok(level)
    }

    pub fn from_json(json: &str) -> Result<Self, NavError> {
        let mut level: Level = serde_json::from_str(json)?;
        level.finalize()?;
        Ok(level)
    }

    pub fn to_json(&self) -> Result<String, NavError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validate sector references and rebuild per-sector line lists.
    pub fn finalize(&mut self) -> Result<(), NavError> {
        let count = self.sectors.len();
        for sector in &mut self.sectors {
            sector.lines.clear();
        }
        for (i, line) in self.lines.iter().enumerate() {
            let sides = std::iter::once(line.front).chain(line.back);
            for side in sides {
                if side.index() >= count {
                    return Err(NavError::BadLevel(format!(
                        "line {i} references sector {} of {count}",
                        side.0
                    )));
                }
            }
        }
        for (i, thing) in self.things.iter().enumerate() {
            if thing.sector.index() >= count {
                return Err(NavError::BadLevel(format!(
                    "thing {i} references sector {} of {count}",
                    thing.sector.0
                )));
            }
        }
        for (i, line) in self.lines.iter().enumerate() {
            let id = LineId(i as u32);
            self.sectors[line.front.index()].lines.push(id);
            if let Some(back) = line.back {
                if back != line.front {
                    self.sectors[back.index()].lines.push(id);
                }
            }
        }
        Ok(())
    }

    pub fn sector(&self, id: SectorId) -> &Sector {
        &self.sectors[id.index()]
    }

    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.index()]
    }

    pub fn thing(&self, id: ThingId) -> &Thing {
        &self.things[id.index()]
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Sectors carrying `tag`, in index order. Tag zero matches nothing.
    pub fn sectors_with_tag(&self, tag: i32) -> impl Iterator<Item = SectorId> + '_ {
        self.sectors
            .iter()
            .enumerate()
            .filter(move |(_, s)| tag != 0 && s.tag == tag)
            .map(|(i, _)| SectorId(i as u32))
    }

    /// The sector across `line` from `sector`, if the line is two-sided.
    pub fn next_sector(&self, line: LineId, sector: SectorId) -> Option<SectorId> {
        let line = self.line(line);
        let back = line.back?;
        if line.front == sector { Some(back) } else { Some(line.front) }
    }

    fn surrounding(&self, sector: SectorId) -> impl Iterator<Item = SectorId> + '_ {
        self.sector(sector)
            .lines
            .iter()
            .filter_map(move |&line| self.next_sector(line, sector))
    }

    /// First teleport destination marker inside a sector tagged `tag`.
    pub fn teleport_destination(&self, tag: i32) -> Option<ThingId> {
        for sector in self.sectors_with_tag(tag) {
            let found = self
                .things
                .iter()
                .position(|t| t.kind == ThingKind::TeleportDestination && t.sector == sector);
            if let Some(i) = found {
                return Some(ThingId(i as u32));
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Surrounding-height searches
    // -----------------------------------------------------------------------

    pub fn lowest_ceiling_surrounding<H: HeightSource + ?Sized>(
        &self,
        sector: SectorId,
        heights: &H,
        legacy_model: bool,
    ) -> Fixed {
        let start = if legacy_model { Fixed::MAX } else { units(32000) };
        self.surrounding(sector)
            .map(|s| heights.ceiling(s))
            .fold(start, Fixed::min)
    }

    pub fn highest_ceiling_surrounding<H: HeightSource + ?Sized>(
        &self,
        sector: SectorId,
        heights: &H,
        legacy_model: bool,
    ) -> Fixed {
        let start = if legacy_model { 0 } else { units(-32000) };
        self.surrounding(sector)
            .map(|s| heights.ceiling(s))
            .fold(start, Fixed::max)
    }

    pub fn highest_floor_surrounding<H: HeightSource + ?Sized>(
        &self,
        sector: SectorId,
        heights: &H,
        legacy_model: bool,
    ) -> Fixed {
        let start = if legacy_model { units(-500) } else { units(-32000) };
        self.surrounding(sector)
            .map(|s| heights.floor(s))
            .fold(start, Fixed::max)
    }

    pub fn lowest_floor_surrounding<H: HeightSource + ?Sized>(
        &self,
        sector: SectorId,
        heights: &H,
    ) -> Fixed {
        self.surrounding(sector)
            .map(|s| heights.floor(s))
            .fold(heights.floor(sector), Fixed::min)
    }

    /// Smallest surrounding floor strictly above `current`, or `current`.
    pub fn next_highest_floor<H: HeightSource + ?Sized>(
        &self,
        sector: SectorId,
        current: Fixed,
        heights: &H,
    ) -> Fixed {
        self.surrounding(sector)
            .map(|s| heights.floor(s))
            .filter(|&h| h > current)
            .min()
            .unwrap_or(current)
    }

    /// Largest surrounding floor strictly below `current`, or `current`.
    pub fn next_lowest_floor<H: HeightSource + ?Sized>(
        &self,
        sector: SectorId,
        current: Fixed,
        heights: &H,
    ) -> Fixed {
        self.surrounding(sector)
            .map(|s| heights.floor(s))
            .filter(|&h| h < current)
            .max()
            .unwrap_or(current)
    }

    /// Shortest lower texture on any two-sided line of `sector`, used by
    /// raise-to-texture floors.
    pub fn shortest_lower_texture(&self, sector: SectorId, legacy_model: bool) -> Fixed {
        let start = if legacy_model { Fixed::MAX } else { units(32000) };
        self.sector(sector)
            .lines
            .iter()
            .map(|&l| self.line(l))
            .filter(|l| l.is_two_sided())
            .flat_map(|l| l.lower_texture_height.iter().flatten().copied())
            .fold(start, Fixed::min)
    }

    /// Lock of `sector` if it is a classic manual door, `None` otherwise.
    pub fn door_info(&self, sector: SectorId) -> Option<crate::line_special::DoorInfo> {
        crate::line_special::door_info(self, sector)
    }
}
