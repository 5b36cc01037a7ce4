// Speculative level state: "what if this line were activated?"
//
// `LevelStateStack` keeps one stack of hypothetical height entries per real
// sector. Pushing a line special computes the heights its target sectors
// would settle at, following the engine's own rules for that special, and
// stacks them without touching the real level. Popping undoes exactly the
// entries that push created, including cascades into untargeted sectors
// (stairs, donuts), because every push records the sectors it touched in
// its own index list.
//
// Access goes through a `SimulationSession`, which borrows the stack
// mutably and the level immutably. Only one session can be open, real level
// mutation is impossible while it is, and dropping the session clears every
// outstanding push. The session is also a `HeightSource`: top of stack if
// any, otherwise committed heights. `with_real_heights()` temporarily
// switches it to instantaneous real heights.
//
// "Terminal" entries mark an axis whose outcome is momentary or permanent
// (a door that closes again, a lift, a crusher); further pushes on that
// axis are refused.
//
// See also: `line_special.rs` for the special classification,
// `level.rs` for the surrounding-height searches, `heights.rs` for the
// baseline height sources.
//
// **Critical constraint: determinism.** Targets are visited in sector index
// order and cascades follow line index order, so the same push sequence
// always produces the same stacks.

use crate::config::{CompatFlags, NavConfig};
use crate::error::NavError;
use crate::heights::{CommittedHeights, HeightSource, InstantHeights};
use crate::level::Level;
use crate::line_special::{KeySet, LineSpecial, SpecialEffect, line_special};
use crate::types::{Fixed, FRACBITS, LineId, SectorId, units};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tracing::{debug, error};

/// One hypothetical state of a sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorStateEntry {
    /// Special number of the activation that produced this entry.
    pub special: u16,
    pub floor: Fixed,
    /// Second floor height reachable by an oscillating platform.
    pub alt_floor: Fixed,
    pub ceiling: Fixed,
    pub floor_terminal: bool,
    pub ceiling_terminal: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SectorHeightStack {
    entries: Vec<SectorStateEntry>,
}

impl SectorHeightStack {
    pub fn top(&self) -> Option<&SectorStateEntry> {
        self.entries.last()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn floor_terminal(&self) -> bool {
        self.top().is_some_and(|e| e.floor_terminal)
    }

    pub fn ceiling_terminal(&self) -> bool {
        self.top().is_some_and(|e| e.ceiling_terminal)
    }
}

/// Who is activating: clearance needs and keys carried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub height: Fixed,
    pub radius: Fixed,
    pub keys: KeySet,
}

impl AgentProfile {
    pub fn from_config(config: &NavConfig) -> Self {
        Self {
            height: config.agent_height_fixed(),
            radius: config.agent_radius_fixed(),
            keys: KeySet::NONE,
        }
    }

    pub fn with_keys(mut self, keys: KeySet) -> Self {
        self.keys = keys;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct LevelStateStack {
    sectors: Vec<SectorHeightStack>,
    /// Sectors touched by each push, oldest first.
    index_lists: Vec<SmallVec<[SectorId; 4]>>,
    compat: CompatFlags,
}

impl LevelStateStack {
    pub fn new(compat: CompatFlags) -> Self {
        Self {
            sectors: Vec::new(),
            index_lists: Vec::new(),
            compat,
        }
    }

    /// Reset for a new level: one empty stack per sector.
    pub fn init_level(&mut self, level: &Level) {
        self.sectors.clear();
        self.sectors
            .resize_with(level.sector_count(), SectorHeightStack::default);
        self.index_lists.clear();
    }

    /// Open the simulation. The stack is sized to the level if needed.
    pub fn session<'a>(&'a mut self, level: &'a Level) -> SimulationSession<'a> {
        if self.sectors.len() != level.sector_count() {
            self.init_level(level);
        }
        SimulationSession {
            stack: self,
            level,
            use_real_heights: false,
        }
    }

    /// Number of outstanding pushes.
    pub fn depth(&self) -> usize {
        self.index_lists.len()
    }

    pub fn is_idle(&self) -> bool {
        self.index_lists.is_empty()
    }

    pub fn sector_stack(&self, sector: SectorId) -> Option<&SectorHeightStack> {
        self.sectors.get(sector.index())
    }

    fn clear(&mut self) {
        for s in &mut self.sectors {
            s.entries.clear();
        }
        self.index_lists.clear();
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The one open speculative chain. Clears all pushes when dropped.
pub struct SimulationSession<'a> {
    stack: &'a mut LevelStateStack,
    level: &'a Level,
    use_real_heights: bool,
}

impl Drop for SimulationSession<'_> {
    fn drop(&mut self) {
        if !self.stack.is_idle() {
            debug!(depth = self.stack.depth(), "closing session with outstanding pushes");
        }
        self.stack.clear();
    }
}

impl HeightSource for SimulationSession<'_> {
    fn floor(&self, sector: SectorId) -> Fixed {
        if self.use_real_heights {
            return InstantHeights(self.level).floor(sector);
        }
        match self.top(sector) {
            Some(e) => e.floor,
            None => CommittedHeights(self.level).floor(sector),
        }
    }

    fn ceiling(&self, sector: SectorId) -> Fixed {
        if self.use_real_heights {
            return InstantHeights(self.level).ceiling(sector);
        }
        match self.top(sector) {
            Some(e) => e.ceiling,
            None => CommittedHeights(self.level).ceiling(sector),
        }
    }

    fn alt_floor(&self, sector: SectorId) -> Fixed {
        if self.use_real_heights {
            return InstantHeights(self.level).alt_floor(sector);
        }
        match self.top(sector) {
            Some(e) => e.alt_floor,
            None => CommittedHeights(self.level).alt_floor(sector),
        }
    }
}

impl<'a> SimulationSession<'a> {
    pub fn level(&self) -> &'a Level {
        self.level
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_idle()
    }

    fn top(&self, sector: SectorId) -> Option<&SectorStateEntry> {
        self.stack.sectors.get(sector.index())?.top()
    }

    pub fn is_floor_terminal(&self, sector: SectorId) -> bool {
        self.top(sector).is_some_and(|e| e.floor_terminal)
    }

    pub fn is_ceiling_terminal(&self, sector: SectorId) -> bool {
        self.top(sector).is_some_and(|e| e.ceiling_terminal)
    }

    /// Hypothetical entries stacked on `sector`.
    pub fn sector_depth(&self, sector: SectorId) -> usize {
        self.stack.sectors.get(sector.index()).map_or(0, |s| s.depth())
    }

    /// Sectors the most recent push touched, in push order.
    pub fn last_pushed(&self) -> &[SectorId] {
        self.stack.index_lists.last().map_or(&[], |l| l.as_slice())
    }

    /// Run `f` with the session reporting instantaneous real heights.
    pub fn with_real_heights<R>(&mut self, f: impl FnOnce(&Self) -> R) -> R {
        let previous = self.use_real_heights;
        self.use_real_heights = true;
        let result = f(self);
        self.use_real_heights = previous;
        result
    }

    /// Simulate activating `line` by `agent`. Returns false, leaving the
    /// stack unchanged, if the special has no height effect, the agent lacks
    /// the key, or no target sector would change.
    pub fn push(&mut self, line: LineId, agent: &AgentProfile, exclude: Option<SectorId>) -> bool {
        let level = self.level;
        let Some(l) = level.lines.get(line.index()) else {
            return false;
        };
        let Some(special) = line_special(l) else {
            return false;
        };
        if !special.moves_sectors() {
            return false;
        }
        if !agent.keys.opens(special.lock()) {
            debug!(line = line.0, special = special.number, "activation needs a key the agent lacks");
            return false;
        }

        let targets: SmallVec<[SectorId; 4]> = if special.targets_back_sector() {
            l.back.into_iter().collect()
        } else {
            level.sectors_with_tag(l.tag).collect()
        };

        let mut pushed: SmallVec<[SectorId; 4]> = SmallVec::new();
        for sector in targets {
            if Some(sector) == exclude {
                continue;
            }
            self.push_sector(line, &special, sector, &mut pushed);
        }
        if pushed.is_empty() {
            return false;
        }
        debug!(
            line = line.0,
            special = special.number,
            sectors = pushed.len(),
            depth = self.stack.depth() + 1,
            "pushed activation"
        );
        self.stack.index_lists.push(pushed);
        true
    }

    /// Undo the most recent push.
    pub fn pop(&mut self) -> Result<(), NavError> {
        let Some(list) = self.stack.index_lists.pop() else {
            error!("pop() on an empty level state stack");
            return Err(NavError::PopEmptyStack);
        };
        for sector in list.iter().rev() {
            self.stack.sectors[sector.index()].entries.pop();
        }
        debug!(sectors = list.len(), depth = self.stack.depth(), "popped activation");
        Ok(())
    }

    /// Drop every outstanding push.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    fn push_entry(&mut self, sector: SectorId, entry: SectorStateEntry, list: &mut SmallVec<[SectorId; 4]>) {
        self.stack.sectors[sector.index()].entries.push(entry);
        list.push(sector);
    }

    fn push_sector(
        &mut self,
        line: LineId,
        special: &LineSpecial,
        sector: SectorId,
        list: &mut SmallVec<[SectorId; 4]>,
    ) {
        let level = self.level;
        let legacy = self.stack.compat.model;
        let floor_blocked = self.is_floor_terminal(sector);
        let ceiling_blocked = self.is_ceiling_terminal(sector);
        if floor_blocked && ceiling_blocked {
            return;
        }

        let last_floor = self.floor(sector);
        let last_ceiling = self.ceiling(sector);
        let last_alt = self.alt_floor(sector);
        let mut floor = last_floor;
        let mut ceiling = last_ceiling;
        let mut alt: Option<Fixed> = None;
        let mut floor_terminal = floor_blocked;
        let mut ceiling_terminal = ceiling_blocked;
        let mut others = false;

        use SpecialEffect::*;
        let needs_ceiling = matches!(
            special.effect,
            OpenDoor
                | RaiseDoor
                | CloseDoor
                | CeilingLowerAndCrush
                | CloseDoor30
                | CeilingLowerToLowest
                | CeilingLowerToMaxFloor
                | Crusher
                | RaiseCeiling
        );
        let needs_both = matches!(special.effect, ElevatorUp | ElevatorDown | ElevatorCurrent);
        if (needs_ceiling && ceiling_blocked) || (needs_both && (floor_blocked || ceiling_blocked)) {
            return;
        }
        let needs_floor = !needs_ceiling && !needs_both && special.effect != RaiseCeilingOrLowerFloor;
        if needs_floor && floor_blocked {
            return;
        }

        match special.effect {
            OpenDoor => {
                ceiling = level
                    .lowest_ceiling_surrounding(sector, &*self, legacy)
                    .saturating_sub(units(4));
            }
            RaiseDoor => {
                ceiling = level
                    .lowest_ceiling_surrounding(sector, &*self, legacy)
                    .saturating_sub(units(4));
                ceiling_terminal = true;
            }
            CloseDoor => ceiling = floor,
            CeilingLowerAndCrush => ceiling = floor.saturating_add(units(8)),
            CloseDoor30 => {
                ceiling = floor;
                ceiling_terminal = true;
            }
            CeilingLowerToLowest => ceiling = level.lowest_ceiling_surrounding(sector, &*self, legacy),
            CeilingLowerToMaxFloor => ceiling = level.highest_floor_surrounding(sector, &*self, legacy),
            FloorLowerToNearest => floor = level.next_lowest_floor(sector, last_floor, &*self),
            PlatDownWaitUpStay => {
                floor = level.lowest_floor_surrounding(sector, &*self).min(floor);
                floor_terminal = true;
                alt = Some(last_floor);
            }
            LowerFloor => floor = level.highest_floor_surrounding(sector, &*self, legacy),
            LowerFloorTurbo => {
                floor = level.highest_floor_surrounding(sector, &*self, legacy);
                if floor != last_floor {
                    floor = floor.saturating_add(units(8));
                }
            }
            FloorLowerToLowest => floor = level.lowest_floor_surrounding(sector, &*self),
            RaiseFloorBy(amount) => floor = floor.saturating_add(units(amount)),
            FloorRaiseToTexture => {
                let minsize = level.shortest_lower_texture(sector, legacy);
                floor = if legacy {
                    floor.saturating_add(minsize)
                } else {
                    let raised = ((floor >> FRACBITS) + (minsize >> FRACBITS)).min(32000);
                    units(raised)
                };
            }
            PlatPerpetual => {
                floor = level.lowest_floor_surrounding(sector, &*self).min(last_floor);
                alt = Some(level.highest_floor_surrounding(sector, &*self, legacy).max(last_floor));
                floor_terminal = true;
            }
            Crusher => {
                ceiling = floor.saturating_add(units(8));
                ceiling_terminal = true;
            }
            FloorRaiseToNearest => floor = level.next_highest_floor(sector, floor, &*self),
            RaiseFloor => {
                floor = level.lowest_ceiling_surrounding(sector, &*self, legacy).min(ceiling);
            }
            FloorRaiseCrush => {
                floor = level
                    .lowest_ceiling_surrounding(sector, &*self, legacy)
                    .min(ceiling)
                    .saturating_sub(units(8));
            }
            RaiseCeiling => ceiling = level.highest_ceiling_surrounding(sector, &*self, legacy),
            RaiseCeilingOrLowerFloor => {
                if !ceiling_blocked {
                    ceiling = level.highest_ceiling_surrounding(sector, &*self, legacy);
                } else {
                    floor = level.lowest_floor_surrounding(sector, &*self);
                }
            }
            BuildStairs { step } => {
                others = self.fill_in_stairs(sector, special.number, step, &mut floor, list);
            }
            Donut => {
                others = self.fill_in_donut(sector, special.number, &mut floor, list);
            }
            ElevatorUp => {
                floor = level.next_highest_floor(sector, last_floor, &*self);
                ceiling = keep_gap(floor, last_floor, last_ceiling);
            }
            ElevatorDown => {
                floor = level.next_lowest_floor(sector, last_floor, &*self);
                ceiling = keep_gap(floor, last_floor, last_ceiling);
            }
            ElevatorCurrent => {
                floor = self.floor(level.line(line).front);
                ceiling = keep_gap(floor, last_floor, last_ceiling);
            }
            Teleport | Inert => return,
        }

        let alt_floor = alt.unwrap_or(if floor == last_floor { last_alt } else { floor });
        if !others && floor == last_floor && ceiling == last_ceiling && alt_floor == last_alt {
            return;
        }
        let entry = SectorStateEntry {
            special: special.number,
            floor,
            alt_floor,
            ceiling,
            floor_terminal,
            ceiling_terminal,
        };
        self.push_entry(sector, entry, list);
    }

    /// Raise the stair steps beyond the first. Each further step is the
    /// sector behind the first two-sided line facing out of the previous step
    /// with the same floor texture as the first. Returns whether any further
    /// step changed height.
    fn fill_in_stairs(
        &mut self,
        start: SectorId,
        special: u16,
        step: i32,
        floor: &mut Fixed,
        list: &mut SmallVec<[SectorId; 4]>,
    ) -> bool {
        let level = self.level;
        let step = units(step);
        let old_order = self.stack.compat.old_stair_order();
        let texture = level.sector(start).floor_pic;

        let mut height = floor.saturating_add(step);
        *floor = height;
        let mut current = start;
        let mut visited: SmallVec<[SectorId; 8]> = smallvec![start];
        let mut others = false;

        loop {
            let mut next = None;
            for &id in &level.sector(current).lines {
                let l = level.line(id);
                if l.front != current {
                    continue;
                }
                let Some(back) = l.back else {
                    continue;
                };
                if level.sector(back).floor_pic != texture {
                    continue;
                }
                if old_order {
                    height = height.saturating_add(step);
                }
                if visited.contains(&back) || self.is_floor_terminal(back) {
                    continue;
                }
                if !old_order {
                    height = height.saturating_add(step);
                }
                next = Some(back);
                break;
            }
            let Some(next) = next else {
                break;
            };
            visited.push(next);
            if height != self.floor(next) {
                others = true;
            }
            let entry = SectorStateEntry {
                special,
                floor: height,
                alt_floor: height,
                ceiling: self.ceiling(next),
                floor_terminal: false,
                ceiling_terminal: self.is_ceiling_terminal(next),
            };
            self.push_entry(next, entry, list);
            current = next;
        }
        others
    }

    /// Lower the moat around a pillar to the outer floor, and the pillar with
    /// it. Returns whether the moat changed height.
    fn fill_in_donut(
        &mut self,
        pillar: SectorId,
        special: u16,
        floor: &mut Fixed,
        list: &mut SmallVec<[SectorId; 4]>,
    ) -> bool {
        let level = self.level;
        let compat = self.stack.compat;
        let Some(&first) = level.sector(pillar).lines.first() else {
            return false;
        };
        let Some(moat) = level.next_sector(first, pillar) else {
            return false;
        };
        if !compat.floors && self.is_floor_terminal(moat) {
            return false;
        }
        for &id in &level.sector(moat).lines {
            let outer = match level.line(id).back {
                Some(back) if back == pillar => continue,
                Some(back) => back,
                // No outer sector: the engine reads past the sector array
                // here. There is nothing sensible to predict.
                None if compat.model => return false,
                None => continue,
            };
            let outer_floor = self.floor(outer);
            *floor = outer_floor;
            // A moat already level with the outer floor gets no entry.
            if outer_floor == self.floor(moat) && outer_floor == self.alt_floor(moat) {
                return false;
            }
            let entry = SectorStateEntry {
                special,
                floor: outer_floor,
                alt_floor: outer_floor,
                ceiling: self.ceiling(moat),
                floor_terminal: self.is_floor_terminal(moat),
                ceiling_terminal: self.is_ceiling_terminal(moat),
            };
            self.push_entry(moat, entry, list);
            return true;
        }
        false
    }
}

fn keep_gap(floor: Fixed, last_floor: Fixed, last_ceiling: Fixed) -> Fixed {
    let gap = last_ceiling as i64 - last_floor as i64;
    (floor as i64 + gap).clamp(Fixed::MIN as i64, Fixed::MAX as i64) as Fixed
}
