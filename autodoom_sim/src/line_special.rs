// Classification of classic line specials.
//
// Maps a line's special number to how it is activated (walk, switch, gun,
// manual use; once or repeatable), which key it needs, and which height
// effect it has on its target sectors. The simulator in `state_stack.rs`
// only needs the effect group: doors that open the same way share a group
// regardless of speed or whether they change textures.
//
// Specials with no height effect (lights, exits, scripts, mover stops,
// texture changes, monster-only and line-to-line teleports) classify as
// `SpecialEffect::Inert`. Numbers outside the classic table return `None`.
//
// See also: `state_stack.rs` (the simulator that applies the effects),
// `pathfinding.rs` (walk teleporters).

use crate::level::{Level, Line};
use crate::types::SectorId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Activation and keys
// ---------------------------------------------------------------------------

/// How a line special is triggered, and whether it can be triggered again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    W1,
    WR,
    S1,
    SR,
    G1,
    GR,
    /// Manual use, once. Targets the sector behind the line.
    D1,
    /// Manual use, repeatable. Targets the sector behind the line.
    DR,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Walk,
    Switch,
    Gun,
    Manual,
}

impl Activation {
    pub fn trigger(self) -> Trigger {
        match self {
            Activation::W1 | Activation::WR => Trigger::Walk,
            Activation::S1 | Activation::SR => Trigger::Switch,
            Activation::G1 | Activation::GR => Trigger::Gun,
            Activation::D1 | Activation::DR => Trigger::Manual,
        }
    }

    pub fn repeatable(self) -> bool {
        matches!(
            self,
            Activation::WR | Activation::SR | Activation::GR | Activation::DR
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Blue,
    Yellow,
    Red,
}

impl Key {
    fn bit(self) -> u8 {
        match self {
            Key::Blue => 1,
            Key::Yellow => 2,
            Key::Red => 4,
        }
    }
}

/// Set of keys an agent carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySet(u8);

impl KeySet {
    pub const NONE: Self = Self(0);

    pub fn all() -> Self {
        Self(Key::Blue.bit() | Key::Yellow.bit() | Key::Red.bit())
    }

    pub fn with(self, key: Key) -> Self {
        Self(self.0 | key.bit())
    }

    pub fn has(self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    /// True if this set opens a lock (`None` means unlocked).
    pub fn opens(self, lock: Option<Key>) -> bool {
        lock.is_none_or(|k| self.has(k))
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Height effect of a special on each of its target sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialEffect {
    /// Ceiling rises to 4 below the lowest surrounding ceiling and stays.
    OpenDoor,
    /// Ceiling rises, then comes back down; the open height is a terminal.
    RaiseDoor,
    CloseDoor,
    /// Ceiling lowers to 8 above the floor.
    CeilingLowerAndCrush,
    /// Closes, then reopens after 30 seconds.
    CloseDoor30,
    CeilingLowerToLowest,
    CeilingLowerToMaxFloor,
    FloorLowerToNearest,
    /// Lift: down to the lowest neighbor floor, wait, back up.
    PlatDownWaitUpStay,
    /// Floor lowers to the highest surrounding floor.
    LowerFloor,
    /// As `LowerFloor`, but 8 above it when it moves.
    LowerFloorTurbo,
    FloorLowerToLowest,
    /// Floor rises by a fixed amount of map units.
    RaiseFloorBy(i32),
    /// Floor rises by the shortest lower texture.
    FloorRaiseToTexture,
    /// Platform oscillating between the lowest and highest neighbor floors.
    PlatPerpetual,
    /// Ceiling crushes down to 8 above the floor and cycles.
    Crusher,
    FloorRaiseToNearest,
    /// Floor rises to the lowest surrounding ceiling.
    RaiseFloor,
    /// As `RaiseFloor`, stopping 8 short.
    FloorRaiseCrush,
    RaiseCeiling,
    RaiseCeilingOrLowerFloor,
    /// Stairs rising by `step` units per step.
    BuildStairs { step: i32 },
    Donut,
    ElevatorUp,
    ElevatorDown,
    ElevatorCurrent,
    /// Thing teleport to a destination marker in a tagged sector.
    Teleport,
    /// No effect on sector heights.
    Inert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpecial {
    pub number: u16,
    pub activation: Activation,
    pub effect: SpecialEffect,
}

impl LineSpecial {
    /// Key needed to activate, if any.
    pub fn lock(&self) -> Option<Key> {
        match self.number {
            26 | 32 | 99 | 133 => Some(Key::Blue),
            27 | 34 | 136 | 137 => Some(Key::Yellow),
            28 | 33 | 134 | 135 => Some(Key::Red),
            _ => None,
        }
    }

    /// True for walk-over teleporters a player can use.
    pub fn is_walk_teleport(&self) -> bool {
        matches!(self.number, 39 | 97 | 207 | 208)
    }

    /// Manual doors act on the sector behind the line, not on tagged sectors.
    pub fn targets_back_sector(&self) -> bool {
        self.activation.trigger() == Trigger::Manual
    }

    pub fn moves_sectors(&self) -> bool {
        !matches!(self.effect, SpecialEffect::Inert | SpecialEffect::Teleport)
    }
}

use Activation::*;
use SpecialEffect::*;

#[rustfmt::skip]
const CLASSIC_SPECIALS: &[(u16, Activation, SpecialEffect)] = &[
    (1, DR, RaiseDoor),
    (2, W1, OpenDoor),
    (3, W1, CloseDoor),
    (4, W1, RaiseDoor),
    (5, W1, RaiseFloor),
    (6, W1, Crusher),
    (7, S1, BuildStairs { step: 8 }),
    (8, W1, BuildStairs { step: 8 }),
    (9, S1, Donut),
    (10, W1, PlatDownWaitUpStay),
    (11, S1, Inert),
    (12, W1, Inert),
    (13, W1, Inert),
    (14, S1, RaiseFloorBy(32)),
    (15, S1, RaiseFloorBy(24)),
    (16, W1, CloseDoor30),
    (17, W1, Inert),
    (18, S1, FloorRaiseToNearest),
    (19, W1, LowerFloor),
    (20, S1, FloorRaiseToNearest),
    (21, S1, PlatDownWaitUpStay),
    (22, W1, FloorRaiseToNearest),
    (23, S1, FloorLowerToLowest),
    (24, G1, RaiseFloor),
    (25, W1, Crusher),
    (26, DR, RaiseDoor),
    (27, DR, RaiseDoor),
    (28, DR, RaiseDoor),
    (29, S1, RaiseDoor),
    (30, W1, FloorRaiseToTexture),
    (31, D1, OpenDoor),
    (32, D1, OpenDoor),
    (33, D1, OpenDoor),
    (34, D1, OpenDoor),
    (35, W1, Inert),
    (36, W1, LowerFloorTurbo),
    (37, W1, FloorLowerToLowest),
    (38, W1, FloorLowerToLowest),
    (39, W1, Teleport),
    (40, W1, RaiseCeiling),
    (41, S1, CloseDoor),
    (42, SR, CloseDoor),
    (43, SR, CloseDoor),
    (44, W1, CeilingLowerAndCrush),
    (45, SR, LowerFloor),
    (46, GR, OpenDoor),
    (47, G1, FloorRaiseToNearest),
    (49, S1, Crusher),
    (50, S1, CloseDoor),
    (51, S1, Inert),
    (52, WR, Inert),
    (53, W1, PlatPerpetual),
    (54, W1, Inert),
    (55, S1, FloorRaiseCrush),
    (56, W1, FloorRaiseCrush),
    (57, W1, Inert),
    (58, W1, RaiseFloorBy(24)),
    (59, W1, RaiseFloorBy(24)),
    (60, SR, FloorLowerToLowest),
    (61, SR, OpenDoor),
    (62, SR, PlatDownWaitUpStay),
    (63, SR, RaiseDoor),
    (64, SR, RaiseFloor),
    (65, SR, FloorRaiseCrush),
    (66, SR, RaiseFloorBy(24)),
    (67, SR, RaiseFloorBy(32)),
    (68, SR, FloorRaiseToNearest),
    (69, SR, FloorRaiseToNearest),
    (70, SR, LowerFloorTurbo),
    (71, S1, LowerFloorTurbo),
    (72, WR, CeilingLowerAndCrush),
    (73, WR, Crusher),
    (74, WR, Inert),
    (75, WR, CloseDoor),
    (76, WR, CloseDoor30),
    (77, WR, Crusher),
    (78, SR, Inert),
    (79, WR, Inert),
    (80, WR, Inert),
    (81, WR, Inert),
    (82, WR, FloorLowerToLowest),
    (83, WR, LowerFloor),
    (84, WR, FloorLowerToLowest),
    (86, WR, OpenDoor),
    (87, WR, PlatPerpetual),
    (88, WR, PlatDownWaitUpStay),
    (89, WR, Inert),
    (90, WR, RaiseDoor),
    (91, WR, RaiseFloor),
    (92, WR, RaiseFloorBy(24)),
    (93, WR, RaiseFloorBy(24)),
    (94, WR, FloorRaiseCrush),
    (95, WR, FloorRaiseToNearest),
    (96, WR, FloorRaiseToTexture),
    (97, WR, Teleport),
    (98, WR, LowerFloorTurbo),
    (99, SR, OpenDoor),
    (100, W1, BuildStairs { step: 16 }),
    (101, S1, RaiseFloor),
    (102, S1, LowerFloor),
    (103, S1, OpenDoor),
    (104, W1, Inert),
    (105, WR, RaiseDoor),
    (106, WR, OpenDoor),
    (107, WR, CloseDoor),
    (108, W1, RaiseDoor),
    (109, W1, OpenDoor),
    (110, W1, CloseDoor),
    (111, S1, RaiseDoor),
    (112, S1, OpenDoor),
    (113, S1, CloseDoor),
    (114, SR, RaiseDoor),
    (115, SR, OpenDoor),
    (116, SR, CloseDoor),
    (117, DR, RaiseDoor),
    (118, D1, OpenDoor),
    (119, W1, FloorRaiseToNearest),
    (120, WR, PlatDownWaitUpStay),
    (121, W1, PlatDownWaitUpStay),
    (122, S1, PlatDownWaitUpStay),
    (123, SR, PlatDownWaitUpStay),
    (124, WR, Inert),
    (125, W1, Inert),
    (126, WR, Inert),
    (127, S1, BuildStairs { step: 16 }),
    (128, WR, FloorRaiseToNearest),
    (129, WR, FloorRaiseToNearest),
    (130, W1, FloorRaiseToNearest),
    (131, S1, FloorRaiseToNearest),
    (132, SR, FloorRaiseToNearest),
    (133, S1, OpenDoor),
    (134, SR, OpenDoor),
    (135, S1, OpenDoor),
    (136, SR, OpenDoor),
    (137, S1, OpenDoor),
    (138, SR, Inert),
    (139, SR, Inert),
    (140, S1, RaiseFloorBy(512)),
    (141, W1, Crusher),
    (142, W1, RaiseFloorBy(512)),
    (143, W1, RaiseFloorBy(24)),
    (144, W1, RaiseFloorBy(32)),
    (145, W1, CloseDoor),
    (146, W1, Donut),
    (147, WR, RaiseFloorBy(512)),
    (148, WR, RaiseFloorBy(24)),
    (149, WR, RaiseFloorBy(32)),
    (150, WR, Crusher),
    (151, WR, RaiseCeiling),
    (152, WR, CloseDoor),
    (153, W1, Inert),
    (154, WR, Inert),
    (155, WR, Donut),
    (156, WR, Inert),
    (157, WR, Inert),
    (158, S1, FloorRaiseToTexture),
    (159, S1, FloorLowerToLowest),
    (160, S1, RaiseFloorBy(24)),
    (161, S1, RaiseFloorBy(24)),
    (162, S1, PlatPerpetual),
    (163, S1, Inert),
    (164, S1, Crusher),
    (165, S1, Crusher),
    (166, S1, RaiseCeilingOrLowerFloor),
    (167, S1, CeilingLowerAndCrush),
    (168, S1, Inert),
    (169, S1, Inert),
    (170, S1, Inert),
    (171, S1, Inert),
    (172, S1, Inert),
    (173, S1, Inert),
    (174, S1, Teleport),
    (175, S1, CloseDoor30),
    (176, SR, FloorRaiseToTexture),
    (177, SR, FloorLowerToLowest),
    (178, SR, RaiseFloorBy(512)),
    (179, SR, RaiseFloorBy(24)),
    (180, SR, RaiseFloorBy(24)),
    (181, SR, PlatPerpetual),
    (182, SR, Inert),
    (183, SR, Crusher),
    (184, SR, Crusher),
    (185, SR, Crusher),
    (186, SR, RaiseCeilingOrLowerFloor),
    (187, SR, CeilingLowerAndCrush),
    (188, SR, Inert),
    (189, S1, Inert),
    (190, SR, Inert),
    (191, SR, Donut),
    (192, SR, Inert),
    (193, SR, Inert),
    (194, SR, Inert),
    (195, SR, Teleport),
    (196, SR, CloseDoor30),
    (197, G1, Inert),
    (198, G1, Inert),
    (199, W1, CeilingLowerToLowest),
    (200, W1, CeilingLowerToMaxFloor),
    (201, WR, CeilingLowerToLowest),
    (202, WR, CeilingLowerToMaxFloor),
    (203, S1, CeilingLowerToLowest),
    (204, S1, CeilingLowerToMaxFloor),
    (205, SR, CeilingLowerToLowest),
    (206, SR, CeilingLowerToMaxFloor),
    (207, W1, Teleport),
    (208, WR, Teleport),
    (209, S1, Teleport),
    (210, SR, Teleport),
    (211, SR, PlatPerpetual),
    (212, WR, PlatPerpetual),
    (219, W1, FloorLowerToNearest),
    (220, WR, FloorLowerToNearest),
    (221, S1, FloorLowerToNearest),
    (222, SR, FloorLowerToNearest),
    (227, W1, ElevatorUp),
    (228, WR, ElevatorUp),
    (229, S1, ElevatorUp),
    (230, SR, ElevatorUp),
    (231, W1, ElevatorDown),
    (232, WR, ElevatorDown),
    (233, S1, ElevatorDown),
    (234, SR, ElevatorDown),
    (235, W1, ElevatorCurrent),
    (236, WR, ElevatorCurrent),
    (237, S1, ElevatorCurrent),
    (238, SR, ElevatorCurrent),
    (239, W1, Inert),
    (240, WR, Inert),
    (241, S1, Inert),
    (243, W1, Inert),
    (244, WR, Inert),
    (256, WR, BuildStairs { step: 8 }),
    (257, WR, BuildStairs { step: 16 }),
    (258, SR, BuildStairs { step: 8 }),
    (259, SR, BuildStairs { step: 16 }),
    (262, W1, Inert),
    (263, WR, Inert),
    (264, W1, Inert),
    (265, WR, Inert),
    (266, W1, Inert),
    (267, WR, Inert),
    (268, W1, Inert),
    (269, WR, Inert),
    (273, WR, Inert),
    (274, W1, Inert),
    (275, W1, Inert),
    (276, SR, Inert),
    (277, S1, Inert),
    (278, GR, Inert),
    (279, G1, Inert),
    (280, WR, Inert),
];

/// Look up a special number in the classic table.
pub fn classify(special: u16) -> Option<LineSpecial> {
    let i = CLASSIC_SPECIALS
        .binary_search_by_key(&special, |&(n, _, _)| n)
        .ok()?;
    let (number, activation, effect) = CLASSIC_SPECIALS[i];
    Some(LineSpecial {
        number,
        activation,
        effect,
    })
}

/// Classification of a level line's special. `None` for plain lines.
pub fn line_special(line: &Line) -> Option<LineSpecial> {
    if line.special == 0 {
        None
    } else {
        classify(line.special)
    }
}

// ---------------------------------------------------------------------------
// Door sectors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DoorInfo {
    pub lock: Option<Key>,
}

/// Recognize a classic manual door: every two-sided line of the sector faces
/// away from it (the sector is on the back), carries a manual door special,
/// and all of them need the same key.
pub fn door_info(level: &Level, sector: SectorId) -> Option<DoorInfo> {
    let mut lock = None;
    let mut found = false;
    for &id in &level.sector(sector).lines {
        let line = level.line(id);
        if !line.is_two_sided() {
            continue;
        }
        if line.back != Some(sector) {
            return None;
        }
        let special = line_special(line)?;
        if !special.targets_back_sector() {
            return None;
        }
        if found && special.lock() != lock {
            return None;
        }
        lock = special.lock();
        found = true;
    }
    found.then_some(DoorInfo { lock })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Sector;
    use crate::types::{V2Fixed, units};

    #[test]
    fn table_is_sorted_and_unique() {
        for pair in CLASSIC_SPECIALS.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} before {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn classify_known_specials() {
        let dr = classify(1).unwrap();
        assert_eq!(dr.activation, DR);
        assert_eq!(dr.effect, RaiseDoor);
        assert!(dr.targets_back_sector());
        assert!(dr.activation.repeatable());

        let stairs = classify(7).unwrap();
        assert_eq!(stairs.activation.trigger(), Trigger::Switch);
        assert_eq!(stairs.effect, BuildStairs { step: 8 });
        assert_eq!(classify(100).unwrap().effect, BuildStairs { step: 16 });
        assert_eq!(classify(142).unwrap().effect, RaiseFloorBy(512));
        assert_eq!(classify(46).unwrap().activation.trigger(), Trigger::Gun);
    }

    #[test]
    fn inert_and_unknown() {
        // Exit switch.
        assert_eq!(classify(11).unwrap().effect, Inert);
        assert!(!classify(11).unwrap().moves_sectors());
        assert_eq!(classify(0), None);
        assert_eq!(classify(48), None);
        assert_eq!(classify(9999), None);
    }

    #[test]
    fn locks() {
        assert_eq!(classify(26).unwrap().lock(), Some(Key::Blue));
        assert_eq!(classify(137).unwrap().lock(), Some(Key::Yellow));
        assert_eq!(classify(33).unwrap().lock(), Some(Key::Red));
        assert_eq!(classify(1).unwrap().lock(), None);
        let keys = KeySet::NONE.with(Key::Red);
        assert!(keys.opens(Some(Key::Red)));
        assert!(!keys.opens(Some(Key::Blue)));
        assert!(keys.opens(None));
        assert!(KeySet::all().has(Key::Yellow));
    }

    #[test]
    fn walk_teleports() {
        for n in [39, 97, 207, 208] {
            assert!(classify(n).unwrap().is_walk_teleport());
        }
        // Switch teleport and line-to-line teleport are not walk teleports.
        assert!(!classify(174).unwrap().is_walk_teleport());
        assert!(!classify(243).unwrap().is_walk_teleport());
    }

    /// Door sector 1 between rooms 0 and 2, both lines facing outward.
    fn door_level(specials: [u16; 2]) -> Level {
        let sectors = vec![
            Sector::new(0, units(128)),
            Sector::new(0, 0),
            Sector::new(0, units(128)),
        ];
        let lines = vec![
            Line::new(
                V2Fixed::from_units(64, 64),
                V2Fixed::from_units(64, 0),
                SectorId(0),
                Some(SectorId(1)),
            )
            .with_special(specials[0], 0),
            Line::new(
                V2Fixed::from_units(128, 0),
                V2Fixed::from_units(128, 64),
                SectorId(2),
                Some(SectorId(1)),
            )
            .with_special(specials[1], 0),
        ];
        Level::new(sectors, lines, Vec::new()).unwrap()
    }

    #[test]
    fn door_sector_detection() {
        let level = door_level([1, 1]);
        assert_eq!(door_info(&level, SectorId(1)), Some(DoorInfo { lock: None }));
        // The rooms are on the front side of the door lines.
        assert_eq!(door_info(&level, SectorId(0)), None);

        let blue = door_level([26, 32]);
        assert_eq!(
            door_info(&blue, SectorId(1)),
            Some(DoorInfo {
                lock: Some(Key::Blue)
            })
        );

        let mixed = door_level([26, 27]);
        assert_eq!(door_info(&mixed, SectorId(1)), None);

        let switch = door_level([1, 103]);
        assert_eq!(door_info(&switch, SectorId(1)), None);
    }
}
