//! Threat estimation for a target room.
//!
//! Derives expected incoming damage, the boost decision, the staging
//! fallback position and the combat phase a raid mission keys its state
//! machine off. Pure reads of the snapshot; recomputed every tick.

use crate::constants::*;
use crate::loadout::should_boost;
use crate::world::{Faction, KindFlags, Part, Position, RoomCoord, World};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CombatPhase {
    /// Units are assembling at the fallback position.
    Staging,
    /// Units are operating inside the target room.
    Engaging,
    /// The objective is gone; the mission should wind down.
    Complete,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct ThreatState {
    pub hostiles_present: bool,
    /// At least one hostile belongs to a rival player rather than the
    /// environment. Emergency repair targeting keys off this.
    pub rival_hostiles: bool,
    /// Damage per tick a unit should expect while operating in the room.
    pub expected_damage: u32,
    pub boost: bool,
    /// Staging point just outside the target room.
    pub fallback_pos: Position,
    pub phase: CombatPhase,
}

/// Tower damage at a given range: full inside the falloff start, linear
/// decay out to the falloff end.
pub fn tower_damage_at_range(range: u32) -> u32 {
    if range <= TOWER_FALLOFF_START {
        TOWER_DAMAGE_MAX
    } else if range >= TOWER_FALLOFF_END {
        TOWER_DAMAGE_MIN
    } else {
        let span = TOWER_FALLOFF_END - TOWER_FALLOFF_START;
        let t = range - TOWER_FALLOFF_START;

        TOWER_DAMAGE_MAX - (TOWER_DAMAGE_MAX - TOWER_DAMAGE_MIN) * t / span
    }
}

/// Estimate the threat in `target_room` for units staged from
/// `staging_room` (normally the neighboring room toward home).
pub fn estimate_room_threat(world: &World, target_room: RoomCoord, staging_room: RoomCoord) -> ThreatState {
    let probe = Position::new(target_room, ROOM_SIZE / 2, ROOM_SIZE / 2);

    let mut expected_damage = 0;
    let mut hostiles_present = false;
    let mut rival_hostiles = false;

    for hostile in world.hostiles_in_room(target_room) {
        hostiles_present = true;
        rival_hostiles |= hostile.faction == Faction::Rival;

        expected_damage += hostile.part_count(Part::Attack) * ATTACK_POWER + hostile.part_count(Part::RangedAttack) * 10;
    }

    let mut offensive_structures = false;

    if let Some(room) = world.room(target_room) {
        for tower in room.structures_of(KindFlags::TOWER) {
            expected_damage += tower_damage_at_range(tower.pos.range_to(probe));
        }

        offensive_structures = room.structures_of(KindFlags::SPAWN).next().is_some();
    }

    let phase = if !offensive_structures {
        CombatPhase::Complete
    } else if world.units_in_room(target_room).any(|u| u.faction == Faction::Ours) {
        CombatPhase::Engaging
    } else {
        CombatPhase::Staging
    };

    ThreatState {
        hostiles_present,
        rival_hostiles,
        expected_damage,
        boost: should_boost(expected_damage),
        fallback_pos: fallback_position(target_room, staging_room),
        phase,
    }
}

/// A staging tile in `staging_room`, pulled two tiles in from the border
/// shared with the target room so a regrouping unit is not exposed.
pub fn fallback_position(target_room: RoomCoord, staging_room: RoomCoord) -> Position {
    let mid = ROOM_SIZE / 2;

    let (dx, dy) = (target_room.x - staging_room.x, target_room.y - staging_room.y);

    if dx > 0 {
        Position::new(staging_room, ROOM_SIZE - 3, mid)
    } else if dx < 0 {
        Position::new(staging_room, 2, mid)
    } else if dy > 0 {
        Position::new(staging_room, mid, ROOM_SIZE - 3)
    } else if dy < 0 {
        Position::new(staging_room, mid, 2)
    } else {
        Position::new(staging_room, mid, mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{assemble_unit, Room, StructureKind, UnitMemory};

    fn raid_world() -> (World, RoomCoord, RoomCoord) {
        let mut world = World::new();
        let target = RoomCoord::new(1, 0);
        let staging = RoomCoord::new(0, 0);
        world.add_room(Room::new(target));
        world.add_room(Room::new(staging));

        (world, target, staging)
    }

    #[test]
    fn tower_damage_falls_off_linearly() {
        assert_eq!(tower_damage_at_range(0), TOWER_DAMAGE_MAX);
        assert_eq!(tower_damage_at_range(5), TOWER_DAMAGE_MAX);
        assert_eq!(tower_damage_at_range(20), TOWER_DAMAGE_MIN);
        assert_eq!(tower_damage_at_range(40), TOWER_DAMAGE_MIN);

        let mid = tower_damage_at_range(12);
        assert!(mid < TOWER_DAMAGE_MAX && mid > TOWER_DAMAGE_MIN);
    }

    #[test]
    fn quiet_room_with_objective_is_staging() {
        let (mut world, target, staging) = raid_world();
        world.insert_structure(target, StructureKind::Spawn, Position::new(target, 25, 25), 5_000, 5_000);

        let threat = estimate_room_threat(&world, target, staging);

        assert_eq!(threat.phase, CombatPhase::Staging);
        assert!(!threat.hostiles_present);
        assert_eq!(threat.expected_damage, 0);
        assert!(!threat.boost);
    }

    #[test]
    fn towers_raise_expected_damage_and_boost() {
        let (mut world, target, staging) = raid_world();
        world.insert_structure(target, StructureKind::Spawn, Position::new(target, 25, 25), 5_000, 5_000);
        world.insert_structure(target, StructureKind::Tower, Position::new(target, 24, 25), 3_000, 3_000);

        let threat = estimate_room_threat(&world, target, staging);

        assert_eq!(threat.expected_damage, TOWER_DAMAGE_MAX);
        assert!(threat.boost);
    }

    #[test]
    fn destroyed_objective_means_complete() {
        let (world, target, staging) = raid_world();

        let threat = estimate_room_threat(&world, target, staging);

        assert_eq!(threat.phase, CombatPhase::Complete);
    }

    #[test]
    fn fallback_sits_inside_the_staging_room() {
        let (_, target, staging) = raid_world();

        let fallback = fallback_position(target, staging);

        assert_eq!(fallback.room, staging);
        assert_eq!(fallback.x, ROOM_SIZE - 3);
        assert!(!fallback.is_near_exit(0));
    }

    #[test]
    fn rival_presence_is_distinguished_from_environmental() {
        let (mut world, target, staging) = raid_world();
        world.insert_structure(target, StructureKind::Spawn, Position::new(target, 25, 25), 5_000, 5_000);

        let id = world.alloc_id();
        world.insert_unit(assemble_unit(
            id,
            "npc".into(),
            "npc".into(),
            Faction::Npc,
            Position::new(target, 10, 10),
            vec![Part::Attack, Part::Move],
            UnitMemory::default(),
        ));

        let threat = estimate_room_threat(&world, target, staging);

        assert!(threat.hostiles_present);
        assert!(!threat.rival_hostiles);
        assert_eq!(threat.expected_damage, ATTACK_POWER);
    }
}
