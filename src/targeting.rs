//! Work-target selection.
//!
//! A strict priority chain evaluated per acting unit per tick, short
//! circuiting at the first hit. Stale cached ids are cleared at the point
//! they fail to resolve, and the wear-ceiling escalation is a bounded
//! iterative loop so selection terminates even when nothing qualifies.

use crate::config::SimConfig;
use crate::constants::{BASE_WEAR_CEILING, INTERACT_RANGE};
use crate::memory::MissionMemory;
use crate::world::{find_nearest, ConstructionSite, KindFlags, ObjectId, RoomCoord, World, CONTROLLER_MAX_LEVEL};
use itertools::Itertools;
use log::*;

/// Outcome of the fallback chain for one unit.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WorkTarget {
    Build(ObjectId),
    Repair(ObjectId),
    Upgrade,
    Idle,
}

/// Defensive structures in the room, most-worn first. Built once per tick
/// per mission and consumed by emergency targeting so units fan out.
pub fn build_emergency_pool(world: &World, room: RoomCoord) -> Vec<ObjectId> {
    let Some(room) = world.room(room) else {
        return Vec::new();
    };

    room.structures_of(KindFlags::FORTIFICATION)
        .sorted_by_key(|s| (s.hits, s.id))
        .map(|s| s.id)
        .collect()
}

/// Select the next work target for `unit_id`.
///
/// Tiers, in order: manual override, priority work items, ordinary work
/// items, threat-adaptive emergency repair, per-unit cached decay target,
/// escalating wear-threshold scan, objective upgrade, idle.
#[allow(clippy::too_many_arguments)]
pub fn select_work_target(
    world: &mut World,
    room: RoomCoord,
    unit_id: ObjectId,
    memory: &mut MissionMemory,
    emergency_pool: &mut Vec<ObjectId>,
    rival_hostiles: bool,
    config: &SimConfig,
) -> WorkTarget {
    let Some(unit_pos) = world.unit(unit_id).map(|u| u.pos) else {
        return WorkTarget::Idle;
    };

    //
    // 1. Manual override: absolute precedence while it resolves and stays
    //    under its pinned wear ceiling.
    //

    if let Some(target) = memory.manual_target {
        let valid = world.structure(target).map(|s| s.hits < memory.manual_target_hits).unwrap_or(false);

        if valid {
            return WorkTarget::Repair(target);
        }

        memory.manual_target = None;
        memory.manual_target_hits = 0;
    }

    //
    // 2/3. Pending work items, allow-listed kinds ahead of the rest,
    //      nearest first.
    //

    if let Some(room_data) = world.room(room) {
        let pick_nearest = |sites: &mut dyn Iterator<Item = &ConstructionSite>| {
            find_nearest(unit_pos, sites, |s| s.pos).map(|s| s.id)
        };

        let priority = pick_nearest(&mut room_data.construction_sites.iter().filter(|s| s.kind.is(KindFlags::PRIORITY_BUILD)));
        let chosen = priority.or_else(|| pick_nearest(&mut room_data.construction_sites.iter()));

        if let Some(site) = chosen {
            return WorkTarget::Build(site);
        }
    }

    //
    // 4. Emergency repair while rival hostiles are in the room: serve the
    //    most-worn defensive structure, one per unit per tick.
    //

    if rival_hostiles && !emergency_pool.is_empty() {
        let lowest = emergency_pool.remove(0);

        let cached = world.unit(unit_id).and_then(|u| u.memory.emergency_target);

        if let Some(cached_id) = cached {
            let keep = world.structure(cached_id).is_some()
                && world
                    .structure(lowest)
                    .map(|s| !unit_pos.in_range_to(s.pos, INTERACT_RANGE))
                    .unwrap_or(false);

            if keep {
                // Far from the current lowest pick: stick with the cached
                // target rather than thrash between fast-changing picks.
                return WorkTarget::Repair(cached_id);
            }

            if let Some(unit) = world.unit_mut(unit_id) {
                unit.memory.emergency_target = None;
            }
        }

        if let Some(unit) = world.unit_mut(unit_id) {
            unit.memory.emergency_target = Some(lowest);
        }

        return WorkTarget::Repair(lowest);
    }

    //
    // 5. Cached decay target, kept while it stays under the ceiling.
    //

    let ceiling = memory.max_hits_to_build.unwrap_or(BASE_WEAR_CEILING).max(1);

    if let Some(cached_id) = world.unit(unit_id).and_then(|u| u.memory.wall_target) {
        if world.structure(cached_id).map(|s| s.hits < ceiling).unwrap_or(false) {
            return WorkTarget::Repair(cached_id);
        }

        if let Some(unit) = world.unit_mut(unit_id) {
            unit.memory.wall_target = None;
        }
    }

    //
    // 6. Wear-threshold scan with bounded ceiling escalation.
    //

    if let Some(target) = escalating_wear_scan(world, room, unit_id, memory, config) {
        return WorkTarget::Repair(target);
    }

    //
    // 7. Objective upgrade while below max level.
    //

    let upgradable = world
        .room(room)
        .and_then(|r| r.controller.as_ref())
        .map(|c| c.level < CONTROLLER_MAX_LEVEL)
        .unwrap_or(false);

    if upgradable {
        return WorkTarget::Upgrade;
    }

    WorkTarget::Idle
}

/// Scan fortifications under 90% of the wear ceiling (ramparts first,
/// then walls), escalating the ceiling by one order of magnitude while
/// fortifications exist but none qualify. Bounded by configuration.
fn escalating_wear_scan(world: &mut World, room: RoomCoord, unit_id: ObjectId, memory: &mut MissionMemory, config: &SimConfig) -> Option<ObjectId> {
    let unit_pos = world.unit(unit_id)?.pos;
    let mut ceiling = memory.max_hits_to_build.unwrap_or(BASE_WEAR_CEILING).max(1);

    for _ in 0..=config.max_wear_escalations {
        let chosen = {
            let room_data = world.room(room)?;

            // hits < 90% of ceiling, without going through floats.
            let qualifies = |hits: u32| (hits as u64) * 10 < (ceiling as u64) * 9;

            let mut ramparts = room_data.structures_of(KindFlags::RAMPART).filter(|s| qualifies(s.hits)).peekable();

            let chosen = if ramparts.peek().is_some() {
                find_nearest(unit_pos, &mut ramparts, |s| s.pos).map(|s| s.id)
            } else {
                find_nearest(
                    unit_pos,
                    &mut room_data.structures_of(KindFlags::WALL).filter(|s| qualifies(s.hits)),
                    |s| s.pos,
                )
                .map(|s| s.id)
            };

            if chosen.is_none() && room_data.structures_of(KindFlags::FORTIFICATION).next().is_none() {
                // No fortifications at all: nothing to escalate toward.
                return None;
            }

            chosen
        };

        if let Some(id) = chosen {
            memory.max_hits_to_build = Some(ceiling);

            if let Some(unit) = world.unit_mut(unit_id) {
                unit.memory.wall_target = Some(id);
            }

            return Some(id);
        }

        // TODO: escalation can leave wear uneven across structures when
        // units cache targets pinned under older ceilings; revisit the
        // interaction between per-unit caches and the shared ceiling.
        ceiling = ceiling.saturating_add(order_of_magnitude(ceiling));
        memory.max_hits_to_build = Some(ceiling);

        debug!("[Targeting] Wear ceiling escalated to {}", ceiling);
    }

    None
}

/// Largest power of ten not exceeding `n` (n >= 1).
fn order_of_magnitude(n: u32) -> u32 {
    let mut p: u64 = 1;

    while p * 10 <= n as u64 {
        p *= 10;
    }

    p as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{assemble_unit, Faction, Part, Position, Room, StructureKind, UnitMemory};

    fn build_world() -> (World, RoomCoord) {
        let mut world = World::new();
        let coord = RoomCoord::new(0, 0);
        world.add_room(Room::new(coord));

        (world, coord)
    }

    fn add_builder(world: &mut World, pos: Position) -> ObjectId {
        let id = world.alloc_id();
        world.insert_unit(assemble_unit(
            id,
            format!("b{}", id),
            "builder".to_string(),
            Faction::Ours,
            pos,
            vec![Part::Work, Part::Carry, Part::Move],
            UnitMemory::default(),
        ))
    }

    fn select(world: &mut World, room: RoomCoord, unit: ObjectId, memory: &mut MissionMemory, rivals: bool) -> WorkTarget {
        let mut pool = build_emergency_pool(world, room);

        select_work_target(world, room, unit, memory, &mut pool, rivals, &SimConfig::default())
    }

    #[test]
    fn order_of_magnitude_rounds_down() {
        assert_eq!(order_of_magnitude(1), 1);
        assert_eq!(order_of_magnitude(9), 1);
        assert_eq!(order_of_magnitude(2_000), 1_000);
        assert_eq!(order_of_magnitude(10_000), 10_000);
        assert_eq!(order_of_magnitude(99_999), 10_000);
    }

    #[test]
    fn manual_override_beats_everything_until_exceeded() {
        let (mut world, coord) = build_world();
        world.insert_site(coord, StructureKind::Tower, Position::new(coord, 5, 5), 1_000);
        let pinned = world.insert_structure(coord, StructureKind::Wall, Position::new(coord, 40, 40), 10_000, 300_000);
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));

        let mut memory = MissionMemory {
            manual_target: Some(pinned),
            manual_target_hits: 50_000,
            ..MissionMemory::default()
        };

        assert_eq!(select(&mut world, coord, unit, &mut memory, false), WorkTarget::Repair(pinned));

        // Wear reaches the pinned ceiling: cleared and never re-selected.
        world.structure_mut(pinned).unwrap().hits = 50_000;

        let after = select(&mut world, coord, unit, &mut memory, false);

        assert_ne!(after, WorkTarget::Repair(pinned));
        assert_eq!(memory.manual_target, None);

        // Re-running does not resurrect the override.
        let again = select(&mut world, coord, unit, &mut memory, false);
        assert_eq!(after, again);
    }

    #[test]
    fn priority_work_items_come_before_nearer_ordinary_ones() {
        let (mut world, coord) = build_world();
        let near_road = world.insert_site(coord, StructureKind::Road, Position::new(coord, 11, 10), 300);
        let far_rampart = world.insert_site(coord, StructureKind::Rampart, Position::new(coord, 40, 40), 1_000);
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));
        let mut memory = MissionMemory::default();

        assert_eq!(select(&mut world, coord, unit, &mut memory, false), WorkTarget::Build(far_rampart));

        // Without the rampart, the nearest ordinary item wins.
        world.room_mut(coord).unwrap().construction_sites.retain(|s| s.id != far_rampart);

        assert_eq!(select(&mut world, coord, unit, &mut memory, false), WorkTarget::Build(near_road));
    }

    #[test]
    fn selection_is_deterministic_without_mutation() {
        let (mut world, coord) = build_world();
        world.insert_site(coord, StructureKind::Container, Position::new(coord, 20, 20), 500);
        world.insert_site(coord, StructureKind::Container, Position::new(coord, 30, 30), 500);
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));

        let first = select(&mut world, coord, unit, &mut MissionMemory::default(), false);
        let second = select(&mut world, coord, unit, &mut MissionMemory::default(), false);

        assert_eq!(first, second);
    }

    #[test]
    fn emergency_pool_serves_most_worn_and_fans_out() {
        let (mut world, coord) = build_world();
        let weak = world.insert_structure(coord, StructureKind::Rampart, Position::new(coord, 20, 20), 100, 300_000);
        let strong = world.insert_structure(coord, StructureKind::Rampart, Position::new(coord, 21, 20), 5_000, 300_000);
        let a = add_builder(&mut world, Position::new(coord, 10, 10));
        let b = add_builder(&mut world, Position::new(coord, 10, 11));
        let mut memory = MissionMemory::default();

        let mut pool = build_emergency_pool(&world, coord);
        let config = SimConfig::default();

        let first = select_work_target(&mut world, coord, a, &mut memory, &mut pool, true, &config);
        let second = select_work_target(&mut world, coord, b, &mut memory, &mut pool, true, &config);

        assert_eq!(first, WorkTarget::Repair(weak));
        assert_eq!(second, WorkTarget::Repair(strong));
    }

    #[test]
    fn cached_emergency_target_is_kept_while_far_from_lowest() {
        let (mut world, coord) = build_world();
        let cached = world.insert_structure(coord, StructureKind::Rampart, Position::new(coord, 45, 45), 3_000, 300_000);
        world.insert_structure(coord, StructureKind::Rampart, Position::new(coord, 20, 20), 100, 300_000);
        let unit = add_builder(&mut world, Position::new(coord, 44, 45));
        world.unit_mut(unit).unwrap().memory.emergency_target = Some(cached);

        let mut memory = MissionMemory::default();
        let target = select(&mut world, coord, unit, &mut memory, true);

        assert_eq!(target, WorkTarget::Repair(cached));
    }

    #[test]
    fn wear_scan_prefers_ramparts_then_walls() {
        let (mut world, coord) = build_world();
        let wall = world.insert_structure(coord, StructureKind::Wall, Position::new(coord, 20, 20), 500, 300_000);
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));
        let mut memory = MissionMemory::default();

        assert_eq!(select(&mut world, coord, unit, &mut memory, false), WorkTarget::Repair(wall));

        let rampart = world.insert_structure(coord, StructureKind::Rampart, Position::new(coord, 40, 40), 500, 300_000);
        world.unit_mut(unit).unwrap().memory.wall_target = None;

        assert_eq!(select(&mut world, coord, unit, &mut memory, false), WorkTarget::Repair(rampart));
    }

    #[test]
    fn ceiling_escalates_by_order_of_magnitude() {
        let (mut world, coord) = build_world();
        // Exists but does not qualify under 90% of 2000.
        world.insert_structure(coord, StructureKind::Wall, Position::new(coord, 20, 20), 1_900, 300_000);
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));

        let mut memory = MissionMemory {
            max_hits_to_build: Some(2_000),
            ..MissionMemory::default()
        };

        let target = select(&mut world, coord, unit, &mut memory, false);

        // 2000 + 1000 = 3000; 1900 < 2700 qualifies on the retry.
        assert_eq!(memory.max_hits_to_build, Some(3_000));
        assert!(matches!(target, WorkTarget::Repair(_)));
    }

    #[test]
    fn escalation_terminates_when_nothing_ever_qualifies() {
        let (mut world, coord) = build_world();
        // A full-wear wall never drops under 90% of any ceiling the loop
        // reaches, and hits == hits_max stays ineligible forever.
        world.insert_structure(coord, StructureKind::Wall, Position::new(coord, 20, 20), u32::MAX / 2, u32::MAX / 2);
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));
        let config = SimConfig::default();

        let mut memory = MissionMemory {
            max_hits_to_build: Some(2_000),
            ..MissionMemory::default()
        };
        let mut pool = Vec::new();

        let target = select_work_target(&mut world, coord, unit, &mut memory, &mut pool, false, &config);

        // Falls through to idle with the ceiling left at a finite value.
        assert_eq!(target, WorkTarget::Idle);
        assert!(memory.max_hits_to_build.unwrap() > 2_000);
    }

    #[test]
    fn upgrade_fallback_when_no_fortifications_exist() {
        let (mut world, coord) = build_world();
        world.room_mut(coord).unwrap().controller = Some(crate::world::Controller {
            pos: Position::new(coord, 25, 25),
            level: 4,
            progress: 0,
        });
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));

        assert_eq!(select(&mut world, coord, unit, &mut MissionMemory::default(), false), WorkTarget::Upgrade);
    }

    #[test]
    fn idle_when_the_chain_is_exhausted() {
        let (mut world, coord) = build_world();
        let unit = add_builder(&mut world, Position::new(coord, 10, 10));

        assert_eq!(select(&mut world, coord, unit, &mut MissionMemory::default(), false), WorkTarget::Idle);
    }
}
