pub mod data;
pub mod position;
pub mod terrain;
pub mod unit;

pub use data::*;
pub use position::*;
pub use terrain::*;
pub use unit::*;

use crate::constants::*;
use log::*;
use std::collections::BTreeMap;
use std::fmt;

/// Non-success outcome of an action primitive. All are tick-local: the
/// acting mission logs them and naturally retries on a later tick.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ActionError {
    NotInRange,
    InvalidTarget,
    Full,
    Empty,
    NoBodyPart,
    Blocked,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActionError::NotInRange => "not in range",
            ActionError::InvalidTarget => "invalid target",
            ActionError::Full => "target full",
            ActionError::Empty => "nothing stored",
            ActionError::NoBodyPart => "missing body part",
            ActionError::Blocked => "tile blocked",
        };

        write!(f, "{}", text)
    }
}

/// The live world snapshot missions decide against. Mutations made by an
/// action are visible to every later decision in the same tick.
#[derive(Default)]
pub struct World {
    tick: u32,
    rooms: BTreeMap<RoomCoord, Room>,
    units: BTreeMap<ObjectId, Unit>,
    flags: Vec<Flag>,
    next_id: u128,
}

impl World {
    pub fn new() -> World {
        World::default()
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Advance time: age units out and drop the dead. Missions observe
    /// disappearance at the next role call.
    pub fn advance_tick(&mut self) {
        self.tick += 1;

        for unit in self.units.values_mut() {
            unit.ticks_to_live = unit.ticks_to_live.saturating_sub(1);
        }

        self.units.retain(|_, unit| unit.hits > 0 && unit.ticks_to_live > 0);
    }

    pub fn alloc_id(&mut self) -> ObjectId {
        self.next_id += 1;

        ObjectId::from_index(self.next_id)
    }

    //
    // Rooms and static objects.
    //

    pub fn add_room(&mut self, room: Room) {
        self.rooms.insert(room.coord, room);
    }

    pub fn room(&self, coord: RoomCoord) -> Option<&Room> {
        self.rooms.get(&coord)
    }

    pub fn room_mut(&mut self, coord: RoomCoord) -> Option<&mut Room> {
        self.rooms.get_mut(&coord)
    }

    pub fn insert_structure(&mut self, coord: RoomCoord, kind: StructureKind, pos: Position, hits: u32, hits_max: u32) -> ObjectId {
        let id = self.alloc_id();

        if let Some(room) = self.rooms.get_mut(&coord) {
            room.structures.push(Structure {
                id,
                kind,
                pos,
                hits,
                hits_max,
                store: 0,
                store_capacity: if kind.is(KindFlags::BULK_STORE) { 1_000_000 } else { 0 },
            });
        }

        id
    }

    pub fn insert_site(&mut self, coord: RoomCoord, kind: StructureKind, pos: Position, progress_total: u32) -> ObjectId {
        let id = self.alloc_id();

        if let Some(room) = self.rooms.get_mut(&coord) {
            room.construction_sites.push(ConstructionSite {
                id,
                kind,
                pos,
                progress: 0,
                progress_total,
            });
        }

        id
    }

    pub fn insert_source(&mut self, coord: RoomCoord, pos: Position, energy: u32) -> ObjectId {
        let id = self.alloc_id();

        if let Some(room) = self.rooms.get_mut(&coord) {
            room.sources.push(Source { id, pos, energy });
        }

        id
    }

    pub fn structure(&self, id: ObjectId) -> Option<&Structure> {
        self.rooms.values().find_map(|room| room.structure(id))
    }

    pub fn structure_mut(&mut self, id: ObjectId) -> Option<&mut Structure> {
        self.rooms.values_mut().find_map(|room| room.structure_mut(id))
    }

    pub fn construction_site(&self, id: ObjectId) -> Option<&ConstructionSite> {
        self.rooms.values().find_map(|room| room.construction_sites.iter().find(|s| s.id == id))
    }

    //
    // Flags.
    //

    pub fn add_flag(&mut self, name: &str, pos: Position) {
        self.flags.push(Flag {
            name: name.to_string(),
            pos,
        });
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn remove_flag(&mut self, name: &str) {
        self.flags.retain(|f| f.name != name);
    }

    //
    // Units.
    //

    pub fn insert_unit(&mut self, unit: Unit) -> ObjectId {
        let id = unit.id;

        self.units.insert(id, unit);

        id
    }

    pub fn unit(&self, id: ObjectId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn unit_mut(&mut self, id: ObjectId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn units_in_room(&self, coord: RoomCoord) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.pos.room == coord)
    }

    pub fn hostiles_in_room(&self, coord: RoomCoord) -> impl Iterator<Item = &Unit> {
        self.units_in_room(coord).filter(|u| u.faction != Faction::Ours)
    }

    pub fn friendly_units_with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Unit> {
        self.units.values().filter(move |u| u.faction == Faction::Ours && u.role == role)
    }

    /// Produce a new unit adjacent to the room's production structure,
    /// spending room energy. The production mechanism itself is external;
    /// this is the minimal executor the spawn queue drives.
    pub fn produce_unit(&mut self, coord: RoomCoord, name: &str, role: &str, body: Vec<Part>, memory: UnitMemory) -> Result<ObjectId, String> {
        let cost: u32 = body.iter().map(|p| p.cost()).sum();
        let id = self.alloc_id();

        let room = self.rooms.get_mut(&coord).ok_or("Expected room")?;

        if room.energy_available < cost {
            return Err(format!("Not enough energy: {} < {}", room.energy_available, cost));
        }

        let spawn_pos = room
            .structures_of(KindFlags::SPAWN)
            .next()
            .map(|s| s.pos)
            .ok_or("No production structure in room")?;

        let pos = spawn_pos
            .neighbors()
            .find(|p| room.terrain.is_walkable(p.x, p.y) && room.blocking_structure_at(*p).is_none())
            .ok_or("No open tile next to production structure")?;

        room.energy_available -= cost;

        let unit = assemble_unit(id, name.to_string(), role.to_string(), Faction::Ours, pos, body, memory);

        self.units.insert(id, unit);

        Ok(id)
    }

    //
    // Action primitives. Each validates range and capability, applies its
    // effect immediately, and reports a code on failure.
    //

    /// Move one tile within the current room. Crossing into a neighboring
    /// room goes through [`World::cross_exit`] from a border tile.
    pub fn move_unit(&mut self, id: ObjectId, to: Position) -> Result<(), ActionError> {
        let from = self.units.get(&id).ok_or(ActionError::InvalidTarget)?.pos;

        if !from.is_near_to(to) || from.room != to.room {
            return Err(ActionError::NotInRange);
        }

        let room = self.rooms.get(&to.room).ok_or(ActionError::Blocked)?;

        if !room.terrain.is_walkable(to.x, to.y) || room.blocking_structure_at(to).is_some() {
            return Err(ActionError::Blocked);
        }

        if let Some(unit) = self.units.get_mut(&id) {
            unit.pos = to;
        }

        Ok(())
    }

    /// Step a unit standing on a border tile into the adjacent room.
    pub fn cross_exit(&mut self, id: ObjectId) -> Result<(), ActionError> {
        let pos = self.units.get(&id).ok_or(ActionError::InvalidTarget)?.pos;

        if !pos.is_exit() {
            return Err(ActionError::InvalidTarget);
        }

        let (room, x, y) = if pos.x == 0 {
            (RoomCoord::new(pos.room.x - 1, pos.room.y), ROOM_SIZE - 1, pos.y)
        } else if pos.x == ROOM_SIZE - 1 {
            (RoomCoord::new(pos.room.x + 1, pos.room.y), 0, pos.y)
        } else if pos.y == 0 {
            (RoomCoord::new(pos.room.x, pos.room.y - 1), pos.x, ROOM_SIZE - 1)
        } else {
            (RoomCoord::new(pos.room.x, pos.room.y + 1), pos.x, 0)
        };

        let target = Position::new(room, x, y);

        let target_room = self.rooms.get(&room).ok_or(ActionError::Blocked)?;

        if !target_room.terrain.is_walkable(x, y) || target_room.blocking_structure_at(target).is_some() {
            return Err(ActionError::Blocked);
        }

        if let Some(unit) = self.units.get_mut(&id) {
            unit.pos = target;
        }

        Ok(())
    }

    /// Transfer as much stored resource as fits from one unit to another.
    /// Requires adjacency. Never overfills the receiver.
    pub fn transfer(&mut self, from: ObjectId, to: ObjectId) -> Result<u32, ActionError> {
        let (from_pos, from_store) = {
            let unit = self.units.get(&from).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.store)
        };
        let (to_pos, to_free) = {
            let unit = self.units.get(&to).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.free_capacity())
        };

        if from_store == 0 {
            return Err(ActionError::Empty);
        }
        if !from_pos.is_near_to(to_pos) {
            return Err(ActionError::NotInRange);
        }
        if to_free == 0 {
            return Err(ActionError::Full);
        }

        let moved = from_store.min(to_free);

        if let Some(unit) = self.units.get_mut(&from) {
            unit.store -= moved;
        }
        if let Some(unit) = self.units.get_mut(&to) {
            unit.store += moved;
        }

        Ok(moved)
    }

    /// Draw resource from a storage-like structure. Requires adjacency.
    pub fn withdraw(&mut self, id: ObjectId, structure_id: ObjectId) -> Result<u32, ActionError> {
        let (pos, free) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.free_capacity())
        };

        if free == 0 {
            return Err(ActionError::Full);
        }

        let structure = self.structure_mut(structure_id).ok_or(ActionError::InvalidTarget)?;

        if !structure.pos.is_near_to(pos) {
            return Err(ActionError::NotInRange);
        }
        if structure.store == 0 {
            return Err(ActionError::Empty);
        }

        let moved = structure.store.min(free);
        structure.store -= moved;

        if let Some(unit) = self.units.get_mut(&id) {
            unit.store += moved;
        }

        Ok(moved)
    }

    /// Harvest from a source node. Requires adjacency and work parts.
    pub fn harvest(&mut self, id: ObjectId, source_id: ObjectId) -> Result<u32, ActionError> {
        let (pos, work, free) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::Work), unit.free_capacity())
        };

        if work == 0 {
            return Err(ActionError::NoBodyPart);
        }

        let room = self.rooms.get_mut(&pos.room).ok_or(ActionError::InvalidTarget)?;
        let source = room.sources.iter_mut().find(|s| s.id == source_id).ok_or(ActionError::InvalidTarget)?;

        if !source.pos.is_near_to(pos) {
            return Err(ActionError::NotInRange);
        }
        if source.energy == 0 {
            return Err(ActionError::Empty);
        }

        let drawn = (work * HARVEST_POWER).min(source.energy).min(free);
        source.energy -= drawn;

        if let Some(unit) = self.units.get_mut(&id) {
            unit.store += drawn;
        }

        Ok(drawn)
    }

    /// Apply build progress to a work item. Completing it materializes the
    /// structure; fortifications come online at minimal wear.
    pub fn build(&mut self, id: ObjectId, site_id: ObjectId) -> Result<(), ActionError> {
        let (pos, work, store) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::Work), unit.store)
        };

        if work == 0 {
            return Err(ActionError::NoBodyPart);
        }
        if store == 0 {
            return Err(ActionError::Empty);
        }

        let completed = {
            let room = self.rooms.get_mut(&pos.room).ok_or(ActionError::InvalidTarget)?;
            let site = room
                .construction_sites
                .iter_mut()
                .find(|s| s.id == site_id)
                .ok_or(ActionError::InvalidTarget)?;

            if !site.pos.in_range_to(pos, INTERACT_RANGE) {
                return Err(ActionError::NotInRange);
            }

            let applied = (work * BUILD_POWER).min(store).min(site.progress_total - site.progress);
            site.progress += applied;

            if let Some(unit) = self.units.get_mut(&id) {
                unit.store -= applied;
            }

            let room = self.rooms.get_mut(&pos.room).ok_or(ActionError::InvalidTarget)?;
            let finished = room.construction_sites.iter().find(|s| s.id == site_id && s.progress >= s.progress_total).cloned();

            if let Some(site) = &finished {
                room.construction_sites.retain(|s| s.id != site_id);

                let hits_max = site.kind.max_hits();
                let structure = Structure {
                    id: site.id,
                    kind: site.kind,
                    pos: site.pos,
                    hits: site.kind.initial_hits(hits_max),
                    hits_max,
                    store: 0,
                    store_capacity: 0,
                };

                room.structures.push(structure);
            }

            finished.is_some()
        };

        if completed {
            debug!("[World] Work item {} completed", site_id);
        }

        Ok(())
    }

    /// Restore wear on a structure.
    pub fn repair(&mut self, id: ObjectId, structure_id: ObjectId) -> Result<(), ActionError> {
        let (pos, work, store) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::Work), unit.store)
        };

        if work == 0 {
            return Err(ActionError::NoBodyPart);
        }
        if store == 0 {
            return Err(ActionError::Empty);
        }

        let structure = self.structure_mut(structure_id).ok_or(ActionError::InvalidTarget)?;

        if !structure.pos.in_range_to(pos, INTERACT_RANGE) {
            return Err(ActionError::NotInRange);
        }

        structure.hits = (structure.hits + work * REPAIR_POWER).min(structure.hits_max);

        if let Some(unit) = self.units.get_mut(&id) {
            unit.store = unit.store.saturating_sub(work);
        }

        Ok(())
    }

    /// Melee attack against a structure or unit. Requires adjacency.
    pub fn attack(&mut self, id: ObjectId, target: ObjectId) -> Result<(), ActionError> {
        let (pos, attack, work) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::Attack), unit.part_count(Part::Work))
        };

        // Work parts dismantle structures; attack parts hit anything.
        if let Some(structure) = self.structure(target) {
            if !structure.pos.is_near_to(pos) {
                return Err(ActionError::NotInRange);
            }

            let damage = if work > 0 { work * DISMANTLE_POWER } else { attack * ATTACK_POWER };

            if damage == 0 {
                return Err(ActionError::NoBodyPart);
            }

            return self.damage_structure(target, damage);
        }

        if attack == 0 {
            return Err(ActionError::NoBodyPart);
        }

        let target_pos = self.units.get(&target).ok_or(ActionError::InvalidTarget)?.pos;

        if !target_pos.is_near_to(pos) {
            return Err(ActionError::NotInRange);
        }

        self.damage_unit(target, attack * ATTACK_POWER);

        Ok(())
    }

    /// Damage every rival unit within interaction range, with falloff.
    pub fn ranged_mass_attack(&mut self, id: ObjectId) -> Result<u32, ActionError> {
        let (pos, ranged) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::RangedAttack))
        };

        if ranged == 0 {
            return Err(ActionError::NoBodyPart);
        }

        let victims: Vec<(ObjectId, u32)> = self
            .units
            .values()
            .filter(|u| u.faction != Faction::Ours && u.pos.room == pos.room)
            .filter_map(|u| {
                let range = u.pos.range_to(pos);
                if (1..=INTERACT_RANGE).contains(&range) {
                    Some((u.id, ranged * MASS_ATTACK_POWER[range as usize - 1]))
                } else {
                    None
                }
            })
            .collect();

        let hit_count = victims.len() as u32;

        for (victim, damage) in victims {
            self.damage_unit(victim, damage);
        }

        Ok(hit_count)
    }

    /// Heal a unit (or self). Boosted heal parts are more effective.
    pub fn heal(&mut self, id: ObjectId, target: ObjectId) -> Result<(), ActionError> {
        let (pos, heal, boosted) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::Heal), unit.memory.boosts.contains(&BoostKind::Heal))
        };

        if heal == 0 {
            return Err(ActionError::NoBodyPart);
        }

        let target_unit = self.units.get_mut(&target).ok_or(ActionError::InvalidTarget)?;

        if !target_unit.pos.is_near_to(pos) && target != id {
            return Err(ActionError::NotInRange);
        }

        let amount = heal * HEAL_POWER * if boosted { BOOST_HEAL_MULTIPLIER } else { 1 };
        target_unit.hits = (target_unit.hits + amount).min(target_unit.hits_max);

        Ok(())
    }

    /// Spend stored energy on the room's primary objective.
    pub fn upgrade(&mut self, id: ObjectId) -> Result<(), ActionError> {
        let (pos, work, store) = {
            let unit = self.units.get(&id).ok_or(ActionError::InvalidTarget)?;
            (unit.pos, unit.part_count(Part::Work), unit.store)
        };

        if work == 0 {
            return Err(ActionError::NoBodyPart);
        }
        if store == 0 {
            return Err(ActionError::Empty);
        }

        let room = self.rooms.get_mut(&pos.room).ok_or(ActionError::InvalidTarget)?;
        let controller = room.controller.as_mut().ok_or(ActionError::InvalidTarget)?;

        if !controller.pos.in_range_to(pos, INTERACT_RANGE) {
            return Err(ActionError::NotInRange);
        }

        let spent = work.min(store);
        controller.progress += spent;

        if let Some(unit) = self.units.get_mut(&id) {
            unit.store -= spent;
        }

        Ok(())
    }

    pub fn damage_unit(&mut self, id: ObjectId, damage: u32) {
        let mut dead = false;

        if let Some(unit) = self.units.get_mut(&id) {
            unit.hits = unit.hits.saturating_sub(damage);
            dead = unit.hits == 0;
        }

        if dead {
            self.units.remove(&id);
        }
    }

    pub fn damage_structure(&mut self, id: ObjectId, damage: u32) -> Result<(), ActionError> {
        let mut destroyed = None;

        {
            let structure = self.structure_mut(id).ok_or(ActionError::InvalidTarget)?;
            structure.hits = structure.hits.saturating_sub(damage);

            if structure.hits == 0 {
                destroyed = Some(structure.pos.room);
            }
        }

        if let Some(coord) = destroyed {
            if let Some(room) = self.rooms.get_mut(&coord) {
                room.structures.retain(|s| s.id != id);
            }
        }

        Ok(())
    }
}

/// Nearest candidate by Chebyshev range, ties broken by iteration order.
pub fn find_nearest<'a, T, I, F>(from: Position, candidates: I, pos_of: F) -> Option<&'a T>
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> Position,
{
    candidates.min_by_key(|c| from.range_to(pos_of(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_room() -> (World, RoomCoord) {
        let mut world = World::new();
        let coord = RoomCoord::new(0, 0);
        world.add_room(Room::new(coord));

        (world, coord)
    }

    fn add_unit(world: &mut World, pos: Position, body: Vec<Part>) -> ObjectId {
        let id = world.alloc_id();
        let unit = assemble_unit(id, format!("u{}", id), "test".to_string(), Faction::Ours, pos, body, UnitMemory::default());

        world.insert_unit(unit)
    }

    #[test]
    fn transfer_never_overfills_receiver() {
        let (mut world, coord) = world_with_room();
        let giver = add_unit(&mut world, Position::new(coord, 10, 10), vec![Part::Carry, Part::Carry, Part::Move]);
        let taker = add_unit(&mut world, Position::new(coord, 10, 11), vec![Part::Carry, Part::Move]);

        world.unit_mut(giver).unwrap().store = 100;
        world.unit_mut(taker).unwrap().store = 30;

        let moved = world.transfer(giver, taker).unwrap();

        assert_eq!(moved, 20);
        assert_eq!(world.unit(taker).unwrap().store, 50);
        assert_eq!(world.unit(giver).unwrap().store, 80);
    }

    #[test]
    fn transfer_requires_adjacency() {
        let (mut world, coord) = world_with_room();
        let giver = add_unit(&mut world, Position::new(coord, 10, 10), vec![Part::Carry, Part::Move]);
        let taker = add_unit(&mut world, Position::new(coord, 10, 13), vec![Part::Carry, Part::Move]);

        world.unit_mut(giver).unwrap().store = 10;

        assert_eq!(world.transfer(giver, taker), Err(ActionError::NotInRange));
    }

    #[test]
    fn build_completion_materializes_fortification_at_minimal_wear() {
        let (mut world, coord) = world_with_room();
        let site = world.insert_site(coord, StructureKind::Rampart, Position::new(coord, 12, 10), 10);
        let builder = add_unit(&mut world, Position::new(coord, 10, 10), vec![Part::Work, Part::Work, Part::Carry, Part::Move]);

        world.unit_mut(builder).unwrap().store = 50;

        world.build(builder, site).unwrap();

        let room = world.room(coord).unwrap();
        assert!(room.construction_sites.is_empty());

        let built = room.structure_at(Position::new(coord, 12, 10)).unwrap();
        assert_eq!(built.kind, StructureKind::Rampart);
        assert_eq!(built.hits, 1);
    }

    #[test]
    fn dead_units_vanish_at_tick_boundary() {
        let (mut world, coord) = world_with_room();
        let unit = add_unit(&mut world, Position::new(coord, 10, 10), vec![Part::Tough, Part::Move]);

        world.unit_mut(unit).unwrap().hits = 0;
        world.advance_tick();

        assert!(world.unit(unit).is_none());
    }

    #[test]
    fn crossing_an_exit_lands_on_the_opposite_border() {
        let mut world = World::new();
        let left = RoomCoord::new(0, 0);
        let right = RoomCoord::new(1, 0);
        world.add_room(Room::new(left));
        world.add_room(Room::new(right));

        let unit = add_unit(&mut world, Position::new(left, 49, 25), vec![Part::Move]);

        world.cross_exit(unit).unwrap();

        assert_eq!(world.unit(unit).unwrap().pos, Position::new(right, 0, 25));
    }
}
