//! Per-room traversal-cost grids.
//!
//! A grid is rebuilt from the live snapshot for every pathfinding request
//! and discarded afterwards; nothing here survives a tick. Cell value `0`
//! defers to terrain, `1..=254` overrides it, [`COST_BLOCKED`] forbids the
//! tile outright.

use crate::constants::ROOM_SIZE;
use crate::world::{KindFlags, ObjectId, Position, RoomCoord, StructureKind, World};

pub const COST_BLOCKED: u8 = 0xff;
pub const COST_ROAD: u8 = 1;
pub const COST_EXIT_LANE: u8 = 1;

/// Cost of pushing through a demolishable structure.
pub const COST_DEMOLISH: u8 = 100;
/// Fortifications cost half: dismantling them is a real option.
pub const COST_BARRIER: u8 = COST_DEMOLISH / 2;

#[derive(Clone)]
pub struct CostGrid {
    cells: Vec<u8>,
}

impl Default for CostGrid {
    fn default() -> CostGrid {
        CostGrid::new()
    }
}

impl CostGrid {
    pub fn new() -> CostGrid {
        CostGrid {
            cells: vec![0; ROOM_SIZE as usize * ROOM_SIZE as usize],
        }
    }

    pub fn get(&self, x: u8, y: u8) -> u8 {
        self.cells[y as usize * ROOM_SIZE as usize + x as usize]
    }

    pub fn set(&mut self, x: u8, y: u8, cost: u8) {
        self.cells[y as usize * ROOM_SIZE as usize + x as usize] = cost;
    }

    pub fn is_blocked(&self, x: u8, y: u8) -> bool {
        self.get(x, y) == COST_BLOCKED
    }
}

/// Build the shared raid traversal grid for `room_coord` from the acting
/// unit's point of view. Pure: reads the snapshot, returns a fresh grid.
///
/// Layers, in order:
/// 1. structures: roads cheap, fortifications at half demolish cost,
///    everything else demolishable at full cost;
/// 2. squad mates: their tile is blocked and their surroundings get an
///    escape-gap treatment (exit-adjacent tiles stay cheap, adjacent
///    fortifications halve again);
/// 3. hostiles and bulk stores: blocked outright.
pub fn build_raid_cost_grid(world: &World, room_coord: RoomCoord, acting: ObjectId, squad: &[ObjectId]) -> CostGrid {
    let mut grid = CostGrid::new();

    let Some(room) = world.room(room_coord) else {
        return grid;
    };

    for structure in &room.structures {
        let cost = match structure.kind {
            StructureKind::Road => COST_ROAD,
            kind if kind.is(KindFlags::FORTIFICATION) => COST_BARRIER,
            _ => COST_DEMOLISH,
        };

        grid.set(structure.pos.x, structure.pos.y, cost);
    }

    for mate in squad {
        if *mate == acting {
            continue;
        }

        let Some(unit) = world.unit(*mate) else { continue };

        if unit.pos.room != room_coord || unit.pos.is_near_exit(0) {
            continue;
        }

        grid.set(unit.pos.x, unit.pos.y, COST_BLOCKED);

        for neighbor in unit.pos.neighbors() {
            if neighbor.is_near_exit(0) {
                grid.set(neighbor.x, neighbor.y, COST_EXIT_LANE);
            } else if room
                .structure_at(neighbor)
                .map(|s| s.kind.is(KindFlags::FORTIFICATION))
                .unwrap_or(false)
            {
                let current = grid.get(neighbor.x, neighbor.y);
                grid.set(neighbor.x, neighbor.y, current.div_ceil(2).max(1));
            }
        }
    }

    for hostile in world.hostiles_in_room(room_coord) {
        grid.set(hostile.pos.x, hostile.pos.y, COST_BLOCKED);
    }

    for store in room.structures_of(KindFlags::BULK_STORE) {
        grid.set(store.pos.x, store.pos.y, COST_BLOCKED);
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{assemble_unit, Faction, Part, Room, UnitMemory};

    fn raid_world() -> (World, RoomCoord) {
        let mut world = World::new();
        let coord = RoomCoord::new(0, 0);
        world.add_room(Room::new(coord));

        (world, coord)
    }

    fn add_unit(world: &mut World, pos: Position, faction: Faction) -> ObjectId {
        let id = world.alloc_id();
        let unit = assemble_unit(
            id,
            format!("u{}", id),
            "raider".to_string(),
            faction,
            pos,
            vec![Part::Work, Part::Move],
            UnitMemory::default(),
        );

        world.insert_unit(unit)
    }

    #[test]
    fn squad_mates_block_their_tile_and_keep_exit_lanes_cheap() {
        let (mut world, coord) = raid_world();
        let acting = add_unit(&mut world, Position::new(coord, 10, 10), Faction::Ours);
        // Mate two tiles from the border: its border-adjacent neighbors
        // must stay cheap as an escape lane.
        let mate = add_unit(&mut world, Position::new(coord, 2, 10), Faction::Ours);

        let grid = build_raid_cost_grid(&world, coord, acting, &[acting, mate]);

        assert!(grid.is_blocked(2, 10));
        assert_eq!(grid.get(1, 10), COST_EXIT_LANE);
    }

    #[test]
    fn the_acting_unit_does_not_block_itself() {
        let (mut world, coord) = raid_world();
        let acting = add_unit(&mut world, Position::new(coord, 10, 10), Faction::Ours);

        let grid = build_raid_cost_grid(&world, coord, acting, &[acting]);

        assert!(!grid.is_blocked(10, 10));
    }

    #[test]
    fn fortifications_cost_half_of_demolish() {
        let (mut world, coord) = raid_world();
        world.insert_structure(coord, StructureKind::Wall, Position::new(coord, 20, 20), 1_000, 300_000);
        world.insert_structure(coord, StructureKind::Spawn, Position::new(coord, 21, 20), 5_000, 5_000);
        let acting = add_unit(&mut world, Position::new(coord, 10, 10), Faction::Ours);

        let grid = build_raid_cost_grid(&world, coord, acting, &[acting]);

        assert_eq!(grid.get(20, 20), COST_BARRIER);
        assert_eq!(grid.get(21, 20), COST_DEMOLISH);
    }

    #[test]
    fn fortifications_next_to_a_mate_halve_again() {
        let (mut world, coord) = raid_world();
        world.insert_structure(coord, StructureKind::Rampart, Position::new(coord, 11, 10), 1_000, 300_000);
        let acting = add_unit(&mut world, Position::new(coord, 20, 20), Faction::Ours);
        let mate = add_unit(&mut world, Position::new(coord, 10, 10), Faction::Ours);

        let grid = build_raid_cost_grid(&world, coord, acting, &[acting, mate]);

        assert_eq!(grid.get(11, 10), COST_BARRIER.div_ceil(2));
    }

    #[test]
    fn hostiles_and_bulk_stores_are_blocked() {
        let (mut world, coord) = raid_world();
        world.insert_structure(coord, StructureKind::Storage, Position::new(coord, 30, 30), 10_000, 10_000);
        let acting = add_unit(&mut world, Position::new(coord, 10, 10), Faction::Ours);
        add_unit(&mut world, Position::new(coord, 31, 30), Faction::Rival);

        let grid = build_raid_cost_grid(&world, coord, acting, &[acting]);

        assert!(grid.is_blocked(30, 30));
        assert!(grid.is_blocked(31, 30));
    }
}
