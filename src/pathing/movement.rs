//! Single-step traversal over the cost grid.
//!
//! Each call plans a fresh path with A* against the current snapshot and
//! advances the unit one tile. No path state is cached across ticks.

use super::costgrid::{CostGrid, COST_BLOCKED};
use crate::constants::ROOM_SIZE;
use crate::world::{ActionError, ObjectId, Position, Room, RoomCoord, World};
use pathfinding::prelude::astar;

#[derive(Default)]
pub struct TravelOptions<'a> {
    /// Stop once within this range of the destination.
    pub range: u32,
    /// Cost grid for the destination room; tiles with demolishable
    /// structures become traversable at their grid cost.
    pub cost_grid: Option<&'a CostGrid>,
}

impl<'a> TravelOptions<'a> {
    pub fn with_range(range: u32) -> TravelOptions<'a> {
        TravelOptions { range, cost_grid: None }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TravelOutcome {
    pub moved: bool,
    /// The planned next tile, reported even when the move itself was
    /// withheld (e.g. a structure occupies it and must be demolished).
    pub next_pos: Option<Position>,
}

impl TravelOutcome {
    fn idle() -> TravelOutcome {
        TravelOutcome { moved: false, next_pos: None }
    }
}

/// Advance a unit one step toward `dest`, crossing room borders as needed.
pub fn travel_to(world: &mut World, id: ObjectId, dest: Position, options: &TravelOptions) -> Result<TravelOutcome, ActionError> {
    let pos = world.unit(id).ok_or(ActionError::InvalidTarget)?.pos;

    if pos.room == dest.room && pos.in_range_to(dest, options.range) {
        return Ok(TravelOutcome::idle());
    }

    if pos.room != dest.room {
        return travel_between_rooms(world, id, pos, dest, options);
    }

    let next = {
        let room = world.room(pos.room).ok_or(ActionError::InvalidTarget)?;

        plan_next_step(room, options.cost_grid, pos, dest, options.range)
    };

    let Some(next) = next else {
        return Ok(TravelOutcome::idle());
    };

    // A demolishable structure on the chosen tile withholds the move; the
    // caller decides whether to clear it.
    let occupied = world
        .room(pos.room)
        .and_then(|room| room.blocking_structure_at(next))
        .is_some();

    if occupied {
        return Ok(TravelOutcome {
            moved: false,
            next_pos: Some(next),
        });
    }

    world.move_unit(id, next)?;

    Ok(TravelOutcome {
        moved: true,
        next_pos: Some(next),
    })
}

fn travel_between_rooms(world: &mut World, id: ObjectId, pos: Position, dest: Position, options: &TravelOptions) -> Result<TravelOutcome, ActionError> {
    // Head for the border facing the destination room; cross when on it.
    let (dx, dy) = (dest.room.x - pos.room.x, dest.room.y - pos.room.y);

    let on_facing_border = (dx < 0 && pos.x == 0)
        || (dx > 0 && pos.x == ROOM_SIZE - 1)
        || (dx == 0 && dy < 0 && pos.y == 0)
        || (dx == 0 && dy > 0 && pos.y == ROOM_SIZE - 1);

    if on_facing_border {
        world.cross_exit(id)?;

        let next = world.unit(id).map(|u| u.pos);

        return Ok(TravelOutcome { moved: true, next_pos: next });
    }

    let proxy = if dx < 0 {
        Position::new(pos.room, 0, pos.y.clamp(1, ROOM_SIZE - 2))
    } else if dx > 0 {
        Position::new(pos.room, ROOM_SIZE - 1, pos.y.clamp(1, ROOM_SIZE - 2))
    } else if dy < 0 {
        Position::new(pos.room, pos.x.clamp(1, ROOM_SIZE - 2), 0)
    } else {
        Position::new(pos.room, pos.x.clamp(1, ROOM_SIZE - 2), ROOM_SIZE - 1)
    };

    travel_to(world, id, proxy, &TravelOptions { range: 0, cost_grid: options.cost_grid })
}

fn plan_next_step(room: &Room, grid: Option<&CostGrid>, from: Position, dest: Position, range: u32) -> Option<Position> {
    let start = (from.x, from.y);
    let goal = (dest.x, dest.y);

    let result = astar(
        &start,
        |&(x, y)| {
            let here = Position::new(room.coord, x, y);

            here.neighbors()
                .filter_map(|n| step_cost(room, grid, n).map(|cost| ((n.x, n.y), cost)))
                .collect::<Vec<_>>()
        },
        |&(x, y)| {
            let dx = (x as i32 - goal.0 as i32).unsigned_abs();
            let dy = (y as i32 - goal.1 as i32).unsigned_abs();

            dx.max(dy)
        },
        |&(x, y)| {
            let dx = (x as i32 - goal.0 as i32).unsigned_abs();
            let dy = (y as i32 - goal.1 as i32).unsigned_abs();

            dx.max(dy) <= range
        },
    );

    let (path, _) = result?;

    path.get(1).map(|&(x, y)| Position::new(room.coord, x, y))
}

fn step_cost(room: &Room, grid: Option<&CostGrid>, pos: Position) -> Option<u32> {
    if let Some(grid) = grid {
        match grid.get(pos.x, pos.y) {
            COST_BLOCKED => return None,
            0 => {}
            cost => return Some(cost as u32),
        }
    }

    let terrain = room.terrain.get(pos.x, pos.y).cost()?;

    if grid.is_none() && room.blocking_structure_at(pos).is_some() {
        return None;
    }

    if room.structure_at(pos).map(|s| s.kind == crate::world::StructureKind::Road).unwrap_or(false) {
        return Some(1);
    }

    Some(terrain as u32)
}

/// Step off the travel lane while staying put near `anchor`.
pub fn idle_off_road(world: &mut World, id: ObjectId, anchor: Position) -> Result<(), ActionError> {
    let pos = world.unit(id).ok_or(ActionError::InvalidTarget)?.pos;

    if !pos.in_range_to(anchor, 3) || pos.room != anchor.room {
        travel_to(world, id, anchor, &TravelOptions::with_range(3))?;

        return Ok(());
    }

    step_off_road(world, id, anchor, 3)
}

/// After acting on `target`, make way for traffic: leave any road tile for
/// an adjacent open tile that keeps the target in range.
pub fn yield_road(world: &mut World, id: ObjectId, target: Position, range: u32) -> Result<(), ActionError> {
    step_off_road(world, id, target, range)
}

fn step_off_road(world: &mut World, id: ObjectId, keep_near: Position, range: u32) -> Result<(), ActionError> {
    let pos = world.unit(id).ok_or(ActionError::InvalidTarget)?.pos;

    let on_road = world
        .room(pos.room)
        .and_then(|room| room.structure_at(pos))
        .map(|s| s.kind == crate::world::StructureKind::Road)
        .unwrap_or(false);

    if !on_road {
        return Ok(());
    }

    let step = {
        let room = world.room(pos.room).ok_or(ActionError::InvalidTarget)?;

        pos.neighbors().find(|n| {
            room.terrain.is_walkable(n.x, n.y) && room.structure_at(*n).is_none() && n.in_range_to(keep_near, range) && !n.is_exit()
        })
    };

    if let Some(step) = step {
        world.move_unit(id, step)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{assemble_unit, Faction, Part, StructureKind, Terrain, UnitMemory};

    fn world_with_room() -> (World, RoomCoord) {
        let mut world = World::new();
        let coord = RoomCoord::new(0, 0);
        world.add_room(Room::new(coord));

        (world, coord)
    }

    fn add_unit(world: &mut World, pos: Position) -> ObjectId {
        let id = world.alloc_id();
        let unit = assemble_unit(id, format!("u{}", id), "t".to_string(), Faction::Ours, pos, vec![Part::Move], UnitMemory::default());

        world.insert_unit(unit)
    }

    #[test]
    fn travel_advances_one_tile_toward_destination() {
        let (mut world, coord) = world_with_room();
        let unit = add_unit(&mut world, Position::new(coord, 10, 10));

        let outcome = travel_to(&mut world, unit, Position::new(coord, 15, 10), &TravelOptions::default()).unwrap();

        assert!(outcome.moved);
        assert_eq!(world.unit(unit).unwrap().pos, Position::new(coord, 11, 10));
    }

    #[test]
    fn travel_stops_within_requested_range() {
        let (mut world, coord) = world_with_room();
        let unit = add_unit(&mut world, Position::new(coord, 10, 10));

        let outcome = travel_to(&mut world, unit, Position::new(coord, 12, 10), &TravelOptions::with_range(3)).unwrap();

        assert!(!outcome.moved);
    }

    #[test]
    fn travel_routes_around_terrain_walls() {
        let (mut world, coord) = world_with_room();

        // A vertical wall with a gap at y == 20.
        {
            let room = world.room_mut(coord).unwrap();
            for y in 0..50u8 {
                if y != 20 {
                    room.terrain.set(15, y, Terrain::Blocked);
                }
            }
        }

        let unit = add_unit(&mut world, Position::new(coord, 10, 10));
        let dest = Position::new(coord, 20, 10);

        for _ in 0..60 {
            let outcome = travel_to(&mut world, unit, dest, &TravelOptions::default()).unwrap();
            if !outcome.moved {
                break;
            }
        }

        assert_eq!(world.unit(unit).unwrap().pos, dest);
    }

    #[test]
    fn withholds_the_step_onto_a_demolishable_structure() {
        let (mut world, coord) = world_with_room();
        world.insert_structure(coord, StructureKind::Wall, Position::new(coord, 11, 10), 100, 300_000);

        // Wall off the whole column so the path must pass through.
        {
            let room = world.room_mut(coord).unwrap();
            for y in 0..50u8 {
                if y != 10 {
                    room.terrain.set(11, y, Terrain::Blocked);
                }
            }
        }

        let unit = add_unit(&mut world, Position::new(coord, 10, 10));
        let grid = crate::pathing::costgrid::build_raid_cost_grid(&world, coord, unit, &[unit]);

        let outcome = travel_to(
            &mut world,
            unit,
            Position::new(coord, 15, 10),
            &TravelOptions {
                range: 0,
                cost_grid: Some(&grid),
            },
        )
        .unwrap();

        assert!(!outcome.moved);
        assert_eq!(outcome.next_pos, Some(Position::new(coord, 11, 10)));
        assert_eq!(world.unit(unit).unwrap().pos, Position::new(coord, 10, 10));
    }

    #[test]
    fn travel_crosses_into_the_destination_room() {
        let mut world = World::new();
        let left = RoomCoord::new(0, 0);
        let right = RoomCoord::new(1, 0);
        world.add_room(Room::new(left));
        world.add_room(Room::new(right));

        let unit = add_unit(&mut world, Position::new(left, 48, 25));
        let dest = Position::new(right, 10, 25);

        for _ in 0..80 {
            if world.unit(unit).unwrap().pos == dest {
                break;
            }
            travel_to(&mut world, unit, dest, &TravelOptions::default()).unwrap();
        }

        assert_eq!(world.unit(unit).unwrap().pos, dest);
    }

    #[test]
    fn yield_road_steps_off_road_tiles() {
        let (mut world, coord) = world_with_room();
        let road_pos = Position::new(coord, 10, 10);
        world.insert_structure(coord, StructureKind::Road, road_pos, 5_000, 5_000);

        let unit = add_unit(&mut world, road_pos);

        yield_road(&mut world, unit, Position::new(coord, 12, 10), 3).unwrap();

        assert_ne!(world.unit(unit).unwrap().pos, road_pos);
    }
}
