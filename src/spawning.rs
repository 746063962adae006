//! Spawn queue and the role-call population primitive.
//!
//! Missions request production through a per-room, priority-ordered queue;
//! the queue is drained once per tick after all missions ran. Role call
//! reconciles a role's live population against its target, requesting the
//! shortfall and prespawning replacements for units that will not live
//! long enough for a successor to reach the workplace.

use crate::constants::{SPAWN_TIME_PER_PART, UNIT_LIFETIME};
use crate::memory::MissionMemory;
use crate::pathing::movement::{travel_to, TravelOptions};
use crate::world::{ObjectId, Part, Position, RoomCoord, Unit, UnitMemory, World};
use log::*;
use std::collections::BTreeMap;

pub const SPAWN_PRIORITY_CRITICAL: f32 = 100.0;
pub const SPAWN_PRIORITY_HIGH: f32 = 75.0;
pub const SPAWN_PRIORITY_MEDIUM: f32 = 50.0;
pub const SPAWN_PRIORITY_LOW: f32 = 25.0;
pub const SPAWN_PRIORITY_NONE: f32 = 0.0;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SpawnToken(u32);

pub struct SpawnRequest {
    description: String,
    role: String,
    body: Vec<Part>,
    priority: f32,
    token: Option<SpawnToken>,
    memory: UnitMemory,
}

impl SpawnRequest {
    pub fn new(description: String, role: &str, body: &[Part], priority: f32, token: Option<SpawnToken>, memory: UnitMemory) -> SpawnRequest {
        SpawnRequest {
            description,
            role: role.to_string(),
            body: body.to_vec(),
            priority,
            token,
            memory,
        }
    }

    pub fn cost(&self) -> u32 {
        crate::loadout::loadout_cost(&self.body)
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Default)]
pub struct SpawnQueue {
    next_token: u32,
    requests: BTreeMap<RoomCoord, Vec<SpawnRequest>>,
}

impl SpawnQueue {
    pub fn new() -> SpawnQueue {
        SpawnQueue::default()
    }

    pub fn token(&mut self) -> SpawnToken {
        let token = SpawnToken(self.next_token);

        self.next_token += 1;

        token
    }

    /// Insert keeping requests sorted by descending priority.
    pub fn request(&mut self, room: RoomCoord, spawn_request: SpawnRequest) {
        let requests = self.requests.entry(room).or_default();

        let pos = requests
            .binary_search_by(|probe| {
                spawn_request
                    .priority
                    .partial_cmp(&probe.priority)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or_else(|e| e);

        requests.insert(pos, spawn_request);
    }

    pub fn clear(&mut self) {
        self.next_token = 0;
        self.requests.clear();
    }

    pub fn iter_requests(&self) -> impl Iterator<Item = (&RoomCoord, &Vec<SpawnRequest>)> {
        self.requests.iter()
    }
}

/// Drain the queue against each room's production budget. One unit per
/// production structure per tick; a request too expensive for the room's
/// capacity is skipped, one merely unaffordable right now blocks the rest
/// of that room's queue so high-priority requests are not starved.
pub fn process_spawn_queue(world: &mut World, queue: &mut SpawnQueue) {
    let rooms: Vec<RoomCoord> = queue.requests.keys().copied().collect();

    for coord in rooms {
        let Some(requests) = queue.requests.get(&coord) else { continue };

        let (mut available, capacity, mut slots) = match world.room(coord) {
            Some(room) => (
                room.energy_available,
                room.energy_capacity,
                room.structures_of(crate::world::KindFlags::SPAWN).count(),
            ),
            None => {
                warn!("[Spawn] No room {} for queued requests", coord);
                continue;
            }
        };

        let mut sequence = 0;

        for request in requests {
            if slots == 0 {
                break;
            }

            let cost = request.cost();

            if cost > capacity {
                continue;
            }
            if cost > available {
                break;
            }

            let name = format!("{}-{}", world.tick(), sequence);
            sequence += 1;

            match world.produce_unit(coord, &name, &request.role, request.body.clone(), request.memory.clone()) {
                Ok(_) => {
                    debug!("[Spawn] Produced {} ({})", name, request.description);
                    available = available.saturating_sub(cost);
                    slots -= 1;
                }
                Err(err) => {
                    warn!("[Spawn] Failed to produce {}: {}", request.description, err);
                    break;
                }
            }
        }
    }

    queue.clear();
}

/// Per-role production configuration for [`role_call`].
#[derive(Clone, Default)]
pub struct RoleCallOptions {
    /// Lead time in ticks: units this close to expiry are treated as
    /// already gone when counting population.
    pub prespawn: u32,
    /// Memory stamped onto newly produced units.
    pub initial_memory: UnitMemory,
    /// When false, units outside the anchor room are marched toward it
    /// and excluded from the returned working set.
    pub skip_move_to_room: bool,
    /// Suppress request logging for routine refreshes.
    pub silent_spawn: bool,
}

/// Reconcile a role's population: return the working set of live units and
/// queue production of any shortfall against the home room's budget.
pub fn role_call<L, M>(
    world: &mut World,
    spawn_queue: &mut SpawnQueue,
    home_room: RoomCoord,
    anchor: Position,
    role: &str,
    loadout_fn: L,
    target_fn: M,
    options: &RoleCallOptions,
) -> Vec<ObjectId>
where
    L: Fn() -> Vec<Part>,
    M: Fn() -> usize,
{
    let mut working_set = Vec::new();
    let mut en_route = Vec::new();
    let mut counted = 0usize;

    for unit in world.friendly_units_with_role(role) {
        if !options.skip_move_to_room && unit.pos.room != anchor.room {
            en_route.push(unit.id);
        } else {
            working_set.push(unit.id);
        }

        if !needs_replacement(unit, options.prespawn) {
            counted += 1;
        }
    }

    for id in en_route {
        let _ = travel_to(world, id, anchor, &TravelOptions::default());
    }

    let target = target_fn();

    if counted < target {
        let body = loadout_fn();

        if body.is_empty() {
            return working_set;
        }

        if !options.silent_spawn {
            info!("[RoleCall] {} below target: {}/{}", role, counted, target);
        }

        let token = spawn_queue.token();
        let request = SpawnRequest::new(
            format!("{} (population {}/{})", role, counted, target),
            role,
            &body,
            SPAWN_PRIORITY_MEDIUM,
            Some(token),
            options.initial_memory.clone(),
        );

        spawn_queue.request(home_room, request);
    }

    working_set
}

/// A unit too close to expiry to finish another rotation is excluded from
/// the population count so its replacement starts producing in time.
fn needs_replacement(unit: &Unit, prespawn: u32) -> bool {
    let spawn_duration = unit.body.len() as u32 * SPAWN_TIME_PER_PART;

    unit.ticks_to_live < prespawn + spawn_duration
}

/// Record how long this unit took to reach its workplace, once, so future
/// replacements are requested that many ticks early.
pub fn register_prespawn(memory: &mut MissionMemory, unit: &mut Unit) {
    if !unit.memory.prespawn_registered {
        unit.memory.prespawn_registered = true;
        memory.prespawn = UNIT_LIFETIME - unit.ticks_to_live;
    }
}
