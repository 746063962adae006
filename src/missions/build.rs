//! Construction and fortification upkeep mission.
//!
//! Fields a builder crew sized from budget and threat, plus supply relays
//! sized by transport analysis. Builders run the target-selection fallback
//! chain; relays run the pickup/hand-off protocol against the least-loaded
//! builder.

use super::missionsystem::{Mission, MissionContext, MissionStatus};
use crate::constants::*;
use crate::loadout::builder_loadout;
use crate::pathing::movement::{idle_off_road, travel_to, yield_road, TravelOptions};
use crate::spawning::{register_prespawn, role_call, RoleCallOptions};
use crate::targeting::{build_emergency_pool, select_work_target, WorkTarget};
use crate::threat::{estimate_room_threat, ThreatState};
use crate::transport::{analyze_transport, TransportAnalysis};
use crate::world::{find_nearest, BoostKind, KindFlags, ObjectId, Part, Position, RoomCoord, StructureKind, UnitMemory, World};
use itertools::Itertools;
use log::*;
use rand::Rng;

/// Builder potency from the room's energy reserve, or from source count
/// when no bulk storage exists.
pub fn builder_potency(world: &World, room: RoomCoord) -> u32 {
    let Some(room) = world.room(room) else {
        return 0;
    };

    if let Some(storage) = room.storage() {
        if storage.store < POTENCY_RESERVE_FLOOR {
            1
        } else {
            (storage.store / ENERGY_PER_POTENCY).min(MAX_POTENCY)
        }
    } else {
        room.sources.len() as u32 * 2
    }
}

/// Builder population target. Zero without work items or without threat:
/// infrastructure crews stand down when budget should go to defense.
pub fn builder_population(work_items: usize, threat_present: bool, potency: u32, budget: u32) -> usize {
    if work_items == 0 || !threat_present || budget == 0 {
        return 0;
    }

    // Loadout cost of a potency-sized crew: work parts, their share of
    // move, plus the carry allowance relays keep topped off.
    let crew_cost = potency * Part::Work.cost() + potency.div_ceil(2) * Part::Move.cost() + 150 * potency;

    crew_cost.div_ceil(budget) as usize
}

/// Relay population target, straight from the cached transport analysis.
pub fn relay_population(work_items: usize, threat_present: bool, analysis: &TransportAnalysis) -> usize {
    if work_items == 0 || !threat_present {
        0
    } else {
        analysis.carts_needed as usize
    }
}

pub struct BuildMission {
    name: String,
    room: RoomCoord,
    anchor: Position,
    activate_boost: bool,
    builders: Vec<ObjectId>,
    carts: Vec<ObjectId>,
    threat: Option<ThreatState>,
    emergency_pool: Vec<ObjectId>,
}

impl BuildMission {
    pub fn new(name: &str, anchor: Position, activate_boost: bool) -> BuildMission {
        BuildMission {
            name: name.to_string(),
            room: anchor.room,
            anchor,
            activate_boost,
            builders: Vec::new(),
            carts: Vec::new(),
            threat: None,
            emergency_pool: Vec::new(),
        }
    }

    pub fn builders(&self) -> &[ObjectId] {
        &self.builders
    }

    pub fn carts(&self) -> &[ObjectId] {
        &self.carts
    }

    fn builder_actions(&mut self, ctx: &mut MissionContext, id: ObjectId) {
        let Some(threat) = self.threat else {
            return;
        };

        {
            let memory = ctx.memory.mission(&self.name);

            match ctx.world.unit_mut(id) {
                Some(unit) => register_prespawn(memory, unit),
                None => return,
            }
        }

        let (unit_pos, unit_store) = match ctx.world.unit(id) {
            Some(unit) => (unit.pos, unit.store),
            None => return,
        };

        // With relays on duty the builder holds position and works; they
        // keep it topped off.
        let has_load = unit_store > 0 || !self.carts.is_empty();

        if !has_load {
            Self::procure_energy(ctx, id, self.room, self.anchor);
            return;
        }

        let memory = ctx.memory.mission(&self.name);

        //
        // Follow-up repair on the fortification we just built, until it is
        // out of the fragile band.
        //

        if let Some(pos) = memory.fortification_pos {
            let fresh = ctx
                .world
                .room(self.room)
                .and_then(|r| r.structure_at(pos))
                .filter(|s| s.kind == StructureKind::Rampart && s.hits < FRESH_FORTIFICATION_WEAR)
                .map(|s| (s.id, s.pos));

            if let Some((structure_id, structure_pos)) = fresh {
                if unit_pos.in_range_to(structure_pos, INTERACT_RANGE) {
                    if let Err(err) = ctx.world.repair(id, structure_id) {
                        debug!("[{}] follow-up repair failed: {}", self.name, err);
                    }
                } else {
                    let _ = travel_to(ctx.world, id, structure_pos, &TravelOptions::with_range(INTERACT_RANGE));
                }

                return;
            }

            memory.fortification_pos = None;
        }

        let target = select_work_target(ctx.world, self.room, id, memory, &mut self.emergency_pool, threat.rival_hostiles, ctx.config);

        match target {
            WorkTarget::Build(site_id) => {
                let Some((site_pos, site_kind)) = ctx.world.construction_site(site_id).map(|s| (s.pos, s.kind)) else {
                    return;
                };

                let range = unit_pos.range_to(site_pos);

                if range <= INTERACT_RANGE {
                    match ctx.world.build(id, site_id) {
                        Ok(()) => {
                            let _ = yield_road(ctx.world, id, site_pos, INTERACT_RANGE);

                            if site_kind == StructureKind::Rampart {
                                memory.fortification_pos = Some(site_pos);
                            }
                        }
                        Err(err) => debug!("[{}] build failed: {}", self.name, err),
                    }

                    // Standing on the footprint stalls completion.
                    if range == 0 {
                        let _ = travel_to(ctx.world, id, self.anchor, &TravelOptions::default());
                    }
                } else {
                    let _ = travel_to(ctx.world, id, site_pos, &TravelOptions::with_range(INTERACT_RANGE));
                }
            }
            WorkTarget::Repair(structure_id) => {
                let Some(structure_pos) = ctx.world.structure(structure_id).map(|s| s.pos) else {
                    return;
                };

                if unit_pos.in_range_to(structure_pos, INTERACT_RANGE) {
                    match ctx.world.repair(id, structure_id) {
                        Ok(()) => {
                            let _ = yield_road(ctx.world, id, structure_pos, INTERACT_RANGE);
                        }
                        Err(err) => debug!("[{}] repair failed: {}", self.name, err),
                    }
                } else {
                    let _ = travel_to(ctx.world, id, structure_pos, &TravelOptions::with_range(INTERACT_RANGE));
                }
            }
            WorkTarget::Upgrade => {
                let Some(controller_pos) = ctx.world.room(self.room).and_then(|r| r.controller.as_ref()).map(|c| c.pos) else {
                    return;
                };

                if unit_pos.in_range_to(controller_pos, INTERACT_RANGE) {
                    if let Err(err) = ctx.world.upgrade(id) {
                        debug!("[{}] upgrade failed: {}", self.name, err);
                    }

                    let _ = yield_road(ctx.world, id, controller_pos, INTERACT_RANGE);
                } else {
                    let _ = travel_to(ctx.world, id, controller_pos, &TravelOptions::with_range(INTERACT_RANGE));
                }
            }
            WorkTarget::Idle => {
                let _ = idle_off_road(ctx.world, id, self.anchor);
            }
        }
    }

    /// Relay protocol: pickup, approach, capacity-aware hand-off, recycle.
    fn cart_actions(&mut self, ctx: &mut MissionContext, id: ObjectId) {
        // Builders are sorted ascending by load; the head is the one to
        // even out first.
        let Some(&builder_id) = self.builders.first() else {
            let _ = idle_off_road(ctx.world, id, self.anchor);
            return;
        };

        let Some((cart_pos, cart_store)) = ctx.world.unit(id).map(|u| (u.pos, u.store)) else {
            return;
        };

        if cart_store == 0 {
            Self::procure_energy(ctx, id, self.room, self.anchor);
            return;
        }

        let Some((builder_pos, builder_store, builder_capacity, builder_free)) = ctx
            .world
            .unit(builder_id)
            .map(|u| (u.pos, u.store, u.store_capacity, u.free_capacity()))
        else {
            let _ = idle_off_road(ctx.world, id, self.anchor);
            return;
        };

        let range = cart_pos.range_to(builder_pos);

        if range > INTERACT_RANGE {
            let _ = travel_to(ctx.world, id, builder_pos, &TravelOptions::with_range(1));
            return;
        }

        let over_capacity = cart_store > builder_free;

        // Topping off a mostly-full builder would overflow: stand off the
        // lane instead of crowding it.
        if builder_store > builder_capacity / 2 && over_capacity {
            let _ = yield_road(ctx.world, id, builder_pos, INTERACT_RANGE);
            return;
        }

        if range > 1 {
            let _ = travel_to(ctx.world, id, builder_pos, &TravelOptions::with_range(1));
            return;
        }

        if let Err(err) = ctx.world.transfer(id, builder_id) {
            debug!("[{}] relay transfer failed: {}", self.name, err);
        }

        // The full load fit: head back to bulk storage for the next run.
        if !over_capacity {
            if let Some(storage_pos) = ctx.world.room(self.room).and_then(|r| r.storage()).map(|s| s.pos) {
                let _ = travel_to(ctx.world, id, storage_pos, &TravelOptions::with_range(1));
            }
        }
    }

    /// Self-supply: bulk storage first, then the nearest charged source.
    fn procure_energy(ctx: &mut MissionContext, id: ObjectId, room: RoomCoord, anchor: Position) {
        let Some(unit_pos) = ctx.world.unit(id).map(|u| u.pos) else {
            return;
        };

        let storage = ctx
            .world
            .room(room)
            .and_then(|r| r.storage())
            .filter(|s| s.store > 0)
            .map(|s| (s.id, s.pos));

        if let Some((storage_id, storage_pos)) = storage {
            if unit_pos.is_near_to(storage_pos) {
                if let Err(err) = ctx.world.withdraw(id, storage_id) {
                    debug!("[BuildMission] withdraw failed: {}", err);
                }
            } else {
                let _ = travel_to(ctx.world, id, storage_pos, &TravelOptions::with_range(1));
            }

            return;
        }

        let source = ctx
            .world
            .room(room)
            .and_then(|r| find_nearest(unit_pos, r.sources.iter().filter(|s| s.energy > 0), |s| s.pos))
            .map(|s| (s.id, s.pos));

        if let Some((source_id, source_pos)) = source {
            if unit_pos.is_near_to(source_pos) {
                if let Err(err) = ctx.world.harvest(id, source_id) {
                    debug!("[BuildMission] harvest failed: {}", err);
                }
            } else {
                let _ = travel_to(ctx.world, id, source_pos, &TravelOptions::with_range(1));
            }

            return;
        }

        let _ = idle_off_road(ctx.world, id, anchor);
    }
}

impl Mission for BuildMission {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_mission(&mut self, ctx: &mut MissionContext) -> Result<(), String> {
        let tick = ctx.world.tick();

        ctx.world.room(self.room).ok_or("Expected room")?;

        let threat = estimate_room_threat(ctx.world, self.room, self.room);
        self.threat = Some(threat);

        self.emergency_pool = if threat.rival_hostiles {
            build_emergency_pool(ctx.world, self.room)
        } else {
            Vec::new()
        };

        //
        // Periodically re-arm the wear ceiling while fortification work
        // items exist, so fresh walls get their first passes.
        //

        let has_fortification_sites = ctx
            .world
            .room(self.room)
            .map(|r| r.construction_sites.iter().any(|s| s.kind.is(KindFlags::FORTIFICATION)))
            .unwrap_or(false);

        let memory = ctx.memory.mission(&self.name);
        let interval = ctx.config.wear_ceiling_rearm_interval.max(1);

        if tick % interval == interval / 2 && has_fortification_sites {
            memory.max_hits_to_build = Some(BASE_WEAR_CEILING);
        }

        if memory.max_hits_to_build.is_none() {
            memory.max_hits_to_build = Some(BASE_WEAR_CEILING);
        }

        Ok(())
    }

    fn role_call(&mut self, ctx: &mut MissionContext) -> Result<(), String> {
        let (budget, has_storage, work_items) = {
            let room = ctx.world.room(self.room).ok_or("Expected room")?;

            (room.energy_capacity, room.storage().is_some(), room.construction_sites.len())
        };

        let threat = self.threat.ok_or("Mission not initialized")?;
        let potency = builder_potency(ctx.world, self.room);

        let analysis = {
            let distance = if has_storage {
                ctx.config.storage_relay_distance
            } else {
                ctx.config.no_storage_relay_distance
            };

            let memory = ctx.memory.mission(&self.name);

            *memory
                .transport
                .get_or_insert_with(|| analyze_transport(distance, potency * POTENCY_DRAW, budget))
        };

        let builders_target = builder_population(work_items, threat.hostiles_present, potency, budget);
        let carts_target = relay_population(work_items, threat.hostiles_present, &analysis);
        let prespawn = ctx.memory.mission(&self.name).prespawn;

        let builder_memory = UnitMemory {
            boosts: if self.activate_boost { vec![BoostKind::Work] } else { Vec::new() },
            ..UnitMemory::default()
        };

        let options = RoleCallOptions {
            prespawn,
            initial_memory: builder_memory,
            skip_move_to_room: false,
            silent_spawn: false,
        };

        let local_relays = carts_target > 0;

        let builders = role_call(
            ctx.world,
            ctx.spawn_queue,
            self.room,
            self.anchor,
            &self.name,
            || builder_loadout(potency, budget, analysis.carry_count, local_relays),
            || builders_target,
            &options,
        );

        // Ascending by load: relays serve the least-loaded builder first.
        self.builders = builders
            .into_iter()
            .sorted_by_key(|id| ctx.world.unit(*id).map(|u| u.store).unwrap_or(0))
            .collect();

        let cart_role = format!("{}Cart", self.name);
        let cart_options = RoleCallOptions {
            prespawn,
            initial_memory: UnitMemory::default(),
            skip_move_to_room: false,
            silent_spawn: false,
        };

        self.carts = role_call(
            ctx.world,
            ctx.spawn_queue,
            self.room,
            self.anchor,
            &cart_role,
            || analysis.loadout(),
            || carts_target,
            &cart_options,
        );

        Ok(())
    }

    fn mission_actions(&mut self, ctx: &mut MissionContext) -> Result<(), String> {
        for id in self.builders.clone() {
            self.builder_actions(ctx, id);
        }

        for id in self.carts.clone() {
            self.cart_actions(ctx, id);
        }

        Ok(())
    }

    fn finalize_mission(&mut self, _ctx: &mut MissionContext) -> Result<MissionStatus, String> {
        // Upkeep runs for as long as the anchor stands.
        Ok(MissionStatus::Running)
    }

    fn invalidate_mission_cache(&mut self, ctx: &mut MissionContext) {
        let reset_ceiling = ctx.rng.gen_bool(ctx.config.wear_ceiling_reset_probability);
        let memory = ctx.memory.mission(&self.name);

        memory.transport = None;

        if reset_ceiling {
            memory.max_hits_to_build = None;
        }
    }
}
