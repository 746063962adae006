//! Raid mission: a coordinated dismantle assault on a hostile room.
//!
//! Fields a small squad whose loadout is sized against the estimated
//! incoming damage, and drives each raider through a retreat/regroup/
//! advance state machine: drop back to the staging fallback below a health
//! threshold, hold at the room exit until a streak of full-health ticks,
//! then push for the nearest offensive structure, demolishing whatever
//! stands in the lane. Movement inside the target room runs over the
//! shared cost grid so squad mates avoid each other while keeping escape
//! lanes open.

use super::missionsystem::{Mission, MissionContext, MissionStatus};
use crate::loadout::raider_loadout;
use crate::pathing::costgrid::build_raid_cost_grid;
use crate::pathing::movement::{travel_to, TravelOptions};
use crate::spawning::{register_prespawn, role_call, RoleCallOptions};
use crate::threat::{estimate_room_threat, CombatPhase, ThreatState};
use crate::world::{find_nearest, ActionError, BoostKind, KindFlags, ObjectId, Position, RoomCoord, UnitMemory};
use log::*;

pub struct RaidMission {
    name: String,
    target_room: RoomCoord,
    home_room: RoomCoord,
    anchor: Position,
    raiders: Vec<ObjectId>,
    threat: Option<ThreatState>,
}

impl RaidMission {
    pub fn new(name: &str, anchor: Position, home_room: RoomCoord) -> RaidMission {
        RaidMission {
            name: name.to_string(),
            target_room: anchor.room,
            home_room,
            anchor,
            raiders: Vec::new(),
            threat: None,
        }
    }

    pub fn raiders(&self) -> &[ObjectId] {
        &self.raiders
    }

    fn raider_actions(&mut self, ctx: &mut MissionContext, id: ObjectId) {
        let Some(threat) = self.threat else {
            return;
        };

        let Some((pos, boosted)) = ctx.world.unit(id).map(|u| (u.pos, u.is_boosted())) else {
            return;
        };

        //
        // Self-heal when hurt by more than a tenth of the expected
        // incoming damage; anything less regenerates while the push
        // continues. A heal spent here rules out a dismantle this tick.
        //

        let healing = {
            let hurt = ctx
                .world
                .unit(id)
                .map(|u| u.hits + threat.expected_damage / 10 < u.hits_max)
                .unwrap_or(false);

            hurt && ctx.world.heal(id, id).is_ok()
        };

        if pos.room == self.target_room {
            if let Err(err) = ctx.world.ranged_mass_attack(id) {
                // Unboosted frames carry no ranged parts.
                if err != ActionError::NoBodyPart {
                    debug!("[{}] mass attack failed: {}", self.name, err);
                }
            }
        }

        let threshold = if boosted {
            ctx.config.boosted_retreat_threshold
        } else {
            ctx.config.retreat_threshold
        };

        let (full_health, below_threshold) = match ctx.world.unit(id) {
            Some(unit) => (unit.is_full_health(0), !unit.is_full_health(threshold)),
            None => return,
        };

        if below_threshold {
            if let Some(unit) = ctx.world.unit_mut(id) {
                unit.memory.reached_fallback = false;
            }
        }

        //
        // Regroup: route to the fallback position and hold there until
        // healed. The first arrival at full health registers the travel
        // time so replacements start producing early enough.
        //

        let reached_fallback = ctx.world.unit(id).map(|u| u.memory.reached_fallback).unwrap_or(false);

        if !reached_fallback {
            if pos.is_near_to(threat.fallback_pos) && full_health {
                let memory = ctx.memory.mission(&self.name);

                if let Some(unit) = ctx.world.unit_mut(id) {
                    register_prespawn(memory, unit);
                    unit.memory.reached_fallback = true;
                }
            }

            let _ = travel_to(ctx.world, id, threat.fallback_pos, &TravelOptions::default());

            return;
        }

        //
        // Exit hysteresis: only step past the room boundary after a streak
        // of consecutive full-health ticks there. Any damage, or leaving
        // the boundary, resets the streak.
        //

        if pos.is_near_exit(0) {
            let streak = {
                let Some(unit) = ctx.world.unit_mut(id) else { return };

                if full_health {
                    unit.memory.safe_count += 1;
                } else {
                    unit.memory.safe_count = 0;
                }

                unit.memory.safe_count
            };

            if streak < ctx.config.exit_safety_streak {
                return;
            }
        } else if let Some(unit) = ctx.world.unit_mut(id) {
            unit.memory.safe_count = 0;
        }

        //
        // Advance: the anchor from outside the objective room, the nearest
        // offensive structure inside it.
        //

        let destination = if pos.room == self.target_room {
            ctx.world
                .room(self.target_room)
                .and_then(|room| find_nearest(pos, room.structures_of(KindFlags::SPAWN), |s| s.pos))
                .map(|s| s.pos)
                .unwrap_or(self.anchor)
        } else {
            self.anchor
        };

        let outcome = {
            let grid = (pos.room == self.target_room).then(|| build_raid_cost_grid(ctx.world, self.target_room, id, &self.raiders));

            travel_to(
                ctx.world,
                id,
                destination,
                &TravelOptions {
                    range: 0,
                    cost_grid: grid.as_ref(),
                },
            )
        };

        if let Some(unit) = ctx.world.unit_mut(id) {
            unit.memory.demolishing = false;
        }

        let Ok(outcome) = outcome else {
            return;
        };

        if pos.room != self.target_room || pos.is_near_exit(0) {
            return;
        }

        //
        // The planned step lands on a structure: mark the tick as
        // demolishing and clear the tile instead of moving.
        //

        let Some(next) = outcome.next_pos else {
            return;
        };

        let blocking = ctx
            .world
            .room(self.target_room)
            .and_then(|room| room.blocking_structure_at(next))
            .map(|s| s.id);

        let Some(structure_id) = blocking else {
            return;
        };

        if let Some(unit) = ctx.world.unit_mut(id) {
            unit.memory.demolishing = true;
        }

        if !healing {
            if let Err(err) = ctx.world.attack(id, structure_id) {
                debug!("[{}] dismantle failed: {}", self.name, err);
            }
        }
    }
}

impl Mission for RaidMission {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_mission(&mut self, ctx: &mut MissionContext) -> Result<(), String> {
        ctx.world.room(self.home_room).ok_or("Expected home room")?;

        let threat = estimate_room_threat(ctx.world, self.target_room, self.home_room);

        // The boost decision is latched at first sight of the target so
        // replacements match the units already fielded.
        let memory = ctx.memory.mission(&self.name);
        let boost = *memory.boost.get_or_insert(threat.boost);

        self.threat = Some(ThreatState { boost, ..threat });

        Ok(())
    }

    fn role_call(&mut self, ctx: &mut MissionContext) -> Result<(), String> {
        let threat = self.threat.ok_or("Mission not initialized")?;

        let target = if threat.phase == CombatPhase::Complete {
            0
        } else {
            ctx.config.raid_squad_size
        };

        let raider_memory = UnitMemory {
            boosts: if threat.boost {
                vec![BoostKind::Tough, BoostKind::Heal]
            } else {
                Vec::new()
            },
            ..UnitMemory::default()
        };

        let options = RoleCallOptions {
            prespawn: ctx.memory.mission(&self.name).prespawn,
            initial_memory: raider_memory,
            // Raiders manage their own approach through the state machine.
            skip_move_to_room: true,
            silent_spawn: true,
        };

        self.raiders = role_call(
            ctx.world,
            ctx.spawn_queue,
            self.home_room,
            self.anchor,
            &self.name,
            || raider_loadout(threat.expected_damage, threat.boost),
            || target,
            &options,
        );

        Ok(())
    }

    fn mission_actions(&mut self, ctx: &mut MissionContext) -> Result<(), String> {
        for id in self.raiders.clone() {
            self.raider_actions(ctx, id);
        }

        Ok(())
    }

    fn finalize_mission(&mut self, _ctx: &mut MissionContext) -> Result<MissionStatus, String> {
        let threat = self.threat.ok_or("Mission not initialized")?;

        if threat.phase == CombatPhase::Complete {
            info!("[{}] objective destroyed in {}", self.name, self.target_room);

            Ok(MissionStatus::Complete)
        } else {
            Ok(MissionStatus::Running)
        }
    }

    fn invalidate_mission_cache(&mut self, _ctx: &mut MissionContext) {}
}
