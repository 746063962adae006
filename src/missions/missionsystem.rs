//! Mission lifecycle contract and the per-tick driver.
//!
//! Each active mission is driven through the same five phases every tick:
//! `init_mission`, `role_call`, `mission_actions`, `finalize_mission`,
//! `invalidate_mission_cache`. Missions run strictly sequentially; a later
//! mission observes every world mutation an earlier one made this tick.

use super::data::MissionData;
use crate::config::SimConfig;
use crate::memory::MemoryStore;
use crate::spawning::{process_spawn_queue, SpawnQueue};
use crate::world::World;
use log::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Everything a mission decision may consult, passed explicitly. There are
/// no ambient lookups; determinism follows from the snapshot, the memory
/// store and the seeded RNG.
pub struct MissionContext<'a> {
    pub world: &'a mut World,
    pub memory: &'a mut MemoryStore,
    pub spawn_queue: &'a mut SpawnQueue,
    pub config: &'a SimConfig,
    pub rng: &'a mut SmallRng,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MissionStatus {
    Running,
    /// Completion condition met; the driver removes the mission's anchor
    /// and memory at the end of the tick.
    Complete,
}

pub trait Mission {
    /// Mission name; also the memory key and the anchor flag name.
    fn name(&self) -> &str;

    fn init_mission(&mut self, ctx: &mut MissionContext) -> Result<(), String>;

    fn role_call(&mut self, ctx: &mut MissionContext) -> Result<(), String>;

    fn mission_actions(&mut self, ctx: &mut MissionContext) -> Result<(), String>;

    fn finalize_mission(&mut self, ctx: &mut MissionContext) -> Result<MissionStatus, String>;

    fn invalidate_mission_cache(&mut self, ctx: &mut MissionContext);
}

/// Owns the registered missions and drives them once per tick, in
/// registration order, then drains the spawn queue.
pub struct MissionSystem {
    missions: Vec<MissionData>,
    spawn_queue: SpawnQueue,
    config: SimConfig,
    rng: SmallRng,
}

impl MissionSystem {
    pub fn new(config: SimConfig, seed: u64) -> MissionSystem {
        MissionSystem {
            missions: Vec::new(),
            spawn_queue: SpawnQueue::new(),
            config: config.clone(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn register(&mut self, mission: MissionData) {
        self.missions.push(mission);
    }

    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Drive every mission through the full lifecycle. Completed and
    /// failed missions are unregistered and their anchors removed;
    /// failures never propagate to the tick loop.
    pub fn run_tick(&mut self, world: &mut World, memory: &mut MemoryStore) {
        let mut finished: Vec<String> = Vec::new();

        for mission_data in self.missions.iter_mut() {
            let mission = mission_data.as_mission_mut();

            let mut ctx = MissionContext {
                world,
                memory,
                spawn_queue: &mut self.spawn_queue,
                config: &self.config,
                rng: &mut self.rng,
            };

            let outcome = Self::run_mission(mission, &mut ctx);

            match outcome {
                Ok(MissionStatus::Running) => {}
                Ok(MissionStatus::Complete) => {
                    info!("[Missions] {} complete", mission.name());
                    finished.push(mission.name().to_string());
                }
                Err(err) => {
                    warn!("[Missions] {} failed, cleaning up: {}", mission.name(), err);
                    finished.push(mission.name().to_string());
                }
            }
        }

        //
        // Process completion: remove the anchor and mission memory, then
        // unregister.
        //

        for name in &finished {
            world.remove_flag(name);
            memory.remove(name);
        }

        self.missions.retain(|m| !finished.iter().any(|name| name == m.as_mission().name()));

        process_spawn_queue(world, &mut self.spawn_queue);
    }

    fn run_mission(mission: &mut dyn Mission, ctx: &mut MissionContext) -> Result<MissionStatus, String> {
        mission.init_mission(ctx)?;
        mission.role_call(ctx)?;
        mission.mission_actions(ctx)?;

        let status = mission.finalize_mission(ctx)?;

        mission.invalidate_mission_cache(ctx);

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::missions::build::BuildMission;
    use crate::missions::raid::RaidMission;
    use crate::world::{Position, Room, RoomCoord};

    #[test]
    fn completed_mission_is_unregistered_with_anchor_and_memory() {
        // No offensive structures in the target room: the raid completes
        // on its first tick.
        let mut world = World::new();
        let home = RoomCoord::new(0, 0);
        let target = RoomCoord::new(1, 0);
        world.add_room(Room::new(home));
        world.add_room(Room::new(target));

        let anchor = Position::new(target, 25, 25);
        world.add_flag("raid_R1x0", anchor);

        let mut memory = MemoryStore::new();
        memory.mission("raid_R1x0").prespawn = 50;

        let mut system = MissionSystem::new(SimConfig::default(), 1);
        system.register(MissionData::Raid(RaidMission::new("raid_R1x0", anchor, home)));

        system.run_tick(&mut world, &mut memory);

        assert_eq!(system.mission_count(), 0);
        assert!(world.flag("raid_R1x0").is_none());
        assert!(memory.get("raid_R1x0").is_none());
    }

    #[test]
    fn failed_mission_is_cleaned_up_without_poisoning_the_tick() {
        // The build mission's room does not exist, so it errors at init;
        // the raid behind it still runs to completion the same tick.
        let mut world = World::new();
        let home = RoomCoord::new(0, 0);
        let target = RoomCoord::new(1, 0);
        world.add_room(Room::new(home));
        world.add_room(Room::new(target));

        let missing = RoomCoord::new(5, 5);
        let build_anchor = Position::new(missing, 25, 25);
        let raid_anchor = Position::new(target, 25, 25);
        world.add_flag("build_R5x5", build_anchor);
        world.add_flag("raid_R1x0", raid_anchor);

        let mut memory = MemoryStore::new();
        let mut system = MissionSystem::new(SimConfig::default(), 1);
        system.register(MissionData::Build(BuildMission::new("build_R5x5", build_anchor, false)));
        system.register(MissionData::Raid(RaidMission::new("raid_R1x0", raid_anchor, home)));

        system.run_tick(&mut world, &mut memory);

        assert_eq!(system.mission_count(), 0);
        assert!(world.flag("build_R5x5").is_none());
        assert!(world.flag("raid_R1x0").is_none());
    }

    #[test]
    fn running_missions_stay_registered_across_ticks() {
        let mut world = World::new();
        let coord = RoomCoord::new(0, 0);
        let mut room = Room::new(coord);
        room.energy_available = 1_300;
        room.energy_capacity = 1_300;
        world.add_room(room);

        world.add_flag("build_R0x0", Position::new(coord, 25, 25));

        let mut memory = MemoryStore::new();
        let mut system = MissionSystem::new(SimConfig::default(), 1);
        system.register(MissionData::Build(BuildMission::new("build_R0x0", Position::new(coord, 25, 25), false)));

        for _ in 0..3 {
            system.run_tick(&mut world, &mut memory);
            world.advance_tick();
        }

        assert_eq!(system.mission_count(), 1);
        assert!(world.flag("build_R0x0").is_some());
    }
}
