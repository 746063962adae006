#![warn(clippy::all)]

//! Per-tick mission coordination engine for fleets of autonomous agents.
//!
//! Each registered mission is driven once per tick through a fixed
//! five-phase lifecycle (`init_mission`, `role_call`, `mission_actions`,
//! `finalize_mission`, `invalidate_mission_cache`) against a shared world
//! snapshot. All decisions are made from the current snapshot only and are
//! deterministic for a given snapshot, mission memory and RNG seed.

pub mod config;
pub mod constants;
pub mod loadout;
pub mod logging;
pub mod memory;
pub mod missions;
pub mod pathing;
pub mod serialize;
pub mod spawning;
pub mod targeting;
pub mod threat;
pub mod transport;
pub mod world;

pub use config::SimConfig;
pub use memory::{MemoryStore, MissionMemory};
pub use missions::build::BuildMission;
pub use missions::data::MissionData;
pub use missions::missionsystem::{Mission, MissionContext, MissionStatus, MissionSystem};
pub use missions::raid::RaidMission;
pub use world::World;
