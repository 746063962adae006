use super::data::ObjectId;
use super::position::Position;
use crate::constants::*;
use serde::{Deserialize, Serialize};

/// Attribute parts a unit loadout is composed of.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Part {
    Work,
    Carry,
    Move,
    Attack,
    RangedAttack,
    Heal,
    Tough,
}

impl Part {
    pub fn cost(self) -> u32 {
        match self {
            Part::Work => 100,
            Part::Carry => 50,
            Part::Move => 50,
            Part::Attack => 80,
            Part::RangedAttack => 150,
            Part::Heal => 250,
            Part::Tough => 10,
        }
    }
}

/// Boost compounds applied at production time.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BoostKind {
    Work,
    Tough,
    Heal,
    Move,
    RangedAttack,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Faction {
    /// Our own units.
    Ours,
    /// Environmental hostiles; never trigger emergency repair targeting.
    Npc,
    /// A rival player's units.
    Rival,
}

/// Per-unit persistent memory bag. Survives across ticks for the unit's
/// lifetime; missions read and write role-specific flags here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UnitMemory {
    /// Set once the unit has registered its travel time for prespawning.
    pub prespawn_registered: bool,
    /// Raid: the unit has reached the fallback position at full health.
    pub reached_fallback: bool,
    /// Raid: this tick's chosen step lands on a demolishable structure.
    pub demolishing: bool,
    /// Raid: consecutive full-health ticks spent at a room exit.
    pub safe_count: u32,
    /// Builder: cached decay-repair target.
    pub wall_target: Option<ObjectId>,
    /// Builder: cached emergency-repair target.
    pub emergency_target: Option<ObjectId>,
    /// Boosts requested for this unit at production time.
    pub boosts: Vec<BoostKind>,
}

/// One live unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub id: ObjectId,
    pub name: String,
    /// Role tag used by role call to find the unit.
    pub role: String,
    pub faction: Faction,
    pub pos: Position,
    pub hits: u32,
    pub hits_max: u32,
    pub store: u32,
    pub store_capacity: u32,
    pub body: Vec<Part>,
    pub ticks_to_live: u32,
    pub memory: UnitMemory,
}

impl Unit {
    pub fn part_count(&self, part: Part) -> u32 {
        self.body.iter().filter(|p| **p == part).count() as u32
    }

    pub fn free_capacity(&self) -> u32 {
        self.store_capacity.saturating_sub(self.store)
    }

    pub fn has_load(&self) -> bool {
        self.store > 0
    }

    pub fn is_full_health(&self, margin: u32) -> bool {
        self.hits + margin >= self.hits_max
    }

    pub fn is_boosted(&self) -> bool {
        !self.memory.boosts.is_empty()
    }
}

/// Capability surface missions program against: position, load and
/// attribute counts, independent of how the concrete unit is stored.
pub trait AgentView {
    fn pos(&self) -> Position;
    fn stored(&self) -> u32;
    fn capacity(&self) -> u32;
    fn part_count(&self, part: Part) -> u32;
    fn hits(&self) -> u32;
    fn hits_max(&self) -> u32;
}

impl AgentView for Unit {
    fn pos(&self) -> Position {
        self.pos
    }

    fn stored(&self) -> u32 {
        self.store
    }

    fn capacity(&self) -> u32 {
        self.store_capacity
    }

    fn part_count(&self, part: Part) -> u32 {
        Unit::part_count(self, part)
    }

    fn hits(&self) -> u32 {
        self.hits
    }

    fn hits_max(&self) -> u32 {
        self.hits_max
    }
}

/// Construct a unit from a produced loadout.
pub fn assemble_unit(id: ObjectId, name: String, role: String, faction: Faction, pos: Position, body: Vec<Part>, memory: UnitMemory) -> Unit {
    let hits_max = body.len() as u32 * HITS_PER_PART;
    let store_capacity = body.iter().filter(|p| **p == Part::Carry).count() as u32 * CARRY_CAPACITY;

    Unit {
        id,
        name,
        role,
        faction,
        pos,
        hits: hits_max,
        hits_max,
        store: 0,
        store_capacity,
        body,
        ticks_to_live: UNIT_LIFETIME,
        memory,
    }
}
