//! Fixed simulation constants. Tunable behavior lives in [`crate::config`].

/// Side length of a room grid.
pub const ROOM_SIZE: u8 = 50;

/// Hard ceiling on the number of parts in a single unit loadout.
pub const MAX_UNIT_SIZE: usize = 50;

/// Hit points contributed by each body part.
pub const HITS_PER_PART: u32 = 100;

/// Carry capacity contributed by each carry part.
pub const CARRY_CAPACITY: u32 = 50;

/// Lifetime of a freshly produced unit, in ticks.
pub const UNIT_LIFETIME: u32 = 1500;

/// Ticks of production time per body part.
pub const SPAWN_TIME_PER_PART: u32 = 3;

/// Construction progress per work part per build action.
pub const BUILD_POWER: u32 = 5;

/// Wear restored per work part per repair action.
pub const REPAIR_POWER: u32 = 100;

/// Energy drawn per work part per harvest action.
pub const HARVEST_POWER: u32 = 2;

/// Damage per attack part per melee attack.
pub const ATTACK_POWER: u32 = 30;

/// Structure damage per work part per dismantle action.
pub const DISMANTLE_POWER: u32 = 50;

/// Healing per heal part per heal action.
pub const HEAL_POWER: u32 = 12;

/// Boosted heal effectiveness multiplier.
pub const BOOST_HEAL_MULTIPLIER: u32 = 4;

/// Ranged mass attack damage per ranged part, by range 1/2/3.
pub const MASS_ATTACK_POWER: [u32; 3] = [10, 4, 1];

/// Interaction range for build/repair/upgrade and ranged actions.
pub const INTERACT_RANGE: u32 = 3;

/// Storage reserve below which builder potency stays at its floor.
pub const POTENCY_RESERVE_FLOOR: u32 = 50_000;

/// Energy reserve backing one point of builder potency.
pub const ENERGY_PER_POTENCY: u32 = 7_500;

/// Maximum builder potency regardless of reserve size.
pub const MAX_POTENCY: u32 = 10;

/// Energy consumed per tick by one point of builder potency.
pub const POTENCY_DRAW: u32 = 5;

/// Base wear ceiling for fortification repair targeting.
pub const BASE_WEAR_CEILING: u32 = 2_000;

/// A freshly built fortification is repaired up to this wear before being
/// released back into normal target selection.
pub const FRESH_FORTIFICATION_WEAR: u32 = 10_000;

/// Tower damage by range: full up to range 5, linear falloff to the minimum
/// at range 20.
pub const TOWER_DAMAGE_MAX: u32 = 600;
pub const TOWER_DAMAGE_MIN: u32 = 150;
pub const TOWER_FALLOFF_START: u32 = 5;
pub const TOWER_FALLOFF_END: u32 = 20;

/// Expected damage above which a raid loadout is worth boosting.
pub const BOOST_DAMAGE_THRESHOLD: u32 = 480;
