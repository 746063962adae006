use serde::{Deserialize, Serialize};

/// Tunable engine parameters.
///
/// Everything here used to be an embedded constant in one decision function
/// or another; they are grouped so that cache invalidation and hysteresis
/// behavior can be tested (and tuned) explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Probability per tick that a mission's wear ceiling resets to base.
    pub wear_ceiling_reset_probability: f64,
    /// Every this many ticks, a mission with fortification work items
    /// re-arms its wear ceiling to the base value.
    pub wear_ceiling_rearm_interval: u32,
    /// Upper bound on wear-ceiling escalation steps in a single selection.
    pub max_wear_escalations: u32,
    /// Consecutive full-health ticks required at a room exit before a raid
    /// unit advances past it.
    pub exit_safety_streak: u32,
    /// Health deficit that sends an unboosted raid unit back to fallback.
    pub retreat_threshold: u32,
    /// Health deficit that sends a boosted raid unit back to fallback.
    pub boosted_retreat_threshold: u32,
    /// Raid units fielded while a raid mission is active.
    pub raid_squad_size: usize,
    /// Assumed relay round-trip leg when the room has bulk storage.
    pub storage_relay_distance: u32,
    /// Assumed relay round-trip leg without bulk storage.
    pub no_storage_relay_distance: u32,
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig {
            wear_ceiling_reset_probability: 0.01,
            wear_ceiling_rearm_interval: 10,
            max_wear_escalations: 8,
            exit_safety_streak: 10,
            retreat_threshold: 500,
            boosted_retreat_threshold: 250,
            raid_squad_size: 2,
            storage_relay_distance: 10,
            no_storage_relay_distance: 20,
        }
    }
}

impl SimConfig {
    pub fn from_json(data: &str) -> Result<SimConfig, String> {
        serde_json::from_str(data).map_err(|e| e.to_string())
    }
}
