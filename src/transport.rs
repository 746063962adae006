//! Relay transport analysis.
//!
//! Sizes the relay fleet needed to keep a producer supplied: total carry
//! capacity follows from the producer's draw rate and the round trip back
//! to bulk storage, relay count from how much carry a single relay body can
//! afford under the production budget.

use crate::constants::{CARRY_CAPACITY, MAX_UNIT_SIZE};
use crate::world::Part;
use serde::{Deserialize, Serialize};

/// Derived relay requirements. Replaced wholesale on recompute, never
/// mutated in place.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TransportAnalysis {
    /// Relay agents required.
    pub carts_needed: u32,
    /// Carry parts per relay.
    pub carry_count: u32,
    /// Move parts per relay.
    pub move_count: u32,
}

impl TransportAnalysis {
    pub fn loadout(&self) -> Vec<Part> {
        crate::loadout::worker_loadout(0, self.carry_count, self.move_count)
    }
}

/// Size relays for a producer drawing `load_per_tick` resource with the
/// given one-way `distance` to the refill point, under a per-unit `budget`.
pub fn analyze_transport(distance: u32, load_per_tick: u32, budget: u32) -> TransportAnalysis {
    // Capacity in flight must cover the full round trip.
    let carry_needed = (load_per_tick * distance * 2).div_ceil(CARRY_CAPACITY);

    // A relay is 2 carry : 1 move; the largest affordable one wins.
    let carry_set_cost = 2 * Part::Carry.cost() + Part::Move.cost();
    let max_carry_by_budget = (budget / carry_set_cost) * 2;
    let max_carry_by_size = (MAX_UNIT_SIZE as u32 * 2) / 3;

    let carry_count = max_carry_by_budget.min(max_carry_by_size).max(1).min(carry_needed.max(1));
    let move_count = carry_count.div_ceil(2);

    let carts_needed = carry_needed.div_ceil(carry_count);

    TransportAnalysis {
        carts_needed,
        carry_count,
        move_count,
    }
}
