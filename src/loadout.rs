//! Budget-constrained loadout synthesis.
//!
//! Two styles live here: the compositional `LoadoutDefinition` (fixed
//! pre/post sections around a repeated section, grown until budget or the
//! size cap runs out) used by combat roles, and the worker/relay formulas
//! that solve directly for part counts from potency and budget. All of it
//! is pure: no live unit state is consulted.

use crate::constants::{BOOST_DAMAGE_THRESHOLD, HEAL_POWER, MAX_UNIT_SIZE};
use crate::world::Part;

/// A body template: fixed head and tail around a repeated section.
pub struct LoadoutDefinition<'a> {
    pub maximum_budget: u32,
    pub minimum_repeat: Option<usize>,
    pub maximum_repeat: Option<usize>,
    pub pre_body: &'a [Part],
    pub repeat_body: &'a [Part],
    pub post_body: &'a [Part],
}

pub fn loadout_cost(body: &[Part]) -> u32 {
    body.iter().map(|p| p.cost()).sum()
}

/// Expand a definition into a concrete body, repeating the middle section
/// as many times as budget and the global size cap allow.
pub fn create_loadout(definition: &LoadoutDefinition) -> Result<Vec<Part>, String> {
    let pre_body_cost = loadout_cost(definition.pre_body);
    let post_body_cost = loadout_cost(definition.post_body);

    let fixed_body_cost = pre_body_cost + post_body_cost;

    if fixed_body_cost > definition.maximum_budget {
        return Err("Fixed sections exceed budget".to_owned());
    }

    let fixed_body_length = definition.pre_body.len() + definition.post_body.len();

    if fixed_body_length > MAX_UNIT_SIZE {
        return Err("Fixed sections exceed unit size cap".to_owned());
    }

    let repeat_body_cost = loadout_cost(definition.repeat_body);
    let remaining_budget = definition.maximum_budget - fixed_body_cost;

    let max_repeat_by_cost = if repeat_body_cost > 0 {
        (remaining_budget / repeat_body_cost) as usize
    } else {
        0
    };

    let max_repeat_by_length = if !definition.repeat_body.is_empty() {
        (MAX_UNIT_SIZE - fixed_body_length) / definition.repeat_body.len()
    } else {
        0
    };

    let max_repeat = max_repeat_by_cost.min(max_repeat_by_length);

    if let Some(min_repeat) = definition.minimum_repeat {
        if max_repeat < min_repeat {
            return Err("Budget cannot satisfy minimum repeat count".to_owned());
        }
    }

    let repeat = max_repeat.clamp(definition.minimum_repeat.unwrap_or(0), definition.maximum_repeat.unwrap_or(usize::MAX));

    let full_repeat_body = definition.repeat_body.iter().cycle().take(repeat * definition.repeat_body.len());

    let body = definition
        .pre_body
        .iter()
        .chain(full_repeat_body)
        .chain(definition.post_body.iter())
        .cloned()
        .collect::<Vec<Part>>();

    Ok(body)
}

/// Flat worker body: work parts, then carry, then move.
pub fn worker_loadout(work: u32, carry: u32, move_parts: u32) -> Vec<Part> {
    let (work, carry, move_parts) = cap_to_unit_size(work, carry, move_parts);

    let mut body = Vec::with_capacity((work + carry + move_parts) as usize);

    body.extend(std::iter::repeat(Part::Work).take(work as usize));
    body.extend(std::iter::repeat(Part::Carry).take(carry as usize));
    body.extend(std::iter::repeat(Part::Move).take(move_parts as usize));

    body
}

/// Scale part counts down proportionally until the total fits the unit
/// size cap, keeping at least one move part for mobility.
fn cap_to_unit_size(work: u32, carry: u32, move_parts: u32) -> (u32, u32, u32) {
    let total = work + carry + move_parts;

    if total as usize <= MAX_UNIT_SIZE {
        return (work, carry, move_parts);
    }

    let scale = MAX_UNIT_SIZE as f64 / total as f64;
    let work = (work as f64 * scale).floor() as u32;
    let carry = (carry as f64 * scale).floor() as u32;
    let move_parts = ((move_parts as f64 * scale).floor() as u32).max(1);

    (work, carry, move_parts)
}

/// Ratio template scaled to budget: the ratio set is repeated as many times
/// as the budget affords, subject to the size cap.
pub fn ratio_loadout(budget: u32, work_ratio: u32, carry_ratio: u32, move_ratio_halves: u32) -> Vec<Part> {
    // Ratios are expressed with move in half-units so a 1:3:0.5 template
    // stays integral: two repeats share one move part.
    let set_cost = work_ratio * Part::Work.cost() + carry_ratio * Part::Carry.cost() + (move_ratio_halves * Part::Move.cost()).div_ceil(2);

    if set_cost == 0 {
        return Vec::new();
    }

    let repeats = (budget / set_cost).max(1);

    let work = work_ratio * repeats;
    let carry = carry_ratio * repeats;
    let move_parts = (move_ratio_halves * repeats).div_ceil(2).max(1);

    worker_loadout(work, carry, move_parts)
}

/// Builder loadout for a given potency and budget (§ population sizing).
///
/// Below the small-budget threshold the fixed 1 work : 3 carry : 0.5 move
/// template applies. Otherwise energy is reserved for `potency` work parts
/// plus their share of move, the leftover buys carry capped at what the
/// relay subsystem hauls, and mobility depends on whether relays ferry
/// materials locally.
pub fn builder_loadout(potency: u32, budget: u32, relay_carry_count: u32, local_relays: bool) -> Vec<Part> {
    const SMALL_BUDGET: u32 = 550;

    if budget < SMALL_BUDGET {
        return ratio_loadout(budget, 1, 3, 1);
    }

    let potency_cost = potency * Part::Work.cost() + potency.div_ceil(2) * Part::Move.cost();
    let budget_for_carry = budget.saturating_sub(potency_cost);
    let carry = (budget_for_carry / Part::Carry.cost()).min(relay_carry_count);

    let move_parts = if local_relays { potency.div_ceil(2) } else { potency };

    worker_loadout(potency, carry, move_parts)
}

/// Raid loadout sized against expected incoming damage.
pub fn raider_loadout(expected_damage: u32, boosted: bool) -> Vec<Part> {
    if expected_damage == 0 {
        return assault_body(10, 0, 0, 0, 10);
    }

    if boosted {
        // Boosted heal and tough parts carry more weight, so most of the
        // frame goes to work.
        let heal = (expected_damage * 3 / 10).div_ceil(HEAL_POWER * 4);
        let move_parts = 10;
        let ranged = 1;
        let tough = 8;
        let work = (MAX_UNIT_SIZE as u32).saturating_sub(move_parts + ranged + tough + heal);

        assault_body(work, tough, ranged, heal, move_parts)
    } else {
        let heal = expected_damage.div_ceil(HEAL_POWER);
        // Move once every other tick.
        let move_parts = 17;
        let work = (MAX_UNIT_SIZE as u32).saturating_sub(heal + move_parts);

        assault_body(work, 0, 0, heal, move_parts)
    }
}

fn assault_body(work: u32, tough: u32, ranged: u32, heal: u32, move_parts: u32) -> Vec<Part> {
    let mut body = Vec::new();

    body.extend(std::iter::repeat(Part::Tough).take(tough as usize));
    body.extend(std::iter::repeat(Part::Work).take(work as usize));
    body.extend(std::iter::repeat(Part::RangedAttack).take(ranged as usize));
    body.extend(std::iter::repeat(Part::Move).take(move_parts as usize));
    body.extend(std::iter::repeat(Part::Heal).take(heal as usize));

    body.truncate(MAX_UNIT_SIZE);

    body
}

/// Whether a raid against this much expected damage should request boosts.
pub fn should_boost(expected_damage: u32) -> bool {
    expected_damage > BOOST_DAMAGE_THRESHOLD
}
