pub mod costgrid;
pub mod movement;

pub use costgrid::{build_raid_cost_grid, CostGrid, COST_BLOCKED};
pub use movement::{idle_off_road, travel_to, yield_road, TravelOptions, TravelOutcome};
