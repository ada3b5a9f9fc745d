use crate::config::{BoundaryPolicy, NeighborMode};
use crate::vecmath::Vec2;
use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // World & Grid
    pub world_width: f32,
    pub world_height: f32,
    pub boundary: BoundaryPolicy,
    pub grid_dim_x: u32,
    pub grid_dim_y: u32,
    pub num_grid_cells: u32,
    pub cell_width: f32, // >= neighbor_radius
    pub cell_height: f32,
    pub inv_cell_width: f32,
    pub inv_cell_height: f32,

    // Population
    pub num_agents: u32,
    pub seed: u64,
    pub fraction_a: f32,
    pub fraction_b: f32,

    // Motion
    pub dt: f32,
    pub max_speed: f32,
    pub noise: f32,

    // Forces
    pub neighbor_radius: f32,
    pub neighbor_radius_sq: f32,
    pub separation_distance: f32,
    pub w_sep: f32,
    pub w_coh: f32,
    pub w_align: f32,
    pub neighbor_mode: NeighborMode,

    // Leader
    pub leader_enabled: bool,
    pub leader_direction: Vec2, // unit length
    pub leader_influence: f32,

    // Energy
    pub energy_enabled: bool,
    pub energy_cost: f32,
}
