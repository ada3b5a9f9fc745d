use crate::error::ConfigError;
use crate::sim_params::SimParams;
use crate::vecmath::{Vec2, NORMALIZE_EPSILON_SQ};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Slack allowed when checking that kind fractions sum to at most 1,
/// so that e.g. `[0.7, 0.3]` is not rejected over float rounding.
const FRACTION_SUM_TOLERANCE: f32 = 1e-6;

/// Upper bound on grid cells per axis; larger worlds get wider cells.
pub const MAX_GRID_DIM: u32 = 1024;

/// Cells are padded by a few ulps of the world length to absorb rounding
/// in the position-to-cell lookup.
const CELL_ROUNDING_SLACK: f32 = 8.0 * f32::EPSILON;

/// Number of cells along one axis of length `length`.
/// Every cell is at least `max(neighbor_radius, 1)` wide.
fn grid_dim(length: f32, neighbor_radius: f32) -> u32 {
    let min_cell = neighbor_radius.max(1.0) + length * CELL_ROUNDING_SLACK;
    let mut dim = ((length / min_cell).floor() as u32).clamp(1, MAX_GRID_DIM);
    // The float quotient can round up onto the next integer.
    while dim > 1 && length / (dim as f32) < min_cell {
        dim -= 1;
    }
    dim
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Opposite edges are identified; positions wrap around.
    Toroidal,
    /// Agents bounce off the edges.
    Reflective,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeighborMode {
    /// Uniform-grid cell list, 3x3 block scan.
    Indexed,
    /// Exhaustive scan over every agent.
    BruteForce,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Bincode,
    Messagepack,
}

// World geometry
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub boundary: BoundaryPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            width: 160.0,
            height: 100.0,
            boundary: BoundaryPolicy::Toroidal,
        }
    }
}

// Population size, seed and kind mix
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PopulationConfig {
    pub count: u32,
    pub seed: u64,
    /// Fractions of kinds A and B; kind C receives the remainder.
    pub kind_fractions: [f32; 2],
}

impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            count: 60,
            seed: 1,
            kind_fractions: [0.4, 0.3],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct MotionConfig {
    pub max_speed: f32,
    pub dt: f32,
    /// Amplitude of the per-axis uniform noise added to every acceleration.
    pub noise: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            max_speed: 2.0,
            dt: 1.0,
            noise: 0.05,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ForceConfig {
    pub neighbor_radius: f32,
    pub separation_weight: f32,
    pub cohesion_weight: f32,
    pub alignment_weight: f32,
    pub separation_distance: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        ForceConfig {
            neighbor_radius: 12.0,
            separation_weight: 1.2,
            cohesion_weight: 0.8,
            alignment_weight: 0.9,
            separation_distance: 3.5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct NeighborConfig {
    pub mode: NeighborMode,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        NeighborConfig { mode: NeighborMode::Indexed }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct LeaderConfig {
    pub enabled: bool,
    /// Heading the leader steers toward; normalized when params are derived.
    pub direction: [f32; 2],
    /// Pull of every follower's alignment toward the leader's velocity.
    pub influence: f32,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        LeaderConfig {
            enabled: false,
            direction: [1.0, 0.0],
            influence: 0.6,
        }
    }
}

/// A fixed circular region that replenishes energy while occupied.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct RechargeZone {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Energy gained per unit time inside the zone.
    pub rate: f32,
}

impl RechargeZone {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct EnergyConfig {
    pub enabled: bool,
    /// Depletion cost per unit speed and time.
    pub cost: f32,
    pub recharge_zones: Vec<RechargeZone>,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        EnergyConfig {
            enabled: false,
            cost: 0.01,
            recharge_zones: Vec::new(),
        }
    }
}

// Settings for the headless runner; the simulation core ignores these.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RunConfig {
    pub ticks: u64,
    pub record_interval: u64,
    pub include_agents_in_snapshots: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            ticks: 1000,
            record_interval: 10,
            include_agents_in_snapshots: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub base_filename: String,
    pub format: OutputFormat,
    pub save_metrics: bool,
    pub save_final_agents: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: "flock".to_string(),
            format: OutputFormat::Json,
            save_metrics: true,
            save_final_agents: false,
        }
    }
}

/// Main simulation configuration, loaded from config.toml.
/// Every section may be omitted and falls back to its defaults.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct FlockConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub forces: ForceConfig,
    #[serde(default)]
    pub neighbors: NeighborConfig,
    #[serde(default)]
    pub leader: LeaderConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl FlockConfig {
    /// Loads and validates the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: FlockConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every construction-time constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        if !(world.width > 0.0 && world.width.is_finite())
            || !(world.height > 0.0 && world.height.is_finite())
        {
            return Err(ConfigError::NonPositiveWorld {
                width: world.width,
                height: world.height,
            });
        }

        if self.population.count == 0 {
            return Err(ConfigError::NoAgents);
        }

        for (index, &value) in self.population.kind_fractions.iter().enumerate() {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidFraction { index, value });
            }
        }
        let sum: f32 = self.population.kind_fractions.iter().sum();
        if sum > 1.0 + FRACTION_SUM_TOLERANCE {
            return Err(ConfigError::FractionsExceedOne { sum });
        }

        if !(self.motion.dt > 0.0 && self.motion.dt.is_finite()) {
            return Err(ConfigError::NonPositiveTimeStep(self.motion.dt));
        }

        let non_negative = [
            ("max_speed", self.motion.max_speed),
            ("noise", self.motion.noise),
            ("neighbor_radius", self.forces.neighbor_radius),
            ("separation_distance", self.forces.separation_distance),
            ("energy cost", self.energy.cost),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        let finite = [
            ("separation_weight", self.forces.separation_weight),
            ("cohesion_weight", self.forces.cohesion_weight),
            ("alignment_weight", self.forces.alignment_weight),
            ("leader influence", self.leader.influence),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteParameter { name, value });
            }
        }

        if self.leader.enabled {
            let [dx, dy] = self.leader.direction;
            let dir = Vec2::new(dx, dy);
            if !(dx.is_finite() && dy.is_finite()) || dir.length_squared() <= NORMALIZE_EPSILON_SQ {
                return Err(ConfigError::ZeroLeaderDirection);
            }
        }

        for (index, zone) in self.energy.recharge_zones.iter().enumerate() {
            if !(zone.x.is_finite() && zone.y.is_finite() && zone.rate.is_finite()) {
                return Err(ConfigError::InvalidRechargeZone { index, reason: "non-finite center or rate" });
            }
            if !(zone.radius >= 0.0 && zone.radius.is_finite()) {
                return Err(ConfigError::InvalidRechargeZone { index, reason: "radius must be non-negative" });
            }
        }

        Ok(())
    }

    /// Converts the configuration into the parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let world_width = self.world.width;
        let world_height = self.world.height;

        // Grid parameters: cells are never narrower than the neighbor radius,
        // so a 3x3 block always covers the query disc.
        let grid_dim_x = grid_dim(world_width, self.forces.neighbor_radius);
        let grid_dim_y = grid_dim(world_height, self.forces.neighbor_radius);
        let cell_width = world_width / grid_dim_x as f32;
        let cell_height = world_height / grid_dim_y as f32;

        let [dx, dy] = self.leader.direction;
        let leader_direction = Vec2::new(dx, dy).normalize_or_zero();

        let [fraction_a, fraction_b] = self.population.kind_fractions;

        SimParams {
            // World & Grid
            world_width,
            world_height,
            boundary: self.world.boundary,
            grid_dim_x,
            grid_dim_y,
            num_grid_cells: grid_dim_x * grid_dim_y,
            cell_width,
            cell_height,
            inv_cell_width: 1.0 / cell_width,
            inv_cell_height: 1.0 / cell_height,
            // Population
            num_agents: self.population.count,
            seed: self.population.seed,
            fraction_a,
            fraction_b,
            // Motion
            dt: self.motion.dt,
            max_speed: self.motion.max_speed,
            noise: self.motion.noise,
            // Forces
            neighbor_radius: self.forces.neighbor_radius,
            neighbor_radius_sq: self.forces.neighbor_radius * self.forces.neighbor_radius,
            separation_distance: self.forces.separation_distance,
            w_sep: self.forces.separation_weight,
            w_coh: self.forces.cohesion_weight,
            w_align: self.forces.alignment_weight,
            neighbor_mode: self.neighbors.mode,
            // Leader
            leader_enabled: self.leader.enabled,
            leader_direction,
            leader_influence: self.leader.influence,
            // Energy
            energy_enabled: self.energy.enabled,
            energy_cost: self.energy.cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = FlockConfig::from_toml_str("").expect("defaults are valid");
        assert_eq!(config.world.width, 160.0);
        assert_eq!(config.population.count, 60);
        assert_eq!(config.world.boundary, BoundaryPolicy::Toroidal);
        assert_eq!(config.neighbors.mode, NeighborMode::Indexed);
        assert!(!config.leader.enabled);
        assert!(!config.energy.enabled);
    }

    #[test]
    fn parses_full_document() {
        let text = r#"
            [world]
            width = 200.0
            height = 120.0
            boundary = "reflective"

            [population]
            count = 25
            seed = 7
            kind_fractions = [0.5, 0.5]

            [neighbors]
            mode = "brute_force"

            [leader]
            enabled = true
            direction = [0.0, 2.0]
            influence = 0.3

            [energy]
            enabled = true
            cost = 0.05

            [[energy.recharge_zones]]
            x = 100.0
            y = 60.0
            radius = 40.0
            rate = 0.05

            [output]
            format = "messagepack"
        "#;
        let config = FlockConfig::from_toml_str(text).expect("valid config");
        assert_eq!(config.world.boundary, BoundaryPolicy::Reflective);
        assert_eq!(config.neighbors.mode, NeighborMode::BruteForce);
        assert_eq!(config.energy.recharge_zones.len(), 1);
        assert_eq!(config.output.format, OutputFormat::Messagepack);
        // Untouched sections keep their defaults.
        assert_eq!(config.motion.max_speed, 2.0);

        let params = config.get_sim_params();
        assert_eq!(params.leader_direction, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn rejects_non_positive_world() {
        let mut config = FlockConfig::default();
        config.world.width = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveWorld { .. })));

        let mut config = FlockConfig::default();
        config.world.height = -5.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveWorld { .. })));
    }

    #[test]
    fn rejects_zero_agents() {
        let mut config = FlockConfig::default();
        config.population.count = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoAgents));
    }

    #[test]
    fn rejects_fractions_above_one() {
        let mut config = FlockConfig::default();
        config.population.kind_fractions = [0.8, 0.3];
        assert!(matches!(config.validate(), Err(ConfigError::FractionsExceedOne { .. })));

        config.population.kind_fractions = [0.7, 0.3];
        assert!(config.validate().is_ok());

        config.population.kind_fractions = [-0.1, 0.3];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFraction { index: 0, .. })));
    }

    #[test]
    fn rejects_bad_scalars() {
        let mut config = FlockConfig::default();
        config.motion.dt = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveTimeStep(_))));

        let mut config = FlockConfig::default();
        config.motion.max_speed = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "max_speed", .. })
        ));

        let mut config = FlockConfig::default();
        config.forces.cohesion_weight = f32::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::NonFiniteParameter { .. })));
    }

    #[test]
    fn rejects_zero_leader_direction_only_when_enabled() {
        let mut config = FlockConfig::default();
        config.leader.direction = [0.0, 0.0];
        assert!(config.validate().is_ok());
        config.leader.enabled = true;
        assert_eq!(config.validate(), Err(ConfigError::ZeroLeaderDirection));
    }

    #[test]
    fn rejects_negative_zone_radius() {
        let mut config = FlockConfig::default();
        config.energy.recharge_zones.push(RechargeZone { x: 1.0, y: 1.0, radius: -2.0, rate: 0.1 });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRechargeZone { index: 0, .. })
        ));
    }

    #[test]
    fn grid_cells_never_smaller_than_radius() {
        let mut config = FlockConfig::default();
        config.world.width = 100.0;
        config.world.height = 30.0;
        config.forces.neighbor_radius = 12.0;
        let params = config.get_sim_params();
        assert_eq!(params.grid_dim_x, 8);
        assert_eq!(params.grid_dim_y, 2);
        assert!(params.cell_width >= 12.0);
        assert!(params.cell_height >= 12.0);

        // A radius larger than the world collapses to a single cell.
        config.forces.neighbor_radius = 500.0;
        let params = config.get_sim_params();
        assert_eq!(params.num_grid_cells, 1);
    }

    #[test]
    fn grid_cells_cover_radius_when_quotient_rounds_up() {
        let mut config = FlockConfig::default();
        config.world.width = 17.6725;
        config.world.height = 17.6725;
        config.forces.neighbor_radius = 3.5345;
        let params = config.get_sim_params();
        assert!(params.cell_width >= 3.5345, "cell_width = {}", params.cell_width);
        assert!(params.cell_height >= 3.5345);

        // Sweep worlds that are whole multiples of the radius.
        for k in 6..200u32 {
            let radius = 0.37 + k as f32 * 0.113;
            config.forces.neighbor_radius = radius;
            config.world.width = radius * k as f32;
            config.world.height = radius * (k + 1) as f32;
            let params = config.get_sim_params();
            assert!(params.cell_width >= radius.max(1.0), "k = {}", k);
            assert!(params.cell_height >= radius.max(1.0), "k = {}", k);
        }
    }

    #[test]
    fn huge_world_keeps_grid_bounded() {
        let mut config = FlockConfig::default();
        config.world.width = 1e6;
        config.world.height = 1e6;
        let params = config.get_sim_params();
        assert_eq!(params.grid_dim_x, MAX_GRID_DIM);
        assert_eq!(params.grid_dim_y, MAX_GRID_DIM);
        assert_eq!(params.num_grid_cells, MAX_GRID_DIM * MAX_GRID_DIM);
        assert!(params.cell_width >= 12.0);
    }
}
