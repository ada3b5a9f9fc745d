pub mod config;
pub mod error;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    BoundaryPolicy, EnergyConfig, FlockConfig, ForceConfig, LeaderConfig, MotionConfig, NeighborConfig, MAX_GRID_DIM,
    NeighborMode, OutputConfig, OutputFormat, PopulationConfig, RechargeZone, RunConfig, WorldConfig,
};
pub use error::ConfigError;
pub use sim_params::SimParams;
pub use snapshot::{AgentKind, AgentSnapshot, MetricsSnapshot};
pub use vecmath::{angle_to_vec, clamp, Vec2};
