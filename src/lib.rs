pub mod boundary;
pub mod energy;
pub mod forces;
pub mod grid;
pub mod integrator;
pub mod metrics;
pub mod simulation;
pub mod state;

pub use boundary::Boundary;
pub use grid::{CellList, Neighbor};
pub use simulation::FlockSimulation;

// Re-export the shared types so callers only need this crate
pub use flock_common::{
    AgentKind, AgentSnapshot, BoundaryPolicy, ConfigError, FlockConfig, MetricsSnapshot, NeighborMode, OutputFormat,
    RechargeZone, SimParams, Vec2, MAX_GRID_DIM,
};
