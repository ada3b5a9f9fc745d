use crate::vecmath::Vec2;
use serde::{Deserialize, Serialize};

/// Closed set of agent categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    A,
    B,
    C,
}

/// Read-only view of one agent, handed to renderers once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub kind: AgentKind,
    pub is_leader: bool,
    /// Always 1.0 when the energy model is disabled.
    pub energy: f32,
}

/// Aggregate metrics recorded at a specific tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    /// Simulation time (tick * dt).
    pub time: f32,
    pub polarization: f32,
    pub mean_speed: f32,
    pub mean_nearest_neighbor_distance: f32,
    /// Mean energy over non-leader agents; present only with the energy model on.
    // Absent values are written as null: bincode output has no field names to skip by.
    pub mean_energy: Option<f32>,
    pub agents: Option<Vec<AgentSnapshot>>,
}
