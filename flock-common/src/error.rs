use thiserror::Error;

/// Errors raised while validating a [`FlockConfig`](crate::FlockConfig).
///
/// Validation runs before any agent is created; a simulation that was
/// constructed successfully never produces one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("world dimensions must be positive and finite (got {width} x {height})")]
    NonPositiveWorld { width: f32, height: f32 },

    #[error("agent count must be greater than 0")]
    NoAgents,

    #[error("kind fractions must sum to at most 1 (got {sum})")]
    FractionsExceedOne { sum: f32 },

    #[error("kind fraction {index} must be non-negative and finite (got {value})")]
    InvalidFraction { index: usize, value: f32 },

    /// A scalar parameter that must be a non-negative finite number.
    #[error("{name} must be non-negative and finite (got {value})")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("{name} must be finite (got {value})")]
    NonFiniteParameter { name: &'static str, value: f32 },

    #[error("time step must be positive and finite (got {0})")]
    NonPositiveTimeStep(f32),

    #[error("leader direction must be non-zero when the leader is enabled")]
    ZeroLeaderDirection,

    #[error("recharge zone {index} is invalid: {reason}")]
    InvalidRechargeZone { index: usize, reason: &'static str },

    // Raised only when a flock is built from explicit agents.
    #[error("expected {expected} agents, got {actual}")]
    AgentCountMismatch { expected: u32, actual: usize },

    #[error("expected {expected} leader(s), got {actual}")]
    LeaderCount { expected: usize, actual: usize },

    #[error("agent {index} is invalid: {reason}")]
    InvalidAgent { index: usize, reason: &'static str },
}
