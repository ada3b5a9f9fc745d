use flock_common::{AgentKind, AgentSnapshot, SimParams, Vec2};

/// Holds the flock's state vectors.
#[derive(Debug)] // No Clone: copying a flock should be deliberate
pub struct FlockState {
    pub params: SimParams,
    num_agents: usize,

    // --- Ping-Pong Buffers ---
    // Current tick's input, read-only while forces are computed
    pub(crate) positions_in: Vec<Vec2>,
    pub(crate) velocities_in: Vec<Vec2>,
    pub(crate) energy_in: Vec<f32>,
    // Current tick's output, next tick's input
    pub(crate) positions_out: Vec<Vec2>,
    pub(crate) velocities_out: Vec<Vec2>,
    pub(crate) energy_out: Vec<f32>,

    // --- Per-tick scratch (overwritten every step) ---
    pub(crate) accelerations: Vec<Vec2>,
    pub(crate) noise: Vec<Vec2>,

    // --- Fixed at construction ---
    kinds: Vec<AgentKind>,
    /// Index of the single leader; never reassigned.
    leader: Option<usize>,
}

impl FlockState {
    /// Takes ownership of the initial agent arrays and allocates the output and scratch buffers.
    pub fn new(
        positions: Vec<Vec2>,
        velocities: Vec<Vec2>,
        energy: Vec<f32>,
        kinds: Vec<AgentKind>,
        leader: Option<usize>,
        params: SimParams,
    ) -> Self {
        let num_agents = positions.len();
        debug_assert_eq!(velocities.len(), num_agents);
        debug_assert_eq!(energy.len(), num_agents);
        debug_assert_eq!(kinds.len(), num_agents);
        debug_assert!(leader.map_or(true, |l| l < num_agents));

        Self {
            params,
            num_agents,
            positions_out: positions.clone(),
            velocities_out: velocities.clone(),
            energy_out: energy.clone(),
            positions_in: positions,
            velocities_in: velocities,
            energy_in: energy,
            accelerations: vec![Vec2::zero(); num_agents],
            noise: vec![Vec2::zero(); num_agents],
            kinds,
            leader,
        }
    }

    /// Swaps the input and output buffers; the freshly written state becomes current.
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.positions_in, &mut self.positions_out);
        std::mem::swap(&mut self.velocities_in, &mut self.velocities_out);
        std::mem::swap(&mut self.energy_in, &mut self.energy_out);
    }

    pub fn num_agents(&self) -> usize {
        self.num_agents
    }

    pub fn leader(&self) -> Option<usize> {
        self.leader
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions_in
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities_in
    }

    pub fn energy(&self) -> &[f32] {
        &self.energy_in
    }

    pub fn snapshot(&self, idx: usize) -> AgentSnapshot {
        AgentSnapshot {
            position: self.positions_in[idx],
            velocity: self.velocities_in[idx],
            kind: self.kinds[idx],
            is_leader: self.leader == Some(idx),
            energy: self.energy_in[idx],
        }
    }

    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        (0..self.num_agents).map(|idx| self.snapshot(idx)).collect()
    }
}
