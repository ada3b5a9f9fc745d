use crate::boundary::Boundary;
use crate::energy::EnergyModel;
use crate::forces::{compute_accelerations, sample_noise};
use crate::grid::{CellList, Neighbor, NeighborSearch};
use crate::integrator::integrate;
use crate::metrics;
use crate::state::FlockState;
use flock_common::{
    angle_to_vec, AgentKind, AgentSnapshot, BoundaryPolicy, ConfigError, FlockConfig, MetricsSnapshot, NeighborMode,
    RechargeZone, SimParams, Vec2,
};
use log::{debug, info, trace};
use rand::prelude::*;

/// Manages the state and execution of the flocking simulation.
///
/// The instance owns its agents, world, recharge zones and random generator.
/// Callers construct it, advance it with [`step`](Self::step) and read it back
/// through snapshots and metric queries; nothing else mutates it.
pub struct FlockSimulation {
    /// The configuration the flock was built from.
    config: FlockConfig,
    /// Agent state vectors plus derived parameters.
    state: FlockState,
    boundary: Boundary,
    /// Cell list reused across ticks; only rebuilt in indexed mode.
    grid: CellList,
    /// Present only when the energy model is enabled.
    energy_model: Option<EnergyModel>,
    /// Seeded from the config; the only source of randomness.
    rng: StdRng,
    current_tick: u64,
    recorded_snapshots: Vec<MetricsSnapshot>,
}

/// Agents laid out at construction, before they are moved into the state.
struct InitialAgents {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    kinds: Vec<AgentKind>,
    leader: Option<usize>,
}

impl FlockSimulation {
    /// Validates the configuration and places a randomized flock.
    pub fn new(config: FlockConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.get_sim_params();
        let boundary = Boundary::from_params(&params);

        let mut rng = StdRng::seed_from_u64(params.seed);
        let initial = place_initial_agents(&params, &boundary, &mut rng);
        let energy = vec![1.0; initial.positions.len()];

        Ok(Self::assemble(config, params, initial, energy, rng))
    }

    /// Builds a flock from explicit agents instead of random placement.
    ///
    /// The agent count must match the config, and exactly one agent must be
    /// flagged as leader when the leader is enabled (none otherwise). Velocities
    /// above the maximum speed are clamped. The RNG is still seeded from the
    /// config, so noise stays reproducible.
    pub fn from_agents(config: FlockConfig, agents: &[AgentSnapshot]) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.get_sim_params();
        let boundary = Boundary::from_params(&params);

        if agents.len() != params.num_agents as usize {
            return Err(ConfigError::AgentCountMismatch {
                expected: params.num_agents,
                actual: agents.len(),
            });
        }

        let leaders: Vec<usize> = agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_leader)
            .map(|(i, _)| i)
            .collect();
        let expected_leaders = usize::from(params.leader_enabled);
        if leaders.len() != expected_leaders {
            return Err(ConfigError::LeaderCount {
                expected: expected_leaders,
                actual: leaders.len(),
            });
        }

        for (index, agent) in agents.iter().enumerate() {
            check_agent(index, agent, &boundary)?;
        }

        let initial = InitialAgents {
            positions: agents.iter().map(|a| a.position).collect(),
            velocities: agents.iter().map(|a| a.velocity.clamp_length(params.max_speed)).collect(),
            kinds: agents.iter().map(|a| a.kind).collect(),
            leader: leaders.first().copied(),
        };
        let energy = agents.iter().map(|a| a.energy).collect();
        let rng = StdRng::seed_from_u64(params.seed);

        Ok(Self::assemble(config, params, initial, energy, rng))
    }

    fn assemble(config: FlockConfig, params: SimParams, initial: InitialAgents, energy: Vec<f32>, rng: StdRng) -> Self {
        let boundary = Boundary::from_params(&params);
        let grid = CellList::new(&params);
        let energy_model = params
            .energy_enabled
            .then(|| EnergyModel::new(params.energy_cost, config.energy.recharge_zones.clone()));

        info!(
            "Initialized flock: {} agents in {}x{} world ({:?}), {}x{} grid, {:?} neighbor search, leader: {:?}, energy model: {}",
            initial.positions.len(),
            params.world_width,
            params.world_height,
            params.boundary,
            params.grid_dim_x,
            params.grid_dim_y,
            params.neighbor_mode,
            initial.leader,
            params.energy_enabled,
        );

        let state = FlockState::new(
            initial.positions,
            initial.velocities,
            energy,
            initial.kinds,
            initial.leader,
            params,
        );

        Self {
            config,
            state,
            boundary,
            grid,
            energy_model,
            rng,
            current_tick: 0,
            recorded_snapshots: Vec::new(),
        }
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) {
        let mode = self.state.params.neighbor_mode;
        let leader = self.state.leader();

        // --- 1. Build Spatial Grid ---
        if mode == NeighborMode::Indexed {
            self.grid.rebuild(&self.state.positions_in);
        }

        // --- 2. Draw Noise (Serial, index order, owned RNG) ---
        let noise_amplitude = self.state.params.noise;
        for noise_out in self.state.noise.iter_mut() {
            *noise_out = sample_noise(&mut self.rng, noise_amplitude);
        }

        // --- 3. Compute Accelerations (Parallel, frozen snapshot) ---
        let search = match mode {
            NeighborMode::Indexed => NeighborSearch::Indexed(&self.grid),
            NeighborMode::BruteForce => NeighborSearch::BruteForce,
        };
        let state = &mut self.state;
        compute_accelerations(
            &mut state.accelerations,
            &state.positions_in,
            &state.velocities_in,
            &state.noise,
            leader,
            search,
            &self.boundary,
            &state.params,
        );

        // --- 4. Integrate, Boundary, Energy (Serial commit into _out buffers) ---
        self.commit(leader);

        // --- Swap Buffers: Output becomes Input for next tick ---
        self.state.swap_buffers();

        self.current_tick += 1;
        trace!("Tick {} complete", self.current_tick);
    }

    fn commit(&mut self, leader: Option<usize>) {
        let dt = self.state.params.dt;
        let max_speed = self.state.params.max_speed;
        let state = &mut self.state;

        for idx in 0..state.num_agents() {
            let (position, mut velocity) = integrate(
                state.positions_in[idx],
                state.velocities_in[idx],
                state.accelerations[idx],
                dt,
                max_speed,
                &self.boundary,
            );

            let mut energy = state.energy_in[idx];
            if let Some(model) = &self.energy_model {
                if leader != Some(idx) {
                    // The rescaled velocity only takes effect next tick.
                    (energy, velocity) = model.update(energy, position, velocity, dt, &self.boundary);
                }
            }

            state.positions_out[idx] = position;
            state.velocities_out[idx] = velocity;
            state.energy_out[idx] = energy;
        }
    }

    /// Runs `ticks` steps back to back.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    // --- Metrics ---

    pub fn polarization(&self) -> f32 {
        metrics::polarization(self.state.velocities())
    }

    pub fn mean_speed(&self) -> f32 {
        metrics::mean_speed(self.state.velocities())
    }

    pub fn mean_nearest_neighbor_distance(&self) -> f32 {
        metrics::mean_nearest_neighbor_distance(self.state.positions(), &self.boundary)
    }

    /// Mean follower energy, or `None` when the energy model is off.
    pub fn mean_energy(&self) -> Option<f32> {
        self.energy_model.as_ref()?;
        metrics::mean_energy(self.state.energy(), self.state.leader())
    }

    // --- Read-only state ---

    /// Snapshot of every agent for rendering.
    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.state.snapshots()
    }

    pub fn agent(&self, idx: usize) -> Option<AgentSnapshot> {
        (idx < self.state.num_agents()).then(|| self.state.snapshot(idx))
    }

    pub fn agent_count(&self) -> usize {
        self.state.num_agents()
    }

    pub fn leader(&self) -> Option<usize> {
        self.state.leader()
    }

    pub fn recharge_zones(&self) -> &[RechargeZone] {
        &self.config.energy.recharge_zones
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn tick(&self) -> u64 {
        self.current_tick
    }

    /// Simulation time (tick * dt).
    pub fn time(&self) -> f32 {
        self.current_tick as f32 * self.state.params.dt
    }

    pub fn params(&self) -> &SimParams {
        &self.state.params
    }

    pub fn config(&self) -> &FlockConfig {
        &self.config
    }

    pub fn state(&self) -> &FlockState {
        &self.state
    }

    /// Neighbors of agent `idx` in the current state through either query path.
    /// The indexed path builds a fresh cell list from the current positions.
    pub fn neighbors_of(&self, idx: usize, mode: NeighborMode) -> Vec<Neighbor> {
        let positions = self.state.positions();
        let radius_sq = self.state.params.neighbor_radius_sq;
        let mut found = Vec::new();
        match mode {
            NeighborMode::Indexed => {
                let mut grid = CellList::new(&self.state.params);
                grid.rebuild(positions);
                NeighborSearch::Indexed(&grid).collect_into(idx, positions, &self.boundary, radius_sq, &mut found);
            }
            NeighborMode::BruteForce => {
                NeighborSearch::BruteForce.collect_into(idx, positions, &self.boundary, radius_sq, &mut found);
            }
        }
        found
    }

    // --- Recording ---

    pub fn metrics_snapshot(&self, include_agents: bool) -> MetricsSnapshot {
        MetricsSnapshot {
            tick: self.current_tick,
            time: self.time(),
            polarization: self.polarization(),
            mean_speed: self.mean_speed(),
            mean_nearest_neighbor_distance: self.mean_nearest_neighbor_distance(),
            mean_energy: self.mean_energy(),
            agents: include_agents.then(|| self.agents()),
        }
    }

    /// Appends the current metrics to the recorded series.
    pub fn record_snapshot(&mut self) {
        let snapshot = self.metrics_snapshot(self.config.run.include_agents_in_snapshots);
        debug!(
            "Recorded snapshot at tick {}: polarization={:.3}, mean_speed={:.3}, mean_nn={:.3}",
            snapshot.tick, snapshot.polarization, snapshot.mean_speed, snapshot.mean_nearest_neighbor_distance
        );
        self.recorded_snapshots.push(snapshot);
    }

    pub fn recorded_snapshots(&self) -> &[MetricsSnapshot] {
        &self.recorded_snapshots
    }
}

/// Random initial layout.
///
/// Draw order is fixed: one kind draw per agent, then x, y and heading per agent.
/// Followers start at half the maximum speed; the leader (agent 0) starts at
/// full speed along its heading.
fn place_initial_agents(params: &SimParams, boundary: &Boundary, rng: &mut StdRng) -> InitialAgents {
    let count = params.num_agents as usize;

    let kinds: Vec<AgentKind> = (0..count)
        .map(|_| {
            let r: f32 = rng.random();
            if r < params.fraction_a {
                AgentKind::A
            } else if r < params.fraction_a + params.fraction_b {
                AgentKind::B
            } else {
                AgentKind::C
            }
        })
        .collect();

    let leader = params.leader_enabled.then_some(0);
    let mut positions = Vec::with_capacity(count);
    let mut velocities = Vec::with_capacity(count);
    for idx in 0..count {
        let x = rng.random::<f32>() * params.world_width;
        let y = rng.random::<f32>() * params.world_height;
        let heading = rng.random::<f32>() * std::f32::consts::TAU;

        let velocity = if leader == Some(idx) {
            params.leader_direction * params.max_speed
        } else {
            angle_to_vec(heading) * (0.5 * params.max_speed)
        };
        // Keeps a sample that rounded up onto the far edge inside the world.
        let (position, _) = boundary.correct(Vec2::new(x, y), velocity);

        positions.push(position);
        velocities.push(velocity);
    }

    InitialAgents { positions, velocities, kinds, leader }
}

fn check_agent(index: usize, agent: &AgentSnapshot, boundary: &Boundary) -> Result<(), ConfigError> {
    let p = agent.position;
    let v = agent.velocity;
    if !(p.x.is_finite() && p.y.is_finite() && v.x.is_finite() && v.y.is_finite()) {
        return Err(ConfigError::InvalidAgent { index, reason: "non-finite position or velocity" });
    }
    let inside = match boundary.policy() {
        BoundaryPolicy::Toroidal => p.x >= 0.0 && p.x < boundary.width() && p.y >= 0.0 && p.y < boundary.height(),
        BoundaryPolicy::Reflective => p.x >= 0.0 && p.x <= boundary.width() && p.y >= 0.0 && p.y <= boundary.height(),
    };
    if !inside {
        return Err(ConfigError::InvalidAgent { index, reason: "position outside the world" });
    }
    if !(0.0..=1.0).contains(&agent.energy) {
        return Err(ConfigError::InvalidAgent { index, reason: "energy outside [0, 1]" });
    }
    Ok(())
}
