//! Flocking force model: separation, cohesion, alignment, leader pull and noise.

use crate::boundary::Boundary;
use crate::grid::{Neighbor, NeighborSearch};
use flock_common::{SimParams, Vec2};
use rand::Rng;
use rayon::prelude::*;

/// Neighbors closer than this are treated as coincident and exert no separation push.
const MIN_SEPARATION_DISTANCE: f32 = 1e-9;

/// Summed repulsion from every neighbor strictly inside `separation_distance`.
/// Falls linearly to exactly zero at the threshold.
pub fn separation(neighbors: &[Neighbor], separation_distance: f32) -> Vec2 {
    let mut sep = Vec2::zero();
    for n in neighbors {
        if n.distance < separation_distance && n.distance > MIN_SEPARATION_DISTANCE {
            let strength = -(separation_distance - n.distance) / separation_distance;
            sep += n.delta.normalize_or_zero() * strength;
        }
    }
    sep
}

/// Pull toward the neighbors' local centroid.
pub fn cohesion(neighbors: &[Neighbor]) -> Vec2 {
    if neighbors.is_empty() {
        return Vec2::zero();
    }
    let mut sum = Vec2::zero();
    for n in neighbors {
        sum += n.delta;
    }
    -(sum / neighbors.len() as f32)
}

/// Mean neighbor velocity minus own velocity.
pub fn alignment(neighbors: &[Neighbor], velocities: &[Vec2], own_velocity: Vec2) -> Vec2 {
    if neighbors.is_empty() {
        return Vec2::zero();
    }
    let mut sum = Vec2::zero();
    for n in neighbors {
        sum += velocities[n.index];
    }
    sum / neighbors.len() as f32 - own_velocity
}

/// Acceleration of a follower (any non-leader agent).
///
/// The leader pull is folded into the alignment term, so it scales with the
/// alignment weight and applies whether or not the leader is a neighbor.
pub fn follower_acceleration(
    own_velocity: Vec2,
    neighbors: &[Neighbor],
    velocities: &[Vec2],
    leader_velocity: Option<Vec2>,
    noise: Vec2,
    params: &SimParams,
) -> Vec2 {
    let sep = separation(neighbors, params.separation_distance);
    let coh = cohesion(neighbors);
    let mut align = alignment(neighbors, velocities, own_velocity);
    if let Some(leader_velocity) = leader_velocity {
        align += (leader_velocity - own_velocity) * params.leader_influence;
    }

    sep * params.w_sep + coh * params.w_coh + align * params.w_align + noise
}

/// Acceleration of the leader: track the prescribed heading at full speed.
pub fn leader_acceleration(own_velocity: Vec2, noise: Vec2, params: &SimParams) -> Vec2 {
    let desired = params.leader_direction * params.max_speed;
    (desired - own_velocity) + noise
}

/// Independent uniform perturbation in `[-amplitude/2, amplitude/2)` per axis.
/// Always consumes exactly two draws (x then y), even for a zero amplitude.
pub fn sample_noise<R: Rng + ?Sized>(rng: &mut R, amplitude: f32) -> Vec2 {
    let nx = (rng.random::<f32>() - 0.5) * amplitude;
    let ny = (rng.random::<f32>() - 0.5) * amplitude;
    Vec2::new(nx, ny)
}

/// Computes every agent's acceleration from one frozen snapshot of positions
/// and velocities (Parallel). Nothing here writes agent state, so the result
/// does not depend on scheduling.
#[allow(clippy::too_many_arguments)]
pub fn compute_accelerations(
    accelerations: &mut [Vec2],
    positions: &[Vec2],
    velocities: &[Vec2],
    noise: &[Vec2],
    leader: Option<usize>,
    search: NeighborSearch<'_>,
    boundary: &Boundary,
    params: &SimParams,
) {
    let leader_velocity = leader.map(|l| velocities[l]);

    accelerations
        .par_iter_mut()
        .enumerate()
        .for_each_init(Vec::new, |neighbors, (idx, acc_out)| {
            let own_velocity = velocities[idx];

            if leader == Some(idx) {
                *acc_out = leader_acceleration(own_velocity, noise[idx], params);
                return;
            }

            search.collect_into(idx, positions, boundary, params.neighbor_radius_sq, neighbors);
            *acc_out = follower_acceleration(
                own_velocity,
                neighbors,
                velocities,
                leader_velocity,
                noise[idx],
                params,
            );
        });
}
