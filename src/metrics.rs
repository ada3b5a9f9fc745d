//! Aggregate order parameters over the whole flock.

use crate::boundary::Boundary;
use flock_common::Vec2;
use rayon::prelude::*;

/// Below this total speed the flock is considered at rest.
const MIN_TOTAL_SPEED: f32 = 1e-12;

/// |sum of velocities| / sum of speeds, in [0, 1].
/// 1.0 when every heading agrees, 0.0 when they cancel or nothing moves.
pub fn polarization(velocities: &[Vec2]) -> f32 {
    let mut v_sum = Vec2::zero();
    let mut speed_sum = 0.0;
    for &v in velocities {
        v_sum += v;
        speed_sum += v.length();
    }
    if speed_sum < MIN_TOTAL_SPEED {
        return 0.0;
    }
    v_sum.length() / speed_sum
}

pub fn mean_speed(velocities: &[Vec2]) -> f32 {
    if velocities.is_empty() {
        return 0.0;
    }
    velocities.iter().map(|v| v.length()).sum::<f32>() / velocities.len() as f32
}

/// Mean over agents of the distance to the closest other agent.
///
/// Exhaustive O(N^2) scan with boundary-aware distances; the per-agent scans
/// run in parallel but are summed in index order.
pub fn mean_nearest_neighbor_distance(positions: &[Vec2], boundary: &Boundary) -> f32 {
    let n = positions.len();
    if n < 2 {
        return 0.0;
    }
    let nearest: Vec<f32> = (0..n)
        .into_par_iter()
        .map(|i| {
            let pos = positions[i];
            positions
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &other)| boundary.distance(pos, other))
                .fold(f32::INFINITY, f32::min)
        })
        .collect();
    nearest.iter().sum::<f32>() / n as f32
}

/// Mean energy over every agent except the leader; `None` if there are none.
pub fn mean_energy(energy: &[f32], leader: Option<usize>) -> Option<f32> {
    let (sum, count) = energy
        .iter()
        .enumerate()
        .filter(|&(i, _)| Some(i) != leader)
        .fold((0.0f32, 0usize), |(sum, count), (_, &e)| (sum + e, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}
