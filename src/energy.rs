//! Optional per-agent energy budget.
//!
//! Energy drains with speed, refills inside recharge zones and rescales the
//! stored velocity. The rescaled velocity is what the *next* tick integrates,
//! so speed reacts to energy one tick late.

use crate::boundary::Boundary;
use flock_common::{clamp, RechargeZone, Vec2};

/// Fixed damping applied to the speed-proportional drain.
pub const DEPLETION_DAMPING: f32 = 0.2;

/// Velocity multiplier for a given energy level: 0.5 when empty, 2.0 when full.
#[inline]
pub fn speed_factor(energy: f32) -> f32 {
    0.5 + 1.5 * energy.powf(0.6)
}

#[derive(Debug, Clone)]
pub struct EnergyModel {
    cost: f32,
    zones: Vec<RechargeZone>,
}

impl EnergyModel {
    pub fn new(cost: f32, zones: Vec<RechargeZone>) -> Self {
        Self { cost, zones }
    }

    /// Total recharge per unit time at `position`; overlapping zones add up.
    pub fn recharge_rate_at(&self, position: Vec2, boundary: &Boundary) -> f32 {
        self.zones
            .iter()
            .filter(|zone| boundary.distance(position, zone.center()) <= zone.radius)
            .map(|zone| zone.rate)
            .sum()
    }

    /// Applies drain, recharge and clamping, then scales the velocity.
    /// `velocity` is the already clamped, boundary-corrected velocity and
    /// `position` the committed position of this tick.
    pub fn update(&self, energy: f32, position: Vec2, velocity: Vec2, dt: f32, boundary: &Boundary) -> (f32, Vec2) {
        let speed = velocity.length();
        let drained = energy - self.cost * speed * dt * DEPLETION_DAMPING;
        let recharged = drained + self.recharge_rate_at(position, boundary) * dt;
        let energy = clamp(recharged, 0.0, 1.0);
        (energy, velocity * speed_factor(energy))
    }
}
