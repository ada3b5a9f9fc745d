use crate::boundary::Boundary;
use flock_common::Vec2;

/// Semi-implicit Euler step for one agent.
///
/// The velocity is clamped to `max_speed` before it moves the agent, and the
/// boundary policy decides the committed position (and, for reflective walls,
/// the possibly flipped velocity).
#[inline]
pub fn integrate(
    position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,
    dt: f32,
    max_speed: f32,
    boundary: &Boundary,
) -> (Vec2, Vec2) {
    let velocity = (velocity + acceleration * dt).clamp_length(max_speed);
    let candidate = position + velocity * dt;
    boundary.correct(candidate, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flock_common::BoundaryPolicy;

    #[test]
    fn clamps_speed_before_moving() {
        let b = Boundary::new(BoundaryPolicy::Toroidal, 100.0, 100.0);
        let (p, v) = integrate(Vec2::new(50.0, 50.0), Vec2::new(1.0, 0.0), Vec2::new(5.0, 0.0), 1.0, 2.0, &b);
        assert!((v.length() - 2.0).abs() < 1e-6);
        assert!((p.x - 52.0).abs() < 1e-5);
        assert_eq!(p.y, 50.0);
    }

    #[test]
    fn slow_velocity_is_not_raised() {
        let b = Boundary::new(BoundaryPolicy::Toroidal, 100.0, 100.0);
        let (_, v) = integrate(Vec2::new(10.0, 10.0), Vec2::new(0.1, 0.0), Vec2::new(0.0, 0.1), 1.0, 2.0, &b);
        assert_eq!(v, Vec2::new(0.1, 0.1));
    }

    #[test]
    fn dt_scales_both_updates() {
        let b = Boundary::new(BoundaryPolicy::Reflective, 100.0, 100.0);
        let (p, v) = integrate(Vec2::new(10.0, 10.0), Vec2::zero(), Vec2::new(1.0, 0.0), 0.5, 2.0, &b);
        assert_eq!(v, Vec2::new(0.5, 0.0));
        assert_eq!(p, Vec2::new(10.25, 10.0));
    }

    #[test]
    fn wraps_on_torus() {
        let b = Boundary::new(BoundaryPolicy::Toroidal, 100.0, 100.0);
        let (p, v) = integrate(Vec2::new(99.5, 0.5), Vec2::new(1.0, -1.0), Vec2::zero(), 1.0, 2.0, &b);
        assert!((p.x - 0.5).abs() < 1e-4);
        assert!((p.y - 99.5).abs() < 1e-4);
        assert_eq!(v, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn bounces_off_reflective_wall() {
        let b = Boundary::new(BoundaryPolicy::Reflective, 100.0, 100.0);
        let (p, v) = integrate(Vec2::new(99.5, 50.0), Vec2::new(1.0, 0.0), Vec2::zero(), 1.0, 2.0, &b);
        assert_eq!(p, Vec2::new(99.5, 50.0));
        assert_eq!(v, Vec2::new(-1.0, 0.0));
    }
}
