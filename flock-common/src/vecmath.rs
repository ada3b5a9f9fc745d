use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Squared-length threshold below which a vector is treated as zero.
pub const NORMALIZE_EPSILON_SQ: f32 = 1e-12;

/// A simple 2D vector struct.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// Creates a new Vec2.
    #[inline(always)]
    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Creates a zero vector.
    #[inline(always)]
    pub fn zero() -> Self {
        Vec2 { x: 0.0, y: 0.0 }
    }

    #[inline(always)]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[inline(always)]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Returns the unit vector in the same direction.
    /// Returns a zero vector if the length is zero or very small.
    pub fn normalize_or_zero(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq > NORMALIZE_EPSILON_SQ {
            self.scale(1.0 / len_sq.sqrt())
        } else {
            Vec2::zero()
        }
    }

    /// Caps the magnitude at `max_len`, keeping the direction.
    /// Vectors already shorter than `max_len` are returned unchanged.
    pub fn clamp_length(self, max_len: f32) -> Self {
        let len_sq = self.length_squared();
        if len_sq == 0.0 {
            return Vec2::zero();
        }
        if len_sq > max_len * max_len {
            let len = len_sq.sqrt();
            Vec2::new(self.x * max_len / len, self.y * max_len / len)
        } else {
            self
        }
    }

    #[inline(always)]
    pub fn scale(self, scalar: f32) -> Self {
        Vec2 { x: self.x * scalar, y: self.y * scalar }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;
    fn div(self, scalar: f32) -> Self {
        Self { x: self.x / scalar, y: self.y / scalar }
    }
}

/// Converts an angle (in radians) to a unit vector.
#[inline(always)]
pub fn angle_to_vec(angle_rad: f32) -> Vec2 {
    Vec2::new(angle_rad.cos(), angle_rad.sin())
}

/// Clamps a value between a minimum and maximum.
#[inline(always)]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_near_zero_returns_zero() {
        assert_eq!(Vec2::new(1e-8, -1e-8).normalize_or_zero(), Vec2::zero());
        assert_eq!(Vec2::zero().normalize_or_zero(), Vec2::zero());
    }

    #[test]
    fn normalize_keeps_direction() {
        let n = Vec2::new(3.0, 4.0).normalize_or_zero();
        assert!((n.x - 0.6).abs() < 1e-6);
        assert!((n.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn clamp_length_caps_but_never_raises() {
        let capped = Vec2::new(6.0, 8.0).clamp_length(5.0);
        assert!((capped.length() - 5.0).abs() < 1e-5);
        assert!((capped.x - 3.0).abs() < 1e-5);

        let short = Vec2::new(0.3, 0.4);
        assert_eq!(short.clamp_length(5.0), short);
        assert_eq!(Vec2::zero().clamp_length(5.0), Vec2::zero());
    }

    #[test]
    fn operators() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(0.5, -1.0);
        assert_eq!(a + b, Vec2::new(1.5, 1.0));
        assert_eq!(a - b, Vec2::new(0.5, 3.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(a / 2.0, Vec2::new(0.5, 1.0));
        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }

    #[test]
    fn angle_to_vec_is_unit() {
        let v = angle_to_vec(std::f32::consts::FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
        assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-0.5, 0.0, 1.0), 0.0);
    }
}
