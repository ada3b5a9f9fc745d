//! World edge handling.
//!
//! A single [`Boundary`] value is built per simulation and used for every
//! cross-agent displacement, every zone distance and every position update,
//! so the two policies can never be mixed inside one run.

use flock_common::{BoundaryPolicy, SimParams, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    policy: BoundaryPolicy,
    width: f32,
    height: f32,
}

impl Boundary {
    pub fn new(policy: BoundaryPolicy, width: f32, height: f32) -> Self {
        Self { policy, width, height }
    }

    pub fn from_params(params: &SimParams) -> Self {
        Self::new(params.boundary, params.world_width, params.world_height)
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Displacement from `from` to `to`.
    /// Under the toroidal policy each axis takes the shortest signed path around the wrap.
    #[inline(always)]
    pub fn delta(&self, from: Vec2, to: Vec2) -> Vec2 {
        match self.policy {
            BoundaryPolicy::Toroidal => Vec2::new(
                torus_delta(from.x, to.x, self.width),
                torus_delta(from.y, to.y, self.height),
            ),
            BoundaryPolicy::Reflective => to - from,
        }
    }

    #[inline(always)]
    pub fn distance(&self, a: Vec2, b: Vec2) -> f32 {
        self.delta(a, b).length()
    }

    /// Maps a raw next position (and the velocity that produced it) onto the world.
    ///
    /// Toroidal: the position wraps into `[0, W) x [0, H)`, velocity is untouched.
    /// Reflective: an overshooting coordinate is mirrored back across the edge and
    /// the matching velocity component changes sign; the result lies in `[0, W] x [0, H]`.
    pub fn correct(&self, position: Vec2, velocity: Vec2) -> (Vec2, Vec2) {
        match self.policy {
            BoundaryPolicy::Toroidal => (
                Vec2::new(wrap(position.x, self.width), wrap(position.y, self.height)),
                velocity,
            ),
            BoundaryPolicy::Reflective => {
                let (x, vx) = reflect(position.x, velocity.x, self.width);
                let (y, vy) = reflect(position.y, velocity.y, self.height);
                (Vec2::new(x, y), Vec2::new(vx, vy))
            }
        }
    }
}

#[inline(always)]
fn torus_delta(a: f32, b: f32, len: f32) -> f32 {
    let d = b - a;
    let half = 0.5 * len;
    if d > half {
        d - len
    } else if d < -half {
        d + len
    } else {
        d
    }
}

#[inline(always)]
fn wrap(x: f32, len: f32) -> f32 {
    let wrapped = x.rem_euclid(len);
    // rem_euclid can round up to exactly `len` for tiny negative inputs.
    if wrapped >= len {
        0.0
    } else {
        wrapped
    }
}

#[inline(always)]
fn reflect(x: f32, v: f32, len: f32) -> (f32, f32) {
    let mut x = x;
    let mut v = v;
    if x < 0.0 {
        x = -x;
        v = -v;
    }
    if x >= len {
        x = 2.0 * len - x;
        v = -v;
    }
    (x.clamp(0.0, len), v)
}
