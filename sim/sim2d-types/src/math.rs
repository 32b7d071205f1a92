//! Planar vector helpers.
//!
//! All vectors are [`nalgebra::Vector2<f64>`]. The functions here cover the
//! handful of 2D operations nalgebra does not name directly: the scalar cross
//! product, the cross product between a scalar angular velocity and a vector,
//! and conversions between a body frame and the world frame.

use nalgebra::{Rotation2, Vector2};

/// 2D vector type used throughout the simulation.
pub type Vec2 = Vector2<f64>;

/// Lengths below this are treated as zero when normalizing.
pub const EPSILON: f64 = 1e-12;

/// Z component of the 3D cross product of two planar vectors.
#[must_use]
#[inline]
pub fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a scalar (z-axis vector) with a planar vector: `s × v`.
///
/// With `s` an angular velocity and `v` a lever arm this is the linear
/// velocity of the lever's tip.
#[must_use]
#[inline]
pub fn cross_sv(s: f64, v: &Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Rotate a vector counter-clockwise by `angle` radians.
#[must_use]
#[inline]
pub fn rotate(v: &Vec2, angle: f64) -> Vec2 {
    Rotation2::new(angle) * v
}

/// Rotate a vector 90 degrees clockwise.
#[must_use]
#[inline]
pub fn rotate90cw(v: &Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// Rotate a vector 90 degrees counter-clockwise.
#[must_use]
#[inline]
pub fn rotate90ccw(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Express a world point in the frame located at `position` rotated by `angle`.
#[must_use]
pub fn to_local_frame(world_point: &Vec2, position: &Vec2, angle: f64) -> Vec2 {
    rotate(&(world_point - position), -angle)
}

/// Express a frame-local point in world coordinates.
#[must_use]
pub fn to_global_frame(local_point: &Vec2, position: &Vec2, angle: f64) -> Vec2 {
    rotate(local_point, angle) + position
}

/// Normalize `v`, or return `None` when it is too short to carry a direction.
#[must_use]
pub fn try_normalize(v: &Vec2) -> Option<Vec2> {
    let len = v.norm();
    if len > EPSILON && len.is_finite() {
        Some(v / len)
    } else {
        None
    }
}

/// Whether both components are finite.
#[must_use]
#[inline]
pub fn is_finite(v: &Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
