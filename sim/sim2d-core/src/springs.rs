//! Spring force elements.
//!
//! Springs are not constraints: they add forces to their bodies at the start
//! of a step and never enter the solver.

use sim2d_types::math::cross;
use sim2d_types::{Body, Vec2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mutable access to two distinct bodies of a slice.
pub(crate) fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> Option<(&mut Body, &mut Body)> {
    if i == j || i >= bodies.len() || j >= bodies.len() {
        return None;
    }
    if i < j {
        let (lo, hi) = bodies.split_at_mut(j);
        Some((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = bodies.split_at_mut(i);
        Some((&mut hi[0], &mut lo[j]))
    }
}

/// Damped spring between an anchor on each of two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearSpring {
    /// Index of the first body.
    pub body_a: usize,
    /// Index of the second body.
    pub body_b: usize,
    /// Anchor on the first body, in its local frame.
    pub local_anchor_a: Vec2,
    /// Anchor on the second body, in its local frame.
    pub local_anchor_b: Vec2,
    /// Length at which the spring exerts no force.
    pub rest_length: f64,
    /// Spring constant.
    pub stiffness: f64,
    /// Damping along the spring axis.
    pub damping: f64,
}

impl LinearSpring {
    /// Spring between the body centres.
    #[must_use]
    pub fn new(body_a: usize, body_b: usize, rest_length: f64) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec2::zeros(),
            local_anchor_b: Vec2::zeros(),
            rest_length,
            stiffness: 100.0,
            damping: 1.0,
        }
    }

    /// Spring between the body centres, relaxed at their current distance.
    #[must_use]
    pub fn between(body_a: usize, a: &Body, body_b: usize, b: &Body) -> Self {
        Self::new(body_a, body_b, (b.position - a.position).norm())
    }

    /// Set the local anchors.
    #[must_use]
    pub fn with_anchors(mut self, local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        self.local_anchor_a = local_anchor_a;
        self.local_anchor_b = local_anchor_b;
        self
    }

    /// Set stiffness and damping.
    #[must_use]
    pub fn with_coefficients(mut self, stiffness: f64, damping: f64) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    /// Current anchor separation.
    #[must_use]
    pub fn length(&self, bodies: &[Body]) -> Option<f64> {
        let a = bodies.get(self.body_a)?;
        let b = bodies.get(self.body_b)?;
        Some((b.to_world_frame(&self.local_anchor_b) - a.to_world_frame(&self.local_anchor_a)).norm())
    }

    /// Add the spring force to both bodies.
    pub fn apply(&self, bodies: &mut [Body]) {
        let Some((a, b)) = pair_mut(bodies, self.body_a, self.body_b) else {
            return;
        };
        let world_a = a.to_world_frame(&self.local_anchor_a);
        let world_b = b.to_world_frame(&self.local_anchor_b);
        let r = world_b - world_a;
        let length = r.norm();
        if length <= f64::EPSILON {
            return;
        }
        let axis = r / length;

        let ri = world_a - a.position;
        let rj = world_b - b.position;
        let u = b.velocity_at_point(&rj) - a.velocity_at_point(&ri);

        let f = -self.stiffness * (length - self.rest_length) - self.damping * u.dot(&axis);
        let force = axis * f;

        a.force -= force;
        b.force += force;
        a.angular_force -= cross(&ri, &force);
        b.angular_force += cross(&rj, &force);
    }
}

/// Damped torsion spring on the relative angle of two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RotationalSpring {
    /// Index of the first body.
    pub body_a: usize,
    /// Index of the second body.
    pub body_b: usize,
    /// Relative angle `angle_b - angle_a` at rest.
    pub rest_angle: f64,
    /// Spring constant.
    pub stiffness: f64,
    /// Damping on the relative angular velocity.
    pub damping: f64,
}

impl RotationalSpring {
    /// Torsion spring relaxed at `rest_angle`.
    #[must_use]
    pub fn new(body_a: usize, body_b: usize, rest_angle: f64) -> Self {
        Self {
            body_a,
            body_b,
            rest_angle,
            stiffness: 100.0,
            damping: 1.0,
        }
    }

    /// Set stiffness and damping.
    #[must_use]
    pub fn with_coefficients(mut self, stiffness: f64, damping: f64) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    /// Add the spring torque to both bodies.
    pub fn apply(&self, bodies: &mut [Body]) {
        let Some((a, b)) = pair_mut(bodies, self.body_a, self.body_b) else {
            return;
        };
        let angle = b.angle - a.angle;
        let torque = -self.stiffness * (angle - self.rest_angle)
            - self.damping * (b.angular_velocity - a.angular_velocity);
        a.angular_force -= torque;
        b.angular_force += torque;
    }
}

/// A spring owned by the world.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Spring {
    /// Linear spring.
    Linear(LinearSpring),
    /// Rotational spring.
    Rotational(RotationalSpring),
}

impl Spring {
    /// Add the spring's forces to its bodies.
    pub fn apply(&self, bodies: &mut [Body]) {
        match self {
            Self::Linear(s) => s.apply(bodies),
            Self::Rotational(s) => s.apply(bodies),
        }
    }

    /// Indices of the two bodies.
    #[must_use]
    pub fn bodies(&self) -> (usize, usize) {
        match self {
            Self::Linear(s) => (s.body_a, s.body_b),
            Self::Rotational(s) => (s.body_a, s.body_b),
        }
    }

    /// Point the spring at new body slots.
    pub fn set_bodies(&mut self, body_a: usize, body_b: usize) {
        match self {
            Self::Linear(s) => {
                s.body_a = body_a;
                s.body_b = body_b;
            }
            Self::Rotational(s) => {
                s.body_a = body_a;
                s.body_b = body_b;
            }
        }
    }
}

impl From<LinearSpring> for Spring {
    fn from(spring: LinearSpring) -> Self {
        Self::Linear(spring)
    }
}

impl From<RotationalSpring> for Spring {
    fn from(spring: RotationalSpring) -> Self {
        Self::Rotational(spring)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_bodies(distance: f64) -> Vec<Body> {
        vec![
            Body::new(1.0),
            Body::new(1.0).with_position(Vec2::new(distance, 0.0)),
        ]
    }

    #[test]
    fn test_pair_mut() {
        let mut bodies = two_bodies(1.0);
        let (a, b) = pair_mut(&mut bodies, 1, 0).unwrap();
        assert_eq!(a.position.x, 1.0);
        assert_eq!(b.position.x, 0.0);
        assert!(pair_mut(&mut bodies, 0, 0).is_none());
        assert!(pair_mut(&mut bodies, 0, 2).is_none());
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let mut bodies = two_bodies(2.0);
        LinearSpring::new(0, 1, 1.0).apply(&mut bodies);
        assert_relative_eq!(bodies[0].force, Vec2::new(100.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(bodies[1].force, Vec2::new(-100.0, 0.0), epsilon = 1e-12);
        assert_eq!(bodies[0].angular_force, 0.0);
    }

    #[test]
    fn test_rest_length_from_positions() {
        let mut bodies = two_bodies(3.0);
        let spring = LinearSpring::between(0, &bodies[0], 1, &bodies[1]);
        assert_relative_eq!(spring.rest_length, 3.0);
        assert_relative_eq!(spring.length(&bodies).unwrap(), 3.0);
        spring.apply(&mut bodies);
        assert_relative_eq!(bodies[1].force.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_damping_opposes_separation() {
        let mut bodies = two_bodies(1.0);
        bodies[1].velocity = Vec2::new(1.0, 0.0);
        LinearSpring::new(0, 1, 1.0)
            .with_coefficients(0.0, 2.0)
            .apply(&mut bodies);
        assert_relative_eq!(bodies[1].force, Vec2::new(-2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_offset_anchor_produces_torque() {
        let mut bodies = two_bodies(2.0);
        LinearSpring::new(0, 1, 1.0)
            .with_anchors(Vec2::new(0.0, 1.0), Vec2::new(0.0, 1.0))
            .apply(&mut bodies);
        // Pulling +x at (0, 1) on body A.
        assert!(bodies[0].angular_force < 0.0);
        assert!(bodies[1].angular_force > 0.0);
    }

    #[test]
    fn test_rotational_spring() {
        let mut bodies = two_bodies(1.0);
        bodies[1].angle = 0.5;
        Spring::from(RotationalSpring::new(0, 1, 0.0).with_coefficients(10.0, 0.0)).apply(&mut bodies);
        assert_relative_eq!(bodies[1].angular_force, -5.0, epsilon = 1e-12);
        assert_relative_eq!(bodies[0].angular_force, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_body_is_ignored() {
        let mut bodies = two_bodies(2.0);
        let mut spring = Spring::from(LinearSpring::new(0, 1, 1.0));
        spring.set_bodies(0, 5);
        spring.apply(&mut bodies);
        assert_eq!(bodies[0].force, Vec2::zeros());
        assert_eq!(spring.bodies(), (0, 5));
    }
}
