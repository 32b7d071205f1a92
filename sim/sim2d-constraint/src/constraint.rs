//! Joints between two bodies.
//!
//! A [`Constraint`] owns the equations that realize it and rewrites their
//! geometry from the current body poses in [`Constraint::update`], once per
//! step before the equations are handed to the island splitter and solver.
//!
//! | Joint | Equations |
//! |-------|-----------|
//! | Distance | one [`EquationKind::Distance`] |
//! | Revolute | two [`EquationKind::PointToPoint`] (x and y) |
//! | Prismatic | one [`EquationKind::Prismatic`] plus one [`EquationKind::AngleLock`] |
//! | Gear | one [`EquationKind::AngleLock`] |
//! | Motor | one [`EquationKind::RotationalVelocity`] |

use sim2d_types::math::{rotate, rotate90cw, try_normalize};
use sim2d_types::{Body, Vec2};

use crate::equation::{Equation, EquationKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Joint-specific parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Keep two anchors at a distance, or within limits.
    Distance {
        /// Anchor in A's frame.
        local_anchor_a: Vec2,
        /// Anchor in B's frame.
        local_anchor_b: Vec2,
        /// Target distance when no limit applies.
        distance: f64,
        /// The anchors may not come closer than this.
        lower_limit: Option<f64>,
        /// The anchors may not move farther apart than this.
        upper_limit: Option<f64>,
    },
    /// Pin two anchors together; rotation stays free.
    Revolute {
        /// Pivot in A's frame.
        local_pivot_a: Vec2,
        /// Pivot in B's frame.
        local_pivot_b: Vec2,
    },
    /// Let B slide along an axis fixed in A, with relative rotation locked.
    Prismatic {
        /// Anchor in A's frame.
        local_anchor_a: Vec2,
        /// Anchor in B's frame.
        local_anchor_b: Vec2,
        /// Sliding axis in A's frame.
        local_axis_a: Vec2,
    },
    /// Couple the angles: `ratio·θA - θB + angle = 0`.
    Gear {
        /// Gear ratio.
        ratio: f64,
        /// Angle offset.
        angle: f64,
    },
    /// Drive the relative angular velocity: `ratio·ωB - ωA = -speed`.
    Motor {
        /// Gear ratio.
        ratio: f64,
        /// Target speed.
        speed: f64,
    },
}

/// A joint between two bodies, referenced by index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Constraint {
    body_a: usize,
    body_b: usize,
    /// Whether the two bodies still collide with each other.
    pub collide_connected: bool,
    kind: ConstraintKind,
    max_force: f64,
    equations: Vec<Equation>,
}

impl Constraint {
    fn with_equations(body_a: usize, body_b: usize, kind: ConstraintKind, equations: Vec<Equation>) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: true,
            kind,
            max_force: f64::MAX,
            equations,
        }
    }

    /// Distance joint between two anchors.
    #[must_use]
    pub fn distance(
        body_a: usize,
        body_b: usize,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        distance: f64,
    ) -> Self {
        let equation = Equation::new(
            body_a,
            body_b,
            -f64::MAX,
            f64::MAX,
            EquationKind::Distance {
                normal: Vec2::x(),
                anchor_a: Vec2::zeros(),
                anchor_b: Vec2::zeros(),
                distance,
            },
        );
        Self::with_equations(
            body_a,
            body_b,
            ConstraintKind::Distance {
                local_anchor_a,
                local_anchor_b,
                distance,
                lower_limit: None,
                upper_limit: None,
            },
            vec![equation],
        )
    }

    /// Distance joint between the body origins, at their current distance.
    #[must_use]
    pub fn distance_between(body_a: usize, a: &Body, body_b: usize, b: &Body) -> Self {
        let distance = (b.position - a.position).norm();
        Self::distance(body_a, body_b, Vec2::zeros(), Vec2::zeros(), distance)
    }

    /// Revolute joint (pin) between two pivots.
    #[must_use]
    pub fn revolute(body_a: usize, body_b: usize, local_pivot_a: Vec2, local_pivot_b: Vec2) -> Self {
        let axis = |axis: Vec2| {
            Equation::new(
                body_a,
                body_b,
                -f64::MAX,
                f64::MAX,
                EquationKind::PointToPoint {
                    axis,
                    anchor_a: Vec2::zeros(),
                    anchor_b: Vec2::zeros(),
                },
            )
        };
        Self::with_equations(
            body_a,
            body_b,
            ConstraintKind::Revolute {
                local_pivot_a,
                local_pivot_b,
            },
            vec![axis(Vec2::x()), axis(Vec2::y())],
        )
    }

    /// Prismatic joint.
    ///
    /// `reference_angle` is the relative angle `θB - θA` to hold.
    #[must_use]
    pub fn prismatic(
        body_a: usize,
        body_b: usize,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        local_axis_a: Vec2,
        reference_angle: f64,
    ) -> Self {
        let translation = Equation::new(
            body_a,
            body_b,
            -f64::MAX,
            f64::MAX,
            EquationKind::Prismatic {
                perpendicular: Vec2::y(),
                anchor_a: Vec2::zeros(),
                anchor_b: Vec2::zeros(),
            },
        );
        let rotation = Equation::angle_lock(body_a, body_b, reference_angle, 1.0, f64::MAX);
        let local_axis_a = try_normalize(&local_axis_a).unwrap_or_else(Vec2::x);
        Self::with_equations(
            body_a,
            body_b,
            ConstraintKind::Prismatic {
                local_anchor_a,
                local_anchor_b,
                local_axis_a,
            },
            vec![translation, rotation],
        )
    }

    /// Gear joint.
    #[must_use]
    pub fn gear(body_a: usize, body_b: usize, ratio: f64, angle: f64) -> Self {
        Self::with_equations(
            body_a,
            body_b,
            ConstraintKind::Gear { ratio, angle },
            vec![Equation::angle_lock(body_a, body_b, angle, ratio, f64::MAX)],
        )
    }

    /// Angular velocity motor.
    #[must_use]
    pub fn motor(body_a: usize, body_b: usize, speed: f64) -> Self {
        let mut equation = Equation::rotational_velocity(body_a, body_b, 1.0, f64::MAX);
        equation.relative_velocity = speed;
        Self::with_equations(
            body_a,
            body_b,
            ConstraintKind::Motor { ratio: 1.0, speed },
            vec![equation],
        )
    }

    /// Bound the force every equation may apply.
    #[must_use]
    pub fn with_max_force(mut self, max_force: f64) -> Self {
        self.max_force = max_force;
        for eq in &mut self.equations {
            eq.set_max_force(max_force);
        }
        self
    }

    /// Set whether the connected bodies collide with each other.
    #[must_use]
    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }

    /// Set the stiffness of every equation.
    #[must_use]
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        for eq in &mut self.equations {
            eq.stiffness = stiffness;
        }
        self
    }

    /// Set the relaxation of every equation.
    #[must_use]
    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        for eq in &mut self.equations {
            eq.relaxation = relaxation;
        }
        self
    }

    /// Turn a distance joint into a range joint.
    ///
    /// Has no effect on other joints.
    #[must_use]
    pub fn with_limits(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let ConstraintKind::Distance {
            lower_limit,
            upper_limit,
            ..
        } = &mut self.kind
        {
            *lower_limit = lower;
            *upper_limit = upper;
        }
        self
    }

    /// Set the target speed of a motor.
    pub fn set_motor_speed(&mut self, new_speed: f64) {
        if let ConstraintKind::Motor { speed, .. } = &mut self.kind {
            *speed = new_speed;
            for eq in &mut self.equations {
                eq.relative_velocity = new_speed;
            }
        }
    }

    /// Joint parameters.
    #[must_use]
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Index of body A.
    #[must_use]
    pub fn body_a(&self) -> usize {
        self.body_a
    }

    /// Index of body B.
    #[must_use]
    pub fn body_b(&self) -> usize {
        self.body_b
    }

    /// Whether this joint connects the two body slots, in either order.
    #[must_use]
    pub fn connects(&self, a: usize, b: usize) -> bool {
        (self.body_a == a && self.body_b == b) || (self.body_a == b && self.body_b == a)
    }

    /// Point the joint at new body slots, e.g. after bodies were removed.
    pub fn set_bodies(&mut self, body_a: usize, body_b: usize) {
        self.body_a = body_a;
        self.body_b = body_b;
        for eq in &mut self.equations {
            eq.body_a = body_a;
            eq.body_b = body_b;
        }
    }

    /// The joint's equations.
    #[must_use]
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Mutable access to the joint's equations.
    pub fn equations_mut(&mut self) -> &mut [Equation] {
        &mut self.equations
    }

    /// Rewrite equation geometry from the current body poses.
    pub fn update(&mut self, bodies: &[Body]) {
        let (Some(a), Some(b)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            for eq in &mut self.equations {
                eq.enabled = false;
            }
            return;
        };

        match &self.kind {
            ConstraintKind::Distance {
                local_anchor_a,
                local_anchor_b,
                distance,
                lower_limit,
                upper_limit,
            } => {
                let ri = rotate(local_anchor_a, a.angle);
                let rj = rotate(local_anchor_b, b.angle);
                let d = (b.position + rj) - (a.position + ri);
                let length = d.norm();
                let normal = try_normalize(&d).unwrap_or_else(Vec2::x);

                let max = self.max_force;
                let (target, min_force, max_force, enabled) = match (lower_limit, upper_limit) {
                    (None, None) => (*distance, -max, max, true),
                    (_, Some(upper)) if length > *upper => (*upper, -max, 0.0, true),
                    (Some(lower), _) if length < *lower => (*lower, 0.0, max, true),
                    _ => (*distance, -max, max, false),
                };

                if let Some(eq) = self.equations.first_mut() {
                    eq.kind = EquationKind::Distance {
                        normal,
                        anchor_a: ri,
                        anchor_b: rj,
                        distance: target,
                    };
                    eq.min_force = min_force;
                    eq.max_force = max_force;
                    eq.enabled = enabled;
                }
            }
            ConstraintKind::Revolute {
                local_pivot_a,
                local_pivot_b,
            } => {
                let ri = rotate(local_pivot_a, a.angle);
                let rj = rotate(local_pivot_b, b.angle);
                for eq in &mut self.equations {
                    if let EquationKind::PointToPoint {
                        anchor_a, anchor_b, ..
                    } = &mut eq.kind
                    {
                        *anchor_a = ri;
                        *anchor_b = rj;
                    }
                }
            }
            ConstraintKind::Prismatic {
                local_anchor_a,
                local_anchor_b,
                local_axis_a,
            } => {
                let ri = rotate(local_anchor_a, a.angle);
                let rj = rotate(local_anchor_b, b.angle);
                let axis = rotate(local_axis_a, a.angle);
                if let Some(eq) = self.equations.first_mut() {
                    eq.kind = EquationKind::Prismatic {
                        perpendicular: rotate90cw(&axis),
                        anchor_a: ri,
                        anchor_b: rj,
                    };
                }
            }
            ConstraintKind::Gear { .. } | ConstraintKind::Motor { .. } => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::solver::{GsSolver, GsSolverConfig};
    use approx::assert_relative_eq;
    use sim2d_types::Shape;

    const DT: f64 = 1.0 / 60.0;

    #[test]
    fn test_distance_between_bodies() {
        let a = Body::new(1.0);
        let b = Body::new(1.0).with_position(Vec2::new(3.0, 4.0));
        let mut joint = Constraint::distance_between(0, &a, 1, &b);
        joint.update(&[a, b]);

        match &joint.equations()[0].kind {
            EquationKind::Distance {
                normal, distance, ..
            } => {
                assert_relative_eq!(*distance, 5.0);
                assert_relative_eq!(*normal, Vec2::new(0.6, 0.8));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_distance_limits_toggle_equation() {
        let a = Body::new(1.0);
        let b = Body::new(1.0).with_position(Vec2::new(2.0, 0.0));
        let mut rope = Constraint::distance(0, 1, Vec2::zeros(), Vec2::zeros(), 3.0)
            .with_limits(None, Some(3.0));

        let mut bodies = vec![a, b];
        rope.update(&bodies);
        assert!(!rope.equations()[0].enabled);

        bodies[1].position = Vec2::new(4.0, 0.0);
        rope.update(&bodies);
        let eq = &rope.equations()[0];
        assert!(eq.enabled);
        assert_eq!(eq.max_force, 0.0);
    }

    #[test]
    fn test_revolute_holds_pivot() {
        let mut bodies = vec![
            Body::new_static(),
            Body::new(1.0)
                .with_position(Vec2::new(1.0, 0.0))
                .with_velocity(Vec2::new(0.0, -1.0))
                .with_shape(Shape::circle(0.2)),
        ];
        let mut joint = Constraint::revolute(0, 1, Vec2::zeros(), Vec2::new(-1.0, 0.0));
        joint.update(&bodies);

        let mut solver = GsSolver::new(GsSolverConfig::high_accuracy());
        solver.solve(DT, joint.equations_mut(), &mut bodies);

        // The pivot point of B stops moving
        let pivot_velocity = bodies[1].velocity_at_point(&Vec2::new(-1.0, 0.0));
        assert!(pivot_velocity.norm() < 0.1);
        // while B swings around it
        assert!(bodies[1].angular_velocity < 0.0);
    }

    #[test]
    fn test_motor_drives_relative_speed() {
        let mut bodies = vec![
            Body::new_static(),
            Body::new(1.0).with_shape(Shape::circle(1.0)),
        ];
        let mut motor = Constraint::motor(0, 1, 2.0);
        motor.update(&bodies);
        GsSolver::new(GsSolverConfig::high_accuracy()).solve(DT, motor.equations_mut(), &mut bodies);

        // ratio·ωB - ωA → -speed, scaled by the SPOOK factor b
        assert_relative_eq!(bodies[1].angular_velocity, -2.0 * 16.0 / 17.0, epsilon = 1e-2);
    }

    #[test]
    fn test_prismatic_perpendicular() {
        let bodies = vec![Body::new(1.0).with_angle(std::f64::consts::FRAC_PI_2), Body::new(1.0)];
        let mut joint = Constraint::prismatic(0, 1, Vec2::zeros(), Vec2::zeros(), Vec2::x(), 0.0);
        joint.update(&bodies);

        match &joint.equations()[0].kind {
            EquationKind::Prismatic { perpendicular, .. } => {
                assert_relative_eq!(*perpendicular, Vec2::new(1.0, 0.0), epsilon = 1e-12);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(joint.equations().len(), 2);
    }

    #[test]
    fn test_max_force_and_bodies() {
        let mut joint = Constraint::gear(0, 1, 2.0, 0.0).with_max_force(5.0);
        assert_eq!(joint.equations()[0].max_force, 5.0);
        assert!(joint.connects(1, 0));

        joint.set_bodies(3, 4);
        assert_eq!(joint.equations()[0].body_a, 3);
        assert!(joint.connects(3, 4));
    }
}
