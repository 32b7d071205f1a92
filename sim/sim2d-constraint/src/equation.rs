//! Scalar constraint rows.
//!
//! Every constraint the solver sees is an [`Equation`]: one row `G` of the
//! Jacobian over the six velocity components `(vA, ωA, vB, ωB)` of its two
//! bodies, a position error `Gq`, force bounds, and SPOOK regularization
//! derived from a stiffness and a relaxation time.
//!
//! # SPOOK parameters
//!
//! For timestep `h`, stiffness `k` and relaxation `d`:
//!
//! ```text
//! a = 4 / (h (1 + 4d))
//! b = 4d / (1 + 4d)
//! ε = 4 / (h² k (1 + 4d))
//! ```
//!
//! The right-hand side is `B = -a·Gq - b·GW - h·GiMf`, and the inverse
//! effective mass is `1 / (G M⁻¹ Gᵀ + ε)`.
//!
//! # Layout
//!
//! The variant data in [`EquationKind`] is what narrowphase and joints write
//! each step. Anchor points are relative to the body origin but expressed in
//! world orientation, so the Jacobian needs no further rotation.

use smallvec::SmallVec;

use sim2d_types::math::cross;
use sim2d_types::{Body, Vec2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default equation stiffness.
pub const DEFAULT_STIFFNESS: f64 = 1e6;

/// Default equation relaxation, in timesteps.
pub const DEFAULT_RELAXATION: f64 = 4.0;

/// Constraint-specific data of an equation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EquationKind {
    /// Non-penetration along a contact normal.
    Contact {
        /// Unit normal pointing from body A towards body B.
        normal: Vec2,
        /// Contact point on A, relative to A's origin.
        contact_point_a: Vec2,
        /// Contact point on B, relative to B's origin.
        contact_point_b: Vec2,
        /// Restitution coefficient.
        restitution: f64,
        /// Whether the bodies were apart on the previous step.
        first_impact: bool,
        /// Overlap depth at creation; negative when separated.
        penetration: f64,
    },
    /// Coulomb friction along a contact tangent.
    Friction {
        /// Unit tangent.
        tangent: Vec2,
        /// Application point on A, relative to A's origin.
        contact_point_a: Vec2,
        /// Application point on B, relative to B's origin.
        contact_point_b: Vec2,
        /// Friction coefficient bounding the tangential force.
        friction_coefficient: f64,
        /// Indices of the sibling contact equations whose normal force
        /// bounds this row. Empty means the static force bounds apply.
        contacts: SmallVec<[usize; 2]>,
    },
    /// Keep two anchors at a fixed distance.
    Distance {
        /// Unit direction from anchor A to anchor B.
        normal: Vec2,
        /// Anchor on A, relative to A's origin.
        anchor_a: Vec2,
        /// Anchor on B, relative to B's origin.
        anchor_b: Vec2,
        /// Target distance.
        distance: f64,
    },
    /// Keep two anchors coincident along one axis.
    PointToPoint {
        /// Unit axis.
        axis: Vec2,
        /// Anchor on A, relative to A's origin.
        anchor_a: Vec2,
        /// Anchor on B, relative to B's origin.
        anchor_b: Vec2,
    },
    /// Keep anchor B on the line through anchor A along A's axis.
    Prismatic {
        /// Unit vector perpendicular to the sliding axis.
        perpendicular: Vec2,
        /// Anchor on A, relative to A's origin.
        anchor_a: Vec2,
        /// Anchor on B, relative to B's origin.
        anchor_b: Vec2,
    },
    /// Drive `ratio·ωB - ωA` towards the equation's relative velocity.
    RotationalVelocity {
        /// Gear ratio.
        ratio: f64,
    },
    /// Hold `ratio·θA - θB + angle` at zero.
    AngleLock {
        /// Angle offset.
        angle: f64,
        /// Gear ratio.
        ratio: f64,
    },
}

/// Per-body scratch state the solver accumulates impulses into.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverBody {
    /// Inverse mass used while solving (zero for sleeping or non-dynamic bodies).
    pub inv_mass: f64,
    /// Inverse inertia used while solving.
    pub inv_inertia: f64,
    /// Accumulated linear velocity change.
    pub vlambda: Vec2,
    /// Accumulated angular velocity change.
    pub wlambda: f64,
}

impl SolverBody {
    /// Solver view of a body.
    #[must_use]
    pub fn from_body(body: &Body) -> Self {
        if body.is_dynamic() && !body.is_sleeping() {
            Self {
                inv_mass: body.inv_mass(),
                inv_inertia: body.inv_inertia(),
                vlambda: Vec2::zeros(),
                wlambda: 0.0,
            }
        } else {
            Self::default()
        }
    }
}

/// One scalar constraint row between two bodies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Equation {
    /// Index of body A in the world's body array.
    pub body_a: usize,
    /// Index of body B in the world's body array.
    pub body_b: usize,
    /// Lower force bound.
    pub min_force: f64,
    /// Upper force bound.
    pub max_force: f64,
    /// Stiffness of the constraint.
    pub stiffness: f64,
    /// Relaxation time, in timesteps.
    pub relaxation: f64,
    /// Disabled equations are kept for bookkeeping but never solved.
    pub enabled: bool,
    /// Force applied during the last solve.
    pub multiplier: f64,
    /// Target relative velocity added to `GW`.
    pub relative_velocity: f64,
    /// Constant added to the position error.
    pub offset: f64,
    /// Constraint data.
    pub kind: EquationKind,
    g: [f64; 6],
    a: f64,
    b: f64,
    epsilon: f64,
    timestep: f64,
}

impl Equation {
    /// Create an equation with explicit force bounds.
    #[must_use]
    pub fn new(body_a: usize, body_b: usize, min_force: f64, max_force: f64, kind: EquationKind) -> Self {
        Self {
            body_a,
            body_b,
            min_force,
            max_force,
            stiffness: DEFAULT_STIFFNESS,
            relaxation: DEFAULT_RELAXATION,
            enabled: true,
            multiplier: 0.0,
            relative_velocity: 0.0,
            offset: 0.0,
            kind,
            g: [0.0; 6],
            a: 0.0,
            b: 0.0,
            epsilon: 0.0,
            timestep: -1.0,
        }
    }

    /// A contact row with zeroed geometry; it can only push (`[0, +∞)`).
    #[must_use]
    pub fn contact(body_a: usize, body_b: usize) -> Self {
        Self::new(
            body_a,
            body_b,
            0.0,
            f64::INFINITY,
            EquationKind::Contact {
                normal: Vec2::zeros(),
                contact_point_a: Vec2::zeros(),
                contact_point_b: Vec2::zeros(),
                restitution: 0.0,
                first_impact: false,
                penetration: 0.0,
            },
        )
    }

    /// A friction row with zeroed geometry and unbounded force.
    #[must_use]
    pub fn friction(body_a: usize, body_b: usize, friction_coefficient: f64) -> Self {
        Self::new(
            body_a,
            body_b,
            f64::NEG_INFINITY,
            f64::INFINITY,
            EquationKind::Friction {
                tangent: Vec2::zeros(),
                contact_point_a: Vec2::zeros(),
                contact_point_b: Vec2::zeros(),
                friction_coefficient,
                contacts: SmallVec::new(),
            },
        )
    }

    /// An angular velocity row: `ratio·ωB - ωA + relative_velocity → 0`.
    #[must_use]
    pub fn rotational_velocity(body_a: usize, body_b: usize, ratio: f64, max_force: f64) -> Self {
        Self::new(
            body_a,
            body_b,
            -max_force,
            max_force,
            EquationKind::RotationalVelocity { ratio },
        )
    }

    /// An angle lock row: `ratio·θA - θB + angle → 0`.
    #[must_use]
    pub fn angle_lock(body_a: usize, body_b: usize, angle: f64, ratio: f64, max_force: f64) -> Self {
        Self::new(
            body_a,
            body_b,
            -max_force,
            max_force,
            EquationKind::AngleLock { angle, ratio },
        )
    }

    /// Set stiffness.
    #[must_use]
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Set relaxation.
    #[must_use]
    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    /// Set symmetric force bounds `[-max_force, max_force]`.
    pub fn set_max_force(&mut self, max_force: f64) {
        self.min_force = -max_force;
        self.max_force = max_force;
    }

    /// Whether `min_force <= max_force`.
    #[must_use]
    pub fn has_valid_bounds(&self) -> bool {
        self.min_force <= self.max_force
    }

    /// Whether this is a contact row.
    #[must_use]
    pub fn is_contact(&self) -> bool {
        matches!(self.kind, EquationKind::Contact { .. })
    }

    /// Whether this is a friction row.
    #[must_use]
    pub fn is_friction(&self) -> bool {
        matches!(self.kind, EquationKind::Friction { .. })
    }

    /// Contact normal, for contact rows.
    #[must_use]
    pub fn contact_normal(&self) -> Option<Vec2> {
        match &self.kind {
            EquationKind::Contact { normal, .. } => Some(*normal),
            _ => None,
        }
    }

    /// Contact penetration, for contact rows.
    #[must_use]
    pub fn penetration(&self) -> Option<f64> {
        match &self.kind {
            EquationKind::Contact { penetration, .. } => Some(*penetration),
            _ => None,
        }
    }

    /// Jacobian row as of the last [`Equation::update_jacobian`].
    #[must_use]
    pub fn jacobian(&self) -> &[f64; 6] {
        &self.g
    }

    /// SPOOK `(a, b, ε)` as of the last [`Equation::update_spook_params`].
    #[must_use]
    pub fn spook_params(&self) -> (f64, f64, f64) {
        (self.a, self.b, self.epsilon)
    }

    /// Recompute SPOOK parameters for timestep `h`.
    pub fn update_spook_params(&mut self, h: f64) {
        let k = self.stiffness;
        let d = self.relaxation;
        self.a = 4.0 / (h * (1.0 + 4.0 * d));
        self.b = (4.0 * d) / (1.0 + 4.0 * d);
        self.epsilon = 4.0 / (h * h * k * (1.0 + 4.0 * d));
        self.timestep = h;
    }

    /// Recompute the Jacobian row from the current kind data and body poses.
    pub fn update_jacobian(&mut self, bodies: &[Body]) {
        self.g = match &self.kind {
            EquationKind::Contact {
                normal: n,
                contact_point_a: ri,
                contact_point_b: rj,
                ..
            }
            | EquationKind::Friction {
                tangent: n,
                contact_point_a: ri,
                contact_point_b: rj,
                ..
            }
            | EquationKind::Distance {
                normal: n,
                anchor_a: ri,
                anchor_b: rj,
                ..
            }
            | EquationKind::PointToPoint {
                axis: n,
                anchor_a: ri,
                anchor_b: rj,
            } => [-n.x, -n.y, -cross(ri, n), n.x, n.y, cross(rj, n)],
            EquationKind::Prismatic {
                perpendicular: t,
                anchor_a: ri,
                anchor_b: rj,
            } => {
                let gg = self.separation(bodies, ri, rj);
                [-t.x, -t.y, -cross(ri, t) + cross(t, &gg), t.x, t.y, cross(rj, t)]
            }
            EquationKind::RotationalVelocity { ratio } => [0.0, 0.0, -1.0, 0.0, 0.0, *ratio],
            EquationKind::AngleLock { ratio, .. } => [0.0, 0.0, *ratio, 0.0, 0.0, -1.0],
        };
    }

    /// World vector from anchor A to anchor B.
    fn separation(&self, bodies: &[Body], ri: &Vec2, rj: &Vec2) -> Vec2 {
        let (Some(bi), Some(bj)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            return Vec2::zeros();
        };
        (bj.position + rj) - (bi.position + ri)
    }

    /// Position error `Gq`.
    #[must_use]
    pub fn compute_gq(&self, bodies: &[Body]) -> f64 {
        let value = match &self.kind {
            EquationKind::Contact {
                normal,
                contact_point_a,
                contact_point_b,
                ..
            } => normal.dot(&self.separation(bodies, contact_point_a, contact_point_b)),
            EquationKind::Distance {
                normal,
                anchor_a,
                anchor_b,
                distance,
            } => normal.dot(&self.separation(bodies, anchor_a, anchor_b)) - distance,
            EquationKind::PointToPoint {
                axis,
                anchor_a,
                anchor_b,
            } => axis.dot(&self.separation(bodies, anchor_a, anchor_b)),
            EquationKind::Prismatic {
                perpendicular,
                anchor_a,
                anchor_b,
            } => perpendicular.dot(&self.separation(bodies, anchor_a, anchor_b)),
            EquationKind::AngleLock { angle, ratio } => {
                match (bodies.get(self.body_a), bodies.get(self.body_b)) {
                    (Some(bi), Some(bj)) => ratio * bi.angle - bj.angle + angle,
                    _ => 0.0,
                }
            }
            EquationKind::Friction { .. } | EquationKind::RotationalVelocity { .. } => {
                return 0.0
            }
        };
        value + self.offset
    }

    /// Constraint velocity `G·W` plus the target relative velocity.
    #[must_use]
    pub fn compute_gw(&self, bodies: &[Body]) -> f64 {
        let (Some(bi), Some(bj)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            return 0.0;
        };
        self.dot6(
            &bi.velocity,
            bi.angular_velocity,
            &bj.velocity,
            bj.angular_velocity,
        ) + self.relative_velocity
    }

    /// Constraint velocity of the impulses accumulated so far, `G·Wλ`.
    #[must_use]
    pub fn compute_gw_lambda(&self, solver: &[SolverBody]) -> f64 {
        let (Some(si), Some(sj)) = (solver.get(self.body_a), solver.get(self.body_b)) else {
            return 0.0;
        };
        self.dot6(&si.vlambda, si.wlambda, &sj.vlambda, sj.wlambda)
    }

    /// `G·M⁻¹·f` for the bodies' external forces.
    #[must_use]
    pub fn compute_gimf(&self, bodies: &[Body], solver: &[SolverBody]) -> f64 {
        let (Some(bi), Some(bj)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            return 0.0;
        };
        let (Some(si), Some(sj)) = (solver.get(self.body_a), solver.get(self.body_b)) else {
            return 0.0;
        };
        self.dot6(
            &(bi.force * si.inv_mass),
            bi.angular_force * si.inv_inertia,
            &(bj.force * sj.inv_mass),
            bj.angular_force * sj.inv_inertia,
        )
    }

    /// `G·M⁻¹·Gᵀ`.
    #[must_use]
    pub fn compute_gimgt(&self, solver: &[SolverBody]) -> f64 {
        let (Some(si), Some(sj)) = (solver.get(self.body_a), solver.get(self.body_b)) else {
            return 0.0;
        };
        let g = &self.g;
        si.inv_mass * (g[0] * g[0] + g[1] * g[1])
            + si.inv_inertia * g[2] * g[2]
            + sj.inv_mass * (g[3] * g[3] + g[4] * g[4])
            + sj.inv_inertia * g[5] * g[5]
    }

    /// Right-hand side `B` for timestep `h`.
    ///
    /// A contact on first impact with non-zero restitution ignores its
    /// position error and targets a bounce velocity instead.
    #[must_use]
    pub fn compute_b(&self, bodies: &[Body], solver: &[SolverBody], h: f64) -> f64 {
        let gw = self.compute_gw(bodies);
        let gimf = self.compute_gimf(bodies, solver);
        match &self.kind {
            EquationKind::Contact {
                restitution,
                first_impact,
                ..
            } if *first_impact && *restitution != 0.0 => -(1.0 + restitution) * gw - h * gimf,
            EquationKind::Friction { .. } | EquationKind::RotationalVelocity { .. } => {
                -gw * self.b - h * gimf
            }
            _ => -self.compute_gq(bodies) * self.a - gw * self.b - h * gimf,
        }
    }

    /// Inverse effective mass `1 / (G M⁻¹ Gᵀ + ε)`.
    #[must_use]
    pub fn compute_inv_c(&self, solver: &[SolverBody]) -> f64 {
        let denom = self.compute_gimgt(solver) + self.epsilon;
        if denom > 0.0 {
            1.0 / denom
        } else {
            0.0
        }
    }

    /// Accumulate the velocity change of an impulse `delta_lambda` along this row.
    pub fn add_to_wlambda(&self, solver: &mut [SolverBody], delta_lambda: f64) {
        let g = &self.g;
        if let Some(si) = solver.get_mut(self.body_a) {
            si.vlambda += Vec2::new(g[0], g[1]) * (si.inv_mass * delta_lambda);
            si.wlambda += si.inv_inertia * g[2] * delta_lambda;
        }
        if let Some(sj) = solver.get_mut(self.body_b) {
            sj.vlambda += Vec2::new(g[3], g[4]) * (sj.inv_mass * delta_lambda);
            sj.wlambda += sj.inv_inertia * g[5] * delta_lambda;
        }
    }

    fn dot6(&self, va: &Vec2, wa: f64, vb: &Vec2, wb: f64) -> f64 {
        let g = &self.g;
        g[0] * va.x + g[1] * va.y + g[2] * wa + g[3] * vb.x + g[4] * vb.y + g[5] * wb
    }
}
