//! Gauss-Seidel (sequential impulse) velocity solver.
//!
//! The solver visits every enabled equation in a fixed order and applies the
//! impulse that equation needs immediately, so later equations in the same
//! sweep already see the updated velocities. Impulses are accumulated per
//! equation and clamped against `[min_force·h, max_force·h]` on the
//! running total.
//!
//! Friction rows with sibling contacts get their bounds recomputed on every
//! visit from the contacts' latest forces: `±μ · mean(contact multiplier)`.
//!
//! The solver never fails. It stops after the configured iteration count, or
//! earlier when the largest multiplier change `max |Δλ|` of a sweep drops to
//! the tolerance, and reports which happened in [`SolverResult`].
//!
//! # Example
//!
//! ```
//! use sim2d_constraint::{Equation, EquationKind, GsSolver, GsSolverConfig};
//! use sim2d_types::{Body, Vec2};
//!
//! let mut bodies = vec![
//!     Body::new_static(),
//!     Body::new(1.0).with_position(Vec2::new(0.0, 1.0)).with_velocity(Vec2::new(0.0, -1.0)),
//! ];
//! let mut contact = Equation::contact(0, 1);
//! contact.kind = EquationKind::Contact {
//!     normal: Vec2::y(),
//!     contact_point_a: Vec2::new(0.0, 0.0),
//!     contact_point_b: Vec2::new(0.0, -1.0),
//!     restitution: 0.0,
//!     first_impact: false,
//!     penetration: 0.0,
//! };
//!
//! let mut solver = GsSolver::new(GsSolverConfig::default());
//! let result = solver.solve(1.0 / 60.0, std::slice::from_mut(&mut contact), &mut bodies);
//!
//! assert!(result.iterations_used > 0);
//! assert!(bodies[1].velocity.y > -0.1);
//! ```

use sim2d_types::{Body, Result, SimError};
use tracing::{debug, trace};

use crate::equation::{Equation, EquationKind, SolverBody};
use crate::islands::Island;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the Gauss-Seidel solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GsSolverConfig {
    /// Maximum sweeps over the equations per solve.
    pub iterations: usize,

    /// Stop once the largest impulse change of a sweep is at most this.
    ///
    /// Measured as `max |Δλ|` over all equations in one sweep, in the units of
    /// the equations' multipliers, not as a constraint-velocity residual.
    /// Heavier bodies need a larger value for the same velocity accuracy.
    /// Zero runs every iteration unless the system is solved exactly.
    pub tolerance: f64,

    /// Solve with a zero right-hand side (only corrects accumulated impulses).
    pub use_zero_rhs: bool,
}

impl Default for GsSolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: 1e-7,
            use_zero_rhs: false,
        }
    }
}

impl GsSolverConfig {
    /// Fewer iterations for interactive scenes.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            iterations: 5,
            tolerance: 1e-5,
            use_zero_rhs: false,
        }
    }

    /// More iterations and a tight tolerance for stacking-heavy scenes.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            iterations: 50,
            tolerance: 1e-10,
            use_zero_rhs: false,
        }
    }

    /// Set the iteration count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(SimError::invalid_config("iterations must be at least 1"));
        }
        if !(self.tolerance >= 0.0) || !self.tolerance.is_finite() {
            return Err(SimError::invalid_config(
                "tolerance must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverResult {
    /// Sweeps performed.
    pub iterations_used: usize,
    /// Largest multiplier change `max |Δλ|` in the final sweep.
    pub max_delta: f64,
    /// Whether the tolerance was reached before the iteration budget ran out.
    pub converged: bool,
    /// Number of enabled equations solved.
    pub equations_solved: usize,
}

impl SolverResult {
    /// Result of a solve with nothing to do.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converged: true,
            ..Self::default()
        }
    }

    /// Whether no equation was solved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equations_solved == 0
    }
}

/// Gauss-Seidel solver with reusable scratch buffers.
#[derive(Debug, Clone, Default)]
pub struct GsSolver {
    config: GsSolverConfig,
    active: Vec<usize>,
    lambda: Vec<f64>,
    rhs: Vec<f64>,
    inv_c: Vec<f64>,
    solver_bodies: Vec<SolverBody>,
    touched: Vec<usize>,
    marked: Vec<bool>,
}

impl GsSolver {
    /// Create a solver.
    #[must_use]
    pub fn new(config: GsSolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &GsSolverConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: GsSolverConfig) {
        self.config = config;
    }

    /// Solve every enabled equation, in slice order.
    pub fn solve(&mut self, dt: f64, equations: &mut [Equation], bodies: &mut [Body]) -> SolverResult {
        let n = bodies.len();
        self.active.clear();
        self.active.extend(
            equations
                .iter()
                .enumerate()
                .filter(|(_, eq)| eq.enabled && eq.body_a < n && eq.body_b < n)
                .map(|(i, _)| i),
        );
        self.run(dt, equations, bodies)
    }

    /// Solve the enabled equations of one island, in island order.
    ///
    /// `equations` is the full slice the island's indices refer to.
    pub fn solve_island(
        &mut self,
        dt: f64,
        equations: &mut [Equation],
        island: &Island,
        bodies: &mut [Body],
    ) -> SolverResult {
        let n = bodies.len();
        self.active.clear();
        self.active.extend(island.equations.iter().copied().filter(|&i| {
            equations
                .get(i)
                .is_some_and(|eq| eq.enabled && eq.body_a < n && eq.body_b < n)
        }));
        self.run(dt, equations, bodies)
    }

    fn run(&mut self, h: f64, equations: &mut [Equation], bodies: &mut [Body]) -> SolverResult {
        if self.active.is_empty() {
            return SolverResult::empty();
        }

        self.prepare_bodies(equations, bodies);

        let count = self.active.len();
        self.lambda.clear();
        self.lambda.resize(count, 0.0);
        self.rhs.clear();
        self.inv_c.clear();

        for &j in &self.active {
            let eq = &mut equations[j];
            eq.update_spook_params(h);
            eq.update_jacobian(bodies);
            let b = if self.config.use_zero_rhs {
                0.0
            } else {
                eq.compute_b(bodies, &self.solver_bodies, h)
            };
            self.rhs.push(b);
            self.inv_c.push(eq.compute_inv_c(&self.solver_bodies));
        }

        let mut result = SolverResult {
            equations_solved: count,
            ..SolverResult::default()
        };

        for iteration in 0..self.config.iterations {
            let mut max_delta: f64 = 0.0;

            for k in 0..count {
                let j = self.active[k];
                update_friction_bounds(equations, j);
                let delta = self.iterate_equation(k, &mut equations[j], h);
                max_delta = max_delta.max(delta.abs());
            }

            result.iterations_used = iteration + 1;
            result.max_delta = max_delta;
            trace!("GS iteration {} max delta {:.3e}", iteration, max_delta);

            if max_delta <= self.config.tolerance {
                result.converged = true;
                break;
            }
        }

        for &i in &self.touched {
            let sb = self.solver_bodies[i];
            let body = &mut bodies[i];
            body.velocity += sb.vlambda;
            body.angular_velocity += sb.wlambda;
        }

        debug!(
            "GS solved {} equations in {} iterations (converged: {})",
            count, result.iterations_used, result.converged
        );
        result
    }

    /// Reset solver state for every body the active equations touch.
    fn prepare_bodies(&mut self, equations: &[Equation], bodies: &[Body]) {
        let n = bodies.len();
        if self.solver_bodies.len() < n {
            self.solver_bodies.resize(n, SolverBody::default());
        }
        self.marked.clear();
        self.marked.resize(n, false);
        self.touched.clear();

        for &j in &self.active {
            let eq = &equations[j];
            for i in [eq.body_a, eq.body_b] {
                if !self.marked[i] {
                    self.marked[i] = true;
                    self.touched.push(i);
                    self.solver_bodies[i] = SolverBody::from_body(&bodies[i]);
                }
            }
        }
    }

    fn iterate_equation(&mut self, k: usize, eq: &mut Equation, h: f64) -> f64 {
        let lambda_j = self.lambda[k];
        let gw_lambda = eq.compute_gw_lambda(&self.solver_bodies);
        let (_, _, epsilon) = eq.spook_params();

        let mut delta = self.inv_c[k] * (self.rhs[k] - gw_lambda - epsilon * lambda_j);

        let total = lambda_j + delta;
        if total < eq.min_force * h {
            delta = eq.min_force * h - lambda_j;
        } else if total > eq.max_force * h {
            delta = eq.max_force * h - lambda_j;
        }

        self.lambda[k] += delta;
        eq.multiplier = self.lambda[k] / h;
        eq.add_to_wlambda(&mut self.solver_bodies, delta);
        delta
    }
}

/// Couple a friction row's bounds to its contacts' latest normal forces.
fn update_friction_bounds(equations: &mut [Equation], j: usize) {
    let bound = match &equations[j].kind {
        EquationKind::Friction {
            friction_coefficient,
            contacts,
            ..
        } if !contacts.is_empty() => {
            let sum: f64 = contacts
                .iter()
                .filter_map(|&c| equations.get(c))
                .map(|c| c.multiplier)
                .sum();
            #[allow(clippy::cast_precision_loss)]
            let mean = sum / contacts.len() as f64;
            friction_coefficient * mean
        }
        _ => return,
    };
    let eq = &mut equations[j];
    eq.min_force = -bound;
    eq.max_force = bound;
}
