//! Constraint equations, islands, and the Gauss-Seidel solver for 2D bodies.
//!
//! Everything the solver needs is expressed as scalar [`Equation`]s: one
//! Jacobian row between two bodies plus SPOOK stabilization parameters and
//! force bounds. Contacts and friction rows come from the narrowphase in
//! `sim2d-core`; joints produce theirs through [`Constraint`].
//!
//! # Pipeline
//!
//! ```text
//! Constraint::update ─┐
//!                     ├─> Vec<Equation> ─> IslandSplitter::split ─> GsSolver::solve_island
//! narrowphase rows  ──┘
//! ```
//!
//! # SPOOK
//!
//! With stiffness `k`, relaxation `d` and timestep `h`:
//!
//! ```text
//! a = 4 / (h (1 + 4d))
//! b = 4d / (1 + 4d)
//! ε = 4 / (h² k (1 + 4d))
//! B = -a·Gq - b·GW - h·GiMf
//! ```
//!
//! # Islands
//!
//! [`IslandSplitter`] groups dynamic bodies connected through enabled
//! equations. Static and kinematic bodies never join islands, so two
//! stacks resting on the same ground stay independent.
//!
//! # Example
//!
//! ```
//! use sim2d_constraint::{Constraint, GsSolver, GsSolverConfig, IslandSplitter};
//! use sim2d_types::{Body, Shape, Vec2};
//!
//! let mut bodies = vec![
//!     Body::new(1.0).with_shape(Shape::circle(0.5)),
//!     Body::new(1.0).with_position(Vec2::new(2.0, 0.0)).with_shape(Shape::circle(0.5)),
//!     Body::new(1.0).with_position(Vec2::new(9.0, 0.0)).with_shape(Shape::circle(0.5)),
//! ];
//! let mut rod = Constraint::distance_between(0, &bodies[0], 1, &bodies[1]);
//! rod.update(&bodies);
//!
//! let mut equations = rod.equations().to_vec();
//! let islands = IslandSplitter::new().split(&bodies, &equations);
//! assert_eq!(islands.num_islands(), 2);
//!
//! let mut solver = GsSolver::new(GsSolverConfig::default());
//! for island in islands.islands() {
//!     solver.solve_island(1.0 / 60.0, &mut equations, island, &mut bodies);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/sim2d-constraint/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,  // nalgebra constructors aren't const
    clippy::suboptimal_flops,       // Formulas read closer to the math without mul_add
    clippy::many_single_char_names, // a, b, h, k follow the SPOOK notation
)]

mod constraint;
mod equation;
mod islands;
mod solver;

pub use constraint::{Constraint, ConstraintKind};
pub use equation::{
    Equation, EquationKind, SolverBody, DEFAULT_RELAXATION, DEFAULT_STIFFNESS,
};
pub use islands::{Island, IslandSplitter, IslandStatistics, Islands};
pub use solver::{GsSolver, GsSolverConfig, SolverResult};

// Re-export types equations are written against
pub use sim2d_types::{Body, Vec2};
