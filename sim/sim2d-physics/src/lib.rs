//! Unified 2D rigid-body physics API.
//!
//! This crate re-exports the complete 2D simulation stack:
//!
//! - [`sim2d_types`] - Bodies, shapes, materials, bounding boxes
//! - [`sim2d_constraint`] - Equations, joints, islands, Gauss-Seidel solver
//! - [`sim2d_core`] - Broadphase, narrowphase, springs, the stepping world
//!
//! # Quick Start
//!
//! ```
//! use sim2d_physics::prelude::*;
//!
//! let mut world = World::default();
//! world.add_body(Body::new_static().with_shape(Shape::plane()));
//! let ball = world.add_body(
//!     Body::new(1.0)
//!         .with_position(Vec2::new(0.0, 3.0))
//!         .with_shape(Shape::circle(0.5)),
//! );
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0).unwrap();
//! }
//!
//! let body = world.body(ball).unwrap();
//! println!("Final height: {:.2} m", body.position.y);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    sim2d-physics (this crate)                   │
//! │                     Unified API / re-exports                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//!               ┌─────────────────────────────────────┐
//!               │             sim2d-core              │
//!               │ Broadphase, Narrowphase, World      │
//!               └──────────────────┬──────────────────┘
//!                                  │
//!                                  ▼
//!               ┌─────────────────────────────────────┐
//!               │          sim2d-constraint           │
//!               │ Equations, Joints, Islands, Solver  │
//!               └──────────────────┬──────────────────┘
//!                                  │
//!                                  ▼
//!               ┌─────────────────────────────────────┐
//!               │            sim2d-types              │
//!               │ Bodies, Shapes, Materials, AABBs    │
//!               └─────────────────────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/sim2d-physics/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

// Re-export sub-crates
pub use sim2d_constraint;
pub use sim2d_core;
pub use sim2d_types;

// Re-export nalgebra for convenience
pub use nalgebra;

/// Prelude module for convenient imports.
///
/// ```
/// use sim2d_physics::prelude::*;
/// ```
pub mod prelude {
    // ========================================================================
    // Data from sim2d-types
    // ========================================================================

    // Bodies and shapes
    pub use sim2d_types::{Body, BodyId, BodyType, ConvexPolygon, Shape, ShapeKind, ShapeType, SleepState};

    // Bounds
    pub use sim2d_types::{Aabb, Axis, Ray};

    // Materials
    pub use sim2d_types::{ContactMaterial, Material, MaterialId, MaterialTable};

    // Math
    pub use sim2d_types::math::{cross, rotate, rotate90cw};
    pub use sim2d_types::Vec2;

    // Errors
    pub use sim2d_types::SimError;

    // ========================================================================
    // Equations and solving from sim2d-constraint
    // ========================================================================

    pub use sim2d_constraint::{
        Constraint, ConstraintKind, Equation, EquationKind, GsSolver, GsSolverConfig, Island,
        IslandSplitter, Islands, SolverResult,
    };

    // ========================================================================
    // Collision and stepping from sim2d-core
    // ========================================================================

    pub use sim2d_core::{
        BoundingVolume, Broadphase, BroadphaseAlgorithm, BroadphaseConfig, BroadphaseDetector,
        CollisionError, ContactEvent, GridBroadphase, GridConfig, LinearSpring, NaiveBroadphase,
        Narrowphase, NarrowphaseConfig, PairHandler, PairTable, RotationalSpring, ShapeRef,
        SleepMode, Spring, StepReport, SweepAndPrune, SweepAndPruneConfig, World, WorldConfig,
    };
}
