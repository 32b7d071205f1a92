//! Collision detection and the stepping world for 2D rigid bodies.
//!
//! This crate turns bodies and shapes from [`sim2d_types`] into contact
//! equations, and drives the solver from [`sim2d_constraint`] once per step.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  Owns: bodies, joints, springs, materials, contact events   │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Broadphase                              │
//! │  Naive, Sweep-and-Prune, Grid → candidate body pairs        │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Narrowphase                             │
//! │  Shape-pair dispatch → contact + friction equations         │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Islands + Gauss-Seidel solver                     │
//! │  (sim2d-constraint)                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sim2d_core::World;
//! use sim2d_types::{Body, Shape, Vec2};
//!
//! let mut world = World::default();
//! world.add_body(Body::new_static().with_shape(Shape::plane()));
//! let ball = world.add_body(
//!     Body::new(1.0)
//!         .with_position(Vec2::new(0.0, 2.0))
//!         .with_shape(Shape::circle(0.5)),
//! );
//!
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0).unwrap();
//! }
//!
//! // Resting on the ground.
//! let y = world.body(ball).unwrap().position.y;
//! assert!((y - 0.5).abs() < 0.05);
//! ```

#![doc(html_root_url = "https://docs.rs/sim2d-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // Contact counts are tiny
)]

pub mod broadphase;
mod error;
pub mod narrowphase;
mod springs;
mod world;

pub use broadphase::{
    can_collide, BoundingVolume, Broadphase, BroadphaseAlgorithm, BroadphaseConfig,
    BroadphaseDetector, GridBroadphase, GridConfig, NaiveBroadphase, SweepAndPrune,
    SweepAndPruneConfig,
};
pub use error::{CollisionError, Result};
pub use narrowphase::{Narrowphase, NarrowphaseConfig, PairHandler, PairTable, ShapeRef};
pub use springs::{LinearSpring, RotationalSpring, Spring};
pub use world::{ContactEvent, SleepMode, StepReport, World, WorldConfig};
