//! Core types for 2D rigid-body simulation.
//!
//! This crate provides the data the collision and constraint layers read:
//!
//! - [`Body`] - Kinematic state, mass properties, shapes, cached bounds
//! - [`Shape`] / [`ShapeKind`] - Circle, particle, plane, convex, line, box, capsule
//! - [`Aabb`] / [`Ray`] - Bounding boxes and segment queries
//! - [`ContactMaterial`] / [`MaterialTable`] - Friction and restitution per surface pair
//! - [`math`] - Planar vector helpers over nalgebra
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It performs no
//! collision detection and no solving; those live in `sim2d-core` and
//! `sim2d-constraint`.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: up
//! - Angles: radians, counter-clockwise positive
//!
//! # Example
//!
//! ```
//! use sim2d_types::{Body, Shape, Vec2};
//!
//! let mut body = Body::new(1.0)
//!     .with_position(Vec2::new(0.0, 2.0))
//!     .with_shape(Shape::circle(0.5));
//! body.update_aabb();
//!
//! assert!(body.is_dynamic());
//! assert!(body.aabb().contains_point(&Vec2::new(0.0, 2.5)));
//! ```

#![doc(html_root_url = "https://docs.rs/sim2d-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod aabb;
mod body;
mod error;
mod material;
pub mod math;
mod shape;

pub use aabb::{Aabb, Axis, Ray};
pub use body::{Body, BodyId, BodyType, SleepState};
pub use error::{Result, SimError};
pub use material::{ContactMaterial, Material, MaterialId, MaterialTable};
pub use math::Vec2;
pub use shape::{segment_points, ConvexPolygon, Shape, ShapeKind, ShapeType};
