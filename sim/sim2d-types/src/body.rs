//! Rigid bodies.
//!
//! A [`Body`] carries kinematic state, mass properties, its shapes and a
//! cached bounding box. Bodies live in an array owned by the world; the
//! collision and constraint layers refer to them by index into that array
//! and only ever write velocities.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::aabb::Aabb;
use crate::math::{cross, cross_sv, rotate, to_global_frame, to_local_frame, Vec2};
use crate::shape::Shape;
use crate::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static NEXT_BODY_ID: AtomicU32 = AtomicU32::new(1);

/// Unique identifier for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u32);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Allocate a process-wide unique ID.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_BODY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyType {
    /// Moved by forces and contacts.
    #[default]
    Dynamic,
    /// Never moves.
    Static,
    /// Moved only by its own velocity; infinite mass to everything else.
    Kinematic,
}

/// Sleep state of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SleepState {
    /// Simulated normally.
    #[default]
    Awake,
    /// Slow enough that it is counting towards sleep.
    Sleepy,
    /// Neither solved nor integrated until woken.
    Sleeping,
}

/// A rigid body.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    id: BodyId,
    body_type: BodyType,
    mass: f64,
    inv_mass: f64,
    inertia: f64,
    inv_inertia: f64,

    /// Prevent rotation (infinite inertia).
    pub fixed_rotation: bool,
    /// Position of the body origin in world coordinates.
    pub position: Vec2,
    /// Orientation in radians.
    pub angle: f64,
    /// Linear velocity.
    pub velocity: Vec2,
    /// Angular velocity.
    pub angular_velocity: f64,
    /// Force accumulated for the current step.
    pub force: Vec2,
    /// Torque accumulated for the current step.
    pub angular_force: f64,
    /// Fraction of linear velocity lost per second.
    pub damping: f64,
    /// Fraction of angular velocity lost per second.
    pub angular_damping: f64,
    /// Whether contacts with this body push it.
    pub collision_response: bool,

    /// Whether the body may fall asleep.
    pub allow_sleep: bool,
    /// Speed below which the body counts as idle.
    pub sleep_speed_limit: f64,
    /// Idle seconds before the body falls asleep.
    pub sleep_time_limit: f64,
    sleep_state: SleepState,
    idle_time: f64,
    wants_to_sleep: bool,

    shapes: Vec<Shape>,
    aabb: Aabb,
    bounding_radius: f64,
    shapes_locked: bool,
}

impl Body {
    /// Create a body with the given mass.
    ///
    /// A mass of zero (or any non-positive or non-finite value) makes the
    /// body static.
    #[must_use]
    pub fn new(mass: f64) -> Self {
        let body_type = if mass > 0.0 && mass.is_finite() {
            BodyType::Dynamic
        } else {
            BodyType::Static
        };
        let mut body = Self {
            id: BodyId::next(),
            body_type,
            mass: if body_type == BodyType::Dynamic { mass } else { 0.0 },
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            fixed_rotation: false,
            position: Vec2::zeros(),
            angle: 0.0,
            velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            force: Vec2::zeros(),
            angular_force: 0.0,
            damping: 0.1,
            angular_damping: 0.1,
            collision_response: true,
            allow_sleep: true,
            sleep_speed_limit: 0.2,
            sleep_time_limit: 1.0,
            sleep_state: SleepState::Awake,
            idle_time: 0.0,
            wants_to_sleep: false,
            shapes: Vec::new(),
            aabb: Aabb::default(),
            bounding_radius: 0.0,
            shapes_locked: false,
        };
        body.update_mass_properties();
        body
    }

    /// Create a static body.
    #[must_use]
    pub fn new_static() -> Self {
        Self::new(0.0)
    }

    /// Create a kinematic body.
    #[must_use]
    pub fn new_kinematic() -> Self {
        Self::new(0.0).with_body_type(BodyType::Kinematic)
    }

    /// Replace the generated ID.
    #[must_use]
    pub fn with_id(mut self, id: BodyId) -> Self {
        self.id = id;
        self
    }

    /// Set the body type.
    #[must_use]
    pub fn with_body_type(mut self, body_type: BodyType) -> Self {
        self.set_body_type(body_type);
        self
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Set the angle.
    #[must_use]
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set the linear velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, angular_velocity: f64) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Lock rotation.
    #[must_use]
    pub fn with_fixed_rotation(mut self) -> Self {
        self.fixed_rotation = true;
        self.update_mass_properties();
        self
    }

    /// Set linear and angular damping.
    #[must_use]
    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Disable sleeping for this body.
    #[must_use]
    pub fn without_sleep(mut self) -> Self {
        self.allow_sleep = false;
        self
    }

    /// Attach a shape using its own offset and angle.
    ///
    /// Builder form of [`Body::add_shape`] for bodies not yet in a world.
    #[must_use]
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.push_shape(shape);
        self
    }

    /// Body ID.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Body type.
    #[must_use]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Change the body type and recompute mass properties.
    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        self.update_mass_properties();
    }

    /// Whether the body is dynamic.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Whether the body is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// Whether the body is kinematic.
    #[must_use]
    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    /// Mass (zero for non-dynamic bodies).
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Inverse mass (zero for non-dynamic bodies).
    #[must_use]
    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    /// Moment of inertia about the body origin.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Inverse moment of inertia (zero when rotation is impossible).
    #[must_use]
    pub fn inv_inertia(&self) -> f64 {
        self.inv_inertia
    }

    /// Change the mass of a dynamic body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMass`] for a non-positive or non-finite mass.
    pub fn set_mass(&mut self, mass: f64) -> Result<()> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(SimError::InvalidMass(mass));
        }
        self.mass = mass;
        self.update_mass_properties();
        Ok(())
    }

    /// Recompute inverse mass and inertia from the mass and the shapes.
    ///
    /// The mass is split evenly between shapes; each contributes its own
    /// moment plus the parallel-axis term for its offset.
    pub fn update_mass_properties(&mut self) {
        if !self.is_dynamic() {
            self.mass = 0.0;
            self.inv_mass = 0.0;
            self.inertia = f64::INFINITY;
            self.inv_inertia = 0.0;
            return;
        }

        if !(self.mass > 0.0) {
            self.mass = 1.0;
        }
        self.inv_mass = 1.0 / self.mass;
        if self.fixed_rotation || self.shapes.is_empty() {
            self.inertia = f64::INFINITY;
            self.inv_inertia = 0.0;
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let shape_mass = self.mass / self.shapes.len() as f64;
        self.inertia = self
            .shapes
            .iter()
            .map(|s| s.moment_of_inertia(shape_mass) + shape_mass * s.offset.norm_squared())
            .sum();
        self.inv_inertia = if self.inertia > 0.0 {
            1.0 / self.inertia
        } else {
            0.0
        };
    }

    /// Shapes attached to this body.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Mutable access to the shapes.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ShapesLocked`] while the world is stepping.
    pub fn shapes_mut(&mut self) -> Result<&mut [Shape]> {
        self.check_unlocked()?;
        Ok(&mut self.shapes)
    }

    /// Attach a shape at `offset` and `angle` in the body frame.
    ///
    /// Returns the index of the new shape.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ShapesLocked`] while the world is stepping.
    pub fn add_shape(&mut self, mut shape: Shape, offset: Vec2, angle: f64) -> Result<usize> {
        self.check_unlocked()?;
        shape.offset = offset;
        shape.angle = angle;
        Ok(self.push_shape(shape))
    }

    /// Detach the shape at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ShapesLocked`] while the world is stepping, or
    /// [`SimError::ShapeNotFound`] for an out-of-range index.
    pub fn remove_shape(&mut self, index: usize) -> Result<Shape> {
        self.check_unlocked()?;
        if index >= self.shapes.len() {
            return Err(SimError::ShapeNotFound {
                body: self.id.0,
                index,
            });
        }
        let shape = self.shapes.remove(index);
        self.update_mass_properties();
        self.update_bounding_radius();
        self.update_aabb();
        Ok(shape)
    }

    fn push_shape(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.update_mass_properties();
        self.update_bounding_radius();
        self.update_aabb();
        self.shapes.len() - 1
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.shapes_locked {
            Err(SimError::ShapesLocked { body: self.id.0 })
        } else {
            Ok(())
        }
    }

    /// Reject shape mutation until [`Body::unlock_shapes`].
    ///
    /// The world locks every body for the duration of collision detection.
    pub fn lock_shapes(&mut self) {
        self.shapes_locked = true;
    }

    /// Allow shape mutation again.
    pub fn unlock_shapes(&mut self) {
        self.shapes_locked = false;
    }

    /// Whether shape mutation is currently rejected.
    #[must_use]
    pub fn shapes_locked(&self) -> bool {
        self.shapes_locked
    }

    /// World position and angle of one of this body's shapes.
    #[must_use]
    pub fn shape_world_pose(&self, shape: &Shape) -> (Vec2, f64) {
        (
            self.position + rotate(&shape.offset, self.angle),
            self.angle + shape.angle,
        )
    }

    /// Recompute the cached bounding box from the current pose.
    pub fn update_aabb(&mut self) {
        let mut iter = self.shapes.iter().map(|shape| {
            let (position, angle) = self.shape_world_pose(shape);
            shape.compute_aabb(&position, angle)
        });
        let Some(first) = iter.next() else {
            self.aabb = Aabb::new(self.position, self.position);
            return;
        };
        self.aabb = iter.fold(first, |acc, aabb| acc.union(&aabb));
    }

    /// Cached bounding box, valid as of the last [`Body::update_aabb`].
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .shapes
            .iter()
            .map(|s| s.offset.norm() + s.bounding_radius())
            .fold(0.0, f64::max);
    }

    /// Radius of the smallest circle around the body origin bounding all shapes.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// Convert a world point to the body frame.
    #[must_use]
    pub fn to_local_frame(&self, world_point: &Vec2) -> Vec2 {
        to_local_frame(world_point, &self.position, self.angle)
    }

    /// Convert a body-frame point to world coordinates.
    #[must_use]
    pub fn to_world_frame(&self, local_point: &Vec2) -> Vec2 {
        to_global_frame(local_point, &self.position, self.angle)
    }

    /// Velocity of a point given relative to the body origin in world orientation.
    #[must_use]
    pub fn velocity_at_point(&self, relative_point: &Vec2) -> Vec2 {
        self.velocity + cross_sv(self.angular_velocity, relative_point)
    }

    /// Apply a world force at a point relative to the body origin (world orientation).
    pub fn apply_force(&mut self, force: Vec2, relative_point: Vec2) {
        self.force += force;
        self.angular_force += cross(&relative_point, &force);
    }

    /// Apply a body-frame force at a body-frame point.
    pub fn apply_force_local(&mut self, local_force: Vec2, local_point: Vec2) {
        let force = rotate(&local_force, self.angle);
        let point = rotate(&local_point, self.angle);
        self.apply_force(force, point);
    }

    /// Apply an impulse at a point relative to the body origin (world orientation).
    pub fn apply_impulse(&mut self, impulse: Vec2, relative_point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += cross(&relative_point, &impulse) * self.inv_inertia;
    }

    /// Clear accumulated force and torque.
    pub fn set_zero_force(&mut self) {
        self.force = Vec2::zeros();
        self.angular_force = 0.0;
    }

    /// Scale velocities by `(1 - damping)^dt`.
    pub fn apply_damping(&mut self, dt: f64) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity *= (1.0 - self.damping).powf(dt);
        self.angular_velocity *= (1.0 - self.angular_damping).powf(dt);
    }

    /// Semi-implicit Euler step: velocities from forces, then pose from velocities.
    pub fn integrate(&mut self, dt: f64) {
        if self.is_static() || self.is_sleeping() {
            return;
        }
        if !self.fixed_rotation {
            self.angular_velocity += self.angular_force * self.inv_inertia * dt;
        }
        self.velocity += self.force * (self.inv_mass * dt);
        self.position += self.velocity * dt;
        self.angle += self.angular_velocity * dt;
    }

    /// Kinetic energy.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if !self.is_dynamic() {
            return 0.0;
        }
        let rotational = if self.inertia.is_finite() {
            self.inertia * self.angular_velocity * self.angular_velocity
        } else {
            0.0
        };
        0.5 * (self.mass * self.velocity.norm_squared() + rotational)
    }

    /// Current sleep state.
    #[must_use]
    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    /// Whether the body is asleep.
    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    /// Seconds spent below the sleep speed limit.
    #[must_use]
    pub fn idle_time(&self) -> f64 {
        self.idle_time
    }

    /// Whether the body passed its sleep time limit while sleep was deferred.
    #[must_use]
    pub fn wants_to_sleep(&self) -> bool {
        self.wants_to_sleep
    }

    /// Wake the body.
    pub fn wake_up(&mut self) {
        self.sleep_state = SleepState::Awake;
        self.idle_time = 0.0;
        self.wants_to_sleep = false;
    }

    /// Put the body to sleep, zeroing its motion.
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.velocity = Vec2::zeros();
        self.angular_velocity = 0.0;
        self.set_zero_force();
    }

    /// Advance the sleep state machine by `dt`.
    ///
    /// With `defer_sleep` the body only raises [`Body::wants_to_sleep`]
    /// instead of sleeping, so a caller can put a whole island to sleep at once.
    pub fn sleep_tick(&mut self, dt: f64, defer_sleep: bool) {
        if !self.allow_sleep || !self.is_dynamic() || self.is_sleeping() {
            return;
        }
        self.wants_to_sleep = false;

        let speed_squared =
            self.velocity.norm_squared() + self.angular_velocity * self.angular_velocity;
        if speed_squared >= self.sleep_speed_limit * self.sleep_speed_limit {
            self.idle_time = 0.0;
            self.sleep_state = SleepState::Awake;
        } else {
            self.idle_time += dt;
            self.sleep_state = SleepState::Sleepy;
        }

        if self.idle_time > self.sleep_time_limit {
            if defer_sleep {
                self.wants_to_sleep = true;
            } else {
                self.sleep();
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_mass_is_static() {
        let body = Body::new(0.0);
        assert!(body.is_static());
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.inv_inertia(), 0.0);
    }

    #[test]
    fn test_ids_unique() {
        let a = Body::new(1.0);
        let b = Body::new(1.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_inertia_from_shapes() {
        let body = Body::new(2.0).with_shape(Shape::circle(1.0));
        assert_relative_eq!(body.inertia(), 1.0);
        assert_relative_eq!(body.inv_inertia(), 1.0);

        let offset = Body::new(2.0).with_shape(Shape::circle(1.0).with_offset(Vec2::new(1.0, 0.0)));
        assert_relative_eq!(offset.inertia(), 3.0);
    }

    #[test]
    fn test_add_shape_locked() {
        let mut body = Body::new(1.0);
        body.lock_shapes();
        let err = body.add_shape(Shape::circle(1.0), Vec2::zeros(), 0.0).unwrap_err();
        assert!(err.is_shapes_locked());
        assert!(body.remove_shape(0).unwrap_err().is_shapes_locked());
        assert!(body.shapes_mut().is_err());

        body.unlock_shapes();
        assert_eq!(body.add_shape(Shape::circle(1.0), Vec2::zeros(), 0.0).unwrap(), 0);
        assert_eq!(body.shapes().len(), 1);
    }

    #[test]
    fn test_remove_shape_out_of_range() {
        let mut body = Body::new(1.0);
        assert!(matches!(
            body.remove_shape(3),
            Err(SimError::ShapeNotFound { index: 3, .. })
        ));
    }

    #[test]
    fn test_apply_force_torque() {
        let mut body = Body::new(1.0);
        body.apply_force(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0));
        assert_eq!(body.angular_force, 1.0);
        assert_eq!(body.force, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_apply_damping() {
        let mut body = Body::new(1.0)
            .with_velocity(Vec2::new(10.0, 0.0))
            .with_angular_velocity(10.0);
        body.damping = 0.5;
        body.angular_damping = 0.5;
        body.apply_damping(1.0);
        assert_relative_eq!(body.velocity.x, 5.0);
        assert_relative_eq!(body.angular_velocity, 5.0);
    }

    #[test]
    fn test_aabb_covers_offset_shapes() {
        let mut body = Body::new(1.0)
            .with_position(Vec2::new(1.0, 1.0))
            .with_shape(Shape::circle(0.5))
            .with_shape(Shape::circle(0.5).with_offset(Vec2::new(2.0, 0.0)));
        body.update_aabb();
        assert_relative_eq!(body.aabb().lower, Vec2::new(0.5, 0.5));
        assert_relative_eq!(body.aabb().upper, Vec2::new(3.5, 1.5));
        assert_relative_eq!(body.bounding_radius(), 2.5);
    }

    #[test]
    fn test_integrate_semi_implicit() {
        let mut body = Body::new(2.0);
        body.force = Vec2::new(4.0, 0.0);
        body.integrate(0.5);
        assert_relative_eq!(body.velocity.x, 1.0);
        assert_relative_eq!(body.position.x, 0.5);
    }

    #[test]
    fn test_sleep_tick() {
        let mut body = Body::new(1.0);
        body.sleep_time_limit = 0.5;
        body.sleep_tick(0.3, false);
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        body.sleep_tick(0.3, false);
        assert!(body.is_sleeping());

        body.wake_up();
        body.velocity = Vec2::new(1.0, 0.0);
        body.sleep_tick(0.3, false);
        assert_eq!(body.sleep_state(), SleepState::Awake);
    }

    #[test]
    fn test_sleep_tick_deferred() {
        let mut body = Body::new(1.0);
        body.sleep_time_limit = 0.1;
        body.sleep_tick(0.2, true);
        assert!(body.wants_to_sleep());
        assert!(!body.is_sleeping());
    }

    #[test]
    fn test_kinematic_moves_by_velocity() {
        let mut body = Body::new_kinematic().with_velocity(Vec2::new(1.0, 0.0));
        body.force = Vec2::new(100.0, 0.0);
        body.integrate(1.0);
        assert_relative_eq!(body.position.x, 1.0);
        assert_relative_eq!(body.velocity.x, 1.0);
    }
}
