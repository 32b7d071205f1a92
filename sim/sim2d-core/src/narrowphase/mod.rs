//! Narrowphase: exact contact generation for candidate shape pairs.
//!
//! For each pair the broadphase reports, the world hands every compatible
//! shape pair to [`Narrowphase::test_shape_pair`]. The pair is put in
//! canonical type order, looked up in the [`PairTable`], and the routine's
//! contacts become contact equations plus friction equations.
//!
//! # Conventions
//!
//! - A contact normal points from body A to body B. For a plane contact
//!   the plane is always body A, so the normal is the plane's normal.
//! - Contact points are stored relative to their body's position, in world
//!   orientation.
//! - Penetration is `dot(normal, point_b - point_a)` and is negative while
//!   the shapes overlap.
//! - Friction equations store the indices of the contact equations they
//!   were derived from. The indices are into
//!   [`Narrowphase::contact_equations`].
//!
//! Sensor shapes and check-only tests stop at the first contact and create
//! no equations.
//!
//! # Example
//!
//! ```
//! use sim2d_core::narrowphase::{Narrowphase, ShapeRef};
//! use sim2d_types::{Body, ContactMaterial, Shape, Vec2};
//!
//! let ground = Body::new_static().with_shape(Shape::plane());
//! let ball = Body::new(1.0)
//!     .with_position(Vec2::new(0.0, 0.9))
//!     .with_shape(Shape::circle(1.0));
//!
//! let mut narrowphase = Narrowphase::default();
//! let count = narrowphase
//!     .test_shape_pair(
//!         &ShapeRef::new(0, &ground, &ground.shapes()[0]),
//!         &ShapeRef::new(1, &ball, &ball.shapes()[0]),
//!         &ContactMaterial::default(),
//!         false,
//!     )
//!     .unwrap();
//!
//! assert_eq!(count, 1);
//! assert_eq!(narrowphase.contact_equations().len(), 1);
//! ```

mod dispatch;
mod geometry;
mod polygon;
mod round;

pub use dispatch::{canonical, PairHandler, PairTable};

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::trace;

use sim2d_constraint::{Equation, EquationKind};
use sim2d_types::math::{rotate90cw, try_normalize};
use sim2d_types::{Body, BodyId, ContactMaterial, Shape, Vec2};

use crate::error::{CollisionError, Result};
use geometry::{Manifold, RawContact};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Narrowphase settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NarrowphaseConfig {
    /// Create friction equations for contacts with positive friction.
    pub enable_friction: bool,
    /// Replace the friction equations of a multi-contact pair with a single
    /// one through the averaged contact.
    pub friction_reduction: bool,
    /// Whether new contact equations are enabled. Disabled equations are
    /// still reported but never solved.
    pub enable_equations: bool,
}

impl Default for NarrowphaseConfig {
    fn default() -> Self {
        Self {
            enable_friction: true,
            friction_reduction: true,
            enable_equations: true,
        }
    }
}

impl NarrowphaseConfig {
    /// Contacts only.
    #[must_use]
    pub fn frictionless() -> Self {
        Self {
            enable_friction: false,
            ..Self::default()
        }
    }

    /// Set friction reduction.
    #[must_use]
    pub fn with_friction_reduction(mut self, enabled: bool) -> Self {
        self.friction_reduction = enabled;
        self
    }
}

/// A shape of a body, placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct ShapeRef<'a> {
    /// Index of the body in the slice equations refer to.
    pub body_index: usize,
    /// The owning body.
    pub body: &'a Body,
    /// The shape.
    pub shape: &'a Shape,
    /// World position of the shape.
    pub position: Vec2,
    /// World angle of the shape.
    pub angle: f64,
}

impl<'a> ShapeRef<'a> {
    /// Place `shape` at its pose on `body`.
    #[must_use]
    pub fn new(body_index: usize, body: &'a Body, shape: &'a Shape) -> Self {
        let (position, angle) = body.shape_world_pose(shape);
        Self::at(body_index, body, shape, position, angle)
    }

    /// Place `shape` at an explicit world pose.
    #[must_use]
    pub fn at(body_index: usize, body: &'a Body, shape: &'a Shape, position: Vec2, angle: f64) -> Self {
        Self {
            body_index,
            body,
            shape,
            position,
            angle,
        }
    }
}

/// Key of an unordered body pair.
#[must_use]
pub fn pair_key(a: BodyId, b: BodyId) -> u64 {
    let (lo, hi) = if a.raw() <= b.raw() {
        (a.raw(), b.raw())
    } else {
        (b.raw(), a.raw())
    };
    (u64::from(lo) << 32) | u64::from(hi)
}

type PairRecord = HashMap<u64, (BodyId, BodyId)>;

/// Contact generator and per-step contact bookkeeping.
#[derive(Debug, Clone)]
pub struct Narrowphase {
    config: NarrowphaseConfig,
    table: PairTable,
    contact_equations: Vec<Equation>,
    friction_equations: Vec<Equation>,
    current: PairRecord,
    last: PairRecord,
}

impl Default for Narrowphase {
    fn default() -> Self {
        Self::new(NarrowphaseConfig::default())
    }
}

impl Narrowphase {
    /// Create a narrowphase with the standard dispatch table.
    #[must_use]
    pub fn new(config: NarrowphaseConfig) -> Self {
        Self {
            config,
            table: PairTable::standard(),
            contact_equations: Vec::new(),
            friction_equations: Vec::new(),
            current: PairRecord::new(),
            last: PairRecord::new(),
        }
    }

    /// Create a narrowphase with a custom dispatch table.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::IncompleteDispatch`] if the table does not
    /// cover every pair of shape types.
    pub fn with_table(config: NarrowphaseConfig, table: PairTable) -> Result<Self> {
        table.validate()?;
        Ok(Self {
            table,
            ..Self::new(config)
        })
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &NarrowphaseConfig {
        &self.config
    }

    /// Replace the settings.
    pub fn set_config(&mut self, config: NarrowphaseConfig) {
        self.config = config;
    }

    /// The dispatch table.
    #[must_use]
    pub fn table(&self) -> &PairTable {
        &self.table
    }

    /// Start a new pass.
    ///
    /// Equations from the previous pass are dropped and the pairs that
    /// touched in it become the "last step" record.
    pub fn reset(&mut self) {
        std::mem::swap(&mut self.last, &mut self.current);
        self.current.clear();
        self.contact_equations.clear();
        self.friction_equations.clear();
    }

    /// Whether the two bodies touched during the previous pass.
    #[must_use]
    pub fn collided_last_step(&self, a: BodyId, b: BodyId) -> bool {
        self.last.contains_key(&pair_key(a, b))
    }

    /// Whether the two bodies have touched so far in this pass.
    #[must_use]
    pub fn colliding(&self, a: BodyId, b: BodyId) -> bool {
        self.current.contains_key(&pair_key(a, b))
    }

    /// Pairs that touch in this pass but did not in the previous one.
    pub fn begun_contacts(&self) -> impl Iterator<Item = (BodyId, BodyId)> + '_ {
        self.current
            .iter()
            .filter(|(key, _)| !self.last.contains_key(*key))
            .map(|(_, ids)| *ids)
    }

    /// Pairs that touched in the previous pass but no longer do.
    pub fn ended_contacts(&self) -> impl Iterator<Item = (BodyId, BodyId)> + '_ {
        self.last
            .iter()
            .filter(|(key, _)| !self.current.contains_key(*key))
            .map(|(_, ids)| *ids)
    }

    /// Contact equations of this pass.
    #[must_use]
    pub fn contact_equations(&self) -> &[Equation] {
        &self.contact_equations
    }

    /// Friction equations of this pass.
    #[must_use]
    pub fn friction_equations(&self) -> &[Equation] {
        &self.friction_equations
    }

    /// Move this pass's equations into `out`, contacts first.
    ///
    /// Friction equations refer to contacts by index, so those indices are
    /// offset by the length `out` had on entry.
    pub fn drain_equations(&mut self, out: &mut Vec<Equation>) {
        let base = out.len();
        out.append(&mut self.contact_equations);
        for mut eq in self.friction_equations.drain(..) {
            if let EquationKind::Friction { contacts, .. } = &mut eq.kind {
                for index in contacts.iter_mut() {
                    *index += base;
                }
            }
            out.push(eq);
        }
    }

    /// Test one shape pair and create its equations.
    ///
    /// Returns the number of contacts found. With `check_only`, or when
    /// either shape is a sensor, the test stops at the first contact and no
    /// equations are created. Touching pairs are recorded for
    /// [`Narrowphase::collided_last_step`] unless `check_only` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::UnsupportedPair`] if the dispatch table has
    /// no routine for the pair.
    pub fn test_shape_pair(
        &mut self,
        a: &ShapeRef<'_>,
        b: &ShapeRef<'_>,
        material: &ContactMaterial,
        check_only: bool,
    ) -> Result<usize> {
        let sensor = a.shape.sensor || b.shape.sensor;
        let (first, second, manifold) = self.collide(a, b, check_only || sensor)?;
        let count = manifold.len();
        if count == 0 {
            return Ok(0);
        }
        trace!(
            "{} vs {}: {} contact(s) between bodies {} and {}",
            first.shape.shape_type(),
            second.shape.shape_type(),
            count,
            first.body.id(),
            second.body.id()
        );

        let ids = (first.body.id(), second.body.id());
        if !check_only {
            self.current.insert(pair_key(ids.0, ids.1), ids);
        }
        if check_only || sensor {
            return Ok(count);
        }

        let enabled = self.config.enable_equations
            && first.body.collision_response
            && second.body.collision_response
            && first.shape.collision_response
            && second.shape.collision_response;
        let first_impact = !self.collided_last_step(ids.0, ids.1);

        let start = self.contact_equations.len();
        for raw in &manifold.contacts {
            let (ra, rb) = oriented(raw.reversed, first, second);
            let mut eq = self.create_contact_equation(ra, rb, material);
            eq.enabled = enabled;
            if let EquationKind::Contact {
                normal,
                contact_point_a,
                contact_point_b,
                first_impact: impact,
                penetration,
                ..
            } = &mut eq.kind
            {
                *normal = raw.normal;
                *contact_point_a = raw.point_a - ra.body.position;
                *contact_point_b = raw.point_b - rb.body.position;
                *impact = first_impact;
                *penetration = raw.normal.dot(&(raw.point_b - raw.point_a));
            }
            self.contact_equations.push(eq);
        }

        if self.config.enable_friction && material.friction > 0.0 {
            self.add_friction(first, second, &manifold.contacts, start, material, enabled);
        }
        Ok(count)
    }

    fn add_friction(
        &mut self,
        first: &ShapeRef<'_>,
        second: &ShapeRef<'_>,
        contacts: &[RawContact],
        start: usize,
        material: &ContactMaterial,
        enabled: bool,
    ) {
        let reduce = self.config.friction_reduction && contacts.len() > 1;
        if !reduce {
            for (k, raw) in contacts.iter().enumerate() {
                let (ra, rb) = oriented(raw.reversed, first, second);
                let eq = self.friction_from(ra, rb, material, enabled, raw.normal, raw.point_a, raw.point_b, &[start + k]);
                self.friction_equations.push(eq);
            }
            return;
        }

        // Average in the orientation of the first contact.
        let reference = contacts[0].reversed;
        let mut normal = Vec2::zeros();
        let mut point_a = Vec2::zeros();
        let mut point_b = Vec2::zeros();
        for raw in contacts {
            if raw.reversed == reference {
                normal += raw.normal;
                point_a += raw.point_a;
                point_b += raw.point_b;
            } else {
                normal -= raw.normal;
                point_a += raw.point_b;
                point_b += raw.point_a;
            }
        }
        let n = contacts.len() as f64;
        let normal = try_normalize(&normal).unwrap_or(contacts[0].normal);
        let indices: SmallVec<[usize; 4]> = (start..start + contacts.len()).collect();
        let (ra, rb) = oriented(reference, first, second);
        let eq = self.friction_from(ra, rb, material, enabled, normal, point_a / n, point_b / n, &indices);
        self.friction_equations.push(eq);
    }

    #[allow(clippy::too_many_arguments)]
    fn friction_from(
        &self,
        a: &ShapeRef<'_>,
        b: &ShapeRef<'_>,
        material: &ContactMaterial,
        enabled: bool,
        normal: Vec2,
        point_a: Vec2,
        point_b: Vec2,
        contacts: &[usize],
    ) -> Equation {
        let mut eq = self.create_friction_equation(a, b, material);
        eq.enabled = enabled;
        if let EquationKind::Friction {
            tangent,
            contact_point_a,
            contact_point_b,
            contacts: indices,
            ..
        } = &mut eq.kind
        {
            *tangent = rotate90cw(&normal);
            *contact_point_a = point_a - a.body.position;
            *contact_point_b = point_b - b.body.position;
            indices.extend_from_slice(contacts);
        }
        eq
    }

    /// A contact equation between two shapes with the material's parameters
    /// and no geometry yet.
    #[must_use]
    pub fn create_contact_equation(
        &self,
        a: &ShapeRef<'_>,
        b: &ShapeRef<'_>,
        material: &ContactMaterial,
    ) -> Equation {
        let mut eq = Equation::contact(a.body_index, b.body_index)
            .with_stiffness(material.stiffness)
            .with_relaxation(material.relaxation);
        eq.offset = material.contact_skin_size;
        eq.enabled = self.config.enable_equations;
        if let EquationKind::Contact { restitution, .. } = &mut eq.kind {
            *restitution = material.restitution;
        }
        eq
    }

    /// A friction equation between two shapes with the material's parameters
    /// and no geometry yet.
    #[must_use]
    pub fn create_friction_equation(
        &self,
        a: &ShapeRef<'_>,
        b: &ShapeRef<'_>,
        material: &ContactMaterial,
    ) -> Equation {
        let mut eq = Equation::friction(a.body_index, b.body_index, material.friction)
            .with_stiffness(material.friction_stiffness)
            .with_relaxation(material.friction_relaxation);
        eq.relative_velocity = material.surface_velocity;
        eq.enabled = self.config.enable_equations;
        eq
    }

    /// Whether any shapes of two bodies overlap.
    ///
    /// With `filter` set, shape pairs rejected by the group/mask test are
    /// skipped. Nothing is recorded. Returns `None` if no shape pair was
    /// tested at all.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::UnsupportedPair`] if the dispatch table has
    /// no routine for a shape pair.
    pub fn bodies_overlap(&self, a: &Body, b: &Body, filter: bool) -> Result<Option<bool>> {
        let mut tested = false;
        for sa in a.shapes() {
            for sb in b.shapes() {
                if filter && !sa.can_collide_with(sb) {
                    continue;
                }
                tested = true;
                let (ra, rb) = (ShapeRef::new(0, a, sa), ShapeRef::new(1, b, sb));
                let (_, _, manifold) = self.collide(&ra, &rb, true)?;
                if manifold.len() > 0 {
                    return Ok(Some(true));
                }
            }
        }
        Ok(tested.then_some(false))
    }

    /// Whether a world point lies in the shape, within `precision`.
    #[must_use]
    pub fn shape_contains_point(shape: &ShapeRef<'_>, point: &Vec2, precision: f64) -> bool {
        geometry::shape_contains_point(shape, point, precision)
    }

    fn collide<'s, 'b>(
        &self,
        a: &'s ShapeRef<'b>,
        b: &'s ShapeRef<'b>,
        check_only: bool,
    ) -> Result<(&'s ShapeRef<'b>, &'s ShapeRef<'b>, Manifold)> {
        let (ta, tb) = (a.shape.shape_type(), b.shape.shape_type());
        let (first, second) = if ta <= tb { (a, b) } else { (b, a) };
        let (ta, tb) = canonical(ta, tb);
        let unsupported = || CollisionError::UnsupportedPair { a: ta, b: tb };

        let handler = self.table.get(ta, tb).ok_or_else(unsupported)?;
        let mut manifold = Manifold::new(check_only);
        handler.run(first, second, &mut manifold).ok_or_else(unsupported)?;
        Ok((first, second, manifold))
    }
}

fn oriented<'s, 'b>(
    reversed: bool,
    first: &'s ShapeRef<'b>,
    second: &'s ShapeRef<'b>,
) -> (&'s ShapeRef<'b>, &'s ShapeRef<'b>) {
    if reversed {
        (second, first)
    } else {
        (first, second)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ngon(n: usize, radius: f64) -> Shape {
        let vertices = (0..n)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / n as f64;
                Vec2::new(radius * a.cos(), radius * a.sin())
            })
            .collect();
        Shape::convex(vertices).unwrap()
    }

    fn count(a: &Body, b: &Body, check_only: bool) -> usize {
        let mut np = Narrowphase::default();
        np.test_shape_pair(
            &ShapeRef::new(0, a, &a.shapes()[0]),
            &ShapeRef::new(1, b, &b.shapes()[0]),
            &ContactMaterial::default(),
            check_only,
        )
        .unwrap()
    }

    fn at_origin(shape: Shape) -> Body {
        Body::new(1.0).with_shape(shape)
    }

    #[test]
    fn test_coincident_pair_counts() {
        let capsule = || at_origin(Shape::capsule(1.0, 1.0));
        let circle = || at_origin(Shape::circle(1.0));
        let convex = || at_origin(ngon(50, 1.0));
        let plane = || at_origin(Shape::plane());

        assert_eq!(count(&capsule(), &capsule(), false), 12);
        assert_eq!(count(&capsule(), &capsule(), true), 1);
        assert_eq!(count(&plane(), &capsule(), false), 2);
        assert_eq!(count(&plane(), &capsule(), true), 1);
        assert_eq!(count(&convex(), &capsule(), false), 4);
        assert_eq!(count(&convex(), &convex(), false), 2);
        assert_eq!(count(&plane(), &convex(), false), 2);
        assert_eq!(count(&circle(), &circle(), false), 1);
        assert_eq!(count(&circle(), &capsule(), false), 1);
        assert_eq!(count(&circle(), &convex(), false), 1);
        assert_eq!(count(&circle(), &plane(), false), 1);
        assert_eq!(count(&plane(), &plane(), false), 0);
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let a = at_origin(ngon(50, 1.0));
        let b = Body::new(1.0)
            .with_position(Vec2::new(0.5, 0.5))
            .with_shape(Shape::capsule(1.0, 1.0));
        assert_eq!(count(&a, &b, false), count(&b, &a, false));
    }

    #[test]
    fn test_circle_resting_on_plane() {
        let plane = Body::new_static().with_shape(Shape::plane());
        let ball = Body::new(1.0)
            .with_position(Vec2::new(0.0, 1.0))
            .with_shape(Shape::circle(1.0));
        let mut np = Narrowphase::default();

        // Circle first: the plane still ends up as body A.
        let n = np
            .test_shape_pair(
                &ShapeRef::new(1, &ball, &ball.shapes()[0]),
                &ShapeRef::new(0, &plane, &plane.shapes()[0]),
                &ContactMaterial::default(),
                false,
            )
            .unwrap();
        assert_eq!(n, 1);

        let eq = &np.contact_equations()[0];
        assert_eq!(eq.body_a, 0);
        assert_eq!(eq.body_b, 1);
        assert_relative_eq!(eq.contact_normal().unwrap(), Vec2::y(), epsilon = 1e-12);
        assert_relative_eq!(eq.penetration().unwrap(), 0.0, epsilon = 1e-12);
        if let EquationKind::Contact {
            contact_point_a,
            contact_point_b,
            ..
        } = &eq.kind
        {
            assert_relative_eq!(*contact_point_a, Vec2::zeros(), epsilon = 1e-12);
            assert_relative_eq!(*contact_point_b, Vec2::new(0.0, -1.0), epsilon = 1e-12);
        }
        assert_eq!(eq.offset, ContactMaterial::default().contact_skin_size);
        assert_eq!(np.friction_equations().len(), 1);
    }

    #[test]
    fn test_separated_circles() {
        let a = at_origin(Shape::circle(1.0));
        let b = Body::new(1.0)
            .with_position(Vec2::new(3.0, 0.0))
            .with_shape(Shape::circle(1.0));
        assert_eq!(count(&a, &b, false), 0);
    }

    #[test]
    fn test_sensor_creates_no_equations() {
        let a = at_origin(Shape::circle(1.0).as_sensor());
        let b = at_origin(Shape::circle(1.0));
        let mut np = Narrowphase::default();
        let n = np
            .test_shape_pair(
                &ShapeRef::new(0, &a, &a.shapes()[0]),
                &ShapeRef::new(1, &b, &b.shapes()[0]),
                &ContactMaterial::default(),
                false,
            )
            .unwrap();
        assert_eq!(n, 1);
        assert!(np.contact_equations().is_empty());
        assert!(np.friction_equations().is_empty());
        assert!(np.colliding(a.id(), b.id()));
    }

    #[test]
    fn test_collision_response_disables_equations() {
        let a = at_origin(Shape::circle(1.0).without_collision_response());
        let b = at_origin(Shape::circle(1.0));
        let mut np = Narrowphase::default();
        np.test_shape_pair(
            &ShapeRef::new(0, &a, &a.shapes()[0]),
            &ShapeRef::new(1, &b, &b.shapes()[0]),
            &ContactMaterial::default(),
            false,
        )
        .unwrap();
        assert_eq!(np.contact_equations().len(), 1);
        assert!(!np.contact_equations()[0].enabled);
    }

    #[test]
    fn test_first_impact_and_last_step() {
        let a = at_origin(Shape::circle(1.0));
        let b = Body::new(1.0)
            .with_position(Vec2::new(1.5, 0.0))
            .with_shape(Shape::circle(1.0));
        let material = ContactMaterial::default();
        let mut np = Narrowphase::default();

        let first_impact = |np: &Narrowphase| match &np.contact_equations()[0].kind {
            EquationKind::Contact { first_impact, .. } => *first_impact,
            _ => unreachable!(),
        };

        let run = |np: &mut Narrowphase| {
            np.reset();
            np.test_shape_pair(
                &ShapeRef::new(0, &a, &a.shapes()[0]),
                &ShapeRef::new(1, &b, &b.shapes()[0]),
                &material,
                false,
            )
            .unwrap()
        };

        run(&mut np);
        assert!(first_impact(&np));
        assert!(!np.collided_last_step(a.id(), b.id()));
        assert_eq!(np.begun_contacts().count(), 1);

        run(&mut np);
        assert!(!first_impact(&np));
        assert!(np.collided_last_step(b.id(), a.id()));
        assert_eq!(np.begun_contacts().count(), 0);

        np.reset();
        assert_eq!(np.ended_contacts().collect::<Vec<_>>(), vec![(a.id(), b.id())]);
    }

    #[test]
    fn test_friction_reduction() {
        let ground = Body::new_static().with_shape(Shape::rectangle(4.0, 1.0));
        let block = Body::new(1.0)
            .with_position(Vec2::new(0.0, 0.9))
            .with_shape(Shape::rectangle(1.0, 1.0));
        let material = ContactMaterial::default();

        for (reduce, expected) in [(true, 1), (false, 2)] {
            let mut np = Narrowphase::new(NarrowphaseConfig::default().with_friction_reduction(reduce));
            let n = np
                .test_shape_pair(
                    &ShapeRef::new(0, &ground, &ground.shapes()[0]),
                    &ShapeRef::new(1, &block, &block.shapes()[0]),
                    &material,
                    false,
                )
                .unwrap();
            assert_eq!(n, 2);
            assert_eq!(np.friction_equations().len(), expected);
            let covered: usize = np
                .friction_equations()
                .iter()
                .map(|eq| match &eq.kind {
                    EquationKind::Friction { contacts, tangent, .. } => {
                        assert_relative_eq!(tangent.y, 0.0, epsilon = 1e-12);
                        contacts.len()
                    }
                    _ => 0,
                })
                .sum();
            assert_eq!(covered, 2);
        }
    }

    #[test]
    fn test_frictionless_material() {
        let a = at_origin(Shape::circle(1.0));
        let b = at_origin(Shape::circle(1.0));
        let mut np = Narrowphase::default();
        np.test_shape_pair(
            &ShapeRef::new(0, &a, &a.shapes()[0]),
            &ShapeRef::new(1, &b, &b.shapes()[0]),
            &ContactMaterial::default().with_friction(0.0),
            false,
        )
        .unwrap();
        assert!(np.friction_equations().is_empty());
    }

    #[test]
    fn test_drain_offsets_friction_indices() {
        let ground = Body::new_static().with_shape(Shape::plane());
        let ball = Body::new(1.0)
            .with_position(Vec2::new(0.0, 0.9))
            .with_shape(Shape::circle(1.0));
        let mut np = Narrowphase::default();
        np.test_shape_pair(
            &ShapeRef::new(0, &ground, &ground.shapes()[0]),
            &ShapeRef::new(1, &ball, &ball.shapes()[0]),
            &ContactMaterial::default(),
            false,
        )
        .unwrap();

        let mut out = vec![Equation::contact(0, 1)];
        np.drain_equations(&mut out);
        assert_eq!(out.len(), 3);
        assert!(np.contact_equations().is_empty());
        assert!(matches!(
            &out[2].kind,
            EquationKind::Friction { contacts, .. } if contacts.as_slice() == [1]
        ));
    }

    #[test]
    fn test_bodies_overlap() {
        let np = Narrowphase::default();
        let a = at_origin(Shape::circle(1.0));
        let b = Body::new(1.0)
            .with_position(Vec2::new(1.5, 0.0))
            .with_shape(Shape::circle(1.0).with_collision_group(2).with_collision_mask(2));
        let far = Body::new(1.0)
            .with_position(Vec2::new(5.0, 0.0))
            .with_shape(Shape::circle(1.0));
        let empty = Body::new(1.0);

        assert_eq!(np.bodies_overlap(&a, &b, false).unwrap(), Some(true));
        assert_eq!(np.bodies_overlap(&b, &a, false).unwrap(), Some(true));
        assert_eq!(np.bodies_overlap(&a, &b, true).unwrap(), None);
        assert_eq!(np.bodies_overlap(&a, &far, true).unwrap(), Some(false));
        assert_eq!(np.bodies_overlap(&a, &empty, false).unwrap(), None);
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let err = Narrowphase::with_table(NarrowphaseConfig::default(), PairTable::empty()).unwrap_err();
        assert!(err.is_dispatch_error());
    }

    #[test]
    fn test_unregistered_pair_errors() {
        let mut table = PairTable::standard();
        table.unregister(sim2d_types::ShapeType::Circle, sim2d_types::ShapeType::Circle);
        let np = Narrowphase {
            table,
            ..Narrowphase::default()
        };
        let a = at_origin(Shape::circle(1.0));
        let b = at_origin(Shape::circle(1.0));
        assert!(np.bodies_overlap(&a, &b, false).is_err());
    }

    #[test]
    fn test_normal_points_from_a_to_b() {
        let a = at_origin(Shape::circle(1.0));
        let b = Body::new(1.0)
            .with_position(Vec2::new(1.9, 0.0))
            .with_shape(Shape::circle(1.0));
        let mut np = Narrowphase::default();
        np.test_shape_pair(
            &ShapeRef::new(0, &a, &a.shapes()[0]),
            &ShapeRef::new(1, &b, &b.shapes()[0]),
            &ContactMaterial::default(),
            false,
        )
        .unwrap();
        let eq = &np.contact_equations()[0];
        assert_eq!((eq.body_a, eq.body_b), (0, 1));
        assert_relative_eq!(eq.contact_normal().unwrap(), Vec2::x(), epsilon = 1e-12);
        assert_relative_eq!(eq.penetration().unwrap(), -0.1, epsilon = 1e-12);
    }
}
