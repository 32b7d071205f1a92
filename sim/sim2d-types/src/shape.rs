//! Collision shapes attached to bodies.
//!
//! A [`Shape`] pairs a geometric [`ShapeKind`] with its placement on the
//! owning body and the filtering data the broadphase and narrowphase read.
//! Local frames follow one convention for every kind: lines and capsules lie
//! along the local x axis centred on the origin; a plane passes through the
//! origin with its outward normal along local +y, so it occupies the half
//! space `y <= 0`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use tracing::warn;

use crate::aabb::Aabb;
use crate::material::MaterialId;
use crate::math::{cross, rotate90cw, try_normalize, Vec2};
use crate::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Type tag of a shape.
///
/// The declaration order is the canonical order used to normalize shape
/// pairs: for a pair `(a, b)` the narrowphase always runs the routine on the
/// shape with the lower tag first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeType {
    /// A disc.
    Circle,
    /// A point.
    Particle,
    /// An infinite half plane.
    Plane,
    /// A convex polygon.
    Convex,
    /// A zero-thickness segment.
    Line,
    /// A rectangle.
    Box,
    /// A segment swept by a disc.
    Capsule,
}

impl ShapeType {
    /// Number of shape types.
    pub const COUNT: usize = 7;

    /// Every shape type in canonical order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Circle,
        Self::Particle,
        Self::Plane,
        Self::Convex,
        Self::Line,
        Self::Box,
        Self::Capsule,
    ];

    /// Position in canonical order.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Particle => "particle",
            Self::Plane => "plane",
            Self::Convex => "convex",
            Self::Line => "line",
            Self::Box => "box",
            Self::Capsule => "capsule",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A convex polygon in its shape-local frame.
///
/// Vertices are stored counter-clockwise. `normals[i]` is the outward unit
/// normal of the edge from `vertices[i]` to `vertices[i + 1]`; a zero-length
/// edge gets a zero normal, which separating-axis tests skip.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvexPolygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
    centroid: Vec2,
    area: f64,
    bounding_radius: f64,
}

impl ConvexPolygon {
    /// Build a polygon from its vertices.
    ///
    /// Clockwise input is reversed. Fewer than three vertices are accepted as
    /// a degenerate polygon (a point or a segment).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidShape`] if `vertices` is empty or contains a
    /// non-finite coordinate.
    pub fn new(mut vertices: Vec<Vec2>) -> Result<Self> {
        if vertices.is_empty() {
            return Err(SimError::invalid_shape("convex polygon needs at least one vertex"));
        }
        if vertices.iter().any(|v| !crate::math::is_finite(v)) {
            return Err(SimError::invalid_shape("convex polygon vertex is not finite"));
        }

        if signed_area(&vertices) < 0.0 {
            vertices.reverse();
        }
        if vertices.len() < 3 {
            warn!("Convex polygon has only {} vertices", vertices.len());
        }

        let n = vertices.len();
        let mut normals = Vec::with_capacity(n);
        let mut degenerate_edges = 0;
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            match try_normalize(&rotate90cw(&edge)) {
                Some(normal) => normals.push(normal),
                None => {
                    degenerate_edges += 1;
                    normals.push(Vec2::zeros());
                }
            }
        }
        if degenerate_edges > 0 && n >= 3 {
            warn!("Convex polygon has {} zero-length edges", degenerate_edges);
        }

        let area = signed_area(&vertices).abs();
        let centroid = centroid(&vertices, area);
        let bounding_radius = vertices.iter().map(Vec2::norm).fold(0.0, f64::max);

        Ok(Self {
            vertices,
            normals,
            centroid,
            area,
            bounding_radius,
        })
    }

    /// Axis-aligned rectangle centred on the origin.
    #[must_use]
    pub fn rectangle(width: f64, height: f64) -> Self {
        let (hw, hh) = (width.abs() * 0.5, height.abs() * 0.5);
        let vertices = vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ];
        let normals = vec![
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ];
        Self {
            vertices,
            normals,
            centroid: Vec2::zeros(),
            area: width.abs() * height.abs(),
            bounding_radius: hw.hypot(hh),
        }
    }

    /// Vertices in counter-clockwise order.
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Outward edge normals, one per vertex.
    #[must_use]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    /// Area centroid (the vertex mean for degenerate polygons).
    #[must_use]
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Enclosed area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Distance from the local origin to the farthest vertex.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// Moment of inertia about the local origin for a uniform density.
    #[must_use]
    pub fn moment_of_inertia(&self, mass: f64) -> f64 {
        let n = self.vertices.len();
        let mut numer = 0.0;
        let mut denom = 0.0;
        for i in 0..n {
            let p1 = self.vertices[i];
            let p2 = self.vertices[(i + 1) % n];
            let a = cross(&p1, &p2).abs();
            let b = p2.dot(&p2) + p2.dot(&p1) + p1.dot(&p1);
            numer += a * b;
            denom += a;
        }
        if denom <= 0.0 {
            return 0.0;
        }
        (mass / 6.0) * (numer / denom)
    }
}

fn signed_area(vertices: &[Vec2]) -> f64 {
    let n = vertices.len();
    let mut twice = 0.0;
    for i in 0..n {
        twice += cross(&vertices[i], &vertices[(i + 1) % n]);
    }
    twice * 0.5
}

fn centroid(vertices: &[Vec2], area: f64) -> Vec2 {
    let n = vertices.len();
    #[allow(clippy::cast_precision_loss)]
    let mean = vertices.iter().sum::<Vec2>() / n as f64;
    if area <= f64::EPSILON {
        return mean;
    }
    let mut c = Vec2::zeros();
    let mut twice_area = 0.0;
    for i in 0..n {
        let p1 = vertices[i];
        let p2 = vertices[(i + 1) % n];
        let w = cross(&p1, &p2);
        twice_area += w;
        c += (p1 + p2) * w;
    }
    c / (3.0 * twice_area)
}

/// Geometry of a shape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    /// A disc centred on the local origin.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// A single point at the local origin.
    Particle,
    /// Half plane `y <= 0` in the local frame.
    Plane,
    /// A convex polygon.
    Convex(ConvexPolygon),
    /// A segment along local x.
    Line {
        /// Total length.
        length: f64,
    },
    /// A rectangle centred on the local origin.
    Box {
        /// Extent along local x.
        width: f64,
        /// Extent along local y.
        height: f64,
        /// The rectangle as a polygon.
        polygon: ConvexPolygon,
    },
    /// A segment along local x swept by a disc.
    Capsule {
        /// Length of the inner segment.
        length: f64,
        /// Radius of the swept disc.
        radius: f64,
    },
}

impl ShapeKind {
    /// Type tag for dispatch.
    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Circle { .. } => ShapeType::Circle,
            Self::Particle => ShapeType::Particle,
            Self::Plane => ShapeType::Plane,
            Self::Convex(_) => ShapeType::Convex,
            Self::Line { .. } => ShapeType::Line,
            Self::Box { .. } => ShapeType::Box,
            Self::Capsule { .. } => ShapeType::Capsule,
        }
    }
}

/// A shape attached to a body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape {
    /// Geometry.
    pub kind: ShapeKind,
    /// Position relative to the owning body, in the body frame.
    pub offset: Vec2,
    /// Angle relative to the owning body.
    pub angle: f64,
    /// Bits identifying which groups this shape belongs to.
    pub collision_group: u32,
    /// Bits identifying which groups this shape collides with.
    pub collision_mask: u32,
    /// Whether contacts with this shape push bodies apart.
    pub collision_response: bool,
    /// Sensors report overlaps but never generate contact equations.
    pub sensor: bool,
    /// Surface material, `None` for the world default.
    pub material: Option<MaterialId>,
}

impl Shape {
    /// Create a shape with default placement and filtering.
    #[must_use]
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            offset: Vec2::zeros(),
            angle: 0.0,
            collision_group: 1,
            collision_mask: 1,
            collision_response: true,
            sensor: false,
            material: None,
        }
    }

    /// A circle.
    #[must_use]
    pub fn circle(radius: f64) -> Self {
        Self::new(ShapeKind::Circle { radius })
    }

    /// A particle.
    #[must_use]
    pub fn particle() -> Self {
        Self::new(ShapeKind::Particle)
    }

    /// A plane.
    #[must_use]
    pub fn plane() -> Self {
        Self::new(ShapeKind::Plane)
    }

    /// A line segment.
    #[must_use]
    pub fn line(length: f64) -> Self {
        Self::new(ShapeKind::Line { length })
    }

    /// A capsule.
    #[must_use]
    pub fn capsule(length: f64, radius: f64) -> Self {
        Self::new(ShapeKind::Capsule { length, radius })
    }

    /// A rectangle.
    #[must_use]
    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::new(ShapeKind::Box {
            width,
            height,
            polygon: ConvexPolygon::rectangle(width, height),
        })
    }

    /// A convex polygon.
    ///
    /// # Errors
    ///
    /// See [`ConvexPolygon::new`].
    pub fn convex(vertices: Vec<Vec2>) -> Result<Self> {
        Ok(Self::new(ShapeKind::Convex(ConvexPolygon::new(vertices)?)))
    }

    /// Set the offset on the owning body.
    #[must_use]
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Set the angle on the owning body.
    #[must_use]
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set the collision group bits.
    #[must_use]
    pub fn with_collision_group(mut self, group: u32) -> Self {
        self.collision_group = group;
        self
    }

    /// Set the collision mask bits.
    #[must_use]
    pub fn with_collision_mask(mut self, mask: u32) -> Self {
        self.collision_mask = mask;
        self
    }

    /// Set the surface material.
    #[must_use]
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    /// Turn the shape into a sensor.
    #[must_use]
    pub fn as_sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    /// Keep contact detection but produce no collision response.
    #[must_use]
    pub fn without_collision_response(mut self) -> Self {
        self.collision_response = false;
        self
    }

    /// Type tag for dispatch.
    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    /// Group/mask filter: `(mask_a & group_b) != 0 && (mask_b & group_a) != 0`.
    #[must_use]
    pub fn can_collide_with(&self, other: &Self) -> bool {
        (self.collision_mask & other.collision_group) != 0
            && (other.collision_mask & self.collision_group) != 0
    }

    /// Radius of the smallest origin-centred circle bounding the shape.
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        match &self.kind {
            ShapeKind::Circle { radius } => *radius,
            ShapeKind::Particle => 0.0,
            ShapeKind::Plane => f64::MAX,
            ShapeKind::Convex(polygon) | ShapeKind::Box { polygon, .. } => {
                polygon.bounding_radius()
            }
            ShapeKind::Line { length } => length * 0.5,
            ShapeKind::Capsule { length, radius } => length * 0.5 + radius,
        }
    }

    /// Enclosed area.
    #[must_use]
    pub fn area(&self) -> f64 {
        match &self.kind {
            ShapeKind::Circle { radius } => PI * radius * radius,
            ShapeKind::Particle | ShapeKind::Line { .. } => 0.0,
            ShapeKind::Plane => f64::INFINITY,
            ShapeKind::Convex(polygon) | ShapeKind::Box { polygon, .. } => polygon.area(),
            ShapeKind::Capsule { length, radius } => PI * radius * radius + 2.0 * radius * length,
        }
    }

    /// Moment of inertia about the shape origin for the given mass.
    #[must_use]
    pub fn moment_of_inertia(&self, mass: f64) -> f64 {
        match &self.kind {
            ShapeKind::Circle { radius } => mass * radius * radius * 0.5,
            ShapeKind::Particle | ShapeKind::Plane => 0.0,
            ShapeKind::Convex(polygon) => polygon.moment_of_inertia(mass),
            ShapeKind::Line { length } => mass * length * length / 12.0,
            ShapeKind::Box { width, height, .. } => {
                mass * (width * width + height * height) / 12.0
            }
            ShapeKind::Capsule { length, radius } => {
                let w = length + radius;
                let h = radius * 2.0;
                mass * (h * h + w * w) / 12.0
            }
        }
    }

    /// Bounding box of the shape placed at `position` with world `angle`.
    #[must_use]
    pub fn compute_aabb(&self, position: &Vec2, angle: f64) -> Aabb {
        match &self.kind {
            ShapeKind::Circle { radius } => {
                Aabb::from_center(*position, Vec2::repeat(*radius))
            }
            ShapeKind::Particle => Aabb::new(*position, *position),
            ShapeKind::Plane => plane_aabb(position, angle),
            ShapeKind::Convex(polygon) | ShapeKind::Box { polygon, .. } => {
                Aabb::from_points(polygon.vertices(), position, angle, 0.0)
            }
            ShapeKind::Line { length } => {
                Aabb::from_points(&segment_points(*length), position, angle, 0.0)
            }
            ShapeKind::Capsule { length, radius } => {
                Aabb::from_points(&segment_points(*length), position, angle, *radius)
            }
        }
    }
}

/// Local endpoints of a segment of the given length along local x.
#[must_use]
pub fn segment_points(length: f64) -> [Vec2; 2] {
    let h = length * 0.5;
    [Vec2::new(-h, 0.0), Vec2::new(h, 0.0)]
}

fn plane_aabb(position: &Vec2, angle: f64) -> Aabb {
    const TOL: f64 = 1e-12;
    let max = f64::MAX;
    let mut aabb = Aabb::new(Vec2::new(-max, -max), Vec2::new(max, max));
    let a = angle.rem_euclid(TAU);
    let near = |target: f64| (a - target).abs() < TOL || (a - target - TAU).abs() < TOL;

    if near(0.0) {
        aabb.upper.y = position.y;
    } else if near(FRAC_PI_2) {
        aabb.lower.x = position.x;
    } else if near(PI) {
        aabb.lower.y = position.y;
    } else if near(3.0 * FRAC_PI_2) {
        aabb.upper.x = position.x;
    }
    aabb
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_canonical_order() {
        assert!(ShapeType::Circle < ShapeType::Particle);
        assert!(ShapeType::Box < ShapeType::Capsule);
        for (i, t) in ShapeType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_convex_clockwise_is_reversed() {
        let cw = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
        ];
        let polygon = ConvexPolygon::new(cw).unwrap();
        assert!(signed_area(polygon.vertices()) > 0.0);
        assert_relative_eq!(polygon.area(), 1.0);
        assert_relative_eq!(polygon.centroid(), Vec2::new(0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_convex_normals_point_outward() {
        let polygon = ConvexPolygon::rectangle(2.0, 2.0);
        for (v, n) in polygon.vertices().iter().zip(polygon.normals()) {
            assert!(v.dot(n) > 0.0);
        }

        let tri = ConvexPolygon::new(vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(0.0, 1.0),
        ])
        .unwrap();
        assert_relative_eq!(tri.normals()[0], Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_convex_zero_length_edge() {
        let polygon = ConvexPolygon::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ])
        .unwrap();
        assert_eq!(polygon.normals()[1], Vec2::zeros());
        assert!(polygon.normals().iter().all(|n| n.x.is_finite() && n.y.is_finite()));
    }

    #[test]
    fn test_convex_rejects_empty() {
        let err = ConvexPolygon::new(Vec::new()).unwrap_err();
        assert!(matches!(err, SimError::InvalidShape { .. }));
    }

    #[test]
    fn test_box_inertia_matches_polygon() {
        let shape = Shape::rectangle(2.0, 1.0);
        let polygon = ConvexPolygon::rectangle(2.0, 1.0);
        assert_relative_eq!(
            shape.moment_of_inertia(3.0),
            polygon.moment_of_inertia(3.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_collision_filter() {
        let a = Shape::circle(1.0).with_collision_group(0b01).with_collision_mask(0b10);
        let b = Shape::circle(1.0).with_collision_group(0b10).with_collision_mask(0b01);
        let c = Shape::circle(1.0).with_collision_group(0b10).with_collision_mask(0b10);
        assert!(a.can_collide_with(&b));
        assert!(b.can_collide_with(&a));
        assert!(!a.can_collide_with(&c));
    }

    #[test]
    fn test_capsule_aabb() {
        let aabb = Shape::capsule(2.0, 0.5).compute_aabb(&Vec2::new(1.0, 0.0), 0.0);
        assert_relative_eq!(aabb.lower, Vec2::new(-0.5, -0.5));
        assert_relative_eq!(aabb.upper, Vec2::new(2.5, 0.5));
    }

    #[test]
    fn test_plane_aabb_faces_up() {
        let aabb = Shape::plane().compute_aabb(&Vec2::new(0.0, 2.0), 0.0);
        assert_eq!(aabb.upper.y, 2.0);
        assert_eq!(aabb.lower.y, -f64::MAX);

        let rotated = Shape::plane().compute_aabb(&Vec2::new(3.0, 0.0), FRAC_PI_2);
        assert_eq!(rotated.lower.x, 3.0);
    }
}
