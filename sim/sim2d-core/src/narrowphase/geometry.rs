//! World-space views of shapes and the contact collector routines write into.

use smallvec::SmallVec;
use sim2d_types::math::{is_finite, rotate, rotate90cw, try_normalize};
use sim2d_types::{segment_points, ShapeKind, Vec2};

use super::ShapeRef;

/// A contact found by a routine, in world space.
///
/// `normal` points from the shape owning `point_a` to the one owning
/// `point_b`. With `reversed` unset `point_a` lies on the first shape of the
/// pair the routine was given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawContact {
    pub normal: Vec2,
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub reversed: bool,
}

/// Collects contacts from the shape-pair routines.
#[derive(Debug, Clone, Default)]
pub(crate) struct Manifold {
    pub contacts: SmallVec<[RawContact; 4]>,
    check_only: bool,
    reversed: bool,
}

impl Manifold {
    pub fn new(check_only: bool) -> Self {
        Self {
            contacts: SmallVec::new(),
            check_only,
            reversed: false,
        }
    }

    /// Record a contact. Non-finite geometry is dropped.
    pub fn push(&mut self, normal: Vec2, point_a: Vec2, point_b: Vec2) {
        if self.done() || !(is_finite(&normal) && is_finite(&point_a) && is_finite(&point_b)) {
            return;
        }
        self.contacts.push(RawContact {
            normal,
            point_a,
            point_b,
            reversed: self.reversed,
        });
    }

    /// In check-only mode the first contact settles the test.
    pub fn done(&self) -> bool {
        self.check_only && !self.contacts.is_empty()
    }

    /// Run a routine with the pair's roles swapped.
    pub fn reversed(&mut self, f: impl FnOnce(&mut Self)) {
        self.reversed = !self.reversed;
        f(self);
        self.reversed = !self.reversed;
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }
}

/// A convex polygon in world space, counter-clockwise.
///
/// Degenerate edges carry a zero normal.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorldPolygon {
    pub vertices: SmallVec<[Vec2; 8]>,
    pub normals: SmallVec<[Vec2; 8]>,
}

impl WorldPolygon {
    /// Polygon from world vertices, computing edge normals.
    pub fn from_vertices(vertices: SmallVec<[Vec2; 8]>) -> Self {
        let n = vertices.len();
        let normals = (0..n)
            .map(|i| {
                let edge = vertices[(i + 1) % n] - vertices[i];
                try_normalize(&rotate90cw(&edge)).unwrap_or_else(Vec2::zeros)
            })
            .collect();
        Self { vertices, normals }
    }

    /// A segment as a two-sided polygon.
    pub fn from_segment(p0: Vec2, p1: Vec2) -> Self {
        Self::from_vertices(SmallVec::from_slice(&[p0, p1]))
    }

    /// Rectangle of `width × height` centred on `center`, rotated by `angle`.
    pub fn rectangle(center: &Vec2, angle: f64, width: f64, height: f64) -> Self {
        let (hx, hy) = (width * 0.5, height * 0.5);
        let corners = [
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
        ];
        Self::from_vertices(corners.iter().map(|c| center + rotate(c, angle)).collect())
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether at least one edge has a usable normal.
    pub fn has_axes(&self) -> bool {
        self.normals.iter().any(|n| *n != Vec2::zeros())
    }

    /// The two vertices farthest apart, for polygons too thin to have axes.
    pub fn extreme_points(&self) -> Option<(Vec2, Vec2)> {
        let first = *self.vertices.first()?;
        let mut best = (first, first, 0.0);
        for (i, a) in self.vertices.iter().enumerate() {
            for b in &self.vertices[i + 1..] {
                let d = (b - a).norm_squared();
                if d > best.2 {
                    best = (*a, *b, d);
                }
            }
        }
        Some((best.0, best.1))
    }
}

fn world(shape: &ShapeRef<'_>, local: &Vec2) -> Vec2 {
    shape.position + rotate(local, shape.angle)
}

/// Centre and radius of a circle or particle.
pub(crate) fn round(shape: &ShapeRef<'_>) -> Option<(Vec2, f64)> {
    match &shape.shape.kind {
        ShapeKind::Circle { radius } => Some((shape.position, *radius)),
        ShapeKind::Particle => Some((shape.position, 0.0)),
        _ => None,
    }
}

/// A point on the plane and its outward normal.
pub(crate) fn plane(shape: &ShapeRef<'_>) -> Option<(Vec2, Vec2)> {
    match &shape.shape.kind {
        ShapeKind::Plane => Some((shape.position, rotate(&Vec2::y(), shape.angle))),
        _ => None,
    }
}

/// Endpoints and radius of a line or capsule.
pub(crate) fn segment(shape: &ShapeRef<'_>) -> Option<(Vec2, Vec2, f64)> {
    let (length, radius) = match &shape.shape.kind {
        ShapeKind::Line { length } => (*length, 0.0),
        ShapeKind::Capsule { length, radius } => (*length, *radius),
        _ => return None,
    };
    let [p0, p1] = segment_points(length);
    Some((world(shape, &p0), world(shape, &p1), radius))
}

/// The shape as a polygon: convex polygons, boxes, and lines as two-gons.
pub(crate) fn polygon(shape: &ShapeRef<'_>) -> Option<WorldPolygon> {
    match &shape.shape.kind {
        ShapeKind::Convex(poly) | ShapeKind::Box { polygon: poly, .. } => Some(WorldPolygon {
            vertices: poly.vertices().iter().map(|v| world(shape, v)).collect(),
            normals: poly
                .normals()
                .iter()
                .map(|n| rotate(n, shape.angle))
                .collect(),
        }),
        ShapeKind::Line { .. } => segment(shape).map(|(p0, p1, _)| WorldPolygon::from_segment(p0, p1)),
        _ => None,
    }
}

/// Closest point to `p` on the segment `a`-`b`.
pub(crate) fn closest_on_segment(p: &Vec2, a: &Vec2, b: &Vec2) -> Vec2 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether a world point lies in the shape, within `precision`.
pub(crate) fn shape_contains_point(shape: &ShapeRef<'_>, point: &Vec2, precision: f64) -> bool {
    if let Some((center, radius)) = round(shape) {
        return (point - center).norm() <= radius + precision;
    }
    if let Some((origin, normal)) = plane(shape) {
        return (point - origin).dot(&normal) <= precision;
    }
    if let Some((p0, p1, radius)) = segment(shape) {
        return (point - closest_on_segment(point, &p0, &p1)).norm() <= radius + precision;
    }
    polygon(shape).is_some_and(|poly| {
        poly.has_axes()
            && poly
                .vertices
                .iter()
                .zip(&poly.normals)
                .all(|(v, n)| (point - v).dot(n) <= precision)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim2d_types::{Body, Shape};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_manifold_check_only_stops_after_first() {
        let mut m = Manifold::new(true);
        m.push(Vec2::x(), Vec2::zeros(), Vec2::zeros());
        m.push(Vec2::y(), Vec2::zeros(), Vec2::zeros());
        assert_eq!(m.len(), 1);
        assert!(m.done());
    }

    #[test]
    fn test_manifold_drops_nan_and_tracks_orientation() {
        let mut m = Manifold::new(false);
        m.push(Vec2::new(f64::NAN, 0.0), Vec2::zeros(), Vec2::zeros());
        assert_eq!(m.len(), 0);

        m.reversed(|m| m.push(Vec2::x(), Vec2::zeros(), Vec2::zeros()));
        m.push(Vec2::x(), Vec2::zeros(), Vec2::zeros());
        assert!(m.contacts[0].reversed);
        assert!(!m.contacts[1].reversed);
    }

    #[test]
    fn test_segment_two_gon_normals() {
        let poly = WorldPolygon::from_segment(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        assert_relative_eq!(poly.normals[0], Vec2::new(0.0, -1.0));
        assert_relative_eq!(poly.normals[1], Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_rectangle_matches_box_shape() {
        let body = Body::new(1.0).with_angle(0.3);
        let shape = Shape::rectangle(2.0, 1.0);
        let r = ShapeRef::new(0, &body, &shape);
        let from_shape = polygon(&r).unwrap();
        let built = WorldPolygon::rectangle(&r.position, r.angle, 2.0, 1.0);
        for (a, b) in from_shape.vertices.iter().zip(&built.vertices) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        for (a, b) in from_shape.normals.iter().zip(&built.normals) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_polygon_extremes() {
        let p = Vec2::new(1.0, 1.0);
        let poly = WorldPolygon::from_vertices(SmallVec::from_slice(&[p, p, p]));
        assert!(!poly.has_axes());
        assert_eq!(poly.extreme_points(), Some((p, p)));
    }

    #[test]
    fn test_contains_point() {
        let body = Body::new(1.0).with_position(Vec2::new(1.0, 0.0)).with_angle(FRAC_PI_2);
        let capsule = Shape::capsule(2.0, 0.5);
        let r = ShapeRef::new(0, &body, &capsule);
        // Capsule now runs along world y through x = 1
        assert!(shape_contains_point(&r, &Vec2::new(1.0, 1.4), 0.0));
        assert!(!shape_contains_point(&r, &Vec2::new(1.6, 0.0), 0.0));
        assert!(shape_contains_point(&r, &Vec2::new(1.6, 0.0), 0.2));

        let ground = Body::new_static();
        let plane = Shape::plane();
        let r = ShapeRef::new(0, &ground, &plane);
        assert!(shape_contains_point(&r, &Vec2::new(3.0, -1.0), 0.0));
        assert!(!shape_contains_point(&r, &Vec2::new(3.0, 1.0), 0.0));

        let square = Shape::rectangle(1.0, 1.0);
        let r = ShapeRef::new(0, &ground, &square);
        assert!(shape_contains_point(&r, &Vec2::new(0.5, 0.5), 0.0));
        assert!(!shape_contains_point(&r, &Vec2::new(0.6, 0.0), 0.0));
    }
}
