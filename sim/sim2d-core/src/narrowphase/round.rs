//! Circle and particle routines.
//!
//! Contacts are oriented from the round shape to the other one, except
//! against planes, where the plane is always body A so the normal is the
//! plane normal.

use sim2d_types::math::{rotate90cw, try_normalize, EPSILON};
use sim2d_types::Vec2;

use super::geometry::{closest_on_segment, Manifold, WorldPolygon};

/// Circle (or particle) against circle.
///
/// Touching counts: contact iff `|c2 - c1| <= r1 + r2`. Coincident centres
/// fall back to the x axis as normal.
pub(crate) fn round_round(c1: Vec2, r1: f64, c2: Vec2, r2: f64, out: &mut Manifold) {
    let d = c2 - c1;
    let rsum = r1 + r2;
    if d.norm_squared() > rsum * rsum {
        return;
    }
    let n = try_normalize(&d).unwrap_or_else(Vec2::x);
    out.push(n, c1 + n * r1, c2 - n * r2);
}

/// Plane against circle (or particle); the plane owns `point_a`.
pub(crate) fn plane_round(origin: Vec2, normal: Vec2, center: Vec2, radius: f64, out: &mut Manifold) {
    let d = (center - origin).dot(&normal);
    if d > radius {
        return;
    }
    out.push(normal, center - normal * d, center - normal * radius);
}

/// Circle (or particle, `radius = 0`) against a convex polygon.
///
/// Picks the face of largest separation; a centre inside the polygon
/// resolves along that face, otherwise the closest edge or vertex decides.
pub(crate) fn round_polygon(center: Vec2, radius: f64, poly: &WorldPolygon, out: &mut Manifold) {
    let n = poly.len();
    if n == 0 {
        return;
    }
    if !poly.has_axes() {
        if let Some((a, b)) = poly.extreme_points() {
            round_segment(center, radius, a, b, 0.0, out);
        }
        return;
    }

    let mut face = 0;
    let mut separation = f64::NEG_INFINITY;
    for (i, (v, normal)) in poly.vertices.iter().zip(&poly.normals).enumerate() {
        if *normal == Vec2::zeros() {
            continue;
        }
        let s = normal.dot(&(center - v));
        if s > radius {
            return;
        }
        if s > separation {
            separation = s;
            face = i;
        }
    }

    let v1 = poly.vertices[face];
    let v2 = poly.vertices[(face + 1) % n];
    let face_normal = poly.normals[face];

    if separation < EPSILON {
        // Centre inside: push out through the reference face
        out.push(-face_normal, center - face_normal * radius, center - face_normal * separation);
        return;
    }

    let u1 = (center - v1).dot(&(v2 - v1));
    let u2 = (center - v2).dot(&(v1 - v2));
    let (surface, outward) = if u1 <= 0.0 {
        (v1, center - v1)
    } else if u2 <= 0.0 {
        (v2, center - v2)
    } else {
        (center - face_normal * separation, face_normal * separation)
    };

    if outward.norm_squared() > radius * radius {
        return;
    }
    let normal = try_normalize(&outward).unwrap_or(face_normal);
    out.push(-normal, center - normal * radius, surface);
}

/// Circle (or particle) against a line or capsule segment.
///
/// The contact is along the shortest distance between the centre and the
/// segment. A centre lying on the segment uses the segment's right-hand
/// perpendicular.
pub(crate) fn round_segment(
    center: Vec2,
    radius: f64,
    p0: Vec2,
    p1: Vec2,
    segment_radius: f64,
    out: &mut Manifold,
) {
    let closest = closest_on_segment(&center, &p0, &p1);
    let d = closest - center;
    let rsum = radius + segment_radius;
    if d.norm_squared() > rsum * rsum {
        return;
    }
    let normal = try_normalize(&d)
        .or_else(|| try_normalize(&rotate90cw(&(p1 - p0))))
        .unwrap_or_else(|| -Vec2::y());
    out.push(normal, center + normal * radius, closest - normal * segment_radius);
}
