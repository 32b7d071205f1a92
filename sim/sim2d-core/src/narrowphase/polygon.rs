//! Separating-axis routines for polygons, and the plane and capsule
//! routines built on them.
//!
//! # Algorithm
//!
//! Polygon against polygon follows the clipping approach:
//!
//! 1. For every edge normal of A, find the deepest vertex of B; the edge with
//!    the largest separation is A's candidate face. Repeat with roles swapped.
//! 2. Any positive separation means a separating axis exists: no contact.
//! 3. The reference face is A's unless B's separation is larger by more than
//!    a small tolerance, so near-ties keep a stable choice. Ties between edges
//!    of one polygon go to the lower index.
//! 4. The incident edge is the most anti-parallel edge of the other polygon;
//!    it is clipped to the side planes of the reference face.
//! 5. Clipped points behind the reference face become contacts, at most two.
//!    An incident edge that only touches a side plane leaves one point.
//!
//! Edges with a zero normal (coincident vertices) are never used as axes.

use smallvec::SmallVec;
use sim2d_types::math::{try_normalize, EPSILON};
use sim2d_types::Vec2;

use super::geometry::{Manifold, WorldPolygon};
use super::round::{plane_round, round_polygon, round_round};

/// Reference face hysteresis.
const FLIP_TOLERANCE: f64 = 0.0005;

fn max_separation(p1: &WorldPolygon, p2: &WorldPolygon) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, (v, n)) in p1.vertices.iter().zip(&p1.normals).enumerate() {
        if *n == Vec2::zeros() {
            continue;
        }
        let s = p2
            .vertices
            .iter()
            .map(|w| n.dot(&(w - v)))
            .fold(f64::INFINITY, f64::min);
        if s > best.1 {
            best = (i, s);
        }
    }
    best
}

fn incident_edge(normal: &Vec2, poly: &WorldPolygon) -> usize {
    let mut best = (0, f64::INFINITY);
    for (i, n) in poly.normals.iter().enumerate() {
        if *n == Vec2::zeros() {
            continue;
        }
        let d = normal.dot(n);
        if d < best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// Keep the part of a segment with `dot(normal, p) <= offset`.
///
/// A single point (an incident edge already clipped down to one end) is kept
/// or dropped whole.
fn clip_segment(points: &[Vec2], normal: &Vec2, offset: f64) -> SmallVec<[Vec2; 2]> {
    let mut out = SmallVec::new();
    match *points {
        [p] => {
            if normal.dot(&p) - offset <= 0.0 {
                out.push(p);
            }
        }
        [v0, v1, ..] => {
            let d0 = normal.dot(&v0) - offset;
            let d1 = normal.dot(&v1) - offset;
            if d0 <= 0.0 {
                out.push(v0);
            }
            if d1 <= 0.0 {
                out.push(v1);
            }
            if d0 * d1 < 0.0 {
                out.push(v0 + (v1 - v0) * (d0 / (d0 - d1)));
            }
        }
        [] => {}
    }
    out
}

/// Convex polygon against convex polygon; lines enter as two-gons.
pub(crate) fn polygon_polygon(a: &WorldPolygon, b: &WorldPolygon, out: &mut Manifold) {
    match (a.has_axes(), b.has_axes()) {
        (true, true) => {}
        (false, true) => {
            for p in degenerate_points(a) {
                round_polygon(p, 0.0, b, out);
            }
            return;
        }
        (true, false) => {
            out.reversed(|m| {
                for p in degenerate_points(b) {
                    round_polygon(p, 0.0, a, m);
                }
            });
            return;
        }
        (false, false) => return,
    }

    let (edge_a, separation_a) = max_separation(a, b);
    if separation_a > 0.0 {
        return;
    }
    let (edge_b, separation_b) = max_separation(b, a);
    if separation_b > 0.0 {
        return;
    }

    let (reference, incident, edge, flip) = if separation_b > separation_a + FLIP_TOLERANCE {
        (b, a, edge_b, true)
    } else {
        (a, b, edge_a, false)
    };

    let n = reference.len();
    let v1 = reference.vertices[edge];
    let v2 = reference.vertices[(edge + 1) % n];
    let normal = reference.normals[edge];
    let Some(tangent) = try_normalize(&(v2 - v1)) else {
        return;
    };

    let inc = incident_edge(&normal, incident);
    let m = incident.len();
    let incident_points = [incident.vertices[inc], incident.vertices[(inc + 1) % m]];

    let side1 = -tangent.dot(&v1);
    let side2 = tangent.dot(&v2);
    // An incident vertex exactly on a side plane clips to one point, which
    // still makes a one-point manifold.
    let clipped = clip_segment(&incident_points, &-tangent, side1);
    let clipped = clip_segment(&clipped, &tangent, side2);

    let front = normal.dot(&v1);
    for cp in clipped.iter().take(2) {
        let separation = normal.dot(cp) - front;
        if separation > 0.0 {
            continue;
        }
        let on_reference = cp - normal * separation;
        if flip {
            out.push(-normal, *cp, on_reference);
        } else {
            out.push(normal, on_reference, *cp);
        }
        if out.done() {
            return;
        }
    }
}

fn degenerate_points(poly: &WorldPolygon) -> SmallVec<[Vec2; 2]> {
    let mut points = SmallVec::new();
    if let Some((p, q)) = poly.extreme_points() {
        points.push(p);
        if (q - p).norm_squared() > EPSILON {
            points.push(q);
        }
    }
    points
}

/// Plane against polygon: the two deepest vertices behind the plane.
pub(crate) fn plane_polygon(origin: Vec2, normal: Vec2, poly: &WorldPolygon, out: &mut Manifold) {
    let mut behind: SmallVec<[(f64, Vec2); 8]> = poly
        .vertices
        .iter()
        .map(|v| ((v - origin).dot(&normal), *v))
        .filter(|(d, _)| *d <= 0.0)
        .collect();
    behind.sort_by(|x, y| x.0.total_cmp(&y.0));

    for (d, v) in behind.iter().take(2) {
        out.push(normal, v - normal * *d, *v);
    }
}

/// Plane against a line (`radius = 0`) or capsule: one test per end.
///
/// The test is inclusive, `d <= radius`, so a line lying exactly on the plane
/// reports both ends as touching contacts rather than being separated, the
/// same closed boundary the AABB overlap test uses.
pub(crate) fn plane_segment(
    origin: Vec2,
    normal: Vec2,
    p0: Vec2,
    p1: Vec2,
    radius: f64,
    out: &mut Manifold,
) {
    for end in segment_ends(p0, p1) {
        plane_round(origin, normal, end, radius, out);
    }
}

fn segment_ends(p0: Vec2, p1: Vec2) -> SmallVec<[Vec2; 2]> {
    let mut ends = SmallVec::new();
    ends.push(p0);
    if (p1 - p0).norm_squared() > EPSILON {
        ends.push(p1);
    }
    ends
}

/// Rectangle covering the straight part of a capsule.
fn capsule_body(p0: Vec2, p1: Vec2, radius: f64) -> Option<WorldPolygon> {
    let d = p1 - p0;
    let length = d.norm();
    if length * length <= EPSILON {
        return None;
    }
    let center = (p0 + p1) * 0.5;
    Some(WorldPolygon::rectangle(&center, d.y.atan2(d.x), length, radius * 2.0))
}

/// Polygon (or line two-gon) against capsule: the end circles plus the
/// capsule's rectangular body.
pub(crate) fn polygon_capsule(poly: &WorldPolygon, p0: Vec2, p1: Vec2, radius: f64, out: &mut Manifold) {
    out.reversed(|m| {
        for end in segment_ends(p0, p1) {
            round_polygon(end, radius, poly, m);
        }
    });
    if out.done() {
        return;
    }
    if let Some(rect) = capsule_body(p0, p1, radius) {
        polygon_polygon(poly, &rect, out);
    }
}

/// Capsule against capsule.
///
/// Each rectangle body meets the other capsule, and every pair of end
/// circles is tested, so long overlapping capsules report contacts along
/// the whole overlap.
pub(crate) fn capsule_capsule(a: (Vec2, Vec2, f64), b: (Vec2, Vec2, f64), out: &mut Manifold) {
    let (p0, p1, ra) = a;
    let (q0, q1, rb) = b;

    if let Some(rect) = capsule_body(p0, p1, ra) {
        polygon_capsule(&rect, q0, q1, rb, out);
    }
    if let Some(rect) = capsule_body(q0, q1, rb) {
        out.reversed(|m| polygon_capsule(&rect, p0, p1, ra, m));
    }
    for ea in segment_ends(p0, p1) {
        for eb in segment_ends(q0, q1) {
            if out.done() {
                return;
            }
            round_round(ea, ra, eb, rb, out);
        }
    }
}
