//! Axis-aligned bounding boxes and rays.

use crate::math::{rotate, Vec2, EPSILON};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coordinate axis of the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    /// The horizontal axis.
    #[default]
    X,
    /// The vertical axis.
    Y,
}

impl Axis {
    /// Component index of this axis.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
        }
    }
}

/// An axis-aligned bounding box.
///
/// The invariant `lower <= upper` holds component-wise for every box built
/// through the constructors here.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Lower corner.
    pub lower: Vec2,
    /// Upper corner.
    pub upper: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Vec2::zeros(), Vec2::zeros())
    }
}

impl Aabb {
    /// Create an AABB from its corners.
    #[must_use]
    pub const fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            lower: center - half_extents,
            upper: center + half_extents,
        }
    }

    /// Bound a point set after rotating every point by `angle` and then
    /// translating it by `position`, widened by `skin` on every side.
    ///
    /// An empty point set yields the degenerate box at `position`.
    #[must_use]
    pub fn from_points(points: &[Vec2], position: &Vec2, angle: f64, skin: f64) -> Self {
        let mut aabb = Self::default();
        aabb.set_from_points(points, position, angle, skin);
        aabb
    }

    /// In-place form of [`Aabb::from_points`].
    pub fn set_from_points(&mut self, points: &[Vec2], position: &Vec2, angle: f64, skin: f64) {
        let transform = |p: &Vec2| {
            if angle == 0.0 {
                *p
            } else {
                rotate(p, angle)
            }
        };

        let Some((first, rest)) = points.split_first() else {
            self.lower = *position;
            self.upper = *position;
            return;
        };

        let first = transform(first);
        let mut lower = first;
        let mut upper = first;
        for p in rest {
            let p = transform(p);
            lower = lower.inf(&p);
            upper = upper.sup(&p);
        }

        let skin = Vec2::repeat(skin);
        self.lower = lower + position - skin;
        self.upper = upper + position + skin;
    }

    /// Check if this AABB overlaps another.
    ///
    /// Touching boxes (a shared edge or corner) overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.lower.x <= other.upper.x
            && self.upper.x >= other.lower.x
            && self.lower.y <= other.upper.y
            && self.upper.y >= other.lower.y
    }

    /// Check if a point lies inside the box or on its boundary.
    #[must_use]
    pub fn contains_point(&self, point: &Vec2) -> bool {
        point.x >= self.lower.x
            && point.x <= self.upper.x
            && point.y >= self.lower.y
            && point.y <= self.upper.y
    }

    /// Check if another box lies entirely inside this one.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(&other.lower) && self.contains_point(&other.upper)
    }

    /// Fraction along `ray` where it first enters this box.
    ///
    /// Returns a value in `[0, 1]` (`0` when the ray starts inside), or `None`
    /// when the segment misses.
    #[must_use]
    pub fn overlaps_ray(&self, ray: &Ray) -> Option<f64> {
        let delta = ray.to - ray.from;
        let mut t_min: f64 = 0.0;
        let mut t_max: f64 = 1.0;

        for axis in [Axis::X, Axis::Y] {
            let i = axis.index();
            let (from, d) = (ray.from[i], delta[i]);
            let (lo, hi) = (self.lower[i], self.upper[i]);

            if d.abs() < EPSILON {
                // Parallel to this slab
                if from < lo || from > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t1 = (lo - from) * inv;
            let mut t2 = (hi - from) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }

    /// Grow this box to also bound `other`.
    pub fn extend(&mut self, other: &Self) {
        self.lower = self.lower.inf(&other.lower);
        self.upper = self.upper.sup(&other.upper);
    }

    /// Smallest box bounding both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out.extend(other);
        out
    }

    /// Widen the box by a margin on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vec2::repeat(margin);
        Self::new(self.lower - m, self.upper + m)
    }

    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    /// Half of the box size on each axis.
    #[must_use]
    pub fn half_extents(&self) -> Vec2 {
        (self.upper - self.lower) * 0.5
    }

    /// Perimeter length.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let size = self.upper - self.lower;
        2.0 * (size.x + size.y)
    }

    /// Size along one axis.
    #[must_use]
    pub fn extent(&self, axis: Axis) -> f64 {
        self.upper[axis.index()] - self.lower[axis.index()]
    }

    /// Lower bound on one axis.
    #[must_use]
    pub fn min_on_axis(&self, axis: Axis) -> f64 {
        self.lower[axis.index()]
    }

    /// Upper bound on one axis.
    #[must_use]
    pub fn max_on_axis(&self, axis: Axis) -> f64 {
        self.upper[axis.index()]
    }

    /// Whether `lower <= upper` on both axes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lower.x <= self.upper.x && self.lower.y <= self.upper.y
    }
}

/// A directed line segment used for queries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ray {
    /// Start point.
    pub from: Vec2,
    /// End point.
    pub to: Vec2,
}

impl Ray {
    /// Create a ray between two points.
    #[must_use]
    pub const fn new(from: Vec2, to: Vec2) -> Self {
        Self { from, to }
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.to - self.from).norm()
    }

    /// Unit direction, or zero for a degenerate ray.
    #[must_use]
    pub fn direction(&self) -> Vec2 {
        crate::math::try_normalize(&(self.to - self.from)).unwrap_or_else(Vec2::zeros)
    }

    /// Point at a fraction of the way from `from` to `to`.
    #[must_use]
    pub fn point_at(&self, fraction: f64) -> Vec2 {
        self.from + (self.to - self.from) * fraction
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn unit_box() -> Aabb {
        Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0))
    }

    #[test]
    fn test_overlaps_corner_touch() {
        let a = Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(0.0, 0.0));
        let b = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_overlaps_separated() {
        let a = Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(0.0, 0.0));
        let b = Aabb::new(Vec2::new(0.5, 0.5), Vec2::new(1.0, 1.0));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_contains_point_boundary() {
        let aabb = unit_box();
        assert!(aabb.contains_point(&Vec2::new(1.0, 1.0)));
        assert!(aabb.contains_point(&Vec2::new(-1.0, 0.0)));
        assert!(aabb.contains_point(&Vec2::zeros()));
        assert!(!aabb.contains_point(&Vec2::new(1.0001, 0.0)));
    }

    #[test]
    fn test_set_from_points_translated() {
        let points = [Vec2::new(40.0, 50.0), Vec2::new(-20.0, -30.0)];
        let aabb = Aabb::from_points(&points, &Vec2::new(100.0, 200.0), 0.0, 0.0);
        assert_relative_eq!(aabb.lower, Vec2::new(80.0, 170.0));
        assert_relative_eq!(aabb.upper, Vec2::new(140.0, 250.0));
    }

    #[test]
    fn test_set_from_points_rotated() {
        let points = [Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)];
        let aabb = Aabb::from_points(&points, &Vec2::zeros(), FRAC_PI_4, 0.0);
        let c = FRAC_PI_4.cos();
        assert_relative_eq!(aabb.lower, Vec2::new(-c, -c), epsilon = 1e-12);
        assert_relative_eq!(aabb.upper, Vec2::new(c, c), epsilon = 1e-12);
        assert_relative_eq!(aabb.half_extents(), Vec2::new(c, c), epsilon = 1e-12);
    }

    #[test]
    fn test_set_from_points_skin() {
        let aabb = Aabb::from_points(&[Vec2::zeros()], &Vec2::zeros(), 0.0, 0.5);
        assert_relative_eq!(aabb.lower, Vec2::new(-0.5, -0.5));
        assert_relative_eq!(aabb.upper, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_set_from_points_empty() {
        let aabb = Aabb::from_points(&[], &Vec2::new(3.0, 4.0), 1.0, 0.0);
        assert_eq!(aabb.lower, Vec2::new(3.0, 4.0));
        assert!(aabb.is_valid());
    }

    #[test]
    fn test_overlaps_ray_hit_fraction() {
        let ray = Ray::new(Vec2::new(-3.0, 0.0), Vec2::new(3.0, 0.0));
        let t = unit_box().overlaps_ray(&ray).unwrap();
        assert_relative_eq!(t, 2.0 / 6.0, epsilon = 1e-12);
        assert!((0.0..=1.0).contains(&t));
    }

    #[test]
    fn test_overlaps_ray_inside_and_miss() {
        let inside = Ray::new(Vec2::zeros(), Vec2::new(5.0, 5.0));
        assert_eq!(unit_box().overlaps_ray(&inside), Some(0.0));

        let miss = Ray::new(Vec2::new(-3.0, 2.0), Vec2::new(3.0, 2.0));
        assert!(unit_box().overlaps_ray(&miss).is_none());

        let short = Ray::new(Vec2::new(-3.0, 0.0), Vec2::new(-2.0, 0.0));
        assert!(unit_box().overlaps_ray(&short).is_none());
    }

    #[test]
    fn test_union_and_perimeter() {
        let a = Aabb::new(Vec2::zeros(), Vec2::new(1.0, 1.0));
        let b = Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 0.0));
        let u = a.union(&b);
        assert_eq!(u.lower, Vec2::new(0.0, -1.0));
        assert_eq!(u.upper, Vec2::new(3.0, 1.0));
        assert_relative_eq!(u.perimeter(), 10.0);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }
}
