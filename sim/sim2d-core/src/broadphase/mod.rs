//! Broadphase: candidate body pairs from bounding volumes.
//!
//! Every algorithm reports each pair at most once as `(i, j)` with `i < j`,
//! indices into the body slice it was given. A pair is a candidate only if
//! [`can_collide`] allows it and the bodies' cached AABBs overlap, so all
//! three algorithms produce the same set of pairs for the same scene; only
//! the order differs.
//!
//! | Algorithm | Cost | Best for |
//! |-----------|------|----------|
//! | [`NaiveBroadphase`] | O(n²) | small scenes |
//! | [`SweepAndPrune`] | ~O(n + k) with coherent motion | general use |
//! | [`GridBroadphase`] | O(n + k) within bounds | bounded, evenly spread scenes |
//!
//! Bodies' AABBs must be up to date before
//! [`Broadphase::collision_pairs`] runs; the world refreshes them at the
//! start of every step.
//!
//! # Example
//!
//! ```
//! use sim2d_core::broadphase::{Broadphase, SweepAndPrune};
//! use sim2d_types::{Body, Shape, Vec2};
//!
//! let mut bodies = vec![
//!     Body::new(1.0).with_shape(Shape::circle(1.0)),
//!     Body::new(1.0).with_position(Vec2::new(1.5, 0.0)).with_shape(Shape::circle(1.0)),
//!     Body::new(1.0).with_position(Vec2::new(10.0, 0.0)).with_shape(Shape::circle(1.0)),
//! ];
//! for body in &mut bodies {
//!     body.update_aabb();
//! }
//!
//! let mut sap = SweepAndPrune::default();
//! assert_eq!(sap.collision_pairs(&bodies), vec![(0, 1)]);
//! ```

mod grid;
mod naive;
mod sap;

pub use grid::{GridBroadphase, GridConfig};
pub use naive::NaiveBroadphase;
pub use sap::{SweepAndPrune, SweepAndPruneConfig};

use sim2d_types::{Aabb, Body};

use crate::error::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Trait for broadphase algorithms.
pub trait Broadphase {
    /// Candidate pairs `(i, j)`, `i < j`, each reported once.
    fn collision_pairs(&mut self, bodies: &[Body]) -> Vec<(usize, usize)>;

    /// Indices of bodies whose AABB overlaps `aabb`.
    fn aabb_query(&mut self, bodies: &[Body], aabb: &Aabb) -> Vec<usize> {
        bodies
            .iter()
            .enumerate()
            .filter(|(_, body)| body.aabb().overlaps(aabb))
            .map(|(i, _)| i)
            .collect()
    }

    /// Short algorithm name for logs.
    fn name(&self) -> &'static str;
}

/// Body-level pair rules shared by every broadphase.
///
/// Rejects pairs of two non-dynamic bodies, two sleeping bodies, a sleeping
/// body against a static one, and bodies without shapes.
#[must_use]
pub fn can_collide(a: &Body, b: &Body) -> bool {
    if a.shapes().is_empty() || b.shapes().is_empty() {
        return false;
    }
    if !a.is_dynamic() && !b.is_dynamic() {
        return false;
    }
    if a.is_sleeping() && b.is_sleeping() {
        return false;
    }
    if (a.is_sleeping() && b.is_static()) || (b.is_sleeping() && a.is_static()) {
        return false;
    }
    true
}

/// Bounding volume used to confirm a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BoundingVolume {
    /// The bodies' cached AABBs.
    #[default]
    Aabb,
    /// Circles around the body origins of radius [`Body::bounding_radius`].
    BoundingCircle,
}

/// Overlap test of two bodies under the given volume.
#[must_use]
pub fn bounding_volumes_overlap(volume: BoundingVolume, a: &Body, b: &Body) -> bool {
    match volume {
        BoundingVolume::Aabb => a.aabb().overlaps(b.aabb()),
        BoundingVolume::BoundingCircle => {
            let r = a.bounding_radius() + b.bounding_radius();
            (b.position - a.position).norm_squared() <= r * r
        }
    }
}

pub(crate) fn ordered(i: usize, j: usize) -> (usize, usize) {
    if i < j {
        (i, j)
    } else {
        (j, i)
    }
}

/// Broadphase algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BroadphaseAlgorithm {
    /// Test every pair.
    Naive,
    /// Sort and sweep along one axis.
    #[default]
    SweepAndPrune,
    /// Uniform grid over fixed bounds.
    Grid(GridConfig),
}

/// Configuration for broadphase detection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BroadphaseConfig {
    /// Algorithm to use.
    pub algorithm: BroadphaseAlgorithm,
    /// Sweep settings when the algorithm is [`BroadphaseAlgorithm::SweepAndPrune`].
    pub sweep: SweepAndPruneConfig,
    /// Confirmation volume for the naive algorithm. Sweep and grid always
    /// confirm with AABBs.
    pub bounding_volume: BoundingVolume,
}

impl BroadphaseConfig {
    /// Naive pair testing.
    #[must_use]
    pub fn naive() -> Self {
        Self {
            algorithm: BroadphaseAlgorithm::Naive,
            ..Self::default()
        }
    }

    /// Uniform grid over the given bounds.
    #[must_use]
    pub fn grid(grid: GridConfig) -> Self {
        Self {
            algorithm: BroadphaseAlgorithm::Grid(grid),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for grid parameters that cannot form a grid.
    pub fn validate(&self) -> Result<()> {
        match &self.algorithm {
            BroadphaseAlgorithm::Grid(grid) => grid.validate(),
            BroadphaseAlgorithm::Naive | BroadphaseAlgorithm::SweepAndPrune => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Naive(NaiveBroadphase),
    SweepAndPrune(SweepAndPrune),
    Grid(GridBroadphase),
}

/// Broadphase selected by configuration.
///
/// This wraps the algorithm selection and gives the world one stable type.
#[derive(Debug, Clone)]
pub struct BroadphaseDetector {
    config: BroadphaseConfig,
    backend: Backend,
}

impl Default for BroadphaseDetector {
    fn default() -> Self {
        Self {
            config: BroadphaseConfig::default(),
            backend: Backend::SweepAndPrune(SweepAndPrune::default()),
        }
    }
}

impl BroadphaseDetector {
    /// Create a detector for the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: BroadphaseConfig) -> Result<Self> {
        let backend = match config.algorithm {
            BroadphaseAlgorithm::Naive => {
                Backend::Naive(NaiveBroadphase::new().with_bounding_volume(config.bounding_volume))
            }
            BroadphaseAlgorithm::SweepAndPrune => {
                Backend::SweepAndPrune(SweepAndPrune::new(config.sweep))
            }
            BroadphaseAlgorithm::Grid(grid) => Backend::Grid(GridBroadphase::new(grid)?),
        };
        Ok(Self { config, backend })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &BroadphaseConfig {
        &self.config
    }

    fn inner(&mut self) -> &mut dyn Broadphase {
        match &mut self.backend {
            Backend::Naive(b) => b,
            Backend::SweepAndPrune(b) => b,
            Backend::Grid(b) => b,
        }
    }
}

impl Broadphase for BroadphaseDetector {
    fn collision_pairs(&mut self, bodies: &[Body]) -> Vec<(usize, usize)> {
        self.inner().collision_pairs(bodies)
    }

    fn aabb_query(&mut self, bodies: &[Body], aabb: &Aabb) -> Vec<usize> {
        self.inner().aabb_query(bodies, aabb)
    }

    fn name(&self) -> &'static str {
        match &self.backend {
            Backend::Naive(b) => b.name(),
            Backend::SweepAndPrune(b) => b.name(),
            Backend::Grid(b) => b.name(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
pub(crate) mod tests {
    use super::*;
    use sim2d_types::{Shape, Vec2};

    pub(crate) fn circle_at(x: f64, y: f64, r: f64) -> Body {
        let mut body = Body::new(1.0)
            .with_position(Vec2::new(x, y))
            .with_shape(Shape::circle(r));
        body.update_aabb();
        body
    }

    pub(crate) fn ground() -> Body {
        let mut body = Body::new_static().with_shape(Shape::plane());
        body.update_aabb();
        body
    }

    pub(crate) fn scene() -> Vec<Body> {
        vec![
            circle_at(0.0, 0.5, 0.5),
            circle_at(0.8, 0.5, 0.5),
            circle_at(5.0, 5.0, 0.5),
            ground(),
            circle_at(5.5, 5.2, 0.5),
            circle_at(-3.0, 9.0, 0.25),
        ]
    }

    pub(crate) fn sorted(mut pairs: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn test_can_collide_rules() {
        let dynamic = circle_at(0.0, 0.0, 1.0);
        let ground = ground();
        let mut other_ground = Body::new_static().with_shape(Shape::circle(1.0));
        other_ground.update_aabb();
        let mut kinematic = Body::new_kinematic().with_shape(Shape::circle(1.0));
        kinematic.update_aabb();

        assert!(can_collide(&dynamic, &ground));
        assert!(!can_collide(&ground, &other_ground));
        assert!(!can_collide(&ground, &kinematic));
        assert!(can_collide(&dynamic, &kinematic));

        let mut sleeping = circle_at(0.0, 0.0, 1.0);
        sleeping.sleep();
        assert!(!can_collide(&sleeping, &ground));
        assert!(can_collide(&sleeping, &dynamic));
        assert!(can_collide(&sleeping, &kinematic));
        let mut other = circle_at(0.0, 0.0, 1.0);
        other.sleep();
        assert!(!can_collide(&sleeping, &other));

        let empty = Body::new(1.0);
        assert!(!can_collide(&empty, &dynamic));
    }

    #[test]
    fn test_bounding_circle_volume() {
        let a = circle_at(0.0, 0.0, 1.0);
        let b = circle_at(1.9, 0.0, 1.0);
        let c = circle_at(2.1, 0.0, 1.0);
        assert!(bounding_volumes_overlap(BoundingVolume::BoundingCircle, &a, &b));
        assert!(!bounding_volumes_overlap(BoundingVolume::BoundingCircle, &a, &c));

        // Diagonal neighbours: boxes touch, circles don't
        let d = circle_at(1.9, 1.9, 1.0);
        assert!(bounding_volumes_overlap(BoundingVolume::Aabb, &a, &d));
        assert!(!bounding_volumes_overlap(BoundingVolume::BoundingCircle, &a, &d));
    }

    #[test]
    fn test_all_algorithms_agree() {
        let bodies = scene();
        let grid = GridConfig::new(-10.0, 10.0, -10.0, 10.0, 8, 8);
        let configs = [
            BroadphaseConfig::naive(),
            BroadphaseConfig::default(),
            BroadphaseConfig::grid(grid),
        ];

        let expected = vec![(0, 1), (0, 3), (1, 3), (2, 4)];
        for config in configs {
            let mut detector = BroadphaseDetector::new(config).unwrap();
            assert_eq!(
                sorted(detector.collision_pairs(&bodies)),
                expected,
                "{}",
                detector.name()
            );
        }
    }

    #[test]
    fn test_aabb_query() {
        let bodies = scene();
        let mut detector = BroadphaseDetector::default();
        let hits = detector.aabb_query(
            &bodies,
            &Aabb::new(Vec2::new(4.0, 4.0), Vec2::new(6.0, 6.0)),
        );
        assert_eq!(hits, vec![2, 4]);
    }

    #[test]
    fn test_invalid_grid_rejected() {
        let config = BroadphaseConfig::grid(GridConfig::new(0.0, 0.0, 0.0, 1.0, 4, 4));
        assert!(config.validate().is_err());
        assert!(BroadphaseDetector::new(config).is_err());
    }
}
