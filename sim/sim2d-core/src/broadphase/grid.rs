use hashbrown::HashSet;
use smallvec::SmallVec;
use sim2d_types::{Aabb, Body, Vec2};
use tracing::debug;

use super::{can_collide, ordered, Broadphase};
use crate::error::{CollisionError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bounds and resolution of a [`GridBroadphase`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridConfig {
    /// Left edge.
    pub xmin: f64,
    /// Right edge.
    pub xmax: f64,
    /// Bottom edge.
    pub ymin: f64,
    /// Top edge.
    pub ymax: f64,
    /// Cells along x.
    pub nx: usize,
    /// Cells along y.
    pub ny: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::new(-100.0, 100.0, -100.0, 100.0, 10, 10)
    }
}

impl GridConfig {
    /// Grid over `[xmin, xmax] × [ymin, ymax]` with `nx × ny` cells.
    #[must_use]
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64, nx: usize, ny: usize) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
            nx,
            ny,
        }
    }

    /// Validate the grid.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::InvalidGrid`] for non-finite or empty bounds
    /// and zero cell counts.
    pub fn validate(&self) -> Result<()> {
        let bounds = [self.xmin, self.xmax, self.ymin, self.ymax];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(CollisionError::invalid_grid("bounds must be finite"));
        }
        if self.xmax <= self.xmin || self.ymax <= self.ymin {
            return Err(CollisionError::invalid_grid(format!(
                "empty bounds [{}, {}] x [{}, {}]",
                self.xmin, self.xmax, self.ymin, self.ymax
            )));
        }
        if self.nx == 0 || self.ny == 0 {
            return Err(CollisionError::invalid_grid(format!(
                "cell counts must be positive, got {} x {}",
                self.nx, self.ny
            )));
        }
        Ok(())
    }

    /// Bounds as an AABB.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec2::new(self.xmin, self.ymin),
            Vec2::new(self.xmax, self.ymax),
        )
    }

    #[allow(clippy::cast_precision_loss)]
    fn cell_size(&self) -> Vec2 {
        Vec2::new(
            (self.xmax - self.xmin) / self.nx as f64,
            (self.ymax - self.ymin) / self.ny as f64,
        )
    }
}

/// Uniform-grid broadphase.
///
/// Every body goes into each cell its AABB overlaps; bodies sharing a cell
/// are candidates. Boxes reaching past the bounds are clamped to the border
/// cells, so bodies outside the grid still pair correctly but pile up there
/// and the grid degrades towards the naive algorithm.
#[derive(Debug, Clone)]
pub struct GridBroadphase {
    config: GridConfig,
    cell_size: Vec2,
    bins: Vec<SmallVec<[usize; 4]>>,
    seen: HashSet<(usize, usize)>,
}

impl GridBroadphase {
    /// Create a grid broadphase.
    ///
    /// # Errors
    ///
    /// See [`GridConfig::validate`].
    pub fn new(config: GridConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cell_size: config.cell_size(),
            bins: vec![SmallVec::new(); config.nx * config.ny],
            seen: HashSet::new(),
            config,
        })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Number of bodies in each cell after the last call, row-major from
    /// the bottom-left cell.
    #[must_use]
    pub fn occupancy(&self) -> Vec<usize> {
        self.bins.iter().map(SmallVec::len).collect()
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn cell(value: f64, min: f64, size: f64, count: usize) -> usize {
        let index = ((value - min) / size).floor();
        if index.is_nan() {
            return 0;
        }
        index.clamp(0.0, (count - 1) as f64) as usize
    }

    fn cell_range(&self, aabb: &Aabb) -> (usize, usize, usize, usize) {
        let c = &self.config;
        (
            Self::cell(aabb.lower.x, c.xmin, self.cell_size.x, c.nx),
            Self::cell(aabb.upper.x, c.xmin, self.cell_size.x, c.nx),
            Self::cell(aabb.lower.y, c.ymin, self.cell_size.y, c.ny),
            Self::cell(aabb.upper.y, c.ymin, self.cell_size.y, c.ny),
        )
    }
}

impl Broadphase for GridBroadphase {
    fn collision_pairs(&mut self, bodies: &[Body]) -> Vec<(usize, usize)> {
        for bin in &mut self.bins {
            bin.clear();
        }
        let bounds = self.config.bounds();
        let nx = self.config.nx;

        for (index, body) in bodies.iter().enumerate() {
            if body.shapes().is_empty() {
                continue;
            }
            let aabb = body.aabb();
            if !bounds.contains(aabb) {
                debug!(
                    "Body {} reaches outside the grid bounds; clamping to border cells",
                    body.id()
                );
            }
            let (x0, x1, y0, y1) = self.cell_range(aabb);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    self.bins[y * nx + x].push(index);
                }
            }
        }

        self.seen.clear();
        let mut pairs = Vec::new();
        for bin in &self.bins {
            for (k, &i) in bin.iter().enumerate() {
                for &j in &bin[k + 1..] {
                    let key = ordered(i, j);
                    if self.seen.contains(&key) {
                        continue;
                    }
                    let (a, b) = (&bodies[i], &bodies[j]);
                    if can_collide(a, b) && a.aabb().overlaps(b.aabb()) && self.seen.insert(key) {
                        pairs.push(key);
                    }
                }
            }
        }
        pairs
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::broadphase::tests::{circle_at, scene, sorted};

    #[test]
    fn test_validate() {
        assert!(GridConfig::default().validate().is_ok());
        assert!(GridConfig::new(0.0, 1.0, 0.0, 1.0, 0, 4).validate().is_err());
        assert!(GridConfig::new(1.0, 0.0, 0.0, 1.0, 4, 4).validate().is_err());
        assert!(GridConfig::new(0.0, f64::INFINITY, 0.0, 1.0, 4, 4)
            .validate()
            .is_err());
    }

    #[test]
    fn test_matches_expected_set() {
        let mut grid = GridBroadphase::new(GridConfig::new(-10.0, 10.0, -10.0, 10.0, 8, 8)).unwrap();
        let pairs = sorted(grid.collision_pairs(&scene()));
        assert_eq!(pairs, vec![(0, 1), (0, 3), (1, 3), (2, 4)]);
    }

    #[test]
    fn test_pairs_spanning_cells_reported_once() {
        // Both circles straddle the same four cells around the origin
        let bodies = vec![circle_at(0.0, 0.0, 0.5), circle_at(0.2, 0.1, 0.5)];
        let mut grid = GridBroadphase::new(GridConfig::new(-2.0, 2.0, -2.0, 2.0, 4, 4)).unwrap();
        assert_eq!(grid.collision_pairs(&bodies), vec![(0, 1)]);
        assert_eq!(grid.occupancy().iter().sum::<usize>(), 8);
    }

    #[test]
    fn test_outside_bounds_clamps() {
        let bodies = vec![circle_at(50.0, 50.0, 0.5), circle_at(50.5, 50.0, 0.5)];
        let mut grid = GridBroadphase::new(GridConfig::new(-1.0, 1.0, -1.0, 1.0, 2, 2)).unwrap();
        assert_eq!(grid.collision_pairs(&bodies), vec![(0, 1)]);
        // Both land in the top-right cell
        assert_eq!(grid.occupancy(), vec![0, 0, 0, 2]);
    }

    #[test]
    fn test_same_cell_far_apart() {
        let bodies = vec![circle_at(-4.0, -4.0, 0.5), circle_at(4.0, 4.0, 0.5)];
        let mut grid = GridBroadphase::new(GridConfig::new(-5.0, 5.0, -5.0, 5.0, 1, 1)).unwrap();
        assert!(grid.collision_pairs(&bodies).is_empty());
    }
}
