use sim2d_types::{Axis, Body, Vec2};

use super::{can_collide, ordered, Broadphase};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for [`SweepAndPrune`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SweepAndPruneConfig {
    /// Axis to sweep along.
    pub axis: Axis,
    /// Pick the axis with the larger spread of body positions every call
    /// instead of the fixed `axis`.
    pub auto_axis: bool,
}

impl Default for SweepAndPruneConfig {
    fn default() -> Self {
        Self {
            axis: Axis::X,
            auto_axis: false,
        }
    }
}

impl SweepAndPruneConfig {
    /// Sweep along a fixed axis.
    #[must_use]
    pub fn along(axis: Axis) -> Self {
        Self {
            axis,
            auto_axis: false,
        }
    }

    /// Choose the axis automatically.
    #[must_use]
    pub fn auto() -> Self {
        Self {
            auto_axis: true,
            ..Self::default()
        }
    }
}

/// 1-D sweep-and-prune broadphase.
///
/// Keeps the body order of the previous call and re-sorts it with insertion
/// sort on the AABB lower bound of the sweep axis, which is close to linear
/// when bodies move a little between steps. The sweep stops scanning forward
/// from a body once the next lower bound passes its upper bound; candidates
/// are then confirmed with a full AABB test.
#[derive(Debug, Clone, Default)]
pub struct SweepAndPrune {
    config: SweepAndPruneConfig,
    order: Vec<usize>,
}

impl SweepAndPrune {
    /// Create a sweep-and-prune broadphase.
    #[must_use]
    pub fn new(config: SweepAndPruneConfig) -> Self {
        Self {
            config,
            order: Vec::new(),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &SweepAndPruneConfig {
        &self.config
    }

    /// Sorted body order from the last call.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Axis with the larger variance of body positions.
    fn choose_axis(bodies: &[Body]) -> Axis {
        if bodies.len() < 2 {
            return Axis::X;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = bodies.len() as f64;
        let mean = bodies.iter().map(|b| b.position).sum::<Vec2>() / n;
        let variance = bodies
            .iter()
            .map(|b| (b.position - mean).component_mul(&(b.position - mean)))
            .sum::<Vec2>();
        if variance.y > variance.x {
            Axis::Y
        } else {
            Axis::X
        }
    }

    fn sort(&mut self, bodies: &[Body], axis: Axis) {
        if self.order.len() != bodies.len() || self.order.iter().any(|&i| i >= bodies.len()) {
            self.order.clear();
            self.order.extend(0..bodies.len());
        }

        let key = |i: usize| bodies[i].aabb().min_on_axis(axis);
        for i in 1..self.order.len() {
            let current = self.order[i];
            let value = key(current);
            let mut j = i;
            while j > 0 && key(self.order[j - 1]) > value {
                self.order[j] = self.order[j - 1];
                j -= 1;
            }
            self.order[j] = current;
        }
    }
}

impl Broadphase for SweepAndPrune {
    fn collision_pairs(&mut self, bodies: &[Body]) -> Vec<(usize, usize)> {
        let axis = if self.config.auto_axis {
            Self::choose_axis(bodies)
        } else {
            self.config.axis
        };
        self.sort(bodies, axis);

        let mut pairs = Vec::new();
        for (k, &i) in self.order.iter().enumerate() {
            let a = &bodies[i];
            let upper = a.aabb().max_on_axis(axis);

            for &j in &self.order[k + 1..] {
                let b = &bodies[j];
                if b.aabb().min_on_axis(axis) > upper {
                    break;
                }
                if can_collide(a, b) && a.aabb().overlaps(b.aabb()) {
                    pairs.push(ordered(i, j));
                }
            }
        }
        pairs
    }

    fn name(&self) -> &'static str {
        "sweep-and-prune"
    }
}
