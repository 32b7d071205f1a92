//! Island partitioning of the body-equation graph.
//!
//! An island is a maximal set of dynamic bodies connected by enabled
//! equations. Islands share no equations, so each can be solved, put to
//! sleep, or skipped independently. This module provides island detection
//! using a union-find algorithm over a preallocated array indexed by body
//! slot, enabling:
//!
//! - **Sleeping optimization**: Islands whose bodies all sleep skip the solver
//! - **Independent solves**: Islands could be solved concurrently
//! - **Smaller systems**: Each solve only iterates its own equations
//!
//! # Algorithm
//!
//! 1. Every body slot starts in its own set
//! 2. For each enabled equation between two dynamic bodies, union the sets
//! 3. Every dynamic body lands in the island of its set's root
//! 4. Every enabled equation lands in the island of one of its dynamic bodies
//!
//! Static and kinematic bodies are anchors: an equation to one of them joins
//! the island of the dynamic body it touches, but never merges two islands.
//! Two boxes resting on the same ground are two islands.
//!
//! # Example
//!
//! ```
//! use sim2d_constraint::{Equation, IslandSplitter};
//! use sim2d_types::Body;
//!
//! let bodies = vec![Body::new_static(), Body::new(1.0), Body::new(1.0), Body::new(1.0)];
//! let equations = vec![
//!     Equation::contact(0, 1), // ground - body 1
//!     Equation::contact(0, 2), // ground - body 2
//!     Equation::contact(2, 3), // body 2 - body 3
//! ];
//!
//! let islands = IslandSplitter::new().split(&bodies, &equations);
//!
//! assert_eq!(islands.num_islands(), 2);
//! assert!(islands.same_island(2, 3));
//! assert!(!islands.same_island(1, 2));
//! ```

use sim2d_types::Body;
use tracing::debug;

use crate::equation::Equation;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A connected group of dynamic bodies and the equations acting on them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Island {
    /// Indices of the dynamic bodies, ascending.
    pub bodies: Vec<usize>,

    /// Indices of the equations belonging to this island, in input order.
    pub equations: Vec<usize>,
}

impl Island {
    /// Create a new empty island.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies in this island.
    #[must_use]
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Number of equations in this island.
    #[must_use]
    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    /// Check if this island contains a specific body.
    #[must_use]
    pub fn contains_body(&self, body: usize) -> bool {
        self.bodies.binary_search(&body).is_ok()
    }

    /// Whether at least one body is awake, i.e. the island must be solved.
    #[must_use]
    pub fn has_awake_body(&self, bodies: &[Body]) -> bool {
        self.bodies
            .iter()
            .any(|&i| bodies.get(i).is_some_and(|b| !b.is_sleeping()))
    }

    /// Whether every body is asleep.
    #[must_use]
    pub fn is_sleeping(&self, bodies: &[Body]) -> bool {
        !self.has_awake_body(bodies)
    }

    /// Whether every body is asleep or has passed its sleep time limit.
    #[must_use]
    pub fn wants_to_sleep(&self, bodies: &[Body]) -> bool {
        self.bodies.iter().all(|&i| {
            bodies
                .get(i)
                .is_some_and(|b| b.is_sleeping() || b.wants_to_sleep())
        })
    }

    /// Wake every body of the island.
    pub fn wake_up(&self, bodies: &mut [Body]) {
        for &i in &self.bodies {
            if let Some(body) = bodies.get_mut(i) {
                if body.is_sleeping() {
                    body.wake_up();
                }
            }
        }
    }

    /// Put every body of the island to sleep.
    pub fn sleep(&self, bodies: &mut [Body]) {
        for &i in &self.bodies {
            if let Some(body) = bodies.get_mut(i) {
                body.sleep();
            }
        }
    }
}

/// Result of island detection for one step.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Islands {
    /// The detected islands.
    islands: Vec<Island>,

    /// Island index for each body slot; `None` for non-dynamic bodies.
    body_to_island: Vec<Option<usize>>,

    /// Total number of equations across all islands.
    total_equations: usize,
}

impl Islands {
    /// No islands.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the number of islands.
    #[must_use]
    pub fn num_islands(&self) -> usize {
        self.islands.len()
    }

    /// Get the total number of bodies across all islands.
    #[must_use]
    pub fn total_bodies(&self) -> usize {
        self.islands.iter().map(Island::num_bodies).sum()
    }

    /// Get the total number of equations across all islands.
    #[must_use]
    pub fn total_equations(&self) -> usize {
        self.total_equations
    }

    /// Get all islands.
    #[must_use]
    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    /// Get a specific island by index.
    #[must_use]
    pub fn get_island(&self, index: usize) -> Option<&Island> {
        self.islands.get(index)
    }

    /// Get the island index for a body slot.
    #[must_use]
    pub fn island_for_body(&self, body: usize) -> Option<usize> {
        self.body_to_island.get(body).copied().flatten()
    }

    /// Check if two bodies are in the same island.
    #[must_use]
    pub fn same_island(&self, body_a: usize, body_b: usize) -> bool {
        match (self.island_for_body(body_a), self.island_for_body(body_b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Iterate over islands with at least one awake body.
    pub fn active_islands<'a>(
        &'a self,
        bodies: &'a [Body],
    ) -> impl Iterator<Item = (usize, &'a Island)> + 'a {
        self.islands
            .iter()
            .enumerate()
            .filter(move |(_, island)| island.has_awake_body(bodies))
    }

    /// Get statistics about the island structure.
    #[must_use]
    pub fn statistics(&self) -> IslandStatistics {
        let num_islands = self.islands.len();
        let total_bodies = self.total_bodies();
        let largest_island = self
            .islands
            .iter()
            .map(Island::num_bodies)
            .max()
            .unwrap_or(0);
        let singletons = self
            .islands
            .iter()
            .filter(|i| i.num_bodies() == 1)
            .count();

        #[allow(clippy::cast_precision_loss)]
        let avg_bodies_per_island = if num_islands > 0 {
            total_bodies as f64 / num_islands as f64
        } else {
            0.0
        };

        IslandStatistics {
            num_islands,
            total_bodies,
            total_equations: self.total_equations,
            largest_island,
            singleton_islands: singletons,
            avg_bodies_per_island,
        }
    }

    /// Consume into the island list.
    #[must_use]
    pub fn into_islands(self) -> Vec<Island> {
        self.islands
    }
}

/// Statistics about island structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandStatistics {
    /// Number of islands.
    pub num_islands: usize,
    /// Total bodies across all islands.
    pub total_bodies: usize,
    /// Total equations across all islands.
    pub total_equations: usize,
    /// Size of the largest island (in bodies).
    pub largest_island: usize,
    /// Islands holding a single body.
    pub singleton_islands: usize,
    /// Average bodies per island.
    pub avg_bodies_per_island: f64,
}

/// Reusable island builder.
///
/// Keeps its union-find arrays between steps so splitting allocates only the
/// islands themselves.
#[derive(Debug, Clone, Default)]
pub struct IslandSplitter {
    union_find: UnionFind,
    root_to_island: Vec<usize>,
}

const NO_ISLAND: usize = usize::MAX;

impl IslandSplitter {
    /// Create a splitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `bodies` into islands connected by the enabled `equations`.
    ///
    /// Every dynamic body appears in exactly one island, including bodies with
    /// no equations (singletons). Equations between two non-dynamic bodies,
    /// disabled equations, and equations referencing bodies out of range are
    /// left out.
    pub fn split(&mut self, bodies: &[Body], equations: &[Equation]) -> Islands {
        let n = bodies.len();
        self.union_find.reset(n);

        let dynamic = |i: usize| bodies.get(i).is_some_and(Body::is_dynamic);

        for eq in equations.iter().filter(|eq| eq.enabled) {
            if dynamic(eq.body_a) && dynamic(eq.body_b) {
                self.union_find.union(eq.body_a, eq.body_b);
            }
        }

        self.root_to_island.clear();
        self.root_to_island.resize(n, NO_ISLAND);
        let mut islands: Vec<Island> = Vec::new();
        let mut body_to_island = vec![None; n];

        for (i, body) in bodies.iter().enumerate() {
            if !body.is_dynamic() {
                continue;
            }
            let root = self.union_find.find(i);
            let mut index = self.root_to_island[root];
            if index == NO_ISLAND {
                index = islands.len();
                self.root_to_island[root] = index;
                islands.push(Island::new());
            }
            islands[index].bodies.push(i);
            body_to_island[i] = Some(index);
        }

        let mut total_equations = 0;
        for (j, eq) in equations.iter().enumerate() {
            if !eq.enabled || eq.body_a >= n || eq.body_b >= n {
                continue;
            }
            let anchor = if dynamic(eq.body_a) {
                eq.body_a
            } else if dynamic(eq.body_b) {
                eq.body_b
            } else {
                continue;
            };
            if let Some(index) = body_to_island[anchor] {
                islands[index].equations.push(j);
                total_equations += 1;
            }
        }

        debug!(
            "Split {} bodies and {} equations into {} islands",
            n,
            total_equations,
            islands.len()
        );

        Islands {
            islands,
            body_to_island,
            total_equations,
        }
    }
}

/// Union-Find (Disjoint Set Union) data structure.
#[derive(Debug, Clone, Default)]
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// Reset to `n` singleton sets, reusing the allocation.
    fn reset(&mut self, n: usize) {
        self.parent.clear();
        self.parent.extend(0..n);
        self.rank.clear();
        self.rank.resize(n, 0);
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        // Union by rank
        match self.rank[root_x].cmp(&self.rank[root_y]) {
            std::cmp::Ordering::Less => self.parent[root_x] = root_y,
            std::cmp::Ordering::Greater => self.parent[root_y] = root_x,
            std::cmp::Ordering::Equal => {
                self.parent[root_y] = root_x;
                self.rank[root_x] = self.rank[root_x].saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;

    fn dynamic_bodies(n: usize) -> Vec<Body> {
        (0..n).map(|_| Body::new(1.0)).collect()
    }

    #[test]
    fn test_single_island_chain() {
        let bodies = dynamic_bodies(4);
        let equations = vec![
            Equation::contact(0, 1),
            Equation::contact(1, 2),
            Equation::contact(2, 3),
        ];

        let islands = IslandSplitter::new().split(&bodies, &equations);

        assert_eq!(islands.num_islands(), 1);
        assert_eq!(islands.total_bodies(), 4);
        assert_eq!(islands.total_equations(), 3);
        assert_eq!(islands.islands()[0].bodies, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_two_separate_islands() {
        let bodies = dynamic_bodies(5);
        let equations = vec![
            Equation::contact(0, 1),
            Equation::contact(1, 2),
            Equation::contact(3, 4),
        ];

        let islands = IslandSplitter::new().split(&bodies, &equations);

        assert_eq!(islands.num_islands(), 2);
        assert!(islands.same_island(0, 2));
        assert!(islands.same_island(3, 4));
        assert!(!islands.same_island(2, 3));
    }

    #[test]
    fn test_singletons_for_unconstrained_bodies() {
        let bodies = dynamic_bodies(3);
        let islands = IslandSplitter::new().split(&bodies, &[]);

        assert_eq!(islands.num_islands(), 3);
        assert_eq!(islands.statistics().singleton_islands, 3);
    }

    #[test]
    fn test_static_body_does_not_merge() {
        let mut bodies = dynamic_bodies(3);
        bodies[0] = Body::new_static();
        let equations = vec![Equation::contact(0, 1), Equation::contact(2, 0)];

        let islands = IslandSplitter::new().split(&bodies, &equations);

        assert_eq!(islands.num_islands(), 2);
        assert!(!islands.same_island(1, 2));
        assert_eq!(islands.island_for_body(0), None);
        // The ground contact joins the island of the dynamic body it touches
        let island_2 = islands.get_island(islands.island_for_body(2).unwrap()).unwrap();
        assert_eq!(island_2.equations, vec![1]);
    }

    #[test]
    fn test_kinematic_body_is_anchor() {
        let mut bodies = dynamic_bodies(3);
        bodies[1] = Body::new_kinematic();
        let equations = vec![Equation::contact(0, 1), Equation::contact(1, 2)];

        let islands = IslandSplitter::new().split(&bodies, &equations);
        assert_eq!(islands.num_islands(), 2);
    }

    #[test]
    fn test_disabled_equation_ignored() {
        let bodies = dynamic_bodies(2);
        let mut eq = Equation::contact(0, 1);
        eq.enabled = false;

        let islands = IslandSplitter::new().split(&bodies, &[eq]);
        assert_eq!(islands.num_islands(), 2);
        assert_eq!(islands.total_equations(), 0);
    }

    #[test]
    fn test_static_only_equation_dropped() {
        let bodies = vec![Body::new_static(), Body::new_static()];
        let islands = IslandSplitter::new().split(&bodies, &[Equation::contact(0, 1)]);
        assert_eq!(islands.num_islands(), 0);
        assert_eq!(islands.total_equations(), 0);
    }

    #[test]
    fn test_cycle_structure() {
        let bodies = dynamic_bodies(3);
        let equations = vec![
            Equation::contact(0, 1),
            Equation::contact(1, 2),
            Equation::contact(2, 0),
        ];

        let islands = IslandSplitter::new().split(&bodies, &equations);
        assert_eq!(islands.num_islands(), 1);
        assert_eq!(islands.islands()[0].num_equations(), 3);
    }

    #[test]
    fn test_sleeping_island_inactive() {
        let mut bodies = dynamic_bodies(3);
        bodies[0].sleep();
        bodies[1].sleep();
        let equations = vec![Equation::contact(0, 1)];

        let islands = IslandSplitter::new().split(&bodies, &equations);
        let active: Vec<usize> = islands.active_islands(&bodies).map(|(i, _)| i).collect();

        assert_eq!(islands.num_islands(), 2);
        assert_eq!(active.len(), 1);
        assert!(islands.islands()[active[0]].contains_body(2));
    }

    #[test]
    fn test_large_island_count_and_reuse() {
        let bodies = dynamic_bodies(100);
        let equations: Vec<Equation> = (0..50).map(|i| Equation::contact(2 * i, 2 * i + 1)).collect();

        let mut splitter = IslandSplitter::new();
        let islands = splitter.split(&bodies, &equations);
        assert_eq!(islands.num_islands(), 50);

        let stats = islands.statistics();
        assert_eq!(stats.largest_island, 2);
        assert!((stats.avg_bodies_per_island - 2.0).abs() < 1e-12);

        // Reuse with a chain: one island
        let chain: Vec<Equation> = (0..99).map(|i| Equation::contact(i, i + 1)).collect();
        assert_eq!(splitter.split(&bodies, &chain).num_islands(), 1);
    }

    #[test]
    fn test_union_find_path_compression() {
        let mut uf = UnionFind::default();
        uf.reset(5);
        uf.union(0, 1);
        uf.union(1, 2);
        uf.union(2, 3);

        let root = uf.find(3);
        assert_eq!(uf.find(0), root);
        assert_eq!(uf.parent[3], root);
        assert_ne!(uf.find(4), root);
    }
}
