use sim2d_types::Body;

use super::{bounding_volumes_overlap, can_collide, BoundingVolume, Broadphase};

/// Simple O(n²) broadphase testing every pair.
///
/// Suitable for scenes with a few dozen bodies, and the reference the other
/// algorithms are checked against.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveBroadphase {
    bounding_volume: BoundingVolume,
}

impl NaiveBroadphase {
    /// Create a naive broadphase confirming pairs with AABBs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirm pairs with a different bounding volume.
    #[must_use]
    pub fn with_bounding_volume(mut self, volume: BoundingVolume) -> Self {
        self.bounding_volume = volume;
        self
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &[Body]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in bodies.iter().enumerate() {
            for (j, b) in bodies.iter().enumerate().skip(i + 1) {
                if can_collide(a, b) && bounding_volumes_overlap(self.bounding_volume, a, b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn name(&self) -> &'static str {
        "naive"
    }
}
