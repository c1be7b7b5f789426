//! Parallel ray batches.
//!
//! The tree is read-only during queries, so independent segments can be
//! traced on the rayon pool without any locking.

use octri_math::Vec3;
use rayon::prelude::*;

use crate::{Octree, RayHit, TriangleRayIntersect};

/// A ray from `origin` along `direction`, limited to the parameter of `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    pub origin: Vec3,
    pub direction: Vec3,
    pub end: Vec3,
}

impl RaySegment {
    pub fn new(origin: Vec3, direction: Vec3, end: Vec3) -> Self {
        Self { origin, direction, end }
    }

    /// Segment from `origin` to `end` with the direction between them.
    pub fn between(origin: Vec3, end: Vec3) -> Self {
        Self::new(origin, end - origin, end)
    }
}

/// Nearest hit for every segment, in input order.
pub fn intersect_rays(tree: &Octree, segments: &[RaySegment]) -> Vec<Option<RayHit>> {
    if segments.is_empty() {
        return Vec::new();
    }

    log::debug!(
        "Tracing {} rays against {} triangles",
        segments.len(),
        tree.len()
    );

    segments
        .par_iter()
        .map(|s| TriangleRayIntersect::new(s.origin, s.direction, s.end, tree).intersect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{random_triangle_set, random_vec3};
    use crate::OctreeConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[test]
    fn test_matches_sequential_queries() {
        let tree = Octree::new(Arc::new(random_triangle_set(31, 200)), OctreeConfig::default());
        let mut rng = StdRng::seed_from_u64(32);
        let segments: Vec<_> = (0..256)
            .map(|_| RaySegment::between(random_vec3(&mut rng, 15.0), random_vec3(&mut rng, 15.0)))
            .collect();

        let batch = intersect_rays(&tree, &segments);
        assert_eq!(batch.len(), segments.len());

        for (segment, hit) in segments.iter().zip(&batch) {
            let single =
                TriangleRayIntersect::new(segment.origin, segment.direction, segment.end, &tree)
                    .intersect();
            assert_eq!(hit.map(|h| (h.triangle, h.t)), single.map(|h| (h.triangle, h.t)));
        }
    }

    #[test]
    fn test_empty_batch() {
        let tree = Octree::new(Arc::new(random_triangle_set(33, 10)), OctreeConfig::default());
        assert!(intersect_rays(&tree, &[]).is_empty());
    }

    #[test]
    fn test_between_reaches_end_at_one() {
        let segment = RaySegment::between(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(segment.direction, Vec3::new(0.0, 0.0, 4.0));
    }
}
