//! Per-node bounding metadata.

use octri_math::{Aabb, Vec3};

/// Tight box around everything stored under an octree node.
///
/// The same box is kept in two forms: `bounds` as `[center, half_extent]` and
/// `extents` as `[min, max]`. Both are updated together so they never disagree.
/// An empty node has inverted extents and zero bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBounds {
    bounds: [Vec3; 2],
    extents: [Vec3; 2],
}

impl Default for NodeBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl NodeBounds {
    pub const EMPTY: NodeBounds = NodeBounds {
        bounds: [Vec3::ZERO, Vec3::ZERO],
        extents: [Vec3::INFINITY, Vec3::NEG_INFINITY],
    };

    pub fn from_aabb(aabb: &Aabb) -> Self {
        let mut bounds = Self::EMPTY;
        bounds.include(aabb);
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.aabb().is_empty()
    }

    /// `[center, half_extent]`
    #[inline]
    pub fn bounds(&self) -> [Vec3; 2] {
        self.bounds
    }

    /// `[min, max]`
    #[inline]
    pub fn extents(&self) -> [Vec3; 2] {
        self.extents
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        self.bounds[0]
    }

    #[inline]
    pub fn half_extent(&self) -> Vec3 {
        self.bounds[1]
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_extents(self.extents[0], self.extents[1])
    }

    /// Grow to the union of the current box and `other`.
    pub fn include(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        let merged = Aabb::surrounding(&self.aabb(), other);
        self.extents = [merged.min(), merged.max()];
        self.bounds = [merged.centroid(), merged.half_extent()];
    }

    pub fn encloses(&self, other: &NodeBounds) -> bool {
        self.aabb().encloses(&other.aabb())
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.aabb().contains_point(p)
    }

    /// Compare both representations within `tolerance` per component.
    pub fn abs_diff_eq(&self, other: &NodeBounds, tolerance: f32) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() == other.is_empty();
        }
        self.bounds
            .iter()
            .chain(self.extents.iter())
            .zip(other.bounds.iter().chain(other.extents.iter()))
            .all(|(a, b)| a.abs_diff_eq(*b, tolerance))
    }
}
