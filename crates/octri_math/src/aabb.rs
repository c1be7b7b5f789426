use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box used by the octree for node bounds and ray culling.
///
/// An AABB is defined by three intervals (one per axis). Unlike a padded
/// render-time box, this one is kept exact: node bounds are compared for
/// equality by the structural validator, so no minimum thickness is added.
/// Flat boxes are still hit by rays because the slab test is inclusive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a new AABB from three intervals.
    pub const fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Create an AABB from its min and max corners.
    pub fn from_extents(min: Vec3, max: Vec3) -> Self {
        Self::new(
            Interval::new(min.x, max.x),
            Interval::new(min.y, max.y),
            Interval::new(min.z, max.z),
        )
    }

    /// Create the tight AABB around a set of points. Empty input gives `EMPTY`.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Aabb::EMPTY, |acc, p| acc.including(p))
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Returns this box grown to contain `p`.
    pub fn including(&self, p: Vec3) -> Self {
        Self::surrounding(self, &Aabb::from_extents(p, p))
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// True if the box contains nothing on at least one axis.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Half the size of the box along each axis.
    pub fn half_extent(&self) -> Vec3 {
        (self.max() - self.min()) * 0.5
    }

    /// Returns the box grown by `delta / 2` on every side.
    pub fn expand(&self, delta: f32) -> Aabb {
        Self::new(self.x.expand(delta), self.y.expand(delta), self.z.expand(delta))
    }

    /// Returns true if `p` lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
    }

    /// Returns true if `other` lies entirely inside this box. The empty box
    /// is enclosed by everything.
    pub fn encloses(&self, other: &Aabb) -> bool {
        other.is_empty()
            || (self.x.encloses(&other.x) && self.y.encloses(&other.y) && self.z.encloses(&other.z))
    }

    /// Clip `ray_t` to the span in which the ray is inside this box.
    ///
    /// Uses the slab method. Returns `None` when the ray misses the box within
    /// `ray_t`; touching a face counts as a hit so that zero-thickness boxes
    /// around flat geometry are not culled.
    pub fn hit_span(&self, r: &Ray, mut ray_t: Interval) -> Option<Interval> {
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let adinv = 1.0 / r.direction[axis];
            let mut t0 = (slab.min - r.origin[axis]) * adinv;
            let mut t1 = (slab.max - r.origin[axis]) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // f32::max/min drop NaN, which shows up for a zero direction
            // component with the origin on the slab plane.
            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.max < ray_t.min {
                return None;
            }
        }
        Some(ray_t)
    }

    /// Static constants
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}
