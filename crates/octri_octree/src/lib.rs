//! octri octree - a loose triangle octree for nearest-hit ray queries.
//!
//! Triangles from a [`Mesh`](octri_core::Mesh) are placed by their bounding
//! spheres in the smallest cubic cell that holds them. Every node also keeps
//! a tight box around its contents, maintained through [`OctreeListener`]
//! callbacks; [`BoundsListener`] is installed by default.
//!
//! - [`Octree`]: the container, with insertion, removal and rebounding
//! - [`TriangleRayIntersect`]: best-first closest-hit query
//! - [`intersect_rays`]: the same query over a batch, in parallel
//! - [`check_structure`] / [`validate`]: recompute and audit node bounds
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use octri_core::Mesh;
//! use octri_math::Vec3;
//! use octri_octree::{Octree, OctreeConfig, TriangleRayIntersect, TriangleSet};
//!
//! let mesh = Mesh::new(
//!     vec![Vec3::new(-1.0, -1.0, 2.0), Vec3::new(1.0, -1.0, 2.0), Vec3::new(0.0, 1.0, 2.0)],
//!     vec![0, 1, 2],
//! );
//! let set = Arc::new(TriangleSet::from_mesh(Arc::new(mesh)).unwrap());
//! let tree = Octree::new(set, OctreeConfig::default());
//! octri_octree::validate(&tree);
//!
//! let hit = TriangleRayIntersect::new(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, 10.0), &tree)
//!     .intersect()
//!     .unwrap();
//! assert!((hit.t - 2.0).abs() < 1e-6);
//! ```

mod batch;
mod bounds;
mod config;
mod intersect;
mod listener;
mod octree;
mod triangle;
mod validate;

#[cfg(test)]
mod test_support;

pub use batch::{intersect_rays, RaySegment};
pub use bounds::NodeBounds;
pub use config::{BoundsPolicy, ConfigError, OctreeConfig};
pub use intersect::{intersect_exhaustive, intersect_triangle, HitSlots, RayHit, TriangleRayIntersect};
pub use listener::{BoundsListener, OctreeListener};
pub use octree::{NodeKey, Octree, OctreeNode};
pub use triangle::{TriangleId, TriangleRecord, TriangleSet, UNBINNED};
pub use validate::{check_structure, validate, StructureError};

/// Re-export math types from octri_math
pub use octri_math::{Aabb, Ray, Vec2, Vec3, Vec4};
