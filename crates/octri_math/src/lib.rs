//! Math types shared by the octri crates.
//!
//! Re-exports `glam` and adds the small set of geometric primitives the
//! octree and ray queries are built on.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
