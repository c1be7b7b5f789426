//! octri core - mesh data consumed by the triangle octree.
//!
//! This crate provides:
//!
//! - **`Mesh`**: vertex positions, optional texture coordinates and triangle
//!   indices, with validation through [`MeshError`].
//!
//! # Example
//!
//! ```
//! use octri_core::Mesh;
//! use octri_math::Vec3;
//!
//! let mesh = Mesh::new(
//!     vec![Vec3::ZERO, Vec3::X, Vec3::Y],
//!     vec![0, 1, 2],
//! );
//! assert_eq!(mesh.triangle_count(), 1);
//! assert!(mesh.validate().is_ok());
//! ```

pub mod mesh;

// Re-export commonly used types
pub use mesh::{Mesh, MeshError};
