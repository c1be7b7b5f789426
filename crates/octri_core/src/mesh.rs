//! Mesh geometry consumed by the triangle octree.
//!
//! The octree never copies vertex data. Triangle records keep indices into a
//! shared `Mesh`, and the ray query reads positions and UVs back through it.

use octri_math::{Aabb, Vec2, Vec3};
use thiserror::Error;

/// Problems found in mesh data before triangles are built from it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("Index buffer length {0} is not a multiple of 3")]
    IncompleteTriangle(usize),

    #[error("Triangle {triangle} references vertex {index}, vertex count: {vertex_count}")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("UV count ({uvs}) doesn't match vertex count ({vertices})")]
    UvCountMismatch { uvs: usize, vertices: usize },
}

/// A triangle mesh: vertex positions, optional UVs and an index buffer.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// UV coordinates (optional - one per vertex)
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box of all positions
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::enclosing(positions.iter().copied());
        Self {
            positions,
            uvs: None,
            indices,
            bounds,
        }
    }

    /// Create a new mesh with UV coordinates.
    pub fn new_with_uvs(positions: Vec<Vec3>, indices: Vec<u32>, uvs: Vec<Vec2>) -> Self {
        let mut mesh = Self::new(positions, indices);
        mesh.uvs = Some(uvs);
        mesh
    }

    /// Check that every index is in range and UVs, if present, match the
    /// vertex count.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::IncompleteTriangle(self.indices.len()));
        }

        if let Some(uvs) = &self.uvs {
            if uvs.len() != self.positions.len() {
                return Err(MeshError::UvCountMismatch {
                    uvs: uvs.len(),
                    vertices: self.positions.len(),
                });
            }
        }

        let vertex_count = self.positions.len();
        for (triangle, face) in self.indices.chunks_exact(3).enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count,
                });
            }
        }

        Ok(())
    }

    /// Check if the mesh has UV coordinates.
    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Vertex indices of triangle `i`, if it exists.
    pub fn triangle(&self, i: usize) -> Option<[u32; 3]> {
        self.indices
            .get(i * 3..i * 3 + 3)
            .map(|face| [face[0], face[1], face[2]])
    }

    #[inline]
    pub fn position(&self, index: u32) -> Vec3 {
        self.positions[index as usize]
    }

    /// UV of vertex `index`, or zero for meshes without texture coordinates.
    #[inline]
    pub fn uv(&self, index: u32) -> Vec2 {
        match &self.uvs {
            Some(uvs) => uvs[index as usize],
            None => Vec2::ZERO,
        }
    }
}
