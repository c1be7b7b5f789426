//! Triangle records and the shared triangle arena.
//!
//! A mesh is decomposed into [`TriangleRecord`]s once. Records refer to their
//! vertices by index into the mesh, carry a bounding sphere used for octree
//! placement, and are shared by reference (`Arc<TriangleSet>`) between the
//! mesh owner and the octree, which only stores [`TriangleId`]s.

use std::ops::Index;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use octri_core::{Mesh, MeshError};
use octri_math::{Aabb, Vec3};

/// Index of a triangle inside its [`TriangleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriangleId(pub u32);

impl TriangleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bin index of a triangle that no octree node currently holds.
pub const UNBINNED: i32 = -1;

/// One mesh triangle as seen by the octree.
///
/// Records are deliberately neither `Clone` nor `Copy`: each one is a distinct
/// identity whose bin index is owned by the octree. To get a second copy,
/// duplicate the mesh and build a new [`TriangleSet`].
///
/// ```compile_fail
/// fn duplicate(t: &octri_octree::TriangleRecord) -> octri_octree::TriangleRecord {
///     t.clone()
/// }
/// ```
#[derive(Debug)]
pub struct TriangleRecord {
    /// Vertex indices into the mesh
    indices: [u32; 3],
    /// Center of the bounding sphere
    position_group: Vec3,
    /// Radius of the bounding sphere
    radius: f32,
    /// Slot in the owning node's element list
    bin_index: AtomicI32,
}

impl TriangleRecord {
    /// Build a record for the triangle `indices` of `mesh`.
    ///
    /// The bounding sphere is centered on the vertices' box, with the box's
    /// half diagonal as radius, so it always contains all three vertices.
    pub fn new(mesh: &Mesh, indices: [u32; 3]) -> Self {
        let bbox = Aabb::enclosing(indices.map(|i| mesh.position(i)));
        Self {
            indices,
            position_group: bbox.centroid(),
            radius: bbox.half_extent().length(),
            bin_index: AtomicI32::new(UNBINNED),
        }
    }

    #[inline]
    pub fn indices(&self) -> [u32; 3] {
        self.indices
    }

    #[inline]
    pub fn position_group(&self) -> Vec3 {
        self.position_group
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Vertex positions, resolved through the mesh the record was built from.
    #[inline]
    pub fn vertices(&self, mesh: &Mesh) -> [Vec3; 3] {
        self.indices.map(|i| mesh.position(i))
    }

    #[inline]
    pub fn bin_index(&self) -> i32 {
        self.bin_index.load(Ordering::Relaxed)
    }

    /// Container bookkeeping; writable through a shared reference.
    #[inline]
    pub fn set_bin_index(&self, bin: i32) {
        self.bin_index.store(bin, Ordering::Relaxed);
    }
}

/// Arena of triangle records built from one mesh.
#[derive(Debug)]
pub struct TriangleSet {
    mesh: Arc<Mesh>,
    triangles: Vec<TriangleRecord>,
}

impl TriangleSet {
    /// Decompose `mesh` into triangle records.
    pub fn from_mesh(mesh: Arc<Mesh>) -> Result<Self, MeshError> {
        mesh.validate()?;

        let triangles: Vec<_> = (0..mesh.triangle_count())
            .filter_map(|i| mesh.triangle(i))
            .map(|indices| TriangleRecord::new(&mesh, indices))
            .collect();

        log::debug!(
            "Built {} triangle records from {} vertices (uvs: {})",
            triangles.len(),
            mesh.vertex_count(),
            mesh.has_uvs()
        );

        Ok(Self { mesh, triangles })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn get(&self, id: TriangleId) -> Option<&TriangleRecord> {
        self.triangles.get(id.index())
    }

    /// All ids in the set, in index order.
    pub fn ids(&self) -> impl Iterator<Item = TriangleId> {
        (0..self.triangles.len() as u32).map(TriangleId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriangleId, &TriangleRecord)> {
        self.ids().zip(self.triangles.iter())
    }

    /// Vertex positions of triangle `id`.
    #[inline]
    pub fn vertices(&self, id: TriangleId) -> [Vec3; 3] {
        self[id].vertices(&self.mesh)
    }

    /// Tight box around the vertices of triangle `id`.
    pub fn extents(&self, id: TriangleId) -> Aabb {
        Aabb::enclosing(self.vertices(id))
    }

    /// Tight box around every triangle in the set.
    pub fn bounds(&self) -> Aabb {
        self.ids()
            .fold(Aabb::EMPTY, |acc, id| Aabb::surrounding(&acc, &self.extents(id)))
    }
}

impl Index<TriangleId> for TriangleSet {
    type Output = TriangleRecord;

    fn index(&self, id: TriangleId) -> &TriangleRecord {
        &self.triangles[id.index()]
    }
}
