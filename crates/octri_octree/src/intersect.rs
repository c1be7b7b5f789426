//! Nearest-hit ray queries against an [`Octree`].
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection and a
//! best-first descent that skips every node the ray cannot enter before the
//! closest hit found so far.

use octri_math::{Interval, Ray, Vec2, Vec3, Vec4};

use crate::{NodeKey, Octree, TriangleId, TriangleSet};

/// Determinant below which a triangle counts as parallel to the ray.
const PARALLEL_EPSILON: f32 = 1e-8;

/// Squared sine of the smallest edge angle a triangle may have before it
/// counts as zero-area.
const DEGENERATE_SIN2: f32 = f32::EPSILON;

/// Relative padding applied to node boxes before the slab test, so that a
/// triangle hit on a box face is never culled by rounding.
const BOX_PADDING: f32 = 1e-5;

/// Everything known about the closest hit of a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Parametric distance along the ray direction
    pub t: f32,
    pub triangle: TriangleId,
    /// Barycentric weights of the second and third vertex
    pub barycentric: Vec2,
    /// `origin + direction * t`
    pub point: Vec3,
    /// Interpolated texture coordinate (zero for meshes without UVs)
    pub tex_coord: Vec2,
    /// Unit face normal, following the triangle's winding
    pub normal: Vec3,
    /// Unit tangent along +U in `xyz`, bitangent handedness in `w`
    pub tangent: Vec4,
}

/// Optional output locations filled in on a hit. Slots left as `None` are
/// not computed; on a miss none of them is written.
#[derive(Debug, Default)]
pub struct HitSlots<'a> {
    pub intersection: Option<&'a mut Vec3>,
    pub tex_coord: Option<&'a mut Vec2>,
    pub normal: Option<&'a mut Vec3>,
    pub tangent: Option<&'a mut Vec4>,
}

/// Möller-Trumbore ray-triangle intersection.
///
/// Returns `(t, u, v)` where `u` and `v` weight the second and third vertex.
/// `t` is not range checked. Zero-area triangles never intersect, whether
/// two vertices coincide or all three are collinear.
#[inline]
pub fn intersect_triangle(ray: &Ray, [v0, v1, v2]: [Vec3; 3]) -> Option<(f32, f32, f32)> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    // |e1 x e2|^2 = |e1|^2 |e2|^2 sin^2, so the check is independent of scale
    let area2 = edge1.cross(edge2).length_squared();
    if !(area2 > DEGENERATE_SIN2 * edge1.length_squared() * edge2.length_squared()) {
        return None;
    }

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle, or the triangle has no area
    if !(a.abs() >= PARALLEL_EPSILON) {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    Some((f * edge2.dot(q), u, v))
}

/// Tangent of a triangle from its edges and UV deltas.
///
/// Falls back to the first edge when the UV mapping is degenerate.
fn triangle_tangent(edge1: Vec3, edge2: Vec3, duv1: Vec2, duv2: Vec2, normal: Vec3) -> Vec4 {
    let r = duv1.x * duv2.y - duv2.x * duv1.y;
    if r.abs() < PARALLEL_EPSILON {
        return edge1.normalize_or_zero().extend(1.0);
    }

    let sdir = (edge1 * duv2.y - edge2 * duv1.y) / r;
    let tdir = (edge2 * duv1.x - edge1 * duv2.x) / r;

    // Gram-Schmidt against the normal
    let tangent = (sdir - normal * normal.dot(sdir)).normalize_or_zero();
    let handedness = if normal.cross(sdir).dot(tdir) < 0.0 { -1.0 } else { 1.0 };
    tangent.extend(handedness)
}

/// One nearest-hit query over an octree.
///
/// The ray runs from `origin` along `direction`; hits are accepted for
/// `0 <= t` up to and including the parameter of `end`. `direction` must be
/// non-zero.
///
/// ```
/// # use std::sync::Arc;
/// # use octri_core::Mesh;
/// # use octri_math::Vec3;
/// # use octri_octree::{Octree, OctreeConfig, TriangleRayIntersect, TriangleSet};
/// let mesh = Mesh::new(
///     vec![Vec3::new(-1.0, -1.0, 2.0), Vec3::new(1.0, -1.0, 2.0), Vec3::new(0.0, 1.0, 2.0)],
///     vec![0, 1, 2],
/// );
/// let set = Arc::new(TriangleSet::from_mesh(Arc::new(mesh)).unwrap());
/// let tree = Octree::new(set, OctreeConfig::default());
///
/// let hit = TriangleRayIntersect::new(Vec3::ZERO, Vec3::Z, Vec3::Z * 10.0, &tree)
///     .intersect()
///     .unwrap();
/// assert_eq!(hit.point, Vec3::new(0.0, 0.0, 2.0));
/// ```
pub struct TriangleRayIntersect<'a> {
    tree: &'a Octree,
    ray: Ray,
    closest_t: f32,
    /// Hit triangle with its barycentric `u`, `v`
    hit: Option<(TriangleId, f32, f32)>,
    visited: usize,
}

impl<'a> TriangleRayIntersect<'a> {
    pub fn new(origin: Vec3, direction: Vec3, end: Vec3, tree: &'a Octree) -> Self {
        let ray = Ray::new(origin, direction);
        Self {
            tree,
            ray,
            closest_t: ray.param_of(end),
            hit: None,
            visited: 0,
        }
    }

    /// Only accept hits no farther than `t`, e.g. the best hit of an earlier
    /// query against another mesh.
    pub fn limit_to(mut self, t: f32) -> Self {
        self.closest_t = self.closest_t.min(t);
        self
    }

    pub fn ray(&self) -> &Ray {
        &self.ray
    }

    /// Closest hit distance so far, or the query's upper limit before a hit.
    pub fn closest_t(&self) -> f32 {
        self.closest_t
    }

    /// Nodes whose contents were examined.
    pub fn nodes_visited(&self) -> usize {
        self.visited
    }

    /// Run the descent from the root. Returns true if anything was hit.
    pub fn traverse(&mut self) -> bool {
        let root = self.tree.root();
        if self.entry_distance(root).is_some() {
            self.visit(root);
        }
        self.hit.is_some()
    }

    /// Run the query and return the closest hit.
    pub fn intersect(mut self) -> Option<RayHit> {
        self.traverse();
        self.hit()
    }

    /// Run the query and write the requested outputs. Returns false, and
    /// leaves every slot untouched, on a miss.
    pub fn intersect_into(mut self, slots: HitSlots<'_>) -> bool {
        self.traverse();
        let Some(hit) = self.hit() else {
            return false;
        };

        if let Some(intersection) = slots.intersection {
            *intersection = hit.point;
        }
        if let Some(tex_coord) = slots.tex_coord {
            *tex_coord = hit.tex_coord;
        }
        if let Some(normal) = slots.normal {
            *normal = hit.normal;
        }
        if let Some(tangent) = slots.tangent {
            *tangent = hit.tangent;
        }
        true
    }

    /// Details of the closest hit found by [`Self::traverse`].
    pub fn hit(&self) -> Option<RayHit> {
        let (triangle, u, v) = self.hit?;
        let set = self.tree.triangles();
        let mesh = set.mesh();
        let [i0, i1, i2] = set[triangle].indices();
        let [p0, p1, p2] = set.vertices(triangle);
        let [uv0, uv1, uv2] = [mesh.uv(i0), mesh.uv(i1), mesh.uv(i2)];

        let edge1 = p1 - p0;
        let edge2 = p2 - p0;
        let normal = edge1.cross(edge2).normalize_or_zero();

        Some(RayHit {
            t: self.closest_t,
            triangle,
            barycentric: Vec2::new(u, v),
            point: self.ray.at(self.closest_t),
            tex_coord: uv0 * (1.0 - u - v) + uv1 * u + uv2 * v,
            normal,
            tangent: triangle_tangent(edge1, edge2, uv1 - uv0, uv2 - uv0, normal),
        })
    }

    /// Where the ray enters `key`'s bounds within `[0, closest_t]`.
    fn entry_distance(&self, key: NodeKey) -> Option<f32> {
        let bounds = self.tree[key].bounds();
        if bounds.is_empty() {
            return None;
        }

        let scale = 1.0 + bounds.half_extent().max_element() + bounds.center().abs().max_element();
        bounds
            .aabb()
            .expand(BOX_PADDING * scale)
            .hit_span(&self.ray, Interval::new(0.0, self.closest_t))
            .map(|span| span.min)
    }

    fn visit(&mut self, key: NodeKey) {
        self.visited += 1;
        let tree = self.tree;
        let node = &tree[key];

        for &id in node.elements() {
            self.test_triangle(id);
        }

        // Nearest child first; children the ray misses are dropped here.
        let mut queue = [(0.0_f32, NodeKey::default()); 8];
        let mut count = 0;
        for child in node.children() {
            if let Some(t) = self.entry_distance(child) {
                queue[count] = (t, child);
                count += 1;
            }
        }
        let queue = &mut queue[..count];
        queue.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        for &(entry, child) in queue.iter() {
            // A closer hit may have turned up in an earlier sibling
            if entry <= self.closest_t {
                self.visit(child);
            }
        }
    }

    fn test_triangle(&mut self, id: TriangleId) {
        let vertices = self.tree.triangles().vertices(id);
        if let Some((t, u, v)) = intersect_triangle(&self.ray, vertices) {
            if accepts(t, self.closest_t, self.hit.is_some()) {
                self.closest_t = t;
                self.hit = Some((id, u, v));
            }
        }
    }
}

/// The end point itself is in range; once something was hit only strictly
/// closer hits replace it.
#[inline]
fn accepts(t: f32, closest_t: f32, have_hit: bool) -> bool {
    t >= 0.0 && (t < closest_t || (!have_hit && t == closest_t))
}

/// Closest hit by testing every triangle of `set`; the reference the octree
/// query must agree with.
pub fn intersect_exhaustive(
    set: &TriangleSet,
    origin: Vec3,
    direction: Vec3,
    end: Vec3,
) -> Option<(TriangleId, f32)> {
    let ray = Ray::new(origin, direction);
    let mut closest_t = ray.param_of(end);
    let mut hit = None;

    for id in set.ids() {
        if let Some((t, _, _)) = intersect_triangle(&ray, set.vertices(id)) {
            if accepts(t, closest_t, hit.is_some()) {
                closest_t = t;
                hit = Some((id, t));
            }
        }
    }
    hit
}
