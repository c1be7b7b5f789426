//! Octree container over a triangle set.
//!
//! Nodes live in a slot map and cover cubic cells. A triangle is stored in the
//! deepest existing node whose cell holds its whole bounding sphere; leaves
//! split into octants once they exceed `max_capacity`. Every node carries a
//! [`NodeBounds`] kept up to date through the registered listeners.

use std::ops::Index;
use std::sync::Arc;

use octri_math::{Aabb, Vec3};
use slotmap::{new_key_type, SlotMap};

use crate::{
    BoundsListener, BoundsPolicy, NodeBounds, OctreeConfig, OctreeListener, TriangleId,
    TriangleSet, UNBINNED,
};

new_key_type! {
    /// Handle to a node of an [`Octree`].
    pub struct NodeKey;
}

/// Times the root may double to reach a far-away triangle before the
/// triangle is simply kept at the root.
const MAX_ROOT_GROWTH: usize = 16;

/// Sign of each axis offset for octant `octant` (bit 0 = x, 1 = y, 2 = z).
#[inline]
fn octant_offset(octant: usize) -> Vec3 {
    let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
    Vec3::new(sign(1), sign(2), sign(4))
}

/// Octant of `center`'s cell that `point` falls in.
#[inline]
fn octant_of(point: Vec3, center: Vec3) -> usize {
    (point.x >= center.x) as usize
        | ((point.y >= center.y) as usize) << 1
        | ((point.z >= center.z) as usize) << 2
}

/// A node of the octree.
#[derive(Debug)]
pub struct OctreeNode {
    center: Vec3,
    half_size: f32,
    parent: Option<NodeKey>,
    octant: usize,
    children: [Option<NodeKey>; 8],
    elements: Vec<TriangleId>,
    bounds: NodeBounds,
}

impl OctreeNode {
    fn new(center: Vec3, half_size: f32, parent: Option<NodeKey>, octant: usize) -> Self {
        Self {
            center,
            half_size,
            parent,
            octant,
            children: [None; 8],
            elements: Vec::new(),
            bounds: NodeBounds::EMPTY,
        }
    }

    /// Center of the node's cell.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Half the edge length of the node's cell.
    pub fn half_size(&self) -> f32 {
        self.half_size
    }

    /// The node's cell. Stored content may stick out of it; see [`Self::bounds`].
    pub fn cell(&self) -> Aabb {
        let half = Vec3::splat(self.half_size);
        Aabb::from_extents(self.center - half, self.center + half)
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Octant this node occupies in its parent.
    pub fn octant(&self) -> usize {
        self.octant
    }

    pub fn child(&self, octant: usize) -> Option<NodeKey> {
        self.children.get(octant).copied().flatten()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.children.iter().flatten().copied()
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    /// Triangles stored directly in this node.
    pub fn elements(&self) -> &[TriangleId] {
        &self.elements
    }

    pub fn bounds(&self) -> &NodeBounds {
        &self.bounds
    }
}

/// Octree over the triangles of one [`TriangleSet`].
///
/// The tree is mutated through `&mut self` only, so any number of ray queries
/// can share a `&Octree` once it is built.
pub struct Octree {
    triangles: Arc<TriangleSet>,
    nodes: SlotMap<NodeKey, OctreeNode>,
    root: NodeKey,
    /// Node holding each triangle, indexed by `TriangleId`
    placement: Vec<Option<NodeKey>>,
    listeners: Vec<Box<dyn OctreeListener>>,
    config: OctreeConfig,
    len: usize,
}

impl Octree {
    /// Build a tree holding every triangle of `triangles`.
    ///
    /// The root cell is the smallest cube around the set's bounds.
    pub fn new(triangles: Arc<TriangleSet>, config: OctreeConfig) -> Self {
        let bounds = triangles.bounds();
        let (center, half_size) = if bounds.is_empty() {
            (Vec3::ZERO, 1.0)
        } else {
            (bounds.centroid(), bounds.half_extent().max_element())
        };

        let mut tree = Self::empty(triangles, center, half_size, config);
        let ids: Vec<_> = tree.triangles.ids().collect();
        for id in ids {
            tree.insert(id);
        }

        log::info!(
            "Built octree: {} triangles, {} nodes, depth {}",
            tree.len(),
            tree.node_count(),
            tree.depth()
        );

        tree
    }

    /// Create a tree with a single empty root covering the given cell.
    ///
    /// Triangles are added with [`Self::insert`].
    pub fn empty(
        triangles: Arc<TriangleSet>,
        center: Vec3,
        half_size: f32,
        config: OctreeConfig,
    ) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(OctreeNode::new(
            center,
            half_size.max(config.min_cell_size),
            None,
            0,
        ));
        let placement = vec![None; triangles.len()];

        Self {
            triangles,
            nodes,
            root,
            placement,
            listeners: vec![Box::new(BoundsListener)],
            config,
            len: 0,
        }
    }

    /// Register an additional listener. The [`BoundsListener`] is always
    /// installed first.
    pub fn add_listener(&mut self, listener: Box<dyn OctreeListener>) {
        self.listeners.push(listener);
    }

    pub fn triangles(&self) -> &TriangleSet {
        &self.triangles
    }

    /// Shared handle to the triangle set.
    pub fn triangle_set(&self) -> Arc<TriangleSet> {
        Arc::clone(&self.triangles)
    }

    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn node(&self, key: NodeKey) -> Option<&OctreeNode> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &OctreeNode)> {
        self.nodes.iter()
    }

    /// Number of triangles stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of levels below the root (a lone root has depth 0).
    pub fn depth(&self) -> usize {
        self.depth_below(self.root)
    }

    fn depth_below(&self, key: NodeKey) -> usize {
        self.nodes[key]
            .children()
            .map(|child| 1 + self.depth_below(child))
            .max()
            .unwrap_or(0)
    }

    /// Node currently holding `id`, if the triangle is in the tree.
    pub fn placement(&self, id: TriangleId) -> Option<NodeKey> {
        self.placement.get(id.index()).copied().flatten()
    }

    pub fn contains(&self, id: TriangleId) -> bool {
        self.placement(id).is_some()
    }

    /// Insert triangle `id`. Returns false if it is unknown or already present.
    pub fn insert(&mut self, id: TriangleId) -> bool {
        let Some(record) = self.triangles.get(id) else {
            log::warn!("Ignoring insert of unknown triangle {:?}", id);
            return false;
        };
        if self.contains(id) {
            return false;
        }

        let (center, radius) = (record.position_group(), record.radius());
        self.grow_root_to_fit(center, radius);

        let key = self.descend(self.root, center, radius);
        self.store(key, id);
        self.len += 1;

        if self.should_split(key) {
            self.split(key);
        }
        true
    }

    /// Remove triangle `id`. Returns false if it was not in the tree.
    ///
    /// Nodes left empty and childless are detached. Bounds are refitted only
    /// under [`BoundsPolicy::RefitOnRemoval`].
    pub fn remove(&mut self, id: TriangleId) -> bool {
        let Some(key) = self.placement(id) else {
            return false;
        };

        self.take(key, id);
        self.len -= 1;

        let survivor = self.prune_empty(key);
        if self.config.bounds_policy == BoundsPolicy::RefitOnRemoval {
            self.refit_path(survivor);
        }
        true
    }

    /// Recompute every node's bounds from scratch, post-order.
    pub fn rebound(&mut self) {
        self.rebound_below(self.root);
    }

    fn rebound_below(&mut self, key: NodeKey) {
        let children = self.nodes[key].children;
        for child in children.into_iter().flatten() {
            self.rebound_below(child);
        }
        self.nodes[key].bounds = self.content_bounds(key);
    }

    /// Bounds of `key` derived from its own triangles and its children's
    /// stored bounds.
    pub(crate) fn content_bounds(&self, key: NodeKey) -> NodeBounds {
        let node = &self.nodes[key];
        let mut bounds = NodeBounds::EMPTY;
        for &id in &node.elements {
            bounds.include(&self.triangles.extents(id));
        }
        for child in node.children() {
            bounds.include(&self.nodes[child].bounds.aabb());
        }
        bounds
    }

    #[cfg(test)]
    pub(crate) fn bounds_mut(&mut self, key: NodeKey) -> &mut NodeBounds {
        &mut self.nodes[key].bounds
    }

    /// Double the root toward `center` until the sphere fits its cell.
    fn grow_root_to_fit(&mut self, center: Vec3, radius: f32) {
        if !(center.is_finite() && radius.is_finite()) {
            log::warn!("Triangle with non-finite bounds stays at the root");
            return;
        }

        for _ in 0..MAX_ROOT_GROWTH {
            let old_root = self.root;
            let root = &self.nodes[old_root];
            let offset = center - root.center;
            if offset.abs().max_element() + radius <= root.half_size {
                return;
            }

            let step = Vec3::select(offset.cmpge(Vec3::ZERO), Vec3::ONE, Vec3::NEG_ONE);
            let new_center = root.center + step * root.half_size;
            let new_half = root.half_size * 2.0;
            let octant = octant_of(root.center, new_center);

            let new_root = self
                .nodes
                .insert(OctreeNode::new(new_center, new_half, None, 0));
            self.nodes[new_root].children[octant] = Some(old_root);
            let old = &mut self.nodes[old_root];
            old.parent = Some(new_root);
            old.octant = octant;
            self.root = new_root;
            self.announce_child(new_root, old_root);

            log::debug!("Grew octree root to half size {} at {}", new_half, new_center);
        }
        log::warn!(
            "Root growth limit reached, triangle at {} stays at the root",
            center
        );
    }

    /// Octant of `key`'s cell that fully holds the sphere, if subdividing
    /// `key` is allowed.
    fn fitting_octant(&self, key: NodeKey, center: Vec3, radius: f32) -> Option<usize> {
        let node = &self.nodes[key];
        if node.half_size < self.config.min_cell_size {
            return None;
        }

        let octant = octant_of(center, node.center);
        let child_half = node.half_size * 0.5;
        let child_center = node.center + octant_offset(octant) * child_half;
        if (center - child_center).abs().max_element() + radius <= child_half {
            Some(octant)
        } else {
            None
        }
    }

    /// Walk down from `start` through nodes that already have children.
    fn descend(&mut self, start: NodeKey, center: Vec3, radius: f32) -> NodeKey {
        let mut key = start;
        while self.nodes[key].has_children() {
            match self.fitting_octant(key, center, radius) {
                Some(octant) => key = self.child_or_create(key, octant),
                None => break,
            }
        }
        key
    }

    fn child_or_create(&mut self, parent: NodeKey, octant: usize) -> NodeKey {
        if let Some(child) = self.nodes[parent].children[octant] {
            return child;
        }

        let p = &self.nodes[parent];
        let half = p.half_size * 0.5;
        let center = p.center + octant_offset(octant) * half;
        let child = self
            .nodes
            .insert(OctreeNode::new(center, half, Some(parent), octant));
        self.nodes[parent].children[octant] = Some(child);
        self.announce_child(parent, child);
        child
    }

    fn should_split(&self, key: NodeKey) -> bool {
        let node = &self.nodes[key];
        !node.has_children()
            && node.elements.len() > self.config.max_capacity
            && node.half_size >= self.config.min_cell_size
    }

    /// Push every triangle of an overfull leaf that fits an octant down a level.
    fn split(&mut self, key: NodeKey) {
        let elements = std::mem::take(&mut self.nodes[key].elements);
        log::debug!(
            "Splitting node with {} triangles, half size {}",
            elements.len(),
            self.nodes[key].half_size
        );

        for id in elements {
            let record = &self.triangles[id];
            let (center, radius) = (record.position_group(), record.radius());
            let target = match self.fitting_octant(key, center, radius) {
                Some(octant) => {
                    let child = self.child_or_create(key, octant);
                    let node = &mut self.nodes[key];
                    for listener in &mut self.listeners {
                        listener.handle_removal(&mut node.bounds, id);
                    }
                    child
                }
                None => key,
            };
            self.store(target, id);
        }

        let children = self.nodes[key].children;
        for child in children.into_iter().flatten() {
            if self.should_split(child) {
                self.split(child);
            }
        }
    }

    /// Put `id` in `key`'s element list and fold its box up to the root.
    fn store(&mut self, key: NodeKey, id: TriangleId) {
        let extents = self.triangles.extents(id);
        let node = &mut self.nodes[key];

        node.bounds.include(&extents);
        self.triangles[id].set_bin_index(node.elements.len() as i32);
        node.elements.push(id);
        self.placement[id.index()] = Some(key);

        for listener in &mut self.listeners {
            listener.handle_insertion(&mut node.bounds, id);
            listener.handle_state_change(&mut node.bounds);
        }

        self.propagate_up(key);
    }

    /// Remove `id` from `key`'s element list using its bin index.
    fn take(&mut self, key: NodeKey, id: TriangleId) {
        let record = &self.triangles[id];
        let bin = record.bin_index() as usize;
        let node = &mut self.nodes[key];
        debug_assert_eq!(node.elements.get(bin), Some(&id));

        node.elements.swap_remove(bin);
        if let Some(&moved) = node.elements.get(bin) {
            self.triangles[moved].set_bin_index(bin as i32);
        }
        record.set_bin_index(UNBINNED);
        self.placement[id.index()] = None;

        for listener in &mut self.listeners {
            listener.handle_removal(&mut node.bounds, id);
            listener.handle_state_change(&mut node.bounds);
        }
    }

    /// Announce every link from `key` to the root so listeners can fold the
    /// child's bounds into each ancestor.
    fn propagate_up(&mut self, key: NodeKey) {
        let mut child = key;
        while let Some(parent) = self.nodes[child].parent {
            self.announce_child(parent, child);
            child = parent;
        }
    }

    fn announce_child(&mut self, parent: NodeKey, child: NodeKey) {
        let child_bounds = self.nodes[child].bounds;
        let parent_bounds = &mut self.nodes[parent].bounds;
        for listener in &mut self.listeners {
            listener.handle_child_addition(parent_bounds, &child_bounds);
        }
    }

    /// Detach empty childless nodes from `key` upward. Returns the first node
    /// that stays alive.
    fn prune_empty(&mut self, mut key: NodeKey) -> NodeKey {
        loop {
            let node = &self.nodes[key];
            let Some(parent) = node.parent else {
                return key;
            };
            if !node.elements.is_empty() || node.has_children() {
                return key;
            }

            let octant = node.octant;
            if let Some(removed) = self.nodes.remove(key) {
                let parent_node = &mut self.nodes[parent];
                parent_node.children[octant] = None;
                for listener in &mut self.listeners {
                    listener.handle_child_removal(&mut parent_node.bounds, &removed.bounds);
                    listener.handle_destruction(&removed.bounds);
                }
            }
            key = parent;
        }
    }

    /// Recompute bounds on the path from `key` to the root.
    fn refit_path(&mut self, key: NodeKey) {
        let mut current = Some(key);
        while let Some(key) = current {
            self.nodes[key].bounds = self.content_bounds(key);
            current = self.nodes[key].parent;
        }
    }
}

impl Index<NodeKey> for Octree {
    type Output = OctreeNode;

    fn index(&self, key: NodeKey) -> &OctreeNode {
        &self.nodes[key]
    }
}

impl std::fmt::Debug for Octree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Octree")
            .field("len", &self.len)
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{init_logging, random_triangle_set, triangle_set_from};
    use std::sync::Mutex;

    fn small_config() -> OctreeConfig {
        OctreeConfig {
            max_capacity: 4,
            ..OctreeConfig::default()
        }
    }

    /// Every node's bounds enclose its triangles' centers and boxes and its
    /// children's bounds.
    fn assert_enclosure(tree: &Octree) {
        for (key, node) in tree.nodes() {
            for &id in node.elements() {
                let record = &tree.triangles()[id];
                assert!(node.bounds().contains_point(record.position_group()));
                assert!(node.bounds().aabb().encloses(&tree.triangles().extents(id)));
                assert_eq!(tree.placement(id), Some(key));
            }
            for child in node.children() {
                assert!(node.bounds().encloses(tree[child].bounds()));
                assert_eq!(tree[child].parent(), Some(key));
            }
        }
    }

    #[test]
    fn test_octant_helpers() {
        for octant in 0..8 {
            let p = octant_offset(octant);
            assert_eq!(octant_of(p, Vec3::ZERO), octant);
        }
    }

    #[test]
    fn test_empty_tree() {
        let set = Arc::new(triangle_set_from(&[]));
        let tree = Octree::new(set, OctreeConfig::default());

        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.depth(), 0);
        assert!(tree[tree.root()].bounds().is_empty());
    }

    #[test]
    fn test_build_splits_and_encloses() {
        init_logging();
        let set = Arc::new(random_triangle_set(7, 200));
        let tree = Octree::new(set.clone(), small_config());

        assert_eq!(tree.len(), 200);
        assert!(tree.depth() > 0);
        assert_enclosure(&tree);

        let root_bounds = tree[tree.root()].bounds().aabb();
        assert_eq!(root_bounds, set.bounds());
    }

    #[test]
    fn test_bin_indices_match_slots() {
        let set = Arc::new(random_triangle_set(11, 100));
        let tree = Octree::new(set, small_config());

        for (_, node) in tree.nodes() {
            for (slot, &id) in node.elements().iter().enumerate() {
                assert_eq!(tree.triangles()[id].bin_index(), slot as i32);
            }
        }
    }

    #[test]
    fn test_insert_twice_and_unknown() {
        let set = Arc::new(random_triangle_set(3, 5));
        let mut tree = Octree::new(set, small_config());

        assert!(!tree.insert(TriangleId(0)));
        assert!(!tree.insert(TriangleId(99)));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_root_grows_for_far_triangles() {
        let set = Arc::new(triangle_set_from(&[
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [
                Vec3::new(100.0, 0.0, 0.0),
                Vec3::new(101.0, 0.0, 0.0),
                Vec3::new(100.0, 1.0, 0.0),
            ],
        ]));
        let mut tree = Octree::empty(set, Vec3::splat(0.5), 2.0, small_config());
        let first_root = tree.root();

        assert!(tree.insert(TriangleId(0)));
        assert_eq!(tree.root(), first_root);
        assert!(tree.insert(TriangleId(1)));

        assert_ne!(tree.root(), first_root);
        assert!(tree[first_root].parent().is_some());
        assert!(tree[tree.root()].cell().contains_point(Vec3::new(100.5, 0.5, 0.0)));
        assert_enclosure(&tree);
        assert_eq!(
            tree[tree.root()].bounds().extents(),
            [Vec3::ZERO, Vec3::new(101.0, 1.0, 0.0)]
        );
    }

    #[test]
    fn test_non_finite_triangle_stays_at_root() {
        let set = Arc::new(triangle_set_from(&[[Vec3::NAN; 3]]));
        let mut tree = Octree::empty(set, Vec3::ZERO, 1.0, small_config());

        assert!(tree.insert(TriangleId(0)));
        assert_eq!(tree.placement(TriangleId(0)), Some(tree.root()));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_remove_prunes_empty_nodes() {
        let set = Arc::new(random_triangle_set(5, 60));
        let mut tree = Octree::new(set.clone(), small_config());

        for id in set.ids() {
            assert!(tree.remove(id));
            assert!(!tree.contains(id));
            assert_eq!(set[id].bin_index(), UNBINNED);
        }

        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 1);
        assert!(!tree.remove(TriangleId(0)));
    }

    #[test]
    fn test_grow_only_keeps_loose_bounds() {
        let set = Arc::new(random_triangle_set(9, 40));
        let mut tree = Octree::new(set.clone(), small_config());
        let before = *tree[tree.root()].bounds();

        for id in set.ids().take(20) {
            tree.remove(id);
        }
        assert_eq!(*tree[tree.root()].bounds(), before);

        tree.rebound();
        let root = tree.root();
        assert_eq!(*tree[root].bounds(), tree.content_bounds(root));
        assert!(before.encloses(tree[root].bounds()));
        assert_enclosure(&tree);
    }

    #[test]
    fn test_refit_on_removal_keeps_tight_bounds() {
        let set = Arc::new(random_triangle_set(13, 40));
        let config = OctreeConfig {
            bounds_policy: BoundsPolicy::RefitOnRemoval,
            ..small_config()
        };
        let mut tree = Octree::new(set.clone(), config);

        for id in set.ids().step_by(2) {
            tree.remove(id);
        }

        for (key, node) in tree.nodes() {
            assert_eq!(*node.bounds(), tree.content_bounds(key));
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl OctreeListener for Recorder {
        fn handle_child_addition(&mut self, _: &mut NodeBounds, _: &NodeBounds) {
            self.events.lock().unwrap().push("child_addition");
        }
        fn handle_child_removal(&mut self, _: &mut NodeBounds, _: &NodeBounds) {
            self.events.lock().unwrap().push("child_removal");
        }
        fn handle_state_change(&mut self, _: &mut NodeBounds) {
            self.events.lock().unwrap().push("state_change");
        }
        fn handle_insertion(&mut self, _: &mut NodeBounds, _: TriangleId) {
            self.events.lock().unwrap().push("insertion");
        }
        fn handle_removal(&mut self, _: &mut NodeBounds, _: TriangleId) {
            self.events.lock().unwrap().push("removal");
        }
        fn handle_destruction(&mut self, _: &NodeBounds) {
            self.events.lock().unwrap().push("destruction");
        }
    }

    #[test]
    fn test_listener_events() {
        let set = Arc::new(triangle_set_from(&[
            [Vec3::splat(0.1), Vec3::splat(0.1) + Vec3::X * 0.1, Vec3::splat(0.2)],
            [Vec3::splat(0.8), Vec3::splat(0.8) + Vec3::X * 0.1, Vec3::splat(0.9)],
        ]));
        let config = OctreeConfig {
            max_capacity: 1,
            ..OctreeConfig::default()
        };
        let mut tree = Octree::empty(set, Vec3::splat(0.5), 0.5, config);
        let recorder = Recorder::default();
        let events = Arc::clone(&recorder.events);
        tree.add_listener(Box::new(recorder));

        tree.insert(TriangleId(0));
        assert_eq!(*events.lock().unwrap(), ["insertion", "state_change"]);
        events.lock().unwrap().clear();

        // Overfills the root: both triangles move into their own octants
        tree.insert(TriangleId(1));
        let log = events.lock().unwrap().clone();
        assert_eq!(log.iter().filter(|e| **e == "removal").count(), 2);
        assert!(log.contains(&"child_addition"));
        assert_eq!(tree.depth(), 1);
        events.lock().unwrap().clear();

        tree.remove(TriangleId(1));
        let log = events.lock().unwrap().clone();
        assert_eq!(
            log,
            ["removal", "state_change", "child_removal", "destruction"]
        );
    }
}
