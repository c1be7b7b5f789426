//! Structural self-check for an [`Octree`].
//!
//! Walks the whole tree post-order and recomputes every node's bounds from
//! its own triangles and its (already checked) children. This is an audit
//! tool for callers who suspect a maintenance bug, not something to run per
//! frame.

use thiserror::Error;

use crate::{NodeBounds, NodeKey, Octree, TriangleId};

/// Relative tolerance when comparing stored and recomputed bounds.
const BOUNDS_TOLERANCE: f32 = 1e-6;

/// First inconsistency found by [`check_structure`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    #[error("Node {node:?} stores bounds {stored:?}, recomputed {expected:?}")]
    BoundsMismatch {
        node: NodeKey,
        stored: NodeBounds,
        expected: NodeBounds,
    },

    #[error("Triangle {triangle:?} sits in slot {slot} of node {node:?} but has bin index {bin}")]
    BinMismatch {
        node: NodeKey,
        triangle: TriangleId,
        slot: usize,
        bin: i32,
    },

    #[error("Triangle {triangle:?} is stored in node {node:?} but placed at {placed:?}")]
    PlacementMismatch {
        node: NodeKey,
        triangle: TriangleId,
        placed: Option<NodeKey>,
    },

    #[error("Node {child:?} is a child of {parent:?} but links to {linked:?}")]
    ParentMismatch {
        parent: NodeKey,
        child: NodeKey,
        linked: Option<NodeKey>,
    },
}

/// Check every node, children before parents. Returns the first problem.
pub fn check_structure(tree: &Octree) -> Result<(), StructureError> {
    check_node(tree, tree.root())
}

/// Like [`check_structure`], but any inconsistency is fatal.
///
/// # Panics
///
/// Panics if the stored bounds or bookkeeping of any node are wrong. Such a
/// tree cannot be trusted for queries, and the fault lies in the code that
/// maintained it.
pub fn validate(tree: &Octree) {
    if let Err(err) = check_structure(tree) {
        log::error!("Octree structure check failed: {}", err);
        panic!("octree structure check failed: {err}");
    }
    log::debug!("Octree structure check passed for {} nodes", tree.node_count());
}

fn check_node(tree: &Octree, key: NodeKey) -> Result<(), StructureError> {
    let node = &tree[key];

    for child in node.children() {
        let linked = tree[child].parent();
        if linked != Some(key) {
            return Err(StructureError::ParentMismatch {
                parent: key,
                child,
                linked,
            });
        }
        check_node(tree, child)?;
    }

    for (slot, &triangle) in node.elements().iter().enumerate() {
        let bin = tree.triangles()[triangle].bin_index();
        if bin != slot as i32 {
            return Err(StructureError::BinMismatch {
                node: key,
                triangle,
                slot,
                bin,
            });
        }
        let placed = tree.placement(triangle);
        if placed != Some(key) {
            return Err(StructureError::PlacementMismatch {
                node: key,
                triangle,
                placed,
            });
        }
    }

    let expected = tree.content_bounds(key);
    let stored = *node.bounds();
    let scale = 1.0
        + expected.center().abs().max_element()
        + expected.half_extent().max_element();
    if !stored.abs_diff_eq(&expected, BOUNDS_TOLERANCE * scale) {
        return Err(StructureError::BoundsMismatch {
            node: key,
            stored,
            expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{init_logging, random_triangle_set};
    use crate::{BoundsPolicy, OctreeConfig};
    use octri_math::{Aabb, Vec3};
    use std::sync::Arc;

    fn build(seed: u64, count: usize, bounds_policy: BoundsPolicy) -> Octree {
        let config = OctreeConfig {
            max_capacity: 3,
            bounds_policy,
            ..OctreeConfig::default()
        };
        Octree::new(Arc::new(random_triangle_set(seed, count)), config)
    }

    /// A node below the root that stores triangles of its own.
    fn deep_leaf(tree: &Octree) -> NodeKey {
        tree.nodes()
            .find(|(key, node)| *key != tree.root() && !node.elements().is_empty())
            .map(|(key, _)| key)
            .expect("tree has a populated non-root node")
    }

    #[test]
    fn test_freshly_built_trees_pass() {
        for seed in 0..5 {
            let tree = build(seed, 150, BoundsPolicy::GrowOnly);
            assert_eq!(check_structure(&tree), Ok(()));
            validate(&tree);
        }
    }

    #[test]
    fn test_detects_shrunk_node() {
        let mut tree = build(21, 150, BoundsPolicy::GrowOnly);
        let victim = deep_leaf(&tree);

        let original = *tree[victim].bounds();
        let shrunk = Aabb::from_extents(original.center(), original.center() + Vec3::splat(1e-3));
        *tree.bounds_mut(victim) = NodeBounds::from_aabb(&shrunk);

        match check_structure(&tree) {
            Err(StructureError::BoundsMismatch { node, expected, .. }) => {
                assert_eq!(node, victim);
                assert_eq!(expected, original);
            }
            other => panic!("expected a bounds mismatch, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "octree structure check failed")]
    fn test_validate_is_fatal() {
        init_logging();
        let mut tree = build(22, 80, BoundsPolicy::GrowOnly);
        let root = tree.root();
        *tree.bounds_mut(root) = NodeBounds::EMPTY;

        validate(&tree);
    }

    #[test]
    fn test_detects_bin_corruption() {
        let tree = build(23, 60, BoundsPolicy::GrowOnly);
        let victim = deep_leaf(&tree);
        let triangle = tree[victim].elements()[0];
        tree.triangles()[triangle].set_bin_index(99);

        assert!(matches!(
            check_structure(&tree),
            Err(StructureError::BinMismatch { bin: 99, .. })
        ));
    }

    #[test]
    fn test_removal_needs_rebound_under_grow_only() {
        let mut tree = build(24, 120, BoundsPolicy::GrowOnly);
        let set = tree.triangle_set();

        // Strip the extreme triangles so the root box must shrink
        let root_max = tree[tree.root()].bounds().extents()[1];
        let outer: Vec<_> = set
            .ids()
            .filter(|&id| {
                let max = set.extents(id).max();
                max.x == root_max.x || max.y == root_max.y || max.z == root_max.z
            })
            .collect();
        assert!(!outer.is_empty());
        for id in outer {
            tree.remove(id);
        }

        assert!(matches!(
            check_structure(&tree),
            Err(StructureError::BoundsMismatch { .. })
        ));

        tree.rebound();
        assert_eq!(check_structure(&tree), Ok(()));
    }

    #[test]
    fn test_refit_policy_stays_valid() {
        let mut tree = build(25, 120, BoundsPolicy::RefitOnRemoval);
        let set = tree.triangle_set();

        for id in set.ids().filter(|id| id.0 % 3 == 0) {
            tree.remove(id);
            assert_eq!(check_structure(&tree), Ok(()));
        }
    }
}
