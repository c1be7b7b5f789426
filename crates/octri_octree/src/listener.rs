//! Structural event callbacks raised by the octree container.

use crate::{NodeBounds, TriangleId};

/// Observer of octree structure changes.
///
/// The container calls one method per event and hands the listener the
/// bounds of the node(s) involved. Listeners may only touch the bounds they
/// are given mutably.
pub trait OctreeListener: Send + Sync {
    /// A child was attached beneath `parent`, or the container re-announces an
    /// existing link while walking from a modified node to the root.
    fn handle_child_addition(&mut self, parent: &mut NodeBounds, child: &NodeBounds);

    /// A child was detached from `parent` and is about to be destroyed.
    fn handle_child_removal(&mut self, parent: &mut NodeBounds, child: &NodeBounds);

    /// The node's element list changed.
    fn handle_state_change(&mut self, node: &mut NodeBounds);

    /// `triangle` was stored directly in the node.
    fn handle_insertion(&mut self, node: &mut NodeBounds, triangle: TriangleId);

    /// `triangle` was taken out of the node.
    fn handle_removal(&mut self, node: &mut NodeBounds, triangle: TriangleId);

    /// The node is being destroyed.
    fn handle_destruction(&mut self, node: &NodeBounds);
}

/// Keeps each node's bounds enclosing its children.
///
/// On child addition the parent's box becomes the union of its previous value
/// and the child's box; nothing further up is touched since the container
/// walks the ancestors itself. Every other event is a no-op: bounds only grow,
/// shrinking needs [`Octree::rebound`](crate::Octree::rebound) or
/// [`BoundsPolicy::RefitOnRemoval`](crate::BoundsPolicy::RefitOnRemoval).
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundsListener;

impl OctreeListener for BoundsListener {
    fn handle_child_addition(&mut self, parent: &mut NodeBounds, child: &NodeBounds) {
        parent.include(&child.aabb());
    }

    fn handle_child_removal(&mut self, _parent: &mut NodeBounds, _child: &NodeBounds) {}

    fn handle_state_change(&mut self, _node: &mut NodeBounds) {}

    fn handle_insertion(&mut self, _node: &mut NodeBounds, _triangle: TriangleId) {}

    fn handle_removal(&mut self, _node: &mut NodeBounds, _triangle: TriangleId) {}

    fn handle_destruction(&mut self, _node: &NodeBounds) {}
}
