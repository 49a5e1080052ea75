//! Rotations and red-black fixup passes.
//!
//! The rotations do double duty: besides relinking, they rebuild the
//! augmented aggregates (`count`, `offset`, `parity`) and the
//! descendant-validity bit for the two nodes whose subtrees changed. Both
//! nodes' own heights are derived from the aggregates before any link
//! moves, since the stored `offset` only has meaning against the old
//! subtree shape.
//!
//! The fixup passes are the textbook insert/delete rebalancing loops: at
//! most two rotations per insert, at most three per delete, plus an
//! O(log n) recoloring walk.

use crate::forest::RowForest;
use crate::node::{Color, NodeId, TreeId};

pub(crate) fn rotate_left(forest: &mut RowForest, tree: TreeId, node: NodeId) {
    debug_assert!(!node.is_nil());
    let right = forest.right(node);
    debug_assert!(!right.is_nil());

    let node_height = forest.own_height(node);
    let right_height = forest.own_height(right);

    // Move right's left subtree under node.
    let inner = forest.left(right);
    forest.node_mut(node).right = inner;
    if !inner.is_nil() {
        forest.node_mut(inner).parent = node;
    }

    // Right takes node's place under node's parent.
    let parent = forest.parent(node);
    forest.node_mut(right).parent = parent;
    if !parent.is_nil() {
        if node == forest.left(parent) {
            forest.node_mut(parent).left = right;
        } else {
            forest.node_mut(parent).right = right;
        }
    } else {
        forest.tree_mut(tree).root = right;
    }

    forest.node_mut(right).left = node;
    forest.node_mut(node).parent = right;

    restore_aggregates(forest, node, node_height);
    restore_aggregates(forest, right, right_height);
    forest.fixup_validation(node);
    forest.fixup_validation(right);
    forest.fixup_parity(node);
    forest.fixup_parity(right);
}

pub(crate) fn rotate_right(forest: &mut RowForest, tree: TreeId, node: NodeId) {
    debug_assert!(!node.is_nil());
    let left = forest.left(node);
    debug_assert!(!left.is_nil());

    let node_height = forest.own_height(node);
    let left_height = forest.own_height(left);

    // Move left's right subtree under node.
    let inner = forest.right(left);
    forest.node_mut(node).left = inner;
    if !inner.is_nil() {
        forest.node_mut(inner).parent = node;
    }

    // Left takes node's place under node's parent.
    let parent = forest.parent(node);
    forest.node_mut(left).parent = parent;
    if !parent.is_nil() {
        if node == forest.right(parent) {
            forest.node_mut(parent).right = left;
        } else {
            forest.node_mut(parent).left = left;
        }
    } else {
        forest.tree_mut(tree).root = left;
    }

    forest.node_mut(left).right = node;
    forest.node_mut(node).parent = left;

    restore_aggregates(forest, node, node_height);
    restore_aggregates(forest, left, left_height);
    forest.fixup_validation(node);
    forest.fixup_validation(left);
    forest.fixup_parity(node);
    forest.fixup_parity(left);
}

/// Recompute `count` and `offset` for a node from its (post-rotation)
/// children and its previously derived own height. Order matters: the lower
/// of the two rotated nodes must be restored first.
fn restore_aggregates(forest: &mut RowForest, node: NodeId, own_height: i32) {
    let left = forest.left(node);
    let right = forest.right(node);
    let count = 1 + forest.count(left) + forest.count(right);
    let offset = own_height
        + forest.offset(left)
        + forest.offset(right)
        + forest.children_offset(node);
    let rec = forest.node_mut(node);
    rec.count = count;
    rec.offset = offset;
}

/// Restore the red-black invariants after `node` was inserted (red).
pub(crate) fn insert_fixup(forest: &mut RowForest, tree: TreeId, mut node: NodeId) {
    while node != forest.root(tree) && forest.color(forest.parent(node)) == Color::Red {
        let parent = forest.parent(node);
        let grand = forest.parent(parent);
        if parent == forest.left(grand) {
            let uncle = forest.right(grand);
            if forest.color(uncle) == Color::Red {
                forest.set_color(parent, Color::Black);
                forest.set_color(uncle, Color::Black);
                forest.set_color(grand, Color::Red);
                node = grand;
            } else {
                if node == forest.right(parent) {
                    node = parent;
                    rotate_left(forest, tree, node);
                }
                let parent = forest.parent(node);
                let grand = forest.parent(parent);
                forest.set_color(parent, Color::Black);
                forest.set_color(grand, Color::Red);
                rotate_right(forest, tree, grand);
            }
        } else {
            // Mirror image of the branch above.
            let uncle = forest.left(grand);
            if forest.color(uncle) == Color::Red {
                forest.set_color(parent, Color::Black);
                forest.set_color(uncle, Color::Black);
                forest.set_color(grand, Color::Red);
                node = grand;
            } else {
                if node == forest.left(parent) {
                    node = parent;
                    rotate_right(forest, tree, node);
                }
                let parent = forest.parent(node);
                let grand = forest.parent(parent);
                forest.set_color(parent, Color::Black);
                forest.set_color(grand, Color::Red);
                rotate_left(forest, tree, grand);
            }
        }
    }
    let root = forest.root(tree);
    forest.set_color(root, Color::Black);
}

/// Restore the red-black invariants after a black node was spliced out,
/// starting from the child that replaced it. `node` may be the sentinel;
/// its parent link was pointed at the splice site for exactly this walk.
pub(crate) fn remove_fixup(forest: &mut RowForest, tree: TreeId, mut node: NodeId) {
    while node != forest.root(tree) && forest.color(node) == Color::Black {
        let parent = forest.parent(node);
        if node == forest.left(parent) {
            let mut sibling = forest.right(parent);
            if forest.color(sibling) == Color::Red {
                forest.set_color(sibling, Color::Black);
                forest.set_color(parent, Color::Red);
                rotate_left(forest, tree, parent);
                sibling = forest.right(forest.parent(node));
            }
            if forest.color(forest.left(sibling)) == Color::Black
                && forest.color(forest.right(sibling)) == Color::Black
            {
                forest.set_color(sibling, Color::Red);
                node = forest.parent(node);
            } else {
                if forest.color(forest.right(sibling)) == Color::Black {
                    let inner = forest.left(sibling);
                    forest.set_color(inner, Color::Black);
                    forest.set_color(sibling, Color::Red);
                    rotate_right(forest, tree, sibling);
                    sibling = forest.right(forest.parent(node));
                }
                let parent = forest.parent(node);
                let parent_color = forest.color(parent);
                forest.set_color(sibling, parent_color);
                forest.set_color(parent, Color::Black);
                let outer = forest.right(sibling);
                forest.set_color(outer, Color::Black);
                rotate_left(forest, tree, parent);
                node = forest.root(tree);
            }
        } else {
            // Mirror image of the branch above.
            let mut sibling = forest.left(parent);
            if forest.color(sibling) == Color::Red {
                forest.set_color(sibling, Color::Black);
                forest.set_color(parent, Color::Red);
                rotate_right(forest, tree, parent);
                sibling = forest.left(forest.parent(node));
            }
            if forest.color(forest.right(sibling)) == Color::Black
                && forest.color(forest.left(sibling)) == Color::Black
            {
                forest.set_color(sibling, Color::Red);
                node = forest.parent(node);
            } else {
                if forest.color(forest.left(sibling)) == Color::Black {
                    let inner = forest.right(sibling);
                    forest.set_color(inner, Color::Black);
                    forest.set_color(sibling, Color::Red);
                    rotate_left(forest, tree, sibling);
                    sibling = forest.left(forest.parent(node));
                }
                let parent = forest.parent(node);
                let parent_color = forest.color(parent);
                forest.set_color(sibling, parent_color);
                forest.set_color(parent, Color::Black);
                let outer = forest.left(sibling);
                forest.set_color(outer, Color::Black);
                rotate_right(forest, tree, parent);
                node = forest.root(tree);
            }
        }
    }
    forest.set_color(node, Color::Black);
}

#[cfg(test)]
mod tests {
    use crate::RowForest;

    #[test]
    fn sequential_inserts_stay_balanced() {
        let mut forest = RowForest::new();
        let top = forest.top();
        let mut last = None;
        for i in 0..256 {
            last = Some(forest.insert_after(top, last, i % 7 + 1, true));
            forest.check_consistency(top);
        }
        assert_eq!(forest.count(forest.root(top)), 256);
    }

    #[test]
    fn reverse_inserts_stay_balanced() {
        let mut forest = RowForest::new();
        let top = forest.top();
        let mut first = None;
        for i in 0..256 {
            first = Some(forest.insert_before(top, first, i % 5 + 1, true));
            forest.check_consistency(top);
        }
        assert_eq!(forest.count(forest.root(top)), 256);
    }

    #[test]
    fn interleaved_removal_exercises_the_delete_fixup() {
        let mut forest = RowForest::new();
        let top = forest.top();
        let mut last = None;
        let mut rows = Vec::new();
        for i in 0..128 {
            let node = forest.insert_after(top, last, i + 1, true);
            rows.push(node);
            last = Some(node);
        }
        // Remove rows in a scattered order, tracking the successor splice:
        // a two-child removal hands the removed slot's id to the next row.
        let mut index = 0;
        while !rows.is_empty() {
            let pos = index % rows.len();
            let node = rows[pos];
            let spliced = !forest.left(node).is_nil() && !forest.right(node).is_nil();
            forest.remove_node(top, node);
            rows.remove(pos);
            if spliced {
                rows[pos] = node;
            }
            forest.check_consistency(top);
            index += 3;
        }
        assert!(forest.root(top).is_nil());
    }
}
