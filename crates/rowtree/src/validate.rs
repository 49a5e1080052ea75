//! Lazy row invalidation.
//!
//! Rows carry two dirty bits of their own (`INVALID` for a stale row,
//! `COLUMN_INVALID` for stale column measurements) plus one aggregate,
//! `DESCENDANTS_INVALID`: set iff the row or anything below it needs
//! re-validation, the nested children tree included.
//!
//! The aggregate lets a validator skip clean subtrees wholesale and makes
//! "is anything dirty" an O(1) question at the root. Marking a row invalid
//! walks upward setting the aggregate and stops at the first ancestor that
//! already has it; marking a row valid walks upward re-deriving the
//! aggregate and stops at the first ancestor whose bit doesn't change.

use crate::forest::RowForest;
use crate::node::{NodeId, RowFlags, TreeId};

impl RowForest {
    /// Re-derive a node's `DESCENDANTS_INVALID` bit from its own dirty bits
    /// and the aggregates below it.
    pub(crate) fn fixup_validation(&mut self, node: NodeId) {
        let rec = self.node(node);
        let dirty = rec
            .flags
            .intersects(RowFlags::INVALID | RowFlags::COLUMN_INVALID)
            || self.descendants_invalid(rec.left)
            || self.descendants_invalid(rec.right)
            || self
                .children(node)
                .is_some_and(|ct| self.descendants_invalid(self.root(ct)));
        if dirty {
            self.node_mut(node).flags.insert(RowFlags::DESCENDANTS_INVALID);
        } else {
            self.node_mut(node).flags.remove(RowFlags::DESCENDANTS_INVALID);
        }
    }

    /// Re-derive a node's parity from the subtrees below it.
    pub(crate) fn fixup_parity(&mut self, node: NodeId) {
        let rec = self.node(node);
        let total = 1
            + u32::from(self.parity(rec.left))
            + u32::from(self.parity(rec.right))
            + u32::from(
                self.children(node)
                    .is_some_and(|ct| self.parity(self.root(ct))),
            );
        self.node_mut(node).parity = total % 2 == 1;
    }

    #[inline]
    fn descendants_invalid(&self, node: NodeId) -> bool {
        self.flags(node).contains(RowFlags::DESCENDANTS_INVALID)
    }

    /// Flag a row as needing re-validation and propagate
    /// `DESCENDANTS_INVALID` to every ancestor across enclosing trees.
    ///
    /// The walk short-circuits at the first ancestor already flagged:
    /// everything above it is flagged too.
    pub fn mark_invalid(&mut self, tree: TreeId, node: NodeId) {
        debug_assert!(!node.is_nil());
        if self.flags(node).contains(RowFlags::INVALID) {
            return;
        }
        self.node_mut(node).flags.insert(RowFlags::INVALID);

        let mut pos = Some((tree, node));
        while let Some((t, n)) = pos {
            if self.descendants_invalid(n) {
                return;
            }
            self.node_mut(n).flags.insert(RowFlags::DESCENDANTS_INVALID);
            pos = self.step_up(t, n);
        }
    }

    /// Clear a row's dirty bits and withdraw `DESCENDANTS_INVALID` from
    /// every ancestor that no longer has a dirty descendant.
    ///
    /// The walk stops at the first ancestor that stays dirty for another
    /// reason: its own bits, a sibling subtree, or a nested children tree.
    pub fn mark_valid(&mut self, tree: TreeId, node: NodeId) {
        debug_assert!(!node.is_nil());
        if !self
            .flags(node)
            .intersects(RowFlags::INVALID | RowFlags::COLUMN_INVALID)
        {
            return;
        }
        self.node_mut(node)
            .flags
            .remove(RowFlags::INVALID | RowFlags::COLUMN_INVALID);

        let mut pos = Some((tree, node));
        while let Some((t, n)) = pos {
            let rec = self.node(n);
            let still_dirty = rec
                .flags
                .intersects(RowFlags::INVALID | RowFlags::COLUMN_INVALID)
                || self.descendants_invalid(rec.left)
                || self.descendants_invalid(rec.right)
                || self
                    .children(n)
                    .is_some_and(|ct| self.descendants_invalid(self.root(ct)));
            if still_dirty {
                return;
            }
            self.node_mut(n).flags.remove(RowFlags::DESCENDANTS_INVALID);
            pos = self.step_up(t, n);
        }
    }

    /// Flag every row of a tree, nested children trees included, as
    /// invalid. Used when the whole model changed under the view.
    pub fn mark_all_invalid(&mut self, tree: TreeId) {
        let mut node = self.first(tree);
        while let Some(n) = node {
            self.node_mut(n)
                .flags
                .insert(RowFlags::INVALID | RowFlags::DESCENDANTS_INVALID);
            if let Some(ct) = self.children(n) {
                self.mark_all_invalid(ct);
            }
            node = self.next(n);
        }
    }

    /// Flag every row's column measurements as stale, nested children trees
    /// included. Rows already fully invalid keep the stronger bit alone.
    pub fn column_invalid(&mut self, tree: TreeId) {
        let mut node = self.first(tree);
        while let Some(n) = node {
            if !self.flags(n).contains(RowFlags::INVALID) {
                self.node_mut(n).flags.insert(RowFlags::COLUMN_INVALID);
            }
            self.node_mut(n).flags.insert(RowFlags::DESCENDANTS_INVALID);
            if let Some(ct) = self.children(n) {
                self.column_invalid(ct);
            }
            node = self.next(n);
        }
    }

    /// Give every still-invalid row a fixed height, nested children trees
    /// included, optionally marking each one valid along the way. Used when
    /// the view switches to uniform row heights and per-row measuring
    /// becomes unnecessary.
    pub fn set_fixed_height(&mut self, tree: TreeId, height: i32, mark_valid: bool) {
        let mut node = self.first(tree);
        while let Some(n) = node {
            if self.flags(n).contains(RowFlags::INVALID) {
                self.node_set_height(tree, n, height);
                if mark_valid {
                    self.mark_valid(tree, n);
                }
            }
            if let Some(ct) = self.children(n) {
                self.set_fixed_height(ct, height, mark_valid);
            }
            node = self.next(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descendants_invalid(forest: &RowForest, node: NodeId) -> bool {
        forest.flags(node).contains(RowFlags::DESCENDANTS_INVALID)
    }

    /// Top rows a, b; children tree under b with rows x, y.
    fn fixture() -> (RowForest, NodeId, NodeId, TreeId, NodeId, NodeId) {
        let mut forest = RowForest::new();
        let top = forest.top();
        let a = forest.insert_after(top, None, 1, true);
        let b = forest.insert_after(top, Some(a), 1, true);
        let inner = forest.add_children(top, b);
        let x = forest.insert_after(inner, None, 1, true);
        let y = forest.insert_after(inner, Some(x), 1, true);
        forest.check_consistency(top);
        (forest, a, b, inner, x, y)
    }

    #[test]
    fn mark_invalid_propagates_across_tree_boundaries() {
        let (mut forest, a, b, inner, x, y) = fixture();
        let top = forest.top();
        forest.mark_invalid(inner, y);
        forest.check_consistency(top);

        assert!(forest.flags(y).contains(RowFlags::INVALID));
        assert!(descendants_invalid(&forest, y));
        assert!(descendants_invalid(&forest, forest.root(inner)));
        assert!(descendants_invalid(&forest, b));
        assert!(descendants_invalid(&forest, forest.root(top)));
        assert!(!forest.flags(a).contains(RowFlags::INVALID));
        assert!(!forest.flags(x).contains(RowFlags::INVALID));
    }

    #[test]
    fn mark_valid_withdraws_the_aggregate_bottom_up() {
        let (mut forest, _, b, inner, x, y) = fixture();
        let top = forest.top();
        forest.mark_invalid(inner, x);
        forest.mark_invalid(inner, y);

        // One of two dirty rows cleaned: ancestors stay dirty.
        forest.mark_valid(inner, x);
        forest.check_consistency(top);
        assert!(!forest.flags(x).contains(RowFlags::INVALID));
        assert!(descendants_invalid(&forest, b));

        // Both cleaned: the aggregate clears everywhere.
        forest.mark_valid(inner, y);
        forest.check_consistency(top);
        assert!(!descendants_invalid(&forest, b));
        assert!(!descendants_invalid(&forest, forest.root(top)));
    }

    #[test]
    fn mark_valid_on_a_clean_row_is_a_no_op() {
        let (mut forest, a, b, inner, x, _) = fixture();
        forest.mark_invalid(inner, x);
        // b is clean, but its children tree is dirty; the no-op must not
        // disturb the aggregate above it.
        forest.mark_valid(forest.top(), b);
        assert!(descendants_invalid(&forest, b));
        forest.mark_valid(forest.top(), a);
        assert!(descendants_invalid(&forest, forest.root(forest.top())));
    }

    #[test]
    fn mark_all_invalid_reaches_nested_rows() {
        let (mut forest, a, b, inner, x, y) = fixture();
        let top = forest.top();
        forest.mark_all_invalid(top);
        forest.check_consistency(top);
        for node in [a, b, x, y] {
            assert!(forest.flags(node).contains(RowFlags::INVALID));
        }
        assert!(descendants_invalid(&forest, forest.root(inner)));
    }

    #[test]
    fn column_invalid_spares_fully_invalid_rows() {
        let (mut forest, a, b, inner, x, _) = fixture();
        let top = forest.top();
        forest.mark_invalid(inner, x);
        forest.column_invalid(top);
        forest.check_consistency(top);

        assert!(forest.flags(a).contains(RowFlags::COLUMN_INVALID));
        assert!(forest.flags(b).contains(RowFlags::COLUMN_INVALID));
        // x was already invalid; it gets no column bit.
        assert!(!forest.flags(x).contains(RowFlags::COLUMN_INVALID));
        assert!(forest.flags(x).contains(RowFlags::INVALID));
    }

    #[test]
    fn set_fixed_height_touches_only_invalid_rows() {
        let (mut forest, a, b, inner, x, y) = fixture();
        let top = forest.top();
        forest.mark_invalid(top, a);
        forest.mark_invalid(inner, y);

        forest.set_fixed_height(top, 10, true);
        forest.check_consistency(top);

        assert_eq!(forest.own_height(a), 10);
        assert_eq!(forest.own_height(y), 10);
        // Valid rows keep their measured heights.
        assert_eq!(forest.own_height(b), 1);
        assert_eq!(forest.own_height(x), 1);
        assert_eq!(forest.offset(forest.root(top)), 10 + 1 + 1 + 10);

        // Everything was re-validated on the way.
        assert!(!forest.flags(a).contains(RowFlags::INVALID));
        assert!(!forest.flags(y).contains(RowFlags::INVALID));
        assert!(!descendants_invalid(&forest, forest.root(top)));
    }

    #[test]
    fn set_fixed_height_can_defer_validation() {
        let (mut forest, a, _, _, _, _) = fixture();
        let top = forest.top();
        forest.mark_invalid(top, a);
        forest.set_fixed_height(top, 7, false);
        assert_eq!(forest.own_height(a), 7);
        assert!(forest.flags(a).contains(RowFlags::INVALID));
        assert!(descendants_invalid(&forest, forest.root(top)));
    }

    #[test]
    fn insert_with_valid_false_marks_the_new_row() {
        let mut forest = RowForest::new();
        let top = forest.top();
        let a = forest.insert_after(top, None, 1, true);
        let b = forest.insert_after(top, Some(a), 1, false);
        forest.check_consistency(top);
        assert!(forest.flags(b).contains(RowFlags::INVALID));
        assert!(descendants_invalid(&forest, forest.root(top)));
    }
}
