//! Position lookups and iteration.
//!
//! Two coordinate systems address a row:
//!
//! - **count**: the 1-based in-order position within a single tree,
//!   resolved against the per-node `count` aggregate. Counts never cross
//!   children-tree boundaries.
//! - **offset**: the cumulative height at which the row starts, resolved
//!   against the per-node `offset` aggregate. Offsets span the whole nested
//!   hierarchy: a row's children block sits between the row itself and its
//!   in-order successor.
//!
//! Both directions are provided: position to node ([`RowForest::find_count`],
//! [`RowForest::find_offset`]) and node to position
//! ([`RowForest::node_find_offset`], [`RowForest::node_find_parity`]).
//! Iteration comes in a per-tree flavor ([`RowForest::next`]/
//! [`RowForest::prev`]) and a hierarchy-crossing flavor
//! ([`RowForest::next_full`]/[`RowForest::prev_full`]) that visits every row
//! in display order.

use crate::forest::RowForest;
use crate::node::{NodeId, TreeId};

/// Visit order for [`RowForest::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseOrder {
    PreOrder,
    PostOrder,
}

impl RowForest {
    // -----------------------------------------------------------------------
    // Position to node
    // -----------------------------------------------------------------------

    /// The row with exactly `count - 1` rows of this tree before it
    /// (1-based; nested children trees don't count). `None` when `count` is
    /// out of range.
    #[must_use]
    pub fn find_count(&self, tree: TreeId, count: u32) -> Option<NodeId> {
        let mut node = self.root(tree);
        let mut count = count;
        while !node.is_nil() && self.count(self.left(node)) + 1 != count {
            let before = self.count(self.left(node));
            if before >= count {
                node = self.left(node);
            } else {
                count -= before + 1;
                node = self.right(node);
            }
        }
        if node.is_nil() {
            None
        } else {
            Some(node)
        }
    }

    /// The row whose half-open span `[start, start + own_height)` contains
    /// the cumulative offset `height`, descending into nested children
    /// trees as needed.
    ///
    /// Returns the owning tree, the row, and the remaining offset within the
    /// row's own height. `None` for offsets outside `[0, total)`.
    #[must_use]
    pub fn find_offset(&self, tree: TreeId, height: i32) -> Option<(TreeId, NodeId, i32)> {
        if height < 0 || height >= self.offset(self.root(tree)) {
            return None;
        }
        self.find_offset_in(tree, height)
    }

    fn find_offset_in(&self, tree: TreeId, mut height: i32) -> Option<(TreeId, NodeId, i32)> {
        let mut node = self.root(tree);
        while !node.is_nil() {
            let before = self.offset(self.left(node));
            let through = self.offset(node) - self.offset(self.right(node));
            if before > height {
                node = self.left(node);
            } else if through <= height {
                height -= through;
                node = self.right(node);
            } else {
                break;
            }
        }
        if node.is_nil() {
            return None;
        }
        if let Some(ct) = self.children(node) {
            let child_weight = self.offset(self.root(ct));
            let own_end = self.offset(node) - self.offset(self.right(node)) - child_weight;
            if own_end > height {
                return Some((tree, node, height - self.offset(self.left(node))));
            }
            let own = own_end - self.offset(self.left(node));
            return self.find_offset_in(ct, height - self.offset(self.left(node)) - own);
        }
        Some((tree, node, height - self.offset(self.left(node))))
    }

    // -----------------------------------------------------------------------
    // Node to position
    // -----------------------------------------------------------------------

    /// The cumulative offset at which a row starts, measured from the top of
    /// the outermost tree. Inverse of [`find_offset`](RowForest::find_offset).
    #[must_use]
    pub fn node_find_offset(&self, tree: TreeId, node: NodeId) -> i32 {
        debug_assert!(!node.is_nil());
        let mut retval = self.offset(self.left(node));
        let mut cur_tree = tree;
        let mut cur = node;
        loop {
            let last = cur;
            let parent = self.parent(cur);
            // Add the left branch, the node itself, and its children block,
            // iff we came up from the right.
            if self.right(parent) == last {
                retval += self.offset(parent) - self.offset(self.right(parent));
            }
            if parent.is_nil() {
                match self.tree_parent(cur_tree) {
                    Some((pt, pn)) => {
                        // Crossing a boundary: the owning row and its left
                        // branch precede this whole tree.
                        retval += self.offset(self.left(pn)) + self.own_height(pn);
                        cur_tree = pt;
                        cur = pn;
                    }
                    None => break,
                }
            } else {
                cur = parent;
            }
        }
        retval
    }

    /// The mod-2 count of rows before this one in display order, nested
    /// children included. The same upward walk as
    /// [`node_find_offset`](RowForest::node_find_offset), over parity bits.
    #[must_use]
    pub fn node_find_parity(&self, tree: TreeId, node: NodeId) -> bool {
        debug_assert!(!node.is_nil());
        let mut retval = i32::from(self.parity(self.left(node)));
        let mut cur_tree = tree;
        let mut cur = node;
        loop {
            let last = cur;
            let parent = self.parent(cur);
            if self.right(parent) == last {
                retval += i32::from(self.parity(parent)) - i32::from(self.parity(self.right(parent)));
            }
            if parent.is_nil() {
                match self.tree_parent(cur_tree) {
                    Some((pt, pn)) => {
                        retval += i32::from(self.parity(self.left(pn))) + 1;
                        cur_tree = pt;
                        cur = pn;
                    }
                    None => break,
                }
            } else {
                cur = parent;
            }
        }
        retval.rem_euclid(2) == 1
    }

    // -----------------------------------------------------------------------
    // In-order iteration, single tree
    // -----------------------------------------------------------------------

    /// In-order successor within the row's own tree.
    #[must_use]
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        debug_assert!(!node.is_nil());
        if !self.right(node).is_nil() {
            let mut cur = self.right(node);
            while !self.left(cur).is_nil() {
                cur = self.left(cur);
            }
            return Some(cur);
        }
        let mut cur = node;
        while !self.parent(cur).is_nil() {
            if self.right(self.parent(cur)) == cur {
                cur = self.parent(cur);
            } else {
                return Some(self.parent(cur));
            }
        }
        None
    }

    /// In-order predecessor within the row's own tree.
    #[must_use]
    pub fn prev(&self, node: NodeId) -> Option<NodeId> {
        debug_assert!(!node.is_nil());
        if !self.left(node).is_nil() {
            let mut cur = self.left(node);
            while !self.right(cur).is_nil() {
                cur = self.right(cur);
            }
            return Some(cur);
        }
        let mut cur = node;
        while !self.parent(cur).is_nil() {
            if self.left(self.parent(cur)) == cur {
                cur = self.parent(cur);
            } else {
                return Some(self.parent(cur));
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Display-order iteration across the hierarchy
    // -----------------------------------------------------------------------

    /// The next row in display order: a row's (non-empty) children tree
    /// comes first, then its in-order successor, then the successor of
    /// whichever ancestor row has one.
    #[must_use]
    pub fn next_full(&self, tree: TreeId, node: NodeId) -> Option<(TreeId, NodeId)> {
        if let Some(ct) = self.children(node) {
            if let Some(first) = self.first(ct) {
                return Some((ct, first));
            }
        }
        let mut cur_tree = tree;
        let mut cur = self.next(node);
        loop {
            match cur {
                Some(n) => return Some((cur_tree, n)),
                None => {
                    let (pt, pn) = self.tree_parent(cur_tree)?;
                    cur_tree = pt;
                    cur = self.next(pn);
                }
            }
        }
    }

    /// The previous row in display order: the deepest last descendant of the
    /// in-order predecessor, or the owning row when there is no predecessor.
    #[must_use]
    pub fn prev_full(&self, tree: TreeId, node: NodeId) -> Option<(TreeId, NodeId)> {
        match self.prev(node) {
            None => self.tree_parent(tree),
            Some(mut cur) => {
                let mut cur_tree = tree;
                while let Some(ct) = self.children(cur) {
                    if self.root(ct).is_nil() {
                        break;
                    }
                    cur_tree = ct;
                    cur = self.root(ct);
                    while !self.right(cur).is_nil() {
                        cur = self.right(cur);
                    }
                }
                Some((cur_tree, cur))
            }
        }
    }

    /// How many trees enclose this one; zero at top level.
    #[must_use]
    pub fn get_depth(&self, tree: TreeId) -> usize {
        let mut depth = 0;
        let mut cur = self.tree(tree).parent_tree;
        while let Some(t) = cur {
            depth += 1;
            cur = self.tree(t).parent_tree;
        }
        depth
    }

    // -----------------------------------------------------------------------
    // Generic traversal
    // -----------------------------------------------------------------------

    /// Visit every node of the subtree rooted at `node`, within its own
    /// tree. Callers that need the nested hierarchy recurse into
    /// [`children`](RowForest::children) themselves.
    pub fn traverse<F: FnMut(NodeId)>(&self, node: NodeId, order: TraverseOrder, mut func: F) {
        match order {
            TraverseOrder::PreOrder => self.traverse_pre(node, &mut func),
            TraverseOrder::PostOrder => self.traverse_post(node, &mut func),
        }
    }

    fn traverse_pre<F: FnMut(NodeId)>(&self, node: NodeId, func: &mut F) {
        if node.is_nil() {
            return;
        }
        func(node);
        self.traverse_pre(self.left(node), func);
        self.traverse_pre(self.right(node), func);
    }

    fn traverse_post<F: FnMut(NodeId)>(&self, node: NodeId, func: &mut F) {
        if node.is_nil() {
            return;
        }
        self.traverse_post(self.left(node), func);
        self.traverse_post(self.right(node), func);
        func(node);
    }
}
