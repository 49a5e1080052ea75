//! The row forest: arena storage and structural mutation.
//!
//! A [`RowForest`] owns every tree record and every node slot in one pair of
//! slab allocations. The top-level tree holds the outermost row sequence;
//! any row may own a nested children tree of its own, to arbitrary depth.
//!
//! Three aggregates are maintained on every node and restored by every
//! mutating operation before it returns:
//!
//! - `count`: rows in the node's subtree within its own tree. Counts do not
//!   cross children-tree boundaries.
//! - `offset`: cumulative height of the node's subtree, nested children
//!   trees included. This is what makes "which row sits at cumulative
//!   height h" an O(log n) descent.
//! - `parity`: mod-2 checksum of the subtree row count, nested children
//!   included. Cheap to maintain across tree boundaries where an exact
//!   cross-tree count would not be.
//!
//! Aggregate propagation walks toward the outermost root, crossing a
//! subtree boundary whenever the walk runs off the top of a tree.

use tracing::trace;

use crate::balance;
use crate::node::{Color, NodeId, RbNode, RbTree, RowFlags, TreeId};

/// An ordered, indexable, weighted sequence of rows with nested expandable
/// subtrees, backed by augmented red-black trees.
///
/// All operations take explicit [`TreeId`]/[`NodeId`] arguments. Ids of
/// removed rows or trees are a usage-contract violation to reuse; the slots
/// behind them are recycled by later insertions.
#[derive(Debug)]
pub struct RowForest {
    nodes: Vec<RbNode>,
    trees: Vec<RbTree>,
    free_nodes: Vec<NodeId>,
    free_trees: Vec<TreeId>,
}

impl Default for RowForest {
    fn default() -> Self {
        Self::new()
    }
}

impl RowForest {
    /// Create an empty forest: a fresh sentinel and one empty top-level
    /// tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![RbNode::nil()],
            trees: vec![RbTree::detached()],
            free_nodes: Vec::new(),
            free_trees: Vec::new(),
        }
    }

    /// The top-level tree.
    #[inline]
    #[must_use]
    pub fn top(&self) -> TreeId {
        TreeId::TOP
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    /// Root node of a tree; the sentinel if the tree is empty.
    #[inline]
    #[must_use]
    pub fn root(&self, tree: TreeId) -> NodeId {
        self.tree(tree).root
    }

    #[inline]
    #[must_use]
    pub fn left(&self, node: NodeId) -> NodeId {
        self.node(node).left
    }

    #[inline]
    #[must_use]
    pub fn right(&self, node: NodeId) -> NodeId {
        self.node(node).right
    }

    /// Parent within the same tree; the sentinel for a root node.
    #[inline]
    #[must_use]
    pub fn parent(&self, node: NodeId) -> NodeId {
        self.node(node).parent
    }

    #[inline]
    #[must_use]
    pub fn color(&self, node: NodeId) -> Color {
        self.node(node).color
    }

    #[inline]
    #[must_use]
    pub fn flags(&self, node: NodeId) -> RowFlags {
        self.node(node).flags
    }

    /// Rows in the subtree rooted at `node`, within its own tree.
    #[inline]
    #[must_use]
    pub fn count(&self, node: NodeId) -> u32 {
        self.node(node).count
    }

    /// Cumulative height of the subtree rooted at `node`, nested children
    /// trees included.
    #[inline]
    #[must_use]
    pub fn offset(&self, node: NodeId) -> i32 {
        self.node(node).offset
    }

    #[inline]
    #[must_use]
    pub fn parity(&self, node: NodeId) -> bool {
        self.node(node).parity
    }

    /// The nested children tree owned by `node`, if any.
    #[inline]
    #[must_use]
    pub fn children(&self, node: NodeId) -> Option<TreeId> {
        self.node(node).children
    }

    /// The node's own height contribution, derived from the stored
    /// aggregates.
    #[inline]
    #[must_use]
    pub fn own_height(&self, node: NodeId) -> i32 {
        let rec = self.node(node);
        rec.offset - self.offset(rec.left) - self.offset(rec.right) - self.children_offset(node)
    }

    /// The tree and node this tree hangs under, or `None` at top level.
    #[must_use]
    pub fn tree_parent(&self, tree: TreeId) -> Option<(TreeId, NodeId)> {
        let rec = self.tree(tree);
        match (rec.parent_tree, rec.parent_node) {
            (Some(pt), Some(pn)) => Some((pt, pn)),
            _ => None,
        }
    }

    /// Leftmost (first in order) row of a tree.
    #[must_use]
    pub fn first(&self, tree: TreeId) -> Option<NodeId> {
        let mut node = self.root(tree);
        if node.is_nil() {
            return None;
        }
        while !self.left(node).is_nil() {
            node = self.left(node);
        }
        Some(node)
    }

    // -----------------------------------------------------------------------
    // External state flags
    // -----------------------------------------------------------------------

    /// Set view-state bits on a row. Only [`RowFlags::STATE`] bits may be
    /// passed; validity bits are owned by the mark operations.
    pub fn set_flags(&mut self, node: NodeId, flags: RowFlags) {
        debug_assert!(!node.is_nil());
        debug_assert!(
            RowFlags::STATE.contains(flags),
            "set_flags: only state bits may be set directly"
        );
        self.node_mut(node).flags.insert(flags);
    }

    /// Clear view-state bits on a row; same restriction as [`set_flags`].
    ///
    /// [`set_flags`]: RowForest::set_flags
    pub fn unset_flags(&mut self, node: NodeId, flags: RowFlags) {
        debug_assert!(!node.is_nil());
        debug_assert!(
            RowFlags::STATE.contains(flags),
            "unset_flags: only state bits may be cleared directly"
        );
        self.node_mut(node).flags.remove(flags);
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Insert a new row immediately after `current`.
    ///
    /// With no anchor the tree must be empty and the row becomes its root.
    /// The row starts with the given height contribution and is marked valid
    /// or invalid per `valid`; ancestor aggregates are restored across all
    /// enclosing trees before the red-black fixup runs.
    pub fn insert_after(
        &mut self,
        tree: TreeId,
        current: Option<NodeId>,
        height: i32,
        valid: bool,
    ) -> NodeId {
        trace!(tree = tree.0, current = ?current, height, valid, "insert_after");

        // Inserting after a node with a right subtree means attaching as the
        // left child of that subtree's leftmost node, which is the inorder
        // successor position.
        let mut as_right = true;
        let mut anchor = current;
        if let Some(mut cur) = current {
            debug_assert!(!cur.is_nil());
            if !self.right(cur).is_nil() {
                cur = self.right(cur);
                while !self.left(cur).is_nil() {
                    cur = self.left(cur);
                }
                as_right = false;
                anchor = Some(cur);
            }
        }

        let node = self.alloc_node(height);
        self.attach_and_fix(tree, node, anchor, as_right, height, valid);
        node
    }

    /// Insert a new row immediately before `current`.
    ///
    /// Mirror image of [`insert_after`](RowForest::insert_after).
    pub fn insert_before(
        &mut self,
        tree: TreeId,
        current: Option<NodeId>,
        height: i32,
        valid: bool,
    ) -> NodeId {
        trace!(tree = tree.0, current = ?current, height, valid, "insert_before");

        let mut as_left = true;
        let mut anchor = current;
        if let Some(mut cur) = current {
            debug_assert!(!cur.is_nil());
            if !self.left(cur).is_nil() {
                cur = self.left(cur);
                while !self.right(cur).is_nil() {
                    cur = self.right(cur);
                }
                as_left = false;
                anchor = Some(cur);
            }
        }

        let node = self.alloc_node(height);
        self.attach_and_fix(tree, node, anchor, !as_left, height, valid);
        node
    }

    /// Shared tail of both insert operations: link the node, bump ancestor
    /// aggregates, apply the validity mark, rebalance.
    fn attach_and_fix(
        &mut self,
        tree: TreeId,
        node: NodeId,
        anchor: Option<NodeId>,
        as_right: bool,
        height: i32,
        valid: bool,
    ) {
        let mut pos = match anchor {
            Some(cur) => {
                self.node_mut(node).parent = cur;
                if as_right {
                    self.node_mut(cur).right = node;
                } else {
                    self.node_mut(cur).left = node;
                }
                Some((tree, cur))
            }
            None => {
                assert!(
                    self.root(tree).is_nil(),
                    "anchorless insert into a non-empty tree"
                );
                self.tree_mut(tree).root = node;
                self.tree_parent(tree)
            }
        };

        while let Some((t, n)) = pos {
            // Counts stay within the tree the row went into; offsets and
            // parity propagate through every enclosing tree.
            if t == tree {
                self.node_mut(n).count += 1;
            }
            let rec = self.node_mut(n);
            rec.parity = !rec.parity;
            rec.offset += height;
            pos = self.step_up(t, n);
        }

        if valid {
            self.mark_valid(tree, node);
        } else {
            self.mark_invalid(tree, node);
        }

        balance::insert_fixup(self, tree, node);
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Remove a row from the tree it lives in.
    ///
    /// If the row has two subtree children its inorder successor is the node
    /// physically spliced out, and the successor's payload (flags, children
    /// link, own height) survives in the row's slot. Ancestor offsets,
    /// parities, and validity bits are restored across all enclosing trees.
    ///
    /// A row that still owns a children tree may only be removed while it
    /// has at most one subtree child; the nested tree is freed with it.
    pub fn remove_node(&mut self, tree: TreeId, node: NodeId) {
        assert!(!node.is_nil(), "remove_node: cannot remove the sentinel");
        trace!(tree = tree.0, node = ?node, "remove_node");

        // Make sure we're deleting a row that actually lives in `tree`.
        #[cfg(debug_assertions)]
        {
            let mut x = node;
            while !self.parent(x).is_nil() {
                x = self.parent(x);
            }
            assert_eq!(
                x,
                self.root(tree),
                "remove_node: node is not in the given tree"
            );
        }

        // y is the node physically spliced out: the row itself, or its
        // inorder successor when both subtree children are real.
        let y = if self.left(node).is_nil() || self.right(node).is_nil() {
            node
        } else {
            debug_assert!(
                self.children(node).is_none(),
                "remove_node: row with a children tree removed while it has two subtree children"
            );
            let mut y = self.right(node);
            while !self.left(y).is_nil() {
                y = self.left(y);
            }
            y
        };

        // Counts adjust only within this tree.
        let mut x = y;
        while !x.is_nil() {
            self.node_mut(x).count -= 1;
            x = self.parent(x);
        }

        // Offsets and parity adjust all the way up through enclosing trees.
        let y_height = self.own_height(y);
        let y_children = self.children(y);
        let removed = y_height + self.children_offset(y);
        let mut pos = Some((tree, y));
        while let Some((t, n)) = pos {
            self.node_mut(n).offset -= removed;
            self.fixup_validation(n);
            self.fixup_parity(n);
            pos = self.step_up(t, n);
        }

        // x is y's only subtree child, or the sentinel. The sentinel's
        // parent link is written here on purpose: the fixup walk below and
        // the red-black delete fixup both restart from it.
        let x = if !self.left(y).is_nil() {
            self.left(y)
        } else {
            self.right(y)
        };
        let y_parent = self.parent(y);
        self.node_mut(x).parent = y_parent;
        if !y_parent.is_nil() {
            if y == self.left(y_parent) {
                self.node_mut(y_parent).left = x;
            } else {
                self.node_mut(y_parent).right = x;
            }
        } else {
            self.tree_mut(tree).root = x;
        }

        // Re-derive validity and parity from x's position through every
        // enclosing tree.
        let mut cur_tree = Some(tree);
        let mut cur = x;
        while let Some(t) = cur_tree {
            if !cur.is_nil() {
                self.fixup_validation(cur);
                self.fixup_parity(cur);
            }
            let p = self.parent(cur);
            if p.is_nil() {
                let rec = self.tree(t);
                cur = rec.parent_node.unwrap_or(NodeId::NIL);
                cur_tree = rec.parent_tree;
            } else {
                cur = p;
            }
        }

        if y != node {
            // The successor's payload moves into the surviving slot; its
            // color stays with the slot.
            let y_flags = self.node(y).flags;
            {
                let rec = self.node_mut(node);
                rec.flags = y_flags;
                rec.children = y_children;
            }
            if let Some(ct) = y_children {
                self.tree_mut(ct).parent_node = Some(node);
            }
            self.fixup_validation(node);
            self.fixup_parity(node);

            // The slot now carries the successor's height: push the
            // difference between the two heights up through every tree.
            let diff = y_height - self.own_height(node);
            let mut pos = Some((tree, node));
            while let Some((t, n)) = pos {
                self.node_mut(n).offset += diff;
                self.fixup_validation(n);
                self.fixup_parity(n);
                pos = self.step_up(t, n);
            }
        } else if let Some(ct) = y_children {
            // The removed row takes its nested tree with it; the weight was
            // already subtracted above.
            self.free_tree(ct);
        }

        // Splicing out a red node cannot break the black-height invariant.
        if self.color(y) == Color::Black {
            balance::remove_fixup(self, tree, x);
        }
        self.release_node(y);
    }

    // -----------------------------------------------------------------------
    // Children trees
    // -----------------------------------------------------------------------

    /// Attach an empty children tree under a row.
    ///
    /// An empty tree carries no weight, so no ancestor adjustment happens
    /// here; the first insertion into the new tree propagates upward across
    /// the boundary.
    pub fn add_children(&mut self, tree: TreeId, node: NodeId) -> TreeId {
        debug_assert!(!node.is_nil());
        assert!(
            self.children(node).is_none(),
            "add_children: row already has a children tree"
        );
        let child = self.alloc_tree(RbTree {
            root: NodeId::NIL,
            parent_tree: Some(tree),
            parent_node: Some(node),
        });
        self.node_mut(node).children = Some(child);
        child
    }

    /// Detach a tree from its owning row and free it, rows, nested trees
    /// and all.
    ///
    /// Every ancestor across enclosing trees first gives up the tree's total
    /// weight and, if the tree held an odd number of rows, has its parity
    /// flipped. Removing the top-level tree empties the forest.
    pub fn remove_tree(&mut self, tree: TreeId) {
        let root = self.root(tree);
        let height = self.offset(root);
        let root_parity = self.parity(root);
        trace!(tree = tree.0, height, "remove_tree");

        // The validation fixup on the owning row must not see the outgoing
        // tree as dirty.
        self.node_mut(root).flags.remove(RowFlags::DESCENDANTS_INVALID);

        let mut pos = self.tree_parent(tree);
        while let Some((t, n)) = pos {
            self.fixup_validation(n);
            self.node_mut(n).offset -= height;
            if root_parity {
                let rec = self.node_mut(n);
                rec.parity = !rec.parity;
            }
            pos = self.step_up(t, n);
        }

        self.free_tree(tree);
    }

    // -----------------------------------------------------------------------
    // Height mutation
    // -----------------------------------------------------------------------

    /// Change a row's own height contribution, pushing the difference up
    /// through every enclosing tree.
    pub fn node_set_height(&mut self, tree: TreeId, node: NodeId, height: i32) {
        debug_assert!(!node.is_nil());
        let diff = height - self.own_height(node);
        if diff == 0 {
            return;
        }
        let mut pos = Some((tree, node));
        while let Some((t, n)) = pos {
            self.node_mut(n).offset += diff;
            pos = self.step_up(t, n);
        }
    }

    // -----------------------------------------------------------------------
    // Reordering
    // -----------------------------------------------------------------------

    /// Rearrange the rows of a tree according to a permutation, where
    /// `new_order[new_pos] = old_pos`.
    ///
    /// The tree shape is untouched: row payloads (children link, state and
    /// validity flags, own height) move between the fixed node positions,
    /// then offsets, parities, and descendant-validity bits are recomputed
    /// bottom-up. `new_order.len()` must equal the tree's row count.
    pub fn reorder(&mut self, tree: TreeId, new_order: &[usize]) {
        assert!(!new_order.is_empty(), "reorder: empty permutation");
        let root = self.root(tree);
        assert_eq!(
            self.count(root) as usize,
            new_order.len(),
            "reorder: permutation length must match the tree's row count"
        );
        debug_assert!(
            {
                let mut seen = vec![false; new_order.len()];
                new_order.iter().all(|&o| {
                    o < seen.len() && !std::mem::replace(&mut seen[o], true)
                })
            },
            "reorder: new_order is not a permutation"
        );
        trace!(tree = tree.0, rows = new_order.len(), "reorder");

        struct Payload {
            children: Option<TreeId>,
            flags: RowFlags,
            height: i32,
        }

        // Pull every row's payload out in order.
        let mut payloads = Vec::with_capacity(new_order.len());
        let mut node = self.first(tree);
        while let Some(n) = node {
            payloads.push(Payload {
                children: self.children(n),
                flags: self.flags(n),
                height: self.own_height(n),
            });
            node = self.next(n);
        }
        debug_assert_eq!(payloads.len(), new_order.len());

        // Walk the same positions again, writing each one's new payload.
        // The own height parks in `offset` until the fixup pass rebuilds
        // the aggregates.
        let mut node = self.first(tree);
        for &old_pos in new_order {
            let n = node.expect("reorder: tree shorter than its recorded count");
            let payload = &payloads[old_pos];
            let children = payload.children;
            let flags = payload.flags;
            let height = payload.height;
            {
                let rec = self.node_mut(n);
                rec.children = children;
                rec.flags = flags;
                rec.offset = height;
            }
            if let Some(ct) = children {
                self.tree_mut(ct).parent_node = Some(n);
            }
            node = self.next(n);
        }

        self.reorder_fixup(root);
    }

    /// Recompute offset, parity, and descendant validity for a whole
    /// subtree, assuming each node's `offset` temporarily holds its own
    /// height. Counts are untouched: the shape didn't change.
    fn reorder_fixup(&mut self, node: NodeId) {
        if node.is_nil() {
            return;
        }
        let mut offset = self.offset(node);
        let mut parity: u32 = 1;

        let left = self.left(node);
        if !left.is_nil() {
            self.reorder_fixup(left);
            offset += self.offset(left);
            parity += u32::from(self.parity(left));
        }
        let right = self.right(node);
        if !right.is_nil() {
            self.reorder_fixup(right);
            offset += self.offset(right);
            parity += u32::from(self.parity(right));
        }
        if let Some(ct) = self.children(node) {
            let croot = self.root(ct);
            offset += self.offset(croot);
            parity += u32::from(self.parity(croot));
        }

        {
            let rec = self.node_mut(node);
            rec.offset = offset;
            rec.parity = parity % 2 == 1;
        }
        self.fixup_validation(node);
    }

    // -----------------------------------------------------------------------
    // Arena plumbing
    // -----------------------------------------------------------------------

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &RbNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut RbNode {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn tree(&self, id: TreeId) -> &RbTree {
        &self.trees[id.index()]
    }

    #[inline]
    pub(crate) fn tree_mut(&mut self, id: TreeId) -> &mut RbTree {
        &mut self.trees[id.index()]
    }

    #[inline]
    pub(crate) fn set_color(&mut self, node: NodeId, color: Color) {
        self.node_mut(node).color = color;
    }

    /// Offset contributed by a node's children tree; zero without one.
    #[inline]
    pub(crate) fn children_offset(&self, node: NodeId) -> i32 {
        match self.node(node).children {
            Some(ct) => self.offset(self.tree(ct).root),
            None => 0,
        }
    }

    /// One link toward the outermost root, crossing a subtree boundary when
    /// the walk runs off the top of a tree.
    pub(crate) fn step_up(&self, tree: TreeId, node: NodeId) -> Option<(TreeId, NodeId)> {
        let p = self.parent(node);
        if !p.is_nil() {
            Some((tree, p))
        } else {
            self.tree_parent(tree)
        }
    }

    fn alloc_node(&mut self, height: i32) -> NodeId {
        let rec = RbNode::new(height);
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id.index()] = rec;
                id
            }
            None => {
                let id = NodeId(u32::try_from(self.nodes.len()).expect("node arena exhausted"));
                self.nodes.push(rec);
                id
            }
        }
    }

    fn release_node(&mut self, id: NodeId) {
        debug_assert!(!id.is_nil());
        self.nodes[id.index()] = RbNode::nil();
        self.free_nodes.push(id);
    }

    fn alloc_tree(&mut self, rec: RbTree) -> TreeId {
        match self.free_trees.pop() {
            Some(id) => {
                self.trees[id.index()] = rec;
                id
            }
            None => {
                let id = TreeId(u32::try_from(self.trees.len()).expect("tree arena exhausted"));
                self.trees.push(rec);
                id
            }
        }
    }

    /// Free a tree and everything it owns, recursively, and detach it from
    /// its owning row. The top-level record is reset rather than released.
    fn free_tree(&mut self, tree: TreeId) {
        let root = self.root(tree);
        self.free_subtree_nodes(root);
        if let Some(pn) = self.tree(tree).parent_node {
            if self.node(pn).children == Some(tree) {
                self.node_mut(pn).children = None;
            }
        }
        if tree == TreeId::TOP {
            self.trees[TreeId::TOP.index()] = RbTree::detached();
        } else {
            self.trees[tree.index()] = RbTree::detached();
            self.free_trees.push(tree);
        }
    }

    fn free_subtree_nodes(&mut self, node: NodeId) {
        if node.is_nil() {
            return;
        }
        let left = self.left(node);
        let right = self.right(node);
        self.free_subtree_nodes(left);
        self.free_subtree_nodes(right);
        if let Some(ct) = self.children(node) {
            self.free_tree(ct);
        }
        self.release_node(node);
    }
}
