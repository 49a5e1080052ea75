//! Structural self-checks and a debug dump.
//!
//! [`RowForest::check_consistency`] verifies every invariant the forest
//! maintains (link integrity, red-black coloring, counts, parities, and
//! the descendant-validity aggregate) over the whole nested hierarchy,
//! panicking with a description of the first violation. It is meant for
//! tests and debugging sessions, not hot paths: every check is a full
//! traversal.

use std::fmt::Write;

use crate::forest::RowForest;
use crate::node::{Color, NodeId, RowFlags, TreeId};

impl RowForest {
    /// Verify the whole hierarchy containing `tree`, starting from the
    /// outermost tree. Panics on the first violated invariant.
    pub fn check_consistency(&self, tree: TreeId) {
        let mut outer = tree;
        while let Some(pt) = self.tree(outer).parent_tree {
            outer = pt;
        }

        let nil = self.node(NodeId::NIL);
        assert_eq!(nil.color, Color::Black, "sentinel must stay black");
        assert!(nil.flags.is_empty(), "sentinel must carry no flags");
        assert_eq!(nil.count, 0, "sentinel count must stay zero");
        assert_eq!(nil.offset, 0, "sentinel offset must stay zero");
        assert!(!nil.parity, "sentinel parity must stay even");

        self.check_tree(outer);
    }

    fn check_tree(&self, tree: TreeId) {
        let root = self.root(tree);
        if root.is_nil() {
            return;
        }
        assert!(
            self.parent(root).is_nil(),
            "root of {tree:?} has a parent link"
        );
        assert_eq!(
            self.color(root),
            Color::Black,
            "root of {tree:?} is not black"
        );
        self.check_links(tree, root);
        self.check_count(root);
        self.check_parity(root);
        self.check_colors(root);
        self.check_dirty(root, self.flags(root).contains(RowFlags::DESCENDANTS_INVALID));
    }

    /// Parent/child links agree, and children trees point back at their
    /// owning row.
    fn check_links(&self, tree: TreeId, node: NodeId) {
        let left = self.left(node);
        if !left.is_nil() {
            assert_eq!(self.parent(left), node, "broken left parent link");
            self.check_links(tree, left);
        }
        let right = self.right(node);
        if !right.is_nil() {
            assert_eq!(self.parent(right), node, "broken right parent link");
            self.check_links(tree, right);
        }
        if let Some(ct) = self.children(node) {
            assert_eq!(
                self.tree(ct).parent_tree,
                Some(tree),
                "children tree {ct:?} disowns its tree"
            );
            assert_eq!(
                self.tree(ct).parent_node,
                Some(node),
                "children tree {ct:?} disowns its row"
            );
            self.check_tree(ct);
        }
    }

    /// Every node's count is one more than its subtree children's.
    fn check_count(&self, node: NodeId) -> u32 {
        if node.is_nil() {
            return 0;
        }
        let total = 1 + self.check_count(self.left(node)) + self.check_count(self.right(node));
        assert_eq!(self.count(node), total, "count mismatch at {node:?}");
        total
    }

    /// Every node's parity matches the mod-2 row count of its subtree,
    /// nested children included.
    fn check_parity(&self, node: NodeId) -> u32 {
        if node.is_nil() {
            return 0;
        }
        let nested = match self.children(node) {
            Some(ct) => self.check_parity(self.root(ct)),
            None => 0,
        };
        let total =
            (1 + self.check_parity(self.left(node)) + self.check_parity(self.right(node)) + nested)
                % 2;
        assert_eq!(
            u32::from(self.parity(node)),
            total,
            "parity mismatch at {node:?}"
        );
        total
    }

    /// Red nodes have black children and every root-to-leaf path carries
    /// the same number of black nodes. Returns the subtree's black height.
    fn check_colors(&self, node: NodeId) -> u32 {
        if node.is_nil() {
            return 1;
        }
        let left = self.left(node);
        let right = self.right(node);
        if self.color(node) == Color::Red {
            assert_eq!(self.color(left), Color::Black, "red-red at {node:?}");
            assert_eq!(self.color(right), Color::Black, "red-red at {node:?}");
        }
        let bh_left = self.check_colors(left);
        let bh_right = self.check_colors(right);
        assert_eq!(bh_left, bh_right, "black-height mismatch at {node:?}");
        bh_left + u32::from(self.color(node) == Color::Black)
    }

    /// The `DESCENDANTS_INVALID` aggregate is set exactly where a dirty row
    /// exists at or below a node.
    fn check_dirty(&self, node: NodeId, expected_dirty: bool) {
        let own_dirty = self
            .flags(node)
            .intersects(RowFlags::INVALID | RowFlags::COLUMN_INVALID);
        let left = self.left(node);
        let right = self.right(node);
        let left_dirty =
            !left.is_nil() && self.flags(left).contains(RowFlags::DESCENDANTS_INVALID);
        let right_dirty =
            !right.is_nil() && self.flags(right).contains(RowFlags::DESCENDANTS_INVALID);
        let children_dirty = self.children(node).is_some_and(|ct| {
            self.flags(self.root(ct)).contains(RowFlags::DESCENDANTS_INVALID)
        });

        if expected_dirty {
            assert!(
                own_dirty || left_dirty || right_dirty || children_dirty,
                "{node:?} flagged dirty with nothing dirty below"
            );
        } else {
            assert!(!own_dirty, "{node:?} dirty but not flagged in aggregate");
            assert!(!left_dirty, "left of {node:?} dirty but aggregate clear");
            assert!(!right_dirty, "right of {node:?} dirty but aggregate clear");
            assert!(
                !children_dirty,
                "children of {node:?} dirty but aggregate clear"
            );
        }

        if !left.is_nil() {
            self.check_dirty(left, self.flags(left).contains(RowFlags::DESCENDANTS_INVALID));
        }
        if !right.is_nil() {
            self.check_dirty(
                right,
                self.flags(right).contains(RowFlags::DESCENDANTS_INVALID),
            );
        }
        if let Some(ct) = self.children(node) {
            let croot = self.root(ct);
            if !croot.is_nil() {
                self.check_dirty(
                    croot,
                    self.flags(croot).contains(RowFlags::DESCENDANTS_INVALID),
                );
            }
        }
    }

    /// Render an indented snapshot of a tree (colors, aggregates, validity
    /// bits, nested children trees) for debugging sessions and test
    /// failure output.
    #[must_use]
    pub fn dump(&self, tree: TreeId) -> String {
        let mut out = String::new();
        let root = self.root(tree);
        if root.is_nil() {
            out.push_str("empty tree\n");
        } else {
            self.dump_node(root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, node: NodeId, depth: usize, out: &mut String) {
        let _ = writeln!(
            out,
            "{:indent$}{node:?} {color:?} offset={offset} own={own} count={count} parity={parity} flags={flags:?}",
            "",
            indent = depth * 2,
            color = self.color(node),
            offset = self.offset(node),
            own = self.own_height(node),
            count = self.count(node),
            parity = u8::from(self.parity(node)),
            flags = self.flags(node),
        );
        if let Some(ct) = self.children(node) {
            let _ = writeln!(out, "{:indent$}children {ct:?}:", "", indent = depth * 2 + 2);
            let croot = self.root(ct);
            if !croot.is_nil() {
                self.dump_node(croot, depth + 2, out);
            }
        }
        if !self.left(node).is_nil() {
            self.dump_node(self.left(node), depth + 1, out);
        }
        if !self.right(node).is_nil() {
            self.dump_node(self.right(node), depth + 1, out);
        }
    }
}
