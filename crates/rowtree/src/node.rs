//! Node and tree records for the row forest arena.
//!
//! Every tree in a [`RowForest`] shares a single arena of node slots and a
//! single arena of tree records. All structural links (`left`/`right`/
//! `parent` between nodes, `parent_tree`/`parent_node` between trees) are
//! plain indices: copying one never transfers ownership, and the cyclic
//! back-references of a threaded tree cost nothing to hold.
//!
//! [`RowForest`]: crate::RowForest

use std::fmt;

use bitflags::bitflags;

/// Index of a node slot in the forest arena.
///
/// Slot 0 is the shared `nil` sentinel: always black, zero count, zero
/// offset, even parity, empty flags. Every leaf link and every root's parent
/// link point at it, which keeps the rotation and fixup code free of
/// edge-of-tree checks.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The shared sentinel slot.
    pub const NIL: Self = Self(0);

    /// Whether this id is the sentinel.
    #[inline]
    #[must_use]
    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "NodeId(nil)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

/// Index of a tree record in the forest arena.
///
/// Record 0 is the top-level tree, which exists for the whole lifetime of the
/// forest. All other records are children trees hanging under some node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TreeId(pub(crate) u32);

impl TreeId {
    pub(crate) const TOP: Self = Self(0);

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeId({})", self.0)
    }
}

/// Node color for red-black balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

bitflags! {
    /// Per-row flag bits.
    ///
    /// The bits in [`RowFlags::STATE`] belong to the embedding view (whether
    /// a row is expandable, selected, under the pointer, or mid-animation)
    /// and are writable through [`RowForest::set_flags`]. The bits in
    /// [`RowFlags::VALIDITY`] drive lazy re-validation and are maintained
    /// exclusively by the mark/fixup machinery.
    ///
    /// [`RowForest::set_flags`]: crate::RowForest::set_flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RowFlags: u16 {
        /// The row has expandable children.
        const IS_PARENT = 1 << 0;
        /// The row is part of the view selection.
        const IS_SELECTED = 1 << 1;
        /// The pointer is over the row.
        const IS_PRELIT = 1 << 2;
        /// The row is animating toward collapsed.
        const IS_SEMI_COLLAPSED = 1 << 3;
        /// The row is animating toward expanded.
        const IS_SEMI_EXPANDED = 1 << 4;
        /// The row needs re-validation.
        const INVALID = 1 << 5;
        /// A column change invalidated the row's measurements.
        const COLUMN_INVALID = 1 << 6;
        /// Some row in this subtree (nested children included) is invalid.
        const DESCENDANTS_INVALID = 1 << 7;

        /// Bits external callers may set directly.
        const STATE = Self::IS_PARENT.bits()
            | Self::IS_SELECTED.bits()
            | Self::IS_PRELIT.bits()
            | Self::IS_SEMI_COLLAPSED.bits()
            | Self::IS_SEMI_EXPANDED.bits();
        /// Bits owned by the validation machinery.
        const VALIDITY = Self::INVALID.bits()
            | Self::COLUMN_INVALID.bits()
            | Self::DESCENDANTS_INVALID.bits();
    }
}

/// One row slot in the forest arena.
#[derive(Debug, Clone)]
pub(crate) struct RbNode {
    pub left: NodeId,
    pub right: NodeId,
    pub parent: NodeId,
    pub color: Color,
    pub flags: RowFlags,
    /// Mod-2 checksum of the subtree row count, nested children included.
    pub parity: bool,
    /// Rows in this subtree within the owning tree (children trees excluded).
    pub count: u32,
    /// Cumulative height of this subtree, nested children included.
    pub offset: i32,
    /// Nested tree of child rows, if this row has been expanded.
    pub children: Option<TreeId>,
}

impl RbNode {
    /// A freshly inserted row: red, a subtree of one, carrying only its own
    /// height.
    pub(crate) fn new(height: i32) -> Self {
        Self {
            left: NodeId::NIL,
            right: NodeId::NIL,
            parent: NodeId::NIL,
            color: Color::Red,
            flags: RowFlags::empty(),
            parity: true,
            count: 1,
            offset: height,
            children: None,
        }
    }

    /// The sentinel record, also used to scrub freed slots.
    pub(crate) fn nil() -> Self {
        Self {
            left: NodeId::NIL,
            right: NodeId::NIL,
            parent: NodeId::NIL,
            color: Color::Black,
            flags: RowFlags::empty(),
            parity: false,
            count: 0,
            offset: 0,
            children: None,
        }
    }
}

/// One tree record: the top-level sequence or a nested children tree.
#[derive(Debug, Clone)]
pub(crate) struct RbTree {
    pub root: NodeId,
    /// Tree containing the node this tree hangs under; `None` at top level.
    pub parent_tree: Option<TreeId>,
    /// Node whose `children` link owns this tree; `None` at top level.
    pub parent_node: Option<NodeId>,
}

impl RbTree {
    pub(crate) fn detached() -> Self {
        Self {
            root: NodeId::NIL,
            parent_tree: None,
            parent_node: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_id_is_slot_zero() {
        assert!(NodeId::NIL.is_nil());
        assert!(!NodeId(3).is_nil());
        assert_eq!(format!("{:?}", NodeId::NIL), "NodeId(nil)");
        assert_eq!(format!("{:?}", NodeId(7)), "NodeId(7)");
    }

    #[test]
    fn state_and_validity_masks_are_disjoint() {
        assert_eq!(RowFlags::STATE & RowFlags::VALIDITY, RowFlags::empty());
        assert!(RowFlags::STATE.contains(RowFlags::IS_SEMI_EXPANDED));
        assert!(RowFlags::VALIDITY.contains(RowFlags::DESCENDANTS_INVALID));
    }

    #[test]
    fn fresh_node_is_a_red_singleton() {
        let node = RbNode::new(17);
        assert_eq!(node.color, Color::Red);
        assert_eq!(node.count, 1);
        assert_eq!(node.offset, 17);
        assert!(node.parity);
        assert!(node.children.is_none());
    }
}
