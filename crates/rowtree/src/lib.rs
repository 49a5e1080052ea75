//! Augmented red-black trees for ordered, weighted, hierarchical row
//! sequences.
//!
//! This is the data structure behind large virtualized list and tree views:
//! every visible row occupies a node carrying its own height, rows can own
//! nested subtrees of child rows, and three per-node aggregates are kept
//! consistent through every edit:
//!
//! - `count` answers "which row is k-th" in O(log n),
//! - `offset` answers "which row sits at cumulative height h" in
//!   O(log n + d) across d levels of nesting,
//! - `parity` is a mod-2 row-count checksum that crosses nesting boundaries
//!   cheaply, used to spot counting bugs in embedding code.
//!
//! On top of that, rows carry lazily propagated dirty bits
//! ([`RowFlags::INVALID`], [`RowFlags::COLUMN_INVALID`],
//! [`RowFlags::DESCENDANTS_INVALID`]) so a validator can find stale rows
//! without scanning clean subtrees.
//!
//! Everything lives in a single [`RowForest`] arena; nodes and trees are
//! addressed by plain index ids. The forest is single-threaded: one owner
//! drives all mutation, and every public operation restores every invariant
//! before returning.
//!
//! ```
//! use rowtree::RowForest;
//!
//! let mut forest = RowForest::new();
//! let top = forest.top();
//!
//! let first = forest.insert_after(top, None, 24, true);
//! let second = forest.insert_after(top, Some(first), 24, true);
//! assert_eq!(forest.offset(forest.root(top)), 48);
//!
//! // Expand the second row with two children of height 12.
//! let children = forest.add_children(top, second);
//! let child = forest.insert_after(children, None, 12, true);
//! forest.insert_after(children, Some(child), 12, true);
//! assert_eq!(forest.offset(forest.root(top)), 72);
//!
//! // Cumulative offset 60 falls inside the second child row.
//! let (tree, node, within) = forest.find_offset(top, 60).unwrap();
//! assert_eq!(tree, children);
//! assert_eq!(within, 0);
//! assert_eq!(forest.node_find_offset(tree, node), 60);
//! ```

mod balance;
mod check;
mod forest;
mod lookup;
mod node;
mod validate;

#[cfg(test)]
mod invariant_tests;

pub use forest::RowForest;
pub use lookup::TraverseOrder;
pub use node::{Color, NodeId, RowFlags, TreeId};
