//! Randomized invariant tests.
//!
//! Every sequence of edits must leave the forest satisfying all of its
//! structural invariants, and the positional lookups must agree with a flat
//! reference model maintained alongside the real structure:
//!
//! 1. Red-black coloring (root black, no red-red, equal black heights)
//! 2. `count` aggregates per tree
//! 3. `offset` aggregates across nested children trees
//! 4. `parity` checksums across nested children trees
//! 5. The `DESCENDANTS_INVALID` aggregate
//! 6. Round-trips between rows and their count/offset coordinates

mod tests {
    use proptest::prelude::*;

    use crate::{NodeId, RowForest, TreeId};

    #[derive(Debug, Clone)]
    enum Op {
        InsertAfter(usize, i32),
        InsertBefore(usize, i32),
        Remove(usize),
        SetHeight(usize, i32),
        MarkInvalid(usize),
        MarkValid(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0_usize..256, 1..=20_i32).prop_map(|(p, h)| Op::InsertAfter(p, h)),
            (0_usize..256, 1..=20_i32).prop_map(|(p, h)| Op::InsertBefore(p, h)),
            (0_usize..256).prop_map(Op::Remove),
            (0_usize..256, 1..=20_i32).prop_map(|(p, h)| Op::SetHeight(p, h)),
            (0_usize..256).prop_map(Op::MarkInvalid),
            (0_usize..256).prop_map(Op::MarkValid),
        ]
    }

    /// Flat reference model: row ids and heights in logical order.
    struct Model {
        rows: Vec<NodeId>,
        heights: Vec<i32>,
    }

    impl Model {
        fn apply(&mut self, forest: &mut RowForest, top: TreeId, op: &Op) {
            match *op {
                Op::InsertAfter(seed, height) => {
                    if self.rows.is_empty() {
                        let node = forest.insert_after(top, None, height, true);
                        self.rows.push(node);
                        self.heights.push(height);
                    } else {
                        let pos = seed % self.rows.len();
                        let node = forest.insert_after(top, Some(self.rows[pos]), height, true);
                        self.rows.insert(pos + 1, node);
                        self.heights.insert(pos + 1, height);
                    }
                }
                Op::InsertBefore(seed, height) => {
                    if self.rows.is_empty() {
                        let node = forest.insert_before(top, None, height, true);
                        self.rows.push(node);
                        self.heights.push(height);
                    } else {
                        let pos = seed % self.rows.len();
                        let node = forest.insert_before(top, Some(self.rows[pos]), height, true);
                        self.rows.insert(pos, node);
                        self.heights.insert(pos, height);
                    }
                }
                Op::Remove(seed) => {
                    if self.rows.is_empty() {
                        return;
                    }
                    let pos = seed % self.rows.len();
                    let node = self.rows[pos];
                    // A two-child removal splices the successor and moves
                    // its payload into this slot, so the successor's id
                    // goes stale and this id takes over its row.
                    let spliced_successor =
                        !forest.left(node).is_nil() && !forest.right(node).is_nil();
                    forest.remove_node(top, node);
                    self.heights.remove(pos);
                    self.rows.remove(pos);
                    if spliced_successor {
                        self.rows[pos] = node;
                    }
                }
                Op::SetHeight(seed, height) => {
                    if self.rows.is_empty() {
                        return;
                    }
                    let pos = seed % self.rows.len();
                    forest.node_set_height(top, self.rows[pos], height);
                    self.heights[pos] = height;
                }
                Op::MarkInvalid(seed) => {
                    if self.rows.is_empty() {
                        return;
                    }
                    let pos = seed % self.rows.len();
                    forest.mark_invalid(top, self.rows[pos]);
                }
                Op::MarkValid(seed) => {
                    if self.rows.is_empty() {
                        return;
                    }
                    let pos = seed % self.rows.len();
                    forest.mark_valid(top, self.rows[pos]);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_edits_preserve_every_invariant(ops in prop::collection::vec(op_strategy(), 1..80)) {
            let mut forest = RowForest::new();
            let top = forest.top();
            let mut model = Model { rows: Vec::new(), heights: Vec::new() };

            for op in &ops {
                model.apply(&mut forest, top, op);
                forest.check_consistency(top);
            }

            // Logical order survives.
            let mut walked = Vec::new();
            let mut node = forest.first(top);
            while let Some(n) = node {
                walked.push(n);
                node = forest.next(n);
            }
            prop_assert_eq!(&walked, &model.rows);

            // Heights and the offset aggregate agree with the model.
            let total: i32 = model.heights.iter().sum();
            prop_assert_eq!(forest.offset(forest.root(top)), total);
            for (row, height) in model.rows.iter().zip(&model.heights) {
                prop_assert_eq!(forest.own_height(*row), *height);
            }

            // Count round-trip: the k-th row by count is the k-th by order.
            prop_assert_eq!(forest.find_count(top, 0), None);
            for (index, row) in model.rows.iter().enumerate() {
                let found = forest.find_count(top, u32::try_from(index).unwrap() + 1);
                prop_assert_eq!(found, Some(*row));
            }
            let past_end = u32::try_from(model.rows.len()).unwrap() + 1;
            prop_assert_eq!(forest.find_count(top, past_end), None);

            // Offset round-trip: each row is found at its own start offset.
            let mut start = 0;
            for (row, height) in model.rows.iter().zip(&model.heights) {
                prop_assert_eq!(forest.node_find_offset(top, *row), start);
                prop_assert_eq!(forest.find_offset(top, start), Some((top, *row, 0)));
                start += height;
            }
            prop_assert_eq!(forest.find_offset(top, total), None);
        }
    }

    /// Layout of a nested hierarchy: top rows, each optionally
    /// carrying one level of child rows.
    fn hierarchy_strategy() -> impl Strategy<Value = Vec<(i32, Option<Vec<i32>>)>> {
        prop::collection::vec(
            (
                1..=10_i32,
                prop::option::of(prop::collection::vec(1..=10_i32, 1..5)),
            ),
            1..12,
        )
    }

    proptest! {
        #[test]
        fn prop_nested_lookups_agree_with_display_order(layout in hierarchy_strategy()) {
            let mut forest = RowForest::new();
            let top = forest.top();

            // Build the hierarchy and a flat display-order model.
            let mut display: Vec<(TreeId, NodeId, i32)> = Vec::new();
            let mut child_trees = Vec::new();
            let mut last = None;
            for (height, children) in &layout {
                let row = forest.insert_after(top, last, *height, true);
                last = Some(row);
                display.push((top, row, *height));
                if let Some(child_heights) = children {
                    let child_tree = forest.add_children(top, row);
                    child_trees.push(child_tree);
                    let mut child_last = None;
                    for child_height in child_heights {
                        let child =
                            forest.insert_after(child_tree, child_last, *child_height, true);
                        child_last = Some(child);
                        display.push((child_tree, child, *child_height));
                    }
                }
            }
            forest.check_consistency(top);

            // next_full visits every row in display order.
            let mut walk = vec![(display[0].0, display[0].1)];
            let mut cur = walk[0];
            while let Some(step) = forest.next_full(cur.0, cur.1) {
                walk.push(step);
                cur = step;
            }
            let expected: Vec<(TreeId, NodeId)> =
                display.iter().map(|&(t, n, _)| (t, n)).collect();
            prop_assert_eq!(&walk, &expected);

            // Offset and parity coordinates match the flat model.
            let mut start = 0;
            for (index, &(tree, node, height)) in display.iter().enumerate() {
                prop_assert_eq!(forest.node_find_offset(tree, node), start);
                prop_assert_eq!(forest.find_offset(top, start), Some((tree, node, 0)));
                prop_assert_eq!(forest.node_find_parity(tree, node), index % 2 == 1);
                start += height;
            }
            prop_assert_eq!(forest.offset(forest.root(top)), start);

            // Dropping every child tree hands the weight back.
            for child_tree in child_trees {
                forest.remove_tree(child_tree);
                forest.check_consistency(top);
            }
            let top_total: i32 = layout.iter().map(|&(h, _)| h).sum();
            prop_assert_eq!(forest.offset(forest.root(top)), top_total);
        }
    }

    fn heights_and_permutation() -> impl Strategy<Value = (Vec<i32>, Vec<usize>)> {
        prop::collection::vec(1..=10_i32, 1..20).prop_flat_map(|heights| {
            let indices: Vec<usize> = (0..heights.len()).collect();
            (Just(heights), Just(indices).prop_shuffle())
        })
    }

    proptest! {
        #[test]
        fn prop_reorder_matches_the_permuted_model((heights, new_order) in heights_and_permutation()) {
            let mut forest = RowForest::new();
            let top = forest.top();
            let mut last = None;
            for height in &heights {
                last = Some(forest.insert_after(top, last, *height, true));
            }

            forest.reorder(top, &new_order);
            forest.check_consistency(top);

            let expected: Vec<i32> = new_order.iter().map(|&old| heights[old]).collect();
            let mut walked = Vec::new();
            let mut node = forest.first(top);
            while let Some(n) = node {
                walked.push(forest.own_height(n));
                node = forest.next(n);
            }
            prop_assert_eq!(walked, expected);
            prop_assert_eq!(
                forest.offset(forest.root(top)),
                heights.iter().sum::<i32>()
            );
        }
    }
}
