//! Tests for M1: Ordered Range Tree
//! Covers TC-1.1, TC-1.2, TC-1.3
//!
//! Run individual tests with:
//! cargo test tc_1_1 -- --nocapture
//! cargo test m1_ordered_tree -- --nocapture

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;
use tessera::{CollectionMode, RangeTree};

mod tc_1_1_splits {
    use super::*;

    #[test]
    fn test_fourth_insert_splits_degree_three_leaf() {
        let mut tree = RangeTree::new(3).unwrap();
        for k in [10, 20, 30] {
            tree.insert(k, k * 100);
        }
        let before = tree.verify().unwrap();
        assert_eq!(before.depth, 1);
        assert_eq!(before.leaf_count, 1);

        tree.insert(40, 4000);
        let after = tree.verify().unwrap();
        println!("after split: {:?}", after);
        assert_eq!(after.depth, 2);
        assert_eq!(after.leaf_count, 2);
        assert_eq!(after.internal_count, 1);

        // Scan crosses the new leaf boundary
        let all: Vec<i32> = tree.collect(10, 40, CollectionMode::ClosedInterval).unwrap().map(|(k, _)| k).collect();
        assert_eq!(all, vec![10, 20, 30, 40]);
        assert_eq!(tree.first_key(), Some(10));
        assert_eq!(tree.last_key(), Some(40));
        assert_eq!(tree.try_get(&30), Some(&3000));
    }

    #[test]
    fn test_shuffled_inserts_keep_invariants() {
        let mut keys: Vec<i64> = (0..2_000).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(7));

        let mut tree = RangeTree::new(5).unwrap();
        for &k in &keys {
            tree.insert(k, ());
        }
        let stats = tree.verify().unwrap();
        println!("2000 shuffled keys, degree 5: {:?}", stats);
        assert_eq!(stats.len, 2_000);
        let ordered: Vec<i64> = tree.iter().map(|(k, _)| k).collect();
        assert_eq!(ordered, (0..2_000).collect::<Vec<_>>());
    }
}

mod tc_1_2_collect {
    use super::*;

    #[test]
    fn test_half_closed_left_fails() {
        let mut tree = RangeTree::new(4).unwrap();
        for k in 0..20 {
            tree.insert(k, k);
        }
        let err = tree.collect(2, 8, CollectionMode::HalfClosedLeftInterval).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_collect_is_lazy_and_restartable() {
        let mut tree = RangeTree::new(3).unwrap();
        for k in (0..100).rev() {
            tree.insert(k, k * 2);
        }
        let scan = tree.collect(40, 49, CollectionMode::ClosedInterval).unwrap();
        let first_three: Vec<_> = scan.clone().take(3).map(|(k, v)| (k, *v)).collect();
        assert_eq!(first_three, vec![(40, 80), (41, 82), (42, 84)]);
        assert_eq!(scan.count(), 10);
    }
}

mod tc_1_3_removal {
    use super::*;

    #[test]
    fn test_drain_to_empty() {
        let mut keys: Vec<i32> = (0..500).collect();
        let mut tree = RangeTree::new(4).unwrap();
        for &k in &keys {
            tree.insert(k, k);
        }
        keys.shuffle(&mut StdRng::seed_from_u64(11));
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(tree.remove(k), Some(*k));
            if i % 50 == 0 {
                tree.verify().unwrap();
            }
        }
        assert!(tree.is_empty());
        assert_eq!(tree.stats().leaf_count, 0);
        assert_eq!(tree.remove(&1), None);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(i16, u8),
    Remove(i16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<i16>(), any::<u8>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => any::<i16>().prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_tree_matches_btreemap(degree in 3usize..9, ops in prop::collection::vec(op(), 0..400)) {
        let mut tree = RangeTree::new(degree).unwrap();
        let mut model = BTreeMap::new();
        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    tree.insert(k, v);
                    model.insert(k, v);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(tree.remove(&k), model.remove(&k));
                }
            }
            prop_assert!(tree.verify().is_ok(), "{:?}", tree.verify());
        }
        let got: Vec<(i16, u8)> = tree.iter().map(|(k, v)| (k, *v)).collect();
        let want: Vec<(i16, u8)> = model.into_iter().collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn prop_closed_interval_matches_range(
        keys in prop::collection::btree_set(-500i32..500, 0..200),
        lo in -600i32..600,
        width in 0i32..300,
    ) {
        let mut tree = RangeTree::new(4).unwrap();
        for &k in &keys {
            tree.insert(k, ());
        }
        let hi = lo + width;
        let got: Vec<i32> = tree.collect(lo, hi, CollectionMode::ClosedInterval).unwrap().map(|(k, _)| k).collect();
        let want: Vec<i32> = keys.range(lo..=hi).copied().collect();
        prop_assert_eq!(got, want);
    }
}
