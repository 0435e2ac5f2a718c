//! Lazy ascending scans over the range tree.

use super::{Node, NodeId, RangeTree};
use crate::error::{Error, Result};
use std::fmt::Debug;

/// Interval shapes a range scan could ask for. Only `ClosedInterval` is
/// implemented; the rest are rejected rather than approximated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// `[left, right]`
    ClosedInterval,
    /// `[left, right)`
    HalfClosedLeftInterval,
    /// `(left, right]`
    HalfClosedRightInterval,
    /// `(left, right)`
    OpenInterval,
    UnboundedClosedInterval,
    UnboundedHalfClosedLeftInterval,
    UnboundedHalfClosedRightInterval,
    UnboundedOpenInterval,
}

impl CollectionMode {
    /// Wire tag used inside unary range predicates.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => CollectionMode::ClosedInterval,
            2 => CollectionMode::HalfClosedLeftInterval,
            3 => CollectionMode::HalfClosedRightInterval,
            4 => CollectionMode::OpenInterval,
            5 => CollectionMode::UnboundedClosedInterval,
            6 => CollectionMode::UnboundedHalfClosedLeftInterval,
            7 => CollectionMode::UnboundedHalfClosedRightInterval,
            8 => CollectionMode::UnboundedOpenInterval,
            _ => return None,
        })
    }

    /// Fails with `UnsupportedOperation` for every mode but `ClosedInterval`.
    pub fn ensure_implemented(self) -> Result<()> {
        match self {
            CollectionMode::ClosedInterval => Ok(()),
            other => Err(Error::unsupported(format!("collection mode {other:?} is not implemented"))),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            CollectionMode::ClosedInterval => 1,
            CollectionMode::HalfClosedLeftInterval => 2,
            CollectionMode::HalfClosedRightInterval => 3,
            CollectionMode::OpenInterval => 4,
            CollectionMode::UnboundedClosedInterval => 5,
            CollectionMode::UnboundedHalfClosedLeftInterval => 6,
            CollectionMode::UnboundedHalfClosedRightInterval => 7,
            CollectionMode::UnboundedOpenInterval => 8,
        }
    }
}

/// Ascending iterator over `(key, &value)`. Cloning yields an independent
/// cursor at the same position, so a fresh clone taken before iteration
/// replays the whole sequence.
pub struct RangeIter<'a, K, V> {
    tree: &'a RangeTree<K, V>,
    leaf: Option<NodeId>,
    position: usize,
    upper: Option<K>,
}

impl<'a, K: Ord + Copy + Debug, V> RangeIter<'a, K, V> {
    pub(super) fn closed(tree: &'a RangeTree<K, V>, left: K, right: K) -> Self {
        let (leaf, position) = match tree.find_leaf(&left) {
            Some(id) if left <= right => match tree.node(id) {
                Node::Leaf(leaf) => (Some(id), leaf.lower_bound(&left)),
                Node::Internal(_) => (None, 0),
            },
            _ => (None, 0),
        };
        Self { tree, leaf, position, upper: Some(right) }
    }

    pub(super) fn full(tree: &'a RangeTree<K, V>) -> Self {
        let leaf = tree.root().map(|root| tree.leftmost_leaf(root));
        Self { tree, leaf, position: 0, upper: None }
    }
}

impl<K: Debug, V> Debug for RangeIter<'_, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("leaf", &self.leaf)
            .field("position", &self.position)
            .field("upper", &self.upper)
            .finish()
    }
}

impl<K, V> Clone for RangeIter<'_, K, V>
where
    K: Copy,
{
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            leaf: self.leaf,
            position: self.position,
            upper: self.upper,
        }
    }
}

impl<'a, K: Ord + Copy + Debug, V> Iterator for RangeIter<'a, K, V> {
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.leaf?;
            let Node::Leaf(leaf) = self.tree.node(id) else {
                self.leaf = None;
                return None;
            };
            if let Some((key, value)) = leaf.pairs.get(self.position) {
                if self.upper.is_some_and(|upper| *key > upper) {
                    self.leaf = None;
                    return None;
                }
                self.position += 1;
                return Some((*key, value));
            }
            self.leaf = self.tree.next_leaf(id);
            self.position = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(degree: usize, keys: impl IntoIterator<Item = i32>) -> RangeTree<i32, i32> {
        let mut tree = RangeTree::new(degree).unwrap();
        for k in keys {
            tree.insert(k, k * 2);
        }
        tree
    }

    #[test]
    fn test_closed_interval_spans_leaves() {
        let tree = tree_of(3, (0..100).map(|k| k * 3));
        let got: Vec<i32> = tree
            .collect(10, 40, CollectionMode::ClosedInterval)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(got, vec![12, 15, 18, 21, 24, 27, 30, 33, 36, 39]);
    }

    #[test]
    fn test_closed_interval_is_inclusive() {
        let tree = tree_of(4, 0..20);
        let got: Vec<_> = tree
            .collect(5, 8, CollectionMode::ClosedInterval)
            .unwrap()
            .collect();
        assert_eq!(got, vec![(5, &10), (6, &12), (7, &14), (8, &16)]);
    }

    #[test]
    fn test_inverted_and_outside_bounds() {
        let tree = tree_of(4, 0..20);
        assert_eq!(tree.collect(8, 5, CollectionMode::ClosedInterval).unwrap().count(), 0);
        assert_eq!(tree.collect(50, 60, CollectionMode::ClosedInterval).unwrap().count(), 0);
        assert_eq!(tree.collect(-10, -1, CollectionMode::ClosedInterval).unwrap().count(), 0);
        assert_eq!(tree.collect(-10, 100, CollectionMode::ClosedInterval).unwrap().count(), 20);
    }

    #[test]
    fn test_other_modes_fail_fast() {
        let tree = tree_of(4, 0..20);
        for tag in 2..=8 {
            let mode = CollectionMode::from_tag(tag).unwrap();
            let err = tree.collect(0, 10, mode).unwrap_err();
            assert!(err.is_unsupported(), "{mode:?} gave {err}");
        }
    }

    #[test]
    fn test_debug_shows_cursor() {
        let tree = tree_of(4, 0..20);
        let scan = tree.collect(5, 8, CollectionMode::ClosedInterval).unwrap();
        let shown = format!("{scan:?}");
        assert!(shown.starts_with("RangeIter"));
        assert!(shown.contains("upper: Some(8)"));
    }

    #[test]
    fn test_clone_restarts_sequence() {
        let tree = tree_of(3, 0..30);
        let scan = tree.collect(3, 9, CollectionMode::ClosedInterval).unwrap();
        let first: Vec<_> = scan.clone().map(|(k, _)| k).collect();
        let second: Vec<_> = scan.map(|(k, _)| k).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn test_empty_tree() {
        let tree: RangeTree<i32, i32> = RangeTree::new(3).unwrap();
        assert_eq!(tree.iter().count(), 0);
        assert_eq!(tree.collect(0, 10, CollectionMode::ClosedInterval).unwrap().count(), 0);
    }

    #[test]
    fn test_mode_tags() {
        for tag in 1..=8 {
            assert_eq!(CollectionMode::from_tag(tag).unwrap().tag(), tag);
        }
        assert!(CollectionMode::from_tag(0).is_none());
        assert!(CollectionMode::from_tag(9).is_none());
    }
}
