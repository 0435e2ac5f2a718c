//! Leaf and internal nodes of the range tree.
//!
//! Nodes never touch the arena. They report what happened (size change,
//! split, primary key change) and `RangeTree` does the linking.

use super::NodeId;
use std::cmp::Ordering;

/// Result of inserting into a single node.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome<S = NodeId> {
    /// Key already present, value overwritten in place
    NoSizeChange,
    /// Key added, node still within degree
    SizeChanged,
    /// Key added and the node split; carries the new right sibling
    NodeSplit(S),
}

/// Result of removing from a single node.
#[derive(Debug, PartialEq, Eq)]
pub enum RemoveOutcome<V> {
    /// Key absent
    NoSizeChange,
    /// Key removed, node still holds keys
    SizeChanged(V),
    /// Key removed and the node has no keys left
    Empty(V),
}

/// Exact-match search. Returns the index of `target` or `None`.
pub(crate) fn binary_search<T, K: Ord>(items: &[T], target: &K, key: impl Fn(&T) -> &K) -> Option<usize> {
    let mut left = 0usize;
    let mut right = items.len();
    while left < right {
        let mid = left + (right - left) / 2;
        match key(&items[mid]).cmp(target) {
            Ordering::Equal => return Some(mid),
            Ordering::Less => left = mid + 1,
            Ordering::Greater => right = mid,
        }
    }
    None
}

/// Nearest search: `(index, true)` on an exact hit, otherwise `(index, false)`
/// where `index` is the smallest element greater than `target`, or `None`
/// when every element is smaller.
pub(crate) fn nearest_binary_search<T, K: Ord>(
    items: &[T],
    target: &K,
    key: impl Fn(&T) -> &K,
) -> (Option<usize>, bool) {
    let mut left = 0usize;
    let mut right = items.len();
    let mut greater = None;
    while left < right {
        let mid = left + (right - left) / 2;
        match key(&items[mid]).cmp(target) {
            Ordering::Equal => return (Some(mid), true),
            Ordering::Less => left = mid + 1,
            Ordering::Greater => {
                greater = Some(mid);
                right = mid;
            }
        }
    }
    (greater, false)
}

/// Sorted, gap-free run of `(key, value)` pairs.
#[derive(Debug, PartialEq)]
pub struct LeafNode<K, V> {
    pub(crate) pairs: Vec<(K, V)>,
    pub(crate) parent: Option<NodeId>,
    degree: usize,
}

impl<K: Ord + Copy, V> LeafNode<K, V> {
    pub fn new(degree: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(degree + 1),
            parent: None,
            degree,
        }
    }

    pub fn with_pair(degree: usize, key: K, value: V) -> Self {
        let mut node = Self::new(degree);
        node.pairs.push((key, value));
        node
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.pairs.len() >= self.degree
    }

    #[inline]
    pub fn is_overweight(&self) -> bool {
        self.pairs.len() > self.degree
    }

    /// Key of the first pair; `None` only for an emptied leaf.
    #[inline]
    pub fn primary_key(&self) -> Option<K> {
        self.pairs.first().map(|(k, _)| *k)
    }

    #[inline]
    fn split_size(&self) -> usize {
        self.degree / 2
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        binary_search(&self.pairs, key, |(k, _)| k)
    }

    /// Position of the first pair with key >= `key` (may equal `key_count`).
    pub fn lower_bound(&self, key: &K) -> usize {
        match nearest_binary_search(&self.pairs, key, |(k, _)| k) {
            (Some(index), _) => index,
            (None, _) => self.pairs.len(),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index_of(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index_of(key).map(|i| &self.pairs[i].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.index_of(key).map(move |i| &mut self.pairs[i].1)
    }

    /// The new node always sits to the right and takes the tail.
    fn split(&mut self) -> Self {
        let at = self.pairs.len() - self.split_size();
        let mut sibling = Self::new(self.degree);
        sibling.pairs.extend(self.pairs.drain(at..));
        sibling.parent = self.parent;
        sibling
    }

    pub fn insert(&mut self, key: K, value: V) -> InsertOutcome<Self> {
        let index = match nearest_binary_search(&self.pairs, &key, |(k, _)| k) {
            (Some(index), true) => {
                self.pairs[index].1 = value;
                return InsertOutcome::NoSizeChange;
            }
            (Some(index), false) => index,
            (None, _) => self.pairs.len(),
        };
        self.pairs.insert(index, (key, value));
        if !self.is_overweight() {
            return InsertOutcome::SizeChanged;
        }
        InsertOutcome::NodeSplit(self.split())
    }

    pub fn remove(&mut self, key: &K) -> RemoveOutcome<V> {
        let Some(index) = self.index_of(key) else {
            return RemoveOutcome::NoSizeChange;
        };
        let (_, value) = self.pairs.remove(index);
        if self.pairs.is_empty() {
            RemoveOutcome::Empty(value)
        } else {
            RemoveOutcome::SizeChanged(value)
        }
    }

    pub fn can_merge_with(&self, other: &Self) -> bool {
        self.pairs.len() + other.pairs.len() <= self.degree
    }

    /// Absorb `left`, which holds strictly smaller keys, in front of our pairs.
    pub fn left_merge_with(&mut self, left: Self) {
        let mut merged = left.pairs;
        merged.append(&mut self.pairs);
        self.pairs = merged;
    }

    /// Absorb `right`, which holds strictly greater keys, after our pairs.
    pub fn right_merge_with(&mut self, mut right: Self) {
        self.pairs.append(&mut right.pairs);
    }
}

/// Sorted routing entries `(primary key of child, child id)`.
#[derive(Debug, PartialEq)]
pub struct InternalNode<K> {
    pub(crate) children: Vec<(K, NodeId)>,
    pub(crate) parent: Option<NodeId>,
    degree: usize,
}

impl<K: Ord + Copy> InternalNode<K> {
    pub fn new(degree: usize) -> Self {
        Self {
            children: Vec::with_capacity(degree + 1),
            parent: None,
            degree,
        }
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.children.len() >= self.degree
    }

    #[inline]
    pub fn is_overweight(&self) -> bool {
        self.children.len() > self.degree
    }

    #[inline]
    pub fn primary_key(&self) -> Option<K> {
        self.children.first().map(|(k, _)| *k)
    }

    /// Child whose key range may hold `key`.
    pub fn route(&self, key: &K) -> NodeId {
        let index = match nearest_binary_search(&self.children, key, |(k, _)| k) {
            (Some(index), true) => index,
            (Some(index), false) => index.saturating_sub(1),
            (None, _) => self.children.len() - 1,
        };
        self.children[index].1
    }

    pub fn position_of(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&(_, id)| id == child)
    }

    /// Link `child` directly after `after`.
    pub fn insert_after(&mut self, after: NodeId, key: K, child: NodeId) {
        let index = self.position_of(after).map_or(self.children.len(), |i| i + 1);
        self.children.insert(index, (key, child));
    }

    pub fn split(&mut self) -> Self {
        let at = self.children.len() - self.degree / 2;
        let mut sibling = Self::new(self.degree);
        sibling.children.extend(self.children.drain(at..));
        sibling.parent = self.parent;
        sibling
    }

    pub fn can_merge_with(&self, other: &Self) -> bool {
        self.children.len() + other.children.len() <= self.degree
    }

    pub fn left_merge_with(&mut self, left: Self) {
        let mut merged = left.children;
        merged.append(&mut self.children);
        self.children = merged;
    }

    pub fn right_merge_with(&mut self, mut right: Self) {
        self.children.append(&mut right.children);
    }
}

/// Arena slot payload.
#[derive(Debug)]
pub enum Node<K, V> {
    Leaf(LeafNode<K, V>),
    Internal(InternalNode<K>),
}

impl<K: Ord + Copy, V> Node<K, V> {
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Internal(internal) => internal.parent,
        }
    }

    #[inline]
    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }

    #[inline]
    pub fn primary_key(&self) -> Option<K> {
        match self {
            Node::Leaf(leaf) => leaf.primary_key(),
            Node::Internal(internal) => internal.primary_key(),
        }
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.key_count(),
            Node::Internal(internal) => internal.key_count(),
        }
    }

    pub fn can_merge_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Leaf(a), Node::Leaf(b)) => a.can_merge_with(b),
            (Node::Internal(a), Node::Internal(b)) => a.can_merge_with(b),
            _ => false,
        }
    }
}
