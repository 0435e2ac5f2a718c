//! Ordered range tree
//!
//! In-memory B-tree over a totally ordered key.
//!
//! Design:
//! - Nodes live in an arena (`Vec<Option<Node>>` + free list), addressed by `NodeId`
//! - Each node keeps its parent's id; children are owned by the arena slot only
//! - A node's primary key is the key of its first pair/child and is pushed up
//!   the parent chain whenever it changes
//! - Nodes split as soon as they exceed `degree` keys, the new node goes right
//!   and takes the last `degree / 2` keys
//! - Removal unlinks emptied nodes and merges siblings whose combined size fits

mod iter;
mod node;

pub use iter::{CollectionMode, RangeIter};
pub use node::{InsertOutcome, InternalNode, LeafNode, Node, RemoveOutcome};

use crate::error::{Error, Result};
use std::fmt::Debug;

/// Smallest supported degree.
pub const MIN_DEGREE: usize = 3;

/// Stable arena address of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Shape summary, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub depth: usize,
    pub leaf_count: usize,
    pub internal_count: usize,
    pub len: usize,
}

pub struct RangeTree<K, V> {
    degree: usize,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    root: Option<NodeId>,
    len: usize,
}

impl<K: Ord + Copy + Debug, V> RangeTree<K, V> {
    pub fn new(degree: usize) -> Result<Self> {
        if degree < MIN_DEGREE {
            return Err(Error::config(format!(
                "tree degree must be at least {MIN_DEGREE}, got {degree}"
            )));
        }
        Ok(Self {
            degree,
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        })
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    // --- Arena ---

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Node<K, V>> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(node)
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node<K, V> {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => unreachable!("dangling node id {id:?}"),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => unreachable!("dangling node id {id:?}"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode<K> {
        match self.node_mut(id) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => unreachable!("node {id:?} is not internal"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode<K, V> {
        match self.node_mut(id) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("node {id:?} is not a leaf"),
        }
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    // --- Navigation ---

    pub(crate) fn find_leaf(&self, key: &K) -> Option<NodeId> {
        let mut id = self.root?;
        loop {
            match self.node(id) {
                Node::Leaf(_) => return Some(id),
                Node::Internal(internal) => id = internal.route(key),
            }
        }
    }

    pub(crate) fn leftmost_leaf(&self, from: NodeId) -> NodeId {
        let mut id = from;
        loop {
            match self.node(id) {
                Node::Leaf(_) => return id,
                Node::Internal(internal) => id = internal.children[0].1,
            }
        }
    }

    /// Leaf that follows `leaf` in key order, walking parent ids.
    pub(crate) fn next_leaf(&self, leaf: NodeId) -> Option<NodeId> {
        let mut id = leaf;
        loop {
            let parent = self.node(id).parent()?;
            let Node::Internal(internal) = self.node(parent) else {
                unreachable!("parent {parent:?} is a leaf");
            };
            let position = internal.position_of(id)?;
            if let Some(&(_, sibling)) = internal.children.get(position + 1) {
                return Some(self.leftmost_leaf(sibling));
            }
            id = parent;
        }
    }

    // --- Lookup ---

    pub fn contains(&self, key: &K) -> bool {
        self.try_get(key).is_some()
    }

    pub fn try_get(&self, key: &K) -> Option<&V> {
        let leaf = self.find_leaf(key)?;
        match self.node(leaf) {
            Node::Leaf(leaf) => leaf.get(key),
            Node::Internal(_) => None,
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let leaf = self.find_leaf(key)?;
        self.leaf_mut(leaf).get_mut(key)
    }

    pub fn first_key(&self) -> Option<K> {
        self.node(self.root?).primary_key()
    }

    pub fn last_key(&self) -> Option<K> {
        let mut id = self.root?;
        loop {
            match self.node(id) {
                Node::Leaf(leaf) => return leaf.pairs.last().map(|(k, _)| *k),
                Node::Internal(internal) => id = internal.children.last()?.1,
            }
        }
    }

    /// Lazy ascending scan over `[left, right]`. Only the closed interval is
    /// implemented; every other mode is rejected up front.
    pub fn collect(&self, left: K, right: K, mode: CollectionMode) -> Result<RangeIter<'_, K, V>> {
        mode.ensure_implemented()?;
        Ok(RangeIter::closed(self, left, right))
    }

    /// Every pair in ascending key order.
    pub fn iter(&self) -> RangeIter<'_, K, V> {
        RangeIter::full(self)
    }

    // --- Mutation ---

    pub fn insert(&mut self, key: K, value: V) -> InsertOutcome {
        let Some(leaf_id) = self.find_leaf(&key) else {
            let id = self.alloc(Node::Leaf(LeafNode::with_pair(self.degree, key, value)));
            self.root = Some(id);
            self.len = 1;
            return InsertOutcome::SizeChanged;
        };

        let leaf = self.leaf_mut(leaf_id);
        let old_first = leaf.primary_key();
        let outcome = leaf.insert(key, value);
        let new_first = leaf.primary_key();

        let outcome = match outcome {
            InsertOutcome::NoSizeChange => return InsertOutcome::NoSizeChange,
            InsertOutcome::SizeChanged => InsertOutcome::SizeChanged,
            InsertOutcome::NodeSplit(sibling) => {
                let sibling_id = self.alloc(Node::Leaf(sibling));
                self.link_right_sibling(leaf_id, sibling_id);
                InsertOutcome::NodeSplit(sibling_id)
            }
        };
        self.len += 1;
        if old_first != new_first {
            self.propagate_primary_key(leaf_id);
        }
        outcome
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let leaf_id = self.find_leaf(key)?;
        let leaf = self.leaf_mut(leaf_id);
        let old_first = leaf.primary_key();
        match leaf.remove(key) {
            RemoveOutcome::NoSizeChange => None,
            RemoveOutcome::SizeChanged(value) => {
                self.len -= 1;
                if self.node(leaf_id).primary_key() != old_first {
                    self.propagate_primary_key(leaf_id);
                }
                self.rebalance(leaf_id);
                Some(value)
            }
            RemoveOutcome::Empty(value) => {
                self.len -= 1;
                self.unlink(leaf_id);
                Some(value)
            }
        }
    }

    /// Push `id`'s primary key into its parent's routing entry, and keep
    /// going while the changed entry is the parent's first.
    fn propagate_primary_key(&mut self, id: NodeId) {
        let mut id = id;
        while let Some(parent) = self.node(id).parent() {
            let Some(key) = self.node(id).primary_key() else {
                return;
            };
            let internal = self.internal_mut(parent);
            let Some(position) = internal.position_of(id) else {
                return;
            };
            internal.children[position].0 = key;
            if position != 0 {
                return;
            }
            id = parent;
        }
    }

    /// Link a freshly split right sibling next to `left`, splitting parents
    /// and growing a new root as needed.
    fn link_right_sibling(&mut self, left: NodeId, right: NodeId) {
        let mut left = left;
        let mut right = right;
        loop {
            let right_key = match self.node(right).primary_key() {
                Some(key) => key,
                None => unreachable!("split produced an empty node"),
            };
            let Some(parent) = self.node(left).parent() else {
                let left_key = match self.node(left).primary_key() {
                    Some(key) => key,
                    None => unreachable!("split left an empty node"),
                };
                let mut root = InternalNode::new(self.degree);
                root.children.push((left_key, left));
                root.children.push((right_key, right));
                let root_id = self.alloc(Node::Internal(root));
                self.node_mut(left).set_parent(Some(root_id));
                self.node_mut(right).set_parent(Some(root_id));
                self.root = Some(root_id);
                return;
            };

            self.node_mut(right).set_parent(Some(parent));
            let internal = self.internal_mut(parent);
            internal.insert_after(left, right_key, right);
            if !internal.is_overweight() {
                return;
            }
            let sibling = internal.split();
            let moved: Vec<NodeId> = sibling.children.iter().map(|&(_, id)| id).collect();
            let sibling_id = self.alloc(Node::Internal(sibling));
            for child in moved {
                self.node_mut(child).set_parent(Some(sibling_id));
            }
            left = parent;
            right = sibling_id;
        }
    }

    /// Detach an emptied node from its parent and free it.
    fn unlink(&mut self, id: NodeId) {
        let parent = self.node(id).parent();
        self.release(id);
        let Some(parent) = parent else {
            self.root = None;
            return;
        };
        let internal = self.internal_mut(parent);
        let Some(position) = internal.position_of(id) else {
            return;
        };
        internal.children.remove(position);
        if internal.children.is_empty() {
            self.unlink(parent);
            return;
        }
        if position == 0 {
            self.propagate_primary_key(parent);
        }
        self.rebalance(parent);
    }

    /// Merge `id` into a neighbour when the two fit in one node, then
    /// collapse a single-child root.
    fn rebalance(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent() else {
            self.collapse_root();
            return;
        };
        let (position, left, right) = {
            let Node::Internal(internal) = self.node(parent) else {
                unreachable!("parent {parent:?} is a leaf");
            };
            let Some(position) = internal.position_of(id) else {
                return;
            };
            let left = position.checked_sub(1).map(|p| internal.children[p].1);
            let right = internal.children.get(position + 1).map(|&(_, r)| r);
            (position, left, right)
        };

        if let Some(left) = left {
            if self.node(id).can_merge_with(self.node(left)) {
                // `id` inherits the left neighbour's minimum, so the parent's
                // primary key is unchanged once the left entry goes.
                self.absorb_left(id, left);
                self.internal_mut(parent).children.remove(position - 1);
                self.rebalance(parent);
                return;
            }
        }
        if let Some(right) = right {
            if self.node(id).can_merge_with(self.node(right)) {
                self.absorb_right(id, right);
                self.internal_mut(parent).children.remove(position + 1);
                self.rebalance(parent);
                return;
            }
        }
        self.collapse_root();
    }

    /// `id` takes over every key of its left neighbour.
    fn absorb_left(&mut self, id: NodeId, left: NodeId) {
        let Some(absorbed) = self.release(left) else {
            return;
        };
        let moved = Self::child_ids(&absorbed);
        match (self.node_mut(id), absorbed) {
            (Node::Leaf(node), Node::Leaf(left)) => node.left_merge_with(left),
            (Node::Internal(node), Node::Internal(left)) => node.left_merge_with(left),
            _ => unreachable!("siblings at different depths"),
        }
        for child in moved {
            self.node_mut(child).set_parent(Some(id));
        }
        self.propagate_primary_key(id);
    }

    /// `id` takes over every key of its right neighbour.
    fn absorb_right(&mut self, id: NodeId, right: NodeId) {
        let Some(absorbed) = self.release(right) else {
            return;
        };
        let moved = Self::child_ids(&absorbed);
        match (self.node_mut(id), absorbed) {
            (Node::Leaf(node), Node::Leaf(right)) => node.right_merge_with(right),
            (Node::Internal(node), Node::Internal(right)) => node.right_merge_with(right),
            _ => unreachable!("siblings at different depths"),
        }
        for child in moved {
            self.node_mut(child).set_parent(Some(id));
        }
    }

    fn child_ids(node: &Node<K, V>) -> Vec<NodeId> {
        match node {
            Node::Internal(internal) => internal.children.iter().map(|&(_, c)| c).collect(),
            Node::Leaf(_) => Vec::new(),
        }
    }

    fn collapse_root(&mut self) {
        while let Some(root) = self.root {
            let only_child = match self.node(root) {
                Node::Internal(internal) if internal.children.len() == 1 => internal.children[0].1,
                _ => return,
            };
            self.release(root);
            self.node_mut(only_child).set_parent(None);
            self.root = Some(only_child);
        }
    }

    // --- Diagnostics ---

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats { len: self.len, ..Default::default() };
        let Some(root) = self.root else {
            return stats;
        };
        let mut id = root;
        stats.depth = 1;
        while let Node::Internal(internal) = self.node(id) {
            id = internal.children[0].1;
            stats.depth += 1;
        }
        for node in self.nodes.iter().flatten() {
            match node {
                Node::Leaf(_) => stats.leaf_count += 1,
                Node::Internal(_) => stats.internal_count += 1,
            }
        }
        stats
    }

    /// Walk the whole tree and check ordering, size, parent and primary key
    /// invariants. Returns the shape on success.
    pub fn verify(&self) -> std::result::Result<TreeStats, String> {
        let Some(root) = self.root else {
            return if self.len == 0 {
                Ok(self.stats())
            } else {
                Err(format!("empty tree reports len {}", self.len))
            };
        };
        if self.node(root).parent().is_some() {
            return Err("root has a parent".into());
        }
        let mut leaf_depth = None;
        let mut previous: Option<K> = None;
        let mut count = 0usize;
        self.verify_node(root, 1, &mut leaf_depth, &mut previous, &mut count)?;
        if count != self.len {
            return Err(format!("counted {count} pairs, len is {}", self.len));
        }
        Ok(self.stats())
    }

    fn verify_node(
        &self,
        id: NodeId,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        previous: &mut Option<K>,
        count: &mut usize,
    ) -> std::result::Result<K, String> {
        let node = self.node(id);
        if node.key_count() == 0 {
            return Err(format!("node {id:?} is empty"));
        }
        if node.key_count() > self.degree {
            return Err(format!("node {id:?} holds {} keys, degree is {}", node.key_count(), self.degree));
        }
        match node {
            Node::Leaf(leaf) => {
                match *leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(format!("leaf {id:?} at depth {depth}, expected {expected}"));
                    }
                    _ => *leaf_depth = Some(depth),
                }
                for &(key, _) in &leaf.pairs {
                    if let Some(prev) = *previous {
                        if prev >= key {
                            return Err(format!("keys out of order: {prev:?} then {key:?}"));
                        }
                    }
                    *previous = Some(key);
                    *count += 1;
                }
                Ok(leaf.pairs[0].0)
            }
            Node::Internal(internal) => {
                for &(key, child) in &internal.children {
                    if self.node(child).parent() != Some(id) {
                        return Err(format!("child {child:?} does not point back to {id:?}"));
                    }
                    let min = self.verify_node(child, depth + 1, leaf_depth, previous, count)?;
                    if min != key {
                        return Err(format!("routing key {key:?} for {child:?}, subtree minimum is {min:?}"));
                    }
                }
                Ok(internal.children[0].0)
            }
        }
    }
}

impl<K: Debug, V> Debug for RangeTree<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeTree")
            .field("degree", &self.degree)
            .field("len", &self.len)
            .field("root", &self.root)
            .finish()
    }
}
