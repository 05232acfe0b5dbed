//! Node representation shared by leaves and internal nodes.
//!
//! A single [`Node`] type plays both roles, exactly like the classic B-tree
//! this crate is descended from: whether a node is a leaf or internal is
//! determined structurally, by whether `children` is empty. Leaves
//! additionally carry `values` and participate in the horizontal leaf chain
//! (`prev_leaf`/`next_leaf`); internal nodes carry `children` and leave the
//! chain fields unset.
//!
//! Ownership of the tree runs through `children` (a parent strong-owns its
//! children via `Rc`); the leaf chain is a set of non-owning `Weak` back-
//! references layered on top, so tearing down a merged-away node never has
//! to fight a reference cycle.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

pub(crate) type NodeRef<K, V> = Rc<RefCell<Node<K, V>>>;
pub(crate) type WeakNodeRef<K, V> = Weak<RefCell<Node<K, V>>>;

pub(crate) struct Node<K, V> {
    pub(crate) keys: Vec<K>,
    pub(crate) values: Vec<V>,
    pub(crate) children: Vec<NodeRef<K, V>>,
    pub(crate) next_leaf: Option<WeakNodeRef<K, V>>,
    pub(crate) prev_leaf: Option<WeakNodeRef<K, V>>,
}

impl<K: Debug, V: Debug> Debug for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("keys", &self.keys)
            .field("values", &self.values)
            .field("children", &self.children.len())
            .finish()
    }
}

impl<K, V> Node<K, V> {
    pub(crate) fn empty_leaf() -> NodeRef<K, V> {
        Rc::new(RefCell::new(Node {
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
            next_leaf: None,
            prev_leaf: None,
        }))
    }

    fn leaf_with(keys: Vec<K>, values: Vec<V>) -> NodeRef<K, V> {
        Rc::new(RefCell::new(Node {
            keys,
            values,
            children: Vec::new(),
            next_leaf: None,
            prev_leaf: None,
        }))
    }

    fn internal_with(keys: Vec<K>, children: Vec<NodeRef<K, V>>) -> NodeRef<K, V> {
        Rc::new(RefCell::new(Node {
            keys,
            values: Vec::new(),
            children,
            next_leaf: None,
            prev_leaf: None,
        }))
    }

    pub(crate) fn new_root_with(key: K, left: NodeRef<K, V>, right: NodeRef<K, V>) -> NodeRef<K, V> {
        Self::internal_with(vec![key], vec![left, right])
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Index of the smallest key strictly greater than `key`, i.e. the child a
/// descent should follow, or (for a leaf) the position a fresh key would be
/// inserted at: the smallest `i` such that `k < keys[i]`, or `len(keys)` if
/// no such key exists.
pub(crate) fn descent_index<K: Ord>(keys: &[K], key: &K) -> usize {
    keys.partition_point(|k| k <= key)
}

impl<K: Ord + Clone, V> Node<K, V> {
    /// Splits an overfull node (`keys.len() == m`, the branching factor) in
    /// half, returning the key promoted to the parent and the new right
    /// sibling. `node_ref` is left holding the left half in place.
    ///
    /// Leaf splits *copy* the median key up (it stays in the right sibling
    /// too, as its first key); internal splits *move* it, removing it from
    /// both halves.
    pub(crate) fn split(node_ref: &NodeRef<K, V>, m: usize) -> (K, NodeRef<K, V>) {
        let is_leaf = node_ref.borrow().is_leaf();
        if is_leaf {
            Self::split_leaf(node_ref, m)
        } else {
            Self::split_internal(node_ref, m)
        }
    }

    fn split_leaf(node_ref: &NodeRef<K, V>, m: usize) -> (K, NodeRef<K, V>) {
        let mut node = node_ref.borrow_mut();
        let right_keys = node.keys.split_off(m);
        let right_values = node.values.split_off(m);
        let median = right_keys[0].clone();
        let right = Self::leaf_with(right_keys, right_values);

        // Splice the new sibling into the leaf chain immediately after
        // `node`; internal splits never touch these fields, the chain is leaf-only.
        let old_next = node.next_leaf.take();
        if let Some(upgraded) = old_next.as_ref().and_then(Weak::upgrade) {
            upgraded.borrow_mut().prev_leaf = Some(Rc::downgrade(&right));
        }
        right.borrow_mut().next_leaf = old_next;
        right.borrow_mut().prev_leaf = Some(Rc::downgrade(node_ref));
        node.next_leaf = Some(Rc::downgrade(&right));

        (median, right)
    }

    fn split_internal(node_ref: &NodeRef<K, V>, m: usize) -> (K, NodeRef<K, V>) {
        let mut node = node_ref.borrow_mut();
        let right_keys = node.keys.split_off(m + 1);
        let median = node
            .keys
            .pop()
            .expect("overfull internal node has a median key");

        let children_len = node.children.len();
        let split_at = (children_len + 1) / 2;
        let right_children = node.children.split_off(split_at);

        let right = Self::internal_with(right_keys, right_children);
        (median, right)
    }
}
