/*
 * B+ Tree Implementation
 *
 * Unlike a classic B-tree, values live only in the leaves. Internal nodes
 * hold separator keys and child links only; the leaves are additionally
 * threaded together into a doubly-linked chain so that ordered traversal
 * never has to re-descend from the root.
 *
 * The properties of this B+ tree are:
 * 1. Every node has at most `M - 1` keys, where `M` is the branching factor.
 * 2. All keys in a node are in ascending order.
 * 3. For an internal node, `keys[i]` equals the smallest key reachable
 *    through `children[i + 1]`.
 * 4. Leaves are linked left-to-right via `next_leaf`/`prev_leaf`.
 *
 * ############################################################################
 *
 * Insertion splits a node from the bottom up exactly like the classic
 * B-tree's `split_child`, with one twist: a *leaf* split copies its median
 * key up to the parent (the median stays behind as the new right leaf's
 * first key, because that key still needs a value attached to it), while an
 * *internal* split moves its median up (an internal node has no value to
 * keep, so the key belongs to the parent alone now). Picture `M = 3`:
 *
 *     [5]
 *    /   \
 * {2, 4} {6, 8, 9}
 *
 * Inserting 7 overfills the right leaf:
 *
 *     [5]
 *    /   \
 * {2, 4} {6, 7, 8, 9}
 *
 * `Node::split` identifies the median (8), moves `[8, 9]` into a fresh right
 * leaf, *copies* 8 up to the parent, and links the new leaf into the chain:
 *
 *    [5, 8]
 *    /   |   \
 * {2, 4} {6, 7} {8, 9}
 *
 * Deletion is the mirror image: removing a key from an underfull leaf first
 * tries to borrow a spare entry from a sibling (through the parent), and
 * only merges two siblings into one when neither has a spare to lend. A
 * merge pulls the parent's separator back down, which can in turn leave the
 * parent underfull, so the rebalance recurses up the path stack exactly the
 * way the split cascade does on insertion.
 */

use std::rc::{Rc, Weak};

use crate::cursor::{Cursor, RevCursor};
use crate::error::Error;
use crate::node::{descent_index, Node, NodeRef};

/// An in-memory ordered map backed by a B+ tree.
///
/// Keys must implement [`Ord`]; duplicate keys are not supported (inserting
/// an existing key overwrites its value). The branching factor is fixed at
/// construction and bounds every node to between `(M-1)/2` and `M-1` keys
/// (the root is exempt from the lower bound).
pub struct BPlusTree<K, V> {
    root: NodeRef<K, V>,
    num_elements: usize,
    branching_factor: usize,
}

impl<K: Ord + Clone, V: Clone> BPlusTree<K, V> {
    /// Creates an empty tree with the given branching factor. `M` must be at
    /// least 3, anything smaller can't hold a valid split.
    pub fn new(branching_factor: usize) -> Result<Self, Error> {
        if branching_factor < 3 {
            return Err(Error::ConfigError { branching_factor });
        }
        Ok(BPlusTree {
            root: Node::empty_leaf(),
            num_elements: 0,
            branching_factor,
        })
    }

    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    /// Drops every node and reinstalls a fresh empty leaf as the root. The
    /// old tree is released through ordinary `Rc` drop glue; there are no
    /// reference cycles left to break by hand, since the leaf chain holds
    /// only `Weak` back-references.
    pub fn clear(&mut self) {
        self.root = Node::empty_leaf();
        self.num_elements = 0;
    }

    /// Inserts `key` -> `value`. If `key` is already present, overwrites its
    /// value in place and leaves the tree's shape and size unchanged.
    pub fn insert(&mut self, key: K, value: V) {
        let mut path: Vec<(NodeRef<K, V>, usize)> = Vec::new();
        let mut node = self.root.clone();
        loop {
            let is_leaf = node.borrow().is_leaf();
            if is_leaf {
                break;
            }
            let idx = descent_index(&node.borrow().keys, &key);
            let child = node.borrow().children[idx].clone();
            path.push((node, idx));
            node = child;
        }

        {
            let mut leaf = node.borrow_mut();
            match leaf.keys.binary_search(&key) {
                Ok(pos) => {
                    leaf.values[pos] = value;
                    return;
                }
                Err(pos) => {
                    leaf.keys.insert(pos, key);
                    leaf.values.insert(pos, value);
                }
            }
        }
        self.num_elements += 1;

        let mut current = node;
        loop {
            let overfull = current.borrow().keys.len() == self.branching_factor;
            if !overfull {
                break;
            }
            let m = self.branching_factor / 2;
            let (median, right) = Node::split(&current, m);
            match path.pop() {
                Some((parent, idx)) => {
                    {
                        let mut p = parent.borrow_mut();
                        p.keys.insert(idx, median);
                        p.children.insert(idx + 1, right);
                    }
                    current = parent;
                }
                None => {
                    self.root = Node::new_root_with(median, current, right);
                    break;
                }
            }
        }
    }

    /// Returns a cursor positioned at `key`, or a past-the-end cursor if it
    /// is absent.
    pub fn find(&self, key: &K) -> Cursor<K, V> {
        let leaf = self.descend_to_leaf(key);
        match leaf.borrow().keys.binary_search(key) {
            Ok(idx) => Cursor::new(Some(Rc::downgrade(&leaf)), idx),
            Err(_) => Cursor::new(None, 0),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        !self.find(key).is_past_the_end()
    }

    /// Returns the value bound to `key`, or [`Error::OutOfRange`] if absent.
    pub fn at(&self, key: &K) -> Result<V, Error> {
        let cursor = self.find(key);
        if cursor.is_past_the_end() {
            Err(Error::OutOfRange)
        } else {
            cursor.get_val()
        }
    }

    /// Returns a cursor at `key`, inserting `default` first if it is
    /// missing. The returned cursor is the "mutable handle" onto the value:
    /// call `set_val`/`get_val` on it rather than holding a raw `&mut V`,
    /// since a `Cursor` already knows how to borrow through the underlying
    /// `RefCell` one step at a time.
    pub fn index_op(&mut self, key: K, default: V) -> Cursor<K, V> {
        let cursor = self.find(&key);
        if !cursor.is_past_the_end() {
            return cursor;
        }
        self.insert(key.clone(), default);
        self.find(&key)
    }

    /// Removes `key` if present; a no-op otherwise.
    pub fn erase(&mut self, key: &K) {
        let mut path: Vec<(NodeRef<K, V>, usize)> = Vec::new();
        let mut witness: Option<(NodeRef<K, V>, usize)> = None;
        let mut node = self.root.clone();
        loop {
            let is_leaf = node.borrow().is_leaf();
            if is_leaf {
                break;
            }
            let idx = descent_index(&node.borrow().keys, key);
            if let Ok(pos) = node.borrow().keys.binary_search(key) {
                witness = Some((node.clone(), pos));
            }
            let child = node.borrow().children[idx].clone();
            path.push((node, idx));
            node = child;
        }

        let pos = match node.borrow().keys.binary_search(key) {
            Ok(pos) => pos,
            Err(_) => return,
        };
        {
            let mut leaf = node.borrow_mut();
            leaf.keys.remove(pos);
            leaf.values.remove(pos);
        }
        self.num_elements -= 1;

        if path.is_empty() {
            // The leaf is also the root; nothing else can underflow.
            return;
        }

        let min_keys = (self.branching_factor - 1) / 2;
        let leaf_len = node.borrow().keys.len();
        if leaf_len >= min_keys {
            if pos == 0 {
                if let Some((wnode, wpos)) = witness {
                    if let Some(new_key) = node.borrow().keys.first().cloned() {
                        wnode.borrow_mut().keys[wpos] = new_key;
                    }
                }
            }
            return;
        }

        let mut current = node;
        loop {
            let (parent, i) = path
                .pop()
                .expect("an underfull non-root node always has a parent frame");
            let parent_is_root = path.is_empty();

            let children_len = parent.borrow().children.len();
            let left = if i > 0 {
                Some(parent.borrow().children[i - 1].clone())
            } else {
                None
            };
            let right = if i + 1 < children_len {
                Some(parent.borrow().children[i + 1].clone())
            } else {
                None
            };
            let is_leaf = current.borrow().is_leaf();

            if let Some(ref left_node) = left {
                if left_node.borrow().keys.len() > min_keys {
                    Self::borrow_from_left(&parent, i, left_node, &current, is_leaf);
                    return;
                }
            }
            if let Some(ref right_node) = right {
                if right_node.borrow().keys.len() > min_keys {
                    Self::borrow_from_right(&parent, i, &current, right_node, is_leaf, &witness);
                    return;
                }
            }

            if let Some(left_node) = left {
                Self::merge_with_left(&parent, i, &left_node, &current, is_leaf);
            } else if let Some(right_node) = right {
                Self::merge_with_right(&parent, i, &current, &right_node, is_leaf, &witness);
            } else {
                unreachable!("a non-root node always has at least one sibling");
            }

            if parent_is_root {
                if parent.borrow().keys.is_empty() {
                    let surviving = parent.borrow().children[0].clone();
                    self.root = surviving;
                }
                return;
            }
            if parent.borrow().keys.len() >= min_keys {
                return;
            }
            witness = None;
            current = parent;
        }
    }

    /// Cursor-form of [`BPlusTree::erase`]: reads the cursor's key and
    /// delegates.
    pub fn erase_at(&mut self, cursor: &Cursor<K, V>) -> Result<(), Error> {
        let key = cursor.get_key()?;
        self.erase(&key);
        Ok(())
    }

    fn borrow_from_left(
        parent: &NodeRef<K, V>,
        i: usize,
        left: &NodeRef<K, V>,
        node: &NodeRef<K, V>,
        is_leaf: bool,
    ) {
        if is_leaf {
            let (k, v) = {
                let mut l = left.borrow_mut();
                let k = l.keys.pop().expect("left sibling has a spare key");
                let v = l.values.pop().expect("left sibling has a spare value");
                (k, v)
            };
            {
                let mut n = node.borrow_mut();
                n.keys.insert(0, k.clone());
                n.values.insert(0, v);
            }
            parent.borrow_mut().keys[i - 1] = k;
        } else {
            let (borrowed_key, borrowed_child) = {
                let mut l = left.borrow_mut();
                let k = l.keys.pop().expect("left sibling has a spare key");
                let c = l.children.pop().expect("left sibling has a spare child");
                (k, c)
            };
            let old_separator = std::mem::replace(&mut parent.borrow_mut().keys[i - 1], borrowed_key);
            let mut n = node.borrow_mut();
            n.keys.insert(0, old_separator);
            n.children.insert(0, borrowed_child);
        }
    }

    fn borrow_from_right(
        parent: &NodeRef<K, V>,
        i: usize,
        node: &NodeRef<K, V>,
        right: &NodeRef<K, V>,
        is_leaf: bool,
        witness: &Option<(NodeRef<K, V>, usize)>,
    ) {
        if is_leaf {
            let (k, v) = {
                let mut r = right.borrow_mut();
                let k = r.keys.remove(0);
                let v = r.values.remove(0);
                (k, v)
            };
            {
                let mut n = node.borrow_mut();
                n.keys.push(k);
                n.values.push(v);
            }
            let new_first = right.borrow().keys[0].clone();
            parent.borrow_mut().keys[i] = new_first;
            if let Some((wnode, wpos)) = witness {
                let refreshed = node.borrow().keys[0].clone();
                wnode.borrow_mut().keys[*wpos] = refreshed;
            }
        } else {
            let separator = parent.borrow().keys[i].clone();
            let (new_separator, borrowed_child) = {
                let mut r = right.borrow_mut();
                let k = r.keys.remove(0);
                let c = r.children.remove(0);
                (k, c)
            };
            {
                let mut n = node.borrow_mut();
                n.keys.push(separator);
                n.children.push(borrowed_child);
            }
            parent.borrow_mut().keys[i] = new_separator;
        }
    }

    fn merge_with_left(
        parent: &NodeRef<K, V>,
        i: usize,
        left: &NodeRef<K, V>,
        node: &NodeRef<K, V>,
        is_leaf: bool,
    ) {
        if is_leaf {
            let (mut keys, mut values) = {
                let mut n = node.borrow_mut();
                (std::mem::take(&mut n.keys), std::mem::take(&mut n.values))
            };
            let next = node.borrow().next_leaf.clone();
            {
                let mut l = left.borrow_mut();
                l.keys.append(&mut keys);
                l.values.append(&mut values);
                l.next_leaf = next.clone();
            }
            if let Some(next_node) = next.as_ref().and_then(Weak::upgrade) {
                next_node.borrow_mut().prev_leaf = Some(Rc::downgrade(left));
            }
        } else {
            let separator = parent.borrow().keys[i - 1].clone();
            let (mut keys, mut children) = {
                let mut n = node.borrow_mut();
                (std::mem::take(&mut n.keys), std::mem::take(&mut n.children))
            };
            let mut l = left.borrow_mut();
            l.keys.push(separator);
            l.keys.append(&mut keys);
            l.children.append(&mut children);
        }
        let mut p = parent.borrow_mut();
        p.keys.remove(i - 1);
        p.children.remove(i);
    }

    fn merge_with_right(
        parent: &NodeRef<K, V>,
        i: usize,
        node: &NodeRef<K, V>,
        right: &NodeRef<K, V>,
        is_leaf: bool,
        witness: &Option<(NodeRef<K, V>, usize)>,
    ) {
        if is_leaf {
            let (mut keys, mut values) = {
                let mut r = right.borrow_mut();
                (std::mem::take(&mut r.keys), std::mem::take(&mut r.values))
            };
            let next = right.borrow().next_leaf.clone();
            {
                let mut n = node.borrow_mut();
                n.keys.append(&mut keys);
                n.values.append(&mut values);
                n.next_leaf = next.clone();
            }
            if let Some(next_node) = next.as_ref().and_then(Weak::upgrade) {
                next_node.borrow_mut().prev_leaf = Some(Rc::downgrade(node));
            }
        } else {
            let separator = parent.borrow().keys[i].clone();
            let (mut keys, mut children) = {
                let mut r = right.borrow_mut();
                (std::mem::take(&mut r.keys), std::mem::take(&mut r.children))
            };
            let mut n = node.borrow_mut();
            n.keys.push(separator);
            n.keys.append(&mut keys);
            n.children.append(&mut children);
        }
        {
            let mut p = parent.borrow_mut();
            p.keys.remove(i);
            p.children.remove(i + 1);
        }
        if let Some((wnode, wpos)) = witness {
            let refreshed = node.borrow().keys[0].clone();
            wnode.borrow_mut().keys[*wpos] = refreshed;
        }
    }

    fn descend_to_leaf(&self, key: &K) -> NodeRef<K, V> {
        let mut node = self.root.clone();
        loop {
            let is_leaf = node.borrow().is_leaf();
            if is_leaf {
                return node;
            }
            let idx = descent_index(&node.borrow().keys, key);
            let child = node.borrow().children[idx].clone();
            node = child;
        }
    }

    fn leftmost_leaf(&self) -> NodeRef<K, V> {
        let mut node = self.root.clone();
        loop {
            let child = {
                let n = node.borrow();
                if n.is_leaf() {
                    None
                } else {
                    Some(n.children[0].clone())
                }
            };
            match child {
                Some(c) => node = c,
                None => return node,
            }
        }
    }

    fn rightmost_leaf(&self) -> NodeRef<K, V> {
        let mut node = self.root.clone();
        loop {
            let child = {
                let n = node.borrow();
                if n.is_leaf() {
                    None
                } else {
                    Some(n.children[n.children.len() - 1].clone())
                }
            };
            match child {
                Some(c) => node = c,
                None => return node,
            }
        }
    }

    /// All keys, in ascending order, read off the leaf chain.
    pub fn get_keys(&self) -> Vec<K> {
        let mut out = Vec::with_capacity(self.num_elements);
        let mut current = Some(self.leftmost_leaf());
        while let Some(node) = current {
            let n = node.borrow();
            out.extend(n.keys.iter().cloned());
            current = n.next_leaf.as_ref().and_then(Weak::upgrade);
        }
        out
    }

    /// All values, ordered the same way as [`BPlusTree::get_keys`].
    pub fn get_vals(&self) -> Vec<V> {
        let mut out = Vec::with_capacity(self.num_elements);
        let mut current = Some(self.leftmost_leaf());
        while let Some(node) = current {
            let n = node.borrow();
            out.extend(n.values.iter().cloned());
            current = n.next_leaf.as_ref().and_then(Weak::upgrade);
        }
        out
    }

    pub fn begin(&self) -> Cursor<K, V> {
        let leaf = self.leftmost_leaf();
        if leaf.borrow().keys.is_empty() {
            Cursor::new(None, 0)
        } else {
            Cursor::new(Some(Rc::downgrade(&leaf)), 0)
        }
    }

    pub fn end(&self) -> Cursor<K, V> {
        Cursor::new(None, 0)
    }

    pub fn rbegin(&self) -> RevCursor<K, V> {
        let leaf = self.rightmost_leaf();
        let len = leaf.borrow().keys.len();
        if len == 0 {
            RevCursor::new(None, 0)
        } else {
            RevCursor::new(Some(Rc::downgrade(&leaf)), len - 1)
        }
    }

    pub fn rend(&self) -> RevCursor<K, V> {
        RevCursor::new(None, 0)
    }

    /// First entry with key `>= key`, or past-the-end.
    pub fn lower_bound(&self, key: &K) -> Cursor<K, V> {
        self.bound(key, false)
    }

    /// First entry with key `> key`, or past-the-end.
    pub fn upper_bound(&self, key: &K) -> Cursor<K, V> {
        self.bound(key, true)
    }

    /// Walks the whole structure and checks the invariants every public
    /// mutation is supposed to preserve: uniform leaf depth, node occupancy
    /// bounds, separator correctness, and leaf-chain ordering. Exists for
    /// the same reason the classic B-tree this crate grew out of shipped a
    /// `print_tree` debug helper, a way to look inside the structure from
    /// outside the module, except this one asserts instead of printing.
    pub fn check_invariants(&self) -> Result<(), Error> {
        Self::check_node(&self.root, true, self.branching_factor)?;
        self.check_leaf_chain()?;
        if self.get_keys().len() != self.num_elements {
            return Err(Error::InternalInvariant(
                "num_elements does not match the number of keys reachable via the leaf chain",
            ));
        }
        Ok(())
    }

    /// Returns the depth of the subtree rooted at `node` (0 for a leaf).
    fn check_node(node: &NodeRef<K, V>, is_root: bool, m: usize) -> Result<usize, Error> {
        let n = node.borrow();
        let min_keys = (m - 1) / 2;
        if !is_root && n.keys.len() < min_keys {
            return Err(Error::InternalInvariant("non-root node is underfull"));
        }
        if n.keys.len() > m - 1 {
            return Err(Error::InternalInvariant("node is overfull"));
        }
        if !n.keys.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InternalInvariant("keys are not strictly ascending"));
        }

        if n.is_leaf() {
            if n.keys.len() != n.values.len() {
                return Err(Error::InternalInvariant("leaf keys/values length mismatch"));
            }
            return Ok(0);
        }

        if n.children.len() != n.keys.len() + 1 {
            return Err(Error::InternalInvariant(
                "internal node child count does not match key count",
            ));
        }
        let mut depth = None;
        for (i, child) in n.children.iter().enumerate() {
            let child_depth = Self::check_node(child, false, m)?;
            match depth {
                None => depth = Some(child_depth),
                Some(d) if d != child_depth => {
                    return Err(Error::InternalInvariant("leaves are not all at the same depth"))
                }
                _ => {}
            }
            if i < n.keys.len() {
                let right_min = Self::min_key(&n.children[i + 1]);
                if right_min.as_ref() != Some(&n.keys[i]) {
                    return Err(Error::InternalInvariant(
                        "separator does not equal the leftmost key of its right subtree",
                    ));
                }
            }
        }
        Ok(depth.unwrap_or(0) + 1)
    }

    fn min_key(node: &NodeRef<K, V>) -> Option<K> {
        let n = node.borrow();
        if n.is_leaf() {
            n.keys.first().cloned()
        } else {
            Self::min_key(&n.children[0])
        }
    }

    fn check_leaf_chain(&self) -> Result<(), Error> {
        let mut current = Some(self.leftmost_leaf());
        let mut previous_key: Option<K> = None;
        while let Some(node) = current {
            let n = node.borrow();
            for key in &n.keys {
                if let Some(prev) = &previous_key {
                    if prev >= key {
                        return Err(Error::InternalInvariant(
                            "leaf chain is not in strictly ascending order",
                        ));
                    }
                }
                previous_key = Some(key.clone());
            }
            current = n.next_leaf.as_ref().and_then(Weak::upgrade);
        }
        Ok(())
    }

    fn bound(&self, key: &K, strict: bool) -> Cursor<K, V> {
        let mut node = self.descend_to_leaf(key);
        loop {
            let found = {
                let n = node.borrow();
                n.keys
                    .iter()
                    .position(|k| if strict { k > key } else { k >= key })
            };
            if let Some(idx) = found {
                return Cursor::new(Some(Rc::downgrade(&node)), idx);
            }
            let next = node.borrow().next_leaf.clone();
            match next.as_ref().and_then(Weak::upgrade) {
                Some(n) => node = n,
                None => return Cursor::new(None, 0),
            }
        }
    }
}
