//! Height-balanced (AVL) tree for the title index
//!
//! Keys are titles compared lexicographically. Insert and delete rebalance
//! on the way back up the recursion, picking the rotation from the balance
//! factor of the heavy child. The two operations use different decision
//! tables:
//!
//! | heavy side | child balance | insert         | delete         |
//! |------------|---------------|----------------|----------------|
//! | left       | > 0           | single right   | single right   |
//! | left       | = 0           | (cannot occur) | single right   |
//! | left       | < 0           | left-right     | left-right     |
//! | right      | < 0           | single left    | single left    |
//! | right      | = 0           | (cannot occur) | single left    |
//! | right      | > 0           | right-left     | right-left     |

use std::cmp::Ordering;
use std::mem;

type Link<V> = Option<Box<AvlNode<V>>>;

/// AVL tree node
#[derive(Debug, Clone)]
pub struct AvlNode<V> {
    key: String,
    value: V,
    height: i32,
    left: Link<V>,
    right: Link<V>,
}

impl<V> AvlNode<V> {
    fn new(key: String, value: V) -> Self {
        AvlNode {
            key,
            value,
            height: 1,
            left: None,
            right: None,
        }
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    /// Left height minus right height
    fn balance(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height<V>(link: &Link<V>) -> i32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn balance<V>(link: &Link<V>) -> i32 {
    link.as_ref().map_or(0, |n| n.balance())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Right,
    LeftRight,
    Left,
    RightLeft,
}

/// Rotation table used after an insertion
fn insert_rotation<V>(node: &AvlNode<V>) -> Option<Rotation> {
    let b = node.balance();

    if b > 1 {
        return match balance(&node.left).cmp(&0) {
            Ordering::Greater => Some(Rotation::Right),
            Ordering::Less => Some(Rotation::LeftRight),
            Ordering::Equal => {
                debug_assert!(false, "insert left a level child under an unbalanced node");
                Some(Rotation::Right)
            }
        };
    }

    if b < -1 {
        return match balance(&node.right).cmp(&0) {
            Ordering::Less => Some(Rotation::Left),
            Ordering::Greater => Some(Rotation::RightLeft),
            Ordering::Equal => {
                debug_assert!(false, "insert left a level child under an unbalanced node");
                Some(Rotation::Left)
            }
        };
    }

    None
}

/// Rotation table used after a deletion: a level child takes a single rotation
fn delete_rotation<V>(node: &AvlNode<V>) -> Option<Rotation> {
    let b = node.balance();

    if b > 1 {
        return if balance(&node.left) >= 0 {
            Some(Rotation::Right)
        } else {
            Some(Rotation::LeftRight)
        };
    }

    if b < -1 {
        return if balance(&node.right) <= 0 {
            Some(Rotation::Left)
        } else {
            Some(Rotation::RightLeft)
        };
    }

    None
}

fn rotate_right<V>(mut node: Box<AvlNode<V>>) -> Box<AvlNode<V>> {
    let mut pivot = match node.left.take() {
        Some(pivot) => pivot,
        None => return node,
    };
    node.left = pivot.right.take();
    node.update_height();
    pivot.right = Some(node);
    pivot.update_height();
    pivot
}

fn rotate_left<V>(mut node: Box<AvlNode<V>>) -> Box<AvlNode<V>> {
    let mut pivot = match node.right.take() {
        Some(pivot) => pivot,
        None => return node,
    };
    node.right = pivot.left.take();
    node.update_height();
    pivot.left = Some(node);
    pivot.update_height();
    pivot
}

fn apply<V>(mut node: Box<AvlNode<V>>, rotation: Option<Rotation>) -> Box<AvlNode<V>> {
    match rotation {
        None => node,
        Some(Rotation::Right) => rotate_right(node),
        Some(Rotation::Left) => rotate_left(node),
        Some(Rotation::LeftRight) => {
            node.left = node.left.take().map(rotate_left);
            rotate_right(node)
        }
        Some(Rotation::RightLeft) => {
            node.right = node.right.take().map(rotate_right);
            rotate_left(node)
        }
    }
}

fn insert_at<V>(link: Link<V>, key: String, value: V, replaced: &mut Option<V>) -> Box<AvlNode<V>> {
    let mut node = match link {
        Some(node) => node,
        None => return Box::new(AvlNode::new(key, value)),
    };

    match key.as_str().cmp(node.key.as_str()) {
        Ordering::Less => node.left = Some(insert_at(node.left.take(), key, value, replaced)),
        Ordering::Greater => node.right = Some(insert_at(node.right.take(), key, value, replaced)),
        Ordering::Equal => {
            // Existing title: overwrite in place, shape is unchanged
            *replaced = Some(mem::replace(&mut node.value, value));
            return node;
        }
    }

    node.update_height();
    let rotation = insert_rotation(&node);
    apply(node, rotation)
}

/// Detach the minimum node of a subtree, returning it and the rebalanced rest
fn take_min<V>(mut node: Box<AvlNode<V>>) -> (Box<AvlNode<V>>, Link<V>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (node, rest)
        }
        Some(left) => {
            let (min, rest) = take_min(left);
            node.left = rest;
            node.update_height();
            let rotation = delete_rotation(&node);
            (min, Some(apply(node, rotation)))
        }
    }
}

fn remove_at<V>(link: Link<V>, key: &str, removed: &mut Option<V>) -> Link<V> {
    let mut node = link?;

    match key.cmp(node.key.as_str()) {
        Ordering::Less => node.left = remove_at(node.left.take(), key, removed),
        Ordering::Greater => node.right = remove_at(node.right.take(), key, removed),
        Ordering::Equal => match (node.left.take(), node.right.take()) {
            (None, None) => {
                *removed = Some(node.value);
                return None;
            }
            (Some(child), None) | (None, Some(child)) => {
                *removed = Some(node.value);
                return Some(child);
            }
            (Some(left), Some(right)) => {
                // Two children: the in-order successor takes this position
                let (successor, rest) = take_min(right);
                let AvlNode {
                    key: succ_key,
                    value: succ_value,
                    ..
                } = *successor;

                node.key = succ_key;
                *removed = Some(mem::replace(&mut node.value, succ_value));
                node.left = Some(left);
                node.right = rest;
            }
        },
    }

    node.update_height();
    let rotation = delete_rotation(&node);
    Some(apply(node, rotation))
}

/// Title-keyed AVL tree
#[derive(Debug, Clone)]
pub struct AvlTree<V> {
    root: Link<V>,
    len: usize,
}

impl<V> AvlTree<V> {
    pub fn new() -> Self {
        AvlTree { root: None, len: 0 }
    }

    /// Insert or overwrite the value stored under `key`
    ///
    /// Returns the previous value when the key already existed.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let mut replaced = None;
        let root = self.root.take();
        self.root = Some(insert_at(root, key.into(), value, &mut replaced));

        if replaced.is_none() {
            self.len += 1;
        }

        debug_assert!(self.is_balanced(), "AVL balance violated after insert");
        replaced
    }

    pub fn search(&self, key: &str) -> Option<&V> {
        let mut current = self.root.as_deref();

        while let Some(node) = current {
            match key.cmp(node.key.as_str()) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }

        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.search(key).is_some()
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let mut removed = None;
        let root = self.root.take();
        self.root = remove_at(root, key, &mut removed);

        if removed.is_some() {
            self.len -= 1;
        }

        debug_assert!(self.is_balanced(), "AVL balance violated after delete");
        removed
    }

    /// Remove `key`; false when it was not present
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove(key).is_some()
    }

    /// All entries in ascending title order
    pub fn in_order(&self) -> Vec<(&str, &V)> {
        self.iter().collect()
    }

    pub fn iter(&self) -> Iter<'_, V> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tree height (0 for an empty tree)
    pub fn height(&self) -> usize {
        height(&self.root) as usize
    }

    /// Title at the root, used by tree renderers
    pub fn root_key(&self) -> Option<&str> {
        self.root.as_deref().map(|n| n.key.as_str())
    }

    fn is_balanced(&self) -> bool {
        fn walk<V>(link: &Link<V>) -> bool {
            match link {
                None => true,
                Some(n) => n.balance().abs() <= 1 && walk(&n.left) && walk(&n.right),
            }
        }
        walk(&self.root)
    }

    /// Verify ordering, stored heights and the balance bound at every node
    pub fn check_invariants(&self) -> Result<(), String> {
        fn walk<V>(link: &Link<V>) -> Result<i32, String> {
            let node = match link {
                None => return Ok(0),
                Some(node) => node,
            };

            if let Some(left) = &node.left {
                if left.key >= node.key {
                    return Err(format!("left child '{}' >= '{}'", left.key, node.key));
                }
            }
            if let Some(right) = &node.right {
                if right.key <= node.key {
                    return Err(format!("right child '{}' <= '{}'", right.key, node.key));
                }
            }

            let lh = walk(&node.left)?;
            let rh = walk(&node.right)?;

            if (lh - rh).abs() > 1 {
                return Err(format!("node '{}' has balance {}", node.key, lh - rh));
            }
            if node.height != 1 + lh.max(rh) {
                return Err(format!("node '{}' stores stale height", node.key));
            }

            Ok(node.height)
        }

        walk(&self.root)?;

        let keys: Vec<&str> = self.iter().map(|(k, _)| k).collect();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err("in-order traversal is not strictly ascending".to_string());
        }
        if keys.len() != self.len {
            return Err(format!("len {} but {} nodes", self.len, keys.len()));
        }

        Ok(())
    }
}

impl<V> Default for AvlTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over an [`AvlTree`]
pub struct Iter<'a, V> {
    stack: Vec<&'a AvlNode<V>>,
}

impl<'a, V> Iter<'a, V> {
    fn push_left(&mut self, mut node: Option<&'a AvlNode<V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((node.key.as_str(), &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(tree: &AvlTree<V>) -> Vec<String> {
        tree.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_empty_tree() {
        let mut tree: AvlTree<u32> = AvlTree::new();
        assert!(tree.search("anything").is_none());
        assert!(!tree.delete("anything"));
        assert_eq!(tree.height(), 0);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_single_rotations_on_sorted_input() {
        let mut tree = AvlTree::new();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            tree.insert(*k, i);
        }
        assert_eq!(tree.root_key(), Some("b"));
        assert_eq!(tree.height(), 2);

        let mut tree = AvlTree::new();
        for (i, k) in ["c", "b", "a"].iter().enumerate() {
            tree.insert(*k, i);
        }
        assert_eq!(tree.root_key(), Some("b"));
    }

    #[test]
    fn test_double_rotations() {
        let mut tree = AvlTree::new();
        tree.insert("c", 0);
        tree.insert("a", 1);
        tree.insert("b", 2); // left-right
        assert_eq!(tree.root_key(), Some("b"));

        let mut tree = AvlTree::new();
        tree.insert("a", 0);
        tree.insert("c", 1);
        tree.insert("b", 2); // right-left
        assert_eq!(tree.root_key(), Some("b"));
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_insert_overwrites_existing_title() {
        let mut tree = AvlTree::new();
        assert!(tree.insert("Dune", 1).is_none());
        assert_eq!(tree.insert("Dune", 2), Some(1));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.search("Dune"), Some(&2));
    }

    #[test]
    fn test_delete_with_level_child_uses_single_rotation() {
        let mut tree = AvlTree::new();
        for k in ["20", "10", "30", "05", "15"] {
            tree.insert(k, ());
        }
        assert_eq!(tree.root_key(), Some("20"));

        // Removing 30 leaves the root left-heavy with a level left child
        assert!(tree.delete("30"));
        assert_eq!(tree.root_key(), Some("10"));
        assert_eq!(keys(&tree), vec!["05", "10", "15", "20"]);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_delete_two_children_uses_successor() {
        let mut tree = AvlTree::new();
        for (i, k) in ["m", "f", "t", "b", "h", "p", "x"].iter().enumerate() {
            tree.insert(*k, i);
        }

        assert_eq!(tree.remove("m"), Some(0));
        assert_eq!(tree.root_key(), Some("p"));
        assert_eq!(tree.search("p"), Some(&5));
        assert_eq!(tree.len(), 6);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut tree = AvlTree::new();
        tree.insert("a", 1);
        assert!(!tree.delete("b"));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_many_inserts_and_deletes_stay_balanced() {
        let mut tree = AvlTree::new();
        for i in 0..500 {
            tree.insert(format!("title{:04}", (i * 7919) % 500), i);
        }
        assert_eq!(tree.len(), 500);
        assert!(tree.height() <= 13);
        assert!(tree.check_invariants().is_ok());

        for i in (0..500).step_by(3) {
            assert!(tree.delete(&format!("title{:04}", i)));
            assert!(tree.check_invariants().is_ok());
        }

        for i in 0..500 {
            let present = tree.search(&format!("title{:04}", i)).is_some();
            assert_eq!(present, i % 3 != 0);
        }
    }
}
