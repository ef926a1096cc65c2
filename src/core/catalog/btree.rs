//! B-Tree for the year index
//!
//! Classic minimum-degree B-Tree with:
//! - Pre-emptive splitting of full children on the way down
//! - Duplicate years (ties keep insertion order in an in-order walk)
//! - Inclusive range scans
//!
//! Deletion removes the matching (year, ISBN) entry without merging or
//! borrowing, so nodes may drop below `t - 1` keys. An internal key is
//! replaced by its in-order predecessor (or successor) from a leaf so every
//! internal node keeps `keys + 1` children and all leaves stay at one depth.
//!
//! Nodes live in a `Vec` arena. Subtrees detached by a delete and roots
//! that collapse go on a free list that `allocate` drains first.

use crate::core::record::Identity;
use std::collections::BTreeMap;

/// Index of a node inside the tree arena
pub type NodeId = usize;

/// A (year, value) pair stored in a node
#[derive(Debug, Clone)]
pub struct YearEntry<V> {
    pub year: i32,
    pub value: V,
}

/// B-Tree node; a node without children is a leaf
#[derive(Debug, Clone)]
pub struct BTreeNode<V> {
    pub entries: Vec<YearEntry<V>>,
    pub children: Vec<NodeId>,
}

impl<V> BTreeNode<V> {
    fn with_capacity(max_keys: usize) -> Self {
        BTreeNode {
            entries: Vec::with_capacity(max_keys),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Read-only view of one node, for renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub id: NodeId,
    pub depth: usize,
    pub years: Vec<i32>,
    pub children: Vec<NodeId>,
}

/// Year-keyed B-Tree
#[derive(Debug, Clone)]
pub struct BTree<V> {
    min_degree: usize,
    root: NodeId,
    nodes: Vec<BTreeNode<V>>,
    free: Vec<NodeId>,
    len: usize,
}

impl<V: Identity> BTree<V> {
    /// Create an empty tree with minimum degree `t` (at least 2)
    pub fn new(min_degree: usize) -> Self {
        debug_assert!(min_degree >= 2, "B-Tree minimum degree must be >= 2");
        let min_degree = min_degree.max(2);

        BTree {
            min_degree,
            root: 0,
            nodes: vec![BTreeNode::with_capacity(2 * min_degree - 1)],
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn min_degree(&self) -> usize {
        self.min_degree
    }

    fn max_keys(&self) -> usize {
        2 * self.min_degree - 1
    }

    fn allocate(&mut self, node: BTreeNode<V>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = node;
            return id;
        }
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Return a detached subtree to the free list
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            stack.append(&mut node.children);
            node.entries.clear();
            self.free.push(id);
        }
    }

    /// Arena slots in use, reachable or free
    pub fn allocated_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Insert an entry; duplicates of `year` are kept
    pub fn insert(&mut self, year: i32, value: V) {
        if self.nodes[self.root].entries.len() == self.max_keys() {
            // Root split: the tree grows by one level
            let mut new_root = BTreeNode::with_capacity(self.max_keys());
            new_root.children.push(self.root);
            let new_root = self.allocate(new_root);
            self.root = new_root;
            self.split_child(new_root, 0);
        }

        self.insert_non_full(self.root, YearEntry { year, value });
        self.len += 1;
    }

    /// Split the full child at `index` of `parent`, promoting its median
    fn split_child(&mut self, parent: NodeId, index: usize) {
        let t = self.min_degree;
        let max_keys = self.max_keys();
        let child = self.nodes[parent].children[index];

        let (median, right) = {
            let node = &mut self.nodes[child];
            let mut right = BTreeNode::with_capacity(max_keys);
            right.entries.extend(node.entries.drain(t..));
            if !node.is_leaf() {
                right.children = node.children.split_off(t);
            }
            let median = node.entries.pop();
            (median, right)
        };

        let median = match median {
            Some(median) => median,
            None => return,
        };

        let right_id = self.allocate(right);
        let parent = &mut self.nodes[parent];
        parent.entries.insert(index, median);
        parent.children.insert(index + 1, right_id);
    }

    fn insert_non_full(&mut self, mut id: NodeId, entry: YearEntry<V>) {
        loop {
            let node = &self.nodes[id];
            // Upper bound: equal years go after the existing ones
            let mut pos = node.entries.partition_point(|e| e.year <= entry.year);

            if node.is_leaf() {
                self.nodes[id].entries.insert(pos, entry);
                return;
            }

            let child = node.children[pos];
            if self.nodes[child].entries.len() == self.max_keys() {
                self.split_child(id, pos);
                if self.nodes[id].entries[pos].year <= entry.year {
                    pos += 1;
                }
            }

            id = self.nodes[id].children[pos];
        }
    }

    /// First entry found for `year` while descending from the root
    pub fn search_one(&self, year: i32) -> Option<&V> {
        let mut id = self.root;

        loop {
            let node = &self.nodes[id];
            let pos = node.entries.partition_point(|e| e.year < year);

            if pos < node.entries.len() && node.entries[pos].year == year {
                return Some(&node.entries[pos].value);
            }
            if node.is_leaf() {
                return None;
            }
            id = node.children[pos];
        }
    }

    /// Every entry for `year`, in insertion order
    pub fn search_all(&self, year: i32) -> Vec<&V> {
        self.range(year, year).into_iter().map(|(_, v)| v).collect()
    }

    /// Entries with `start <= year <= end`, ascending by year
    pub fn range(&self, start: i32, end: i32) -> Vec<(i32, &V)> {
        let mut out = Vec::new();
        if start <= end {
            self.collect_range(self.root, start, end, &mut out);
        }
        out
    }

    fn collect_range<'a>(&'a self, id: NodeId, start: i32, end: i32, out: &mut Vec<(i32, &'a V)>) {
        let node = &self.nodes[id];

        for (i, entry) in node.entries.iter().enumerate() {
            if !node.is_leaf() && entry.year >= start {
                self.collect_range(node.children[i], start, end, out);
            }
            if entry.year > end {
                return;
            }
            if entry.year >= start {
                out.push((entry.year, &entry.value));
            }
        }

        if let Some(&last) = node.children.last() {
            let last_year = node.entries.last().map(|e| e.year);
            if last_year.map_or(true, |y| y <= end) {
                self.collect_range(last, start, end, out);
            }
        }
    }

    /// Remove the entry holding `isbn` under `year`
    pub fn delete(&mut self, year: i32, isbn: &str) -> bool {
        self.remove(year, isbn).is_some()
    }

    /// Remove and return the entry holding `isbn` under `year`
    pub fn remove(&mut self, year: i32, isbn: &str) -> Option<V> {
        let removed = self.remove_from(self.root, year, isbn)?;
        self.len -= 1;

        // An emptied internal root hands its only child the root role
        while self.nodes[self.root].entries.is_empty() && self.nodes[self.root].children.len() == 1 {
            let old = self.root;
            self.root = self.nodes[old].children[0];
            self.nodes[old].children.clear();
            self.release(old);
        }

        Some(removed.value)
    }

    fn remove_from(&mut self, id: NodeId, year: i32, isbn: &str) -> Option<YearEntry<V>> {
        let node = &self.nodes[id];

        let found = node
            .entries
            .iter()
            .position(|e| e.year == year && e.value.isbn() == isbn);

        if let Some(i) = found {
            if node.is_leaf() {
                return Some(self.nodes[id].entries.remove(i));
            }
            return Some(self.remove_internal(id, i));
        }

        if node.is_leaf() {
            return None;
        }

        // Children whose key range can hold `year`
        let n = node.entries.len();
        let candidates: Vec<NodeId> = (0..=n)
            .filter(|&c| {
                (c == 0 || node.entries[c - 1].year <= year) && (c == n || node.entries[c].year >= year)
            })
            .map(|c| node.children[c])
            .collect();

        candidates
            .into_iter()
            .find_map(|child| self.remove_from(child, year, isbn))
    }

    fn remove_internal(&mut self, id: NodeId, index: usize) -> YearEntry<V> {
        let left = self.nodes[id].children[index];
        let right = self.nodes[id].children[index + 1];

        let replacement = match self.take_max(left) {
            Some(entry) => Some(entry),
            None => self.take_min(right),
        };

        match replacement {
            Some(entry) => std::mem::replace(&mut self.nodes[id].entries[index], entry),
            None => {
                // Both neighbouring subtrees are empty: drop the key and its right subtree
                let node = &mut self.nodes[id];
                let dropped = node.children.remove(index + 1);
                let entry = node.entries.remove(index);
                self.release(dropped);
                entry
            }
        }
    }

    /// Detach the largest entry of a subtree, preferring leaves
    fn take_max(&mut self, id: NodeId) -> Option<YearEntry<V>> {
        if self.nodes[id].is_leaf() {
            return self.nodes[id].entries.pop();
        }

        let last_child = *self.nodes[id].children.last()?;
        if let Some(entry) = self.take_max(last_child) {
            return Some(entry);
        }

        // Rightmost subtree is empty: the node's own last key is the maximum
        let node = &mut self.nodes[id];
        let entry = node.entries.pop()?;
        if let Some(dropped) = node.children.pop() {
            self.release(dropped);
        }
        Some(entry)
    }

    /// Detach the smallest entry of a subtree, preferring leaves
    fn take_min(&mut self, id: NodeId) -> Option<YearEntry<V>> {
        if self.nodes[id].is_leaf() {
            if self.nodes[id].entries.is_empty() {
                return None;
            }
            return Some(self.nodes[id].entries.remove(0));
        }

        let first_child = *self.nodes[id].children.first()?;
        if let Some(entry) = self.take_min(first_child) {
            return Some(entry);
        }

        let node = &mut self.nodes[id];
        if node.entries.is_empty() {
            return None;
        }
        let dropped = node.children.remove(0);
        let entry = node.entries.remove(0);
        self.release(dropped);
        Some(entry)
    }

    /// Number of entries per year, ascending
    pub fn list_year_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for (year, _) in self.in_order() {
            *counts.entry(year).or_insert(0) += 1;
        }
        counts
    }

    /// All entries in ascending year order
    pub fn in_order(&self) -> Vec<(i32, &V)> {
        let mut out = Vec::with_capacity(self.len);
        self.walk(self.root, &mut out);
        out
    }

    fn walk<'a>(&'a self, id: NodeId, out: &mut Vec<(i32, &'a V)>) {
        let node = &self.nodes[id];
        for (i, entry) in node.entries.iter().enumerate() {
            if let Some(&child) = node.children.get(i) {
                self.walk(child, out);
            }
            out.push((entry.year, &entry.value));
        }
        if node.children.len() > node.entries.len() {
            if let Some(&last) = node.children.last() {
                self.walk(last, out);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels (a lone root leaf is height 1)
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while let Some(&child) = self.nodes[id].children.first() {
            height += 1;
            id = child;
        }
        height
    }

    /// Breadth-first snapshot of the reachable nodes
    pub fn nodes(&self) -> Vec<NodeView> {
        let mut views = Vec::new();
        let mut queue = std::collections::VecDeque::from([(self.root, 0usize)]);

        while let Some((id, depth)) = queue.pop_front() {
            let node = &self.nodes[id];
            views.push(NodeView {
                id,
                depth,
                years: node.entries.iter().map(|e| e.year).collect(),
                children: node.children.clone(),
            });
            queue.extend(node.children.iter().map(|&c| (c, depth + 1)));
        }

        views
    }

    /// Verify ordering, child counts and leaf depth
    ///
    /// With `strict_fill`, non-root nodes must also hold between `t - 1`
    /// and `2t - 1` keys; that bound only holds for insert-only workloads.
    pub fn check_invariants(&self, strict_fill: bool) -> Result<(), String> {
        let mut leaf_depth = None;
        let mut count = 0;
        self.check_node(self.root, 0, None, None, strict_fill, &mut leaf_depth, &mut count)?;

        if count != self.len {
            return Err(format!("len {} but {} reachable entries", self.len, count));
        }

        let reachable = self.nodes().len();
        if reachable + self.free.len() != self.nodes.len() {
            return Err(format!(
                "{} arena slots but {} reachable and {} free",
                self.nodes.len(),
                reachable,
                self.free.len()
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        low: Option<i32>,
        high: Option<i32>,
        strict_fill: bool,
        leaf_depth: &mut Option<usize>,
        count: &mut usize,
    ) -> Result<(), String> {
        let node = &self.nodes[id];
        let years: Vec<i32> = node.entries.iter().map(|e| e.year).collect();
        *count += years.len();

        if years.len() > self.max_keys() {
            return Err(format!("node {} holds {} keys", id, years.len()));
        }
        if strict_fill && id != self.root && years.len() < self.min_degree - 1 {
            return Err(format!("node {} underfull with {} keys", id, years.len()));
        }
        if years.windows(2).any(|w| w[0] > w[1]) {
            return Err(format!("node {} keys out of order", id));
        }
        if years.iter().any(|&y| low.map_or(false, |l| y < l) || high.map_or(false, |h| y > h)) {
            return Err(format!("node {} keys escape separator range", id));
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(format!("leaf {} at depth {}, expected {}", id, depth, d))
                }
                _ => {}
            }
            return Ok(());
        }

        if node.children.len() != years.len() + 1 {
            return Err(format!(
                "node {} has {} keys but {} children",
                id,
                years.len(),
                node.children.len()
            ));
        }

        for (c, &child) in node.children.iter().enumerate() {
            let lo = if c == 0 { low } else { Some(years[c - 1]) };
            let hi = if c == years.len() { high } else { Some(years[c]) };
            self.check_node(child, depth + 1, lo, hi, strict_fill, leaf_depth, count)?;
        }

        Ok(())
    }
}
