//! B+ tree for the genre index
//!
//! - Values live only in leaves, as `genre -> bucket of records`
//! - Leaves are linked left to right for ordered scans
//! - Internal keys are separators: the first key of the subtree to their right
//! - Leaves split above `2t` keys, internal nodes above `2t - 1`
//!
//! Deleting the last record of a genre drops the key from its leaf; leaves
//! are not merged and stale separators keep routing correctly.

use crate::core::record::Identity;
use std::collections::BTreeMap;

/// B+ tree node type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

/// B+ tree node entry
///
/// Leaf entries carry a bucket; internal entries carry the page of the
/// child to the right of `key`.
#[derive(Debug, Clone)]
pub struct BPlusEntry<V> {
    pub key: String,
    pub bucket: Vec<V>,
    pub child_page: Option<u64>,
}

/// B+ tree node
#[derive(Debug, Clone)]
pub struct BPlusNode<V> {
    pub node_type: NodeType,
    pub page_id: u64,
    pub entries: Vec<BPlusEntry<V>>,
    pub next_leaf: Option<u64>,
    pub parent: Option<u64>,
    /// For internal nodes: child left of the first separator
    pub leftmost_child: Option<u64>,
}

impl<V> BPlusNode<V> {
    pub fn new_leaf(page_id: u64) -> Self {
        BPlusNode {
            node_type: NodeType::Leaf,
            page_id,
            entries: Vec::new(),
            next_leaf: None,
            parent: None,
            leftmost_child: None,
        }
    }

    pub fn new_internal(page_id: u64) -> Self {
        BPlusNode {
            node_type: NodeType::Internal,
            page_id,
            entries: Vec::new(),
            next_leaf: None,
            parent: None,
            leftmost_child: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type == NodeType::Leaf
    }

    pub fn find_key_index(&self, key: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| entry.key.as_str().cmp(key))
    }

    /// Child pages in left-to-right order
    pub fn children(&self) -> Vec<u64> {
        self.leftmost_child
            .into_iter()
            .chain(self.entries.iter().filter_map(|e| e.child_page))
            .collect()
    }

    /// Split this node into two, returning (separator, new_right_node)
    ///
    /// Leaves copy the separator into the right node; internal nodes move
    /// it up and keep it out of both halves.
    pub fn split(&mut self, new_page_id: u64) -> Option<(String, BPlusNode<V>)> {
        let mid = self.entries.len() / 2;
        let mut right_entries = self.entries.split_off(mid);

        if right_entries.is_empty() {
            self.entries.append(&mut right_entries);
            return None;
        }

        if self.is_leaf() {
            let separator = right_entries[0].key.clone();
            let mut node = BPlusNode::new_leaf(new_page_id);
            node.entries = right_entries;
            node.next_leaf = self.next_leaf;
            node.parent = self.parent;
            self.next_leaf = Some(new_page_id);
            Some((separator, node))
        } else {
            let mut rest = right_entries.into_iter();
            let median = rest.next()?;
            let mut node = BPlusNode::new_internal(new_page_id);
            node.entries = rest.collect();
            node.parent = self.parent;
            node.leftmost_child = median.child_page;
            Some((median.key, node))
        }
    }
}

/// Genre-keyed B+ tree with bucketed leaves
#[derive(Debug, Clone)]
pub struct BPlusTree<V> {
    min_degree: usize,
    root_page: u64,
    nodes: BTreeMap<u64, BPlusNode<V>>,
    next_page_id: u64,
    len: usize,
}

impl<V: Identity> BPlusTree<V> {
    pub fn new(min_degree: usize) -> Self {
        debug_assert!(min_degree >= 2, "B+ tree minimum degree must be >= 2");

        let mut nodes = BTreeMap::new();
        nodes.insert(0, BPlusNode::new_leaf(0));

        BPlusTree {
            min_degree: min_degree.max(2),
            root_page: 0,
            nodes,
            next_page_id: 1,
            len: 0,
        }
    }

    /// Most keys a leaf holds before splitting
    fn leaf_max(&self) -> usize {
        2 * self.min_degree
    }

    /// Most keys an internal node holds before splitting
    fn internal_max(&self) -> usize {
        2 * self.min_degree - 1
    }

    fn allocate_page(&mut self) -> u64 {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }

    fn node(&self, page_id: u64) -> &BPlusNode<V> {
        &self.nodes[&page_id]
    }

    fn node_mut(&mut self, page_id: u64) -> &mut BPlusNode<V> {
        self.nodes
            .get_mut(&page_id)
            .expect("page ids are only handed out by allocate_page")
    }

    /// Find the leaf node that should contain a key
    fn find_leaf(&self, key: &str) -> u64 {
        let mut current = self.root_page;

        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return current;
            }

            // key < first separator goes left; key >= separator[i] goes to entries[i].child
            let pos = node.entries.partition_point(|e| e.key.as_str() <= key);
            let child = if pos == 0 {
                node.leftmost_child
            } else {
                node.entries[pos - 1].child_page
            };

            current = match child {
                Some(child) => child,
                None => return current,
            };
        }
    }

    fn leftmost_leaf(&self) -> u64 {
        let mut current = self.root_page;
        while let Some(child) = self.node(current).leftmost_child {
            current = child;
        }
        current
    }

    /// Add `value` to the bucket of `genre`
    ///
    /// Returns false when the bucket already holds a record with the same ISBN.
    pub fn insert(&mut self, genre: &str, value: V) -> bool {
        let leaf_page = self.find_leaf(genre);
        let leaf_max = self.leaf_max();
        let leaf = self.node_mut(leaf_page);

        match leaf.find_key_index(genre) {
            Ok(idx) => {
                let bucket = &mut leaf.entries[idx].bucket;
                if bucket.iter().any(|v| v.isbn() == value.isbn()) {
                    return false;
                }
                bucket.push(value);
            }
            Err(idx) => {
                leaf.entries.insert(
                    idx,
                    BPlusEntry {
                        key: genre.to_string(),
                        bucket: vec![value],
                        child_page: None,
                    },
                );

                if leaf.entries.len() > leaf_max {
                    self.split_node(leaf_page);
                }
            }
        }

        self.len += 1;
        true
    }

    /// Split a node and propagate up the tree
    fn split_node(&mut self, page_id: u64) {
        let new_page_id = self.allocate_page();

        let (separator, right_node) = match self.node_mut(page_id).split(new_page_id) {
            Some(split) => split,
            None => return,
        };

        let parent_page = self.node(page_id).parent;
        let moved_children = right_node.children();
        self.nodes.insert(new_page_id, right_node);

        // Children that moved to the right half now report to it
        for child in moved_children {
            self.node_mut(child).parent = Some(new_page_id);
        }

        match parent_page {
            Some(parent_id) => self.insert_into_parent(parent_id, separator, new_page_id),
            None => self.create_new_root(page_id, separator, new_page_id),
        }
    }

    /// Insert a separator into an internal node
    fn insert_into_parent(&mut self, parent_id: u64, key: String, right_child: u64) {
        {
            let parent = self.node_mut(parent_id);
            let idx = match parent.find_key_index(&key) {
                Ok(idx) | Err(idx) => idx,
            };

            parent.entries.insert(
                idx,
                BPlusEntry {
                    key,
                    bucket: Vec::new(),
                    child_page: Some(right_child),
                },
            );
        }

        self.node_mut(right_child).parent = Some(parent_id);

        if self.node(parent_id).entries.len() > self.internal_max() {
            self.split_node(parent_id);
        }
    }

    /// Create new root when root splits
    fn create_new_root(&mut self, left_child: u64, separator: String, right_child: u64) {
        let new_root_id = self.allocate_page();
        let mut new_root = BPlusNode::new_internal(new_root_id);

        new_root.leftmost_child = Some(left_child);
        new_root.entries.push(BPlusEntry {
            key: separator,
            bucket: Vec::new(),
            child_page: Some(right_child),
        });

        self.node_mut(left_child).parent = Some(new_root_id);
        self.node_mut(right_child).parent = Some(new_root_id);

        self.nodes.insert(new_root_id, new_root);
        self.root_page = new_root_id;
    }

    /// Records filed under `genre`
    pub fn search(&self, genre: &str) -> &[V] {
        let leaf = self.node(self.find_leaf(genre));

        match leaf.find_key_index(genre) {
            Ok(idx) => &leaf.entries[idx].bucket,
            Err(_) => &[],
        }
    }

    /// Remove the record with `isbn` from the bucket of `genre`
    pub fn delete(&mut self, genre: &str, isbn: &str) -> bool {
        self.remove(genre, isbn).is_some()
    }

    pub fn remove(&mut self, genre: &str, isbn: &str) -> Option<V> {
        let leaf_page = self.find_leaf(genre);
        let leaf = self.node_mut(leaf_page);

        let idx = leaf.find_key_index(genre).ok()?;
        let bucket = &mut leaf.entries[idx].bucket;
        let pos = bucket.iter().position(|v| v.isbn() == isbn)?;
        let value = bucket.remove(pos);

        if bucket.is_empty() {
            leaf.entries.remove(idx);
        }

        self.len -= 1;
        Some(value)
    }

    /// Walk the leaf chain from the leftmost leaf
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        LeafChain {
            tree: self,
            next: Some(self.leftmost_leaf()),
        }
        .flat_map(|leaf| {
            leaf.entries
                .iter()
                .flat_map(|e| e.bucket.iter().map(move |v| (e.key.as_str(), v)))
        })
    }

    /// (genre, record count) pairs in ascending genre order
    pub fn list_genre_counts(&self) -> Vec<(String, usize)> {
        LeafChain {
            tree: self,
            next: Some(self.leftmost_leaf()),
        }
        .flat_map(|leaf| leaf.entries.iter().map(|e| (e.key.clone(), e.bucket.len())))
        .collect()
    }

    /// Genre keys of each leaf, following `next_leaf` pointers
    pub fn leaf_chain(&self) -> Vec<Vec<String>> {
        LeafChain {
            tree: self,
            next: Some(self.leftmost_leaf()),
        }
        .map(|leaf| leaf.entries.iter().map(|e| e.key.clone()).collect())
        .collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root_page(&self) -> u64 {
        self.root_page
    }

    /// Get tree height (a lone root leaf is height 1)
    pub fn height(&self) -> usize {
        let mut current = self.root_page;
        let mut height = 1;

        while let Some(child) = self.node(current).leftmost_child {
            height += 1;
            current = child;
        }

        height
    }

    /// Verify separators, fill limits, parent links, leaf depth and the chain
    ///
    /// With `exact_separators`, every internal key must equal the first key
    /// of its right subtree; deletions may leave stale (but still routing)
    /// separators, so that check only applies to insert-only workloads.
    pub fn check_invariants(&self, exact_separators: bool) -> Result<(), String> {
        let mut leaf_depth = None;
        let mut leaves = Vec::new();
        self.check_node(
            self.root_page,
            0,
            None,
            None,
            exact_separators,
            &mut leaf_depth,
            &mut leaves,
        )?;

        // The chain must visit exactly the leaves of an in-order walk
        let chain: Vec<u64> = LeafChain {
            tree: self,
            next: Some(self.leftmost_leaf()),
        }
        .map(|leaf| leaf.page_id)
        .collect();
        if chain != leaves {
            return Err("leaf chain does not match tree order".to_string());
        }

        let keys: Vec<String> = self.leaf_chain().into_iter().flatten().collect();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err("leaf chain keys are not strictly ascending".to_string());
        }

        let count: usize = self.list_genre_counts().iter().map(|(_, n)| n).sum();
        if count != self.len {
            return Err(format!("len {} but {} records in leaves", self.len, count));
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_node(
        &self,
        page_id: u64,
        depth: usize,
        low: Option<&str>,
        high: Option<&str>,
        exact_separators: bool,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<u64>,
    ) -> Result<(), String> {
        let node = self.node(page_id);

        for entry in &node.entries {
            let key = entry.key.as_str();
            if low.map_or(false, |l| key < l) || high.map_or(false, |h| key >= h) {
                return Err(format!("page {} key '{}' outside its range", page_id, key));
            }
        }

        if node.is_leaf() {
            if node.entries.len() > self.leaf_max() {
                return Err(format!("leaf {} holds {} keys", page_id, node.entries.len()));
            }
            if node.entries.iter().any(|e| e.bucket.is_empty()) {
                return Err(format!("leaf {} has an empty bucket", page_id));
            }
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(format!("leaf {} at depth {}, expected {}", page_id, depth, d))
                }
                _ => {}
            }
            leaves.push(page_id);
            return Ok(());
        }

        if node.entries.len() > self.internal_max() {
            return Err(format!("internal {} holds {} keys", page_id, node.entries.len()));
        }

        let children = node.children();
        if children.len() != node.entries.len() + 1 {
            return Err(format!("internal {} is missing child pointers", page_id));
        }

        for (i, &child) in children.iter().enumerate() {
            if self.node(child).parent != Some(page_id) {
                return Err(format!("page {} has a stale parent pointer", child));
            }

            let lo = if i == 0 { low } else { Some(node.entries[i - 1].key.as_str()) };
            let hi = node.entries.get(i).map(|e| e.key.as_str()).or(high);

            if exact_separators && i > 0 && self.first_key(child) != lo {
                return Err(format!(
                    "separator '{}' is not the first key of its right subtree",
                    lo.unwrap_or_default()
                ));
            }

            self.check_node(child, depth + 1, lo, hi, exact_separators, leaf_depth, leaves)?;
        }

        Ok(())
    }

    fn first_key(&self, mut page_id: u64) -> Option<&str> {
        loop {
            let node = self.node(page_id);
            match node.leftmost_child {
                Some(child) => page_id = child,
                None => return node.entries.first().map(|e| e.key.as_str()),
            }
        }
    }
}

/// Iterator over leaves linked by `next_leaf`
struct LeafChain<'a, V> {
    tree: &'a BPlusTree<V>,
    next: Option<u64>,
}

impl<'a, V> Iterator for LeafChain<'a, V> {
    type Item = &'a BPlusNode<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.next?;
        let node = &self.tree.nodes[&page];
        self.next = node.next_leaf;
        Some(node)
    }
}
