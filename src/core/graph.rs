//! Weighted directed graph of libraries
//!
//! Edges carry two non-negative weights, travel time and shipping cost; a
//! route query picks one of them as the [`Criterion`]. A bidirectional
//! connection is stored as two independent directed edges.
//!
//! Shortest paths use Dijkstra with a linear minimum scan (O(V²)), which is
//! plenty for a network of a few dozen libraries. Nodes are scanned in the
//! order they were added and only a strictly smaller distance replaces the
//! current minimum, so the earliest-added node wins every tie and results
//! are deterministic.
//!
//! Alternate routes repeat the search, skipping any arrival at the
//! destination whose full node sequence was already returned.

use crate::core::error::{CatalogError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Which edge weight a route minimizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Time,
    Cost,
}

/// Directed edge to another library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub to: String,
    pub time: f64,
    pub cost: f64,
}

impl Edge {
    pub fn weight(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Time => self.time,
            Criterion::Cost => self.cost,
        }
    }
}

/// A library node and its outgoing edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryNode {
    pub id: String,
    pub label: Option<String>,
    pub edges: Vec<Edge>,
}

/// Flattened edge for renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub from: String,
    pub to: String,
    pub time: f64,
    pub cost: f64,
}

/// Result of a route query
///
/// An unreachable destination is reported as infinite weight with an empty
/// path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub weight: f64,
    pub path: Vec<String>,
}

impl Route {
    pub fn none() -> Self {
        Route {
            weight: f64::INFINITY,
            path: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        !self.path.is_empty() && self.weight.is_finite()
    }

    /// Number of edges travelled
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Graph-wide counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub average_out_degree: f64,
    pub max_out_degree: usize,
    pub isolated_nodes: usize,
}

/// Adjacency-list graph keyed by library id
///
/// Not thread-safe: every mutating call takes `&mut self` and callers are
/// expected to serialize access.
#[derive(Debug, Clone, Default)]
pub struct LibraryGraph {
    /// Nodes in insertion order
    nodes: Vec<LibraryNode>,
    /// id -> position in `nodes`
    index: AHashMap<String, usize>,
}

/// Either a node waiting to be settled or a recorded arrival at the destination
#[derive(Debug, Clone, Copy)]
enum Candidate {
    Node(usize),
    Arrival(usize),
}

impl LibraryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns false (and only refreshes a given label) if it exists
    pub fn add_node(&mut self, id: &str, label: Option<&str>) -> bool {
        if let Some(&idx) = self.index.get(id) {
            if let Some(label) = label {
                self.nodes[idx].label = Some(label.to_string());
            }
            return false;
        }

        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(LibraryNode {
            id: id.to_string(),
            label: label.map(str::to_string),
            edges: Vec::new(),
        });
        true
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&LibraryNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[LibraryNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    /// Every directed edge, grouped by source in node order
    pub fn edges(&self) -> Vec<EdgeView> {
        self.nodes
            .iter()
            .flat_map(|n| {
                n.edges.iter().map(move |e| EdgeView {
                    from: n.id.clone(),
                    to: e.to.clone(),
                    time: e.time,
                    cost: e.cost,
                })
            })
            .collect()
    }

    /// Connect two existing nodes
    ///
    /// An existing `from -> to` edge has its weights replaced. With
    /// `bidirectional`, the reverse edge is written with the same weights.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        time: f64,
        cost: f64,
        bidirectional: bool,
    ) -> Result<()> {
        if !(time.is_finite() && cost.is_finite() && time >= 0.0 && cost >= 0.0) {
            return Err(CatalogError::InvalidWeight { time, cost });
        }
        for id in [from, to] {
            if !self.has_node(id) {
                return Err(CatalogError::UnknownLibrary(id.to_string()));
            }
        }

        self.upsert_edge(from, to, time, cost);
        if bidirectional {
            self.upsert_edge(to, from, time, cost);
        }
        Ok(())
    }

    fn upsert_edge(&mut self, from: &str, to: &str, time: f64, cost: f64) {
        let idx = self.index[from];
        let edges = &mut self.nodes[idx].edges;

        match edges.iter_mut().find(|e| e.to == to) {
            Some(edge) => {
                edge.time = time;
                edge.cost = cost;
            }
            None => edges.push(Edge {
                to: to.to_string(),
                time,
                cost,
            }),
        }
    }

    /// Remove `from -> to` (and `to -> from` when bidirectional)
    ///
    /// Returns true if at least one edge was removed.
    pub fn remove_edge(&mut self, from: &str, to: &str, bidirectional: bool) -> bool {
        let mut removed = self.drop_edge(from, to);
        if bidirectional {
            removed |= self.drop_edge(to, from);
        }
        removed
    }

    fn drop_edge(&mut self, from: &str, to: &str) -> bool {
        let idx = match self.index.get(from) {
            Some(&idx) => idx,
            None => return false,
        };
        let edges = &mut self.nodes[idx].edges;
        let before = edges.len();
        edges.retain(|e| e.to != to);
        edges.len() != before
    }

    /// Remove a node together with every edge into or out of it
    pub fn remove_node(&mut self, id: &str) -> bool {
        let idx = match self.index.remove(id) {
            Some(idx) => idx,
            None => return false,
        };

        self.nodes.remove(idx);
        for node in &mut self.nodes {
            node.edges.retain(|e| e.to != id);
        }
        for (pos, node) in self.nodes.iter().enumerate().skip(idx) {
            self.index.insert(node.id.clone(), pos);
        }
        true
    }

    pub fn degree_out(&self, id: &str) -> Option<usize> {
        self.node(id).map(|n| n.edges.len())
    }

    pub fn degree_in(&self, id: &str) -> Option<usize> {
        if !self.has_node(id) {
            return None;
        }
        Some(
            self.nodes
                .iter()
                .flat_map(|n| n.edges.iter())
                .filter(|e| e.to == id)
                .count(),
        )
    }

    pub fn statistics(&self) -> GraphStats {
        let nodes = self.nodes.len();
        let edges = self.edge_count();
        let isolated_nodes = self
            .nodes
            .iter()
            .filter(|n| n.edges.is_empty() && self.degree_in(&n.id) == Some(0))
            .count();

        GraphStats {
            nodes,
            edges,
            average_out_degree: if nodes == 0 {
                0.0
            } else {
                edges as f64 / nodes as f64
            },
            max_out_degree: self.nodes.iter().map(|n| n.edges.len()).max().unwrap_or(0),
            isolated_nodes,
        }
    }

    pub fn shortest_path_by_time(&self, src: &str, dst: &str) -> Route {
        self.shortest_path(src, dst, Criterion::Time)
    }

    pub fn shortest_path_by_cost(&self, src: &str, dst: &str) -> Route {
        self.shortest_path(src, dst, Criterion::Cost)
    }

    pub fn shortest_path(&self, src: &str, dst: &str, criterion: Criterion) -> Route {
        let (s, d) = match (self.index.get(src), self.index.get(dst)) {
            (Some(&s), Some(&d)) => (s, d),
            _ => return Route::none(),
        };

        match self.search(s, d, criterion, &[]) {
            Some((weight, path)) => self.to_route(weight, &path),
            None => Route::none(),
        }
    }

    /// Up to `k` distinct routes, cheapest first
    ///
    /// Stops early once no further distinct path exists.
    pub fn k_alternate_paths(&self, src: &str, dst: &str, criterion: Criterion, k: usize) -> Vec<Route> {
        let (s, d) = match (self.index.get(src), self.index.get(dst)) {
            (Some(&s), Some(&d)) => (s, d),
            _ => return Vec::new(),
        };

        let mut accepted: Vec<Vec<usize>> = Vec::new();
        let mut weights = Vec::new();

        for _ in 0..k {
            match self.search(s, d, criterion, &accepted) {
                Some((weight, path)) => {
                    weights.push(weight);
                    accepted.push(path);
                }
                None => break,
            }
        }

        weights
            .into_iter()
            .zip(accepted.iter())
            .map(|(w, path)| self.to_route(w, path))
            .collect()
    }

    fn to_route(&self, weight: f64, path: &[usize]) -> Route {
        Route {
            weight,
            path: path.iter().map(|&i| self.nodes[i].id.clone()).collect(),
        }
    }

    /// Dijkstra from `src` that settles every node but `dst`
    ///
    /// Each edge into `dst` from a settled node is recorded as an arrival.
    /// Arrivals compete with unsettled nodes in the minimum scan; an arrival
    /// whose path is in `exclude` is skipped and the scan continues.
    fn search(
        &self,
        src: usize,
        dst: usize,
        criterion: Criterion,
        exclude: &[Vec<usize>],
    ) -> Option<(f64, Vec<usize>)> {
        if src == dst {
            let path = vec![src];
            return (!exclude.contains(&path)).then_some((0.0, path));
        }

        let n = self.nodes.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        // (weight, predecessor, skipped)
        let mut arrivals: Vec<(f64, usize, bool)> = Vec::new();

        dist[src] = 0.0;

        loop {
            let mut best: Option<(f64, Candidate)> = None;

            for u in 0..n {
                if u == dst || visited[u] || !dist[u].is_finite() {
                    continue;
                }
                if best.map_or(true, |(d, _)| dist[u] < d) {
                    best = Some((dist[u], Candidate::Node(u)));
                }
            }
            for (i, &(w, _, skipped)) in arrivals.iter().enumerate() {
                if !skipped && best.map_or(true, |(d, _)| w < d) {
                    best = Some((w, Candidate::Arrival(i)));
                }
            }

            match best {
                None => return None,
                Some((_, Candidate::Node(u))) => {
                    visited[u] = true;
                    for edge in &self.nodes[u].edges {
                        let v = match self.index.get(&edge.to) {
                            Some(&v) => v,
                            None => continue,
                        };
                        let w = dist[u] + edge.weight(criterion);

                        if v == dst {
                            arrivals.push((w, u, false));
                        } else if !visited[v] && w < dist[v] {
                            dist[v] = w;
                            prev[v] = Some(u);
                        }
                    }
                }
                Some((w, Candidate::Arrival(i))) => {
                    let via = arrivals[i].1;
                    match reconstruct(&prev, src, via) {
                        Some(mut path) => {
                            path.push(dst);
                            if exclude.contains(&path) {
                                arrivals[i].2 = true;
                                continue;
                            }
                            return Some((w, path));
                        }
                        None => arrivals[i].2 = true,
                    }
                }
            }
        }
    }
}

/// Walk predecessor links back from `node`; None unless the walk ends at `src`
fn reconstruct(prev: &[Option<usize>], src: usize, node: usize) -> Option<Vec<usize>> {
    let mut path = vec![node];
    let mut current = node;

    while let Some(p) = prev[current] {
        if path.len() > prev.len() {
            return None;
        }
        path.push(p);
        current = p;
    }

    path.reverse();
    (path.first() == Some(&src)).then_some(path)
}
