//! # Libris - Multi-Index Library Catalog
//!
//! `libris-rs` keeps a catalog of books indexed four ways and routes books
//! between the libraries of a network:
//!
//! - **Title index**: AVL tree, sorted traversal
//! - **Year index**: B-Tree with duplicate keys and range queries
//! - **Genre index**: leaf-linked B+Tree with one bucket per genre
//! - **ISBN index**: chained hash table with prime capacities
//! - **Routing**: weighted directed graph, Dijkstra by time or cost, alternate routes
//!
//! ## Quick Start
//!
//! ```rust
//! use libris_rs::{Book, Criterion, LibraryBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let mut library = LibraryBuilder::new().min_degree(3).build()?;
//!
//! library.add_library("central", Some("Central Library"));
//! library.add_library("north", None);
//! library.connect("central", "north", 2.0, 1.5, true)?;
//!
//! library.add_book(
//!     Book::new("Dune", "978-0-441-17271-9", "SciFi", 1965, "Herbert").at_library("central"),
//! )?;
//!
//! // Ship it and sign for it at the other end
//! let route = library.dispatch("9780441172719", "north", Criterion::Time)?;
//! assert_eq!(route.path, vec!["central", "north"]);
//! library.receive("9780441172719")?;
//!
//! let dune = library.catalog().get_by_title("Dune").unwrap();
//! assert_eq!(dune.library.as_deref(), Some("north"));
//! # Ok(())
//! # }
//! ```
//!
//! The core is single-threaded and not thread-safe: mutating calls take
//! `&mut self` and callers serialize access.

pub mod core;

pub use crate::core::{
    catalog::{Catalog, CatalogSnapshot, HashStats},
    config::CatalogConfig,
    error::{CatalogError, Result},
    graph::{Criterion, EdgeView, GraphStats, LibraryGraph, Route},
    record::{Book, BookRef, BookStatus, RecordId},
    validation::Isbn,
};

use crate::core::validation::normalize_isbn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A book on its way between two libraries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub isbn: String,
    pub from: String,
    pub to: String,
    pub route: Route,
}

/// Catalog plus the library network its books are shelved across
///
/// Every library a book is shelved at is a node of the graph. Books move
/// between libraries in two steps: [`Library::dispatch`] marks the book in
/// transit and records the route, [`Library::receive`] shelves it at the
/// destination.
#[derive(Debug, Clone)]
pub struct Library {
    catalog: Catalog,
    graph: LibraryGraph,
    /// Pending transfers by normalized ISBN
    transfers: BTreeMap<String, Transfer>,
}

impl Library {
    /// Create an empty library network with default settings
    pub fn new() -> Self {
        Library {
            catalog: Catalog::new(),
            graph: LibraryGraph::new(),
            transfers: BTreeMap::new(),
        }
    }

    /// Create an empty library network with a custom configuration
    pub fn with_config(config: CatalogConfig) -> Result<Self> {
        Ok(Library {
            catalog: Catalog::with_config(config)?,
            graph: LibraryGraph::new(),
            transfers: BTreeMap::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn graph(&self) -> &LibraryGraph {
        &self.graph
    }

    /// Add a book; an unknown library gets an edge-free node
    pub fn add_book(&mut self, book: Book) -> Result<RecordId> {
        let id = self.catalog.insert(book)?;

        if let Some(library) = self.catalog.get(id).and_then(|b| b.library.clone()) {
            if self.graph.add_node(&library, None) {
                debug!("Registered library '{}' for {}", library, id);
            }
        }
        Ok(id)
    }

    /// Remove a book, cancelling any pending transfer
    pub fn remove_book(&mut self, isbn: &str) -> Result<Option<Book>> {
        let removed = self.catalog.remove(isbn)?;
        if let Some(book) = &removed {
            if self.transfers.remove(&book.isbn).is_some() {
                info!("Cancelled transfer of {}", book.isbn);
            }
        }
        Ok(removed)
    }

    /// Change a book's status; books in transit only change through `receive`
    pub fn update_status(&mut self, isbn: &str, status: BookStatus) -> Result<()> {
        let key = normalize_isbn(isbn)?;
        if self.transfers.contains_key(&key) {
            return Err(CatalogError::TransferPending(key));
        }
        self.catalog.update_status(&key, status)
    }

    /// Shelve a book at `library`, registering the node if needed
    pub fn shelve(&mut self, isbn: &str, library: &str) -> Result<()> {
        let key = normalize_isbn(isbn)?;
        if self.transfers.contains_key(&key) {
            return Err(CatalogError::TransferPending(key));
        }

        self.catalog.shelve(&key, Some(library))?;
        self.graph.add_node(library.trim(), None);
        Ok(())
    }

    pub fn update_author(&mut self, isbn: &str, author: &str) -> Result<()> {
        self.catalog.update_author(&normalize_isbn(isbn)?, author)
    }

    /// Rename a book; the title index moves its handle, transfers are untouched
    pub fn retitle(&mut self, isbn: &str, title: &str) -> Result<()> {
        self.catalog.retitle(&normalize_isbn(isbn)?, title)
    }

    pub fn regenre(&mut self, isbn: &str, genre: &str) -> Result<()> {
        self.catalog.regenre(&normalize_isbn(isbn)?, genre)
    }

    pub fn change_year(&mut self, isbn: &str, year: i32) -> Result<()> {
        self.catalog.change_year(&normalize_isbn(isbn)?, year)
    }

    /// Add a library node; false if it already exists
    pub fn add_library(&mut self, id: &str, label: Option<&str>) -> bool {
        let added = self.graph.add_node(id, label);
        if added {
            info!("Added library '{}'", id);
        }
        added
    }

    /// Remove a library that has no books shelved at or heading to it
    pub fn remove_library(&mut self, id: &str) -> Result<bool> {
        if !self.graph.has_node(id) {
            return Ok(false);
        }

        let shelved = !self.catalog.books_at(id).is_empty();
        let incoming = self.transfers.values().any(|t| t.to == id);
        if shelved || incoming {
            return Err(CatalogError::LibraryNotEmpty(id.to_string()));
        }

        info!("Removing library '{}'", id);
        Ok(self.graph.remove_node(id))
    }

    pub fn connect(
        &mut self,
        from: &str,
        to: &str,
        time: f64,
        cost: f64,
        bidirectional: bool,
    ) -> Result<()> {
        self.graph.add_edge(from, to, time, cost, bidirectional)?;
        debug!(
            "Connected '{}' {} '{}' (time {}, cost {})",
            from,
            if bidirectional { "<->" } else { "->" },
            to,
            time,
            cost
        );
        Ok(())
    }

    pub fn disconnect(&mut self, from: &str, to: &str, bidirectional: bool) -> bool {
        self.graph.remove_edge(from, to, bidirectional)
    }

    pub fn route(&self, from: &str, to: &str, criterion: Criterion) -> Route {
        self.graph.shortest_path(from, to, criterion)
    }

    /// Up to `alternate_routes` distinct routes, best first
    pub fn alternate_routes(&self, from: &str, to: &str, criterion: Criterion) -> Vec<Route> {
        let k = self.catalog.config().alternate_routes;
        self.graph.k_alternate_paths(from, to, criterion, k)
    }

    /// Send an available book towards `destination`
    ///
    /// The book must be shelved somewhere and a route must exist. On
    /// success the book is marked in transit until [`Library::receive`].
    pub fn dispatch(&mut self, isbn: &str, destination: &str, criterion: Criterion) -> Result<Route> {
        let book = self
            .catalog
            .get_by_isbn(isbn)
            .ok_or_else(|| CatalogError::BookNotFound(isbn.to_string()))?;
        let key = book.isbn.clone();

        if self.transfers.contains_key(&key) {
            return Err(CatalogError::TransferPending(key));
        }
        if !book.is_available() {
            return Err(CatalogError::InvalidStatusTransition {
                from: book.status,
                to: BookStatus::InTransit,
            });
        }
        let origin = book
            .library
            .clone()
            .ok_or(CatalogError::MissingField("library"))?;
        if origin == destination.trim() {
            return Err(CatalogError::AlreadyShelved {
                isbn: key,
                library: origin,
            });
        }
        if !self.graph.has_node(destination) {
            return Err(CatalogError::UnknownLibrary(destination.to_string()));
        }

        let route = self.graph.shortest_path(&origin, destination, criterion);
        if !route.is_found() {
            return Err(CatalogError::NoRoute {
                from: origin,
                to: destination.to_string(),
            });
        }

        self.catalog.update_status(&key, BookStatus::InTransit)?;
        info!(
            "Dispatched {} from '{}' to '{}' ({} hops, weight {})",
            key,
            origin,
            destination,
            route.hops(),
            route.weight
        );

        self.transfers.insert(
            key.clone(),
            Transfer {
                isbn: key,
                from: origin,
                to: destination.to_string(),
                route: route.clone(),
            },
        );
        Ok(route)
    }

    /// Complete a pending transfer: shelve at the destination and mark available
    pub fn receive(&mut self, isbn: &str) -> Result<Transfer> {
        let key = normalize_isbn(isbn)?;
        let destination = self
            .transfers
            .get(&key)
            .map(|t| t.to.clone())
            .ok_or_else(|| CatalogError::NoTransfer(key.clone()))?;

        self.catalog.shelve(&key, Some(&destination))?;
        self.catalog.update_status(&key, BookStatus::Available)?;
        self.graph.add_node(&destination, None);

        info!("Received {} at '{}'", key, destination);
        self.transfers
            .remove(&key)
            .ok_or(CatalogError::NoTransfer(key))
    }

    /// Pending transfers ordered by ISBN
    pub fn pending_transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.values()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.catalog.snapshot()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating a [`Library`] with custom index settings
///
/// # Examples
///
/// ```rust
/// use libris_rs::{LibraryBuilder, Result};
///
/// # fn main() -> Result<()> {
/// let library = LibraryBuilder::new()
///     .min_degree(4)
///     .hash_capacity(101)
///     .alternate_routes(5)
///     .build()?;
///
/// assert_eq!(library.catalog().hash_statistics().capacity, 101);
/// # Ok(())
/// # }
/// ```
pub struct LibraryBuilder {
    config: CatalogConfig,
}

impl LibraryBuilder {
    pub fn new() -> Self {
        LibraryBuilder {
            config: CatalogConfig::default(),
        }
    }

    /// Start from a complete configuration (e.g. one loaded from TOML)
    pub fn config(mut self, config: CatalogConfig) -> Self {
        self.config = config;
        self
    }

    /// Minimum degree of both multiway trees
    pub fn min_degree(mut self, t: usize) -> Self {
        self.config.btree_min_degree = t;
        self.config.bplus_min_degree = t;
        self
    }

    /// Starting capacity of the ISBN index (rounded up to a prime)
    pub fn hash_capacity(mut self, capacity: usize) -> Self {
        self.config.hash_initial_capacity = capacity;
        self
    }

    pub fn alternate_routes(mut self, k: usize) -> Self {
        self.config.alternate_routes = k;
        self
    }

    /// Accepted publication years, inclusive
    pub fn year_range(mut self, min: i32, max: i32) -> Self {
        self.config.min_year = min;
        self.config.max_year = max;
        self
    }

    pub fn build(self) -> Result<Library> {
        info!(
            "Building library network (t={}/{}, hash capacity {})",
            self.config.btree_min_degree,
            self.config.bplus_min_degree,
            self.config.hash_initial_capacity
        );
        Library::with_config(self.config)
    }
}

impl Default for LibraryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
