//! Multi-index book catalog
//!
//! The catalog owns every [`Book`] in a single arena keyed by [`RecordId`]
//! and keeps four indexes over it:
//!
//! - title: [`AvlTree`]
//! - year: [`BTree`] (duplicates allowed, range queries)
//! - genre: [`BPlusTree`] (one bucket per genre, leaf-linked)
//! - ISBN: [`HashTable`] (unique)
//!
//! Indexes hold only [`BookRef`] handles. Non-key updates (status, author,
//! library) touch the arena alone; key-changing updates move the handle in
//! the one index keyed by that field. Every mutation is validated in full
//! before any index is touched, so a rejected call leaves no trace.

pub mod avl;
pub mod bplus;
pub mod btree;
pub mod hash;

pub use avl::AvlTree;
pub use bplus::BPlusTree;
pub use btree::{BTree, NodeView};
pub use hash::{HashStats, HashTable};

use crate::core::config::CatalogConfig;
use crate::core::error::{CatalogError, Result};
use crate::core::record::{Book, BookRef, BookStatus, RecordId};
use crate::core::validation::{normalize_isbn, require_text, validate_book, validate_year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Read-only, serializable view of the whole catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Records in title order
    pub books: Vec<Book>,
    pub year_counts: BTreeMap<i32, usize>,
    pub genre_counts: Vec<(String, usize)>,
    pub hash: HashStats,
    pub title_height: usize,
    pub year_height: usize,
    pub genre_height: usize,
}

impl CatalogSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Book store with title, year, genre and ISBN indexes
///
/// Not thread-safe; callers serialize access.
#[derive(Debug, Clone)]
pub struct Catalog {
    records: BTreeMap<RecordId, Book>,
    next_id: u64,
    titles: AvlTree<BookRef>,
    years: BTree<BookRef>,
    genres: BPlusTree<BookRef>,
    isbns: HashTable<BookRef>,
    config: CatalogConfig,
}

impl Catalog {
    /// Create an empty catalog with default settings
    pub fn new() -> Self {
        Self::build(CatalogConfig::default())
    }

    /// Create an empty catalog after validating `config`
    pub fn with_config(config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CatalogConfig) -> Self {
        info!(
            "Creating catalog (btree t={}, bplus t={}, hash capacity {})",
            config.btree_min_degree, config.bplus_min_degree, config.hash_initial_capacity
        );

        Catalog {
            records: BTreeMap::new(),
            next_id: 0,
            titles: AvlTree::new(),
            years: BTree::new(config.btree_min_degree),
            genres: BPlusTree::new(config.bplus_min_degree),
            isbns: HashTable::with_load_factor(
                config.hash_initial_capacity,
                config.hash_max_load_factor,
            ),
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Validate a book and add it to every index
    ///
    /// Rejects a duplicate ISBN or title before anything is written.
    pub fn insert(&mut self, book: Book) -> Result<RecordId> {
        let book = validate_book(&book, &self.config).map_err(|e| {
            warn!("Rejected book '{}': {}", book.title, e);
            e
        })?;

        if self.isbns.contains(&book.isbn) {
            warn!("Rejected duplicate ISBN {}", book.isbn);
            return Err(CatalogError::DuplicateIsbn(book.isbn));
        }
        if self.titles.contains(&book.title) {
            warn!("Rejected duplicate title '{}'", book.title);
            return Err(CatalogError::DuplicateTitle(book.title));
        }

        let id = RecordId(self.next_id);
        self.next_id += 1;

        let handle = BookRef::new(id, book.isbn.clone());
        self.titles.insert(book.title.clone(), handle.clone());
        self.years.insert(book.year, handle.clone());
        self.genres.insert(&book.genre, handle.clone());
        self.isbns.insert(handle);

        debug!("Inserted {} '{}' ({})", id, book.title, book.isbn);
        self.records.insert(id, book);
        Ok(id)
    }

    /// Insert every book, skipping (and logging) the ones that are rejected
    ///
    /// Returns the number of books added.
    pub fn insert_all<I>(&mut self, books: I) -> usize
    where
        I: IntoIterator<Item = Book>,
    {
        let mut added = 0;
        for book in books {
            let title = book.title.clone();
            match self.insert(book) {
                Ok(_) => added += 1,
                Err(e) => warn!("Skipping '{}': {}", title, e),
            }
        }
        info!("Bulk insert added {} books", added);
        added
    }

    /// Remove a book from every index
    ///
    /// Returns `Ok(None)` when no book has that ISBN; only a malformed ISBN
    /// is an error.
    pub fn remove(&mut self, isbn: &str) -> Result<Option<Book>> {
        let isbn = normalize_isbn(isbn)?;
        let id = match self.isbns.search(&isbn) {
            Some(handle) => handle.id,
            None => return Ok(None),
        };
        let book = match self.records.remove(&id) {
            Some(book) => book,
            None => return Ok(None),
        };

        self.isbns.delete(&isbn);
        self.titles.delete(&book.title);
        self.years.delete(book.year, &isbn);
        self.genres.delete(&book.genre, &isbn);

        debug!("Removed {} '{}' ({})", id, book.title, isbn);
        Ok(Some(book))
    }

    fn lookup(&self, isbn: &str) -> Option<RecordId> {
        let isbn = normalize_isbn(isbn).ok()?;
        self.isbns.search(&isbn).map(|handle| handle.id)
    }

    fn record_mut(&mut self, isbn: &str) -> Result<(RecordId, &mut Book)> {
        let id = self
            .lookup(isbn)
            .ok_or_else(|| CatalogError::BookNotFound(isbn.to_string()))?;
        let book = self
            .records
            .get_mut(&id)
            .ok_or_else(|| CatalogError::BookNotFound(isbn.to_string()))?;
        Ok((id, book))
    }

    fn resolve<'a>(&'a self, handles: impl IntoIterator<Item = &'a BookRef>) -> Vec<&'a Book> {
        handles
            .into_iter()
            .filter_map(|handle| self.records.get(&handle.id))
            .collect()
    }

    pub fn get(&self, id: RecordId) -> Option<&Book> {
        self.records.get(&id)
    }

    /// Look up by ISBN; hyphens and spaces are ignored
    pub fn get_by_isbn(&self, isbn: &str) -> Option<&Book> {
        self.lookup(isbn).and_then(|id| self.records.get(&id))
    }

    pub fn get_by_title(&self, title: &str) -> Option<&Book> {
        self.titles
            .search(title)
            .and_then(|handle| self.records.get(&handle.id))
    }

    pub fn find_by_genre(&self, genre: &str) -> Vec<&Book> {
        self.resolve(self.genres.search(genre))
    }

    pub fn find_by_year(&self, year: i32) -> Vec<&Book> {
        self.resolve(self.years.search_all(year))
    }

    /// Books published in `start..=end`, ascending by year
    pub fn find_in_years(&self, start: i32, end: i32) -> Vec<&Book> {
        self.resolve(self.years.range(start, end).into_iter().map(|(_, h)| h))
    }

    /// Books shelved at `library`
    pub fn books_at(&self, library: &str) -> Vec<&Book> {
        self.records
            .values()
            .filter(|b| b.library.as_deref() == Some(library))
            .collect()
    }

    /// All books in title order
    pub fn books(&self) -> Vec<&Book> {
        self.resolve(self.titles.iter().map(|(_, h)| h))
    }

    pub fn update_status(&mut self, isbn: &str, status: BookStatus) -> Result<()> {
        let (id, book) = self.record_mut(isbn)?;
        if !book.status.can_transition_to(status) {
            warn!("Rejected status change {} -> {} for {}", book.status, status, id);
            return Err(CatalogError::InvalidStatusTransition {
                from: book.status,
                to: status,
            });
        }

        debug!("Status of {} now {}", id, status);
        book.status = status;
        Ok(())
    }

    pub fn update_author(&mut self, isbn: &str, author: &str) -> Result<()> {
        let author = require_text(author, "author")?;
        let (_, book) = self.record_mut(isbn)?;
        book.author = author;
        Ok(())
    }

    /// Shelve a book at another library (or none)
    pub fn shelve(&mut self, isbn: &str, library: Option<&str>) -> Result<()> {
        let library = library.map(|l| require_text(l, "library")).transpose()?;
        let (id, book) = self.record_mut(isbn)?;
        debug!("Shelving {} at {:?}", id, library);
        book.library = library;
        Ok(())
    }

    /// Change a title, moving the handle in the title index
    pub fn retitle(&mut self, isbn: &str, title: &str) -> Result<()> {
        let title = require_text(title, "title")?;
        let id = self
            .lookup(isbn)
            .ok_or_else(|| CatalogError::BookNotFound(isbn.to_string()))?;
        let old = match self.records.get(&id) {
            Some(book) if book.title == title => return Ok(()),
            Some(book) => book.title.clone(),
            None => return Err(CatalogError::BookNotFound(isbn.to_string())),
        };
        if self.titles.contains(&title) {
            return Err(CatalogError::DuplicateTitle(title));
        }

        if let Some(handle) = self.titles.remove(&old) {
            self.titles.insert(title.clone(), handle);
        }
        debug!("Retitled {} '{}' -> '{}'", id, old, title);
        if let Some(book) = self.records.get_mut(&id) {
            book.title = title;
        }
        Ok(())
    }

    /// Change a genre, moving the handle between genre buckets
    pub fn regenre(&mut self, isbn: &str, genre: &str) -> Result<()> {
        let genre = require_text(genre, "genre")?;
        let (id, book) = self.record_mut(isbn)?;
        if book.genre == genre {
            return Ok(());
        }

        let old = std::mem::replace(&mut book.genre, genre.clone());
        let key = book.isbn.clone();
        if let Some(handle) = self.genres.remove(&old, &key) {
            self.genres.insert(&genre, handle);
        }
        debug!("Moved {} from genre '{}' to '{}'", id, old, genre);
        Ok(())
    }

    /// Change a publication year, moving the handle in the year index
    pub fn change_year(&mut self, isbn: &str, year: i32) -> Result<()> {
        validate_year(year, &self.config)?;
        let (id, book) = self.record_mut(isbn)?;
        if book.year == year {
            return Ok(());
        }

        let old = std::mem::replace(&mut book.year, year);
        let key = book.isbn.clone();
        if let Some(handle) = self.years.remove(old, &key) {
            self.years.insert(year, handle);
        }
        debug!("Moved {} from year {} to {}", id, old, year);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, isbn: &str) -> bool {
        self.lookup(isbn).is_some()
    }

    /// Titles in ascending order
    pub fn titles(&self) -> Vec<&str> {
        self.titles.iter().map(|(title, _)| title).collect()
    }

    pub fn genre_counts(&self) -> Vec<(String, usize)> {
        self.genres.list_genre_counts()
    }

    pub fn year_counts(&self) -> BTreeMap<i32, usize> {
        self.years.list_year_counts()
    }

    pub fn hash_statistics(&self) -> HashStats {
        self.isbns.statistics()
    }

    pub fn title_index(&self) -> &AvlTree<BookRef> {
        &self.titles
    }

    pub fn year_index(&self) -> &BTree<BookRef> {
        &self.years
    }

    pub fn genre_index(&self) -> &BPlusTree<BookRef> {
        &self.genres
    }

    pub fn isbn_index(&self) -> &HashTable<BookRef> {
        &self.isbns
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            books: self.books().into_iter().cloned().collect(),
            year_counts: self.year_counts(),
            genre_counts: self.genre_counts(),
            hash: self.hash_statistics(),
            title_height: self.titles.height(),
            year_height: self.years.height(),
            genre_height: self.genres.height(),
        }
    }

    /// Check every index's shape and that all four agree with the arena
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.titles.check_invariants()?;
        self.years.check_invariants(false)?;
        self.genres.check_invariants(false)?;
        self.isbns.check_invariants()?;

        let n = self.records.len();
        for (name, len) in [
            ("title", self.titles.len()),
            ("year", self.years.len()),
            ("genre", self.genres.len()),
            ("isbn", self.isbns.len()),
        ] {
            if len != n {
                return Err(format!("{} index holds {} entries, arena {}", name, len, n));
            }
        }

        for (&id, book) in &self.records {
            let by_isbn = self.isbns.search(&book.isbn).map(|h| h.id);
            let by_title = self.titles.search(&book.title).map(|h| h.id);
            let by_genre = self.genres.search(&book.genre).iter().any(|h| h.id == id);
            let by_year = self.years.search_all(book.year).iter().any(|h| h.id == id);

            if by_isbn != Some(id) || by_title != Some(id) || !by_genre || !by_year {
                return Err(format!("{} ({}) is missing from an index", id, book.isbn));
            }
        }

        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune() -> Book {
        Book::new("Dune", "1000000000000", "SciFi", 1965, "Herbert")
    }

    fn sample() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(dune()).unwrap();
        catalog
            .insert(Book::new("Emma", "9780141439587", "Classic", 1815, "Austen"))
            .unwrap();
        catalog
            .insert(Book::new("Neuromancer", "9780441569595", "SciFi", 1984, "Gibson"))
            .unwrap();
        catalog
    }

    #[test]
    fn test_insert_reaches_every_index() {
        let catalog = sample();

        assert_eq!(catalog.get_by_title("Dune").map(|b| b.year), Some(1965));
        assert_eq!(catalog.get_by_isbn("1000000000000").map(|b| b.title.as_str()), Some("Dune"));
        assert_eq!(catalog.find_by_genre("SciFi").len(), 2);
        let sixties: Vec<&str> = catalog
            .find_in_years(1960, 1970)
            .iter()
            .map(|b| b.title.as_str())
            .collect();
        assert_eq!(sixties, vec!["Dune"]);
        assert!(catalog.check_invariants().is_ok());
    }

    #[test]
    fn test_remove_clears_every_index() {
        let mut catalog = sample();
        let removed = catalog.remove("1000000000000").unwrap();
        assert_eq!(removed.map(|b| b.title), Some("Dune".to_string()));

        assert!(catalog.get_by_title("Dune").is_none());
        assert!(catalog.get_by_isbn("1000000000000").is_none());
        assert_eq!(catalog.find_by_genre("SciFi").len(), 1);
        assert!(catalog.find_in_years(1960, 1970).is_empty());
        assert_eq!(catalog.len(), 2);
        assert!(catalog.check_invariants().is_ok());

        assert!(catalog.remove("1000000000000").unwrap().is_none());
        assert!(matches!(catalog.remove("12"), Err(CatalogError::InvalidIsbn(_))));
    }

    #[test]
    fn test_duplicate_isbn_rejected() {
        let mut catalog = sample();
        let twin = Book::new("Dune Messiah", "1000000000000", "SciFi", 1969, "Herbert");

        assert!(matches!(catalog.insert(twin), Err(CatalogError::DuplicateIsbn(_))));
        assert_eq!(catalog.len(), 3);
        assert!(catalog.get_by_title("Dune Messiah").is_none());
        assert!(catalog.check_invariants().is_ok());
    }

    #[test]
    fn test_duplicate_title_rejected() {
        let mut catalog = sample();
        let other = Book::new("Dune", "2000000000000", "SciFi", 2021, "Villeneuve");

        assert!(matches!(catalog.insert(other), Err(CatalogError::DuplicateTitle(_))));
        assert_eq!(catalog.len(), 3);
        assert!(catalog.find_by_year(2021).is_empty());
    }

    #[test]
    fn test_validation_leaves_no_trace() {
        let mut catalog = Catalog::new();

        let bad_year = Book::new("Future", "3000000000000", "SciFi", 2100, "Nobody");
        assert!(catalog.insert(bad_year).unwrap_err().is_validation());

        let bad_isbn = Book::new("Short", "123", "SciFi", 2000, "Nobody");
        assert!(catalog.insert(bad_isbn).unwrap_err().is_validation());

        let blank = Book::new("  ", "3000000000000", "SciFi", 2000, "Nobody");
        assert!(matches!(catalog.insert(blank), Err(CatalogError::MissingField("title"))));

        assert!(catalog.is_empty());
        assert_eq!(catalog.hash_statistics().count, 0);
        assert!(catalog.check_invariants().is_ok());
    }

    #[test]
    fn test_isbn_is_normalized() {
        let mut catalog = Catalog::new();
        catalog
            .insert(Book::new("Emma", "978-0-14-143958-7", "Classic", 1815, "Austen"))
            .unwrap();

        assert_eq!(catalog.get_by_title("Emma").map(|b| b.isbn.as_str()), Some("9780141439587"));
        assert!(catalog.contains("978 0141 439587"));
        assert!(catalog.get_by_isbn("not an isbn").is_none());
    }

    #[test]
    fn test_status_updates_follow_transitions() {
        let mut catalog = sample();

        catalog.update_status("1000000000000", BookStatus::Loaned).unwrap();
        assert_eq!(
            catalog.get_by_title("Dune").map(|b| b.status),
            Some(BookStatus::Loaned)
        );

        let err = catalog
            .update_status("1000000000000", BookStatus::InTransit)
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidStatusTransition { .. }));

        catalog.update_status("1000000000000", BookStatus::Available).unwrap();
        assert!(matches!(
            catalog.update_status("9999999999999", BookStatus::Loaned),
            Err(CatalogError::BookNotFound(_))
        ));
    }

    #[test]
    fn test_key_changes_move_handles() {
        let mut catalog = sample();

        catalog.retitle("1000000000000", "Dune (1965)").unwrap();
        assert!(catalog.get_by_title("Dune").is_none());
        assert!(catalog.get_by_title("Dune (1965)").is_some());
        assert!(matches!(
            catalog.retitle("1000000000000", "Emma"),
            Err(CatalogError::DuplicateTitle(_))
        ));

        catalog.regenre("1000000000000", "Classic").unwrap();
        assert_eq!(catalog.find_by_genre("SciFi").len(), 1);
        assert_eq!(catalog.find_by_genre("Classic").len(), 2);

        catalog.change_year("1000000000000", 1966).unwrap();
        assert!(catalog.find_by_year(1965).is_empty());
        assert_eq!(catalog.find_by_year(1966).len(), 1);
        assert!(catalog.change_year("1000000000000", 999).is_err());

        catalog.update_author("1000000000000", "Frank Herbert").unwrap();
        assert_eq!(
            catalog.get_by_isbn("1000000000000").map(|b| b.author.as_str()),
            Some("Frank Herbert")
        );

        assert!(catalog.check_invariants().is_ok());
    }

    #[test]
    fn test_insert_all_skips_rejects() {
        let mut catalog = Catalog::new();
        let added = catalog.insert_all(vec![
            dune(),
            dune(),
            Book::new("Bad", "1", "X", 2000, "Y"),
            Book::new("Emma", "9780141439587", "Classic", 1815, "Austen"),
        ]);
        assert_eq!(added, 2);
        assert_eq!(catalog.titles(), vec!["Dune", "Emma"]);
    }

    #[test]
    fn test_snapshot_json() {
        let catalog = sample();
        let snapshot = catalog.snapshot();

        assert_eq!(snapshot.books.len(), 3);
        assert_eq!(snapshot.books[0].title, "Dune");
        assert_eq!(snapshot.hash.count, 3);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"Neuromancer\""));
        let back: CatalogSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.books, snapshot.books);
        assert_eq!(back.year_counts, snapshot.year_counts);
    }

    #[test]
    fn test_with_config_validates() {
        let config = CatalogConfig {
            btree_min_degree: 1,
            ..CatalogConfig::default()
        };
        assert!(matches!(Catalog::with_config(config), Err(CatalogError::Config(_))));
    }
}
