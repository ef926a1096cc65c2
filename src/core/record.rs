//! Book records and the handles the indexes store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Circulation status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// On the shelf at its library
    Available,
    /// Travelling between two libraries
    InTransit,
    /// Checked out by a reader
    Loaned,
    /// Listed in the catalog but no copy on hand
    OutOfStock,
}

impl BookStatus {
    /// Whether a book may move from `self` to `next`
    ///
    /// Every non-available state only returns to `Available`; staying in
    /// the same state is always allowed.
    pub fn can_transition_to(self, next: BookStatus) -> bool {
        use BookStatus::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Available, InTransit)
                | (Available, Loaned)
                | (Available, OutOfStock)
                | (InTransit, Available)
                | (Loaned, Available)
                | (OutOfStock, Available)
        )
    }
}

impl Default for BookStatus {
    fn default() -> Self {
        BookStatus::Available
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookStatus::Available => "available",
            BookStatus::InTransit => "in_transit",
            BookStatus::Loaned => "loaned",
            BookStatus::OutOfStock => "out_of_stock",
        };
        f.write_str(s)
    }
}

/// A catalogued book
///
/// The ISBN is the identity key; every other field may change over the
/// record's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub isbn: String,
    pub genre: String,
    pub year: i32,
    pub author: String,

    #[serde(default)]
    pub status: BookStatus,

    /// Library node the book is shelved at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

impl Book {
    /// Create an available book with no library assignment
    pub fn new(
        title: impl Into<String>,
        isbn: impl Into<String>,
        genre: impl Into<String>,
        year: i32,
        author: impl Into<String>,
    ) -> Self {
        Book {
            title: title.into(),
            isbn: isbn.into(),
            genre: genre.into(),
            year,
            author: author.into(),
            status: BookStatus::Available,
            library: None,
        }
    }

    /// Shelve the book at a library
    pub fn at_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn with_status(mut self, status: BookStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }
}

/// Stable handle of a record inside the catalog arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-owning reference the indexes hold for an arena record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRef {
    pub id: RecordId,
    pub isbn: String,
}

impl BookRef {
    pub fn new(id: RecordId, isbn: impl Into<String>) -> Self {
        BookRef {
            id,
            isbn: isbn.into(),
        }
    }
}

/// Values an index can hold: anything that knows its ISBN
pub trait Identity {
    fn isbn(&self) -> &str;
}

impl Identity for Book {
    fn isbn(&self) -> &str {
        &self.isbn
    }
}

impl Identity for BookRef {
    fn isbn(&self) -> &str {
        &self.isbn
    }
}
