use crate::core::record::BookStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid ISBN: {0} (must contain exactly 13 digits)")]
    InvalidIsbn(String),

    #[error("Invalid year: {year} (must be within {min}..={max})")]
    InvalidYear { year: i32, min: i32, max: i32 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: BookStatus, to: BookStatus },

    #[error("Duplicate ISBN: {0}")]
    DuplicateIsbn(String),

    #[error("Duplicate title: {0}")]
    DuplicateTitle(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Unknown library: {0}")]
    UnknownLibrary(String),

    #[error("Library {0} still shelves books")]
    LibraryNotEmpty(String),

    #[error("Invalid edge weight: time={time}, cost={cost} (must be finite and non-negative)")]
    InvalidWeight { time: f64, cost: f64 },

    #[error("No route from {from} to {to}")]
    NoRoute { from: String, to: String },

    #[error("Book {isbn} is already shelved at {library}")]
    AlreadyShelved { isbn: String, library: String },

    #[error("Transfer already pending for {0}")]
    TransferPending(String),

    #[error("No pending transfer for {0}")]
    NoTransfer(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    /// True for the malformed-input family (rejected before any index is touched)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::InvalidIsbn(_)
                | CatalogError::InvalidYear { .. }
                | CatalogError::MissingField(_)
                | CatalogError::InvalidStatusTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
