//! Input contracts enforced at the catalog boundary
//!
//! None of the indexes validate their input; everything that reaches them
//! has already passed through this module:
//! - ISBNs normalize to exactly 13 ASCII digits
//! - Years fall inside the configured window
//! - Title, genre and author are non-blank

use crate::core::config::CatalogConfig;
use crate::core::error::{CatalogError, Result};
use crate::core::record::Book;
use regex::Regex;
use std::sync::OnceLock;

/// A normalized 13-digit ISBN
///
/// # Rules
/// - Every non-digit character is stripped ("978-0-14-143958-7" is fine)
/// - Exactly 13 digits must remain
///
/// # Examples
///
/// ```
/// use libris_rs::core::validation::Isbn;
///
/// let isbn = Isbn::new("978-0-14-143958-7").unwrap();
/// assert_eq!(isbn.as_str(), "9780141439587");
///
/// assert!(Isbn::new("12345").is_err());
/// assert!(Isbn::new("978014143958X").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Isbn(String);

impl Isbn {
    /// Pattern a normalized ISBN must match
    const PATTERN: &'static str = r"^[0-9]{13}$";

    /// Required digit count
    pub const DIGITS: usize = 13;

    pub fn new(raw: &str) -> Result<Self> {
        let digits = non_digits().replace_all(raw, "");

        if !isbn_pattern().is_match(&digits) {
            return Err(CatalogError::InvalidIsbn(raw.to_string()));
        }

        Ok(Isbn(digits.into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn non_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9]").expect("literal pattern compiles"))
}

fn isbn_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(Isbn::PATTERN).expect("literal pattern compiles"))
}

/// Normalize a raw ISBN string
pub fn normalize_isbn(raw: &str) -> Result<String> {
    Isbn::new(raw).map(Isbn::into_string)
}

/// Check a publication year against the configured window (inclusive)
pub fn validate_year(year: i32, config: &CatalogConfig) -> Result<()> {
    if year < config.min_year || year > config.max_year {
        return Err(CatalogError::InvalidYear {
            year,
            min: config.min_year,
            max: config.max_year,
        });
    }
    Ok(())
}

/// Trim a required text field, rejecting blanks
pub fn require_text(value: &str, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// Validate a book and return its normalized form
///
/// Title, genre and author are trimmed, the ISBN is reduced to its digits
/// and the library id (if any) is trimmed. The input is left untouched on
/// error.
pub fn validate_book(book: &Book, config: &CatalogConfig) -> Result<Book> {
    let title = require_text(&book.title, "title")?;
    let isbn = normalize_isbn(&book.isbn)?;
    let genre = require_text(&book.genre, "genre")?;
    let author = require_text(&book.author, "author")?;
    validate_year(book.year, config)?;

    let library = match &book.library {
        Some(lib) => Some(require_text(lib, "library")?),
        None => None,
    };

    Ok(Book {
        title,
        isbn,
        genre,
        year: book.year,
        author,
        status: book.status,
        library,
    })
}
