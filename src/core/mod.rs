//! Catalog engine: record model, indexes, routing graph and their contracts

pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod record;
pub mod validation;

pub use catalog::{Catalog, CatalogSnapshot};
pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use graph::{Criterion, LibraryGraph, Route};
pub use record::{Book, BookRef, BookStatus, RecordId};
