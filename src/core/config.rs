//! Catalog tunables
//!
//! Every field has a default, so a TOML file only needs the keys it
//! overrides:
//!
//! ```toml
//! btree_min_degree = 4
//! hash_initial_capacity = 101
//! alternate_routes = 5
//! ```

use crate::core::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration shared by the catalog indexes and the routing layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Minimum degree `t` of the year index (B-Tree)
    pub btree_min_degree: usize,

    /// Minimum degree `t` of the genre index (B+Tree)
    pub bplus_min_degree: usize,

    /// Requested starting capacity of the ISBN index (rounded up to a prime)
    pub hash_initial_capacity: usize,

    /// Load factor above which the ISBN index rehashes
    pub hash_max_load_factor: f64,

    /// Earliest accepted publication year
    pub min_year: i32,

    /// Latest accepted publication year
    pub max_year: i32,

    /// Number of routes `alternate_routes` asks for
    pub alternate_routes: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            btree_min_degree: 3,
            bplus_min_degree: 3,
            hash_initial_capacity: 17,
            hash_max_load_factor: 0.75,
            min_year: 1000,
            max_year: 2025,
            alternate_routes: 3,
        }
    }
}

impl CatalogConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: CatalogConfig =
            toml::from_str(source).map_err(|e| CatalogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CatalogError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.btree_min_degree < 2 {
            return Err(CatalogError::Config(format!(
                "btree_min_degree must be >= 2, got {}",
                self.btree_min_degree
            )));
        }

        if self.bplus_min_degree < 2 {
            return Err(CatalogError::Config(format!(
                "bplus_min_degree must be >= 2, got {}",
                self.bplus_min_degree
            )));
        }

        if self.hash_initial_capacity == 0 {
            return Err(CatalogError::Config(
                "hash_initial_capacity must be positive".to_string(),
            ));
        }

        if !(self.hash_max_load_factor > 0.0 && self.hash_max_load_factor <= 1.0) {
            return Err(CatalogError::Config(format!(
                "hash_max_load_factor must be in (0, 1], got {}",
                self.hash_max_load_factor
            )));
        }

        if self.min_year > self.max_year {
            return Err(CatalogError::Config(format!(
                "min_year {} is after max_year {}",
                self.min_year, self.max_year
            )));
        }

        if self.alternate_routes == 0 {
            return Err(CatalogError::Config(
                "alternate_routes must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
