//! Registry Configuration
//!
//! Column layout, tree degree and buffer pool sizing.
//!
//! # Example
//! ```ignore
//! use tessera::{DataType, IndexerKind, RegistryConfig};
//!
//! let config = RegistryConfig::new()
//!     .column("id", DataType::Int64, IndexerKind::Range)
//!     .column("name", DataType::String, IndexerKind::Equality)
//!     .tree_degree(16);
//!
//! // Same thing from JSON
//! let config = RegistryConfig::from_json(r#"{
//!     "columns": [
//!         {"name": "id", "type": "int64", "indexer": "range"},
//!         {"name": "name", "type": "string", "indexer": "equality"}
//!     ],
//!     "tree_degree": 16
//! }"#)?;
//! ```

use crate::btree::MIN_DEGREE;
use crate::error::{Error, Result};
use crate::types::{ColumnSchema, ColumnSpec, DataType, IndexerKind};
use serde::{Deserialize, Serialize};

/// Buffer pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle buffers kept around for reuse
    pub max_pooled: usize,
    /// Buffers whose capacity grew past this are freed instead of pooled
    pub retain_threshold: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pooled: 64,
            retain_threshold: 1 << 20,
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ordered column layout
    pub columns: Vec<ColumnSpec>,
    /// Max keys per node for every range index
    pub tree_degree: usize,
    /// Scratch buffer pool
    pub pool: PoolConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            tree_degree: 32,
            pool: PoolConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Append a column
    pub fn column(mut self, name: &str, data_type: DataType, indexer: IndexerKind) -> Self {
        self.columns.push(ColumnSpec::new(name, data_type, indexer));
        self
    }

    /// Set range tree degree
    pub fn tree_degree(mut self, degree: usize) -> Self {
        self.tree_degree = degree;
        self
    }

    /// Set pool sizing
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Check the config and build the immutable schema from it.
    pub fn validate(&self) -> Result<ColumnSchema> {
        if self.tree_degree < MIN_DEGREE {
            return Err(Error::config(format!(
                "tree_degree must be at least {MIN_DEGREE}, got {}",
                self.tree_degree
            )));
        }
        ColumnSchema::new(self.columns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RegistryConfig::new()
            .column("id", DataType::Int32, IndexerKind::Range)
            .tree_degree(8);
        assert_eq!(config.columns.len(), 1);
        assert_eq!(config.tree_degree, 8);
        assert_eq!(config.validate().unwrap().len(), 1);
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = RegistryConfig::from_json(
            r#"{"columns": [
                {"name": "id", "type": "i64", "indexer": "btree"},
                {"name": "body", "type": "string"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(config.tree_degree, 32);
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.columns[0].data_type, DataType::Int64);
        assert_eq!(config.columns[0].indexer, IndexerKind::Range);
        assert_eq!(config.columns[1].indexer, IndexerKind::Unindexed);
    }

    #[test]
    fn test_bad_json_and_degree() {
        assert!(matches!(RegistryConfig::from_json("{"), Err(Error::Json(_))));
        let config = RegistryConfig::new()
            .column("id", DataType::Int32, IndexerKind::Range)
            .tree_degree(2);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
