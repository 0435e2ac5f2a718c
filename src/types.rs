use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Primitive column type. The `u8` tag is what goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "i32", alias = "int")]
    Int32,
    #[serde(alias = "i64", alias = "long")]
    Int64,
    #[serde(alias = "f64", alias = "float")]
    Double,
    #[serde(alias = "str")]
    String,
    #[serde(alias = "blob")]
    Bytes,
    #[serde(alias = "hash")]
    Hash128,
}

impl DataType {
    pub fn tag(self) -> u8 {
        match self {
            DataType::Int32 => 0,
            DataType::Int64 => 1,
            DataType::Double => 2,
            DataType::String => 3,
            DataType::Bytes => 4,
            DataType::Hash128 => 5,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => DataType::Int32,
            1 => DataType::Int64,
            2 => DataType::Double,
            3 => DataType::String,
            4 => DataType::Bytes,
            5 => DataType::Hash128,
            _ => return None,
        })
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "int32" | "i32" | "int" => Some(DataType::Int32),
            "int64" | "i64" | "long" => Some(DataType::Int64),
            "double" | "f64" | "float" => Some(DataType::Double),
            "string" | "str" => Some(DataType::String),
            "bytes" | "blob" => Some(DataType::Bytes),
            "hash128" | "hash" => Some(DataType::Hash128),
            _ => None,
        }
    }

    /// Types a range index can key on.
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Double)
    }
}

/// Index structure backing a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerKind {
    /// Full row set only, no point queries
    #[default]
    #[serde(alias = "none")]
    Unindexed,
    /// Hash map from value to rows
    #[serde(alias = "hash")]
    Equality,
    /// Ordered tree from numeric value to rows
    #[serde(alias = "btree")]
    Range,
}

impl IndexerKind {
    pub fn tag(self) -> u8 {
        match self {
            IndexerKind::Unindexed => 0,
            IndexerKind::Equality => 1,
            IndexerKind::Range => 2,
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unindexed" | "none" | "off" => Some(IndexerKind::Unindexed),
            "equality" | "hash" | "eq" => Some(IndexerKind::Equality),
            "range" | "btree" | "ordered" => Some(IndexerKind::Range),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub indexer: IndexerKind,
}

impl ColumnSpec {
    pub fn new(name: &str, data_type: DataType, indexer: IndexerKind) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            indexer,
        }
    }
}

/// Ordered column layout, fixed for the lifetime of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnSchema {
    columns: Vec<ColumnSpec>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::config("schema has no columns"));
        }
        if self.columns.len() > i32::MAX as usize {
            return Err(Error::config("too many columns"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::config(format!("duplicate column name '{}'", column.name)));
            }
            if column.indexer == IndexerKind::Range && !column.data_type.is_numeric() {
                return Err(Error::schema(format!(
                    "column '{}' of type {:?} cannot back a range index",
                    column.name, column.data_type
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnSpec> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnSpec> {
        self.columns.iter()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn data_type(&self, index: usize) -> Option<DataType> {
        self.columns.get(index).map(|c| c.data_type)
    }

    pub fn indexed_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.indexer != IndexerKind::Unindexed)
            .count()
    }
}

/// Fixed-size 128-bit hash value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash128(pub [u8; 16]);

impl Hash128 {
    pub const SIZE: usize = 16;

    pub fn from_u128(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn as_u128(&self) -> u128 {
        u128::from_le_bytes(self.0)
    }
}

/// `f64` ordered by `total_cmp`, so it can key a range tree.
#[derive(Debug, Clone, Copy)]
pub struct OrderedF64(pub f64);

impl PartialEq for OrderedF64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Hash(Hash128),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Double(_) => DataType::Double,
            Value::Str(_) => DataType::String,
            Value::Bytes(_) => DataType::Bytes,
            Value::Hash(_) => DataType::Hash128,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Hash128> for Value {
    fn from(v: Hash128) -> Self {
        Value::Hash(v)
    }
}
