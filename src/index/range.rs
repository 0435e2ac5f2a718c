//! Range index
//!
//! Numeric column value -> set of rows, kept in a `RangeTree` so closed
//! intervals can be collected in key order. Rows sharing a key share a
//! bucket; a bucket is dropped from the tree when its last row goes.

use super::{Comparison, FetchRows, IndexRead, IndexWrite};
use crate::btree::RangeTree;
use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::row::{new_row_set, Row, RowSet};
use crate::types::{DataType, OrderedF64};
use std::fmt::Debug;

/// Numeric key a range index can order by.
pub trait RangeKey: Ord + Copy + Debug {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self>;
}

impl RangeKey for i32 {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.read_i32()
    }
}

impl RangeKey for i64 {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.read_i64()
    }
}

impl RangeKey for OrderedF64 {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.read_f64().map(OrderedF64)
    }
}

#[derive(Debug)]
enum Keys {
    Int32(RangeTree<i32, RowSet>),
    Int64(RangeTree<i64, RowSet>),
    Double(RangeTree<OrderedF64, RowSet>),
}

macro_rules! with_tree {
    ($keys:expr, $tree:ident => $body:expr) => {
        match $keys {
            Keys::Int32($tree) => $body,
            Keys::Int64($tree) => $body,
            Keys::Double($tree) => $body,
        }
    };
}

#[derive(Debug)]
pub struct RangeStore {
    column: usize,
    keys: Keys,
    len: usize,
}

impl RangeStore {
    pub fn new(column: usize, data_type: DataType, degree: usize) -> Result<Self> {
        let keys = match data_type {
            DataType::Int32 => Keys::Int32(RangeTree::new(degree)?),
            DataType::Int64 => Keys::Int64(RangeTree::new(degree)?),
            DataType::Double => Keys::Double(RangeTree::new(degree)?),
            other => {
                return Err(Error::schema(format!(
                    "column {column} of type {other:?} cannot back a range index"
                )))
            }
        };
        Ok(Self { column, keys, len: 0 })
    }

    /// Distinct keys currently in the tree.
    pub fn distinct(&self) -> usize {
        with_tree!(&self.keys, tree => tree.len())
    }

    /// Tree shape, for diagnostics.
    pub fn stats(&self) -> crate::btree::TreeStats {
        with_tree!(&self.keys, tree => tree.stats())
    }

    fn key_of<K: RangeKey>(column: usize, row: &Row) -> Result<K> {
        let raw = row
            .column_bytes(column)
            .ok_or_else(|| Error::schema(format!("row has no column {column}")))?;
        K::read(&mut ByteReader::new(raw))
    }
}

fn fetch_from<K: RangeKey>(tree: &RangeTree<K, RowSet>, reader: &mut ByteReader<'_>) -> Result<RowSet> {
    match Comparison::read(reader)? {
        Comparison::Equal => {
            let key = K::read(reader)?;
            Ok(tree.try_get(&key).cloned().unwrap_or_else(new_row_set))
        }
        Comparison::Range(mode) => {
            mode.ensure_implemented()?;
            let left = K::read(reader)?;
            let right = K::read(reader)?;
            let mut out = new_row_set();
            for (_, rows) in tree.collect(left, right, mode)? {
                out.extend(rows.iter().cloned());
            }
            Ok(out)
        }
    }
}

fn add_to<K: RangeKey>(tree: &mut RangeTree<K, RowSet>, key: K, row: Row) -> bool {
    if let Some(rows) = tree.get_mut(&key) {
        return rows.insert(row);
    }
    let mut rows = new_row_set();
    rows.insert(row);
    tree.insert(key, rows);
    true
}

fn remove_from<K: RangeKey>(tree: &mut RangeTree<K, RowSet>, key: K, row: &Row) -> bool {
    let Some(rows) = tree.get_mut(&key) else {
        return false;
    };
    let removed = rows.remove(row);
    if rows.is_empty() {
        tree.remove(&key);
    }
    removed
}

impl FetchRows for RangeStore {
    fn fetch(&self, reader: &mut ByteReader<'_>) -> Result<RowSet> {
        with_tree!(&self.keys, tree => fetch_from(tree, reader))
    }
}

impl IndexRead for RangeStore {
    fn count(&self) -> usize {
        self.len
    }

    fn contains(&self, row: &Row) -> bool {
        let column = self.column;
        with_tree!(&self.keys, tree => Self::key_of(column, row)
            .ok()
            .and_then(|key| tree.try_get(&key))
            .is_some_and(|rows| rows.contains(row)))
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        with_tree!(&self.keys, tree => Box::new(tree.iter().flat_map(|(_, rows)| rows.iter())))
    }
}

impl IndexWrite for RangeStore {
    fn add(&mut self, row: Row) -> Result<bool> {
        let column = self.column;
        let added = with_tree!(&mut self.keys, tree => {
            let key = Self::key_of(column, &row)?;
            add_to(tree, key, row)
        });
        if added {
            self.len += 1;
        }
        Ok(added)
    }

    fn remove_exact(&mut self, row: &Row) -> Result<bool> {
        let column = self.column;
        let removed = with_tree!(&mut self.keys, tree => {
            let key = Self::key_of(column, row)?;
            remove_from(tree, key, row)
        });
        if removed {
            self.len -= 1;
        }
        Ok(removed)
    }

    fn clear(&mut self) -> usize {
        let n = self.len;
        with_tree!(&mut self.keys, tree => tree.clear());
        self.len = 0;
        n
    }
}
