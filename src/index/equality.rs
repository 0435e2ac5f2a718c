//! Equality index
//!
//! Encoded column value -> set of rows carrying it. Keys are the column's
//! wire bytes, which the codec keeps canonical, so a lookup value encoded
//! by a client matches the bytes stored in the row.

use super::{Comparison, FetchRows, IndexRead, IndexWrite};
use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::row::{new_row_set, Row, RowSet};
use crate::types::DataType;
use std::collections::HashMap;

type Buckets = HashMap<Box<[u8]>, RowSet, ahash::RandomState>;

#[derive(Debug)]
pub struct EqualityStore {
    column: usize,
    data_type: DataType,
    buckets: Buckets,
    len: usize,
}

impl EqualityStore {
    pub fn new(column: usize, data_type: DataType) -> Self {
        Self {
            column,
            data_type,
            buckets: Buckets::with_hasher(ahash::RandomState::new()),
            len: 0,
        }
    }

    /// Distinct values currently indexed.
    pub fn distinct(&self) -> usize {
        self.buckets.len()
    }

    fn key_of<'r>(&self, row: &'r Row) -> Result<&'r [u8]> {
        row.column_bytes(self.column)
            .ok_or_else(|| Error::schema(format!("row has no column {}", self.column)))
    }
}

impl FetchRows for EqualityStore {
    fn fetch(&self, reader: &mut ByteReader<'_>) -> Result<RowSet> {
        match Comparison::read(reader)? {
            Comparison::Equal => {
                let key = reader.read_value_bytes(self.data_type)?;
                Ok(self.buckets.get(key).cloned().unwrap_or_else(new_row_set))
            }
            Comparison::Range(mode) => Err(Error::unsupported(format!(
                "equality index on column {} cannot answer {mode:?} queries",
                self.column
            ))),
        }
    }
}

impl IndexRead for EqualityStore {
    fn count(&self) -> usize {
        self.len
    }

    fn contains(&self, row: &Row) -> bool {
        self.key_of(row)
            .ok()
            .and_then(|key| self.buckets.get(key))
            .is_some_and(|rows| rows.contains(row))
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        Box::new(self.buckets.values().flatten())
    }
}

impl IndexWrite for EqualityStore {
    fn add(&mut self, row: Row) -> Result<bool> {
        let key = self.key_of(&row)?;
        let added = match self.buckets.get_mut(key) {
            Some(rows) => rows.insert(row),
            None => {
                let key: Box<[u8]> = key.into();
                let mut rows = new_row_set();
                rows.insert(row);
                self.buckets.insert(key, rows);
                true
            }
        };
        if added {
            self.len += 1;
        }
        Ok(added)
    }

    fn remove_exact(&mut self, row: &Row) -> Result<bool> {
        let key = self.key_of(row)?;
        let Some(rows) = self.buckets.get_mut(key) else {
            return Ok(false);
        };
        let removed = rows.remove(row);
        if rows.is_empty() {
            self.buckets.remove(key);
        }
        if removed {
            self.len -= 1;
        }
        Ok(removed)
    }

    fn clear(&mut self) -> usize {
        let n = self.len;
        self.buckets.clear();
        self.len = 0;
        n
    }
}
