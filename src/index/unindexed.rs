//! Unindexed column store
//!
//! Holds every row and nothing else. Point queries are refused.

use super::{FetchRows, IndexRead, IndexWrite};
use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::row::{new_row_set, Row, RowSet};

#[derive(Debug)]
pub struct UnindexedStore {
    rows: RowSet,
}

impl UnindexedStore {
    pub fn new() -> Self {
        Self { rows: new_row_set() }
    }
}

impl Default for UnindexedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchRows for UnindexedStore {
    fn fetch(&self, _reader: &mut ByteReader<'_>) -> Result<RowSet> {
        Err(Error::unsupported("fetch on an unindexed column"))
    }
}

impl IndexRead for UnindexedStore {
    fn count(&self) -> usize {
        self.rows.len()
    }

    fn contains(&self, row: &Row) -> bool {
        self.rows.contains(row)
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        Box::new(self.rows.iter())
    }
}

impl IndexWrite for UnindexedStore {
    fn add(&mut self, row: Row) -> Result<bool> {
        Ok(self.rows.insert(row))
    }

    fn remove_exact(&mut self, row: &Row) -> Result<bool> {
        Ok(self.rows.remove(row))
    }

    fn clear(&mut self) -> usize {
        let n = self.rows.len();
        self.rows.clear();
        n
    }
}
