//! Column Indexer Module
//!
//! One indexer per column, chosen by the column's `IndexerKind`:
//! - Unindexed: plain row set, full scans only
//! - Equality: encoded value -> rows (ahash map)
//! - Range: numeric key -> rows (`RangeTree`)
//!
//! Every indexer sits behind its own `ScopedLock`. Storage is only reached
//! through a `ReadHandle` or `WriteHandle`, each released exactly once
//! (drop, `release`, `commit` or `rollback`).

mod equality;
mod range;
mod unindexed;

pub use equality::EqualityStore;
pub use range::RangeStore;
pub use unindexed::UnindexedStore;

use crate::btree::CollectionMode;
use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::lock::{ReadScope, ScopedLock, WriteScope};
use crate::row::{Row, RowSet};
use crate::types::{ColumnSpec, IndexerKind};

/// Comparison requested by a unary predicate, decoded from its `u32` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Tag 0, one value follows
    Equal,
    /// Tags 1..=8, two values follow for `ClosedInterval`
    Range(CollectionMode),
}

impl Comparison {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Comparison::Equal),
            other => CollectionMode::from_tag(other).map(Comparison::Range),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            Comparison::Equal => 0,
            Comparison::Range(mode) => mode.tag(),
        }
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let tag = reader.read_u32()?;
        Self::from_tag(tag).ok_or_else(|| Error::decode(format!("unknown comparison tag {tag}")))
    }
}

/// Point or range lookup driven by a unary predicate payload.
pub trait FetchRows {
    /// Consume the payload following the column offset and return the
    /// matching rows.
    fn fetch(&self, reader: &mut ByteReader<'_>) -> Result<RowSet>;
}

/// Read side shared by every indexer.
pub trait IndexRead: FetchRows {
    fn count(&self) -> usize;
    fn contains(&self, row: &Row) -> bool;
    fn rows(&self) -> Box<dyn Iterator<Item = &Row> + '_>;
}

/// Write side shared by every indexer.
pub trait IndexWrite: IndexRead {
    /// Returns `false` when the row was already present.
    fn add(&mut self, row: Row) -> Result<bool>;
    /// Returns `false` when the row was not present.
    fn remove_exact(&mut self, row: &Row) -> Result<bool>;
    /// Drop every row, returning how many there were.
    fn clear(&mut self) -> usize;
}

/// Column indexer. The variant set is closed; callers match on it or go
/// through the handles.
#[derive(Debug)]
pub enum Indexer {
    Unindexed(ScopedLock<UnindexedStore>),
    Equality(ScopedLock<EqualityStore>),
    Range(ScopedLock<RangeStore>),
}

impl Indexer {
    /// Build the indexer for column `column` of the schema.
    pub fn new(column: usize, spec: &ColumnSpec, tree_degree: usize) -> Result<Self> {
        Ok(match spec.indexer {
            IndexerKind::Unindexed => Indexer::Unindexed(ScopedLock::new(UnindexedStore::new())),
            IndexerKind::Equality => {
                Indexer::Equality(ScopedLock::new(EqualityStore::new(column, spec.data_type)))
            }
            IndexerKind::Range => Indexer::Range(ScopedLock::new(RangeStore::new(
                column,
                spec.data_type,
                tree_degree,
            )?)),
        })
    }

    pub fn kind(&self) -> IndexerKind {
        match self {
            Indexer::Unindexed(_) => IndexerKind::Unindexed,
            Indexer::Equality(_) => IndexerKind::Equality,
            Indexer::Range(_) => IndexerKind::Range,
        }
    }

    pub fn read(&self) -> ReadHandle<'_> {
        match self {
            Indexer::Unindexed(lock) => ReadHandle::Unindexed(lock.read_acquire()),
            Indexer::Equality(lock) => ReadHandle::Equality(lock.read_acquire()),
            Indexer::Range(lock) => ReadHandle::Range(lock.read_acquire()),
        }
    }

    pub fn write(&self) -> WriteHandle<'_> {
        match self {
            Indexer::Unindexed(lock) => WriteHandle::Unindexed(lock.write_acquire()),
            Indexer::Equality(lock) => WriteHandle::Equality(lock.write_acquire()),
            Indexer::Range(lock) => WriteHandle::Range(lock.write_acquire()),
        }
    }
}

macro_rules! dispatch {
    ($handle:expr, $store:ident => $body:expr) => {
        match $handle {
            Self::Unindexed($store) => $body,
            Self::Equality($store) => $body,
            Self::Range($store) => $body,
        }
    };
}

/// Shared access to one indexer.
pub enum ReadHandle<'a> {
    Unindexed(ReadScope<'a, UnindexedStore>),
    Equality(ReadScope<'a, EqualityStore>),
    Range(ReadScope<'a, RangeStore>),
}

impl ReadHandle<'_> {
    pub fn release(self) {}
}

impl FetchRows for ReadHandle<'_> {
    fn fetch(&self, reader: &mut ByteReader<'_>) -> Result<RowSet> {
        dispatch!(self, store => store.fetch(reader))
    }
}

impl IndexRead for ReadHandle<'_> {
    fn count(&self) -> usize {
        dispatch!(self, store => store.count())
    }

    fn contains(&self, row: &Row) -> bool {
        dispatch!(self, store => store.contains(row))
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        dispatch!(self, store => store.rows())
    }
}

/// Exclusive access to one indexer.
pub enum WriteHandle<'a> {
    Unindexed(WriteScope<'a, UnindexedStore>),
    Equality(WriteScope<'a, EqualityStore>),
    Range(WriteScope<'a, RangeStore>),
}

impl WriteHandle<'_> {
    /// Release the lock. Mutations are applied eagerly, so this only ends the
    /// exclusive scope.
    pub fn commit(self) {}

    /// Release the lock without undoing anything already written.
    pub fn rollback(self) {}
}

impl FetchRows for WriteHandle<'_> {
    fn fetch(&self, reader: &mut ByteReader<'_>) -> Result<RowSet> {
        dispatch!(self, store => store.fetch(reader))
    }
}

impl IndexRead for WriteHandle<'_> {
    fn count(&self) -> usize {
        dispatch!(self, store => store.count())
    }

    fn contains(&self, row: &Row) -> bool {
        dispatch!(self, store => store.contains(row))
    }

    fn rows(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        dispatch!(self, store => store.rows())
    }
}

impl IndexWrite for WriteHandle<'_> {
    fn add(&mut self, row: Row) -> Result<bool> {
        dispatch!(self, store => store.add(row))
    }

    fn remove_exact(&mut self, row: &Row) -> Result<bool> {
        dispatch!(self, store => store.remove_exact(row))
    }

    fn clear(&mut self) -> usize {
        dispatch!(self, store => store.clear())
    }
}
