//! Index Registry
//!
//! Owns the column schema and one `Indexer` per column. Every operation
//! takes its handles in ascending column order, readers and writers alike,
//! so concurrent callers can never wait on each other in a cycle.
//!
//! # Example
//! ```ignore
//! use tessera::{DataType, IndexRegistry, IndexerKind, Predicate, RegistryConfig, Row, Value};
//!
//! let registry = IndexRegistry::new(
//!     RegistryConfig::new()
//!         .column("id", DataType::Int32, IndexerKind::Range)
//!         .column("name", DataType::String, IndexerKind::Unindexed),
//! )?;
//! let row = Row::from_values(registry.schema(), &[Value::Int32(1), Value::from("a")])?;
//! registry.bulk_insert(vec![row])?;
//! let rows = registry.aggregate(&Predicate::between(0, 0, 10).to_bytes())?;
//! ```

use crate::aggregate::aggregate;
use crate::codec::ByteReader;
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::index::{IndexRead, IndexWrite, Indexer, ReadHandle, WriteHandle};
use crate::pool::{BufferPool, PooledBuffer};
use crate::protocol::{self, Command};
use crate::row::{Row, RowSet};
use crate::types::ColumnSchema;
use std::time::Instant;

/// Initial capacity of a response buffer.
const RESPONSE_CAPACITY: usize = 256;

pub struct IndexRegistry {
    schema: ColumnSchema,
    /// One per column, same order as the schema
    indexers: Vec<Indexer>,
    tree_degree: usize,
    pool: BufferPool,
}

impl IndexRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let schema = config.validate()?;
        let indexers = schema
            .iter()
            .enumerate()
            .map(|(column, spec)| Indexer::new(column, spec, config.tree_degree))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(
            columns = schema.len(),
            indexed_columns = schema.indexed_count(),
            tree_degree = config.tree_degree,
            "index registry ready"
        );
        Ok(Self {
            schema,
            indexers,
            tree_degree: config.tree_degree,
            pool: BufferPool::new(&config.pool),
        })
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn indexed_column_count(&self) -> usize {
        self.schema.indexed_count()
    }

    pub fn tree_degree(&self) -> usize {
        self.tree_degree
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn indexer(&self, column: usize) -> Option<&Indexer> {
        self.indexers.get(column)
    }

    fn read_handles(&self) -> Vec<ReadHandle<'_>> {
        self.indexers.iter().map(Indexer::read).collect()
    }

    fn write_handles(&self) -> Vec<WriteHandle<'_>> {
        self.indexers.iter().map(Indexer::write).collect()
    }

    /// Total rows held.
    pub fn count(&self) -> usize {
        self.indexers.first().map_or(0, |indexer| indexer.read().count())
    }

    /// Insert rows into every indexer. Each row is checked against the schema
    /// before any lock is taken, so a bad row rejects the whole batch.
    /// Returns the number of rows that were not already present.
    pub fn bulk_insert(&self, rows: impl IntoIterator<Item = Row>) -> Result<usize> {
        let rows: Vec<Row> = rows.into_iter().collect();
        for row in &rows {
            self.check_row(row)?;
        }
        self.insert_rows(rows)
    }

    fn check_row(&self, row: &Row) -> Result<()> {
        let mut reader = ByteReader::new(row.as_bytes());
        Row::decode(&self.schema, &mut reader)
            .and_then(|_| reader.expect_end())
            .map_err(|e| Error::schema(format!("row does not match the column layout: {e}")))
    }

    fn insert_rows(&self, rows: Vec<Row>) -> Result<usize> {
        let mut handles = self.write_handles();
        let mut inserted = 0;
        for row in rows {
            let mut added = false;
            for (column, handle) in handles.iter_mut().enumerate() {
                let fresh = handle.add(row.clone())?;
                if column == 0 {
                    added = fresh;
                }
            }
            if added {
                inserted += 1;
            }
        }
        handles.into_iter().for_each(WriteHandle::commit);
        Ok(inserted)
    }

    /// Rows matching an encoded predicate.
    pub fn aggregate(&self, predicate: &[u8]) -> Result<RowSet> {
        self.aggregate_from(&mut ByteReader::new(predicate))
    }

    fn aggregate_from(&self, reader: &mut ByteReader<'_>) -> Result<RowSet> {
        let handles = self.read_handles();
        let rows = aggregate(reader, &handles)?;
        reader.expect_end()?;
        Ok(rows)
    }

    /// Remove every row matching an encoded predicate from every indexer.
    /// The predicate is evaluated under the write handles, so nothing can be
    /// inserted between matching and removal.
    pub fn remove(&self, predicate: &[u8]) -> Result<usize> {
        self.remove_from(&mut ByteReader::new(predicate))
    }

    fn remove_from(&self, reader: &mut ByteReader<'_>) -> Result<usize> {
        let mut handles = self.write_handles();
        let matched = aggregate(reader, &handles)?;
        reader.expect_end()?;
        let mut removed = 0;
        for row in &matched {
            let mut gone = false;
            for (column, handle) in handles.iter_mut().enumerate() {
                let hit = handle.remove_exact(row)?;
                if column == 0 {
                    gone = hit;
                }
            }
            if gone {
                removed += 1;
            }
        }
        handles.into_iter().for_each(WriteHandle::commit);
        Ok(removed)
    }

    /// Drop every row. Returns how many there were.
    pub fn clear(&self) -> usize {
        let mut handles = self.write_handles();
        let mut cleared = 0;
        for (column, handle) in handles.iter_mut().enumerate() {
            let n = handle.clear();
            if column == 0 {
                cleared = n;
            }
        }
        handles.into_iter().for_each(WriteHandle::commit);
        tracing::debug!(rows = cleared, "registry cleared");
        cleared
    }

    /// Decode one request, run it and encode the response. Failures become
    /// a faulted response; registry state is untouched by decode errors.
    pub fn consume_request(&self, input: &[u8]) -> PooledBuffer {
        let started = Instant::now();
        let mut out = self.pool.rent(RESPONSE_CAPACITY);
        let mut reader = ByteReader::new(input);
        match self.dispatch(&mut reader, &mut out) {
            Ok(command) => {
                tracing::debug!(
                    command = command.as_str(),
                    bytes_in = input.len(),
                    bytes_out = out.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "request served"
                );
            }
            Err(err) => {
                out.clear();
                protocol::write_fault(&mut *out, &err);
                tracing::warn!(
                    code = err.code(),
                    error = %err,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "request faulted"
                );
            }
        }
        out
    }

    fn dispatch(&self, reader: &mut ByteReader<'_>, out: &mut Vec<u8>) -> Result<Command> {
        let command = Command::read(reader)?;
        match command {
            Command::Insert => {
                let declared = reader.read_u32()? as usize;
                let mut rows = Vec::with_capacity(declared.min(reader.remaining()));
                for _ in 0..declared {
                    rows.push(Row::decode(&self.schema, reader)?);
                }
                reader.expect_end()?;
                let inserted = self.insert_rows(rows)?;
                protocol::write_count(out, inserted);
            }
            Command::Aggregate => {
                let rows = self.aggregate_from(reader)?;
                protocol::write_rows(out, &self.schema, rows.iter());
            }
            Command::Remove => {
                let removed = self.remove_from(reader)?;
                protocol::write_count(out, removed);
            }
            Command::Clear => {
                reader.expect_end()?;
                protocol::write_count(out, self.clear());
            }
            Command::Count => {
                reader.expect_end()?;
                protocol::write_count(out, self.count());
            }
            Command::Describe => {
                reader.expect_end()?;
                protocol::write_describe(out, &self.schema);
            }
        }
        Ok(command)
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("columns", &self.schema.len())
            .field("indexed_columns", &self.schema.indexed_count())
            .field("tree_degree", &self.tree_degree)
            .finish()
    }
}
