// Tessera v0.1.0 - Column-Indexed In-Memory Row Store
// Binary predicate aggregation over per-column indexers

pub mod error;
pub mod lock;
pub mod btree;
pub mod types;
pub mod codec;
pub mod row;
pub mod pool;
pub mod config;
pub mod index;
pub mod aggregate;
pub mod protocol;
pub mod registry;

// Re-export main types
pub use error::{Error, Result};
pub use lock::{ScopedLock, ReadScope, WriteScope};
pub use btree::{RangeTree, RangeIter, CollectionMode, TreeStats};
pub use types::{DataType, IndexerKind, ColumnSpec, ColumnSchema, Value, Hash128, OrderedF64};
pub use codec::{ByteReader, ByteWriter};
pub use row::{Row, RowSet};
pub use pool::{BufferPool, PooledBuffer};
pub use config::{RegistryConfig, PoolConfig};
pub use index::{Indexer, ReadHandle, WriteHandle, FetchRows, IndexRead, IndexWrite, Comparison};
pub use aggregate::Predicate;
pub use protocol::{Command, Response};
pub use registry::IndexRegistry;
