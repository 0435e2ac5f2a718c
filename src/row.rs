//! Rows and row sets
//!
//! A row is the concatenation of its encoded column values. Rows are
//! immutable, cheaply cloned (`Arc`) and compared by content: two rows with
//! the same bytes are the same row for every set and index.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{Error, Result};
use crate::types::{ColumnSchema, Value};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Deduplicated set of rows.
pub type RowSet = HashSet<Row, ahash::RandomState>;

pub fn new_row_set() -> RowSet {
    RowSet::with_hasher(ahash::RandomState::new())
}

struct RowData {
    bytes: Box<[u8]>,
    /// Start offset of every column, plus the total length at the end
    offsets: SmallVec<[u32; 8]>,
}

/// Offsets are stored as `u32`, which caps a row at 4 GiB.
fn column_offset(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::decode(format!("row of {len} bytes exceeds the u32 offset range")))
}

#[derive(Clone)]
pub struct Row(Arc<RowData>);

impl Row {
    /// Decode one row laid out per `schema`, validating every column.
    pub fn decode(schema: &ColumnSchema, reader: &mut ByteReader<'_>) -> Result<Self> {
        let start = reader.position();
        let mut offsets = SmallVec::with_capacity(schema.len() + 1);
        for column in schema.iter() {
            offsets.push(column_offset(reader.position() - start)?);
            reader.read_value_bytes(column.data_type)?;
        }
        offsets.push(column_offset(reader.position() - start)?);
        let bytes = reader.slice(start, reader.position())?.into();
        Ok(Self(Arc::new(RowData { bytes, offsets })))
    }

    /// Encode a row from values, checking count and types against `schema`.
    pub fn from_values(schema: &ColumnSchema, values: &[Value]) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::schema(format!(
                "row has {} values, schema has {} columns",
                values.len(),
                schema.len()
            )));
        }
        let mut bytes = Vec::new();
        let mut offsets = SmallVec::with_capacity(schema.len() + 1);
        for (column, value) in schema.iter().zip(values) {
            if value.data_type() != column.data_type {
                return Err(Error::schema(format!(
                    "column '{}' expects {:?}, got {:?}",
                    column.name,
                    column.data_type,
                    value.data_type()
                )));
            }
            offsets.push(column_offset(bytes.len())?);
            bytes.put_value(value);
        }
        offsets.push(column_offset(bytes.len())?);
        Ok(Self(Arc::new(RowData {
            bytes: bytes.into_boxed_slice(),
            offsets,
        })))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.0.offsets.len() - 1
    }

    /// Encoded bytes of one column, length prefix included.
    pub fn column_bytes(&self, index: usize) -> Option<&[u8]> {
        let start = *self.0.offsets.get(index)? as usize;
        let end = *self.0.offsets.get(index + 1)? as usize;
        Some(&self.0.bytes[start..end])
    }

    pub fn value(&self, schema: &ColumnSchema, index: usize) -> Result<Value> {
        let data_type = schema
            .data_type(index)
            .ok_or_else(|| Error::schema(format!("column {index} out of range")))?;
        let raw = self
            .column_bytes(index)
            .ok_or_else(|| Error::schema(format!("row has no column {index}")))?;
        ByteReader::new(raw).read_value(data_type)
    }

    pub fn values(&self, schema: &ColumnSchema) -> Result<Vec<Value>> {
        (0..schema.len()).map(|i| self.value(schema, i)).collect()
    }

    /// Number of live references, indexes and in-flight results included.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.bytes == other.0.bytes
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.bytes.hash(state);
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("columns", &self.column_count())
            .field("bytes", &self.0.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSpec, DataType, Hash128, IndexerKind};

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            ColumnSpec::new("id", DataType::Int32, IndexerKind::Range),
            ColumnSpec::new("name", DataType::String, IndexerKind::Unindexed),
            ColumnSpec::new("blob", DataType::Bytes, IndexerKind::Unindexed),
            ColumnSpec::new("digest", DataType::Hash128, IndexerKind::Equality),
        ])
        .unwrap()
    }

    fn values() -> Vec<Value> {
        vec![
            Value::Int32(9),
            Value::from("nine"),
            Value::Bytes(vec![9, 9]),
            Value::Hash(Hash128::from_u128(9)),
        ]
    }

    #[test]
    fn test_from_values_then_decode() {
        let schema = schema();
        let row = Row::from_values(&schema, &values()).unwrap();
        let mut reader = ByteReader::new(row.as_bytes());
        let decoded = Row::decode(&schema, &mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(row, decoded);
        assert_eq!(decoded.values(&schema).unwrap(), values());
        assert_eq!(decoded.column_bytes(1).unwrap(), &[4, b'n', b'i', b'n', b'e']);
    }

    #[test]
    fn test_content_identity() {
        let schema = schema();
        let a = Row::from_values(&schema, &values()).unwrap();
        let b = Row::from_values(&schema, &values()).unwrap();
        let mut set = new_row_set();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_type_and_count_mismatch() {
        let schema = schema();
        let mut wrong = values();
        wrong[0] = Value::Int64(9);
        assert!(Row::from_values(&schema, &wrong).unwrap_err().is_schema_mismatch());
        assert!(Row::from_values(&schema, &values()[..2]).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_decode_truncated() {
        let schema = schema();
        let row = Row::from_values(&schema, &values()).unwrap();
        let cut = &row.as_bytes()[..row.as_bytes().len() - 3];
        assert!(Row::decode(&schema, &mut ByteReader::new(cut)).unwrap_err().is_decode());
    }

    #[test]
    fn test_column_offset_range() {
        assert_eq!(column_offset(0).unwrap(), 0);
        assert_eq!(column_offset(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(column_offset(u32::MAX as usize + 1).unwrap_err().is_decode());
    }
}
