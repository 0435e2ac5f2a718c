//! Predicate aggregation
//!
//! Recursive-descent evaluation of the binary predicate encoding:
//! ```text
//! u32 tag
//!   0 And    left-predicate right-predicate
//!   1 Or     left-predicate right-predicate
//!   2 Unary  i32 column | payload read by that column's indexer
//! ```
//! Both sides of `And`/`Or` are always evaluated, left first. Any unknown
//! tag aborts the whole evaluation.

use crate::btree::CollectionMode;
use crate::codec::{ByteReader, ByteWriter};
use crate::error::{Error, Result};
use crate::index::{Comparison, FetchRows};
use crate::row::RowSet;
use crate::types::{ColumnSchema, Value};

/// Nesting limit for `And`/`Or`, guarding the call stack against hostile input.
pub const MAX_PREDICATE_DEPTH: usize = 256;

const TAG_AND: u32 = 0;
const TAG_OR: u32 = 1;
const TAG_UNARY: u32 = 2;

/// Evaluate one predicate read from `reader` against `handles`, indexed by
/// column. Bytes after the predicate are left unread.
pub fn aggregate<H: FetchRows>(reader: &mut ByteReader<'_>, handles: &[H]) -> Result<RowSet> {
    evaluate(reader, handles, 0)
}

fn evaluate<H: FetchRows>(reader: &mut ByteReader<'_>, handles: &[H], depth: usize) -> Result<RowSet> {
    if depth > MAX_PREDICATE_DEPTH {
        return Err(Error::decode(format!("predicate nested deeper than {MAX_PREDICATE_DEPTH}")));
    }
    match reader.read_u32()? {
        TAG_AND => {
            let left = evaluate(reader, handles, depth + 1)?;
            let right = evaluate(reader, handles, depth + 1)?;
            Ok(intersect(left, right))
        }
        TAG_OR => {
            let left = evaluate(reader, handles, depth + 1)?;
            let right = evaluate(reader, handles, depth + 1)?;
            Ok(union(left, right))
        }
        TAG_UNARY => {
            let offset = reader.read_i32()?;
            let handle = usize::try_from(offset)
                .ok()
                .and_then(|i| handles.get(i))
                .ok_or_else(|| {
                    Error::schema(format!(
                        "column offset {offset} outside schema of {} columns",
                        handles.len()
                    ))
                })?;
            handle.fetch(reader)
        }
        tag => Err(Error::decode(format!("unknown predicate tag {tag}"))),
    }
}

fn intersect(a: RowSet, b: RowSet) -> RowSet {
    let (mut small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.retain(|row| large.contains(row));
    small
}

fn union(a: RowSet, b: RowSet) -> RowSet {
    let (mut large, small) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    large.extend(small);
    large
}

/// Predicate tree for building requests.
///
/// ```ignore
/// let p = Predicate::between(0, 2, 4).and(Predicate::eq(1, "c"));
/// let rows = registry.aggregate(&p.to_bytes())?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Unary { column: i32, payload: Vec<u8> },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Rows whose `column` equals `value`.
    pub fn eq(column: i32, value: impl Into<Value>) -> Self {
        let mut payload = Vec::new();
        payload.put_u32(Comparison::Equal.tag());
        payload.put_value(&value.into());
        Predicate::Unary { column, payload }
    }

    /// Rows whose `column` lies in `[low, high]`.
    pub fn between(column: i32, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::interval(column, CollectionMode::ClosedInterval, low, high)
    }

    /// Interval of any shape. Only `ClosedInterval` is answered by indexers.
    pub fn interval(
        column: i32,
        mode: CollectionMode,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        let mut payload = Vec::new();
        payload.put_u32(mode.tag());
        payload.put_value(&low.into());
        payload.put_value(&high.into());
        Predicate::Unary { column, payload }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn encode(&self, out: &mut impl ByteWriter) {
        match self {
            Predicate::Unary { column, payload } => {
                out.put_u32(TAG_UNARY);
                out.put_i32(*column);
                out.put_slice(payload);
            }
            Predicate::And(left, right) => {
                out.put_u32(TAG_AND);
                left.encode(out);
                right.encode(out);
            }
            Predicate::Or(left, right) => {
                out.put_u32(TAG_OR);
                left.encode(out);
                right.encode(out);
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Parse a predicate back into a tree. Unary payloads are split using
    /// the column types of `schema`: one value for `Equal`, two for any
    /// interval shape.
    pub fn decode(schema: &ColumnSchema, reader: &mut ByteReader<'_>) -> Result<Self> {
        Self::decode_at(schema, reader, 0)
    }

    fn decode_at(schema: &ColumnSchema, reader: &mut ByteReader<'_>, depth: usize) -> Result<Self> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(Error::decode(format!("predicate nested deeper than {MAX_PREDICATE_DEPTH}")));
        }
        match reader.read_u32()? {
            TAG_AND => {
                let left = Self::decode_at(schema, reader, depth + 1)?;
                Ok(left.and(Self::decode_at(schema, reader, depth + 1)?))
            }
            TAG_OR => {
                let left = Self::decode_at(schema, reader, depth + 1)?;
                Ok(left.or(Self::decode_at(schema, reader, depth + 1)?))
            }
            TAG_UNARY => {
                let column = reader.read_i32()?;
                let data_type = usize::try_from(column)
                    .ok()
                    .and_then(|i| schema.data_type(i))
                    .ok_or_else(|| Error::schema(format!("column offset {column} outside schema")))?;
                let start = reader.position();
                let values = match Comparison::read(reader)? {
                    Comparison::Equal => 1,
                    Comparison::Range(_) => 2,
                };
                for _ in 0..values {
                    reader.read_value_bytes(data_type)?;
                }
                let payload = reader.slice(start, reader.position())?.to_vec();
                Ok(Predicate::Unary { column, payload })
            }
            tag => Err(Error::decode(format!("unknown predicate tag {tag}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{new_row_set, Row};
    use crate::types::{ColumnSpec, DataType, IndexerKind};
    use std::cell::RefCell;

    /// Every fetch consumes an `i32` divisor and returns the rows whose value
    /// it divides, recording the call.
    struct Fixed {
        rows: Vec<Row>,
        calls: RefCell<Vec<i32>>,
    }

    impl FetchRows for Fixed {
        fn fetch(&self, reader: &mut ByteReader<'_>) -> Result<RowSet> {
            let _ = Comparison::read(reader)?;
            let key = reader.read_i32()?;
            self.calls.borrow_mut().push(key);
            let mut out = new_row_set();
            out.extend(self.rows.iter().filter(|r| r.as_bytes()[0] as i32 % key == 0).cloned());
            Ok(out)
        }
    }

    fn handles() -> Vec<Fixed> {
        let schema =
            ColumnSchema::new(vec![ColumnSpec::new("v", DataType::Int32, IndexerKind::Equality)]).unwrap();
        let rows: Vec<Row> = (1..=12).map(|v| Row::from_values(&schema, &[Value::Int32(v)]).unwrap()).collect();
        vec![Fixed { rows, calls: RefCell::new(Vec::new()) }]
    }

    fn run(p: &Predicate, handles: &[Fixed]) -> Result<RowSet> {
        let bytes = p.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        let out = aggregate(&mut reader, handles);
        if out.is_ok() {
            assert!(reader.is_empty());
        }
        out
    }

    #[test]
    fn test_and_or() {
        let h = handles();
        let by2 = Predicate::eq(0, 2);
        let by3 = Predicate::eq(0, 3);
        assert_eq!(run(&by2.clone().and(by3.clone()), &h).unwrap().len(), 2); // 6, 12
        assert_eq!(run(&by2.or(by3), &h).unwrap().len(), 8);
    }

    #[test]
    fn test_and_does_not_short_circuit() {
        let h = handles();
        let empty = Predicate::eq(0, 13);
        let p = empty.and(Predicate::eq(0, 2));
        assert!(run(&p, &h).unwrap().is_empty());
        assert_eq!(*h[0].calls.borrow(), vec![13, 2]);
    }

    #[test]
    fn test_unknown_tag_aborts() {
        let h = handles();
        let mut bytes = Vec::new();
        bytes.put_u32(TAG_OR);
        Predicate::eq(0, 2).encode(&mut bytes);
        bytes.put_u32(7);
        let err = aggregate(&mut ByteReader::new(&bytes), &h).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_column_offset_checked() {
        let h = handles();
        assert!(run(&Predicate::eq(1, 2), &h).unwrap_err().is_schema_mismatch());
        assert!(run(&Predicate::eq(-1, 2), &h).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_truncated_predicate() {
        let h = handles();
        let mut bytes = Vec::new();
        bytes.put_u32(TAG_AND);
        Predicate::eq(0, 2).encode(&mut bytes);
        assert!(aggregate(&mut ByteReader::new(&bytes), &h).unwrap_err().is_decode());
    }

    #[test]
    fn test_depth_limit() {
        let h = handles();
        let mut bytes = Vec::new();
        for _ in 0..=MAX_PREDICATE_DEPTH {
            bytes.put_u32(TAG_AND);
        }
        let err = aggregate(&mut ByteReader::new(&bytes), &h).unwrap_err();
        assert!(err.is_decode());
    }
}
