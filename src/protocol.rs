//! Request/response framing for `IndexRegistry::consume_request`
//!
//! ```text
//! request   u32 command | body
//!   0 Insert     u32 rowCount | rows
//!   1 Aggregate  predicate
//!   2 Remove     predicate
//!   3 Clear
//!   4 Count
//!   5 Describe
//!
//! response  u8 status
//!   0 Ok       Insert/Remove/Clear/Count: u64
//!              Aggregate: header | u64 rowCount | rows
//!              Describe: header
//!   1 Faulted  u32 code | string message
//!
//! header    u32 columnCount | (u8 dataType | u8 indexerKind | string name)*
//! ```

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::types::ColumnSchema;

pub const STATUS_OK: u8 = 0;
pub const STATUS_FAULTED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Insert,
    Aggregate,
    Remove,
    Clear,
    Count,
    Describe,
}

impl Command {
    pub fn tag(self) -> u32 {
        match self {
            Command::Insert => 0,
            Command::Aggregate => 1,
            Command::Remove => 2,
            Command::Clear => 3,
            Command::Count => 4,
            Command::Describe => 5,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Command::Insert,
            1 => Command::Aggregate,
            2 => Command::Remove,
            3 => Command::Clear,
            4 => Command::Count,
            5 => Command::Describe,
            _ => return None,
        })
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let tag = reader.read_u32()?;
        Self::from_tag(tag).ok_or_else(|| Error::decode(format!("unknown command {tag}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Insert => "insert",
            Command::Aggregate => "aggregate",
            Command::Remove => "remove",
            Command::Clear => "clear",
            Command::Count => "count",
            Command::Describe => "describe",
        }
    }
}

pub fn write_column_header(out: &mut impl ByteWriter, schema: &ColumnSchema) {
    out.put_u32(schema.len() as u32);
    for column in schema.iter() {
        out.put_u8(column.data_type.tag());
        out.put_u8(column.indexer.tag());
        out.put_str(&column.name);
    }
}

pub fn write_count(out: &mut impl ByteWriter, count: usize) {
    out.put_u8(STATUS_OK);
    out.put_u64(count as u64);
}

pub fn write_rows<'a>(
    out: &mut impl ByteWriter,
    schema: &ColumnSchema,
    rows: impl ExactSizeIterator<Item = &'a Row>,
) {
    out.put_u8(STATUS_OK);
    write_column_header(out, schema);
    out.put_u64(rows.len() as u64);
    for row in rows {
        out.put_slice(row.as_bytes());
    }
}

pub fn write_describe(out: &mut impl ByteWriter, schema: &ColumnSchema) {
    out.put_u8(STATUS_OK);
    write_column_header(out, schema);
}

pub fn write_fault(out: &mut impl ByteWriter, err: &Error) {
    out.put_u8(STATUS_FAULTED);
    out.put_u32(err.code());
    out.put_str(&err.to_string());
}

/// Client-side reader for a response produced by `consume_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Count(u64),
    Rows { header: Vec<(u8, u8, String)>, rows: Vec<Vec<u8>> },
    Describe(Vec<(u8, u8, String)>),
    Faulted { code: u32, message: String },
}

impl Response {
    /// Parse a response to `command`. Row bytes are split using `schema`.
    pub fn decode(command: Command, schema: &ColumnSchema, bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let response = match reader.read_u8()? {
            STATUS_OK => match command {
                Command::Insert | Command::Remove | Command::Clear | Command::Count => {
                    Response::Count(reader.read_u64()?)
                }
                Command::Describe => Response::Describe(read_header(&mut reader)?),
                Command::Aggregate => {
                    let header = read_header(&mut reader)?;
                    let count = reader.read_u64()?;
                    let mut rows = Vec::new();
                    for _ in 0..count {
                        rows.push(Row::decode(schema, &mut reader)?.as_bytes().to_vec());
                    }
                    Response::Rows { header, rows }
                }
            },
            STATUS_FAULTED => Response::Faulted {
                code: reader.read_u32()?,
                message: reader.read_str()?.to_string(),
            },
            other => return Err(Error::decode(format!("unknown response status {other}"))),
        };
        reader.expect_end()?;
        Ok(response)
    }
}

fn read_header(reader: &mut ByteReader<'_>) -> Result<Vec<(u8, u8, String)>> {
    let count = reader.read_u32()?;
    let mut header = Vec::new();
    for _ in 0..count {
        let data_type = reader.read_u8()?;
        let indexer = reader.read_u8()?;
        header.push((data_type, indexer, reader.read_str()?.to_string()));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSpec, DataType, IndexerKind};

    #[test]
    fn test_command_tags() {
        for tag in 0..6 {
            assert_eq!(Command::from_tag(tag).unwrap().tag(), tag);
        }
        assert!(Command::read(&mut ByteReader::new(&6u32.to_le_bytes())).unwrap_err().is_decode());
    }

    #[test]
    fn test_fault_layout() {
        let mut out = Vec::new();
        write_fault(&mut out, &Error::unsupported("nope"));
        assert_eq!(out[0], STATUS_FAULTED);
        assert_eq!(&out[1..5], &2u32.to_le_bytes());
        let schema =
            ColumnSchema::new(vec![ColumnSpec::new("v", DataType::Int32, IndexerKind::Unindexed)]).unwrap();
        match Response::decode(Command::Count, &schema, &out).unwrap() {
            Response::Faulted { code, message } => {
                assert_eq!(code, 2);
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_header_layout() {
        let schema = ColumnSchema::new(vec![
            ColumnSpec::new("id", DataType::Int64, IndexerKind::Range),
            ColumnSpec::new("tag", DataType::String, IndexerKind::Equality),
        ])
        .unwrap();
        let mut out = Vec::new();
        write_describe(&mut out, &schema);
        let header = match Response::decode(Command::Describe, &schema, &out).unwrap() {
            Response::Describe(header) => header,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(header, vec![(1, 2, "id".to_string()), (3, 1, "tag".to_string())]);
    }
}
