//! Primitive wire encodings
//!
//! Layout:
//! ```text
//! int32 / uint32      4 bytes LE
//! int64 / uint64      8 bytes LE
//! double              8 bytes LE (IEEE-754 bits)
//! string  (< 255 B)   u8 len | utf-8
//! string  (>= 255 B)  0xFF | u32 len | utf-8
//! bytes               u64 len | raw
//! hash128             16 raw bytes
//! ```

use crate::error::{Error, Result};
use crate::types::{DataType, Hash128, Value};

/// Strings whose UTF-8 length reaches this value use the long form.
pub const LONG_STRING_THRESHOLD: usize = 255;

const LONG_STRING_MARKER: u8 = 0xFF;

/// Forward-only cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes between two positions of this reader.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Result<&'a [u8]> {
        self.buf.get(start..end).ok_or_else(|| {
            Error::decode(format!("slice {start}..{end} outside buffer of {} bytes", self.buf.len()))
        })
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::decode(format!(
                "truncated stream: wanted {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    pub fn read_str(&mut self) -> Result<&'a str> {
        let len = match self.read_u8()? {
            LONG_STRING_MARKER => {
                let len = self.read_u32()? as usize;
                if len < LONG_STRING_THRESHOLD {
                    return Err(Error::decode(format!("string of {len} bytes uses the long length form")));
                }
                len
            }
            short => short as usize,
        };
        let raw = self.take(len)?;
        std::str::from_utf8(raw).map_err(|e| Error::decode(format!("invalid utf-8 string: {e}")))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| Error::decode(format!("byte block length {len} too large")))?;
        self.take(len)
    }

    pub fn read_hash128(&mut self) -> Result<Hash128> {
        Ok(Hash128(self.array()?))
    }

    pub fn read_value(&mut self, data_type: DataType) -> Result<Value> {
        Ok(match data_type {
            DataType::Int32 => Value::Int32(self.read_i32()?),
            DataType::Int64 => Value::Int64(self.read_i64()?),
            DataType::Double => Value::Double(self.read_f64()?),
            DataType::String => Value::Str(self.read_str()?.to_string()),
            DataType::Bytes => Value::Bytes(self.read_bytes()?.to_vec()),
            DataType::Hash128 => Value::Hash(self.read_hash128()?),
        })
    }

    /// Validate one encoded value and return its raw bytes, prefix included.
    pub fn read_value_bytes(&mut self, data_type: DataType) -> Result<&'a [u8]> {
        let start = self.pos;
        match data_type {
            DataType::Int32 => {
                self.take(4)?;
            }
            DataType::Int64 | DataType::Double => {
                self.take(8)?;
            }
            DataType::String => {
                self.read_str()?;
            }
            DataType::Bytes => {
                self.read_bytes()?;
            }
            DataType::Hash128 => {
                self.take(Hash128::SIZE)?;
            }
        }
        Ok(&self.buf[start..self.pos])
    }

    /// Fail if anything is left over.
    pub fn expect_end(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::decode(format!("{} trailing bytes after request", self.remaining())))
        }
    }
}

/// Little-endian writers for the same layout.
pub trait ByteWriter {
    fn put_u8(&mut self, value: u8);
    fn put_slice(&mut self, value: &[u8]);

    fn put_u32(&mut self, value: u32) {
        self.put_slice(&value.to_le_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.put_slice(&value.to_le_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.put_slice(&value.to_le_bytes());
    }

    fn put_i64(&mut self, value: i64) {
        self.put_slice(&value.to_le_bytes());
    }

    fn put_f64(&mut self, value: f64) {
        self.put_slice(&value.to_le_bytes());
    }

    fn put_str(&mut self, value: &str) {
        let raw = value.as_bytes();
        if raw.len() < LONG_STRING_THRESHOLD {
            self.put_u8(raw.len() as u8);
        } else {
            self.put_u8(LONG_STRING_MARKER);
            self.put_u32(raw.len() as u32);
        }
        self.put_slice(raw);
    }

    fn put_bytes(&mut self, value: &[u8]) {
        self.put_u64(value.len() as u64);
        self.put_slice(value);
    }

    fn put_hash128(&mut self, value: &Hash128) {
        self.put_slice(&value.0);
    }

    fn put_value(&mut self, value: &Value) {
        match value {
            Value::Int32(v) => self.put_i32(*v),
            Value::Int64(v) => self.put_i64(*v),
            Value::Double(v) => self.put_f64(*v),
            Value::Str(v) => self.put_str(v),
            Value::Bytes(v) => self.put_bytes(v),
            Value::Hash(v) => self.put_hash128(v),
        }
    }
}

impl ByteWriter for Vec<u8> {
    #[inline]
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    #[inline]
    fn put_slice(&mut self, value: &[u8]) {
        self.extend_from_slice(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_strings() {
        let short = "a".repeat(LONG_STRING_THRESHOLD - 1);
        let long = "b".repeat(LONG_STRING_THRESHOLD);
        let mut buf = Vec::new();
        buf.put_str(&short);
        assert_eq!(buf.len(), 1 + short.len());
        buf.put_str(&long);
        assert_eq!(buf.len(), 1 + short.len() + 5 + long.len());

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_str().unwrap(), short);
        assert_eq!(reader.read_str().unwrap(), long);
        reader.expect_end().unwrap();
    }

    #[test]
    fn test_truncated_reads_fail() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        assert!(reader.read_u32().unwrap_err().is_decode());

        let mut buf = Vec::new();
        buf.put_u64(10);
        buf.put_slice(&[0; 4]);
        assert!(ByteReader::new(&buf).read_bytes().unwrap_err().is_decode());
    }

    #[test]
    fn test_non_canonical_long_form_rejected() {
        let mut buf = vec![LONG_STRING_MARKER];
        buf.put_u32(2);
        buf.put_slice(b"hi");
        assert!(ByteReader::new(&buf).read_str().unwrap_err().is_decode());
    }

    #[test]
    fn test_invalid_utf8() {
        let buf = [2u8, 0xC3, 0x28];
        assert!(ByteReader::new(&buf).read_str().unwrap_err().is_decode());
    }

    #[test]
    fn test_value_bytes_cover_prefix() {
        let mut buf = Vec::new();
        buf.put_value(&Value::Str("hey".into()));
        buf.put_value(&Value::Int32(-7));
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_value_bytes(DataType::String).unwrap(), &[3, b'h', b'e', b'y']);
        assert_eq!(reader.read_value(DataType::Int32).unwrap(), Value::Int32(-7));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = Vec::new();
        buf.put_u32(2);
        buf.put_f64(1.0);
        assert_eq!(&buf[..4], &[2, 0, 0, 0]);
        assert_eq!(&buf[4..], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_slice_bounds() {
        let reader = ByteReader::new(&[1, 2, 3, 4]);
        assert_eq!(reader.slice(1, 3).unwrap(), &[2, 3]);
        assert!(reader.slice(2, 9).unwrap_err().is_decode());
        assert!(reader.slice(3, 1).unwrap_err().is_decode());
    }
}
