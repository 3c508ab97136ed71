//! Little-endian primitive reader.
//!
//! Strings use a one-byte tag:
//!
//! ```text
//! 0x00                      empty string
//! 0x0B <uleb128 len> <utf8> string of `len` bytes
//! ```

use super::error::DbError;

const STRING_ABSENT: u8 = 0x00;
const STRING_PRESENT: u8 = 0x0B;

/// Cursor over a byte slice. Every read checks bounds.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// A reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], DbError> {
        if self.remaining() < len {
            return Err(DbError::malformed(
                self.pos,
                format!(
                    "unexpected end of data reading {} ({} bytes needed, {} left)",
                    what,
                    len,
                    self.remaining()
                ),
            ));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], DbError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    /// Skips `len` bytes.
    pub fn skip(&mut self, len: usize, what: &str) -> Result<(), DbError> {
        self.take(len, what).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, DbError> {
        Ok(self.take_array::<1>("u8")?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, DbError> {
        Ok(i16::from_le_bytes(self.take_array("i16")?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DbError> {
        Ok(i32::from_le_bytes(self.take_array("i32")?))
    }

    pub fn read_i64(&mut self) -> Result<i64, DbError> {
        Ok(i64::from_le_bytes(self.take_array("i64")?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DbError> {
        Ok(f32::from_le_bytes(self.take_array("f32")?))
    }

    pub fn read_f64(&mut self) -> Result<f64, DbError> {
        Ok(f64::from_le_bytes(self.take_array("f64")?))
    }

    /// Reads an unsigned LEB128 integer.
    pub fn read_uleb128(&mut self) -> Result<u64, DbError> {
        let start = self.pos;
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if (shift == 63 && byte > 1) || shift > 63 {
                return Err(DbError::malformed(start, "ULEB128 value overflows 64 bits"));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Reads a tagged string.
    pub fn read_string(&mut self) -> Result<String, DbError> {
        let start = self.pos;
        match self.read_string_bytes()? {
            None => Ok(String::new()),
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|e| DbError::malformed(start, format!("invalid UTF-8 in string: {}", e))),
        }
    }

    /// Skips a tagged string without validating its contents.
    pub fn skip_string(&mut self) -> Result<(), DbError> {
        self.read_string_bytes().map(|_| ())
    }

    fn read_string_bytes(&mut self) -> Result<Option<&'a [u8]>, DbError> {
        let start = self.pos;
        match self.read_u8()? {
            STRING_ABSENT => Ok(None),
            STRING_PRESENT => {
                let len = self.read_uleb128()?;
                let len = usize::try_from(len)
                    .map_err(|_| DbError::malformed(start, "string length out of range"))?;
                self.take(len, "string").map(Some)
            }
            tag => Err(DbError::malformed(
                start,
                format!("invalid string tag 0x{:02X}", tag),
            )),
        }
    }
}
