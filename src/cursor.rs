use crate::error::DecodeError;

/// Sequential reader over an in-memory ncm container.
///
/// Every read advances the position; a read past the end fails with
/// [`DecodeError::TruncatedInput`] instead of silently returning fewer bytes.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Read exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(DecodeError::TruncatedInput { needed: n, remaining });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read a 4-byte little-endian unsigned integer.
    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Relative forward seek.
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    /// Read a length-prefixed segment: a `u32` length followed by that many
    /// bytes. The key blob, metadata blob and cover blob all use this layout.
    pub fn read_segment(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32_le()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Consume everything left after the last header section.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        bytes
    }
}
