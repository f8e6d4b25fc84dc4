use super::error::Error;
use anyhow::{bail, Result};
use std::io::Cursor;

/// Sequential cursor over an immutable byte buffer.
///
/// Every decoder reads through a `Reader`; none of them index the buffer
/// directly. `base` is the absolute offset of the buffer inside whatever
/// larger input it was sliced from, so positions reported in errors and in
/// code headers stay meaningful after a payload has been cut out of a module.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: Cursor<&'a [u8]>,
    base: usize,
}

fn leb_error(err: leb128::read::Error) -> Error {
    match err {
        leb128::read::Error::Overflow => Error::VarintTooLong,
        leb128::read::Error::IoError(_) => Error::UnexpectedEnd,
    }
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    pub fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self {
            buf: Cursor::new(bytes),
            base,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        *self.buf.get_ref()
    }

    fn offset(&self) -> usize {
        self.buf.position() as usize
    }

    /// Absolute position of the next unread byte.
    pub fn position(&self) -> usize {
        self.base + self.offset()
    }

    pub fn remaining(&self) -> usize {
        self.bytes().len().saturating_sub(self.offset())
    }

    pub fn is_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek(&self) -> Result<u8> {
        let byte = self
            .bytes()
            .get(self.offset())
            .copied()
            .ok_or(Error::UnexpectedEnd)?;
        Ok(byte)
    }

    pub fn byte(&mut self) -> Result<u8> {
        let byte = self.peek()?;
        self.buf.set_position(self.buf.position() + 1);
        Ok(byte)
    }

    /// Borrows the next `n` bytes without copying them.
    pub fn slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            bail!(Error::UnexpectedEnd);
        }
        let start = self.offset();
        let bytes = &self.bytes()[start..start + n];
        self.buf.set_position((start + n) as u64);
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.slice(n)?;
        Ok(())
    }

    /// Everything between the cursor and the end of the buffer.
    pub fn rest(&mut self) -> &'a [u8] {
        let start = self.offset().min(self.bytes().len());
        let bytes = &self.bytes()[start..];
        self.buf.set_position(self.bytes().len() as u64);
        bytes
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.slice(N)?);
        Ok(buf)
    }

    // https://webassembly.github.io/spec/core/binary/values.html#integers
    pub fn u64(&mut self) -> Result<u64> {
        let num = leb128::read::unsigned(&mut self.buf).map_err(leb_error)?;
        Ok(num)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let num = u32::try_from(self.u64()?).map_err(|_| Error::VarintTooLong)?;
        Ok(num)
    }

    pub fn i64(&mut self) -> Result<i64> {
        let num = leb128::read::signed(&mut self.buf).map_err(leb_error)?;
        Ok(num)
    }

    pub fn i32(&mut self) -> Result<i32> {
        let num = i32::try_from(self.i64()?).map_err(|_| Error::VarintTooLong)?;
        Ok(num)
    }

    /// A `u32` count or size, widened for indexing.
    pub fn size(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    // https://webassembly.github.io/spec/core/binary/values.html#names
    pub fn name(&mut self) -> Result<String> {
        let size = self.size()?;
        let bytes = self.slice(size)?;
        let name = std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
        Ok(name.to_string())
    }

    /// Reads a count followed by that many elements. Any element failure
    /// aborts the whole vector.
    pub fn vec<T>(&mut self, mut decode: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.size()?;
        // never trust the count for the allocation: every element is at least one byte
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(decode(self)?);
        }
        Ok(items)
    }

    /// Fails unless the buffer has been consumed exactly.
    pub fn finish(&self) -> Result<()> {
        if !self.is_end() {
            bail!(Error::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}
