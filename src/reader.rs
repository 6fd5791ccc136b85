//! Cursor-based reader over a borrowed byte buffer
//!
//! Every decoder in this crate works through [`ByteCursor`]: a read-only
//! view with a monotonically advancing position. Each primitive read either
//! advances by an exact known width or fails with `Truncated`; the cursor
//! never moves past the end of the buffer.

use crate::error::{LensError, Result};

/// Read-only cursor over a byte buffer.
///
/// Non-minimal CompactSize encodings are accepted but recorded as
/// diagnostics (the offset of the size prefix), surfaced later as
/// `NON_CANONICAL_SIZE` warnings.
///
/// # Examples
///
/// ```
/// use chain_lens::reader::ByteCursor;
///
/// let mut cursor = ByteCursor::new(&[0xfd, 0x00, 0x01, 0xaa]);
/// assert_eq!(cursor.read_compact_size().unwrap(), 256);
/// assert_eq!(cursor.read_u8().unwrap(), 0xaa);
/// assert!(!cursor.has_more());
/// ```
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    non_canonical: Vec<usize>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor {
            data,
            pos: 0,
            non_canonical: Vec::new(),
        }
    }

    /// Current cursor position.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute position within the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(LensError::Truncated {
                offset: pos,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Read exactly `n` bytes, advancing the cursor.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LensError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Look at up to `n` bytes without advancing.
    pub fn peek(&self, n: usize) -> &'a [u8] {
        let end = (self.pos + n).min(self.data.len());
        &self.data[self.pos..end]
    }

    /// Borrow an arbitrary sub-range of the underlying buffer.
    pub fn slice(&self, start: usize, end: usize) -> Result<&'a [u8]> {
        if start > end || end > self.data.len() {
            return Err(LensError::Truncated {
                offset: start,
                needed: end.saturating_sub(start),
                available: self.data.len().saturating_sub(start),
            });
        }
        Ok(&self.data[start..end])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.read(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 32-byte hash in wire order.
    pub fn read_hash(&mut self) -> Result<[u8; 32]> {
        let b = self.read(32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(b);
        Ok(hash)
    }

    /// Read a wire-format CompactSize.
    ///
    /// First byte `x`: `x < 0xFD` is the value itself; `0xFD`/`0xFE`/`0xFF`
    /// prefix 2/4/8 little-endian bytes. Non-minimal encodings are accepted
    /// and recorded as diagnostics.
    pub fn read_compact_size(&mut self) -> Result<u64> {
        let start = self.pos;
        let first = self.read_u8()?;
        let value = match first {
            0xFD => {
                let v = self.read_u16()? as u64;
                if v < 0xFD {
                    self.non_canonical.push(start);
                }
                v
            }
            0xFE => {
                let v = self.read_u32()? as u64;
                if v <= u16::MAX as u64 {
                    self.non_canonical.push(start);
                }
                v
            }
            0xFF => {
                let v = self.read_u64()?;
                if v <= u32::MAX as u64 {
                    self.non_canonical.push(start);
                }
                v
            }
            x => x as u64,
        };
        Ok(value)
    }

    /// Offsets of every non-minimal CompactSize seen so far.
    pub fn non_canonical_offsets(&self) -> &[usize] {
        &self.non_canonical
    }
}
