//! Strict, position-tracking byte cursor.
//!
//! Wraps any `Read + Seek` source. Every read either returns exactly the
//! requested number of bytes or fails with [`MachOError::TruncatedRead`];
//! a failed read leaves the position where it was.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{MachOError, Result};

/// Largest buffer reserved up front for a single variable-length read.
const MAX_PREALLOC: u64 = 64 * 1024;

/// Seekable byte source with exact-size, endian-aware reads.
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap a byte source. The current position of `inner` is kept.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Current absolute position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move to an absolute position.
    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        let start = self.position()?;
        let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC) as usize);
        let got = (&mut self.inner).take(len).read_to_end(&mut buf)? as u64;
        if got != len {
            self.set_position(start)?;
            return Err(MachOError::TruncatedRead {
                requested: len,
                offset: start,
                available: got,
            });
        }
        Ok(buf)
    }

    /// Read exactly `N` bytes into a fixed array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let start = self.position()?;
        let mut buf = [0u8; N];
        let mut filled = 0;
        while filled < N {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if filled != N {
            self.set_position(start)?;
            return Err(MachOError::TruncatedRead {
                requested: N as u64,
                offset: start,
                available: filled as u64,
            });
        }
        Ok(buf)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a 16-bit value in byte order `B`.
    pub fn read_u16<B: ByteOrder>(&mut self) -> Result<u16> {
        Ok(B::read_u16(&self.read_array::<2>()?))
    }

    /// Read a 32-bit value in byte order `B`.
    pub fn read_u32<B: ByteOrder>(&mut self) -> Result<u32> {
        Ok(B::read_u32(&self.read_array::<4>()?))
    }

    /// Read a 64-bit value in byte order `B`.
    pub fn read_u64<B: ByteOrder>(&mut self) -> Result<u64> {
        Ok(B::read_u64(&self.read_array::<8>()?))
    }

    /// Read a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_u16::<LittleEndian>()
    }

    /// Read a big-endian `u16`.
    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.read_u16::<BigEndian>()
    }

    /// Read a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_u32::<LittleEndian>()
    }

    /// Read a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_u32::<BigEndian>()
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.read_u64::<LittleEndian>()
    }

    /// Read a big-endian `u64`.
    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.read_u64::<BigEndian>()
    }

    /// Read a 32-bit value in byte order `B`, then restore the position.
    pub fn peek_u32<B: ByteOrder>(&mut self) -> Result<u32> {
        let start = self.position()?;
        let value = self.read_u32::<B>()?;
        self.set_position(start)?;
        Ok(value)
    }
}
