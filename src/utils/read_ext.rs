use std::io::{self, ErrorKind, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::err::{FlpError, Result};

/// Forward-only reader that keeps track of how many bytes were consumed so far.
///
/// FLP files are read strictly front to back, so the running offset stands in for
/// `Seek::stream_position` when attaching positions to errors.
#[derive(Debug)]
pub(crate) struct OffsetReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> OffsetReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        OffsetReader { inner, offset: 0 }
    }

    /// Discards up to `count` bytes, returning how many were actually skipped.
    /// Running out of input is not an error here.
    pub(crate) fn skip(&mut self, count: u64) -> io::Result<u64> {
        io::copy(&mut self.by_ref().take(count), &mut io::sink())
    }

    /// Reads a single byte, or `None` if the stream is exhausted.
    pub(crate) fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0_u8; 1];
        loop {
            match self.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads up to `len` bytes. The buffer grows with what the stream actually
    /// delivers, so a bogus length cannot force a large allocation up front.
    pub(crate) fn read_up_to(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(len.min(64 * 1024) as usize);
        self.by_ref().take(len).read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<R: Read> Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

pub(crate) trait ReadExt: Read + Sized {
    /// Bytes consumed since the start of the stream.
    fn offset(&self) -> u64;

    /// Reads as many of the `N` magic bytes as are available.
    /// Returns the bytes read, which is shorter than `N` only at end of stream.
    #[inline]
    fn try_magic<const N: usize>(&mut self) -> Result<Vec<u8>> {
        let offset = self.offset();
        let mut magic = Vec::with_capacity(N);
        self.by_ref()
            .take(N as u64)
            .read_to_end(&mut magic)
            .map_err(|source| FlpError::FailedToRead {
                what: "chunk magic",
                offset,
                source,
            })?;
        Ok(magic)
    }

    #[inline]
    fn try_u16_named(&mut self, what: &'static str) -> Result<u16> {
        let offset = self.offset();
        self.read_u16::<LittleEndian>()
            .map_err(|source| FlpError::FailedToRead {
                what,
                offset,
                source,
            })
    }

    #[inline]
    fn try_u32_named(&mut self, what: &'static str) -> Result<u32> {
        let offset = self.offset();
        self.read_u32::<LittleEndian>()
            .map_err(|source| FlpError::FailedToRead {
                what,
                offset,
                source,
            })
    }
}

impl<R: Read> ReadExt for OffsetReader<R> {
    #[inline]
    fn offset(&self) -> u64 {
        self.offset
    }
}
