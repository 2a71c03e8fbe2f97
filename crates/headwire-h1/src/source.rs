use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use crate::error::SourceError;

const IO_CHUNK_SIZE: usize = 8 * 1024;

pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

/// A buffered byte source the parsers can scan by index without consuming.
///
/// Offsets are relative to the logical read cursor and stay valid until
/// `discard` advances it, so a parse can roll back or re-scan freely and the
/// cursor moves only once the whole head has validated.
pub trait ByteSource {
    /// Ensures at least `n` bytes are buffered past the cursor.
    fn fill(&mut self, n: usize) -> Result<(), SourceError>;

    /// Extends the buffer until `delim` is found at or after `offset`,
    /// returning the delimiter's index.
    fn fill_until(&mut self, offset: usize, delim: u8) -> Result<usize, SourceError>;

    /// The byte at `index`. The index must already be filled.
    fn peek(&self, index: usize) -> u8;

    /// A borrowed view of `len` buffered bytes starting at `offset`. The
    /// range must already be filled.
    fn slice(&self, offset: usize, len: usize) -> &[u8];

    /// Advances the cursor, invalidating the first `n` buffered bytes.
    fn discard(&mut self, n: usize);
}

/// [`ByteSource`] over any [`Read`], growing a [`BytesMut`] in 8 KiB chunks.
///
/// The buffer is allowed to hold at most `max_fill_bytes` unconsumed bytes;
/// a head that needs more fails with [`SourceError::LimitExceeded`] rather
/// than letting a hostile peer balloon memory one header at a time.
pub struct BufferedSource<R> {
    inner: R,
    buf: BytesMut,
    max_fill_bytes: usize,
    eof: bool,
}

impl<R: Read> BufferedSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_HEAD_BYTES)
    }

    pub fn with_limit(inner: R, max_fill_bytes: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(1024),
            max_fill_bytes,
            eof: false,
        }
    }

    /// Everything buffered past the cursor.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_chunk(&mut self) -> Result<(), SourceError> {
        if self.buf.len() >= self.max_fill_bytes {
            return Err(SourceError::LimitExceeded);
        }
        let mut chunk = [0_u8; IO_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(read) => {
                    self.buf.extend_from_slice(&chunk[..read]);
                    return Ok(());
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(SourceError::Io(error)),
            }
        }
    }
}

impl<R: Read> ByteSource for BufferedSource<R> {
    fn fill(&mut self, n: usize) -> Result<(), SourceError> {
        while self.buf.len() < n {
            if self.eof {
                return Err(SourceError::EndOfStream);
            }
            self.read_chunk()?;
        }
        Ok(())
    }

    fn fill_until(&mut self, offset: usize, delim: u8) -> Result<usize, SourceError> {
        while self.buf.len() < offset {
            if self.eof {
                return Err(SourceError::EndOfStream);
            }
            self.read_chunk()?;
        }
        let mut search_from = offset;
        loop {
            if let Some(position) = self.buf[search_from..]
                .iter()
                .position(|byte| *byte == delim)
            {
                return Ok(search_from + position);
            }
            search_from = self.buf.len();
            if self.eof {
                return Err(SourceError::EndOfStream);
            }
            self.read_chunk()?;
        }
    }

    fn peek(&self, index: usize) -> u8 {
        self.buf[index]
    }

    fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    fn discard(&mut self, n: usize) {
        self.buf.advance(n);
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedSource, ByteSource};
    use crate::error::SourceError;

    /// Yields the payload one byte per read call.
    struct TrickleReader {
        data: Vec<u8>,
        at: usize,
    }

    impl std::io::Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.at == self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.at];
            self.at += 1;
            Ok(1)
        }
    }

    #[test]
    fn fill_until_finds_delimiters_across_partial_reads() {
        let mut src = BufferedSource::new(TrickleReader {
            data: b"abc\ndef\n".to_vec(),
            at: 0,
        });
        assert_eq!(src.fill_until(0, b'\n').expect("first line"), 3);
        assert_eq!(src.fill_until(4, b'\n').expect("second line"), 7);
        assert_eq!(src.slice(0, 3), b"abc");
        assert_eq!(src.peek(4), b'd');
    }

    #[test]
    fn offsets_survive_until_discard() {
        let mut src = BufferedSource::new(&b"one\ntwo\n"[..]);
        src.fill(8).expect("whole payload");
        assert_eq!(src.slice(4, 3), b"two");
        src.discard(4);
        assert_eq!(src.slice(0, 3), b"two");
        assert_eq!(src.buffered(), b"two\n");
    }

    #[test]
    fn missing_delimiter_at_eof_is_end_of_stream() {
        let mut src = BufferedSource::new(&b"no newline"[..]);
        let error = src.fill_until(0, b'\n').expect_err("must hit eof");
        assert!(matches!(error, SourceError::EndOfStream));
    }

    #[test]
    fn fill_past_eof_is_end_of_stream() {
        let mut src = BufferedSource::new(&b"abc"[..]);
        src.fill(3).expect("exact length");
        let error = src.fill(4).expect_err("one past eof");
        assert!(matches!(error, SourceError::EndOfStream));
    }

    #[test]
    fn fill_limit_bounds_unconsumed_growth() {
        let payload = vec![b'x'; 64 * 1024];
        let mut src = BufferedSource::with_limit(&payload[..], 16);
        let error = src.fill_until(0, b'\n').expect_err("limit must trip");
        assert!(matches!(error, SourceError::LimitExceeded));
    }
}
