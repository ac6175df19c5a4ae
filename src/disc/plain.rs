//! Plain disc images.
//!
//! The logical disc is a byte-for-byte window of the source: either the
//! whole file or `[offset, offset + length)` of it.

use crate::source::{ByteSource, SourceRef};
use crate::{Error, Result};

/// Pass-through reader over an unmodified image.
pub struct DiscReader {
    file: Option<SourceRef>,
    offset: u64,
    length: u64,
    pos: u64,
    last_error: Option<Error>,
}

impl DiscReader {
    /// Reader over the whole source.
    pub fn new(file: SourceRef) -> Self {
        let length = file.size();
        Self::with_range(file, 0, length)
    }

    /// Reader over `length` bytes starting at `offset`.
    ///
    /// A window that does not fit in the source leaves the reader closed.
    pub fn with_range(file: SourceRef, offset: u64, length: u64) -> Self {
        let fits = offset
            .checked_add(length)
            .is_some_and(|end| end <= file.size());
        if !fits || !file.is_open() {
            log::debug!("disc window {offset:#x}+{length:#x} does not fit the source");
            return Self {
                file: None,
                offset: 0,
                length: 0,
                pos: 0,
                last_error: Some(Error::InvalidRange),
            };
        }
        Self {
            file: Some(file),
            offset,
            length,
            pos: 0,
            last_error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Offset of the window in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}

impl ByteSource for DiscReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.as_ref().ok_or(Error::BadDescriptor)?;
        let len = buf.len().min((self.length - self.pos) as usize);
        match file.seek_and_read(self.offset + self.pos, &mut buf[..len]) {
            Ok(n) => {
                self.pos += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.last_error = Some(e.duplicate());
                Err(e)
            }
        }
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::BadDescriptor);
        }
        if pos > self.length {
            self.last_error = Some(Error::InvalidRange);
            return Err(Error::InvalidRange);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.length
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn source() -> SourceRef {
        SourceRef::from_reader(Cursor::new((0u8..64).collect::<Vec<_>>())).unwrap()
    }

    #[test]
    fn window_is_rebased() {
        let mut r = DiscReader::with_range(source(), 16, 8);
        assert_eq!(r.size(), 8);
        let mut buf = [0u8; 16];
        assert_eq!(r.seek_and_read(4, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[20, 21, 22, 23]);
    }

    #[test]
    fn oversized_window_stays_closed() {
        let src = source();
        let mut r = DiscReader::with_range(src.clone(), 60, 8);
        assert!(!r.is_open());
        assert!(matches!(r.last_error(), Some(Error::InvalidRange)));
        assert_eq!(src.ref_count(), 1);
        assert!(matches!(r.seek(0), Err(Error::BadDescriptor)));
    }
}
