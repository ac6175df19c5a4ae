//! A file inside a partition.

use crate::source::{ByteSource, SourceRef};
use crate::{Error, Result};

/// Read-only window over one file's bytes.
///
/// Positions are relative to the start of the file. Reads stop at the end
/// of the file instead of running into whatever follows it on the disc.
#[derive(Debug)]
pub struct PartitionFile {
    disc: SourceRef,
    offset: u64,
    size: u64,
    pos: u64,
}

impl PartitionFile {
    /// The caller has already checked that the window lies inside `disc`.
    pub(crate) fn new(disc: SourceRef, offset: u64, size: u64) -> Self {
        Self {
            disc,
            offset,
            size,
            pos: 0,
        }
    }

    /// Absolute offset of the file in the disc source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the whole file.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.disc.read_vec_at(self.offset, self.size as usize)
    }
}

impl ByteSource for PartitionFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len().min((self.size - self.pos) as usize);
        if len == 0 {
            return Ok(0);
        }
        let n = self
            .disc
            .seek_and_read(self.offset + self.pos, &mut buf[..len])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.size {
            return Err(Error::InvalidRange);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_open(&self) -> bool {
        self.disc.is_open()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_clamp_at_end_of_file() {
        let disc = SourceRef::from_reader(Cursor::new((0u8..32).collect::<Vec<_>>())).unwrap();
        let mut f = PartitionFile::new(disc, 8, 4);
        let mut buf = [0xFFu8; 8];
        assert_eq!(f.seek_and_read(2, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..3], &[10, 11, 0xFF]);
        assert_eq!(f.read(&mut buf).unwrap(), 0);
        assert!(matches!(f.seek(5), Err(Error::InvalidRange)));
        assert_eq!(f.read_all().unwrap(), vec![8, 9, 10, 11]);
    }
}
