//! Disc image readers.
//!
//! A disc reader presents the logical contents of a disc image as a flat
//! [`ByteSource`], hiding how the image is stored: raw CD sector headers,
//! sparse block maps, deduplicated sectors or compressed blocks.
//!
//! Block-structured formats implement [`BlockMap`] and are wrapped in a
//! [`SparseDiscReader`], which splits logical reads at block boundaries and
//! asks the map where each block lives.
//!
//! ## Lifecycle
//! Readers are built with `new(file)`. If validation fails the reader stays
//! closed: [`SparseDiscReader::is_open`] is false, the failure is kept in
//! [`SparseDiscReader::last_error`], the source handle is released, and
//! every read fails with [`Error::BadDescriptor`].
//!
//! | Module | Format |
//! |--------|--------|
//! | [`plain`]     | Unmodified image, optionally a window of a larger file |
//! | [`cdrom2352`] | Raw 2352-byte CD sectors |
//! | [`nasos`]     | NASOS sparse GameCube/Wii images |
//! | [`wux`]       | WUX deduplicated Wii U images |
//! | [`ziso`]      | ZISO LZ4-compressed ISO images (`compression` feature) |

pub mod cdrom2352;
pub mod nasos;
pub mod plain;
pub mod wux;
#[cfg(feature = "compression")]
pub mod ziso;

pub use cdrom2352::Cdrom2352Reader;
pub use nasos::NasosReader;
pub use plain::DiscReader;
pub use wux::WuxReader;
#[cfg(feature = "compression")]
pub use ziso::ZisoReader;

use crate::source::{ByteSource, SourceRef};
use crate::{Error, Result};

/// Where a logical block is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAddr {
    /// Absolute byte offset in the backing source.
    Phys(u64),
    /// The block is not stored; it reads as zeroes.
    Empty,
    /// The index is past the end of the disc (or the reader is closed).
    OutOfRange,
}

/// Logical-to-physical block mapping for one image format.
pub trait BlockMap: Send {
    /// Logical block size in bytes.
    fn block_size(&self) -> u32;

    /// Number of logical blocks.
    fn block_count(&self) -> u64;

    /// Logical disc size. Defaults to `block_count × block_size`.
    fn disc_size(&self) -> u64 {
        self.block_count() * self.block_size() as u64
    }

    /// Physical location of `block_idx`.
    fn phys_block_addr(&self, block_idx: u64) -> BlockAddr;

    /// Fill `buf` from block `block_idx`, starting `pos` bytes into it.
    ///
    /// The default reads stored blocks straight from `file` and
    /// synthesises zeroes for empty ones without touching the source.
    fn read_block(
        &mut self,
        file: &SourceRef,
        block_idx: u64,
        pos: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        match self.phys_block_addr(block_idx) {
            BlockAddr::Phys(addr) => file.read_exact_at(addr + pos as u64, buf),
            BlockAddr::Empty => {
                buf.fill(0);
                Ok(())
            }
            BlockAddr::OutOfRange => Err(Error::InvalidRange),
        }
    }
}

/// [`ByteSource`] over a [`BlockMap`].
pub struct SparseDiscReader<M> {
    file: Option<SourceRef>,
    map: Option<M>,
    disc_size: u64,
    pos: u64,
    last_error: Option<Error>,
}

impl<M: BlockMap> SparseDiscReader<M> {
    /// Finish construction from the outcome of a format's open routine.
    pub(crate) fn from_open(file: SourceRef, opened: Result<M>) -> Self {
        match opened {
            Ok(map) => Self {
                disc_size: map.disc_size(),
                file: Some(file),
                map: Some(map),
                pos: 0,
                last_error: None,
            },
            Err(e) => {
                log::debug!("disc reader failed to open: {e}");
                Self {
                    file: None,
                    map: None,
                    disc_size: 0,
                    pos: 0,
                    last_error: Some(e),
                }
            }
        }
    }

    /// Whether the reader opened successfully and has not been closed.
    pub fn is_open(&self) -> bool {
        self.file.is_some() && self.map.is_some()
    }

    /// The most recent failure, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Logical block size, or 0 when closed.
    pub fn block_size(&self) -> u32 {
        self.map.as_ref().map_or(0, |m| m.block_size())
    }

    /// Number of logical blocks, or 0 when closed.
    pub fn block_count(&self) -> u64 {
        self.map.as_ref().map_or(0, |m| m.block_count())
    }

    /// Physical location of `block_idx`.
    pub fn phys_block_addr(&self, block_idx: u64) -> BlockAddr {
        match &self.map {
            Some(m) if block_idx < m.block_count() => m.phys_block_addr(block_idx),
            _ => BlockAddr::OutOfRange,
        }
    }

    /// Release the source handle. The reader stays closed.
    pub fn close(&mut self) {
        self.file = None;
        self.map = None;
    }

    pub(crate) fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }
}

impl<M: BlockMap> ByteSource for SparseDiscReader<M> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (Some(file), Some(map)) = (self.file.as_ref(), self.map.as_mut()) else {
            return Err(Error::BadDescriptor);
        };

        let len = buf.len().min((self.disc_size - self.pos) as usize);
        let block_size = map.block_size() as u64;
        let mut done = 0;
        while done < len {
            let block_idx = self.pos / block_size;
            let in_block = (self.pos % block_size) as usize;
            let n = (block_size as usize - in_block).min(len - done);
            if let Err(e) = map.read_block(file, block_idx, in_block, &mut buf[done..done + n]) {
                self.last_error = Some(e.duplicate());
                return Err(e);
            }
            done += n;
            self.pos += n as u64;
        }
        Ok(len)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if !self.is_open() {
            return Err(Error::BadDescriptor);
        }
        if pos > self.disc_size {
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
        self.disc_size
    }

    fn is_open(&self) -> bool {
        SparseDiscReader::is_open(self)
    }
}
