//! ZISO LZ4-compressed ISO images (`.zso`, requires the `compression`
//! feature).
//!
//! ```text
//! [0x00] Magic            "ZISO"
//! [0x04] HeaderSize       (u32 LE) 0x18
//! [0x08] UncompressedSize (u64 LE)
//! [0x10] BlockSize        (u32 LE)
//! [0x14] Version          (u8)
//! [0x15] IndexShift       (u8)
//! [0x16] Reserved (2)
//! [0x18] Index            (BlockCount + 1) × u32 LE
//! ```
//!
//! Index entry `i` gives `(entry & 0x7FFFFFFF) << IndexShift`, the offset of
//! block `i`; the next entry bounds it. Bit 31 marks a block stored without
//! compression.

#![cfg(feature = "compression")]

use std::io::Cursor;

use static_assertions::const_assert_eq;

use super::{BlockAddr, BlockMap, SparseDiscReader};
use crate::compression::lz4::Lz4Block;
use crate::compression::{Decompressor, decompress};
use crate::source::SourceRef;
use crate::utils::{le_u32, le_u64, magic, u8};
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 0x18;
const_assert_eq!(HEADER_SIZE, 4 + 4 + 8 + 4 + 1 + 1 + 2);

pub const MAGIC: &[u8; 4] = b"ZISO";

const PLAIN_BIT: u32 = 0x8000_0000;
const MAX_BLOCK_SIZE: u32 = 1 << 20;
const MAX_INDEX_TABLE: u64 = 16 << 20;

/// Block index of a ZISO image plus a one-block decode cache.
pub struct Ziso {
    block_size: u32,
    disc_size: u64,
    shift: u8,
    index: Vec<u32>,
    codec: Box<dyn Decompressor>,
    cached: Option<(u64, Vec<u8>)>,
}

impl Ziso {
    fn open(file: &SourceRef, codec: Box<dyn Decompressor>) -> Result<Self> {
        let header = file.read_vec_at(0, HEADER_SIZE)?;
        let mut r = Cursor::new(&header[..]);
        magic(&mut r, MAGIC)?;
        let header_size = le_u32(&mut r)?;
        let disc_size = le_u64(&mut r)?;
        let block_size = le_u32(&mut r)?;
        let version = u8(&mut r)?;
        let shift = u8(&mut r)?;

        if header_size as usize != HEADER_SIZE {
            return Err(Error::Parse("unexpected ZISO header size"));
        }
        if version > 1 {
            return Err(Error::UnsupportedVersion(version));
        }
        if block_size < 0x800 || block_size > MAX_BLOCK_SIZE || !block_size.is_power_of_two() {
            return Err(Error::Parse("unsupported ZISO block size"));
        }
        if disc_size == 0 || shift > 31 {
            return Err(Error::Parse("invalid ZISO header"));
        }

        let entries = disc_size.div_ceil(block_size as u64) + 1;
        let table_len = entries * 4;
        if table_len > MAX_INDEX_TABLE {
            return Err(Error::TooLarge {
                size: table_len,
                limit: MAX_INDEX_TABLE,
            });
        }
        let raw = file.read_vec_at(HEADER_SIZE as u64, table_len as usize)?;
        let index: Vec<u32> = raw
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let offset = |e: u32| ((e & !PLAIN_BIT) as u64) << shift;
        let file_size = file.size();
        for pair in index.windows(2) {
            let (start, end) = (offset(pair[0]), offset(pair[1]));
            if end < start || end > file_size {
                log::warn!("ZISO index entry {start:#x}..{end:#x} is out of range");
                return Err(Error::InvalidRange);
            }
        }

        Ok(Self {
            block_size,
            disc_size,
            shift,
            index,
            codec,
            cached: None,
        })
    }

    fn offset(&self, entry: u32) -> u64 {
        ((entry & !PLAIN_BIT) as u64) << self.shift
    }

    /// Logical length of block `block_idx`; the last block may be short.
    fn block_len(&self, block_idx: u64) -> usize {
        let start = block_idx * self.block_size as u64;
        (self.disc_size - start).min(self.block_size as u64) as usize
    }
}

impl BlockMap for Ziso {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.index.len() as u64 - 1
    }

    fn disc_size(&self) -> u64 {
        self.disc_size
    }

    /// Physical start of the stored (possibly compressed) block.
    fn phys_block_addr(&self, block_idx: u64) -> BlockAddr {
        if block_idx >= self.block_count() {
            return BlockAddr::OutOfRange;
        }
        BlockAddr::Phys(self.offset(self.index[block_idx as usize]))
    }

    fn read_block(
        &mut self,
        file: &SourceRef,
        block_idx: u64,
        pos: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        if block_idx >= self.block_count() {
            return Err(Error::InvalidRange);
        }
        let entry = self.index[block_idx as usize];
        let start = self.offset(entry);
        let stored = (self.offset(self.index[block_idx as usize + 1]) - start) as usize;
        let len = self.block_len(block_idx);

        if entry & PLAIN_BIT != 0 || stored >= len {
            return file.read_exact_at(start + pos as u64, buf);
        }

        if self.cached.as_ref().is_none_or(|(idx, _)| *idx != block_idx) {
            let src = file.read_vec_at(start, stored)?;
            let mut out = vec![0u8; len];
            decompress(&*self.codec, &src, &mut out, self.block_size, None)?;
            self.cached = Some((block_idx, out));
        }
        let Some((_, block)) = &self.cached else {
            return Err(Error::InvalidRange);
        };
        buf.copy_from_slice(&block[pos..pos + buf.len()]);
        Ok(())
    }
}

/// Reader over a ZISO image.
pub type ZisoReader = SparseDiscReader<Ziso>;

impl ZisoReader {
    pub fn new(file: SourceRef) -> Self {
        Self::with_codec(file, Box::new(Lz4Block))
    }

    /// Use `codec` instead of the built-in LZ4 decoder.
    pub fn with_codec(file: SourceRef, codec: Box<dyn Decompressor>) -> Self {
        let opened = Ziso::open(&file, codec);
        Self::from_open(file, opened)
    }
}

/// True if `header` starts with the ZISO magic.
pub fn is_ziso(header: &[u8]) -> bool {
    header.starts_with(MAGIC)
}
