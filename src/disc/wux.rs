//! WUX deduplicated Wii U disc images.
//!
//! Identical sectors of the original disc are stored once; an index
//! table maps each logical sector to a stored one.
//!
//! ```text
//! [0x00] Magic0        "WUX0"
//! [0x04] Magic1        (u32 LE) 0x1099D02E
//! [0x08] SectorSize    (u32 LE, power of two)
//! [0x0C] Reserved (4)
//! [0x10] UncompressedSize (u64 LE)
//! [0x18] Flags         (u32 LE)
//! [0x1C] Reserved (4)
//! [0x20] IndexTable    ceil(UncompressedSize / SectorSize) × u32 LE
//! ...    Sector data, starting at the next SectorSize boundary
//! ```

use std::io::Cursor;

use static_assertions::const_assert_eq;

use super::{BlockAddr, BlockMap, SparseDiscReader};
use crate::source::SourceRef;
use crate::utils::{align_up, le_u32, le_u32_at, le_u64, magic};
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 0x20;
const_assert_eq!(HEADER_SIZE, 4 + 4 + 4 + 4 + 8 + 4 + 4);

pub const MAGIC0: &[u8; 4] = b"WUX0";
pub const MAGIC1: u32 = 0x1099_D02E;

const MIN_SECTOR_SIZE: u32 = 0x100;
const MAX_SECTOR_SIZE: u32 = 0x1000_0000;
/// Largest index table accepted.
const MAX_INDEX_TABLE: u64 = 16 << 20;

/// True if `header` starts with both WUX magics.
pub fn is_wux(header: &[u8]) -> bool {
    header.starts_with(MAGIC0) && le_u32_at(header, 4) == Some(MAGIC1)
}

/// Sector index of a WUX image.
pub struct Wux {
    sector_size: u32,
    disc_size: u64,
    data_offset: u64,
    index: Vec<u32>,
}

impl Wux {
    fn open(file: &SourceRef) -> Result<Self> {
        let header = file.read_vec_at(0, HEADER_SIZE)?;
        let mut r = Cursor::new(&header[..]);
        magic(&mut r, MAGIC0)?;
        if le_u32(&mut r)? != MAGIC1 {
            return Err(Error::BadMagic);
        }
        let sector_size = le_u32(&mut r)?;
        let _reserved = le_u32(&mut r)?;
        let disc_size = le_u64(&mut r)?;
        let _flags = le_u32(&mut r)?;

        if !sector_size.is_power_of_two()
            || !(MIN_SECTOR_SIZE..MAX_SECTOR_SIZE).contains(&sector_size)
        {
            return Err(Error::Parse("WUX sector size is not a supported power of two"));
        }
        if disc_size == 0 {
            return Err(Error::Parse("WUX image is empty"));
        }

        let sector_count = disc_size.div_ceil(sector_size as u64);
        let table_len = sector_count * 4;
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

        let data_offset = align_up(HEADER_SIZE as u64 + table_len, sector_size as u64);
        let stored = (file.size().saturating_sub(data_offset)) / sector_size as u64;
        if let Some(&bad) = index.iter().find(|&&i| i as u64 >= stored) {
            log::warn!("WUX index {bad} references a sector past end of file");
            return Err(Error::InvalidRange);
        }

        Ok(Self {
            sector_size,
            disc_size,
            data_offset,
            index,
        })
    }
}

impl BlockMap for Wux {
    fn block_size(&self) -> u32 {
        self.sector_size
    }

    fn block_count(&self) -> u64 {
        self.index.len() as u64
    }

    fn disc_size(&self) -> u64 {
        self.disc_size
    }

    fn phys_block_addr(&self, block_idx: u64) -> BlockAddr {
        match self.index.get(block_idx as usize) {
            Some(&i) => BlockAddr::Phys(self.data_offset + i as u64 * self.sector_size as u64),
            None => BlockAddr::OutOfRange,
        }
    }
}

/// Reader over a WUX image.
pub type WuxReader = SparseDiscReader<Wux>;

impl WuxReader {
    pub fn new(file: SourceRef) -> Self {
        let opened = Wux::open(&file);
        Self::from_open(file, opened)
    }
}
