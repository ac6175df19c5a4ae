//! Raw 2352-byte CD-ROM sector images (`.bin`).
//!
//! Every sector carries a 16-byte header in front of its 2048 bytes of
//! user data; Mode 2 Form 1 sectors add an 8-byte subheader.
//!
//! ```text
//! Mode 1                              Mode 2 Form 1
//! [0x000] Sync (12)                   [0x000] Sync (12)
//! [0x00C] Address MSF (3)             [0x00C] Address MSF (3)
//! [0x00F] Mode = 1                    [0x00F] Mode = 2
//! [0x010] User data (2048)            [0x010] Subheader (8)
//! [0x810] EDC/ECC (288)               [0x018] User data (2048)
//!                                     [0x818] EDC/ECC (280)
//! ```
//!
//! The reader exposes the user data as 2048-byte logical blocks.

use super::{BlockAddr, BlockMap, SparseDiscReader};
use crate::detect::{ISO_SECTOR_SIZE, RAW_SECTOR_SIZE};
use crate::source::SourceRef;
use crate::{Error, Result};

/// Offset of Mode 1 user data within a raw sector.
const MODE1_DATA: usize = 16;
/// Offset of Mode 2 Form 1 user data within a raw sector.
const MODE2_DATA: usize = 24;

/// Sector map for a raw CD image.
pub struct Cdrom2352 {
    sector_count: u64,
    /// Last raw sector read, with its index.
    cached: Option<(u64, Box<[u8; RAW_SECTOR_SIZE as usize]>)>,
}

impl Cdrom2352 {
    fn open(file: &SourceRef) -> Result<Self> {
        let size = file.size();
        if size == 0 || size % RAW_SECTOR_SIZE != 0 {
            return Err(Error::Parse("raw CD image size is not a multiple of 2352"));
        }
        Ok(Self {
            sector_count: size / RAW_SECTOR_SIZE,
            cached: None,
        })
    }
}

impl BlockMap for Cdrom2352 {
    fn block_size(&self) -> u32 {
        ISO_SECTOR_SIZE as u32
    }

    fn block_count(&self) -> u64 {
        self.sector_count
    }

    /// Address of the Mode 1 payload of sector `block_idx`.
    fn phys_block_addr(&self, block_idx: u64) -> BlockAddr {
        if block_idx >= self.sector_count {
            return BlockAddr::OutOfRange;
        }
        BlockAddr::Phys(block_idx * RAW_SECTOR_SIZE + MODE1_DATA as u64)
    }

    fn read_block(
        &mut self,
        file: &SourceRef,
        block_idx: u64,
        pos: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        if block_idx >= self.sector_count {
            return Err(Error::InvalidRange);
        }
        if self.cached.as_ref().is_none_or(|(idx, _)| *idx != block_idx) {
            let mut sector = Box::new([0u8; RAW_SECTOR_SIZE as usize]);
            file.read_exact_at(block_idx * RAW_SECTOR_SIZE, &mut sector[..])?;
            self.cached = Some((block_idx, sector));
        }
        let Some((_, sector)) = &self.cached else {
            return Err(Error::InvalidRange);
        };
        let data = if sector[15] == 2 { MODE2_DATA } else { MODE1_DATA };
        let start = data + pos;
        buf.copy_from_slice(&sector[start..start + buf.len()]);
        Ok(())
    }
}

/// Reader over a raw 2352-byte sector image.
pub type Cdrom2352Reader = SparseDiscReader<Cdrom2352>;

impl Cdrom2352Reader {
    pub fn new(file: SourceRef) -> Self {
        let opened = Cdrom2352::open(&file);
        Self::from_open(file, opened)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::detect::CD_SYNC;
    use crate::source::ByteSource;

    fn image(sectors: usize, mode: u8) -> Vec<u8> {
        let mut img = vec![0u8; sectors * 2352];
        for (i, s) in img.chunks_exact_mut(2352).enumerate() {
            s[..12].copy_from_slice(&CD_SYNC);
            s[15] = mode;
            let data = if mode == 2 { 24 } else { 16 };
            s[data..data + 2048].fill(i as u8 + 1);
        }
        img
    }

    #[test]
    fn block_addresses_skip_sector_headers() {
        let src = SourceRef::from_reader(Cursor::new(image(3, 1))).unwrap();
        let r = Cdrom2352Reader::new(src);
        assert!(r.is_open());
        assert_eq!(r.size(), 3 * 2048);
        for i in 0..3 {
            assert_eq!(r.phys_block_addr(i), BlockAddr::Phys(i * 2352 + 16));
        }
        assert_eq!(r.phys_block_addr(3), BlockAddr::OutOfRange);
    }

    #[test]
    fn mode2_payload_is_read() {
        let src = SourceRef::from_reader(Cursor::new(image(2, 2))).unwrap();
        let mut r = Cdrom2352Reader::new(src);
        let mut buf = [0u8; 4];
        r.read_exact_at(2046, &mut buf).unwrap();
        assert_eq!(buf, [1, 1, 2, 2]);
    }

    #[test]
    fn bad_size_is_rejected() {
        let src = SourceRef::from_reader(Cursor::new(vec![0u8; 2352 + 1])).unwrap();
        let mut r = Cdrom2352Reader::new(src);
        assert!(!r.is_open());
        assert!(matches!(r.last_error(), Some(Error::Parse(_))));
        let mut buf = [0u8; 1];
        assert!(matches!(r.read(&mut buf), Err(Error::BadDescriptor)));
    }
}
