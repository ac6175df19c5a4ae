//! NASOS sparse GameCube/Wii images (`.iso.dec`).
//!
//! Unused blocks of the original disc are dropped; a block map records
//! where each stored block lives.
//!
//! ```text
//! [0x00] Magic        "GCML" / "WII5" / "WII9"
//! [0x04] Image MD5    32 ASCII hex digits of the original image
//! [0x24] Reserved (4)
//! [0x28] BlockCount   (u32 LE)
//! [0x2C] Reserved (4)
//! [0x30] BlockMap     BlockCount × u32 LE
//!                     0xFFFFFFFF = not stored, otherwise offset >> 8
//! ```
//!
//! GameCube images use 2048-byte blocks, Wii images 1024-byte blocks.

use std::io::Cursor;

use static_assertions::const_assert_eq;

use super::{BlockAddr, BlockMap, SparseDiscReader};
use crate::source::SourceRef;
use crate::utils::{bytesa, le_u32};
use crate::{Error, Result};

/// Size of the fixed header in front of the block map.
pub const HEADER_SIZE: usize = 0x30;
const_assert_eq!(HEADER_SIZE, 4 + 32 + 4 + 4 + 4);

/// Map entry for a block that is not stored.
const EMPTY_BLOCK: u32 = 0xFFFF_FFFF;

/// Original disc sizes, used to cap the block count.
const GCN_DISC_SIZE: u64 = 1_459_978_240;
const WII_SL_DISC_SIZE: u64 = 4_699_979_776;
const WII_DL_DISC_SIZE: u64 = 8_511_160_320;

/// NASOS image flavour, from the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasosKind {
    GameCube,
    WiiSingleLayer,
    WiiDualLayer,
}

impl NasosKind {
    /// Identify a NASOS header by its magic.
    pub fn detect(header: &[u8]) -> Option<Self> {
        match header.get(..4)? {
            b"GCML" => Some(Self::GameCube),
            b"WII5" => Some(Self::WiiSingleLayer),
            b"WII9" => Some(Self::WiiDualLayer),
            _ => None,
        }
    }

    pub fn block_size(self) -> u32 {
        match self {
            Self::GameCube => 2048,
            Self::WiiSingleLayer | Self::WiiDualLayer => 1024,
        }
    }

    pub fn max_blocks(self) -> u64 {
        let disc = match self {
            Self::GameCube => GCN_DISC_SIZE,
            Self::WiiSingleLayer => WII_SL_DISC_SIZE,
            Self::WiiDualLayer => WII_DL_DISC_SIZE,
        };
        disc / self.block_size() as u64
    }
}

/// Block map of a NASOS image.
pub struct Nasos {
    kind: NasosKind,
    md5: String,
    map: Vec<u32>,
}

impl Nasos {
    fn open(file: &SourceRef) -> Result<Self> {
        let header = file.read_vec_at(0, HEADER_SIZE)?;
        let kind = NasosKind::detect(&header).ok_or(Error::BadMagic)?;

        let mut r = Cursor::new(&header[4..]);
        let md5_raw = bytesa::<32>(&mut r)?;
        let _reserved = le_u32(&mut r)?;
        let block_count = le_u32(&mut r)? as u64;
        if block_count == 0 || block_count > kind.max_blocks() {
            return Err(Error::TooLarge {
                size: block_count,
                limit: kind.max_blocks(),
            });
        }

        let raw = file.read_vec_at(HEADER_SIZE as u64, block_count as usize * 4)?;
        let map: Vec<u32> = raw
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let file_size = file.size();
        let block_size = kind.block_size() as u64;
        for &entry in &map {
            if entry != EMPTY_BLOCK && ((entry as u64) << 8) + block_size > file_size {
                log::warn!("NASOS block at {:#x} lies past end of file", (entry as u64) << 8);
                return Err(Error::InvalidRange);
            }
        }

        Ok(Self {
            kind,
            md5: String::from_utf8_lossy(&md5_raw).into_owned(),
            map,
        })
    }
}

impl BlockMap for Nasos {
    fn block_size(&self) -> u32 {
        self.kind.block_size()
    }

    fn block_count(&self) -> u64 {
        self.map.len() as u64
    }

    fn phys_block_addr(&self, block_idx: u64) -> BlockAddr {
        match self.map.get(block_idx as usize) {
            None => BlockAddr::OutOfRange,
            Some(&EMPTY_BLOCK) => BlockAddr::Empty,
            Some(&entry) => BlockAddr::Phys((entry as u64) << 8),
        }
    }
}

/// Reader over a NASOS image.
pub type NasosReader = SparseDiscReader<Nasos>;

impl NasosReader {
    pub fn new(file: SourceRef) -> Self {
        let opened = Nasos::open(&file);
        Self::from_open(file, opened)
    }

    pub fn kind(&self) -> Option<NasosKind> {
        self.map().map(|m| m.kind)
    }

    /// MD5 of the original image as recorded in the header.
    pub fn image_md5(&self) -> Option<&str> {
        self.map().map(|m| m.md5.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::source::ByteSource;

    /// GCML image with three blocks: stored, empty, stored.
    fn image() -> Vec<u8> {
        let mut img = vec![0u8; 0x100];
        img[..4].copy_from_slice(b"GCML");
        img[4..36].copy_from_slice(b"0123456789abcdef0123456789abcdef");
        img[0x28..0x2C].copy_from_slice(&3u32.to_le_bytes());
        img[0x30..0x34].copy_from_slice(&0x01u32.to_le_bytes());
        img[0x34..0x38].copy_from_slice(&EMPTY_BLOCK.to_le_bytes());
        img[0x38..0x3C].copy_from_slice(&0x09u32.to_le_bytes());
        img.resize(0x100 + 2 * 2048, 0);
        img[0x100..0x900].fill(0xAA);
        img[0x900..0x1100].fill(0xBB);
        img
    }

    #[test]
    fn maps_stored_and_empty_blocks() {
        let src = SourceRef::from_reader(Cursor::new(image())).unwrap();
        let mut r = NasosReader::new(src);
        assert!(r.is_open());
        assert_eq!(r.kind(), Some(NasosKind::GameCube));
        assert_eq!(r.size(), 3 * 2048);
        assert_eq!(r.phys_block_addr(0), BlockAddr::Phys(0x100));
        assert_eq!(r.phys_block_addr(1), BlockAddr::Empty);
        assert_eq!(r.phys_block_addr(3), BlockAddr::OutOfRange);

        let mut buf = [0u8; 4];
        r.read_exact_at(2046, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xAA, 0, 0]);
        r.read_exact_at(4094, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0xBB, 0xBB]);
    }

    #[test]
    fn block_past_eof_is_rejected() {
        let mut img = image();
        img.truncate(0x100 + 2048);
        let src = SourceRef::from_reader(Cursor::new(img)).unwrap();
        let r = NasosReader::new(src);
        assert!(!r.is_open());
        assert!(matches!(r.last_error(), Some(Error::InvalidRange)));
    }

    #[test]
    fn detect_by_magic() {
        assert_eq!(NasosKind::detect(b"WII9...."), Some(NasosKind::WiiDualLayer));
        assert_eq!(NasosKind::detect(b"GCM"), None);
        assert_eq!(NasosKind::WiiSingleLayer.max_blocks(), 4_589_824);
    }
}
