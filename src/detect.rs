//! Detection inputs.
//!
//! Detectors are pure functions over a [`DetectInfo`]: a captured byte
//! buffer, the address it was captured from, the total file size, and the
//! file extension if the caller knows it. They never perform I/O and never
//! fail with an error; "not this format" is `None`.

use crate::source::SourceRef;

/// Bytes captured from offset 0 for the first detection pass.
pub const HEADER_SIZE: usize = 4096;

/// Logical sector size of an ISO-9660 volume.
pub const ISO_SECTOR_SIZE: u64 = 2048;

/// Raw CD sector size (sync + header + payload + EDC/ECC).
pub const RAW_SECTOR_SIZE: u64 = 2352;

/// Sector holding the primary volume descriptor.
pub const PVD_SECTOR: u64 = 16;

/// Sync pattern at the start of every raw CD sector.
pub const CD_SYNC: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// A captured byte buffer and where it came from.
#[derive(Debug, Clone, Copy)]
pub struct DetectHeader<'a> {
    /// Absolute offset in the source the buffer was read from.
    pub addr: u64,
    /// The captured bytes. May be shorter than requested for small files.
    pub data: &'a [u8],
}

/// Everything a detector may look at.
#[derive(Debug, Clone, Copy)]
pub struct DetectInfo<'a> {
    pub header: DetectHeader<'a>,
    /// Lowercase file extension without the dot, if known.
    pub ext: Option<&'a str>,
    /// Total size of the source in bytes.
    pub file_size: u64,
}

impl<'a> DetectInfo<'a> {
    /// Build detection info for a buffer captured at offset 0.
    pub fn new(data: &'a [u8], ext: Option<&'a str>, file_size: u64) -> Self {
        Self {
            header: DetectHeader { addr: 0, data },
            ext,
            file_size,
        }
    }

    /// Header bytes, but only if they were captured from offset 0 and are at
    /// least `min_len` long.
    pub(crate) fn start(&self, min_len: usize) -> Option<&'a [u8]> {
        let h = self.header;
        (h.addr == 0 && h.data.len() >= min_len).then_some(h.data)
    }
}

/// Physical layout of an ISO-9660 image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorLayout {
    /// Cooked 2048-byte sectors.
    Cooked2048,
    /// Raw 2352-byte sectors (Mode 1 or Mode 2 Form 1).
    Raw2352,
}

impl SectorLayout {
    /// Absolute offset of the PVD payload for this layout.
    pub fn pvd_offset(self, mode2: bool) -> u64 {
        match self {
            SectorLayout::Cooked2048 => PVD_SECTOR * ISO_SECTOR_SIZE,
            SectorLayout::Raw2352 => {
                PVD_SECTOR * RAW_SECTOR_SIZE + if mode2 { 24 } else { 16 }
            }
        }
    }
}

/// A located ISO-9660 primary volume descriptor.
#[derive(Debug, Clone)]
pub struct PvdProbe {
    pub layout: SectorLayout,
    /// Absolute offset the descriptor was read from.
    pub addr: u64,
    /// The 2048-byte descriptor.
    pub data: Vec<u8>,
}

impl PvdProbe {
    /// Detection info over the descriptor, keyed by its real address.
    pub fn info<'a>(&'a self, ext: Option<&'a str>, file_size: u64) -> DetectInfo<'a> {
        DetectInfo {
            header: DetectHeader {
                addr: self.addr,
                data: &self.data,
            },
            ext,
            file_size,
        }
    }
}

/// True if `pvd` starts with a version-1 primary volume descriptor.
pub(crate) fn is_pvd(pvd: &[u8]) -> bool {
    pvd.len() >= ISO_SECTOR_SIZE as usize && pvd[0] == 0x01 && &pvd[1..6] == b"CD001" && pvd[6] == 1
}

/// Look for a PVD in both cooked and raw sector layouts.
///
/// Read failures are treated as "no PVD" - probing must not fail.
pub fn find_iso_pvd(source: &SourceRef) -> Option<PvdProbe> {
    let size = source.size();

    let cooked = SectorLayout::Cooked2048.pvd_offset(false);
    if size >= cooked + ISO_SECTOR_SIZE
        && let Ok(data) = source.read_vec_at(cooked, ISO_SECTOR_SIZE as usize)
        && is_pvd(&data)
    {
        return Some(PvdProbe {
            layout: SectorLayout::Cooked2048,
            addr: cooked,
            data,
        });
    }

    let raw = PVD_SECTOR * RAW_SECTOR_SIZE;
    if size < raw + RAW_SECTOR_SIZE {
        return None;
    }
    let sector = source.read_vec_at(raw, RAW_SECTOR_SIZE as usize).ok()?;
    if sector[..12] != CD_SYNC {
        return None;
    }
    let mode2 = match sector[15] {
        1 => false,
        2 => true,
        _ => return None,
    };
    let start = if mode2 { 24 } else { 16 };
    let data = sector[start..start + ISO_SECTOR_SIZE as usize].to_vec();
    is_pvd(&data).then(|| PvdProbe {
        layout: SectorLayout::Raw2352,
        addr: SectorLayout::Raw2352.pvd_offset(mode2),
        data,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn pvd_bytes() -> Vec<u8> {
        let mut pvd = vec![0u8; 2048];
        pvd[0] = 1;
        pvd[1..6].copy_from_slice(b"CD001");
        pvd[6] = 1;
        pvd
    }

    #[test]
    fn start_rejects_nonzero_address() {
        let data = [0u8; 64];
        let info = DetectInfo {
            header: DetectHeader {
                addr: 0x8000,
                data: &data,
            },
            ext: None,
            file_size: 64,
        };
        assert!(info.start(16).is_none());
        assert!(DetectInfo::new(&data, None, 64).start(65).is_none());
    }

    #[test]
    fn finds_cooked_pvd() {
        let mut img = vec![0u8; 18 * 2048];
        img[0x8000..0x8800].copy_from_slice(&pvd_bytes());
        let src = SourceRef::from_reader(Cursor::new(img)).unwrap();
        let probe = find_iso_pvd(&src).unwrap();
        assert_eq!(probe.layout, SectorLayout::Cooked2048);
        assert_eq!(probe.addr, 0x8000);
    }

    #[test]
    fn finds_mode2_raw_pvd() {
        let mut img = vec![0u8; 18 * 2352];
        let base = 16 * 2352;
        img[base..base + 12].copy_from_slice(&CD_SYNC);
        img[base + 15] = 2;
        img[base + 24..base + 24 + 2048].copy_from_slice(&pvd_bytes());
        let src = SourceRef::from_reader(Cursor::new(img)).unwrap();
        let probe = find_iso_pvd(&src).unwrap();
        assert_eq!(probe.layout, SectorLayout::Raw2352);
        assert_eq!(probe.addr, 0x9318);
    }

    #[test]
    fn no_pvd_in_zeroes() {
        let src = SourceRef::from_reader(Cursor::new(vec![0u8; 40 * 2352])).unwrap();
        assert!(find_iso_pvd(&src).is_none());
    }
}
