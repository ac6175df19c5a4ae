//! ISO-9660 partitions.
//!
//! ## Primary volume descriptor (sector 16, 2048 bytes)
//! ```text
//! [0x000] Type (u8) = 1
//! [0x001] Identifier "CD001"
//! [0x006] Version (u8) = 1
//! [0x008] SystemId (32)
//! [0x028] VolumeId (32)
//! [0x050] VolumeSpaceSize (both-endian u32)
//! [0x080] LogicalBlockSize (both-endian u16)
//! [0x09C] Root directory record (34)
//! [0x0BE] VolumeSetId, Publisher, DataPreparer, Application (128 each)
//! [0x2BE] Copyright, Abstract, Bibliographic file ids (37 each)
//! [0x32D] Creation, modification, expiration, effective dates (17 each)
//! ```
//!
//! ## Directory record
//! ```text
//! [0x00] Length (u8)          [0x19] Flags (u8): 0x02 dir, 0x04 associated
//! [0x02] Extent block (u32×2) [0x20] NameLength (u8)
//! [0x0A] DataLength (u32×2)   [0x21] Name
//! ```
//!
//! Only the root directory is searched.

use std::io::Cursor;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use static_assertions::const_assert_eq;

use super::PartitionFile;
use crate::detect::ISO_SECTOR_SIZE;
use crate::source::{ByteSource, SourceRef};
use crate::text::latin1;
use crate::utils::{align_up, both_u16, both_u32, bytesa, bytesv, magic, u8};
use crate::{Error, Result};

/// Offset of the PVD from the start of the partition.
pub const PVD_OFFSET: u64 = 0x8000;

pub const PVD_SIZE: usize = 2048;
const_assert_eq!(
    PVD_SIZE,
    8
        + 32
        + 32
        + 8
        + 8
        + 32
        + 4
        + 4
        + 4
        + 8
        + 16
        + DIR_RECORD_SIZE
        + 128 * 4
        + 37 * 3
        + 17 * 4
        + 2
        + 512
        + 653
);

/// Size of the root directory record embedded in the PVD.
pub const DIR_RECORD_SIZE: usize = 34;
/// Fixed part of a directory record, before the name.
const DIR_RECORD_MIN: usize = 33;

/// Largest root directory that will be loaded.
pub const MAX_ROOT_DIR_SIZE: u64 = 16 << 20;

/// Root directory block assumed for images whose start offset is unknown.
const ASSUMED_ROOT_BLOCK: u32 = 20;

const FLAG_DIRECTORY: u8 = 0x02;
const FLAG_ASSOCIATED: u8 = 0x04;

/// Decoded primary volume descriptor.
#[derive(Debug, Clone)]
pub struct Pvd {
    pub system_id: String,
    pub volume_id: String,
    pub volume_space_size: u32,
    pub block_size: u16,
    pub root: DirEntry,
    pub volume_set_id: String,
    pub publisher: String,
    pub data_preparer: String,
    pub application: String,
    pub copyright_file: String,
    pub abstract_file: String,
    pub bibliographic_file: String,
    pub btime: Option<NaiveDateTime>,
    pub mtime: Option<NaiveDateTime>,
    pub exptime: Option<NaiveDateTime>,
    pub efftime: Option<NaiveDateTime>,
}

impl Pvd {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        let ty = u8(&mut r)?;
        magic(&mut r, b"CD001")?;
        let version = u8(&mut r)?;
        if ty != 1 {
            return Err(Error::Parse("not a primary volume descriptor"));
        }
        if version != 1 {
            return Err(Error::UnsupportedVersion(version));
        }
        let _unused = u8(&mut r)?;

        let system_id = latin1(&bytesa::<32>(&mut r)?);
        let volume_id = latin1(&bytesa::<32>(&mut r)?);
        let _unused = bytesa::<8>(&mut r)?;
        let volume_space_size = both_u32(&mut r)?;
        let _unused = bytesa::<32>(&mut r)?;
        let _volume_set_size = both_u16(&mut r)?;
        let _volume_seq = both_u16(&mut r)?;
        let block_size = both_u16(&mut r)?;
        let _path_table_size = both_u32(&mut r)?;
        let _path_tables = bytesa::<16>(&mut r)?;
        let root = DirEntry::parse(&bytesa::<DIR_RECORD_SIZE>(&mut r)?)?;

        let mut text128 = || bytesv(&mut r, 128).map(|b| latin1(&b));
        let volume_set_id = text128()?;
        let publisher = text128()?;
        let data_preparer = text128()?;
        let application = text128()?;

        let copyright_file = latin1(&bytesa::<37>(&mut r)?);
        let abstract_file = latin1(&bytesa::<37>(&mut r)?);
        let bibliographic_file = latin1(&bytesa::<37>(&mut r)?);

        Ok(Self {
            system_id,
            volume_id,
            volume_space_size,
            block_size,
            root,
            volume_set_id,
            publisher,
            data_preparer,
            application,
            copyright_file,
            abstract_file,
            bibliographic_file,
            btime: iso_datetime(&bytesa::<17>(&mut r)?),
            mtime: iso_datetime(&bytesa::<17>(&mut r)?),
            exptime: iso_datetime(&bytesa::<17>(&mut r)?),
            efftime: iso_datetime(&bytesa::<17>(&mut r)?),
        })
    }
}

/// Decode a 17-byte "YYYYMMDDHHMMSScc" + GMT offset timestamp as UTC.
///
/// An unset timestamp (all `'0'` or all NUL) is `None`.
pub fn iso_datetime(raw: &[u8; 17]) -> Option<NaiveDateTime> {
    fn digits(b: &[u8]) -> Option<u32> {
        b.iter()
            .try_fold(0u32, |acc, &c| c.is_ascii_digit().then(|| acc * 10 + (c - b'0') as u32))
    }

    let year = digits(&raw[0..4])?;
    if year == 0 {
        return None;
    }
    let local = NaiveDate::from_ymd_opt(year as i32, digits(&raw[4..6])?, digits(&raw[6..8])?)?
        .and_hms_milli_opt(
            digits(&raw[8..10])?,
            digits(&raw[10..12])?,
            digits(&raw[12..14])?,
            digits(&raw[14..16])? * 10,
        )?;
    // Offset from GMT in 15-minute units.
    let offset = raw[16] as i8 as i64;
    local.checked_sub_signed(TimeDelta::minutes(offset * 15))
}

/// One root directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// First logical block of the extent.
    pub block: u32,
    pub size: u32,
    pub flags: u8,
}

impl DirEntry {
    fn parse(rec: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(rec);
        let _len = u8(&mut r)?;
        let _ext_attr_len = u8(&mut r)?;
        let block = both_u32(&mut r)?;
        let size = both_u32(&mut r)?;
        let _recorded = bytesa::<7>(&mut r)?;
        let flags = u8(&mut r)?;
        let _unit_size = u8(&mut r)?;
        let _gap = u8(&mut r)?;
        let _volume_seq = both_u16(&mut r)?;
        let name_len = u8(&mut r)? as usize;
        let name = bytesv(&mut r, name_len)?;
        Ok(Self {
            name: latin1(&name),
            block,
            size,
            flags,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// Associated files carry extra data for another entry of the same name.
    pub fn is_associated(&self) -> bool {
        self.flags & FLAG_ASSOCIATED != 0
    }

    /// Matches `name` followed by `suffix`, ignoring ASCII case.
    fn matches(&self, name: &str, suffix: &str) -> bool {
        self.name.len() == name.len() + suffix.len()
            && self.name.is_char_boundary(name.len())
            && self.name[..name.len()].eq_ignore_ascii_case(name)
            && self.name[name.len()..].eq_ignore_ascii_case(suffix)
    }
}

/// Walk the records of a directory extent.
///
/// A zero length byte pads the rest of a sector. A truncated record ends
/// the walk.
fn parse_directory(dir: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < dir.len() {
        let rec_len = dir[pos] as usize;
        if rec_len == 0 {
            pos = align_up(pos as u64 + 1, ISO_SECTOR_SIZE) as usize;
            continue;
        }
        if rec_len < DIR_RECORD_MIN {
            break;
        }
        let Some(rec) = dir.get(pos..pos + rec_len) else {
            break;
        };
        pos += rec_len;
        let name_len = rec[32] as usize;
        if name_len == 1 && rec.get(33).is_some_and(|&b| b <= 1) {
            // "." and ".."
            continue;
        }
        match DirEntry::parse(rec) {
            Ok(entry) => entries.push(entry),
            Err(_) => break,
        }
    }
    entries
}

/// ISO-9660 volume at a fixed offset inside a disc.
pub struct IsoPartition {
    disc: Option<SourceRef>,
    partition_offset: u64,
    partition_size: u64,
    /// Logical block that sits at the start of the partition.
    iso_start_offset: Option<i64>,
    pvd: Option<Pvd>,
    root: Option<Vec<DirEntry>>,
    pos: u64,
    last_error: Option<Error>,
}

impl IsoPartition {
    /// Open the volume whose sector 0 is at `partition_offset` in `disc`.
    ///
    /// `iso_start_offset` is the logical block number of that sector. Pass
    /// `None` when it is unknown; it is then guessed from the root directory
    /// location when the directory is first loaded.
    pub fn new(disc: SourceRef, partition_offset: u64, iso_start_offset: Option<i64>) -> Self {
        let mut part = Self {
            disc: None,
            partition_offset,
            partition_size: disc.size().saturating_sub(partition_offset),
            iso_start_offset,
            pvd: None,
            root: None,
            pos: 0,
            last_error: None,
        };
        match disc
            .read_vec_at(partition_offset + PVD_OFFSET, PVD_SIZE)
            .and_then(|data| Pvd::parse(&data))
        {
            Ok(pvd) => {
                part.pvd = Some(pvd);
                part.disc = Some(disc);
            }
            Err(e) => {
                log::debug!("no ISO-9660 volume at {partition_offset:#x}: {e}");
                part.last_error = Some(e);
            }
        }
        part
    }

    pub fn is_valid(&self) -> bool {
        self.disc.is_some()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn pvd(&self) -> Option<&Pvd> {
        self.pvd.as_ref()
    }

    pub fn iso_start_offset(&self) -> Option<i64> {
        self.iso_start_offset
    }

    /// Load and cache the root directory. Later calls do no I/O.
    pub fn load_root_directory(&mut self) -> Result<&[DirEntry]> {
        if self.root.is_none() {
            let entries = self.read_root_directory().inspect_err(|e| {
                self.last_error = Some(e.duplicate());
            })?;
            self.root = Some(entries);
        }
        Ok(self.root.as_deref().unwrap_or_default())
    }

    fn read_root_directory(&mut self) -> Result<Vec<DirEntry>> {
        let (Some(disc), Some(pvd)) = (&self.disc, &self.pvd) else {
            return Err(Error::BadDescriptor);
        };
        let root = &pvd.root;
        if root.size as u64 > MAX_ROOT_DIR_SIZE {
            log::warn!("ISO root directory claims {} bytes", root.size);
            return Err(Error::TooLarge {
                size: root.size as u64,
                limit: MAX_ROOT_DIR_SIZE,
            });
        }

        if self.iso_start_offset.is_none() {
            if root.block < ASSUMED_ROOT_BLOCK {
                return Err(Error::Parse("root directory block is implausibly low"));
            }
            self.iso_start_offset = Some((root.block - ASSUMED_ROOT_BLOCK) as i64);
        }

        let offset = self.block_offset(root.block, root.size)?;
        let dir = disc.read_vec_at(self.partition_offset + offset, root.size as usize)?;
        Ok(parse_directory(&dir))
    }

    /// Partition-relative byte offset of an extent, checked against the
    /// partition bounds.
    fn block_offset(&self, block: u32, size: u32) -> Result<u64> {
        let start = self.iso_start_offset.unwrap_or(0);
        let rel = block as i64 - start;
        if rel < 0 {
            return Err(Error::InvalidRange);
        }
        let offset = rel as u64 * ISO_SECTOR_SIZE;
        if offset + size as u64 > self.partition_size {
            return Err(Error::InvalidRange);
        }
        Ok(offset)
    }

    /// Root directory entries, empty until the directory has been loaded.
    pub fn entries(&self) -> &[DirEntry] {
        self.root.as_deref().unwrap_or_default()
    }

    /// Open a file in the root directory.
    ///
    /// Leading separators are ignored. Names are compared without regard
    /// to ASCII case, first exactly, then with a `;1` version suffix.
    pub fn open(&mut self, name: &str) -> Result<PartitionFile> {
        let name = name.trim_start_matches(['/', '\\']);
        if name.is_empty() {
            return Err(Error::NotFound);
        }
        if name.contains(['/', '\\']) {
            return Err(Error::Unsupported("subdirectory lookup"));
        }

        self.load_root_directory()?;
        let entries = self.entries();
        let primary = || entries.iter().filter(|e| !e.is_associated());
        let entry = primary()
            .find(|e| e.matches(name, ""))
            .or_else(|| primary().find(|e| e.matches(name, ";1")))
            .ok_or(Error::NotFound)?;
        if entry.is_dir() {
            return Err(Error::IsDirectory);
        }

        let offset = self.block_offset(entry.block, entry.size)?;
        let disc = self.disc.clone().ok_or(Error::BadDescriptor)?;
        log::debug!("opened {name} at {:#x}", self.partition_offset + offset);
        Ok(PartitionFile::new(
            disc,
            self.partition_offset + offset,
            entry.size as u64,
        ))
    }
}

impl ByteSource for IsoPartition {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let disc = self.disc.as_ref().ok_or(Error::BadDescriptor)?;
        let len = buf.len().min((self.partition_size - self.pos) as usize);
        let n = disc.seek_and_read(self.partition_offset + self.pos, &mut buf[..len])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if self.disc.is_none() {
            return Err(Error::BadDescriptor);
        }
        if pos > self.partition_size {
            return Err(Error::InvalidRange);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.partition_size
    }

    fn is_open(&self) -> bool {
        self.disc.is_some()
    }
}
