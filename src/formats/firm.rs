//! Nintendo 3DS FIRM firmware images.
//!
//! ## Header (0x200 bytes)
//! ```text
//! [0x000] Magic "FIRM"
//! [0x004] BootPriority (u32 LE)
//! [0x008] Arm11Entry   (u32 LE)
//! [0x00C] Arm9Entry    (u32 LE)
//! [0x010] Reserved (0x30)
//! [0x040] Section headers (4 × 0x30)
//! [0x100] RSA-2048 signature (0x100)
//! ```
//!
//! ## Section header (0x30 bytes)
//! ```text
//! [0x00] Offset       (u32 LE, from start of image)
//! [0x04] LoadAddress  (u32 LE)
//! [0x08] Size         (u32 LE, 0 = unused)
//! [0x0C] CopyMethod   (u32 LE) 0 = NDMA, 1 = XDMA, 2 = memcpy
//! [0x10] SHA-256 (32)
//! ```

use std::io::Cursor;

use static_assertions::const_assert_eq;

use super::{RomData, RomDataCore};
use crate::detect::DetectInfo;
use crate::fields::RomFields;
use crate::source::SourceRef;
use crate::utils::{bytesa, le_u32, magic};
use crate::{Error, Result};

pub const MAGIC: &[u8; 4] = b"FIRM";
pub const SECTION_COUNT: usize = 4;
static SECTION_NAMES: [&str; SECTION_COUNT] = ["0", "1", "2", "3"];

/// One FIRM section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmSection {
    pub offset: u32,
    pub load_address: u32,
    pub size: u32,
    pub copy_method: u32,
    pub sha256: [u8; 32],
}

impl FirmSection {
    pub const SIZE: usize = 0x30;

    pub fn copy_method_name(&self) -> &'static str {
        match self.copy_method {
            0 => "NDMA",
            1 => "XDMA",
            2 => "memcpy",
            _ => "unknown",
        }
    }
}
const_assert_eq!(FirmSection::SIZE, 4 * 4 + 32);

/// Decoded FIRM header.
#[derive(Debug, Clone)]
pub struct FirmHeader {
    pub boot_priority: u32,
    pub arm11_entry: u32,
    pub arm9_entry: u32,
    pub sections: [FirmSection; SECTION_COUNT],
    pub signature: [u8; 0x100],
}

impl FirmHeader {
    pub const SIZE: usize = 0x200;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        magic(&mut r, MAGIC)?;
        let boot_priority = le_u32(&mut r)?;
        let arm11_entry = le_u32(&mut r)?;
        let arm9_entry = le_u32(&mut r)?;
        let _reserved = bytesa::<0x30>(&mut r)?;

        let mut sections = [FirmSection {
            offset: 0,
            load_address: 0,
            size: 0,
            copy_method: 0,
            sha256: [0; 32],
        }; SECTION_COUNT];
        for s in &mut sections {
            s.offset = le_u32(&mut r)?;
            s.load_address = le_u32(&mut r)?;
            s.size = le_u32(&mut r)?;
            s.copy_method = le_u32(&mut r)?;
            s.sha256 = bytesa::<32>(&mut r)?;
        }
        let signature = bytesa::<0x100>(&mut r)?;

        Ok(Self {
            boot_priority,
            arm11_entry,
            arm9_entry,
            sections,
            signature,
        })
    }

    /// Sections with a non-zero size.
    pub fn used_sections(&self) -> impl Iterator<Item = (usize, &FirmSection)> {
        self.sections.iter().enumerate().filter(|(_, s)| s.size != 0)
    }
}
const_assert_eq!(FirmHeader::SIZE, 4 * 4 + 0x30 + SECTION_COUNT * FirmSection::SIZE + 0x100);

/// Matches on the magic alone; section bounds are checked on open.
pub fn detect(info: &DetectInfo<'_>) -> Option<()> {
    let buf = info.start(FirmHeader::SIZE)?;
    buf.starts_with(MAGIC).then_some(())
}

/// A FIRM image.
pub struct Firm {
    core: RomDataCore,
    header: Option<FirmHeader>,
}

impl Firm {
    pub fn new(file: SourceRef) -> Self {
        let mut firm = Self {
            core: RomDataCore::new(file),
            header: None,
        };
        if let Err(e) = firm.init() {
            log::debug!("not a FIRM image: {e}");
            firm.core.invalidate();
        }
        firm
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?;
        let size = file.size();
        let data = file.read_vec_at(0, FirmHeader::SIZE)?;
        detect(&DetectInfo::new(&data, None, size)).ok_or(Error::InvalidFormat)?;
        let header = FirmHeader::parse(&data)?;

        if header.used_sections().next().is_none() {
            return Err(Error::Parse("FIRM image has no sections"));
        }
        for (i, s) in header.used_sections() {
            let end = s.offset as u64 + s.size as u64;
            if (s.offset as usize) < FirmHeader::SIZE || end > size {
                log::warn!("FIRM section {i} at {:#x}+{:#x} is out of range", s.offset, s.size);
                return Err(Error::InvalidRange);
            }
        }

        self.header = Some(header);
        self.core.set_valid();
        Ok(())
    }

    pub fn header(&self) -> Option<&FirmHeader> {
        self.header.as_ref()
    }
}

impl RomData for Firm {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        "Nintendo 3DS FIRM"
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        fields.set_tab_name("FIRM");
        fields.add_dec("Boot Priority", h.boot_priority as u64);
        fields.add_hex("ARM11 Entry Point", h.arm11_entry as u64, 8);
        fields.add_hex("ARM9 Entry Point", h.arm9_entry as u64, 8);
        let used = h.used_sections().fold(0u32, |m, (i, _)| m | (1 << i));
        fields.add_bitfield("Used Sections", &SECTION_NAMES, used);

        let rows = h
            .used_sections()
            .map(|(i, s)| {
                vec![
                    i.to_string(),
                    format!("{:#010X}", s.offset),
                    format!("{:#010X}", s.load_address),
                    format!("{:#X}", s.size),
                    s.copy_method_name().to_owned(),
                ]
            })
            .collect();
        fields.add_list(
            "Sections",
            &["#", "Offset", "Load Address", "Size", "Method"],
            rows,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn image(section_size: u32) -> Vec<u8> {
        let mut img = vec![0u8; 0x400];
        img[..4].copy_from_slice(MAGIC);
        img[8..12].copy_from_slice(&0x0800_0000u32.to_le_bytes());
        img[0x40..0x44].copy_from_slice(&0x200u32.to_le_bytes());
        img[0x44..0x48].copy_from_slice(&0x0800_0000u32.to_le_bytes());
        img[0x48..0x4C].copy_from_slice(&section_size.to_le_bytes());
        img[0x4C..0x50].copy_from_slice(&2u32.to_le_bytes());
        img
    }

    #[test]
    fn parses_sections() {
        let src = SourceRef::from_reader(Cursor::new(image(0x100))).unwrap();
        let mut firm = Firm::new(src);
        assert!(firm.is_valid());
        assert_eq!(firm.load_field_data().unwrap(), 5);
        let used = firm.fields().unwrap().get("Used Sections").unwrap();
        assert_eq!(used.display(), "0");
        let h = firm.header().unwrap();
        assert_eq!(h.arm11_entry, 0x0800_0000);
        assert_eq!(h.used_sections().count(), 1);
        assert_eq!(h.sections[0].copy_method_name(), "memcpy");
    }

    #[test]
    fn section_past_end_invalidates() {
        let src = SourceRef::from_reader(Cursor::new(image(0x1000))).unwrap();
        let mut firm = Firm::new(src.clone());
        assert!(!firm.is_valid());
        assert_eq!(src.ref_count(), 1);
        assert!(matches!(firm.load_field_data(), Err(Error::BadDescriptor)));
    }
}
