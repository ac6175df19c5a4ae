//! Game Boy Advance cartridge ROMs.
//!
//! ## Header (0xC0 bytes at offset 0)
//! ```text
//! [0x00] EntryPoint   (u32 LE, ARM branch instruction)
//! [0x04] Nintendo logo (156)
//! [0xA0] Title        (12, ASCII)
//! [0xAC] GameCode     (4)
//! [0xB0] MakerCode    (2)
//! [0xB2] FixedValue   (u8) = 0x96
//! [0xB3] UnitCode     (u8)
//! [0xB4] DeviceType   (u8)
//! [0xB5] Reserved (7)
//! [0xBC] Version      (u8)
//! [0xBD] Complement   (u8): -(sum of 0xA0..=0xBC) - 0x19
//! [0xBE] Reserved (2)
//! ```

use std::io::Cursor;

use static_assertions::const_assert_eq;

use super::{RomData, RomDataCore, publishers};
use crate::detect::DetectInfo;
use crate::fields::RomFields;
use crate::metadata::{MetaData, Property};
use crate::source::SourceRef;
use crate::text::{latin1, sanitize_id};
use crate::utils::{bytesa, has_at, le_u32, u8};
use crate::{Error, Result};

const FIXED_VALUE: u8 = 0x96;
const LOGO_OFFSET: usize = 0x04;
/// First bytes of the compressed Nintendo logo bitmap.
pub const LOGO_HEAD: [u8; 8] = [0x24, 0xFF, 0xAE, 0x51, 0x69, 0x9A, 0xA2, 0x21];

/// Decoded cartridge header.
#[derive(Debug, Clone)]
pub struct GbaHeader {
    pub entry_point: u32,
    pub title: [u8; 12],
    pub game_code: [u8; 4],
    pub maker_code: [u8; 2],
    pub unit_code: u8,
    pub device_type: u8,
    pub version: u8,
    pub complement: u8,
}

impl GbaHeader {
    pub const SIZE: usize = 0xC0;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        // 0x00: EntryPoint
        let entry_point = le_u32(&mut r)?;
        // 0x04: Nintendo logo
        let _logo = bytesa::<156>(&mut r)?;
        // 0xA0: Title
        let title = bytesa::<12>(&mut r)?;
        // 0xAC: GameCode, 0xB0: MakerCode
        let game_code = bytesa::<4>(&mut r)?;
        let maker_code = bytesa::<2>(&mut r)?;
        // 0xB2: FixedValue
        if u8(&mut r)? != FIXED_VALUE {
            return Err(Error::BadMagic);
        }
        let unit_code = u8(&mut r)?;
        let device_type = u8(&mut r)?;
        let _reserved = bytesa::<7>(&mut r)?;
        // 0xBC: Version, 0xBD: Complement
        let version = u8(&mut r)?;
        let complement = u8(&mut r)?;
        Ok(Self {
            entry_point,
            title,
            game_code,
            maker_code,
            unit_code,
            device_type,
            version,
            complement,
        })
    }

    /// Six-character game ID (game code + maker code).
    pub fn game_id(&self) -> String {
        let mut id = [0u8; 6];
        id[..4].copy_from_slice(&self.game_code);
        id[4..].copy_from_slice(&self.maker_code);
        sanitize_id(&id, '_')
    }
}
const_assert_eq!(GbaHeader::SIZE, 4 + 156 + 12 + 4 + 2 + 1 + 1 + 1 + 7 + 1 + 1 + 2);

/// Header complement check over bytes 0xA0..=0xBC.
pub fn complement(header: &[u8]) -> Option<u8> {
    let sum = header
        .get(0xA0..=0xBC)?
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_sub(b));
    Some(sum.wrapping_sub(0x19))
}

/// Matches on the logo head and fixed byte, then the complement.
pub fn detect(info: &DetectInfo<'_>) -> Option<()> {
    let buf = info.start(GbaHeader::SIZE)?;
    if !has_at(buf, LOGO_OFFSET, &LOGO_HEAD) || buf[0xB2] != FIXED_VALUE {
        return None;
    }
    if complement(buf)? != buf[0xBD] {
        log::debug!("GBA header complement mismatch");
        return None;
    }
    Some(())
}

/// A Game Boy Advance ROM.
pub struct Gba {
    core: RomDataCore,
    header: Option<GbaHeader>,
}

impl Gba {
    pub fn new(file: SourceRef) -> Self {
        let mut rom = Self {
            core: RomDataCore::new(file),
            header: None,
        };
        if let Err(e) = rom.init() {
            log::debug!("not a GBA ROM: {e}");
            rom.core.invalidate();
        }
        rom
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?;
        let size = file.size();
        let header = file.read_vec_at(0, GbaHeader::SIZE)?;
        detect(&DetectInfo::new(&header, None, size)).ok_or(Error::ChecksumMismatch)?;
        self.header = Some(GbaHeader::parse(&header)?);
        self.core.set_valid();
        Ok(())
    }

    pub fn header(&self) -> Option<&GbaHeader> {
        self.header.as_ref()
    }
}

impl RomData for Gba {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        "Nintendo Game Boy Advance"
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        fields.set_tab_name("GBA");
        fields.add_string("Title", latin1(&h.title));
        fields.add_string("Game ID", h.game_id());
        fields.add_string("Publisher", publishers::name_or_code(&latin1(&h.maker_code)));
        fields.add_dec("Revision", h.version as u64);
        fields.add_hex("Entry Point", h.entry_point as u64, 8);
        Ok(())
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        meta.add_string(Property::Title, latin1(&h.title));
        meta.add_string(Property::GameId, h.game_id());
        if let Some(p) = publishers::lookup(&latin1(&h.maker_code)) {
            meta.add_string(Property::Publisher, p);
        }
        Ok(())
    }
}
