//! Wii U disc images (WUD, WUX).
//!
//! ## Disc header (offset 0 of the logical disc)
//! ```text
//! [0x00] ProductCode  "WUP-P-" + 4-char ID
//! [0x0A] '-'
//! [0x0B] Version      (2, ASCII digits)
//! [0x0D] '-'
//! [0x0E] OsVersion    (3, ASCII digits)
//! [0x11] Region       (3, ASCII)
//! [0x14] '-'
//! [0x15] DiscNumber   (1, ASCII digit)
//! ```
//!
//! The header alone is a weak signature, so a second magic is required at
//! 0x10000 and the GameCube/Wii disc magics at 0x18/0x1C must be absent.
//! WUX images are detected by their container magic and the disc header is
//! checked through the WUX reader.

use std::io::Cursor;

use static_assertions::const_assert_eq;

use super::{RomData, RomDataCore};
use crate::detect::DetectInfo;
use crate::disc::{DiscReader, WuxReader, wux};
use crate::fields::RomFields;
use crate::gametdb::{self, ExtUrl, GameTdbSystem, ImageSizeRequest, ImageType};
use crate::metadata::{MetaData, Property};
use crate::source::SourceRef;
use crate::text::latin1;
use crate::utils::{be_u32_at, bytesa, u8};
use crate::{Error, Result};

const PRODUCT_PREFIX: &[u8; 6] = b"WUP-P-";
/// Big-endian magic at [`SECONDARY_MAGIC_OFFSET`].
pub const SECONDARY_MAGIC: u32 = 0xCC54_9EB9;
pub const SECONDARY_MAGIC_OFFSET: u64 = 0x10000;

const GCN_MAGIC: u32 = 0xC233_9F3D;
const WII_MAGIC: u32 = 0x5D1C_9EA3;

const GAMETDB: GameTdbSystem = GameTdbSystem {
    path: "wiiu",
    ext: "jpg",
};

/// Container holding the disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiiUKind {
    /// Plain sector-for-sector dump.
    Wud,
    /// Deduplicated WUX image.
    Wux,
}

/// Decoded disc header.
#[derive(Debug, Clone)]
pub struct WiiUHeader {
    /// `WUP-P-xxxx`.
    pub product_code: [u8; 10],
    pub version: [u8; 2],
    pub os_version: [u8; 3],
    pub region: [u8; 3],
    pub disc_number: u8,
}

impl WiiUHeader {
    pub const SIZE: usize = 0x16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        let product_code = bytesa::<10>(&mut r)?;
        let _hyphen = u8(&mut r)?;
        let version = bytesa::<2>(&mut r)?;
        let _hyphen = u8(&mut r)?;
        let os_version = bytesa::<3>(&mut r)?;
        let region = bytesa::<3>(&mut r)?;
        let _hyphen = u8(&mut r)?;
        let disc_number = u8(&mut r)?;
        Ok(Self {
            product_code,
            version,
            os_version,
            region,
            disc_number,
        })
    }

    /// Four-character game ID.
    pub fn id4(&self) -> &[u8] {
        &self.product_code[6..10]
    }

    /// `"5.5.0"` style system version.
    pub fn os_version_string(&self) -> String {
        let [a, b, c] = self.os_version;
        format!("{}.{}.{}", a as char, b as char, c as char)
    }
}
const_assert_eq!(WiiUHeader::SIZE, 10 + 1 + 2 + 1 + 3 + 3 + 1 + 1);

/// Product-code layout plus the GameCube/Wii exclusion.
fn is_wud_header(buf: &[u8]) -> bool {
    if buf.len() < 0x20 || !buf.starts_with(PRODUCT_PREFIX) {
        return false;
    }
    if buf[0x0A] != b'-' || buf[0x0D] != b'-' || buf[0x14] != b'-' {
        return false;
    }
    if !buf[6..10].iter().all(u8::is_ascii_alphanumeric) {
        return false;
    }
    if be_u32_at(buf, 0x18) == Some(WII_MAGIC) || be_u32_at(buf, 0x1C) == Some(GCN_MAGIC) {
        log::debug!("Wii U product code on a GameCube/Wii disc header");
        return false;
    }
    true
}

pub fn detect(info: &DetectInfo<'_>) -> Option<WiiUKind> {
    let buf = info.start(wux::HEADER_SIZE)?;
    if wux::is_wux(buf) {
        return Some(WiiUKind::Wux);
    }
    if info.file_size < SECONDARY_MAGIC_OFFSET + 4 {
        return None;
    }
    is_wud_header(buf).then_some(WiiUKind::Wud)
}

/// A Wii U disc.
pub struct WiiU {
    core: RomDataCore,
    kind: Option<WiiUKind>,
    header: Option<WiiUHeader>,
}

impl WiiU {
    pub fn new(file: SourceRef) -> Self {
        let mut disc = Self {
            core: RomDataCore::new(file),
            kind: None,
            header: None,
        };
        if let Err(e) = disc.init() {
            log::debug!("not a Wii U disc: {e}");
            disc.core.invalidate();
        }
        disc
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?.clone();
        let size = file.size();
        let len = (wux::HEADER_SIZE as u64).min(size) as usize;
        let raw = file.read_vec_at(0, len)?;
        let kind = detect(&DetectInfo::new(&raw, None, size)).ok_or(Error::InvalidFormat)?;

        let disc = match kind {
            WiiUKind::Wud => SourceRef::new(DiscReader::new(file)),
            WiiUKind::Wux => {
                let reader = WuxReader::new(file);
                if !reader.is_open() {
                    return Err(reader.last_error().map_or(Error::BadDescriptor, Error::duplicate));
                }
                SourceRef::new(reader)
            }
        };

        let header = disc.read_vec_at(0, 0x20)?;
        if !is_wud_header(&header) {
            return Err(Error::BadMagic);
        }
        let mut magic = [0u8; 4];
        disc.read_exact_at(SECONDARY_MAGIC_OFFSET, &mut magic)?;
        if u32::from_be_bytes(magic) != SECONDARY_MAGIC {
            log::warn!("Wii U secondary magic missing");
            return Err(Error::BadMagic);
        }

        self.header = Some(WiiUHeader::parse(&header)?);
        self.kind = Some(kind);
        self.core.set_disc(disc);
        self.core.set_valid();
        Ok(())
    }

    pub fn kind(&self) -> Option<WiiUKind> {
        self.kind
    }

    pub fn header(&self) -> Option<&WiiUHeader> {
        self.header.as_ref()
    }
}

impl RomData for WiiU {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        "Nintendo Wii U"
    }

    fn supported_image_types(&self) -> &'static [ImageType] {
        &[ImageType::ExtCover, ImageType::ExtCover3D, ImageType::ExtCoverFull]
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        fields.set_tab_name("Wii U");
        fields.add_string("Game ID", latin1(h.id4()));
        fields.add_string("Version", latin1(&h.version));
        fields.add_string("OS Version", h.os_version_string());
        fields.add_string("Region", latin1(&h.region));
        fields.add_string("Disc Number", (h.disc_number as char).to_string());
        if self.kind == Some(WiiUKind::Wux) {
            fields.add_string("Container", "WUX");
        }
        Ok(())
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        meta.add_string(Property::GameId, latin1(h.id4()));
        meta.add_string(Property::Region, latin1(&h.region));
        Ok(())
    }

    fn ext_urls(&self, ty: ImageType, request: ImageSizeRequest) -> Result<Vec<ExtUrl>> {
        self.core.check()?;
        if !self.supported_image_types().contains(&ty) {
            return Err(Error::NotFound);
        }
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        let id = h.id4();
        gametdb::ext_urls(GAMETDB, ty, gametdb::regions_for_id(id[3]), id, request)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn header() -> Vec<u8> {
        let mut h = vec![0u8; 0x20];
        h[..0x16].copy_from_slice(b"WUP-P-ARPE-00-550USA-1");
        h
    }

    fn wud() -> Vec<u8> {
        let mut img = vec![0u8; 0x10010];
        img[..0x20].copy_from_slice(&header());
        img[0x10000..0x10004].copy_from_slice(&SECONDARY_MAGIC.to_be_bytes());
        img
    }

    #[test]
    fn wud_fields() {
        let src = SourceRef::from_reader(Cursor::new(wud())).unwrap();
        let mut disc = WiiU::new(src);
        assert!(disc.is_valid());
        assert_eq!(disc.kind(), Some(WiiUKind::Wud));
        assert_eq!(disc.load_field_data().unwrap(), 5);
        let f = disc.fields().unwrap();
        assert_eq!(f.get_str("Game ID"), Some("ARPE"));
        assert_eq!(f.get_str("OS Version"), Some("5.5.0"));
        assert_eq!(f.get_str("Region"), Some("USA"));
    }

    #[test]
    fn gamecube_magic_excludes() {
        let mut img = wud();
        img[0x1C..0x20].copy_from_slice(&GCN_MAGIC.to_be_bytes());
        assert!(detect(&DetectInfo::new(&img[..0x20], None, img.len() as u64)).is_none());
    }

    #[test]
    fn missing_secondary_magic_invalidates() {
        let mut img = wud();
        img[0x10000] = 0;
        let info_ok = detect(&DetectInfo::new(&img[..0x20], None, img.len() as u64));
        assert_eq!(info_ok, Some(WiiUKind::Wud));

        let src = SourceRef::from_reader(Cursor::new(img)).unwrap();
        let mut disc = WiiU::new(src.clone());
        assert!(!disc.is_valid());
        assert_eq!(src.ref_count(), 1);
        assert_eq!(disc.load_field_data().unwrap_err().code(), crate::error::code::EBADF);
    }

    #[test]
    fn wux_container() {
        const SECTOR: usize = 0x8000;
        let mut img = vec![0u8; SECTOR];
        img[..4].copy_from_slice(wux::MAGIC0);
        img[4..8].copy_from_slice(&wux::MAGIC1.to_le_bytes());
        img[8..12].copy_from_slice(&(SECTOR as u32).to_le_bytes());
        img[0x10..0x18].copy_from_slice(&(3 * SECTOR as u64).to_le_bytes());
        for (i, idx) in [0u32, 1, 2].iter().enumerate() {
            img[0x20 + i * 4..0x24 + i * 4].copy_from_slice(&idx.to_le_bytes());
        }
        let disc = wud();
        let mut sectors = vec![0u8; 3 * SECTOR];
        sectors[..disc.len()].copy_from_slice(&disc);
        img.extend_from_slice(&sectors);

        let src = SourceRef::from_reader(Cursor::new(img)).unwrap();
        let mut disc = WiiU::new(src);
        assert!(disc.is_valid());
        assert_eq!(disc.kind(), Some(WiiUKind::Wux));
        assert_eq!(disc.load_field_data().unwrap(), 6);

        let urls = disc.ext_urls(ImageType::ExtCover, ImageSizeRequest::Default).unwrap();
        assert_eq!(urls[0].cache_key, "wiiu/cover/US/ARPE.jpg");
        assert!(matches!(
            disc.ext_urls(ImageType::ExtMedia, ImageSizeRequest::Default),
            Err(Error::NotFound)
        ));
    }
}
