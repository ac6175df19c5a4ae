//! GameCube and Wii disc images (plain GCM/ISO or NASOS).
//!
//! ## Disc header (0x440 bytes, big-endian)
//! ```text
//! [0x000] GameID       (6, ASCII)
//! [0x006] DiscNumber   (u8)
//! [0x007] Revision     (u8)
//! [0x008] AudioStreaming (u8)
//! [0x009] StreamBufSize  (u8)
//! [0x00A] Reserved (14)
//! [0x018] WiiMagic     (u32) 0x5D1C9EA3
//! [0x01C] GcnMagic     (u32) 0xC2339F3D
//! [0x020] Title        (64)
//! [0x060] Reserved (0x3C0)
//! [0x420] DolOffset    (u32)
//! [0x424] FstOffset    (u32)
//! [0x428] FstSize      (u32)
//! [0x42C] FstMaxSize   (u32)
//! [0x430] Reserved (16)
//! ```
//!
//! The region lives outside the header: at 0x458 (`bi2.bin`) on GameCube
//! discs and at 0x4E000 on Wii discs.
//!
//! ## FST entry (12 bytes)
//! ```text
//! [0x0] Type         (u8) 0 = file, 1 = directory
//! [0x1] NameOffset   (u24, into the string table)
//! [0x4] FileOffset   (u32) / parent index for directories
//! [0x8] FileLength   (u32) / next sibling index for directories
//! ```
//! Entry 0 is the root directory; its length field is the entry count.
//! The string table follows the last entry.
//!
//! GameCube discs carry an `opening.bnr` banner (BNR1/BNR2) in the root
//! directory: a 96×32 RGB5A3 image followed by text blocks.

use std::io::Cursor;
use std::sync::Arc;

use static_assertions::const_assert_eq;

use super::{RomData, RomDataCore, publishers};
use crate::detect::DetectInfo;
use crate::disc::nasos::NasosKind;
use crate::disc::{DiscReader, NasosReader};
use crate::fields::RomFields;
use crate::gametdb::{self, ExtUrl, GameTdbSystem, ImageSizeRequest, ImageType};
use crate::image::{Image, decoder};
use crate::metadata::{MetaData, Property};
use crate::source::SourceRef;
use crate::text::{latin1, sanitize_id, shift_jis};
use crate::utils::{be_u32, be_u32_at, bytesa, u8};
use crate::{Error, Result};

pub const GCN_MAGIC: u32 = 0xC233_9F3D;
pub const WII_MAGIC: u32 = 0x5D1C_9EA3;

const GCN_REGION_OFFSET: u64 = 0x458;
const WII_REGION_OFFSET: u64 = 0x4E000;

const FST_ENTRY_SIZE: usize = 12;
const MAX_FST_SIZE: u64 = 16 << 20;
const BANNER_NAME: &str = "opening.bnr";

const BANNER_W: u32 = 96;
const BANNER_H: u32 = 32;
const BANNER_IMAGE_OFFSET: usize = 0x20;
const BANNER_IMAGE_SIZE: usize = (BANNER_W * BANNER_H * 2) as usize;
const BANNER_COMMENT_SIZE: usize = 0x140;
const BANNER1_SIZE: usize = BANNER_IMAGE_OFFSET + BANNER_IMAGE_SIZE + BANNER_COMMENT_SIZE;
const_assert_eq!(BANNER1_SIZE, 0x1960);

const GAMETDB: GameTdbSystem = GameTdbSystem {
    path: "wii",
    ext: "png",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscSystem {
    GameCube,
    Wii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Plain,
    Nasos,
}

/// Result of detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscType {
    pub system: DiscSystem,
    pub container: Container,
}

/// Decoded disc header.
#[derive(Debug, Clone)]
pub struct DiscHeader {
    pub id6: [u8; 6],
    pub disc_number: u8,
    pub revision: u8,
    pub audio_streaming: u8,
    pub stream_buf_size: u8,
    pub wii_magic: u32,
    pub gcn_magic: u32,
    pub title: [u8; 64],
    pub dol_offset: u32,
    pub fst_offset: u32,
    pub fst_size: u32,
}

impl DiscHeader {
    pub const SIZE: usize = 0x440;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        let id6 = bytesa::<6>(&mut r)?;
        let disc_number = u8(&mut r)?;
        let revision = u8(&mut r)?;
        let audio_streaming = u8(&mut r)?;
        let stream_buf_size = u8(&mut r)?;
        let _reserved = bytesa::<14>(&mut r)?;
        // 0x18: magics
        let wii_magic = be_u32(&mut r)?;
        let gcn_magic = be_u32(&mut r)?;
        // 0x20: Title
        let title = bytesa::<64>(&mut r)?;
        let _reserved = bytesa::<0x3C0>(&mut r)?;
        // 0x420: boot info
        let dol_offset = be_u32(&mut r)?;
        let fst_offset = be_u32(&mut r)?;
        let fst_size = be_u32(&mut r)?;
        let _fst_max_size = be_u32(&mut r)?;
        let _reserved = bytesa::<16>(&mut r)?;
        Ok(Self {
            id6,
            disc_number,
            revision,
            audio_streaming,
            stream_buf_size,
            wii_magic,
            gcn_magic,
            title,
            dol_offset,
            fst_offset,
            fst_size,
        })
    }

    pub fn system(&self) -> Option<DiscSystem> {
        if self.wii_magic == WII_MAGIC {
            Some(DiscSystem::Wii)
        } else if self.gcn_magic == GCN_MAGIC {
            Some(DiscSystem::GameCube)
        } else {
            None
        }
    }

    pub fn game_id(&self) -> String {
        sanitize_id(&self.id6, '_')
    }

    /// Japanese releases store text in Shift-JIS.
    fn is_japanese(&self) -> bool {
        self.id6[3] == b'J'
    }

    fn text(&self, buf: &[u8]) -> String {
        if self.is_japanese() {
            shift_jis(buf)
        } else {
            latin1(buf)
        }
    }
}
const_assert_eq!(DiscHeader::SIZE, 6 + 4 + 14 + 8 + 64 + 0x3C0 + 16 + 16);

/// `bi2.bin` / Wii region setting.
pub fn region_name(code: u32) -> &'static str {
    match code {
        0 => "Japan",
        1 => "USA",
        2 => "Europe",
        3 => "Region Free",
        4 => "South Korea",
        _ => "Unknown",
    }
}

pub fn detect(info: &DetectInfo<'_>) -> Option<DiscType> {
    let buf = info.start(0x20)?;
    if let Some(kind) = NasosKind::detect(buf) {
        let system = match kind {
            NasosKind::GameCube => DiscSystem::GameCube,
            NasosKind::WiiSingleLayer | NasosKind::WiiDualLayer => DiscSystem::Wii,
        };
        return Some(DiscType {
            system,
            container: Container::Nasos,
        });
    }
    let system = if be_u32_at(buf, 0x18) == Some(WII_MAGIC) {
        DiscSystem::Wii
    } else if be_u32_at(buf, 0x1C) == Some(GCN_MAGIC) {
        DiscSystem::GameCube
    } else {
        return None;
    };
    Some(DiscType {
        system,
        container: Container::Plain,
    })
}

/// One text block of a banner.
#[derive(Debug, Clone, Default)]
pub struct BannerComment {
    pub game_name: String,
    pub company: String,
    pub game_name_full: String,
    pub company_full: String,
    pub description: String,
}

/// Parsed `opening.bnr`.
#[derive(Debug, Clone)]
pub struct Banner {
    raw_image: Vec<u8>,
    /// One entry for BNR1, six (by language) for BNR2.
    pub comments: Vec<BannerComment>,
}

impl Banner {
    fn parse(data: &[u8], header: &DiscHeader) -> Result<Self> {
        let count = match data.get(..4) {
            Some(b"BNR1") => 1,
            Some(b"BNR2") => 6,
            _ => return Err(Error::BadMagic),
        };
        let start = BANNER_IMAGE_OFFSET + BANNER_IMAGE_SIZE;
        let end = start + count * BANNER_COMMENT_SIZE;
        if data.len() < end {
            return Err(Error::UnexpectedEof);
        }
        let comments = data[start..end]
            .chunks_exact(BANNER_COMMENT_SIZE)
            .map(|c| BannerComment {
                game_name: header.text(&c[..0x20]),
                company: header.text(&c[0x20..0x40]),
                game_name_full: header.text(&c[0x40..0x80]),
                company_full: header.text(&c[0x80..0xC0]),
                description: header.text(&c[0xC0..0x140]),
            })
            .collect();
        Ok(Self {
            raw_image: data[BANNER_IMAGE_OFFSET..start].to_vec(),
            comments,
        })
    }

    fn decode_image(&self) -> Result<Image> {
        decoder::from_tiled_rgb5a3(BANNER_W, BANNER_H, &self.raw_image)
    }
}

/// Find a root-level file in the FST. Returns `(offset, length)`.
fn fst_find_root_file(fst: &[u8], name: &str) -> Result<(u32, u32)> {
    let count = be_u32_at(fst, 8).ok_or(Error::UnexpectedEof)? as usize;
    let table_len = count
        .checked_mul(FST_ENTRY_SIZE)
        .filter(|&len| count > 0 && len <= fst.len())
        .ok_or(Error::Parse("FST entry count exceeds FST size"))?;
    let strings = &fst[table_len..];

    let mut i = 1;
    while i < count {
        let e = &fst[i * FST_ENTRY_SIZE..(i + 1) * FST_ENTRY_SIZE];
        let name_off = u32::from_be_bytes([0, e[1], e[2], e[3]]) as usize;
        let offset = u32::from_be_bytes([e[4], e[5], e[6], e[7]]);
        let length = u32::from_be_bytes([e[8], e[9], e[10], e[11]]);
        if e[0] != 0 {
            // Skip the whole subtree.
            let next = length as usize;
            i = if next > i { next } else { i + 1 };
            continue;
        }
        if let Some(s) = strings.get(name_off..) {
            let end = s.iter().position(|&b| b == 0).unwrap_or(s.len());
            if s[..end].eq_ignore_ascii_case(name.as_bytes()) {
                return Ok((offset, length));
            }
        }
        i += 1;
    }
    Err(Error::NotFound)
}

static GCN_IMAGE_TYPES: &[ImageType] = &[
    ImageType::IntBanner,
    ImageType::ExtCover,
    ImageType::ExtCover3D,
    ImageType::ExtCoverFull,
    ImageType::ExtMedia,
];
static WII_IMAGE_TYPES: &[ImageType] = &[
    ImageType::ExtCover,
    ImageType::ExtCover3D,
    ImageType::ExtCoverFull,
    ImageType::ExtMedia,
];

/// A GameCube or Wii disc.
pub struct GameCube {
    core: RomDataCore,
    disc_type: Option<DiscType>,
    header: Option<DiscHeader>,
    region: Option<u32>,
    /// `Some(None)` once a lookup found no usable banner.
    banner: Option<Option<Banner>>,
    banner_image: Option<Arc<Image>>,
}

impl GameCube {
    pub fn new(file: SourceRef) -> Self {
        let mut disc = Self {
            core: RomDataCore::new(file),
            disc_type: None,
            header: None,
            region: None,
            banner: None,
            banner_image: None,
        };
        if let Err(e) = disc.init() {
            log::debug!("not a GameCube/Wii disc: {e}");
            disc.core.invalidate();
        }
        disc
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?.clone();
        let size = file.size();
        let len = (0x20u64).min(size) as usize;
        let raw = file.read_vec_at(0, len)?;
        let disc_type = detect(&DetectInfo::new(&raw, None, size)).ok_or(Error::InvalidFormat)?;

        let disc = match disc_type.container {
            Container::Plain => SourceRef::new(DiscReader::new(file)),
            Container::Nasos => {
                let reader = NasosReader::new(file);
                if !reader.is_open() {
                    return Err(reader.last_error().map_or(Error::BadDescriptor, Error::duplicate));
                }
                SourceRef::new(reader)
            }
        };

        let header = DiscHeader::parse(&disc.read_vec_at(0, DiscHeader::SIZE)?)?;
        if header.system() != Some(disc_type.system) {
            log::warn!("disc magic does not match the {:?} container", disc_type.system);
            return Err(Error::BadMagic);
        }

        let region_offset = match disc_type.system {
            DiscSystem::GameCube => GCN_REGION_OFFSET,
            DiscSystem::Wii => WII_REGION_OFFSET,
        };
        let mut region = [0u8; 4];
        self.region = disc
            .read_exact_at(region_offset, &mut region)
            .ok()
            .map(|()| u32::from_be_bytes(region));

        self.header = Some(header);
        self.disc_type = Some(disc_type);
        self.core.set_disc(disc);
        self.core.set_valid();
        Ok(())
    }

    pub fn disc_type(&self) -> Option<DiscType> {
        self.disc_type
    }

    pub fn header(&self) -> Option<&DiscHeader> {
        self.header.as_ref()
    }

    fn read_banner(&self) -> Result<Banner> {
        let header = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        if self.disc_type.map(|t| t.system) != Some(DiscSystem::GameCube) {
            return Err(Error::NotFound);
        }
        let disc = self.core.disc().ok_or(Error::BadDescriptor)?;
        let disc_size = disc.size();

        let fst_offset = header.fst_offset as u64;
        let fst_size = header.fst_size as u64;
        if fst_size == 0 {
            return Err(Error::NotFound);
        }
        if fst_size > MAX_FST_SIZE {
            return Err(Error::TooLarge {
                size: fst_size,
                limit: MAX_FST_SIZE,
            });
        }
        if fst_offset + fst_size > disc_size {
            return Err(Error::InvalidRange);
        }
        let fst = disc.read_vec_at(fst_offset, fst_size as usize)?;
        let (offset, length) = fst_find_root_file(&fst, BANNER_NAME)?;

        let length = length as usize;
        if length < BANNER1_SIZE || offset as u64 + length as u64 > disc_size {
            return Err(Error::InvalidRange);
        }
        let read_len = length.min(BANNER1_SIZE + 5 * BANNER_COMMENT_SIZE);
        Banner::parse(&disc.read_vec_at(offset as u64, read_len)?, header)
    }

    /// Load `opening.bnr` once; later calls return the cached result.
    fn banner(&mut self) -> Option<&Banner> {
        if self.banner.is_none() {
            let loaded = match self.read_banner() {
                Ok(b) => Some(b),
                Err(e) => {
                    log::debug!("no usable {BANNER_NAME}: {e}");
                    None
                }
            };
            self.banner = Some(loaded);
        }
        self.banner.as_ref().and_then(Option::as_ref)
    }
}

impl RomData for GameCube {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        match self.disc_type.map(|t| t.system) {
            Some(DiscSystem::Wii) => "Nintendo Wii",
            _ => "Nintendo GameCube",
        }
    }

    fn supported_image_types(&self) -> &'static [ImageType] {
        match self.disc_type.map(|t| t.system) {
            Some(DiscSystem::GameCube) => GCN_IMAGE_TYPES,
            Some(DiscSystem::Wii) => WII_IMAGE_TYPES,
            None => &[],
        }
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        fields.set_tab_name(self.system_name().trim_start_matches("Nintendo "));
        fields.add_string("Title", h.text(&h.title));
        fields.add_string("Game ID", h.game_id());
        fields.add_string("Publisher", publishers::name_or_code(&latin1(&h.id6[4..])));
        fields.add_dec("Disc #", h.disc_number as u64 + 1);
        fields.add_dec("Revision", h.revision as u64);
        if let Some(region) = self.region {
            fields.add_string("Region", region_name(region));
        }
        if self.disc_type.map(|t| t.container) == Some(Container::Nasos) {
            fields.add_string("Container", "NASOS");
        }

        if let Some(b) = self.banner()
            && let Some(c) = b.comments.first()
        {
            let name = if c.game_name_full.is_empty() {
                &c.game_name
            } else {
                &c.game_name_full
            };
            let company = if c.company_full.is_empty() {
                &c.company
            } else {
                &c.company_full
            };
            fields.add_string("Game Name", name.as_str());
            fields.add_string("Company", company.as_str());
            fields.add_string("Description", c.description.as_str());
        }
        Ok(())
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        meta.add_string(Property::Title, h.text(&h.title));
        meta.add_string(Property::GameId, h.game_id());
        if let Some(p) = publishers::lookup(&latin1(&h.id6[4..])) {
            meta.add_string(Property::Publisher, p);
        }
        if let Some(region) = self.region {
            meta.add_string(Property::Region, region_name(region));
        }
        if let Some(c) = self.banner().and_then(|b| b.comments.first()) {
            meta.add_string(Property::Description, c.description.as_str());
        }
        Ok(())
    }

    fn load_internal_image(&mut self, ty: ImageType) -> Result<Arc<Image>> {
        self.core.check()?;
        if ty != ImageType::IntBanner {
            return Err(Error::NotFound);
        }
        if let Some(img) = &self.banner_image {
            return Ok(Arc::clone(img));
        }
        let img = Arc::new(self.banner().ok_or(Error::NotFound)?.decode_image()?);
        self.banner_image = Some(Arc::clone(&img));
        Ok(img)
    }

    fn ext_urls(&self, ty: ImageType, request: ImageSizeRequest) -> Result<Vec<ExtUrl>> {
        self.core.check()?;
        if ty.is_internal() || !self.supported_image_types().contains(&ty) {
            return Err(Error::NotFound);
        }
        let h = self.header.as_ref().ok_or(Error::InvalidFormat)?;
        gametdb::ext_urls(
            GAMETDB,
            ty,
            gametdb::regions_for_id(h.id6[3]),
            &h.id6,
            request,
        )
    }
}
