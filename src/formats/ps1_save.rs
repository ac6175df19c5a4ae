//! PlayStation memory card saves.
//!
//! Every save starts with an "SC" block describing the title and icon. It
//! may be wrapped in one of three container headers, which decides where
//! the SC block sits.
//!
//! ## SC header (0x200 bytes)
//! ```text
//! [0x000] Magic "SC"
//! [0x002] IconFlag    (u8) 0x00 = no icon, 0x11/0x16 = 1 frame,
//!                          0x12/0x17 = 2 frames, 0x13/0x18 = 3 frames
//! [0x003] BlockCount  (u8) 1-15
//! [0x004] Title       (64, Shift-JIS)
//! [0x044] Reserved (28)
//! [0x060] Palette     (16 × u16 LE BGR555)
//! [0x080] Icon frames (3 × 128, 16×16 4-bpp)
//! ```
//!
//! ## Containers
//! | Kind  | Header | SC at | Identified by |
//! |-------|--------|-------|---------------|
//! | PSV   | 0x84   | 0x84  | `"\0VSP\0\0\0\0"` magic |
//! | Block | 0x80   | 0x80  | 0x51 marker + XOR checksum at 0x7F |
//! | 54    | 0x36   | 0x36  | `(size - 54) % 8192 == 0` |
//! | RAW   | none   | 0x00  | `size % 8192 == 0` |
//!
//! ## PSV header (0x84 bytes)
//! ```text
//! [0x00] Magic "\0VSP\0\0\0\0"
//! [0x08] KeySeed (20)
//! [0x1C] HMAC-SHA1 (20)
//! [0x30] Reserved (0x34)
//! [0x64] Filename (20)
//! [0x78] Reserved (12)
//! ```
//!
//! ## Block header (0x80 bytes)
//! ```text
//! [0x00] Marker 0x51 (first block in use)
//! [0x01] Reserved (3)
//! [0x04] SaveSize  (u32 LE)
//! [0x08] NextBlock (u16 LE)
//! [0x0A] Filename (21)
//! [0x1F] Reserved (96)
//! [0x7F] Checksum: XOR of bytes 0x00-0x7E
//! ```
//!
//! ## 54-byte header
//! ```text
//! [0x00] Filename (21)
//! [0x15] Description (33)
//! ```

use std::io::Cursor;
use std::sync::Arc;

use static_assertions::const_assert_eq;

use super::{RomData, RomDataCore};
use crate::detect::DetectInfo;
use crate::fields::RomFields;
use crate::gametdb::ImageType;
use crate::image::anim::{AnimDelay, IconAnimData};
use crate::image::{Image, decoder};
use crate::metadata::{MetaData, Property};
use crate::source::SourceRef;
use crate::text::{latin1, shift_jis};
use crate::utils::{bytesa, has_at, le_u16, magic, u8, xor8};
use crate::{Error, Result};

/// Memory card block size; raw saves are whole blocks.
pub const BLOCK_SIZE: u64 = 8192;

pub const PSV_MAGIC: &[u8; 8] = b"\0VSP\0\0\0\0";
const BLOCK_MARKER: u8 = 0x51;

const ICON_W: u32 = 16;
const ICON_H: u32 = 16;
const ICON_FRAME_SIZE: usize = 128;

/// Save container kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ps1SaveKind {
    Psv,
    Block,
    Header54,
    Raw,
}

impl Ps1SaveKind {
    /// Offset of the SC header.
    pub fn sc_offset(self) -> usize {
        match self {
            Self::Psv => PsvHeader::SIZE,
            Self::Block => BlockHeader::SIZE,
            Self::Header54 => Header54::SIZE,
            Self::Raw => 0,
        }
    }
}

/// SC header.
#[derive(Debug, Clone)]
pub struct ScHeader {
    pub icon_flag: u8,
    pub block_count: u8,
    pub title: String,
    pub palette: [u16; 16],
    pub frames: [[u8; ICON_FRAME_SIZE]; 3],
}

impl ScHeader {
    pub const SIZE: usize = 0x200;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        magic(&mut r, b"SC")?;
        let icon_flag = u8(&mut r)?;
        let block_count = u8(&mut r)?;
        let title = shift_jis(&bytesa::<64>(&mut r)?);
        let _reserved = bytesa::<28>(&mut r)?;
        let mut palette = [0u16; 16];
        for c in &mut palette {
            *c = le_u16(&mut r)?;
        }
        let frames = [
            bytesa::<ICON_FRAME_SIZE>(&mut r)?,
            bytesa::<ICON_FRAME_SIZE>(&mut r)?,
            bytesa::<ICON_FRAME_SIZE>(&mut r)?,
        ];
        Ok(Self {
            icon_flag,
            block_count,
            title,
            palette,
            frames,
        })
    }

    /// Number of icon frames, from the icon flag. Unknown flags inside a
    /// signed container get a single frame.
    pub fn frame_count(&self) -> usize {
        icon_frames(self.icon_flag).unwrap_or(1)
    }

    pub fn has_icon(&self) -> bool {
        self.frame_count() > 0
    }
}
const_assert_eq!(ScHeader::SIZE, 2 + 1 + 1 + 64 + 28 + 16 * 2 + 3 * ICON_FRAME_SIZE);

fn icon_frames(flag: u8) -> Option<usize> {
    match flag {
        0x00 => Some(0),
        0x11 | 0x16 => Some(1),
        0x12 | 0x17 => Some(2),
        0x13 | 0x18 => Some(3),
        _ => None,
    }
}

/// Delay between frames for an animated icon.
fn icon_delay(frames: usize) -> Option<AnimDelay> {
    match frames {
        2 => Some(AnimDelay::pal_frames(16)),
        3 => Some(AnimDelay::pal_frames(11)),
        _ => None,
    }
}

/// Cheap SC validity check used by detection. `known_flag` also requires
/// a recognised icon flag, for containers with no signature of their own.
fn sc_valid(buf: &[u8], offset: usize, known_flag: bool) -> bool {
    has_at(buf, offset, b"SC")
        && buf.len() >= offset + 4
        && (!known_flag || icon_frames(buf[offset + 2]).is_some())
        && (1..=15).contains(&buf[offset + 3])
}

pub struct PsvHeader;
impl PsvHeader {
    pub const SIZE: usize = 0x84;
    const FILENAME: usize = 0x64;
}
const_assert_eq!(PsvHeader::SIZE, 8 + 20 + 20 + 0x34 + 20 + 12);

pub struct BlockHeader;
impl BlockHeader {
    pub const SIZE: usize = 0x80;
    const FILENAME: usize = 0x0A;
}
const_assert_eq!(BlockHeader::SIZE, 1 + 3 + 4 + 2 + 21 + 96 + 1);

pub struct Header54;
impl Header54 {
    pub const SIZE: usize = 54;
}
const_assert_eq!(Header54::SIZE, 21 + 33);

/// Classify a save. Strongest container signatures are tried first.
pub fn detect(info: &DetectInfo<'_>) -> Option<Ps1SaveKind> {
    let buf = info.start(ScHeader::SIZE)?;

    // PSV: the HMAC needs console keys, so the magic and the SC block
    // (magic and block count) are what gets validated.
    if buf.starts_with(PSV_MAGIC) && sc_valid(buf, PsvHeader::SIZE, false) {
        return Some(Ps1SaveKind::Psv);
    }

    if buf[0] == BLOCK_MARKER {
        let header = buf.get(..BlockHeader::SIZE)?;
        if xor8(&header[..BlockHeader::SIZE - 1]) != header[BlockHeader::SIZE - 1] {
            log::debug!("PS1 block header checksum mismatch");
            return None;
        }
        return sc_valid(buf, BlockHeader::SIZE, false).then_some(Ps1SaveKind::Block);
    }

    let size = info.file_size;
    if size > Header54::SIZE as u64
        && (size - Header54::SIZE as u64) % BLOCK_SIZE == 0
        && sc_valid(buf, Header54::SIZE, true)
    {
        return Some(Ps1SaveKind::Header54);
    }

    (size > 0 && size % BLOCK_SIZE == 0 && sc_valid(buf, 0, true)).then_some(Ps1SaveKind::Raw)
}

/// A PlayStation save file.
pub struct Ps1Save {
    core: RomDataCore,
    kind: Option<Ps1SaveKind>,
    filename: String,
    sc: Option<ScHeader>,
    icon: Option<Arc<IconAnimData>>,
}

impl Ps1Save {
    pub fn new(file: SourceRef) -> Self {
        let mut save = Self {
            core: RomDataCore::new(file),
            kind: None,
            filename: String::new(),
            sc: None,
            icon: None,
        };
        if let Err(e) = save.init() {
            log::debug!("not a PS1 save: {e}");
            save.core.invalidate();
        }
        save
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?;
        let size = file.size();
        let len = (PsvHeader::SIZE + ScHeader::SIZE).min(size as usize);
        let header = file.read_vec_at(0, len)?;

        let kind = detect(&DetectInfo::new(&header, None, size)).ok_or(Error::InvalidFormat)?;
        let sc_at = kind.sc_offset();
        let sc = ScHeader::parse(header.get(sc_at..).ok_or(Error::UnexpectedEof)?)?;

        self.filename = match kind {
            Ps1SaveKind::Psv => latin1(&header[PsvHeader::FILENAME..PsvHeader::FILENAME + 20]),
            Ps1SaveKind::Block => {
                latin1(&header[BlockHeader::FILENAME..BlockHeader::FILENAME + 21])
            }
            Ps1SaveKind::Header54 => latin1(&header[..21]),
            Ps1SaveKind::Raw => String::new(),
        };
        self.kind = Some(kind);
        self.sc = Some(sc);
        self.core.set_valid();
        Ok(())
    }

    pub fn kind(&self) -> Option<Ps1SaveKind> {
        self.kind
    }

    pub fn sc_header(&self) -> Option<&ScHeader> {
        self.sc.as_ref()
    }

    /// Decode every icon frame once.
    fn load_icon(&mut self) -> Result<Arc<IconAnimData>> {
        if let Some(icon) = &self.icon {
            return Ok(Arc::clone(icon));
        }
        self.core.check()?;
        let sc = self.sc.as_ref().ok_or(Error::InvalidFormat)?;
        if !sc.has_icon() {
            return Err(Error::NotFound);
        }

        let count = sc.frame_count();
        let frames = sc.frames[..count]
            .iter()
            .map(|raw| {
                decoder::from_linear_ci4_bgr555(ICON_W, ICON_H, raw, &sc.palette).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;
        let delays = icon_delay(count).map_or_else(Vec::new, |d| vec![d; count]);
        let icon = Arc::new(IconAnimData {
            frames,
            seq_index: (0..count as u8).collect(),
            delays,
        });
        self.icon = Some(Arc::clone(&icon));
        Ok(icon)
    }
}

impl RomData for Ps1Save {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        "Sony PlayStation"
    }

    fn supported_image_types(&self) -> &'static [ImageType] {
        match &self.sc {
            Some(sc) if !sc.has_icon() => &[],
            _ => &[ImageType::IntIcon],
        }
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let sc = self.sc.as_ref().ok_or(Error::InvalidFormat)?;
        fields.set_tab_name("PS1 Save");
        fields.add_string("Filename", self.filename.as_str());
        fields.add_string("Description", sc.title.as_str());
        Ok(())
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        let sc = self.sc.as_ref().ok_or(Error::InvalidFormat)?;
        meta.add_string(Property::Title, sc.title.as_str());
        Ok(())
    }

    fn load_internal_image(&mut self, ty: ImageType) -> Result<Arc<Image>> {
        if ty != ImageType::IntIcon {
            self.core.check()?;
            return Err(Error::NotFound);
        }
        let icon = self.load_icon()?;
        icon.frames.first().cloned().ok_or(Error::NotFound)
    }

    fn icon_anim_data(&mut self) -> Option<Arc<IconAnimData>> {
        let icon = self.load_icon().ok()?;
        (icon.frame_count() > 1).then_some(icon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sc(flag: u8) -> Vec<u8> {
        let mut sc = vec![0u8; ScHeader::SIZE];
        sc[..2].copy_from_slice(b"SC");
        sc[2] = flag;
        sc[3] = 1;
        sc[4..8].copy_from_slice(b"TEST");
        sc
    }

    fn block(flag: u8) -> Vec<u8> {
        let mut buf = vec![0u8; BlockHeader::SIZE];
        buf[0] = BLOCK_MARKER;
        buf[0x0A..0x0A + 5].copy_from_slice(b"BASLU");
        buf[0x7F] = xor8(&buf[..0x7F]);
        buf.extend(sc(flag));
        buf
    }

    #[test]
    fn block_checksum_gates_detection() {
        let good = block(0x11);
        let info = DetectInfo::new(&good, None, 8192 + 0x80);
        assert_eq!(detect(&info), Some(Ps1SaveKind::Block));

        let mut bad = good.clone();
        bad[0x7F] ^= 0x01;
        let info = DetectInfo::new(&bad, None, 8192 + 0x80);
        assert_eq!(detect(&info), None);
    }

    #[test]
    fn raw_needs_whole_blocks() {
        let buf = sc(0x11);
        assert_eq!(
            detect(&DetectInfo::new(&buf, None, 8192)),
            Some(Ps1SaveKind::Raw)
        );
        assert_eq!(detect(&DetectInfo::new(&buf, None, 8000)), None);
    }

    #[test]
    fn header54_by_size() {
        let mut buf = vec![0u8; Header54::SIZE];
        buf[..4].copy_from_slice(b"BESC");
        buf.extend(sc(0x12));
        assert_eq!(
            detect(&DetectInfo::new(&buf, None, 54 + 8192)),
            Some(Ps1SaveKind::Header54)
        );
    }

    #[test]
    fn unknown_icon_flag_needs_a_container() {
        let buf = sc(0x14);
        assert_eq!(detect(&DetectInfo::new(&buf, None, 8192)), None);

        let buf = block(0x14);
        assert_eq!(
            detect(&DetectInfo::new(&buf, None, 8192 + 0x80)),
            Some(Ps1SaveKind::Block)
        );
    }

    #[test]
    fn icon_flag_frame_counts() {
        let counts: Vec<_> = [0x00, 0x11, 0x12, 0x13, 0x16, 0x17, 0x18, 0x14]
            .into_iter()
            .map(icon_frames)
            .collect();
        assert_eq!(
            counts,
            [Some(0), Some(1), Some(2), Some(3), Some(1), Some(2), Some(3), None]
        );
    }

    #[test]
    fn icon_delays() {
        assert_eq!(icon_delay(3).unwrap().ms, 220);
        assert_eq!(icon_delay(2).unwrap().numerator, 16);
        assert!(icon_delay(1).is_none());
    }
}
