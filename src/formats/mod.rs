//! Format parsers and the detection registry.
//!
//! Every parser follows the same lifecycle:
//!
//! * **Construct** - `Parser::new(file)` takes a reference to the source,
//!   reads its header and runs the format's detector on it. Anything that
//!   fails here (no match, short read, bad secondary magic, a disc reader
//!   that will not open) leaves the object permanently invalid and releases
//!   the source.
//! * **Load** - [`RomData::load_field_data`] and [`RomData::load_metadata`]
//!   build their lists once and cache them. Later calls return the cached
//!   count and do no I/O.
//! * **Images** - [`RomData::load_internal_image`] decodes on first use and
//!   returns the cached image afterwards.
//!
//! Failures are plain [`Error`] values whose [`Error::code`] is stable:
//! a released source is `BadDescriptor`, a never-valid object is
//! `InvalidFormat`, and a missing optional resource is `NotFound`.
//!
//! ## Format overview
//!
//! | Module | Format | Detected from |
//! |--------|--------|---------------|
//! | [`firm`]     | Nintendo 3DS FIRM firmware | `"FIRM"` magic |
//! | [`gba`]      | Game Boy Advance ROM | fixed byte + complement check |
//! | [`wiiu`]     | Wii U disc (WUD, WUX) | product code + secondary magic |
//! | [`gamecube`] | GameCube / Wii disc (GCM, NASOS) | disc magic |
//! | [`ps1_save`] | PlayStation memory card save | container header / SC block |
//! | [`ps1_disc`] | PlayStation 1/2 disc | PVD system ID + `SYSTEM.CNF` |
//! | [`iso`]      | ISO-9660 image (plain, raw, ZISO) | PVD |
//!
//! [`open`] tries them in the order above, most specific first.

pub mod firm;
pub mod gamecube;
pub mod gba;
pub mod iso;
pub mod ps1_disc;
pub mod ps1_save;
pub mod publishers;
pub mod wiiu;

use std::sync::Arc;

use crate::detect::{DetectInfo, HEADER_SIZE, find_iso_pvd};
use crate::fields::RomFields;
use crate::gametdb::{ExtUrl, ImageSizeRequest, ImageType};
use crate::image::Image;
use crate::image::anim::IconAnimData;
use crate::metadata::MetaData;
use crate::source::SourceRef;
use crate::{Error, Result};

/// State shared by every parser.
#[derive(Debug, Default)]
pub struct RomDataCore {
    file: Option<SourceRef>,
    /// Reader stack built on top of `file` (disc reader, ...), if any.
    disc: Option<SourceRef>,
    valid: bool,
    fields: Option<RomFields>,
    metadata: Option<MetaData>,
}

impl RomDataCore {
    pub(crate) fn new(file: SourceRef) -> Self {
        Self {
            file: Some(file),
            ..Self::default()
        }
    }

    pub fn file(&self) -> Option<&SourceRef> {
        self.file.as_ref()
    }

    pub fn disc(&self) -> Option<&SourceRef> {
        self.disc.as_ref()
    }

    pub(crate) fn set_disc(&mut self, disc: SourceRef) {
        self.disc = Some(disc);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self) {
        self.valid = true;
    }

    /// Mark the object permanently invalid and release every source.
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
        self.disc = None;
        self.file = None;
    }

    /// Release sources without touching cached data.
    pub(crate) fn close(&mut self) {
        self.disc = None;
        self.file = None;
    }

    /// Source open, then object valid.
    pub(crate) fn check(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::BadDescriptor);
        }
        if !self.valid {
            return Err(Error::InvalidFormat);
        }
        Ok(())
    }
}

/// Capabilities every parsed object exposes.
pub trait RomData {
    fn core(&self) -> &RomDataCore;
    fn core_mut(&mut self) -> &mut RomDataCore;

    /// Human-readable system name.
    fn system_name(&self) -> &'static str;

    /// Image types this object can provide.
    fn supported_image_types(&self) -> &'static [ImageType] {
        &[]
    }

    /// Append this format's fields. Called at most once per object.
    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()>;

    /// Append this format's metadata properties. Called at most once.
    fn build_metadata(&mut self, _meta: &mut MetaData) -> Result<()> {
        Ok(())
    }

    /// Decode (or return the cached) internal image.
    fn load_internal_image(&mut self, _ty: ImageType) -> Result<Arc<Image>> {
        self.core().check()?;
        Err(Error::NotFound)
    }

    /// Frames and timing of an animated icon, if the icon is animated.
    fn icon_anim_data(&mut self) -> Option<Arc<IconAnimData>> {
        None
    }

    /// Candidate download URLs for an external image type.
    fn ext_urls(&self, _ty: ImageType, _request: ImageSizeRequest) -> Result<Vec<ExtUrl>> {
        self.core().check()?;
        Err(Error::NotFound)
    }

    fn is_valid(&self) -> bool {
        self.core().is_valid()
    }

    fn is_open(&self) -> bool {
        self.core().file().is_some()
    }

    /// Build the field list on first call; return the field count.
    fn load_field_data(&mut self) -> Result<usize> {
        if let Some(fields) = &self.core().fields {
            return Ok(fields.len());
        }
        self.core().check()?;
        let mut fields = RomFields::new();
        self.build_fields(&mut fields)?;
        let count = fields.len();
        self.core_mut().fields = Some(fields);
        Ok(count)
    }

    fn fields(&self) -> Option<&RomFields> {
        self.core().fields.as_ref()
    }

    /// Build the metadata list on first call; return the property count.
    fn load_metadata(&mut self) -> Result<usize> {
        if let Some(meta) = &self.core().metadata {
            return Ok(meta.len());
        }
        self.core().check()?;
        let mut meta = MetaData::new();
        self.build_metadata(&mut meta)?;
        let count = meta.len();
        self.core_mut().metadata = Some(meta);
        Ok(count)
    }

    fn metadata(&self) -> Option<&MetaData> {
        self.core().metadata.as_ref()
    }

    /// Release the source. Cached data stays readable.
    fn close(&mut self) {
        self.core_mut().close();
    }

    /// Whether any internal or external image is available.
    fn has_thumbnail(&self) -> bool {
        !self.supported_image_types().is_empty()
    }
}

/// A parsed object of any supported format.
pub enum RomObject {
    Firm(firm::Firm),
    Gba(gba::Gba),
    WiiU(wiiu::WiiU),
    GameCube(gamecube::GameCube),
    Ps1Save(ps1_save::Ps1Save),
    Ps1Disc(ps1_disc::Ps1Disc),
    Iso(iso::Iso),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            RomObject::Firm($r) => $body,
            RomObject::Gba($r) => $body,
            RomObject::WiiU($r) => $body,
            RomObject::GameCube($r) => $body,
            RomObject::Ps1Save($r) => $body,
            RomObject::Ps1Disc($r) => $body,
            RomObject::Iso($r) => $body,
        }
    };
}

impl RomObject {
    /// Short name of the parser that produced this object.
    pub fn format_name(&self) -> &'static str {
        match self {
            RomObject::Firm(_) => "FIRM",
            RomObject::Gba(_) => "GBA",
            RomObject::WiiU(_) => "Wii U",
            RomObject::GameCube(_) => "GameCube",
            RomObject::Ps1Save(_) => "PS1 Save",
            RomObject::Ps1Disc(_) => "PlayStation Disc",
            RomObject::Iso(_) => "ISO",
        }
    }
}

impl RomData for RomObject {
    fn core(&self) -> &RomDataCore {
        dispatch!(self, r => r.core())
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        dispatch!(self, r => r.core_mut())
    }

    fn system_name(&self) -> &'static str {
        dispatch!(self, r => r.system_name())
    }

    fn supported_image_types(&self) -> &'static [ImageType] {
        dispatch!(self, r => r.supported_image_types())
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        dispatch!(self, r => r.build_fields(fields))
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        dispatch!(self, r => r.build_metadata(meta))
    }

    fn load_internal_image(&mut self, ty: ImageType) -> Result<Arc<Image>> {
        dispatch!(self, r => r.load_internal_image(ty))
    }

    fn icon_anim_data(&mut self) -> Option<Arc<IconAnimData>> {
        dispatch!(self, r => r.icon_anim_data())
    }

    fn ext_urls(&self, ty: ImageType, request: ImageSizeRequest) -> Result<Vec<ExtUrl>> {
        dispatch!(self, r => r.ext_urls(ty, request))
    }

    fn close(&mut self) {
        dispatch!(self, r => r.close())
    }
}

impl std::fmt::Debug for RomObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RomObject")
            .field("format", &self.format_name())
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// Factory options.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Only return objects that can provide some image.
    pub require_thumbnail: bool,
    /// Allow detectors that rely on file size or extension alone.
    pub allow_extension_only: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            require_thumbnail: false,
            allow_extension_only: true,
        }
    }
}

/// Which bytes a registry entry looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// The first [`HEADER_SIZE`] bytes.
    Header,
    /// A located ISO-9660 primary volume descriptor.
    IsoPvd,
}

struct Entry {
    name: &'static str,
    probe: Probe,
    /// Size- or extension-gated match.
    weak: bool,
    detect: fn(&DetectInfo<'_>) -> bool,
    open: fn(SourceRef) -> RomObject,
}

fn detect_ps1_save_strong(info: &DetectInfo<'_>) -> bool {
    ps1_save::detect(info).is_some_and(|k| k != ps1_save::Ps1SaveKind::Raw)
}

fn detect_ps1_save_raw(info: &DetectInfo<'_>) -> bool {
    ps1_save::detect(info) == Some(ps1_save::Ps1SaveKind::Raw)
}

#[cfg(feature = "compression")]
fn detect_ziso(info: &DetectInfo<'_>) -> bool {
    info.start(4).is_some_and(crate::disc::ziso::is_ziso)
}

/// Registry, most specific first.
const REGISTRY: &[Entry] = &[
    Entry {
        name: "FIRM",
        probe: Probe::Header,
        weak: false,
        detect: |i| firm::detect(i).is_some(),
        open: |f| RomObject::Firm(firm::Firm::new(f)),
    },
    Entry {
        name: "GBA",
        probe: Probe::Header,
        weak: false,
        detect: |i| gba::detect(i).is_some(),
        open: |f| RomObject::Gba(gba::Gba::new(f)),
    },
    Entry {
        name: "Wii U",
        probe: Probe::Header,
        weak: false,
        detect: |i| wiiu::detect(i).is_some(),
        open: |f| RomObject::WiiU(wiiu::WiiU::new(f)),
    },
    Entry {
        name: "GameCube",
        probe: Probe::Header,
        weak: false,
        detect: |i| gamecube::detect(i).is_some(),
        open: |f| RomObject::GameCube(gamecube::GameCube::new(f)),
    },
    Entry {
        name: "PS1 Save",
        probe: Probe::Header,
        weak: false,
        detect: detect_ps1_save_strong,
        open: |f| RomObject::Ps1Save(ps1_save::Ps1Save::new(f)),
    },
    #[cfg(feature = "compression")]
    Entry {
        name: "ZISO",
        probe: Probe::Header,
        weak: false,
        detect: detect_ziso,
        open: |f| RomObject::Iso(iso::Iso::new(f)),
    },
    Entry {
        name: "PlayStation Disc",
        probe: Probe::IsoPvd,
        weak: false,
        detect: |i| ps1_disc::detect(i).is_some(),
        open: |f| RomObject::Ps1Disc(ps1_disc::Ps1Disc::new(f)),
    },
    Entry {
        name: "ISO",
        probe: Probe::IsoPvd,
        weak: false,
        detect: |i| iso::detect(i).is_some(),
        open: |f| RomObject::Iso(iso::Iso::new(f)),
    },
    Entry {
        name: "PS1 Save (raw)",
        probe: Probe::Header,
        weak: true,
        detect: detect_ps1_save_raw,
        open: |f| RomObject::Ps1Save(ps1_save::Ps1Save::new(f)),
    },
];

/// Detect the format of `source` and open it.
///
/// `ext` is the file extension, with or without the dot. Returns `None`
/// when no parser accepts the source. A detector hit whose parser then
/// fails deeper validation moves on to the next entry.
pub fn open(source: SourceRef, ext: Option<&str>, opts: &OpenOptions) -> Option<RomObject> {
    if !source.is_open() {
        return None;
    }
    let file_size = source.size();
    let len = (HEADER_SIZE as u64).min(file_size) as usize;
    let header = match source.read_vec_at(0, len) {
        Ok(h) => h,
        Err(e) => {
            log::debug!("header read failed: {e}");
            return None;
        }
    };
    let ext = ext.map(|e| e.trim_start_matches('.').to_ascii_lowercase());
    let ext = ext.as_deref();
    let info = DetectInfo::new(&header, ext, file_size);
    let mut pvd = None;

    for entry in REGISTRY {
        if entry.weak && !opts.allow_extension_only {
            continue;
        }
        let hit = match entry.probe {
            Probe::Header => (entry.detect)(&info),
            Probe::IsoPvd => pvd
                .get_or_insert_with(|| find_iso_pvd(&source))
                .as_ref()
                .is_some_and(|p| (entry.detect)(&p.info(ext, file_size))),
        };
        if !hit {
            continue;
        }

        let obj = (entry.open)(source.clone());
        if !obj.is_valid() {
            log::debug!("{} detector matched but the parser rejected the file", entry.name);
            continue;
        }
        if opts.require_thumbnail && !obj.has_thumbnail() {
            log::debug!("{} has no thumbnail", entry.name);
            return None;
        }
        log::debug!("opened as {}", entry.name);
        return Some(obj);
    }
    None
}
