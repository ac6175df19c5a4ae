//! PlayStation 1 and 2 disc images.
//!
//! Recognised by the ISO-9660 system identifier `PLAYSTATION`, in either a
//! cooked 2048-byte image or a raw 2352-byte `.bin`. The boot executable
//! and console generation come from `SYSTEM.CNF`:
//!
//! ```text
//! BOOT = cdrom:\SLUS_005.94;1        PS1
//! BOOT2 = cdrom0:\SLUS_209.46;1      PS2
//! VER = 1.00
//! VMODE = NTSC
//! ```
//!
//! Early PS1 discs have no `SYSTEM.CNF` and boot `PSX.EXE`.

use super::{RomData, RomDataCore};
use crate::detect::{DetectInfo, SectorLayout, find_iso_pvd};
use crate::disc::{Cdrom2352Reader, DiscReader};
use crate::fields::RomFields;
use crate::metadata::{MetaData, Property};
use crate::partition::{IsoPartition, Pvd};
use crate::source::{ByteSource, SourceRef};
use crate::{Error, Result};

const SYSTEM_ID: &str = "PLAYSTATION";
/// `SYSTEM.CNF` is a handful of short lines.
const MAX_SYSTEM_CNF: u64 = 4096;

/// PVD payload addresses for the supported layouts.
const COOKED_PVD_ADDR: u64 = 0x8000;
const RAW_MODE1_PVD_ADDR: u64 = 0x9310;
const RAW_MODE2_PVD_ADDR: u64 = 0x9318;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Ps1,
    Ps2,
}

impl Console {
    pub fn name(self) -> &'static str {
        match self {
            Console::Ps1 => "PlayStation",
            Console::Ps2 => "PlayStation 2",
        }
    }
}

/// Matches a PVD whose system ID is `PLAYSTATION`.
pub fn detect(info: &DetectInfo<'_>) -> Option<SectorLayout> {
    let layout = match info.header.addr {
        COOKED_PVD_ADDR => SectorLayout::Cooked2048,
        RAW_MODE1_PVD_ADDR | RAW_MODE2_PVD_ADDR => SectorLayout::Raw2352,
        _ => return None,
    };
    let pvd = info.header.data;
    if pvd.len() < 40 || &pvd[1..6] != b"CD001" {
        return None;
    }
    let system_id = pvd[8..40].trim_ascii_end();
    (system_id == SYSTEM_ID.as_bytes()).then_some(layout)
}

/// Parsed `SYSTEM.CNF`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemCnf {
    pub boot: Option<String>,
    pub boot2: Option<String>,
    pub version: Option<String>,
    pub video_mode: Option<String>,
}

impl SystemCnf {
    /// Parse `KEY = VALUE` lines. Unknown keys are ignored.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut cnf = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_end_matches('\0').to_owned();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_uppercase().as_str() {
                "BOOT" => cnf.boot = Some(value),
                "BOOT2" => cnf.boot2 = Some(value),
                "VER" => cnf.version = Some(value),
                "VMODE" => cnf.video_mode = Some(value),
                _ => {}
            }
        }
        cnf
    }

    /// PS2 discs name their executable with `BOOT2`.
    pub fn console(&self) -> Option<Console> {
        if self.boot2.is_some() {
            Some(Console::Ps2)
        } else if self.boot.is_some() {
            Some(Console::Ps1)
        } else {
            None
        }
    }

    pub fn boot_path(&self) -> Option<&str> {
        self.boot2.as_deref().or(self.boot.as_deref())
    }
}

/// File name part of a boot path, without device, directories, arguments
/// or version suffix: `cdrom:\SLUS_005.94;1 arg` → `SLUS_005.94`.
pub fn boot_filename(path: &str) -> &str {
    let path = path.split_whitespace().next().unwrap_or_default();
    let name = path.rsplit(['\\', '/', ':']).next().unwrap_or(path);
    name.split(';').next().unwrap_or(name)
}

/// Product serial from a boot file name: `SLUS_005.94` → `SLUS-00594`.
pub fn serial_from_filename(name: &str) -> Option<String> {
    let b = name.as_bytes();
    if b.len() != 11
        || !b[..4].iter().all(u8::is_ascii_alphabetic)
        || !(b[4] == b'_' || b[4] == b'-')
        || !b[5..8].iter().all(u8::is_ascii_digit)
        || b[8] != b'.'
        || !b[9..].iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    Some(format!(
        "{}-{}{}",
        name[..4].to_ascii_uppercase(),
        &name[5..8],
        &name[9..]
    ))
}

/// A PlayStation disc.
pub struct Ps1Disc {
    core: RomDataCore,
    layout: Option<SectorLayout>,
    pvd: Option<Pvd>,
    console: Option<Console>,
    cnf: Option<SystemCnf>,
    boot_file: Option<String>,
}

impl Ps1Disc {
    pub fn new(file: SourceRef) -> Self {
        let mut disc = Self {
            core: RomDataCore::new(file),
            layout: None,
            pvd: None,
            console: None,
            cnf: None,
            boot_file: None,
        };
        if let Err(e) = disc.init() {
            log::debug!("not a PlayStation disc: {e}");
            disc.core.invalidate();
        }
        disc
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?.clone();
        let size = file.size();
        let probe = find_iso_pvd(&file).ok_or(Error::InvalidFormat)?;
        let layout = detect(&probe.info(None, size)).ok_or(Error::InvalidFormat)?;

        let disc = match layout {
            SectorLayout::Cooked2048 => SourceRef::new(DiscReader::new(file)),
            SectorLayout::Raw2352 => {
                let reader = Cdrom2352Reader::new(file);
                if !reader.is_open() {
                    return Err(reader.last_error().map_or(Error::BadDescriptor, Error::duplicate));
                }
                SourceRef::new(reader)
            }
        };

        let mut part = IsoPartition::new(disc.clone(), 0, Some(0));
        if !part.is_valid() {
            return Err(part.last_error().map_or(Error::InvalidFormat, Error::duplicate));
        }

        match part.open("SYSTEM.CNF") {
            Ok(f) => {
                if f.size() > MAX_SYSTEM_CNF {
                    return Err(Error::TooLarge {
                        size: f.size(),
                        limit: MAX_SYSTEM_CNF,
                    });
                }
                let cnf = SystemCnf::parse(&f.read_all()?);
                let console = cnf.console().ok_or(Error::Parse("SYSTEM.CNF has no BOOT line"))?;
                self.boot_file = cnf.boot_path().map(|p| boot_filename(p).to_owned());
                self.console = Some(console);
                self.cnf = Some(cnf);
            }
            Err(Error::NotFound) => {
                part.open("PSX.EXE")?;
                log::debug!("no SYSTEM.CNF, booting PSX.EXE");
                self.boot_file = Some("PSX.EXE".to_owned());
                self.console = Some(Console::Ps1);
            }
            Err(e) => return Err(e),
        }

        self.pvd = part.pvd().cloned();
        self.layout = Some(layout);
        self.core.set_disc(disc);
        self.core.set_valid();
        Ok(())
    }

    pub fn console(&self) -> Option<Console> {
        self.console
    }

    pub fn layout(&self) -> Option<SectorLayout> {
        self.layout
    }

    pub fn system_cnf(&self) -> Option<&SystemCnf> {
        self.cnf.as_ref()
    }

    /// Product serial derived from the boot file name.
    pub fn serial(&self) -> Option<String> {
        self.boot_file.as_deref().and_then(serial_from_filename)
    }
}

impl RomData for Ps1Disc {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        self.console.unwrap_or(Console::Ps1).name()
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let pvd = self.pvd.as_ref().ok_or(Error::InvalidFormat)?;
        fields.set_tab_name(self.system_name());
        fields.add_string("Console", self.system_name());
        fields.add_string("Volume ID", pvd.volume_id.as_str());
        if let Some(serial) = self.serial() {
            fields.add_string("Game ID", serial);
        }
        if let Some(boot) = &self.boot_file {
            fields.add_string("Boot Filename", boot.as_str());
        }
        if let Some(cnf) = &self.cnf {
            if let Some(ver) = &cnf.version {
                fields.add_string("Version", ver.as_str());
            }
            if let Some(vmode) = &cnf.video_mode {
                fields.add_string("Video Mode", vmode.as_str());
            }
        }
        fields.add_datetime("Creation Date", pvd.btime);
        Ok(())
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        let pvd = self.pvd.as_ref().ok_or(Error::InvalidFormat)?;
        meta.add_string(Property::Title, pvd.volume_id.as_str());
        if let Some(serial) = self.serial() {
            meta.add_string(Property::GameId, serial);
        }
        meta.add_string(Property::Publisher, pvd.publisher.as_str());
        meta.add_timestamp(Property::CreationDate, pvd.btime);
        Ok(())
    }
}
