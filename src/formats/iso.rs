//! Generic ISO-9660 images.
//!
//! Anything with a primary volume descriptor that no console-specific
//! parser claimed. The volume may be stored as cooked 2048-byte sectors,
//! raw 2352-byte sectors or, with the `compression` feature, as ZISO.

use super::{RomData, RomDataCore};
use crate::detect::{DetectInfo, SectorLayout, find_iso_pvd, is_pvd};
use crate::disc::{Cdrom2352Reader, DiscReader};
use crate::fields::RomFields;
use crate::metadata::{MetaData, Property};
use crate::partition::{IsoPartition, Pvd};
use crate::source::SourceRef;
use crate::{Error, Result};

#[cfg(feature = "compression")]
use crate::disc::{ZisoReader, ziso};

const COOKED_PVD_ADDR: u64 = 0x8000;
const RAW_MODE1_PVD_ADDR: u64 = 0x9310;
const RAW_MODE2_PVD_ADDR: u64 = 0x9318;

/// How the volume is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoContainer {
    Cooked2048,
    Raw2352,
    #[cfg(feature = "compression")]
    Ziso,
}

impl IsoContainer {
    pub fn name(self) -> &'static str {
        match self {
            IsoContainer::Cooked2048 => "ISO (2048-byte sectors)",
            IsoContainer::Raw2352 => "BIN (2352-byte sectors)",
            #[cfg(feature = "compression")]
            IsoContainer::Ziso => "ZISO",
        }
    }
}

/// Matches a version-1 PVD at one of the expected addresses.
pub fn detect(info: &DetectInfo<'_>) -> Option<SectorLayout> {
    let layout = match info.header.addr {
        COOKED_PVD_ADDR => SectorLayout::Cooked2048,
        RAW_MODE1_PVD_ADDR | RAW_MODE2_PVD_ADDR => SectorLayout::Raw2352,
        _ => return None,
    };
    is_pvd(info.header.data).then_some(layout)
}

/// An ISO-9660 volume.
pub struct Iso {
    core: RomDataCore,
    container: Option<IsoContainer>,
    partition: Option<IsoPartition>,
}

impl Iso {
    pub fn new(file: SourceRef) -> Self {
        let mut iso = Self {
            core: RomDataCore::new(file),
            container: None,
            partition: None,
        };
        if let Err(e) = iso.init() {
            log::debug!("not an ISO-9660 image: {e}");
            iso.core.invalidate();
        }
        iso
    }

    fn init(&mut self) -> Result<()> {
        let file = self.core.file().ok_or(Error::BadDescriptor)?.clone();
        let (container, disc) = Self::open_disc(file)?;

        let part = IsoPartition::new(disc.clone(), 0, Some(0));
        if !part.is_valid() {
            return Err(part.last_error().map_or(Error::InvalidFormat, Error::duplicate));
        }

        self.container = Some(container);
        self.partition = Some(part);
        self.core.set_disc(disc);
        self.core.set_valid();
        Ok(())
    }

    fn open_disc(file: SourceRef) -> Result<(IsoContainer, SourceRef)> {
        #[cfg(feature = "compression")]
        {
            let mut magic = [0u8; 4];
            if file.read_exact_at(0, &mut magic).is_ok() && ziso::is_ziso(&magic) {
                let reader = ZisoReader::new(file);
                if !reader.is_open() {
                    return Err(reader.last_error().map_or(Error::BadDescriptor, Error::duplicate));
                }
                return Ok((IsoContainer::Ziso, SourceRef::new(reader)));
            }
        }

        let size = file.size();
        let probe = find_iso_pvd(&file).ok_or(Error::InvalidFormat)?;
        match detect(&probe.info(None, size)).ok_or(Error::InvalidFormat)? {
            SectorLayout::Cooked2048 => Ok((
                IsoContainer::Cooked2048,
                SourceRef::new(DiscReader::new(file)),
            )),
            SectorLayout::Raw2352 => {
                let reader = Cdrom2352Reader::new(file);
                if !reader.is_open() {
                    return Err(reader.last_error().map_or(Error::BadDescriptor, Error::duplicate));
                }
                Ok((IsoContainer::Raw2352, SourceRef::new(reader)))
            }
        }
    }

    pub fn container(&self) -> Option<IsoContainer> {
        self.container
    }

    pub fn pvd(&self) -> Option<&Pvd> {
        self.partition.as_ref().and_then(IsoPartition::pvd)
    }

    /// The volume, for root-directory lookups.
    pub fn partition_mut(&mut self) -> Option<&mut IsoPartition> {
        self.partition.as_mut()
    }
}

impl RomData for Iso {
    fn core(&self) -> &RomDataCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RomDataCore {
        &mut self.core
    }

    fn system_name(&self) -> &'static str {
        "ISO-9660"
    }

    fn build_fields(&mut self, fields: &mut RomFields) -> Result<()> {
        let container = self.container.ok_or(Error::InvalidFormat)?;
        let part = self.partition.as_mut().ok_or(Error::InvalidFormat)?;
        let rows: Vec<Vec<String>> = match part.load_root_directory() {
            Ok(entries) => entries
                .iter()
                .map(|e| {
                    let size = if e.is_dir() {
                        "<DIR>".to_owned()
                    } else {
                        e.size.to_string()
                    };
                    vec![e.name.clone(), size]
                })
                .collect(),
            Err(e) => {
                log::warn!("ISO root directory unreadable: {e}");
                Vec::new()
            }
        };
        let pvd = part.pvd().ok_or(Error::InvalidFormat)?;

        fields.set_tab_name("ISO-9660");
        fields.add_string("Container", container.name());
        fields.add_string("System ID", pvd.system_id.as_str());
        fields.add_string("Volume ID", pvd.volume_id.as_str());
        fields.add_string("Volume Set ID", pvd.volume_set_id.as_str());
        fields.add_string("Publisher", pvd.publisher.as_str());
        fields.add_string("Data Preparer", pvd.data_preparer.as_str());
        fields.add_string("Application", pvd.application.as_str());
        fields.add_string("Copyright File", pvd.copyright_file.as_str());
        fields.add_string("Abstract File", pvd.abstract_file.as_str());
        fields.add_string("Bibliographic File", pvd.bibliographic_file.as_str());
        fields.add_dec(
            "Volume Size",
            pvd.volume_space_size as u64 * pvd.block_size as u64,
        );
        fields.add_datetime("Creation Date", pvd.btime);
        fields.add_datetime("Modification Date", pvd.mtime);
        fields.add_datetime("Expiration Date", pvd.exptime);
        fields.add_datetime("Effective Date", pvd.efftime);
        if !rows.is_empty() {
            fields.add_list("Files", &["Name", "Size"], rows);
        }
        Ok(())
    }

    fn build_metadata(&mut self, meta: &mut MetaData) -> Result<()> {
        let pvd = self.pvd().ok_or(Error::InvalidFormat)?;
        meta.add_string(Property::Title, pvd.volume_id.as_str());
        meta.add_string(Property::Publisher, pvd.publisher.as_str());
        meta.add_timestamp(Property::CreationDate, pvd.btime);
        Ok(())
    }

    fn close(&mut self) {
        self.partition = None;
        self.core.close();
    }
}
