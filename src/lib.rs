//! **romkit** - detection and metadata extraction for ROM images, disc
//! images and save files.
//!
//! Give [`formats::open`] a [`source::SourceRef`] and it sniffs the header,
//! picks a parser and returns a [`formats::RomObject`] exposing fields,
//! metadata, embedded images and external cover-art URLs.
//!
//! ```no_run
//! use romkit::formats::{self, OpenOptions, RomData};
//! use romkit::source::SourceRef;
//!
//! # fn main() -> romkit::Result<()> {
//! let src = SourceRef::open("game.iso")?;
//! if let Some(mut rom) = formats::open(src, Some("iso"), &OpenOptions::default()) {
//!     rom.load_field_data()?;
//!     for field in rom.fields().into_iter().flat_map(|f| f.iter()) {
//!         println!("{}: {}", field.name, field.value.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::firm`]     | FIRM - Nintendo 3DS firmware image |
//! | [`formats::gba`]      | GBA - Game Boy Advance cartridge ROM |
//! | [`formats::wiiu`]     | WUD / WUX - Wii U disc image |
//! | [`formats::gamecube`] | GCM / NASOS - GameCube and Wii disc image |
//! | [`formats::ps1_save`] | PSV / MCS / raw - PlayStation memory card save |
//! | [`formats::ps1_disc`] | ISO / BIN - PlayStation 1 and 2 disc |
//! | [`formats::iso`]      | ISO / BIN / ZISO - ISO-9660 volume |
//!
//! # Disc containers
//! | Module | Container |
//! |--------|-----------|
//! | [`disc::plain`]     | Unmodified image or byte window |
//! | [`disc::cdrom2352`] | Raw 2352-byte CD sectors |
//! | [`disc::nasos`]     | NASOS sparse GameCube/Wii image |
//! | [`disc::wux`]       | WUX deduplicated Wii U image |
//! | `disc::ziso`        | ZISO LZ4-compressed image (`compression` feature) |

pub mod compression;
pub mod detect;
pub mod disc;
pub mod error;
pub mod fields;
pub mod formats;
pub mod gametdb;
pub mod image;
pub mod metadata;
pub mod partition;
pub mod source;
pub mod text;
pub(crate) mod utils;

pub use error::{Error, Result};
