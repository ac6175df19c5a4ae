mod common;

use std::io::Cursor;

use common::{memory, psv_save};
use romkit::formats::gba::LOGO_HEAD;
use romkit::formats::{self, OpenOptions, RomData, RomObject};
use romkit::source::{IoSource, SourceRef};

fn gba_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x400];
    rom[..4].copy_from_slice(&0xEA00_002Eu32.to_le_bytes());
    rom[4..12].copy_from_slice(&LOGO_HEAD);
    rom[0xA0..0xAB].copy_from_slice(b"POKEMON EME");
    rom[0xAC..0xB0].copy_from_slice(b"BPEE");
    rom[0xB0..0xB2].copy_from_slice(b"01");
    rom[0xB2] = 0x96;
    let sum = rom[0xA0..=0xBC].iter().fold(0u8, |a, &b| a.wrapping_add(b));
    rom[0xBD] = 0u8.wrapping_sub(sum).wrapping_sub(0x19);
    rom
}

#[test]
fn gba_rom_is_detected() {
    let mut rom =
        formats::open(memory(gba_rom()), Some("gba"), &OpenOptions::default()).unwrap();
    assert!(matches!(rom, RomObject::Gba(_)));
    assert_eq!(rom.system_name(), "Nintendo Game Boy Advance");
    assert_eq!(rom.load_field_data().unwrap(), 5);
    assert_eq!(rom.fields().unwrap().get_str("Publisher"), Some("Nintendo"));
}

#[test]
fn missing_logo_is_not_a_gba_rom() {
    let mut data = gba_rom();
    data[4..12].fill(0);
    assert!(formats::open(memory(data), Some("gba"), &OpenOptions::default()).is_none());
}

#[test]
fn bad_complement_is_not_a_gba_rom() {
    let mut data = gba_rom();
    data[0xBD] ^= 0xFF;
    assert!(formats::open(memory(data), Some("gba"), &OpenOptions::default()).is_none());
}

#[test]
fn require_thumbnail_filters_results() {
    let opts = OpenOptions {
        require_thumbnail: true,
        ..OpenOptions::default()
    };
    assert!(formats::open(memory(gba_rom()), None, &opts).is_none());

    let rom = formats::open(memory(psv_save(0x11, "BASLUS-00001", b"ICON")), None, &opts).unwrap();
    assert!(matches!(rom, RomObject::Ps1Save(_)));
    assert!(rom.has_thumbnail());
}

#[test]
fn unknown_data_is_not_matched() {
    let opts = OpenOptions::default();
    assert!(formats::open(memory(Vec::new()), None, &opts).is_none());
    assert!(formats::open(memory(vec![0x5A; 0x10000]), Some("bin"), &opts).is_none());
}

#[test]
fn closed_source_is_not_probed() {
    let mut src = IoSource::new(Cursor::new(gba_rom())).unwrap();
    src.close();
    assert!(formats::open(SourceRef::new(src), None, &OpenOptions::default()).is_none());
}

#[test]
fn rejected_parser_releases_its_reference() {
    let mut data = vec![0u8; 0x400];
    data[..4].copy_from_slice(b"FIRM");
    // Section 0 claims to run past the end of the file.
    let s0 = 0x40;
    data[s0..s0 + 4].copy_from_slice(&0x200u32.to_le_bytes());
    data[s0 + 8..s0 + 12].copy_from_slice(&0x1000u32.to_le_bytes());

    let src = memory(data);
    assert!(formats::open(src.clone(), Some("firm"), &OpenOptions::default()).is_none());
    assert_eq!(src.ref_count(), 1);
}

#[test]
fn opened_object_shares_the_source() {
    let src = memory(gba_rom());
    let mut rom = formats::open(src.clone(), None, &OpenOptions::default()).unwrap();
    assert_eq!(src.ref_count(), 2);
    rom.close();
    assert_eq!(src.ref_count(), 1);
    assert!(!rom.is_open());
    drop(rom);
    assert_eq!(src.ref_count(), 1);
}
