mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{counting, memory, psv_save, raw_save};
use romkit::error::code;
use romkit::formats::ps1_save::{Ps1Save, Ps1SaveKind};
use romkit::formats::{self, OpenOptions, RomData, RomObject};
use romkit::gametdb::ImageType;
use romkit::image::decoder::bgr555_to_argb32;
use romkit::metadata::{Property, PropertyValue};

#[test]
fn psv_header_yields_two_fields() {
    let mut save = Ps1Save::new(memory(psv_save(0x11, "BASLUS-00594", b"FINAL FANTASY")));
    assert!(save.is_valid());
    assert_eq!(save.kind(), Some(Ps1SaveKind::Psv));

    assert_eq!(save.load_field_data().unwrap(), 2);
    let fields = save.fields().unwrap();
    assert_eq!(fields.get_str("Filename"), Some("BASLUS-00594"));
    assert_eq!(fields.get_str("Description"), Some("FINAL FANTASY"));

    assert_eq!(save.load_metadata().unwrap(), 1);
    assert_eq!(
        save.metadata().unwrap().get(Property::Title),
        Some(&PropertyValue::String("FINAL FANTASY".to_owned()))
    );
}

#[test]
fn corrupt_sc_block_releases_source() {
    let mut data = psv_save(0x11, "BASLUS-00594", b"TITLE");
    data[0x84] = b'X';
    let src = memory(data);
    let mut save = Ps1Save::new(src.clone());

    assert!(!save.is_valid());
    assert!(!save.is_open());
    assert_eq!(src.ref_count(), 1);
    let err = save.load_field_data().unwrap_err();
    assert_eq!(err.code(), code::EBADF);
    assert!(save.fields().is_none());
}

#[test]
fn shift_jis_title() {
    // "セーブ" in Shift-JIS.
    let title = [0x83, 0x5A, 0x81, 0x5B, 0x83, 0x75];
    let mut save = Ps1Save::new(memory(psv_save(0x11, "BISLPS-00001", &title)));
    save.load_field_data().unwrap();
    assert_eq!(save.fields().unwrap().get_str("Description"), Some("セーブ"));
}

#[test]
fn field_loading_is_cached() {
    let (src, reads) = counting(psv_save(0x12, "BASCUS-94163", b"SAVE"));
    let mut save = Ps1Save::new(src);
    assert!(save.is_valid());

    let after_init = reads.load(Ordering::SeqCst);
    assert_eq!(save.load_field_data().unwrap(), 2);
    assert_eq!(save.load_field_data().unwrap(), 2);
    assert_eq!(save.load_metadata().unwrap(), 1);
    assert_eq!(save.load_metadata().unwrap(), 1);
    assert_eq!(reads.load(Ordering::SeqCst), after_init);
}

#[test]
fn animated_icon_is_decoded_once() {
    let mut save = Ps1Save::new(memory(psv_save(0x13, "BASLUS-00001", b"ANIM")));

    let first = save.load_internal_image(ImageType::IntIcon).unwrap();
    let again = save.load_internal_image(ImageType::IntIcon).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!((first.width(), first.height()), (16, 16));
    assert_eq!(first.argb(0, 0), bgr555_to_argb32(0x001F));

    let anim = save.icon_anim_data().unwrap();
    assert_eq!(anim.frame_count(), 3);
    assert_eq!(anim.seq_count(), 3);
    assert!(Arc::ptr_eq(&anim.frames[0], &first));
    assert_eq!(anim.frames[1].argb(5, 5), bgr555_to_argb32(0x03E0));
    assert_eq!(anim.frames[2].argb(15, 15), bgr555_to_argb32(0x7C00));
    for delay in &anim.delays {
        assert_eq!(delay.numerator, 11);
        assert_eq!(delay.ms, 220);
    }
}

#[test]
fn single_frame_icon_is_not_animated() {
    let mut save = Ps1Save::new(memory(psv_save(0x11, "BASLUS-00001", b"STILL")));
    assert!(save.icon_anim_data().is_none());
    assert!(save.load_internal_image(ImageType::IntIcon).is_ok());
    let err = save.load_internal_image(ImageType::IntBanner).unwrap_err();
    assert_eq!(err.code(), code::ENOENT);
}

#[test]
fn cached_data_survives_close() {
    let mut save = Ps1Save::new(memory(psv_save(0x11, "BASLUS-00001", b"KEEP")));
    save.load_field_data().unwrap();
    save.close();
    assert!(!save.is_open());
    assert_eq!(save.load_field_data().unwrap(), 2);
    assert_eq!(save.load_metadata().unwrap_err().code(), code::EBADF);
}

#[test]
fn psv_without_icon() {
    let mut save = Ps1Save::new(memory(psv_save(0x00, "BASLUS-00594", b"FINAL FANTASY")));
    assert!(save.is_valid());
    assert!(!save.has_thumbnail());
    assert!(save.icon_anim_data().is_none());
    let err = save.load_internal_image(ImageType::IntIcon).unwrap_err();
    assert_eq!(err.code(), code::ENOENT);
    assert_eq!(save.load_field_data().unwrap(), 2);
}

#[test]
fn alternate_flag_0x16_is_one_frame() {
    let mut save = Ps1Save::new(memory(psv_save(0x16, "BASLUS-00594", b"FINAL FANTASY")));
    assert!(save.is_valid());
    assert!(save.icon_anim_data().is_none());
    let icon = save.load_internal_image(ImageType::IntIcon).unwrap();
    assert_eq!(icon.argb(0, 0), bgr555_to_argb32(0x001F));
}

#[test]
fn alternate_flag_0x17_is_two_frames() {
    let mut save = Ps1Save::new(memory(psv_save(0x17, "BASLUS-00594", b"FINAL FANTASY")));
    assert!(save.is_valid());
    let anim = save.icon_anim_data().unwrap();
    assert_eq!(anim.frame_count(), 2);
    assert!(anim.delays.iter().all(|d| d.numerator == 16));
}

#[test]
fn alternate_flag_0x18_is_three_frames() {
    let mut save = Ps1Save::new(memory(psv_save(0x18, "BASLUS-00594", b"FINAL FANTASY")));
    assert!(save.is_valid());
    let anim = save.icon_anim_data().unwrap();
    assert_eq!(anim.frame_count(), 3);
    assert_eq!(anim.frames[2].argb(15, 15), bgr555_to_argb32(0x7C00));
}

#[test]
fn unknown_flag_is_accepted_only_inside_psv() {
    let mut save = Ps1Save::new(memory(psv_save(0x14, "BASLUS-00594", b"ODD")));
    assert!(save.is_valid());
    assert!(save.load_internal_image(ImageType::IntIcon).is_ok());

    let raw = Ps1Save::new(memory(raw_save(0x14, b"ODD", 1)));
    assert!(!raw.is_valid());
}

#[test]
fn raw_save_needs_weak_detection() {
    let data = raw_save(0x11, b"RAW SAVE", 1);

    let rom = formats::open(memory(data.clone()), Some("mcs"), &OpenOptions::default()).unwrap();
    assert!(matches!(&rom, RomObject::Ps1Save(s) if s.kind() == Some(Ps1SaveKind::Raw)));

    let strict = OpenOptions {
        allow_extension_only: false,
        ..OpenOptions::default()
    };
    assert!(formats::open(memory(data), Some("mcs"), &strict).is_none());
}

#[test]
fn raw_save_has_no_filename() {
    let mut save = Ps1Save::new(memory(raw_save(0x12, b"NO NAME", 2)));
    assert_eq!(save.kind(), Some(Ps1SaveKind::Raw));
    assert_eq!(save.load_field_data().unwrap(), 1);
    assert_eq!(save.fields().unwrap().get_str("Description"), Some("NO NAME"));
}
