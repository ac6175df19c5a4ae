//! String helpers for fixed-width text fields.
//!
//! On-disk strings are NUL- or space-padded byte arrays in a handful of
//! encodings. Everything here is lossy: undecodable bytes never fail a parse.

use encoding_rs::SHIFT_JIS;

/// Cut a fixed-width field at its first NUL.
fn until_nul(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

/// Decode a NUL-padded Latin-1 field, trimming trailing spaces.
pub fn latin1(buf: &[u8]) -> String {
    let s: String = until_nul(buf).iter().map(|&b| b as char).collect();
    s.trim_end().to_owned()
}

/// Decode a NUL-padded Shift-JIS field, trimming trailing whitespace.
///
/// Full-width ideographic spaces (U+3000) count as whitespace.
pub fn shift_jis(buf: &[u8]) -> String {
    let (s, _, _) = SHIFT_JIS.decode(until_nul(buf));
    s.trim_end_matches(|c: char| c.is_whitespace() || c == '\u{3000}')
        .to_owned()
}

/// Replace every byte that is not printable ASCII with `placeholder`.
///
/// Used to turn raw game IDs into safe path components.
pub fn sanitize_id(id: &[u8], placeholder: char) -> String {
    id.iter()
        .map(|&b| {
            if b.is_ascii_graphic() {
                b as char
            } else {
                placeholder
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_trims_padding() {
        assert_eq!(latin1(b"PLAYSTATION      "), "PLAYSTATION");
        assert_eq!(latin1(b"ABC\0garbage"), "ABC");
        assert_eq!(latin1(b"\xE9t\xE9"), "\u{e9}t\u{e9}");
    }

    #[test]
    fn shift_jis_full_width_title() {
        // "ＡＢ" followed by an ideographic space and NUL padding.
        let raw = [0x82, 0x60, 0x82, 0x61, 0x81, 0x40, 0x00, 0x00];
        assert_eq!(shift_jis(&raw), "\u{ff21}\u{ff22}");
    }

    #[test]
    fn sanitize_replaces_non_printable() {
        assert_eq!(sanitize_id(b"GA\x00E01", '_'), "GA_E01");
        assert_eq!(sanitize_id(b"R P", '_'), "R_P");
    }
}
