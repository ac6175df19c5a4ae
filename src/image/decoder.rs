//! Console pixel-format decoders.

use super::{Image, PixelFormat, Sbit};
use crate::{Error, Result};

/// Expand a 5-bit channel to 8 bits.
#[inline]
fn c5(v: u16) -> u32 {
    let v = (v & 0x1F) as u32;
    (v << 3) | (v >> 2)
}

/// Expand a 4-bit channel to 8 bits.
#[inline]
fn c4(v: u16) -> u32 {
    let v = (v & 0x0F) as u32;
    (v << 4) | v
}

/// Expand a 3-bit channel to 8 bits.
#[inline]
fn c3(v: u16) -> u32 {
    let v = (v & 0x07) as u32;
    (v << 5) | (v << 2) | (v >> 1)
}

/// PlayStation BGR555 to ARGB32.
///
/// Bits 0-4 red, 5-9 green, 10-14 blue. The all-zero colour is the
/// hardware's transparent colour; the STP bit is ignored.
#[inline]
pub fn bgr555_to_argb32(px: u16) -> u32 {
    if px == 0 {
        return 0;
    }
    0xFF00_0000 | (c5(px) << 16) | (c5(px >> 5) << 8) | c5(px >> 10)
}

/// GameCube RGB5A3 to ARGB32.
///
/// Bit 15 set: opaque RGB555. Clear: ARGB3444.
#[inline]
pub fn rgb5a3_to_argb32(px: u16) -> u32 {
    if px & 0x8000 != 0 {
        0xFF00_0000 | (c5(px >> 10) << 16) | (c5(px >> 5) << 8) | c5(px)
    } else {
        (c3(px >> 12) << 24) | (c4(px >> 8) << 16) | (c4(px >> 4) << 8) | c4(px)
    }
}

/// Decode a linear 4-bpp image into CI8.
///
/// The low nibble of each byte is the left pixel. `palette` holds 16
/// BGR555 colours; the first all-zero colour becomes the transparent index.
pub fn from_linear_ci4_bgr555(
    width: u32,
    height: u32,
    data: &[u8],
    palette: &[u16; 16],
) -> Result<Image> {
    if width % 2 != 0 {
        return Err(Error::Parse("4-bpp image width must be even"));
    }
    let row_len = width as usize / 2;
    if data.len() < row_len * height as usize {
        return Err(Error::UnexpectedEof);
    }

    let mut img = Image::new(width, height, PixelFormat::Ci8);
    for (dst, &src) in img.palette_mut().iter_mut().zip(palette.iter()) {
        *dst = bgr555_to_argb32(src);
    }
    let tr_idx = palette.iter().position(|&c| c == 0).map(|i| i as u8);
    img.set_tr_idx(tr_idx);

    for (y, src) in data.chunks_exact(row_len).take(height as usize).enumerate() {
        let row = img.row_mut(y as u32);
        for (pair, &b) in row.chunks_exact_mut(2).zip(src) {
            pair[0] = b & 0x0F;
            pair[1] = b >> 4;
        }
    }

    img.set_sbit(Some(Sbit {
        red: 5,
        green: 5,
        blue: 5,
        gray: 0,
        alpha: if tr_idx.is_some() { 1 } else { 0 },
    }));
    Ok(img)
}

/// Decode a big-endian RGB5A3 image stored in 4×4 tiles.
pub fn from_tiled_rgb5a3(width: u32, height: u32, data: &[u8]) -> Result<Image> {
    if width % 4 != 0 || height % 4 != 0 {
        return Err(Error::Parse("tiled image dimensions must be multiples of 4"));
    }
    if data.len() < width as usize * height as usize * 2 {
        return Err(Error::UnexpectedEof);
    }

    let mut img = Image::new(width, height, PixelFormat::Argb32);
    let mut px = data
        .chunks_exact(2)
        .map(|b| rgb5a3_to_argb32(u16::from_be_bytes([b[0], b[1]])));
    for ty in (0..height).step_by(4) {
        for tx in (0..width).step_by(4) {
            for y in ty..ty + 4 {
                for x in tx..tx + 4 {
                    let argb = px.next().ok_or(Error::UnexpectedEof)?;
                    img.set_argb(x, y, argb);
                }
            }
        }
    }

    img.set_sbit(Some(Sbit {
        red: 5,
        green: 5,
        blue: 5,
        gray: 0,
        alpha: 3,
    }));
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr555_channels() {
        assert_eq!(bgr555_to_argb32(0x0000), 0);
        assert_eq!(bgr555_to_argb32(0x001F), 0xFFFF_0000);
        assert_eq!(bgr555_to_argb32(0x03E0), 0xFF00_FF00);
        assert_eq!(bgr555_to_argb32(0x7C00), 0xFF00_00FF);
        assert_eq!(bgr555_to_argb32(0x8000), 0xFF00_0000);
    }

    #[test]
    fn rgb5a3_both_modes() {
        assert_eq!(rgb5a3_to_argb32(0xFFFF), 0xFFFF_FFFF);
        assert_eq!(rgb5a3_to_argb32(0x7F00), 0xFFFF_0000);
        assert_eq!(rgb5a3_to_argb32(0x0000), 0x0000_0000);
    }

    #[test]
    fn ci4_low_nibble_first() {
        let mut pal = [0u16; 16];
        pal[1] = 0x001F;
        pal[2] = 0x7C00;
        let data = [0x21u8, 0x00];
        let img = from_linear_ci4_bgr555(4, 1, &data, &pal).unwrap();
        assert_eq!(img.row(0), &[1, 2, 0, 0]);
        assert_eq!(img.argb(0, 0), 0xFFFF_0000);
        assert_eq!(img.argb(1, 0), 0xFF00_00FF);
        assert_eq!(img.tr_idx(), Some(0));
        assert_eq!(img.sbit().unwrap().alpha, 1);
    }

    #[test]
    fn ci4_short_data_is_eof() {
        let pal = [0u16; 16];
        assert!(matches!(
            from_linear_ci4_bgr555(16, 16, &[0u8; 10], &pal),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn rgb5a3_tiles_are_row_major_within_tile() {
        let mut data = vec![0u8; 8 * 4 * 2];
        // Second pixel of the second tile is (5, 0).
        data[(16 + 1) * 2..(16 + 1) * 2 + 2].copy_from_slice(&0xFFFFu16.to_be_bytes());
        let img = from_tiled_rgb5a3(8, 4, &data).unwrap();
        assert_eq!(img.argb(5, 0), 0xFFFF_FFFF);
        assert_eq!(img.argb(1, 0), 0);
    }
}
