//! Low-level decode primitives shared by all parsers.
//!
//! Each reader function reads exactly the bytes it promises or returns an
//! error - there is no partial-read ambiguity. Header structs are decoded
//! field by field through these helpers over a `Cursor` of the captured
//! header bytes, never by overlaying memory.

use std::io::Read;

use crate::{Error, Result};

/// Fixed-width integer readers over a header cursor.
macro_rules! int_reader {
    ($($(#[$doc:meta])* $name:ident: $ty:ty => $conv:ident;)*) => {$(
        $(#[$doc])*
        #[inline]
        pub(crate) fn $name<R: Read>(r: &mut R) -> Result<$ty> {
            Ok(<$ty>::$conv(bytesa(r)?))
        }
    )*};
}

int_reader! {
    /// Flags, counts and version bytes.
    u8: u8 => from_le_bytes;
    /// BGR555 palette entries in PS1 save icons.
    le_u16: u16 => from_le_bytes;
    /// Container index entries (ZISO, WUX, NASOS) and FIRM/GBA header words.
    le_u32: u32 => from_le_bytes;
    /// Uncompressed sizes in ZISO and WUX headers.
    le_u64: u64 => from_le_bytes;
    /// GameCube/Wii disc header words.
    be_u32: u32 => from_be_bytes;
}

/// Read an ISO-9660 both-endian `u32` (LE copy followed by BE copy).
///
/// Only the little-endian half is returned; the big-endian half is
/// consumed but not cross-checked, matching how mastering tools are
/// tolerated in practice.
#[inline]
pub(crate) fn both_u32<R: Read>(r: &mut R) -> Result<u32> {
    let le = le_u32(r)?;
    let _be = be_u32(r)?;
    Ok(le)
}

/// Read an ISO-9660 both-endian `u16`, returning the little-endian half.
#[inline]
pub(crate) fn both_u16<R: Read>(r: &mut R) -> Result<u16> {
    let le = le_u16(r)?;
    let _be = bytesa::<2>(r)?;
    Ok(le)
}

/// Fixed-size header field: titles, IDs, hashes, reserved padding.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Variable-length field whose size comes from an earlier length byte,
/// such as an ISO-9660 directory record name.
#[inline]
pub(crate) fn bytesv<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = vec![0u8; len];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Consume a signature ("SC", "FIRM", "CD001", "ZISO", ...) and fail with
/// [`Error::BadMagic`] if the bytes differ.
#[inline]
pub(crate) fn magic<R: Read, const N: usize>(r: &mut R, expected: &[u8; N]) -> Result<()> {
    if &bytesa::<N>(r)? == expected {
        Ok(())
    } else {
        Err(Error::BadMagic)
    }
}

/// Little-endian `u32` at `offset` in a detection buffer.
///
/// Returns `None` when the buffer is too short, so detectors fail closed.
#[inline]
pub(crate) fn le_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Big-endian `u32` at `offset` in a detection buffer.
#[inline]
pub(crate) fn be_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// True if `buf` holds `expected` at `offset`. Short buffers never match.
#[inline]
pub(crate) fn has_at(buf: &[u8], offset: usize, expected: &[u8]) -> bool {
    offset
        .checked_add(expected.len())
        .and_then(|end| buf.get(offset..end))
        .is_some_and(|got| got == expected)
}

/// XOR of every byte in `data`.
#[inline]
pub(crate) fn xor8(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc ^ b)
}

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}
