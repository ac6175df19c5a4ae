//! Block decompression services.
//!
//! Compressed container readers do not decode data themselves; they hand
//! each compressed block to a [`Decompressor`]. The contract is the same
//! for every codec:
//!
//! * `src` holds exactly one compressed block and `dst` is filled
//!   completely, or the call fails.
//! * `window_size` is the codec's sliding-window size and must be a power
//!   of two; codecs that take a window-bit count derive it with
//!   [`window_bits`].
//! * `history`, if given, pre-seeds the window. It is copied to the tail of
//!   the window, so back-references at the start of the block reach the
//!   last bytes of the history.
//!
//! [`decompress`] checks these rules before calling the codec.
//!
//! | Module | Codec | Used by |
//! |--------|-------|---------|
//! | [`lz4`] | LZ4 block (`compression` feature) | [`crate::disc::ziso`] |

#[cfg(feature = "compression")]
pub mod lz4;

use crate::{Error, Result};

/// A block decompression service.
pub trait Decompressor: Send + Sync {
    /// Decompress one block. Callers go through [`decompress`], which has
    /// already validated the arguments.
    fn decompress_block(
        &self,
        src: &[u8],
        dst: &mut [u8],
        window_size: u32,
        history: Option<&[u8]>,
    ) -> Result<()>;
}

/// Window-bit count for a power-of-two window size.
pub fn window_bits(window_size: u32) -> Option<u32> {
    window_size
        .is_power_of_two()
        .then(|| window_size.trailing_zeros())
}

/// Validate the call against the contract, then decompress.
pub fn decompress(
    codec: &dyn Decompressor,
    src: &[u8],
    dst: &mut [u8],
    window_size: u32,
    history: Option<&[u8]>,
) -> Result<()> {
    debug_assert!(!src.is_empty() && !dst.is_empty());
    if src.is_empty() || dst.is_empty() {
        return Err(Error::InvalidRange);
    }
    if window_bits(window_size).is_none() {
        return Err(Error::Parse("decompression window size is not a power of two"));
    }
    if history.is_some_and(|h| h.len() > window_size as usize) {
        return Err(Error::InvalidRange);
    }
    codec.decompress_block(src, dst, window_size, history)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// "Codec" that copies the history tail followed by the source.
    struct Copy;

    impl Decompressor for Copy {
        fn decompress_block(
            &self,
            src: &[u8],
            dst: &mut [u8],
            _window_size: u32,
            history: Option<&[u8]>,
        ) -> Result<()> {
            let hist = history.unwrap_or_default();
            let seeded: Vec<u8> = hist.iter().chain(src).copied().collect();
            if seeded.len() < dst.len() {
                return Err(Error::UnexpectedEof);
            }
            dst.copy_from_slice(&seeded[seeded.len() - dst.len()..]);
            Ok(())
        }
    }

    #[test]
    fn window_bits_of_powers_of_two() {
        assert_eq!(window_bits(1 << 15), Some(15));
        assert_eq!(window_bits(1), Some(0));
        assert_eq!(window_bits(3000), None);
        assert_eq!(window_bits(0), None);
    }

    #[test]
    fn rejects_contract_violations() {
        let mut dst = [0u8; 4];
        assert!(matches!(
            decompress(&Copy, &[1, 2], &mut dst, 3000, None),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            decompress(&Copy, &[1, 2], &mut dst, 4, Some(&[0u8; 5])),
            Err(Error::InvalidRange)
        ));
    }

    #[test]
    fn history_reaches_the_codec() {
        let mut dst = [0u8; 4];
        decompress(&Copy, &[3, 4], &mut dst, 8, Some(&[9, 1, 2])).unwrap();
        assert_eq!(dst, [1, 2, 3, 4]);
    }
}
