//! LZ4 block decompression (requires the `compression` feature).
//!
//! Blocks are raw LZ4 block data with no size prefix; the caller knows the
//! decompressed size from the container's index. A history buffer is
//! passed to `lz4_flex` as an external dictionary, which places it
//! directly in front of the output.

#![cfg(feature = "compression")]

use super::Decompressor;
use crate::{Error, Result};

/// Raw LZ4 block codec backed by `lz4_flex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Block;

impl Decompressor for Lz4Block {
    fn decompress_block(
        &self,
        src: &[u8],
        dst: &mut [u8],
        _window_size: u32,
        history: Option<&[u8]>,
    ) -> Result<()> {
        let written = match history {
            Some(dict) => lz4_flex::block::decompress_into_with_dict(src, dst, dict),
            None => lz4_flex::block::decompress_into(src, dst),
        }
        .map_err(|_| Error::Lz4)?;
        if written != dst.len() {
            log::warn!("lz4 block decoded to {written} bytes, expected {}", dst.len());
            return Err(Error::Lz4);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::decompress;

    #[test]
    fn block_round_trip() {
        let data: Vec<u8> = b"romkit ".iter().copied().cycle().take(700).collect();
        let packed = lz4_flex::block::compress(&data);
        let mut out = vec![0u8; data.len()];
        decompress(&Lz4Block, &packed, &mut out, 1 << 16, None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn short_output_is_an_error() {
        let data = vec![7u8; 256];
        let packed = lz4_flex::block::compress(&data);
        let mut out = vec![0u8; 300];
        assert!(matches!(
            decompress(&Lz4Block, &packed, &mut out, 1 << 16, None),
            Err(Error::Lz4)
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        let mut out = [0u8; 64];
        assert!(decompress(&Lz4Block, &[0xF0, 0xFF, 0xFF], &mut out, 1 << 16, None).is_err());
    }
}
