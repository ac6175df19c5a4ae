//! Decoded images.
//!
//! Two pixel formats are supported: [`PixelFormat::Ci8`] (8-bit palette
//! indices plus a palette of up to 256 ARGB32 entries) and
//! [`PixelFormat::Argb32`] (native-endian `0xAARRGGBB` words stored as
//! little-endian bytes). Rows are `stride` bytes apart; the stride may
//! exceed `width × bytes_per_pixel`.
//!
//! Pixel storage comes from an [`ImageBackend`] built by a
//! [`BackendFactory`]. The factory is passed in at creation time; images
//! derived from an existing one (`dup`, `resized`) reuse its factory.

pub mod anim;
pub mod decoder;

pub use anim::{AnimDelay, IconAnimData};

/// Pixel format of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Ci8,
    Argb32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Ci8 => 1,
            PixelFormat::Argb32 => 4,
        }
    }
}

/// Significant bits per channel in the decoded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sbit {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub gray: u8,
    pub alpha: u8,
}

/// Vertical alignment for [`Image::resized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// Pixel storage for an image.
pub trait ImageBackend: Send + Sync {
    /// Bytes between the starts of consecutive rows.
    fn stride(&self) -> usize;
    fn data(&self) -> &[u8];
    fn data_mut(&mut self) -> &mut [u8];
}

/// Builds pixel storage for a `width × height` image of `format`.
pub type BackendFactory = fn(width: u32, height: u32, format: PixelFormat) -> Box<dyn ImageBackend>;

/// Heap-backed storage with rows aligned to 16 bytes.
#[derive(Debug)]
pub struct VecBackend {
    stride: usize,
    data: Vec<u8>,
}

impl ImageBackend for VecBackend {
    fn stride(&self) -> usize {
        self.stride
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// The default [`BackendFactory`].
pub fn vec_backend(width: u32, height: u32, format: PixelFormat) -> Box<dyn ImageBackend> {
    let row = width as usize * format.bytes_per_pixel();
    let stride = (row + 15) & !15;
    Box::new(VecBackend {
        stride,
        data: vec![0u8; stride * height as usize],
    })
}

/// A decoded image.
pub struct Image {
    width: u32,
    height: u32,
    format: PixelFormat,
    factory: BackendFactory,
    backend: Box<dyn ImageBackend>,
    palette: Vec<u32>,
    tr_idx: Option<u8>,
    sbit: Option<Sbit>,
}

impl Image {
    /// Create a zero-filled image with the default backend.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::with_factory(vec_backend, width, height, format)
    }

    /// Create a zero-filled image using `factory` for pixel storage.
    ///
    /// CI8 images start with a 256-entry all-zero palette.
    pub fn with_factory(
        factory: BackendFactory,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Self {
        let backend = factory(width, height, format);
        debug_assert!(backend.stride() >= width as usize * format.bytes_per_pixel());
        let palette = match format {
            PixelFormat::Ci8 => vec![0; 256],
            PixelFormat::Argb32 => Vec::new(),
        };
        Self {
            width,
            height,
            format,
            factory,
            backend,
            palette,
            tr_idx: None,
            sbit: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn stride(&self) -> usize {
        self.backend.stride()
    }

    /// Bytes of pixel data in one row, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn data(&self) -> &[u8] {
        self.backend.data()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.backend.data_mut()
    }

    /// Pixel bytes of row `y`, excluding padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data()[start..start + self.row_bytes()]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride();
        let len = self.row_bytes();
        &mut self.data_mut()[start..start + len]
    }

    /// Palette entries (CI8 only; empty for ARGB32).
    pub fn palette(&self) -> &[u32] {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut [u32] {
        &mut self.palette
    }

    /// Palette index treated as fully transparent.
    pub fn tr_idx(&self) -> Option<u8> {
        self.tr_idx
    }

    pub fn set_tr_idx(&mut self, idx: Option<u8>) {
        self.tr_idx = idx;
    }

    pub fn sbit(&self) -> Option<Sbit> {
        self.sbit
    }

    pub fn set_sbit(&mut self, sbit: Option<Sbit>) {
        self.sbit = sbit;
    }

    /// Write one ARGB32 pixel. Only valid for ARGB32 images.
    pub fn set_argb(&mut self, x: u32, y: u32, argb: u32) {
        debug_assert_eq!(self.format, PixelFormat::Argb32);
        let off = x as usize * 4;
        self.row_mut(y)[off..off + 4].copy_from_slice(&argb.to_le_bytes());
    }

    /// Read one pixel as ARGB32, resolving palette indices.
    pub fn argb(&self, x: u32, y: u32) -> u32 {
        let row = self.row(y);
        match self.format {
            PixelFormat::Ci8 => self.palette[row[x as usize] as usize],
            PixelFormat::Argb32 => {
                let off = x as usize * 4;
                u32::from_le_bytes([row[off], row[off + 1], row[off + 2], row[off + 3]])
            }
        }
    }

    /// Deep copy, including palette and metadata.
    pub fn dup(&self) -> Image {
        let mut out = Image::with_factory(self.factory, self.width, self.height, self.format);
        for y in 0..self.height {
            out.row_mut(y).copy_from_slice(self.row(y));
        }
        out.palette.clone_from(&self.palette);
        out.tr_idx = self.tr_idx;
        out.sbit = self.sbit;
        out
    }

    /// Copy into a `width × height` canvas without scaling.
    ///
    /// The image is left-aligned and placed vertically per `align`; the
    /// part that does not fit is cropped. New area is filled with `bg`
    /// (ARGB32) or with the transparent index, else index 0 (CI8).
    pub fn resized(&self, width: u32, height: u32, align: VAlign, bg: u32) -> Image {
        let mut out = Image::with_factory(self.factory, width, height, self.format);
        out.palette.clone_from(&self.palette);
        out.tr_idx = self.tr_idx;
        out.sbit = self.sbit;

        match self.format {
            PixelFormat::Ci8 => {
                let fill = self.tr_idx.unwrap_or(0);
                for y in 0..height {
                    out.row_mut(y).fill(fill);
                }
            }
            PixelFormat::Argb32 => {
                for y in 0..height {
                    for x in 0..width {
                        out.set_argb(x, y, bg);
                    }
                }
            }
        }

        let copy_h = self.height.min(height);
        let copy_bytes = self.width.min(width) as usize * self.format.bytes_per_pixel();
        let (src_y, dst_y) = match align {
            VAlign::Top => (0, 0),
            VAlign::Bottom if height < self.height => (self.height - height, 0),
            VAlign::Bottom => (0, height - self.height),
            VAlign::Center if height < self.height => ((self.height - height) / 2, 0),
            VAlign::Center => (0, (height - self.height) / 2),
        };
        for i in 0..copy_h {
            let src = &self.row(src_y + i)[..copy_bytes];
            out.row_mut(dst_y + i)[..copy_bytes].copy_from_slice(src);
        }
        out
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("stride", &self.stride())
            .field("tr_idx", &self.tr_idx)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_ci8(w: u32, h: u32) -> Image {
        let mut img = Image::new(w, h, PixelFormat::Ci8);
        for y in 0..h {
            for (x, px) in img.row_mut(y).iter_mut().enumerate() {
                *px = (y * w + x as u32) as u8;
            }
        }
        for (i, c) in img.palette_mut().iter_mut().enumerate() {
            *c = 0xFF00_0000 | (i as u32 * 0x010101);
        }
        img.set_tr_idx(Some(0));
        img
    }

    fn gradient_argb(w: u32, h: u32) -> Image {
        let mut img = Image::new(w, h, PixelFormat::Argb32);
        for y in 0..h {
            for x in 0..w {
                img.set_argb(x, y, 0xFF00_0000 | (y << 8) | x);
            }
        }
        img
    }

    #[test]
    fn stride_is_padded() {
        let img = Image::new(5, 2, PixelFormat::Argb32);
        assert_eq!(img.row_bytes(), 20);
        assert_eq!(img.stride(), 32);
        assert_eq!(img.data().len(), 64);
    }

    #[test]
    fn dup_matches_ci8_and_palette() {
        let img = gradient_ci8(7, 5);
        let copy = img.dup();
        for y in 0..5 {
            assert_eq!(img.row(y), copy.row(y));
        }
        assert_eq!(img.palette(), copy.palette());
        assert_eq!(copy.tr_idx(), Some(0));
    }

    #[test]
    fn dup_matches_argb32() {
        let img = gradient_argb(9, 3);
        let copy = img.dup();
        for y in 0..3 {
            assert_eq!(img.row(y), copy.row(y));
        }
    }

    #[test]
    fn resized_top_and_bottom_crop() {
        let img = gradient_argb(8, 8);

        let top = img.resized(8, 4, VAlign::Top, 0);
        for y in 0..4 {
            assert_eq!(top.row(y), img.row(y));
        }

        let bottom = img.resized(8, 4, VAlign::Bottom, 0);
        for y in 0..4 {
            assert_eq!(bottom.row(y), img.row(y + 4));
        }
    }

    #[test]
    fn grow_then_crop_back_is_identity() {
        let img = gradient_ci8(6, 4);

        let grown = img.resized(10, 12, VAlign::Top, 0);
        let back = grown.resized(6, 4, VAlign::Top, 0);
        for y in 0..4 {
            assert_eq!(back.row(y), img.row(y));
        }

        let grown = img.resized(6, 12, VAlign::Bottom, 0);
        assert_eq!(grown.row(11), img.row(3));
        assert!(grown.row(0).iter().all(|&p| p == 0));
        let back = grown.resized(6, 4, VAlign::Bottom, 0);
        for y in 0..4 {
            assert_eq!(back.row(y), img.row(y));
        }
    }

    #[test]
    fn resized_fills_background() {
        let img = gradient_argb(2, 2);
        let grown = img.resized(4, 2, VAlign::Top, 0x1234_5678);
        assert_eq!(grown.argb(3, 1), 0x1234_5678);
        assert_eq!(grown.argb(1, 1), img.argb(1, 1));
    }

    fn tight_backend(width: u32, height: u32, format: PixelFormat) -> Box<dyn ImageBackend> {
        let stride = width as usize * format.bytes_per_pixel();
        Box::new(VecBackend {
            stride,
            data: vec![0; stride * height as usize],
        })
    }

    #[test]
    fn injected_factory_is_reused() {
        let img = Image::with_factory(tight_backend, 3, 3, PixelFormat::Ci8);
        assert_eq!(img.stride(), 3);
        assert_eq!(img.dup().stride(), 3);
        assert_eq!(img.resized(5, 1, VAlign::Top, 0).stride(), 5);
    }
}
