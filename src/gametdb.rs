//! External cover-art URLs on GameTDB.
//!
//! Nothing is downloaded here. Parsers turn their game ID and region into
//! a list of candidate URLs; the caller fetches and caches them.
//!
//! ```text
//! https://art.gametdb.com/{system}/{kind}{size}/{region}/{id}.{ext}
//!                         \____________ cache key _______________/
//! ```
//!
//! The default (smallest) size variant is always included so a missing
//! high-resolution image still has a fallback.

use crate::text::sanitize_id;
use crate::{Error, Result};

pub const BASE_URL: &str = "https://art.gametdb.com/";

/// Image types a parser can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// Icon embedded in the file.
    IntIcon,
    /// Banner embedded in the file.
    IntBanner,
    /// Front cover.
    ExtCover,
    /// 3D box render.
    ExtCover3D,
    /// Front, spine and back.
    ExtCoverFull,
    /// Disc label.
    ExtMedia,
}

impl ImageType {
    pub fn is_internal(self) -> bool {
        matches!(self, Self::IntIcon | Self::IntBanner)
    }

    /// Path segment on GameTDB.
    fn kind(self) -> Option<&'static str> {
        match self {
            Self::ExtCover => Some("cover"),
            Self::ExtCover3D => Some("cover3D"),
            Self::ExtCoverFull => Some("coverfull"),
            Self::ExtMedia => Some("disc"),
            Self::IntIcon | Self::IntBanner => None,
        }
    }
}

/// One size variant of an external image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSizeDef {
    /// Suffix appended to the kind segment (`""`, `"M"`, `"HQ"`).
    pub tag: &'static str,
    pub width: u16,
    pub height: u16,
}

impl ImageSizeDef {
    const fn new(tag: &'static str, width: u16, height: u16) -> Self {
        Self { tag, width, height }
    }
}

/// Size the caller would like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSizeRequest {
    #[default]
    Default,
    Largest,
    /// Smallest variant at least this many pixels tall.
    AtLeast(u16),
}

const COVER_SIZES: &[ImageSizeDef] = &[
    ImageSizeDef::new("", 160, 224),
    ImageSizeDef::new("M", 176, 248),
    ImageSizeDef::new("HQ", 512, 720),
];
const COVER3D_SIZES: &[ImageSizeDef] = &[ImageSizeDef::new("", 176, 248)];
const COVERFULL_SIZES: &[ImageSizeDef] = &[
    ImageSizeDef::new("", 512, 340),
    ImageSizeDef::new("HQ", 1024, 680),
];
const DISC_SIZES: &[ImageSizeDef] = &[
    ImageSizeDef::new("", 160, 160),
    ImageSizeDef::new("M", 500, 500),
];

/// Size variants GameTDB offers for `kind`, smallest first.
pub fn supported_sizes(kind: ImageType) -> &'static [ImageSizeDef] {
    match kind {
        ImageType::ExtCover => COVER_SIZES,
        ImageType::ExtCover3D => COVER3D_SIZES,
        ImageType::ExtCoverFull => COVERFULL_SIZES,
        ImageType::ExtMedia => DISC_SIZES,
        ImageType::IntIcon | ImageType::IntBanner => &[],
    }
}

fn select(
    sizes: &'static [ImageSizeDef],
    request: ImageSizeRequest,
) -> Option<&'static ImageSizeDef> {
    match request {
        ImageSizeRequest::Default => sizes.first(),
        ImageSizeRequest::Largest => sizes.last(),
        ImageSizeRequest::AtLeast(h) => sizes.iter().find(|s| s.height >= h).or(sizes.last()),
    }
}

/// A candidate download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtUrl {
    pub url: String,
    /// Relative path for a local cache.
    pub cache_key: String,
    pub width: u16,
    pub height: u16,
    pub high_res: bool,
}

/// Where a system's images live on GameTDB.
#[derive(Debug, Clone, Copy)]
pub struct GameTdbSystem {
    /// First path segment (`"wii"`, `"wiiu"`).
    pub path: &'static str,
    /// Image file extension.
    pub ext: &'static str,
}

/// GameTDB region folders for a Nintendo region character (4th ID byte).
///
/// Most specific first; `EN` is the catch-all for PAL releases.
pub fn regions_for_id(region: u8) -> &'static [&'static str] {
    match region {
        b'E' | b'N' => &["US"],
        b'J' => &["JA"],
        b'K' | b'Q' | b'T' => &["KO"],
        b'W' => &["ZH", "EN"],
        b'D' => &["DE", "EN"],
        b'F' => &["FR", "EN"],
        b'I' => &["IT", "EN"],
        b'S' => &["ES", "EN"],
        b'H' => &["NL", "EN"],
        b'U' => &["AU", "EN"],
        _ => &["EN"],
    }
}

/// Build candidate URLs for one game.
///
/// URLs come grouped by size, requested size first, then by region in the
/// order given. Non-printable ID bytes are replaced with `_`.
pub fn ext_urls(
    system: GameTdbSystem,
    kind: ImageType,
    regions: &[&str],
    id: &[u8],
    request: ImageSizeRequest,
) -> Result<Vec<ExtUrl>> {
    let segment = kind.kind().ok_or(Error::NotFound)?;
    let sizes = supported_sizes(kind);
    let (Some(default), Some(wanted)) = (sizes.first(), select(sizes, request)) else {
        return Err(Error::NotFound);
    };
    if regions.is_empty() || id.is_empty() {
        return Err(Error::NotFound);
    }

    let id = sanitize_id(id, '_');
    let mut picked = vec![wanted];
    if wanted != default {
        picked.push(default);
    }

    let mut urls = Vec::with_capacity(picked.len() * regions.len());
    for size in picked {
        for region in regions {
            let cache_key = format!(
                "{}/{segment}{}/{region}/{id}.{}",
                system.path, size.tag, system.ext
            );
            urls.push(ExtUrl {
                url: format!("{BASE_URL}{cache_key}"),
                cache_key,
                width: size.width,
                height: size.height,
                high_res: size != default,
            });
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WII: GameTdbSystem = GameTdbSystem {
        path: "wii",
        ext: "png",
    };

    #[test]
    fn region_folders() {
        assert_eq!(regions_for_id(b'E'), ["US"]);
        assert_eq!(regions_for_id(b'D'), ["DE", "EN"]);
        assert_eq!(regions_for_id(b'P'), ["EN"]);
    }

    #[test]
    fn default_request_has_no_high_res() {
        let urls = ext_urls(
            WII,
            ImageType::ExtCover,
            &["US"],
            b"RMGE01",
            ImageSizeRequest::Default,
        )
        .unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url, "https://art.gametdb.com/wii/cover/US/RMGE01.png");
        assert_eq!(urls[0].cache_key, "wii/cover/US/RMGE01.png");
        assert!(!urls[0].high_res);
    }

    #[test]
    fn high_res_request_keeps_fallback() {
        let urls = ext_urls(
            WII,
            ImageType::ExtCover,
            &["EN", "US"],
            b"RMGE01",
            ImageSizeRequest::Largest,
        )
        .unwrap();
        let keys: Vec<_> = urls.iter().map(|u| u.cache_key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "wii/coverHQ/EN/RMGE01.png",
                "wii/coverHQ/US/RMGE01.png",
                "wii/cover/EN/RMGE01.png",
                "wii/cover/US/RMGE01.png",
            ]
        );
        assert!(urls[0].high_res && !urls[3].high_res);
        assert_eq!(urls[0].height, 720);
    }

    #[test]
    fn ids_are_sanitized() {
        let urls = ext_urls(
            WII,
            ImageType::ExtMedia,
            &["JA"],
            b"GA\x01E\xFF1",
            ImageSizeRequest::Default,
        )
        .unwrap();
        assert_eq!(urls[0].cache_key, "wii/disc/JA/GA_E_1.png");
    }

    #[test]
    fn internal_types_have_no_urls() {
        assert!(matches!(
            ext_urls(WII, ImageType::IntIcon, &["US"], b"X", ImageSizeRequest::Default),
            Err(Error::NotFound)
        ));
    }
}
