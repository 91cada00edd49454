//! Asset formats, inferred from file suffixes.

use std::path::Path;

/// Formats that show up as embedded document assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
    /// GIF image
    Gif,
    /// TIFF image
    Tiff,
    /// BMP image
    Bmp,
    /// WebP image
    WebP,
    /// HEIC/HEIF image
    Heic,
    /// PDF vector artwork
    Pdf,
}

impl ImageFormat {
    /// Infer the format from a path's suffix, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Look up a format by extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::Tiff,
            ImageFormat::Bmp,
            ImageFormat::WebP,
            ImageFormat::Heic,
            ImageFormat::Pdf,
        ]
        .into_iter()
        .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Get common file extensions for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::Jpeg => &["jpg", "jpeg"],
            ImageFormat::Png => &["png"],
            ImageFormat::Gif => &["gif"],
            ImageFormat::Tiff => &["tiff", "tif"],
            ImageFormat::Bmp => &["bmp"],
            ImageFormat::WebP => &["webp"],
            ImageFormat::Heic => &["heic", "heif"],
            ImageFormat::Pdf => &["pdf"],
        }
    }

    /// Suffix written when an asset is re-encoded into this format.
    pub fn canonical_extension(&self) -> &'static str {
        self.extensions()[0]
    }

    /// Raster formats the resize planner may downscale.
    pub fn is_resizable(&self) -> bool {
        matches!(self, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif)
    }

    /// Whether encoding into this format discards information.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_extension())
    }
}
