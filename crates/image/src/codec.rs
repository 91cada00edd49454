//! Decoding and encoding with the image crate.

use crate::{ImageError, ImageFormat, Result};
use image::{DynamicImage, ImageOutputFormat};
use std::io::{Cursor, Write};
use std::path::Path;

/// Decode an artifact, mapping any failure to `DecodeFailure`.
pub fn decode(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| ImageError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Pixel dimensions read from the header, without decoding pixels.
pub fn dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path).map_err(|source| ImageError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Check if an image has an alpha channel
pub fn has_alpha_channel(img: &DynamicImage) -> bool {
    img.color().has_alpha()
}

/// Encode a `DynamicImage` to bytes.
///
/// JPEG output is flattened to 8-bit RGB (or luma), which is all the
/// baseline encoder accepts.
pub fn encode_image(img: &DynamicImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let flat = if img.color().has_color() {
                DynamicImage::ImageRgb8(img.to_rgb8())
            } else {
                DynamicImage::ImageLuma8(img.to_luma8())
            };
            flat.write_to(&mut buffer, ImageOutputFormat::Jpeg(jpeg_quality.min(100)))?;
        }
        ImageFormat::Png => img.write_to(&mut buffer, ImageOutputFormat::Png)?,
        ImageFormat::Gif => img.write_to(&mut buffer, ImageOutputFormat::Gif)?,
        ImageFormat::Tiff => img.write_to(&mut buffer, ImageOutputFormat::Tiff)?,
        other => return Err(ImageError::Encode(format!("unsupported output format: {other}"))),
    }

    Ok(buffer.into_inner())
}

/// Write `bytes` to `target` through a temporary file in the same directory,
/// so readers never see a half-written artifact.
///
/// The new file takes the permissions of `like`, the artifact it replaces.
pub(crate) fn write_atomic(target: &Path, bytes: &[u8], like: &Path) -> Result<()> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    copy_permissions(like, tmp.path())?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Give `to` the permission bits of `from`.
///
/// Temporary files are created owner-only; a replaced artifact keeps its mode.
pub(crate) fn copy_permissions(from: &Path, to: &Path) -> Result<()> {
    match std::fs::metadata(from) {
        Ok(meta) => std::fs::set_permissions(to, meta.permissions())?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
