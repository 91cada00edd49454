//! Format selection: re-encode an asset into the smallest candidate format.

use crate::asset::{AssetId, ImageAsset};
use crate::codec::{decode, encode_image, has_alpha_channel, write_atomic};
use crate::metadata::RecordRef;
use crate::{ImageFormat, Result};
use deckslim_core::config::PipelineSettings;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Candidate formats, in the order they are tried.
pub const CANDIDATE_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

/// Metadata update owed after an asset changed its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Renamed asset
    pub identifier: AssetId,
    /// Declaring record to update
    pub origin: RecordRef,
    /// New `preferredFileName`
    pub preferred_file_name: String,
    /// New `fileName`
    pub file_name: String,
}

/// One trial encode.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Encoded format
    pub format: ImageFormat,
    /// Encoded bytes
    pub bytes: Vec<u8>,
}

impl Candidate {
    /// Encoded size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Whether the format selector should look at an asset at all.
///
/// TIFF is always worth replacing; PNG only when lossy conversion is allowed.
pub fn is_convertible(asset: &ImageAsset, settings: &PipelineSettings) -> bool {
    match asset.current_format() {
        Some(ImageFormat::Tiff) => true,
        Some(ImageFormat::Png) => settings.enable_lossy_png_to_jpeg,
        _ => false,
    }
}

/// Encode `img` into every applicable candidate format.
///
/// JPEG is left out for images with an alpha channel. A candidate that fails
/// to encode is skipped.
pub fn encode_candidates(img: &DynamicImage, jpeg_quality: u8) -> Vec<Candidate> {
    let has_alpha = has_alpha_channel(img);
    CANDIDATE_FORMATS
        .iter()
        .filter(|format| !(format.is_lossy() && has_alpha))
        .filter_map(|&format| match encode_image(img, format, jpeg_quality) {
            Ok(bytes) => {
                tracing::debug!(%format, size = bytes.len(), "candidate encoded");
                Some(Candidate { format, bytes })
            }
            Err(err) => {
                tracing::debug!(%format, "candidate failed: {err}");
                None
            }
        })
        .collect()
}

/// The smallest candidate, if it is strictly smaller than `current_size`.
pub fn pick_smallest(candidates: Vec<Candidate>, current_size: u64) -> Option<Candidate> {
    candidates
        .into_iter()
        .min_by_key(Candidate::size)
        .filter(|best| best.size() < current_size)
}

/// Run format selection for one asset.
///
/// Returns the metadata rename owed when the asset changed files, `None` when
/// it was left alone or re-encoded in place.
pub fn convert_asset(asset: &mut ImageAsset, settings: &PipelineSettings) -> Result<Option<Rename>> {
    let img = decode(asset.current_path())?;
    let candidates = encode_candidates(&img, settings.jpeg_quality);
    drop(img);

    let Some(best) = pick_smallest(candidates, asset.size_original()) else {
        tracing::debug!(asset = %asset, "no candidate beats the original, keeping it");
        return Ok(None);
    };

    let old_path = asset.current_path().to_path_buf();
    let target = if asset.current_format() == Some(best.format) {
        old_path.clone()
    } else {
        free_path_for(&old_path, best.format)
    };

    write_atomic(&target, &best.bytes, &old_path)?;
    if target != old_path {
        std::fs::remove_file(&old_path)?;
    }

    let size = best.size();
    tracing::debug!(
        asset = %asset,
        format = %best.format,
        before = asset.size_original(),
        after = size,
        "converted"
    );
    asset.sizes_mut().record_conversion(size);

    if target == old_path {
        return Ok(None);
    }
    asset.switch_format(best.format, target);
    Ok(Some(Rename {
        identifier: asset.identifier().clone(),
        origin: asset.origin(),
        preferred_file_name: asset.preferred_name().to_string(),
        file_name: asset.file_name().to_string(),
    }))
}

/// `path` with the format's suffix, avoiding files that already exist.
fn free_path_for(path: &Path, format: ImageFormat) -> PathBuf {
    let ext = format.canonical_extension();
    let first = path.with_extension(ext);
    if !first.exists() {
        return first;
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("asset");
    (1..)
        .map(|n| path.with_file_name(format!("{stem}-{n}.{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
