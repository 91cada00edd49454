//! Usage-aware resizing.
//!
//! The kept resolution is derived from how an asset is used: the tallest
//! authored on-slide height for content images, a fixed output height for
//! backgrounds. A safety factor leaves headroom for zoom and high-density
//! displays. Images are never upscaled.

use crate::asset::ImageAsset;
use crate::codec::{decode, dimensions, encode_image, write_atomic};
use crate::Result;
use deckslim_core::config::PipelineSettings;
use image::imageops::FilterType;

/// Output height assumed for background and style fills.
pub const STYLE_TARGET_HEIGHT: f64 = 1080.0;

/// What a ratio was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioBasis {
    /// Largest authored height among content references
    Content,
    /// Fixed output height for background fills
    Style,
    /// No usage, kept at full resolution
    Unreferenced,
    /// A content reference without an authored height, kept at full resolution
    UnknownHeight,
    /// Format is not a resizable raster
    NotEligible,
}

/// Downscale decision for one asset.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ResizePlan {
    /// Ratio before clamping; values at or above 1.0 mean "keep"
    pub ratio: f64,
    /// Where the ratio came from
    pub basis: RatioBasis,
}

impl ResizePlan {
    fn keep(basis: RatioBasis) -> Self {
        Self { ratio: 1.0, basis }
    }

    /// The ratio to apply, if it shrinks the image.
    pub fn effective_ratio(&self) -> Option<f64> {
        clamp_ratio(self.ratio)
    }
}

/// Derive the downscale ratio from usage.
///
/// `content_heights` holds one entry per content reference (its authored
/// height, if declared); `style_references` counts background usages.
/// Content usage takes priority over style usage.
pub fn compute_ratio(
    content_heights: &[Option<f64>],
    style_references: usize,
    current_height: u32,
    safety_factor: f64,
) -> ResizePlan {
    if content_heights.is_empty() && style_references == 0 {
        return ResizePlan::keep(RatioBasis::Unreferenced);
    }
    if current_height == 0 {
        return ResizePlan::keep(RatioBasis::UnknownHeight);
    }
    let current = f64::from(current_height);

    if !content_heights.is_empty() {
        let mut max_ratio = 0.0_f64;
        for height in content_heights {
            let Some(height) = height.filter(|h| h.is_finite() && *h > 0.0) else {
                return ResizePlan::keep(RatioBasis::UnknownHeight);
            };
            max_ratio = max_ratio.max(height / current);
        }
        return ResizePlan { ratio: max_ratio * safety_factor, basis: RatioBasis::Content };
    }

    // Every style usage targets the same output height, so combining
    // several by maximum yields this one ratio.
    ResizePlan {
        ratio: STYLE_TARGET_HEIGHT / current * safety_factor,
        basis: RatioBasis::Style,
    }
}

/// A ratio worth applying: strictly between 0 and 1.
pub fn clamp_ratio(ratio: f64) -> Option<f64> {
    (ratio.is_finite() && ratio > 0.0 && ratio < 1.0).then_some(ratio)
}

/// New dimensions for `ratio`, rounded down and never below one pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn target_dimensions(width: u32, height: u32, ratio: f64) -> (u32, u32) {
    let ratio = ratio.clamp(0.0, 1.0);
    let scale = |v: u32| ((f64::from(v) * ratio).floor() as u32).clamp(1, v.max(1));
    (scale(width), scale(height))
}

/// Plan the resize of one asset whose current pixel height is known.
pub fn plan_for(asset: &ImageAsset, current_height: u32, safety_factor: f64) -> ResizePlan {
    if !asset.current_format().is_some_and(|f| f.is_resizable()) {
        return ResizePlan::keep(RatioBasis::NotEligible);
    }
    let heights: Vec<Option<f64>> = asset.slide_references().iter().map(|r| r.declared_height).collect();
    compute_ratio(&heights, asset.slide_style_references().len(), current_height, safety_factor)
}

/// Plan for an asset on disk, reading its header for the current height.
pub fn plan_asset(asset: &ImageAsset, safety_factor: f64) -> Result<ResizePlan> {
    if !asset.current_format().is_some_and(|f| f.is_resizable()) {
        return Ok(ResizePlan::keep(RatioBasis::NotEligible));
    }
    if !asset.has_references() {
        return Ok(ResizePlan::keep(RatioBasis::Unreferenced));
    }
    let (_, height) = dimensions(asset.current_path())?;
    Ok(plan_for(asset, height, safety_factor))
}

/// Outcome of resizing one asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeOutcome {
    /// Nothing to do for this asset
    Kept(ResizePlan),
    /// Downscaled, but the re-encode was not smaller, so the artifact was kept
    NoGain { from: (u32, u32), to: (u32, u32) },
    /// Downscaled and written
    Resized { from: (u32, u32), to: (u32, u32), size: u64 },
}

/// Run the resize stage for one asset.
pub fn resize_asset(asset: &mut ImageAsset, settings: &PipelineSettings) -> Result<ResizeOutcome> {
    let plan = plan_asset(asset, settings.resize_safety_factor)?;
    let Some(ratio) = plan.effective_ratio() else {
        return Ok(ResizeOutcome::Kept(plan));
    };
    let Some(format) = asset.current_format() else {
        return Ok(ResizeOutcome::Kept(plan));
    };

    let img = decode(asset.current_path())?;
    let from = (img.width(), img.height());
    let to = target_dimensions(from.0, from.1, ratio);
    tracing::debug!(
        asset = %asset,
        basis = ?plan.basis,
        ratio = format_args!("{:.3}", ratio),
        "resizing {}x{} to {}x{}",
        from.0, from.1, to.0, to.1
    );

    let resized = img.resize_exact(to.0, to.1, FilterType::Lanczos3);
    drop(img);
    let bytes = encode_image(&resized, format, settings.jpeg_quality)?;
    let size = bytes.len() as u64;

    if size >= asset.size_resized() {
        tracing::debug!(asset = %asset, size, "resized encode is not smaller, keeping artifact");
        return Ok(ResizeOutcome::NoGain { from, to });
    }

    write_atomic(asset.current_path(), &bytes, asset.current_path())?;
    asset.sizes_mut().record_resize(size);
    Ok(ResizeOutcome::Resized { from, to, size })
}
