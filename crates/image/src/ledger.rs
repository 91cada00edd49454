//! Size accounting across pipeline stages.

use crate::asset::{ImageAsset, SizeHistory};
use serde::Serialize;
use std::ops::AddAssign;

/// Fraction of `before` removed by a stage: `1 - after / before`.
///
/// Zero when `before` is zero. Negative if a stage grew the artifact.
#[allow(clippy::cast_precision_loss)]
pub fn fractional_loss(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    1.0 - after as f64 / before as f64
}

/// Sum of each stage's size over a set of assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTotals {
    /// Number of assets summed
    pub assets: usize,
    /// Total original bytes
    pub original: u64,
    /// Total after format selection
    pub converted: u64,
    /// Total after resizing
    pub resized: u64,
    /// Total after the optimizer chain
    pub optimized: u64,
}

impl StageTotals {
    /// Sum over `assets`.
    pub fn from_assets<'a>(assets: impl IntoIterator<Item = &'a ImageAsset>) -> Self {
        assets.into_iter().map(ImageAsset::sizes).fold(Self::default(), |mut acc, sizes| {
            acc += sizes;
            acc
        })
    }

    /// Per-stage fractional losses.
    pub fn losses(&self) -> StageLosses {
        StageLosses::between(&SizeHistory {
            original: self.original,
            converted: self.converted,
            resized: self.resized,
            optimized: self.optimized,
        })
    }

    /// Bytes removed overall.
    pub fn saved(&self) -> u64 {
        self.original.saturating_sub(self.optimized)
    }
}

impl AddAssign<&SizeHistory> for StageTotals {
    fn add_assign(&mut self, sizes: &SizeHistory) {
        self.assets += 1;
        self.original += sizes.original;
        self.converted += sizes.converted;
        self.resized += sizes.resized;
        self.optimized += sizes.optimized;
    }
}

/// Fractional loss of each stage relative to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageLosses {
    /// Format selection
    pub convert: f64,
    /// Resize
    pub resize: f64,
    /// Optimizer chain
    pub optimize: f64,
    /// Original to final
    pub total: f64,
}

impl StageLosses {
    /// Losses along one size history.
    pub fn between(sizes: &SizeHistory) -> Self {
        Self {
            convert: fractional_loss(sizes.original, sizes.converted),
            resize: fractional_loss(sizes.converted, sizes.resized),
            optimize: fractional_loss(sizes.resized, sizes.optimized),
            total: fractional_loss(sizes.original, sizes.optimized),
        }
    }
}

/// One row of the per-asset report.
#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    /// Asset identifier
    pub identifier: String,
    /// User-facing file name
    pub name: String,
    /// Current format suffix, if known
    pub format: Option<String>,
    /// Stage sizes
    pub sizes: SizeHistory,
    /// Content usages
    pub content_references: usize,
    /// Background usages
    pub style_references: usize,
}

impl From<&ImageAsset> for AssetReport {
    fn from(asset: &ImageAsset) -> Self {
        Self {
            identifier: asset.identifier().to_string(),
            name: asset.preferred_name().to_string(),
            format: asset.current_format().map(|f| f.to_string()),
            sizes: *asset.sizes(),
            content_references: asset.slide_references().len(),
            style_references: asset.slide_style_references().len(),
        }
    }
}
