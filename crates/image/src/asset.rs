//! Embedded image assets and their per-stage size history.

use crate::metadata::RecordRef;
use crate::{ImageError, ImageFormat, Result};
use serde::Serialize;
use serde_yaml::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque identifier of an asset, as written in the metadata tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an identifier from a scalar metadata value.
    ///
    /// Trees store identifiers as integers, but strings are accepted so the
    /// key stays opaque. Empty strings and non-scalars are not identifiers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image placed in slide content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentReference {
    /// The placing record
    pub record: RecordRef,
    /// Height the image was authored at (`originalSize.height`), if present
    pub declared_height: Option<f64>,
}

/// An image used as a slide or master background fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleReference {
    /// The style record
    pub record: RecordRef,
}

/// Byte size of an asset after each pipeline stage.
///
/// Every field starts at the on-disk size. A stage stamps its own field and
/// carries the value forward into the later ones, so a stage that changes
/// nothing leaves its field equal to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeHistory {
    /// Size when the registry was built
    pub original: u64,
    /// Size after format selection
    pub converted: u64,
    /// Size after resizing
    pub resized: u64,
    /// Size after the optimizer chain
    pub optimized: u64,
}

impl SizeHistory {
    /// Seed all four stages with one size.
    pub fn new(size: u64) -> Self {
        Self { original: size, converted: size, resized: size, optimized: size }
    }

    pub(crate) fn record_conversion(&mut self, size: u64) {
        self.converted = size;
        self.resized = size;
        self.optimized = size;
    }

    pub(crate) fn record_resize(&mut self, size: u64) {
        self.resized = size;
        self.optimized = size;
    }

    pub(crate) fn record_optimization(&mut self, size: u64) {
        self.optimized = size;
    }

    /// Size of the artifact as it stands now.
    pub fn current(&self) -> u64 {
        self.optimized
    }

    /// Whether sizes never grow from one stage to the next.
    pub fn is_monotonic(&self) -> bool {
        self.original >= self.converted && self.converted >= self.resized && self.resized >= self.optimized
    }
}

/// One embedded image and everything the pipeline knows about it.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    identifier: AssetId,
    origin: RecordRef,
    preferred_name: String,
    current_path: PathBuf,
    current_format: Option<ImageFormat>,
    sizes: SizeHistory,
    slide_references: Vec<ContentReference>,
    slide_style_references: Vec<StyleReference>,
}

impl ImageAsset {
    /// Create an asset for an artifact in the data directory.
    ///
    /// Fails with `MissingAssetFile` when `path` is not a file.
    pub fn new(
        identifier: AssetId,
        origin: RecordRef,
        preferred_name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let path = path.into();
        let size = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(ImageError::MissingAssetFile { identifier, path }),
        };
        Ok(Self {
            identifier,
            origin,
            preferred_name: preferred_name.into(),
            current_format: ImageFormat::from_path(&path),
            current_path: path,
            sizes: SizeHistory::new(size),
            slide_references: Vec::new(),
            slide_style_references: Vec::new(),
        })
    }

    /// Identifier from the metadata record.
    pub fn identifier(&self) -> &AssetId {
        &self.identifier
    }

    /// Declaring record in the primary tree.
    pub fn origin(&self) -> RecordRef {
        self.origin
    }

    /// User-facing file name (`preferredFileName`).
    pub fn preferred_name(&self) -> &str {
        &self.preferred_name
    }

    /// Where the artifact lives now.
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Format of the current artifact, from its suffix.
    pub fn current_format(&self) -> Option<ImageFormat> {
        self.current_format
    }

    /// Package file name (`fileName`).
    pub fn file_name(&self) -> &str {
        self.current_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Per-stage size stamps.
    pub fn sizes(&self) -> &SizeHistory {
        &self.sizes
    }

    pub(crate) fn sizes_mut(&mut self) -> &mut SizeHistory {
        &mut self.sizes
    }

    /// Size before any stage ran.
    pub fn size_original(&self) -> u64 {
        self.sizes.original
    }

    /// Size after format selection.
    pub fn size_converted(&self) -> u64 {
        self.sizes.converted
    }

    /// Size after resizing.
    pub fn size_resized(&self) -> u64 {
        self.sizes.resized
    }

    /// Size after the optimizer chain.
    pub fn size_optimized(&self) -> u64 {
        self.sizes.optimized
    }

    /// On-slide uses, in discovery order.
    pub fn slide_references(&self) -> &[ContentReference] {
        &self.slide_references
    }

    /// Background uses from slide styles.
    pub fn slide_style_references(&self) -> &[StyleReference] {
        &self.slide_style_references
    }

    /// Whether anything in the document uses this asset.
    pub fn has_references(&self) -> bool {
        !self.slide_references.is_empty() || !self.slide_style_references.is_empty()
    }

    /// Record an on-slide use.
    pub fn add_slide_reference(&mut self, reference: ContentReference) {
        self.slide_references.push(reference);
    }

    /// Record a background use.
    pub fn add_slide_style_reference(&mut self, reference: StyleReference) {
        self.slide_style_references.push(reference);
    }

    /// Point the asset at a re-encoded artifact.
    ///
    /// The preferred name keeps its stem and takes the new suffix.
    pub(crate) fn switch_format(&mut self, format: ImageFormat, path: PathBuf) {
        self.preferred_name = Path::new(&self.preferred_name)
            .with_extension(format.canonical_extension())
            .to_string_lossy()
            .into_owned();
        self.current_path = path;
        self.current_format = Some(format);
    }
}

impl fmt::Display for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.preferred_name, self.identifier)
    }
}
