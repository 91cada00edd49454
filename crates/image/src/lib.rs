//! Image slimming for unpacked presentation documents.
//!
//! This crate provides:
//! - An asset registry built from the document's metadata trees
//! - Reference resolution (content frames and background fills)
//! - Format selection among lossless and lossy candidates
//! - Usage-aware resizing that never upscales
//! - An optimizer chain (oxipng in-process, `cjpeg`/`pdfsizeopt` out of process)
//! - Per-stage size accounting
//!
//! [`DocumentSession`] ties the stages together over one working tree;
//! [`KeynoteParserCodec`] gets a packed document into and out of that tree.

#![warn(missing_docs)]

pub mod asset;
pub mod codec;
pub mod container;
pub mod convert;
pub mod document;
mod error;
mod format;
pub mod ledger;
pub mod metadata;
pub mod optimize;
pub mod references;
pub mod registry;
pub mod resize;

pub use asset::{AssetId, ImageAsset, SizeHistory};
pub use container::{ContainerCodec, KeynoteParserCodec};
pub use document::{DocumentSession, SessionReport, StageObserver, StageReport};
pub use error::{Diagnostic, ImageError, Result, Stage};
pub use format::ImageFormat;
pub use ledger::{fractional_loss, AssetReport, StageLosses, StageTotals};
pub use metadata::MetadataTree;
pub use registry::AssetRegistry;
pub use resize::{compute_ratio, target_dimensions, RatioBasis, ResizePlan};
