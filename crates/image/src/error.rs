//! Error types for the image pipeline.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::asset::AssetId;

/// Result type alias for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors that can occur while slimming a document.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Declared asset has no file in the data directory
    #[error("asset {identifier} declares {} but no such file exists", path.display())]
    MissingAssetFile {
        /// Identifier from the metadata record
        identifier: AssetId,
        /// Expected artifact location
        path: PathBuf,
    },

    /// Source image could not be opened or decoded
    #[error("cannot decode {}: {source}", path.display())]
    DecodeFailure {
        /// Artifact that failed to decode
        path: PathBuf,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// External tool ran past its time budget and was killed
    #[error("{tool} did not finish within {:.1}s", timeout.as_secs_f64())]
    ExternalToolTimeout {
        /// Program name
        tool: String,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// External tool could not run or exited non-zero
    #[error("{tool} failed: {message}")]
    ExternalToolFailure {
        /// Program name
        tool: String,
        /// Exit status and stderr summary
        message: String,
    },

    /// Unpacking or repacking the container failed
    #[error("container transcode failed: {0}")]
    ContainerTranscodeFailure(String),

    /// Metadata tree unreadable or malformed
    #[error("metadata error in {}: {message}", path.display())]
    Metadata {
        /// Tree file
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Encoding a candidate or resized image failed
    #[error("encode error: {0}")]
    Encode(String),

    /// Lossless PNG pass failed
    #[error("oxipng: {0}")]
    Png(#[from] oxipng::PngError),

    /// Worker pool could not be created
    #[error("worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    ProcessingError(#[from] image::ImageError),
}

impl ImageError {
    /// Map a process error from the core crate to the external-tool taxonomy
    pub(crate) fn from_tool(tool: &str, timeout: Duration, err: deckslim_core::Error) -> Self {
        if err.is_timeout() {
            return ImageError::ExternalToolTimeout { tool: tool.to_string(), timeout };
        }
        let mut message = err.message;
        if let Some(ctx) = err.context {
            message = format!("{message}: {ctx}");
        }
        ImageError::ExternalToolFailure { tool: tool.to_string(), message }
    }
}

impl From<ImageError> for deckslim_core::Error {
    fn from(err: ImageError) -> Self {
        use deckslim_core::ErrorCode;
        let code = match &err {
            ImageError::MissingAssetFile { .. } => ErrorCode::MissingAsset,
            ImageError::DecodeFailure { .. } => ErrorCode::DecodeFailure,
            ImageError::Metadata { .. } => ErrorCode::MetadataError,
            ImageError::ExternalToolTimeout { .. } => ErrorCode::ProcessTimeout,
            ImageError::ExternalToolFailure { .. } => ErrorCode::CommandFailed,
            ImageError::ContainerTranscodeFailure(_) => ErrorCode::ContainerError,
            ImageError::IoError(_) => ErrorCode::IoError,
            ImageError::WorkerPool(_) => ErrorCode::Internal,
            _ => ErrorCode::ImageError,
        };
        let suggestion = match &err {
            ImageError::ContainerTranscodeFailure(_) => {
                Some("Check that keynote-parser is installed and the document opens in Keynote")
            }
            ImageError::Metadata { .. } => Some("Re-unpack the document; the Index directory looks damaged"),
            _ => None,
        };
        let message = err.to_string();
        let mut converted = deckslim_core::Error::new(code, message).with_source(err);
        if let Some(suggestion) = suggestion {
            converted = converted.with_suggestion(suggestion);
        }
        converted
    }
}

/// Pipeline stage a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Registry construction
    Registry,
    /// Reference resolution
    References,
    /// Format selection
    Convert,
    /// Usage-aware resize
    Resize,
    /// Optimizer chain
    Optimize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Registry => "registry",
            Stage::References => "references",
            Stage::Convert => "convert",
            Stage::Resize => "resize",
            Stage::Optimize => "optimize",
        };
        f.write_str(name)
    }
}

/// A recoverable per-asset failure, surfaced in the session report.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Asset the failure belongs to
    pub identifier: AssetId,
    /// Stage that raised it
    pub stage: Stage,
    /// Rendered cause
    pub message: String,
}

impl Diagnostic {
    /// Record a failure and emit it as a warning event.
    pub fn raise(identifier: &AssetId, stage: Stage, error: &ImageError) -> Self {
        tracing::warn!(asset = %identifier, %stage, "{error}");
        Self {
            identifier: identifier.clone(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] asset {}: {}", self.stage, self.identifier, self.message)
    }
}
