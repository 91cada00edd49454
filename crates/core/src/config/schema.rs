//! Configuration schema definitions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    /// Pipeline stage settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// External tool locations
    #[serde(default)]
    pub tools: ToolSettings,

    /// Unpack and repack settings
    #[serde(default)]
    pub container: ContainerSettings,
}

impl ConfigSchema {
    /// Validate every section
    ///
    /// # Errors
    ///
    /// `InvalidConfigValue` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.container.validate()
    }
}

/// Tuning knobs for the conversion, resize and optimization stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Headroom multiplier over the largest on-slide rendering height
    pub resize_safety_factor: f64,

    /// Quality for lossy JPEG encodes (0-100)
    pub jpeg_quality: u8,

    /// Also try re-encoding PNG assets as JPEG
    pub enable_lossy_png_to_jpeg: bool,

    /// oxipng preset (0-6)
    pub oxipng_effort_level: u8,

    /// Seconds allowed for one JPEG re-encode
    pub jpeg_timeout_secs: u64,

    /// Seconds allowed for one PDF optimization
    pub pdf_timeout_secs: u64,

    /// Largest accepted `new / old` size ratio for an optimizer pass
    pub acceptance_threshold: f64,

    /// Worker threads for per-asset stages (0 = one per core)
    pub jobs: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            resize_safety_factor: 2.0,
            jpeg_quality: 85,
            enable_lossy_png_to_jpeg: false,
            oxipng_effort_level: 6,
            jpeg_timeout_secs: 20,
            pdf_timeout_secs: 60,
            acceptance_threshold: 0.98,
            jobs: 0,
        }
    }
}

impl PipelineSettings {
    /// Timeout for the JPEG re-encoder
    #[must_use]
    pub fn jpeg_timeout(&self) -> Duration {
        Duration::from_secs(self.jpeg_timeout_secs)
    }

    /// Timeout for the PDF optimizer
    #[must_use]
    pub fn pdf_timeout(&self) -> Duration {
        Duration::from_secs(self.pdf_timeout_secs)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// `InvalidConfigValue` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if !(self.resize_safety_factor.is_finite() && self.resize_safety_factor > 0.0) {
            return Err(Error::invalid_config(
                "resize_safety_factor",
                format!("{} must be a positive number", self.resize_safety_factor),
            ));
        }
        if self.jpeg_quality > 100 {
            return Err(Error::invalid_config(
                "jpeg_quality",
                format!("{} is outside 0-100", self.jpeg_quality),
            ));
        }
        if self.oxipng_effort_level > 6 {
            return Err(Error::invalid_config(
                "oxipng_effort_level",
                format!("{} is outside 0-6", self.oxipng_effort_level),
            ));
        }
        if self.jpeg_timeout_secs == 0 || self.pdf_timeout_secs == 0 {
            return Err(Error::invalid_config("timeout", "tool timeouts must be at least one second"));
        }
        if !(self.acceptance_threshold > 0.0 && self.acceptance_threshold <= 1.0) {
            return Err(Error::invalid_config(
                "acceptance_threshold",
                format!("{} is outside (0, 1]", self.acceptance_threshold),
            ));
        }
        Ok(())
    }
}

/// Locations of the external programs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// mozjpeg `cjpeg` binary
    pub cjpeg: String,

    /// `pdfsizeopt` entry point
    pub pdfsizeopt: String,

    /// Archive transcoder used to unpack and repack documents
    pub keynote_parser: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            cjpeg: "cjpeg".to_string(),
            pdfsizeopt: "pdfsizeopt".to_string(),
            keynote_parser: "keynote-parser".to_string(),
        }
    }
}

/// Container unpack/repack settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Suffix appended to the source stem for the repacked document
    pub output_suffix: String,

    /// Seconds allowed for one unpack or repack
    pub timeout_secs: u64,

    /// Keep the unpacked working tree after the run
    pub keep_unpacked: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            output_suffix: "_slim".to_string(),
            timeout_secs: 600,
            keep_unpacked: false,
        }
    }
}

impl ContainerSettings {
    /// Timeout for one container transcode
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::invalid_config("container.timeout_secs", "must be at least one second"));
        }
        if self.output_suffix.is_empty() {
            return Err(Error::invalid_config(
                "container.output_suffix",
                "must not be empty, the source document would be overwritten",
            ));
        }
        Ok(())
    }
}
