//! Core utilities for deckslim
//!
//! This crate provides the plumbing shared by the image pipeline and the CLI:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Process execution**: argument-vector command execution with timeouts
//! - **Configuration**: TOML-based configuration with validation
//!
//! # Example
//!
//! ```rust,no_run
//! use deckslim_core::config::Config;
//! use deckslim_core::process::run_with_timeout;
//! use std::time::Duration;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! let result = run_with_timeout(
//!     &config.schema.tools.cjpeg,
//!     &["-version"],
//!     std::path::Path::new("."),
//!     Duration::from_secs(5),
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod process;

pub use error::{Error, ErrorCode, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema, ContainerSettings, PipelineSettings, ToolSettings};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result};
    pub use crate::process::{resolve_program, run_with_timeout, CommandResult};
}
