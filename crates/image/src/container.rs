//! Unpacking and repacking the document container.
//!
//! The pipeline works on an unpacked tree (`Index/` metadata, `Data/`
//! artifacts). Getting there and back is delegated to `keynote-parser`.

use crate::{ImageError, Result};
use deckslim_core::process::{resolve_program, run_with_timeout};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

/// Converts between a packed document and a working tree.
pub trait ContainerCodec {
    /// Unpack `source` into `work_dir`.
    fn unpack(&self, source: &Path, work_dir: &Path) -> Result<()>;

    /// Pack `work_dir` into `destination`.
    fn pack(&self, work_dir: &Path, destination: &Path) -> Result<()>;
}

/// Codec backed by the `keynote-parser` command.
#[derive(Debug, Clone)]
pub struct KeynoteParserCodec {
    program: String,
    timeout: Duration,
}

impl KeynoteParserCodec {
    /// Use `program` (a name on `PATH` or a path), bounded by `timeout` per call.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self { program: program.into(), timeout }
    }

    fn run(&self, verb: &str, input: &Path, output: &Path) -> Result<()> {
        let fail = |message: String| ImageError::ContainerTranscodeFailure(format!("{verb} {}: {message}", input.display()));

        let program = resolve_program(&self.program).map_err(|e| fail(e.to_string()))?;
        let args = [OsStr::new(verb), input.as_os_str(), OsStr::new("--output"), output.as_os_str()];
        tracing::debug!(program = %program.display(), verb, input = %input.display(), output = %output.display(), "container transcode");

        let result = run_with_timeout(&program, &args, Path::new("."), self.timeout)
            .and_then(|r| r.into_success(&self.program))
            .map_err(|e| match e.context {
                Some(ctx) => fail(format!("{}: {ctx}", e.message)),
                None => fail(e.message),
            })?;
        tracing::debug!(elapsed_ms = result.elapsed.as_millis() as u64, "{verb} finished");
        Ok(())
    }
}

impl ContainerCodec for KeynoteParserCodec {
    fn unpack(&self, source: &Path, work_dir: &Path) -> Result<()> {
        if !source.exists() {
            return Err(ImageError::ContainerTranscodeFailure(format!("{} does not exist", source.display())));
        }
        self.run("unpack", source, work_dir)?;
        if !work_dir.join(crate::document::INDEX_DIR).is_dir() {
            return Err(ImageError::ContainerTranscodeFailure(format!(
                "unpacking {} produced no {} directory",
                source.display(),
                crate::document::INDEX_DIR
            )));
        }
        Ok(())
    }

    fn pack(&self, work_dir: &Path, destination: &Path) -> Result<()> {
        self.run("pack", work_dir, destination)?;
        if !destination.exists() {
            return Err(ImageError::ContainerTranscodeFailure(format!(
                "packing {} produced no output",
                work_dir.display()
            )));
        }
        Ok(())
    }
}
