//! Optimizer chain: format-specific recompression of the current artifact.
//!
//! PNG goes through oxipng in-process. JPEG and PDF go through external tools
//! (`cjpeg`, `pdfsizeopt`) under a wall-clock budget; their output replaces
//! the artifact only when it is clearly smaller.

use crate::asset::ImageAsset;
use crate::codec::{copy_permissions, write_atomic};
use crate::{ImageError, ImageFormat, Result};
use deckslim_core::config::{PipelineSettings, ToolSettings};
use deckslim_core::process::{resolve_program, run_with_timeout};
use std::path::Path;
use std::time::Duration;

/// What the optimizer did with one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// Not optimized: unreferenced, or no optimizer for the format
    Skipped,
    /// Smaller artifact written
    Accepted {
        /// Size going in
        before: u64,
        /// Size written
        after: u64,
    },
    /// Optimizer ran but the result was not small enough and was discarded
    Rejected {
        /// Size going in
        before: u64,
        /// Size of the discarded result
        candidate: u64,
    },
}

/// Whether an optimizer output of `new` bytes should replace `pre` bytes.
///
/// Accepted when it is at most `threshold` of the original; empty output is
/// never accepted.
#[allow(clippy::cast_precision_loss)]
pub fn accepts(pre: u64, new: u64, threshold: f64) -> bool {
    new > 0 && (new as f64) <= threshold * pre as f64
}

/// External tool invocation for formats handled out of process.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ToolCall<'a> {
    program: &'a str,
    suffix: &'static str,
}

/// Run the optimizer chain for one asset.
///
/// Failures leave the artifact and `size_optimized` untouched.
pub fn optimize_asset(
    asset: &mut ImageAsset,
    settings: &PipelineSettings,
    tools: &ToolSettings,
) -> Result<OptimizeOutcome> {
    if !asset.has_references() {
        return Ok(OptimizeOutcome::Skipped);
    }

    let outcome = match asset.current_format() {
        Some(ImageFormat::Png) => optimize_png(asset.current_path(), asset.size_resized(), settings)?,
        Some(ImageFormat::Jpeg) => {
            let quality = settings.jpeg_quality.to_string();
            let call = ToolCall { program: &tools.cjpeg, suffix: ".jpg" };
            run_external(asset.current_path(), asset.size_resized(), settings, &call, settings.jpeg_timeout(), |tmp, src| {
                vec!["-quality".into(), quality.clone(), "-outfile".into(), tmp.into(), src.into()]
            })?
        }
        Some(ImageFormat::Pdf) => {
            let call = ToolCall { program: &tools.pdfsizeopt, suffix: ".pdf" };
            run_external(asset.current_path(), asset.size_resized(), settings, &call, settings.pdf_timeout(), |tmp, src| {
                vec![src.into(), tmp.into()]
            })?
        }
        _ => OptimizeOutcome::Skipped,
    };

    match outcome {
        OptimizeOutcome::Accepted { after, .. } => {
            tracing::debug!(asset = %asset, before = asset.size_resized(), after, "optimized");
            asset.sizes_mut().record_optimization(after);
        }
        OptimizeOutcome::Rejected { candidate, .. } => {
            tracing::debug!(asset = %asset, candidate, "optimizer gain below threshold, discarded");
        }
        OptimizeOutcome::Skipped => {}
    }
    Ok(outcome)
}

fn optimize_png(path: &Path, pre: u64, settings: &PipelineSettings) -> Result<OptimizeOutcome> {
    let data = std::fs::read(path)?;
    let options = oxipng::Options::from_preset(settings.oxipng_effort_level.min(6));
    let optimized = oxipng::optimize_from_memory(&data, &options)?;
    let after = optimized.len() as u64;

    if after == 0 || after >= pre {
        return Ok(OptimizeOutcome::Rejected { before: pre, candidate: after });
    }
    write_atomic(path, &optimized, path)?;
    Ok(OptimizeOutcome::Accepted { before: pre, after })
}

/// Run an external optimizer in the artifact's directory.
///
/// The tool writes to a fresh temporary file next to the artifact. That file
/// is renamed over the artifact on acceptance and removed on every other path.
fn run_external(
    path: &Path,
    pre: u64,
    settings: &PipelineSettings,
    call: &ToolCall<'_>,
    timeout: Duration,
    args: impl FnOnce(&str, &str) -> Vec<String>,
) -> Result<OptimizeOutcome> {
    let tool = call.program;
    let program = resolve_program(tool).map_err(|e| ImageError::from_tool(tool, timeout, e))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let src = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ImageError::ExternalToolFailure {
            tool: tool.to_string(),
            message: format!("unusable file name: {}", path.display()),
        })?;

    let tmp = tempfile::Builder::new()
        .prefix(".deckslim-")
        .suffix(call.suffix)
        .tempfile_in(dir)?
        .into_temp_path();
    let tmp_name = tmp
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .unwrap_or_default();

    let result = run_with_timeout(&program, &args(&tmp_name, src), dir, timeout)
        .and_then(|r| r.into_success(tool))
        .map_err(|e| ImageError::from_tool(tool, timeout, e))?;
    if !result.stderr.trim().is_empty() {
        tracing::debug!(tool, stderr = %result.stderr.trim(), "tool diagnostics");
    }

    let candidate = std::fs::metadata(&tmp)?.len();
    if !accepts(pre, candidate, settings.acceptance_threshold) {
        return Ok(OptimizeOutcome::Rejected { before: pre, candidate });
    }

    copy_permissions(path, &tmp)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(OptimizeOutcome::Accepted { before: pre, after: candidate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetId, ContentReference};
    use crate::codec::encode_image;
    use crate::metadata::RecordRef;

    const AT: RecordRef = RecordRef { tree: 0, chunk: 0, archive: 0, object: 0, data: None };

    fn referenced(dir: &Path, name: &str, bytes: &[u8]) -> ImageAsset {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        let mut asset = ImageAsset::new(AssetId::new("1"), AT, name, path).unwrap();
        asset.add_slide_reference(ContentReference { record: AT, declared_height: Some(100.0) });
        asset
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".deckslim-"))
            .collect()
    }

    #[test]
    fn test_acceptance_threshold() {
        assert!(accepts(1000, 950, 0.98));
        assert!(accepts(1000, 980, 0.98));
        assert!(!accepts(1000, 990, 0.98));
        assert!(!accepts(1000, 1200, 0.98));
        assert!(!accepts(1000, 0, 0.98));
    }

    #[test]
    fn test_unreferenced_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lonely.jpg");
        std::fs::write(&path, vec![1u8; 100]).unwrap();
        let mut asset = ImageAsset::new(AssetId::new("2"), AT, "lonely.jpg", path).unwrap();

        let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &ToolSettings::default()).unwrap();
        assert_eq!(outcome, OptimizeOutcome::Skipped);
    }

    #[test]
    fn test_other_formats_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut asset = referenced(dir.path(), "clip.gif", b"GIF89a");
        let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &ToolSettings::default()).unwrap();
        assert_eq!(outcome, OptimizeOutcome::Skipped);
    }

    #[test]
    fn test_png_never_grows() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, _| {
            image::Rgb([(x * 4) as u8, 0, 0])
        }));
        let bytes = encode_image(&img, ImageFormat::Png, 85).unwrap();
        let mut asset = referenced(dir.path(), "stripes.png", &bytes);
        let before = asset.size_resized();

        let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &ToolSettings::default()).unwrap();
        assert_ne!(outcome, OptimizeOutcome::Skipped);
        let on_disk = std::fs::metadata(asset.current_path()).unwrap().len();
        assert_eq!(asset.size_optimized(), on_disk);
        assert!(asset.size_optimized() <= before);
        assert!(image::open(asset.current_path()).is_ok());
    }

    #[test]
    fn test_missing_tool_is_a_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut asset = referenced(dir.path(), "photo.jpg", &[0xFF; 1000]);
        let tools = ToolSettings { cjpeg: "deckslim-no-such-cjpeg".into(), ..Default::default() };

        let err = optimize_asset(&mut asset, &PipelineSettings::default(), &tools).unwrap_err();
        assert!(matches!(err, ImageError::ExternalToolFailure { .. }));
        assert_eq!(asset.size_optimized(), asset.size_resized());
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable stand-in for an optimizer.
        fn tool(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn setup(output_bytes: u64) -> (tempfile::TempDir, tempfile::TempDir, ImageAsset, ToolSettings) {
            let bin = tempfile::tempdir().unwrap();
            let data = tempfile::tempdir().unwrap();
            // cjpeg -quality Q -outfile TMP SRC
            let cjpeg = tool(bin.path(), "cjpeg", &format!("head -c {output_bytes} /dev/zero > \"$4\""));
            let asset = referenced(data.path(), "photo.jpg", &[0xFF; 1000]);
            let tools = ToolSettings { cjpeg, ..Default::default() };
            (bin, data, asset, tools)
        }

        #[test]
        fn test_clear_gain_is_accepted() {
            let (_bin, data, mut asset, tools) = setup(950);
            let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &tools).unwrap();

            assert_eq!(outcome, OptimizeOutcome::Accepted { before: 1000, after: 950 });
            assert_eq!(asset.size_optimized(), 950);
            assert_eq!(std::fs::metadata(asset.current_path()).unwrap().len(), 950);
            assert!(leftovers(data.path()).is_empty());
        }

        #[test]
        fn test_marginal_gain_is_rejected() {
            let (_bin, data, mut asset, tools) = setup(990);
            let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &tools).unwrap();

            assert_eq!(outcome, OptimizeOutcome::Rejected { before: 1000, candidate: 990 });
            assert_eq!(asset.size_optimized(), 1000);
            assert_eq!(std::fs::read(asset.current_path()).unwrap(), vec![0xFF; 1000]);
            assert!(leftovers(data.path()).is_empty());
        }

        #[test]
        fn test_timeout_leaves_artifact_untouched() {
            let bin = tempfile::tempdir().unwrap();
            let data = tempfile::tempdir().unwrap();
            let cjpeg = tool(bin.path(), "cjpeg", "exec sleep 5");
            let mut asset = referenced(data.path(), "photo.jpg", &[0xFF; 1000]);
            let tools = ToolSettings { cjpeg, ..Default::default() };
            let settings = PipelineSettings { jpeg_timeout_secs: 1, ..Default::default() };

            let err = optimize_asset(&mut asset, &settings, &tools).unwrap_err();
            assert!(matches!(err, ImageError::ExternalToolTimeout { .. }), "{err}");
            assert_eq!(asset.size_optimized(), asset.size_resized());
            assert_eq!(std::fs::metadata(asset.current_path()).unwrap().len(), 1000);
            assert!(leftovers(data.path()).is_empty());
        }

        #[test]
        fn test_timeout_kills_wrapped_worker() {
            let bin = tempfile::tempdir().unwrap();
            let data = tempfile::tempdir().unwrap();
            // Launcher that forks its worker instead of exec-ing it.
            let cjpeg = tool(
                bin.path(),
                "cjpeg",
                "sh -c 'sleep 2; head -c 500 /dev/zero > \"$1\"; touch \"$1.still-running\"' _ \"$4\"\nexit 0",
            );
            let mut asset = referenced(data.path(), "photo.jpg", &[0xFF; 1000]);
            let tools = ToolSettings { cjpeg, ..Default::default() };
            let settings = PipelineSettings { jpeg_timeout_secs: 1, ..Default::default() };

            let err = optimize_asset(&mut asset, &settings, &tools).unwrap_err();
            assert!(matches!(err, ImageError::ExternalToolTimeout { .. }), "{err}");

            std::thread::sleep(Duration::from_secs(3));
            assert!(leftovers(data.path()).is_empty(), "{:?}", leftovers(data.path()));
            assert_eq!(std::fs::read(asset.current_path()).unwrap(), vec![0xFF; 1000]);
        }

        #[test]
        fn test_accepted_output_keeps_permissions() {
            let (_bin, _data, mut asset, tools) = setup(950);
            std::fs::set_permissions(asset.current_path(), std::fs::Permissions::from_mode(0o644)).unwrap();

            let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &tools).unwrap();
            assert!(matches!(outcome, OptimizeOutcome::Accepted { .. }));
            let mode = std::fs::metadata(asset.current_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }

        #[test]
        fn test_nonzero_exit_is_a_failure() {
            let bin = tempfile::tempdir().unwrap();
            let data = tempfile::tempdir().unwrap();
            let pdfsizeopt = tool(bin.path(), "pdfsizeopt", "echo 'bad xref' >&2; exit 3");
            let mut asset = referenced(data.path(), "chart.pdf", b"%PDF-1.4 fake");
            let tools = ToolSettings { pdfsizeopt, ..Default::default() };

            let err = optimize_asset(&mut asset, &PipelineSettings::default(), &tools).unwrap_err();
            match err {
                ImageError::ExternalToolFailure { message, .. } => assert!(message.contains("bad xref"), "{message}"),
                other => panic!("unexpected error: {other}"),
            }
            assert!(leftovers(data.path()).is_empty());
        }

        #[test]
        fn test_pdf_argument_order() {
            let bin = tempfile::tempdir().unwrap();
            let data = tempfile::tempdir().unwrap();
            // pdfsizeopt SRC TMP: copy only the first 10 bytes of the source.
            let pdfsizeopt = tool(bin.path(), "pdfsizeopt", "head -c 10 \"$1\" > \"$2\"");
            let mut asset = referenced(data.path(), "chart.pdf", &[b'%'; 100]);
            let tools = ToolSettings { pdfsizeopt, ..Default::default() };

            let outcome = optimize_asset(&mut asset, &PipelineSettings::default(), &tools).unwrap();
            assert_eq!(outcome, OptimizeOutcome::Accepted { before: 100, after: 10 });
            assert_eq!(std::fs::read(asset.current_path()).unwrap(), vec![b'%'; 10]);
        }
    }
}
