//! Slim command - unpack, run the pipeline, repack

use super::{fatal, BarObserver, WorkDir};
use crate::presets;
use crate::SlimArgs;
use anyhow::{bail, Result};
use deckslim_cli::output::{format_count, format_reduction, format_size, Status};
use deckslim_cli::progress;
use deckslim_core::config::{Config, PipelineSettings};
use deckslim_image::{fractional_loss, ContainerCodec, DocumentSession, KeynoteParserCodec, SessionReport};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct PackageSizes {
    before: u64,
    after: u64,
    loss: f64,
}

#[derive(Debug, Serialize)]
struct SlimOutput {
    input: PathBuf,
    output: Option<PathBuf>,
    package: Option<PackageSizes>,
    report: SessionReport,
}

/// `<stem><suffix>.<ext>` next to `input`.
pub fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(name)
}

/// Run the slim command
pub fn run(config: &Config, args: &SlimArgs, json: bool) -> Result<()> {
    let mut settings = config.schema.pipeline.clone();
    presets::apply(&mut settings, args);
    settings.validate()?;
    if !json {
        for warning in presets::warnings(&settings) {
            Status::warning(&warning);
        }
    }

    let input = match (&args.file, &args.unpacked) {
        (_, Some(dir)) => {
            let report = process(dir, settings, config, json)?;
            return emit(SlimOutput { input: dir.clone(), output: None, package: None, report }, json);
        }
        (Some(file), None) => file,
        (None, None) => bail!("nothing to slim: pass a document or --unpacked DIR"),
    };

    if !input.is_file() {
        return Err(deckslim_core::Error::file_not_found(input).into());
    }
    let container = &config.schema.container;
    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(input, &container.output_suffix));
    if destination == *input {
        bail!("refusing to overwrite the input document {}", input.display());
    }

    let codec = KeynoteParserCodec::new(config.schema.tools.keynote_parser.as_str(), container.timeout());
    let work = WorkDir::reserve(&std::env::current_dir()?, args.keep_unpacked || container.keep_unpacked);

    let spinner = if json { indicatif::ProgressBar::hidden() } else { progress::spinner("Unpacking") };
    if let Err(e) = codec.unpack(input, work.path()) {
        progress::finish_error(&spinner, "unpack failed");
        return Err(fatal(e));
    }
    progress::finish_success(&spinner, &format!("Unpacked to {}", work.path().display()));

    let report = process(work.path(), settings, config, json)?;

    let spinner = if json { indicatif::ProgressBar::hidden() } else { progress::spinner("Packing") };
    if let Err(e) = codec.pack(work.path(), &destination) {
        progress::finish_error(&spinner, "pack failed");
        if destination.exists() {
            let _ = std::fs::remove_file(&destination);
        }
        return Err(fatal(e));
    }
    progress::finish_success(&spinner, &format!("Packed {}", destination.display()));

    let before = std::fs::metadata(input)?.len();
    let after = std::fs::metadata(&destination)?.len();
    if work.is_kept() && !json {
        Status::info(&format!("Work directory kept at {}", work.path().display()));
    }

    emit(
        SlimOutput {
            input: input.clone(),
            output: Some(destination),
            package: Some(PackageSizes { before, after, loss: fractional_loss(before, after) }),
            report,
        },
        json,
    )
}

/// Run every stage over an unpacked tree and persist the metadata.
fn process(root: &Path, settings: PipelineSettings, config: &Config, json: bool) -> Result<SessionReport> {
    let mut session = DocumentSession::open(root, settings, config.schema.tools.clone()).map_err(fatal)?;
    if !json {
        Status::info(&format!(
            "{} in {}",
            format_count(session.registry().len(), "image", "images"),
            root.display()
        ));
    }

    let observer = BarObserver::new(json);
    session.run_all(&observer);
    let saved = session.save().map_err(fatal)?;
    tracing::info!(trees = saved, "metadata written");
    Ok(session.report())
}

fn emit(output: SlimOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let report = &output.report;
    let totals = &report.totals;
    Status::header("Images");
    println!("  {:<10} {}", "total", format_reduction(totals.original, totals.optimized, report.losses.total).bold());
    println!("  {:<10} -{:.1}%", "convert", report.losses.convert * 100.0);
    println!("  {:<10} -{:.1}%", "resize", report.losses.resize * 100.0);
    println!("  {:<10} -{:.1}%", "optimize", report.losses.optimize * 100.0);

    if let Some(package) = &output.package {
        Status::header("Document");
        println!("  {}", format_reduction(package.before, package.after, package.loss).bold());
    }

    if !report.diagnostics.is_empty() {
        Status::header("Skipped");
        for diagnostic in &report.diagnostics {
            Status::warning(&diagnostic.to_string());
        }
    }

    println!();
    match &output.output {
        Some(path) => Status::success(&format!("Saved {} to {}", format_size(totals.saved()), path.display())),
        None => Status::success(&format!("Saved {} in {}", format_size(totals.saved()), output.input.display())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_name() {
        assert_eq!(
            default_output(Path::new("/decks/Quarterly Review.key"), "_slim"),
            PathBuf::from("/decks/Quarterly Review_slim.key")
        );
        assert_eq!(default_output(Path::new("talk"), "-small"), PathBuf::from("talk-small"));
    }
}
