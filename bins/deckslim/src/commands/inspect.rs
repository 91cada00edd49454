//! Inspect command - list images, their usage and the planned resize

use super::{fatal, WorkDir};
use anyhow::Result;
use deckslim_cli::output::{column, format_count, format_size, Status};
use deckslim_cli::progress;
use deckslim_core::config::Config;
use deckslim_image::{ContainerCodec, Diagnostic, DocumentSession, KeynoteParserCodec, RatioBasis};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Row {
    identifier: String,
    name: String,
    format: Option<String>,
    size: u64,
    content_references: usize,
    style_references: usize,
    basis: Option<RatioBasis>,
    planned_ratio: Option<f64>,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    images: Vec<Row>,
    total_size: u64,
    diagnostics: Vec<Diagnostic>,
}

/// Run the inspect command
pub fn run(config: &Config, path: &Path, json: bool) -> Result<()> {
    if path.is_dir() {
        return inspect(config, path, json);
    }
    if !path.is_file() {
        return Err(deckslim_core::Error::file_not_found(path).into());
    }

    let codec = KeynoteParserCodec::new(config.schema.tools.keynote_parser.as_str(), config.schema.container.timeout());
    let scratch = tempfile::tempdir()?;
    let work = WorkDir::reserve(scratch.path(), false);

    let spinner = if json { indicatif::ProgressBar::hidden() } else { progress::spinner("Unpacking") };
    if let Err(e) = codec.unpack(path, work.path()) {
        progress::finish_error(&spinner, "unpack failed");
        return Err(fatal(e));
    }
    spinner.finish_and_clear();
    inspect(config, work.path(), json)
}

fn inspect(config: &Config, root: &Path, json: bool) -> Result<()> {
    let session =
        DocumentSession::open(root, config.schema.pipeline.clone(), config.schema.tools.clone()).map_err(fatal)?;

    let images: Vec<Row> = session
        .resize_plans()
        .into_iter()
        .map(|(asset, plan)| Row {
            identifier: asset.identifier().to_string(),
            name: asset.preferred_name().to_string(),
            format: asset.current_format().map(|f| f.to_string()),
            size: asset.size_original(),
            content_references: asset.slide_references().len(),
            style_references: asset.slide_style_references().len(),
            basis: plan.map(|p| p.basis),
            planned_ratio: plan.and_then(|p| p.effective_ratio()),
        })
        .collect();
    let output = InspectOutput {
        total_size: images.iter().map(|r| r.size).sum(),
        images,
        diagnostics: session.diagnostics().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    Status::header(&format!("{} in {}", format_count(output.images.len(), "image", "images"), root.display()));
    println!(
        "{}",
        format!(
            "  {} {} {} {:>10} {:>5} {:>5}  {}",
            column("id", 8),
            column("name", 32),
            column("fmt", 5),
            "size",
            "refs",
            "bg",
            "resize"
        )
        .dimmed()
    );
    for row in &output.images {
        let resize = match (row.planned_ratio, row.basis) {
            (Some(ratio), _) => format!("{:.0}%", ratio * 100.0).yellow().to_string(),
            (None, Some(RatioBasis::Unreferenced)) => "unused".dimmed().to_string(),
            (None, Some(RatioBasis::NotEligible)) => "n/a".dimmed().to_string(),
            (None, Some(RatioBasis::UnknownHeight)) => "keep (no height)".to_string(),
            (None, _) => "keep".to_string(),
        };
        println!(
            "  {} {} {} {:>10} {:>5} {:>5}  {}",
            column(&row.identifier, 8),
            column(&row.name, 32),
            column(row.format.as_deref().unwrap_or("?"), 5),
            format_size(row.size),
            row.content_references,
            row.style_references,
            resize
        );
    }
    println!();
    println!("  {} {}", "total".bold(), format_size(output.total_size));

    for diagnostic in &output.diagnostics {
        Status::warning(&diagnostic.to_string());
    }
    Ok(())
}
