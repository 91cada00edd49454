//! One optimization run over an unpacked document.
//!
//! A session owns the metadata trees, the asset registry and the worker pool.
//! Per-asset stages run in parallel; metadata edits they owe are applied
//! afterwards on the calling thread, so trees only ever have one writer.

use crate::asset::{AssetId, ImageAsset};
use crate::convert::{convert_asset, is_convertible, Rename};
use crate::error::{Diagnostic, Stage};
use crate::ledger::{AssetReport, StageLosses, StageTotals};
use crate::metadata::MetadataTree;
use crate::optimize::{optimize_asset, OptimizeOutcome};
use crate::references::{resolve_references, ReferenceStats};
use crate::registry::AssetRegistry;
use crate::resize::{plan_asset, resize_asset, ResizeOutcome, ResizePlan};
use crate::{ImageError, Result};
use deckslim_core::config::{PipelineSettings, ToolSettings};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory holding the metadata trees.
pub const INDEX_DIR: &str = "Index";
/// Directory holding the binary artifacts.
pub const DATA_DIR: &str = "Data";
/// The tree declaring every asset.
pub const PRIMARY_TREE: &str = "Metadata.iwa.yaml";

/// Receives progress events while stages run.
///
/// `asset_done` is called from worker threads.
pub trait StageObserver: Sync {
    /// A stage is about to process `assets` assets.
    fn stage_started(&self, _stage: Stage, _assets: usize) {}
    /// One asset went through the stage, successfully or not.
    fn asset_done(&self, _stage: Stage, _asset: &ImageAsset) {}
    /// All assets went through the stage.
    fn stage_finished(&self, _report: &StageReport) {}
}

impl StageObserver for () {}

/// Outcome counts of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Stage these counts belong to
    pub stage: Stage,
    /// Assets the stage looked at
    pub attempted: usize,
    /// Assets whose artifact changed
    pub changed: usize,
    /// Assets that raised a diagnostic
    pub failed: usize,
}

/// Everything a presentation layer needs after a run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Per-asset sizes, in declaration order
    pub assets: Vec<AssetReport>,
    /// Stage sums over all assets
    pub totals: StageTotals,
    /// Stage losses derived from the totals
    pub losses: StageLosses,
    /// Reference counts from resolution
    pub references: ReferenceStats,
    /// Stages run so far
    pub stages: Vec<StageReport>,
    /// Recoverable failures
    pub diagnostics: Vec<Diagnostic>,
}

/// An unpacked document under optimization.
pub struct DocumentSession {
    root: PathBuf,
    trees: Vec<MetadataTree>,
    registry: AssetRegistry,
    references: ReferenceStats,
    stages: Vec<StageReport>,
    diagnostics: Vec<Diagnostic>,
    settings: PipelineSettings,
    tools: ToolSettings,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("root", &self.root)
            .field("trees", &self.trees.len())
            .field("assets", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl DocumentSession {
    /// Load every metadata tree under `root/Index`, build the registry from
    /// the primary tree and attach references.
    ///
    /// A missing or unreadable tree is fatal; missing artifacts are not.
    pub fn open(root: impl Into<PathBuf>, settings: PipelineSettings, tools: ToolSettings) -> Result<Self> {
        let root = root.into();
        let index = root.join(INDEX_DIR);
        let primary_path = index.join(PRIMARY_TREE);
        if !primary_path.is_file() {
            return Err(ImageError::Metadata {
                path: primary_path,
                message: "primary metadata tree not found".to_string(),
            });
        }

        let mut trees = vec![MetadataTree::load(&primary_path)?];
        for path in secondary_trees(&index) {
            trees.push(MetadataTree::load(path)?);
        }
        tracing::info!(root = %root.display(), trees = trees.len(), "loaded metadata");

        let (mut registry, diagnostics) = AssetRegistry::build(&trees[0], 0, &root.join(DATA_DIR));
        let references = resolve_references(&trees, &mut registry);
        tracing::info!(
            assets = registry.len(),
            dropped = diagnostics.len(),
            content = references.content,
            style = references.style,
            "registry ready"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.jobs)
            .thread_name(|i| format!("deckslim-{i}"))
            .build()?;

        Ok(Self {
            root,
            trees,
            registry,
            references,
            stages: Vec::new(),
            diagnostics,
            settings,
            tools,
            pool,
        })
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded trees; the primary tree comes first.
    pub fn trees(&self) -> &[MetadataTree] {
        &self.trees
    }

    /// Registered assets.
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Reference counts found when the session was opened.
    pub fn references(&self) -> ReferenceStats {
        self.references
    }

    /// Recoverable failures so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Settings the stages run with.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Resize decision for every asset, without touching anything.
    pub fn resize_plans(&self) -> Vec<(&ImageAsset, Option<ResizePlan>)> {
        let factor = self.settings.resize_safety_factor;
        self.registry
            .iter()
            .map(|asset| (asset, plan_asset(asset, factor).ok()))
            .collect()
    }

    /// Format selection over every convertible asset.
    pub fn convert_formats(&mut self, observer: &dyn StageObserver) -> StageReport {
        let settings = self.settings.clone();
        let report = self.run_stage(
            Stage::Convert,
            observer,
            |asset| is_convertible(asset, &settings),
            |asset| {
                let rename = convert_asset(asset, &settings)?;
                Ok((asset.size_converted() < asset.size_original(), rename))
            },
        );
        self.finish(report, observer)
    }

    /// Usage-aware downscaling of every raster asset.
    pub fn resize(&mut self, observer: &dyn StageObserver) -> StageReport {
        let settings = self.settings.clone();
        let report = self.run_stage(
            Stage::Resize,
            observer,
            |asset| asset.current_format().is_some_and(|f| f.is_resizable()),
            |asset| {
                let outcome = resize_asset(asset, &settings)?;
                Ok((matches!(outcome, ResizeOutcome::Resized { .. }), None))
            },
        );
        self.finish(report, observer)
    }

    /// Optimizer chain over every referenced asset.
    pub fn optimize(&mut self, observer: &dyn StageObserver) -> StageReport {
        let settings = self.settings.clone();
        let tools = self.tools.clone();
        let report = self.run_stage(
            Stage::Optimize,
            observer,
            ImageAsset::has_references,
            |asset| {
                let outcome = optimize_asset(asset, &settings, &tools)?;
                Ok((matches!(outcome, OptimizeOutcome::Accepted { .. }), None))
            },
        );
        self.finish(report, observer)
    }

    /// Run the three per-asset stages in order.
    pub fn run_all(&mut self, observer: &dyn StageObserver) -> [StageReport; 3] {
        [self.convert_formats(observer), self.resize(observer), self.optimize(observer)]
    }

    fn run_stage<E, W>(&mut self, stage: Stage, observer: &dyn StageObserver, eligible: E, work: W) -> StageReport
    where
        E: Fn(&ImageAsset) -> bool + Sync,
        W: Fn(&mut ImageAsset) -> Result<(bool, Option<Rename>)> + Sync,
    {
        let attempted = self.registry.iter().filter(|a| eligible(a)).count();
        observer.stage_started(stage, attempted);
        let _span = tracing::info_span!("stage", %stage).entered();

        let registry = &mut self.registry;
        let results: Vec<(AssetId, Result<(bool, Option<Rename>)>)> = self.pool.install(|| {
            registry
                .par_iter_mut()
                .filter(|asset| eligible(asset))
                .map(|asset| {
                    let result = work(asset);
                    debug_assert!(asset.sizes().is_monotonic(), "sizes grew for asset {asset}");
                    observer.asset_done(stage, asset);
                    (asset.identifier().clone(), result)
                })
                .collect()
        });

        let mut report = StageReport { stage, attempted, changed: 0, failed: 0 };
        for (identifier, result) in results {
            match result {
                Ok((changed, rename)) => {
                    report.changed += usize::from(changed);
                    if let Some(rename) = rename {
                        self.apply_rename(&rename);
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    self.diagnostics.push(Diagnostic::raise(&identifier, stage, &err));
                }
            }
        }
        report
    }

    fn finish(&mut self, report: StageReport, observer: &dyn StageObserver) -> StageReport {
        tracing::info!(
            stage = %report.stage,
            attempted = report.attempted,
            changed = report.changed,
            failed = report.failed,
            "stage finished"
        );
        observer.stage_finished(&report);
        self.stages.push(report);
        report
    }

    fn apply_rename(&mut self, rename: &Rename) {
        let applied = self
            .trees
            .get_mut(rename.origin.tree)
            .is_some_and(|tree| tree.rename_asset(rename.origin, &rename.preferred_file_name, &rename.file_name));
        if applied {
            tracing::debug!(asset = %rename.identifier, file_name = %rename.file_name, "metadata updated");
        } else {
            tracing::warn!(asset = %rename.identifier, "declaring record vanished, metadata not updated");
        }
    }

    /// Write back every tree that was modified. Returns how many were written.
    pub fn save(&mut self) -> Result<usize> {
        let mut saved = 0;
        for tree in self.trees.iter_mut().filter(|t| t.is_dirty()) {
            tree.save()?;
            saved += 1;
        }
        Ok(saved)
    }

    /// Sizes, totals and diagnostics as they stand now.
    pub fn report(&self) -> SessionReport {
        let totals = StageTotals::from_assets(self.registry.iter());
        SessionReport {
            assets: self.registry.iter().map(AssetReport::from).collect(),
            losses: totals.losses(),
            totals,
            references: self.references,
            stages: self.stages.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Every tree in `index` except the primary one, in file-name order.
fn secondary_trees(index: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(index)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    paths.retain(|p| p.file_name().is_none_or(|n| n != PRIMARY_TREE));
    paths
}
