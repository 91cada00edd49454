//! CLI command implementations

pub mod inspect;
pub mod slim;

use deckslim_cli::progress;
use deckslim_image::{ImageAsset, ImageError, Stage, StageObserver, StageReport};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Turn a pipeline error into a CLI error that keeps its exit code.
pub(crate) fn fatal(err: ImageError) -> anyhow::Error {
    deckslim_core::Error::from(err).into()
}

/// Unpacked working tree, removed when dropped unless kept.
pub(crate) struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    /// Reserve a fresh, short, random directory name under `parent`.
    ///
    /// Names already taken are skipped, so an existing directory is never
    /// adopted and later removed.
    pub(crate) fn reserve(parent: &Path, keep: bool) -> Self {
        Self::reserve_with(parent, keep, short_id)
    }

    fn reserve_with(parent: &Path, keep: bool, mut next_name: impl FnMut() -> String) -> Self {
        loop {
            let path = parent.join(next_name());
            if !path.exists() {
                return Self { path, keep };
            }
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn is_kept(&self) -> bool {
        self.keep
    }
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed work directory"),
            Err(e) => tracing::warn!(path = %self.path.display(), "could not remove work directory: {e}"),
        }
    }
}

/// Draws one progress bar per stage.
pub(crate) struct BarObserver {
    bar: Mutex<ProgressBar>,
    quiet: bool,
}

impl BarObserver {
    pub(crate) fn new(quiet: bool) -> Self {
        Self { bar: Mutex::new(ProgressBar::hidden()), quiet }
    }
}

impl StageObserver for BarObserver {
    fn stage_started(&self, stage: Stage, assets: usize) {
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            progress::stage_bar(assets as u64, &stage.to_string())
        };
        if let Ok(mut slot) = self.bar.lock() {
            *slot = bar;
        }
    }

    fn asset_done(&self, _stage: Stage, _asset: &ImageAsset) {
        if let Ok(bar) = self.bar.lock() {
            bar.inc(1);
        }
    }

    fn stage_finished(&self, report: &StageReport) {
        let Ok(bar) = self.bar.lock() else {
            return;
        };
        let message = format!("{:<10} {} of {} changed", report.stage, report.changed, report.attempted);
        if report.failed == 0 {
            progress::finish_success(&bar, &message);
        } else {
            progress::finish_error(&bar, &format!("{message}, {} failed", report.failed));
        }
    }
}
