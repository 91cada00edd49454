//! Progress indicators
//!
//! Bars are drawn on stderr and hidden when it is not a terminal, so piped
//! output (e.g. `--json`) stays clean.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn visible() -> bool {
    console::Term::stderr().is_term()
}

/// Create a spinner for indeterminate progress
pub fn spinner(message: &str) -> ProgressBar {
    if !visible() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a bar for one pipeline stage over `total` images
pub fn stage_bar(total: u64, label: &str) -> ProgressBar {
    if !visible() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg:<10} [{bar:40.cyan/blue}] {pos}/{len} images ({elapsed})")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(label.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with a success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {message}"));
}

/// Finish a progress bar with an error message
pub fn finish_error(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✗ {message}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_lifecycle() {
        let pb = spinner("Unpacking");
        finish_success(&pb, "unpacked");
    }

    #[test]
    fn test_stage_bar_counts() {
        let pb = stage_bar(4, "resize");
        pb.inc(3);
        assert_eq!(pb.position(), 3);
        finish_error(&pb, "1 failed");
    }
}
