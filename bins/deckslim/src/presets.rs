//! Quality presets and command-line overrides of the pipeline settings.

use crate::SlimArgs;
use deckslim_core::config::PipelineSettings;

/// Values a `-q` level sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub resize_safety_factor: f64,
    pub jpeg_quality: u8,
    pub enable_lossy_png_to_jpeg: bool,
}

/// Preset for a level; level 0 (and anything unknown) changes nothing.
pub fn preset(level: u8) -> Option<Preset> {
    let (resize_safety_factor, jpeg_quality) = match level {
        1 => (2.0, 80),
        2 => (1.5, 75),
        3 => (1.0, 70),
        _ => return None,
    };
    Some(Preset { resize_safety_factor, jpeg_quality, enable_lossy_png_to_jpeg: true })
}

/// Layer the preset and then explicit flags over the configured settings.
pub fn apply(settings: &mut PipelineSettings, args: &SlimArgs) {
    if let Some(p) = args.preset.and_then(preset) {
        settings.resize_safety_factor = p.resize_safety_factor;
        settings.jpeg_quality = p.jpeg_quality;
        settings.enable_lossy_png_to_jpeg = p.enable_lossy_png_to_jpeg;
    }
    if let Some(factor) = args.resize_factor {
        settings.resize_safety_factor = factor;
    }
    if let Some(quality) = args.jpeg_quality {
        settings.jpeg_quality = quality;
    }
    if args.png_convert {
        settings.enable_lossy_png_to_jpeg = true;
    }
    if let Some(jobs) = args.jobs {
        settings.jobs = jobs;
    }
}

/// Settings that visibly cost quality.
pub fn warnings(settings: &PipelineSettings) -> Vec<String> {
    let mut warnings = Vec::new();
    if settings.resize_safety_factor < 2.0 {
        warnings.push(format!(
            "resize factor {} may look soft on high-density displays or when zooming",
            settings.resize_safety_factor
        ));
    }
    if settings.jpeg_quality < 80 {
        warnings.push(format!("JPEG quality {} may show compression artifacts", settings.jpeg_quality));
    }
    warnings
}
