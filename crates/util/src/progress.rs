//! Progress reporting for long-running tools.

use tracing::info;

/// Tracing target carrying progress events.
pub const PROGRESS_TARGET: &str = "vretool::progress";

/// Emits a progress event for `tool`; `percent` is clamped to `0..=100`.
pub fn report_progress(tool: &str, percent: f64) -> f64 {
    let percent = clamp_percent(percent);
    info!(target: PROGRESS_TARGET, tool, percent, "progress");
    percent
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) }
}
