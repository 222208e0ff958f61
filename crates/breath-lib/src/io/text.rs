use crate::signal::FrameObservation;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited intensities, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited intensity series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Turn a plain series into frames, sample `i` at `i / fs` seconds.
pub fn frames_from_series(values: &[f64], fs: f64) -> Result<Vec<FrameObservation>> {
    if !(fs > 0.0) || !fs.is_finite() {
        anyhow::bail!("sampling rate must be positive, got {}", fs);
    }
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, &v)| FrameObservation::found(i as f64 / fs, v))
        .collect())
}
