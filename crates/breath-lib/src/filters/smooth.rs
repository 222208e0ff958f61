use crate::config::Normalization;

/// Centered moving average with half width `half_width`.
///
/// The window for index `i` is the inclusive range
/// `[max(0, i - half_width), min(len - 1, i + half_width)]`, so it shrinks near
/// both ends of the series instead of padding.
pub fn smooth(values: &[f64], half_width: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    if half_width == 0 {
        return values.to_vec();
    }
    let mut prefix = Vec::with_capacity(values.len() + 1);
    let mut acc = 0.0;
    prefix.push(acc);
    for &v in values {
        acc += v;
        prefix.push(acc);
    }
    let last = values.len() - 1;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half_width);
            let end = i.saturating_add(half_width).min(last);
            (prefix[end + 1] - prefix[start]) / (end - start + 1) as f64
        })
        .collect()
}

/// Rescale a series ahead of peak thresholding.
pub fn normalize(values: &[f64], policy: Normalization) -> Vec<f64> {
    match policy {
        Normalization::None => values.to_vec(),
        Normalization::Zscore => zscore(values),
        Normalization::Detrend => detrend(values),
    }
}

/// Zero mean, unit population variance. A flat series maps to zeros.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    if !(sd > 1e-12) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|x| (x - mean) / sd).collect()
}

/// Remove the least-squares line fitted against the sample index.
pub fn detrend(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    values
        .iter()
        .enumerate()
        .map(|(i, &y)| y - (y_mean + slope * (i as f64 - x_mean)))
        .collect()
}
