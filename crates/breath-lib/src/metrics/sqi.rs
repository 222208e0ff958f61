use crate::filters::detrend;
use crate::signal::Peaks;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// Largest peak-interval coefficient of variation still treated as regular breathing.
const MAX_INTERVAL_CV: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub peaks: usize,
    /// Coefficient of variation of the peak-to-peak intervals.
    pub interval_cv: f64,
    /// Shannon entropy (bits) of the normalized power spectrum.
    pub spectral_entropy: f64,
    /// Dominant frequency inside the respiration band, in cycles per minute.
    pub spectral_cpm: Option<f64>,
}

impl QualityReport {
    pub fn is_acceptable(&self) -> bool {
        self.peaks >= 2 && self.interval_cv <= MAX_INTERVAL_CV
    }
}

pub fn interval_cv(peaks: &Peaks) -> f64 {
    let intervals = peaks.intervals();
    if intervals.is_empty() {
        return 0.0;
    }
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let sd = (intervals.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
        / intervals.len() as f64)
        .sqrt();
    sd / mean
}

fn power_spectrum(data: &[f64]) -> Option<Vec<f64>> {
    let n = data.len();
    if n < 2 {
        return None;
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer = detrend(data);
    let mut spectrum = fft.make_output_vec();
    fft.process(&mut buffer, &mut spectrum).ok()?;
    Some(spectrum.iter().map(|c| c.norm_sqr()).collect())
}

/// Shannon entropy (bits) of a power spectrum normalized to unit sum.
fn entropy_of(powers: &[f64]) -> f64 {
    let total_power: f64 = powers.iter().sum();
    if total_power == 0.0 {
        return 0.0;
    }
    let mut entropy = 0.0;
    for &power in powers {
        if power <= 0.0 {
            continue;
        }
        let p = power / total_power;
        entropy -= p * p.log2();
    }
    entropy
}

/// Frequency of the strongest bin within `[min_hz, max_hz]`, in cpm, for a
/// spectrum of an `n`-sample series at `fs` Hz.
fn dominant_in(powers: &[f64], n: usize, fs: f64, min_hz: f64, max_hz: f64) -> Option<f64> {
    let bin_hz = fs / n as f64;
    let (best_bin, best_power) = powers
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(k, _)| {
            let f = *k as f64 * bin_hz;
            f >= min_hz && f <= max_hz
        })
        .fold((0usize, 0.0f64), |best, (k, &p)| if p > best.1 { (k, p) } else { best });
    if best_bin == 0 || best_power <= 0.0 {
        return None;
    }
    // parabolic interpolation between neighboring bins
    let mut offset = 0.0;
    if best_bin + 1 < powers.len() {
        let (a, b, c) = (powers[best_bin - 1], best_power, powers[best_bin + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f64::EPSILON {
            offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        }
    }
    Some((best_bin as f64 + offset) * bin_hz * 60.0)
}

pub fn evaluate_quality(
    series: &[f64],
    peaks: &Peaks,
    fs: Option<f64>,
    band_min_hz: f64,
    band_max_hz: f64,
) -> QualityReport {
    let powers = power_spectrum(series);
    let spectral_cpm = match (&powers, fs) {
        (Some(powers), Some(fs)) if fs > 0.0 => {
            dominant_in(powers, series.len(), fs, band_min_hz, band_max_hz)
        }
        _ => None,
    };
    QualityReport {
        peaks: peaks.len(),
        interval_cv: interval_cv(peaks),
        spectral_entropy: powers.as_deref().map(entropy_of).unwrap_or(0.0),
        spectral_cpm,
    }
}
