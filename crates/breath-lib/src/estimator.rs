//! Smoother -> normalizer -> peak detector -> rate calculator over one snapshot.

use crate::{
    config::EstimatorConfig,
    detectors::find_peaks,
    filters::{normalize, smooth},
    metrics::{
        rate::{rate_for_snapshot, sample_rate_for},
        sqi::{evaluate_quality, QualityReport},
        RateEstimate,
    },
    signal::{Peaks, Snapshot},
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Outcome of one estimator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateReport {
    pub sample_count: usize,
    /// Seconds covered by the analyzed window.
    pub span_s: f64,
    /// Mean frame rate over the window; 1.0 under the sample-index basis.
    pub samples_per_second: Option<f64>,
    pub peaks: Peaks,
    pub estimate: RateEstimate,
    pub quality: QualityReport,
}

/// Intermediate series kept for diagnostics and plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub raw: Vec<f64>,
    pub smoothed: Vec<f64>,
    pub normalized: Vec<f64>,
    pub report: EstimateReport,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateEstimator {
    cfg: EstimatorConfig,
}

impl RateEstimator {
    pub fn new(cfg: EstimatorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.cfg
    }

    pub fn estimate(&self, snapshot: &Snapshot) -> EstimateReport {
        self.analyze(snapshot).report
    }

    pub fn analyze(&self, snapshot: &Snapshot) -> Analysis {
        let raw = snapshot.intensities();
        let smoothed = smooth(&raw, self.cfg.half_width);
        let normalized = normalize(&smoothed, self.cfg.normalization);
        let peaks = find_peaks(&normalized, self.cfg.peak_threshold);
        let estimate = rate_for_snapshot(&peaks, snapshot, self.cfg.rate_basis);
        let sps = sample_rate_for(snapshot, self.cfg.rate_basis);
        let quality = evaluate_quality(
            &smoothed,
            &peaks,
            snapshot.samples_per_second(),
            self.cfg.band_min_hz,
            self.cfg.band_max_hz,
        );
        debug!(
            "estimated over {} samples: {} peaks, {:?}",
            snapshot.len(),
            peaks.len(),
            estimate
        );
        let report = EstimateReport {
            sample_count: snapshot.len(),
            span_s: snapshot.span(),
            samples_per_second: sps,
            peaks,
            estimate,
            quality,
        };
        Analysis {
            raw,
            smoothed,
            normalized,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Normalization, RateBasis};
    use crate::metrics::UndeterminedReason;
    use crate::signal::Sample;
    use std::f64::consts::PI;

    fn snapshot_of(values: &[f64], dt: f64) -> Snapshot {
        Snapshot::from_samples(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| Sample::new(i as f64 * dt, v))
                .collect(),
        )
    }

    fn sinusoid(n: usize, period: f64, offset: f64, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| offset + amp * (2.0 * PI * i as f64 / period).cos())
            .collect()
    }

    #[test]
    fn constant_series_is_undetermined() {
        let snap = snapshot_of(&[5.0; 60], 1.0);
        for normalization in [Normalization::None, Normalization::Zscore, Normalization::Detrend] {
            let cfg = EstimatorConfig {
                normalization,
                ..EstimatorConfig::default()
            };
            let report = RateEstimator::new(cfg).estimate(&snap);
            assert!(report.peaks.is_empty());
            assert_eq!(
                report.estimate,
                RateEstimate::Undetermined {
                    reason: UndeterminedReason::TooFewPeaks
                }
            );
        }
    }

    #[test]
    fn clean_sinusoid_at_one_sample_per_second() {
        let snap = snapshot_of(&sinusoid(150, 30.0, 0.0, 2.0), 1.0);
        for cfg in [EstimatorConfig::default(), EstimatorConfig::raw_units()] {
            let report = RateEstimator::new(cfg).estimate(&snap);
            assert!(report.peaks.len() >= 4, "{:?}", report.peaks);
            assert!(report
                .peaks
                .intervals()
                .iter()
                .all(|d| (d - 30.0).abs() <= 1.0));
            let cpm = report.estimate.cpm().expect("rate");
            assert!((cpm - 2.0).abs() < 0.05, "got {cpm}");
        }
    }

    #[test]
    fn timestamps_convert_to_real_rate() {
        // 30 fps, 15 breaths per minute, 40 s
        let fps = 30.0;
        let values = sinusoid(1200, fps * 4.0, 120.0, 1.5);
        let snap = snapshot_of(&values, 1.0 / fps);
        let cfg = EstimatorConfig::default();
        let report = RateEstimator::new(cfg).estimate(&snap);
        let cpm = report.estimate.cpm().expect("rate");
        assert!((cpm - 15.0).abs() < 0.2, "got {cpm}");
        let spectral = report.quality.spectral_cpm.expect("spectral");
        assert!((spectral - 15.0).abs() < 1.0, "got {spectral}");
        assert!(report.quality.is_acceptable());

        let by_index = RateEstimator::new(EstimatorConfig {
            rate_basis: RateBasis::SampleIndex,
            ..cfg
        })
        .estimate(&snap);
        assert!((by_index.estimate.cpm().expect("rate") - 0.5).abs() < 0.01);
    }

    #[test]
    fn raw_threshold_couples_to_channel_scale() {
        // oscillation that never reaches the raw threshold
        let values = sinusoid(150, 30.0, -100.0, 2.0);
        let snap = snapshot_of(&values, 1.0);
        let raw = RateEstimator::new(EstimatorConfig::raw_units()).estimate(&snap);
        assert!(raw.peaks.is_empty());
        let normalized = RateEstimator::new(EstimatorConfig::default()).estimate(&snap);
        assert!(normalized.estimate.is_determined());
    }

    #[test]
    fn repeated_estimates_are_identical() {
        let snap = snapshot_of(&sinusoid(200, 25.0, 80.0, 3.0), 0.5);
        let est = RateEstimator::default();
        assert_eq!(est.estimate(&snap), est.estimate(&snap));
    }

    #[test]
    fn analysis_series_share_length() {
        let snap = snapshot_of(&sinusoid(90, 20.0, 10.0, 1.0), 1.0);
        let analysis = RateEstimator::default().analyze(&snap);
        assert_eq!(analysis.raw.len(), 90);
        assert_eq!(analysis.smoothed.len(), 90);
        assert_eq!(analysis.normalized.len(), 90);
        assert_eq!(analysis.report.sample_count, 90);
    }
}
