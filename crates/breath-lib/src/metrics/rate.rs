use crate::config::RateBasis;
use crate::signal::{Peaks, Sample, Snapshot};
use serde::{Deserialize, Serialize};

/// Why no rate could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndeterminedReason {
    /// Fewer than two peaks, so no period exists.
    TooFewPeaks,
    /// Zero or non-finite average period / sample rate.
    DegeneratePeriod,
    /// Enough samples are held but no estimate has been published yet.
    Pending,
}

/// Breathing rate in cycles per minute, or an explicit "undetermined".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateEstimate {
    Rate { cpm: f64, peaks_used: usize },
    Undetermined { reason: UndeterminedReason },
}

impl RateEstimate {
    pub fn undetermined(reason: UndeterminedReason) -> Self {
        RateEstimate::Undetermined { reason }
    }

    pub fn cpm(&self) -> Option<f64> {
        match self {
            RateEstimate::Rate { cpm, .. } => Some(*cpm),
            RateEstimate::Undetermined { .. } => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        matches!(self, RateEstimate::Rate { .. })
    }
}

/// Convert peak positions into cycles per minute.
///
/// `samples_per_second` of 1.0 gives the plain `60 / avg_period` form.
pub fn rate(peaks: &Peaks, samples_per_second: f64) -> RateEstimate {
    if peaks.len() < 2 {
        return RateEstimate::undetermined(UndeterminedReason::TooFewPeaks);
    }
    let intervals = peaks.intervals();
    let avg_period = intervals.iter().sum::<f64>() / intervals.len() as f64;
    if !(avg_period > 0.0) || !avg_period.is_finite() {
        return RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod);
    }
    if !(samples_per_second > 0.0) || !samples_per_second.is_finite() {
        return RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod);
    }
    let cpm = 60.0 * samples_per_second / avg_period;
    if !cpm.is_finite() {
        return RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod);
    }
    RateEstimate::Rate {
        cpm,
        peaks_used: peaks.len(),
    }
}

/// Rate from the timestamps of the peak samples themselves.
///
/// The average period is `mean(t[p[k+1]] - t[p[k]])` in seconds, so frames
/// missing between or around the peaks do not bias the result.
pub fn timed_rate(peaks: &Peaks, samples: &[Sample]) -> RateEstimate {
    if peaks.len() < 2 {
        return RateEstimate::undetermined(UndeterminedReason::TooFewPeaks);
    }
    let times: Option<Vec<f64>> = peaks
        .indices
        .iter()
        .map(|&i| samples.get(i).map(|s| s.timestamp))
        .collect();
    let Some(times) = times else {
        return RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod);
    };
    let avg_period_s = (times[times.len() - 1] - times[0]) / (times.len() - 1) as f64;
    if !(avg_period_s > 0.0) || !avg_period_s.is_finite() {
        return RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod);
    }
    RateEstimate::Rate {
        cpm: 60.0 / avg_period_s,
        peaks_used: peaks.len(),
    }
}

/// Mean samples per second reported alongside an estimate.
pub fn sample_rate_for(snapshot: &Snapshot, basis: RateBasis) -> Option<f64> {
    match basis {
        RateBasis::SampleIndex => Some(1.0),
        RateBasis::Timestamps => snapshot.samples_per_second(),
    }
}

/// Rate for peaks found in `snapshot`, using the configured time basis.
pub fn rate_for_snapshot(peaks: &Peaks, snapshot: &Snapshot, basis: RateBasis) -> RateEstimate {
    match basis {
        RateBasis::SampleIndex => rate(peaks, 1.0),
        RateBasis::Timestamps => timed_rate(peaks, &snapshot.samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_two_peaks_is_undetermined() {
        for peaks in [vec![], vec![12]] {
            assert_eq!(
                rate(&Peaks::from_indices(peaks), 1.0),
                RateEstimate::undetermined(UndeterminedReason::TooFewPeaks)
            );
        }
    }

    #[test]
    fn sample_index_rate() {
        let peaks = Peaks::from_indices(vec![10, 40, 70, 100]);
        let est = rate(&peaks, 1.0);
        assert_eq!(
            est,
            RateEstimate::Rate {
                cpm: 2.0,
                peaks_used: 4
            }
        );
    }

    #[test]
    fn frame_rate_scales_rate() {
        // 30 fps, one peak every 120 frames = every 4 s = 15 cpm
        let peaks = Peaks::from_indices(vec![5, 125, 245]);
        let cpm = rate(&peaks, 30.0).cpm().expect("rate");
        assert!((cpm - 15.0).abs() < 1e-9);
    }

    #[test]
    fn zero_period_does_not_divide() {
        let peaks = Peaks::from_indices(vec![4, 4, 4]);
        assert_eq!(
            rate(&peaks, 1.0),
            RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod)
        );
        let ok_peaks = Peaks::from_indices(vec![1, 5]);
        assert!(!rate(&ok_peaks, 0.0).is_determined());
        assert!(!rate(&ok_peaks, f64::NAN).is_determined());
    }

    #[test]
    fn snapshot_basis_uses_timestamps() {
        let samples = (0..121).map(|i| Sample::new(i as f64 * 0.1, 0.0)).collect();
        let snap = Snapshot::from_samples(samples);
        let peaks = Peaks::from_indices(vec![10, 50, 90]);
        let by_time = rate_for_snapshot(&peaks, &snap, RateBasis::Timestamps)
            .cpm()
            .expect("rate");
        assert!((by_time - 15.0).abs() < 1e-9);
        let by_index = rate_for_snapshot(&peaks, &snap, RateBasis::SampleIndex)
            .cpm()
            .expect("rate");
        assert!((by_index - 1.5).abs() < 1e-9);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let js = serde_json::to_value(RateEstimate::undetermined(UndeterminedReason::TooFewPeaks))
            .expect("json");
        assert_eq!(js["kind"], "undetermined");
        assert_eq!(js["reason"], "too_few_peaks");
    }

    #[test]
    fn peak_timestamps_ignore_uneven_gaps() {
        // 10 fps, then nothing for 20 s, then 10 fps again; peaks every 4 s
        let mut samples: Vec<Sample> = (0..5).map(|i| Sample::new(i as f64 * 0.1, 0.0)).collect();
        samples.extend((0..200).map(|i| Sample::new(20.0 + i as f64 * 0.1, 0.0)));
        let snap = Snapshot::from_samples(samples);
        // t = 20, 24, 28, 32
        let peaks = Peaks::from_indices(vec![5, 45, 85, 125]);
        let cpm = rate_for_snapshot(&peaks, &snap, RateBasis::Timestamps)
            .cpm()
            .expect("rate");
        assert!((cpm - 15.0).abs() < 1e-9, "got {cpm}");
    }

    #[test]
    fn peak_outside_snapshot_is_degenerate() {
        let snap = Snapshot::from_samples(vec![Sample::new(0.0, 1.0), Sample::new(1.0, 1.0)]);
        assert_eq!(
            timed_rate(&Peaks::from_indices(vec![0, 7]), &snap.samples),
            RateEstimate::undetermined(UndeterminedReason::DegeneratePeriod)
        );
    }
}
