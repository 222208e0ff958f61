//! Collecting / Estimating state machine driven by one frame at a time.

use crate::{
    buffer::SampleBuffer,
    config::EstimatorConfig,
    error::{Result, SampleError},
    estimator::{EstimateReport, RateEstimator},
    metrics::RateEstimate,
    signal::{FrameObservation, Sample, Snapshot},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Collecting,
    Estimating,
}

/// What the display side receives after every processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Collecting { samples: usize, required: usize },
    Estimating { estimate: RateEstimate },
}

impl Status {
    pub fn state(&self) -> PipelineState {
        match self {
            Status::Collecting { .. } => PipelineState::Collecting,
            Status::Estimating { .. } => PipelineState::Estimating,
        }
    }

    pub fn cpm(&self) -> Option<f64> {
        match self {
            Status::Estimating { estimate } => estimate.cpm(),
            Status::Collecting { .. } => None,
        }
    }
}

/// How a single frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDisposition {
    Accepted,
    NoRegion,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameOutcome {
    pub timestamp: f64,
    pub disposition: FrameDisposition,
    #[serde(flatten)]
    pub status: Status,
}

/// Owns the sample buffer and republishes an estimate after every accepted sample.
#[derive(Debug, Clone)]
pub struct Pipeline {
    buffer: SampleBuffer,
    estimator: RateEstimator,
    min_samples: usize,
    latest: Option<EstimateReport>,
}

impl Pipeline {
    pub fn new(cfg: EstimatorConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            buffer: SampleBuffer::from_window(cfg.window_capacity),
            estimator: RateEstimator::new(cfg),
            min_samples: cfg.min_samples,
            latest: None,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        self.estimator.config()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn snapshot(&self) -> Snapshot {
        self.buffer.snapshot()
    }

    pub fn state(&self) -> PipelineState {
        if self.buffer.len() >= self.min_samples {
            PipelineState::Estimating
        } else {
            PipelineState::Collecting
        }
    }

    /// Last published report; `None` while collecting.
    pub fn latest(&self) -> Option<&EstimateReport> {
        self.latest.as_ref()
    }

    pub fn status(&self) -> Status {
        match (&self.latest, self.state()) {
            (Some(report), PipelineState::Estimating) => Status::Estimating {
                estimate: report.estimate,
            },
            _ => Status::Collecting {
                samples: self.buffer.len(),
                required: self.min_samples,
            },
        }
    }

    /// Append a sample and, once enough samples are held, re-run the estimator.
    pub fn push_sample(&mut self, sample: Sample) -> Result<Status, SampleError> {
        let was = self.state();
        self.buffer.append(sample)?;
        if self.state() == PipelineState::Estimating {
            if was == PipelineState::Collecting {
                info!(
                    "collected {} samples, starting estimation",
                    self.buffer.len()
                );
            }
            self.latest = Some(self.estimator.estimate(&self.buffer.snapshot()));
        }
        Ok(self.status())
    }

    /// Lenient entry point for the frame source: never fails, always reports a status.
    pub fn process_frame(&mut self, frame: &FrameObservation) -> FrameOutcome {
        let disposition = match frame.sample() {
            None => FrameDisposition::NoRegion,
            Some(sample) => match self.push_sample(sample) {
                Ok(_) => FrameDisposition::Accepted,
                Err(err) => {
                    warn!("dropping frame at t={}: {}", frame.timestamp, err);
                    FrameDisposition::Rejected
                }
            },
        };
        FrameOutcome {
            timestamp: frame.timestamp,
            disposition,
            status: self.status(),
        }
    }

    /// Recompute over the current buffer without appending anything.
    pub fn estimate(&self) -> Option<EstimateReport> {
        match self.state() {
            PipelineState::Collecting => None,
            PipelineState::Estimating => Some(self.estimator.estimate(&self.buffer.snapshot())),
        }
    }

    /// Start a new measurement session.
    pub fn reset(&mut self) {
        info!("resetting after {} samples", self.buffer.len());
        self.buffer.reset();
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::UndeterminedReason;
    use std::f64::consts::PI;

    fn breathing(i: usize) -> f64 {
        100.0 + 2.0 * (2.0 * PI * i as f64 / 30.0).cos()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(EstimatorConfig::default()).expect("valid config")
    }

    #[test]
    fn collecting_until_min_samples() {
        let mut p = pipeline();
        for i in 0..49 {
            let status = p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
            assert_eq!(
                status,
                Status::Collecting {
                    samples: i + 1,
                    required: 50
                }
            );
        }
        assert_eq!(p.state(), PipelineState::Collecting);
        assert!(p.latest().is_none());
        assert!(p.estimate().is_none());

        let status = p.push_sample(Sample::new(49.0, breathing(49))).unwrap();
        assert_eq!(status.state(), PipelineState::Estimating);
        assert!(p.latest().is_some());
    }

    #[test]
    fn constant_signal_reports_undetermined() {
        let mut p = pipeline();
        let mut status = p.status();
        for i in 0..60 {
            status = p.push_sample(Sample::new(i as f64, 5.0)).unwrap();
        }
        assert_eq!(
            status,
            Status::Estimating {
                estimate: RateEstimate::Undetermined {
                    reason: UndeterminedReason::TooFewPeaks
                }
            }
        );
    }

    #[test]
    fn sinusoid_reaches_two_cpm() {
        let mut p = pipeline();
        for i in 0..150 {
            p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
        }
        let cpm = p.status().cpm().expect("rate");
        assert!((cpm - 2.0).abs() < 0.05, "got {cpm}");
    }

    #[test]
    fn invalid_sample_leaves_state_untouched() {
        let mut p = pipeline();
        for i in 0..55 {
            p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
        }
        let before = p.latest().cloned();
        let err = p.push_sample(Sample::new(55.0, f64::NAN)).unwrap_err();
        assert!(matches!(err, SampleError::NonFiniteIntensity(_)));
        assert_eq!(p.buffer().len(), 55);
        assert_eq!(p.latest().cloned(), before);

        let outcome = p.process_frame(&FrameObservation::found(10.0, 1.0));
        assert_eq!(outcome.disposition, FrameDisposition::Rejected);
        assert_eq!(p.buffer().len(), 55);
    }

    #[test]
    fn frames_without_region_are_skipped() {
        let mut p = pipeline();
        let outcome = p.process_frame(&FrameObservation::missing(0.0));
        assert_eq!(outcome.disposition, FrameDisposition::NoRegion);
        assert!(p.buffer().is_empty());
        let outcome = p.process_frame(&FrameObservation::found(0.1, 90.0));
        assert_eq!(outcome.disposition, FrameDisposition::Accepted);
        assert_eq!(p.buffer().len(), 1);
    }

    #[test]
    fn estimate_is_idempotent() {
        let mut p = pipeline();
        for i in 0..120 {
            p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
        }
        let a = p.estimate().expect("estimating");
        let b = p.estimate().expect("estimating");
        assert_eq!(a.estimate, b.estimate);
        assert_eq!(Some(&a), p.latest());
    }

    #[test]
    fn reset_returns_to_collecting() {
        let mut p = pipeline();
        for i in 0..150 {
            p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
        }
        assert_eq!(p.state(), PipelineState::Estimating);
        p.reset();
        assert_eq!(p.state(), PipelineState::Collecting);
        assert!(p.buffer().is_empty());
        assert!(p.latest().is_none());

        // post-reset session: flat signal, timestamps restart at zero
        let mut status = p.status();
        for i in 0..50 {
            status = p.push_sample(Sample::new(i as f64, 7.0)).unwrap();
        }
        assert_eq!(p.latest().map(|r| r.sample_count), Some(50));
        assert!(status.cpm().is_none());
    }

    #[test]
    fn bounded_window_keeps_estimating() {
        let cfg = EstimatorConfig {
            window_capacity: Some(90),
            ..EstimatorConfig::default()
        };
        let mut p = Pipeline::new(cfg).unwrap();
        for i in 0..400 {
            p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
            assert!(p.buffer().len() <= 90);
        }
        assert_eq!(p.state(), PipelineState::Estimating);
        assert_eq!(p.latest().map(|r| r.sample_count), Some(90));
        assert!(p.status().cpm().is_some());
    }

    #[test]
    fn long_face_loss_keeps_real_rate() {
        // 30 fps at 15 cpm: a few frames, 20 s without a face, then 40 s of frames
        let at = |t: f64| 100.0 + 2.0 * (2.0 * PI * t / 4.0).cos();
        let mut p = pipeline();
        let times = (0..11)
            .map(|i| i as f64 / 30.0)
            .chain((0..1200).map(|i| 20.0 + i as f64 / 30.0));
        for t in times {
            p.push_sample(Sample::new(t, at(t))).unwrap();
        }
        let cpm = p.status().cpm().expect("rate");
        assert!((cpm - 15.0).abs() < 0.5, "got {cpm}");
    }

    #[test]
    fn huge_half_width_does_not_panic() {
        let cfg = EstimatorConfig {
            half_width: usize::MAX,
            ..EstimatorConfig::default()
        };
        let mut p = Pipeline::new(cfg).unwrap();
        for i in 0..60 {
            p.push_sample(Sample::new(i as f64, breathing(i))).unwrap();
        }
        // the window covers the whole series, which is flat after averaging
        assert_eq!(
            p.status(),
            Status::Estimating {
                estimate: RateEstimate::Undetermined {
                    reason: UndeterminedReason::TooFewPeaks
                }
            }
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = EstimatorConfig {
            min_samples: 0,
            ..EstimatorConfig::default()
        };
        assert!(Pipeline::new(cfg).is_err());
    }

    #[test]
    fn status_json_shape() {
        let js = serde_json::to_value(Status::Collecting {
            samples: 3,
            required: 50,
        })
        .unwrap();
        assert_eq!(js["status"], "collecting");
        assert_eq!(js["samples"], 3);
    }
}
