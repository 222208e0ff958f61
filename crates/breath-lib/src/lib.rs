//! Breathing-rate estimation from per-frame face-region intensity samples.

pub mod buffer;
pub mod config;
pub mod detectors;
pub mod error;
pub mod estimator;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod simulate;
pub mod worker;

pub use buffer::SampleBuffer;
pub use config::{EstimatorConfig, Normalization, RateBasis};
pub use detectors::*;
pub use error::{ConfigError, Error, Result, SampleError};
pub use estimator::{Analysis, EstimateReport, RateEstimator};
pub use filters::*;
pub use metrics::*;
pub use pipeline::{FrameDisposition, FrameOutcome, Pipeline, PipelineState, Status};
pub use signal::*;
pub use worker::{AsyncPipeline, EstimatorWorker, LatestEstimate, Published};
