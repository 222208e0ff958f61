//! Error types for the breathing-rate estimator.

/// Why a sample was refused by the buffer.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("intensity is not finite: {0}")]
    NonFiniteIntensity(f64),
    #[error("timestamp is not finite: {0}")]
    NonFiniteTimestamp(f64),
    #[error("timestamp {got} does not exceed last stored timestamp {last}")]
    NonMonotonicTimestamp { last: f64, got: f64 },
}

/// Invalid estimator configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("min_samples must be at least 1")]
    ZeroMinSamples,
    #[error("window capacity {capacity} is smaller than min_samples {min_samples}")]
    WindowTooSmall { capacity: usize, min_samples: usize },
    #[error("peak threshold must be finite, got {0}")]
    NonFiniteThreshold(f64),
    #[error("invalid respiration band {min_hz}..{max_hz} Hz")]
    InvalidBand { min_hz: f64, max_hz: f64 },
    #[error("invalid simulation parameter {name}: {value}")]
    InvalidSimulation { name: &'static str, value: f64 },
    #[error("simulation would produce {frames} frames, limit is {limit}")]
    TooManyFrames { frames: f64, limit: usize },
}

/// Errors surfaced by the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid sample: {0}")]
    InvalidSample(#[from] SampleError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("estimator worker is no longer running")]
    WorkerStopped,
}

/// Result type alias for estimator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
