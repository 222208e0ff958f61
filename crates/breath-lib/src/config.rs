//! Estimator configuration.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Samples required before the first estimate is attempted
pub const MIN_SAMPLES: usize = 50;
/// Half width of the centered moving average (7-wide window)
pub const SMOOTH_HALF_WIDTH: usize = 3;
/// Peak amplitude threshold, compared after normalization
pub const PEAK_THRESHOLD: f64 = 0.5;
/// Respiration band used by the spectral cross-check (Hz)
const BAND_MIN_HZ: f64 = 0.1;
const BAND_MAX_HZ: f64 = 0.7;

/// How the smoothed series is scaled before the peak threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Threshold is compared against raw channel units.
    None,
    /// Zero mean, unit variance; threshold is in standard deviations.
    #[default]
    Zscore,
    /// Least-squares line removed; threshold stays in channel units.
    Detrend,
}

/// Time base used to turn a peak period into cycles per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateBasis {
    /// Sample rate derived from the snapshot timestamps.
    #[default]
    Timestamps,
    /// One sample per time unit, i.e. `rate = 60 / avg_period`.
    SampleIndex,
}

/// Tunables for the smoothing / peak / rate chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub min_samples: usize,
    pub half_width: usize,
    pub peak_threshold: f64,
    pub normalization: Normalization,
    pub rate_basis: RateBasis,
    /// Ring-buffer capacity; unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_capacity: Option<usize>,
    pub band_min_hz: f64,
    pub band_max_hz: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
            half_width: SMOOTH_HALF_WIDTH,
            peak_threshold: PEAK_THRESHOLD,
            normalization: Normalization::default(),
            rate_basis: RateBasis::default(),
            window_capacity: None,
            band_min_hz: BAND_MIN_HZ,
            band_max_hz: BAND_MAX_HZ,
        }
    }
}

impl EstimatorConfig {
    /// Threshold in raw channel units, one sample per time unit: `rate = 60 / avg_period`.
    pub fn raw_units() -> Self {
        Self {
            normalization: Normalization::None,
            rate_basis: RateBasis::SampleIndex,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_samples == 0 {
            return Err(ConfigError::ZeroMinSamples);
        }
        if let Some(capacity) = self.window_capacity {
            if capacity < self.min_samples {
                return Err(ConfigError::WindowTooSmall {
                    capacity,
                    min_samples: self.min_samples,
                });
            }
        }
        if !self.peak_threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold(self.peak_threshold));
        }
        let band_ok = self.band_min_hz.is_finite()
            && self.band_max_hz.is_finite()
            && self.band_min_hz >= 0.0
            && self.band_min_hz < self.band_max_hz;
        if !band_ok {
            return Err(ConfigError::InvalidBand {
                min_hz: self.band_min_hz,
                max_hz: self.band_max_hz,
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document; missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: EstimatorConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}
