//! Synthetic face-intensity recordings for demos and tests.

use crate::error::ConfigError;
use crate::signal::FrameObservation;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Upper bound on generated frames (about 46 hours at 60 fps).
pub const MAX_FRAMES: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticBreathing {
    /// Breathing rate in cycles per minute
    pub rate_cpm: f64,
    /// Camera frames per second
    pub frame_rate: f64,
    pub duration_s: f64,
    /// Mean channel intensity (0..255 scale)
    pub baseline: f64,
    pub amplitude: f64,
    /// Uniform noise half-range added to every frame
    pub noise: f64,
    /// Linear drift in intensity units per second
    pub drift_per_s: f64,
    /// Probability that a frame has no detected face
    pub dropout: f64,
    pub seed: u64,
}

impl Default for SyntheticBreathing {
    fn default() -> Self {
        Self {
            rate_cpm: 15.0,
            frame_rate: 30.0,
            duration_s: 60.0,
            baseline: 120.0,
            amplitude: 1.5,
            noise: 0.0,
            drift_per_s: 0.0,
            dropout: 0.0,
            seed: 0,
        }
    }
}

impl SyntheticBreathing {
    /// Reject parameters the generator cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("rate_cpm", self.rate_cpm),
            ("frame_rate", self.frame_rate),
            ("duration_s", self.duration_s),
            ("baseline", self.baseline),
            ("amplitude", self.amplitude),
            ("noise", self.noise),
            ("drift_per_s", self.drift_per_s),
            ("dropout", self.dropout),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::InvalidSimulation { name, value });
            }
        }
        if self.noise < 0.0 {
            return Err(ConfigError::InvalidSimulation {
                name: "noise",
                value: self.noise,
            });
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(ConfigError::InvalidSimulation {
                name: "dropout",
                value: self.dropout,
            });
        }
        let frames = self.duration_s * self.frame_rate;
        if self.frame_rate > 0.0 && self.duration_s > 0.0 && frames.round() > MAX_FRAMES as f64 {
            return Err(ConfigError::TooManyFrames {
                frames,
                limit: MAX_FRAMES,
            });
        }
        Ok(())
    }

    /// Frames the recording spans, capped at [`MAX_FRAMES`].
    pub fn frame_count(&self) -> usize {
        if !(self.frame_rate > 0.0) || !(self.duration_s > 0.0) {
            return 0;
        }
        let frames = (self.duration_s * self.frame_rate).round();
        if frames.is_finite() {
            (frames as usize).min(MAX_FRAMES)
        } else {
            0
        }
    }

    pub fn generate(&self) -> Result<Vec<FrameObservation>, ConfigError> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let breath_hz = self.rate_cpm / 60.0;
        // Random starting phase keeps crests off the frame grid.
        let phase = rng.gen_range(0.0..2.0 * PI);
        let frames = (0..self.frame_count())
            .map(|i| {
                let t = i as f64 / self.frame_rate;
                if self.dropout > 0.0 && rng.gen_bool(self.dropout) {
                    return FrameObservation::missing(t);
                }
                let jitter = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..=self.noise)
                } else {
                    0.0
                };
                let value = self.baseline
                    + self.drift_per_s * t
                    + self.amplitude * (2.0 * PI * breath_hz * t + phase).cos()
                    + jitter;
                FrameObservation::found(t, value)
            })
            .collect();
        Ok(frames)
    }
}
