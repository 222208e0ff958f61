use serde::{Deserialize, Serialize};

/// One intensity observation taken from an analyzed video frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds on a monotonic clock
    pub timestamp: f64,
    /// Mean of one color channel over the face region
    pub intensity: f64,
}

impl Sample {
    pub fn new(timestamp: f64, intensity: f64) -> Self {
        Self {
            timestamp,
            intensity,
        }
    }
}

/// What the camera/face-detection collaborator hands over for every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    pub timestamp: f64,
    pub region_found: bool,
    /// Only meaningful when `region_found` is true.
    pub intensity: Option<f64>,
}

impl FrameObservation {
    pub fn found(timestamp: f64, intensity: f64) -> Self {
        Self {
            timestamp,
            region_found: true,
            intensity: Some(intensity),
        }
    }

    pub fn missing(timestamp: f64) -> Self {
        Self {
            timestamp,
            region_found: false,
            intensity: None,
        }
    }

    /// The sample carried by this frame, if a face region was found.
    pub fn sample(&self) -> Option<Sample> {
        if !self.region_found {
            return None;
        }
        self.intensity
            .map(|intensity| Sample::new(self.timestamp, intensity))
    }
}

/// Immutable copy of the buffer contents taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub samples: Vec<Sample>,
}

impl Snapshot {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.intensity).collect()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// Seconds between the first and last sample.
    pub fn span(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// Mean sampling rate implied by the timestamps, `None` below two samples.
    pub fn samples_per_second(&self) -> Option<f64> {
        let span = self.span();
        if self.samples.len() < 2 || !(span > 0.0) {
            return None;
        }
        Some((self.samples.len() - 1) as f64 / span)
    }
}

/// Peak positions (indices into the analyzed series).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peaks {
    pub indices: Vec<usize>,
}

impl Peaks {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Distances between consecutive peaks, in samples.
    pub fn intervals(&self) -> Vec<f64> {
        self.indices
            .windows(2)
            .map(|w| w[1] as f64 - w[0] as f64)
            .collect()
    }
}
