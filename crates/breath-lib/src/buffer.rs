use crate::error::SampleError;
use crate::signal::{Sample, Snapshot};
use std::collections::VecDeque;

/// Ordered intensity samples for one measurement session.
///
/// Unbounded by default. With a capacity the buffer behaves as a ring and
/// evicts the oldest sample once full, so re-estimation covers the most
/// recent `capacity` samples only.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: Option<usize>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded buffer. A zero capacity is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    pub fn from_window(capacity: Option<usize>) -> Self {
        match capacity {
            Some(cap) => Self::with_capacity(cap),
            None => Self::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Append one sample. A refused sample leaves the buffer untouched.
    pub fn append(&mut self, sample: Sample) -> Result<(), SampleError> {
        if !sample.intensity.is_finite() {
            return Err(SampleError::NonFiniteIntensity(sample.intensity));
        }
        if !sample.timestamp.is_finite() {
            return Err(SampleError::NonFiniteTimestamp(sample.timestamp));
        }
        if let Some(last) = self.samples.back() {
            if sample.timestamp <= last.timestamp {
                return Err(SampleError::NonMonotonicTimestamp {
                    last: last.timestamp,
                    got: sample.timestamp,
                });
            }
        }
        if let Some(cap) = self.capacity {
            if self.samples.len() == cap {
                self.samples.pop_front();
            }
        }
        self.samples.push_back(sample);
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_samples(self.samples.iter().copied().collect())
    }

    /// The most recent `n` samples, oldest first.
    pub fn snapshot_recent(&self, n: usize) -> Snapshot {
        let skip = self.samples.len().saturating_sub(n);
        Snapshot::from_samples(self.samples.iter().skip(skip).copied().collect())
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> SampleBuffer {
        let mut buf = SampleBuffer::new();
        for i in 0..n {
            buf.append(Sample::new(i as f64, 100.0 + i as f64)).unwrap();
        }
        buf
    }

    #[test]
    fn append_extends_snapshot_by_one() {
        let mut buf = filled(5);
        let before = buf.snapshot().len();
        let sample = Sample::new(10.0, 42.0);
        buf.append(sample).unwrap();
        let snap = buf.snapshot();
        assert_eq!(snap.len(), before + 1);
        assert_eq!(snap.samples.last(), Some(&sample));
    }

    #[test]
    fn nan_intensity_is_rejected() {
        let mut buf = filled(3);
        let err = buf.append(Sample::new(5.0, f64::NAN)).unwrap_err();
        assert!(matches!(err, SampleError::NonFiniteIntensity(v) if v.is_nan()));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn infinite_values_are_rejected() {
        let mut buf = SampleBuffer::new();
        assert!(buf.append(Sample::new(0.0, f64::INFINITY)).is_err());
        assert!(matches!(
            buf.append(Sample::new(f64::NAN, 1.0)),
            Err(SampleError::NonFiniteTimestamp(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn non_increasing_timestamp_is_rejected() {
        let mut buf = filled(3);
        assert_eq!(
            buf.append(Sample::new(2.0, 1.0)),
            Err(SampleError::NonMonotonicTimestamp { last: 2.0, got: 2.0 })
        );
        assert!(buf.append(Sample::new(1.5, 1.0)).is_err());
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.last().map(|s| s.timestamp), Some(2.0));
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let buf = filled(4);
        let a = buf.snapshot();
        let b = buf.snapshot();
        assert_eq!(a, b);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn bounded_buffer_evicts_oldest() {
        let mut buf = SampleBuffer::with_capacity(4);
        for i in 0..10 {
            buf.append(Sample::new(i as f64, i as f64)).unwrap();
            assert!(buf.len() <= 4);
        }
        assert_eq!(buf.snapshot().timestamps(), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn recent_window() {
        let buf = filled(6);
        assert_eq!(buf.snapshot_recent(2).timestamps(), vec![4.0, 5.0]);
        assert_eq!(buf.snapshot_recent(100).len(), 6);
    }

    #[test]
    fn reset_clears_timestamp_guard() {
        let mut buf = filled(8);
        buf.reset();
        assert!(buf.is_empty());
        buf.append(Sample::new(0.0, 1.0)).unwrap();
        assert_eq!(buf.len(), 1);
    }
}
