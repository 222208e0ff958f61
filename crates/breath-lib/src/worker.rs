//! Background estimation with a single-slot "latest result" holder.
//!
//! The producer hands snapshots to a worker thread over a bounded channel and
//! never waits for the computation. When the channel is full the submission is
//! dropped; the next append carries a newer snapshot anyway. Every submission is
//! tagged with the current generation, and `reset` bumps the generation so a
//! computation that started before the reset is never published.

use crate::{
    buffer::SampleBuffer,
    config::EstimatorConfig,
    error::{Error, Result, SampleError},
    estimator::{EstimateReport, RateEstimator},
    metrics::{RateEstimate, UndeterminedReason},
    pipeline::{FrameDisposition, FrameOutcome, PipelineState, Status},
    signal::{FrameObservation, Sample, Snapshot},
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

const QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Default)]
pub struct WorkerMetrics {
    pub submitted: AtomicU64,
    pub dropped_full: AtomicU64,
    pub coalesced: AtomicU64,
    pub computed: AtomicU64,
    pub discarded_stale: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub dropped_full: u64,
    pub coalesced: u64,
    pub computed: u64,
    pub discarded_stale: u64,
}

impl WorkerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            discarded_stale: self.discarded_stale.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub generation: u64,
    pub report: EstimateReport,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    latest: Option<Published>,
}

/// Shared single-slot holder. Generation changes and publication happen under
/// the same lock, so a stale result can never overwrite a reset.
#[derive(Debug, Clone, Default)]
pub struct LatestEstimate {
    slot: Arc<Mutex<Slot>>,
}

impl LatestEstimate {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn get(&self) -> Option<Published> {
        self.lock().latest.clone()
    }

    /// Publish unless `generation` is no longer current. Returns whether it was stored.
    fn publish(&self, generation: u64, report: EstimateReport) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation {
            return false;
        }
        slot.latest = Some(Published { generation, report });
        true
    }

    fn invalidate(&self) -> u64 {
        let mut slot = self.lock();
        slot.generation += 1;
        slot.latest = None;
        slot.generation
    }
}

enum Job {
    Estimate { generation: u64, snapshot: Snapshot },
    Flush(Sender<()>),
}

pub struct EstimatorWorker {
    job_tx: Option<Sender<Job>>,
    latest: LatestEstimate,
    metrics: Arc<WorkerMetrics>,
    handle: Option<JoinHandle<()>>,
}

impl EstimatorWorker {
    pub fn spawn(cfg: EstimatorConfig) -> Self {
        let (job_tx, job_rx) = bounded(QUEUE_CAPACITY);
        let latest = LatestEstimate::default();
        let metrics = Arc::new(WorkerMetrics::default());
        let worker_latest = latest.clone();
        let worker_metrics = metrics.clone();
        let handle = std::thread::spawn(move || {
            run_worker(
                RateEstimator::new(cfg),
                job_rx,
                worker_latest,
                worker_metrics,
            )
        });
        Self {
            job_tx: Some(job_tx),
            latest,
            metrics,
            handle: Some(handle),
        }
    }

    /// Queue a snapshot without blocking. Returns false when it was dropped.
    pub fn submit(&self, snapshot: Snapshot) -> bool {
        let Some(tx) = self.job_tx.as_ref() else {
            return false;
        };
        self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
        let job = Job::Estimate {
            generation: self.latest.generation(),
            snapshot,
        };
        match tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.dropped_full.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("estimator worker stopped, snapshot dropped");
                false
            }
        }
    }

    /// Queue a snapshot, waiting for room in the channel.
    pub fn submit_wait(&self, snapshot: Snapshot) -> Result<()> {
        let tx = self.job_tx.as_ref().ok_or(Error::WorkerStopped)?;
        self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
        let job = Job::Estimate {
            generation: self.latest.generation(),
            snapshot,
        };
        tx.send(job).map_err(|_| Error::WorkerStopped)
    }

    /// Block until every job queued so far has been handled.
    pub fn flush(&self) -> Result<()> {
        let tx = self.job_tx.as_ref().ok_or(Error::WorkerStopped)?;
        let (ack_tx, ack_rx) = bounded(1);
        tx.send(Job::Flush(ack_tx))
            .map_err(|_| Error::WorkerStopped)?;
        ack_rx.recv().map_err(|_| Error::WorkerStopped)
    }

    /// Discard the published estimate and anything still in flight.
    pub fn invalidate(&self) -> u64 {
        self.latest.invalidate()
    }

    pub fn latest(&self) -> Option<Published> {
        self.latest.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // closing the channel ends the worker loop
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("estimator worker panicked");
            }
        }
    }
}

impl Drop for EstimatorWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    estimator: RateEstimator,
    jobs: Receiver<Job>,
    latest: LatestEstimate,
    metrics: Arc<WorkerMetrics>,
) {
    while let Ok(job) = jobs.recv() {
        let mut pending = None;
        let mut acks = Vec::new();
        match job {
            Job::Estimate {
                generation,
                snapshot,
            } => pending = Some((generation, snapshot)),
            Job::Flush(ack) => acks.push(ack),
        }
        // only the newest queued snapshot is worth computing
        while let Ok(next) = jobs.try_recv() {
            match next {
                Job::Estimate {
                    generation,
                    snapshot,
                } => {
                    if pending.is_some() {
                        metrics.coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                    pending = Some((generation, snapshot));
                }
                Job::Flush(ack) => acks.push(ack),
            }
        }
        if let Some((generation, snapshot)) = pending {
            let report = estimator.estimate(&snapshot);
            metrics.computed.fetch_add(1, Ordering::Relaxed);
            if !latest.publish(generation, report) {
                metrics.discarded_stale.fetch_add(1, Ordering::Relaxed);
                debug!("discarding estimate from generation {}", generation);
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
    debug!("estimator worker exiting");
}

/// Pipeline variant that offloads estimation to an [`EstimatorWorker`].
pub struct AsyncPipeline {
    buffer: SampleBuffer,
    min_samples: usize,
    worker: EstimatorWorker,
}

impl AsyncPipeline {
    pub fn new(cfg: EstimatorConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            buffer: SampleBuffer::from_window(cfg.window_capacity),
            min_samples: cfg.min_samples,
            worker: EstimatorWorker::spawn(cfg),
        })
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn worker(&self) -> &EstimatorWorker {
        &self.worker
    }

    pub fn state(&self) -> PipelineState {
        if self.buffer.len() >= self.min_samples {
            PipelineState::Estimating
        } else {
            PipelineState::Collecting
        }
    }

    pub fn status(&self) -> Status {
        match self.state() {
            PipelineState::Collecting => Status::Collecting {
                samples: self.buffer.len(),
                required: self.min_samples,
            },
            PipelineState::Estimating => Status::Estimating {
                estimate: self
                    .worker
                    .latest()
                    .map(|published| published.report.estimate)
                    .unwrap_or(RateEstimate::Undetermined {
                        reason: UndeterminedReason::Pending,
                    }),
            },
        }
    }

    pub fn push_sample(&mut self, sample: Sample) -> Result<Status, SampleError> {
        self.buffer.append(sample)?;
        if self.state() == PipelineState::Estimating {
            self.worker.submit(self.buffer.snapshot());
        }
        Ok(self.status())
    }

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

    /// Wait until the estimate for the current buffer has been published.
    pub fn flush(&self) -> Result<()> {
        if self.state() == PipelineState::Estimating {
            self.worker.submit_wait(self.buffer.snapshot())?;
        }
        self.worker.flush()
    }

    pub fn reset(&mut self) {
        info!("resetting after {} samples", self.buffer.len());
        self.buffer.reset();
        self.worker.invalidate();
    }
}
