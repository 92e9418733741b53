use portfolio_core::JobRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("Job queue is closed")]
    Closed,
}

impl QueueError {
    /// Message stored on the status record of a job that could not be queued
    pub fn public_message(&self) -> &'static str {
        match self {
            QueueError::QueueFull { .. } => "Job queue is full",
            QueueError::Closed => "Job queue is closed",
        }
    }
}

/// Create a connected producer/consumer pair.
///
/// `capacity` bounds fresh submissions only; retries pushed with
/// [`JobQueue::requeue`] are always accepted.
pub fn job_queue(capacity: Option<usize>) -> (JobQueue, JobReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    (
        JobQueue {
            sender,
            depth: depth.clone(),
            capacity,
        },
        JobReceiver { receiver, depth },
    )
}

/// Producer side of the FIFO job queue
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<JobRequest>,
    depth: Arc<AtomicUsize>,
    capacity: Option<usize>,
}

impl JobQueue {
    /// Append a new job at the tail. Returns as soon as the job is queued.
    pub fn enqueue(&self, job: JobRequest) -> Result<Uuid, QueueError> {
        if let Some(capacity) = self.capacity {
            self.depth
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                    (depth < capacity).then_some(depth + 1)
                })
                .map_err(|_| QueueError::QueueFull { capacity })?;
        } else {
            self.depth.fetch_add(1, Ordering::AcqRel);
        }

        self.push(job)
    }

    /// Append a retried job at the tail, bypassing the capacity limit
    pub fn requeue(&self, job: JobRequest) -> Result<Uuid, QueueError> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.push(job)
    }

    fn push(&self, job: JobRequest) -> Result<Uuid, QueueError> {
        let request_id = job.request_id;
        let chain_id = job.chain_id;
        let retry_count = job.retry_count;

        if self.sender.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::Closed);
        }

        debug!(
            "Queued job {} for chain {} (retry {}), depth {}",
            request_id,
            chain_id,
            retry_count,
            self.len()
        );
        Ok(request_id)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// Single consumer side of the job queue
#[derive(Debug)]
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<JobRequest>,
    depth: Arc<AtomicUsize>,
}

impl JobReceiver {
    /// Wait for the next job. `None` once every producer is gone.
    pub async fn dequeue(&mut self) -> Option<JobRequest> {
        let job = self.receiver.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(job)
    }

    /// Take the next job without waiting
    pub fn try_dequeue(&mut self) -> Option<JobRequest> {
        let job = self.receiver.try_recv().ok()?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(job)
    }
}
