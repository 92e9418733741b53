use crate::queue::{JobQueue, JobReceiver};
use persistence_layer::StatusStore;
use portfolio_core::{FetchError, JobRequest, PortfolioFetcher, StatusRecord};
use retry_utils::{GiveUpReason, RequestPacer, RetryDecision, RetryPolicy, RetryableError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What happened to a job after one pass through the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Retried { retry_count: u32 },
    Failed { reason: GiveUpReason },
}

/// Map a fetch failure onto the retry classification
pub fn classify_fetch_error(policy: &RetryPolicy, err: &FetchError) -> RetryableError {
    match err {
        FetchError::Upstream {
            status: Some(status),
            ..
        } => policy.classify_status(*status),
        FetchError::Upstream { status: None, .. } => RetryableError::Transport,
        FetchError::Timeout(_) => RetryableError::Timeout,
        FetchError::MalformedPayload(_) => RetryableError::Malformed,
    }
}

/// The only consumer of the job queue and the only caller of the fetcher.
///
/// Jobs are handled strictly one at a time and every handled job is followed
/// by the pacer's interval, so upstream calls never exceed the configured
/// rate whatever the outcome.
pub struct RateLimitedWorker {
    fetcher: Arc<dyn PortfolioFetcher>,
    store: Arc<dyn StatusStore>,
    queue: JobQueue,
    receiver: JobReceiver,
    policy: RetryPolicy,
    pacer: RequestPacer,
}

impl RateLimitedWorker {
    pub fn new(
        fetcher: Arc<dyn PortfolioFetcher>,
        store: Arc<dyn StatusStore>,
        queue: JobQueue,
        receiver: JobReceiver,
        policy: RetryPolicy,
        pacer: RequestPacer,
    ) -> Self {
        Self {
            fetcher,
            store,
            queue,
            receiver,
            policy,
            pacer,
        }
    }

    /// Run the loop on a background task. Dropping the returned handle stops
    /// the worker the same way `WorkerHandle::shutdown` does, without waiting.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        WorkerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Consume jobs until shutdown is signalled or the shutdown sender is dropped.
    ///
    /// The worker holds a producer of its own queue for retries, so the
    /// channel never closes underneath it.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "🚀 Worker started: one upstream request every {}ms, up to {} retries",
            self.pacer.interval().as_millis(),
            self.policy.max_retries
        );

        loop {
            let job = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                job = self.receiver.dequeue() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.handle_job(job).await;

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = self.pacer.pause() => {}
            }
        }

        info!("Worker stopped");
    }

    /// Fetch once and transition the job: complete it, requeue it, or fail it
    pub async fn handle_job(&self, mut job: JobRequest) -> JobOutcome {
        let key = job.key().encode();
        debug!(
            "Processing job {} for chain {} (retry {})",
            job.request_id, job.chain_id, job.retry_count
        );

        let err = match self.fetcher.fetch(job.chain_id, &job.address).await {
            Ok(portfolio) => {
                info!(
                    "✅ Job {} completed: {} positions on chain {}",
                    job.request_id,
                    portfolio.positions.len(),
                    job.chain_id
                );
                self.write(&key, StatusRecord::completed(portfolio)).await;
                return JobOutcome::Completed;
            }
            Err(err) => err,
        };

        let kind = classify_fetch_error(&self.policy, &err);
        match self.policy.decide(job.retry_count, kind) {
            RetryDecision::Retry { retry_count } => {
                warn!(
                    "⚠️ Job {} on chain {} failed ({}), retry {}/{}",
                    job.request_id, job.chain_id, err, retry_count, self.policy.max_retries
                );
                job.retry_count = retry_count;
                match self.queue.requeue(job) {
                    Ok(_) => JobOutcome::Retried { retry_count },
                    Err(queue_err) => {
                        error!("❌ Could not requeue job for {}: {}", key, queue_err);
                        self.write(&key, StatusRecord::failed(err.public_message()))
                            .await;
                        JobOutcome::Failed {
                            reason: GiveUpReason::QueueClosed,
                        }
                    }
                }
            }
            RetryDecision::GiveUp(reason) => {
                error!(
                    "❌ Job {} on chain {} failed after {} attempts ({:?}): {}",
                    job.request_id,
                    job.chain_id,
                    job.retry_count + 1,
                    reason,
                    err
                );
                self.write(&key, StatusRecord::failed(err.public_message()))
                    .await;
                JobOutcome::Failed { reason }
            }
        }
    }

    async fn write(&self, key: &str, record: StatusRecord) {
        // A lost write leaves the record queued; the aggregator reports it stale later
        if let Err(e) = self.store.put(key, &record).await {
            error!(
                "❌ Failed to store {} record for {}: {}",
                record.status.as_str(),
                key,
                e
            );
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Control handle for a spawned worker
#[must_use = "dropping the handle stops the worker"]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop after the job in flight and wait for it
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Worker task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_fetch_error() {
        let policy = RetryPolicy::default();

        let upstream = |status| FetchError::Upstream {
            status,
            message: String::new(),
        };

        assert_eq!(
            classify_fetch_error(&policy, &upstream(Some(503))),
            RetryableError::ServerError
        );
        assert_eq!(
            classify_fetch_error(&policy, &upstream(Some(429))),
            RetryableError::RateLimit
        );
        assert_eq!(
            classify_fetch_error(&policy, &upstream(Some(404))),
            RetryableError::Permanent
        );
        assert_eq!(
            classify_fetch_error(&policy, &upstream(Some(418))),
            RetryableError::ClientError
        );
        assert_eq!(
            classify_fetch_error(&policy, &upstream(None)),
            RetryableError::Transport
        );
        assert_eq!(
            classify_fetch_error(&policy, &FetchError::Timeout(Duration::from_secs(30))),
            RetryableError::Timeout
        );
        assert_eq!(
            classify_fetch_error(&policy, &FetchError::MalformedPayload("eof".to_string())),
            RetryableError::Malformed
        );
    }
}
