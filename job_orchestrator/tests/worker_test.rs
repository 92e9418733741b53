mod common;

use common::*;
use job_orchestrator::{job_queue, JobOutcome, OrchestratorError, RateLimitedWorker};
use persistence_layer::{MemoryStatusStore, StatusStore};
use portfolio_core::{JobRequest, JobStatus};
use retry_utils::{GiveUpReason, RequestPacer, RetryPolicy};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_worker() {
    let Pipeline {
        service,
        worker,
        fetcher,
        ..
    } = start_pipeline(ScriptedFetcher::new(Script::Value(dec!(1))), &[1, 10], settings(10));

    service.submit_one(1, WALLET).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    drop(worker);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        service.submit_one(10, WALLET).await,
        Err(OrchestratorError::QueueClosed)
    );
    assert_eq!(fetcher.call_order(), vec![1]);
}

#[tokio::test]
async fn test_retry_onto_closed_queue_fails_the_job() {
    let store = Arc::new(MemoryStatusStore::new());
    let fetcher = Arc::new(ScriptedFetcher::new(Script::Status(503)));

    // Retries go to a queue nobody consumes any more
    let (closed_queue, closed_receiver) = job_queue(None);
    drop(closed_receiver);
    let (_queue, receiver) = job_queue(None);

    let worker = RateLimitedWorker::new(
        fetcher.clone(),
        store.clone(),
        closed_queue,
        receiver,
        RetryPolicy::default(),
        RequestPacer::per_second(10),
    );

    let job = JobRequest::new(137, WALLET);
    let key = job.key().encode();

    let outcome = worker.handle_job(job).await;
    assert_eq!(
        outcome,
        JobOutcome::Failed {
            reason: GiveUpReason::QueueClosed
        }
    );
    assert_eq!(fetcher.calls_for(137), 1);

    let record = store.get(&key).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(
        record.error.as_deref(),
        Some("Upstream request failed with HTTP 503")
    );
}
