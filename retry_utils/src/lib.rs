use std::time::Duration;
use tracing::debug;

/// Classification of errors for retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableError {
    /// 429 Rate Limit
    RateLimit,
    /// 5xx Server Error
    ServerError,
    /// Request deadline elapsed
    Timeout,
    /// Connection refused, reset, DNS failure...
    Transport,
    /// Body could not be decoded; indistinguishable from a transient glitch here
    Malformed,
    /// 4xx outside the fail-fast set
    ClientError,
    /// Status listed as permanent - don't retry
    Permanent,
}

impl RetryableError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RetryableError::Permanent)
    }
}

/// What the worker should do with a job after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue with the given retry count
    Retry { retry_count: u32 },
    /// Persist a terminal failure
    GiveUp(GiveUpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    Exhausted,
    NonRetryable,
    /// A retry was due but the queue no longer accepts jobs
    QueueClosed,
}

/// Requeue-based retry policy: no backoff, the worker's pacing spaces attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not including the initial attempt)
    pub max_retries: u32,
    /// HTTP statuses that fail the job immediately
    pub fail_fast_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            fail_fast_statuses: vec![400, 401, 403, 404, 422],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, fail_fast_statuses: Vec<u16>) -> Self {
        Self {
            max_retries,
            fail_fast_statuses,
        }
    }

    /// Upper bound on fetch invocations for one job
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn classify_status(&self, status: u16) -> RetryableError {
        if self.fail_fast_statuses.contains(&status) {
            return RetryableError::Permanent;
        }
        match status {
            429 => RetryableError::RateLimit,
            500..=599 => RetryableError::ServerError,
            _ => RetryableError::ClientError,
        }
    }

    /// Decide the fate of a job that has already been retried `retry_count` times
    pub fn decide(&self, retry_count: u32, error_type: RetryableError) -> RetryDecision {
        if !error_type.is_retryable() {
            return RetryDecision::GiveUp(GiveUpReason::NonRetryable);
        }

        if retry_count >= self.max_retries {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }

        RetryDecision::Retry {
            retry_count: retry_count + 1,
        }
    }
}

/// Fixed-interval gate that spaces out upstream requests.
///
/// With a rate of N per second the interval is `1000 / N` ms, rounded up so
/// that a caller pausing after every attempt never fits N + 1 attempts into a
/// one-second window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPacer {
    interval: Duration,
}

impl RequestPacer {
    /// `per_second` is clamped to at least 1
    pub fn per_second(per_second: u32) -> Self {
        let per_second = per_second.max(1) as u64;
        Self {
            interval: Duration::from_millis(1000_u64.div_ceil(per_second)),
        }
    }

    pub fn from_interval(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn pause(&self) {
        if self.interval.is_zero() {
            return;
        }
        debug!("Pacing next upstream request by {}ms", self.interval.as_millis());
        tokio::time::sleep(self.interval).await;
    }
}
