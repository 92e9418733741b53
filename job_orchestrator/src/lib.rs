use config_manager::{ConfigurationError, SystemConfig};
use goldrush_client::{GoldRushClient, GoldRushConfig, GoldRushError};
use persistence_layer::{PersistenceError, RedisStatusStore, StatusStore};
use portfolio_core::{
    normalize_address, AggregatedPortfolio, ChainInfo, ChainRegistry, CoreError, JobRequest,
    PortfolioFetcher, StatusKey, StatusRecord,
};
use retry_utils::{RequestPacer, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub mod aggregator;
pub mod queue;
pub mod worker;

pub use aggregator::Aggregator;
pub use queue::{job_queue, JobQueue, JobReceiver, QueueError};
pub use worker::{JobOutcome, RateLimitedWorker, WorkerHandle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),
    #[error("Job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("Job queue is closed")]
    QueueClosed,
    #[error("Request not found: {0}")]
    NotFound(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Upstream client error: {0}")]
    Upstream(String),
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAddress(address) => OrchestratorError::InvalidAddress(address),
            CoreError::UnsupportedChain(chain_id) => OrchestratorError::UnsupportedChain(chain_id),
            CoreError::InvalidKey(key) => OrchestratorError::NotFound(key),
        }
    }
}

impl From<QueueError> for OrchestratorError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::QueueFull { capacity } => OrchestratorError::QueueFull { capacity },
            QueueError::Closed => OrchestratorError::QueueClosed,
        }
    }
}

impl From<PersistenceError> for OrchestratorError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(key) => OrchestratorError::NotFound(key),
            other => OrchestratorError::Persistence(other.to_string()),
        }
    }
}

impl From<ConfigurationError> for OrchestratorError {
    fn from(err: ConfigurationError) -> Self {
        OrchestratorError::Config(err.to_string())
    }
}

impl From<GoldRushError> for OrchestratorError {
    fn from(err: GoldRushError) -> Self {
        OrchestratorError::Upstream(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Handle returned for every accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub request_id: Uuid,
    pub chain_id: u64,
    /// Encoded status record key
    pub key: String,
}

/// Worker and aggregation tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub rate_limit_per_second: u32,
    pub retry_policy: RetryPolicy,
    pub queue_capacity: Option<usize>,
    pub stale_queued_after: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rate_limit_per_second: 1,
            retry_policy: RetryPolicy::default(),
            queue_capacity: None,
            stale_queued_after: Some(Duration::from_secs(900)),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            rate_limit_per_second: config.worker.rate_limit_per_second,
            retry_policy: RetryPolicy::new(
                config.worker.max_retries,
                config.worker.fail_fast_statuses.clone(),
            ),
            queue_capacity: config.worker.queue_capacity,
            stale_queued_after: config.stale_queued_after(),
        }
    }
}

/// Submission, status and aggregation entry points.
///
/// Cheap to clone; every clone feeds the same queue and reads the same store
/// and registry.
#[derive(Clone)]
pub struct PortfolioService {
    registry: Arc<ChainRegistry>,
    queue: JobQueue,
    store: Arc<dyn StatusStore>,
    aggregator: Aggregator,
}

impl PortfolioService {
    pub fn new(
        registry: Arc<ChainRegistry>,
        queue: JobQueue,
        store: Arc<dyn StatusStore>,
        stale_queued_after: Option<Duration>,
    ) -> Self {
        let aggregator = Aggregator::new(store.clone(), registry.clone(), stale_queued_after);
        Self {
            registry,
            queue,
            store,
            aggregator,
        }
    }

    /// Wire a queue, service and worker together and start the worker
    pub fn start(
        fetcher: Arc<dyn PortfolioFetcher>,
        store: Arc<dyn StatusStore>,
        registry: Arc<ChainRegistry>,
        settings: PipelineSettings,
    ) -> (Self, WorkerHandle) {
        let (queue, receiver) = job_queue(settings.queue_capacity);
        let worker = RateLimitedWorker::new(
            fetcher,
            store.clone(),
            queue.clone(),
            receiver,
            settings.retry_policy,
            RequestPacer::per_second(settings.rate_limit_per_second),
        );
        let handle = worker.spawn();
        let service = Self::new(registry, queue, store, settings.stale_queued_after);
        (service, handle)
    }

    /// Build the GoldRush fetcher and Redis store from configuration and start
    pub async fn from_config(config: &SystemConfig) -> Result<(Self, WorkerHandle)> {
        let registry = Arc::new(config.chain_registry()?);

        let fetcher = GoldRushClient::with_registry(
            GoldRushConfig {
                api_key: config.goldrush.api_key.clone(),
                base_url: config.goldrush.api_base_url.clone(),
                timeout_seconds: config.goldrush.request_timeout_seconds,
            },
            (*registry).clone(),
        )?;

        let store =
            RedisStatusStore::new(&config.redis.url, config.redis.record_ttl_seconds).await?;

        info!(
            "Starting portfolio pipeline for {} chains at {} req/s",
            registry.len(),
            config.worker.rate_limit_per_second
        );

        Ok(Self::start(
            Arc::new(fetcher),
            Arc::new(store),
            registry,
            PipelineSettings::from_config(config),
        ))
    }

    /// Queue one (chain, address) fetch. Returns before the job runs.
    pub async fn submit_one(&self, chain_id: u64, address: &str) -> Result<SubmittedJob> {
        let address = normalize_address(address)?;
        if !self.registry.is_supported(chain_id) {
            return Err(OrchestratorError::UnsupportedChain(chain_id));
        }

        let job = JobRequest::new(chain_id, address);
        let request_id = job.request_id;
        let key = job.key().encode();

        // The queued record goes in before the job can reach the worker,
        // so it can never overwrite a terminal one
        self.store.put(&key, &StatusRecord::queued()).await?;

        if let Err(e) = self.queue.enqueue(job) {
            warn!("⚠️ Rejected job {}: {}", key, e);
            if let Err(store_err) = self
                .store
                .put(&key, &StatusRecord::failed(e.public_message()))
                .await
            {
                warn!("Could not mark rejected job {} failed: {}", key, store_err);
            }
            return Err(e.into());
        }

        Ok(SubmittedJob {
            request_id,
            chain_id,
            key,
        })
    }

    /// Queue one job per registry chain, in registry order.
    ///
    /// Stops at the first rejection; jobs queued before it stay queued.
    pub async fn submit_all(&self, address: &str) -> Result<Vec<SubmittedJob>> {
        let address = normalize_address(address)?;
        let mut submitted = Vec::with_capacity(self.registry.len());

        for chain_id in self.registry.chain_ids() {
            submitted.push(self.submit_one(chain_id, &address).await?);
        }

        info!(
            "📡 Submitted {} chain jobs for {}",
            submitted.len(),
            address
        );
        Ok(submitted)
    }

    /// Look up a job by request id alone
    pub async fn get_status(&self, request_id: Uuid) -> Result<StatusRecord> {
        let suffix = format!("-{}", request_id.hyphenated());
        let keys = self.store.list_keys(&StatusKey::store_prefix()).await?;

        let key = keys
            .into_iter()
            .find(|key| key.ends_with(&suffix))
            .ok_or_else(|| OrchestratorError::NotFound(request_id.to_string()))?;

        Ok(self.store.get(&key).await?)
    }

    pub async fn get_status_for(&self, key: &StatusKey) -> Result<StatusRecord> {
        Ok(self.store.get(&key.encode()).await?)
    }

    pub async fn aggregate(&self, address: &str) -> Result<AggregatedPortfolio> {
        let address = normalize_address(address)?;
        Ok(self.aggregator.aggregate(&address).await)
    }

    pub fn chains(&self) -> &[ChainInfo] {
        self.registry.list_chains()
    }

    pub fn registry(&self) -> Arc<ChainRegistry> {
        self.registry.clone()
    }

    /// Jobs waiting in the queue, retries included
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}
