use futures::future::join_all;
use persistence_layer::StatusStore;
use portfolio_core::{
    now_millis, AggregatedPortfolio, ChainRegistry, ChainStatus, ChainSummary, JobStatus,
    StatusKey, StatusRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reported for a `queued` record older than the stale threshold
pub const STALE_JOB_MESSAGE: &str = "Job timed out before completion";
/// Reported when a chain's latest record cannot be used
pub const UNREADABLE_RECORD_MESSAGE: &str = "Status record could not be read";
/// Reported for every chain when the store cannot be listed
pub const STORE_UNAVAILABLE_MESSAGE: &str = "Status store unavailable";

/// Read-only merge of the latest status record of every registry chain
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn StatusStore>,
    registry: Arc<ChainRegistry>,
    stale_queued_after: Option<Duration>,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        registry: Arc<ChainRegistry>,
        stale_queued_after: Option<Duration>,
    ) -> Self {
        Self {
            store,
            registry,
            stale_queued_after,
        }
    }

    /// Build the portfolio of a canonical address. Never fails: problems with
    /// individual chains are reported on those chains only.
    pub async fn aggregate(&self, address: &str) -> AggregatedPortfolio {
        let mut portfolio = AggregatedPortfolio::new(address);
        let prefix = StatusKey::address_prefix(address);

        let keys = match self.store.list_keys(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list status keys for {}: {}", address, e);
                portfolio.chains = self
                    .registry
                    .list_chains()
                    .iter()
                    .map(|chain| failed_summary(chain.id, chain.name.clone(), STORE_UNAVAILABLE_MESSAGE))
                    .collect();
                return portfolio;
            }
        };

        let latest = self.latest_keys(&prefix, keys);

        let reads = self.registry.list_chains().iter().map(|chain| {
            let key = latest.get(&chain.id).cloned();
            async move {
                match key {
                    Some(key) => self.read_chain(chain.id, chain.name.clone(), key).await,
                    None => (ChainSummary::not_found(chain.id, chain.name.clone()), None),
                }
            }
        });

        for (mut summary, record) in join_all(reads).await {
            if let Some(data) = record.and_then(|r| r.data) {
                let total = data
                    .positions_value()
                    .and_then(|value| portfolio.total_value_usd.checked_add(value));
                match total {
                    Some(total) => {
                        portfolio.total_value_usd = total;
                        portfolio.positions.extend(data.positions);
                    }
                    None => {
                        warn!("Value of chain {} overflows the portfolio total", summary.id);
                        summary.status = ChainStatus::Failed;
                        summary.error = Some(UNREADABLE_RECORD_MESSAGE.to_string());
                    }
                }
            }
            portfolio.chains.push(summary);
        }

        debug!(
            "Aggregated {}: {} completed, {} queued, {} failed, {} not found",
            address,
            portfolio.count_by_status(ChainStatus::Completed),
            portfolio.count_by_status(ChainStatus::Queued),
            portfolio.count_by_status(ChainStatus::Failed),
            portfolio.count_by_status(ChainStatus::NotFound)
        );
        portfolio
    }

    /// Greatest key per registry chain. Grouping only looks at the chain
    /// segment so that a malformed newest key still claims its chain.
    fn latest_keys(&self, prefix: &str, keys: Vec<String>) -> HashMap<u64, String> {
        let mut latest: HashMap<u64, String> = HashMap::new();

        for key in keys {
            let chain_id = key
                .strip_prefix(prefix)
                .and_then(|rest| rest.split_once('-'))
                .and_then(|(chain, _)| chain.parse::<u64>().ok());

            let Some(chain_id) = chain_id else {
                warn!("Ignoring status key with no chain id: {}", key);
                continue;
            };
            if !self.registry.is_supported(chain_id) {
                debug!("Ignoring status key for unregistered chain: {}", key);
                continue;
            }

            match latest.get(&chain_id) {
                Some(current) if *current >= key => {}
                _ => {
                    latest.insert(chain_id, key);
                }
            }
        }

        latest
    }

    async fn read_chain(
        &self,
        chain_id: u64,
        name: String,
        key: String,
    ) -> (ChainSummary, Option<StatusRecord>) {
        let parsed = match StatusKey::parse(&key) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Latest key for chain {} is malformed: {}", chain_id, e);
                return (failed_summary(chain_id, name, UNREADABLE_RECORD_MESSAGE), None);
            }
        };

        let record = match self.store.get(&key).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not read {}: {}", key, e);
                let mut summary = failed_summary(chain_id, name, UNREADABLE_RECORD_MESSAGE);
                summary.request_id = Some(parsed.request_id);
                return (summary, None);
            }
        };

        let mut summary = ChainSummary {
            id: chain_id,
            name,
            status: ChainStatus::Queued,
            error: None,
            request_id: Some(parsed.request_id),
            updated_at: Some(record.timestamp),
        };

        match record.status {
            JobStatus::Queued if self.is_stale(&record) => {
                summary.status = ChainStatus::Failed;
                summary.error = Some(STALE_JOB_MESSAGE.to_string());
                (summary, None)
            }
            JobStatus::Queued => (summary, None),
            JobStatus::Failed => {
                summary.status = ChainStatus::Failed;
                summary.error = Some(
                    record
                        .error
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string()),
                );
                (summary, None)
            }
            JobStatus::Completed if record.data.is_some() => {
                summary.status = ChainStatus::Completed;
                (summary, Some(record))
            }
            JobStatus::Completed => {
                warn!("Completed record without data at {}", key);
                summary.status = ChainStatus::Failed;
                summary.error = Some(UNREADABLE_RECORD_MESSAGE.to_string());
                (summary, None)
            }
        }
    }

    fn is_stale(&self, record: &StatusRecord) -> bool {
        match self.stale_queued_after {
            Some(threshold) => {
                let age_ms = now_millis().saturating_sub(record.timestamp);
                age_ms > threshold.as_millis() as i64
            }
            None => false,
        }
    }
}

fn failed_summary(id: u64, name: String, message: &str) -> ChainSummary {
    ChainSummary {
        id,
        name,
        status: ChainStatus::Failed,
        error: Some(message.to_string()),
        request_id: None,
        updated_at: None,
    }
}
