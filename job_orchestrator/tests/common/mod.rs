#![allow(dead_code)]

use async_trait::async_trait;
use job_orchestrator::{PipelineSettings, PortfolioService, WorkerHandle};
use persistence_layer::MemoryStatusStore;
use portfolio_core::{
    AggregatedPortfolio, ChainPortfolio, ChainRegistry, FetchError, PortfolioFetcher, Position,
};
use retry_utils::RetryPolicy;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const WALLET: &str = "0x742d35cc6131b2f6e7f4c3b5e8a8c8d8f0b4c4e3";

/// Per-chain behaviour of the scripted upstream
#[derive(Debug, Clone)]
pub enum Script {
    /// Succeed with a single position of this value
    Value(Decimal),
    /// Always fail with this HTTP status
    Status(u16),
    /// Fail `failures` times with `status`, then succeed
    Flaky {
        failures: u32,
        status: u16,
        value: Decimal,
    },
    Timeout,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchCall {
    pub chain_id: u64,
    pub at: Instant,
}

/// Deterministic fetcher that records every call
pub struct ScriptedFetcher {
    scripts: HashMap<u64, Script>,
    default: Script,
    calls: Mutex<Vec<FetchCall>>,
}

impl ScriptedFetcher {
    pub fn new(default: Script) -> Self {
        Self {
            scripts: HashMap::new(),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, chain_id: u64, script: Script) -> Self {
        self.scripts.insert(chain_id, script);
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_order(&self) -> Vec<u64> {
        self.calls().iter().map(|c| c.chain_id).collect()
    }

    pub fn calls_for(&self, chain_id: u64) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.chain_id == chain_id)
            .count()
    }
}

#[async_trait]
impl PortfolioFetcher for ScriptedFetcher {
    async fn fetch(&self, chain_id: u64, _address: &str) -> Result<ChainPortfolio, FetchError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(FetchCall {
                chain_id,
                at: Instant::now(),
            });
            calls.iter().filter(|c| c.chain_id == chain_id).count() as u32
        };

        let script = self.scripts.get(&chain_id).unwrap_or(&self.default);
        match script {
            Script::Value(value) => Ok(portfolio(chain_id, *value)),
            Script::Status(status) => Err(upstream(*status)),
            Script::Flaky {
                failures,
                status,
                value,
            } => {
                if attempt <= *failures {
                    Err(upstream(*status))
                } else {
                    Ok(portfolio(chain_id, *value))
                }
            }
            Script::Timeout => Err(FetchError::Timeout(Duration::from_secs(30))),
        }
    }
}

fn upstream(status: u16) -> FetchError {
    FetchError::Upstream {
        status: Some(status),
        message: format!("<html>error {}</html>", status),
    }
}

pub fn position(chain_id: u64, value: Decimal) -> Position {
    Position {
        chain_id,
        token_address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
        symbol: "USDC".to_string(),
        name: "USD Coin".to_string(),
        decimals: 6,
        balance: value,
        price_usd: Some(Decimal::ONE),
        value_usd: value,
        logo_url: None,
    }
}

pub fn portfolio(chain_id: u64, value: Decimal) -> ChainPortfolio {
    let registry = ChainRegistry::default();
    ChainPortfolio::try_new(chain_id, registry.name(chain_id), vec![position(chain_id, value)])
        .unwrap()
}

pub struct Pipeline {
    pub service: PortfolioService,
    pub worker: WorkerHandle,
    pub fetcher: Arc<ScriptedFetcher>,
    pub store: Arc<MemoryStatusStore>,
}

pub fn settings(rate_limit_per_second: u32) -> PipelineSettings {
    PipelineSettings {
        rate_limit_per_second,
        retry_policy: RetryPolicy::default(),
        queue_capacity: None,
        stale_queued_after: None,
    }
}

pub fn start_pipeline(
    fetcher: ScriptedFetcher,
    chains: &[u64],
    settings: PipelineSettings,
) -> Pipeline {
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(MemoryStatusStore::new());
    let registry = Arc::new(ChainRegistry::with_enabled(chains).unwrap());

    let (service, worker) =
        PortfolioService::start(fetcher.clone(), store.clone(), registry, settings);

    Pipeline {
        service,
        worker,
        fetcher,
        store,
    }
}

/// Poll the aggregate until no chain is queued
pub async fn wait_until_settled(service: &PortfolioService, address: &str) -> AggregatedPortfolio {
    for _ in 0..1_000 {
        let portfolio = service.aggregate(address).await.unwrap();
        if portfolio.is_settled() {
            return portfolio;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("portfolio for {} never settled", address);
}
