use crate::{
    error::GoldRushError,
    parser::BalanceParser,
    types::{BalancesResponse, GoldRushConfig, GoldRushResponse},
};
use async_trait::async_trait;
use portfolio_core::{normalize_address, ChainPortfolio, ChainRegistry, FetchError, PortfolioFetcher};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

/// GoldRush API client for EVM wallet balances
#[derive(Debug, Clone)]
pub struct GoldRushClient {
    client: Client,
    config: GoldRushConfig,
    registry: ChainRegistry,
}

impl GoldRushClient {
    /// Create a new GoldRush client with default configuration
    pub fn new() -> Result<Self, GoldRushError> {
        Self::with_config(GoldRushConfig::default())
    }

    /// Create a new GoldRush client with custom configuration
    pub fn with_config(config: GoldRushConfig) -> Result<Self, GoldRushError> {
        Self::with_registry(config, ChainRegistry::default())
    }

    /// Create a client that names chains from `registry`
    pub fn with_registry(
        config: GoldRushConfig,
        registry: ChainRegistry,
    ) -> Result<Self, GoldRushError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            config,
            registry,
        })
    }

    pub fn config(&self) -> &GoldRushConfig {
        &self.config
    }

    /// Fetch the raw token balances of a wallet on one chain.
    ///
    /// Exactly one HTTP request is made; retries are left to the caller.
    pub async fn get_wallet_balances(
        &self,
        wallet_address: &str,
        chain_id: u64,
    ) -> Result<BalancesResponse, GoldRushError> {
        let url = format!(
            "{}/{}/address/{}/balances_v2/",
            self.config.base_url.trim_end_matches('/'),
            chain_id,
            wallet_address
        );

        debug!("📡 GoldRush balances request: chain {} wallet {}", chain_id, wallet_address);

        let start_time = std::time::Instant::now();
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .query(&[("quote-currency", "USD"), ("no-spam", "true")])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        debug!(
            "📨 Response status {} for chain {} in {:.2}s",
            status,
            chain_id,
            start_time.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(
                "❌ GoldRush API error - chain {} status {}",
                chain_id,
                status.as_u16()
            );
            return Err(GoldRushError::from_status(status.as_u16(), &text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let api_response: GoldRushResponse<BalancesResponse> =
            serde_json::from_str(&response_text).map_err(|e| {
                error!("❌ Failed to parse GoldRush balances for chain {}: {}", chain_id, e);
                GoldRushError::ParseError {
                    message: e.to_string(),
                }
            })?;

        if api_response.error {
            return Err(GoldRushError::ApiError {
                message: api_response
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string()),
                code: api_response.error_code,
            });
        }

        api_response.data.ok_or_else(|| GoldRushError::ParseError {
            message: "No data in response".to_string(),
        })
    }

    /// Fetch and normalize the holdings of a wallet on one chain
    pub async fn get_chain_portfolio(
        &self,
        wallet_address: &str,
        chain_id: u64,
    ) -> Result<ChainPortfolio, GoldRushError> {
        let address =
            normalize_address(wallet_address).map_err(|_| GoldRushError::InvalidAddress {
                address: wallet_address.to_string(),
            })?;

        let balances = self.get_wallet_balances(&address, chain_id).await?;
        let positions = BalanceParser::parse_positions(chain_id, &balances.items);

        let portfolio = ChainPortfolio::try_new(chain_id, self.registry.name(chain_id), positions)
            .ok_or_else(|| {
                error!("❌ Position values overflow the portfolio total on chain {}", chain_id);
                GoldRushError::ParseError {
                    message: "Portfolio total out of range".to_string(),
                }
            })?;
        info!(
            "✅ Fetched {} positions worth ${} for {} on {}",
            portfolio.positions.len(),
            portfolio.total_value_usd,
            address,
            portfolio.chain_name
        );
        Ok(portfolio)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> GoldRushError {
        if err.is_timeout() {
            GoldRushError::Timeout(self.config.timeout())
        } else {
            GoldRushError::HttpError(err)
        }
    }
}

#[async_trait]
impl PortfolioFetcher for GoldRushClient {
    async fn fetch(&self, chain_id: u64, address: &str) -> Result<ChainPortfolio, FetchError> {
        self.get_chain_portfolio(address, chain_id)
            .await
            .map_err(FetchError::from)
    }
}
