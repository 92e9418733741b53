use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for GoldRush API client
#[derive(Debug, Clone)]
pub struct GoldRushConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for GoldRushConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.covalenthq.com/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl GoldRushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// GoldRush API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldRushResponse<T> {
    pub data: Option<T>,
    pub error: bool,
    pub error_message: Option<String>,
    pub error_code: Option<u32>,
}

/// Response from balances_v2 API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub address: String,
    pub chain_id: u64,
    pub chain_name: Option<String>,
    pub quote_currency: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<TokenBalance>,
}

/// Token balance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub contract_decimals: Option<u32>,
    pub contract_name: Option<String>,
    pub contract_ticker_symbol: Option<String>,
    pub contract_address: String,
    pub contract_display_name: Option<String>,
    pub logo_url: Option<String>,
    pub native_token: Option<bool>,
    pub r#type: Option<String>,
    pub is_spam: Option<bool>,
    /// Raw integer balance, not scaled by decimals
    pub balance: Option<String>,
    pub quote_rate: Option<f64>,
    /// USD value of the holding
    pub quote: Option<f64>,
}
