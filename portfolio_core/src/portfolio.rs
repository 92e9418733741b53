use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single token holding on one chain, valued in USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub chain_id: u64,
    pub token_address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    /// Balance scaled by `decimals`
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_usd: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str")]
    pub value_usd: Decimal,
    pub logo_url: Option<String>,
}

/// Normalized upstream result for one (chain, address) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainPortfolio {
    pub chain_id: u64,
    pub chain_name: String,
    pub positions: Vec<Position>,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_value_usd: Decimal,
}

impl ChainPortfolio {
    /// Build a chain result with its total. `None` if the total overflows.
    pub fn try_new(
        chain_id: u64,
        chain_name: impl Into<String>,
        positions: Vec<Position>,
    ) -> Option<Self> {
        let total_value_usd = sum_values(&positions)?;
        Some(Self {
            chain_id,
            chain_name: chain_name.into(),
            positions,
            total_value_usd,
        })
    }

    /// Sum of position values, recomputed rather than trusting the stored total
    pub fn positions_value(&self) -> Option<Decimal> {
        sum_values(&self.positions)
    }
}

fn sum_values(positions: &[Position]) -> Option<Decimal> {
    positions
        .iter()
        .try_fold(Decimal::ZERO, |total, p| total.checked_add(p.value_usd))
}

/// Per-chain state reported by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Queued,
    Completed,
    Failed,
    /// No record exists for this chain and address
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub id: u64,
    pub name: String,
    pub status: ChainStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request whose record was selected for this chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    /// Timestamp of the selected record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl ChainSummary {
    pub fn not_found(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: ChainStatus::NotFound,
            error: None,
            request_id: None,
            updated_at: None,
        }
    }
}

/// Read-time merge of the latest record of every chain for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPortfolio {
    pub address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_value_usd: Decimal,
    pub chains: Vec<ChainSummary>,
    pub positions: Vec<Position>,
}

impl AggregatedPortfolio {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            total_value_usd: Decimal::ZERO,
            chains: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainSummary> {
        self.chains.iter().find(|c| c.id == chain_id)
    }

    /// True once no chain is still waiting on the worker
    pub fn is_settled(&self) -> bool {
        self.chains.iter().all(|c| c.status != ChainStatus::Queued)
    }

    pub fn count_by_status(&self, status: ChainStatus) -> usize {
        self.chains.iter().filter(|c| c.status == status).count()
    }
}
