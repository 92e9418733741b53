pub mod chains;
pub mod fetcher;
pub mod job;
pub mod portfolio;

pub use chains::{ChainInfo, ChainRegistry};
pub use fetcher::{FetchError, PortfolioFetcher};
pub use job::{JobRequest, JobStatus, StatusKey, StatusRecord, KEY_PREFIX};
pub use portfolio::{AggregatedPortfolio, ChainPortfolio, ChainStatus, ChainSummary, Position};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),
    #[error("Invalid status key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Length of an EVM address including the `0x` prefix
pub const ADDRESS_LEN: usize = 42;

/// Check that an address is `0x` followed by exactly 40 lowercase hex characters
pub fn is_canonical_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN
        && address.starts_with("0x")
        && address[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Validate an EVM wallet address and return its canonical lowercase form.
///
/// Mixed-case (checksummed) input is accepted and lowercased; anything that is
/// not `0x` + 40 hex characters is rejected.
pub fn normalize_address(address: &str) -> Result<String> {
    let candidate = address.trim().to_ascii_lowercase();
    if is_canonical_address(&candidate) {
        Ok(candidate)
    } else {
        Err(CoreError::InvalidAddress(address.to_string()))
    }
}

/// Current wall-clock time as epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
