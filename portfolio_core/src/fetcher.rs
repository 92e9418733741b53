use crate::portfolio::ChainPortfolio;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single failed upstream attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Non-2xx response (`status` set) or transport failure (`status` unset)
    #[error("Upstream error (status {status:?}): {message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed upstream payload: {0}")]
    MalformedPayload(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Message safe to persist and show to callers: no bodies, no internals
    pub fn public_message(&self) -> String {
        match self {
            FetchError::Upstream {
                status: Some(status),
                ..
            } => format!("Upstream request failed with HTTP {}", status),
            FetchError::Upstream { status: None, .. } => {
                "Upstream request could not be completed".to_string()
            }
            FetchError::Timeout(_) => "Upstream request timed out".to_string(),
            FetchError::MalformedPayload(_) => {
                "Upstream returned an unreadable response".to_string()
            }
        }
    }
}

/// Single-attempt source of per-chain portfolio data.
///
/// Implementations must not retry; retry policy belongs to the worker.
#[async_trait]
pub trait PortfolioFetcher: Send + Sync {
    async fn fetch(&self, chain_id: u64, address: &str) -> Result<ChainPortfolio, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_hides_details() {
        let err = FetchError::Upstream {
            status: Some(503),
            message: "<html>stack trace at line 42</html>".to_string(),
        };
        assert_eq!(err.public_message(), "Upstream request failed with HTTP 503");
        assert_eq!(err.status(), Some(503));

        let err = FetchError::MalformedPayload("missing field `items`".to_string());
        assert!(!err.public_message().contains("items"));
        assert_eq!(err.status(), None);
    }
}
