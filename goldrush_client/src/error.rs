use portfolio_core::FetchError;
use std::time::Duration;
use thiserror::Error;

/// Longest slice of an upstream body kept in error messages
const MAX_BODY_IN_ERROR: usize = 200;

#[derive(Error, Debug)]
pub enum GoldRushError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {message}")]
    ApiError { message: String, code: Option<u32> },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed")]
    AuthError,

    #[error("Invalid wallet address: {address}")]
    InvalidAddress { address: String },
}

impl GoldRushError {
    /// Build an error from a non-2xx response
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => GoldRushError::AuthError,
            429 => GoldRushError::RateLimit,
            _ => GoldRushError::Status {
                status,
                body: truncate(body),
            },
        }
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl From<GoldRushError> for FetchError {
    fn from(err: GoldRushError) -> Self {
        match err {
            GoldRushError::Timeout(after) => FetchError::Timeout(after),
            GoldRushError::HttpError(e) => FetchError::Upstream {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            GoldRushError::Status { status, body } => FetchError::Upstream {
                status: Some(status),
                message: body,
            },
            GoldRushError::RateLimit => FetchError::Upstream {
                status: Some(429),
                message: "Rate limit exceeded".to_string(),
            },
            GoldRushError::AuthError => FetchError::Upstream {
                status: Some(401),
                message: "Authentication failed".to_string(),
            },
            // The API reports its own error code alongside `error: true`
            GoldRushError::ApiError { message, code } => FetchError::Upstream {
                status: code.and_then(|c| u16::try_from(c).ok()),
                message,
            },
            GoldRushError::ParseError { message } => FetchError::MalformedPayload(message),
            GoldRushError::InvalidAddress { address } => FetchError::Upstream {
                status: Some(400),
                message: format!("Invalid wallet address: {}", address),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(GoldRushError::from_status(401, ""), GoldRushError::AuthError));
        assert!(matches!(GoldRushError::from_status(429, ""), GoldRushError::RateLimit));
        assert!(matches!(
            GoldRushError::from_status(502, "bad gateway"),
            GoldRushError::Status { status: 502, .. }
        ));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match GoldRushError::from_status(500, &body) {
            GoldRushError::Status { body, .. } => assert_eq!(body.len(), MAX_BODY_IN_ERROR + 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fetch_error_mapping() {
        assert_eq!(
            FetchError::from(GoldRushError::RateLimit).status(),
            Some(429)
        );
        assert_eq!(
            FetchError::from(GoldRushError::Timeout(Duration::from_secs(5))),
            FetchError::Timeout(Duration::from_secs(5))
        );
        assert!(matches!(
            FetchError::from(GoldRushError::ParseError {
                message: "missing field".to_string()
            }),
            FetchError::MalformedPayload(_)
        ));
        assert_eq!(
            FetchError::from(GoldRushError::ApiError {
                message: "Invalid chain".to_string(),
                code: Some(400)
            })
            .status(),
            Some(400)
        );
    }
}
