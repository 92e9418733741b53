use crate::portfolio::ChainPortfolio;
use crate::{is_canonical_address, now_millis, CoreError, Result, ADDRESS_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Leading segment of every status record key
pub const KEY_PREFIX: &str = "portfolio";

/// Lifecycle state persisted for a fetch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` allow no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// One unit of work: fetch the positions of `address` on `chain_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub chain_id: u64,
    /// Canonical lowercase address
    pub address: String,
    /// Time-ordered (v7) id, also the caller-visible handle
    pub request_id: Uuid,
    /// Submission time, epoch milliseconds
    pub enqueued_at: i64,
    /// Number of retries already scheduled for this job
    pub retry_count: u32,
}

impl JobRequest {
    pub fn new(chain_id: u64, address: impl Into<String>) -> Self {
        Self {
            chain_id,
            address: address.into(),
            request_id: Uuid::now_v7(),
            enqueued_at: now_millis(),
            retry_count: 0,
        }
    }

    pub fn key(&self) -> StatusKey {
        StatusKey::new(self.address.clone(), self.chain_id, self.request_id)
    }
}

/// Structured form of `portfolio-{address}-{chainId}-{requestId}`.
///
/// The encoding is unambiguous even though the request id contains hyphens:
/// the address is fixed-width hex, the chain id is decimal digits and the
/// request id is whatever remains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusKey {
    pub address: String,
    pub chain_id: u64,
    pub request_id: Uuid,
}

impl StatusKey {
    pub fn new(address: impl Into<String>, chain_id: u64, request_id: Uuid) -> Self {
        Self {
            address: address.into(),
            chain_id,
            request_id,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            KEY_PREFIX,
            self.address,
            self.chain_id,
            self.request_id.hyphenated()
        )
    }

    /// Prefix shared by every record of one address
    pub fn address_prefix(address: &str) -> String {
        format!("{}-{}-", KEY_PREFIX, address)
    }

    /// Prefix shared by every record in the store
    pub fn store_prefix() -> String {
        format!("{}-", KEY_PREFIX)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidKey(raw.to_string());

        let rest = raw
            .strip_prefix(KEY_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(invalid)?;

        let address = rest.get(..ADDRESS_LEN).ok_or_else(invalid)?;
        if !is_canonical_address(address) {
            return Err(invalid());
        }

        let rest = rest[ADDRESS_LEN..].strip_prefix('-').ok_or_else(invalid)?;
        let (chain_part, request_part) = rest.split_once('-').ok_or_else(invalid)?;

        if chain_part.is_empty() || !chain_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let chain_id = chain_part.parse::<u64>().map_err(|_| invalid())?;
        let request_id = Uuid::parse_str(request_part).map_err(|_| invalid())?;

        Ok(Self::new(address, chain_id, request_id))
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Durable, caller-visible outcome of a job.
///
/// Serialized as `{status, data?, error?, timestamp}`. `data` is only set for
/// `completed` records and `error` only for `failed` ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChainPortfolio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time of the last transition, epoch milliseconds
    pub timestamp: i64,
}

impl StatusRecord {
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            data: None,
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn completed(data: ChainPortfolio) -> Self {
        Self {
            status: JobStatus::Completed,
            data: Some(data),
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            data: None,
            error: Some(message.into()),
            timestamp: now_millis(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check that `data`/`error` presence matches the status
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Queued => self.data.is_none() && self.error.is_none(),
            JobStatus::Completed => self.data.is_some() && self.error.is_none(),
            JobStatus::Failed => self.data.is_none() && self.error.is_some(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
