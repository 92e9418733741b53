use async_trait::async_trait;
use portfolio_core::StatusRecord;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub mod memory_store;

pub use memory_store::MemoryStatusStore;

/// Redis health status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisHealthStatus {
    pub connected: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Durable key -> status record mapping.
///
/// Each `put` is independently atomic; there is no multi-key transaction.
/// `list_keys` returns keys in lexicographic order, which the aggregator
/// relies on to pick the most recent record of a chain.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn put(&self, key: &str, record: &StatusRecord) -> Result<()>;

    /// Fails with `NotFound` when the key is absent and `Serialization` when
    /// the stored value is not a valid record
    async fn get(&self, key: &str) -> Result<StatusRecord>;

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Escape Redis glob metacharacters so a prefix matches literally
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Redis-backed status store
#[derive(Clone)]
pub struct RedisStatusStore {
    connection: MultiplexedConnection,
    /// Expiry applied to terminal records
    record_ttl_seconds: Option<u64>,
}

impl RedisStatusStore {
    pub async fn new(redis_url: &str, record_ttl_seconds: Option<u64>) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        // Test the connection
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!("Connected to Redis status store");

        Ok(Self {
            connection,
            record_ttl_seconds,
        })
    }

    fn get_connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// Test Redis connection
    pub async fn ping(&self) -> Result<String> {
        let mut conn = self.get_connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }

    /// Test Redis connectivity and health
    pub async fn health_check(&self) -> RedisHealthStatus {
        let start_time = std::time::Instant::now();
        match self.ping().await {
            Ok(_) => RedisHealthStatus {
                connected: true,
                latency_ms: start_time.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => RedisHealthStatus {
                connected: false,
                latency_ms: start_time.elapsed().as_millis() as u64,
                error: Some(format!("PING failed: {}", e)),
            },
        }
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn put(&self, key: &str, record: &StatusRecord) -> Result<()> {
        let record_json = record.to_json()?;
        let mut conn = self.get_connection();

        match self.record_ttl_seconds {
            Some(ttl) if record.is_terminal() => {
                let _: () = conn.set_ex(key, &record_json, ttl).await?;
            }
            _ => {
                let _: () = conn.set(key, &record_json).await?;
            }
        }

        debug!("Stored {} record at {}", record.status.as_str(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StatusRecord> {
        let mut conn = self.get_connection();
        let record_json: Option<String> = conn.get(key).await?;

        match record_json {
            Some(json) => Ok(StatusRecord::from_json(&json)?),
            None => Err(PersistenceError::NotFound(key.to_string())),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.get_connection();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        // SCAN rather than KEYS so a large keyspace does not block the server
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;

            keys.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            debug!("No keys found for prefix {}", prefix);
        }
        Ok(keys)
    }
}
