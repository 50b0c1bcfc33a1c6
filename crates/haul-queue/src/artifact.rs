use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info};

use haul_models::{ArtifactRecord, RequestId};

use crate::error::{QueueError, QueueResult};

const DEFAULT_TTL_SECS: u64 = 3600;

fn artifact_key(id: &RequestId) -> String {
    format!("artifact:{id}")
}

/// Single-serve artifact records.
///
/// A finished job registers its output file here; the download endpoint
/// claims it with an atomic GETDEL so exactly one request can ever win
/// the record. Unclaimed records expire with the TTL and the worker's
/// startup sweep removes the orphaned files.
pub struct ArtifactStore {
    client: redis::Client,
    ttl: Duration,
}

impl ArtifactStore {
    pub fn new(redis_url: &str, ttl: Duration) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::connection(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client, ttl })
    }

    pub fn from_env() -> QueueResult<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let ttl_secs = std::env::var("ARTIFACT_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);
        Self::new(&redis_url, Duration::from_secs(ttl_secs))
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection(e.to_string()))
    }

    /// Register a finished artifact for pickup.
    pub async fn put(&self, record: &ArtifactRecord) -> QueueResult<()> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(artifact_key(&record.request_id), json, self.ttl.as_secs())
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        info!(
            request_id = %record.request_id,
            filename = %record.filename,
            size = record.size,
            "registered artifact"
        );
        Ok(())
    }

    /// Atomically claim and delete the record.
    ///
    /// Concurrent callers race on Redis itself; GETDEL guarantees at
    /// most one of them gets `Some`.
    pub async fn take(&self, id: &RequestId) -> QueueResult<Option<ArtifactRecord>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(artifact_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        match raw {
            Some(raw) => {
                debug!(request_id = %id, "artifact claimed");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_request_id() {
        let id = RequestId::from_string("abc-123".to_string());
        assert_eq!(artifact_key(&id), "artifact:abc-123");
    }
}
