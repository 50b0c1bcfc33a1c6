use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, warn};

use haul_models::{ProgressSnapshot, ProgressUpdate, RequestId};

use crate::error::{QueueError, QueueResult};

const DEFAULT_TTL_SECS: u64 = 3600;

fn progress_key(id: &RequestId) -> String {
    format!("progress:{id}")
}

/// Latest-snapshot progress store.
///
/// Each request id maps to a single JSON snapshot under `progress:{id}`.
/// The TTL is set once when the job is accepted and kept across updates,
/// so an abandoned browser tab cannot pin state alive forever. Snapshot
/// merge rules (monotonic percent, terminal exclusivity) live on
/// [`ProgressSnapshot`]; this type is only the Redis plumbing around
/// them.
pub struct ProgressStore {
    client: redis::Client,
    ttl: Duration,
}

impl ProgressStore {
    pub fn new(redis_url: &str, ttl: Duration) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::connection(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client, ttl })
    }

    pub fn from_env() -> QueueResult<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let ttl_secs = std::env::var("PROGRESS_TTL_SECS")
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

    /// Write the initial queued snapshot and start the TTL clock.
    pub async fn seed(&self, id: &RequestId, total_items: u32) -> QueueResult<()> {
        let snapshot = ProgressSnapshot::queued(total_items);
        let json = serde_json::to_string(&snapshot)?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(progress_key(id), json, self.ttl.as_secs())
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        debug!(request_id = %id, "seeded progress snapshot");
        Ok(())
    }

    /// Merge an update into the stored snapshot.
    ///
    /// Returns `Ok(false)` when the snapshot is gone (TTL expired) or
    /// already terminal; in both cases nothing is written. Only the
    /// worker that owns a request id writes to it, so read-merge-write
    /// here does not race.
    pub async fn update(&self, id: &RequestId, update: ProgressUpdate) -> QueueResult<bool> {
        let key = progress_key(id);
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        let Some(raw) = raw else {
            warn!(request_id = %id, "progress update for missing snapshot");
            return Ok(false);
        };

        let mut snapshot: ProgressSnapshot = serde_json::from_str(&raw)?;
        if !snapshot.apply(update) {
            debug!(request_id = %id, "ignoring update to terminal snapshot");
            return Ok(false);
        }

        let json = serde_json::to_string(&snapshot)?;
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        Ok(true)
    }

    /// Fetch the current snapshot, if it still exists.
    pub async fn read(&self, id: &RequestId) -> QueueResult<Option<ProgressSnapshot>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(progress_key(id))
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Drop the snapshot early, before its TTL would reap it.
    pub async fn remove(&self, id: &RequestId) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .del(progress_key(id))
            .await
            .map_err(|e| QueueError::store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_request_id() {
        let id = RequestId::from_string("abc-123".to_string());
        assert_eq!(progress_key(&id), "progress:abc-123");
    }
}
