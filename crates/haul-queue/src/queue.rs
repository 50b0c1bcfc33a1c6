use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::DownloadJob;

/// Connection and naming settings for the job stream.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            stream_name: "haul:jobs".to_string(),
            consumer_group: "haul:workers".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_GROUP").unwrap_or(defaults.consumer_group),
        }
    }
}

/// Redis Streams backed job queue.
///
/// Delivery is at-most-once: entries are handed to a single consumer in
/// the group and there is no pending-claim or retry machinery. Workers
/// acknowledge after reaching a terminal outcome; a job that dies with
/// its worker is gone.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection(e.to_string()))
    }

    /// Create the consumer group, tolerating one that already exists.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "created consumer group"
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream = %self.config.stream_name, "consumer group already exists");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Append a job to the stream, returning the Redis stream entry id.
    pub async fn enqueue(&self, job: &DownloadJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;
        let stream_id: String = conn
            .xadd(
                &self.config.stream_name,
                "*",
                &[
                    ("job", payload.as_str()),
                    ("request_id", job.request_id.as_str()),
                ],
            )
            .await
            .map_err(|e| QueueError::enqueue(e.to_string()))?;

        info!(request_id = %job.request_id, %stream_id, "enqueued download job");
        Ok(stream_id)
    }

    /// Read new entries for this consumer, blocking up to `block_ms`.
    ///
    /// Malformed payloads are logged, acknowledged and skipped so a bad
    /// entry cannot wedge the stream.
    pub async fn consume(
        &self,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> QueueResult<Vec<(String, DownloadJob)>> {
        let mut conn = self.connection().await?;
        let options = StreamReadOptions::default()
            .group(&self.config.consumer_group, consumer)
            .count(count)
            .block(block_ms as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.config.stream_name], &[">"], &options)
            .await
            .map_err(|e| QueueError::dequeue(e.to_string()))?;

        let mut jobs = Vec::new();
        for stream in reply.keys {
            for entry in stream.ids {
                match entry.map.get("job") {
                    Some(redis::Value::BulkString(raw)) => {
                        match serde_json::from_slice::<DownloadJob>(raw) {
                            Ok(job) => jobs.push((entry.id.clone(), job)),
                            Err(e) => {
                                warn!(stream_id = %entry.id, error = %e, "dropping malformed job payload");
                                self.ack(&entry.id).await?;
                            }
                        }
                    }
                    _ => {
                        warn!(stream_id = %entry.id, "stream entry missing job field");
                        self.ack(&entry.id).await?;
                    }
                }
            }
        }
        Ok(jobs)
    }

    /// Acknowledge and delete a processed entry.
    pub async fn ack(&self, stream_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .xack(
                &self.config.stream_name,
                &self.config.consumer_group,
                &[stream_id],
            )
            .await?;
        let _: i64 = conn.xdel(&self.config.stream_name, &[stream_id]).await?;
        debug!(%stream_id, "acknowledged stream entry");
        Ok(())
    }

    /// Number of entries currently in the stream.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Round-trip PING, used by readiness checks.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(QueueError::connection(format!("unexpected PING reply: {pong}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_local_redis() {
        let config = QueueConfig::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.stream_name, "haul:jobs");
        assert_eq!(config.consumer_group, "haul:workers");
    }

    #[test]
    fn queue_rejects_invalid_url() {
        let config = QueueConfig {
            redis_url: "not a url".to_string(),
            ..QueueConfig::default()
        };
        assert!(JobQueue::new(config).is_err());
    }
}
