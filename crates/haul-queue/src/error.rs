use thiserror::Error;

/// Convenience alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors produced by the job queue and the Redis-backed stores.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to enqueue job: {0}")]
    EnqueueFailed(String),

    #[error("Failed to dequeue job: {0}")]
    DequeueFailed(String),

    #[error("Store operation failed: {0}")]
    StoreFailed(String),

    #[error("Job serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl QueueError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn enqueue(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    pub fn dequeue(msg: impl Into<String>) -> Self {
        Self::DequeueFailed(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreFailed(msg.into())
    }
}
