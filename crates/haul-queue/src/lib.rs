//! Redis-backed coordination for Haul.
//!
//! Three small pieces share one Redis instance:
//!
//! - [`JobQueue`]: a Redis Streams consumer-group queue carrying
//!   [`DownloadJob`] payloads from the API to the workers, at-most-once.
//! - [`ProgressStore`]: one JSON snapshot per request id with a TTL,
//!   merged through the snapshot's own monotonic rules.
//! - [`ArtifactStore`]: single-serve records for finished files, claimed
//!   atomically with GETDEL.

pub mod artifact;
pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use artifact::ArtifactStore;
pub use error::{QueueError, QueueResult};
pub use job::DownloadJob;
pub use progress::ProgressStore;
pub use queue::{JobQueue, QueueConfig};
