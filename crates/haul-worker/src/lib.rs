//! Download worker.
//!
//! Consumes download jobs from the Redis stream, runs each through the
//! staged pipeline (resolve, fetch, package, register) and writes
//! progress snapshots at every step. Shutdown is graceful: the consume
//! loop stops first, then in-flight jobs get a bounded drain window.

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use pipeline::{run_job, PipelineContext};
