//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use uuid::Uuid;

use haul_media::workdir;
use haul_models::ProgressUpdate;
use haul_queue::{ArtifactStore, DownloadJob, JobQueue, ProgressStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{run_job, PipelineContext};

/// Job executor that processes download jobs from the queue.
pub struct JobExecutor {
    queue: Arc<JobQueue>,
    ctx: Arc<PipelineContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
    max_concurrent_jobs: usize,
    shutdown_timeout: Duration,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(
        config: WorkerConfig,
        queue: JobQueue,
        progress: ProgressStore,
        artifacts: ArtifactStore,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        let max_concurrent_jobs = config.max_concurrent_jobs;
        let shutdown_timeout = config.shutdown_timeout;

        let ctx = Arc::new(PipelineContext {
            config,
            progress: Arc::new(progress),
            artifacts: Arc::new(artifacts),
        });

        Self {
            queue: Arc::new(queue),
            ctx,
            job_semaphore,
            shutdown,
            consumer_name,
            max_concurrent_jobs,
            shutdown_timeout,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and dispatch jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, available.min(5), 1000)
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (stream_id, job) in jobs {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(ctx, queue, stream_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute a single job and acknowledge its stream entry.
    async fn execute_job(
        ctx: Arc<PipelineContext>,
        queue: Arc<JobQueue>,
        stream_id: String,
        job: DownloadJob,
    ) {
        let request_id = job.request_id.clone();
        info!(%request_id, "executing job");

        match run_job(&ctx, &job).await {
            Ok(()) => {
                counter!("haul_jobs_total", "outcome" => "completed").increment(1);
                info!(%request_id, "job completed");
            }
            Err(e) => {
                counter!("haul_jobs_total", "outcome" => "failed").increment(1);
                error!(%request_id, error = %e, "job failed");
                // Safety net; a no-op when the pipeline already wrote
                // its terminal snapshot.
                let _ = ctx
                    .progress
                    .update(&request_id, ProgressUpdate::failed(e.to_string()))
                    .await;
                let _ = workdir::remove_request_dir(&ctx.config.work_dir, &request_id).await;
            }
        }

        // At-most-once: the entry is finished either way.
        if let Err(e) = queue.ack(&stream_id).await {
            error!(%request_id, error = %e, "failed to ack stream entry");
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
