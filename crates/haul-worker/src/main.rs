//! Download worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use haul_queue::{ArtifactStore, JobQueue, ProgressStore};
use haul_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("haul=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting haul-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Reap request directories orphaned by a previous run.
    match haul_media::workdir::sweep_stale(&config.work_dir, config.sweep_max_age).await {
        Ok(0) => {}
        Ok(n) => info!("Swept {} stale request directories", n),
        Err(e) => warn!("Startup sweep failed: {}", e),
    }

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let progress = match ProgressStore::from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create progress store: {}", e);
            std::process::exit(1);
        }
    };

    let artifacts = match ArtifactStore::from_env() {
        Ok(a) => a,
        Err(e) => {
            error!("Failed to create artifact store: {}", e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(config, queue, progress, artifacts));

    // Setup signal handler
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
