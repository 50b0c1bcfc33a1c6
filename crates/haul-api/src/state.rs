//! Application state.

use std::sync::Arc;

use haul_media::SponsorBlockClient;
use haul_queue::{ArtifactStore, JobQueue, ProgressStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub queue: Arc<JobQueue>,
    pub progress: Arc<ProgressStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub sponsorblock: SponsorBlockClient,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let queue = JobQueue::from_env()?;
        queue.init().await?;

        let progress = ProgressStore::from_env()?;
        let artifacts = ArtifactStore::from_env()?;
        let sponsorblock = SponsorBlockClient::new();

        Ok(Self {
            config,
            queue: Arc::new(queue),
            progress: Arc::new(progress),
            artifacts: Arc::new(artifacts),
            sponsorblock,
        })
    }
}
