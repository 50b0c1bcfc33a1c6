use chrono::{DateTime, Utc};
use haul_models::{DownloadRequest, RequestId};
use serde::{Deserialize, Serialize};

/// A download request as it travels through the Redis stream.
///
/// The job carries the full request verbatim so workers can resolve it
/// without a second round trip to the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Identifier shared with the progress and artifact keys.
    pub request_id: RequestId,
    /// The validated request exactly as the client submitted it.
    pub request: DownloadRequest,
    /// When the job was accepted by the API.
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(request: DownloadRequest) -> Self {
        Self {
            request_id: RequestId::new(),
            request,
            created_at: Utc::now(),
        }
    }

    /// Number of items the worker will attempt for this job.
    pub fn item_count(&self) -> usize {
        self.request.item_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_models::UserConfig;

    #[test]
    fn job_roundtrips_through_json() {
        let job = DownloadJob::new(DownloadRequest::new(
            "https://youtu.be/abc123".to_string(),
            UserConfig::default(),
        ));

        let json = serde_json::to_string(&job).unwrap();
        let back: DownloadJob = serde_json::from_str(&json).unwrap();

        assert_eq!(back.request_id, job.request_id);
        assert_eq!(back.request.source, job.request.source);
        assert_eq!(back.item_count(), 1);
    }

    #[test]
    fn fresh_jobs_get_distinct_ids() {
        let a = DownloadJob::new(DownloadRequest::new("x".to_string(), UserConfig::default()));
        let b = DownloadJob::new(DownloadRequest::new("x".to_string(), UserConfig::default()));
        assert_ne!(a.request_id, b.request_id);
    }
}
