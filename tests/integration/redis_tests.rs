//! Redis coordination integration tests.

use haul_models::{
    ArtifactRecord, DownloadRequest, JobStatus, ProgressUpdate, RequestId, UserConfig,
};
use haul_queue::{ArtifactStore, DownloadJob, JobQueue, ProgressStore};

/// Test Redis connection and basic operations.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    queue.ping().await.expect("Failed to ping Redis");
    let len = queue.len().await.expect("Failed to get queue length");
    println!("Queue length: {}", len);
}

/// Test job enqueue and consume cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_consume() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = DownloadJob::new(DownloadRequest::new(
        "https://www.youtube.com/watch?v=abc123def45",
        UserConfig::default(),
    ));
    let request_id = job.request_id.clone();

    let stream_id = queue.enqueue(&job).await.expect("Failed to enqueue");
    println!("Enqueued request {} as stream entry {}", request_id, stream_id);

    let jobs = queue
        .consume("test-consumer", 1, 1000)
        .await
        .expect("Failed to consume");

    assert_eq!(jobs.len(), 1);
    let (entry_id, consumed) = &jobs[0];
    assert_eq!(consumed.request_id, request_id);
    assert_eq!(consumed.request.source, job.request.source);

    queue.ack(entry_id).await.expect("Failed to ack");
}

/// Test the progress snapshot lifecycle: seed, update, terminal lock.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_lifecycle() {
    dotenvy::dotenv().ok();

    let progress = ProgressStore::from_env().expect("Failed to create progress store");
    let id = RequestId::new();

    progress.seed(&id, 2).await.expect("Failed to seed");

    let snapshot = progress
        .read(&id)
        .await
        .expect("Failed to read")
        .expect("Snapshot missing after seed");
    assert_eq!(snapshot.percent, 0);
    assert_eq!(snapshot.status, JobStatus::Queued);
    assert_eq!(snapshot.total_items, 2);

    // Forward progress applies
    let applied = progress
        .update(&id, ProgressUpdate::stage(40, JobStatus::Downloading, "Downloading..."))
        .await
        .expect("Failed to update");
    assert!(applied);

    // A lower percent keeps the stored one
    progress
        .update(&id, ProgressUpdate::stage(10, JobStatus::Downloading, "Downloading..."))
        .await
        .expect("Failed to update");
    let snapshot = progress.read(&id).await.unwrap().unwrap();
    assert_eq!(snapshot.percent, 40);

    // Terminal write locks the snapshot
    progress
        .update(&id, ProgressUpdate::completed())
        .await
        .expect("Failed to complete");
    let rejected = progress
        .update(&id, ProgressUpdate::stage(50, JobStatus::Downloading, "late write"))
        .await
        .expect("Failed to update");
    assert!(!rejected);

    let snapshot = progress.read(&id).await.unwrap().unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.percent, 100);

    progress.remove(&id).await.expect("Failed to remove");
    assert!(progress.read(&id).await.unwrap().is_none());
}

/// Test that artifact records are claimed exactly once.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_artifact_single_serve() {
    dotenvy::dotenv().ok();

    let artifacts = ArtifactStore::from_env().expect("Failed to create artifact store");
    let id = RequestId::new();
    let record = ArtifactRecord::new(id.clone(), "/tmp/haul/test/song.mp3", 4096);

    artifacts.put(&record).await.expect("Failed to put");

    let first = artifacts.take(&id).await.expect("Failed to take");
    assert_eq!(first, Some(record));

    // Second claim must come back empty
    let second = artifacts.take(&id).await.expect("Failed to take");
    assert!(second.is_none());
}
