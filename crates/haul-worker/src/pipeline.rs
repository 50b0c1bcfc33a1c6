//! The download pipeline for one job.
//!
//! Stages and their overall percent milestones:
//!
//! 1. resolve the request into item specs (5, 10)
//! 2. announce the item count (15)
//! 3. fetch items one at a time, mapping per-item transfer progress
//!    into the 15..90 band (partial failures are tolerated)
//! 4. stage the artifact: the lone file as-is, or a ZIP bundle (90, 92)
//! 5. register the artifact record and write the terminal snapshot (98, 100)
//!
//! A job fails only when every item fails; the terminal failure snapshot
//! carries the first item error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{info, warn};

use haul_media::{
    create_zip, stage_cookies, workdir, ItemEvent, MediaResult, YtdlpCommand, YtdlpRunner,
};
use haul_models::{
    format_eta, format_speed, resolve, ArtifactRecord, JobStatus, ProgressUpdate, RequestId,
    ResolvedItemSpec,
};
use haul_queue::{ArtifactStore, DownloadJob, ProgressStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Live transfer writes are throttled to this interval per item.
const PROGRESS_WRITE_INTERVAL: Duration = Duration::from_millis(250);

/// The transfer phase occupies the 15..90 band of overall percent.
const TRANSFER_FLOOR: f64 = 15.0;
const TRANSFER_SPAN: f64 = 75.0;
const TRANSFER_CEILING: u8 = 90;

const ZIP_FILE_NAME: &str = "haul-download.zip";

/// Shared handles the pipeline needs for every job.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub progress: Arc<ProgressStore>,
    pub artifacts: Arc<ArtifactStore>,
}

/// Run one job to a terminal state.
///
/// On failure the terminal snapshot is written before the error is
/// returned, so callers only need the `Err` for logging and metrics.
pub async fn run_job(ctx: &PipelineContext, job: &DownloadJob) -> WorkerResult<()> {
    let id = &job.request_id;
    info!(request_id = %id, items = job.item_count(), "starting download job");

    ctx.progress
        .update(id, ProgressUpdate::stage(5, JobStatus::Preparing, "Analyzing request"))
        .await?;

    let specs = resolve(&job.request);
    if specs.is_empty() {
        return fail_job(ctx, id, "Nothing to download".to_string()).await;
    }

    ctx.progress
        .update(id, ProgressUpdate::stage(10, JobStatus::Resolving, "Processing link"))
        .await?;

    let total = specs.len() as u32;
    ctx.progress
        .update(
            id,
            ProgressUpdate::stage(
                15,
                JobStatus::Starting,
                format!("{total} item(s) to download"),
            )
            .with_counts(0, total),
        )
        .await?;

    let request_dir = workdir::request_dir(&ctx.config.work_dir, id);
    let cookies = stage_cookies(&job.request.config.cookies, &request_dir).await?;

    let mut outputs: Vec<PathBuf> = Vec::new();
    let mut failures: Vec<String> = Vec::new();

    for (index, spec) in specs.iter().enumerate() {
        let completed = outputs.len() as u32;
        match download_item(ctx, id, spec, index, completed, total, cookies.as_deref()).await {
            Ok(path) => {
                outputs.push(path);
                let update = ProgressUpdate::stage(
                    transfer_percent(outputs.len() as u32, total, 0.0),
                    JobStatus::Downloading,
                    "Downloading",
                )
                .with_counts(outputs.len() as u32, total);
                ctx.progress.update(id, update).await?;
            }
            Err(e) => {
                warn!(request_id = %id, item = index, url = %spec.url, error = %e, "item failed");
                failures.push(e.to_string());
            }
        }
    }

    if outputs.is_empty() {
        workdir::remove_request_dir(&ctx.config.work_dir, id).await.ok();
        let mut message = failures
            .first()
            .cloned()
            .unwrap_or_else(|| "All items failed".to_string());
        if failures.len() > 1 {
            message = format!("{message} (and {} more failures)", failures.len() - 1);
        }
        return fail_job(ctx, id, message).await;
    }

    ctx.progress
        .update(
            id,
            ProgressUpdate::stage(90, JobStatus::Finishing, "Processing downloaded files"),
        )
        .await?;

    let artifact_path = stage_artifact(ctx, id, &request_dir, &outputs).await?;

    let size = tokio::fs::metadata(&artifact_path).await?.len();
    let record = ArtifactRecord::new(id.clone(), artifact_path, size);

    ctx.progress
        .update(id, ProgressUpdate::stage(98, JobStatus::Ready, "Preparing download"))
        .await?;

    ctx.artifacts.put(&record).await?;
    workdir::remove_items_dir(&ctx.config.work_dir, id).await.ok();

    let mut update = ProgressUpdate::completed().with_counts(outputs.len() as u32, total);
    if !failures.is_empty() {
        update = update.with_detail(format!(
            "Ready to download ({} of {total} items; {} failed)",
            outputs.len(),
            failures.len(),
        ));
    }
    ctx.progress.update(id, update).await?;

    info!(
        request_id = %id,
        items = outputs.len(),
        failed = failures.len(),
        artifact = %record.filename,
        "download job complete"
    );
    Ok(())
}

/// Move a lone output into place, or bundle several into a ZIP.
async fn stage_artifact(
    ctx: &PipelineContext,
    id: &RequestId,
    request_dir: &Path,
    outputs: &[PathBuf],
) -> WorkerResult<PathBuf> {
    if let [single] = outputs {
        let name = single
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let dest = request_dir.join(name);
        tokio::fs::rename(single, &dest).await?;
        return Ok(dest);
    }

    ctx.progress
        .update(
            id,
            ProgressUpdate::stage(92, JobStatus::Compressing, "Creating ZIP file"),
        )
        .await?;
    let dest = request_dir.join(ZIP_FILE_NAME);
    create_zip(outputs.to_vec(), dest.clone()).await?;
    Ok(dest)
}

/// Download one item into its own directory, reporting live progress.
async fn download_item(
    ctx: &PipelineContext,
    id: &RequestId,
    spec: &ResolvedItemSpec,
    index: usize,
    completed: u32,
    total: u32,
    cookies: Option<&Path>,
) -> MediaResult<PathBuf> {
    let dest = workdir::item_dir(&ctx.config.work_dir, id, index);
    let mut cmd = YtdlpCommand::new(spec, &dest);
    if let Some(path) = cookies {
        cmd = cmd.cookies(path);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report_item_progress(
        Arc::clone(&ctx.progress),
        id.clone(),
        spec.url.clone(),
        completed,
        total,
        rx,
    ));

    let runner = YtdlpRunner::new().with_timeout(ctx.config.item_timeout.as_secs());
    let result = runner
        .run(&cmd, move |event| {
            let _ = tx.send(event);
        })
        .await;

    let _ = reporter.await;
    result
}

/// Drain item events into throttled progress-store writes.
async fn report_item_progress(
    progress: Arc<ProgressStore>,
    id: RequestId,
    item_url: String,
    completed: u32,
    total: u32,
    mut rx: mpsc::UnboundedReceiver<ItemEvent>,
) {
    let mut last_write: Option<Instant> = None;
    let mut converting = false;

    while let Some(event) = rx.recv().await {
        let update = match event {
            ItemEvent::Progress(p) => {
                // Late transfer lines after a postprocessor started are noise.
                if converting {
                    continue;
                }
                if last_write.is_some_and(|t| t.elapsed() < PROGRESS_WRITE_INTERVAL) {
                    continue;
                }
                last_write = Some(Instant::now());

                ProgressUpdate::stage(
                    transfer_percent(completed, total, p.percent),
                    JobStatus::Downloading,
                    "Downloading",
                )
                .with_counts(completed, total)
                .with_current_item(item_url.clone())
                .with_speed(p.speed.map(format_speed).unwrap_or_default())
                .with_eta(p.eta.map(format_eta).unwrap_or_default())
            }
            ItemEvent::Converting => {
                if converting {
                    continue;
                }
                converting = true;

                ProgressUpdate::stage(
                    transfer_percent(completed, total, 100.0),
                    JobStatus::Converting,
                    "Converting",
                )
                .with_speed("")
                .with_eta("")
            }
        };

        if let Err(e) = progress.update(&id, update).await {
            warn!(request_id = %id, error = %e, "progress write failed");
        }
    }
}

/// Write the terminal failure snapshot, then surface the error.
async fn fail_job(ctx: &PipelineContext, id: &RequestId, message: String) -> WorkerResult<()> {
    ctx.progress
        .update(id, ProgressUpdate::failed(message.clone()))
        .await?;
    Err(WorkerError::JobFailed(message))
}

/// Overall percent during the transfer phase.
///
/// Finished items weigh evenly; the live item contributes its own
/// fraction. Truncated, and capped below the finishing milestones.
fn transfer_percent(completed: u32, total: u32, item_percent: f64) -> u8 {
    let total = total.max(1) as f64;
    let done = completed as f64 + (item_percent / 100.0).clamp(0.0, 1.0);
    let overall = TRANSFER_FLOOR + done / total * TRANSFER_SPAN;
    (overall as u8).min(TRANSFER_CEILING)
}
