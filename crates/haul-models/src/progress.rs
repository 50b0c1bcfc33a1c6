//! Progress snapshots and their terminal-state rules.
//!
//! The progress store holds exactly one snapshot per request, overwritten in
//! place. All invariant logic lives here so the store itself stays thin:
//! percent never decreases, and a terminal snapshot (complete or errored)
//! accepts no further updates.

use serde::{Deserialize, Serialize};

/// Short machine-readable status label for the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    #[default]
    Queued,
    /// Work dir and cookies being prepared
    Preparing,
    /// Source being resolved into concrete items
    Resolving,
    /// Item list final, downloads about to start
    Starting,
    /// Transfer in flight
    Downloading,
    /// Pipeline post-processing an item
    Converting,
    /// All items done, collecting outputs
    Finishing,
    /// Packaging multiple outputs into an archive
    Compressing,
    /// Artifact staged, terminal write pending
    Ready,
    /// Terminal success
    Done,
    /// Terminal failure
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Preparing => "preparing",
            JobStatus::Resolving => "resolving",
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Converting => "converting",
            JobStatus::Finishing => "finishing",
            JobStatus::Compressing => "compressing",
            JobStatus::Ready => "ready",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

/// The latest known state of one request.
///
/// Written by the worker executing the job (after the submission endpoint
/// seeds the initial snapshot), read by the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Overall percent, 0..=100, monotonic non-decreasing.
    pub percent: u8,

    /// Stage label.
    pub status: JobStatus,

    /// Human-readable detail line.
    #[serde(default)]
    pub detail: String,

    /// Transfer speed ("1.4 MB/s"), empty outside transfer stages.
    #[serde(default)]
    pub speed: String,

    /// Transfer ETA ("3m 20s"), empty outside transfer stages.
    #[serde(default)]
    pub eta: String,

    /// Title of the item currently being fetched.
    #[serde(default)]
    pub current_item: String,

    /// Items fully finished so far.
    #[serde(default)]
    pub completed_items: u32,

    /// Total items in the job.
    #[serde(default = "one")]
    pub total_items: u32,

    /// Terminal success marker. Mutually exclusive with `error`.
    pub complete: bool,

    /// Terminal failure message. Mutually exclusive with `complete`.
    #[serde(default)]
    pub error: Option<String>,
}

fn one() -> u32 {
    1
}

impl ProgressSnapshot {
    /// The snapshot seeded at submission time.
    pub fn queued(total_items: u32) -> Self {
        Self {
            percent: 0,
            status: JobStatus::Queued,
            detail: "Waiting in queue".to_string(),
            speed: String::new(),
            eta: String::new(),
            current_item: String::new(),
            completed_items: 0,
            total_items: total_items.max(1),
            complete: false,
            error: None,
        }
    }

    /// Synthetic terminal snapshot for a request the store does not know,
    /// emitted by the stream endpoint when its liveness window elapses.
    pub fn stale() -> Self {
        Self {
            percent: 0,
            status: JobStatus::Error,
            detail: String::new(),
            speed: String::new(),
            eta: String::new(),
            current_item: String::new(),
            completed_items: 0,
            total_items: 1,
            complete: false,
            error: Some("Progress not found or expired".to_string()),
        }
    }

    /// Terminal means no further snapshot will ever follow.
    pub fn is_terminal(&self) -> bool {
        self.complete || self.error.is_some()
    }

    /// Merge an update into this snapshot.
    ///
    /// Returns false without touching anything when the snapshot is already
    /// terminal. Percent merges monotonically: a lower value keeps the
    /// current one.
    pub fn apply(&mut self, update: ProgressUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }

        if let Some(p) = update.percent {
            self.percent = self.percent.max(p.min(100));
        }
        if let Some(s) = update.status {
            self.status = s;
        }
        if let Some(d) = update.detail {
            self.detail = d;
        }
        if let Some(s) = update.speed {
            self.speed = s;
        }
        if let Some(e) = update.eta {
            self.eta = e;
        }
        if let Some(c) = update.current_item {
            self.current_item = c;
        }
        if let Some(n) = update.completed_items {
            self.completed_items = n;
        }
        if let Some(n) = update.total_items {
            self.total_items = n.max(1);
        }
        if let Some(c) = update.complete {
            self.complete = c;
        }
        if let Some(e) = update.error {
            self.error = Some(e);
        }

        true
    }
}

/// Partial overlay applied to the stored snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub status: Option<JobStatus>,
    pub detail: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub current_item: Option<String>,
    pub completed_items: Option<u32>,
    pub total_items: Option<u32>,
    pub complete: Option<bool>,
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// A plain milestone write: percent, stage, detail line.
    pub fn stage(percent: u8, status: JobStatus, detail: impl Into<String>) -> Self {
        Self {
            percent: Some(percent),
            status: Some(status),
            detail: Some(detail.into()),
            ..Default::default()
        }
    }

    /// Terminal success: 100%, complete, speed/eta cleared.
    pub fn completed() -> Self {
        Self {
            percent: Some(100),
            status: Some(JobStatus::Done),
            detail: Some("Ready to download".to_string()),
            speed: Some(String::new()),
            eta: Some(String::new()),
            complete: Some(true),
            ..Default::default()
        }
    }

    /// Terminal failure. Leaves `complete` false so the two terminal
    /// markers stay mutually exclusive.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(message.into()),
            speed: Some(String::new()),
            eta: Some(String::new()),
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_speed(mut self, speed: impl Into<String>) -> Self {
        self.speed = Some(speed.into());
        self
    }

    pub fn with_eta(mut self, eta: impl Into<String>) -> Self {
        self.eta = Some(eta.into());
        self
    }

    pub fn with_current_item(mut self, title: impl Into<String>) -> Self {
        self.current_item = Some(title.into());
        self
    }

    pub fn with_counts(mut self, completed: u32, total: u32) -> Self {
        self.completed_items = Some(completed);
        self.total_items = Some(total);
        self
    }
}

/// Format bytes/sec into a human-readable string.
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec <= 0.0 {
        return String::new();
    }
    if bytes_per_sec >= 1_048_576.0 {
        format!("{:.1} MB/s", bytes_per_sec / 1_048_576.0)
    } else if bytes_per_sec >= 1024.0 {
        format!("{:.0} KB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{} B/s", bytes_per_sec as u64)
    }
}

/// Format ETA seconds into a human-readable string.
pub fn format_eta(seconds: u64) -> String {
    if seconds == 0 {
        return String::new();
    }
    if seconds >= 3600 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a duration in seconds as `M:SS` for display.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_monotonic() {
        let mut snap = ProgressSnapshot::queued(1);
        assert!(snap.apply(ProgressUpdate::stage(40, JobStatus::Downloading, "item 1")));
        assert_eq!(snap.percent, 40);

        // A late, lower-percent write keeps the higher value
        assert!(snap.apply(ProgressUpdate::stage(25, JobStatus::Downloading, "retrying")));
        assert_eq!(snap.percent, 40);
        assert_eq!(snap.detail, "retrying");
    }

    #[test]
    fn test_percent_clamped_to_100() {
        let mut snap = ProgressSnapshot::queued(1);
        snap.apply(ProgressUpdate::stage(250, JobStatus::Downloading, ""));
        assert_eq!(snap.percent, 100);
    }

    #[test]
    fn test_terminal_success_shape() {
        let mut snap = ProgressSnapshot::queued(1);
        snap.apply(ProgressUpdate::stage(98, JobStatus::Ready, "Preparing download"));
        snap.apply(ProgressUpdate::completed());

        assert!(snap.complete);
        assert_eq!(snap.percent, 100);
        assert_eq!(snap.status, JobStatus::Done);
        assert!(snap.error.is_none());
        assert!(snap.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_mutually_exclusive() {
        let mut snap = ProgressSnapshot::queued(1);
        snap.apply(ProgressUpdate::failed("pipeline exploded"));

        assert!(!snap.complete);
        assert_eq!(snap.error.as_deref(), Some("pipeline exploded"));
        assert!(snap.is_terminal());
    }

    #[test]
    fn test_no_writes_after_terminal() {
        let mut snap = ProgressSnapshot::queued(1);
        snap.apply(ProgressUpdate::failed("boom"));

        // Neither a progress write nor a competing terminal write lands
        assert!(!snap.apply(ProgressUpdate::stage(50, JobStatus::Downloading, "late")));
        assert!(!snap.apply(ProgressUpdate::completed()));

        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert!(!snap.complete);
        assert_eq!(snap.status, JobStatus::Error);
    }

    #[test]
    fn test_stale_snapshot_is_terminal_error() {
        let snap = ProgressSnapshot::stale();
        assert!(snap.is_terminal());
        assert!(!snap.complete);
        assert!(snap.error.is_some());
    }

    #[test]
    fn test_transfer_fields() {
        let mut snap = ProgressSnapshot::queued(3);
        snap.apply(
            ProgressUpdate::stage(42, JobStatus::Downloading, "Some Song - Artist")
                .with_speed("1.4 MB/s")
                .with_eta("1m 5s")
                .with_current_item("Some Song - Artist")
                .with_counts(1, 3),
        );
        assert_eq!(snap.speed, "1.4 MB/s");
        assert_eq!(snap.eta, "1m 5s");
        assert_eq!(snap.completed_items, 1);
        assert_eq!(snap.total_items, 3);
    }

    #[test]
    fn test_snapshot_serde_shape() {
        let snap = ProgressSnapshot::queued(2);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"status\":\"queued\""));
        assert!(json.contains("\"percent\":0"));
        assert!(json.contains("\"complete\":false"));

        let back: ProgressSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(2_500_000.0), "2.4 MB/s");
        assert_eq!(format_speed(51_200.0), "50 KB/s");
        assert_eq!(format_speed(640.0), "640 B/s");
        assert_eq!(format_speed(0.0), "");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(7500), "2h 5m");
        assert_eq!(format_eta(200), "3m 20s");
        assert_eq!(format_eta(45), "45s");
        assert_eq!(format_eta(0), "");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(213.7), "3:33");
        assert_eq!(format_duration(59.0), "0:59");
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(-3.0), "0:00");
    }
}
