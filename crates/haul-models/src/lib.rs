//! Shared data models for the Haul download service.
//!
//! This crate provides Serde-serializable types for:
//! - Request identifiers and download requests
//! - User configuration with whitelist sanitization
//! - Per-item resolution (the config resolver)
//! - Progress snapshots and their terminal-state rules
//! - Artifact records

pub mod artifact;
pub mod config;
pub mod id;
pub mod progress;
pub mod request;
pub mod resolve;

// Re-export common types
pub use artifact::ArtifactRecord;
pub use config::{AudioFormat, MediaKind, Quality, SponsorCategory, UserConfig, VideoFormat};
pub use id::RequestId;
pub use progress::{
    format_duration, format_eta, format_speed, JobStatus, ProgressSnapshot, ProgressUpdate,
};
pub use request::{DownloadRequest, ItemOverride};
pub use resolve::{resolve, ResolvedItemSpec, TargetFormat};
