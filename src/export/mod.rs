//! Backup orchestration: crawl the workspace and write it to disk.

pub mod layout;
mod service;
mod writer;

use serde::Serialize;
use thiserror::Error;

use crate::slack::SlackError;

pub use layout::{LayoutError, OutputLayout};
pub use service::{BackupOptions, BackupService};
pub use writer::JsonWriter;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Slack(#[from] SlackError),

    #[error("Invalid output layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Totals for one backup run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupSummary {
    pub conversations: usize,
    pub messages: usize,
    pub replies: usize,
    pub users: usize,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub bytes_downloaded: u64,
    /// Failures tolerated under `continue_on_error`
    pub errors: Vec<String>,
}
