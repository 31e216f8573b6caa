//! Command-line interface and run configuration

use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::export::{BackupOptions, OutputLayout};
use crate::slack::{HistoryOptions, DEFAULT_HISTORY_LIMIT, SLACK_API_BASE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Slack token is empty")]
    EmptyToken,

    #[error("--history-limit must be at least 1")]
    InvalidHistoryLimit,

    #[error("Failed to read layout file {path}: {source}")]
    ReadLayout {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse layout file {path}: {source}")]
    ParseLayout {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Back up Slack channels, conversations, users, and direct messages.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Slack API access token
    #[arg(short, long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Output directory to store JSON backup files
    #[arg(short, long, alias = "outDir", default_value = "./output", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// JSON file overriding output filename templates
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Slack Web API base URL
    #[arg(long, env = "SLACK_API_BASE", default_value = SLACK_API_BASE, value_name = "URL")]
    pub api_base: String,

    /// Messages requested per conversations.history page
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT, value_name = "N")]
    pub history_limit: u32,

    /// Do not fetch thread replies
    #[arg(long)]
    pub no_replies: bool,

    /// Do not list or download files
    #[arg(long)]
    pub skip_files: bool,

    /// Log and skip conversations or files that fail instead of aborting
    #[arg(long)]
    pub continue_on_error: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings for one backup run
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub token: String,
    pub api_base: String,
    pub out_dir: PathBuf,
    pub options: BackupOptions,
}

impl BackupConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let token = cli.token.trim();
        if token.is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        if cli.history_limit == 0 {
            return Err(ConfigError::InvalidHistoryLimit);
        }

        let layout = match &cli.config {
            Some(path) => load_layout(path)?,
            None => OutputLayout::default(),
        };

        Ok(Self {
            token: token.to_string(),
            api_base: cli.api_base.clone(),
            out_dir: cli.out_dir.clone(),
            options: BackupOptions {
                layout,
                history: HistoryOptions {
                    limit: cli.history_limit,
                    with_replies: !cli.no_replies,
                },
                download_files: !cli.skip_files,
                continue_on_error: cli.continue_on_error,
            },
        })
    }
}

/// Load filename templates; fields missing from the file keep their defaults
pub fn load_layout(path: &Path) -> Result<OutputLayout, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadLayout {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::ParseLayout {
        path: path.to_path_buf(),
        source,
    })
}
