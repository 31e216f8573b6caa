//! Back up a Slack workspace (channels, group DMs, direct messages, users, and
//! files) to JSON and binary files on local disk.
pub mod config;
pub mod export;
pub mod slack;

pub use config::{BackupConfig, Cli};
pub use export::{BackupError, BackupService, BackupSummary};
pub use slack::SlackClient;

/// Build the client and service from `config` and run one full backup
pub async fn run(config: &BackupConfig) -> Result<BackupSummary, BackupError> {
    let client = SlackClient::new(config.token.clone()).with_api_base(config.api_base.as_str());
    BackupService::new(client, &config.out_dir, config.options.clone())
        .run()
        .await
}
