use clap::Parser;
use slack_backup::{BackupConfig, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "slack_backup=debug"
    } else {
        "slack_backup=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = BackupConfig::from_cli(&cli)?;
    let summary = slack_backup::run(&config).await?;

    tracing::info!(
        "Backup complete: {} conversations, {} messages, {} thread replies, {} users, {} files ({} bytes), {} skipped",
        summary.conversations,
        summary.messages,
        summary.replies,
        summary.users,
        summary.files_downloaded,
        summary.bytes_downloaded,
        summary.files_skipped
    );

    if !summary.errors.is_empty() {
        for error in &summary.errors {
            tracing::warn!("{}", error);
        }
        anyhow::bail!("{} item(s) failed to back up", summary.errors.len());
    }

    Ok(())
}
