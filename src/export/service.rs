//! Slack backup service

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::layout::{self, OutputLayout};
use super::writer::JsonWriter;
use super::{BackupError, BackupSummary};
use crate::slack::{
    Conversation, ConversationKind, HistoryOptions, SlackClient, SlackFile, User, FILES_PAGE_SIZE,
};

const FILE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub layout: OutputLayout,
    pub history: HistoryOptions,
    pub download_files: bool,
    /// Record per-conversation and per-file failures instead of aborting
    pub continue_on_error: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            layout: OutputLayout::default(),
            history: HistoryOptions::default(),
            download_files: true,
            continue_on_error: false,
        }
    }
}

/// user id -> user name, used for DM and file naming
type UserNames<'a> = HashMap<&'a str, &'a str>;

pub struct BackupService {
    client: SlackClient,
    writer: JsonWriter,
    options: BackupOptions,
    /// Conversation history paths already written in this run
    written: Mutex<HashSet<PathBuf>>,
}

impl BackupService {
    pub fn new(client: SlackClient, out_dir: impl Into<PathBuf>, options: BackupOptions) -> Self {
        Self {
            client,
            writer: JsonWriter::new(out_dir),
            options,
            written: Mutex::new(HashSet::new()),
        }
    }

    pub async fn run(&self) -> Result<BackupSummary, BackupError> {
        let mut summary = BackupSummary::default();

        let auth = self.client.auth_test().await?;
        tracing::info!(
            "Backing up workspace {} ({}) as {} into {}",
            auth.team_name,
            auth.team_id,
            auth.user_name,
            self.writer.root().display()
        );

        self.backup_channels(&mut summary).await?;
        self.backup_groups(&mut summary).await?;

        let users = self.client.all_users().await?;
        self.writer
            .write(&layout::render(&self.options.layout.user_list, &[])?, &users)
            .await?;
        summary.users = users.len();
        tracing::info!("Saved {} users", users.len());

        let names = user_names(&users);

        self.backup_direct_messages(&names, &mut summary).await?;

        if self.options.download_files {
            self.backup_files(&names, &mut summary).await?;
        } else {
            tracing::info!("Skipping file downloads");
        }

        Ok(summary)
    }

    async fn backup_channels(&self, summary: &mut BackupSummary) -> Result<(), BackupError> {
        let layout = &self.options.layout;
        let channels = self.list_conversations(ConversationKind::Channels, &layout.channel_list).await?;

        for channel in &channels {
            let template = if channel.is_private() {
                &layout.private_channel_history
            } else {
                &layout.channel_history
            };
            let vars = [("name", channel.display_name()), ("id", channel.id.as_str())];

            if let Err(e) = self.backup_conversation(channel, template, &vars, summary).await {
                self.record_failure(&format!("channel {}", channel.display_name()), e, summary)?;
            }
        }

        Ok(())
    }

    async fn backup_groups(&self, summary: &mut BackupSummary) -> Result<(), BackupError> {
        let layout = &self.options.layout;
        let groups = self.list_conversations(ConversationKind::Groups, &layout.group_list).await?;

        for group in &groups {
            let vars = [("name", group.display_name()), ("id", group.id.as_str())];

            if let Err(e) = self
                .backup_conversation(group, &layout.group_history, &vars, summary)
                .await
            {
                self.record_failure(&format!("group {}", group.display_name()), e, summary)?;
            }
        }

        Ok(())
    }

    async fn backup_direct_messages(
        &self,
        names: &UserNames<'_>,
        summary: &mut BackupSummary,
    ) -> Result<(), BackupError> {
        let layout = &self.options.layout;
        let conversations = self
            .list_conversations(ConversationKind::DirectMessages, &layout.direct_message_list)
            .await?;

        for conversation in &conversations {
            let user_id = conversation.user.as_deref().unwrap_or("unknown");
            let user_name = names.get(user_id).copied().unwrap_or(user_id);
            let vars = [
                ("user_name", user_name),
                ("user_id", user_id),
                ("id", conversation.id.as_str()),
            ];

            if let Err(e) = self
                .backup_conversation(conversation, &layout.direct_message_history, &vars, summary)
                .await
            {
                self.record_failure(&format!("direct messages with {}", user_name), e, summary)?;
            }
        }

        Ok(())
    }

    async fn backup_files(
        &self,
        names: &UserNames<'_>,
        summary: &mut BackupSummary,
    ) -> Result<(), BackupError> {
        let files = self.client.all_files(FILES_PAGE_SIZE).await?;
        self.writer
            .write(&layout::render(&self.options.layout.file_list, &[])?, &files)
            .await?;
        tracing::info!("Saved list of {} files", files.len());

        for file in &files {
            let Some(url) = file.url_private_download.as_deref() else {
                tracing::debug!("File {} has no download URL, skipping", file.id);
                summary.files_skipped += 1;
                continue;
            };

            match self.download_file(file, url, names).await {
                Ok(bytes) => {
                    summary.files_downloaded += 1;
                    summary.bytes_downloaded += bytes;
                }
                Err(e) => self.record_failure(&format!("file {}", file.id), e, summary)?,
            }
        }

        Ok(())
    }

    async fn list_conversations(
        &self,
        kind: ConversationKind,
        list_template: &str,
    ) -> Result<Vec<Conversation>, BackupError> {
        let conversations = self.client.all_conversations(kind).await?;
        self.writer
            .write(&layout::render(list_template, &[])?, &conversations)
            .await?;
        tracing::info!("Found {} {}", conversations.len(), kind);
        Ok(conversations)
    }

    async fn backup_conversation(
        &self,
        conversation: &Conversation,
        template: &str,
        vars: &[(&str, &str)],
        summary: &mut BackupSummary,
    ) -> Result<(), BackupError> {
        let relative = layout::render(template, vars)?;
        let history = self
            .client
            .history(&conversation.id, self.options.history)
            .await?;
        let relative = self.claim_path(relative, &conversation.id).await;
        let path = self.writer.write(&relative, &history.messages).await?;

        tracing::info!(
            "Saved {} messages ({} replies) from {} to {}",
            history.messages.len(),
            history.reply_count,
            conversation.display_name(),
            path.display()
        );

        summary.conversations += 1;
        summary.messages += history.messages.len();
        summary.replies += history.reply_count;
        Ok(())
    }

    /// Reserve a history path, moving to an id-suffixed name when another
    /// conversation already rendered to the same file.
    async fn claim_path(&self, relative: PathBuf, id: &str) -> PathBuf {
        let mut written = self.written.lock().await;
        if written.insert(relative.clone()) {
            return relative;
        }

        let fallback = with_id_suffix(&relative, id);
        tracing::warn!(
            "{} was already written in this run, saving {} to {}",
            relative.display(),
            id,
            fallback.display()
        );
        written.insert(fallback.clone());
        fallback
    }

    async fn download_file(
        &self,
        file: &SlackFile,
        url: &str,
        names: &UserNames<'_>,
    ) -> Result<u64, BackupError> {
        let vars = file_vars(file, names);
        let vars: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let dest = self
            .writer
            .resolve(&layout::render(&self.options.layout.file_download, &vars)?);

        tracing::info!("Downloading to {}", dest.display());
        Ok(self.client.download(url, &dest).await?)
    }

    fn record_failure(
        &self,
        what: &str,
        error: BackupError,
        summary: &mut BackupSummary,
    ) -> Result<(), BackupError> {
        if !self.options.continue_on_error {
            return Err(error);
        }

        tracing::error!("Failed to back up {}: {}", what, error);
        summary.errors.push(format!("{}: {}", what, error));
        Ok(())
    }
}

/// user id -> name, leaving out members without a usable name
fn user_names(users: &[User]) -> UserNames<'_> {
    users
        .iter()
        .filter_map(|u| {
            u.name
                .as_deref()
                .filter(|n| !n.is_empty())
                .map(|n| (u.id.as_str(), n))
        })
        .collect()
}

/// `channels/a_b.json` -> `channels/a_b_C2.json`
fn with_id_suffix(path: &Path, id: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{}_{}", stem, layout::sanitize_component(id));
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Template values for a file download path
fn file_vars(file: &SlackFile, names: &UserNames<'_>) -> [(&'static str, String); 6] {
    let user = file.user.as_deref().unwrap_or("unknown");
    let author = names.get(user).copied().unwrap_or(user);
    let name = file.name.as_deref().unwrap_or(&file.id);
    let title = file.title.as_deref().unwrap_or(name);
    let date = file
        .timestamp
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format(FILE_DATE_FORMAT).to_string())
        .unwrap_or_else(|| "unknown-date".to_string());

    [
        ("id", file.id.clone()),
        ("name", name.to_string()),
        ("title", title.to_string()),
        ("author", author.to_string()),
        ("user", user.to_string()),
        ("date", date),
    ]
}
