//! Exhaustive crawls built on the single-page calls in `client`.

use super::client::SlackClient;
use super::types::{next_cursor, Conversation, ConversationKind, Message, SlackError, SlackFile, User};

pub const DEFAULT_HISTORY_LIMIT: u32 = 1000;
pub const FILES_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct HistoryOptions {
    /// Page size requested from `conversations.history`
    pub limit: u32,
    /// Attach thread replies to every message that has them
    pub with_replies: bool,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
            with_replies: true,
        }
    }
}

/// A conversation's full history, newest message first as the API returns it
#[derive(Debug, Default)]
pub struct History {
    pub messages: Vec<Message>,
    /// Thread replies fetched across all `replies` arrays, parents excluded
    pub reply_count: usize,
}

impl SlackClient {
    pub async fn all_conversations(
        &self,
        kind: ConversationKind,
    ) -> Result<Vec<Conversation>, SlackError> {
        let mut conversations = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.conversations_list(kind, cursor.as_deref()).await?;
            conversations.extend(page.channels);

            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!("Listed {} {}", conversations.len(), kind);
        Ok(conversations)
    }

    pub async fn all_users(&self) -> Result<Vec<User>, SlackError> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.users_list(cursor.as_deref()).await?;
            users.extend(page.members);

            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!("Listed {} users", users.len());
        Ok(users)
    }

    /// Fetch every message in a conversation.
    ///
    /// Pages are chained with `next_cursor` when the API supplies one. Older
    /// responses only carry `has_more`; for those the next request is bounded by
    /// `latest` = the oldest `ts` collected so far.
    pub async fn history(
        &self,
        channel_id: &str,
        options: HistoryOptions,
    ) -> Result<History, SlackError> {
        let mut messages: Vec<Message> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut latest: Option<String> = None;

        loop {
            let page = self
                .conversations_history(
                    channel_id,
                    options.limit,
                    cursor.as_deref(),
                    latest.as_deref(),
                )
                .await?;

            let received = page.messages.len();
            let before = messages.len();
            let bound = latest.as_deref().and_then(ts_key);
            messages.extend(page.messages.into_iter().filter(|m| {
                match (bound, m.ts.as_deref().and_then(ts_key)) {
                    (Some(bound), Some(ts)) => ts < bound,
                    _ => true,
                }
            }));
            let added = messages.len() - before;

            tracing::debug!(
                "Got {} messages from {} ({} new, has_more: {})",
                received,
                channel_id,
                added,
                page.has_more
            );

            if !page.has_more {
                break;
            }

            if let Some(next) = next_cursor(&page.response_metadata) {
                cursor = Some(next);
                latest = None;
                continue;
            }

            // No cursor: fall back to paging by timestamp. The bound must move
            // strictly backwards or the same request would repeat forever.
            let oldest_ts = messages.last().and_then(|m| m.ts.clone());
            match oldest_ts {
                Some(ts) if added > 0 && latest.as_ref() != Some(&ts) => {
                    cursor = None;
                    latest = Some(ts);
                }
                _ => {
                    tracing::warn!(
                        "{} reported more history but gave no way to continue; stopping",
                        channel_id
                    );
                    break;
                }
            }
        }

        let mut reply_count = 0;
        if options.with_replies {
            for msg in messages.iter_mut().filter(|m| m.has_thread()) {
                let Some(ts) = msg.ts.clone() else {
                    continue;
                };
                let replies = self.thread(channel_id, &ts).await?;
                reply_count += replies
                    .iter()
                    .filter(|r| r.ts.as_deref() != Some(ts.as_str()))
                    .count();
                msg.replies = Some(replies);
            }
        }

        Ok(History {
            messages,
            reply_count,
        })
    }

    /// Fetch every message in one thread, parent included
    pub async fn thread(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>, SlackError> {
        let mut replies = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .conversations_replies(channel_id, thread_ts, cursor.as_deref())
                .await?;
            replies.extend(page.messages);

            if !page.has_more {
                break;
            }

            cursor = next_cursor(&page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(
            "Got {} replies for thread {} in {}",
            replies.len(),
            thread_ts,
            channel_id
        );
        Ok(replies)
    }

    /// `files.list` is page-numbered rather than cursor-based
    pub async fn all_files(&self, count: u32) -> Result<Vec<SlackFile>, SlackError> {
        let mut files = Vec::new();
        let mut page = 1;

        loop {
            let response = self.files_list(page, count).await?;
            files.extend(response.files);

            match response.paging {
                Some(paging) if paging.pages > page => page += 1,
                _ => break,
            }
        }

        tracing::debug!("Listed {} files", files.len());
        Ok(files)
    }
}

/// Order key for a Slack `ts` ("seconds.micros"); plain string order breaks
/// when the seconds part changes width.
fn ts_key(ts: &str) -> Option<(u64, u64)> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let secs = secs.parse().ok()?;
    let frac = format!("{:0<6}", frac);
    let micros = frac.get(..6)?.parse().ok()?;
    Some((secs, micros))
}
