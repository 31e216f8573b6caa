//! Slack data types and error definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} returned HTTP {status}")]
    Status {
        method: String,
        status: reqwest::StatusCode,
    },

    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which slice of `conversations.list` to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    /// Public and private channels
    Channels,
    /// Multi-person direct messages
    Groups,
    /// One-to-one direct messages
    DirectMessages,
}

impl ConversationKind {
    pub fn api_types(self) -> &'static str {
        match self {
            ConversationKind::Channels => "public_channel,private_channel",
            ConversationKind::Groups => "mpim",
            ConversationKind::DirectMessages => "im",
        }
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConversationKind::Channels => "channels",
            ConversationKind::Groups => "groups",
            ConversationKind::DirectMessages => "direct messages",
        };
        f.write_str(label)
    }
}

/// A channel, group, or DM as returned by `conversations.list`.
///
/// Only the fields the backup needs are typed; everything else rides along in
/// `extra` so the written JSON matches what the API returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    /// For DMs (is_im=true), this is the user ID of the other person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    /// Display name, falling back to the id for unnamed conversations
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.id)
    }

    pub fn is_private(&self) -> bool {
        self.is_private.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    /// Thread replies, attached by the crawler (not part of the history payload)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<Message>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn has_thread(&self) -> bool {
        self.reply_count.map(|c| c > 0).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackFile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private_download: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Extract a usable cursor; Slack signals the last page with an empty string.
pub(crate) fn next_cursor(meta: &Option<ResponseMetadata>) -> Option<String> {
    meta.as_ref()
        .and_then(|m| m.next_cursor.as_deref())
        .filter(|c| !c.is_empty())
        .map(String::from)
}

#[derive(Debug, Deserialize)]
pub struct ConversationsPage {
    #[serde(default)]
    pub channels: Vec<Conversation>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub members: Vec<User>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

/// Page shape shared by `conversations.history` and `conversations.replies`
#[derive(Debug, Deserialize)]
pub struct MessagesPage {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct FilesPage {
    #[serde(default)]
    pub files: Vec<SlackFile>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Auth test response info
#[derive(Debug, Clone)]
pub struct SlackAuthInfo {
    pub team_id: String,
    pub team_name: String,
    pub user_id: String,
    pub user_name: String,
}
