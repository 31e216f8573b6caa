//! Slack Web API access
//!
//! `client` issues single requests; `paginate` chains them into complete
//! listings and conversation histories.

mod client;
mod paginate;
mod types;

pub use client::{SlackClient, SLACK_API_BASE};
pub use paginate::{History, HistoryOptions, DEFAULT_HISTORY_LIMIT, FILES_PAGE_SIZE};
pub use types::{
    Conversation, ConversationKind, ConversationsPage, FilesPage, Message, MessagesPage, Paging,
    ResponseMetadata, SlackAuthInfo, SlackError, SlackFile, User, UsersPage,
};
