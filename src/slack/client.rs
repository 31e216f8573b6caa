//! Slack Web API client. Each method issues exactly one request.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use super::types::{
    ConversationKind, ConversationsPage, FilesPage, MessagesPage, SlackAuthInfo, SlackError,
    UsersPage,
};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

const CONVERSATIONS_PAGE_LIMIT: &str = "1000";
const USERS_PAGE_LIMIT: &str = "200";

#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    access_token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(access_token: String) -> Self {
        Self {
            http: Client::new(),
            access_token,
            api_base: SLACK_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root (Enterprise Grid proxies, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        tracing::debug!("GET {} {:?}", method, params);

        let response = self
            .http
            .get(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SlackError::Status {
                method: method.to_string(),
                status: response.status(),
            });
        }

        let json: serde_json::Value = response.json().await?;

        if !json["ok"].as_bool().unwrap_or(false) {
            return Err(SlackError::Api {
                method: method.to_string(),
                error: json["error"]
                    .as_str()
                    .unwrap_or("unknown_error")
                    .to_string(),
            });
        }

        Ok(serde_json::from_value(json)?)
    }

    /// Test the token and get auth info (team, user)
    pub async fn auth_test(&self) -> Result<SlackAuthInfo, SlackError> {
        let json: serde_json::Value = self.call("auth.test", &[]).await?;

        Ok(SlackAuthInfo {
            team_id: json["team_id"].as_str().unwrap_or_default().to_string(),
            team_name: json["team"].as_str().unwrap_or_default().to_string(),
            user_id: json["user_id"].as_str().unwrap_or_default().to_string(),
            user_name: json["user"].as_str().unwrap_or_default().to_string(),
        })
    }

    pub async fn conversations_list(
        &self,
        kind: ConversationKind,
        cursor: Option<&str>,
    ) -> Result<ConversationsPage, SlackError> {
        let mut params = vec![
            ("types", kind.api_types().to_string()),
            ("limit", CONVERSATIONS_PAGE_LIMIT.to_string()),
            ("exclude_archived", "false".to_string()),
        ];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }

        self.call("conversations.list", &params).await
    }

    pub async fn users_list(&self, cursor: Option<&str>) -> Result<UsersPage, SlackError> {
        let mut params = vec![("limit", USERS_PAGE_LIMIT.to_string())];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }

        self.call("users.list", &params).await
    }

    /// One page of channel history. `latest` bounds the page from above (exclusive).
    pub async fn conversations_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
        latest: Option<&str>,
    ) -> Result<MessagesPage, SlackError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }
        if let Some(ts) = latest {
            params.push(("latest", ts.to_string()));
        }

        self.call("conversations.history", &params).await
    }

    /// One page of a thread, parent message included
    pub async fn conversations_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<MessagesPage, SlackError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("ts", thread_ts.to_string()),
        ];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }

        self.call("conversations.replies", &params).await
    }

    pub async fn files_list(&self, page: u32, count: u32) -> Result<FilesPage, SlackError> {
        let params = [
            ("count", count.to_string()),
            ("page", page.to_string()),
            ("show_files_hidden_by_limit", "true".to_string()),
        ];

        self.call("files.list", &params).await
    }

    /// Stream a private file to `dest`, creating parent directories. Returns bytes written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, SlackError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SlackError::Status {
                method: "file download".to_string(),
                status: response.status(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Stream into a sibling file so an interrupted transfer never looks complete
        let partial = partial_path(dest);
        match stream_to_file(response, &partial).await {
            Ok(bytes_written) => {
                tokio::fs::rename(&partial, dest).await?;
                Ok(bytes_written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!("Could not remove {}: {}", partial.display(), cleanup);
                }
                Err(e)
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, SlackError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(bytes_written)
}
