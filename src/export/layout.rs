//! Output filename templates.
//!
//! Templates use `{key}` placeholders, e.g. `channels/{name}.json`. Every
//! substituted value becomes exactly one path component.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("unknown placeholder {{{key}}} in template {template:?}")]
    UnknownKey { key: String, template: String },

    #[error("unterminated placeholder in template {0:?}")]
    Unterminated(String),
}

/// Where each piece of the backup lands, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    pub channel_list: String,
    pub channel_history: String,
    pub private_channel_history: String,
    pub group_list: String,
    pub group_history: String,
    pub user_list: String,
    pub direct_message_list: String,
    pub direct_message_history: String,
    pub file_list: String,
    pub file_download: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            channel_list: "channels.json".into(),
            channel_history: "channels/{name}.json".into(),
            private_channel_history: "private_channels/{name}.json".into(),
            group_list: "groups.json".into(),
            group_history: "groups/{name}.json".into(),
            user_list: "users.json".into(),
            direct_message_list: "direct_messages.json".into(),
            direct_message_history: "direct_messages/{user_name}_{user_id}.json".into(),
            file_list: "files.json".into(),
            file_download: "files/{author}/{date}_{id}_{name}".into(),
        }
    }
}

/// Expand `template` with `vars`. `{{` and `}}` produce literal braces.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<PathBuf, LayoutError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => return Err(LayoutError::Unterminated(template.to_string())),
                    }
                }

                let value = vars
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| LayoutError::UnknownKey {
                        key,
                        template: template.to_string(),
                    })?;
                out.push_str(&sanitize_component(value));
            }
            _ => out.push(c),
        }
    }

    Ok(PathBuf::from(out.trim_start_matches('/')))
}

/// Make `value` safe to use as a single file or directory name
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
