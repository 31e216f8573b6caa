use std::path::{Path, PathBuf};

use serde::Serialize;

use super::BackupError;

/// Writes pretty-printed JSON documents under a fixed root directory
#[derive(Debug, Clone)]
pub struct JsonWriter {
    root: PathBuf,
}

impl JsonWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Serialize `value` to `root/relative`, creating parent directories as needed
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        relative: &Path,
        value: &T,
    ) -> Result<PathBuf, BackupError> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = serde_json::to_vec_pretty(value)?;
        body.push(b'\n');
        tokio::fs::write(&path, body).await?;

        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}
