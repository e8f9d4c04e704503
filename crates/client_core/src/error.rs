use std::path::PathBuf;

use shared::domain::BookmarkId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("failed to delete bookmark {bookmark_id}: {source}")]
    Backend {
        bookmark_id: BookmarkId,
        source: anyhow::Error,
    },
}

impl DeletionError {
    pub fn bookmark_id(&self) -> &BookmarkId {
        match self {
            DeletionError::Backend { bookmark_id, .. } => bookmark_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
