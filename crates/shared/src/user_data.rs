//! Per-viewer relations layered on top of bookmarks.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BookmarkId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub bookmark_id: BookmarkId,
    pub visited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub likes: BTreeSet<BookmarkId>,
    #[serde(default)]
    pub pinned: BTreeSet<BookmarkId>,
    #[serde(default)]
    pub read_later: BTreeSet<BookmarkId>,
    #[serde(default)]
    pub favorites: BTreeSet<BookmarkId>,
    /// Most recent visit first; each bookmark appears at most once.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl UserData {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn record_visit(&mut self, bookmark_id: &BookmarkId, visited_at: DateTime<Utc>) {
        self.history.retain(|entry| &entry.bookmark_id != bookmark_id);
        self.history.insert(
            0,
            HistoryEntry {
                bookmark_id: bookmark_id.clone(),
                visited_at,
            },
        );
    }

    /// Drops every relation and history entry pointing at `bookmark_id`.
    /// Returns whether anything was removed.
    pub fn forget(&mut self, bookmark_id: &BookmarkId) -> bool {
        let history_len = self.history.len();
        self.history.retain(|entry| &entry.bookmark_id != bookmark_id);
        let removed_from_sets = [
            self.likes.remove(bookmark_id),
            self.pinned.remove(bookmark_id),
            self.read_later.remove(bookmark_id),
            self.favorites.remove(bookmark_id),
        ];
        removed_from_sets.contains(&true) || history_len != self.history.len()
    }

    pub fn references(&self, bookmark_id: &BookmarkId) -> bool {
        self.likes.contains(bookmark_id)
            || self.pinned.contains(bookmark_id)
            || self.read_later.contains(bookmark_id)
            || self.favorites.contains(bookmark_id)
            || self
                .history
                .iter()
                .any(|entry| &entry.bookmark_id == bookmark_id)
    }
}
