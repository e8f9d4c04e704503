use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use shared::domain::{Bookmark, BookmarkId};
use tracing::{info, warn};

use crate::{MyBookmarksCache, PublicBookmarksCache, UserDataCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    PublicListing,
    UserData,
    MyBookmarks,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::PublicListing => "public_listing",
            CacheKind::UserData => "user_data",
            CacheKind::MyBookmarks => "my_bookmarks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheFailure {
    pub cache: CacheKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    pub bookmark_id: BookmarkId,
    pub attempted: Vec<CacheKind>,
    pub failures: Vec<CacheFailure>,
}

impl InvalidationReport {
    fn new(bookmark_id: BookmarkId) -> Self {
        Self {
            bookmark_id,
            attempted: Vec::with_capacity(3),
            failures: Vec::new(),
        }
    }

    fn record(&mut self, cache: CacheKind, outcome: Result<()>) {
        self.attempted.push(cache);
        if let Err(err) = outcome {
            warn!(
                bookmark_id = %self.bookmark_id,
                cache = cache.as_str(),
                error = %err,
                "invalidation: cache removal failed"
            );
            self.failures.push(CacheFailure {
                cache,
                message: err.to_string(),
            });
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drops a deleted bookmark from every cache that might still reference it.
///
/// The three removals are independent: each runs whether or not the others
/// succeed, and nothing is rolled back. Readers may briefly see the bookmark
/// gone from one cache and present in another.
pub struct MultiStoreInvalidator {
    public_bookmarks: Arc<dyn PublicBookmarksCache>,
    user_data: Arc<dyn UserDataCache>,
    my_bookmarks: Arc<dyn MyBookmarksCache>,
}

impl MultiStoreInvalidator {
    pub fn new(
        public_bookmarks: Arc<dyn PublicBookmarksCache>,
        user_data: Arc<dyn UserDataCache>,
        my_bookmarks: Arc<dyn MyBookmarksCache>,
    ) -> Self {
        Self {
            public_bookmarks,
            user_data,
            my_bookmarks,
        }
    }

    /// Only call this once the backend has acknowledged the deletion.
    pub fn invalidate(&self, bookmark: &Bookmark) -> InvalidationReport {
        let mut report = InvalidationReport::new(bookmark.id.clone());
        report.record(
            CacheKind::PublicListing,
            self.public_bookmarks.remove_bookmark_from_public_store(bookmark),
        );
        report.record(
            CacheKind::UserData,
            self.user_data.remove_from_stores_at_deletion(bookmark),
        );
        report.record(
            CacheKind::MyBookmarks,
            self.my_bookmarks.remove_from_stores_at_deletion(bookmark),
        );
        info!(
            bookmark_id = %bookmark.id,
            failed = report.failures.len(),
            "invalidation: caches updated"
        );
        report
    }
}
