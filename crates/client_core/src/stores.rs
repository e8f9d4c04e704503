//! Wires the in-memory stores from the `storage` crate into the list core.

use anyhow::Result;
use async_trait::async_trait;
use shared::{domain::Bookmark, user_data::UserData};
use storage::{
    MyBookmarksStore, PersonalBookmarksService, PublicBookmarksStore, Relation, UserDataStore,
};
use tokio::sync::watch;
use tracing::warn;

use crate::{MyBookmarksCache, PersonalBookmarksBackend, PublicBookmarksCache, UserDataCache};

fn log_relation_failure(relation: Relation, add: bool, bookmark: &Bookmark, outcome: Result<()>) {
    if let Err(err) = outcome {
        warn!(
            bookmark_id = %bookmark.id,
            relation = relation.as_str(),
            add,
            error = %err,
            "user_data: relation update failed"
        );
    }
}

#[async_trait]
impl UserDataCache for UserDataStore {
    fn like_bookmark(&self, bookmark: &Bookmark) {
        let outcome = self.add_relation(Relation::Like, bookmark);
        log_relation_failure(Relation::Like, true, bookmark, outcome);
    }

    fn unlike_bookmark(&self, bookmark: &Bookmark) {
        let outcome = self.remove_relation(Relation::Like, bookmark);
        log_relation_failure(Relation::Like, false, bookmark, outcome);
    }

    fn add_to_pinned_bookmarks(&self, bookmark: &Bookmark) {
        let outcome = self.add_relation(Relation::Pinned, bookmark);
        log_relation_failure(Relation::Pinned, true, bookmark, outcome);
    }

    fn remove_from_pinned_bookmarks(&self, bookmark: &Bookmark) {
        let outcome = self.remove_relation(Relation::Pinned, bookmark);
        log_relation_failure(Relation::Pinned, false, bookmark, outcome);
    }

    fn add_to_later_reads(&self, bookmark: &Bookmark) {
        let outcome = self.add_relation(Relation::ReadLater, bookmark);
        log_relation_failure(Relation::ReadLater, true, bookmark, outcome);
    }

    fn remove_from_later_reads(&self, bookmark: &Bookmark) {
        let outcome = self.remove_relation(Relation::ReadLater, bookmark);
        log_relation_failure(Relation::ReadLater, false, bookmark, outcome);
    }

    fn add_to_favorite_bookmarks(&self, bookmark: &Bookmark) {
        let outcome = self.add_relation(Relation::Favorite, bookmark);
        log_relation_failure(Relation::Favorite, true, bookmark, outcome);
    }

    fn remove_from_favorite_bookmarks(&self, bookmark: &Bookmark) {
        let outcome = self.remove_relation(Relation::Favorite, bookmark);
        log_relation_failure(Relation::Favorite, false, bookmark, outcome);
    }

    async fn add_to_history_and_read_later(
        &self,
        bookmark: &Bookmark,
        read_later: bool,
    ) -> Result<()> {
        UserDataStore::add_to_history_and_read_later(self, bookmark, read_later).await
    }

    fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<()> {
        UserDataStore::remove_from_stores_at_deletion(self, bookmark).map(|_| ())
    }

    fn user_data(&self) -> watch::Receiver<Option<UserData>> {
        self.subscribe()
    }
}

impl PublicBookmarksCache for PublicBookmarksStore {
    fn remove_bookmark_from_public_store(&self, bookmark: &Bookmark) -> Result<()> {
        PublicBookmarksStore::remove_bookmark_from_public_store(self, bookmark).map(|_| ())
    }
}

impl MyBookmarksCache for MyBookmarksStore {
    fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<()> {
        MyBookmarksStore::remove_from_stores_at_deletion(self, bookmark).map(|_| ())
    }
}

#[async_trait]
impl PersonalBookmarksBackend for PersonalBookmarksService {
    async fn delete_bookmark(&self, bookmark: &Bookmark) -> Result<()> {
        PersonalBookmarksService::delete_bookmark(self, bookmark).await
    }

    async fn increase_owner_visit_count(&self, bookmark: &Bookmark) -> Result<()> {
        PersonalBookmarksService::increase_owner_visit_count(self, bookmark)
            .await
            .map(|_| ())
    }
}
