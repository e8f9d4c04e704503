//! In-memory bookmark stores backing the list core.
//!
//! Each store is owned independently: the public listing, the viewer's
//! relation data, the viewer's own bookmarks, and the personal-bookmarks
//! service standing in for the remote backend. None of them know about the
//! others; keeping them coherent is the caller's job.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        RwLock,
    },
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use shared::{
    domain::{Bookmark, BookmarkId, UserId},
    error::ApiException,
    user_data::UserData,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

/// Switchable failure injection shared by every store.
#[derive(Debug, Default)]
struct FailureSwitch {
    failing: AtomicBool,
}

impl FailureSwitch {
    fn set(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, store: &str, operation: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiException::unavailable(format!("{store}: {operation} unavailable")).into());
        }
        Ok(())
    }
}

fn poisoned(store: &str) -> anyhow::Error {
    anyhow!("{store}: lock poisoned")
}

/// Cache of publicly listed bookmarks.
#[derive(Debug, Default)]
pub struct PublicBookmarksStore {
    bookmarks: RwLock<Vec<Bookmark>>,
    failure: FailureSwitch,
}

impl PublicBookmarksStore {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        Self {
            bookmarks: RwLock::new(bookmarks),
            failure: FailureSwitch::default(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failure.set(failing);
    }

    pub fn list(&self) -> Result<Vec<Bookmark>> {
        let guard = self.bookmarks.read().map_err(|_| poisoned("public"))?;
        Ok(guard.clone())
    }

    pub fn contains(&self, bookmark_id: &BookmarkId) -> Result<bool> {
        let guard = self.bookmarks.read().map_err(|_| poisoned("public"))?;
        Ok(guard.iter().any(|b| &b.id == bookmark_id))
    }

    /// Removes the bookmark if listed. Returns whether it was present.
    pub fn remove_bookmark_from_public_store(&self, bookmark: &Bookmark) -> Result<bool> {
        self.failure.check("public", "removal")?;
        let mut guard = self.bookmarks.write().map_err(|_| poisoned("public"))?;
        let before = guard.len();
        guard.retain(|b| b.id != bookmark.id);
        let removed = guard.len() != before;
        debug!(bookmark_id = %bookmark.id, removed, "public: removal applied");
        Ok(removed)
    }
}

/// The viewer's relation data, published through a watch channel so views can
/// follow it while it changes. Holds `None` for anonymous sessions.
#[derive(Debug)]
pub struct UserDataStore {
    state: watch::Sender<Option<UserData>>,
    failure: FailureSwitch,
}

impl Default for UserDataStore {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Like,
    Pinned,
    ReadLater,
    Favorite,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Like => "like",
            Relation::Pinned => "pinned",
            Relation::ReadLater => "read_later",
            Relation::Favorite => "favorite",
        }
    }
}

impl UserDataStore {
    pub fn anonymous() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            failure: FailureSwitch::default(),
        }
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self::with_data(UserData::for_user(user_id))
    }

    pub fn with_data(data: UserData) -> Self {
        let (state, _) = watch::channel(Some(data));
        Self {
            state,
            failure: FailureSwitch::default(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failure.set(failing);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserData>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Option<UserData> {
        self.state.borrow().clone()
    }

    pub fn add_relation(&self, relation: Relation, bookmark: &Bookmark) -> Result<()> {
        self.update_relation(relation, bookmark, true)
    }

    pub fn remove_relation(&self, relation: Relation, bookmark: &Bookmark) -> Result<()> {
        self.update_relation(relation, bookmark, false)
    }

    fn update_relation(&self, relation: Relation, bookmark: &Bookmark, add: bool) -> Result<()> {
        self.failure.check("user_data", relation.as_str())?;
        self.modify(|data| {
            let set = match relation {
                Relation::Like => &mut data.likes,
                Relation::Pinned => &mut data.pinned,
                Relation::ReadLater => &mut data.read_later,
                Relation::Favorite => &mut data.favorites,
            };
            if add {
                set.insert(bookmark.id.clone())
            } else {
                set.remove(&bookmark.id)
            }
        })?;
        debug!(
            bookmark_id = %bookmark.id,
            relation = relation.as_str(),
            add,
            "user_data: relation updated"
        );
        Ok(())
    }

    /// Records a visit in the history log and optionally marks the bookmark
    /// for reading later.
    pub async fn add_to_history_and_read_later(
        &self,
        bookmark: &Bookmark,
        read_later: bool,
    ) -> Result<()> {
        self.failure.check("user_data", "history")?;
        let visited_at = Utc::now();
        self.modify(|data| {
            data.record_visit(&bookmark.id, visited_at);
            if read_later {
                data.read_later.insert(bookmark.id.clone());
            }
            true
        })?;
        info!(bookmark_id = %bookmark.id, read_later, "user_data: visit recorded");
        Ok(())
    }

    /// Drops every reference to a deleted bookmark. Returns whether any
    /// reference existed. Anonymous stores have nothing to drop.
    pub fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<bool> {
        self.failure.check("user_data", "deletion cleanup")?;
        let mut removed = false;
        self.state.send_if_modified(|state| match state {
            Some(data) => {
                removed = data.forget(&bookmark.id);
                removed
            }
            None => false,
        });
        Ok(removed)
    }

    fn modify(&self, apply: impl FnOnce(&mut UserData) -> bool) -> Result<()> {
        let mut loaded = true;
        self.state.send_if_modified(|state| match state {
            Some(data) => apply(data),
            None => {
                loaded = false;
                false
            }
        });
        if !loaded {
            return Err(anyhow!("user_data: no user data loaded for this session"));
        }
        Ok(())
    }
}

/// The viewer's own bookmarks, split into the lists the personal pages show.
#[derive(Debug, Default)]
pub struct MyBookmarksStore {
    lists: RwLock<MyBookmarkLists>,
    failure: FailureSwitch,
}

#[derive(Debug, Default, Clone)]
pub struct MyBookmarkLists {
    pub latest: Vec<Bookmark>,
    pub most_visited: Vec<Bookmark>,
}

impl MyBookmarksStore {
    pub fn new(latest: Vec<Bookmark>, most_visited: Vec<Bookmark>) -> Self {
        Self {
            lists: RwLock::new(MyBookmarkLists {
                latest,
                most_visited,
            }),
            failure: FailureSwitch::default(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failure.set(failing);
    }

    pub fn lists(&self) -> Result<MyBookmarkLists> {
        let guard = self.lists.read().map_err(|_| poisoned("my_bookmarks"))?;
        Ok(guard.clone())
    }

    pub fn contains(&self, bookmark_id: &BookmarkId) -> Result<bool> {
        let guard = self.lists.read().map_err(|_| poisoned("my_bookmarks"))?;
        Ok(guard
            .latest
            .iter()
            .chain(guard.most_visited.iter())
            .any(|b| &b.id == bookmark_id))
    }

    pub fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<bool> {
        self.failure.check("my_bookmarks", "deletion cleanup")?;
        let mut guard = self.lists.write().map_err(|_| poisoned("my_bookmarks"))?;
        let before = guard.latest.len() + guard.most_visited.len();
        guard.latest.retain(|b| b.id != bookmark.id);
        guard.most_visited.retain(|b| b.id != bookmark.id);
        Ok(before != guard.latest.len() + guard.most_visited.len())
    }
}

/// Authoritative bookmark records, standing in for the remote service.
#[derive(Debug, Default)]
pub struct PersonalBookmarksService {
    bookmarks: Mutex<HashMap<BookmarkId, Bookmark>>,
    failure: FailureSwitch,
}

impl PersonalBookmarksService {
    pub fn new(bookmarks: impl IntoIterator<Item = Bookmark>) -> Self {
        Self {
            bookmarks: Mutex::new(
                bookmarks
                    .into_iter()
                    .map(|bookmark| (bookmark.id.clone(), bookmark))
                    .collect(),
            ),
            failure: FailureSwitch::default(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failure.set(failing);
    }

    pub async fn get(&self, bookmark_id: &BookmarkId) -> Option<Bookmark> {
        self.bookmarks.lock().await.get(bookmark_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.bookmarks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bookmarks.lock().await.is_empty()
    }

    pub async fn delete_bookmark(&self, bookmark: &Bookmark) -> Result<()> {
        self.failure.check("personal", "delete")?;
        let removed = self.bookmarks.lock().await.remove(&bookmark.id);
        if removed.is_none() {
            return Err(ApiException::not_found(format!("bookmark {}", bookmark.id)).into());
        }
        info!(bookmark_id = %bookmark.id, "personal: bookmark deleted");
        Ok(())
    }

    /// Bumps the owner visit counter and returns the new value.
    pub async fn increase_owner_visit_count(&self, bookmark: &Bookmark) -> Result<u64> {
        self.failure.check("personal", "owner visit count")?;
        let mut guard = self.bookmarks.lock().await;
        let stored = guard
            .get_mut(&bookmark.id)
            .ok_or_else(|| ApiException::not_found(format!("bookmark {}", bookmark.id)))?;
        stored.owner_visit_count += 1;
        debug!(
            bookmark_id = %bookmark.id,
            owner_visit_count = stored.owner_visit_count,
            "personal: owner visit counted"
        );
        Ok(stored.owner_visit_count)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
