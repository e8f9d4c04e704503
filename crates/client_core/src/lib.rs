use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use shared::{
    domain::{Bookmark, BookmarkId, UserId},
    user_data::UserData,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

pub mod auth_gate;
pub mod config;
pub mod deletion;
pub mod dialog;
pub mod error;
pub mod geometry;
pub mod invalidation;
pub mod mutations;
pub mod session;
mod stores;
pub mod visits;

use auth_gate::{AuthGate, GateOutcome};
use config::Settings;
use deletion::{DeletionContext, DeletionFlow, DeletionOutcome};
use dialog::{DialogCoordinator, DialogHandle, DialogHost};
use error::DeletionError;
use invalidation::MultiStoreInvalidator;
use mutations::MutationDispatcher;
use session::{Session, SessionView};
use visits::{DetachedEffects, VisitTracker};

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn is_authenticated(&self) -> Result<bool>;
    /// Subject ids of the signed-in user; may keep yielding as the identity
    /// is refreshed. Each call starts a fresh subscription.
    fn subject_ids(&self) -> BoxStream<'static, UserId>;
}

/// Session provider with a fixed answer. `None` is an anonymous visitor.
pub struct StaticSession {
    subject_id: Option<UserId>,
}

impl StaticSession {
    pub fn anonymous() -> Self {
        Self { subject_id: None }
    }

    pub fn signed_in(subject_id: UserId) -> Self {
        Self {
            subject_id: Some(subject_id),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.subject_id.is_some())
    }

    fn subject_ids(&self) -> BoxStream<'static, UserId> {
        futures::stream::iter(self.subject_id.clone())
            .chain(futures::stream::pending())
            .boxed()
    }
}

/// The viewer's relation cache. Mutations are applied by the cache itself,
/// which owns its observable state and reports its own failures.
#[async_trait]
pub trait UserDataCache: Send + Sync {
    fn like_bookmark(&self, bookmark: &Bookmark);
    fn unlike_bookmark(&self, bookmark: &Bookmark);
    fn add_to_pinned_bookmarks(&self, bookmark: &Bookmark);
    fn remove_from_pinned_bookmarks(&self, bookmark: &Bookmark);
    fn add_to_later_reads(&self, bookmark: &Bookmark);
    fn remove_from_later_reads(&self, bookmark: &Bookmark);
    fn add_to_favorite_bookmarks(&self, bookmark: &Bookmark);
    fn remove_from_favorite_bookmarks(&self, bookmark: &Bookmark);
    async fn add_to_history_and_read_later(&self, bookmark: &Bookmark, read_later: bool)
        -> Result<()>;
    /// Removing a bookmark the cache never held is a no-op.
    fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<()>;
    fn user_data(&self) -> watch::Receiver<Option<UserData>>;
}

pub trait PublicBookmarksCache: Send + Sync {
    fn remove_bookmark_from_public_store(&self, bookmark: &Bookmark) -> Result<()>;
}

pub trait MyBookmarksCache: Send + Sync {
    fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<()>;
}

#[async_trait]
pub trait PersonalBookmarksBackend: Send + Sync {
    async fn delete_bookmark(&self, bookmark: &Bookmark) -> Result<()>;
    async fn increase_owner_visit_count(&self, bookmark: &Bookmark) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub bookmark: Bookmark,
}

pub trait Navigator: Send + Sync {
    fn navigate_to(&self, path: &str, state: NavigationState);
}

/// Signals for the view hosting the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    BookmarkDeleted { bookmark_id: BookmarkId },
}

pub struct Collaborators {
    pub session: Arc<dyn SessionProvider>,
    pub user_data: Arc<dyn UserDataCache>,
    pub public_bookmarks: Arc<dyn PublicBookmarksCache>,
    pub my_bookmarks: Arc<dyn MyBookmarksCache>,
    pub personal_bookmarks: Arc<dyn PersonalBookmarksBackend>,
    pub navigator: Arc<dyn Navigator>,
    pub dialogs: Arc<dyn DialogHost>,
}

/// Action surface of one interactive bookmark list.
///
/// Every user action maps to one method. Methods that only need the session
/// return synchronously; deletion suspends on the confirmation dialog and the
/// backend. The list is shared behind an `Arc` so flows can be spawned and
/// overlap freely; nothing here orders one action against another.
pub struct BookmarkList {
    settings: Settings,
    session_provider: Arc<dyn SessionProvider>,
    session: SessionView,
    session_task: Mutex<Option<JoinHandle<()>>>,
    viewport_width: RwLock<f64>,
    shown_size: AtomicUsize,
    navigator: Arc<dyn Navigator>,
    dialogs: Arc<DialogCoordinator>,
    mutations: MutationDispatcher,
    visits: VisitTracker,
    deletion: DeletionContext,
    events: broadcast::Sender<ListEvent>,
}

impl BookmarkList {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Arc<Self> {
        let Collaborators {
            session: session_provider,
            user_data,
            public_bookmarks,
            my_bookmarks,
            personal_bookmarks,
            navigator,
            dialogs,
        } = collaborators;

        let session = SessionView::default();
        let dialogs = Arc::new(DialogCoordinator::new(
            dialogs,
            settings.playback,
            settings.share_min_width,
        ));
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));

        let mutations = MutationDispatcher::new(
            AuthGate::new(session.clone(), Arc::clone(&dialogs)),
            Arc::clone(&user_data),
        );
        let visits = VisitTracker::new(
            session.clone(),
            Arc::clone(&user_data),
            Arc::clone(&personal_bookmarks),
        );
        let deletion = DeletionContext {
            dialogs: Arc::clone(&dialogs),
            user_data: Arc::clone(&user_data),
            backend: personal_bookmarks,
            invalidator: MultiStoreInvalidator::new(public_bookmarks, user_data, my_bookmarks),
            events: events.clone(),
        };

        Arc::new(Self {
            viewport_width: RwLock::new(settings.viewport_width),
            shown_size: AtomicUsize::new(settings.shown_size),
            settings,
            session_provider,
            session,
            session_task: Mutex::new(None),
            navigator,
            dialogs,
            mutations,
            visits,
            deletion,
            events,
        })
    }

    /// Resolves the session. Signed-in sessions keep following the subject
    /// id stream until the next `init` or until the list is dropped.
    pub async fn init(&self) -> Result<bool> {
        let authenticated = self.session_provider.is_authenticated().await?;

        // Abort, replace and store under one guard so concurrent inits
        // never leave an orphaned subscription behind.
        let mut slot = self.session_task_slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        if !authenticated {
            self.session.replace(Session::anonymous());
            info!("session: anonymous");
            return Ok(false);
        }

        self.session.replace(Session::authenticated(None));
        let session = self.session.clone();
        let mut subject_ids = self.session_provider.subject_ids();
        *slot = Some(tokio::spawn(async move {
            while let Some(subject_id) = subject_ids.next().await {
                debug!(subject_id = %subject_id, "session: subject updated");
                session.set_subject(subject_id);
            }
        }));
        info!("session: authenticated");
        Ok(true)
    }

    fn session_task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.session_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_session_task(&self) {
        if let Some(task) = self.session_task_slot().take() {
            task.abort();
        }
    }

    pub fn session(&self) -> Session {
        self.session.current()
    }

    pub fn watch_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
            .read()
            .map(|width| *width)
            .unwrap_or(self.settings.viewport_width)
    }

    pub fn set_viewport_width(&self, width: f64) {
        if let Ok(mut current) = self.viewport_width.write() {
            *current = width;
        }
    }

    pub fn shown_size(&self) -> usize {
        self.shown_size.load(Ordering::Relaxed)
    }

    pub fn set_shown_size(&self, shown_size: usize) {
        self.shown_size.store(shown_size, Ordering::Relaxed);
    }

    /// The prefix of `bookmarks` the list actually displays.
    pub fn shown<'a>(&self, bookmarks: &'a [Bookmark]) -> &'a [Bookmark] {
        &bookmarks[..bookmarks.len().min(self.shown_size())]
    }

    pub fn open_detail(&self, bookmark: &Bookmark) {
        let path = format!(
            "{}/{}",
            self.settings.detail_path_prefix.trim_end_matches('/'),
            bookmark.id
        );
        debug!(path = %path, "navigation: opening bookmark detail");
        self.navigator.navigate_to(
            &path,
            NavigationState {
                bookmark: bookmark.clone(),
            },
        );
    }

    pub fn like(&self, bookmark: &Bookmark) -> GateOutcome {
        self.mutations.like(bookmark)
    }

    pub fn unlike(&self, bookmark: &Bookmark) {
        self.mutations.unlike(bookmark)
    }

    pub fn pin(&self, bookmark: &Bookmark) -> GateOutcome {
        self.mutations.pin(bookmark)
    }

    pub fn unpin(&self, bookmark: &Bookmark) {
        self.mutations.unpin(bookmark)
    }

    pub fn read_later(&self, bookmark: &Bookmark) -> GateOutcome {
        self.mutations.read_later(bookmark)
    }

    pub fn remove_from_read_later(&self, bookmark: &Bookmark) {
        self.mutations.remove_from_read_later(bookmark)
    }

    pub fn favorite(&self, bookmark: &Bookmark) -> GateOutcome {
        self.mutations.favorite(bookmark)
    }

    pub fn unfavorite(&self, bookmark: &Bookmark) {
        self.mutations.unfavorite(bookmark)
    }

    /// Records the visit for signed-in viewers without waiting for it.
    /// Must be called from within a tokio runtime.
    pub fn record_visit(&self, bookmark: &Bookmark) -> DetachedEffects {
        self.visits.record_visit(bookmark)
    }

    pub fn play_media(&self, bookmark: &Bookmark) -> DialogHandle {
        self.dialogs.play_media(bookmark.clone(), self.viewport_width())
    }

    pub fn share(&self, bookmark: &Bookmark) -> DialogHandle {
        self.dialogs.share(bookmark.clone())
    }

    /// Asks for confirmation, deletes on the backend, then clears every
    /// cache and signals the host view.
    pub async fn delete(&self, bookmark: Bookmark) -> Result<DeletionOutcome, DeletionError> {
        DeletionFlow::new(&self.deletion, bookmark).run().await
    }
}

impl Drop for BookmarkList {
    fn drop(&mut self) {
        self.stop_session_task();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
