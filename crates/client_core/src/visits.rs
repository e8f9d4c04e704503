use std::sync::Arc;

use shared::domain::Bookmark;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{session::SessionView, PersonalBookmarksBackend, UserDataCache};

/// Side effects spawned and left running. Dropping this value detaches them;
/// their errors are logged inside the task and never reach the caller.
#[derive(Debug, Default)]
pub struct DetachedEffects {
    handles: Vec<JoinHandle<()>>,
}

impl DetachedEffects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits until every effect finished, for hosts that care.
    pub async fn settled(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

pub struct VisitTracker {
    session: SessionView,
    user_data: Arc<dyn UserDataCache>,
    backend: Arc<dyn PersonalBookmarksBackend>,
}

impl VisitTracker {
    pub fn new(
        session: SessionView,
        user_data: Arc<dyn UserDataCache>,
        backend: Arc<dyn PersonalBookmarksBackend>,
    ) -> Self {
        Self {
            session,
            user_data,
            backend,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn record_visit(&self, bookmark: &Bookmark) -> DetachedEffects {
        let session = self.session.current();
        if !session.authenticated {
            return DetachedEffects::none();
        }

        let mut handles = Vec::with_capacity(2);

        let user_data = Arc::clone(&self.user_data);
        let visited = bookmark.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = user_data.add_to_history_and_read_later(&visited, false).await {
                warn!(bookmark_id = %visited.id, error = %err, "visit: history record failed");
            }
        }));

        if session.is_subject(&bookmark.user_id) {
            let backend = Arc::clone(&self.backend);
            let visited = bookmark.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = backend.increase_owner_visit_count(&visited).await {
                    warn!(
                        bookmark_id = %visited.id,
                        error = %err,
                        "visit: owner visit count failed"
                    );
                }
            }));
        }

        debug!(
            bookmark_id = %bookmark.id,
            effects = handles.len(),
            "visit: side effects detached"
        );
        DetachedEffects { handles }
    }
}
