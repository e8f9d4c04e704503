//! Confirm-then-delete flow.
//!
//! `Idle -> ConfirmPending -> {Deleted, Cancelled}`. Caches are only touched
//! after the backend acknowledged the deletion; a failed backend call leaves
//! every cache as it was and emits nothing.

use std::sync::Arc;

use shared::domain::Bookmark;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    dialog::{DialogCoordinator, DialogResult},
    error::DeletionError,
    invalidation::{InvalidationReport, MultiStoreInvalidator},
    ListEvent, PersonalBookmarksBackend, UserDataCache,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    Idle,
    ConfirmPending,
    Deleted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted(InvalidationReport),
    Cancelled(DialogResult),
}

impl DeletionOutcome {
    pub fn state(&self) -> DeletionState {
        match self {
            DeletionOutcome::Deleted(_) => DeletionState::Deleted,
            DeletionOutcome::Cancelled(_) => DeletionState::Cancelled,
        }
    }
}

/// Collaborators every deletion flow shares.
pub struct DeletionContext {
    pub(crate) dialogs: Arc<DialogCoordinator>,
    pub(crate) user_data: Arc<dyn UserDataCache>,
    pub(crate) backend: Arc<dyn PersonalBookmarksBackend>,
    pub(crate) invalidator: MultiStoreInvalidator,
    pub(crate) events: broadcast::Sender<ListEvent>,
}

pub struct DeletionFlow<'a> {
    ctx: &'a DeletionContext,
    bookmark: Bookmark,
    /// Tracked for the transition log only; callers see `DeletionOutcome`.
    state: DeletionState,
}

impl<'a> DeletionFlow<'a> {
    pub fn new(ctx: &'a DeletionContext, bookmark: Bookmark) -> Self {
        Self {
            ctx,
            bookmark,
            state: DeletionState::Idle,
        }
    }

    fn transition(&mut self, next: DeletionState) {
        debug!(
            bookmark_id = %self.bookmark.id,
            from = ?self.state,
            to = ?next,
            "deletion: state change"
        );
        self.state = next;
    }

    pub async fn run(mut self) -> Result<DeletionOutcome, DeletionError> {
        self.transition(DeletionState::ConfirmPending);
        let confirmation = self
            .ctx
            .dialogs
            .confirm_delete(self.bookmark.clone(), self.ctx.user_data.user_data());
        let result = confirmation.closed().await;

        if result != DialogResult::DeleteConfirmed {
            self.transition(DeletionState::Cancelled);
            info!(bookmark_id = %self.bookmark.id, result = ?result, "deletion: not confirmed");
            return Ok(DeletionOutcome::Cancelled(result));
        }

        if let Err(source) = self.ctx.backend.delete_bookmark(&self.bookmark).await {
            warn!(
                bookmark_id = %self.bookmark.id,
                error = %source,
                "deletion: backend rejected delete"
            );
            self.transition(DeletionState::Idle);
            return Err(DeletionError::Backend {
                bookmark_id: self.bookmark.id.clone(),
                source,
            });
        }

        let report = self.ctx.invalidator.invalidate(&self.bookmark);
        if self
            .ctx
            .events
            .send(ListEvent::BookmarkDeleted {
                bookmark_id: self.bookmark.id.clone(),
            })
            .is_err()
        {
            debug!(bookmark_id = %self.bookmark.id, "deletion: no host view listening");
        }
        self.transition(DeletionState::Deleted);
        info!(bookmark_id = %self.bookmark.id, "deletion: completed");
        Ok(DeletionOutcome::Deleted(report))
    }
}
