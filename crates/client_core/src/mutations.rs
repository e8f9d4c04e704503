use std::sync::Arc;

use shared::domain::Bookmark;
use tracing::debug;

use crate::{
    auth_gate::{AuthGate, GateOutcome, GatedAction},
    UserDataCache,
};

/// Forwards relation toggles to the per-user data cache. Adds go through the
/// auth gate; removes are forwarded as-is since they are only reachable from
/// affordances an anonymous viewer never sees.
pub struct MutationDispatcher {
    gate: AuthGate,
    user_data: Arc<dyn UserDataCache>,
}

impl MutationDispatcher {
    pub fn new(gate: AuthGate, user_data: Arc<dyn UserDataCache>) -> Self {
        Self { gate, user_data }
    }

    fn gated(&self, action: GatedAction, bookmark: &Bookmark, apply: impl FnOnce()) -> GateOutcome {
        let outcome = self.gate.guard(action, apply);
        debug!(
            action = action.as_str(),
            bookmark_id = %bookmark.id,
            outcome = ?outcome,
            "mutation: add relation"
        );
        outcome
    }

    pub fn like(&self, bookmark: &Bookmark) -> GateOutcome {
        self.gated(GatedAction::Like, bookmark, || {
            self.user_data.like_bookmark(bookmark)
        })
    }

    pub fn unlike(&self, bookmark: &Bookmark) {
        self.user_data.unlike_bookmark(bookmark);
    }

    pub fn pin(&self, bookmark: &Bookmark) -> GateOutcome {
        self.gated(GatedAction::Pin, bookmark, || {
            self.user_data.add_to_pinned_bookmarks(bookmark)
        })
    }

    pub fn unpin(&self, bookmark: &Bookmark) {
        self.user_data.remove_from_pinned_bookmarks(bookmark);
    }

    pub fn read_later(&self, bookmark: &Bookmark) -> GateOutcome {
        self.gated(GatedAction::ReadLater, bookmark, || {
            self.user_data.add_to_later_reads(bookmark)
        })
    }

    pub fn remove_from_read_later(&self, bookmark: &Bookmark) {
        self.user_data.remove_from_later_reads(bookmark);
    }

    pub fn favorite(&self, bookmark: &Bookmark) -> GateOutcome {
        self.gated(GatedAction::Favorite, bookmark, || {
            self.user_data.add_to_favorite_bookmarks(bookmark)
        })
    }

    pub fn unfavorite(&self, bookmark: &Bookmark) {
        self.user_data.remove_from_favorite_bookmarks(bookmark);
    }
}
