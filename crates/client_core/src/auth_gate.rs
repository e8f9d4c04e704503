use std::sync::Arc;

use tracing::info;

use crate::{dialog::DialogCoordinator, session::SessionView};

/// Actions that need a signed-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatedAction {
    Like,
    Pin,
    ReadLater,
    Favorite,
}

impl GatedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GatedAction::Like => "like",
            GatedAction::Pin => "pin",
            GatedAction::ReadLater => "read_later",
            GatedAction::Favorite => "favorite",
        }
    }

    pub fn login_message(self) -> &'static str {
        match self {
            GatedAction::Like => "You need to be logged in to like public bookmarks",
            GatedAction::Pin => "You need to be logged in to pin bookmarks",
            GatedAction::ReadLater => {
                "You need to be logged in to add bookmarks to \"Read Later\""
            }
            GatedAction::Favorite => "You need to be logged in to add bookmarks to \"Favorites\"",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allowed,
    LoginRequired,
}

pub struct AuthGate {
    session: SessionView,
    dialogs: Arc<DialogCoordinator>,
}

impl AuthGate {
    pub fn new(session: SessionView, dialogs: Arc<DialogCoordinator>) -> Self {
        Self { session, dialogs }
    }

    /// Runs `run` right away for signed-in sessions. Otherwise shows the
    /// login notice for `action` and drops `run`; the user has to trigger the
    /// action again after signing in.
    pub fn guard(&self, action: GatedAction, run: impl FnOnce()) -> GateOutcome {
        if self.session.is_authenticated() {
            run();
            return GateOutcome::Allowed;
        }

        info!(action = action.as_str(), "auth: blocked anonymous action");
        // The notice has no outcome this flow cares about.
        drop(self.dialogs.login_required(action.login_message()));
        GateOutcome::LoginRequired
    }
}
