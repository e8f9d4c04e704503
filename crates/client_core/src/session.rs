use std::sync::Arc;

use shared::domain::UserId;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub subject_id: Option<UserId>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(subject_id: Option<UserId>) -> Self {
        Self {
            authenticated: true,
            subject_id,
        }
    }

    /// True only for an authenticated session whose subject is known and
    /// equals `user_id`.
    pub fn is_subject(&self, user_id: &UserId) -> bool {
        self.authenticated && self.subject_id.as_ref() == Some(user_id)
    }
}

/// Shared, synchronously readable view of the current session.
#[derive(Debug, Clone)]
pub struct SessionView {
    tx: Arc<watch::Sender<Session>>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self::new(Session::anonymous())
    }
}

impl SessionView {
    pub fn new(initial: Session) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().authenticated
    }

    pub fn replace(&self, session: Session) {
        self.tx.send_replace(session);
    }

    pub fn set_subject(&self, subject_id: UserId) {
        self.tx.send_if_modified(|session| {
            if session.subject_id.as_ref() == Some(&subject_id) {
                return false;
            }
            session.subject_id = Some(subject_id);
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}
