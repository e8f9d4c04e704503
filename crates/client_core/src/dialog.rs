//! Modal flows as explicit request/result pairs.
//!
//! Every `open` hands the request to the [`DialogHost`] and returns a
//! [`DialogHandle`] that resolves exactly once when the modal closes. The
//! coordinator never serializes or de-duplicates overlapping modals; stacking
//! them is the host's business.

use std::sync::Arc;

use serde::Serialize;
use shared::{domain::Bookmark, user_data::UserData};
use tokio::sync::{oneshot, watch};
use tracing::debug;

use crate::geometry::{DialogSize, PlaybackGeometry};

/// Close value the delete-confirm dialog returns when the user confirms.
pub const DELETE_CONFIRMED: &str = "DELETE_CONFIRMED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    LoginRequired,
    DeleteConfirm,
    Share,
    PlayMedia,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DialogConfig {
    pub disable_close: bool,
    pub auto_focus: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<f64>,
}

impl DialogConfig {
    /// Focused modal that only closes through its own buttons.
    pub fn blocking() -> Self {
        Self {
            disable_close: true,
            auto_focus: true,
            ..Self::default()
        }
    }

    pub fn dismissable() -> Self {
        Self {
            disable_close: false,
            auto_focus: true,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: DialogSize) -> Self {
        self.width = Some(size.width);
        self.height = Some(size.height);
        self
    }
}

#[derive(Debug, Clone)]
pub enum DialogPayload {
    LoginRequired {
        message: String,
    },
    DeleteConfirm {
        bookmark: Bookmark,
        /// Live relation state so the dialog can reflect changes while open.
        user_data: watch::Receiver<Option<UserData>>,
    },
    Share {
        bookmark: Bookmark,
    },
    PlayMedia {
        bookmark: Bookmark,
    },
}

impl DialogPayload {
    pub fn kind(&self) -> DialogKind {
        match self {
            DialogPayload::LoginRequired { .. } => DialogKind::LoginRequired,
            DialogPayload::DeleteConfirm { .. } => DialogKind::DeleteConfirm,
            DialogPayload::Share { .. } => DialogKind::Share,
            DialogPayload::PlayMedia { .. } => DialogKind::PlayMedia,
        }
    }

    pub fn bookmark(&self) -> Option<&Bookmark> {
        match self {
            DialogPayload::LoginRequired { .. } => None,
            DialogPayload::DeleteConfirm { bookmark, .. }
            | DialogPayload::Share { bookmark }
            | DialogPayload::PlayMedia { bookmark } => Some(bookmark),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DialogRequest {
    pub config: DialogConfig,
    pub payload: DialogPayload,
}

impl DialogRequest {
    pub fn kind(&self) -> DialogKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogResult {
    DeleteConfirmed,
    Cancelled,
    Dismissed,
}

impl DialogResult {
    /// Maps the raw value a dialog component closes with. No value at all
    /// means the dialog was dismissed.
    pub fn from_close_value(value: Option<&str>) -> Self {
        match value {
            Some(DELETE_CONFIRMED) => DialogResult::DeleteConfirmed,
            Some(_) => DialogResult::Cancelled,
            None => DialogResult::Dismissed,
        }
    }
}

/// Host side of an open modal. Closing consumes it, so a modal resolves at
/// most once.
#[derive(Debug)]
pub struct DialogCloser {
    kind: DialogKind,
    tx: oneshot::Sender<DialogResult>,
}

impl DialogCloser {
    pub fn kind(&self) -> DialogKind {
        self.kind
    }

    /// Returns false when nobody is waiting for the result any more.
    pub fn close(self, result: DialogResult) -> bool {
        self.tx.send(result).is_ok()
    }
}

#[derive(Debug)]
pub struct DialogHandle {
    kind: DialogKind,
    rx: oneshot::Receiver<DialogResult>,
}

impl DialogHandle {
    pub fn pair(kind: DialogKind) -> (DialogCloser, DialogHandle) {
        let (tx, rx) = oneshot::channel();
        (DialogCloser { kind, tx }, DialogHandle { kind, rx })
    }

    pub fn kind(&self) -> DialogKind {
        self.kind
    }

    /// Waits for the modal to close. A host that drops the modal without
    /// answering counts as a dismissal.
    pub async fn closed(self) -> DialogResult {
        self.rx.await.unwrap_or(DialogResult::Dismissed)
    }
}

pub trait DialogHost: Send + Sync {
    fn open(&self, request: DialogRequest) -> DialogHandle;
}

pub struct DialogCoordinator {
    host: Arc<dyn DialogHost>,
    geometry: PlaybackGeometry,
    share_min_width: f64,
}

impl DialogCoordinator {
    pub fn new(host: Arc<dyn DialogHost>, geometry: PlaybackGeometry, share_min_width: f64) -> Self {
        Self {
            host,
            geometry,
            share_min_width,
        }
    }

    pub fn open(&self, request: DialogRequest) -> DialogHandle {
        debug!(
            kind = ?request.kind(),
            bookmark_id = request.payload.bookmark().map(|b| b.id.as_str()),
            "dialog: opening"
        );
        self.host.open(request)
    }

    pub fn login_required(&self, message: impl Into<String>) -> DialogHandle {
        self.open(DialogRequest {
            config: DialogConfig::blocking(),
            payload: DialogPayload::LoginRequired {
                message: message.into(),
            },
        })
    }

    pub fn confirm_delete(
        &self,
        bookmark: Bookmark,
        user_data: watch::Receiver<Option<UserData>>,
    ) -> DialogHandle {
        self.open(DialogRequest {
            config: DialogConfig::blocking(),
            payload: DialogPayload::DeleteConfirm {
                bookmark,
                user_data,
            },
        })
    }

    pub fn share(&self, bookmark: Bookmark) -> DialogHandle {
        let config = DialogConfig {
            min_width: Some(self.share_min_width),
            ..DialogConfig::blocking()
        };
        self.open(DialogRequest {
            config,
            payload: DialogPayload::Share { bookmark },
        })
    }

    pub fn play_media(&self, bookmark: Bookmark, viewport_width: f64) -> DialogHandle {
        let size = self.geometry.size_for_viewport(viewport_width);
        self.open(DialogRequest {
            config: DialogConfig::dismissable().with_size(size),
            payload: DialogPayload::PlayMedia { bookmark },
        })
    }
}
