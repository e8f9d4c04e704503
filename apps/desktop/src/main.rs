use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::{load_settings, load_settings_from},
    deletion::DeletionOutcome,
    dialog::{
        DialogHandle, DialogHost, DialogKind, DialogRequest, DialogResult, DELETE_CONFIRMED,
    },
    geometry::DialogSize,
    BookmarkList, Collaborators, NavigationState, Navigator, StaticSession,
};
use serde::Serialize;
use shared::{
    domain::{Bookmark, BookmarkId, UserId},
    user_data::UserData,
};
use storage::{MyBookmarksStore, PersonalBookmarksService, PublicBookmarksStore, UserDataStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; defaults to ./bookmark_list.toml plus APP__* overrides.
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long)]
    viewport_width: Option<f64>,
    #[arg(long, default_value = "alice")]
    user: String,
    #[arg(long)]
    anonymous: bool,
    /// Answer the delete confirmation with "cancel" instead of confirming.
    #[arg(long)]
    cancel_delete: bool,
    /// Make the personal-bookmarks backend reject every call.
    #[arg(long)]
    fail_backend: bool,
}

/// Answers every modal as soon as it opens.
struct ScriptedDialogs {
    confirm_delete: bool,
}

impl DialogHost for ScriptedDialogs {
    fn open(&self, request: DialogRequest) -> DialogHandle {
        let (closer, handle) = DialogHandle::pair(request.kind());
        let close_value = match request.kind() {
            DialogKind::DeleteConfirm if self.confirm_delete => Some(DELETE_CONFIRMED),
            DialogKind::DeleteConfirm => Some("cancel"),
            _ => None,
        };
        let result = DialogResult::from_close_value(close_value);
        info!(
            kind = ?request.kind(),
            width = request.config.width,
            height = request.config.height,
            result = ?result,
            "demo: dialog answered"
        );
        closer.close(result);
        handle
    }
}

struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate_to(&self, path: &str, state: NavigationState) {
        info!(path, bookmark = %state.bookmark.name, "demo: navigate");
    }
}

#[derive(Serialize)]
struct Summary {
    authenticated: bool,
    like: String,
    visit_effects: usize,
    playback: Option<DialogSize>,
    deletion: String,
    public_listing: Vec<BookmarkId>,
    user_data: Option<UserData>,
}

fn seed_bookmarks(owner: &UserId) -> (Bookmark, Bookmark) {
    let owned = Bookmark::new(
        BookmarkId::random(),
        owner.clone(),
        "Rust async book",
        "https://rust-lang.github.io/async-book/",
    )
    .with_tags(["rust", "async"])
    .published();
    let foreign = Bookmark::new(
        BookmarkId::random(),
        UserId::new("someone-else"),
        "Tokio tutorial talk",
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
    )
    .with_youtube_video_id("dQw4w9WgXcQ")
    .published();
    (owned, foreign)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => load_settings_from(path, |key| std::env::var(key).ok()),
        None => load_settings(),
    };
    if let Some(width) = args.viewport_width {
        settings.viewport_width = width;
    }

    let user_id = UserId::new(args.user.clone());
    let (owned, foreign) = seed_bookmarks(&user_id);

    let public = Arc::new(PublicBookmarksStore::new(vec![
        owned.clone(),
        foreign.clone(),
    ]));
    let user_data = Arc::new(if args.anonymous {
        UserDataStore::anonymous()
    } else {
        UserDataStore::for_user(user_id.clone())
    });
    let mine = Arc::new(MyBookmarksStore::new(vec![owned.clone()], Vec::new()));
    let personal = Arc::new(PersonalBookmarksService::new([
        owned.clone(),
        foreign.clone(),
    ]));
    personal.set_failing(args.fail_backend);

    let session = if args.anonymous {
        StaticSession::anonymous()
    } else {
        StaticSession::signed_in(user_id)
    };
    let list = BookmarkList::new(
        settings,
        Collaborators {
            session: Arc::new(session),
            user_data: user_data.clone(),
            public_bookmarks: public.clone(),
            my_bookmarks: mine,
            personal_bookmarks: personal,
            navigator: Arc::new(LoggingNavigator),
            dialogs: Arc::new(ScriptedDialogs {
                confirm_delete: !args.cancel_delete,
            }),
        },
    );

    let authenticated = list.init().await?;
    if authenticated {
        list.watch_session()
            .wait_for(|session| session.subject_id.is_some())
            .await?;
    }

    let like = list.like(&foreign);
    list.open_detail(&owned);
    let effects = list.record_visit(&owned);
    let visit_effects = effects.len();
    effects.settled().await;

    let playback = foreign.has_playable_media().then(|| {
        drop(list.play_media(&foreign));
        list.settings()
            .playback
            .size_for_viewport(list.viewport_width())
    });

    let deletion = match list.delete(owned.clone()).await {
        Ok(DeletionOutcome::Deleted(report)) if report.is_complete() => "deleted".to_string(),
        Ok(DeletionOutcome::Deleted(report)) => {
            format!("deleted with {} cache failures", report.failures.len())
        }
        Ok(DeletionOutcome::Cancelled(result)) => format!("cancelled ({result:?})"),
        Err(err) => format!("failed: {err}"),
    };

    let summary = Summary {
        authenticated,
        like: format!("{like:?}"),
        visit_effects,
        playback,
        deletion,
        public_listing: public.list()?.into_iter().map(|b| b.id).collect(),
        user_data: user_data.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
