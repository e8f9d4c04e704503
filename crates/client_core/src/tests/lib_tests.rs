use super::*;
use crate::{
    auth_gate::GatedAction,
    deletion::DeletionState,
    dialog::{
        DialogCloser, DialogKind, DialogPayload, DialogRequest, DialogResult, DELETE_CONFIRMED,
    },
    invalidation::CacheKind,
};
use anyhow::anyhow;
use std::sync::Mutex as StdMutex;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Like(BookmarkId),
    Unlike(BookmarkId),
    Pin(BookmarkId),
    Unpin(BookmarkId),
    ReadLater(BookmarkId),
    RemoveReadLater(BookmarkId),
    Favorite(BookmarkId),
    Unfavorite(BookmarkId),
    History(BookmarkId, bool),
    UserDataRemoval(BookmarkId),
    PublicRemoval(BookmarkId),
    MyBookmarksRemoval(BookmarkId),
    BackendDelete(BookmarkId),
    OwnerVisit(BookmarkId),
}

type CallLog = Arc<StdMutex<Vec<Call>>>;

fn push(log: &CallLog, call: Call) {
    log.lock().expect("call log").push(call);
}

struct RecordingUserData {
    calls: CallLog,
    state: watch::Sender<Option<UserData>>,
    fail_removal: bool,
    fail_history: bool,
    stall_history: bool,
}

#[async_trait]
impl UserDataCache for RecordingUserData {
    fn like_bookmark(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::Like(bookmark.id.clone()));
    }

    fn unlike_bookmark(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::Unlike(bookmark.id.clone()));
    }

    fn add_to_pinned_bookmarks(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::Pin(bookmark.id.clone()));
    }

    fn remove_from_pinned_bookmarks(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::Unpin(bookmark.id.clone()));
    }

    fn add_to_later_reads(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::ReadLater(bookmark.id.clone()));
    }

    fn remove_from_later_reads(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::RemoveReadLater(bookmark.id.clone()));
    }

    fn add_to_favorite_bookmarks(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::Favorite(bookmark.id.clone()));
    }

    fn remove_from_favorite_bookmarks(&self, bookmark: &Bookmark) {
        push(&self.calls, Call::Unfavorite(bookmark.id.clone()));
    }

    async fn add_to_history_and_read_later(
        &self,
        bookmark: &Bookmark,
        read_later: bool,
    ) -> Result<()> {
        push(&self.calls, Call::History(bookmark.id.clone(), read_later));
        if self.stall_history {
            futures::future::pending::<()>().await;
        }
        if self.fail_history {
            return Err(anyhow!("history endpoint unavailable"));
        }
        Ok(())
    }

    fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<()> {
        push(&self.calls, Call::UserDataRemoval(bookmark.id.clone()));
        if self.fail_removal {
            return Err(anyhow!("user data cache is read-only"));
        }
        Ok(())
    }

    fn user_data(&self) -> watch::Receiver<Option<UserData>> {
        self.state.subscribe()
    }
}

struct RecordingPublic {
    calls: CallLog,
    fail: bool,
}

impl PublicBookmarksCache for RecordingPublic {
    fn remove_bookmark_from_public_store(&self, bookmark: &Bookmark) -> Result<()> {
        push(&self.calls, Call::PublicRemoval(bookmark.id.clone()));
        if self.fail {
            return Err(anyhow!("public cache unavailable"));
        }
        Ok(())
    }
}

struct RecordingMyBookmarks {
    calls: CallLog,
}

impl MyBookmarksCache for RecordingMyBookmarks {
    fn remove_from_stores_at_deletion(&self, bookmark: &Bookmark) -> Result<()> {
        push(&self.calls, Call::MyBookmarksRemoval(bookmark.id.clone()));
        Ok(())
    }
}

struct RecordingBackend {
    calls: CallLog,
    fail_delete: bool,
    fail_owner_visit: bool,
}

#[async_trait]
impl PersonalBookmarksBackend for RecordingBackend {
    async fn delete_bookmark(&self, bookmark: &Bookmark) -> Result<()> {
        push(&self.calls, Call::BackendDelete(bookmark.id.clone()));
        if self.fail_delete {
            return Err(anyhow!("500 internal server error"));
        }
        Ok(())
    }

    async fn increase_owner_visit_count(&self, bookmark: &Bookmark) -> Result<()> {
        push(&self.calls, Call::OwnerVisit(bookmark.id.clone()));
        if self.fail_owner_visit {
            return Err(anyhow!("counter service down"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNavigator {
    visits: StdMutex<Vec<(String, NavigationState)>>,
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, path: &str, state: NavigationState) {
        self.visits
            .lock()
            .expect("navigator")
            .push((path.to_string(), state));
    }
}

/// Keeps every opened modal so tests can close them in any order.
#[derive(Default)]
struct ScriptedDialogHost {
    opened: StdMutex<Vec<(DialogRequest, Option<DialogCloser>)>>,
}

impl DialogHost for ScriptedDialogHost {
    fn open(&self, request: DialogRequest) -> DialogHandle {
        let (closer, handle) = DialogHandle::pair(request.kind());
        self.opened
            .lock()
            .expect("dialog host")
            .push((request, Some(closer)));
        handle
    }
}

impl ScriptedDialogHost {
    fn requests(&self) -> Vec<DialogRequest> {
        self.opened
            .lock()
            .expect("dialog host")
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    fn kinds(&self) -> Vec<DialogKind> {
        self.requests().iter().map(DialogRequest::kind).collect()
    }

    fn close(&self, index: usize, result: DialogResult) {
        let closer = self.opened.lock().expect("dialog host")[index]
            .1
            .take()
            .expect("dialog already closed");
        assert!(closer.close(result), "nobody awaited dialog {index}");
    }

    async fn wait_for_open(&self, count: usize) {
        for _ in 0..1_000 {
            if self.opened.lock().expect("dialog host").len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} open dialogs");
    }
}

#[derive(Default)]
struct Failures {
    delete: bool,
    owner_visit: bool,
    history: bool,
    stalled_history: bool,
    public_removal: bool,
    user_data_removal: bool,
}

struct Harness {
    list: Arc<BookmarkList>,
    calls: CallLog,
    dialogs: Arc<ScriptedDialogHost>,
    navigator: Arc<RecordingNavigator>,
}

impl Harness {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("call log").clone()
    }
}

fn bookmark(id: &str, owner: &str) -> Bookmark {
    Bookmark::new(
        BookmarkId::new(id),
        UserId::new(owner),
        format!("bookmark {id}"),
        format!("https://example.org/{id}"),
    )
}

fn build(session: StaticSession, failures: Failures) -> Harness {
    let calls: CallLog = Arc::new(StdMutex::new(Vec::new()));
    let (state, _) = watch::channel(Some(UserData::default()));
    let dialogs = Arc::new(ScriptedDialogHost::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let list = BookmarkList::new(
        Settings::default(),
        Collaborators {
            session: Arc::new(session),
            user_data: Arc::new(RecordingUserData {
                calls: Arc::clone(&calls),
                state,
                fail_removal: failures.user_data_removal,
                fail_history: failures.history,
                stall_history: failures.stalled_history,
            }),
            public_bookmarks: Arc::new(RecordingPublic {
                calls: Arc::clone(&calls),
                fail: failures.public_removal,
            }),
            my_bookmarks: Arc::new(RecordingMyBookmarks {
                calls: Arc::clone(&calls),
            }),
            personal_bookmarks: Arc::new(RecordingBackend {
                calls: Arc::clone(&calls),
                fail_delete: failures.delete,
                fail_owner_visit: failures.owner_visit,
            }),
            navigator: navigator.clone(),
            dialogs: dialogs.clone(),
        },
    );
    Harness {
        list,
        calls,
        dialogs,
        navigator,
    }
}

async fn anonymous() -> Harness {
    let harness = build(StaticSession::anonymous(), Failures::default());
    assert!(!harness.list.init().await.expect("init"));
    harness
}

async fn signed_in_with(subject: &str, failures: Failures) -> Harness {
    let harness = build(StaticSession::signed_in(UserId::new(subject)), failures);
    assert!(harness.list.init().await.expect("init"));
    harness
        .list
        .watch_session()
        .wait_for(|session| session.subject_id.is_some())
        .await
        .expect("subject id");
    harness
}

async fn signed_in(subject: &str) -> Harness {
    signed_in_with(subject, Failures::default()).await
}

fn removal_calls(calls: &[Call]) -> Vec<Call> {
    calls
        .iter()
        .filter(|call| {
            matches!(
                call,
                Call::PublicRemoval(_) | Call::UserDataRemoval(_) | Call::MyBookmarksRemoval(_)
            )
        })
        .cloned()
        .collect()
}

#[tokio::test]
async fn anonymous_add_actions_open_one_login_notice_each_and_touch_no_cache() {
    let harness = anonymous().await;
    let target = bookmark("b-1", "bob");

    assert_eq!(harness.list.like(&target), GateOutcome::LoginRequired);
    assert_eq!(harness.list.pin(&target), GateOutcome::LoginRequired);
    assert_eq!(harness.list.read_later(&target), GateOutcome::LoginRequired);
    assert_eq!(harness.list.favorite(&target), GateOutcome::LoginRequired);

    assert!(harness.calls().is_empty());
    assert_eq!(harness.dialogs.kinds(), vec![DialogKind::LoginRequired; 4]);
    let requests = harness.dialogs.requests();

    let expected = [
        GatedAction::Like,
        GatedAction::Pin,
        GatedAction::ReadLater,
        GatedAction::Favorite,
    ];
    for (request, action) in requests.iter().zip(expected) {
        assert_eq!(request.kind(), DialogKind::LoginRequired);
        assert!(request.config.disable_close);
        assert!(request.config.auto_focus);
        match &request.payload {
            DialogPayload::LoginRequired { message } => {
                assert_eq!(message, action.login_message())
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}

#[tokio::test]
async fn signed_in_like_only_calls_like_on_user_data() {
    let harness = signed_in("alice").await;
    let target = bookmark("b-1", "bob");

    assert_eq!(harness.list.like(&target), GateOutcome::Allowed);

    assert_eq!(harness.calls(), vec![Call::Like(target.id.clone())]);
    assert!(harness.dialogs.requests().is_empty());
}

#[tokio::test]
async fn signed_in_add_and_remove_relations_forward_verbatim() {
    let harness = signed_in("alice").await;
    let target = bookmark("b-1", "bob");
    let id = target.id.clone();

    harness.list.pin(&target);
    harness.list.unpin(&target);
    harness.list.read_later(&target);
    harness.list.remove_from_read_later(&target);
    harness.list.favorite(&target);
    harness.list.unfavorite(&target);
    harness.list.unlike(&target);

    assert_eq!(
        harness.calls(),
        vec![
            Call::Pin(id.clone()),
            Call::Unpin(id.clone()),
            Call::ReadLater(id.clone()),
            Call::RemoveReadLater(id.clone()),
            Call::Favorite(id.clone()),
            Call::Unfavorite(id.clone()),
            Call::Unlike(id),
        ]
    );
}

#[tokio::test]
async fn remove_relations_are_not_gated_for_anonymous_sessions() {
    let harness = anonymous().await;
    let target = bookmark("b-1", "bob");

    harness.list.unlike(&target);
    harness.list.unpin(&target);

    assert_eq!(
        harness.calls(),
        vec![Call::Unlike(target.id.clone()), Call::Unpin(target.id.clone())]
    );
    assert!(harness.dialogs.requests().is_empty());
}

#[tokio::test]
async fn confirmed_deletion_invalidates_all_caches_and_signals_once() {
    let harness = signed_in("alice").await;
    let target = bookmark("b-1", "alice");
    let mut events = harness.list.subscribe_events();

    let list = Arc::clone(&harness.list);
    let flow = tokio::spawn({
        let target = target.clone();
        async move { list.delete(target).await }
    });
    harness.dialogs.wait_for_open(1).await;

    let requests = harness.dialogs.requests();
    let request = &requests[0];
    assert_eq!(request.kind(), DialogKind::DeleteConfirm);
    assert!(request.config.disable_close);
    assert_eq!(request.payload.bookmark(), Some(&target));

    harness.dialogs.close(0, DialogResult::DeleteConfirmed);
    let outcome = flow.await.expect("join").expect("deleted");
    assert_eq!(outcome.state(), DeletionState::Deleted);

    let id = target.id.clone();
    assert_eq!(
        harness.calls(),
        vec![
            Call::BackendDelete(id.clone()),
            Call::PublicRemoval(id.clone()),
            Call::UserDataRemoval(id.clone()),
            Call::MyBookmarksRemoval(id.clone()),
        ]
    );
    assert_eq!(
        events.try_recv().expect("deleted event"),
        ListEvent::BookmarkDeleted { bookmark_id: id }
    );
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn cancelled_or_dismissed_deletion_does_nothing() {
    let harness = signed_in("alice").await;
    let mut events = harness.list.subscribe_events();

    for (index, result) in [DialogResult::Cancelled, DialogResult::Dismissed]
        .into_iter()
        .enumerate()
    {
        let list = Arc::clone(&harness.list);
        let flow = tokio::spawn(async move { list.delete(bookmark("b-1", "alice")).await });
        harness.dialogs.wait_for_open(index + 1).await;
        harness.dialogs.close(index, result);

        let outcome = flow.await.expect("join").expect("no error");
        assert_eq!(outcome, DeletionOutcome::Cancelled(result));
        assert_eq!(outcome.state(), DeletionState::Cancelled);
    }

    assert!(harness.calls().is_empty());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn dropped_confirmation_counts_as_dismissal() {
    let harness = signed_in("alice").await;
    let list = Arc::clone(&harness.list);
    let flow = tokio::spawn(async move { list.delete(bookmark("b-1", "alice")).await });
    harness.dialogs.wait_for_open(1).await;

    let closer = harness.dialogs.opened.lock().expect("dialog host")[0]
        .1
        .take()
        .expect("closer");
    drop(closer);

    let outcome = flow.await.expect("join").expect("no error");
    assert_eq!(outcome, DeletionOutcome::Cancelled(DialogResult::Dismissed));
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn failed_backend_deletion_touches_no_cache_and_emits_nothing() {
    let harness = signed_in_with(
        "alice",
        Failures {
            delete: true,
            ..Failures::default()
        },
    )
    .await;
    let mut events = harness.list.subscribe_events();
    let target = bookmark("b-1", "alice");

    let list = Arc::clone(&harness.list);
    let flow = tokio::spawn({
        let target = target.clone();
        async move { list.delete(target).await }
    });
    harness.dialogs.wait_for_open(1).await;
    harness.dialogs.close(0, DialogResult::DeleteConfirmed);

    let err = flow.await.expect("join").expect_err("backend failure");
    assert_eq!(err.bookmark_id(), &target.id);
    assert!(err.to_string().contains("500"));
    assert_eq!(harness.calls(), vec![Call::BackendDelete(target.id.clone())]);
    assert!(removal_calls(&harness.calls()).is_empty());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn one_failing_cache_does_not_block_the_others() {
    let harness = signed_in_with(
        "alice",
        Failures {
            public_removal: true,
            user_data_removal: true,
            ..Failures::default()
        },
    )
    .await;
    let mut events = harness.list.subscribe_events();
    let target = bookmark("b-1", "alice");

    let list = Arc::clone(&harness.list);
    let flow = tokio::spawn({
        let target = target.clone();
        async move { list.delete(target).await }
    });
    harness.dialogs.wait_for_open(1).await;
    harness.dialogs.close(0, DialogResult::DeleteConfirmed);

    let report = match flow.await.expect("join").expect("deleted") {
        DeletionOutcome::Deleted(report) => report,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(
        report.attempted,
        vec![
            CacheKind::PublicListing,
            CacheKind::UserData,
            CacheKind::MyBookmarks
        ]
    );
    let failed: Vec<_> = report.failures.iter().map(|f| f.cache).collect();
    assert_eq!(failed, vec![CacheKind::PublicListing, CacheKind::UserData]);
    assert!(!report.is_complete());

    assert_eq!(removal_calls(&harness.calls()).len(), 3);
    assert!(events.try_recv().is_ok());
}

#[tokio::test]
async fn overlapping_deletions_confirmed_in_reverse_only_touch_their_own_bookmark() {
    let harness = signed_in("alice").await;
    let mut events = harness.list.subscribe_events();
    let first = bookmark("first", "alice");
    let second = bookmark("second", "alice");

    let list = Arc::clone(&harness.list);
    let first_flow = tokio::spawn({
        let target = first.clone();
        async move { list.delete(target).await }
    });
    harness.dialogs.wait_for_open(1).await;
    let list = Arc::clone(&harness.list);
    let second_flow = tokio::spawn({
        let target = second.clone();
        async move { list.delete(target).await }
    });
    harness.dialogs.wait_for_open(2).await;

    harness.dialogs.close(1, DialogResult::DeleteConfirmed);
    second_flow.await.expect("join").expect("second deleted");
    assert_eq!(
        removal_calls(&harness.calls()),
        vec![
            Call::PublicRemoval(second.id.clone()),
            Call::UserDataRemoval(second.id.clone()),
            Call::MyBookmarksRemoval(second.id.clone()),
        ]
    );

    harness.dialogs.close(0, DialogResult::DeleteConfirmed);
    first_flow.await.expect("join").expect("first deleted");
    assert_eq!(
        removal_calls(&harness.calls())[3..],
        [
            Call::PublicRemoval(first.id.clone()),
            Call::UserDataRemoval(first.id.clone()),
            Call::MyBookmarksRemoval(first.id.clone()),
        ]
    );

    assert_eq!(
        events.try_recv().expect("first event"),
        ListEvent::BookmarkDeleted {
            bookmark_id: second.id
        }
    );
    assert_eq!(
        events.try_recv().expect("second event"),
        ListEvent::BookmarkDeleted {
            bookmark_id: first.id
        }
    );
}

#[tokio::test]
async fn delete_confirmation_carries_live_user_data() {
    let harness = signed_in("alice").await;
    let list = Arc::clone(&harness.list);
    let flow = tokio::spawn(async move { list.delete(bookmark("b-1", "alice")).await });
    harness.dialogs.wait_for_open(1).await;

    match &harness.dialogs.requests()[0].payload {
        DialogPayload::DeleteConfirm { user_data, .. } => {
            assert_eq!(*user_data.borrow(), Some(UserData::default()));
        }
        other => panic!("unexpected payload {other:?}"),
    }

    harness.dialogs.close(0, DialogResult::Cancelled);
    flow.await.expect("join").expect("cancelled");
}

#[tokio::test]
async fn non_owner_visit_records_history_only() {
    let harness = signed_in("alice").await;
    let target = bookmark("b-1", "bob");

    let effects = harness.list.record_visit(&target);
    assert_eq!(effects.len(), 1);
    effects.settled().await;

    assert_eq!(harness.calls(), vec![Call::History(target.id.clone(), false)]);
}

#[tokio::test]
async fn owner_visit_records_history_and_bumps_counter() {
    let harness = signed_in("alice").await;
    let target = bookmark("b-1", "alice");

    let effects = harness.list.record_visit(&target);
    assert_eq!(effects.len(), 2);
    effects.settled().await;

    let calls = harness.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&Call::History(target.id.clone(), false)));
    assert!(calls.contains(&Call::OwnerVisit(target.id.clone())));
}

#[tokio::test]
async fn record_visit_returns_before_its_effects_run() {
    let harness = signed_in("alice").await;
    let target = bookmark("b-1", "alice");

    let effects = harness.list.record_visit(&target);
    assert_eq!(effects.len(), 2);
    assert!(harness.calls().is_empty());

    effects.settled().await;
    assert_eq!(harness.calls().len(), 2);
}

#[tokio::test]
async fn stalled_history_write_does_not_hold_up_the_visit() {
    let harness = signed_in_with(
        "alice",
        Failures {
            stalled_history: true,
            ..Failures::default()
        },
    )
    .await;
    let target = bookmark("b-1", "alice");

    let effects = harness.list.record_visit(&target);
    assert_eq!(effects.len(), 2);
    drop(effects);

    for _ in 0..1_000 {
        if harness.calls().len() == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }
    let calls = harness.calls();
    assert!(calls.contains(&Call::History(target.id.clone(), false)));
    assert!(calls.contains(&Call::OwnerVisit(target.id.clone())));
}

#[tokio::test]
async fn anonymous_visit_has_no_side_effects() {
    let harness = anonymous().await;
    let effects = harness.list.record_visit(&bookmark("b-1", "bob"));
    assert!(effects.is_empty());
    effects.settled().await;
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn visit_failures_stay_inside_detached_tasks() {
    let harness = signed_in_with(
        "alice",
        Failures {
            history: true,
            owner_visit: true,
            ..Failures::default()
        },
    )
    .await;
    let target = bookmark("b-1", "alice");

    harness.list.record_visit(&target).settled().await;

    assert_eq!(harness.calls().len(), 2);
}

#[test]
fn raw_close_values_map_to_dialog_results() {
    assert_eq!(
        DialogResult::from_close_value(Some(DELETE_CONFIRMED)),
        DialogResult::DeleteConfirmed
    );
    assert_eq!(
        DialogResult::from_close_value(Some("cancel")),
        DialogResult::Cancelled
    );
    assert_eq!(
        DialogResult::from_close_value(None),
        DialogResult::Dismissed
    );
}

#[tokio::test]
async fn play_media_sizes_dialog_from_viewport() {
    let harness = anonymous().await;
    let target = bookmark("b-1", "bob").with_youtube_video_id("dQw4w9WgXcQ");

    harness.list.set_viewport_width(1000.0);
    let handle = harness.list.play_media(&target);
    assert_eq!(handle.kind(), DialogKind::PlayMedia);
    harness.list.set_viewport_width(2000.0);
    drop(harness.list.play_media(&target));

    let requests = harness.dialogs.requests();
    assert!(!requests[0].config.disable_close);
    assert_eq!(requests[0].config.width, Some(800.0));
    assert_eq!(requests[0].config.height, Some(570.0));
    assert_eq!(requests[1].config.width, Some(1200.0));
    assert_eq!(requests[1].config.height, Some(795.0));
    assert!(harness.calls().is_empty());

    let config_json = serde_json::to_value(&requests[0].config).expect("serialize config");
    assert!(config_json.get("min_width").is_none());
}

#[tokio::test]
async fn share_opens_blocking_dialog_with_minimum_width() {
    let harness = anonymous().await;
    let target = bookmark("b-1", "bob");

    let handle = harness.list.share(&target);
    harness.dialogs.close(0, DialogResult::Cancelled);
    assert_eq!(handle.closed().await, DialogResult::Cancelled);

    let requests = harness.dialogs.requests();
    let request = &requests[0];
    assert_eq!(request.kind(), DialogKind::Share);
    assert!(request.config.disable_close);
    assert_eq!(request.config.min_width, Some(380.0));
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn open_detail_navigates_with_bookmark_state() {
    let harness = anonymous().await;
    let target = bookmark("b-42", "bob");

    harness.list.open_detail(&target);

    let visits = harness.navigator.visits.lock().expect("navigator");
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].0, "./personal/bookmarks/b-42");
    assert_eq!(visits[0].1.bookmark, target);
}

#[tokio::test]
async fn shown_limits_visible_bookmarks() {
    let harness = anonymous().await;
    let bookmarks: Vec<_> = (0..40)
        .map(|i| bookmark(&format!("b-{i}"), "bob"))
        .collect();

    assert_eq!(harness.list.shown(&bookmarks).len(), 30);
    harness.list.set_shown_size(5);
    assert_eq!(harness.list.shown(&bookmarks).len(), 5);
    assert_eq!(harness.list.shown(&bookmarks[..3]).len(), 3);
}

#[tokio::test]
async fn session_follows_subject_stream_updates() {
    struct SwitchingSession {
        subjects: watch::Sender<UserId>,
    }

    #[async_trait]
    impl SessionProvider for SwitchingSession {
        async fn is_authenticated(&self) -> Result<bool> {
            Ok(true)
        }

        fn subject_ids(&self) -> BoxStream<'static, UserId> {
            tokio_stream::wrappers::WatchStream::new(self.subjects.subscribe()).boxed()
        }
    }

    let (subjects, _) = watch::channel(UserId::new("alice"));
    let subjects = Arc::new(SwitchingSession { subjects });
    let mut harness = build(StaticSession::anonymous(), Failures::default());
    let list = Arc::get_mut(&mut harness.list).expect("sole owner");
    list.session_provider = subjects.clone();

    harness.list.init().await.expect("init");
    let mut session = harness.list.watch_session();
    session
        .wait_for(|s| s.subject_id == Some(UserId::new("alice")))
        .await
        .expect("alice");

    subjects.subjects.send_replace(UserId::new("alice-2"));
    session
        .wait_for(|s| s.subject_id == Some(UserId::new("alice-2")))
        .await
        .expect("refreshed subject");

    let target = bookmark("b-1", "alice-2");
    harness.list.record_visit(&target).settled().await;
    assert!(harness.calls().contains(&Call::OwnerVisit(target.id)));
}

#[tokio::test]
async fn reinit_as_anonymous_closes_the_gate_again() {
    struct FlippingSession {
        authenticated: StdMutex<bool>,
    }

    #[async_trait]
    impl SessionProvider for FlippingSession {
        async fn is_authenticated(&self) -> Result<bool> {
            Ok(*self.authenticated.lock().expect("flag"))
        }

        fn subject_ids(&self) -> BoxStream<'static, UserId> {
            futures::stream::iter([UserId::new("alice")])
                .chain(futures::stream::pending())
                .boxed()
        }
    }

    let provider = Arc::new(FlippingSession {
        authenticated: StdMutex::new(true),
    });
    let mut harness = build(StaticSession::anonymous(), Failures::default());
    Arc::get_mut(&mut harness.list)
        .expect("sole owner")
        .session_provider = provider.clone();

    assert!(harness.list.init().await.expect("init"));
    let target = bookmark("b-1", "bob");
    assert_eq!(harness.list.like(&target), GateOutcome::Allowed);

    *provider.authenticated.lock().expect("flag") = false;
    assert!(!harness.list.init().await.expect("re-init"));
    assert_eq!(harness.list.session(), Session::anonymous());
    assert_eq!(harness.list.like(&target), GateOutcome::LoginRequired);
    assert_eq!(harness.calls(), vec![Call::Like(target.id)]);
}

#[tokio::test]
async fn init_propagates_session_provider_errors() {
    struct BrokenSession;

    #[async_trait]
    impl SessionProvider for BrokenSession {
        async fn is_authenticated(&self) -> Result<bool> {
            Err(anyhow!("identity provider unreachable"))
        }

        fn subject_ids(&self) -> BoxStream<'static, UserId> {
            futures::stream::empty().boxed()
        }
    }

    let mut harness = build(StaticSession::anonymous(), Failures::default());
    Arc::get_mut(&mut harness.list)
        .expect("sole owner")
        .session_provider = Arc::new(BrokenSession);

    let err = harness.list.init().await.expect_err("provider failure");
    assert!(err.to_string().contains("unreachable"));
    assert!(!harness.list.session().authenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inits_keep_exactly_one_subject_subscription() {
    #[derive(Default)]
    struct ChannelSession {
        senders: StdMutex<Vec<futures::channel::mpsc::UnboundedSender<UserId>>>,
    }

    #[async_trait]
    impl SessionProvider for ChannelSession {
        async fn is_authenticated(&self) -> Result<bool> {
            Ok(true)
        }

        fn subject_ids(&self) -> BoxStream<'static, UserId> {
            let (tx, rx) = futures::channel::mpsc::unbounded();
            self.senders.lock().expect("senders").push(tx);
            rx.boxed()
        }
    }

    impl ChannelSession {
        fn open_subscriptions(&self) -> usize {
            self.senders
                .lock()
                .expect("senders")
                .iter()
                .filter(|tx| !tx.is_closed())
                .count()
        }
    }

    let provider = Arc::new(ChannelSession::default());
    let mut harness = build(StaticSession::anonymous(), Failures::default());
    Arc::get_mut(&mut harness.list)
        .expect("sole owner")
        .session_provider = provider.clone();

    let inits: Vec<_> = (0..8)
        .map(|_| {
            let list = Arc::clone(&harness.list);
            tokio::spawn(async move { list.init().await })
        })
        .collect();
    for init in inits {
        assert!(init.await.expect("join").expect("init"));
    }

    assert_eq!(provider.senders.lock().expect("senders").len(), 8);
    for _ in 0..500 {
        if provider.open_subscriptions() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    assert_eq!(provider.open_subscriptions(), 1);
}
