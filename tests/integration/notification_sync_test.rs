//! Integration tests for push delivery and REST reconciliation of
//! notifications.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use donorlink_auth::SessionStore;
use donorlink_core::types::id::UserId;
use donorlink_entity::notification::NotificationKind;
use donorlink_entity::session::Session;
use donorlink_entity::user::UserRole;
use donorlink_realtime::{ChannelState, NotificationSync};

use helpers::{FakeBackend, PushScript, fast_realtime, notification};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_refresh_after_dropped_connection_matches_server() {
    let user = UserId::new();
    let backend = FakeBackend::new();
    let first = notification(user, NotificationKind::MatchFound, false);
    backend.push_notification(first.clone());

    // First connection delivers one push and then drops; the second stays up.
    let push = PushScript::new(vec![
        vec![PushScript::connected(), PushScript::message(&first), None],
        vec![PushScript::connected()],
    ]);
    let sync = NotificationSync::new(push.clone(), backend.clone(), fast_realtime());
    let mut state = sync.watch_channel_state();

    let session = Arc::new(Session::new(user, [UserRole::Recipient], "token").unwrap());
    sync.start(Arc::clone(&session)).await.unwrap();

    // While disconnected the server gains notifications the client never saw pushed.
    backend.push_notification(notification(user, NotificationKind::Cancellation, false));
    backend.push_notification(notification(user, NotificationKind::System, true));

    tokio::time::timeout(WAIT, async {
        while push.connects.load(Ordering::SeqCst) < 2 {
            state.changed().await.unwrap();
        }
        state.wait_for(|s| s.is_connected()).await.unwrap();
    })
    .await
    .expect("reconnected");

    sync.refresh().await.unwrap();
    let server = backend.notifications();
    let local = sync.notifications();
    assert_eq!(local.len(), server.len());
    assert_eq!(sync.unread_count(), 2);
    assert_eq!(*sync.subscribe_unread().borrow(), 2);
    assert!(local.iter().any(|n| n.id == first.id));
    assert_eq!(sync.channel_metrics().reconnects, 1);
}

#[tokio::test]
async fn test_legacy_push_payload_is_normalized() {
    let user = UserId::new();
    let backend = FakeBackend::new();
    let read = notification(user, NotificationKind::NewDonation, true);
    let push = PushScript::new(vec![vec![PushScript::connected(), PushScript::message(&read)]]);
    let sync = NotificationSync::new(push, backend, fast_realtime());
    let mut arrivals = sync.subscribe_arrivals();

    let session = Arc::new(Session::new(user, [UserRole::Donor], "token").unwrap());
    sync.start(session).await.unwrap();

    let arrived = tokio::time::timeout(WAIT, arrivals.recv())
        .await
        .expect("push delivered")
        .unwrap();
    assert_eq!(arrived.id, read.id);
    assert!(arrived.is_read);
    assert_eq!(sync.unread_count(), 0);
}

#[tokio::test]
async fn test_logout_tears_down_and_login_restores() {
    let user = UserId::new();
    let backend = FakeBackend::new();
    backend.push_notification(notification(user, NotificationKind::NewRequest, false));
    let push = PushScript::new(vec![
        vec![PushScript::connected()],
        vec![PushScript::connected()],
    ]);

    let sessions = SessionStore::new();
    let sync = Arc::new(NotificationSync::new(push.clone(), backend, fast_realtime()));
    let binding = Arc::clone(&sync).bind(sessions.clone());
    let mut state = sync.watch_channel_state();
    let mut unread = sync.subscribe_unread();

    sessions.login(Session::new(user, [UserRole::Donor], "token").unwrap());
    tokio::time::timeout(WAIT, state.wait_for(|s| s.is_connected()))
        .await
        .expect("connected")
        .unwrap();
    tokio::time::timeout(WAIT, unread.wait_for(|c| *c == 1))
        .await
        .expect("initial load")
        .unwrap();

    sessions.logout();
    tokio::time::timeout(WAIT, unread.wait_for(|c| *c == 0))
        .await
        .expect("cleared")
        .unwrap();
    assert_eq!(sync.channel_state(), ChannelState::Disconnected);
    assert!(sync.notifications().is_empty());

    sessions.login(Session::new(user, [UserRole::Donor], "token").unwrap());
    tokio::time::timeout(WAIT, unread.wait_for(|c| *c == 1))
        .await
        .expect("reloaded")
        .unwrap();
    assert_eq!(push.connects.load(Ordering::SeqCst), 2);

    drop(sessions);
    tokio::time::timeout(WAIT, binding)
        .await
        .expect("binding ends with the session store")
        .unwrap();
}

#[tokio::test]
async fn test_mark_all_read_and_remove_reach_server() {
    let user = UserId::new();
    let backend = FakeBackend::new();
    let keep = notification(user, NotificationKind::MatchFound, false);
    let gone = notification(user, NotificationKind::System, false);
    backend.push_notification(keep.clone());
    backend.push_notification(gone.clone());

    let push = PushScript::new(vec![vec![PushScript::connected()]]);
    let sync = NotificationSync::new(push, backend.clone(), fast_realtime());
    let session = Arc::new(Session::new(user, [UserRole::Donor], "token").unwrap());
    sync.start(session).await.unwrap();
    assert_eq!(sync.unread_count(), 2);

    sync.remove(gone.id).await.unwrap();
    assert_eq!(sync.unread_count(), 1);
    sync.mark_all_read().await.unwrap();
    assert_eq!(sync.unread_count(), 0);

    let server = backend.notifications();
    assert_eq!(server.len(), 1);
    assert!(server[0].is_read);
    assert_eq!(server[0].id, keep.id);
}
