//! Field sync between contexts of one session.

use ctxsync::{BusMessage, ContextKind, MessageBus, SessionStore};
use serde_json::json;

use crate::helpers::{Folders, Session, eventually, settle, strings};

#[tokio::test]
async fn peers_converge_on_local_change() {
    let session = Session::new(0);
    let background = Folders::attach(&session.context(ContextKind::Background));
    let popup = Folders::attach(&session.context(ContextKind::Foreground));

    background.names.set(strings(&["Work", "Personal"]));

    eventually("popup to converge", || {
        popup.names.get() == strings(&["Work", "Personal"])
    })
    .await;
    assert_eq!(
        session.store.get(Folders::slot().as_str()).await.unwrap(),
        Some(json!(["Work", "Personal"]))
    );
}

#[tokio::test]
async fn own_announcement_is_not_pulled_back() {
    let session = Session::new(0);
    let background = Folders::attach(&session.context(ContextKind::Background));
    let popup = Folders::attach(&session.context(ContextKind::Foreground));

    background.names.set(strings(&["Work"]));
    eventually("echo to be suppressed", || {
        background.stats().echoes_suppressed == 1
    })
    .await;
    eventually("popup to pull", || popup.stats().remote_pulls == 1).await;
    settle().await;

    let bg = background.stats();
    assert_eq!(bg.remote_pulls, 0);
    assert_eq!(bg.local_writes, 1);

    // The pulled value is applied without being written or announced again.
    let pop = popup.stats();
    assert_eq!(pop.local_writes, 0);
    assert_eq!(pop.skipped_emissions, 2);
}

#[tokio::test]
async fn construction_writes_nothing() {
    let session = Session::new(0);
    let mut raw = session.bus.subscribe();

    let _background = Folders::attach(&session.context(ContextKind::Background));
    let _popup = Folders::attach(&session.context(ContextKind::Foreground));
    settle().await;

    assert!(session.store.keys().await.is_empty());
    assert!(raw.try_recv().is_err());
}

#[tokio::test]
async fn recreated_context_keeps_syncing() {
    let session = Session::new(0);
    let popup = Folders::attach(&session.context(ContextKind::Foreground));
    {
        let background = Folders::attach(&session.context(ContextKind::Background));
        background.names.set(strings(&["Work"]));
        eventually("popup to converge", || popup.names.get() == strings(&["Work"])).await;
    }

    let background = Folders::attach(&session.context(ContextKind::Background));
    popup.names.set(strings(&["Work", "Archive"]));

    eventually("recreated background to converge", || {
        background.names.get() == strings(&["Work", "Archive"])
    })
    .await;
}

#[tokio::test]
async fn dropped_owner_stops_listening() {
    let session = Session::new(0);
    let popup = Folders::attach(&session.context(ContextKind::Foreground));
    let background = Folders::attach(&session.context(ContextKind::Background));
    assert_eq!(session.bus.subscriber_count(), 2);

    let names = background.names.clone();
    drop(background);
    eventually("background binding to leave the bus", || {
        session.bus.subscriber_count() == 1
    })
    .await;

    popup.names.set(strings(&["Work"]));
    eventually("popup write", || popup.stats().local_writes == 1).await;
    settle().await;
    assert!(names.get().is_empty());
    assert!(!names.is_bound());
}

#[tokio::test]
async fn malformed_stored_value_leaves_local_value() {
    let session = Session::new(0);
    let popup = Folders::attach(&session.context(ContextKind::Foreground));
    popup.names.set(strings(&["Work"]));
    eventually("popup write", || popup.stats().local_writes == 1).await;

    session
        .store
        .set(Folders::slot().as_str(), json!({"not": "a list"}))
        .await
        .unwrap();
    session
        .bus
        .send(BusMessage::new(
            Folders::slot().update_topic(),
            json!({"instance_id": "some-other-context"}),
        ))
        .await
        .unwrap();

    eventually("decode failure", || popup.stats().failures == 1).await;
    assert_eq!(popup.names.get(), strings(&["Work"]));
}

#[tokio::test]
async fn disabled_durable_sync_stays_local() {
    let session = Session::new(0);
    let config = ctxsync::SyncConfig {
        durable_sync: false,
        ..ctxsync::SyncConfig::default()
    };
    let context = ctxsync::ExecutionContext::new(
        ContextKind::Background,
        std::sync::Arc::new(session.store.clone()),
        std::sync::Arc::new(session.bus.clone()),
        config,
    );
    let folders = Folders::attach(&context);

    folders.names.set(strings(&["Work"]));
    settle().await;

    assert!(session.store.keys().await.is_empty());
    assert_eq!(folders.stats(), ctxsync::sync::SyncStats::default());
}
