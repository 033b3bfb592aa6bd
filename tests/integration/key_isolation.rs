//! Store keys of different owners and subsystems stay apart.

use std::time::Duration;

use ctxsync::sync::Slot;
use ctxsync::{
    ContextKind, ExecutionContext, Reactive, SessionStore, SyncOptions, SyncRegistration,
    SyncedField, TimerName,
};
use serde_json::json;

use crate::helpers::{Session, eventually, settle};

/// Owner with one string field, named freely.
struct Labeled {
    value: Reactive<String>,
    registration: SyncRegistration,
}

impl Labeled {
    fn attach(context: &ExecutionContext, owner: &str, field: &str) -> Self {
        let value = Reactive::new(String::new());
        let registration = context
            .sync_registry(owner)
            .field(SyncedField::object(field, &value, SyncOptions::constructor()).unwrap())
            .register()
            .unwrap();
        Self {
            value,
            registration,
        }
    }

    fn local_writes(&self) -> u64 {
        self.registration.bindings()[0].stats().local_writes
    }

    fn remote_pulls(&self) -> u64 {
        self.registration.bindings()[0].stats().remote_pulls
    }
}

#[tokio::test]
async fn owners_sharing_a_joined_name_do_not_collide() {
    let session = Session::new(0);
    let background = session.context(ContextKind::Background);
    let popup = session.context(ContextKind::Foreground);

    let state_folders = Labeled::attach(&background, "Vault_state", "folders");
    let folders_of_state = Labeled::attach(&background, "Vault", "state_folders");
    let peer_state_folders = Labeled::attach(&popup, "Vault_state", "folders");
    let peer_folders_of_state = Labeled::attach(&popup, "Vault", "state_folders");

    state_folders.value.set("first".to_owned());
    folders_of_state.value.set("second".to_owned());

    eventually("both writes", || {
        state_folders.local_writes() == 1 && folders_of_state.local_writes() == 1
    })
    .await;
    eventually("peers to converge", || {
        peer_state_folders.value.get() == "first"
            && peer_folders_of_state.value.get() == "second"
    })
    .await;
    settle().await;

    let a = Slot::new("Vault_state", "folders").unwrap();
    let b = Slot::new("Vault", "state_folders").unwrap();
    assert_eq!(session.store.get(a.as_str()).await.unwrap(), Some(json!("first")));
    assert_eq!(session.store.get(b.as_str()).await.unwrap(), Some(json!("second")));
    assert_eq!(session.store.keys().await.len(), 2);

    // Each peer pulled only its own slot.
    assert_eq!(peer_state_folders.remote_pulls(), 1);
    assert_eq!(peer_folders_of_state.remote_pulls(), 1);
    assert_eq!(state_folders.value.get(), "first");
    assert_eq!(folders_of_state.value.get(), "second");
}

#[tokio::test]
async fn synced_field_named_like_a_timer_leaves_the_timer_alone() {
    let session = Session::new(0);
    let context = session.context(ContextKind::Background);
    let dispatcher = context.timer_dispatcher();
    dispatcher.register_handler(TimerName::ClearClipboard, || async { anyhow::Ok(()) });
    dispatcher
        .schedule(TimerName::ClearClipboard, Duration::from_secs(60))
        .await
        .unwrap();

    let lookalike = Labeled::attach(&context, "timer", TimerName::ClearClipboard.as_str());
    lookalike.value.set("not a fire time".to_owned());
    eventually("field write", || lookalike.local_writes() == 1).await;

    let registry = context.timer_registry();
    assert_eq!(
        registry.fire_time(TimerName::ClearClipboard).await.unwrap(),
        Some(60_000)
    );
    session.clock.set(1_000);
    assert!(dispatcher.tick().await.is_idle());

    session.clock.set(60_000);
    assert_eq!(
        dispatcher.tick().await.fired,
        vec![TimerName::ClearClipboard]
    );
    assert_eq!(lookalike.value.get(), "not a fire time");
}

#[tokio::test]
async fn clearing_timers_keeps_synced_fields() {
    let session = Session::new(0);
    let context = session.context(ContextKind::Background);
    let field = Labeled::attach(&context, "timer", TimerName::EventUploads.as_str());
    field.value.set("kept".to_owned());
    eventually("field write", || field.local_writes() == 1).await;

    context.timer_registry().clear_all().await.unwrap();

    let slot = Slot::new("timer", TimerName::EventUploads.as_str()).unwrap();
    assert_eq!(session.store.get(slot.as_str()).await.unwrap(), Some(json!("kept")));
}
