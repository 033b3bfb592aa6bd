//! Dispatch behaviour across several timers and the periodic runner.

use std::sync::Arc;
use std::time::Duration;

use ctxsync::{ContextKind, TimerName};
use tokio::sync::mpsc;

use crate::helpers::Session;

async fn upload_unreachable() -> anyhow::Result<()> {
    anyhow::bail!("upload endpoint unreachable")
}

#[tokio::test]
async fn one_failing_handler_does_not_block_others() {
    let session = Session::new(0);
    let dispatcher = session.context(ContextKind::Background).timer_dispatcher();
    let (tx, mut rx) = mpsc::unbounded_channel();

    dispatcher.register_handler(TimerName::EventUploads, upload_unreachable);
    for name in [TimerName::ClearClipboard, TimerName::PhishingDomainUpdate] {
        let tx = tx.clone();
        dispatcher.register_handler(name, move || {
            let tx = tx.clone();
            async move {
                tx.send(name)?;
                anyhow::Ok(())
            }
        });
    }
    for name in [
        TimerName::ClearClipboard,
        TimerName::EventUploads,
        TimerName::PhishingDomainUpdate,
    ] {
        dispatcher
            .schedule(name, Duration::from_millis(10))
            .await
            .unwrap();
    }

    session.clock.set(10);
    let report = dispatcher.tick().await;

    assert_eq!(report.failed, vec![TimerName::EventUploads]);
    assert_eq!(
        report.fired,
        vec![TimerName::ClearClipboard, TimerName::PhishingDomainUpdate]
    );
    assert_eq!(rx.recv().await, Some(TimerName::ClearClipboard));
    assert_eq!(rx.recv().await, Some(TimerName::PhishingDomainUpdate));
}

#[tokio::test]
async fn periodic_handler_reschedules_itself() {
    let session = Session::new(0);
    let context = session.context(ContextKind::Background);
    let dispatcher = context.timer_dispatcher();
    let registry = context.timer_registry();
    dispatcher.register_handler(TimerName::ScheduleNextSync, move || {
        let registry = registry.clone();
        async move {
            registry
                .set_fire_time(TimerName::ScheduleNextSync, Duration::from_secs(30))
                .await?;
            anyhow::Ok(())
        }
    });
    dispatcher
        .schedule(TimerName::ScheduleNextSync, Duration::from_secs(30))
        .await
        .unwrap();

    for round in 1..=3_u64 {
        session.clock.set(round * 30_000);
        let report = dispatcher.tick().await;
        assert_eq!(report.fired, vec![TimerName::ScheduleNextSync]);
        assert_eq!(
            dispatcher
                .registry()
                .fire_time(TimerName::ScheduleNextSync)
                .await
                .unwrap(),
            Some((round + 1) * 30_000)
        );
    }
}

#[tokio::test]
async fn runner_dispatches_without_manual_ticks() {
    let session = Session::new(0);
    let config = ctxsync::SyncConfig {
        dispatch: ctxsync::config::DispatchConfig {
            period_secs: 1,
            triggers: 2,
        },
        ..ctxsync::SyncConfig::default()
    };
    let context = ctxsync::ExecutionContext::new(
        ContextKind::Background,
        Arc::new(session.store.clone()),
        Arc::new(session.bus.clone()),
        config,
    )
    .with_clock(Arc::new(session.clock.clone()));

    let dispatcher = context.timer_dispatcher();
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.register_handler(TimerName::NotificationsReconnectTimeout, move || {
        let tx = tx.clone();
        async move {
            tx.send(())?;
            anyhow::Ok(())
        }
    });
    dispatcher
        .schedule(
            TimerName::NotificationsReconnectTimeout,
            Duration::from_millis(1),
        )
        .await
        .unwrap();
    session.clock.set(1);

    let runner = context.spawn_dispatch_runner(Arc::clone(&dispatcher));
    assert_eq!(runner.trigger_count(), 2);

    let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert_eq!(fired.unwrap(), Some(()));
    runner.shutdown().await;
}
