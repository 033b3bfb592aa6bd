//! Timers scheduled in one background context fire in its replacement.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ctxsync::{ContextKind, TimerDispatcher, TimerName};

use crate::helpers::Session;

fn count_fires(dispatcher: &TimerDispatcher, name: TimerName) -> Arc<AtomicUsize> {
    let fires = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fires);
    dispatcher.register_handler(name, move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    });
    fires
}

#[tokio::test]
async fn timer_survives_background_restart() {
    let session = Session::new(0);

    let first = session.context(ContextKind::Background).timer_dispatcher();
    let first_fires = count_fires(&first, TimerName::ClearClipboard);
    first
        .schedule(TimerName::ClearClipboard, Duration::from_millis(5_000))
        .await
        .unwrap();

    session.clock.set(1_000);
    assert!(first.tick().await.is_idle());

    session.clock.set(2_000);
    drop(first);
    let second = session.context(ContextKind::Background).timer_dispatcher();
    let second_fires = count_fires(&second, TimerName::ClearClipboard);

    session.clock.set(3_000);
    let report = second.tick().await;
    assert_eq!(report.pending, vec![TimerName::ClearClipboard]);
    assert!(report.is_idle());

    session.clock.set(6_000);
    let report = second.tick().await;
    assert_eq!(report.fired, vec![TimerName::ClearClipboard]);

    assert_eq!(first_fires.load(Ordering::SeqCst), 0);
    assert_eq!(second_fires.load(Ordering::SeqCst), 1);
    assert_eq!(
        second
            .registry()
            .fire_time(TimerName::ClearClipboard)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn fired_timer_is_not_fired_by_another_context() {
    let session = Session::new(0);
    let background = session.context(ContextKind::Background).timer_dispatcher();
    let page = session.context(ContextKind::Page).timer_dispatcher();
    let bg_fires = count_fires(&background, TimerName::LoginStrategySessionTimeout);
    let page_fires = count_fires(&page, TimerName::LoginStrategySessionTimeout);

    background
        .schedule(
            TimerName::LoginStrategySessionTimeout,
            Duration::from_millis(100),
        )
        .await
        .unwrap();
    session.clock.set(500);

    background.tick().await;
    page.tick().await;
    background.tick().await;

    assert_eq!(bg_fires.load(Ordering::SeqCst), 1);
    assert_eq!(page_fires.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clearing_cancels_a_scheduled_timer() {
    let session = Session::new(0);
    let dispatcher = session.context(ContextKind::Background).timer_dispatcher();
    let fires = count_fires(&dispatcher, TimerName::Fido2ClientAbortTimeout);

    dispatcher
        .schedule(TimerName::Fido2ClientAbortTimeout, Duration::from_secs(1))
        .await
        .unwrap();
    session
        .context(ContextKind::Foreground)
        .timer_registry()
        .clear(TimerName::Fido2ClientAbortTimeout)
        .await
        .unwrap();

    session.clock.set(10_000);
    assert!(dispatcher.tick().await.is_idle());
    assert_eq!(fires.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn recurring_timer_resumes_after_long_absence() {
    let session = Session::new(0);
    let first = session.context(ContextKind::Background).timer_dispatcher();
    let first_fires = count_fires(&first, TimerName::EventUploads);
    first
        .schedule_interval(TimerName::EventUploads, Duration::from_secs(60), None)
        .await
        .unwrap();

    session.clock.set(60_000);
    assert_eq!(first.tick().await.fired, vec![TimerName::EventUploads]);
    drop(first);

    // The background context is gone for a little over an hour.
    session.clock.set(60_000 + 3_630_000);
    let second = session.context(ContextKind::Background).timer_dispatcher();
    let second_fires = count_fires(&second, TimerName::EventUploads);

    let report = second.recover().await;
    assert_eq!(report.fired, vec![TimerName::EventUploads]);
    assert_eq!(
        second
            .registry()
            .fire_time(TimerName::EventUploads)
            .await
            .unwrap(),
        Some(3_720_000)
    );
    assert!(second.tick().await.is_idle());

    session.clock.set(3_720_000);
    assert_eq!(second.tick().await.fired, vec![TimerName::EventUploads]);
    assert_eq!(first_fires.load(Ordering::SeqCst), 1);
    assert_eq!(second_fires.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn runner_recovers_overdue_timers_on_start() {
    let session = Session::new(0);
    let context = session.context(ContextKind::Background);
    context
        .timer_registry()
        .set_fire_time(TimerName::ClearClipboard, Duration::from_secs(5))
        .await
        .unwrap();
    session.clock.set(600_000);

    let dispatcher = context.timer_dispatcher();
    let fires = count_fires(&dispatcher, TimerName::ClearClipboard);
    let runner = context.spawn_dispatch_runner(Arc::clone(&dispatcher));

    tokio::time::timeout(Duration::from_secs(5), async {
        while fires.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    runner.shutdown().await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}
