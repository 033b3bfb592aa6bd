//! Two-context session simulator.
//!
//! Runs a background and a foreground context over one shared session,
//! syncs a reactive field between them, schedules a timer, tears the
//! background context down and recreates it, then shows that the timer
//! still fires exactly once.
//!
//! Usage: `ctxsync-sim [CONFIG_PATH]`. Without a path the default config
//! location is used if it exists.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use ctxsync::clock::now_epoch_millis;
use ctxsync::{
    ContextKind, ExecutionContext, LocalBus, ManualClock, Reactive, SyncConfig, SyncOptions,
    SyncRegistration, SyncedField, TimerName,
};

/// Owner whose folder list is shared by every context.
struct VaultSettings {
    folders: Reactive<Vec<String>>,
    _registration: SyncRegistration,
}

impl VaultSettings {
    fn new(context: &ExecutionContext) -> ctxsync::Result<Self> {
        let folders = Reactive::new(Vec::new());
        let registration = context
            .sync_registry("VaultSettings")
            .field(SyncedField::array(
                "folders",
                &folders,
                SyncOptions::constructor(),
            )?)
            .register()?;
        Ok(Self {
            folders,
            _registration: registration,
        })
    }
}

async fn wait_for(value: &Reactive<Vec<String>>, expected: &[String]) -> anyhow::Result<()> {
    let mut updates = value.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(current) = updates.next().await {
            if current == expected {
                return;
            }
        }
    })
    .await
    .context("contexts did not converge")
}

fn load_config() -> anyhow::Result<SyncConfig> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => SyncConfig::from_file(&path)
            .with_context(|| format!("cannot load config from {}", path.display())),
        None => SyncConfig::load_or_default().context("cannot load default config"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("ctxsync-sim starting");

    let store = ctxsync::store::open(&config.store)?;
    let bus = Arc::new(LocalBus::new());
    let clock = ManualClock::new(now_epoch_millis());
    let open_context = |kind| {
        ExecutionContext::new(kind, Arc::clone(&store), bus.clone(), config.clone())
            .with_clock(Arc::new(clock.clone()))
    };

    let background = open_context(ContextKind::Background);
    // A new session starts with no timers pending.
    background.timer_registry().clear_all().await?;
    let popup = open_context(ContextKind::Foreground);
    let bg_settings = VaultSettings::new(&background)?;
    let popup_settings = VaultSettings::new(&popup)?;

    let folders = vec!["Work".to_owned(), "Personal".to_owned()];
    bg_settings.folders.set(folders.clone());
    wait_for(&popup_settings.folders, &folders).await?;
    tracing::info!(?folders, "foreground converged on background change");

    let dispatcher = background.timer_dispatcher();
    dispatcher.register_handler(TimerName::ClearClipboard, || async {
        tracing::info!("clipboard cleared");
        anyhow::Ok(())
    });
    dispatcher
        .schedule(TimerName::ClearClipboard, Duration::from_secs(5))
        .await?;
    tracing::info!("clipboard timer scheduled, tearing down background context");
    drop(dispatcher);
    drop(bg_settings);
    drop(background);

    clock.advance(2_000);
    let background = open_context(ContextKind::Background);
    let bg_settings = VaultSettings::new(&background)?;
    let dispatcher = background.timer_dispatcher();
    dispatcher.register_handler(TimerName::ClearClipboard, || async {
        tracing::info!("clipboard cleared after restart");
        anyhow::Ok(())
    });

    let report = dispatcher.tick().await;
    tracing::info!(?report, "tick before the timer is due");

    clock.advance(4_000);
    let report = dispatcher.tick().await;
    tracing::info!(?report, "tick after the timer is due");
    anyhow::ensure!(
        report.fired == vec![TimerName::ClearClipboard],
        "clipboard timer did not fire after restart"
    );

    let renamed = vec!["Work".to_owned(), "Archive".to_owned()];
    popup_settings.folders.set(renamed.clone());
    wait_for(&bg_settings.folders, &renamed).await?;
    tracing::info!(folders = ?renamed, "recreated background converged on foreground change");

    tracing::info!("ctxsync-sim finished");
    Ok(())
}
