pub mod audio;
pub mod commands;
pub mod config;
pub mod cues;
pub mod driver;
pub mod host;
pub mod observation;
pub mod poller;
pub mod relay;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod tasks;
pub mod timer;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use audio::AudioEngineHandle;
use config::CompanionConfig;
use driver::CompanionController;
use host::HostContext;
use observation::HostEvent;
use poller::Poller;
use relay::Relay;
use settings::Settings;
use storage::KeyValueStore;

/// Open the shared store the way every entry point does.
pub fn open_store(config: &CompanionConfig) -> Result<(Arc<KeyValueStore>, HostContext)> {
    let host = HostContext::new(&config.asset_root);
    if let Some(parent) = config.store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = KeyValueStore::open(config.store_path.clone(), host.clone())
        .with_context(|| format!("failed to open store {}", config.store_path.display()))?;
    Ok((Arc::new(store), host))
}

/// Run the companion: page events in on stdin, sync relay out on stdout.
///
/// Returns when stdin closes or on Ctrl-C.
pub async fn run(config: CompanionConfig) -> Result<()> {
    let (store, host) = open_store(&config)?;
    info!(
        "flowcue starting up (store: {}, assets: {})",
        store.path().display(),
        host.asset_root().display()
    );
    if Settings::migrate_legacy(&store).context("failed to migrate legacy settings")? {
        info!("legacy settings migrated");
    }

    let audio = AudioEngineHandle::new(host.clone());
    let poller = Poller::new(
        config.poller_config(),
        Settings::load(&store),
        Arc::new(audio.clone()),
    );

    let (observations, observation_rx) = watch::channel(None);
    let mut controller = CompanionController::new(
        poller,
        Arc::clone(&store),
        host.clone(),
        observation_rx,
        config.intervals(),
    );

    let cancel = CancellationToken::new();
    let relay_task = config.relay.then(|| {
        let relay = Relay::new(Arc::clone(&store), std::io::stdout());
        tokio::spawn(relay.run(cancel.clone()))
    });

    controller.start().await.context("failed to start drivers")?;

    let mut events = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = events.next_line() => line.context("failed to read host events")?,
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        };
        let Some(line) = line else {
            info!("host closed the event stream");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostEvent>(line) {
            Ok(HostEvent::Snapshot(obs)) => {
                observations.send_replace(Some(obs));
            }
            Ok(HostEvent::Visibility { visible }) => controller.on_visibility(visible).await?,
            Ok(HostEvent::Teardown) => controller.on_teardown().await?,
            Err(err) => warn!("ignoring malformed host event: {err}"),
        }
    }

    controller.stop().await?;
    cancel.cancel();
    if let Some(task) = relay_task {
        task.await
            .context("relay task failed to join")?
            .context("relay failed")?;
    }
    audio.shutdown();

    info!("flowcue stopped");
    Ok(())
}
