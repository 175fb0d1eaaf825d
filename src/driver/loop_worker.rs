use std::path::Path;
use std::sync::Arc;

use notify::{RecursiveMode, Watcher};
use tokio::sync::{broadcast::error::RecvError, mpsc, Mutex};
use tokio::time::{Duration, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::observation::ObservationSource;
use crate::poller::{PollOutcome, Poller};
use crate::settings::Settings;
use crate::storage::{KeyValueStore, StoreError};
use crate::sync::{Publication, SYNC_KEYS};

// Set to true to see every poll decision.
const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info, log_warn};

fn interval(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Main 1 Hz driver: page snapshot in, cue decisions out.
pub async fn poll_loop<S: ObservationSource>(
    poller: Arc<Mutex<Poller>>,
    mut source: S,
    store: Arc<KeyValueStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(obs) = source.latest() else {
                    continue;
                };
                let (outcome, publication) = {
                    let mut poller = poller.lock().await;
                    let outcome = poller.poll(&obs);
                    (outcome, poller.take_publication())
                };
                if let PollOutcome::Updated { remaining, phase } = outcome {
                    log_debug!("remaining {}s ({})", remaining, phase.label());
                }
                let Some(publication) = publication else {
                    continue;
                };
                if publish(&store, publication).await {
                    log_info!("host context invalidated; stopping drivers");
                    cancel.cancel();
                    break;
                }
            }
            _ = cancel.cancelled() => {
                log_info!("poll loop shutting down");
                break;
            }
        }
    }
}

/// Apply a staged store update on the blocking pool.
///
/// Returns true when the host context is gone and the drivers should stop.
/// Any other store failure is logged and polling carries on.
pub async fn publish(store: &Arc<KeyValueStore>, publication: Publication) -> bool {
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || publication.apply(&store)).await {
        Ok(Ok(())) => false,
        Ok(Err(StoreError::ContextInvalidated)) => {
            log_debug!("store write after context invalidation; stopping");
            true
        }
        Ok(Err(err)) => {
            log_warn!("failed to publish session sync: {err}");
            false
        }
        Err(err) => {
            log_warn!("session sync write did not finish: {err}");
            false
        }
    }
}

/// Independent 1 Hz tick-sound driver, so ticks keep cadence when polls skip work.
pub async fn tick_loop(poller: Arc<Mutex<Poller>>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poller.lock().await.tick();
            }
            _ = cancel.cancelled() => {
                log_info!("tick loop shutting down");
                break;
            }
        }
    }
}

/// Re-read settings into the poller whenever the store reports a change.
pub async fn settings_loop(
    poller: Arc<Mutex<Poller>>,
    store: Arc<KeyValueStore>,
    cancel: CancellationToken,
) {
    let mut changes = store.subscribe();

    loop {
        tokio::select! {
            change = changes.recv() => {
                match change {
                    // Our own session-sync writes land here every poll.
                    Ok(change) if change.keys.iter().all(|k| SYNC_KEYS.contains(&k.as_str())) => {}
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        let settings = Settings::load(&store);
                        poller.lock().await.apply_settings(settings);
                    }
                    Err(RecvError::Closed) => {
                        log_warn!("store change feed closed");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// Reload the store whenever its file changes on disk, so edits from the
/// `settings` and `tasks` commands reach the running drivers.
///
/// Falls back to re-reading every `fallback_period` when no file watcher
/// can be set up.
pub async fn store_watch_loop(
    store: Arc<KeyValueStore>,
    fallback_period: Duration,
    cancel: CancellationToken,
) {
    let (tx, mut events) = mpsc::channel::<()>(1);
    let watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if event.is_ok() {
            // A reload is already queued when the channel is full.
            let _ = tx.try_send(());
        }
    })
    .and_then(|mut watcher| {
        watcher.watch(watch_root(store.path()), RecursiveMode::NonRecursive)?;
        Ok(watcher)
    });

    let (_watcher, mut fallback) = match watcher {
        Ok(watcher) => (Some(watcher), None),
        Err(err) => {
            log_warn!("store watcher unavailable ({err}); re-reading every {fallback_period:?}");
            (None, Some(interval(fallback_period)))
        }
    };

    loop {
        tokio::select! {
            Some(()) = events.recv() => reload(&store).await,
            _ = next_tick(&mut fallback) => reload(&store).await,
            _ = cancel.cancelled() => {
                log_info!("store watcher shutting down");
                break;
            }
        }
    }
}

fn watch_root(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn reload(store: &Arc<KeyValueStore>) {
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.reload()).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => log_warn!("failed to reload store: {err}"),
        Err(err) => log_warn!("store reload did not finish: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::RecordingSink;
    use crate::host::HostContext;
    use crate::observation::{ElementSnapshot, Observation};
    use crate::poller::PollerConfig;
    use serde_json::{json, Map, Value};
    use std::fs;
    use tempfile::TempDir;
    use tokio::sync::watch;

    fn at(remaining: u32) -> Observation {
        Observation {
            elements: vec![ElementSnapshot {
                id: 7,
                text: format!("{}:{:02}", remaining / 60, remaining % 60),
                font_size_px: 40.0,
                width: 100.0,
                height: 50.0,
            }],
            ..Default::default()
        }
    }

    fn entries(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    fn open(dir: &TempDir, host: &HostContext) -> Arc<KeyValueStore> {
        Arc::new(KeyValueStore::open(dir.path().join("store.json"), host.clone()).expect("open"))
    }

    async fn wait_for_reading(poller: &Arc<Mutex<Poller>>, remaining: u32) -> bool {
        for _ in 0..300 {
            if poller.lock().await.last_seen() == Some(remaining) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn failed_store_write_keeps_polling() {
        let dir = TempDir::new().expect("tempdir");
        let host = HostContext::new(dir.path());
        let store = open(&dir, &host);
        fs::create_dir(dir.path().join("store.json")).expect("dir in place of file");

        let sink = Arc::new(RecordingSink::default());
        let poller = Arc::new(Mutex::new(Poller::new(
            PollerConfig::default(),
            Settings::default(),
            sink,
        )));
        let (observations, rx) = watch::channel(Some(at(1500)));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&poller),
            rx,
            store,
            Duration::from_millis(10),
            cancel.clone(),
        ));

        assert!(wait_for_reading(&poller, 1500).await);
        observations.send_replace(Some(at(1499)));
        assert!(wait_for_reading(&poller, 1499).await);
        assert!(!cancel.is_cancelled());

        cancel.cancel();
        task.await.expect("poll loop join");
    }

    #[tokio::test]
    async fn publish_stops_only_on_lost_context() {
        let dir = TempDir::new().expect("tempdir");
        let host = HostContext::new(dir.path());
        let store = open(&dir, &host);

        assert!(!publish(&store, Publication::ClearLive).await);

        fs::create_dir(dir.path().join("store.json")).expect("dir in place of file");
        assert!(!publish(&store, Publication::ClearLive).await);

        host.invalidate();
        assert!(publish(&store, Publication::ClearLive).await);
    }

    #[tokio::test]
    async fn watcher_announces_edits_from_another_process() {
        let dir = TempDir::new().expect("tempdir");
        let host = HostContext::new(dir.path());
        let running = open(&dir, &host);
        let popup = open(&dir, &host);
        let mut changes = running.subscribe();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(store_watch_loop(
            Arc::clone(&running),
            Duration::from_millis(50),
            cancel.clone(),
        ));

        // The watcher registers asynchronously; keep editing until one lands.
        let mut seen = None;
        for volume in 1..=50 {
            popup
                .set(entries(json!({"tickVolume": f64::from(volume) / 100.0})))
                .expect("popup set");
            if let Ok(Ok(change)) =
                tokio::time::timeout(Duration::from_millis(100), changes.recv()).await
            {
                seen = Some(change);
                break;
            }
        }

        let change = seen.expect("running store saw the edit");
        assert_eq!(change.keys, vec!["tickVolume".to_string()]);
        assert!(running.get(&["tickVolume"]).contains_key("tickVolume"));

        cancel.cancel();
        task.await.expect("watcher join");
    }
}
