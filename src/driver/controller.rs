use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::host::HostContext;
use crate::observation::Observation;
use crate::poller::Poller;
use crate::storage::KeyValueStore;

use super::loop_worker::{poll_loop, settings_loop, store_watch_loop, tick_loop};

#[derive(Debug, Clone, Copy)]
pub struct DriverIntervals {
    pub poll: Duration,
    pub tick: Duration,
}

impl Default for DriverIntervals {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(1),
            tick: Duration::from_secs(1),
        }
    }
}

/// Owns the periodic drivers and their page lifecycle.
pub struct CompanionController {
    poller: Arc<Mutex<Poller>>,
    store: Arc<KeyValueStore>,
    host: HostContext,
    observations: watch::Receiver<Option<Observation>>,
    intervals: DriverIntervals,
    cancel_token: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
    visible: bool,
    stopped_while_hidden: bool,
}

impl CompanionController {
    pub fn new(
        poller: Poller,
        store: Arc<KeyValueStore>,
        host: HostContext,
        observations: watch::Receiver<Option<Observation>>,
        intervals: DriverIntervals,
    ) -> Self {
        Self {
            poller: Arc::new(Mutex::new(poller)),
            store,
            host,
            observations,
            intervals,
            cancel_token: None,
            handles: Vec::new(),
            visible: true,
            stopped_while_hidden: false,
        }
    }

    pub fn poller(&self) -> Arc<Mutex<Poller>> {
        Arc::clone(&self.poller)
    }

    /// True while the drivers have been started and nothing cancelled them.
    pub fn is_running(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|token| !token.is_cancelled())
            .unwrap_or(false)
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            bail!("drivers already running");
        }
        if !self.host.is_valid() {
            bail!("host context invalidated; reload required");
        }
        // Reap tasks from a run that stopped itself.
        self.stop().await?;

        let cancel_token = CancellationToken::new();
        self.handles = vec![
            tokio::spawn(poll_loop(
                self.poller(),
                self.observations.clone(),
                Arc::clone(&self.store),
                self.intervals.poll,
                cancel_token.clone(),
            )),
            tokio::spawn(tick_loop(
                self.poller(),
                self.intervals.tick,
                cancel_token.clone(),
            )),
            tokio::spawn(settings_loop(
                self.poller(),
                Arc::clone(&self.store),
                cancel_token.clone(),
            )),
            tokio::spawn(store_watch_loop(
                Arc::clone(&self.store),
                self.intervals.poll,
                cancel_token.clone(),
            )),
        ];
        self.cancel_token = Some(cancel_token);
        self.stopped_while_hidden = false;
        info!("drivers started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        for handle in self.handles.drain(..) {
            handle.await.context("driver task failed to join")?;
        }
        Ok(())
    }

    /// Page torn down (navigated away or discarded).
    pub async fn on_teardown(&mut self) -> Result<()> {
        let was_running = self.is_running();
        self.stop().await?;
        if was_running && !self.visible {
            self.stopped_while_hidden = true;
        }
        info!("drivers stopped on teardown (visible: {})", self.visible);
        Ok(())
    }

    /// Visibility signal; restarts drivers that were torn down while hidden.
    pub async fn on_visibility(&mut self, visible: bool) -> Result<()> {
        self.visible = visible;
        if visible && self.stopped_while_hidden && !self.is_running() && self.host.is_valid() {
            info!("tab visible again; restarting drivers");
            self.start().await?;
        }
        Ok(())
    }
}
