use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::storage::{KeyValueStore, StoreChange};
use crate::sync::{SYNC_KEYS, TIMER_SECONDS};

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

pub const RELAY_MESSAGE_TYPE: &str = "FLOWCLUB_TIMER_SYNC";
/// Sends closer together than this are dropped.
pub const MIN_RESEND_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    payload: &'a Map<String, Value>,
}

/// Forwards session-sync keys to an outer listener as JSON lines.
pub struct Relay<W: Write> {
    store: Arc<KeyValueStore>,
    out: W,
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl<W: Write> Relay<W> {
    pub fn new(store: Arc<KeyValueStore>, out: W) -> Self {
        Self {
            store,
            out,
            min_interval: MIN_RESEND_INTERVAL,
            last_sent: None,
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Send the current sync payload unless throttled or no countdown is published.
    ///
    /// Returns whether a message was written.
    pub fn send_latest(&mut self, reason: &str) -> Result<bool> {
        let now = Instant::now();
        if matches!(self.last_sent, Some(last) if now.duration_since(last) < self.min_interval) {
            return Ok(false);
        }

        let payload = self.store.get(&SYNC_KEYS);
        if !payload.get(TIMER_SECONDS).is_some_and(Value::is_number) {
            log_debug!("relay skipped ({reason}): no numeric {TIMER_SECONDS}");
            return Ok(false);
        }

        let message = RelayMessage {
            kind: RELAY_MESSAGE_TYPE,
            payload: &payload,
        };
        let line = serde_json::to_string(&message).context("failed to encode relay message")?;
        writeln!(self.out, "{line}").context("failed to write relay message")?;
        self.out.flush().context("failed to flush relay output")?;

        self.last_sent = Some(now);
        log_debug!("relayed sync payload ({reason})");
        Ok(true)
    }

    fn handle(&mut self, change: StoreChange) -> Result<()> {
        if change.keys.iter().any(|k| SYNC_KEYS.contains(&k.as_str())) {
            self.send_latest("storage change")?;
        }
        Ok(())
    }

    /// Initial send, then one send per relevant store change until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<W> {
        let mut changes = self.store.subscribe();
        self.send_latest("initial")?;

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => self.handle(change)?,
                    Err(RecvError::Lagged(skipped)) => {
                        log_warn!("relay lagged by {skipped} changes; resending");
                        self.send_latest("lagged")?;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = cancel.cancelled() => break,
            }
        }
        Ok(self.out)
    }
}
