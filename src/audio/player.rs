use std::collections::HashMap;

use crate::cues::{PlayRequest, SoundCategory};
use crate::host::HostContext;

use super::backend::{AudioError, SoundBackend, SoundHandle};
use super::retry::RetryPolicy;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Played { attempts: u32 },
    /// The host bundle is gone; nothing will play until a restart.
    ContextLost,
    Failed { attempts: u32, error: String },
}

/// Synchronous half of the audio player: handle cache, retry and error policy.
pub struct PlaybackCore<B: SoundBackend> {
    backend: B,
    host: HostContext,
    tick_cache: HashMap<String, SoundHandle>,
    retry: RetryPolicy,
}

impl<B: SoundBackend> PlaybackCore<B> {
    pub fn new(backend: B, host: HostContext) -> Self {
        Self {
            backend,
            host,
            tick_cache: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn play(&mut self, request: &PlayRequest) -> PlayOutcome {
        if !self.host.is_valid() {
            log_debug!("host context gone; skipping {}", request.path);
            return PlayOutcome::ContextLost;
        }

        let retry = self.retry;
        let attempted = retry.run(
            |attempt| {
                if attempt > 1 {
                    // Stale handles (e.g. after sleep) are rebuilt from scratch.
                    self.tick_cache.remove(&request.path);
                    self.backend.reset();
                }
                self.attempt(request)
            },
            |err| !matches!(err, AudioError::ContextLost),
        );

        match attempted.result {
            Ok(()) => PlayOutcome::Played {
                attempts: attempted.attempts,
            },
            Err(AudioError::ContextLost) => {
                log_debug!("host context lost while playing {}", request.path);
                PlayOutcome::ContextLost
            }
            Err(err) => {
                log_warn!(
                    "giving up on {} after {} attempts: {err}",
                    request.path,
                    attempted.attempts
                );
                PlayOutcome::Failed {
                    attempts: attempted.attempts,
                    error: err.to_string(),
                }
            }
        }
    }

    pub fn cached_handles(&self) -> usize {
        self.tick_cache.len()
    }

    fn attempt(&mut self, request: &PlayRequest) -> Result<(), AudioError> {
        if !self.host.is_valid() {
            return Err(AudioError::ContextLost);
        }

        let handle = match request.category {
            SoundCategory::Tick => match self.tick_cache.get(&request.path) {
                Some(handle) => handle.clone(),
                None => {
                    let handle = self.backend.load(&self.host.resolve(&request.path))?;
                    self.tick_cache.insert(request.path.clone(), handle.clone());
                    handle
                }
            },
            SoundCategory::Voice | SoundCategory::Chime => {
                self.backend.load(&self.host.resolve(&request.path))?
            }
        };

        self.backend.play(&handle, request.volume)
    }
}
