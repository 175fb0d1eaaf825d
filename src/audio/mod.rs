pub mod backend;
pub mod player;
pub mod retry;

pub use backend::{AudioError, RodioBackend, SoundBackend, SoundHandle};
pub use player::{PlayOutcome, PlaybackCore};
pub use retry::RetryPolicy;

use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use crate::cues::PlayRequest;
use crate::host::HostContext;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

/// Fire-and-forget playback as seen by the scheduler and drivers.
pub trait AudioSink: Send + Sync {
    fn submit(&self, request: PlayRequest);
}

enum AudioCommand {
    Play(PlayRequest),
    Shutdown,
}

type BackendFactory = Arc<dyn Fn() -> Box<dyn SoundBackend> + Send + Sync>;

/// Handle to the dedicated audio thread.
///
/// The thread is spawned on first use and owns the non-`Send` output device.
/// Every request is queued and `submit` returns at once.
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    host: HostContext,
    factory: BackendFactory,
}

impl AudioEngineHandle {
    pub fn new(host: HostContext) -> Self {
        Self::with_backend(host, || Box::new(RodioBackend::new()))
    }

    pub fn with_backend<F>(host: HostContext, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SoundBackend> + Send + Sync + 'static,
    {
        Self {
            tx: Arc::new(Mutex::new(None)),
            host,
            factory: Arc::new(factory),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let host = self.host.clone();
        let factory = Arc::clone(&self.factory);

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut core = PlaybackCore::new(factory(), host);
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(request) => {
                            let outcome = core.play(&request);
                            log_debug!("{} -> {:?}", request.path, outcome);
                        }
                        AudioCommand::Shutdown => break,
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// Stop the audio thread; a later `submit` starts a new one.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(AudioCommand::Shutdown);
            }
        }
    }
}

impl AudioSink for AudioEngineHandle {
    fn submit(&self, request: PlayRequest) {
        if !self.host.is_valid() {
            log_debug!("host context gone; dropping {}", request.path);
            return;
        }

        let sent = self
            .ensure_thread()
            .and_then(|tx| tx.send(AudioCommand::Play(request)).map_err(|e| e.to_string()));
        if let Err(err) = sent {
            log_warn!("audio engine unavailable: {err}");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cues::SoundCategory;
    use std::path::Path;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;
    use tempfile::TempDir;

    struct ChannelBackend {
        played: Sender<String>,
    }

    impl SoundBackend for ChannelBackend {
        fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError> {
            Ok(SoundHandle::new(path, vec![1u8]))
        }

        fn play(&mut self, handle: &SoundHandle, _volume: f32) -> Result<(), AudioError> {
            let _ = self.played.send(handle.path.display().to_string());
            Ok(())
        }

        fn reset(&mut self) {}
    }

    fn engine() -> (AudioEngineHandle, Receiver<String>, HostContext, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let host = HostContext::new(dir.path());
        let (played_tx, played_rx) = mpsc::channel();
        let played_tx = Mutex::new(played_tx);
        let engine = AudioEngineHandle::with_backend(host.clone(), move || {
            let played = played_tx.lock().expect("sender lock").clone();
            Box::new(ChannelBackend { played })
        });
        (engine, played_rx, host, dir)
    }

    fn ding() -> PlayRequest {
        PlayRequest {
            path: "audio/effects/ding.mp3".into(),
            volume: 1.0,
            category: SoundCategory::Voice,
        }
    }

    #[test]
    fn submitted_requests_reach_the_backend() {
        let (engine, played, _host, dir) = engine();
        engine.submit(ding());
        let path = played
            .recv_timeout(Duration::from_secs(2))
            .expect("played within timeout");
        assert_eq!(
            path,
            dir.path().join("audio/effects/ding.mp3").display().to_string()
        );
        engine.shutdown();
    }

    #[test]
    fn nothing_is_queued_once_context_is_lost() {
        let (engine, played, host, _dir) = engine();
        host.invalidate();
        engine.submit(ding());
        assert!(played.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
