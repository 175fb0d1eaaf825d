use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("host context invalidated")]
    ContextLost,
    #[error("failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {0}")]
    Decode(String),
    #[error("audio device unavailable: {0}")]
    Device(String),
}

/// Encoded sound bytes; every play decodes from the start.
#[derive(Debug, Clone)]
pub struct SoundHandle {
    pub path: PathBuf,
    bytes: Arc<[u8]>,
}

impl SoundHandle {
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, AudioError> {
        let bytes = fs::read(path).map_err(|source| AudioError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Output side of the player.
pub trait SoundBackend {
    fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError>;
    /// Start playback and return without waiting for it to finish.
    fn play(&mut self, handle: &SoundHandle, volume: f32) -> Result<(), AudioError>;
    /// Drop device state so the next play opens a fresh output.
    fn reset(&mut self);
}

impl<B: SoundBackend + ?Sized> SoundBackend for Box<B> {
    fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError> {
        (**self).load(path)
    }

    fn play(&mut self, handle: &SoundHandle, volume: f32) -> Result<(), AudioError> {
        (**self).play(handle, volume)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Default output device through rodio. Not `Send`; lives on the audio thread.
#[derive(Default)]
pub struct RodioBackend {
    _stream: Option<OutputStream>,
    handle: Option<OutputStreamHandle>,
}

impl RodioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_output(&mut self) -> Result<&OutputStreamHandle, AudioError> {
        if self.handle.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| AudioError::Device(format!("failed to open output stream: {e}")))?;
            self._stream = Some(stream);
            self.handle = Some(handle);
        }
        self.handle
            .as_ref()
            .ok_or_else(|| AudioError::Device("output stream missing".into()))
    }
}

impl SoundBackend for RodioBackend {
    fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError> {
        SoundHandle::read(path)
    }

    fn play(&mut self, sound: &SoundHandle, volume: f32) -> Result<(), AudioError> {
        let source = Decoder::new(Cursor::new(Arc::clone(&sound.bytes)))
            .map_err(|e| AudioError::Decode(format!("{}: {e}", sound.path.display())))?;

        let output = self.ensure_output()?;
        let sink = Sink::try_new(output)
            .map_err(|e| AudioError::Device(format!("failed to create sink: {e}")))?;
        sink.set_volume(volume.clamp(0.0, 1.0));
        sink.append(source);
        sink.detach();
        Ok(())
    }

    fn reset(&mut self) {
        self.handle = None;
        self._stream = None;
    }
}
