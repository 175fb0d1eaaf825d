pub mod assets;
pub mod scheduler;
pub mod tick;

pub use scheduler::{CueScheduler, DEFAULT_DEDUP_BOUND, PRE_REMINDER_SECS};
pub use tick::TickAlternator;

use serde::Serialize;

use crate::settings::{Settings, TransitionSound};

/// How the player treats a sound's handle between plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SoundCategory {
    /// Reused and rewound on every play.
    Tick,
    /// Loaded fresh for every play.
    Voice,
    /// Loaded fresh for every play.
    Chime,
}

/// One audio event decided by the scheduler or a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    Minute(u32),
    LongSessionDing,
    Second(u32),
    PreReminder,
    Transition(TransitionSound),
    Tick(&'static str),
}

/// What the audio engine is asked to play.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub path: String,
    pub volume: f32,
    pub category: SoundCategory,
}

impl Cue {
    pub fn asset(&self) -> String {
        match self {
            Cue::Minute(minutes) => assets::minute_voice(*minutes),
            Cue::LongSessionDing => assets::DING.to_string(),
            Cue::Second(seconds) => assets::second_voice(*seconds),
            Cue::PreReminder => assets::second_voice(PRE_REMINDER_SECS),
            Cue::Transition(sound) => assets::transition(*sound).to_string(),
            Cue::Tick(path) => path.to_string(),
        }
    }

    pub fn category(&self) -> SoundCategory {
        match self {
            Cue::Tick(_) => SoundCategory::Tick,
            Cue::Transition(_) => SoundCategory::Chime,
            _ => SoundCategory::Voice,
        }
    }

    pub fn request(&self, settings: &Settings) -> PlayRequest {
        let volume = match self.category() {
            SoundCategory::Tick => settings.tick_volume,
            SoundCategory::Voice | SoundCategory::Chime => settings.voice_volume,
        };
        PlayRequest {
            path: self.asset(),
            volume,
            category: self.category(),
        }
    }
}
