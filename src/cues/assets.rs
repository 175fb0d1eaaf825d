//! Bundle-relative sound paths. The file names are shared with the packaged
//! assets and must not change.

use crate::settings::{TickSound, TransitionSound};

pub const TICK: &str = "audio/effects/tick1.mp3";
pub const TOCK: &str = "audio/effects/tok1.mp3";
pub const SINGLE_TICK: &str = "audio/effects/tick.m4a";
pub const BEEP1: &str = "audio/effects/beep1.mp3";
pub const BEEP2: &str = "audio/effects/beep2.mp3";
pub const DING: &str = "audio/effects/ding.mp3";
pub const CHIME: &str = "audio/transitions/chime.mp3";
pub const BELL: &str = "audio/transitions/bell.mp3";

/// `audio/minutes/m05.mp3` for five minutes.
pub fn minute_voice(minutes: u32) -> String {
    format!("audio/minutes/m{minutes:02}.mp3")
}

/// `audio/seconds/s07.mp3` for seven seconds, `s30.mp3` for thirty.
pub fn second_voice(seconds: u32) -> String {
    format!("audio/seconds/s{seconds:02}.mp3")
}

/// Fixed asset for non-alternating tick styles; `None` for tick-tock and silence.
pub fn fixed_tick(sound: TickSound) -> Option<&'static str> {
    match sound {
        TickSound::Tick => Some(SINGLE_TICK),
        TickSound::Beep1 => Some(BEEP1),
        TickSound::Beep2 => Some(BEEP2),
        TickSound::Ding => Some(DING),
        TickSound::TickTock | TickSound::None => None,
    }
}

pub fn transition(sound: TransitionSound) -> &'static str {
    match sound {
        TransitionSound::Chime => CHIME,
        TransitionSound::Bell => BELL,
        TransitionSound::Ding => DING,
    }
}
