use std::collections::HashSet;

use crate::settings::Settings;
use crate::timer::Phase;

use super::Cue;

const ENABLE_LOGS: bool = true;
use crate::log_debug;

/// Fired keys kept before the set is wiped wholesale.
pub const DEFAULT_DEDUP_BOUND: usize = 100;
/// Highest minute count that has its own voice file.
pub const LAST_SPOKEN_MINUTE: u32 = 25;
/// Past the spoken range, a ding every this many minutes.
pub const LONG_SESSION_DING_EVERY: u32 = 5;
pub const SPOKEN_SECOND_MARKS: [u32; 5] = [50, 40, 30, 20, 10];
pub const FINAL_COUNTDOWN_FROM: u32 = 9;
pub const PRE_REMINDER_SECS: u32 = 30;

/// Decides the cue, if any, for each new remaining-seconds reading.
///
/// Each remaining-seconds value is consumed at most once per session, whether
/// or not a sound ends up playing for it.
#[derive(Debug, Clone)]
pub struct CueScheduler {
    fired: HashSet<u32>,
    bound: usize,
}

impl Default for CueScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_BOUND)
    }
}

impl CueScheduler {
    pub fn new(bound: usize) -> Self {
        Self {
            fired: HashSet::new(),
            bound,
        }
    }

    pub fn evaluate(&mut self, remaining: u32, phase: Phase, settings: &Settings) -> Option<Cue> {
        if !self.consume(remaining) {
            return None;
        }

        let cue = decide(remaining, settings)?;
        if voice_allowed(phase, settings) {
            log_debug!("cue {:?} at {}s ({})", cue, remaining, phase.label());
            Some(cue)
        } else {
            log_debug!("cue {:?} at {}s muted ({})", cue, remaining, phase.label());
            None
        }
    }

    /// Mark `remaining` as handled without evaluating it.
    pub fn consume(&mut self, remaining: u32) -> bool {
        if self.fired.contains(&remaining) {
            return false;
        }
        if self.fired.len() > self.bound {
            self.fired.clear();
        }
        self.fired.insert(remaining)
    }

    pub fn reset(&mut self) {
        self.fired.clear();
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }
}

/// Decision order; the first matching rule wins.
fn decide(remaining: u32, settings: &Settings) -> Option<Cue> {
    let minutes = remaining / 60;
    let seconds = remaining % 60;
    let interval = settings.announcement_interval.max(1);

    if seconds == 0 && (1..=LAST_SPOKEN_MINUTE).contains(&minutes) && minutes % interval == 0 {
        return Some(Cue::Minute(minutes));
    }

    if seconds == 0 && minutes > LAST_SPOKEN_MINUTE && minutes % LONG_SESSION_DING_EVERY == 0 {
        return Some(Cue::LongSessionDing);
    }

    if !settings.seconds_countdown_enabled {
        return None;
    }

    if SPOKEN_SECOND_MARKS.contains(&remaining) || (1..=FINAL_COUNTDOWN_FROM).contains(&remaining)
    {
        return Some(Cue::Second(remaining));
    }

    None
}

fn muted_for_phase(phase: Phase, settings: &Settings) -> bool {
    phase == Phase::Lounge || (settings.mute_during_breaks && phase.is_break_like())
}

pub fn voice_allowed(phase: Phase, settings: &Settings) -> bool {
    settings.audio_on && settings.voice_enabled && !muted_for_phase(phase, settings)
}

pub fn tick_allowed(phase: Phase, settings: &Settings) -> bool {
    settings.audio_on && settings.tick_enabled && !muted_for_phase(phase, settings)
}

/// The 30-second reminder ignores the voice switch but has its own.
pub fn pre_reminder_allowed(phase: Phase, settings: &Settings) -> bool {
    settings.audio_on && settings.pre_reminder_enabled && !muted_for_phase(phase, settings)
}

/// Transition chimes only respect the global switch.
pub fn transition_allowed(settings: &Settings) -> bool {
    settings.audio_on && settings.transition_chime_enabled
}
