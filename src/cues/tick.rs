use crate::settings::{Settings, TickSound};
use crate::timer::Phase;

use super::{assets, scheduler::tick_allowed, Cue};

/// Picks the next tick sound; tick-tock alternates between two effects.
#[derive(Debug, Clone, Default)]
pub struct TickAlternator {
    tock_next: bool,
}

impl TickAlternator {
    /// Cue for this second, if ticking is allowed at all.
    ///
    /// The alternation only advances when a sound is actually produced.
    pub fn next(&mut self, phase: Phase, settings: &Settings) -> Option<Cue> {
        if !tick_allowed(phase, settings) {
            return None;
        }

        match settings.tick_sound {
            TickSound::None => None,
            TickSound::TickTock => {
                let path = if self.tock_next { assets::TOCK } else { assets::TICK };
                self.tock_next = !self.tock_next;
                Some(Cue::Tick(path))
            }
            other => assets::fixed_tick(other).map(Cue::Tick),
        }
    }
}
