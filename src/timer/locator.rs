use crate::observation::{ElementSnapshot, Observation};

use super::parse::looks_like_time;

const ENABLE_LOGS: bool = true;
use crate::log_debug;

/// Consecutive polls without any time-like element before the timer counts as gone.
pub const DEFAULT_GRACE_POLLS: u32 = 5;
/// Distinct text values that must be seen before committing to an element.
pub const LOCK_AFTER_CHANGES: u32 = 2;

/// Pick the element most likely to be the real countdown.
///
/// Only visible elements whose trimmed text matches the time pattern qualify.
/// The largest font wins; on equal sizes the earliest element is kept.
pub fn select_candidate(elements: &[ElementSnapshot]) -> Option<&ElementSnapshot> {
    elements
        .iter()
        .filter(|el| el.is_visible() && looks_like_time(el.text.trim()))
        .fold(None, |best: Option<&ElementSnapshot>, el| match best {
            Some(current) if el.font_size_px <= current.font_size_px => Some(current),
            _ => Some(el),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// Trimmed countdown text read this poll.
    Reading(String),
    /// Nothing time-like on the page, still inside the grace period.
    Missing,
    /// Grace period just ran out; derived session state should be dropped.
    Expired,
}

/// Tracks which element is trusted as the countdown across polls.
#[derive(Debug, Clone)]
pub struct TimerLock {
    locked: Option<u64>,
    last_text: Option<String>,
    change_count: u32,
    missing_polls: u32,
    grace_polls: u32,
}

impl Default for TimerLock {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_POLLS)
    }
}

impl TimerLock {
    pub fn new(grace_polls: u32) -> Self {
        Self {
            locked: None,
            last_text: None,
            change_count: 0,
            missing_polls: 0,
            grace_polls: grace_polls.max(1),
        }
    }

    pub fn locked_id(&self) -> Option<u64> {
        self.locked
    }

    pub fn observe(&mut self, obs: &Observation) -> LockOutcome {
        let locked_el = self.locked.and_then(|id| obs.element(id));
        if let (Some(id), None) = (self.locked, locked_el) {
            log_debug!("locked timer element {} detached; searching again", id);
            self.release();
        }

        let candidate = locked_el.or_else(|| select_candidate(&obs.elements));
        let Some((id, text)) = candidate
            .map(|el| (el.id, el.text.trim()))
            .filter(|(_, text)| looks_like_time(text))
        else {
            return self.record_miss();
        };

        self.missing_polls = 0;

        if self.last_text.as_deref() != Some(text) {
            self.change_count += 1;
            self.last_text = Some(text.to_string());
        }

        if self.locked.is_none() && self.change_count >= LOCK_AFTER_CHANGES {
            log_debug!("locking onto timer element {} after {} changes", id, self.change_count);
            self.locked = Some(id);
        }

        LockOutcome::Reading(text.to_string())
    }

    /// Forget everything, including the change history.
    pub fn reset(&mut self) {
        *self = Self::new(self.grace_polls);
    }

    fn release(&mut self) {
        self.locked = None;
        self.change_count = 0;
        self.last_text = None;
    }

    fn record_miss(&mut self) -> LockOutcome {
        self.missing_polls = self.missing_polls.saturating_add(1);
        if self.missing_polls == self.grace_polls {
            log_debug!("no timer for {} polls; dropping lock", self.grace_polls);
            self.release();
            return LockOutcome::Expired;
        }
        LockOutcome::Missing
    }
}
