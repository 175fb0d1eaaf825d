use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// Inferred kind of the interval the page is counting down.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Lounge,
    Focus,
    Break,
    CheckIn,
    #[default]
    Unknown,
}

impl Phase {
    /// Break and check-in are muted alike when "mute during breaks" is on.
    pub fn is_break_like(self) -> bool {
        matches!(self, Phase::Break | Phase::CheckIn)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Lounge => "lounge",
            Phase::Focus => "focus",
            Phase::Break => "break",
            Phase::CheckIn => "check-in",
            Phase::Unknown => "unknown",
        }
    }
}

/// Duration-derived kind of a session, cached until the next countdown starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Focus,
    Break,
}

impl From<SessionKind> for Phase {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Focus => Phase::Focus,
            SessionKind::Break => Phase::Break,
        }
    }
}

/// How a fresh countdown's length maps to "this is a break".
///
/// Revisions of the host heuristics disagree, so both shapes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakRule {
    InclusiveRange { min: u32, max: u32 },
    ExactMinutes(&'static [u32]),
}

pub const DEFAULT_BREAK_RULE: BreakRule = BreakRule::InclusiveRange { min: 1, max: 5 };
pub const LEGACY_BREAK_RULE: BreakRule = BreakRule::ExactMinutes(&[2, 3, 5]);

impl BreakRule {
    pub fn is_break(&self, minutes: u32) -> bool {
        match *self {
            BreakRule::InclusiveRange { min, max } => (min..=max).contains(&minutes),
            BreakRule::ExactMinutes(allowed) => allowed.contains(&minutes),
        }
    }
}

/// Text cues the host page shows in particular phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMarkers {
    /// Exact labels of buttons only shown in the waiting lounge.
    pub lounge_buttons: Vec<String>,
    /// Case-insensitive substrings shown during goal sharing.
    pub check_in: Vec<String>,
    /// Case-insensitive substrings shown right before work begins.
    pub pre_work: Vec<String>,
}

impl Default for PageMarkers {
    fn default() -> Self {
        Self {
            lounge_buttons: vec!["Enter Session".into()],
            check_in: vec![
                "share your goal".into(),
                "check-in".into(),
                "check in".into(),
            ],
            pre_work: vec!["starting soon".into(), "session starts in".into()],
        }
    }
}

impl PageMarkers {
    pub fn in_lounge(&self, obs: &Observation) -> bool {
        obs.buttons
            .iter()
            .any(|label| self.lounge_buttons.iter().any(|m| m == label.trim()))
    }

    pub fn in_check_in(&self, obs: &Observation) -> bool {
        contains_any(&obs.page_text, &self.check_in)
    }

    pub fn before_work(&self, obs: &Observation) -> bool {
        self.in_lounge(obs) || contains_any(&obs.page_text, &self.pre_work)
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}

/// Whole minutes, rounded up, of a freshly observed countdown.
pub fn initial_minutes(initial_secs: u32) -> u32 {
    initial_secs.div_ceil(60)
}

/// Classify a countdown that just started.
///
/// Pre-work markers override the duration rule: a short countdown shown while
/// the page is about to start work is never a break.
pub fn classify_duration(initial_secs: u32, before_work: bool, rule: BreakRule) -> SessionKind {
    if !before_work && rule.is_break(initial_minutes(initial_secs)) {
        SessionKind::Break
    } else {
        SessionKind::Focus
    }
}

/// Per-poll phase from page markers and the cached session kind.
pub fn current_phase(markers: &PageMarkers, obs: &Observation, kind: Option<SessionKind>) -> Phase {
    if markers.in_lounge(obs) {
        Phase::Lounge
    } else if markers.in_check_in(obs) {
        Phase::CheckIn
    } else {
        kind.map(Phase::from).unwrap_or(Phase::Unknown)
    }
}
