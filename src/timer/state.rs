use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::{initial_minutes, SessionKind};

/// One inferred countdown interval on the host page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Remaining seconds on the first reading of this countdown.
    pub initial_secs: u32,
    pub kind: SessionKind,
    /// Poll counter value when the session was first seen.
    pub started_tick: u64,
    pub started_at: DateTime<Utc>,
    /// 1-based position among sessions seen since the lounge.
    pub index: u32,
}

impl Session {
    pub fn begin(initial_secs: u32, kind: SessionKind, started_tick: u64, index: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            initial_secs,
            kind,
            started_tick,
            started_at: Utc::now(),
            index,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        initial_minutes(self.initial_secs)
    }

    pub fn is_break(&self) -> bool {
        self.kind == SessionKind::Break
    }
}

/// Counters that outlive single sessions until the page returns to the lounge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTally {
    pub sessions_seen: u32,
    pub focus_blocks: u32,
    pub completed_focus: u32,
}

impl SessionTally {
    /// Account for a new session and return its 1-based index.
    pub fn open(&mut self, kind: SessionKind) -> u32 {
        self.sessions_seen += 1;
        if kind == SessionKind::Focus {
            self.focus_blocks += 1;
        }
        self.sessions_seen
    }

    /// Account for the end of `previous` when another countdown replaces it.
    pub fn close(&mut self, previous: &Session) {
        if previous.kind == SessionKind::Focus {
            self.completed_focus += 1;
        }
    }
}
