use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::{KeyValueStore, StoreError};

pub const TIMER_SECONDS: &str = "flowclubTimerSeconds";
pub const TIMER_UPDATED_AT: &str = "flowclubTimerUpdatedAt";
pub const SESSION_DURATION_MINUTES: &str = "flowclubSessionDurationMinutes";
pub const SESSION_TITLE: &str = "flowclubSessionTitle";
pub const CURRENT_SESSION_INDEX: &str = "flowclubCurrentSessionIndex";
pub const CURRENT_SESSION_TYPE: &str = "flowclubCurrentSessionType";
pub const COMPLETED_COUNT: &str = "flowclubCompletedCount";
pub const PHASE_LABEL: &str = "flowclubPhaseLabel";
pub const SESSION_STYLE: &str = "flowclubSessionStyle";
pub const CURRENT_BLOCK: &str = "flowclubCurrentBlock";

/// Every key the poller publishes for other pages.
pub const SYNC_KEYS: [&str; 10] = [
    TIMER_SECONDS,
    TIMER_UPDATED_AT,
    SESSION_DURATION_MINUTES,
    SESSION_TITLE,
    CURRENT_SESSION_INDEX,
    CURRENT_SESSION_TYPE,
    COMPLETED_COUNT,
    PHASE_LABEL,
    SESSION_STYLE,
    CURRENT_BLOCK,
];

/// Snapshot of the live countdown as published to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSync {
    #[serde(rename = "flowclubTimerSeconds")]
    pub timer_seconds: u32,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "flowclubTimerUpdatedAt")]
    pub updated_at_ms: i64,
    #[serde(rename = "flowclubSessionDurationMinutes")]
    pub duration_minutes: u32,
    #[serde(rename = "flowclubSessionTitle", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "flowclubCurrentSessionIndex")]
    pub session_index: u32,
    #[serde(rename = "flowclubCurrentSessionType")]
    pub session_type: String,
    #[serde(rename = "flowclubCompletedCount")]
    pub completed_count: u32,
    #[serde(rename = "flowclubPhaseLabel")]
    pub phase_label: String,
    #[serde(rename = "flowclubSessionStyle", skip_serializing_if = "Option::is_none")]
    pub session_style: Option<String>,
    #[serde(rename = "flowclubCurrentBlock")]
    pub current_block: u32,
}

impl SessionSync {
    /// Publish every key; absent title or style removes the stale one.
    pub fn write(&self, store: &KeyValueStore) -> Result<(), StoreError> {
        let entries = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut absent = Vec::new();
        if self.title.is_none() {
            absent.push(SESSION_TITLE);
        }
        if self.session_style.is_none() {
            absent.push(SESSION_STYLE);
        }
        store.update(entries, &absent)
    }

    /// Drop the live countdown keys so readers stop treating it as running.
    pub fn clear_live(store: &KeyValueStore) -> Result<(), StoreError> {
        store.remove(&[TIMER_SECONDS, TIMER_UPDATED_AT])
    }
}

/// Store update the poller stages; the poll driver applies it outside the poller lock.
#[derive(Debug, Clone, PartialEq)]
pub enum Publication {
    Session(SessionSync),
    ClearLive,
}

impl Publication {
    pub fn apply(&self, store: &KeyValueStore) -> Result<(), StoreError> {
        match self {
            Publication::Session(sync) => sync.write(store),
            Publication::ClearLive => SessionSync::clear_live(store),
        }
    }
}
