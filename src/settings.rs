use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::{KeyValueStore, StoreError};

const ENABLE_LOGS: bool = true;
use crate::log_info;

/// Key of the pre-`audioOn` switch; stored inverted.
pub const LEGACY_MUTE_ALL_KEY: &str = "muteAll";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TickSound {
    #[default]
    #[serde(rename = "tick-tock")]
    TickTock,
    #[serde(rename = "tick")]
    Tick,
    #[serde(rename = "beep1")]
    Beep1,
    #[serde(rename = "beep2")]
    Beep2,
    #[serde(rename = "ding")]
    Ding,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionSound {
    #[default]
    Chime,
    Bell,
    Ding,
}

/// Audio preferences as written by the settings popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub audio_on: bool,
    pub tick_enabled: bool,
    pub voice_enabled: bool,
    pub seconds_countdown_enabled: bool,
    pub mute_during_breaks: bool,
    pub tick_volume: f32,
    pub voice_volume: f32,
    /// Minutes between spoken minute announcements.
    pub announcement_interval: u32,
    pub tick_sound: TickSound,
    pub transition_chime_enabled: bool,
    pub transition_sound: TransitionSound,
    pub pre_reminder_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio_on: true,
            tick_enabled: false,
            voice_enabled: true,
            seconds_countdown_enabled: true,
            mute_during_breaks: true,
            tick_volume: 0.3,
            voice_volume: 0.85,
            announcement_interval: 1,
            tick_sound: TickSound::TickTock,
            transition_chime_enabled: false,
            transition_sound: TransitionSound::Chime,
            pre_reminder_enabled: false,
        }
    }
}

impl Settings {
    /// Build from raw store contents.
    ///
    /// Keys are taken one at a time so a single malformed value falls back to its
    /// default instead of discarding the whole record.
    pub fn from_map(raw: &Map<String, Value>) -> Self {
        let mut settings = merge_known_keys::<Settings>(raw);

        if let Some(mute_all) = raw.get(LEGACY_MUTE_ALL_KEY).and_then(Value::as_bool) {
            settings.audio_on = !mute_all;
        }

        settings.normalized()
    }

    pub fn load(store: &KeyValueStore) -> Self {
        Self::from_map(&store.get_all())
    }

    /// Popup-side write of every key.
    pub fn save(&self, store: &KeyValueStore) -> Result<(), StoreError> {
        store.set(to_entries(self)?)
    }

    /// Rewrite a legacy `muteAll` flag as `audioOn`, once.
    pub fn migrate_legacy(store: &KeyValueStore) -> Result<bool, StoreError> {
        let legacy = store.get(&[LEGACY_MUTE_ALL_KEY]);
        let Some(mute_all) = legacy.get(LEGACY_MUTE_ALL_KEY).and_then(Value::as_bool) else {
            return Ok(false);
        };

        store.remove(&[LEGACY_MUTE_ALL_KEY])?;
        let mut entries = Map::new();
        entries.insert("audioOn".into(), Value::Bool(!mute_all));
        store.set(entries)?;
        log_info!("migrated legacy muteAll={} to audioOn={}", mute_all, !mute_all);
        Ok(true)
    }

    pub fn normalized(mut self) -> Self {
        self.tick_volume = clamp_volume(self.tick_volume);
        self.voice_volume = clamp_volume(self.voice_volume);
        self.announcement_interval = self.announcement_interval.max(1);
        self
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Small popup conveniences that live next to the settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiState {
    pub advanced_expanded: bool,
    pub last_active_tab: Option<String>,
}

impl UiState {
    pub fn load(store: &KeyValueStore) -> Self {
        merge_known_keys::<UiState>(&store.get_all())
    }

    pub fn save(&self, store: &KeyValueStore) -> Result<(), StoreError> {
        let mut entries = to_entries(self)?;
        entries.retain(|_, value| !value.is_null());
        store.set(entries)
    }
}

fn to_entries<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Start from `T::default()` and adopt each raw key that still deserializes.
fn merge_known_keys<T>(raw: &Map<String, Value>) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let Ok(Value::Object(mut merged)) = serde_json::to_value(T::default()) else {
        return T::default();
    };

    let known: Vec<String> = merged.keys().cloned().collect();
    for key in known {
        let Some(candidate) = raw.get(&key) else {
            continue;
        };
        let mut trial = merged.clone();
        trial.insert(key, candidate.clone());
        if serde_json::from_value::<T>(Value::Object(trial.clone())).is_ok() {
            merged = trial;
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostContext;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (KeyValueStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let host = HostContext::new(dir.path());
        let store = KeyValueStore::open(dir.path().join("store.json"), host).expect("open");
        (store, dir)
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn absent_keys_use_defaults() {
        let settings = Settings::from_map(&Map::new());
        assert_eq!(settings, Settings::default());
        assert!(!settings.tick_enabled);
        assert!(settings.mute_during_breaks);
    }

    #[test]
    fn popup_write_reads_back_identically() {
        let (store, _dir) = test_store();
        let written = Settings {
            audio_on: false,
            tick_enabled: true,
            voice_enabled: false,
            seconds_countdown_enabled: false,
            mute_during_breaks: false,
            tick_volume: 0.5,
            voice_volume: 0.25,
            announcement_interval: 5,
            tick_sound: TickSound::Beep2,
            transition_chime_enabled: true,
            transition_sound: TransitionSound::Bell,
            pre_reminder_enabled: true,
        };
        written.save(&store).expect("save");
        assert_eq!(Settings::load(&store), written);
    }

    #[test]
    fn malformed_values_fall_back_per_key() {
        let settings = Settings::from_map(&raw(json!({
            "tickSound": "kazoo",
            "voiceVolume": "loud",
            "tickVolume": 0.6,
            "announcementInterval": 0,
            "secondsCountdownEnabled": false
        })));
        assert_eq!(settings.tick_sound, TickSound::TickTock);
        assert_eq!(settings.voice_volume, 0.85);
        assert_eq!(settings.tick_volume, 0.6);
        assert_eq!(settings.announcement_interval, 1);
        assert!(!settings.seconds_countdown_enabled);
    }

    #[test]
    fn volumes_are_clamped() {
        let settings = Settings::from_map(&raw(json!({"tickVolume": 3.0, "voiceVolume": -1.0})));
        assert_eq!(settings.tick_volume, 1.0);
        assert_eq!(settings.voice_volume, 0.0);
    }

    #[test]
    fn legacy_mute_all_wins_and_migrates() {
        let (store, _dir) = test_store();
        store
            .set(raw(json!({"muteAll": true, "audioOn": true})))
            .expect("seed");
        assert!(!Settings::load(&store).audio_on);

        assert!(Settings::migrate_legacy(&store).expect("migrate"));
        assert!(store.get(&[LEGACY_MUTE_ALL_KEY]).is_empty());
        assert_eq!(store.get(&["audioOn"]), raw(json!({"audioOn": false})));
        assert!(!Settings::migrate_legacy(&store).expect("second migrate"));
    }

    #[test]
    fn ui_state_roundtrips_without_nulls() {
        let (store, _dir) = test_store();
        UiState::default().save(&store).expect("save");
        assert!(!store.get_all().contains_key("lastActiveTab"));

        let state = UiState {
            advanced_expanded: true,
            last_active_tab: Some("tasks".into()),
        };
        state.save(&store).expect("save");
        assert_eq!(UiState::load(&store), state);
    }
}
