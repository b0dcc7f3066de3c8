//! User preferences stored as JSON scalars in the key/value store.
//!
//! Each field lives under its own key (`focusTime`, `soundVolume`, ...).
//! Reads and writes are best-effort: storage failures are logged and the
//! in-memory values keep working. Every value passes through coercion
//! before it is accepted, so nothing invalid is ever written back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kv::KvStore;
use crate::error::ConfigError;
use crate::sound::{is_known_sound, SoundSettings, DEFAULT_SOUND};
use crate::timer::Phase;

pub const FOCUS_TIME_KEY: &str = "focusTime";
pub const SHORT_BREAK_KEY: &str = "shortBreak";
pub const LONG_BREAK_KEY: &str = "longBreak";
pub const SESSIONS_BEFORE_LONG_BREAK_KEY: &str = "sessionsBeforeLongBreak";
pub const SOUND_OPTION_KEY: &str = "soundOption";
pub const SOUND_VOLUME_KEY: &str = "soundVolume";
pub const SOUND_REPEAT_KEY: &str = "soundRepeat";

pub const KEYS: [&str; 7] = [
    FOCUS_TIME_KEY,
    SHORT_BREAK_KEY,
    LONG_BREAK_KEY,
    SESSIONS_BEFORE_LONG_BREAK_KEY,
    SOUND_OPTION_KEY,
    SOUND_VOLUME_KEY,
    SOUND_REPEAT_KEY,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Minutes.
    pub focus_time: u32,
    /// Minutes.
    pub short_break: u32,
    /// Minutes.
    pub long_break: u32,
    pub sessions_before_long_break: u32,
    pub sound_option: String,
    /// 0..=100
    pub sound_volume: u8,
    pub sound_repeat: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            focus_time: 45,
            short_break: 5,
            long_break: 10,
            sessions_before_long_break: 1,
            sound_option: DEFAULT_SOUND.to_string(),
            sound_volume: 20,
            sound_repeat: 2,
        }
    }
}

impl Preferences {
    /// Load every key from the store, falling back to defaults per field.
    pub fn load(store: &dyn KvStore) -> Self {
        let mut prefs = Self::default();
        for key in KEYS {
            let raw = match store.get(key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("could not read preference {key}: {e}");
                    continue;
                }
            };
            // Absent or unparseable JSON leaves the default in place.
            if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                prefs.apply(key, &value);
            }
        }
        prefs
    }

    /// Persist every field. Failures are logged, never returned.
    pub fn save(&self, store: &dyn KvStore) {
        let encoded: Vec<(&str, String)> = KEYS
            .iter()
            .filter_map(|key| {
                let value = self.value_of(key)?;
                Some((*key, value.to_string()))
            })
            .collect();
        let entries: Vec<(&str, &str)> = encoded.iter().map(|(k, v)| (*k, v.as_str())).collect();
        if let Err(e) = store.set_many(&entries) {
            tracing::warn!("could not save preferences: {e}");
        }
    }

    /// Get a preference rendered as a string, `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.value_of(key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Set a preference from user input and return the value that was
    /// actually accepted after coercion.
    ///
    /// # Errors
    /// Returns an error only if the key is unknown. Unusable values are
    /// replaced by the field default instead of failing.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<String, ConfigError> {
        if !KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        let value = serde_json::from_str::<Value>(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        self.apply(key, &value);
        self.get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    /// Configured duration of a phase in seconds. Custom timers have none.
    pub fn duration_secs(&self, phase: Phase) -> Option<u64> {
        let minutes = match phase {
            Phase::Focus => self.focus_time,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
            Phase::Custom => return None,
        };
        Some(u64::from(minutes) * 60)
    }

    pub fn sound(&self) -> SoundSettings {
        SoundSettings {
            sound_id: self.sound_option.clone(),
            volume: self.sound_volume,
            repeat: self.sound_repeat,
        }
    }

    fn value_of(&self, key: &str) -> Option<Value> {
        let value = match key {
            FOCUS_TIME_KEY => self.focus_time.into(),
            SHORT_BREAK_KEY => self.short_break.into(),
            LONG_BREAK_KEY => self.long_break.into(),
            SESSIONS_BEFORE_LONG_BREAK_KEY => self.sessions_before_long_break.into(),
            SOUND_OPTION_KEY => Value::String(self.sound_option.clone()),
            SOUND_VOLUME_KEY => self.sound_volume.into(),
            SOUND_REPEAT_KEY => self.sound_repeat.into(),
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, key: &str, value: &Value) {
        let defaults = Self::default();
        match key {
            FOCUS_TIME_KEY => {
                self.focus_time = coerce_positive(value).unwrap_or(defaults.focus_time)
            }
            SHORT_BREAK_KEY => {
                self.short_break = coerce_positive(value).unwrap_or(defaults.short_break)
            }
            LONG_BREAK_KEY => {
                self.long_break = coerce_positive(value).unwrap_or(defaults.long_break)
            }
            SESSIONS_BEFORE_LONG_BREAK_KEY => {
                self.sessions_before_long_break =
                    coerce_positive(value).unwrap_or(defaults.sessions_before_long_break)
            }
            SOUND_OPTION_KEY => {
                self.sound_option = match value.as_str() {
                    Some(id) if is_known_sound(id) => id.to_string(),
                    _ => defaults.sound_option,
                }
            }
            SOUND_VOLUME_KEY => {
                self.sound_volume = coerce_volume(value).unwrap_or(defaults.sound_volume)
            }
            SOUND_REPEAT_KEY => {
                self.sound_repeat = coerce_positive(value).unwrap_or(defaults.sound_repeat)
            }
            _ => {}
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n.trunc())
}

fn coerce_positive(value: &Value) -> Option<u32> {
    let n = as_number(value)?;
    (n >= 1.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

fn coerce_volume(value: &Value) -> Option<u8> {
    as_number(value).map(|n| n.clamp(0.0, 100.0) as u8)
}
