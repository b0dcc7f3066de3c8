//! Completion sound selection.
//!
//! Synthesis lives outside the core; this module only knows the catalog of
//! sound ids, the user's playback settings and the [`SoundPlayer`]
//! capability that turns them into noise.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SOUND: &str = "success";
pub const SILENT_SOUND: &str = "none";

/// Longest single sound in the catalog.
const SOUND_LENGTH: Duration = Duration::from_millis(500);
/// Silence between two repeats.
const REPEAT_GAP: Duration = Duration::from_millis(300);

/// An entry of the sound catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoundOption {
    pub id: &'static str,
    pub name: &'static str,
}

pub const SOUND_OPTIONS: [SoundOption; 10] = [
    SoundOption { id: "beep", name: "Beep" },
    SoundOption { id: "chime", name: "Chime" },
    SoundOption { id: "bell", name: "Bell" },
    SoundOption { id: "ding", name: "Ding" },
    SoundOption { id: "alarm", name: "Alarm" },
    SoundOption { id: "buzzer", name: "Buzzer" },
    SoundOption { id: "notification", name: "Notification" },
    SoundOption { id: "success", name: "Success" },
    SoundOption { id: "alert", name: "Alert" },
    SoundOption { id: "none", name: "None" },
];

pub fn is_known_sound(id: &str) -> bool {
    SOUND_OPTIONS.iter().any(|s| s.id == id)
}

/// What to play on completion, and how loud and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundSettings {
    pub sound_id: String,
    /// 0..=100
    pub volume: u8,
    pub repeat: u32,
}

impl SoundSettings {
    /// False for the silent id, zero volume or no repeats. Players must
    /// treat those as no-ops.
    pub fn is_audible(&self) -> bool {
        self.sound_id != SILENT_SOUND && self.volume > 0 && self.repeat >= 1
    }

    /// Start offsets of each repeat relative to the first.
    pub fn repeat_offsets(&self) -> Vec<Duration> {
        if !self.is_audible() {
            return Vec::new();
        }
        (0..self.repeat)
            .map(|i| (SOUND_LENGTH + REPEAT_GAP) * i)
            .collect()
    }
}

/// Fire-and-forget sound output.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: &SoundSettings);
}

/// A player that never makes a sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSoundPlayer;

impl SoundPlayer for NullSoundPlayer {
    fn play(&self, _sound: &SoundSettings) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(id: &str, volume: u8, repeat: u32) -> SoundSettings {
        SoundSettings {
            sound_id: id.into(),
            volume,
            repeat,
        }
    }

    #[test]
    fn silent_settings_are_not_audible() {
        assert!(!settings("none", 50, 2).is_audible());
        assert!(!settings("bell", 0, 2).is_audible());
        assert!(!settings("bell", 50, 0).is_audible());
        assert!(settings("bell", 1, 1).is_audible());
    }

    #[test]
    fn repeats_are_spaced_800ms_apart() {
        let offsets = settings("chime", 20, 3).repeat_offsets();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_millis(800),
                Duration::from_millis(1600)
            ]
        );
        assert!(settings("none", 20, 3).repeat_offsets().is_empty());
    }

    #[test]
    fn catalog_contains_default_and_silent() {
        assert!(is_known_sound(DEFAULT_SOUND));
        assert!(is_known_sound(SILENT_SOUND));
        assert!(!is_known_sound("trumpet"));
    }
}
