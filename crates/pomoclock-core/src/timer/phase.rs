use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The four kinds of countdown the engine can run.
///
/// The serialized identifiers double as the persisted `timerMode` value and
/// the `mode` field of watcher messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
    Custom,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Focus,
        Phase::ShortBreak,
        Phase::LongBreak,
        Phase::Custom,
    ];

    /// Stable identifier used in storage and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::ShortBreak => "shortBreak",
            Phase::LongBreak => "longBreak",
            Phase::Custom => "custom",
        }
    }

    /// Human-readable label, used in notification titles.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus Time",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
            Phase::Custom => "Custom Timer",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "phase".into(),
                message: format!("unknown phase '{s}'"),
            })
    }
}

/// Outcome of applying the phase transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    /// Session counter after the transition.
    pub session_count: u32,
}

/// Phase transition rule shared by natural completion and skip.
///
/// Focus always escalates the session counter and moves to a short break.
/// A short break becomes a long break once the counter has reached the
/// threshold (resetting it), otherwise it goes back to focus. Long breaks
/// and custom timers always return to focus.
pub fn next_phase(current: Phase, session_count: u32, sessions_before_long_break: u32) -> Transition {
    let (to, session_count) = match current {
        Phase::Focus => (Phase::ShortBreak, session_count.saturating_add(1)),
        Phase::ShortBreak if session_count >= sessions_before_long_break => (Phase::LongBreak, 0),
        Phase::ShortBreak => (Phase::Focus, session_count),
        Phase::LongBreak | Phase::Custom => (Phase::Focus, session_count),
    };
    Transition {
        from: current,
        to,
        session_count,
    }
}

/// Format seconds as a zero-padded `mm:ss` countdown.
///
/// Minutes are not wrapped into hours, so a 999 minute custom timer shows
/// as `999:00`.
pub fn format_mm_ss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identifiers_round_trip_through_from_str() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("break".parse::<Phase>().is_err());
    }

    #[test]
    fn serde_uses_camel_case_identifiers() {
        assert_eq!(
            serde_json::to_string(&Phase::ShortBreak).unwrap(),
            "\"shortBreak\""
        );
        let parsed: Phase = serde_json::from_str("\"longBreak\"").unwrap();
        assert_eq!(parsed, Phase::LongBreak);
    }

    #[test]
    fn custom_always_exits_to_focus() {
        let t = next_phase(Phase::Custom, 7, 2);
        assert_eq!(t.to, Phase::Focus);
        assert_eq!(t.session_count, 7);
    }

    #[test]
    fn long_break_returns_to_focus_without_touching_counter() {
        let t = next_phase(Phase::LongBreak, 0, 4);
        assert_eq!(t.to, Phase::Focus);
        assert_eq!(t.session_count, 0);
    }

    #[test]
    fn format_pads_minutes_and_seconds() {
        assert_eq!(format_mm_ss(0), "00:00");
        assert_eq!(format_mm_ss(125), "02:05");
        assert_eq!(format_mm_ss(45 * 60), "45:00");
        assert_eq!(format_mm_ss(999 * 60), "999:00");
    }

    proptest! {
        #[test]
        fn focus_always_goes_to_short_break(count in 0u32..10_000, threshold in 1u32..100) {
            let t = next_phase(Phase::Focus, count, threshold);
            prop_assert_eq!(t.to, Phase::ShortBreak);
            prop_assert_eq!(t.session_count, count + 1);
        }

        #[test]
        fn short_break_escalates_only_at_threshold(count in 0u32..10_000, threshold in 1u32..100) {
            let t = next_phase(Phase::ShortBreak, count, threshold);
            if count >= threshold {
                prop_assert_eq!(t.to, Phase::LongBreak);
                prop_assert_eq!(t.session_count, 0);
            } else {
                prop_assert_eq!(t.to, Phase::Focus);
                prop_assert_eq!(t.session_count, count);
            }
        }
    }
}
