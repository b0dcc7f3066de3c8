use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, RunState};

/// Every state change of the timer produces an Event.
/// The CLI prints them; the watch loop renders ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        duration_secs: u64,
        ends_at_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: Phase,
        remaining_secs: u64,
        ends_at_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Periodic countdown update while ticking.
    TimerTick {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A phase ran out (naturally, fast-forwarded, or while nobody watched)
    /// and the engine moved on to the next one without starting it.
    TimerCompleted {
        phase: Phase,
        next_phase: Phase,
        session_count: u32,
        /// True when the deadline passed before this process started.
        #[serde(default)]
        unobserved: bool,
        at: DateTime<Utc>,
    },
    TimerSkipped {
        from: Phase,
        to: Phase,
        session_count: u32,
        ends_at_ms: u64,
        at: DateTime<Utc>,
    },
    QuickTimeSet {
        minutes: u32,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A countdown armed by an earlier process was picked up again.
    TimerRecovered {
        phase: Phase,
        remaining_secs: u64,
        ends_at_ms: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        phase_label: String,
        run_state: RunState,
        remaining_secs: u64,
        /// Configured duration of the phase; for custom timers the remaining
        /// time at the moment of the snapshot.
        total_secs: u64,
        session_count: u32,
        ends_at_ms: Option<u64>,
        at: DateTime<Utc>,
    },
}
