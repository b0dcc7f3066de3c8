//! Phase engine implementation.
//!
//! The engine owns the current phase, the remaining time, the run state and
//! the session counter. Time itself is kept by the [`Timekeeper`]: while
//! ticking, remaining time is always derived from the armed deadline, never
//! from counting ticks. The engine does not use internal threads - the
//! caller is responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Ticking --pause--> Held --resume--> Ticking
//! Ticking --deadline/fast-forward--> Idle (next phase loaded)
//! any --skip / start_<phase>--> Ticking
//! any --reset / quick time--> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(prefs, timekeeper, alerts);
//! engine.recover_on_startup();
//! engine.start();
//! // In a loop:
//! engine.tick(); // Returns Some(Event::TimerCompleted { .. }) when the phase ends
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::{next_phase, Phase, Transition};
use super::timekeeper::{ArmedDeadline, PollOutcome, Recovery, Timekeeper};
use crate::alerts::Alerts;
use crate::error::ValidationError;
use crate::events::Event;
use crate::storage::{KvStore, Preferences};

/// Storage key of the persisted [`TimerState`] snapshot.
pub const STATE_KEY: &str = "timerState";

pub const MIN_QUICK_MINUTES: u32 = 1;
pub const MAX_QUICK_MINUTES: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not started, or finished with the next phase loaded.
    Idle,
    /// Counting down against an armed deadline.
    Ticking,
    /// Paused; remaining time frozen, no deadline armed.
    Held,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub phase: Phase,
    pub remaining_secs: u64,
    pub run: RunState,
    /// Focus completions since the last long break.
    pub session_count: u32,
    /// Exact time left while held, so pause and resume lose no sub-second
    /// remainder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_ms: Option<u64>,
}

impl TimerState {
    /// Startup state: focus loaded with its configured duration.
    pub fn initial(prefs: &Preferences) -> Self {
        Self {
            phase: Phase::Focus,
            remaining_secs: prefs.duration_secs(Phase::Focus).unwrap_or(0),
            run: RunState::Idle,
            session_count: 0,
            held_ms: None,
        }
    }

    /// Active, whether ticking or held.
    pub fn running(&self) -> bool {
        self.run != RunState::Idle
    }

    pub fn paused(&self) -> bool {
        self.run == RunState::Held
    }

    /// Read the snapshot left by a previous process, if it is usable.
    pub fn load(store: &dyn KvStore) -> Option<Self> {
        let raw = match store.get(STATE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("could not read timer snapshot: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("ignoring malformed timer snapshot: {e}");
                None
            }
        }
    }

    /// Best-effort write of the snapshot.
    pub fn save(&self, store: &dyn KvStore) {
        let result = serde_json::to_string(self)
            .map_err(crate::error::CoreError::from)
            .and_then(|json| store.set(STATE_KEY, &json));
        if let Err(e) = result {
            tracing::warn!("could not save timer snapshot: {e}");
        }
    }
}

/// Core phase engine.
pub struct TimerEngine {
    prefs: Preferences,
    state: TimerState,
    timekeeper: Timekeeper,
    alerts: Alerts,
}

impl TimerEngine {
    /// Create an engine in the `Idle` state with focus loaded.
    pub fn new(prefs: Preferences, timekeeper: Timekeeper, alerts: Alerts) -> Self {
        let state = TimerState::initial(&prefs);
        Self {
            prefs,
            state,
            timekeeper,
            alerts,
        }
    }

    /// Start from a previously saved snapshot instead of the initial state.
    ///
    /// Call [`recover_on_startup`](Self::recover_on_startup) afterwards: the
    /// persisted deadline, not the snapshot, decides whether the timer is
    /// still ticking.
    pub fn with_state(mut self, state: TimerState) -> Self {
        self.state = state;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn run_state(&self) -> RunState {
        self.state.run
    }

    pub fn session_count(&self) -> u32 {
        self.state.session_count
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn armed(&self) -> Option<ArmedDeadline> {
        self.timekeeper.armed()
    }

    /// Remaining seconds right now; derived from the deadline while ticking.
    pub fn remaining_secs(&self) -> u64 {
        match self.state.run {
            RunState::Ticking => self
                .timekeeper
                .remaining_secs()
                .unwrap_or(self.state.remaining_secs),
            RunState::Idle | RunState::Held => self.state.remaining_secs,
        }
    }

    /// Full length of the current phase.
    pub fn total_secs(&self) -> u64 {
        self.prefs
            .duration_secs(self.state.phase)
            .unwrap_or_else(|| self.remaining_secs())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            phase: self.state.phase,
            phase_label: self.state.phase.label().to_string(),
            run_state: self.state.run,
            remaining_secs: self.remaining_secs(),
            total_secs: self.total_secs(),
            session_count: self.state.session_count,
            ends_at_ms: self.timekeeper.armed().map(|d| d.end_time_ms),
            at: self.at(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle → Ticking with the loaded remaining time.
    pub fn start(&mut self) -> Option<Event> {
        if self.state.run != RunState::Idle {
            return None;
        }
        let deadline = self.timekeeper.arm(self.state.remaining_secs, self.state.phase);
        self.state.run = RunState::Ticking;
        Some(Event::TimerStarted {
            phase: self.state.phase,
            duration_secs: self.state.remaining_secs,
            ends_at_ms: deadline.end_time_ms,
            at: self.at(),
        })
    }

    /// Ticking → Held, freezing the remaining time as of now.
    pub fn pause(&mut self) -> Option<Event> {
        if self.state.run != RunState::Ticking {
            return None;
        }
        let held_ms = self
            .timekeeper
            .remaining_ms()
            .unwrap_or(self.state.remaining_secs * 1000);
        self.timekeeper.disarm();
        self.state.held_ms = Some(held_ms);
        self.state.remaining_secs = held_ms.div_ceil(1000);
        self.state.run = RunState::Held;
        Some(Event::TimerPaused {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        })
    }

    /// Held → Ticking, re-arming for the frozen remaining time.
    pub fn resume(&mut self) -> Option<Event> {
        if self.state.run != RunState::Held {
            return None;
        }
        let held_ms = self
            .state
            .held_ms
            .take()
            .unwrap_or(self.state.remaining_secs * 1000);
        let deadline = self.timekeeper.arm_ms(held_ms, self.state.phase);
        self.state.run = RunState::Ticking;
        Some(Event::TimerResumed {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            ends_at_ms: deadline.end_time_ms,
            at: self.at(),
        })
    }

    /// Back to Idle with the current phase's configured duration. A custom
    /// timer keeps whatever time it had left.
    pub fn reset(&mut self) -> Event {
        let live = self.remaining_secs();
        self.timekeeper.disarm();
        self.state.run = RunState::Idle;
        self.state.held_ms = None;
        self.state.remaining_secs = self.prefs.duration_secs(self.state.phase).unwrap_or(live);
        Event::TimerReset {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        }
    }

    /// The current phase ran out: alert, advance, and stop.
    pub fn complete_naturally(&mut self) -> Event {
        let deadline = self.timekeeper.armed().map(|d| d.end_time_ms);
        self.finish(deadline)
    }

    /// Advance to the next phase without alerts and start it immediately.
    pub fn skip_to_next(&mut self) -> Event {
        let transition = self.advance();
        let deadline = self.timekeeper.arm(self.state.remaining_secs, self.state.phase);
        self.state.run = RunState::Ticking;
        Event::TimerSkipped {
            from: transition.from,
            to: transition.to,
            session_count: transition.session_count,
            ends_at_ms: deadline.end_time_ms,
            at: self.at(),
        }
    }

    /// Jump to zero and complete, alerts included.
    pub fn fast_forward(&mut self) -> Event {
        self.state.remaining_secs = 0;
        self.complete_naturally()
    }

    /// Load a custom countdown of `minutes` without starting it.
    ///
    /// # Errors
    /// Returns an error if `minutes` is outside 1..=999; the engine is left
    /// untouched.
    pub fn set_quick_time(&mut self, minutes: u32) -> Result<Event, ValidationError> {
        if !(MIN_QUICK_MINUTES..=MAX_QUICK_MINUTES).contains(&minutes) {
            return Err(ValidationError::OutOfRange {
                field: "minutes".into(),
                value: i64::from(minutes),
                min: i64::from(MIN_QUICK_MINUTES),
                max: i64::from(MAX_QUICK_MINUTES),
            });
        }
        self.timekeeper.disarm();
        self.state.phase = Phase::Custom;
        self.state.held_ms = None;
        self.state.remaining_secs = u64::from(minutes) * 60;
        self.state.run = RunState::Idle;
        Ok(Event::QuickTimeSet {
            minutes,
            remaining_secs: self.state.remaining_secs,
            at: self.at(),
        })
    }

    pub fn start_focus(&mut self) -> Event {
        self.start_phase(Phase::Focus)
    }

    pub fn start_short_break(&mut self) -> Event {
        self.start_phase(Phase::ShortBreak)
    }

    pub fn start_long_break(&mut self) -> Event {
        self.start_phase(Phase::LongBreak)
    }

    /// Call periodically. Returns a tick while counting down and
    /// `Event::TimerCompleted` once the deadline passes.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state.run != RunState::Ticking {
            return None;
        }
        match self.timekeeper.poll() {
            PollOutcome::Remaining(remaining_secs) => {
                self.state.remaining_secs = remaining_secs;
                Some(Event::TimerTick {
                    phase: self.state.phase,
                    remaining_secs,
                    at: self.at(),
                })
            }
            PollOutcome::Completed(deadline) => Some(self.finish(Some(deadline.end_time_ms))),
            PollOutcome::Idle => {
                tracing::warn!("ticking without a deadline, re-arming");
                self.timekeeper.arm(self.state.remaining_secs, self.state.phase);
                None
            }
        }
    }

    /// Reconcile with whatever an earlier process left armed.
    ///
    /// A deadline that already passed is completed with a notification but
    /// no sound; one still in the future resumes ticking with the real
    /// remaining time.
    pub fn recover_on_startup(&mut self) -> Option<Event> {
        match self.timekeeper.recover() {
            Recovery::Nothing => {
                if self.state.run == RunState::Ticking {
                    tracing::warn!("snapshot was ticking but no deadline survived");
                    self.state.run = RunState::Idle;
                }
                None
            }
            Recovery::Expired(deadline) => {
                self.state.phase = deadline.phase;
                self.state.held_ms = None;
                self.state.remaining_secs = 0;
                self.alerts
                    .phase_completed(deadline.phase, Some(deadline.end_time_ms), None);
                let transition = self.advance();
                self.state.run = RunState::Idle;
                Some(Event::TimerCompleted {
                    phase: transition.from,
                    next_phase: transition.to,
                    session_count: transition.session_count,
                    unobserved: true,
                    at: self.at(),
                })
            }
            Recovery::Running {
                deadline,
                remaining_secs,
            } => {
                self.state.phase = deadline.phase;
                self.state.held_ms = None;
                self.state.remaining_secs = remaining_secs;
                self.state.run = RunState::Ticking;
                Some(Event::TimerRecovered {
                    phase: deadline.phase,
                    remaining_secs,
                    ends_at_ms: deadline.end_time_ms,
                    at: self.at(),
                })
            }
        }
    }

    /// Swap in new preferences. The loaded countdown is left alone; new
    /// durations apply from the next reset or phase change.
    pub fn set_preferences(&mut self, prefs: Preferences) {
        self.prefs = prefs;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn start_phase(&mut self, phase: Phase) -> Event {
        self.state.phase = phase;
        self.state.held_ms = None;
        self.state.remaining_secs = self.prefs.duration_secs(phase).unwrap_or(0);
        let deadline = self.timekeeper.arm(self.state.remaining_secs, phase);
        self.state.run = RunState::Ticking;
        Event::TimerStarted {
            phase,
            duration_secs: self.state.remaining_secs,
            ends_at_ms: deadline.end_time_ms,
            at: self.at(),
        }
    }

    /// Disarm and alert first, then transition, so an interruption in
    /// between leaves the pre-transition phase in place.
    fn finish(&mut self, deadline: Option<u64>) -> Event {
        self.timekeeper.disarm();
        let ended = self.state.phase;
        self.state.remaining_secs = 0;
        let sound = self.prefs.sound();
        self.alerts.phase_completed(ended, deadline, Some(&sound));

        let transition = self.advance();
        self.state.run = RunState::Idle;
        tracing::debug!(from = %transition.from, to = %transition.to, "phase completed");
        Event::TimerCompleted {
            phase: transition.from,
            next_phase: transition.to,
            session_count: transition.session_count,
            unobserved: false,
            at: self.at(),
        }
    }

    fn advance(&mut self) -> Transition {
        let transition = next_phase(
            self.state.phase,
            self.state.session_count,
            self.prefs.sessions_before_long_break,
        );
        self.state.phase = transition.to;
        self.state.session_count = transition.session_count;
        self.state.held_ms = None;
        self.state.remaining_secs = self.prefs.duration_secs(transition.to).unwrap_or(0);
        transition
    }

    fn at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.timekeeper.now_ms() as i64)
            .unwrap_or_else(Utc::now)
    }
}
