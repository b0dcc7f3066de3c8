//! Wall-clock timekeeper.
//!
//! Turns "N seconds remaining" into an absolute deadline and derives the
//! remaining time from `deadline - now` on every observation, so time spent
//! suspended (locked screen, sleeping laptop, killed process) is counted.
//! The deadline is persisted as the `(timerEndTime, timerMode)` pair and
//! mirrored to the background watcher over a channel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use super::clock::Clock;
use super::phase::Phase;
use crate::storage::KvStore;
use crate::watcher::WatcherMessage;

pub const END_TIME_KEY: &str = "timerEndTime";
pub const MODE_KEY: &str = "timerMode";

/// An absolute end timestamp and the phase it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedDeadline {
    pub end_time_ms: u64,
    pub phase: Phase,
}

impl ArmedDeadline {
    /// Whole seconds left at `now_ms`, rounded down, never negative.
    pub fn remaining_secs(&self, now_ms: u64) -> u64 {
        self.end_time_ms.saturating_sub(now_ms) / 1000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing armed.
    Idle,
    Remaining(u64),
    /// The deadline was crossed. Reported once; the timekeeper is disarmed.
    Completed(ArmedDeadline),
}

/// What was found in storage at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Nothing,
    /// The deadline passed while nobody was watching. Storage is cleared.
    Expired(ArmedDeadline),
    /// Still counting down; the timekeeper is armed again.
    Running {
        deadline: ArmedDeadline,
        remaining_secs: u64,
    },
}

pub struct Timekeeper {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    watcher: Option<UnboundedSender<WatcherMessage>>,
    armed: Option<ArmedDeadline>,
}

impl Timekeeper {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            watcher: None,
            armed: None,
        }
    }

    /// Mirror every arm/disarm to a background watcher.
    pub fn with_watcher(mut self, watcher: UnboundedSender<WatcherMessage>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn armed(&self) -> Option<ArmedDeadline> {
        self.armed
    }

    /// Remaining seconds of the armed deadline, `None` when disarmed.
    pub fn remaining_secs(&self) -> Option<u64> {
        let now = self.now_ms();
        self.armed.map(|d| d.remaining_secs(now))
    }

    /// Milliseconds left on the armed deadline, `None` when disarmed.
    pub fn remaining_ms(&self) -> Option<u64> {
        let now = self.now_ms();
        self.armed.map(|d| d.end_time_ms.saturating_sub(now))
    }

    /// Arm a deadline `remaining_secs` from now, replacing any previous one.
    pub fn arm(&mut self, remaining_secs: u64, phase: Phase) -> ArmedDeadline {
        self.arm_ms(remaining_secs.saturating_mul(1000), phase)
    }

    /// Like [`arm`](Self::arm) with millisecond precision.
    pub fn arm_ms(&mut self, remaining_ms: u64, phase: Phase) -> ArmedDeadline {
        let deadline = ArmedDeadline {
            end_time_ms: self.now_ms().saturating_add(remaining_ms),
            phase,
        };
        self.armed = Some(deadline);
        self.persist(&deadline);
        self.send(WatcherMessage::Update {
            end_time_ms: deadline.end_time_ms,
            phase,
        });
        tracing::debug!(end_time_ms = deadline.end_time_ms, %phase, "deadline armed");
        deadline
    }

    /// Forget the deadline. Calling this again is a no-op.
    pub fn disarm(&mut self) {
        let was_armed = self.armed.take().is_some();
        if let Err(e) = self.store.remove_many(&[END_TIME_KEY, MODE_KEY]) {
            tracing::warn!("could not clear persisted deadline: {e}");
        }
        if was_armed {
            self.send(WatcherMessage::Clear);
            tracing::debug!("deadline disarmed");
        }
    }

    /// Compare the armed deadline against now.
    pub fn poll(&mut self) -> PollOutcome {
        let Some(deadline) = self.armed else {
            return PollOutcome::Idle;
        };
        match deadline.remaining_secs(self.now_ms()) {
            0 => {
                self.disarm();
                PollOutcome::Completed(deadline)
            }
            remaining => PollOutcome::Remaining(remaining),
        }
    }

    /// Inspect the persisted deadline left behind by a previous process.
    ///
    /// Missing, partial or unparseable state counts as no timer and is
    /// cleaned up.
    pub fn recover(&mut self) -> Recovery {
        let Some(deadline) = self.load_persisted() else {
            return Recovery::Nothing;
        };
        let now = self.now_ms();
        if now >= deadline.end_time_ms {
            tracing::info!(phase = %deadline.phase, "deadline passed while unobserved");
            self.armed = Some(deadline);
            self.disarm();
            return Recovery::Expired(deadline);
        }

        self.armed = Some(deadline);
        self.send(WatcherMessage::Update {
            end_time_ms: deadline.end_time_ms,
            phase: deadline.phase,
        });
        Recovery::Running {
            deadline,
            remaining_secs: deadline.remaining_secs(now),
        }
    }

    fn load_persisted(&mut self) -> Option<ArmedDeadline> {
        let read = |key: &str| match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("could not read {key}: {e}");
                None
            }
        };
        let end = read(END_TIME_KEY);
        let mode = read(MODE_KEY);
        if end.is_none() && mode.is_none() {
            return None;
        }

        let parsed = match (end, mode) {
            (Some(end), Some(mode)) => parse_end_time(&end)
                .zip(mode.trim().parse::<Phase>().ok())
                .map(|(end_time_ms, phase)| ArmedDeadline { end_time_ms, phase }),
            _ => None,
        };
        if parsed.is_none() {
            tracing::warn!("discarding malformed persisted deadline");
            self.disarm();
        }
        parsed
    }

    fn persist(&self, deadline: &ArmedDeadline) {
        let end = deadline.end_time_ms.to_string();
        if let Err(e) = self
            .store
            .set_many(&[(END_TIME_KEY, end.as_str()), (MODE_KEY, deadline.phase.as_str())])
        {
            tracing::warn!("could not persist deadline: {e}");
        }
    }

    fn send(&mut self, message: WatcherMessage) {
        if let Some(tx) = &self.watcher {
            if tx.send(message).is_err() {
                tracing::debug!("background watcher gone, detaching");
                self.watcher = None;
            }
        }
    }
}

fn parse_end_time(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::clock::ManualClock;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, Timekeeper) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let tk = Timekeeper::new(store.clone(), clock.clone());
        (store, clock, tk)
    }

    #[test]
    fn arm_persists_the_pair() {
        let (store, _clock, mut tk) = setup();
        let d = tk.arm(100, Phase::Focus);
        assert_eq!(d.end_time_ms, T0 + 100_000);
        assert_eq!(
            store.get(END_TIME_KEY).unwrap().as_deref(),
            Some("1700000100000")
        );
        assert_eq!(store.get(MODE_KEY).unwrap().as_deref(), Some("focus"));
    }

    #[test]
    fn poll_recomputes_from_deadline() {
        let (_store, clock, mut tk) = setup();
        tk.arm(100, Phase::Focus);
        clock.advance(Duration::from_secs(37));
        assert_eq!(tk.poll(), PollOutcome::Remaining(63));
        // A single poll after a long suspension still sees the real time.
        clock.advance(Duration::from_secs(60));
        assert_eq!(tk.poll(), PollOutcome::Remaining(3));
    }

    #[test]
    fn remaining_ms_keeps_the_sub_second_part() {
        let (_store, clock, mut tk) = setup();
        assert_eq!(tk.remaining_ms(), None);
        tk.arm_ms(1_500, Phase::Custom);
        clock.advance(Duration::from_millis(700));
        assert_eq!(tk.remaining_ms(), Some(800));
        assert_eq!(tk.remaining_secs(), Some(0));
    }

    #[test]
    fn completion_is_reported_once() {
        let (store, clock, mut tk) = setup();
        let d = tk.arm(2, Phase::ShortBreak);
        clock.advance(Duration::from_secs(5));
        assert_eq!(tk.poll(), PollOutcome::Completed(d));
        assert_eq!(tk.poll(), PollOutcome::Idle);
        assert!(store.is_empty());
    }

    #[test]
    fn disarm_twice_equals_once() {
        let (store, _clock, mut tk) = setup();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tk = tk.with_watcher(tx);
        tk.arm(10, Phase::Focus);
        tk.disarm();
        tk.disarm();
        assert!(store.is_empty());
        assert!(tk.armed().is_none());
        assert!(matches!(rx.try_recv(), Ok(WatcherMessage::Update { .. })));
        assert_eq!(rx.try_recv().ok(), Some(WatcherMessage::Clear));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn recover_expired_clears_state() {
        let (store, _clock, mut tk) = setup();
        let end = (T0 - 5000).to_string();
        store
            .set_many(&[(END_TIME_KEY, end.as_str()), (MODE_KEY, "shortBreak")])
            .unwrap();
        let recovered = tk.recover();
        assert_eq!(
            recovered,
            Recovery::Expired(ArmedDeadline {
                end_time_ms: T0 - 5000,
                phase: Phase::ShortBreak
            })
        );
        assert!(store.is_empty());
        assert!(tk.armed().is_none());
    }

    #[test]
    fn recover_running_rearms() {
        let (store, _clock, mut tk) = setup();
        let end = (T0 + 90_500).to_string();
        store
            .set_many(&[(END_TIME_KEY, end.as_str()), (MODE_KEY, "longBreak")])
            .unwrap();
        match tk.recover() {
            Recovery::Running {
                deadline,
                remaining_secs,
            } => {
                assert_eq!(deadline.phase, Phase::LongBreak);
                assert_eq!(remaining_secs, 90);
            }
            other => panic!("expected Running, got {other:?}"),
        }
        assert!(tk.armed().is_some());
        assert!(!store.is_empty());
    }

    #[test]
    fn malformed_state_is_treated_as_absent() {
        let (store, _clock, mut tk) = setup();
        store
            .set_many(&[(END_TIME_KEY, "tomorrow"), (MODE_KEY, "focus")])
            .unwrap();
        assert_eq!(tk.recover(), Recovery::Nothing);
        assert!(store.is_empty());

        store
            .set_many(&[(END_TIME_KEY, "1"), (MODE_KEY, "nap")])
            .unwrap();
        assert_eq!(tk.recover(), Recovery::Nothing);

        store.set(END_TIME_KEY, "1").unwrap();
        assert_eq!(tk.recover(), Recovery::Nothing);
        assert!(store.is_empty());
    }

    #[test]
    fn fractional_end_time_is_accepted() {
        assert_eq!(parse_end_time("1700000000000.0"), Some(1_700_000_000_000));
        assert_eq!(parse_end_time(" 42 "), Some(42));
        assert_eq!(parse_end_time("-1"), None);
        assert_eq!(parse_end_time("NaN"), None);
    }

    #[test]
    fn dropped_watcher_does_not_break_arming() {
        let (_store, _clock, mut tk) = setup();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tk = tk.with_watcher(tx);
        tk.arm(10, Phase::Focus);
        tk.disarm();
        assert!(tk.armed().is_none());
    }
}
