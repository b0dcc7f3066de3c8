//! Background deadline watcher.
//!
//! Runs as its own tokio task, fed by the timekeeper over a channel. It
//! keeps a private copy of the deadline and checks it on its own 1-second
//! schedule, so a completion is still announced when the foreground loop
//! is stalled or busy.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;

use crate::alerts::{Notification, NotificationGate};
use crate::timer::{ArmedDeadline, Clock, Phase};

/// Engine → watcher protocol.
///
/// JSON form: `{"type":"TIMER_UPDATE","endTime":…,"mode":…}` and
/// `{"type":"TIMER_CLEAR"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WatcherMessage {
    #[serde(rename = "TIMER_UPDATE")]
    Update {
        #[serde(rename = "endTime")]
        end_time_ms: u64,
        #[serde(rename = "mode")]
        phase: Phase,
    },
    #[serde(rename = "TIMER_CLEAR")]
    Clear,
}

pub fn channel() -> (UnboundedSender<WatcherMessage>, UnboundedReceiver<WatcherMessage>) {
    mpsc::unbounded_channel()
}

pub struct BackgroundWatcher {
    clock: Arc<dyn Clock>,
    gate: NotificationGate,
    armed: Option<ArmedDeadline>,
    poll_interval: Duration,
}

impl BackgroundWatcher {
    pub fn new(clock: Arc<dyn Clock>, gate: NotificationGate) -> Self {
        Self {
            clock,
            gate,
            armed: None,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn armed(&self) -> Option<ArmedDeadline> {
        self.armed
    }

    pub fn handle(&mut self, message: WatcherMessage) {
        self.armed = match message {
            WatcherMessage::Update { end_time_ms, phase } => {
                Some(ArmedDeadline { end_time_ms, phase })
            }
            WatcherMessage::Clear => None,
        };
    }

    /// Announce the deadline if it has been crossed, then forget it.
    pub fn check(&mut self) -> Option<ArmedDeadline> {
        let deadline = self.armed?;
        if self.clock.now_ms() < deadline.end_time_ms {
            return None;
        }
        self.armed = None;
        tracing::debug!(phase = %deadline.phase, "watcher saw deadline pass");
        self.gate.fire(
            &Notification::for_completed(deadline.phase),
            Some(deadline.end_time_ms),
        );
        Some(deadline)
    }

    /// Process messages and poll until every sender is dropped.
    pub async fn run(mut self, mut rx: UnboundedReceiver<WatcherMessage>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => self.handle(message),
                    None => break,
                },
                _ = interval.tick() => {
                    self.check();
                }
            }
        }
        tracing::debug!("background watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{Notifier, NotifyResult};
    use crate::timer::ManualClock;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) -> NotifyResult {
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn watcher() -> (Arc<ManualClock>, Arc<RecordingNotifier>, BackgroundWatcher) {
        let clock = Arc::new(ManualClock::new(10_000));
        let notifier = Arc::new(RecordingNotifier::default());
        let w = BackgroundWatcher::new(clock.clone(), NotificationGate::new(notifier.clone()));
        (clock, notifier, w)
    }

    #[test]
    fn wire_format_matches_protocol() {
        let update = WatcherMessage::Update {
            end_time_ms: 1234,
            phase: Phase::LongBreak,
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            serde_json::json!({"type": "TIMER_UPDATE", "endTime": 1234, "mode": "longBreak"})
        );
        assert_eq!(
            serde_json::to_string(&WatcherMessage::Clear).unwrap(),
            r#"{"type":"TIMER_CLEAR"}"#
        );
        let parsed: WatcherMessage =
            serde_json::from_str(r#"{"type":"TIMER_UPDATE","endTime":5,"mode":"focus"}"#).unwrap();
        assert_eq!(
            parsed,
            WatcherMessage::Update {
                end_time_ms: 5,
                phase: Phase::Focus
            }
        );
    }

    #[test]
    fn fires_once_when_deadline_crossed() {
        let (clock, notifier, mut w) = watcher();
        w.handle(WatcherMessage::Update {
            end_time_ms: 12_000,
            phase: Phase::Focus,
        });
        assert!(w.check().is_none());
        clock.advance(Duration::from_secs(2));
        assert!(w.check().is_some());
        assert!(w.check().is_none());

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Focus Time Complete!");
    }

    #[test]
    fn clear_forgets_deadline() {
        let (clock, notifier, mut w) = watcher();
        w.handle(WatcherMessage::Update {
            end_time_ms: 11_000,
            phase: Phase::ShortBreak,
        });
        w.handle(WatcherMessage::Clear);
        clock.advance(Duration::from_secs(5));
        assert!(w.check().is_none());
        assert!(notifier.shown.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_on_its_own_schedule() {
        let (clock, notifier, w) = watcher();
        let (tx, rx) = channel();
        let task = tokio::spawn(w.run(rx));

        tx.send(WatcherMessage::Update {
            end_time_ms: 10_500,
            phase: Phase::Custom,
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(notifier.shown.lock().unwrap().is_empty());

        clock.advance(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(notifier.shown.lock().unwrap().len(), 1);

        drop(tx);
        task.await.unwrap();
    }
}
