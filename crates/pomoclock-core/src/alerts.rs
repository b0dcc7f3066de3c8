//! Completion side-effects: the system notification and the sound.
//!
//! Both the foreground engine and the background watcher can observe the
//! same deadline crossing. They share a [`NotificationGate`] so the user
//! sees one notification per deadline no matter who noticed first.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::sound::{SoundPlayer, SoundSettings};
use crate::timer::Phase;

pub type NotifyResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A system notification about a finished phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub phase: Phase,
}

impl Notification {
    pub fn for_completed(phase: Phase) -> Self {
        let body = match phase {
            Phase::Focus => "Time for a break! 🎉",
            Phase::LongBreak => "Ready to focus again? 🚀",
            Phase::ShortBreak | Phase::Custom => "Break time is over!",
        };
        Self {
            title: format!("{} Complete!", phase.label()),
            body: body.to_string(),
            phase,
        }
    }
}

/// Displays notifications. Implementations report failure (denied
/// permission, no notification daemon) and callers carry on without it.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> NotifyResult;
}

/// A notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) -> NotifyResult {
        Ok(())
    }
}

struct GateInner {
    notifier: Arc<dyn Notifier>,
    last_deadline: Mutex<Option<u64>>,
}

/// Deduplicates notifications per deadline.
#[derive(Clone)]
pub struct NotificationGate {
    inner: Arc<GateInner>,
}

impl NotificationGate {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                notifier,
                last_deadline: Mutex::new(None),
            }),
        }
    }

    /// Show `notification` unless the same deadline was already announced.
    ///
    /// `deadline` is the end timestamp the completion belongs to; forced
    /// completions without one are always shown. Returns whether the
    /// notifier accepted it.
    pub fn fire(&self, notification: &Notification, deadline: Option<u64>) -> bool {
        if let Some(end) = deadline {
            let Ok(mut last) = self.inner.last_deadline.lock() else {
                tracing::warn!("notification gate poisoned, skipping notification");
                return false;
            };
            if *last == Some(end) {
                tracing::debug!(end, "notification already shown for deadline");
                return false;
            }
            *last = Some(end);
        }

        match self.inner.notifier.notify(notification) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("notification unavailable: {e}");
                false
            }
        }
    }
}

/// Everything that happens when a phase ends, bundled for the engine.
#[derive(Clone)]
pub struct Alerts {
    gate: NotificationGate,
    sound: Arc<dyn SoundPlayer>,
}

impl Alerts {
    pub fn new(gate: NotificationGate, sound: Arc<dyn SoundPlayer>) -> Self {
        Self { gate, sound }
    }

    /// Alerts that do nothing.
    pub fn silent() -> Self {
        Self::new(
            NotificationGate::new(Arc::new(NullNotifier)),
            Arc::new(crate::sound::NullSoundPlayer),
        )
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// Announce that `phase` finished. Sound is only played when someone is
    /// around to hear it.
    pub fn phase_completed(
        &self,
        phase: Phase,
        deadline: Option<u64>,
        sound: Option<&SoundSettings>,
    ) {
        if let Some(settings) = sound {
            if settings.is_audible() {
                self.sound.play(settings);
            }
        }
        self.gate.fire(&Notification::for_completed(phase), deadline);
    }
}
