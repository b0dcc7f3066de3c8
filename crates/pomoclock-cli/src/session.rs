//! Wires the core engine to the on-disk store and the desktop alerts.

use std::sync::Arc;

use pomoclock_core::watcher::WatcherMessage;
use pomoclock_core::{
    Alerts, AppConfig, Clock, Database, Event, KvStore, MemoryStore, NotificationGate, Notifier,
    NullNotifier, NullSoundPlayer, Preferences, SoundPlayer, SystemClock, Timekeeper, TimerEngine,
    TimerState,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::output::{DesktopNotifier, TerminalBell};

/// Open the persistent store, or fall back to memory so the timer still
/// works when the data directory is unusable.
pub fn open_store() -> Arc<dyn KvStore> {
    match Database::open() {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::warn!("storage unavailable, continuing in memory: {e}");
            Arc::new(MemoryStore::new())
        }
    }
}

pub struct Session {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    gate: NotificationGate,
    bell: Option<Arc<TerminalBell>>,
    pub engine: TimerEngine,
}

impl Session {
    /// Build the engine from stored preferences and the last snapshot.
    /// Call [`restore`](Self::restore) before driving it.
    pub fn open(config: &AppConfig, watcher: Option<UnboundedSender<WatcherMessage>>) -> Self {
        let store = open_store();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
            Arc::new(DesktopNotifier::new(config.notifications.app_name.clone()))
        } else {
            Arc::new(NullNotifier)
        };
        let bell = config.sound.enabled.then(|| Arc::new(TerminalBell::new()));
        let sound: Arc<dyn SoundPlayer> = match &bell {
            Some(bell) => bell.clone(),
            None => Arc::new(NullSoundPlayer),
        };
        let gate = NotificationGate::new(notifier);

        let mut timekeeper = Timekeeper::new(store.clone(), clock.clone());
        if let Some(tx) = watcher {
            timekeeper = timekeeper.with_watcher(tx);
        }

        let prefs = Preferences::load(store.as_ref());
        let mut engine = TimerEngine::new(prefs, timekeeper, Alerts::new(gate.clone(), sound));
        if let Some(state) = TimerState::load(store.as_ref()) {
            engine = engine.with_state(state);
        }

        Self {
            store,
            clock,
            gate,
            bell,
            engine,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn gate(&self) -> NotificationGate {
        self.gate.clone()
    }

    /// Reconcile with the persisted deadline, reporting on stderr what
    /// happened while no process was running.
    pub fn restore(&mut self) {
        match self.engine.recover_on_startup() {
            Some(Event::TimerCompleted {
                phase, next_phase, ..
            }) => {
                eprintln!(
                    "{} finished while away; {} is ready",
                    phase.label(),
                    next_phase.label()
                );
            }
            Some(Event::TimerRecovered {
                phase,
                remaining_secs,
                ..
            }) => {
                tracing::info!(%phase, remaining_secs, "resumed running timer");
            }
            _ => {}
        }
    }

    /// Persist the timer snapshot and let pending sounds finish.
    pub fn close(self) {
        self.engine.state().save(self.store.as_ref());
        if let Some(bell) = &self.bell {
            bell.wait();
        }
    }
}
