//! Integration tests for the phase engine running on a real store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pomoclock_core::alerts::NotifyResult;
use pomoclock_core::timer::{END_TIME_KEY, MODE_KEY};
use pomoclock_core::{
    Alerts, Database, Event, KvStore, ManualClock, Notification, NotificationGate, Notifier,
    Phase, Preferences, RunState, SoundPlayer, SoundSettings, Timekeeper, TimerEngine, TimerState,
};

const T0: u64 = 1_700_000_000_000;

#[derive(Default)]
struct Recorder {
    notifications: Mutex<Vec<Notification>>,
    sounds: Mutex<usize>,
}

impl Notifier for Recorder {
    fn notify(&self, notification: &Notification) -> NotifyResult {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl SoundPlayer for Recorder {
    fn play(&self, _sound: &SoundSettings) {
        *self.sounds.lock().unwrap() += 1;
    }
}

fn engine_on(
    store: Arc<dyn KvStore>,
    clock: Arc<ManualClock>,
    recorder: Arc<Recorder>,
) -> TimerEngine {
    let prefs = Preferences::load(store.as_ref());
    let snapshot = TimerState::load(store.as_ref());
    let timekeeper = Timekeeper::new(store, clock);
    let alerts = Alerts::new(NotificationGate::new(recorder.clone()), recorder);
    let engine = TimerEngine::new(prefs, timekeeper, alerts);
    match snapshot {
        Some(state) => engine.with_state(state),
        None => engine,
    }
}

fn complete(engine: &mut TimerEngine, clock: &ManualClock) -> (Phase, u32) {
    if engine.run_state() == RunState::Idle {
        engine.start();
    }
    clock.advance(Duration::from_secs(engine.remaining_secs() + 1));
    match engine.tick() {
        Some(Event::TimerCompleted {
            next_phase,
            session_count,
            ..
        }) => (next_phase, session_count),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn full_rotation_escalates_to_long_break_at_threshold() {
    let store: Arc<dyn KvStore> = Arc::new(Database::open_memory().unwrap());
    let mut prefs = Preferences::default();
    prefs.focus_time = 1;
    prefs.short_break = 1;
    prefs.sessions_before_long_break = 2;
    prefs.save(store.as_ref());

    let clock = Arc::new(ManualClock::new(T0));
    let mut engine = engine_on(store, clock.clone(), Arc::new(Recorder::default()));

    let trace: Vec<(Phase, u32)> = (0..6).map(|_| complete(&mut engine, &clock)).collect();
    assert_eq!(
        trace,
        vec![
            (Phase::ShortBreak, 1),
            (Phase::Focus, 1),
            (Phase::ShortBreak, 2),
            (Phase::LongBreak, 0),
            (Phase::Focus, 0),
            (Phase::ShortBreak, 1),
        ]
    );
}

#[test]
fn expired_deadline_is_completed_on_startup_without_sound() {
    let store: Arc<dyn KvStore> = Arc::new(Database::open_memory().unwrap());
    let end = (T0 - 5000).to_string();
    store
        .set_many(&[(END_TIME_KEY, end.as_str()), (MODE_KEY, "shortBreak")])
        .unwrap();

    let clock = Arc::new(ManualClock::new(T0));
    let recorder = Arc::new(Recorder::default());
    let mut engine = engine_on(store.clone(), clock, recorder.clone());

    let event = engine.recover_on_startup();
    assert!(matches!(
        event,
        Some(Event::TimerCompleted {
            phase: Phase::ShortBreak,
            unobserved: true,
            ..
        })
    ));
    // Default threshold is 1 and the fresh counter is 0, so back to focus.
    assert_eq!(engine.phase(), Phase::Focus);
    assert_eq!(engine.run_state(), RunState::Idle);
    assert!(store.get(END_TIME_KEY).unwrap().is_none());
    assert!(store.get(MODE_KEY).unwrap().is_none());

    let shown = recorder.notifications.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Short Break Complete!");
    assert_eq!(*recorder.sounds.lock().unwrap(), 0);
}

#[test]
fn expired_short_break_goes_long_when_counter_restored() {
    let store: Arc<dyn KvStore> = Arc::new(Database::open_memory().unwrap());
    TimerState {
        phase: Phase::ShortBreak,
        remaining_secs: 300,
        run: RunState::Ticking,
        session_count: 1,
        held_ms: None,
    }
    .save(store.as_ref());
    let end = (T0 - 5000).to_string();
    store
        .set_many(&[(END_TIME_KEY, end.as_str()), (MODE_KEY, "shortBreak")])
        .unwrap();

    let clock = Arc::new(ManualClock::new(T0));
    let mut engine = engine_on(store, clock, Arc::new(Recorder::default()));
    engine.recover_on_startup();
    assert_eq!(engine.phase(), Phase::LongBreak);
    assert_eq!(engine.session_count(), 0);
    assert_eq!(engine.remaining_secs(), 600);
}

#[test]
fn restart_mid_countdown_reflects_elapsed_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomoclock.db");
    let clock = Arc::new(ManualClock::new(T0));

    {
        let store: Arc<dyn KvStore> = Arc::new(Database::open_at(&path).unwrap());
        let mut engine = engine_on(store.clone(), clock.clone(), Arc::new(Recorder::default()));
        engine.start();
        clock.advance(Duration::from_secs(5));
        engine.tick();
        engine.state().save(store.as_ref());
    }

    // The process was gone for ten minutes.
    clock.advance(Duration::from_secs(600));

    let store: Arc<dyn KvStore> = Arc::new(Database::open_at(&path).unwrap());
    let mut engine = engine_on(store, clock.clone(), Arc::new(Recorder::default()));
    let event = engine.recover_on_startup();
    assert!(matches!(event, Some(Event::TimerRecovered { phase: Phase::Focus, .. })));
    assert_eq!(engine.run_state(), RunState::Ticking);
    assert_eq!(engine.remaining_secs(), 45 * 60 - 605);

    clock.advance(Duration::from_secs(45 * 60));
    assert!(matches!(engine.tick(), Some(Event::TimerCompleted { .. })));
}

#[test]
fn held_timer_survives_restart() {
    let store: Arc<dyn KvStore> = Arc::new(Database::open_memory().unwrap());
    let clock = Arc::new(ManualClock::new(T0));

    let mut engine = engine_on(store.clone(), clock.clone(), Arc::new(Recorder::default()));
    engine.start();
    clock.advance(Duration::from_secs(30));
    engine.pause();
    engine.state().save(store.as_ref());
    drop(engine);

    clock.advance(Duration::from_secs(3600));
    let mut engine = engine_on(store, clock, Arc::new(Recorder::default()));
    assert!(engine.recover_on_startup().is_none());
    assert_eq!(engine.run_state(), RunState::Held);
    assert_eq!(engine.remaining_secs(), 45 * 60 - 30);
}
