//! # pomoclock Core Library
//!
//! This library provides the core logic for the pomoclock Pomodoro timer.
//! All operations are exposed to the standalone `pomoclock` CLI binary,
//! which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Phase Engine**: focus / short break / long break / custom rotation,
//!   run state and session counter
//! - **Timekeeper**: wall-clock deadlines that survive suspension and
//!   restarts; the caller periodically invokes `tick()`
//! - **Background Watcher**: independently scheduled deadline check that
//!   raises the completion notification
//! - **Storage**: SQLite key/value store for preferences and the armed
//!   deadline, TOML for process configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`Timekeeper`]: Deadline arming, polling and startup recovery
//! - [`BackgroundWatcher`]: Channel-fed deadline watcher task
//! - [`Preferences`]: User durations and sound settings
//! - [`AppConfig`]: Application configuration management

pub mod alerts;
pub mod error;
pub mod events;
pub mod sound;
pub mod storage;
pub mod timer;
pub mod watcher;

pub use alerts::{Alerts, Notification, NotificationGate, Notifier, NullNotifier};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use sound::{NullSoundPlayer, SoundPlayer, SoundSettings, SOUND_OPTIONS};
pub use storage::{AppConfig, Database, KvStore, MemoryStore, Preferences};
pub use timer::{
    format_mm_ss, ArmedDeadline, Clock, ManualClock, Phase, RunState, SystemClock, Timekeeper,
    TimerEngine, TimerState,
};
pub use watcher::{BackgroundWatcher, WatcherMessage};
