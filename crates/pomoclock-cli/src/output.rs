//! Desktop-side implementations of the alert collaborators.

use std::io::Write;
use std::sync::Mutex;
use std::thread::JoinHandle;

use pomoclock_core::alerts::NotifyResult;
use pomoclock_core::{Notification, Notifier, SoundPlayer, SoundSettings};

/// Shows notifications through the desktop notification service.
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) -> NotifyResult {
        notify_rust::Notification::new()
            .summary(&notification.title)
            .body(&notification.body)
            .appname(&self.app_name)
            .icon("alarm-clock")
            .show()
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Rings the terminal bell, once per repeat.
///
/// Terminals have no volume control, so volume only matters as far as zero
/// means silence.
#[derive(Default)]
pub struct TerminalBell {
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl TerminalBell {
    pub fn new() -> Self {
        Self::default()
    }

    fn ring(sound: &SoundSettings) {
        let start = std::time::Instant::now();
        for offset in sound.repeat_offsets() {
            if let Some(wait) = offset.checked_sub(start.elapsed()) {
                std::thread::sleep(wait);
            }
            let mut err = std::io::stderr();
            let _ = err.write_all(b"\x07");
            let _ = err.flush();
        }
    }

    /// Block until every started sound has finished.
    pub fn wait(&self) {
        let handles = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl SoundPlayer for TerminalBell {
    fn play(&self, sound: &SoundSettings) {
        if !sound.is_audible() {
            return;
        }
        let sound = sound.clone();
        let handle = std::thread::spawn(move || Self::ring(&sound));
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(handle);
        }
    }
}
