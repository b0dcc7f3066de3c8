pub mod completions;
pub mod config;
pub mod prefs;
pub mod sound;
pub mod timer;
