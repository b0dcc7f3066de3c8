use clap::Subcommand;
use pomoclock_core::storage::prefs::KEYS;
use pomoclock_core::Preferences;

use crate::session::open_store;

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Get a preference (e.g. "focusTime", "soundOption")
    Get { key: String },
    /// Set a preference; unusable values fall back to the default
    Set {
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// List all preferences as JSON
    List,
    /// Restore default preferences
    Reset,
}

pub fn run(action: PrefsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store();
    match action {
        PrefsAction::Get { key } => {
            let prefs = Preferences::load(store.as_ref());
            match prefs.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    return Err(format!("unknown key: {key} (expected one of {})", KEYS.join(", ")).into())
                }
            }
        }
        PrefsAction::Set { key, value } => {
            let mut prefs = Preferences::load(store.as_ref());
            let accepted = prefs.set(&key, &value)?;
            if accepted != value.trim() {
                eprintln!("{key}: {value:?} is not usable, using {accepted}");
            }
            prefs.save(store.as_ref());
            println!("{accepted}");
        }
        PrefsAction::List => {
            let prefs = Preferences::load(store.as_ref());
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
        PrefsAction::Reset => {
            Preferences::default().save(store.as_ref());
            println!("preferences reset to defaults");
        }
    }
    Ok(())
}
