use clap::Subcommand;
use pomoclock_core::sound::is_known_sound;
use pomoclock_core::{Preferences, SoundPlayer, SOUND_OPTIONS};

use crate::output::TerminalBell;
use crate::session::open_store;

#[derive(Subcommand)]
pub enum SoundAction {
    /// List available completion sounds
    List,
    /// Play a sound with the configured volume and repeat count
    Test {
        /// Sound id; defaults to the configured one
        id: Option<String>,
    },
}

pub fn run(action: SoundAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SoundAction::List => {
            println!("{}", serde_json::to_string_pretty(&SOUND_OPTIONS)?);
        }
        SoundAction::Test { id } => {
            let mut settings = Preferences::load(open_store().as_ref()).sound();
            if let Some(id) = id {
                if !is_known_sound(&id) {
                    return Err(format!("unknown sound: {id}").into());
                }
                settings.sound_id = id;
            }
            let bell = TerminalBell::new();
            bell.play(&settings);
            bell.wait();
            println!("{}", settings.sound_id);
        }
    }
    Ok(())
}
