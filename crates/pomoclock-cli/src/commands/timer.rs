use std::io::Write;

use clap::Subcommand;
use pomoclock_core::watcher::{self, BackgroundWatcher};
use pomoclock_core::{format_mm_ss, AppConfig, Event, RunState};

use crate::session::Session;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the loaded countdown
    Start,
    /// Pause the running countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Stop and reload the current phase's duration
    Reset,
    /// Move to the next phase and start it right away
    Skip,
    /// Finish the current phase now, with notification and sound
    FastForward,
    /// Load a custom countdown without starting it
    Quick {
        /// Minutes (1-999)
        minutes: u32,
    },
    /// Start a focus phase now
    Focus,
    /// Start a short break now
    ShortBreak,
    /// Start a long break now
    LongBreak,
    /// Print current timer state as JSON
    Status,
    /// Follow the countdown until it completes
    Watch {
        /// Start the loaded countdown if it is not running
        #[arg(long)]
        start: bool,
        /// Keep going: start each next phase automatically
        #[arg(long)]
        auto: bool,
    },
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub fn run(action: TimerAction, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let TimerAction::Watch { start, auto } = action {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        return runtime.block_on(watch(config, start, auto));
    }

    let mut session = Session::open(config, None);
    session.restore();
    let engine = &mut session.engine;

    let event = match action {
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Resume => engine.resume(),
        TimerAction::Reset => Some(engine.reset()),
        TimerAction::Skip => Some(engine.skip_to_next()),
        TimerAction::FastForward => Some(engine.fast_forward()),
        TimerAction::Quick { minutes } => Some(engine.set_quick_time(minutes)?),
        TimerAction::Focus => Some(engine.start_focus()),
        TimerAction::ShortBreak => Some(engine.start_short_break()),
        TimerAction::LongBreak => Some(engine.start_long_break()),
        TimerAction::Status => {
            if let Some(Event::TimerCompleted {
                phase, next_phase, ..
            }) = engine.tick()
            {
                eprintln!("{} complete; {} is ready", phase.label(), next_phase.label());
            }
            None
        }
        TimerAction::Watch { .. } => unreachable!("handled above"),
    };

    // Commands that do not apply in the current state report the state instead.
    let event = event.unwrap_or_else(|| session.engine.snapshot());
    print_event(&event)?;
    session.close();
    Ok(())
}

async fn watch(config: &AppConfig, start: bool, auto: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = watcher::channel();
    let mut session = Session::open(config, Some(tx));
    let background = BackgroundWatcher::new(session.clock(), session.gate())
        .with_poll_interval(config.poll_interval());
    let watcher_task = tokio::spawn(background.run(rx));

    session.restore();
    if start && session.engine.run_state() == RunState::Idle {
        session.engine.start();
    }
    if session.engine.run_state() != RunState::Ticking {
        print_event(&session.engine.snapshot())?;
        eprintln!("timer is not running; use `pomoclock timer start` or `--start`");
        session.close();
        watcher_task.await?;
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interval = tokio::time::interval(config.poll_interval());
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!();
                break;
            }
            _ = interval.tick() => match session.engine.tick() {
                Some(Event::TimerTick { phase, remaining_secs, .. }) => {
                    write!(stdout, "\r{:<14} {}", phase.label(), format_mm_ss(remaining_secs))?;
                    stdout.flush()?;
                }
                Some(event @ Event::TimerCompleted { .. }) => {
                    println!();
                    print_event(&event)?;
                    if !auto {
                        break;
                    }
                    session.engine.start();
                }
                _ => {}
            },
        }
    }

    session.close();
    watcher_task.await?;
    Ok(())
}
