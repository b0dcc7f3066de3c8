mod clock;
mod engine;
mod phase;
mod timekeeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{RunState, TimerEngine, TimerState, MAX_QUICK_MINUTES, MIN_QUICK_MINUTES, STATE_KEY};
pub use phase::{format_mm_ss, next_phase, Phase, Transition};
pub use timekeeper::{ArmedDeadline, PollOutcome, Recovery, Timekeeper, END_TIME_KEY, MODE_KEY};
