pub mod state;

pub use state::{format_time, CountdownTimer, TickOutcome, TimerStatus};
