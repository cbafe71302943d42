use serde::{Deserialize, Serialize};

use crate::constants::{FADE_OUT_WINDOW_SECS, MAX_TIMER_MINUTES};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    /// No duration set.
    #[default]
    Off,
    /// Duration set, playback stopped.
    Armed,
    /// Counting down while playback runs.
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The timer is not running; nothing changed.
    Idle,
    Counting { remaining: u32 },
    /// Inside the final seconds; `factor` scales the output gain.
    Fading { remaining: u32, factor: f32 },
    /// Reached zero. The timer is back to `Off` and playback must stop.
    Expired,
}

/// Sleep timer that fades the noise out and stops it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountdownTimer {
    status: TimerStatus,
    duration_minutes: u32,
    seconds_remaining: u32,
}

impl CountdownTimer {
    pub fn new(duration_minutes: u32) -> Self {
        let mut timer = Self::default();
        timer.set_duration(duration_minutes);
        timer
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Sets a new duration and restarts the countdown from it. A running timer
    /// keeps running; zero switches the timer off.
    pub fn set_duration(&mut self, minutes: u32) {
        let minutes = minutes.min(MAX_TIMER_MINUTES);
        self.duration_minutes = minutes;
        self.seconds_remaining = minutes * 60;
        self.status = match (minutes, self.status) {
            (0, _) => TimerStatus::Off,
            (_, TimerStatus::Running) => TimerStatus::Running,
            _ => TimerStatus::Armed,
        };
    }

    /// Playback started.
    pub fn start(&mut self) {
        if self.duration_minutes == 0 {
            self.status = TimerStatus::Off;
            return;
        }
        if self.seconds_remaining == 0 {
            self.seconds_remaining = self.duration_minutes * 60;
        }
        self.status = TimerStatus::Running;
    }

    /// Playback stopped; the remaining time is kept for the next start.
    pub fn pause(&mut self) {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Armed;
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::Idle;
        }

        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            self.duration_minutes = 0;
            self.status = TimerStatus::Off;
            return TickOutcome::Expired;
        }

        if self.seconds_remaining <= FADE_OUT_WINDOW_SECS {
            TickOutcome::Fading {
                remaining: self.seconds_remaining,
                factor: self.fade_factor(),
            }
        } else {
            TickOutcome::Counting {
                remaining: self.seconds_remaining,
            }
        }
    }

    /// Gain multiplier for the fade-out window, 1.0 outside it.
    pub fn fade_factor(&self) -> f32 {
        if self.status == TimerStatus::Running && self.seconds_remaining <= FADE_OUT_WINDOW_SECS {
            self.seconds_remaining as f32 / FADE_OUT_WINDOW_SECS as f32
        } else {
            1.0
        }
    }
}

/// `m:ss`
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
