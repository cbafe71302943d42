use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc, Mutex,
};

use crate::constants::{FALLBACK_SAMPLE_RATE, MAX_GAIN};

/// Output gain for a user volume. Linear, monotonic, capped at [`MAX_GAIN`].
pub fn output_gain(volume: f32) -> f32 {
    volume.clamp(0.0, 1.0) * MAX_GAIN
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Hold(f32),
    Linear {
        from: f32,
        to: f32,
        start: f64,
        end: f64,
    },
    Approach {
        from: f32,
        target: f32,
        start: f64,
        tau: f64,
    },
}

/// Scheduled gain changes, evaluated against the audio clock.
///
/// Every scheduling call first pins the value at `now`, so a new ramp always
/// starts from whatever the listener is hearing and never jumps.
#[derive(Debug, Clone, PartialEq)]
pub struct GainAutomation {
    segment: Segment,
}

impl Default for GainAutomation {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl GainAutomation {
    pub fn new(value: f32) -> Self {
        Self {
            segment: Segment::Hold(value),
        }
    }

    pub fn value_at(&self, t: f64) -> f32 {
        match self.segment {
            Segment::Hold(value) => value,
            Segment::Linear {
                from,
                to,
                start,
                end,
            } => {
                if t >= end {
                    to
                } else if t <= start {
                    from
                } else {
                    let progress = ((t - start) / (end - start)) as f32;
                    from + (to - from) * progress
                }
            }
            Segment::Approach {
                from,
                target,
                start,
                tau,
            } => {
                if tau <= 0.0 {
                    target
                } else if t <= start {
                    from
                } else {
                    let decay = (-(t - start) / tau).exp() as f32;
                    target + (from - target) * decay
                }
            }
        }
    }

    /// Drops anything scheduled and freezes the gain at its value at `now`.
    pub fn hold(&mut self, now: f64) {
        self.segment = Segment::Hold(self.value_at(now));
    }

    pub fn ramp_linear(&mut self, now: f64, target: f32, duration: f64) {
        let from = self.value_at(now);
        self.segment = Segment::Linear {
            from,
            to: target,
            start: now,
            end: now + duration.max(0.0),
        };
    }

    pub fn approach(&mut self, now: f64, target: f32, tau: f64) {
        let from = self.value_at(now);
        self.segment = Segment::Approach {
            from,
            target,
            start: now,
            tau,
        };
    }

    /// The value the automation is heading for.
    pub fn target(&self) -> f32 {
        match self.segment {
            Segment::Hold(value) => value,
            Segment::Linear { to, .. } => to,
            Segment::Approach { target, .. } => target,
        }
    }
}

pub type SharedGain = Arc<Mutex<GainAutomation>>;

pub fn shared_gain() -> SharedGain {
    Arc::new(Mutex::new(GainAutomation::default()))
}

/// Frames rendered so far, as seen by the playing source.
#[derive(Debug, Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU32>,
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new(FALLBACK_SAMPLE_RATE)
    }
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: Arc::new(AtomicU32::new(sample_rate.max(1))),
        }
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate.max(1), Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Seconds of audio rendered.
    pub fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_gain_is_linear_and_capped() {
        assert_eq!(output_gain(0.0), 0.0);
        assert!((output_gain(1.0) - 0.3).abs() < 1e-6);
        assert!((output_gain(0.5) - 0.15).abs() < 1e-6);
        assert!((output_gain(7.0) - 0.3).abs() < 1e-6);
        assert_eq!(output_gain(-1.0), 0.0);

        let mut previous = -1.0;
        for step in 0..=100 {
            let gain = output_gain(step as f32 / 100.0);
            assert!(gain >= previous);
            assert!(gain <= MAX_GAIN);
            previous = gain;
        }
    }

    #[test]
    fn linear_ramp_interpolates_from_current_value() {
        let mut gain = GainAutomation::new(0.0);
        gain.ramp_linear(10.0, 0.3, 1.0);

        assert_eq!(gain.value_at(10.0), 0.0);
        assert!((gain.value_at(10.5) - 0.15).abs() < 1e-6);
        assert!((gain.value_at(11.0) - 0.3).abs() < 1e-6);
        assert!((gain.value_at(20.0) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn ramp_started_mid_ramp_has_no_jump() {
        let mut gain = GainAutomation::new(0.0);
        gain.ramp_linear(0.0, 0.3, 1.0);
        let midway = gain.value_at(0.5);

        gain.ramp_linear(0.5, 0.0, 0.5);
        assert!((gain.value_at(0.5) - midway).abs() < 1e-6);
        assert_eq!(gain.value_at(1.0), 0.0);
    }

    #[test]
    fn approach_follows_time_constant() {
        let mut gain = GainAutomation::new(0.1);
        gain.approach(2.0, 0.3, 0.1);

        let one_tau = gain.value_at(2.1);
        let expected = 0.3 + (0.1 - 0.3) * (-1.0f32).exp();
        assert!((one_tau - expected).abs() < 1e-5);
        assert!((gain.value_at(5.0) - 0.3).abs() < 1e-4);
        assert_eq!(gain.target(), 0.3);
    }

    #[test]
    fn hold_freezes_current_value() {
        let mut gain = GainAutomation::new(0.0);
        gain.ramp_linear(0.0, 0.2, 1.0);
        gain.hold(0.25);

        assert!((gain.value_at(0.25) - 0.05).abs() < 1e-6);
        assert!((gain.value_at(100.0) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn clock_reports_rendered_seconds() {
        let clock = AudioClock::new(48_000);
        clock.advance(24_000);
        assert!((clock.now() - 0.5).abs() < 1e-9);

        let shared = clock.clone();
        shared.advance(24_000);
        assert!((clock.now() - 1.0).abs() < 1e-9);
    }
}
