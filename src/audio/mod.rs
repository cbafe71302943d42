pub mod engine;
pub mod gain;
pub mod noise;
pub mod source;

pub use engine::RodioOutput;
pub use gain::{output_gain, AudioClock, GainAutomation, SharedGain};
pub use noise::{NoiseBuffer, NoiseColor};

use log::warn;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("failed to create audio output stream: {0}")]
    Stream(String),
    #[error("failed to create audio sink: {0}")]
    Sink(String),
    #[error("audio output is not open")]
    NotOpen,
    #[error("audio engine unavailable: {0}")]
    Engine(String),
}

/// What the output device is doing, as far as the player can tell.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutputStatus {
    Running,
    Suspended,
    /// The stream is up but the looped source is gone.
    SourceLost,
    Closed,
}

impl OutputStatus {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            OutputStatus::Running => 0,
            OutputStatus::Suspended => 1,
            OutputStatus::SourceLost => 2,
            OutputStatus::Closed => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => OutputStatus::Running,
            1 => OutputStatus::Suspended,
            2 => OutputStatus::SourceLost,
            _ => OutputStatus::Closed,
        }
    }
}

/// An output device able to loop one noise buffer through the shared gain.
pub trait AudioOutput: Send {
    /// Opens the device and returns its sample rate.
    fn open(&mut self, gain: SharedGain, clock: AudioClock) -> Result<u32, AudioError>;

    /// Replaces whatever is playing with `buffer`, looped.
    fn play_looped(&mut self, buffer: NoiseBuffer) -> Result<(), AudioError>;

    fn status(&self) -> OutputStatus;

    fn resume(&mut self) -> Result<(), AudioError>;

    fn close(&mut self);
}

/// The audio graph: output device, gain stage and looped source.
///
/// Created closed; `open` builds the graph and `teardown` releases the device.
pub struct AudioSession {
    output: Box<dyn AudioOutput>,
    gain: SharedGain,
    clock: AudioClock,
    color: Option<NoiseColor>,
    open: bool,
}

impl AudioSession {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            gain: gain::shared_gain(),
            clock: AudioClock::default(),
            color: None,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Opens the device and starts a source for `color`.
    ///
    /// Only a failure to open the device is an error. A source that fails to
    /// start leaves the session open with its status reported as
    /// `SourceLost`, which the health checks recreate.
    pub fn open(&mut self, color: NoiseColor) -> Result<(), AudioError> {
        if self.open {
            return Ok(());
        }
        let sample_rate = self.output.open(self.gain.clone(), self.clock.clone())?;
        self.clock.set_sample_rate(sample_rate);
        self.open = true;
        self.color = None;
        if let Err(err) = self.start_source(color) {
            warn!("[Audio] Output opened without a source: {}", err);
        }
        Ok(())
    }

    /// Synthesizes a fresh buffer for `color` and swaps it in.
    pub fn start_source(&mut self, color: NoiseColor) -> Result<(), AudioError> {
        if !self.open {
            return Err(AudioError::NotOpen);
        }
        let buffer = NoiseBuffer::for_color(color, self.clock.sample_rate());
        self.output.play_looped(buffer)?;
        self.color = Some(color);
        Ok(())
    }

    pub fn color(&self) -> Option<NoiseColor> {
        self.color
    }

    pub fn status(&self) -> OutputStatus {
        if !self.open {
            return OutputStatus::Closed;
        }
        self.output.status()
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        self.output.resume()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    /// Runs `f` against the gain automation at the current audio time.
    pub fn with_gain<F>(&self, f: F)
    where
        F: FnOnce(&mut GainAutomation, f64),
    {
        let now = self.now();
        let mut automation = match self.gain.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut *automation, now);
    }

    pub fn gain_at_now(&self) -> f32 {
        let now = self.now();
        match self.gain.lock() {
            Ok(automation) => automation.value_at(now),
            Err(poisoned) => poisoned.into_inner().value_at(now),
        }
    }

    pub fn gain_target(&self) -> f32 {
        match self.gain.lock() {
            Ok(automation) => automation.target(),
            Err(poisoned) => poisoned.into_inner().target(),
        }
    }

    pub fn teardown(&mut self) {
        if self.open {
            self.output.close();
        }
        self.open = false;
        self.color = None;
        self.with_gain(|gain, _| *gain = GainAutomation::default());
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct FakeState {
        pub opens: usize,
        pub closes: usize,
        pub resumes: usize,
        pub played: Vec<NoiseColor>,
        pub status: Option<OutputStatus>,
        pub fail_open: bool,
        pub fail_resume: bool,
        pub fail_play: bool,
        pub clock: Option<AudioClock>,
    }

    /// Records calls instead of touching a device.
    #[derive(Clone, Default)]
    pub struct FakeOutput {
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakeOutput {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_status(&self, status: OutputStatus) {
            self.state.lock().unwrap().status = Some(status);
        }

        /// Pretends the device rendered `seconds` of audio.
        pub fn render(&self, seconds: f64) {
            let state = self.state.lock().unwrap();
            if let Some(clock) = &state.clock {
                clock.advance((seconds * clock.sample_rate() as f64).round() as u64);
            }
        }
    }

    impl AudioOutput for FakeOutput {
        fn open(&mut self, _gain: SharedGain, clock: AudioClock) -> Result<u32, AudioError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_open {
                return Err(AudioError::NoDevice);
            }
            state.opens += 1;
            state.status = Some(OutputStatus::Running);
            state.clock = Some(clock);
            Ok(8_000)
        }

        fn play_looped(&mut self, buffer: NoiseBuffer) -> Result<(), AudioError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_play {
                state.status = Some(OutputStatus::SourceLost);
                return Err(AudioError::Sink("no mixer".into()));
            }
            state.played.push(buffer.color());
            state.status = Some(OutputStatus::Running);
            Ok(())
        }

        fn status(&self) -> OutputStatus {
            self.state
                .lock()
                .unwrap()
                .status
                .unwrap_or(OutputStatus::Closed)
        }

        fn resume(&mut self) -> Result<(), AudioError> {
            let mut state = self.state.lock().unwrap();
            state.resumes += 1;
            if state.fail_resume {
                return Err(AudioError::Engine("resume refused".into()));
            }
            state.status = Some(OutputStatus::Running);
            Ok(())
        }

        fn close(&mut self) {
            let mut state = self.state.lock().unwrap();
            state.closes += 1;
            state.status = Some(OutputStatus::Closed);
        }
    }
}
