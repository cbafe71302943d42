use rodio::Source;
use std::time::Duration;

use super::gain::{AudioClock, GainAutomation, SharedGain};
use super::noise::NoiseBuffer;

const BLOCK: usize = 64;

/// Endless playback of a noise buffer through the shared gain automation.
///
/// Gain is re-read once per block; if the controller holds the lock at that
/// moment the previous block's gain is reused.
pub struct LoopedNoise {
    buffer: NoiseBuffer,
    position: usize,
    gain: SharedGain,
    clock: AudioClock,
    block_gains: [f32; BLOCK],
    block_index: usize,
}

impl LoopedNoise {
    pub fn new(buffer: NoiseBuffer, gain: SharedGain, clock: AudioClock) -> Self {
        Self {
            buffer,
            position: 0,
            gain,
            clock,
            block_gains: [0.0; BLOCK],
            block_index: BLOCK,
        }
    }

    fn refill_gains(&mut self) {
        let start = self.clock.frames();
        let rate = self.clock.sample_rate() as f64;
        match self.gain.try_lock() {
            Ok(automation) => fill_block(&automation, start, rate, &mut self.block_gains),
            Err(_) => {
                let last = self.block_gains[BLOCK - 1];
                self.block_gains = [last; BLOCK];
            }
        }
        self.block_index = 0;
    }
}

fn fill_block(automation: &GainAutomation, start_frame: u64, rate: f64, out: &mut [f32; BLOCK]) {
    for (offset, slot) in out.iter_mut().enumerate() {
        let t = (start_frame + offset as u64) as f64 / rate;
        *slot = automation.value_at(t);
    }
}

impl Iterator for LoopedNoise {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            return None;
        }

        if self.block_index >= BLOCK {
            self.refill_gains();
        }

        let sample = self.buffer.samples()[self.position] * self.block_gains[self.block_index];
        self.block_index += 1;
        self.position = (self.position + 1) % self.buffer.len();
        self.clock.advance(1);

        Some(sample)
    }
}

impl Source for LoopedNoise {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
