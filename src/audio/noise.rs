use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::{
    BROWN_LEAK, BROWN_MAKEUP_GAIN, BROWN_STEP, BUFFER_SECONDS, WHITE_LEVEL,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    Brown,
    #[default]
    White,
}

impl NoiseColor {
    pub fn as_str(self) -> &'static str {
        match self {
            NoiseColor::Brown => "brown",
            NoiseColor::White => "white",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            NoiseColor::Brown => NoiseColor::White,
            NoiseColor::White => NoiseColor::Brown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NoiseColor::Brown => "Brown Noise",
            NoiseColor::White => "White Noise",
        }
    }
}

impl fmt::Display for NoiseColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoiseColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brown" => Ok(NoiseColor::Brown),
            "white" => Ok(NoiseColor::White),
            other => Err(format!("unknown noise color '{other}'")),
        }
    }
}

/// A mono block of pre-rendered noise, played on a loop.
///
/// Samples sit behind an `Arc` so the audio thread can hold a buffer while the
/// controller keeps its own handle.
#[derive(Debug, Clone)]
pub struct NoiseBuffer {
    color: NoiseColor,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl NoiseBuffer {
    /// Standard two-second loop at `sample_rate`.
    pub fn for_color(color: NoiseColor, sample_rate: u32) -> Self {
        let length = (BUFFER_SECONDS * sample_rate) as usize;
        generate(color, length, sample_rate)
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Leaky integrator: roughly -6 dB/octave above a very low corner.
///
/// Output is already scaled by the makeup gain but not clamped; it sits far
/// below full scale and only touches it on rare excursions.
#[derive(Debug, Default, Clone, Copy)]
struct BrownIntegrator {
    last: f32,
}

impl BrownIntegrator {
    fn next(&mut self, white: f32) -> f32 {
        self.last = (self.last + BROWN_STEP * white) / BROWN_LEAK;
        self.last * BROWN_MAKEUP_GAIN
    }
}

pub fn generate(color: NoiseColor, length: usize, sample_rate: u32) -> NoiseBuffer {
    let mut rng = StdRng::from_entropy();
    generate_with(&mut rng, color, length, sample_rate)
}

pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    color: NoiseColor,
    length: usize,
    sample_rate: u32,
) -> NoiseBuffer {
    let samples: Vec<f32> = match color {
        NoiseColor::White => (0..length)
            .map(|_| rng.gen_range(-1.0f32..=1.0) * WHITE_LEVEL)
            .collect(),
        NoiseColor::Brown => {
            let mut integrator = BrownIntegrator::default();
            (0..length)
                .map(|_| {
                    let white = rng.gen_range(-1.0f32..=1.0);
                    integrator.next(white).clamp(-1.0, 1.0)
                })
                .collect()
        }
    };

    NoiseBuffer {
        color,
        sample_rate,
        samples: samples.into(),
    }
}
