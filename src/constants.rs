// Output level
/// Full-scale gain is never exceeded past this fraction, to keep the noise at a safe loudness.
pub const MAX_GAIN: f32 = 0.3;
pub const DEFAULT_VOLUME: f32 = 0.5;

// Gain ramps (seconds)
pub const FADE_IN_SECS: f64 = 1.0;
pub const FADE_OUT_SECS: f64 = 0.5;
pub const VOLUME_SMOOTHING_TAU: f64 = 0.1;

// Noise buffer
pub const BUFFER_SECONDS: u32 = 2;
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;
pub const WHITE_LEVEL: f32 = 0.15;
pub const BROWN_STEP: f32 = 0.02;
pub const BROWN_LEAK: f32 = 1.02;
pub const BROWN_MAKEUP_GAIN: f32 = 3.5;

// Timer
pub const MAX_TIMER_MINUTES: u32 = 120;
pub const FADE_OUT_WINDOW_SECS: u32 = 5;
pub const TIMER_SNAP_MINUTES: i64 = 5;

// Gestures
pub const DRAG_VOLUME_PER_PX: f32 = 0.005;
pub const DRAG_PX_PER_MINUTE: f32 = 10.0;
pub const KEY_VOLUME_STEP: f32 = 0.01;
pub const KEY_TIMER_STEP: i32 = 1;

// Background tasks (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 1_000;
pub const HEALTH_CHECK_INTERVAL_MS: u64 = 3_000;
pub const ENGINE_WATCH_INTERVAL_MS: u64 = 250;
pub const ENGINE_REPLY_TIMEOUT_MS: u64 = 5_000;
