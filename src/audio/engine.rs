use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::{
    atomic::{AtomicU8, Ordering},
    mpsc::{self, Receiver, RecvTimeoutError, Sender},
    Arc,
};
use std::thread;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::UnboundedSender;

use super::gain::{AudioClock, SharedGain};
use super::noise::NoiseBuffer;
use super::source::LoopedNoise;
use super::{AudioError, AudioOutput, OutputStatus};
use crate::constants::{ENGINE_REPLY_TIMEOUT_MS, ENGINE_WATCH_INTERVAL_MS, FALLBACK_SAMPLE_RATE};
use crate::{log_debug, log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

enum EngineCommand {
    Open {
        gain: SharedGain,
        clock: AudioClock,
        reply: Sender<Result<u32, AudioError>>,
    },
    PlayLooped {
        buffer: NoiseBuffer,
        reply: Sender<Result<(), AudioError>>,
    },
    Resume(Sender<Result<(), AudioError>>),
    Close,
}

/// Device output driven from a dedicated `audio-engine` thread.
///
/// rodio's stream objects are not `Send`, so they never leave that thread;
/// everything else talks to it over a channel. Status changes seen on the
/// thread are published to `status` and pushed to the optional notifier.
pub struct RodioOutput {
    tx: Option<Sender<EngineCommand>>,
    status: Arc<AtomicU8>,
    notifier: Option<UnboundedSender<OutputStatus>>,
}

impl RodioOutput {
    pub fn new(notifier: Option<UnboundedSender<OutputStatus>>) -> Self {
        Self {
            tx: None,
            status: Arc::new(AtomicU8::new(OutputStatus::Closed.to_u8())),
            notifier,
        }
    }

    fn ensure_thread(&mut self) -> Result<Sender<EngineCommand>, AudioError> {
        if let Some(tx) = self.tx.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<EngineCommand>();
        let status = Arc::clone(&self.status);
        let notifier = self.notifier.clone();

        // Spawn dedicated audio thread holding non-Send audio objects
        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut engine = EngineThread::new(status, notifier);
                loop {
                    match rx.recv_timeout(Duration::from_millis(ENGINE_WATCH_INTERVAL_MS)) {
                        Ok(cmd) => engine.dispatch(cmd),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            engine.close();
                            engine.observe();
                            break;
                        }
                    }
                    engine.observe();
                }
            })
            .map_err(|e| AudioError::Engine(e.to_string()))?;

        self.tx = Some(tx.clone());
        Ok(tx)
    }

    fn send(&mut self, cmd: EngineCommand) -> Result<(), AudioError> {
        let tx = self.ensure_thread()?;
        if tx.send(cmd).is_err() {
            // The thread died; the next call spawns a fresh one.
            self.tx = None;
            return Err(AudioError::Engine("audio thread exited".into()));
        }
        Ok(())
    }
}

impl AudioOutput for RodioOutput {
    fn open(&mut self, gain: SharedGain, clock: AudioClock) -> Result<u32, AudioError> {
        let (reply, rx) = mpsc::channel();
        self.send(EngineCommand::Open { gain, clock, reply })?;
        wait_for_reply(&rx, reply_timeout())
    }

    fn play_looped(&mut self, buffer: NoiseBuffer) -> Result<(), AudioError> {
        let (reply, rx) = mpsc::channel();
        self.send(EngineCommand::PlayLooped { buffer, reply })?;
        wait_for_reply(&rx, reply_timeout())
    }

    fn status(&self) -> OutputStatus {
        OutputStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let (reply, rx) = mpsc::channel();
        self.send(EngineCommand::Resume(reply))?;
        wait_for_reply(&rx, reply_timeout())
    }

    fn close(&mut self) {
        if let Some(tx) = self.tx.as_ref() {
            let _ = tx.send(EngineCommand::Close);
        }
    }
}

fn reply_timeout() -> Duration {
    Duration::from_millis(ENGINE_REPLY_TIMEOUT_MS)
}

/// Waits for the audio thread to answer a command.
///
/// Opening a device can take a while, so on a multi-threaded tokio runtime the
/// wait is moved off the async worker with `block_in_place`. A thread that
/// does not answer within `timeout` is reported as an engine error; its late
/// reply is dropped.
fn wait_for_reply<T>(
    rx: &Receiver<Result<T, AudioError>>,
    timeout: Duration,
) -> Result<T, AudioError> {
    let wait = || match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            Err(AudioError::Engine("audio thread did not answer".into()))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(AudioError::Engine("audio thread exited".into()))
        }
    };
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(wait)
        }
        _ => wait(),
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// What the sink reports, if one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SinkState {
    paused: bool,
    empty: bool,
}

/// Maps what the audio thread holds onto the status the player sees.
///
/// A source that was asked for but has no sink counts as lost, so a failed
/// swap gets recreated instead of sitting silent.
fn output_status(
    stream_open: bool,
    source_requested: bool,
    sink: Option<SinkState>,
) -> OutputStatus {
    if !stream_open {
        return OutputStatus::Closed;
    }
    match sink {
        Some(SinkState { paused: true, .. }) => OutputStatus::Suspended,
        Some(SinkState { empty: true, .. }) => OutputStatus::SourceLost,
        Some(_) => OutputStatus::Running,
        None if source_requested => OutputStatus::SourceLost,
        None => OutputStatus::Running,
    }
}

struct EngineThread {
    stream: Option<OutputStream>,
    handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    source_requested: bool,
    gain: Option<SharedGain>,
    clock: Option<AudioClock>,
    status: Arc<AtomicU8>,
    notifier: Option<UnboundedSender<OutputStatus>>,
}

impl EngineThread {
    fn new(status: Arc<AtomicU8>, notifier: Option<UnboundedSender<OutputStatus>>) -> Self {
        Self {
            stream: None,
            handle: None,
            sink: None,
            source_requested: false,
            gain: None,
            clock: None,
            status,
            notifier,
        }
    }

    fn dispatch(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Open { gain, clock, reply } => {
                let result = self.open_device();
                if result.is_ok() {
                    self.gain = Some(gain);
                    self.clock = Some(clock);
                }
                let _ = reply.send(result);
            }
            EngineCommand::PlayLooped { buffer, reply } => {
                let _ = reply.send(self.play_looped(buffer));
            }
            EngineCommand::Resume(reply) => {
                let _ = reply.send(self.resume());
            }
            EngineCommand::Close => self.close(),
        }
    }

    fn play_looped(&mut self, buffer: NoiseBuffer) -> Result<(), AudioError> {
        let (Some(handle), Some(gain), Some(clock)) = (&self.handle, &self.gain, &self.clock)
        else {
            log_warn!("[Engine] Dropping buffer, output is not open");
            return Err(AudioError::NotOpen);
        };
        self.source_requested = true;

        // A fresh sink per buffer. The old loop stops even if the new one
        // cannot be built, which leaves the source reported as lost.
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        let sink = Sink::try_new(handle).map_err(|e| {
            log_error!("[Engine] Failed to create sink: {}", e);
            AudioError::Sink(e.to_string())
        })?;
        log_debug!(
            "[Engine] Looping {} noise, {} samples",
            buffer.color(),
            buffer.len()
        );
        sink.append(LoopedNoise::new(buffer, gain.clone(), clock.clone()));
        self.sink = Some(sink);
        Ok(())
    }

    fn open_device(&mut self) -> Result<u32, AudioError> {
        self.close();

        let host = rodio::cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let sample_rate = device
            .default_output_config()
            .map(|config| config.sample_rate().0)
            .unwrap_or(FALLBACK_SAMPLE_RATE);

        let (stream, handle) = OutputStream::try_from_device(&device)
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        // Probe the mixer now so a broken device fails here, not on first play.
        Sink::try_new(&handle).map_err(|e| AudioError::Sink(e.to_string()))?;

        self.stream = Some(stream);
        self.handle = Some(handle);
        log_info!("[Engine] Output opened at {} Hz", sample_rate);
        Ok(sample_rate)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::NotOpen);
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.source_requested = false;
        self.handle = None;
        self.stream = None;
        self.gain = None;
        self.clock = None;
    }

    fn current_status(&self) -> OutputStatus {
        let sink = self.sink.as_ref().map(|sink| SinkState {
            paused: sink.is_paused(),
            empty: sink.empty(),
        });
        output_status(self.stream.is_some(), self.source_requested, sink)
    }

    fn observe(&mut self) {
        let status = self.current_status();
        let previous = OutputStatus::from_u8(self.status.swap(status.to_u8(), Ordering::SeqCst));
        if previous == status {
            return;
        }

        match status {
            OutputStatus::Running => log_info!("[Engine] Output running"),
            OutputStatus::Suspended => log_warn!("[Engine] Output suspended"),
            OutputStatus::SourceLost => log_warn!("[Engine] Looped source ended"),
            OutputStatus::Closed => log_info!("[Engine] Output closed"),
        }

        if let Some(notifier) = &self.notifier {
            if notifier.send(status).is_err() {
                log_error!("[Engine] Status listener is gone");
                self.notifier = None;
            }
        }
    }
}
