use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::{mpsc::UnboundedReceiver, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::audio::{NoiseColor, OutputStatus};
use crate::constants::{HEALTH_CHECK_INTERVAL_MS, TICK_INTERVAL_MS};
use crate::input::{Key, KeyContext, Readout};
use crate::timer::TickOutcome;
use crate::{log_info, log_warn};

use super::controller::PlayerController;
use super::events::{PlaybackState, PlayerEvent, PlayerEvents};

const ENABLE_LOGS: bool = true;

/// Async face of the player: serializes access to the controller, runs the
/// countdown ticker and the output health monitor while playback is on, and
/// publishes every change.
#[derive(Clone)]
pub struct PlayerService {
    controller: Arc<Mutex<PlayerController>>,
    events: Arc<dyn PlayerEvents>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    monitor: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    health_interval: Duration,
}

impl PlayerService {
    pub fn new(controller: PlayerController, events: Arc<dyn PlayerEvents>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            events,
            ticker: Arc::new(Mutex::new(None)),
            monitor: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            health_interval: Duration::from_millis(HEALTH_CHECK_INTERVAL_MS),
        }
    }

    pub async fn get_state(&self) -> PlaybackState {
        self.controller.lock().await.state()
    }

    pub async fn toggle_play(&self) -> Result<PlaybackState> {
        let state = {
            let mut controller = self.controller.lock().await;
            controller.toggle_play()?;
            controller.state()
        };
        self.after_change(state, None).await;
        Ok(state)
    }

    pub async fn set_volume(&self, volume: f32) -> PlaybackState {
        self.mutate(|c| Some(c.set_volume(volume))).await
    }

    pub async fn set_noise_color(&self, color: NoiseColor) -> PlaybackState {
        self.mutate(|c| Some(c.set_noise_color(color))).await
    }

    pub async fn toggle_noise_color(&self) -> PlaybackState {
        self.mutate(|c| Some(c.toggle_noise_color())).await
    }

    pub async fn set_timer_minutes(&self, minutes: u32) -> PlaybackState {
        self.mutate(|c| Some(c.set_timer_minutes(minutes))).await
    }

    pub async fn handle_key(&self, key: Key, context: KeyContext) -> Result<PlaybackState> {
        let (state, readout) = {
            let mut controller = self.controller.lock().await;
            let readout = controller.handle_key(key, context)?;
            (controller.state(), readout)
        };
        self.after_change(state, readout).await;
        Ok(state)
    }

    pub async fn begin_drag(&self, x: f32, y: f32) {
        self.controller.lock().await.begin_drag(x, y);
    }

    pub async fn drag_to(&self, x: f32, y: f32) -> PlaybackState {
        self.mutate(|c| c.drag_to(x, y)).await
    }

    pub async fn end_drag(&self) {
        self.controller.lock().await.end_drag();
    }

    /// Feeds status notifications from the output into the controller until
    /// the sender side goes away.
    pub fn listen_for_status(&self, mut rx: UnboundedReceiver<OutputStatus>) -> JoinHandle<()> {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            while let Some(status) = rx.recv().await {
                controller.lock().await.on_output_status(status);
            }
        })
    }

    pub async fn shutdown(&self) {
        self.cancel_tasks().await;
        let state = {
            let mut controller = self.controller.lock().await;
            controller.shutdown();
            controller.state()
        };
        self.events.emit(PlayerEvent::StateChanged { state });
    }

    async fn mutate<F>(&self, f: F) -> PlaybackState
    where
        F: FnOnce(&mut PlayerController) -> Option<Readout> + Send,
    {
        let (state, readout) = {
            let mut controller = self.controller.lock().await;
            let readout = f(&mut *controller);
            (controller.state(), readout)
        };
        self.after_change(state, readout).await;
        state
    }

    async fn after_change(&self, state: PlaybackState, readout: Option<Readout>) {
        if state.is_playing {
            self.spawn_tasks().await;
        } else {
            self.cancel_tasks().await;
        }
        if let Some(readout) = readout {
            self.events.emit(PlayerEvent::readout(readout));
        }
        self.events.emit(PlayerEvent::StateChanged { state });
    }

    async fn spawn_tasks(&self) {
        {
            let mut ticker = self.ticker.lock().await;
            if ticker.as_ref().map_or(true, |handle| handle.is_finished()) {
                *ticker = Some(self.spawn_ticker());
            }
        }
        let mut monitor = self.monitor.lock().await;
        if monitor.as_ref().map_or(true, |handle| handle.is_finished()) {
            *monitor = Some(self.spawn_monitor());
        }
    }

    async fn cancel_tasks(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.monitor.lock().await.take() {
            handle.abort();
        }
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let controller = self.controller.clone();
        let events = self.events.clone();
        let period = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            // Late ticks are delivered back to back so the countdown catches up.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;

                let (outcome, state) = {
                    let mut guard = controller.lock().await;
                    if !guard.is_playing() {
                        break;
                    }
                    let outcome = guard.tick();
                    (outcome, guard.state())
                };

                match outcome {
                    TickOutcome::Idle => continue,
                    TickOutcome::Expired => {
                        log_info!("[Timer] Countdown finished");
                        events.emit(PlayerEvent::StateChanged { state });
                        break;
                    }
                    TickOutcome::Counting { .. } | TickOutcome::Fading { .. } => {
                        events.emit(PlayerEvent::StateChanged { state });
                    }
                }
            }
        })
    }

    fn spawn_monitor(&self) -> JoinHandle<()> {
        let controller = self.controller.clone();
        let period = self.health_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let mut guard = controller.lock().await;
                match guard.check_health() {
                    None => break,
                    Some(OutputStatus::Running) => {}
                    Some(status) => log_warn!("[Monitor] Output was {:?}", status),
                }
            }
        })
    }
}
