use log::{error, info, warn};

use crate::audio::{output_gain, AudioError, AudioOutput, AudioSession, NoiseColor, OutputStatus};
use crate::constants::{FADE_IN_SECS, FADE_OUT_SECS, MAX_TIMER_MINUTES, VOLUME_SMOOTHING_TAU};
use crate::input::{map_key, ControlAction, DragGesture, Key, KeyContext, Readout};
use crate::settings::{Preferences, PreferencesStore};
use crate::timer::{CountdownTimer, TickOutcome};

use super::events::PlaybackState;

/// Owns the user-facing parameters and drives the audio session from them.
///
/// All methods are synchronous and cheap; the async service wraps this in a
/// mutex and supplies the clocks.
pub struct PlayerController {
    is_playing: bool,
    volume: f32,
    noise_color: NoiseColor,
    timer: CountdownTimer,
    session: AudioSession,
    store: Option<PreferencesStore>,
    drag: Option<DragGesture>,
}

impl PlayerController {
    pub fn new(
        preferences: Preferences,
        output: Box<dyn AudioOutput>,
        store: Option<PreferencesStore>,
    ) -> Self {
        Self {
            is_playing: false,
            volume: preferences.volume.clamp(0.0, 1.0),
            noise_color: preferences.noise_color,
            timer: CountdownTimer::new(preferences.timer_minutes),
            session: AudioSession::new(output),
            store,
            drag: None,
        }
    }

    /// Loads the saved preferences and keeps writing changes back to `store`.
    pub fn with_store(store: PreferencesStore, output: Box<dyn AudioOutput>) -> Self {
        let preferences = store.preferences();
        Self::new(preferences, output, Some(store))
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing,
            volume: self.volume,
            noise_color: self.noise_color,
            timer_minutes: self.timer.duration_minutes(),
            seconds_remaining: self.timer.seconds_remaining(),
            timer_status: self.timer.status(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn session(&self) -> &AudioSession {
        &self.session
    }

    /// Gain the output should settle at right now.
    pub fn target_gain(&self) -> f32 {
        output_gain(self.volume) * self.timer.fade_factor()
    }

    pub fn toggle_play(&mut self) -> Result<bool, AudioError> {
        if !self.session.is_open() {
            info!("[Audio] Initializing audio output");
            self.session.open(self.noise_color)?;
        }

        if self.session.status() == OutputStatus::Suspended {
            info!("[Audio] Resuming suspended output");
            if let Err(err) = self.session.resume() {
                warn!("[Audio] Failed to resume output: {}", err);
            }
        }

        self.is_playing = !self.is_playing;
        info!(
            "[Audio] {} playback",
            if self.is_playing { "Starting" } else { "Stopping" }
        );

        if self.is_playing {
            self.timer.start();
            let target = self.target_gain();
            self.session
                .with_gain(|gain, now| gain.ramp_linear(now, target, FADE_IN_SECS));
        } else {
            self.timer.pause();
            self.fade_out();
        }
        Ok(self.is_playing)
    }

    fn fade_out(&mut self) {
        self.session
            .with_gain(|gain, now| gain.ramp_linear(now, 0.0, FADE_OUT_SECS));
    }

    fn retarget_gain(&self) {
        if !self.is_playing {
            return;
        }
        let target = self.target_gain();
        self.session
            .with_gain(|gain, now| gain.approach(now, target, VOLUME_SMOOTHING_TAU));
    }

    pub fn set_volume(&mut self, volume: f32) -> Readout {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
        self.retarget_gain();
        let value = self.volume;
        self.persist(|store| store.set_volume(value));
        Readout::Volume {
            volume: self.volume,
        }
    }

    pub fn adjust_volume(&mut self, delta: f32) -> Readout {
        self.set_volume(self.volume + delta)
    }

    pub fn set_noise_color(&mut self, color: NoiseColor) -> Readout {
        if color != self.noise_color {
            self.noise_color = color;
            if self.session.is_open() {
                if let Err(err) = self.session.start_source(color) {
                    error!("[Audio] Failed to switch to {} noise: {}", color, err);
                }
            }
            self.persist(|store| store.set_noise_color(color));
        }
        Readout::Noise { color }
    }

    pub fn toggle_noise_color(&mut self) -> Readout {
        self.set_noise_color(self.noise_color.toggled())
    }

    pub fn set_timer_minutes(&mut self, minutes: u32) -> Readout {
        self.timer.set_duration(minutes.min(MAX_TIMER_MINUTES));
        if self.is_playing {
            self.timer.start();
            self.retarget_gain();
        }
        let minutes = self.timer.duration_minutes();
        self.persist(|store| store.set_timer_minutes(minutes));
        Readout::Timer { minutes }
    }

    pub fn adjust_timer(&mut self, delta: i32) -> Readout {
        let minutes = (self.timer.duration_minutes() as i64 + delta as i64)
            .clamp(0, MAX_TIMER_MINUTES as i64) as u32;
        self.set_timer_minutes(minutes)
    }

    /// One second of countdown. Fades during the final seconds and stops
    /// playback when the timer runs out.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.timer.tick();
        match outcome {
            TickOutcome::Fading { .. } => self.retarget_gain(),
            TickOutcome::Expired => {
                info!("[Timer] Expired, stopping playback");
                self.is_playing = false;
                self.fade_out();
                self.persist(|store| store.set_timer_minutes(0));
            }
            TickOutcome::Idle | TickOutcome::Counting { .. } => {}
        }
        outcome
    }

    /// Polled fallback for status notifications.
    pub fn check_health(&mut self) -> Option<OutputStatus> {
        if !self.is_playing {
            return None;
        }
        let status = self.session.status();
        self.recover(status);
        Some(status)
    }

    /// Reacts to a pushed status change. The notification may be stale by the
    /// time it is handled, so the session is asked again before acting.
    pub fn on_output_status(&mut self, status: OutputStatus) {
        if self.is_playing && self.session.status() == status {
            self.recover(status);
        }
    }

    fn recover(&mut self, status: OutputStatus) {
        match status {
            OutputStatus::Running => {}
            OutputStatus::Suspended => {
                info!("[Monitor] Output suspended - attempting resume");
                if let Err(err) = self.session.resume() {
                    error!("[Monitor] Failed to resume: {}", err);
                }
            }
            OutputStatus::SourceLost => {
                info!("[Monitor] Looped source lost - recreating");
                if let Err(err) = self.session.start_source(self.noise_color) {
                    error!("[Monitor] Failed to recreate source: {}", err);
                }
            }
            OutputStatus::Closed => {
                warn!("[Monitor] Output closed unexpectedly - reopening");
                self.session.teardown();
                match self.session.open(self.noise_color) {
                    Ok(()) => {
                        let target = self.target_gain();
                        self.session
                            .with_gain(|gain, now| gain.ramp_linear(now, target, FADE_IN_SECS));
                    }
                    Err(err) => error!("[Monitor] Failed to reopen output: {}", err),
                }
            }
        }
    }

    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.drag = Some(DragGesture::begin(
            x,
            y,
            self.volume,
            self.timer.duration_minutes(),
        ));
    }

    pub fn drag_to(&mut self, x: f32, y: f32) -> Option<Readout> {
        let update = self.drag?.update(x, y);
        self.set_volume(update.volume);
        if update.timer_minutes != self.timer.duration_minutes() {
            self.set_timer_minutes(update.timer_minutes);
        }
        Some(update.readout)
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn apply(&mut self, action: ControlAction) -> Result<Option<Readout>, AudioError> {
        let readout = match action {
            ControlAction::TogglePlay => {
                self.toggle_play()?;
                None
            }
            ControlAction::AdjustVolume(delta) => Some(self.adjust_volume(delta)),
            ControlAction::AdjustTimer(delta) => Some(self.adjust_timer(delta)),
            ControlAction::ToggleNoiseColor => Some(self.toggle_noise_color()),
        };
        Ok(readout)
    }

    pub fn handle_key(
        &mut self,
        key: Key,
        context: KeyContext,
    ) -> Result<Option<Readout>, AudioError> {
        match map_key(key, context) {
            Some(action) => self.apply(action),
            None => Ok(None),
        }
    }

    /// Stops everything and releases the output device.
    pub fn shutdown(&mut self) {
        self.is_playing = false;
        self.timer.pause();
        self.drag = None;
        self.session.teardown();
    }

    fn persist<F>(&self, write: F)
    where
        F: FnOnce(&PreferencesStore) -> anyhow::Result<()>,
    {
        if let Some(store) = &self.store {
            if let Err(err) = write(store) {
                warn!("Failed to save preferences: {:#}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::FakeOutput;
    use crate::timer::TimerStatus;
    use tempfile::tempdir;

    fn controller(preferences: Preferences) -> (PlayerController, FakeOutput) {
        let fake = FakeOutput::new();
        let controller = PlayerController::new(preferences, Box::new(fake.clone()), None);
        (controller, fake)
    }

    fn gain_now(controller: &PlayerController) -> f32 {
        controller.session().gain_at_now()
    }

    #[test]
    fn first_toggle_opens_output_and_fades_in() {
        let (mut player, fake) = controller(Preferences::default());
        assert!(!player.session().is_open());

        assert!(player.toggle_play().unwrap());
        assert_eq!(fake.state.lock().unwrap().opens, 1);
        assert_eq!(fake.state.lock().unwrap().played, vec![NoiseColor::White]);
        assert_eq!(gain_now(&player), 0.0);

        fake.render(0.5);
        assert!((gain_now(&player) - 0.075).abs() < 1e-4);
        fake.render(0.5);
        assert!((gain_now(&player) - 0.15).abs() < 1e-4);
    }

    #[test]
    fn stopping_fades_out_over_half_a_second() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();
        fake.render(2.0);

        assert!(!player.toggle_play().unwrap());
        fake.render(0.25);
        assert!((gain_now(&player) - 0.075).abs() < 1e-4);
        fake.render(0.25);
        assert_eq!(gain_now(&player), 0.0);
        assert_eq!(fake.state.lock().unwrap().opens, 1);
    }

    #[test]
    fn failed_open_leaves_player_stopped() {
        let (mut player, fake) = controller(Preferences::default());
        fake.state.lock().unwrap().fail_open = true;

        assert!(player.toggle_play().is_err());
        assert!(!player.is_playing());
        assert!(!player.session().is_open());
    }

    #[test]
    fn output_gain_tracks_volume_times_cap() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();

        for step in 0..=10 {
            let volume = step as f32 / 10.0;
            player.set_volume(volume);
            fake.render(2.0);
            assert!((gain_now(&player) - volume * 0.3).abs() < 1e-3);
            assert!((player.target_gain() - volume * 0.3).abs() < 1e-6);
        }
    }

    #[test]
    fn volume_changes_while_stopped_do_not_touch_gain() {
        let (mut player, _fake) = controller(Preferences::default());
        player.set_volume(0.9);
        assert_eq!(player.session().gain_target(), 0.0);
        assert_eq!(player.state().volume, 0.9);
    }

    #[test]
    fn toggling_color_twice_restores_state() {
        let (mut player, fake) = controller(Preferences {
            volume: 0.4,
            timer_minutes: 15,
            noise_color: NoiseColor::Brown,
        });
        player.toggle_play().unwrap();
        let before = player.state();

        assert_eq!(
            player.toggle_noise_color(),
            Readout::Noise {
                color: NoiseColor::White
            }
        );
        player.toggle_noise_color();

        assert_eq!(player.state(), before);
        assert_eq!(
            fake.state.lock().unwrap().played,
            vec![NoiseColor::Brown, NoiseColor::White, NoiseColor::Brown]
        );
    }

    #[test]
    fn timer_runs_out_and_stops_playback() {
        let (mut player, fake) = controller(Preferences {
            timer_minutes: 1,
            ..Default::default()
        });
        player.toggle_play().unwrap();
        assert_eq!(player.state().timer_status, TimerStatus::Running);

        let mut ticks = 0;
        loop {
            ticks += 1;
            fake.render(1.0);
            if player.tick() == TickOutcome::Expired {
                break;
            }
            assert!(player.is_playing());
        }

        assert_eq!(ticks, 60);
        let state = player.state();
        assert!(!state.is_playing);
        assert_eq!(state.timer_minutes, 0);
        assert_eq!(state.seconds_remaining, 0);
        assert_eq!(state.timer_status, TimerStatus::Off);

        fake.render(0.5);
        assert_eq!(gain_now(&player), 0.0);
    }

    #[test]
    fn final_seconds_scale_gain_down() {
        let (mut player, fake) = controller(Preferences {
            timer_minutes: 1,
            volume: 1.0,
            ..Default::default()
        });
        player.toggle_play().unwrap();
        for _ in 0..57 {
            fake.render(1.0);
            player.tick();
        }
        // Three seconds left.
        fake.render(1.0);
        assert_eq!(player.state().seconds_remaining, 3);
        assert!((player.target_gain() - 0.3 * 0.6).abs() < 1e-6);
        assert!((gain_now(&player) - 0.18).abs() < 1e-3);
    }

    #[test]
    fn changing_timer_while_running_keeps_playing() {
        let (mut player, _fake) = controller(Preferences {
            timer_minutes: 10,
            ..Default::default()
        });
        player.toggle_play().unwrap();
        player.tick();
        assert_eq!(player.set_timer_minutes(20), Readout::Timer { minutes: 20 });

        let state = player.state();
        assert!(state.is_playing);
        assert_eq!(state.seconds_remaining, 1200);
        assert_eq!(state.timer_status, TimerStatus::Running);
    }

    #[test]
    fn setting_timer_while_playing_starts_countdown() {
        let (mut player, _fake) = controller(Preferences::default());
        player.toggle_play().unwrap();
        assert_eq!(player.state().timer_status, TimerStatus::Off);

        player.adjust_timer(1);
        assert_eq!(player.state().timer_status, TimerStatus::Running);
        assert_eq!(player.state().seconds_remaining, 60);
    }

    #[test]
    fn keyboard_adjusts_and_clamps() {
        let (mut player, _fake) = controller(Preferences {
            volume: 0.995,
            timer_minutes: 120,
            ..Default::default()
        });
        let ctx = KeyContext::default();

        let readout = player.handle_key(Key::ArrowUp, ctx).unwrap();
        assert_eq!(readout, Some(Readout::Volume { volume: 1.0 }));
        let readout = player.handle_key(Key::ArrowRight, ctx).unwrap();
        assert_eq!(readout, Some(Readout::Timer { minutes: 120 }));
        player.handle_key(Key::ArrowLeft, ctx).unwrap();
        assert_eq!(player.state().timer_minutes, 119);

        player.handle_key(Key::Space, ctx).unwrap();
        assert!(player.is_playing());

        let modal = KeyContext {
            modal_open: true,
            ..Default::default()
        };
        assert_eq!(player.handle_key(Key::Space, modal).unwrap(), None);
        assert!(player.is_playing());
    }

    #[test]
    fn drag_updates_both_parameters() {
        let (mut player, _fake) = controller(Preferences::default());
        assert_eq!(player.drag_to(0.0, 0.0), None);

        player.begin_drag(100.0, 100.0);
        let readout = player.drag_to(100.0, 0.0);
        assert_eq!(readout, Some(Readout::Volume { volume: 1.0 }));

        let readout = player.drag_to(147.0, 100.0);
        assert_eq!(readout, Some(Readout::Timer { minutes: 5 }));
        let state = player.state();
        assert_eq!(state.volume, 0.5);
        assert_eq!(state.timer_minutes, 5);

        player.end_drag();
        assert!(!player.is_dragging());
    }

    #[test]
    fn health_check_resumes_suspended_output() {
        let (mut player, fake) = controller(Preferences::default());
        assert_eq!(player.check_health(), None);

        player.toggle_play().unwrap();
        fake.set_status(OutputStatus::Suspended);
        assert_eq!(player.check_health(), Some(OutputStatus::Suspended));
        assert_eq!(fake.state.lock().unwrap().resumes, 1);
        assert_eq!(player.session().status(), OutputStatus::Running);
    }

    #[test]
    fn failed_resume_is_not_fatal() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();
        {
            let mut state = fake.state.lock().unwrap();
            state.fail_resume = true;
            state.status = Some(OutputStatus::Suspended);
        }
        player.check_health();
        player.check_health();
        assert!(player.is_playing());
        assert_eq!(fake.state.lock().unwrap().resumes, 2);
    }

    #[test]
    fn lost_source_is_recreated() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();
        fake.set_status(OutputStatus::SourceLost);
        player.on_output_status(OutputStatus::SourceLost);
        assert_eq!(
            fake.state.lock().unwrap().played,
            vec![NoiseColor::White, NoiseColor::White]
        );
    }

    #[test]
    fn failed_colour_swap_is_recreated_by_the_health_check() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();

        fake.state.lock().unwrap().fail_play = true;
        player.set_noise_color(NoiseColor::Brown);
        assert_eq!(player.state().noise_color, NoiseColor::Brown);
        assert_eq!(player.session().color(), Some(NoiseColor::White));
        assert_eq!(player.session().status(), OutputStatus::SourceLost);

        fake.state.lock().unwrap().fail_play = false;
        assert_eq!(player.check_health(), Some(OutputStatus::SourceLost));
        assert_eq!(player.session().color(), Some(NoiseColor::Brown));
        assert_eq!(
            fake.state.lock().unwrap().played,
            vec![NoiseColor::White, NoiseColor::Brown]
        );
    }

    #[test]
    fn playback_starts_even_if_the_first_source_fails() {
        let (mut player, fake) = controller(Preferences::default());
        fake.state.lock().unwrap().fail_play = true;

        assert!(player.toggle_play().unwrap());
        fake.state.lock().unwrap().fail_play = false;
        player.on_output_status(OutputStatus::SourceLost);
        assert_eq!(fake.state.lock().unwrap().played, vec![NoiseColor::White]);
    }

    #[test]
    fn stale_notifications_are_ignored() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();
        player.on_output_status(OutputStatus::Closed);
        assert_eq!(fake.state.lock().unwrap().opens, 1);
        assert_eq!(fake.state.lock().unwrap().closes, 0);
    }

    #[test]
    fn closed_output_is_reopened_and_faded_back_in() {
        let (mut player, fake) = controller(Preferences::default());
        player.toggle_play().unwrap();
        fake.render(2.0);

        fake.set_status(OutputStatus::Closed);
        player.check_health();
        assert_eq!(fake.state.lock().unwrap().opens, 2);
        assert!(player.session().is_open());
        assert!((player.session().gain_target() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn changes_are_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let store = PreferencesStore::new(path.clone()).unwrap();
        let mut player = PlayerController::with_store(store, Box::new(FakeOutput::new()));

        player.set_volume(0.7);
        player.set_timer_minutes(30);
        player.set_noise_color(NoiseColor::Brown);

        let reloaded = PreferencesStore::new(path).unwrap().preferences();
        assert_eq!(reloaded.volume, 0.7);
        assert_eq!(reloaded.timer_minutes, 30);
        assert_eq!(reloaded.noise_color, NoiseColor::Brown);
    }
}
