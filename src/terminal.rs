use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute, queue,
    style::Print,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use log::warn;
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time,
};

use crate::input::{Key, KeyContext};
use crate::player::{PlaybackState, PlayerEvent, PlayerService};
use crate::timer::{format_time, TimerStatus};

/// Terminal cells are mapped to pixels so drags feel like the pointer version.
pub const PX_PER_COLUMN: f32 = 10.0;
pub const PX_PER_ROW: f32 = 20.0;

const READOUT_DISPLAY: Duration = Duration::from_millis(1500);
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL: Duration = Duration::from_millis(100);
const VOLUME_BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminalAction {
    Key(Key),
    ToggleNoiseColor,
    DragStart(f32, f32),
    DragMove(f32, f32),
    DragEnd,
    Quit,
}

pub fn map_event(event: &Event) -> Option<TerminalAction> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => map_key_event(key),
        Event::Mouse(mouse) => {
            let x = mouse.column as f32 * PX_PER_COLUMN;
            let y = mouse.row as f32 * PX_PER_ROW;
            match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => Some(TerminalAction::DragStart(x, y)),
                MouseEventKind::Drag(MouseButton::Left) => Some(TerminalAction::DragMove(x, y)),
                MouseEventKind::Up(MouseButton::Left) => Some(TerminalAction::DragEnd),
                _ => None,
            }
        }
        _ => None,
    }
}

fn map_key_event(key: &KeyEvent) -> Option<TerminalAction> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(TerminalAction::Quit)
        }
        KeyCode::Esc | KeyCode::Char('q') => Some(TerminalAction::Quit),
        KeyCode::Char(' ') => Some(TerminalAction::Key(Key::Space)),
        KeyCode::Up => Some(TerminalAction::Key(Key::ArrowUp)),
        KeyCode::Down => Some(TerminalAction::Key(Key::ArrowDown)),
        KeyCode::Left => Some(TerminalAction::Key(Key::ArrowLeft)),
        KeyCode::Right => Some(TerminalAction::Key(Key::ArrowRight)),
        KeyCode::Char('n') => Some(TerminalAction::ToggleNoiseColor),
        _ => None,
    }
}

/// What is on screen: the last known state plus a short-lived readout.
struct Screen {
    state: PlaybackState,
    readout: Option<(String, Instant)>,
}

impl Screen {
    fn new(state: PlaybackState) -> Self {
        Self {
            state,
            readout: None,
        }
    }

    fn apply(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::StateChanged { state } => self.state = state,
            PlayerEvent::Readout { text, .. } => self.readout = Some((text, Instant::now())),
        }
    }

    fn flash(&mut self, text: impl Into<String>) {
        self.readout = Some((text.into(), Instant::now()));
    }

    fn lines(&self, now: Instant) -> Vec<String> {
        let readout = self
            .readout
            .as_ref()
            .filter(|(_, shown_at)| now.duration_since(*shown_at) < READOUT_DISPLAY)
            .map(|(text, _)| text.clone())
            .unwrap_or_default();
        render_lines(&self.state, &readout)
    }
}

fn render_lines(state: &PlaybackState, readout: &str) -> Vec<String> {
    let play = if state.is_playing { "> Playing" } else { "|| Paused" };
    vec![
        "noisenow".to_string(),
        String::new(),
        format!("  {}   {}", play, state.noise_color.label()),
        format!("  Volume  {}", volume_bar(state.volume)),
        format!("  Timer   {}", timer_text(state)),
        String::new(),
        format!("  {readout}"),
        String::new(),
        "  space play/pause   up/down volume   left/right timer   n colour   drag with mouse   q quit"
            .to_string(),
    ]
}

fn volume_bar(volume: f32) -> String {
    let filled = (volume.clamp(0.0, 1.0) * VOLUME_BAR_WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(VOLUME_BAR_WIDTH - filled),
        (volume * 100.0).round() as u32
    )
}

fn timer_text(state: &PlaybackState) -> String {
    match state.timer_status {
        TimerStatus::Off => "Off".to_string(),
        TimerStatus::Armed => format!("{} (paused)", format_time(state.seconds_remaining)),
        TimerStatus::Running => format_time(state.seconds_remaining),
    }
}

/// Raw mode, alternate screen and mouse capture, undone on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture, Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn draw(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for (row, line) in lines.iter().enumerate() {
        queue!(
            out,
            MoveTo(0, row as u16),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
    }
    out.flush()
}

/// Reads terminal events on a plain thread; crossterm's reader blocks.
fn spawn_input_reader(tx: UnboundedSender<Event>, stop: Arc<AtomicBool>) {
    thread::Builder::new()
        .name("terminal-input".into())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match event::poll(INPUT_POLL) {
                    Ok(true) => match event::read() {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!("Terminal read failed: {}", err);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(err) => {
                        warn!("Terminal poll failed: {}", err);
                        break;
                    }
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|err| warn!("Failed to spawn terminal reader: {}", err));
}

/// Runs the interactive player until the user quits.
pub async fn run(service: PlayerService, mut events: UnboundedReceiver<PlayerEvent>) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All))?;

    let stop = Arc::new(AtomicBool::new(false));
    let (input_tx, mut input_rx) = unbounded_channel();
    spawn_input_reader(input_tx, stop.clone());

    let mut screen = Screen::new(service.get_state().await);
    let mut redraw = time::interval(REDRAW_INTERVAL);

    loop {
        tokio::select! {
            input = input_rx.recv() => {
                let Some(input) = input else { break };
                let Some(action) = map_event(&input) else { continue };
                if action == TerminalAction::Quit {
                    break;
                }
                if let Err(err) = perform(&service, action).await {
                    warn!("Playback control failed: {:#}", err);
                    screen.flash("Audio unavailable");
                }
            }
            Some(event) = events.recv() => screen.apply(event),
            _ = redraw.tick() => {}
        }
        draw(&mut stdout, &screen.lines(Instant::now()))?;
    }

    stop.store(true, Ordering::Relaxed);
    Ok(())
}

async fn perform(service: &PlayerService, action: TerminalAction) -> Result<()> {
    match action {
        TerminalAction::Key(key) => {
            service.handle_key(key, KeyContext::default()).await?;
        }
        TerminalAction::ToggleNoiseColor => {
            service.toggle_noise_color().await;
        }
        TerminalAction::DragStart(x, y) => service.begin_drag(x, y).await,
        TerminalAction::DragMove(x, y) => {
            service.drag_to(x, y).await;
        }
        TerminalAction::DragEnd => service.end_drag().await,
        TerminalAction::Quit => {}
    }
    Ok(())
}
