use tauri::State;

use crate::audio::NoiseColor;
use crate::input::{Key, KeyContext};
use crate::player::{PlaybackState, PlayerService};
use crate::AppState;

fn player_from_state(state: &State<'_, AppState>) -> PlayerService {
    state.player.clone()
}

#[tauri::command]
pub async fn get_player_state(state: State<'_, AppState>) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    Ok(player.get_state().await)
}

#[tauri::command]
pub async fn toggle_play(state: State<'_, AppState>) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    player.toggle_play().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_volume(state: State<'_, AppState>, volume: f32) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    Ok(player.set_volume(volume).await)
}

#[tauri::command]
pub async fn set_noise_color(
    state: State<'_, AppState>,
    color: String,
) -> Result<PlaybackState, String> {
    let color: NoiseColor = color.parse()?;
    let player = player_from_state(&state);
    Ok(player.set_noise_color(color).await)
}

#[tauri::command]
pub async fn toggle_noise_color(state: State<'_, AppState>) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    Ok(player.toggle_noise_color().await)
}

#[tauri::command]
pub async fn set_timer_minutes(
    state: State<'_, AppState>,
    minutes: u32,
) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    Ok(player.set_timer_minutes(minutes).await)
}

/// Unmapped keys are not an error; the state is returned unchanged.
#[tauri::command]
pub async fn key_pressed(
    state: State<'_, AppState>,
    key: String,
    context: Option<KeyContext>,
) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    match key.parse::<Key>() {
        Ok(key) => player
            .handle_key(key, context.unwrap_or_default())
            .await
            .map_err(|e| e.to_string()),
        Err(_) => Ok(player.get_state().await),
    }
}

#[tauri::command]
pub async fn drag_start(state: State<'_, AppState>, x: f32, y: f32) -> Result<(), String> {
    let player = player_from_state(&state);
    player.begin_drag(x, y).await;
    Ok(())
}

#[tauri::command]
pub async fn drag_move(
    state: State<'_, AppState>,
    x: f32,
    y: f32,
) -> Result<PlaybackState, String> {
    let player = player_from_state(&state);
    Ok(player.drag_to(x, y).await)
}

#[tauri::command]
pub async fn drag_end(state: State<'_, AppState>) -> Result<(), String> {
    let player = player_from_state(&state);
    player.end_drag().await;
    Ok(())
}
