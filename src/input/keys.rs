use serde::Deserialize;
use std::str::FromStr;

use crate::constants::{KEY_TIMER_STEP, KEY_VOLUME_STEP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl FromStr for Key {
    type Err = String;

    /// Accepts DOM `KeyboardEvent.key` names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            " " | "Spacebar" | "Space" => Ok(Key::Space),
            "ArrowUp" => Ok(Key::ArrowUp),
            "ArrowDown" => Ok(Key::ArrowDown),
            "ArrowLeft" => Ok(Key::ArrowLeft),
            "ArrowRight" => Ok(Key::ArrowRight),
            other => Err(format!("unmapped key '{other}'")),
        }
    }
}

/// Where keyboard focus is when a key arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyContext {
    pub modal_open: bool,
    pub text_input_focused: bool,
}

impl KeyContext {
    pub fn captures_keys(&self) -> bool {
        self.modal_open || self.text_input_focused
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    TogglePlay,
    AdjustVolume(f32),
    AdjustTimer(i32),
    ToggleNoiseColor,
}

pub fn map_key(key: Key, context: KeyContext) -> Option<ControlAction> {
    if context.captures_keys() {
        return None;
    }

    let action = match key {
        Key::Space => ControlAction::TogglePlay,
        Key::ArrowUp => ControlAction::AdjustVolume(KEY_VOLUME_STEP),
        Key::ArrowDown => ControlAction::AdjustVolume(-KEY_VOLUME_STEP),
        Key::ArrowRight => ControlAction::AdjustTimer(KEY_TIMER_STEP),
        Key::ArrowLeft => ControlAction::AdjustTimer(-KEY_TIMER_STEP),
    };
    Some(action)
}
