use crate::constants::{
    DRAG_PX_PER_MINUTE, DRAG_VOLUME_PER_PX, MAX_TIMER_MINUTES, TIMER_SNAP_MINUTES,
};

use super::Readout;

/// One press-drag-release interaction over the player surface.
///
/// Coordinates are screen pixels with y growing downward. Values are always
/// computed from the state captured at `begin`, never accumulated per move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGesture {
    origin_x: f32,
    origin_y: f32,
    start_volume: f32,
    start_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragUpdate {
    pub volume: f32,
    pub timer_minutes: u32,
    pub readout: Readout,
}

impl DragGesture {
    pub fn begin(x: f32, y: f32, volume: f32, timer_minutes: u32) -> Self {
        Self {
            origin_x: x,
            origin_y: y,
            start_volume: volume,
            start_minutes: timer_minutes,
        }
    }

    pub fn update(&self, x: f32, y: f32) -> DragUpdate {
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let volume = dragged_volume(self.start_volume, dy);
        let timer_minutes = dragged_minutes(self.start_minutes, dx);

        // Both values move; the dominant axis decides what is shown.
        let readout = if dy.abs() > dx.abs() {
            Readout::Volume { volume }
        } else {
            Readout::Timer {
                minutes: timer_minutes,
            }
        };

        DragUpdate {
            volume,
            timer_minutes,
            readout,
        }
    }
}

/// Dragging up (negative `dy`) turns the volume up.
pub fn dragged_volume(start: f32, dy: f32) -> f32 {
    (start - dy * DRAG_VOLUME_PER_PX).clamp(0.0, 1.0)
}

/// Ten pixels per minute, in whole minutes. Halves round up, so a drag of
/// -45 px takes 4 minutes off, not 5.
pub fn dragged_minutes(start: u32, dx: f32) -> u32 {
    let delta = (dx as f64 / DRAG_PX_PER_MINUTE as f64 + 0.5).floor() as i64;
    let minutes = snap_to_five(start as i64 + delta);
    minutes.clamp(0, MAX_TIMER_MINUTES as i64) as u32
}

/// Pulls a value within a minute of a multiple of five onto it.
fn snap_to_five(minutes: i64) -> i64 {
    let steps = (minutes as f64 / TIMER_SNAP_MINUTES as f64).round() as i64;
    let nearest = steps * TIMER_SNAP_MINUTES;
    if (minutes - nearest).abs() < 1 {
        nearest
    } else {
        minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dragging_up_raises_volume_to_the_cap() {
        let drag = DragGesture::begin(200.0, 300.0, 0.5, 0);
        let update = drag.update(200.0, 200.0);
        assert_eq!(update.volume, 1.0);
        assert_eq!(update.timer_minutes, 0);
        assert_eq!(update.readout, Readout::Volume { volume: 1.0 });
    }

    #[test]
    fn dragging_down_lowers_volume_to_zero() {
        let drag = DragGesture::begin(0.0, 0.0, 0.2, 0);
        assert!((drag.update(0.0, 20.0).volume - 0.1).abs() < 1e-6);
        assert_eq!(drag.update(0.0, 500.0).volume, 0.0);
    }

    #[test]
    fn horizontal_drag_sets_timer_with_snapping() {
        let drag = DragGesture::begin(0.0, 0.0, 0.5, 0);
        let update = drag.update(47.0, 0.0);
        assert_eq!(update.timer_minutes, 5);
        assert_eq!(update.readout, Readout::Timer { minutes: 5 });
        assert_eq!(update.volume, 0.5);
    }

    #[test]
    fn minutes_move_by_rounded_steps() {
        assert_eq!(dragged_minutes(0, 42.0), 4);
        assert_eq!(dragged_minutes(0, 58.0), 6);
        assert_eq!(dragged_minutes(0, 142.0), 14);
        assert_eq!(dragged_minutes(0, 158.0), 16);
        assert_eq!(dragged_minutes(0, 70.0), 7);
        assert_eq!(dragged_minutes(10, 31.0), 13);
        assert_eq!(dragged_minutes(10, -105.0), 0);
    }

    #[test]
    fn half_minutes_round_up() {
        assert_eq!(dragged_minutes(0, 45.0), 5);
        assert_eq!(dragged_minutes(10, -95.0), 1);
        assert_eq!(dragged_minutes(10, -45.0), 6);
    }

    #[test]
    fn minutes_are_clamped() {
        assert_eq!(dragged_minutes(0, -300.0), 0);
        assert_eq!(dragged_minutes(100, 10_000.0), MAX_TIMER_MINUTES);
    }

    #[test]
    fn dominant_axis_picks_readout_but_both_values_move() {
        let drag = DragGesture::begin(0.0, 0.0, 0.5, 0);
        let update = drag.update(30.0, -60.0);
        assert!((update.volume - 0.8).abs() < 1e-6);
        assert_eq!(update.timer_minutes, 3);
        assert!(matches!(update.readout, Readout::Volume { .. }));

        let tie = drag.update(45.0, -45.0);
        assert!(matches!(tie.readout, Readout::Timer { minutes: 5 }));
    }
}
