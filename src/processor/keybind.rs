use std::time::Instant;

use tracing::{debug, warn};

use crate::config::MAX_KEYBIND_BEHAVIORS;
use crate::event::Axis;
use crate::keymap::{BehaviorEvent, BehaviorId, BehaviorRegistry, Keymap, KEYBIND_POSITION};

/// 2D motion accumulator for gesture-to-keybind dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeybindState {
    x_accum: i32,
    y_accum: i32,
}

impl KeybindState {
    pub fn clear(&mut self) {
        self.x_accum = 0;
        self.y_accum = 0;
    }

    pub fn accumulate(&mut self, axis: Axis, value: i32) {
        match axis {
            Axis::X => self.x_accum = self.x_accum.saturating_add(value),
            Axis::Y => self.y_accum = self.y_accum.saturating_add(value),
        }
    }

    /// Squared-distance compare; no square root on the hot path.
    pub fn over_threshold(&self, tick: u16) -> bool {
        let x = i64::from(self.x_accum);
        let y = i64::from(self.y_accum);
        let tick = i64::from(tick);
        x * x + y * y >= tick * tick
    }

    pub fn direction_index(&self, count: u8, degree_offset: u16) -> usize {
        direction_index(self.x_accum, self.y_accum, count, degree_offset)
    }

    #[cfg(test)]
    pub(crate) fn accums(&self) -> (i32, i32) {
        (self.x_accum, self.y_accum)
    }
}

/// Map an accumulated motion vector onto one of `count` equal circle
/// segments. Segments are half-centered: the first spans ±segment/2
/// around `degree_offset`, so with four directions and no offset,
/// anything within 45° of pure-right motion is direction 0.
///
/// The atan2 here is the one floating-point call on the event path and
/// runs at most once per fire.
pub fn direction_index(x: i32, y: i32, count: u8, degree_offset: u16) -> usize {
    let count = usize::from(count).clamp(1, MAX_KEYBIND_BEHAVIORS);
    if count == 1 {
        return 0;
    }
    let mut theta = f64::from(y).atan2(f64::from(x)).to_degrees();
    if theta < 0.0 {
        theta += 360.0;
    }
    let theta = (theta - f64::from(degree_offset)).rem_euclid(360.0);
    let segment = 360.0 / count as f64;
    (((theta + segment / 2.0) / segment).floor() as usize) % count
}

/// Invoke the behavior bound to a direction: press, then release, back
/// to back at the highest active layer. Failures are logged and the
/// gesture is treated as spent either way.
pub fn fire_direction(
    instance: &str,
    behaviors: &[Option<BehaviorId>],
    idx: usize,
    keymap: &dyn Keymap,
    registry: &mut dyn BehaviorRegistry,
    now: Instant,
) {
    let Some(behavior) = behaviors.get(idx).copied().flatten() else {
        debug!("{instance}: keybind direction {idx} has no behavior bound");
        return;
    };
    let event = BehaviorEvent {
        layer: keymap.highest_active_layer(),
        position: KEYBIND_POSITION,
        timestamp: now,
    };
    if let Err(e) = registry.invoke(behavior, event, true) {
        warn!("{instance}: keybind direction {idx} press failed: {e}");
    }
    if let Err(e) = registry.invoke(behavior, event, false) {
        warn!("{instance}: keybind direction {idx} release failed: {e}");
    }
}
