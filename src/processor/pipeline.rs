use std::time::Instant;

use evdev::InputEvent;

use crate::event::{classify, scroll_code, Axis};
use crate::keymap::Keymap;

use super::keybind::fire_direction;
use super::scale::scale_value;
use super::{Host, Processor};

/// Outcome of running one event through a processor.
#[derive(Debug)]
pub enum ProcessResult {
    /// Forward this (possibly rewritten) event downstream.
    Emit(InputEvent),
    /// The event was consumed; nothing goes downstream.
    Consumed,
}

impl ProcessResult {
    pub fn is_consumed(&self) -> bool {
        matches!(self, ProcessResult::Consumed)
    }
}

impl Processor {
    /// Run one event through the stage sequence. Stages execute in a
    /// fixed order with early exits: unrecognized events pass through
    /// untouched, keybind dispatch consumes outright.
    pub fn handle_event(
        &mut self,
        event: InputEvent,
        now: Instant,
        host: &mut Host<'_>,
    ) -> ProcessResult {
        if event.event_type() != self.config.event_type {
            return ProcessResult::Emit(event);
        }
        let Some(axis) = classify(event.code(), &self.config.x_codes, &self.config.y_codes) else {
            return ProcessResult::Emit(event);
        };
        if !self.layer_gate_open(host.keymap) {
            return ProcessResult::Emit(event);
        }

        let mut code = event.code();
        let mut value = event.value();

        if self.keybind_dispatch(axis, value, now, host) {
            return ProcessResult::Consumed;
        }

        // Code remap: scroll conversion wins over axis swap.
        if self.state.current.xy_to_scroll {
            code = scroll_code(axis);
        } else if self.state.current.xy_swap {
            code = self.swapped_code(axis, code);
        }

        self.temp_layer_tickle(value, now, host.scheduler);

        if self.state.current.rotation_deg != 0 {
            value = self.state.rotation.apply(axis, value);
        }

        let invert = match axis {
            Axis::X => self.state.current.x_invert,
            Axis::Y => self.state.current.y_invert,
        };
        if invert {
            value = -value;
        }

        let (snap_mode, snap_threshold, snap_timeout) = (
            self.state.current.axis_snap_mode,
            self.state.current.axis_snap_threshold,
            self.state.current.axis_snap_timeout_ms,
        );
        value = self
            .state
            .snap
            .apply(snap_mode, snap_threshold, snap_timeout, axis, value, now);

        let (mul, div) = (self.state.current.scale_mul, self.state.current.scale_div);
        let remainder = &mut self.state.scale_remainders[axis as usize];
        value = scale_value(value, mul, div, remainder);

        self.temp_layer_touch_deactivation(host.scheduler);

        ProcessResult::Emit(InputEvent::new(event.event_type(), code, value))
    }

    /// Layer gate: a zero mask is always open; otherwise at least one
    /// selected layer must be active. Bits past the keymap's layer
    /// count are skipped.
    fn layer_gate_open(&self, keymap: &dyn Keymap) -> bool {
        let mask = self.state.current.active_layers;
        if mask == 0 {
            return true;
        }
        let layers = keymap.layer_count().min(32);
        (0..layers).any(|i| mask & (1 << i) != 0 && keymap.layer_active(i))
    }

    fn swapped_code(&self, axis: Axis, code: u16) -> u16 {
        let other = match axis {
            Axis::X => self.config.y_codes.first(),
            Axis::Y => self.config.x_codes.first(),
        };
        other.copied().unwrap_or(code)
    }

    /// Keybind dispatch: while enabled every classified event is
    /// consumed, fired or not, so downstream never sees raw motion.
    fn keybind_dispatch(
        &mut self,
        axis: Axis,
        value: i32,
        now: Instant,
        host: &mut Host<'_>,
    ) -> bool {
        let t = &self.state.current;
        if !t.keybind_enabled || t.keybind_count == 0 || self.behaviors.is_empty() {
            return false;
        }
        let count = t
            .keybind_count
            .min(self.behaviors.len() as u8)
            .min(crate::config::MAX_KEYBIND_BEHAVIORS as u8);
        let tick = t.keybind_tick;
        let degree_offset = t.keybind_degree_offset;

        self.state.keybind.accumulate(axis, value);
        if self.state.keybind.over_threshold(tick) {
            let idx = self.state.keybind.direction_index(count, degree_offset);
            fire_direction(
                &self.config.name,
                &self.behaviors,
                idx,
                host.keymap,
                host.behaviors,
                now,
            );
            self.state.keybind.clear();
        }
        true
    }
}
