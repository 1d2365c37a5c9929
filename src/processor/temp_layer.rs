use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::keymap::{
    binding_is, Keymap, LayerBinding, HID_USAGE_PAGE_KEYBOARD, KEY_PRESS_NAME, TRANSPARENT_NAME,
};
use crate::scheduler::{Scheduler, WorkKind};

use super::Processor;

/// Temp-layer controller flags and timestamps.
///
/// `layer_active` tracks the keymap truthfully: it only flips when the
/// keymap call succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempLayerState {
    pub(crate) layer_active: bool,
    pub(crate) keep_active: bool,
    pub(crate) last_input: Option<Instant>,
    pub(crate) last_keypress: Option<Instant>,
}

impl TempLayerState {
    pub fn layer_active(&self) -> bool {
        self.layer_active
    }

    pub fn keep_active(&self) -> bool {
        self.keep_active
    }

    pub fn last_input(&self) -> Option<Instant> {
        self.last_input
    }
}

impl Processor {
    /// Pointer motion while the layer is down may schedule activation
    /// (for the next scheduler tick, effectively immediate).
    pub(crate) fn temp_layer_tickle(
        &mut self,
        value: i32,
        now: Instant,
        scheduler: &mut dyn Scheduler,
    ) {
        if !self.state.current.temp_layer_enabled || value == 0 {
            return;
        }
        self.state.temp_layer.last_input = Some(now);
        if self.state.temp_layer.layer_active {
            return;
        }
        if self.keypress_blocks_activation(now) {
            return;
        }
        scheduler.schedule(self.work(WorkKind::TempLayerActivate), Duration::ZERO);
    }

    /// Typing wins over pointing: activation waits until `act_ms` of
    /// keyboard quiet.
    fn keypress_blocks_activation(&self, now: Instant) -> bool {
        let act = Duration::from_millis(self.state.current.temp_layer_act_ms.into());
        match self.state.temp_layer.last_keypress {
            Some(t) => now.duration_since(t) < act,
            None => false,
        }
    }

    /// Motion while active pushes deactivation out to `deact_ms` from
    /// now; rescheduling replaces the prior deadline.
    pub(crate) fn temp_layer_touch_deactivation(&mut self, scheduler: &mut dyn Scheduler) {
        let t = &self.state.current;
        if !t.temp_layer_enabled
            || !self.state.temp_layer.layer_active
            || self.state.temp_layer.keep_active
        {
            return;
        }
        let deact = Duration::from_millis(t.temp_layer_deact_ms.into());
        scheduler.schedule(self.work(WorkKind::TempLayerDeactivate), deact);
    }

    /// Scheduled activation callback. Re-validates on entry: a key
    /// press that landed inside the scheduling window wins and the
    /// callback does nothing.
    pub(crate) fn run_temp_layer_activate(
        &mut self,
        now: Instant,
        keymap: &mut dyn Keymap,
        scheduler: &mut dyn Scheduler,
    ) {
        if !self.state.current.temp_layer_enabled || self.state.temp_layer.layer_active {
            return;
        }
        if self.keypress_blocks_activation(now) {
            return;
        }
        let layer = self.state.current.temp_layer_layer;
        match keymap.layer_activate(layer) {
            Ok(()) => {
                self.state.temp_layer.layer_active = true;
                debug!("{}: temp layer {layer} activated", self.config.name);
                // Arm the idle timeout right away; the event that
                // scheduled us ran before the layer was up.
                self.temp_layer_touch_deactivation(scheduler);
            }
            Err(e) => {
                warn!("{}: temp layer {layer} activation failed: {e}", self.config.name);
            }
        }
    }

    /// Scheduled deactivation callback; no-ops when stale.
    pub(crate) fn run_temp_layer_deactivate(&mut self, keymap: &mut dyn Keymap) {
        if !self.state.temp_layer.layer_active || self.state.temp_layer.keep_active {
            return;
        }
        self.deactivate_temp_layer(keymap);
    }

    fn deactivate_temp_layer(&mut self, keymap: &mut dyn Keymap) {
        let layer = self.state.current.temp_layer_layer;
        match keymap.layer_deactivate(layer) {
            Ok(()) => {
                self.state.temp_layer.layer_active = false;
                debug!("{}: temp layer {layer} deactivated", self.config.name);
            }
            Err(e) => {
                warn!("{}: temp layer {layer} deactivation failed: {e}", self.config.name);
            }
        }
    }

    /// Keycode listener entry: any key press delays a pending
    /// activation.
    pub fn note_keypress(&mut self, now: Instant) {
        self.state.temp_layer.last_keypress = Some(now);
    }

    /// Hold the layer regardless of idle timeouts. Clearing the hold on
    /// an active layer schedules deactivation for immediate execution.
    pub fn temp_layer_keep_active(&mut self, keep: bool, scheduler: &mut dyn Scheduler) {
        self.state.temp_layer.keep_active = keep;
        if !keep && self.state.temp_layer.layer_active {
            scheduler.schedule(self.work(WorkKind::TempLayerDeactivate), Duration::ZERO);
        }
    }

    /// Position listener entry: a key pressed at `position` tears the
    /// layer down unless the binding under it is benign.
    pub(crate) fn handle_position_press(
        &mut self,
        position: u32,
        keymap: &mut dyn Keymap,
        scheduler: &mut dyn Scheduler,
    ) {
        if !self.state.current.temp_layer_enabled
            || !self.state.temp_layer.layer_active
            || self.state.temp_layer.keep_active
        {
            return;
        }
        if self.should_keep_layer_for(position, keymap) {
            return;
        }
        scheduler.cancel(self.work(WorkKind::TempLayerDeactivate));
        self.deactivate_temp_layer(keymap);
    }

    fn should_keep_layer_for(&self, position: u32, keymap: &dyn Keymap) -> bool {
        let temp_layer = self.state.current.temp_layer_layer;
        // A real binding on the temp layer itself means the press is
        // using this layer.
        if let Some(binding) = keymap.binding_at(temp_layer, position) {
            if !self.is_transparent(&binding) {
                return true;
            }
        }
        // Resolve like the keymap would: highest active layer first,
        // first non-transparent binding wins.
        let Some(binding) = self.resolve_binding(position, keymap) else {
            return false;
        };
        if !binding_is(&binding, self.config.key_press_behavior, KEY_PRESS_NAME) {
            return false;
        }
        let (page, id) = binding.usage();
        let page = if page == 0 { HID_USAGE_PAGE_KEYBOARD } else { page };
        if self.config.temp_layer_keep_keycodes.is_empty() {
            keymap.is_modifier(page, id)
        } else {
            self.config.temp_layer_keep_keycodes.contains(&id)
        }
    }

    fn is_transparent(&self, binding: &LayerBinding) -> bool {
        binding_is(binding, self.config.transparent_behavior, TRANSPARENT_NAME)
    }

    fn resolve_binding(&self, position: u32, keymap: &dyn Keymap) -> Option<LayerBinding> {
        for layer in (0..keymap.layer_count()).rev() {
            if !keymap.layer_active(layer) {
                continue;
            }
            if let Some(binding) = keymap.binding_at(layer, position) {
                if !self.is_transparent(&binding) {
                    return Some(binding);
                }
            }
        }
        None
    }

    /// Called before the configured layer changes while the hold is
    /// up. The hold follows the configuration, so the old layer is
    /// released unconditionally.
    pub(super) fn temp_layer_retarget(
        &mut self,
        keymap: &mut dyn Keymap,
        scheduler: &mut dyn Scheduler,
    ) {
        if self.state.temp_layer.layer_active {
            scheduler.cancel(self.work(WorkKind::TempLayerDeactivate));
            self.deactivate_temp_layer(keymap);
        }
    }

    /// Disabling tears the layer down immediately; a disabled
    /// controller would never run its deactivation otherwise.
    pub(crate) fn temp_layer_on_disable(
        &mut self,
        keymap: &mut dyn Keymap,
        scheduler: &mut dyn Scheduler,
    ) {
        scheduler.cancel(self.work(WorkKind::TempLayerActivate));
        scheduler.cancel(self.work(WorkKind::TempLayerDeactivate));
        if self.state.temp_layer.layer_active && !self.state.temp_layer.keep_active {
            self.deactivate_temp_layer(keymap);
        }
    }
}
