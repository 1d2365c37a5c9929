use std::time::Instant;

use crate::event::Axis;
use crate::settings::AxisSnapMode;

/// Decay period of the cross-axis accumulator.
const DECAY_PERIOD_MS: u64 = 50;

/// Axis-snap state: motion is locked to the primary axis until enough
/// cross-axis motion accumulates inside the decay window.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapState {
    cross_accum: i32,
    last_decay: Option<Instant>,
}

impl SnapState {
    pub fn clear(&mut self) {
        self.cross_accum = 0;
        self.last_decay = None;
    }

    #[cfg(test)]
    pub(crate) fn cross_accum(&self) -> i32 {
        self.cross_accum
    }

    /// Run one event through the snap stage, returning the value to
    /// emit. Lock state is judged before the event's own contribution
    /// is added: the event that crosses the threshold is still locked,
    /// the one after it passes through.
    pub fn apply(
        &mut self,
        mode: AxisSnapMode,
        threshold: u16,
        timeout_ms: u16,
        axis: Axis,
        value: i32,
        now: Instant,
    ) -> i32 {
        let primary = match mode {
            AxisSnapMode::None => return value,
            AxisSnapMode::SnapX => Axis::X,
            AxisSnapMode::SnapY => Axis::Y,
        };

        self.decay(threshold, timeout_ms, now);

        if axis == primary {
            return value;
        }

        let threshold = i32::from(threshold);
        let unsnapped = self.cross_accum.abs() >= threshold;

        if unsnapped {
            // Released: any cross-axis motion, either direction, keeps
            // the lock open. Magnitude grows, sign is retained.
            self.cross_accum = self
                .cross_accum
                .signum()
                .saturating_mul(self.cross_accum.abs().saturating_add(value.abs()));
        } else {
            self.cross_accum = self.cross_accum.saturating_add(value);
        }

        // Cap at 2·threshold so the lock reacquires within roughly one
        // timeout of cross-axis idleness.
        let cap = 2 * threshold;
        if self.cross_accum.abs() > cap {
            self.cross_accum = self.cross_accum.signum() * cap;
        }
        self.last_decay = Some(now);

        if unsnapped {
            value
        } else {
            0
        }
    }

    /// Walk the accumulator toward zero, one fixed step per elapsed
    /// 50 ms period, sized so a full threshold drains in `timeout_ms`.
    fn decay(&mut self, threshold: u16, timeout_ms: u16, now: Instant) {
        if timeout_ms == 0 {
            return;
        }
        let Some(last) = self.last_decay else {
            return;
        };
        let elapsed_ms = now.duration_since(last).as_millis() as u64;
        let periods = elapsed_ms / DECAY_PERIOD_MS;
        if periods == 0 {
            return;
        }
        let steps = (u64::from(timeout_ms) / DECAY_PERIOD_MS).max(1);
        let per_period = (u64::from(threshold) / steps).max(1);
        let drop = (per_period * periods).min(u64::from(self.cross_accum.unsigned_abs())) as i32;
        self.cross_accum -= self.cross_accum.signum() * drop;
        self.last_decay = Some(now);
    }
}
