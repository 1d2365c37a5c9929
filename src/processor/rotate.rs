use crate::event::Axis;
use crate::trig::{scaled_cos_sin, TRIG_SCALE};

/// Pairing state for the rotation stage.
///
/// X and Y arrive as separate events, so a rotated value can only be
/// computed once the cross-axis partner is known. The unpaired half of
/// a pair emits zero; the downstream receiver consumes an X-then-Y (or
/// Y-then-X) sequence per report tick, so motion vectors are preserved
/// at the cost of one event of latency after the angle changes.
#[derive(Debug, Clone, Copy)]
pub struct RotationState {
    cos: i32,
    sin: i32,
    last_x: i32,
    last_y: i32,
    has_x: bool,
    has_y: bool,
}

impl RotationState {
    pub fn new(degrees: i32) -> Self {
        let (cos, sin) = scaled_cos_sin(degrees);
        Self {
            cos,
            sin,
            last_x: 0,
            last_y: 0,
            has_x: false,
            has_y: false,
        }
    }

    /// Recompute the fixed-point pair and drop any half-formed pair.
    /// Called on rotation changes, never per event.
    pub fn set_degrees(&mut self, degrees: i32) {
        let (cos, sin) = scaled_cos_sin(degrees);
        self.cos = cos;
        self.sin = sin;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.last_x = 0;
        self.last_y = 0;
        self.has_x = false;
        self.has_y = false;
    }

    /// Feed one axis value, returning the value to emit in its place.
    pub fn apply(&mut self, axis: Axis, value: i32) -> i32 {
        match axis {
            Axis::X => {
                self.last_x = value;
                self.has_x = true;
                if self.has_y {
                    self.has_y = false;
                    rotate_x(self.last_x, self.last_y, self.cos, self.sin)
                } else {
                    0
                }
            }
            Axis::Y => {
                self.last_y = value;
                self.has_y = true;
                if self.has_x {
                    self.has_x = false;
                    rotate_y(self.last_x, self.last_y, self.cos, self.sin)
                } else {
                    0
                }
            }
        }
    }
}

pub(crate) fn rotate_x(x: i32, y: i32, cos: i32, sin: i32) -> i32 {
    div_round(
        i64::from(x) * i64::from(cos) - i64::from(y) * i64::from(sin),
        i64::from(TRIG_SCALE),
    ) as i32
}

pub(crate) fn rotate_y(x: i32, y: i32, cos: i32, sin: i32) -> i32 {
    div_round(
        i64::from(x) * i64::from(sin) + i64::from(y) * i64::from(cos),
        i64::from(TRIG_SCALE),
    ) as i32
}

/// Divide rounding half away from zero. Plain truncation drifts every
/// rotated value toward zero and breaks the round-trip error bound.
fn div_round(n: i64, d: i64) -> i64 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpaired_axis_emits_zero() {
        let mut rot = RotationState::new(90);
        assert_eq!(rot.apply(Axis::X, 5), 0);
    }

    #[test]
    fn test_pair_rotates_90_degrees() {
        let mut rot = RotationState::new(90);
        // (5, 7) rotates to (-7, 5); the X half is pending until the
        // next X event, the Y half fires as soon as the pair is known.
        assert_eq!(rot.apply(Axis::X, 5), 0);
        assert_eq!(rot.apply(Axis::Y, 7), 5);
        // The following X pairs with the stored Y.
        assert_eq!(rot.apply(Axis::X, 5), -7);
    }

    #[test]
    fn test_steady_stream_alternates_pairings() {
        let mut rot = RotationState::new(30);
        // cos=866, sin=500, rounded division.
        assert_eq!(rot.apply(Axis::X, 100), 0);
        assert_eq!(rot.apply(Axis::Y, 50), 93); // 100·500 + 50·866
        assert_eq!(rot.apply(Axis::X, 100), 62); // 100·866 - 50·500
        assert_eq!(rot.apply(Axis::Y, 50), 93);
    }

    #[test]
    fn test_set_degrees_drops_pending_pair() {
        let mut rot = RotationState::new(90);
        assert_eq!(rot.apply(Axis::X, 5), 0);
        rot.set_degrees(180);
        // The X from before the change must not pair with this Y.
        assert_eq!(rot.apply(Axis::Y, 7), 0);
    }

    #[test]
    fn test_round_trip_small_values() {
        for deg in [13, 30, 45, 77, 90, 135, 211, 300] {
            let (c, s) = scaled_cos_sin(deg);
            let (cn, sn) = scaled_cos_sin(-deg);
            for (x, y) in [(500, -500), (3, 4), (-123, 456), (0, 500), (-499, -2)] {
                let (x1, y1) = (rotate_x(x, y, c, s), rotate_y(x, y, c, s));
                let (x2, y2) = (rotate_x(x1, y1, cn, sn), rotate_y(x1, y1, cn, sn));
                assert!(
                    (x2 - x).abs() <= 1 && (y2 - y).abs() <= 1,
                    "deg={deg} ({x},{y}) -> ({x1},{y1}) -> ({x2},{y2})"
                );
            }
        }
    }

    #[test]
    fn test_round_trip_large_values_cardinal() {
        for deg in [90, 180, 270] {
            let (c, s) = scaled_cos_sin(deg);
            let (cn, sn) = scaled_cos_sin(-deg);
            for (x, y) in [(32000, -32000), (-31999, 17), (1, 32000)] {
                let (x1, y1) = (rotate_x(x, y, c, s), rotate_y(x, y, c, s));
                let (x2, y2) = (rotate_x(x1, y1, cn, sn), rotate_y(x1, y1, cn, sn));
                assert!((x2 - x).abs() <= 2 && (y2 - y).abs() <= 2);
            }
        }
    }
}
