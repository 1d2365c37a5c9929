use evdev::RelativeAxisType;
use smallvec::SmallVec;

/// Ordered list of event codes recognized as one axis. Instances watch
/// at most a handful of codes, so the list lives inline.
pub type CodeList = SmallVec<[u16; 2]>;

/// Which logical axis an event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline]
    pub const fn is_x(self) -> bool {
        matches!(self, Axis::X)
    }
}

/// Classify an event code against the ordered X and Y code lists.
/// The X list is consulted first; a code in neither list is `None` and
/// the event passes through the pipeline untouched.
#[inline]
pub fn classify(code: u16, x_codes: &[u16], y_codes: &[u16]) -> Option<Axis> {
    if x_codes.contains(&code) {
        return Some(Axis::X);
    }
    if y_codes.contains(&code) {
        return Some(Axis::Y);
    }
    None
}

/// Wheel code an axis is rewritten to under xy-to-scroll: horizontal
/// wheel for X motion, vertical wheel for Y motion.
pub const fn scroll_code(axis: Axis) -> u16 {
    match axis {
        Axis::X => RelativeAxisType::REL_HWHEEL.0,
        Axis::Y => RelativeAxisType::REL_WHEEL.0,
    }
}
