/// Fixed-point scale of the precomputed cosine/sine pair.
pub const TRIG_SCALE: i32 = 1000;

/// Precompute `(cos(deg)·1000, sin(deg)·1000)` as signed integers.
///
/// Called when the rotation angle changes, never per event. Multiples
/// of 360° short-circuit to `(1000, 0)` so the common unrotated
/// configuration never touches floating point at all.
pub fn scaled_cos_sin(degrees: i32) -> (i32, i32) {
    if degrees % 360 == 0 {
        return (TRIG_SCALE, 0);
    }
    let rad = f64::from(degrees).to_radians();
    (
        (rad.cos() * f64::from(TRIG_SCALE)).round() as i32,
        (rad.sin() * f64::from(TRIG_SCALE)).round() as i32,
    )
}
