use std::f64::consts::{FRAC_PI_4, SQRT_2};

/// Wheel mounting angles, counter-clockwise from +x.
///
/// ```text
///      ^ y
///    0   1
///     [ ]    -> x
///    3   2
/// ```
const WHEEL_ANGLES: [f64; 4] = [3.0 * FRAC_PI_4, FRAC_PI_4, 7.0 * FRAC_PI_4, 5.0 * FRAC_PI_4];

/// Four-wheel omni drive: translation `(x, y)` plus `rotation`, all -1..1,
/// to per-wheel speeds in -1..1. Translation and rotation share the
/// available speed in proportion to their magnitudes.
pub fn sine_drive(x: f64, y: f64, rotation: f64) -> [f64; 4] {
    let heading = y.atan2(x);
    let mut travel = x.hypot(y).min(1.0);
    let total = travel + rotation.abs();
    if total == 0.0 {
        return [0.0; 4];
    }

    let rotation = rotation * (rotation / total).abs();
    travel = travel * travel / total;

    WHEEL_ANGLES.map(|angle| (SQRT_2 * (-travel * (heading - angle).sin() + rotation)).clamp(-1.0, 1.0))
}
