/// Threshold above which the input is doubled rather than tripled
pub const THRESHOLD: f64 = 5.5;

/// `2x` when `x > 5.5`, otherwise `3x`. NaN takes the `3x` branch.
pub fn conditional(x: f64) -> f64 {
    if x > THRESHOLD {
        2.0 * x
    } else {
        3.0 * x
    }
}
