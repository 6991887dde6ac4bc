/// Add `x` to an accumulator once per counter step while the counter,
/// converted to f64 on every check, stays below `x`.
///
/// The counter is a 32-bit integer that wraps like `i32.add`. There is no
/// precomputed trip count: for `x = 5.5` the guard admits `i = 0..=5`.
///
/// For `x >= 2^31` the counter wraps to `i32::MIN` before reaching `x`, so
/// the loop never ends. The compiled `test_loop.c` behaves the same way.
pub fn accumulate(x: f64) -> f64 {
    let mut result = 0.0;
    let mut i: i32 = 0;
    while (i as f64) < x {
        result += x;
        i = i.wrapping_add(1);
    }
    result
}
