//! Elementwise division with 0/0 = 0

use num_traits::Float;

/// Relative threshold below which numerator and denominator are treated as 0
pub const SMALL_NUM: f32 = 1e-9;

/// Divide `numerator` by `denominator` in place, elementwise, setting 0/0 to
/// 0 rather than NaN.
///
/// A value counts as zero when its magnitude does not exceed
/// `small_num * max(|numerator|)`. Nonzero divided by zero is not handled:
/// callers must mask such bins upstream.
pub fn divide<T: Float>(numerator: &mut [T], denominator: &[T], small_num: T) {
    debug_assert_eq!(numerator.len(), denominator.len());
    let max_abs = numerator.iter()
        .fold(T::zero(), |m, n| m.max(n.abs()));
    let small_value = max_abs * small_num;
    for (n, &d) in numerator.iter_mut().zip(denominator) {
        if d.abs() <= small_value && n.abs() <= small_value {
            *n = T::zero();
        } else {
            *n = *n / d;
        }
    }
}
