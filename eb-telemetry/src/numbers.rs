//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 and clamp it to the i32 range, returning 0 for NaN values.
#[must_use]
pub fn round_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    let min = cast::<i32, f64>(i32::MIN).unwrap_or(f64::MIN);
    let max = cast::<i32, f64>(i32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    cast::<f64, i32>(clamped).unwrap_or(0)
}

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn count_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert an i64 (e.g. a millisecond count) to f64.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Divide two counts, yielding 0.0 when the denominator is zero.
#[must_use]
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    finite_or_zero(count_to_f64(numerator) / count_to_f64(denominator))
}

/// Map NaN and infinities to 0.0.
#[must_use]
pub const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Elapsed seconds between two instants, never negative.
#[must_use]
pub fn non_negative_span(first: f64, last: f64) -> f64 {
    finite_or_zero(last - first).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounders_cover_ranges() {
        assert_eq!(round_f64_to_i32(1.6), 2);
        assert_eq!(round_f64_to_i32(-100.4), -100);
        assert_eq!(round_f64_to_i32(f64::NAN), 0);
        assert_eq!(round_f64_to_i32(f64::from(i32::MAX) * 2.0), i32::MAX);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert!((ratio(3, 0) - 0.0).abs() < f64::EPSILON);
        assert!((ratio(3, 2) - 1.5).abs() < f64::EPSILON);
        assert!((ratio(0, 0) - 0.0).abs() < f64::EPSILON);
        assert!((i64_to_f64(-1500) + 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spans_ignore_non_finite_and_negative() {
        assert!((non_negative_span(2.0, 5.5) - 3.5).abs() < f64::EPSILON);
        assert!((non_negative_span(5.0, 2.0) - 0.0).abs() < f64::EPSILON);
        assert!((non_negative_span(0.0, f64::INFINITY) - 0.0).abs() < f64::EPSILON);
    }
}
