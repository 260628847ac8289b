//! Per-pixel tone predicates shared by every analysis pass.
//!
//! Alpha is ignored throughout: a transparent pixel is judged by its
//! color channels alone.

use image::Rgba;

/// `true` if red, green, and blue are all strictly below `threshold`.
#[must_use]
#[inline]
pub const fn is_dark(pixel: &Rgba<u8>, threshold: u8) -> bool {
    let [r, g, b, _] = pixel.0;
    r < threshold && g < threshold && b < threshold
}

/// `true` if red, green, and blue are all at least `min`.
#[must_use]
#[inline]
pub const fn is_near_white(pixel: &Rgba<u8>, min: u8) -> bool {
    let [r, g, b, _] = pixel.0;
    r >= min && g >= min && b >= min
}

/// Ratio of `count` to `total`, or `0.0` when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fraction(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_is_strict() {
        assert!(is_dark(&Rgba([19, 19, 19, 255]), 20));
        assert!(!is_dark(&Rgba([20, 0, 0, 255]), 20));
        assert!(!is_dark(&Rgba([0, 0, 25, 255]), 20));
    }

    #[test]
    fn dark_ignores_alpha() {
        assert!(is_dark(&Rgba([0, 0, 0, 0]), 1));
    }

    #[test]
    fn near_white_is_inclusive() {
        assert!(is_near_white(&Rgba([200, 200, 200, 255]), 200));
        assert!(!is_near_white(&Rgba([255, 255, 199, 255]), 200));
    }

    #[test]
    fn fraction_of_zero_total() {
        assert!(fraction(3, 0).abs() < f64::EPSILON);
        assert!((fraction(1, 4) - 0.25).abs() < f64::EPSILON);
    }
}
