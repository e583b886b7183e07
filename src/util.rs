// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use float_cmp::ApproxEq;
use std::f64::consts::PI;

/// Rounding errors start to creep in at about this magnitude.
pub const EPSILON: f64 = 1e-6;

/// For checking against zero.
pub const EPSILON_ZERO: f64 = 1e-10;

/// Relaxed tolerance for the betweenness check in boundary queries.
pub const EPSILON_DONT_CARE: f64 = 2e-4;

/// Compares two floating point values and returns true if they are considered equal,
/// otherwise false.
#[inline]
#[must_use]
pub fn fuzzy_compare(p1: f64, p2: f64) -> bool {
    p1.approx_eq(p2, (0.0, 1))
}

/// Check floating point equals 0.0.
#[inline]
#[must_use]
pub fn fuzzy_is_zero(p: f64) -> bool {
    fuzzy_compare(p, 0.0)
}

/// This function converts the degrees in float to radians.
#[inline]
#[must_use]
pub const fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// This function converts the radians in float to degrees.
#[inline]
#[must_use]
pub const fn radians_to_degrees(radians: f64) -> f64 {
    radians * (180.0 / PI)
}

/// Clamp a value to the range [0, 1].
#[inline]
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    if value < 0.0 {
        return 0.0;
    }
    if value > 1.0 {
        return 1.0;
    }
    value
}

/// Convert a 0-1 value to a rounded 8-bit channel value.
#[must_use]
pub fn to_rgb8(value: f64) -> u8 {
    let scaled = value.mul_add(255.0, 0.5);
    if scaled >= 255.0 {
        return 255;
    }
    if scaled <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let byte = scaled as u8;
    byte
}

/// Wrap an angle into the range [0, 2π).
#[must_use]
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle >= 2.0 * PI {
        angle -= 2.0 * PI;
    }
    while angle < 0.0 {
        angle += 2.0 * PI;
    }
    angle
}

/// Calculate `angle_a` minus `angle_b`, both taken in range 0 to 2π radians.
///
/// The answer is in range -π to +π radians; differences larger than a half
/// turn are replaced by the complementary angle with flipped sign.
#[must_use]
pub fn angle_diff(angle_a: f64, angle_b: f64) -> f64 {
    if angle_a == angle_b {
        return 0.0;
    }

    let a = normalize_angle(angle_a);
    let b = normalize_angle(angle_b);

    let diff = a - b;
    let abs_diff = diff.abs();
    if abs_diff > PI {
        let complement = 2.0 * PI - abs_diff;
        if diff <= 0.0 {
            complement
        } else {
            -complement
        }
    } else {
        diff
    }
}

/// Add two angles, wrapping the result into range 0 to 2π radians.
#[must_use]
pub fn angle_add(angle_a: f64, angle_b: f64) -> f64 {
    normalize_angle(angle_a + angle_b)
}

fn sanitize_ramp(floor: f64, ceiling: f64, input: f64) -> (f64, f64, f64) {
    let floor = floor.max(0.0);
    let mut ceiling = ceiling.min(1.0);
    if floor > ceiling {
        ceiling = floor;
    }
    (floor, ceiling, clamp01(input))
}

/// Position of `input` on the 01 cubic hermite spline between `floor` and `ceiling`.
///
/// Returns 0 at or below the floor and 1 at or above the ceiling.
#[must_use]
pub fn cubic_hermite_map(floor: f64, ceiling: f64, input: f64) -> f64 {
    let (floor, ceiling, input) = sanitize_ramp(floor, ceiling, input);
    if input <= floor {
        return 0.0;
    }
    if input >= ceiling {
        return 1.0;
    }
    let t = (input - floor) / (ceiling - floor);
    // 01 hermite is -2t^3 + 3t^2
    (-2.0 * t * t * t) + (3.0 * t * t)
}

/// Inverse of the 01 cubic hermite spline on domain = range = 0-1.
///
/// Uses the trigonometric closed form of the real root in [0, 1].
#[must_use]
pub fn inverse_hermite(input: f64) -> f64 {
    let input = clamp01(input);
    let value = 0.5 - ((1.0 - 2.0 * input).asin() / 3.0).sin();
    clamp01(value)
}

/// Inverse of [`cubic_hermite_map`].
///
/// Returns `floor` at or below the floor and `ceiling` at or above the ceiling.
#[must_use]
pub fn inverse_cubic_hermite_map(floor: f64, ceiling: f64, input: f64) -> f64 {
    let (floor, ceiling, input) = sanitize_ramp(floor, ceiling, input);
    if input <= floor {
        return floor;
    }
    if input >= ceiling {
        return ceiling;
    }
    (ceiling - floor).mul_add(inverse_hermite(input), floor)
}

/// Position of `input` relative to `floor` and `ceiling` taken to `power`.
///
/// Returns 0 at or below the floor and 1 at or above the ceiling.
#[must_use]
pub fn power_map(floor: f64, ceiling: f64, input: f64, power: f64) -> f64 {
    let (floor, ceiling, input) = sanitize_ramp(floor, ceiling, input);
    let power = power.max(0.0);
    if input <= floor {
        return 0.0;
    }
    if input >= ceiling {
        return 1.0;
    }
    let t = (input - floor) / (ceiling - floor);
    t.powf(power)
}

/// Inverse of [`power_map`].
#[must_use]
pub fn inverse_power_map(floor: f64, ceiling: f64, input: f64, power: f64) -> f64 {
    let (floor, ceiling, input) = sanitize_ramp(floor, ceiling, input);
    let power = power.max(0.0);
    if input <= floor {
        return floor;
    }
    if input >= ceiling {
        return ceiling;
    }
    (ceiling - floor).mul_add(input.powf(1.0 / power), floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_diff() {
        assert!(fuzzy_compare(angle_diff(1.0, 1.0), 0.0));
        assert!((angle_diff(0.5, 0.25) - 0.25).abs() < EPSILON);
        // Wraps across zero: 0.1 minus (2pi - 0.1) is 0.2.
        let near_full = 2.0 * PI - 0.1;
        assert!((angle_diff(0.1, near_full) - 0.2).abs() < EPSILON);
        assert!((angle_diff(near_full, 0.1) + 0.2).abs() < EPSILON);
    }

    #[test]
    fn test_angle_add_wraps() {
        let sum = angle_add(2.0 * PI - 0.1, 0.3);
        assert!((sum - 0.2).abs() < EPSILON);
        let sum = angle_add(0.1, -0.3);
        assert!((sum - (2.0 * PI - 0.2)).abs() < EPSILON);
    }

    #[test]
    fn test_hermite_inverse_round_trip() {
        for i in 0..=20 {
            let t = f64::from(i) / 20.0;
            let y = cubic_hermite_map(0.0, 1.0, t);
            let back = inverse_hermite(y);
            assert!((back - t).abs() < 1e-9, "t {t}, y {y}, back {back}");
        }
    }

    #[test]
    fn test_ramp_edges() {
        assert_eq!(cubic_hermite_map(0.3, 0.8, 0.2), 0.0);
        assert_eq!(cubic_hermite_map(0.3, 0.8, 0.9), 1.0);
        assert_eq!(power_map(0.3, 0.8, 0.2, 2.0), 0.0);
        assert_eq!(power_map(0.3, 0.8, 0.9, 2.0), 1.0);
        assert_eq!(inverse_power_map(0.3, 0.8, 0.1, 2.0), 0.3);
        assert_eq!(inverse_cubic_hermite_map(0.3, 0.8, 0.9), 0.8);
    }

    #[test]
    fn test_power_map_round_trip() {
        for i in 1..20 {
            let t = f64::from(i) / 20.0;
            let y = power_map(0.0, 1.0, t, 1.7);
            let back = inverse_power_map(0.0, 1.0, y, 1.7);
            assert!((back - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_to_rgb8() {
        assert_eq!(to_rgb8(0.0), 0);
        assert_eq!(to_rgb8(1.0), 255);
        assert_eq!(to_rgb8(-0.5), 0);
        assert_eq!(to_rgb8(2.0), 255);
        assert_eq!(to_rgb8(0.5), 128);
    }
}
