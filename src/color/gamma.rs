// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Transfer functions for gamma-encoded 8-bit interchange.
//!
//! All functions clamp their output to [0, 1].

use crate::util::clamp01;

/// Linear to sRGB gamma.
#[must_use]
pub fn srgb_to_gamma(input: f64) -> f64 {
    if input <= 0.003_130_8 {
        return clamp01(input * 12.92);
    }
    clamp01(1.055_f64.mul_add(input.powf(1.0 / 2.4), -0.055))
}

/// sRGB gamma to linear.
#[must_use]
pub fn srgb_to_linear(input: f64) -> f64 {
    if input <= 0.04045 {
        return clamp01(input / 12.92);
    }
    clamp01(((input + 0.055) / 1.055).powf(2.4))
}

const REC2084_M1: f64 = 1305.0 / 8192.0;
const REC2084_M2: f64 = 2523.0 / 32.0;
const REC2084_C1: f64 = 107.0 / 128.0;
const REC2084_C2: f64 = 2413.0 / 128.0;
const REC2084_C3: f64 = 2392.0 / 128.0;

/// Linear to rec2084 (PQ) gamma.
///
/// `max_nits` is the brightness SDR white is rendered at on the HDR
/// monitor, typically 100-200.
#[must_use]
pub fn rec2084_to_gamma(input: f64, max_nits: f64) -> f64 {
    let input = clamp01(input);
    let ym1 = (input * (max_nits / 10_000.0)).powf(REC2084_M1);
    let output = (REC2084_C2.mul_add(ym1, REC2084_C1) / REC2084_C3.mul_add(ym1, 1.0))
        .powf(REC2084_M2);
    clamp01(output)
}

/// rec2084 (PQ) gamma to linear.
#[must_use]
pub fn rec2084_to_linear(input: f64, max_nits: f64) -> f64 {
    let input = clamp01(input);
    let e = input.powf(1.0 / REC2084_M2);
    let top = (e - REC2084_C1).max(0.0);
    let output = (top / REC2084_C3.mul_add(-e, REC2084_C2)).powf(1.0 / REC2084_M1);
    clamp01(output * (10_000.0 / max_nits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_round_trip() {
        for i in 0..=1000 {
            let x = f64::from(i) / 1000.0;
            let back = srgb_to_linear(srgb_to_gamma(x));
            assert!((back - x).abs() < 2e-6, "x {x}, back {back}");
        }
    }

    #[test]
    fn test_srgb_breakpoints() {
        // The two piecewise segments meet continuously.
        let below = srgb_to_gamma(0.003_130_7);
        let above = srgb_to_gamma(0.003_130_9);
        assert!((below - above).abs() < 1e-5);
    }

    #[test]
    fn test_rec2084_round_trip() {
        for i in 0..=100 {
            let x = f64::from(i) / 100.0;
            let back = rec2084_to_linear(rec2084_to_gamma(x, 200.0), 200.0);
            assert!((back - x).abs() < 1e-6, "x {x}, back {back}");
        }
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(srgb_to_gamma(0.0), 0.0);
        assert_eq!(srgb_to_gamma(1.0), 1.0);
        assert_eq!(rec2084_to_linear(0.0, 200.0), 0.0);
        assert_eq!(rec2084_to_linear(1.0, 200.0), 1.0);
    }
}
