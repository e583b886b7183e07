// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The Jzazbz perceptual colorspace.
//!
//! Safdar, Muhammad, et al. "Perceptually uniform color space for image
//! signals including high dynamic range and wide gamut." *Optics
//! Express*, Vol. 25, No. 13, pp. 15131-15151. June 2017.
//!
//! Input XYZ values must be relative to the D65 whitepoint. The peak
//! luminance parameter shifts hue angles noticeably below 100 cd/m²; it
//! is fixed at 200 here, around what the CRTs in our use cases output.

use lazy_static::lazy_static;

use crate::math::{Mat3, Vec3};

const JZAZBZ_B: f64 = 1.15;
const JZAZBZ_G: f64 = 0.66;
const JZAZBZ_C1: f64 = 3424.0 / 4096.0;
const JZAZBZ_C2: f64 = 2413.0 / 128.0;
const JZAZBZ_C3: f64 = 2392.0 / 128.0;
const JZAZBZ_N: f64 = 2610.0 / 16384.0;
const JZAZBZ_P: f64 = 1.7 * 2523.0 / 32.0;
const JZAZBZ_D: f64 = -0.56;
const JZAZBZ_D0: f64 = 1.629_549_953_282_156_6e-11;
const JZAZBZ_PEAK_LUM: f64 = 200.0;

const JZAZBZ_LMS_MATRIX: Mat3 = Mat3::from_rows([
    [0.414_789_72, 0.579_999, 0.014_648_0],
    [-0.201_510_0, 1.120_649, 0.053_100_8],
    [-0.016_600_8, 0.264_800, 0.668_479_9],
]);

const JZAZBZ_IAB_MATRIX: Mat3 = Mat3::from_rows([
    [0.5, 0.5, 0.0],
    [3.524_000, -4.066_708, 0.542_708],
    [0.199_076, 1.096_799, -1.295_875],
]);

lazy_static! {
    static ref INVERSE_JZAZBZ_LMS_MATRIX: Mat3 = JZAZBZ_LMS_MATRIX
        .inverted()
        .expect("Jzazbz LMS matrix is invertible");
    static ref INVERSE_JZAZBZ_IAB_MATRIX: Mat3 = JZAZBZ_IAB_MATRIX
        .inverted()
        .expect("Jzazbz Iab matrix is invertible");
}

/// The perceptual quantizer function.
#[must_use]
pub fn pq(input: f64) -> f64 {
    let xx = (input / 10_000.0).powf(JZAZBZ_N);
    (JZAZBZ_C2.mul_add(xx, JZAZBZ_C1) / JZAZBZ_C3.mul_add(xx, 1.0)).powf(JZAZBZ_P)
}

/// The inverse perceptual quantizer function.
///
/// Returns NaN for inputs outside any realizable gamut; callers treat
/// NaN as far out of bounds rather than aborting.
#[must_use]
pub fn inverse_pq(input: f64) -> f64 {
    let xx = input.powf(1.0 / JZAZBZ_P);
    10_000.0 * ((JZAZBZ_C1 - xx) / JZAZBZ_C3.mul_add(xx, -JZAZBZ_C2)).powf(1.0 / JZAZBZ_N)
}

/// XYZ relative to D65 to Jzazbz.
#[must_use]
pub fn xyz_to_jzazbz(input: &Vec3) -> Vec3 {
    let xyz = *input * JZAZBZ_PEAK_LUM;

    let xyz_prime = Vec3::from(
        (JZAZBZ_B * xyz.x) - ((JZAZBZ_B - 1.0) * xyz.z),
        (JZAZBZ_G * xyz.y) - ((JZAZBZ_G - 1.0) * xyz.x),
        xyz.z,
    );

    let lms = JZAZBZ_LMS_MATRIX.transform(&xyz_prime);
    let lms_prime = Vec3::from(pq(lms.x), pq(lms.y), pq(lms.z));
    let izazbz = JZAZBZ_IAB_MATRIX.transform(&lms_prime);

    let jz = (((1.0 + JZAZBZ_D) * izazbz.x) / JZAZBZ_D.mul_add(izazbz.x, 1.0)) - JZAZBZ_D0;

    Vec3::from(jz, izazbz.y, izazbz.z)
}

/// Jzazbz back to XYZ relative to D65.
#[must_use]
pub fn jzazbz_to_xyz(input: &Vec3) -> Vec3 {
    let temp_iz = input.x + JZAZBZ_D0;
    let iz = temp_iz / (1.0 + JZAZBZ_D - (JZAZBZ_D * temp_iz));

    let izazbz = Vec3::from(iz, input.y, input.z);
    let lms_prime = INVERSE_JZAZBZ_IAB_MATRIX.transform(&izazbz);
    let lms = Vec3::from(
        inverse_pq(lms_prime.x),
        inverse_pq(lms_prime.y),
        inverse_pq(lms_prime.z),
    );
    let xyz_prime = INVERSE_JZAZBZ_LMS_MATRIX.transform(&lms);

    let x = ((JZAZBZ_B - 1.0).mul_add(xyz_prime.z, xyz_prime.x)) / JZAZBZ_B;
    // The X term here is the recovered X, not the one from XYZ-prime.
    let y = ((JZAZBZ_G - 1.0).mul_add(x, xyz_prime.y)) / JZAZBZ_G;

    Vec3::from(x, y, xyz_prime.z) / JZAZBZ_PEAK_LUM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pq_round_trip() {
        for i in 1..=20 {
            let x = f64::from(i) * 10.0;
            let back = inverse_pq(pq(x));
            assert!((back - x).abs() / x < 1e-9, "x {x}, back {back}");
        }
    }

    #[test]
    fn test_xyz_round_trip() {
        let samples = [
            Vec3::from(0.5, 0.5, 0.5),
            Vec3::from(0.95, 1.0, 1.08),
            Vec3::from(0.2, 0.1, 0.04),
        ];
        for xyz in &samples {
            let jab = xyz_to_jzazbz(xyz);
            let back = jzazbz_to_xyz(&jab);
            assert!(
                back.nearly_equal(xyz),
                "xyz {xyz:?}, jab {jab:?}, back {back:?}"
            );
        }
    }

    #[test]
    fn test_jz_increases_with_luminance() {
        let dim = xyz_to_jzazbz(&Vec3::from(0.2, 0.2, 0.2));
        let bright = xyz_to_jzazbz(&Vec3::from(0.8, 0.8, 0.8));
        assert!(bright.x > dim.x);
        assert!(dim.x > 0.0);
    }

    #[test]
    fn test_inverse_pq_nan_out_of_range() {
        // Inputs that would require imaginary roots come back NaN, not panic.
        assert!(inverse_pq(4.0).is_nan());
        assert!(inverse_pq(-0.5).is_nan());
    }
}
