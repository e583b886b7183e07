// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Correlated color temperature to CIE 1931 xy chromaticity.
//!
//! Whitepoints of CRT-era displays were commonly specified as a CCT on
//! either the daylight locus or the Planckian (black body) locus, often
//! with an offset measured in MPCD units perpendicular to the locus.

use serde::{Deserialize, Serialize};

use super::ucs::MpcdKind;
use crate::math::{Vec2, Vec3};

/// Which locus a CCT is measured along.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Locus {
    /// The CIE daylight locus (D series illuminants).
    #[default]
    Daylight,
    /// The Planckian black-body locus.
    Planckian,
}

/// Planck constant, 2019 SI revision (×10⁻³⁴).
const PLANCK: f64 = 6.626_070_15;
/// Speed of light (×10⁸).
const LIGHT_SPEED: f64 = 2.997_924_58;
/// Boltzmann constant, 2019 SI revision (×10⁻²³).
const BOLTZMANN: f64 = 1.380_649;

/// CIE 1931 standard observer x-bar, 360nm to 830nm in 5nm increments.
const CIE1931_STD_OBS_X: [f64; 95] = [
    0.000_129_9, 0.000_232_1, 0.000_414_9, 0.000_741_6, 0.001_368, 0.002_236, 0.004_243,
    0.007_65, 0.014_31, 0.023_19, 0.043_51, 0.077_63, 0.134_38, 0.214_77, 0.283_9, 0.328_5,
    0.348_28, 0.348_06, 0.336_2, 0.318_7, 0.290_8, 0.251_1, 0.195_36, 0.142_1, 0.095_64,
    0.057_950_01, 0.032_01, 0.014_7, 0.004_9, 0.002_4, 0.009_3, 0.029_1, 0.063_27, 0.109_6,
    0.165_5, 0.225_749_9, 0.290_4, 0.359_7, 0.433_449_9, 0.512_050_1, 0.594_5, 0.678_4,
    0.762_1, 0.842_5, 0.916_3, 0.978_6, 1.026_3, 1.056_7, 1.062_2, 1.045_6, 1.002_6, 0.938_4,
    0.854_449_9, 0.751_4, 0.642_4, 0.541_9, 0.447_9, 0.360_8, 0.283_5, 0.218_7, 0.164_9,
    0.121_2, 0.087_4, 0.063_6, 0.046_77, 0.032_9, 0.022_7, 0.015_84, 0.011_359_16,
    0.008_110_916, 0.005_790_346, 0.004_109_457, 0.002_899_327, 0.002_049_19, 0.001_439_971,
    0.000_999_949_3, 0.000_690_078_6, 0.000_476_021_3, 0.000_332_301_1, 0.000_234_826_1,
    0.000_166_150_5, 0.000_117_413, 0.000_083_075_27, 0.000_058_706_52, 0.000_041_509_94,
    0.000_029_353_26, 0.000_020_673_83, 0.000_014_559_77, 0.000_010_253_98, 0.000_007_221_456,
    0.000_005_085_868, 0.000_003_581_652, 0.000_002_522_525, 0.000_001_776_509,
    0.000_001_251_141,
];

/// CIE 1931 standard observer y-bar, 360nm to 830nm in 5nm increments.
const CIE1931_STD_OBS_Y: [f64; 95] = [
    0.000_003_917, 0.000_006_965, 0.000_012_39, 0.000_022_02, 0.000_039, 0.000_064, 0.000_12,
    0.000_217, 0.000_396, 0.000_64, 0.001_21, 0.002_18, 0.004, 0.007_3, 0.011_6, 0.016_84,
    0.023, 0.029_8, 0.038, 0.048, 0.06, 0.073_9, 0.090_98, 0.112_6, 0.139_02, 0.169_3,
    0.208_02, 0.258_6, 0.323, 0.407_3, 0.503, 0.608_2, 0.71, 0.793_2, 0.862, 0.914_850_1,
    0.954, 0.980_3, 0.994_950_1, 1.0, 0.995, 0.978_6, 0.952, 0.915_4, 0.87, 0.816_3, 0.757,
    0.694_9, 0.631, 0.566_8, 0.503, 0.441_2, 0.381, 0.321, 0.265, 0.217, 0.175, 0.138_2,
    0.107, 0.081_6, 0.061, 0.044_58, 0.032, 0.023_2, 0.017, 0.011_92, 0.008_21, 0.005_723,
    0.004_102, 0.002_929, 0.002_091, 0.001_484, 0.001_047, 0.000_74, 0.000_52, 0.000_361_1,
    0.000_249_2, 0.000_171_9, 0.000_12, 0.000_084_8, 0.000_06, 0.000_042_4, 0.000_03,
    0.000_021_2, 0.000_014_99, 0.000_010_6, 0.000_007_465_7, 0.000_005_257_8, 0.000_003_702_9,
    0.000_002_607_8, 0.000_001_836_6, 0.000_001_293_4, 0.000_000_910_93, 0.000_000_641_53,
    0.000_000_451_81,
];

/// CIE 1931 standard observer z-bar, 360nm to 830nm in 5nm increments.
const CIE1931_STD_OBS_Z: [f64; 95] = [
    0.000_606_1, 0.001_086, 0.001_946, 0.003_486, 0.006_450_001, 0.010_549_99, 0.020_050_01,
    0.036_21, 0.067_850_01, 0.110_2, 0.207_4, 0.371_3, 0.645_6, 1.039_050_1, 1.385_6,
    1.622_96, 1.747_06, 1.782_6, 1.772_11, 1.744_1, 1.669_2, 1.528_1, 1.287_64, 1.041_9,
    0.812_950_1, 0.616_2, 0.465_18, 0.353_3, 0.272, 0.212_3, 0.158_2, 0.111_7, 0.078_249_99,
    0.057_250_01, 0.042_16, 0.029_84, 0.020_3, 0.013_4, 0.008_749_999, 0.005_749_999, 0.003_9,
    0.002_749_999, 0.002_1, 0.001_8, 0.001_650_001, 0.001_4, 0.001_1, 0.001, 0.000_8, 0.000_6,
    0.000_34, 0.000_24, 0.000_19, 0.000_1, 0.000_049_999_99, 0.000_03, 0.000_02, 0.000_01,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0,
];

/// The official equation for D series illuminants from CIE 15:2004.
#[must_use]
pub fn xy_from_cct_daylight(cct: f64) -> Vec3 {
    let temp3 = 1000.0 / cct;
    let temp6 = 1_000_000.0 / (cct * cct);
    let temp9 = 1_000_000_000.0 / (cct * cct * cct);

    let x = if cct <= 7000.0 {
        0.244_063 + 0.099_11 * temp3 + 2.9678 * temp6 - 4.607 * temp9
    } else {
        0.237_04 + 0.247_48 * temp3 + 1.9018 * temp6 - 2.0064 * temp9
    };

    let y = -0.275 + (2.87 * x) - (3.0 * x * x);
    Vec3::from(x, y, 1.0 - x - y)
}

/// Black body chromaticity by integrating Planck's law against the
/// standard observer.
#[must_use]
pub fn xy_from_cct_planckian(cct: f64) -> Vec3 {
    // The non-significant decimal exponents of the physical constants
    // cancel against the wavelength terms below.
    let c1 = 2.0 * std::f64::consts::PI * PLANCK * LIGHT_SPEED * LIGHT_SPEED; // *10^-18
    let c2 = (PLANCK * LIGHT_SPEED) / BOLTZMANN; // *10^-3

    let mut big_x = 0.0;
    let mut big_y = 0.0;
    let mut big_z = 0.0;
    for (index, nm) in (360..=830).step_by(5).enumerate() {
        let wavelength = f64::from(nm) / 1000.0; // *10^-6
        let wavelength5 = wavelength.powi(5); // *10^-30
        let blackbody = c1
            / (wavelength5
                * 10.0_f64.powi(-12)
                * ((c2 / (cct * (wavelength / 1000.0))).exp() - 1.0));
        big_x += blackbody * CIE1931_STD_OBS_X[index];
        big_y += blackbody * CIE1931_STD_OBS_Y[index];
        big_z += blackbody * CIE1931_STD_OBS_Z[index];
    }

    let sum = big_x + big_y + big_z;
    let x = big_x / sum;
    let y = big_y / sum;
    Vec3::from(x, y, 1.0 - x - y)
}

fn locus_point(locus: Locus, cct: f64) -> Vec3 {
    match locus {
        Locus::Daylight => xy_from_cct_daylight(cct),
        Locus::Planckian => xy_from_cct_planckian(cct),
    }
}

/// Compute xy coordinates from a CCT with an optional MPCD offset.
///
/// The offset is applied perpendicular to the locus in the selected UCS;
/// the perpendicular direction is taken from the local slope of the locus
/// sampled half a kelvin to either side.
#[must_use]
pub fn xy_from_cct(cct: f64, locus: Locus, mpcd: f64, mpcd_kind: MpcdKind) -> Vec3 {
    let output = locus_point(locus, cct);
    if mpcd == 0.0 {
        return output;
    }

    let output_xy = Vec2::from(output.x, output.y);
    let mut output_uv = mpcd_kind.from_xy(&output_xy);

    const DELTA: f64 = 0.5;
    let plus = locus_point(locus, cct + DELTA);
    let minus = locus_point(locus, cct - DELTA);
    let plus_uv = mpcd_kind.from_xy(&Vec2::from(plus.x, plus.y));
    let minus_uv = mpcd_kind.from_xy(&Vec2::from(minus.x, minus.y));

    // Negative reciprocal of the local slope points in the +MPCD direction.
    let mut direction = Vec2::from(-(minus_uv.y - plus_uv.y), minus_uv.x - plus_uv.x);
    if mpcd_kind == MpcdKind::Judd {
        // Judd's cartesian axes are oriented differently.
        direction.y = -direction.y;
    }
    direction.normalize();

    output_uv = output_uv + (direction * (mpcd_kind.unit_size() * mpcd));
    let corrected = mpcd_kind.to_xy(&output_uv);
    Vec3::from(corrected.x, corrected.y, 1.0 - corrected.x - corrected.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daylight_d65() {
        // cct = 6504 on the daylight locus is D65.
        let xy = xy_from_cct_daylight(6504.0);
        assert!((xy.x - 0.31271).abs() < 1e-3);
        assert!((xy.y - 0.32902).abs() < 1e-3);
    }

    #[test]
    fn test_planckian_near_d65() {
        // The black body locus at 6500K passes close to D65.
        let xy = xy_from_cct_planckian(6500.0);
        assert!((xy.x - 0.312_713).abs() < 3e-3);
        assert!((xy.y - 0.329_016).abs() < 3e-3);
    }

    #[test]
    fn test_9300k_27mpcd() {
        // The classic NTSC-J whitepoint definition: 9300K + 27 MPCD in
        // Judd units lands near the commonly cited (0.281, 0.311).
        let xy = xy_from_cct(9300.0, Locus::Planckian, 27.0, MpcdKind::JuddMacadam);
        assert!((xy.x - 0.281).abs() < 5e-3, "x is {}", xy.x);
        assert!((xy.y - 0.311).abs() < 5e-3, "y is {}", xy.y);
    }

    #[test]
    fn test_zero_mpcd_matches_locus() {
        let a = xy_from_cct(7000.0, Locus::Daylight, 0.0, MpcdKind::Cie1960);
        let b = xy_from_cct_daylight(7000.0);
        assert!(a.nearly_equal(&b));
    }
}
