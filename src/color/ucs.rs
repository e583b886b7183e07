// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Uniform chromaticity scale transforms used for MPCD whitepoint offsets.
//!
//! Three competing conventions survive in the broadcast literature:
//! CIE 1960 uv, Judd's 1935 trilinear system expressed as cartesian xy,
//! and MacAdam's projective uv transform that is (almost) equivalent to
//! Judd 1935.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::math::{Mat3, Vec2, Vec3};

/// Which uniform chromaticity scale an MPCD offset is measured in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MpcdKind {
    /// CIE 1960 UCS; one MPCD unit is 0.0004 delta-uv.
    Cie1960,
    /// Judd 1935 cartesian xy; one MPCD unit is 0.0005.
    Judd,
    /// MacAdam's uv equivalent of Judd 1935; one MPCD unit is 0.0005.
    #[default]
    JuddMacadam,
}

impl MpcdKind {
    /// Size of one MPCD unit in this UCS.
    #[must_use]
    pub const fn unit_size(self) -> f64 {
        match self {
            Self::Cie1960 => 0.0004,
            Self::Judd | Self::JuddMacadam => 0.0005,
        }
    }

    /// CIE 1931 xy to this UCS.
    #[must_use]
    pub fn from_xy(self, input: &Vec2) -> Vec2 {
        match self {
            Self::Cie1960 => xy_to_cie1960_uv(input),
            Self::Judd => xy_to_judd_xy(input),
            Self::JuddMacadam => xy_to_judd_macadam_uv(input),
        }
    }

    /// This UCS back to CIE 1931 xy.
    #[must_use]
    pub fn to_xy(self, input: &Vec2) -> Vec2 {
        match self {
            Self::Cie1960 => cie1960_uv_to_xy(input),
            Self::Judd => judd_xy_to_xy(input),
            Self::JuddMacadam => judd_macadam_uv_to_xy(input),
        }
    }
}

/// CIE 1931 xy to CIE 1960 uv.
#[must_use]
pub fn xy_to_cie1960_uv(input: &Vec2) -> Vec2 {
    let divisor = (12.0 * input.y) - (2.0 * input.x) + 3.0;
    Vec2::from((4.0 * input.x) / divisor, (6.0 * input.y) / divisor)
}

/// CIE 1960 uv to CIE 1931 xy.
#[must_use]
pub fn cie1960_uv_to_xy(input: &Vec2) -> Vec2 {
    let divisor = (2.0 * input.x) - (8.0 * input.y) + 4.0;
    Vec2::from((3.0 * input.x) / divisor, (2.0 * input.y) / divisor)
}

// Judd's UCS matrix. His coordinates are named RGB in the 1935 paper but
// have nothing to do with the RGB colorspace.
const JUDD_MATRIX: Mat3 = Mat3::from_rows([
    [3.1956, 2.4478, -0.1434],
    [-2.5455, 7.0492, 0.9963],
    [0.0, 0.0, 1.0],
]);

lazy_static! {
    static ref INVERSE_JUDD_MATRIX: Mat3 = JUDD_MATRIX
        .inverted()
        .expect("Judd UCS matrix is invertible");
}

/// CIE 1931 xy to Judd 1935 cartesian xy.
#[must_use]
pub fn xy_to_judd_xy(input: &Vec2) -> Vec2 {
    // Lift xy to XYZ at Y = 1; luminance drops out of the projection.
    let z = 1.0 - input.x - input.y;
    let xyz = Vec3::from(input.x / input.y, 1.0, z / input.y);

    let rgb = JUDD_MATRIX.transform(&xyz);
    let sum = rgb.x + rgb.y + rgb.z;
    let g = rgb.y / sum;
    let b = rgb.z / sum;

    // Trilinear to cartesian, per the appendix to the 1935 paper.
    Vec2::from(2.0_f64.mul_add(b, g) / 3.0_f64.sqrt(), g)
}

/// Judd 1935 cartesian xy to CIE 1931 xy.
#[must_use]
pub fn judd_xy_to_xy(input: &Vec2) -> Vec2 {
    let g = input.y;
    let b = (3.0_f64.sqrt() * input.x - input.y) / 2.0;
    let r = 1.0 - g - b;
    let rgb = Vec3::from(r, g, b);

    let xyz = INVERSE_JUDD_MATRIX.transform(&rgb);

    let sum = xyz.x + xyz.y + xyz.z;
    Vec2::from(xyz.x / sum, xyz.y / sum)
}

const MACADAM_A: f64 = 0.4661;
const MACADAM_B: f64 = 0.1593;
const MACADAM_C: f64 = -0.15735;
const MACADAM_D: f64 = 0.2424;
const MACADAM_E: f64 = 0.6581;

/// CIE 1931 xy to MacAdam's uv equivalent of Judd 1935 UCS.
#[must_use]
pub fn xy_to_judd_macadam_uv(input: &Vec2) -> Vec2 {
    let denom = MACADAM_C.mul_add(input.x, input.y) + MACADAM_D;
    Vec2::from(
        MACADAM_A.mul_add(input.x, MACADAM_B * input.y) / denom,
        (MACADAM_E * input.y) / denom,
    )
}

/// MacAdam's uv equivalent of Judd 1935 UCS back to CIE 1931 xy.
#[must_use]
pub fn judd_macadam_uv_to_xy(input: &Vec2) -> Vec2 {
    let y = (input.y * MACADAM_D)
        / (MACADAM_E
            - input.y
            - ((MACADAM_C * MACADAM_E.mul_add(input.x, -(input.y * MACADAM_B))) / MACADAM_A));
    let x = y * (MACADAM_E.mul_add(input.x, -(MACADAM_B * input.y)) / (MACADAM_A * input.y));
    Vec2::from(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const D65_XY: Vec2 = Vec2::from(0.312_713, 0.329_016);

    #[test]
    fn test_cie1960_round_trip() {
        let uv = xy_to_cie1960_uv(&D65_XY);
        let back = cie1960_uv_to_xy(&uv);
        assert!((back.x - D65_XY.x).abs() < 1e-12);
        assert!((back.y - D65_XY.y).abs() < 1e-12);
    }

    #[test]
    fn test_judd_round_trip() {
        let judd = xy_to_judd_xy(&D65_XY);
        let back = judd_xy_to_xy(&judd);
        assert!((back.x - D65_XY.x).abs() < 1e-9);
        assert!((back.y - D65_XY.y).abs() < 1e-9);
    }

    #[test]
    fn test_judd_macadam_round_trip() {
        let uv = xy_to_judd_macadam_uv(&D65_XY);
        let back = judd_macadam_uv_to_xy(&uv);
        assert!((back.x - D65_XY.x).abs() < 1e-9);
        assert!((back.y - D65_XY.y).abs() < 1e-9);
    }

    #[test]
    fn test_cie1960_known_value() {
        // D65 in CIE 1960 is about (0.1978, 0.3122).
        let uv = xy_to_cie1960_uv(&D65_XY);
        assert!((uv.x - 0.1978).abs() < 1e-3);
        assert!((uv.y - 0.3122).abs() < 1e-3);
    }
}
