// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Gamma-space color correction circuits from CRT-era television sets.
//!
//! Two designs are modeled: the Chunghwa single-matrix correction and
//! Kinoshita's thirteen-matrix design, which picks a matrix by the
//! ordering of the R'G'B' input channels.

use crate::color::xyy::{xyy_to_xyz, xyz_to_xyy};
use crate::error::{Error, ErrorKind};
use crate::math::vec2::{distance_2d, line_intersection_2d};
use crate::math::{Mat3, Vec2, Vec3};
use crate::util::{clamp01, EPSILON_ZERO};

use super::GamutDescriptor;

/// Which channel a [`GamutDescriptor::xyy_luminance_search`] pins at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockChannel {
    Red,
    Green,
    Blue,
}

impl GamutDescriptor {
    /// For a chromaticity (x, y), finds the luminance Y such that the
    /// corresponding linear RGB has 1.0 in the locked channel.
    ///
    /// Returns the linear RGB triple (with the locked channel snapped
    /// to exactly 1.0) and the found Y. Binary search; the correction
    /// circuits only run this a handful of times.
    #[must_use]
    pub fn xyy_luminance_search(&self, x: f64, y: f64, lock: LockChannel) -> (Vec3, f64) {
        let mut high = 1.0_f64;
        let mut low = 0.0_f64;
        let mut steps = 0;
        let (mut rgb, guess_y) = loop {
            let guess_y = (low + high) * 0.5;
            let xyz = xyy_to_xyz(&Vec3::from(x, y, guess_y));
            let rgb = self.inverse_npm().transform(&xyz);
            let check = match lock {
                LockChannel::Red => rgb.x,
                LockChannel::Green => rgb.y,
                LockChannel::Blue => rgb.z,
            };
            if (1.0 - check).abs() < EPSILON_ZERO {
                break (rgb, guess_y);
            }
            // Binary search over [0, 1] reaches 1e-10 within 31 steps;
            // 50 means something is definitely wrong.
            if steps > 50 {
                log::warn!("xyY luminance search failed to converge for ({x}, {y})");
                break (rgb, guess_y);
            }
            if check > 1.0 {
                high = guess_y;
            } else {
                low = guess_y;
            }
            steps += 1;
        };
        match lock {
            LockChannel::Red => rgb.x = 1.0,
            LockChannel::Green => rgb.y = 1.0,
            LockChannel::Blue => rgb.z = 1.0,
        }
        (rgb, guess_y)
    }

    /// Builds the Chunghwa correction matrix.
    ///
    /// Run on the destination (phosphor) gamut with the source
    /// (specification) gamut as `other`. The circuit does not care what
    /// it does to luma.
    #[must_use]
    pub fn chunghwa_matrix(&self, other: &Self) -> Mat3 {
        let [other_red, other_green, other_blue] = other.primaries();
        let (red_weights, _) =
            self.xyy_luminance_search(other_red.x, other_red.y, LockChannel::Red);
        let (green_weights, _) =
            self.xyy_luminance_search(other_green.x, other_green.y, LockChannel::Green);
        let (blue_weights, _) =
            self.xyy_luminance_search(other_blue.x, other_blue.y, LockChannel::Blue);

        let matrix = Mat3::from_rows([
            [red_weights.x, green_weights.x, blue_weights.x],
            [red_weights.y, green_weights.y, blue_weights.y],
            [red_weights.z, green_weights.z, blue_weights.z],
        ]);
        log::debug!("Chunghwa matrix: {matrix:?}");
        matrix
    }

    /// Builds Kinoshita's thirteen region matrices.
    ///
    /// Run on the source (specification) gamut with the destination
    /// (phosphor) gamut as `other`, following the patent's geometry with
    /// the luminance searches standing in for most of it (same answers,
    /// fewer rounding errors).
    ///
    /// # Errors
    /// Fails when the secondary-point construction meets parallel lines,
    /// which a sane pair of gamuts never produces.
    #[allow(clippy::too_many_lines)]
    #[allow(clippy::similar_names)]
    pub fn kinoshita_matrices(&self, other: &Self) -> Result<[Mat3; 13], Error> {
        let white = Vec2::from(self.whitepoint().x, self.whitepoint().y);
        let [other_red, other_green, other_blue] = other.primaries();
        let r_phos = Vec2::from(other_red.x, other_red.y);
        let g_phos = Vec2::from(other_green.x, other_green.y);
        let b_phos = Vec2::from(other_blue.x, other_blue.y);

        // Phosphor luminance ratios at the whitepoint.
        let lw_r = other.npm().at(1, 0);
        let lw_g = other.npm().at(1, 1);
        let lw_b = other.npm().at(1, 2);

        // "Optimal" luminances at the phosphor primaries.
        let (_, lr_r) = self.xyy_luminance_search(r_phos.x, r_phos.y, LockChannel::Red);
        let (_, lg_g) = self.xyy_luminance_search(g_phos.x, g_phos.y, LockChannel::Green);
        let (_, lb_b) = self.xyy_luminance_search(b_phos.x, b_phos.y, LockChannel::Blue);

        // Normalized so they add to 1.
        let primary_sum = lr_r + lg_g + lb_b;
        let lr_r_norm = lr_r / primary_sum;
        let lg_g_norm = lg_g / primary_sum;
        let lb_b_norm = lb_b / primary_sum;

        // Secondary color points of both gamuts, via the NPMs.
        let secondary = |gamut: &Self, rgb: Vec3| -> Vec2 {
            let xyz = gamut.npm().transform(&rgb);
            let xyy = xyz_to_xyy(&xyz);
            Vec2::from(xyy.x, xyy.y)
        };
        let m_spec = secondary(self, Vec3::from(1.0, 0.0, 1.0));
        let m_phos = secondary(other, Vec3::from(1.0, 0.0, 1.0));
        let y_spec = secondary(self, Vec3::from(1.0, 1.0, 0.0));
        let y_phos = secondary(other, Vec3::from(1.0, 1.0, 0.0));
        let c_spec = secondary(self, Vec3::from(0.0, 1.0, 1.0));
        let c_phos = secondary(other, Vec3::from(0.0, 1.0, 1.0));

        // Prime secondaries: where the white-to-spec-secondary line
        // crosses the line between the flanking phosphor primaries.
        let parallel = || {
            Error::with_message(
                ErrorKind::GamutInitializeFail,
                "unexpected parallel lines while building Kinoshita secondary points",
            )
        };
        let m_prime =
            line_intersection_2d(&white, &m_spec, &b_phos, &r_phos).ok_or_else(parallel)?;
        let y_prime =
            line_intersection_2d(&white, &y_spec, &r_phos, &g_phos).ok_or_else(parallel)?;
        let c_prime =
            line_intersection_2d(&white, &c_spec, &g_phos, &b_phos).ok_or_else(parallel)?;

        // Channel input at each prime secondary, by distance ratio from
        // the opposite primary, times the whitepoint luminance ratio.
        let lm_b = (distance_2d(&r_phos, &m_prime) / distance_2d(&r_phos, &m_phos)) * lw_b;
        let lm_r = (distance_2d(&b_phos, &m_prime) / distance_2d(&b_phos, &m_phos)) * lw_r;
        let ly_g = (distance_2d(&r_phos, &y_prime) / distance_2d(&r_phos, &y_phos)) * lw_g;
        let ly_r = (distance_2d(&g_phos, &y_prime) / distance_2d(&g_phos, &y_phos)) * lw_r;
        let lc_g = (distance_2d(&b_phos, &c_prime) / distance_2d(&b_phos, &c_phos)) * lw_g;
        let lc_b = (distance_2d(&g_phos, &c_prime) / distance_2d(&g_phos, &c_phos)) * lw_b;

        // Normalize each secondary pair to the sum of its primaries'
        // normalized luminosities.
        let pair = lr_r_norm + lb_b_norm;
        let sum = lm_r + lm_b;
        let lm_r_norm = (lm_r / sum) * pair;
        let lm_b_norm = (lm_b / sum) * pair;

        let pair = lr_r_norm + lg_g_norm;
        let sum = ly_r + ly_g;
        let ly_r_norm = (ly_r / sum) * pair;
        let ly_g_norm = (ly_g / sum) * pair;

        let pair = lg_g_norm + lb_b_norm;
        let sum = lc_g + lc_b;
        let lc_g_norm = (lc_g / sum) * pair;
        let lc_b_norm = (lc_b / sum) * pair;

        // Correction values relative to the largest normalized luma for
        // each channel.
        let r_max = lw_r.max(lr_r_norm).max(lm_r_norm).max(ly_r_norm);
        let rw = lw_r / r_max;
        let rs = lr_r_norm / r_max;
        let ry = ly_r_norm / r_max;
        let rm = lm_r_norm / r_max;

        let g_max = lw_g.max(lg_g_norm).max(ly_g_norm).max(lc_g_norm);
        let gw = lw_g / g_max;
        let gs = lg_g_norm / g_max;
        let gy = ly_g_norm / g_max;
        let gc = lc_g_norm / g_max;

        let b_max = lw_b.max(lb_b_norm).max(lm_b_norm).max(lc_b_norm);
        let bw = lw_b / b_max;
        let bs = lb_b_norm / b_max;
        let bm = lm_b_norm / b_max;
        let bc = lc_b_norm / b_max;

        let matrices = [
            // S1: R > G > B
            Mat3::from_rows([
                [rs, ry - rs, rw - ry],
                [0.0, gy, gw - gy],
                [0.0, 0.0, bw],
            ]),
            // S2: G > R > B
            Mat3::from_rows([
                [ry, 0.0, rw - ry],
                [gy - gs, gs, gw - gy],
                [0.0, 0.0, bw],
            ]),
            // S3: G > B > R
            Mat3::from_rows([
                [rw, 0.0, 0.0],
                [gw - gc, gs, gc - gs],
                [bw - bc, 0.0, bc],
            ]),
            // S4: B > G > R
            Mat3::from_rows([
                [rw, 0.0, 0.0],
                [gw - gc, gc, 0.0],
                [bw - bc, bc - bs, bs],
            ]),
            // S5: B > R > G
            Mat3::from_rows([
                [rm, rw - rm, 0.0],
                [0.0, gw, 0.0],
                [bm - bs, bw - bm, bs],
            ]),
            // S6: R > B > G
            Mat3::from_rows([
                [rs, rw - rm, rm - rs],
                [0.0, gw, 0.0],
                [0.0, bw - bm, bm],
            ]),
            // S7: R == G > B
            Mat3::from_rows([
                [rs, ry - rs, rw - ry],
                [gy - gs, gs, gw - gy],
                [0.0, 0.0, bw],
            ]),
            // S8: G == B > R
            Mat3::from_rows([
                [rw, 0.0, 0.0],
                [gw - gc, gs, gc - gs],
                [bw - bc, bc - bs, bs],
            ]),
            // S9: R == B > G
            Mat3::from_rows([
                [rs, rw - rm, rm - rs],
                [0.0, gw, 0.0],
                [bm - bs, bw - bm, bs],
            ]),
            // S10: R > G == B
            Mat3::from_rows([
                [rs, rw - rs, 0.0],
                [0.0, gw, 0.0],
                [0.0, 0.0, bw],
            ]),
            // S11: G > R == B. The patent says Gw - Gc in the third
            // cell, unlike how the other primary lines are done;
            // suspected typo.
            Mat3::from_rows([
                [rw, 0.0, 0.0],
                [0.0, gs, gw - gs],
                [0.0, 0.0, bw],
            ]),
            // S12: B > R == G
            Mat3::from_rows([
                [rw, 0.0, 0.0],
                [0.0, gw, 0.0],
                [bw - bs, 0.0, bs],
            ]),
            // S13: R == G == B
            Mat3::from_rows([
                [rw, 0.0, 0.0],
                [0.0, gw, 0.0],
                [0.0, 0.0, bw],
            ]),
        ];
        Ok(matrices)
    }

    /// The largest-magnitude color-difference component of a linear RGB
    /// input: effectively "how close are we to a primary or secondary?"
    ///
    /// A crude measure, kept because this is what the correction
    /// circuits in old televisions actually keyed on, sometimes gamma
    /// corrected.
    #[must_use]
    pub fn find_max_p(&self, input: &Vec3) -> f64 {
        let red_factor = self.npm().at(1, 0);
        let green_factor = self.npm().at(1, 1);
        let blue_factor = self.npm().at(1, 2);

        let luminosity = blue_factor.mul_add(
            input.z,
            red_factor.mul_add(input.x, green_factor * input.y),
        );

        let pr = clamp01(((input.x - luminosity) / (1.0 - red_factor)).abs());
        let pg = clamp01(((input.y - luminosity) / (1.0 - green_factor)).abs());
        let pb = clamp01(((input.z - luminosity) / (1.0 - blue_factor)).abs());

        pr.max(pg).max(pb)
    }
}

/// Selects the Kinoshita matrix for an input by the exhaustive ordering
/// of its channels. Returns an index into the matrix array.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn kinoshita_select(input: &Vec3) -> usize {
    if input.x == input.y {
        if input.x == input.z {
            12 // R == G == B
        } else if input.x > input.z {
            6 // R == G > B
        } else {
            11 // B > R == G
        }
    } else if input.x > input.y {
        if input.y == input.z {
            9 // R > G == B
        } else if input.y > input.z {
            0 // R > G > B
        } else if input.x == input.z {
            8 // R == B > G
        } else if input.x > input.z {
            5 // R > B > G
        } else {
            4 // B > R > G
        }
    } else if input.x == input.z {
        10 // G > R == B
    } else if input.x > input.z {
        1 // G > R > B
    } else if input.y == input.z {
        7 // G == B > R
    } else if input.y > input.z {
        2 // G > B > R
    } else {
        3 // B > G > R
    }
}

/// Applies the region-selected Kinoshita matrix to an input.
#[must_use]
pub fn kinoshita_multiply(matrices: &[Mat3; 13], input: &Vec3) -> Vec3 {
    matrices[kinoshita_select(input)].transform(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_kinoshita_select_covers_orderings() {
        let cases = [
            (Vec3::from(0.9, 0.5, 0.1), 0),  // R > G > B
            (Vec3::from(0.5, 0.9, 0.1), 1),  // G > R > B
            (Vec3::from(0.1, 0.9, 0.5), 2),  // G > B > R
            (Vec3::from(0.1, 0.5, 0.9), 3),  // B > G > R
            (Vec3::from(0.5, 0.1, 0.9), 4),  // B > R > G
            (Vec3::from(0.9, 0.1, 0.5), 5),  // R > B > G
            (Vec3::from(0.9, 0.9, 0.1), 6),  // R == G > B
            (Vec3::from(0.1, 0.9, 0.9), 7),  // G == B > R
            (Vec3::from(0.9, 0.1, 0.9), 8),  // R == B > G
            (Vec3::from(0.9, 0.1, 0.1), 9),  // R > G == B
            (Vec3::from(0.1, 0.9, 0.1), 10), // G > R == B
            (Vec3::from(0.1, 0.1, 0.9), 11), // B > R == G
            (Vec3::from(0.5, 0.5, 0.5), 12), // R == G == B
        ];
        for (input, expected) in &cases {
            assert_eq!(kinoshita_select(input), *expected, "input {input:?}");
        }
    }

    #[test]
    fn test_luminance_search_pins_channel() {
        let gamut = testutil::srgb_source();
        let [red, _, _] = gamut.primaries();
        let (rgb, y) = gamut.xyy_luminance_search(red.x, red.y, LockChannel::Red);
        assert!((rgb.x - 1.0).abs() < 1e-12);
        // At the red primary's own chromaticity, the other channels
        // vanish and Y is the red luminance weight.
        assert!(rgb.y.abs() < 1e-6);
        assert!(rgb.z.abs() < 1e-6);
        assert!((y - gamut.npm().at(1, 0)).abs() < 1e-6);
    }

    #[test]
    fn test_chunghwa_identity_for_same_gamut() {
        let source = testutil::srgb_source();
        let dest = testutil::srgb_dest();
        let matrix = dest.chunghwa_matrix(source);
        for row in 0..3 {
            for col in 0..3 {
                let expected = if row == col { 1.0 } else { 0.0 };
                assert!(
                    (matrix.at(row, col) - expected).abs() < 1e-6,
                    "({row},{col}) = {}",
                    matrix.at(row, col)
                );
            }
        }
    }

    #[test]
    fn test_kinoshita_gray_matrix_is_diagonal() {
        let source = testutil::ntscj_source();
        let dest = testutil::srgb_dest_for_ntscj();
        let matrices = source.kinoshita_matrices(dest).unwrap();
        // S13 applies to neutral input and is purely diagonal.
        let s13 = &matrices[12];
        assert!(s13.at(0, 1).abs() < 1e-12);
        assert!(s13.at(0, 2).abs() < 1e-12);
        assert!(s13.at(1, 0).abs() < 1e-12);
        assert!(s13.at(1, 2).abs() < 1e-12);
        assert!(s13.at(2, 0).abs() < 1e-12);
        assert!(s13.at(2, 1).abs() < 1e-12);
        // The diagonal entries are gains in (0, 1].
        for i in 0..3 {
            assert!(s13.at(i, i) > 0.0 && s13.at(i, i) <= 1.0);
        }
    }

    #[test]
    fn test_max_p_on_neutral_and_primary() {
        let gamut = testutil::srgb_source();
        let neutral = gamut.find_max_p(&Vec3::from(0.5, 0.5, 0.5));
        assert!(neutral.abs() < 1e-12);
        let primary = gamut.find_max_p(&Vec3::from(1.0, 0.0, 0.0));
        assert!(primary > 0.9);
    }
}
