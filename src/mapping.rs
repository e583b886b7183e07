// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The gamut mapping engine: chromatic compression and expansion along
//! per-algorithm focal rays, with a hard or soft knee.

use serde::{Deserialize, Serialize};

use crate::gamut::boundary::BoundKind;
use crate::gamut::{hue_to_floor_index, GamutDescriptor};
use crate::math::{Vec2, Vec3};
use crate::util::angle_add;

/// Which focal-point convention maps each color.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapDirection {
    /// Map along the ray toward the destination cusp's luma.
    #[default]
    Cusp,
    /// Hue-linear: map horizontally at the color's own luma.
    Hlpcm,
    /// Two-step: toward black, then horizontally.
    Vp,
    /// VP with reversed step order.
    Vpr,
    /// VPR with the compression first step aimed at the destination
    /// cusp luma instead of horizontal.
    Vprc,
}

/// How the safe zone is chosen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafeZone {
    /// Su, Tao & Kim's approach: the remap zone is relative to the
    /// difference between the gamuts.
    #[default]
    ConstDetail,
    /// Traditional: the remap zone is relative to the destination
    /// gamut, ignoring `remap_factor`.
    ConstFidelity,
}

/// Knobs consumed by [`map_color`] and [`scale_distance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingParams {
    /// Apply inverse compression where the destination exceeds the
    /// source.
    pub expand: bool,
    /// Size of the remap zone relative to the difference between the
    /// gamuts.
    pub remap_factor: f64,
    /// Size of the safe zone relative to the destination gamut;
    /// overrides `remap_factor` when it bites.
    pub remap_limit: f64,
    pub soft_knee: bool,
    /// Size of the soft knee relative to the remap zone, half on each
    /// side of the knee point.
    pub knee_factor: f64,
    pub direction: MapDirection,
    pub safe_zone: SafeZone,
    /// Consult the Spiral CARISMA warp map and rotate input hues.
    pub spiral: bool,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            expand: false,
            remap_factor: 0.4,
            remap_limit: 0.8,
            soft_knee: true,
            knee_factor: 0.2,
            direction: MapDirection::Cusp,
            safe_zone: SafeZone::ConstDetail,
            spiral: false,
        }
    }
}

struct StepPlan {
    focal_luma: f64,
    kind: BoundKind,
    skip: bool,
}

fn remap_step(
    working: &mut Vec3,
    plan: &StepPlan,
    source: &GamutDescriptor,
    dest: &GamutDescriptor,
    floor_index: usize,
    params: &MappingParams,
) {
    if plan.skip {
        return;
    }

    let color_cj = Vec2::from(working.y, working.x);
    let focal_point = Vec2::from(0.0, plan.focal_luma);

    let source_bound_3d =
        source.boundary_3d(working, plan.focal_luma, floor_index, plan.kind, params.spiral);
    let source_bound = Vec2::from(source_bound_3d.y, source_bound_3d.x);
    let dest_bound_3d = dest.boundary_3d(working, plan.focal_luma, floor_index, plan.kind, false);
    let dest_bound = Vec2::from(dest_bound_3d.y, dest_bound_3d.x);

    let to_color = color_cj - focal_point;
    let distance_color = to_color.magnitude();
    let mut distance_source = (source_bound - focal_point).magnitude();
    let distance_dest = (dest_bound - focal_point).magnitude();
    // A color outside the sampled source boundary is a sampling error;
    // treat the color itself as on the boundary.
    if distance_color > distance_source {
        distance_source = distance_color;
    }

    let (new_distance, changed) = scale_distance(
        distance_color,
        distance_source,
        distance_dest,
        params.expand,
        params.remap_factor,
        params.remap_limit,
        params.soft_knee,
        params.knee_factor,
        params.safe_zone,
    );

    if changed {
        let new_point = focal_point + (to_color.normalized() * new_distance);
        working.x = new_point.y;
        working.y = new_point.x;
    }
}

/// Maps one linear RGB color from the source gamut into the destination
/// gamut.
///
/// Pure black and pure white pass through untouched.
#[must_use]
pub fn map_color(
    color: &Vec3,
    source: &GamutDescriptor,
    dest: &GamutDescriptor,
    params: &MappingParams,
) -> Vec3 {
    if color.nearly_equal(&Vec3::from(0.0, 0.0, 0.0))
        || color.nearly_equal(&Vec3::from(1.0, 1.0, 1.0))
    {
        return *color;
    }

    let mut working = source.linear_rgb_to_jzczhz(color);

    if params.spiral {
        let rotation = source.find_hue_rotation(&working);
        working.z = angle_add(working.z, rotation);
    }

    let (floor_index, ceil_weight) = hue_to_floor_index(working.z);
    let cusp_luma = dest.cusp_luma_at(floor_index, ceil_weight);

    // Step one. The focal luma is the destination cusp for CUSP, the
    // color's own luma for HLPCM, and step-dependent for the VP family.
    let plan = match params.direction {
        MapDirection::Cusp => StepPlan {
            focal_luma: cusp_luma,
            kind: BoundKind::Normal,
            skip: false,
        },
        MapDirection::Hlpcm => StepPlan {
            focal_luma: working.x,
            kind: BoundKind::Normal,
            skip: false,
        },
        MapDirection::Vp => {
            if params.expand {
                // Inverse first step maps horizontally, only below the
                // source's cusp.
                let source_cusp_luma = source.cusp_luma_at(floor_index, ceil_weight);
                StepPlan {
                    focal_luma: working.x,
                    kind: BoundKind::Normal,
                    skip: working.x > source_cusp_luma,
                }
            } else {
                StepPlan {
                    focal_luma: 0.0,
                    kind: BoundKind::Above,
                    skip: false,
                }
            }
        }
        MapDirection::Vpr => {
            if params.expand {
                StepPlan {
                    focal_luma: 0.0,
                    kind: BoundKind::Above,
                    skip: false,
                }
            } else {
                StepPlan {
                    focal_luma: working.x,
                    kind: BoundKind::Below,
                    skip: false,
                }
            }
        }
        MapDirection::Vprc => {
            if params.expand {
                StepPlan {
                    focal_luma: 0.0,
                    kind: BoundKind::Above,
                    skip: false,
                }
            } else {
                StepPlan {
                    focal_luma: cusp_luma,
                    kind: BoundKind::Below,
                    skip: false,
                }
            }
        }
    };
    remap_step(&mut working, &plan, source, dest, floor_index, params);

    // The VP family has a symmetric second step.
    if matches!(
        params.direction,
        MapDirection::Vp | MapDirection::Vpr | MapDirection::Vprc
    ) {
        let plan = match params.direction {
            MapDirection::Vp => {
                if params.expand {
                    StepPlan {
                        focal_luma: 0.0,
                        kind: BoundKind::Above,
                        skip: false,
                    }
                } else {
                    // Applied only below the destination's cusp.
                    StepPlan {
                        focal_luma: working.x,
                        kind: BoundKind::Normal,
                        skip: working.x > cusp_luma,
                    }
                }
            }
            MapDirection::Vpr => {
                if params.expand {
                    StepPlan {
                        focal_luma: working.x,
                        kind: BoundKind::Below,
                        skip: false,
                    }
                } else {
                    StepPlan {
                        focal_luma: 0.0,
                        kind: BoundKind::Above,
                        skip: false,
                    }
                }
            }
            MapDirection::Vprc => {
                if params.expand {
                    StepPlan {
                        focal_luma: cusp_luma,
                        kind: BoundKind::Below,
                        skip: false,
                    }
                } else {
                    StepPlan {
                        focal_luma: 0.0,
                        kind: BoundKind::Above,
                        skip: false,
                    }
                }
            }
            MapDirection::Cusp | MapDirection::Hlpcm => unreachable!(),
        };
        remap_step(&mut working, &plan, source, dest, floor_index, params);
    }

    dest.jzczhz_to_linear_rgb(&working)
}

/// Scales the distance from the focal point to a color.
///
/// Returns the new distance and whether anything changed; when nothing
/// changed the caller discards the result to avoid accumulating
/// floating point error.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn scale_distance(
    distance_color: f64,
    distance_source: f64,
    distance_dest: f64,
    expand: bool,
    remap_factor: f64,
    remap_limit: f64,
    soft_knee: bool,
    knee_factor: f64,
    safe_zone: SafeZone,
) -> (f64, bool) {
    let (outer, inner) = if distance_source > distance_dest {
        (distance_source, distance_dest)
    } else {
        (distance_dest, distance_source)
    };

    let out_of_bounds_zone = outer - inner;
    let mut remap_zone = out_of_bounds_zone * remap_factor;
    let mut knee_point = inner - remap_zone;
    let alt_knee = inner * remap_limit;
    if alt_knee > knee_point || safe_zone == SafeZone::ConstFidelity {
        knee_point = alt_knee;
        remap_zone = inner - knee_point;
    }
    let knee_width = remap_zone * knee_factor;
    let half_knee_width = knee_width * 0.5;
    let mut safe_zone_bound = if soft_knee {
        knee_point - half_knee_width
    } else {
        knee_point
    };

    // The knee must not dip below the focal point.
    if safe_zone_bound < 0.0 {
        let oops = -safe_zone_bound;
        safe_zone_bound += oops;
        knee_point += oops;
        remap_zone -= oops;
    }

    let knee_top = if soft_knee {
        knee_point + half_knee_width
    } else {
        knee_point
    };
    let slope = remap_zone / (remap_zone + out_of_bounds_zone);

    let mut new_distance = distance_color;
    let mut changed = false;

    if distance_color > safe_zone_bound {
        if distance_dest < distance_source {
            // Compression.
            //
            // Soft knee form, with T the threshold, W the knee width,
            // and S the compressed slope:
            //   y = x                                   if x < T - W/2
            //   y = x + ((S-1)*(x - T + W/2)^2)/2W      if |x - T| <= W/2
            //   y = T + (x-T)*S                         if x > T + W/2
            if distance_color > knee_top || !soft_knee {
                new_distance = (distance_color - knee_point).mul_add(slope, knee_point);
            } else {
                new_distance = distance_color
                    + ((slope - 1.0) * (distance_color - knee_point - half_knee_width).powi(2))
                        / (2.0 * knee_width);
            }
            changed = true;
        } else if distance_dest > distance_source && expand {
            // Expansion: the algebraic inverse of the piecewise above.
            let knee_top_ex = if soft_knee {
                // The inverse's breakpoint is the forward function
                // evaluated at the original breakpoint.
                (knee_top - knee_point).mul_add(slope, knee_point)
            } else {
                knee_point
            };

            if distance_color > knee_top_ex || !soft_knee {
                new_distance = ((distance_color - knee_point) / slope) + knee_point;
            } else {
                // Inverting the soft region means solving a quadratic;
                // of the two roots, keep the one nearer the input.
                let term1 = ((2.0 * slope * knee_point * knee_width)
                    + (slope * knee_width.powi(2))
                    - (2.0 * knee_point * knee_width)
                    - knee_width.powi(2)
                    - 2.0)
                    / (2.0 * (slope - 1.0) * knee_width);
                let term2 = ((-2.0 * slope * knee_point * knee_width)
                    - (slope * knee_width.powi(2))
                    + (2.0 * slope * knee_width * distance_color)
                    + (2.0 * knee_point * knee_width)
                    + knee_width.powi(2)
                    - (2.0 * knee_width * distance_color)
                    + 1.0)
                    .sqrt();
                let term3 = (slope - 1.0) * knee_width;
                let plus_candidate = term1 + (term2 / term3);
                let minus_candidate = term1 - (term2 / term3);
                new_distance =
                    if (plus_candidate - distance_color).abs() < (minus_candidate - distance_color).abs() {
                        plus_candidate
                    } else {
                        minus_candidate
                    };
            }
            changed = true;
        }
    }

    (new_distance, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::util::EPSILON;

    #[test]
    fn test_safe_zone_untouched() {
        let (distance, changed) = scale_distance(
            0.1,
            1.0,
            0.8,
            false,
            0.4,
            0.8,
            true,
            0.2,
            SafeZone::ConstDetail,
        );
        assert!(!changed);
        assert!((distance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_compression_pulls_inside() {
        // Source reaches 1.2, destination only 1.0; a color at the
        // source boundary must land on or inside the destination.
        let (distance, changed) = scale_distance(
            1.2,
            1.2,
            1.0,
            false,
            0.4,
            0.8,
            true,
            0.2,
            SafeZone::ConstDetail,
        );
        assert!(changed);
        assert!(distance <= 1.0 + 1e-9, "distance {distance}");
    }

    #[test]
    fn test_hard_knee_is_piecewise_linear() {
        let (at_boundary, _) = scale_distance(
            1.2,
            1.2,
            1.0,
            false,
            0.4,
            0.8,
            false,
            0.0,
            SafeZone::ConstDetail,
        );
        assert!((at_boundary - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_expand_inverts_compress() {
        // Round trip: compress against (source 1.2, dest 1.0), then
        // expand against the mirrored pair.
        for &x in &[0.95, 1.0, 1.05, 1.15, 1.2] {
            let (compressed, _) = scale_distance(
                x,
                1.2,
                1.0,
                false,
                0.4,
                0.8,
                true,
                0.2,
                SafeZone::ConstDetail,
            );
            let (expanded, _) = scale_distance(
                compressed,
                1.0,
                1.2,
                true,
                0.4,
                0.8,
                true,
                0.2,
                SafeZone::ConstDetail,
            );
            assert!(
                (expanded - x).abs() < 1e-9,
                "x {x}, compressed {compressed}, expanded {expanded}"
            );
        }
    }

    #[test]
    fn test_const_fidelity_uses_remap_limit() {
        // With const-fidelity the knee sits at inner * remap_limit even
        // when the gamut difference is small.
        let (distance, changed) = scale_distance(
            0.9,
            1.0,
            0.99,
            false,
            0.4,
            0.8,
            false,
            0.0,
            SafeZone::ConstFidelity,
        );
        assert!(changed);
        assert!(distance < 0.9);
    }

    #[test]
    fn test_map_black_and_white_bypass() {
        let source = testutil::srgb_source();
        let dest = testutil::srgb_dest();
        let params = testutil::default_compress_params();
        let black = map_color(&Vec3::from(0.0, 0.0, 0.0), source, dest, &params);
        assert_eq!(black, Vec3::from(0.0, 0.0, 0.0));
        let white = map_color(&Vec3::from(1.0, 1.0, 1.0), source, dest, &params);
        assert_eq!(white, Vec3::from(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_identity_mapping_is_identity() {
        let source = testutil::srgb_source();
        let dest = testutil::srgb_dest();
        let params = testutil::default_compress_params();
        let samples = [
            Vec3::from(0.5, 0.25, 0.125),
            Vec3::from(0.9, 0.1, 0.2),
            Vec3::from(0.1, 0.8, 0.6),
        ];
        for rgb in &samples {
            let out = map_color(rgb, source, dest, &params);
            assert!(
                (out.x - rgb.x).abs() < 1e-4
                    && (out.y - rgb.y).abs() < 1e-4
                    && (out.z - rgb.z).abs() < 1e-4,
                "rgb {rgb:?} out {out:?}"
            );
        }
    }

    #[test]
    fn test_hlpcm_preserves_luma() {
        let source = testutil::ntscj_source();
        let dest = testutil::srgb_dest_for_ntscj();
        let params = MappingParams {
            direction: MapDirection::Hlpcm,
            ..testutil::default_compress_params()
        };
        let rgb = Vec3::from(0.8, 0.2, 0.3);
        let before = source.linear_rgb_to_jzczhz(&rgb);
        let out = map_color(&rgb, source, dest, &params);
        let after = dest.linear_rgb_to_jzczhz(&out);
        assert!(
            (before.x - after.x).abs() < 1e-6,
            "luma {} became {}",
            before.x,
            after.x
        );
    }

    #[test]
    fn test_vp_round_trip_in_gamut_color() {
        // An in-gamut color compressed then expanded back lands where
        // it started, within tolerance of the boundary sampling.
        let source = testutil::ntscj_source();
        let dest = testutil::srgb_dest_for_ntscj();
        let compress = MappingParams {
            direction: MapDirection::Vp,
            soft_knee: false,
            knee_factor: 0.0,
            ..testutil::default_compress_params()
        };
        let rgb = Vec3::from(0.5, 0.4, 0.3);
        let compressed = map_color(&rgb, source, dest, &compress);
        let expand = MappingParams {
            expand: true,
            ..compress
        };
        let back = map_color(&compressed, dest, source, &expand);
        assert!(
            (back.x - rgb.x).abs() < 5e-3
                && (back.y - rgb.y).abs() < 5e-3
                && (back.z - rgb.z).abs() < 5e-3,
            "rgb {rgb:?} compressed {compressed:?} back {back:?}"
        );
    }

    #[test]
    fn test_ntscj_red_compresses_inward() {
        let source = testutil::ntscj_source();
        let dest = testutil::srgb_dest_for_ntscj();
        let params = testutil::default_compress_params();
        let out = map_color(&Vec3::from(1.0, 0.0, 0.0), source, dest, &params);
        // NTSC-J red overshoots sRGB; compression must bring all
        // channels into (or very near) range.
        for channel in [out.x, out.y, out.z] {
            assert!(channel > -0.02 && channel < 1.02, "channel {channel}");
        }
    }

    #[test]
    fn test_scale_distance_monotonic() {
        let mut last = 0.0;
        for i in 0..=24 {
            let x = f64::from(i) * 0.05;
            let (y, _) = scale_distance(
                x,
                1.2,
                1.0,
                false,
                0.4,
                0.8,
                true,
                0.2,
                SafeZone::ConstDetail,
            );
            assert!(y >= last - EPSILON, "not monotonic at {x}: {y} < {last}");
            last = y;
        }
    }
}
