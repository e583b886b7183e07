// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Spiral CARISMA, the hue-rotation pre-pass.
//!
//! A source primary or secondary that cannot be represented in the
//! destination gamut is sometimes better served by rotating its hue to
//! the matching destination primary than by compressing in place. The
//! rotation is discovered per anchor, interpolated across hues by arc
//! fraction, scaled by chroma, and precomputed into a per-slice warp
//! map consulted by the boundary queries.

use serde::{Deserialize, Serialize};

use super::boundary::BoundKind;
use super::{hue_to_floor_index, GamutDescriptor, HALF_HUE_PER_STEP, HUE_PER_STEP, HUE_STEPS};
use crate::mapping::{map_color, MapDirection, MappingParams};
use crate::math::vec3::{depolarize, distance_3d};
use crate::math::Vec3;
use crate::util::{
    angle_add, angle_diff, clamp01, cubic_hermite_map, inverse_cubic_hermite_map,
    inverse_power_map, power_map,
};

/// How the rotation ramps up between the chroma floor and ceiling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    /// `t^exponent` ramp.
    Exponential,
    /// Cubic hermite smoothstep ramp.
    #[default]
    CubicHermite,
}

/// Spiral CARISMA tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpiralConfig {
    /// No rotation below this fraction of the cusp chroma.
    pub floor: f64,
    /// Full rotation above this fraction of the cusp chroma.
    pub ceiling: f64,
    /// Exponent for the exponential scale mode.
    pub exponent: f64,
    pub scale_mode: ScaleMode,
    /// Global multiplier on all anchor rotations, in (0, 1].
    pub max_scale: f64,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            floor: 0.7,
            ceiling: 1.0,
            exponent: 1.0,
            scale_mode: ScaleMode::CubicHermite,
            max_scale: 1.0,
        }
    }
}

/// "In `target_slice`, chroma in `(floor, ceiling]` is served by slice
/// `slice`'s boundary rather than the target's own."
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpRange {
    pub slice: usize,
    pub floor: f64,
    pub ceiling: f64,
}

/// Precomputed Spiral CARISMA state for one gamut descriptor.
#[derive(Debug, Default, Clone)]
pub struct SpiralTables {
    pub(crate) enabled: bool,
    /// Primary/secondary anchors in chain order: red, yellow, green,
    /// cyan, blue, magenta.
    pub(crate) anchors: [Vec3; 6],
    pub(crate) rotations: [f64; 6],
    pub(crate) floor: f64,
    pub(crate) ceiling: f64,
    pub(crate) exponent: f64,
    pub(crate) mode: ScaleMode,
    pub(crate) rotation_needed: Vec<bool>,
    pub(crate) self_warp: Vec<WarpRange>,
    pub(crate) impingers: Vec<Vec<WarpRange>>,
}

impl SpiralTables {
    pub(crate) fn init_anchors(&mut self, anchors: &[Vec3; 6]) {
        self.anchors = *anchors;
    }

    pub(crate) fn reset(&mut self, steps: usize) {
        self.rotations = [0.0; 6];
        self.rotation_needed = vec![false; steps];
        self.self_warp = (0..steps)
            .map(|slice| WarpRange {
                slice,
                floor: 0.0,
                ceiling: f64::MAX,
            })
            .collect();
        self.impingers = vec![Vec::new(); steps];
    }
}

impl GamutDescriptor {
    /// Stores the chroma-scaling parameters and marks the warp map as
    /// live.
    pub fn init_spiral(&mut self, config: &SpiralConfig) {
        self.spiral.enabled = true;
        self.spiral.floor = config.floor;
        self.spiral.ceiling = config.ceiling;
        self.spiral.exponent = config.exponent;
        self.spiral.mode = config.scale_mode;
    }

    /// The signed anchor rotations, in chain order.
    #[must_use]
    pub const fn anchor_rotations(&self) -> &[f64; 6] {
        &self.spiral.rotations
    }

    /// Discovers the rotation for each primary/secondary anchor.
    ///
    /// An anchor already representable in the destination rotates by
    /// zero. Otherwise its straight compressed image is compared
    /// against rotate-then-compress candidates at stepped angles up to
    /// the matching destination anchor's hue; the best rotation wins
    /// only if it beats compressing in place.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn compute_primary_rotations(
        &self,
        other: &Self,
        params: &MappingParams,
    ) -> [f64; 6] {
        let mut params = params.clone();
        params.spiral = false;
        let mut rotations = [0.0_f64; 6];

        for index in 0..6 {
            let source_anchor = self.spiral.anchors[index];
            let dest_anchor = other.spiral.anchors[index];

            let (in_bounds, _) = other.is_jzczhz_in_bounds(&source_anchor);
            if in_bounds {
                continue;
            }

            // Straight compression, via the full mapper.
            let source_rgb = self.jzczhz_to_linear_rgb(&source_anchor);
            let compressed =
                self.linear_rgb_to_jzczhz(&map_color(&source_rgb, self, other, &params));
            let cart_anchor = depolarize(&source_anchor);
            let no_move_distance = distance_3d(&depolarize(&compressed), &cart_anchor);

            // Rotation candidates cannot use the mapper because the warp
            // map does not exist yet, but anchors lie on the source
            // boundary and therefore land on the destination boundary,
            // so the boundary query substitutes. Check roughly twice per
            // hue step; the sampling is not precise enough for more.
            let max_angle = angle_diff(dest_anchor.z, source_anchor.z);
            let mut steps = ((max_angle.abs() / HALF_HUE_PER_STEP) + 0.5) as i32;
            if steps < 1 {
                steps = 1;
            }
            let step_size = max_angle / f64::from(steps);

            let mut best_distance = no_move_distance;
            let mut best_angle = 0.0;
            let mut rotate_better = false;
            for j in 1..=steps {
                // Land the final iteration exactly on the destination
                // anchor.
                let (angle, new_hue) = if j == steps {
                    (max_angle, dest_anchor.z)
                } else {
                    let angle = f64::from(j) * step_size;
                    (angle, angle_add(source_anchor.z, angle))
                };
                let rotated = Vec3::from(source_anchor.x, source_anchor.y, new_hue);
                let (floor_index, weight) = hue_to_floor_index(rotated.z);
                let cusp_luma = other.cusp_luma_at(floor_index, weight);

                let compressed_rotated = match params.direction {
                    MapDirection::Cusp => {
                        other.boundary_3d(&rotated, cusp_luma, floor_index, BoundKind::Normal, false)
                    }
                    MapDirection::Hlpcm => {
                        other.boundary_3d(&rotated, rotated.x, floor_index, BoundKind::Normal, false)
                    }
                    MapDirection::Vp | MapDirection::Vpr | MapDirection::Vprc => {
                        if j == steps && rotated.x >= dest_anchor.x {
                            // Above the cusp at full rotation means
                            // exactly the destination anchor.
                            dest_anchor
                        } else if rotated.x >= cusp_luma {
                            let cusp_chroma = other.cusp_chroma_at(floor_index, weight);
                            Vec3::from(cusp_luma, cusp_chroma, rotated.z)
                        } else {
                            other.boundary_3d(
                                &rotated,
                                rotated.x,
                                floor_index,
                                BoundKind::Normal,
                                false,
                            )
                        }
                    }
                };

                let move_distance = distance_3d(&depolarize(&compressed_rotated), &cart_anchor);
                if move_distance < best_distance {
                    best_distance = move_distance;
                    best_angle = angle;
                    rotate_better = true;
                }
            }

            if rotate_better {
                rotations[index] = best_angle;
                log::debug!(
                    "anchor {index} of {} rotates {best_angle:.6} rad (of {max_angle:.6})",
                    self.name()
                );
            }
        }

        rotations
    }

    /// Stores the anchor rotations, scaled by `max_scale`.
    pub fn apply_primary_rotations(&mut self, rotations: [f64; 6], max_scale: f64) {
        for (slot, rotation) in self.spiral.rotations.iter_mut().zip(rotations.iter()) {
            *slot = rotation * max_scale;
        }
    }

    /// The maximum (full-chroma) rotation at a hue, interpolated between
    /// the two enclosing anchors by arc fraction.
    #[must_use]
    pub(crate) fn find_hue_max_rotation(&self, hue: f64) -> f64 {
        let anchors = &self.spiral.anchors;
        // Segment selection assumes anchor hues ascend around the chain.
        let start = if hue < anchors[0].z {
            5
        } else if hue < anchors[1].z {
            0
        } else if hue < anchors[2].z {
            1
        } else if hue < anchors[3].z {
            2
        } else if hue < anchors[4].z {
            3
        } else if hue < anchors[5].z {
            4
        } else {
            5
        };
        let end = (start + 1) % 6;

        let this_distance = angle_diff(hue, anchors[start].z);
        let full_distance = angle_diff(anchors[end].z, anchors[start].z);
        let base = self.spiral.rotations[start];
        let delta = self.spiral.rotations[end] - self.spiral.rotations[start];
        (this_distance / full_distance).mul_add(delta, base)
    }

    /// The rotation to apply to one JzCzhz color.
    #[must_use]
    pub fn find_hue_rotation(&self, color: &Vec3) -> f64 {
        let (floor_index, weight) = hue_to_floor_index(color.z);
        let cusp_chroma = self.cusp_chroma_at(floor_index, weight);

        let chroma_fraction = (color.y / cusp_chroma).min(1.0);
        if chroma_fraction <= self.spiral.floor {
            return 0.0;
        }

        let max_rotation = self.find_hue_max_rotation(color.z);
        if chroma_fraction >= self.spiral.ceiling {
            return max_rotation;
        }

        let scale = match self.spiral.mode {
            ScaleMode::Exponential => power_map(
                self.spiral.floor,
                self.spiral.ceiling,
                chroma_fraction,
                self.spiral.exponent,
            ),
            ScaleMode::CubicHermite => {
                cubic_hermite_map(self.spiral.floor, self.spiral.ceiling, chroma_fraction)
            }
        };
        max_rotation * scale
    }

    /// Precomputes which slices rotate into which other slices over
    /// which chroma ranges, effectively building a warped boundary.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn warp_boundaries(&mut self) {
        let mut rotation_needed = vec![false; HUE_STEPS];
        let mut self_warp: Vec<WarpRange> = (0..HUE_STEPS)
            .map(|slice| WarpRange {
                slice,
                floor: 0.0,
                ceiling: f64::MAX,
            })
            .collect();
        let mut impingers: Vec<Vec<WarpRange>> = vec![Vec::new(); HUE_STEPS];

        for huestep in 0..HUE_STEPS {
            let hue = huestep as f64 * HUE_PER_STEP;
            let max_rotation = self.find_hue_max_rotation(hue);
            let magnitude = max_rotation.abs();
            let negative = max_rotation < 0.0;
            // Truncation rounds down to the count of whole slices moved.
            let impinged = (magnitude / HUE_PER_STEP) as usize;
            if impinged == 0 {
                continue;
            }
            rotation_needed[huestep] = true;

            let mut ceiling_chroma = 0.0;
            for i in 0..=impinged {
                let floor_chroma = ceiling_chroma;
                ceiling_chroma = if i == impinged {
                    // The sub-range containing the max rotation is
                    // unbounded.
                    f64::MAX
                } else {
                    // Invert the rotation-vs-chroma ramp to find the
                    // chroma where the next whole-slice step begins.
                    let step_rotation = HUE_PER_STEP * (i + 1) as f64;
                    let rotation_fraction = step_rotation / magnitude;
                    let scale = match self.spiral.mode {
                        ScaleMode::Exponential => inverse_power_map(
                            self.spiral.floor,
                            self.spiral.ceiling,
                            rotation_fraction,
                            self.spiral.exponent,
                        ),
                        ScaleMode::CubicHermite => inverse_cubic_hermite_map(
                            self.spiral.floor,
                            self.spiral.ceiling,
                            rotation_fraction,
                        ),
                    };
                    clamp01(scale) * self.cusp_chroma[huestep]
                };

                if i == 0 {
                    self_warp[huestep] = WarpRange {
                        slice: huestep,
                        floor: floor_chroma,
                        ceiling: ceiling_chroma,
                    };
                } else if ceiling_chroma != floor_chroma {
                    // A ramp steep enough to skip a slice entirely is
                    // skipped here too, keeping per-slice maxima
                    // contiguous.
                    let target = if negative {
                        (huestep + HUE_STEPS - i) % HUE_STEPS
                    } else {
                        (huestep + i) % HUE_STEPS
                    };
                    impingers[target].push(WarpRange {
                        slice: huestep,
                        floor: floor_chroma,
                        ceiling: ceiling_chroma,
                    });
                }
            }
        }

        self.spiral.rotation_needed = rotation_needed;
        self.spiral.self_warp = self_warp;
        self.spiral.impingers = impingers;
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil;

    #[test]
    fn test_anchor_hues_ascend() {
        let gamut = testutil::srgb_source();
        let anchors = &gamut.spiral.anchors;
        for pair in anchors.windows(2) {
            assert!(
                pair[0].z < pair[1].z,
                "anchor hues out of order: {} then {}",
                pair[0].z,
                pair[1].z
            );
        }
    }

    #[test]
    fn test_no_rotation_without_anchors_set() {
        let gamut = testutil::srgb_source();
        // All rotations default to zero, so the warp map is inert.
        let rotation = gamut.find_hue_max_rotation(1.0);
        assert!(rotation.abs() < 1e-12);
    }

    #[test]
    fn test_identical_gamuts_need_no_rotation() {
        let source = testutil::srgb_source();
        let dest = testutil::srgb_dest();
        let rotations =
            source.compute_primary_rotations(dest, &testutil::default_compress_params());
        for rotation in &rotations {
            assert!(rotation.abs() < 1e-12, "unexpected rotation {rotation}");
        }
    }
}
