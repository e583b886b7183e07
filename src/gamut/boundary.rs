// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Ray/boundary queries against the sampled hue slices.

use serde::{Deserialize, Serialize};

use super::{GamutDescriptor, HUE_PER_STEP, HUE_STEPS};
use crate::math::plane::{line_plane_intersection, Plane};
use crate::math::vec2::{
    is_between_2d, line_intersection_2d, slow_is_between_2d,
};
use crate::math::vec3::{depolarize, polarize};
use crate::math::{Vec2, Vec3};
use crate::util::EPSILON_ZERO;

/// Which rendition of the slice polyline a boundary query walks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundKind {
    /// The full polyline from black to white.
    #[default]
    Normal,
    /// Only the polyline above the cusp, extended from the cusp through
    /// the lower extrapolation point. Used when mapping toward black.
    Above,
    /// The polyline below the cusp, entered through the upper
    /// extrapolation point.
    Below,
}

impl GamutDescriptor {
    /// Segment list for one slice under a bound kind.
    ///
    /// Segments are ordered from the white end toward black so that a
    /// ray whose focal point sits at or near black meets the real
    /// boundary before it meets the black vertex.
    fn boundary_segments(&self, hue_index: usize, kind: BoundKind) -> Vec<(Vec2, Vec2)> {
        let points = &self.slices[hue_index];
        let count = points.len();
        let mut segments = Vec::with_capacity(count);
        let mut found_cusp = false;
        for i in (0..count - 1).rev() {
            let whiter = Vec2::from(points[i + 1].chroma, points[i + 1].luma);
            let blacker = Vec2::from(points[i].chroma, points[i].luma);
            match kind {
                BoundKind::Normal => segments.push((whiter, blacker)),
                BoundKind::Above => {
                    if points[i + 1].is_cusp {
                        segments.push((whiter, self.fake_lower[hue_index]));
                        break;
                    }
                    segments.push((whiter, blacker));
                }
                BoundKind::Below => {
                    if found_cusp {
                        segments.push((whiter, blacker));
                    } else if points[i].is_cusp {
                        found_cusp = true;
                        segments.push((self.fake_upper[hue_index], blacker));
                    }
                }
            }
        }
        segments
    }

    /// Where the line from the focal point (chroma 0, `focal_luma`)
    /// through `color` exits the 2D boundary of slice `hue_index`.
    ///
    /// Runs up to three passes for floating-point robustness: strict
    /// betweenness, epsilon-relaxed betweenness over the saved
    /// intersections, and finally the intersection closest to a segment
    /// endpoint.
    #[must_use]
    pub fn boundary_2d(
        &self,
        color: &Vec2,
        focal_luma: f64,
        hue_index: usize,
        kind: BoundKind,
    ) -> Vec2 {
        let focal_point = Vec2::from(0.0, focal_luma);
        let segments = self.boundary_segments(hue_index, kind);

        // Pass 1: strict intersection test, saving candidates.
        let mut intersections: Vec<Option<Vec2>> = Vec::with_capacity(segments.len());
        for (bound1, bound2) in &segments {
            let candidate = line_intersection_2d(&focal_point, color, bound1, bound2);
            if let Some(hit) = candidate {
                if is_between_2d(bound1, &hit, bound2) {
                    return hit;
                }
            }
            intersections.push(candidate);
        }

        // Pass 2: a floating point error probably made the strict test
        // lie; retry relaxed.
        for ((bound1, bound2), candidate) in segments.iter().zip(intersections.iter()) {
            if let Some(hit) = candidate {
                if slow_is_between_2d(bound1, hit, bound2) {
                    return *hit;
                }
            }
        }

        // Pass 3: take the intersection that falls closest to a
        // segment endpoint.
        let mut best_distance = f64::MAX;
        let mut best_point = Vec2::new();
        for ((bound1, bound2), candidate) in segments.iter().zip(intersections.iter()) {
            let Some(hit) = candidate else {
                continue;
            };
            let to_first = (*hit - *bound1).magnitude();
            if to_first < best_distance {
                best_distance = to_first;
                best_point = *hit;
            }
            let to_second = (*bound2 - *hit).magnitude();
            if to_second < best_distance {
                best_distance = to_second;
                best_point = *hit;
            }
        }
        if best_distance > EPSILON_ZERO {
            log::warn!(
                "boundary query fell through to nearest-endpoint fallback in {}: \
                 color ({:.10}, {:.10}), focal luma {:.10}, slice {}, distance {:.10}",
                self.name(),
                color.x,
                color.y,
                focal_luma,
                hue_index,
                best_distance
            );
        }
        best_point
    }

    /// A [`Self::boundary_2d`] query that consults the Spiral CARISMA
    /// warp map: the returned boundary is the farthest-from-focal result
    /// over the slice's own unwarped range and every impinging slice
    /// whose chroma range contains its result.
    fn boundary_2d_warped(
        &self,
        color: &Vec2,
        focal_luma: f64,
        hue_index: usize,
        kind: BoundKind,
    ) -> Vec2 {
        let plain = self.boundary_2d(color, focal_luma, hue_index, kind);
        let focal_point = Vec2::from(0.0, focal_luma);

        let mut farthest = plain;
        let mut farthest_distance = 0.0;
        let self_warp = &self.spiral.self_warp[hue_index];
        if !self.spiral.rotation_needed[hue_index]
            || (plain.x > self_warp.floor && plain.x <= self_warp.ceiling)
        {
            farthest_distance = (plain - focal_point).magnitude();
        }
        for range in &self.spiral.impingers[hue_index] {
            let candidate = self.boundary_2d(color, focal_luma, range.slice, kind);
            if candidate.x > range.floor && candidate.x <= range.ceiling {
                let distance = (candidate - focal_point).magnitude();
                if distance > farthest_distance {
                    farthest_distance = distance;
                    farthest = candidate;
                }
            }
        }
        farthest
    }

    /// Where the line from the focal point (chroma 0, `focal_luma`, at
    /// the color's hue) through `color` exits the gamut surface.
    ///
    /// Queries the two adjacent sampled slices and intersects the line
    /// between their boundary points with the plane containing the true
    /// hue. `floor_index` is the slice below the color's hue, passed in
    /// because the caller already computed it.
    #[must_use]
    pub fn boundary_3d(
        &self,
        color: &Vec3,
        focal_luma: f64,
        floor_index: usize,
        kind: BoundKind,
        spiral: bool,
    ) -> Vec3 {
        // Chroma is x, luma is y in the 2D slice plane.
        let color_2d = Vec2::from(color.y, color.x);

        let floor_bound = if spiral {
            self.boundary_2d_warped(&color_2d, focal_luma, floor_index, kind)
        } else {
            self.boundary_2d(&color_2d, focal_luma, floor_index, kind)
        };

        #[allow(clippy::cast_precision_loss)]
        let floor_hue = floor_index as f64 * HUE_PER_STEP;
        let floor_bound_3d = Vec3::from(floor_bound.y, floor_bound.x, floor_hue);
        let mut output = floor_bound_3d;

        if color.z == floor_hue {
            return output;
        }

        let ceil_index = (floor_index + 1) % HUE_STEPS;
        let ceil_bound = if spiral {
            self.boundary_2d_warped(&color_2d, focal_luma, ceil_index, kind)
        } else {
            self.boundary_2d(&color_2d, focal_luma, ceil_index, kind)
        };
        #[allow(clippy::cast_precision_loss)]
        let ceil_hue = ceil_index as f64 * HUE_PER_STEP;
        let ceil_bound_3d = Vec3::from(ceil_bound.y, ceil_bound.x, ceil_hue);

        // Intersect the line between the two slice boundaries with the
        // plane through black, the color, and gray at the color's hue.
        let cart_floor = depolarize(&floor_bound_3d);
        let cart_ceil = depolarize(&ceil_bound_3d);
        let direction = (cart_ceil - cart_floor).normalized();

        let cart_color = depolarize(color);
        let cart_black = depolarize(&Vec3::from(0.0, 0.0, color.z));
        let cart_gray = depolarize(&Vec3::from(color.x, 0.0, color.z));
        let hue_plane = Plane::from_points(&cart_black, &cart_color, &cart_gray);

        // A boundary at black or white makes the direction vanish;
        // bypass the NaN and keep the floor result at the true hue.
        if floor_bound_3d.y < EPSILON_ZERO && ceil_bound_3d.y < EPSILON_ZERO {
            output.z = color.z;
            return output;
        }

        match line_plane_intersection(&cart_floor, &direction, &hue_plane) {
            Some(hit) => polarize(&hit),
            None => {
                log::warn!(
                    "boundary plane intersection failed in {}: input ({:.6}, {:.6}, {:.6}), \
                     floor ({:.6}, {:.6}), ceil ({:.6}, {:.6})",
                    self.name(),
                    color.x,
                    color.y,
                    color.z,
                    floor_bound.x,
                    floor_bound.y,
                    ceil_bound.x,
                    ceil_bound.y
                );
                output
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::util::EPSILON;

    #[test]
    fn test_boundary_2d_on_ray() {
        let gamut = testutil::srgb_source();
        // Horizontal ray through mid gray at slice 0.
        let focal_luma = gamut.max_luma() * 0.5;
        let color = Vec2::from(0.001, focal_luma);
        let bound = gamut.boundary_2d(&color, focal_luma, 0, BoundKind::Normal);
        // The boundary lies on the ray, to the right of the color.
        assert!((bound.y - focal_luma).abs() < EPSILON);
        assert!(bound.x > color.x);
    }

    #[test]
    fn test_boundary_2d_toward_black() {
        let gamut = testutil::srgb_source();
        // A ray from black through a low color must not return black.
        let color = Vec2::from(0.01, gamut.max_luma() * 0.3);
        let bound = gamut.boundary_2d(&color, 0.0, 0, BoundKind::Normal);
        assert!(bound.magnitude() > EPSILON);
        // The boundary is at least as far along the ray as the color.
        assert!(bound.magnitude() >= color.magnitude());
    }

    #[test]
    fn test_bound_above_extends_past_cusp() {
        let gamut = testutil::srgb_source();
        // Horizontal ray below the cusp: the Above rendition follows the
        // extrapolated cusp line, so it reaches at least as far out as
        // the true boundary.
        let cusp_luma = gamut.cusp_luma[0];
        let probe_luma = cusp_luma * 0.5;
        let color = Vec2::from(0.001, probe_luma);
        let normal = gamut.boundary_2d(&color, probe_luma, 0, BoundKind::Normal);
        let above = gamut.boundary_2d(&color, probe_luma, 0, BoundKind::Above);
        assert!(above.x >= normal.x - EPSILON);
    }

    #[test]
    fn test_boundary_3d_between_slices() {
        let gamut = testutil::srgb_source();
        let hue = HUE_PER_STEP * 10.5;
        let color = Vec3::from(gamut.max_luma() * 0.5, 0.001, hue);
        let bound = gamut.boundary_3d(&color, color.x, 10, BoundKind::Normal, false);
        // The result sits between the adjacent slices' hues.
        assert!(bound.z >= HUE_PER_STEP * 10.0 - EPSILON);
        assert!(bound.z <= HUE_PER_STEP * 11.0 + EPSILON);
        assert!(bound.y > 0.0);
    }

    #[test]
    fn test_boundary_3d_exact_slice_hue() {
        let gamut = testutil::srgb_source();
        let hue = HUE_PER_STEP * 20.0;
        let color = Vec3::from(gamut.max_luma() * 0.4, 0.001, hue);
        let bound = gamut.boundary_3d(&color, color.x, 20, BoundKind::Normal, false);
        assert!((bound.z - hue).abs() < EPSILON);
    }
}
