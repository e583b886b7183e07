// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Gamut boundary descriptors.
//!
//! A descriptor owns everything derived from a gamut's primaries and
//! whitepoint: the normalized primary matrix and its relatives, a
//! hue-sliced polyhedral sampling of the gamut surface in JzCzhz, the
//! cusp tables, the extrapolation points used by the VP algorithms, and
//! the Spiral CARISMA warp map. All of it is built once and read-only
//! during pixel processing.
//!
//! Boundary sampling follows Lihao, Xu, Chunzhi, Xu, & Luo, Ming
//! Ronnier. "Accurate gamut boundary descriptor for displays." *Optics
//! Express*, Vol. 30, No. 2, pp. 1615-1626. January 2022.

pub mod boundary;
pub mod correct;
pub mod spiral;

use rayon::prelude::*;
use std::sync::Arc;

use crate::color::jzazbz::{jzazbz_to_xyz, xyz_to_jzazbz};
use crate::crt::{CrtDescriptor, CrtEmulationMode};
use crate::error::{Error, ErrorKind};
use crate::math::vec2::line_intersection_2d;
use crate::math::vec3::{depolarize, polarize};
use crate::math::{Mat3, Vec2, Vec3};
use crate::tables::{CatKind, D65};
use crate::util::EPSILON;

use self::spiral::SpiralTables;

/// Number of hue slices; 0.2 degree granularity.
pub const HUE_STEPS: usize = 1800;
/// Coarse luma sampling rows, 5% each.
pub const LUMA_STEPS: usize = 20;
/// Fine luma subdivisions per coarse row for the cusp search.
pub const FINE_LUMA_STEPS: usize = 50;
/// Coarse chroma sampling columns, 2% each.
pub const CHROMA_STEPS: usize = 50;
/// Fine chroma subdivisions per coarse column.
pub const FINE_CHROMA_STEPS: usize = 20;

/// Hue angle covered by one slice, in radians.
#[allow(clippy::cast_precision_loss)]
pub const HUE_PER_STEP: f64 = std::f64::consts::TAU / (HUE_STEPS as f64);
/// Half of [`HUE_PER_STEP`].
pub const HALF_HUE_PER_STEP: f64 = HUE_PER_STEP / 2.0;

/// One sampled point on a hue slice's boundary polyline.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BoundaryPoint {
    /// Chroma (Cz).
    pub chroma: f64,
    /// Luma (Jz).
    pub luma: f64,
    /// Clockwise angle from the neutral-gray-to-white direction.
    pub angle: f64,
    pub is_cusp: bool,
}

/// Construction parameters for a [`GamutDescriptor`].
#[derive(Debug, Clone)]
pub struct GamutParams {
    pub name: String,
    pub whitepoint: Vec3,
    pub red: Vec3,
    pub green: Vec3,
    pub blue: Vec3,
    /// Whitepoint of the gamut on the other side of the mapping.
    pub other_whitepoint: Vec3,
    pub is_source: bool,
    pub cat_kind: CatKind,
    /// True when gamut compression or expansion will run; forces
    /// adaptation into D65 where the whitepoint is elsewhere.
    pub compress_enabled: bool,
    pub crt_mode: CrtEmulationMode,
    pub crt: Option<Arc<CrtDescriptor>>,
}

struct SliceResult {
    points: Vec<BoundaryPoint>,
    cusp_luma: f64,
    cusp_chroma: f64,
    fake_lower: Vec2,
    fake_upper: Vec2,
}

/// A gamut boundary descriptor. Immutable during pixel processing.
#[derive(Debug, Clone)]
pub struct GamutDescriptor {
    name: String,
    is_source: bool,
    needs_adapt: bool,
    whitepoint: Vec3,
    red_point: Vec3,
    green_point: Vec3,
    blue_point: Vec3,

    npm: Mat3,
    inverse_npm: Mat3,
    npm_adapted: Mat3,
    inverse_npm_adapted: Mat3,

    max_luma: f64,
    max_chroma: f64,
    pub(crate) slices: Vec<Vec<BoundaryPoint>>,
    pub(crate) cusp_luma: Vec<f64>,
    pub(crate) cusp_chroma: Vec<f64>,
    pub(crate) fake_lower: Vec<Vec2>,
    pub(crate) fake_upper: Vec<Vec2>,

    crt_mode: CrtEmulationMode,
    crt: Option<Arc<CrtDescriptor>>,

    pub(crate) spiral: SpiralTables,
}

impl GamutDescriptor {
    /// Builds the matrix cache and samples the gamut boundary.
    ///
    /// # Errors
    /// Fails when the primary or chromatic adaptation matrices are not
    /// invertible, or when boundary sampling cannot locate a cusp.
    pub fn new(params: GamutParams) -> Result<Self, Error> {
        // Working in JzCzhz requires everything be relative to D65, so
        // adaptation is needed unless both whitepoints already agree
        // (and are D65 when compression will run).
        let needs_adapt = (params.compress_enabled && !params.whitepoint.nearly_equal(&D65))
            || !params.whitepoint.nearly_equal(&params.other_whitepoint);
        log::debug!(
            "initializing {} as {} gamut{}",
            params.name,
            if params.is_source { "source" } else { "destination" },
            if needs_adapt {
                " with chromatic adaptation"
            } else {
                ""
            }
        );

        let matrix_p = Mat3::from_rows([
            [params.red.x, params.green.x, params.blue.x],
            [params.red.y, params.green.y, params.blue.y],
            [params.red.z, params.green.z, params.blue.z],
        ]);
        let inverse_p = matrix_p.inverted().map_err(|_| {
            Error::from_string(
                ErrorKind::MatrixNotInvertible,
                format!("primary matrix of {} is not invertible", params.name),
            )
        })?;

        let matrix_w = Vec3::from(
            params.whitepoint.x / params.whitepoint.y,
            1.0,
            params.whitepoint.z / params.whitepoint.y,
        );
        let normalization = inverse_p.transform(&matrix_w);
        let matrix_c = Mat3::from_diagonal(&normalization);
        let npm = &matrix_p * &matrix_c;
        let inverse_npm = npm.inverted().map_err(|_| {
            Error::from_string(
                ErrorKind::MatrixNotInvertible,
                format!("NPM of {} is not invertible", params.name),
            )
        })?;
        log::debug!("{} NPM: {npm:?}", params.name);

        let (npm_adapted, inverse_npm_adapted) = if needs_adapt {
            let adapt = adaptation_to_d65(params.cat_kind, &matrix_w)?;
            let adapted = &adapt * &npm;
            let inverse_adapted = adapted.inverted().map_err(|_| {
                Error::from_string(
                    ErrorKind::MatrixNotInvertible,
                    format!("adapted NPM of {} is not invertible", params.name),
                )
            })?;
            (adapted, inverse_adapted)
        } else {
            (npm, inverse_npm)
        };

        let mut descriptor = Self {
            name: params.name,
            is_source: params.is_source,
            needs_adapt,
            whitepoint: params.whitepoint,
            red_point: params.red,
            green_point: params.green,
            blue_point: params.blue,
            npm,
            inverse_npm,
            npm_adapted,
            inverse_npm_adapted,
            max_luma: 0.0,
            max_chroma: 0.0,
            slices: Vec::new(),
            cusp_luma: Vec::new(),
            cusp_chroma: Vec::new(),
            fake_lower: Vec::new(),
            fake_upper: Vec::new(),
            crt_mode: params.crt_mode,
            crt: params.crt,
            spiral: SpiralTables::default(),
        };

        descriptor.find_boundaries()?;
        let anchors = descriptor.polar_anchors();
        descriptor.spiral.init_anchors(&anchors);
        log::debug!("done initializing gamut descriptor for {}", descriptor.name);
        Ok(descriptor)
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when this descriptor was built as the source side.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        self.is_source
    }

    /// Jz of white; the top of every hue slice.
    #[must_use]
    pub const fn max_luma(&self) -> f64 {
        self.max_luma
    }

    /// The padded chroma sampling limit.
    #[must_use]
    pub const fn max_chroma(&self) -> f64 {
        self.max_chroma
    }

    /// The whitepoint chromaticity.
    #[must_use]
    pub const fn whitepoint(&self) -> Vec3 {
        self.whitepoint
    }

    /// The (red, green, blue) primary chromaticities.
    #[must_use]
    pub const fn primaries(&self) -> [Vec3; 3] {
        [self.red_point, self.green_point, self.blue_point]
    }

    /// The non-adapted normalized primary matrix.
    #[must_use]
    pub const fn npm(&self) -> &Mat3 {
        &self.npm
    }

    /// The non-adapted inverse normalized primary matrix.
    #[must_use]
    pub const fn inverse_npm(&self) -> &Mat3 {
        &self.inverse_npm
    }

    /// Linear RGB to XYZ, adapted to D65 when required.
    #[must_use]
    pub fn linear_rgb_to_xyz(&self, input: &Vec3) -> Vec3 {
        if self.needs_adapt {
            return self.npm_adapted.transform(input);
        }
        self.npm.transform(input)
    }

    /// XYZ to linear RGB, adapted to D65 when required.
    #[must_use]
    pub fn xyz_to_linear_rgb(&self, input: &Vec3) -> Vec3 {
        if self.needs_adapt {
            return self.inverse_npm_adapted.transform(input);
        }
        self.inverse_npm.transform(input)
    }

    /// Linear RGB to polar JzCzhz.
    #[must_use]
    pub fn linear_rgb_to_jzczhz(&self, input: &Vec3) -> Vec3 {
        let xyz = self.linear_rgb_to_xyz(input);
        polarize(&xyz_to_jzazbz(&xyz))
    }

    /// Polar JzCzhz back to linear RGB.
    #[must_use]
    pub fn jzczhz_to_linear_rgb(&self, input: &Vec3) -> Vec3 {
        let jzazbz = depolarize(input);
        self.xyz_to_linear_rgb(&jzazbz_to_xyz(&jzazbz))
    }

    /// Whether a JzCzhz color is inside this gamut, plus an error size.
    ///
    /// The error is the sum of linear RGB over/underruns, or 10⁴ when
    /// the inverse PQ function went NaN (treated as far out of bounds).
    /// With an attached CRT in emulation mode, bounds are defined by the
    /// emulation's gamma-space output range instead.
    #[must_use]
    pub fn is_jzczhz_in_bounds(&self, color: &Vec3) -> (bool, f64) {
        let mut rgb = self.jzczhz_to_linear_rgb(color);

        if rgb.has_nan() {
            return (false, 10_000.0);
        }

        if self.crt_mode != CrtEmulationMode::None {
            if let Some(crt) = &self.crt {
                // Uncrush is suppressed so the bottom of the pedestal
                // range stays reachable.
                rgb = crt.linear_to_gamma(&rgb, false);
            }
        }

        let mut in_bounds = true;
        let mut error = 0.0;
        for channel in [rgb.x, rgb.y, rgb.z] {
            if channel > 1.0 {
                in_bounds = false;
                error += channel - 1.0;
            } else if channel < 0.0 {
                in_bounds = false;
                error += -channel;
            }
        }
        (in_bounds, error)
    }

    /// The CRT attached to this descriptor, if any.
    #[must_use]
    pub fn attached_crt(&self) -> Option<&CrtDescriptor> {
        if self.crt_mode == CrtEmulationMode::None {
            return None;
        }
        self.crt.as_deref()
    }

    /// JzCzhz coordinates of the primaries and secondaries, in the
    /// anchor chain order red, yellow, green, cyan, blue, magenta.
    ///
    /// With an attached CRT in emulation mode, the anchors are the
    /// CRT's outputs for the pure primary/secondary inputs.
    #[must_use]
    pub fn polar_anchors(&self) -> [Vec3; 6] {
        let inputs = [
            Vec3::from(1.0, 0.0, 0.0),
            Vec3::from(1.0, 1.0, 0.0),
            Vec3::from(0.0, 1.0, 0.0),
            Vec3::from(0.0, 1.0, 1.0),
            Vec3::from(0.0, 0.0, 1.0),
            Vec3::from(1.0, 0.0, 1.0),
        ];
        let mut anchors = [Vec3::new(); 6];
        for (anchor, input) in anchors.iter_mut().zip(inputs.iter()) {
            let rgb = if self.crt_mode == CrtEmulationMode::None {
                *input
            } else if let Some(crt) = &self.crt {
                crt.gamma_to_linear(input)
            } else {
                *input
            };
            *anchor = self.linear_rgb_to_jzczhz(&rgb);
        }
        anchors
    }

    /// Interpolated cusp luma at an arbitrary hue.
    #[must_use]
    pub fn cusp_luma_at(&self, floor_index: usize, ceil_weight: f64) -> f64 {
        let ceil_index = (floor_index + 1) % HUE_STEPS;
        (1.0 - ceil_weight).mul_add(
            self.cusp_luma[floor_index],
            ceil_weight * self.cusp_luma[ceil_index],
        )
    }

    /// Interpolated cusp chroma at an arbitrary hue.
    #[must_use]
    pub fn cusp_chroma_at(&self, floor_index: usize, ceil_weight: f64) -> f64 {
        let ceil_index = (floor_index + 1) % HUE_STEPS;
        (1.0 - ceil_weight).mul_add(
            self.cusp_chroma[floor_index],
            ceil_weight * self.cusp_chroma[ceil_index],
        )
    }

    fn find_boundaries(&mut self) -> Result<(), Error> {
        // Scale the sampling to this gamut: luma tops out at white, and
        // chroma at the largest primary chroma plus padding so nothing
        // gets clipped.
        self.max_luma = self.linear_rgb_to_jzczhz(&Vec3::from(1.0, 1.0, 1.0)).x;
        let mut max_chroma: f64 = 0.0;
        for primary in [
            Vec3::from(1.0, 0.0, 0.0),
            Vec3::from(0.0, 1.0, 0.0),
            Vec3::from(0.0, 0.0, 1.0),
        ] {
            max_chroma = max_chroma.max(self.linear_rgb_to_jzczhz(&primary).y);
        }
        self.max_chroma = max_chroma * 1.1;

        // Slices are independent, so sample them in parallel.
        let results: Result<Vec<SliceResult>, Error> = {
            let this: &Self = self;
            (0..HUE_STEPS)
                .into_par_iter()
                .map(|huestep| this.process_slice(huestep))
                .collect()
        };
        let results = results?;

        self.slices = Vec::with_capacity(HUE_STEPS);
        self.cusp_luma = Vec::with_capacity(HUE_STEPS);
        self.cusp_chroma = Vec::with_capacity(HUE_STEPS);
        self.fake_lower = Vec::with_capacity(HUE_STEPS);
        self.fake_upper = Vec::with_capacity(HUE_STEPS);
        for result in results {
            self.slices.push(result.points);
            self.cusp_luma.push(result.cusp_luma);
            self.cusp_chroma.push(result.cusp_chroma);
            self.fake_lower.push(result.fake_lower);
            self.fake_upper.push(result.fake_upper);
        }
        self.spiral.reset(HUE_STEPS);
        Ok(())
    }

    /// Samples the gamut boundary for one hue slice.
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::too_many_lines)]
    fn process_slice(&self, huestep: usize) -> Result<SliceResult, Error> {
        let luma_step = self.max_luma / LUMA_STEPS as f64;
        let chroma_step = self.max_chroma / CHROMA_STEPS as f64;
        let fine_chroma_step = chroma_step / FINE_CHROMA_STEPS as f64;
        let fine_luma_step = luma_step / FINE_LUMA_STEPS as f64;
        let hue = huestep as f64 * HUE_PER_STEP;

        // Step 1: coarse sampling. The zero-chroma column is in bounds
        // by definition and the first and last rows contain only the
        // black and white points.
        let mut grid = [[false; CHROMA_STEPS]; LUMA_STEPS];
        for row in &mut grid {
            row[0] = true;
        }
        for row in 1..(LUMA_STEPS - 1) {
            let row_luma = row as f64 * luma_step;
            for col in 1..CHROMA_STEPS {
                let color = Vec3::from(row_luma, col as f64 * chroma_step, hue);
                grid[row][col] = self.is_jzczhz_in_bounds(&color).0;
            }
        }

        // Step 2: fine sampling along every in/out transition. The
        // in-after-out case happens where the boundary is slightly
        // concave.
        let mut points: Vec<BoundaryPoint> = Vec::with_capacity(LUMA_STEPS + 6);
        for row in 1..(LUMA_STEPS - 1) {
            let row_luma = row as f64 * luma_step;
            for col in 0..(CHROMA_STEPS - 1) {
                if grid[row][col] == grid[row][col + 1] {
                    continue;
                }
                let waiting_for_out = grid[row][col];
                let mut found = false;
                for fine in 1..FINE_CHROMA_STEPS {
                    let fine_chroma = (col as f64).mul_add(chroma_step, fine as f64 * fine_chroma_step);
                    let color = Vec3::from(row_luma, fine_chroma, hue);
                    let in_bounds = self.is_jzczhz_in_bounds(&color).0;
                    if waiting_for_out != in_bounds {
                        // Assume the boundary is halfway between samples.
                        points.push(BoundaryPoint {
                            chroma: fine_chroma - (0.5 * fine_chroma_step),
                            luma: row_luma,
                            angle: 0.0,
                            is_cusp: false,
                        });
                        found = true;
                        break;
                    }
                }
                if !found {
                    // The transition is beyond the last fine sample.
                    points.push(BoundaryPoint {
                        chroma: ((col + 1) as f64).mul_add(chroma_step, -(0.5 * fine_chroma_step)),
                        luma: row_luma,
                        angle: 0.0,
                        is_cusp: false,
                    });
                }
            }
        }

        // Step 3: fine scan around the largest-chroma sample to locate
        // the cusp.
        let mut biggest_chroma = 0.0_f64;
        let mut luma_for_biggest = 0.0_f64;
        for point in &points {
            if point.chroma > biggest_chroma {
                biggest_chroma = point.chroma;
                luma_for_biggest = point.luma;
            }
        }
        // Back off a full fine step in case the halfway estimate and
        // floating point errors overshot.
        biggest_chroma -= fine_chroma_step;
        let scan_max_luma = luma_for_biggest + luma_step;
        let mut scan_luma = luma_for_biggest - luma_step;
        let mut cusp_luma = luma_for_biggest;
        let mut cusp_chroma = biggest_chroma;
        while scan_luma <= scan_max_luma {
            let probe = Vec3::from(scan_luma, biggest_chroma, hue);
            if self.is_jzczhz_in_bounds(&probe).0 {
                let mut scan_chroma = cusp_chroma;
                while scan_chroma <= self.max_chroma {
                    let color = Vec3::from(scan_luma, scan_chroma, hue);
                    if !self.is_jzczhz_in_bounds(&color).0 {
                        let boundary = scan_chroma - (0.5 * fine_chroma_step);
                        if boundary > cusp_chroma {
                            cusp_chroma = boundary;
                            cusp_luma = scan_luma;
                        }
                        break;
                    }
                    scan_chroma += fine_chroma_step;
                }
            }
            scan_luma += fine_luma_step;
        }
        points.push(BoundaryPoint {
            chroma: cusp_chroma,
            luma: cusp_luma,
            angle: 0.0,
            is_cusp: true,
        });

        // Step 4: insert the known white and black endpoints.
        points.push(BoundaryPoint {
            chroma: 0.0,
            luma: self.max_luma,
            angle: 0.0,
            is_cusp: false,
        });
        points.push(BoundaryPoint {
            chroma: 0.0,
            luma: 0.0,
            angle: 0.0,
            is_cusp: false,
        });

        // Step 5: order by pitching angle from neutral gray. Needed
        // because concavities can put more than one point at one luma.
        let neutral_gray = Vec2::from(0.0, self.max_luma * 0.5);
        let to_white = (Vec2::from(0.0, self.max_luma) - neutral_gray).normalized();
        for point in &mut points {
            let to_point = (Vec2::from(point.chroma, point.luma) - neutral_gray).normalized();
            point.angle = crate::math::vec2::clockwise_angle(&to_white, &to_point);
        }
        // Descending angle puts black first and white last.
        points.sort_by(|a, b| {
            b.angle
                .partial_cmp(&a.angle)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Remove adjacent duplicates, promoting the cusp flag.
        let mut index = 0;
        while index + 1 < points.len() {
            let a = points[index];
            let b = points[index + 1];
            if (a.chroma - b.chroma).abs() < EPSILON && (a.luma - b.luma).abs() < EPSILON {
                if a.is_cusp {
                    points[index + 1].is_cusp = true;
                }
                points.remove(index);
            } else {
                index += 1;
            }
        }

        let cusp_index = points
            .iter()
            .position(|p| p.is_cusp)
            .ok_or_else(|| {
                Error::from_string(
                    ErrorKind::GamutInitializeFail,
                    format!("no cusp survived deduplication in hue slice {huestep}"),
                )
            })?;

        // The lower extrapolation point: extend the line through the
        // cusp and the next node above it out to triple the chroma
        // sampling limit. Walk up until the node is at least a luma step
        // higher, otherwise the slope is flat because it is basically
        // the same point twice.
        let cusp_2d = Vec2::from(points[cusp_index].chroma, points[cusp_index].luma);
        let far_chroma = 3.0 * self.max_chroma;
        let mut fake_lower = None;
        for candidate in points.iter().skip(cusp_index + 1) {
            if candidate.luma - cusp_2d.y < luma_step {
                continue;
            }
            if let Some(hit) = line_intersection_2d(
                &Vec2::from(candidate.chroma, candidate.luma),
                &cusp_2d,
                &Vec2::from(far_chroma, 0.0),
                &Vec2::from(far_chroma, self.max_luma),
            ) {
                fake_lower = Some(hit);
                break;
            }
        }
        let fake_lower = fake_lower.ok_or_else(|| {
            Error::from_string(
                ErrorKind::GamutInitializeFail,
                format!("no intercept for the lower extrapolation point in hue slice {huestep}"),
            )
        })?;

        // The upper extrapolation point: the line from black through
        // the cusp, since "in bounds" is defined by that line later.
        let high_luma = 1.5 * self.max_luma;
        let fake_upper = line_intersection_2d(
            &Vec2::from(0.0, 0.0),
            &cusp_2d,
            &Vec2::from(0.0, high_luma),
            &Vec2::from(1.0, high_luma),
        )
        .ok_or_else(|| {
            Error::from_string(
                ErrorKind::GamutInitializeFail,
                format!("no intercept for the upper extrapolation point in hue slice {huestep}"),
            )
        })?;

        Ok(SliceResult {
            points,
            cusp_luma,
            cusp_chroma,
            fake_lower,
            fake_upper,
        })
    }
}

/// Builds the XYZ-to-XYZ chromatic adaptation matrix into D65.
fn adaptation_to_d65(cat_kind: CatKind, source_w: &Vec3) -> Result<Mat3, Error> {
    let cat = cat_kind.matrix();
    let inverse_cat = cat.inverted().map_err(|_| {
        Error::with_message(
            ErrorKind::MatrixNotInvertible,
            "chromatic adaptation matrix is not invertible",
        )
    })?;

    let dest_w = Vec3::from(D65.x / D65.y, 1.0, D65.z / D65.y);
    let source_cone = cat.transform(source_w);
    let dest_cone = cat.transform(&dest_w);
    let scale = Mat3::from_diagonal(&Vec3::from(
        dest_cone.x / source_cone.x,
        dest_cone.y / source_cone.y,
        dest_cone.z / source_cone.z,
    ));

    Ok(&(&inverse_cat * &scale) * &cat)
}

/// The index of the sampled hue slice below `hue`, and how far `hue`
/// sits toward the next slice on a 0 to 1 scale.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn hue_to_floor_index(hue: f64) -> (usize, f64) {
    let mut index = (hue / HUE_PER_STEP) as usize;
    if index >= HUE_STEPS {
        index = HUE_STEPS - 1;
    }
    let excess = (hue - (index as f64 * HUE_PER_STEP)) / HUE_PER_STEP;
    (index, excess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_hue_to_floor_index() {
        let (index, excess) = hue_to_floor_index(0.0);
        assert_eq!(index, 0);
        assert!(excess.abs() < 1e-12);

        let (index, excess) = hue_to_floor_index(HUE_PER_STEP * 2.5);
        assert_eq!(index, 2);
        assert!((excess - 0.5).abs() < 1e-9);

        // A hue rounded all the way up still lands in the final slice.
        let (index, _) = hue_to_floor_index(std::f64::consts::TAU);
        assert_eq!(index, HUE_STEPS - 1);
    }

    #[test]
    fn test_srgb_slice_invariants() {
        let gamut = testutil::srgb_source();
        assert_eq!(gamut.slices.len(), HUE_STEPS);
        for huestep in (0..HUE_STEPS).step_by(97) {
            let slice = &gamut.slices[huestep];
            assert!(slice.len() >= 3, "slice {huestep} has {} points", slice.len());
            let first = slice.first().unwrap();
            let last = slice.last().unwrap();
            assert!(first.chroma.abs() < 1e-12 && first.luma.abs() < 1e-12);
            assert!(last.chroma.abs() < 1e-12);
            assert!((last.luma - gamut.max_luma()).abs() < 1e-9);
            let cusp_count = slice.iter().filter(|p| p.is_cusp).count();
            assert_eq!(cusp_count, 1, "slice {huestep} has {cusp_count} cusps");
        }
    }

    #[test]
    fn test_srgb_round_trip_through_jzczhz() {
        let gamut = testutil::srgb_source();
        let samples = [
            Vec3::from(0.5, 0.25, 0.125),
            Vec3::from(0.9, 0.9, 0.1),
            Vec3::from(0.02, 0.3, 0.7),
        ];
        for rgb in &samples {
            let polar = gamut.linear_rgb_to_jzczhz(rgb);
            let back = gamut.jzczhz_to_linear_rgb(&polar);
            assert!(back.nearly_equal(rgb), "rgb {rgb:?} back {back:?}");
        }
    }

    #[test]
    fn test_in_bounds_classification() {
        let gamut = testutil::srgb_source();
        let inside = gamut.linear_rgb_to_jzczhz(&Vec3::from(0.5, 0.5, 0.5));
        let (ok, error) = gamut.is_jzczhz_in_bounds(&inside);
        assert!(ok);
        assert!(error.abs() < 1e-12);

        let outside = gamut.linear_rgb_to_jzczhz(&Vec3::from(1.2, -0.1, 0.5));
        let (ok, error) = gamut.is_jzczhz_in_bounds(&outside);
        assert!(!ok);
        assert!(error > 0.0);
    }

    #[test]
    fn test_cusp_tables_are_positive() {
        let gamut = testutil::srgb_source();
        for huestep in (0..HUE_STEPS).step_by(211) {
            assert!(gamut.cusp_chroma[huestep] > 0.0);
            assert!(gamut.cusp_luma[huestep] > 0.0);
            assert!(gamut.cusp_luma[huestep] < gamut.max_luma());
        }
    }
}
