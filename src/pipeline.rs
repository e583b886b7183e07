// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-pixel orchestration.
//!
//! A pipeline owns every descriptor derived from a validated
//! configuration and exposes pure per-pixel mapping. The flow per
//! pixel: optional NES synthesis, optional CRT emulation on the source
//! side, gamut mapping (or clip, or a gamma-space correction circuit),
//! optional CRT emulation on the output side, gamma encode.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::color::gamma::{
    rec2084_to_gamma, rec2084_to_linear, srgb_to_gamma, srgb_to_linear,
};
use crate::config::{Config, GammaMode, MapMode};
use crate::crt::{CrtDescriptor, CrtEmulationMode};
use crate::error::Error;
use crate::gamut::correct::kinoshita_multiply;
use crate::gamut::{GamutDescriptor, GamutParams};
use crate::mapping::{map_color, MappingParams};
use crate::math::{Mat3, Vec3};
use crate::nes::NesPpu;
use crate::util::{clamp01, cubic_hermite_map, power_map, to_rgb8};

/// A 256³ memoization table of atomic "filled flag plus three bytes"
/// cells.
///
/// Cells are written at most once per distinct value; racing writers
/// compute the same result, so plain relaxed stores suffice.
pub struct MemoTable {
    cells: Box<[AtomicU32]>,
}

const MEMO_FILLED: u32 = 1 << 24;

impl MemoTable {
    /// Allocates an empty table. This is 64 MiB; build one per image
    /// run, not per pixel.
    #[must_use]
    pub fn new() -> Self {
        let cells = (0..(1 << 24)).map(|_| AtomicU32::new(0)).collect();
        Self { cells }
    }

    const fn index(rgb: [u8; 3]) -> usize {
        ((rgb[0] as usize) << 16) | ((rgb[1] as usize) << 8) | (rgb[2] as usize)
    }

    /// The stored output for an input triple, if already computed.
    #[must_use]
    pub fn get(&self, rgb: [u8; 3]) -> Option<[u8; 3]> {
        let cell = self.cells[Self::index(rgb)].load(Ordering::Relaxed);
        if cell & MEMO_FILLED == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        Some([(cell >> 16) as u8, (cell >> 8) as u8, cell as u8])
    }

    /// Stores the output for an input triple. First writer wins; later
    /// identical writes are harmless.
    pub fn set(&self, rgb: [u8; 3], output: [u8; 3]) {
        let value = MEMO_FILLED
            | (u32::from(output[0]) << 16)
            | (u32::from(output[1]) << 8)
            | u32::from(output[2]);
        self.cells[Self::index(rgb)].store(value, Ordering::Relaxed);
    }
}

impl Default for MemoTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything derived from one validated configuration.
pub struct Pipeline {
    config: Config,
    params: MappingParams,
    crt: Option<Arc<CrtDescriptor>>,
    nes: Option<NesPpu>,
    source: GamutDescriptor,
    dest: GamutDescriptor,
    chunghwa: Option<Mat3>,
    kinoshita: Option<Box<[Mat3; 13]>>,
    memo: Option<MemoTable>,
}

impl Pipeline {
    /// Validates the configuration and builds every derived table.
    ///
    /// # Errors
    /// Configuration errors for out-of-range or impossible settings,
    /// initialization errors for failed table construction.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        let crt = if config.crt.mode == CrtEmulationMode::None {
            None
        } else {
            Some(Arc::new(CrtDescriptor::new(&config.crt)?))
        };

        let nes = if config.nes.enable {
            Some(NesPpu::new(&config.nes)?)
        } else {
            None
        };

        let params = MappingParams {
            expand: config.map_mode == MapMode::Expand,
            remap_factor: config.remap_factor,
            remap_limit: config.remap_limit,
            soft_knee: config.soft_knee,
            knee_factor: config.knee_factor,
            direction: config.map_direction,
            safe_zone: config.safe_zone,
            spiral: config.spiral_carisma && config.map_mode.is_compression(),
        };

        let source_white = config.source_whitepoint.resolve();
        let dest_white = config.dest_whitepoint.resolve();
        let compress_enabled = config.map_mode.is_compression();

        let [source_red, source_green, source_blue] = config.source_gamut.primaries();
        let mut source = GamutDescriptor::new(GamutParams {
            name: config.source_gamut.name(),
            whitepoint: source_white,
            red: source_red,
            green: source_green,
            blue: source_blue,
            other_whitepoint: dest_white,
            is_source: true,
            cat_kind: config.cat_kind,
            compress_enabled,
            crt_mode: if config.crt.mode == CrtEmulationMode::Front {
                CrtEmulationMode::Front
            } else {
                CrtEmulationMode::None
            },
            crt: crt.clone(),
        })?;

        let [dest_red, dest_green, dest_blue] = config.dest_gamut.primaries();
        let dest = GamutDescriptor::new(GamutParams {
            name: config.dest_gamut.name(),
            whitepoint: dest_white,
            red: dest_red,
            green: dest_green,
            blue: dest_blue,
            other_whitepoint: source_white,
            is_source: false,
            cat_kind: config.cat_kind,
            compress_enabled,
            crt_mode: if config.crt.mode == CrtEmulationMode::Back {
                CrtEmulationMode::Back
            } else {
                CrtEmulationMode::None
            },
            crt: crt.clone(),
        })?;

        if params.spiral {
            source.init_spiral(&config.spiral);
            let rotations = source.compute_primary_rotations(&dest, &params);
            source.apply_primary_rotations(rotations, config.spiral.max_scale);
            source.warp_boundaries();
        }

        let chunghwa = if config.map_mode.is_ccc() {
            Some(dest.chunghwa_matrix(&source))
        } else {
            None
        };
        let kinoshita = if matches!(config.map_mode, MapMode::CccD | MapMode::CccE) {
            Some(Box::new(source.kinoshita_matrices(&dest)?))
        } else {
            None
        };

        Ok(Self {
            config,
            params,
            crt,
            nes,
            source,
            dest,
            chunghwa,
            kinoshita,
            memo: None,
        })
    }

    /// The source gamut descriptor.
    #[must_use]
    pub const fn source(&self) -> &GamutDescriptor {
        &self.source
    }

    /// The destination gamut descriptor.
    #[must_use]
    pub const fn dest(&self) -> &GamutDescriptor {
        &self.dest
    }

    /// Allocates the 256³ memo table for 8-bit mapping.
    pub fn enable_memo(&mut self) {
        if self.memo.is_none() {
            self.memo = Some(MemoTable::new());
        }
    }

    fn decode_channel(&self, value: f64) -> f64 {
        match self.config.gamma_mode {
            GammaMode::Linear => value,
            GammaMode::Srgb => srgb_to_linear(value),
            GammaMode::Rec2084 => rec2084_to_linear(value, self.config.max_nits),
        }
    }

    fn encode_channel(&self, value: f64) -> f64 {
        match self.config.gamma_mode {
            GammaMode::Linear => clamp01(value),
            GammaMode::Srgb => srgb_to_gamma(value),
            GammaMode::Rec2084 => rec2084_to_gamma(value, self.config.max_nits),
        }
    }

    fn to_linear(&self, gamma_rgb: &Vec3) -> Vec3 {
        if self.config.crt.mode == CrtEmulationMode::Front {
            if let Some(crt) = &self.crt {
                return crt.gamma_to_linear(gamma_rgb);
            }
        }
        Vec3::from(
            self.decode_channel(gamma_rgb.x),
            self.decode_channel(gamma_rgb.y),
            self.decode_channel(gamma_rgb.z),
        )
    }

    fn to_gamma(&self, linear_rgb: &Vec3) -> Vec3 {
        if self.config.crt.mode == CrtEmulationMode::Back {
            if let Some(crt) = &self.crt {
                return crt.linear_to_gamma(linear_rgb, true);
            }
        }
        Vec3::from(
            self.encode_channel(linear_rgb.x),
            self.encode_channel(linear_rgb.y),
            self.encode_channel(linear_rgb.z),
        )
    }

    /// The gamma-space correction circuits operate directly on R'G'B'
    /// like the television hardware they model.
    fn apply_ccc(&self, gamma_rgb: &Vec3) -> Vec3 {
        let corrected = match self.config.map_mode {
            MapMode::CccA | MapMode::CccB | MapMode::CccC => {
                let Some(matrix) = &self.chunghwa else {
                    return *gamma_rgb;
                };
                matrix.transform(gamma_rgb)
            }
            MapMode::CccD | MapMode::CccE => {
                let Some(matrices) = &self.kinoshita else {
                    return *gamma_rgb;
                };
                kinoshita_multiply(matrices, gamma_rgb)
            }
            _ => return *gamma_rgb,
        };

        let blended = match self.config.map_mode {
            MapMode::CccA | MapMode::CccD => corrected,
            MapMode::CccB => {
                let weight = power_map(0.0, 1.0, self.source.find_max_p(gamma_rgb), 2.0);
                *gamma_rgb + ((corrected - *gamma_rgb) * weight)
            }
            MapMode::CccC | MapMode::CccE => {
                let weight = cubic_hermite_map(0.0, 1.0, self.source.find_max_p(gamma_rgb));
                *gamma_rgb + ((corrected - *gamma_rgb) * weight)
            }
            _ => corrected,
        };

        Vec3::from(clamp01(blended.x), clamp01(blended.y), clamp01(blended.z))
    }

    /// Maps one gamma-space pixel through the full pipeline.
    #[must_use]
    pub fn map_gamma(&self, gamma_rgb: &Vec3) -> Vec3 {
        if self.config.map_mode.is_ccc() {
            return self.apply_ccc(gamma_rgb);
        }

        let linear = self.to_linear(gamma_rgb);
        let mapped = if self.config.map_mode == MapMode::Clip {
            self.dest
                .xyz_to_linear_rgb(&self.source.linear_rgb_to_xyz(&linear))
        } else {
            map_color(&linear, &self.source, &self.dest, &self.params)
        };
        self.to_gamma(&mapped)
    }

    /// Maps one 8-bit pixel, consulting the memo table when enabled.
    #[must_use]
    pub fn map_rgb8(&self, rgb: [u8; 3]) -> [u8; 3] {
        if let Some(memo) = &self.memo {
            if let Some(hit) = memo.get(rgb) {
                return hit;
            }
        }

        let gamma_rgb = Vec3::from(
            f64::from(rgb[0]) / 255.0,
            f64::from(rgb[1]) / 255.0,
            f64::from(rgb[2]) / 255.0,
        );
        let out = self.map_gamma(&gamma_rgb);
        let bytes = [to_rgb8(out.x), to_rgb8(out.y), to_rgb8(out.z)];

        if let Some(memo) = &self.memo {
            memo.set(rgb, bytes);
        }
        bytes
    }

    /// Maps an interleaved RGBA8 buffer in place, rows in parallel.
    /// Alpha is left untouched.
    pub fn map_rgba_pixels(&self, pixels: &mut [u8]) {
        pixels.par_chunks_exact_mut(4).for_each(|pixel| {
            let mapped = self.map_rgb8([pixel[0], pixel[1], pixel[2]]);
            pixel[0] = mapped[0];
            pixel[1] = mapped[1];
            pixel[2] = mapped[2];
        });
    }

    /// Synthesizes an NES palette entry and maps it through the
    /// pipeline. Returns `None` when NES simulation is not enabled.
    #[must_use]
    pub fn map_nes_triad(&self, hue: i32, luma: i32, emphasis: i32) -> Option<[u8; 3]> {
        let ppu = self.nes.as_ref()?;
        let gamma_rgb = ppu.triad_to_rgb(hue, luma, emphasis);
        let out = self.map_gamma(&gamma_rgb);
        Some([to_rgb8(out.x), to_rgb8(out.y), to_rgb8(out.z)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GamutSelection, WhitepointSelection};
    use crate::tables::{NamedGamut, Whitepoint};
    use std::sync::OnceLock;

    fn srgb_identity_pipeline() -> &'static Pipeline {
        static PIPE: OnceLock<Pipeline> = OnceLock::new();
        PIPE.get_or_init(|| Pipeline::new(Config::new()).unwrap())
    }

    fn ntscj_config() -> Config {
        // NTSC 1953 primaries at the Japanese 9300K + 27 MPCD white.
        Config {
            source_gamut: GamutSelection::Named(NamedGamut::Ntsc),
            source_whitepoint: WhitepointSelection::Named(Whitepoint::W9300K27Mpcd),
            ..Config::new()
        }
    }

    fn ntscj_pipeline() -> &'static Pipeline {
        static PIPE: OnceLock<Pipeline> = OnceLock::new();
        PIPE.get_or_init(|| Pipeline::new(ntscj_config()).unwrap())
    }

    #[test]
    fn test_srgb_identity_scenario() {
        // sRGB to sRGB with gamma, compress, CUSP, default knee leaves
        // 0xFF8040 untouched.
        let pipe = srgb_identity_pipeline();
        let out = pipe.map_rgb8([0xFF, 0x80, 0x40]);
        assert_eq!(out, [0xFF, 0x80, 0x40]);
    }

    #[test]
    fn test_black_and_white_bypass() {
        let pipe = srgb_identity_pipeline();
        assert_eq!(pipe.map_rgb8([0, 0, 0]), [0, 0, 0]);
        assert_eq!(pipe.map_rgb8([255, 255, 255]), [255, 255, 255]);
    }

    #[test]
    fn test_memo_table_round_trip() {
        let memo = MemoTable::new();
        assert!(memo.get([1, 2, 3]).is_none());
        memo.set([1, 2, 3], [4, 5, 6]);
        assert_eq!(memo.get([1, 2, 3]), Some([4, 5, 6]));
        // Black maps to black and still registers as filled.
        memo.set([9, 9, 9], [0, 0, 0]);
        assert_eq!(memo.get([9, 9, 9]), Some([0, 0, 0]));
    }

    #[test]
    fn test_memoized_pipeline_matches_unmemoized() {
        let plain = srgb_identity_pipeline();
        let mut memoized = Pipeline::new(Config::new()).unwrap();
        memoized.enable_memo();
        for rgb in [[10, 200, 60], [255, 0, 0], [128, 128, 128]] {
            let expected = plain.map_rgb8(rgb);
            // First call computes, second call reads the memo.
            assert_eq!(memoized.map_rgb8(rgb), expected);
            assert_eq!(memoized.map_rgb8(rgb), expected);
        }
    }

    #[test]
    fn test_rgba_buffer_mapping() {
        let pipe = srgb_identity_pipeline();
        let mut pixels = vec![0xFF, 0x80, 0x40, 0x7F, 0x10, 0x20, 0x30, 0xFF];
        pipe.map_rgba_pixels(&mut pixels);
        assert_eq!(&pixels[0..3], &[0xFF, 0x80, 0x40]);
        // Alpha untouched.
        assert_eq!(pixels[3], 0x7F);
        assert_eq!(pixels[7], 0xFF);
    }

    #[test]
    fn test_ntscj_red_scenario() {
        // Pure sRGB red treated as NTSC-J encoded: compression desaturates
        // it into sRGB without collapsing luma.
        let pipe = ntscj_pipeline();
        let [r, g, b] = pipe.map_rgb8([0xFF, 0x00, 0x00]);
        assert!(r < 255, "red {r}");
        assert!(g > 0, "green {g}");
        assert!(b > 0, "blue {b}");

        let luma_in = 0.2126;
        let luma_out = 0.2126_f64
            .mul_add(
                srgb_to_linear(f64::from(r) / 255.0),
                0.7152 * srgb_to_linear(f64::from(g) / 255.0),
            )
            + 0.0722 * srgb_to_linear(f64::from(b) / 255.0);
        assert!(
            (luma_out - luma_in).abs() / luma_in < 0.10,
            "luma {luma_in} became {luma_out}"
        );
    }

    #[test]
    fn test_clip_mode_matches_matrix_chain() {
        let config = Config {
            map_mode: MapMode::Clip,
            ..ntscj_config()
        };
        let pipe = Pipeline::new(config).unwrap();
        let gamma_rgb = Vec3::from(0.5, 0.3, 0.7);
        let out = pipe.map_gamma(&gamma_rgb);
        let linear = Vec3::from(
            srgb_to_linear(gamma_rgb.x),
            srgb_to_linear(gamma_rgb.y),
            srgb_to_linear(gamma_rgb.z),
        );
        let expected = pipe
            .dest()
            .xyz_to_linear_rgb(&pipe.source().linear_rgb_to_xyz(&linear));
        let expected = Vec3::from(
            srgb_to_gamma(expected.x),
            srgb_to_gamma(expected.y),
            srgb_to_gamma(expected.z),
        );
        assert!(out.nearly_equal(&expected));
    }

    #[test]
    fn test_spiral_scenario() {
        // NTSC-J to sRGB with spiral on: at the green anchor's hue, a
        // color at 0.8 of the cusp chroma picks up between 25% and 75%
        // of the full anchor rotation (cubic hermite between floor 0.7
        // and ceiling 1.0).
        let config = Config {
            spiral_carisma: true,
            ..ntscj_config()
        };
        let pipe = Pipeline::new(config).unwrap();
        let source = pipe.source();
        let green = source.polar_anchors()[2];
        let full = source.anchor_rotations()[2];
        assert!(full.abs() > 1e-6, "green anchor rotation is {full}");

        let (floor_index, weight) = crate::gamut::hue_to_floor_index(green.z);
        let cusp_chroma = source.cusp_chroma_at(floor_index, weight);
        let probe = Vec3::from(green.x, 0.8 * cusp_chroma, green.z);
        let rotation = source.find_hue_rotation(&probe);
        let fraction = rotation / full;
        assert!(
            fraction > 0.25 && fraction < 0.75,
            "rotation fraction {fraction}"
        );
    }

    #[test]
    fn test_nes_pipeline_entry() {
        let mut config = ntscj_config();
        config.nes.enable = true;
        let pipe = Pipeline::new(config).unwrap();
        let rgb = pipe.map_nes_triad(0x5, 1, 0).unwrap();
        // A mid-luma red lands solidly inside 8-bit range.
        assert!(rgb[0] > 0);
        assert!(rgb.iter().all(|&c| c < 255));

        // Without NES enabled the entry point declines.
        assert!(srgb_identity_pipeline().map_nes_triad(0x5, 1, 0).is_none());
    }
}
