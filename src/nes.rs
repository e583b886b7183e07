// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Simulation of the NES/Famicom PPU's composite signal generation for
//! palette synthesis.
//!
//! The PPU encodes each palette entry as a 12-phase square wave; a
//! television recovers Y'UV from it with a bandpass (and, for PAL, comb)
//! filter. Output is idealized R'G'B', ready for a CRT demodulator
//! matrix downstream.
//!
//! References:
//! <https://forums.nesdev.org/viewtopic.php?p=296732#p296732> and the
//! palgen-persune generator.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::crt::{ideal_yuv_to_rgb, YuvPrecision};
use crate::error::Error;
use crate::math::{Mat3, Vec3};
use crate::util::degrees_to_radians;

/// Composite voltage levels, luma $0x-$3x by high/low $x0/$xD by
/// no-emphasis/emphasis.
const SIGNAL_TABLE: [[[f64; 2]; 2]; 4] = [
    [[0.616, 0.500], [0.228, 0.192]],
    [[0.840, 0.676], [0.312, 0.256]],
    [[1.100, 0.896], [0.552, 0.448]],
    [[1.100, 0.896], [0.880, 0.712]],
];

const COMPOSITE_BLACK: f64 = SIGNAL_TABLE[1][1][0];
const COMPOSITE_WHITE: f64 = SIGNAL_TABLE[3][0][0];
/// The highest obtainable signal, in IRE.
const SIGNAL_WHITE_POINT: f64 = 140.0 * (COMPOSITE_WHITE - COMPOSITE_BLACK);

/// Colorburst is supposed to be 40 IRE, but the NES emits 52.64 IRE.
/// A television normalizing chroma against burst amplitude effectively
/// applies this factor; some sets did, some did not.
const COLORBURST_AMP_CORRECTION: f64 = 40.0 / (140.0 * (0.524 - 0.148));

/// Construction parameters for a [`NesPpu`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NesConfig {
    pub enable: bool,
    /// Simulate PAL's alternating line phases.
    pub pal_mode: bool,
    /// Normalize chroma to the NES's non-standard colorburst amplitude.
    pub colorburst_normalize: bool,
    /// Phase skew for hues 0x2, 0x6, and 0xA due to trace design, in
    /// degrees. Sane value is about 4.5.
    pub skew_26a_deg: f64,
    /// Luma boost for hues 0x4, 0x8, and 0xC due to trace design, in
    /// IRE. Sane value is about 1.0.
    pub luma_boost_48c_ire: f64,
    /// Phase skew per luma step in degrees. Depends on the chip:
    /// 2C02E about -2.5, 2C02G about -5.0, 2C07 about 10 (but PAL, so
    /// it cancels out).
    pub phase_skew_per_luma_deg: f64,
    pub yuv_precision: YuvPrecision,
}

impl Default for NesConfig {
    fn default() -> Self {
        // 2C02G defaults.
        Self {
            enable: false,
            pal_mode: false,
            colorburst_normalize: true,
            skew_26a_deg: 4.5,
            luma_boost_48c_ire: 1.0,
            phase_skew_per_luma_deg: -5.0,
            yuv_precision: YuvPrecision::Full,
        }
    }
}

/// Deterministic composite-signal synthesizer for NES palette entries.
#[derive(Debug, Clone, PartialEq)]
pub struct NesPpu {
    pal_mode: bool,
    colorburst_normalize: bool,
    skew_26a: f64,
    luma_boost_48c: f64,
    phase_skew_per_luma: f64,
    yuv_to_rgb: Mat3,
}

impl NesPpu {
    /// Builds the simulator.
    ///
    /// # Errors
    /// Fails if the idealized Y'UV matrix cannot be inverted (it can).
    pub fn new(config: &NesConfig) -> Result<Self, Error> {
        let yuv_to_rgb = ideal_yuv_to_rgb(config.yuv_precision)?;
        log::debug!("Idealized YUV to RGB matrix: {yuv_to_rgb:?}");
        Ok(Self {
            pal_mode: config.pal_mode,
            colorburst_normalize: config.colorburst_normalize,
            skew_26a: degrees_to_radians(config.skew_26a_deg),
            luma_boost_48c: config.luma_boost_48c_ire,
            phase_skew_per_luma: degrees_to_radians(config.phase_skew_per_luma_deg),
            yuv_to_rgb,
        })
    }

    /// The reversed phase used for the next line in PAL mode.
    fn pal_phase(hue: i32) -> i32 {
        if hue >= 1 && hue <= 12 {
            return (-(hue - 5)) % 12;
        }
        hue
    }

    /// Is this hue's waveform high at this subcarrier phase?
    fn in_color_phase(hue: i32, phase: i32, pal: bool) -> bool {
        if pal {
            return (Self::pal_phase(hue) + phase) % 12 < 6;
        }
        (hue + phase) % 12 < 6
    }

    /// Composite signal amplitude for a triad at one subcarrier phase.
    ///
    /// `backwards` selects the reversed-phase behavior of the next PAL
    /// scanline.
    fn encode_composite(
        &self,
        emphasis: i32,
        luma: i32,
        hue: i32,
        wave_phase: i32,
        backwards: bool,
    ) -> f64 {
        let luma_index = if hue >= 0xE { 0x1 } else { luma }.clamp(0, 3);
        let wave_mode = self.pal_mode && backwards;

        // 0 = waveform high; 1 = waveform low.
        let wave_level = if hue == 0x0 {
            0
        } else if hue >= 0xD {
            1
        } else if Self::in_color_phase(hue, wave_phase, wave_mode) {
            0
        } else {
            1
        };

        let emphasis_on = (hue < 0xE)
            && (((emphasis & 1 != 0) && Self::in_color_phase(0xC, wave_phase, wave_mode))
                || ((emphasis & 2 != 0) && Self::in_color_phase(0x4, wave_phase, wave_mode))
                || ((emphasis & 4 != 0) && Self::in_color_phase(0x8, wave_phase, wave_mode)));

        #[allow(clippy::cast_sign_loss)]
        let value =
            SIGNAL_TABLE[luma_index as usize][wave_level as usize][usize::from(emphasis_on)];
        value
    }

    /// Convert an NES (hue, luma, emphasis) triad to normalized Y'UV.
    #[must_use]
    pub fn triad_to_yuv(&self, hue: i32, luma: i32, emphasis: i32) -> Vec3 {
        let mut voltage = [0.0_f64; 12];
        let mut voltage_b = [0.0_f64; 12];

        // Synthesize one scanline, plus the reversed-phase next line in
        // PAL mode.
        for wave_phase in 0..12 {
            #[allow(clippy::cast_sign_loss)]
            let index = wave_phase as usize;
            voltage[index] = self.encode_composite(emphasis, luma, hue, wave_phase, false);
            if self.pal_mode {
                let next_phase = (wave_phase + 2) % 12;
                #[allow(clippy::cast_sign_loss)]
                let next_index = next_phase as usize;
                voltage_b[next_index] =
                    self.encode_composite(emphasis, luma, hue, next_phase, true);
            }
        }

        // Trace design gives hues 0x2, 0x6, and 0xA a phase shift and
        // hues 0x4, 0x8, and 0xC a luma boost.
        let skew_pt1 = if hue == 0x2 || hue == 0x6 || hue == 0xA {
            self.skew_26a
        } else {
            0.0
        };
        let luma_boost = if hue == 0x4 || hue == 0x8 || hue == 0xC {
            self.luma_boost_48c
        } else {
            0.0
        };
        // Phase also skews as luma increases.
        let skew_pt2 = f64::from(luma) * self.phase_skew_per_luma;

        // Shift black to 0 and convert from volts to IRE.
        for i in 0..12 {
            voltage[i] = 140.0 * (voltage[i] - COMPOSITE_BLACK);
            voltage_b[i] = 140.0 * (voltage_b[i] - COMPOSITE_BLACK);
        }

        // Bandpass filter: subtract the per-line mean.
        let mean: f64 = voltage.iter().sum::<f64>() / 12.0;
        let mean_b: f64 = voltage_b.iter().sum::<f64>() / 12.0;
        let mut bandpass = [0.0_f64; 12];
        let mut bandpass_b = [0.0_f64; 12];
        for i in 0..12 {
            bandpass[i] = voltage[i] - mean;
            bandpass_b[i] = voltage_b[i] - mean_b;
        }

        // Comb filter: two lines in PAL, one line doubled in NTSC.
        let mut u_comb = [0.0_f64; 12];
        let mut v_comb = [0.0_f64; 12];
        for i in 0..12 {
            if self.pal_mode {
                u_comb[i] = (bandpass[i] + bandpass_b[i]) / 2.0;
                v_comb[i] = (bandpass[i] - bandpass_b[i]) / 2.0;
            } else {
                u_comb[i] = bandpass[i];
                v_comb[i] = bandpass[i];
            }
        }

        // Demodulate UV. Subcarrier generation is 180 degrees offset,
        // and the waveform encoding puts the hue off by an additional
        // half sample. Colorburst sits at hue 0x8 on NTSC models, 7.5
        // on PAL. The 2x comes from the integral of sin(2*PI*x)^2.
        let colorburst_phase = if self.pal_mode { 7.5 } else { 8.0 };
        let saturation_correction = if self.colorburst_normalize {
            2.0 * COLORBURST_AMP_CORRECTION
        } else {
            2.0
        };

        let mut u_out = 0.0;
        let mut v_out = 0.0;
        for (i, (u, v)) in u_comb.iter().zip(v_comb.iter()).enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let sample = i as f64;
            let theta = ((2.0 * PI) / 12.0) * (sample - 1.0 - colorburst_phase - 0.5) - skew_pt1
                + skew_pt2;
            u_out += u * saturation_correction * theta.sin();
            v_out += v * saturation_correction * theta.cos();
        }
        u_out /= 12.0;
        v_out /= 12.0;

        // Decode Y from the line mean; PAL takes the mean of the signal
        // with its bandpass component removed.
        let mut y_out = if self.pal_mode {
            let mut sum = 0.0;
            for i in 0..12 {
                sum += voltage[i] - bandpass[i];
            }
            sum / 12.0
        } else {
            mean
        };
        y_out += luma_boost;

        // Normalize IRE to the 0-1 range. Out-of-bounds values survive
        // because the NES does crazy things.
        Vec3::from(
            y_out / SIGNAL_WHITE_POINT,
            u_out / SIGNAL_WHITE_POINT,
            v_out / SIGNAL_WHITE_POINT,
        )
    }

    /// Convert an NES (hue, luma, emphasis) triad to idealized R'G'B'.
    #[must_use]
    pub fn triad_to_rgb(&self, hue: i32, luma: i32, emphasis: i32) -> Vec3 {
        let yuv = self.triad_to_yuv(hue, luma, emphasis);
        self.yuv_to_rgb.transform(&yuv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ntsc_ppu() -> NesPpu {
        NesPpu::new(&NesConfig::default()).unwrap()
    }

    #[test]
    fn test_grays_have_no_chroma() {
        let ppu = ntsc_ppu();
        for luma in 0..4 {
            let yuv = ppu.triad_to_yuv(0x0, luma, 0);
            assert!(yuv.y.abs() < 1e-9, "luma {luma} U {}", yuv.y);
            assert!(yuv.z.abs() < 1e-9, "luma {luma} V {}", yuv.z);
        }
    }

    #[test]
    fn test_luma_ordering() {
        let ppu = ntsc_ppu();
        let mut last = -1.0;
        for luma in 0..4 {
            let yuv = ppu.triad_to_yuv(0x0, luma, 0);
            assert!(yuv.x > last);
            last = yuv.x;
        }
    }

    #[test]
    fn test_white_is_unity() {
        let ppu = ntsc_ppu();
        let yuv = ppu.triad_to_yuv(0x0, 3, 0);
        assert!((yuv.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hue_5_luma_1() {
        // Six of twelve phases are high, so the line mean is half the
        // luma-1 amplitude: 140*(0.840-0.312)/2 = 36.96 IRE, which is
        // 0.335 of the signal white point.
        let ppu = ntsc_ppu();
        let yuv = ppu.triad_to_yuv(0x5, 1, 0);
        assert!((yuv.x - 0.335).abs() < 0.02, "Y {}", yuv.x);
        assert!(yuv.y < 0.0 && yuv.y > -0.1, "U {}", yuv.y);
        assert!(yuv.z > 0.2 && yuv.z < 0.4, "V {}", yuv.z);
    }

    #[test]
    fn test_palette_rgb_in_range() {
        let ppu = ntsc_ppu();
        let rgb = ppu.triad_to_rgb(0x5, 1, 0);
        for channel in [rgb.x, rgb.y, rgb.z] {
            assert!(channel > -0.05 && channel < 1.05, "channel {channel}");
        }
    }

    #[test]
    fn test_super_black_is_below_black() {
        // Hue 0xD at luma 0 sits below the blanking level.
        let ppu = ntsc_ppu();
        let yuv = ppu.triad_to_yuv(0xD, 0, 0);
        assert!(yuv.x < 0.0);
    }

    #[test]
    fn test_emphasis_darkens() {
        let ppu = ntsc_ppu();
        let plain = ppu.triad_to_yuv(0x0, 2, 0);
        let emphasized = ppu.triad_to_yuv(0x0, 2, 7);
        assert!(emphasized.x < plain.x);
    }

    #[test]
    fn test_pal_phase_reversal_preserves_luma() {
        let config = NesConfig {
            pal_mode: true,
            phase_skew_per_luma_deg: 10.0,
            ..NesConfig::default()
        };
        let pal = NesPpu::new(&config).unwrap();
        let ntsc = ntsc_ppu();
        let pal_yuv = pal.triad_to_yuv(0x5, 1, 0);
        let ntsc_yuv = ntsc.triad_to_yuv(0x5, 1, 0);
        assert!((pal_yuv.x - ntsc_yuv.x).abs() < 0.02);
    }
}
