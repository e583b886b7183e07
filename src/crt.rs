// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Emulation of a CRT television's analog signal path.
//!
//! The chain is: black pedestal crush, the composite modulator's
//! R'G'B'→R'G'B' matrix, the jungle chip demodulator's matrix (with its
//! color correction), signal clamping, the analog gamma knob, and the
//! BT.1886 Appendix 1 electro-optical transfer function.
//!
//! The seminal text on demodulator color correction is Parker, N.W.,
//! "An Analysis of the Necessary Decoder Corrections for Color Receiver
//! Operation with Non-Standard Receiver Primaries." *IEEE Transactions
//! on Broadcast and Television Receivers*, Vol 12, Issue 1, pp 23-32.
//! 1966.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::Error;
use crate::math::{Mat3, Vec2, Vec3};
use crate::tables::{Demodulator, Modulator, NamedGamut, Whitepoint, U_SCALE, V_SCALE};
use crate::util::degrees_to_radians;

/// Where CRT emulation sits in the pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrtEmulationMode {
    /// No CRT emulation.
    #[default]
    None,
    /// Emulate the CRT that displayed the source content.
    Front,
    /// Emulate a CRT on the output side.
    Back,
}

/// Precision tier for the NTSC 1953 white balance weights.
///
/// Three tiers are commonly seen in hardware: the truncated 2-digit
/// constants from the 1953 standard, the 3-digit constants from 1994
/// SMPTE-C (170M), and the exact weights computed from the 1953
/// primaries and Illuminant C.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YuvPrecision {
    /// 2-digit constants from the 1953 standard.
    Crap,
    /// 3-digit constants from SMPTE-C (170M, 1994).
    Mid,
    /// Exact weights from the 1953 primaries and Illuminant C.
    #[default]
    Full,
}

/// When to renormalize demodulator gains stated relative to blue.
///
/// The CXA1213AS looks more plausible without renormalization while the
/// TDA8362 looks wildly wrong without it, so the decision is punted to
/// the user rather than hardcoded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenormPolicy {
    /// Never renormalize.
    None,
    /// Only when blue has both a non-zero angle and a non-unit gain.
    Insane,
    /// When blue's angle is non-zero.
    AngleNotZero,
    /// When blue's gain is not one.
    #[default]
    GainNotOne,
    /// When either is off nominal.
    Any,
}

/// Construction parameters for a [`CrtDescriptor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrtConfig {
    pub mode: CrtEmulationMode,
    /// Luminosity on black input, cd/m² divided by 100.
    pub black_level: f64,
    /// Luminosity on white input, cd/m² divided by 100.
    pub white_level: f64,
    pub yuv_precision: YuvPrecision,
    pub modulator: Option<Modulator>,
    pub demodulator: Option<Demodulator>,
    pub renorm_policy: RenormPolicy,
    /// Autocorrect datasheet values that are obviously rounded.
    pub demod_autofix: bool,
    /// Analog hue knob in degrees, applied to the demodulation angles.
    pub hue_deg: f64,
    /// Analog saturation knob; 1.0 is neutral.
    pub saturation: f64,
    /// Analog gamma knob; 1.0 is neutral.
    pub gamma: f64,
    pub clamp_low: f64,
    pub clamp_high: f64,
    pub clamp_high_enable: bool,
    /// Move the low clamp up to the zero-light input level when that is
    /// higher than `clamp_low`.
    pub clamp_low_at_zero_light: bool,
    pub pedestal_crush_enable: bool,
    /// Black pedestal fraction, 7.5 IRE on US NTSC.
    pub pedestal_amount: f64,
}

impl Default for CrtConfig {
    fn default() -> Self {
        Self {
            mode: CrtEmulationMode::None,
            black_level: 0.001,
            white_level: 1.0,
            yuv_precision: YuvPrecision::Full,
            modulator: None,
            demodulator: None,
            renorm_policy: RenormPolicy::GainNotOne,
            demod_autofix: true,
            hue_deg: 0.0,
            saturation: 1.0,
            gamma: 1.0,
            clamp_low: -0.075,
            clamp_high: 1.1,
            clamp_high_enable: false,
            clamp_low_at_zero_light: true,
            pedestal_crush_enable: false,
            pedestal_amount: 0.075,
        }
    }
}

/// Derived state for one emulated CRT. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CrtDescriptor {
    // BT.1886 Appendix 1 EOTF parameters.
    black_level: f64,
    white_level: f64,
    eotf_b: f64,
    eotf_k: f64,
    eotf_s: f64,
    eotf_i: f64,

    // NTSC 1953 white balance weights.
    wr: f64,
    wg: f64,
    wb: f64,

    overall: Mat3,
    inverse_overall: Mat3,

    clamp_low: f64,
    clamp_high: f64,
    clamp_high_enable: bool,
    zero_light_clamp: bool,

    gamma_adjust: f64,
    crush_enable: bool,
    crush_amount: f64,
}

impl CrtDescriptor {
    /// Builds the derived matrices and EOTF parameters from a config.
    ///
    /// # Errors
    /// Fails when any derived matrix is not invertible.
    pub fn new(config: &CrtConfig) -> Result<Self, Error> {
        let (black_level, white_level) = sanitize_levels(config.black_level, config.white_level);
        let eotf_b = brute_force_1886_b(black_level, white_level);
        let eotf_k = white_level / (1.0 + eotf_b).powf(2.6);
        let eotf_s = (0.35 + eotf_b).powf(-0.4);
        let eotf_i = eotf_k * (0.35 + eotf_b).powf(2.6);
        log::debug!(
            "CRT EOTF constants: black {black_level}, white {white_level}, b {eotf_b:.16}, \
             k {eotf_k:.16}, s {eotf_s:.16}, i {eotf_i:.16}"
        );

        let (wr, wg, wb) = white_balance_weights(config.yuv_precision)?;

        let mut clamp_low = config.clamp_low;
        let mut zero_light_clamp = false;
        if config.clamp_low_at_zero_light {
            let mut zero_light = eotf_b;
            if config.gamma != 1.0 {
                zero_light = zero_light.powf(1.0 / config.gamma);
            }
            zero_light = -zero_light;
            if zero_light > clamp_low {
                clamp_low = zero_light;
                zero_light_clamp = true;
                log::debug!(
                    "CRT R'G'B' low clamp moved to {clamp_low:.16}, the zero light output level"
                );
            }
        }

        let mut overall = match (config.modulator, config.demodulator) {
            (Some(modulator), Some(demodulator)) => {
                let m = modulator_matrix(modulator, config.yuv_precision)?;
                let d = demodulator_matrix(
                    demodulator,
                    config.yuv_precision,
                    config.renorm_policy,
                    config.demod_autofix,
                    config.hue_deg,
                )?;
                &d * &m
            }
            (Some(modulator), None) => modulator_matrix(modulator, config.yuv_precision)?,
            (None, Some(demodulator)) => demodulator_matrix(
                demodulator,
                config.yuv_precision,
                config.renorm_policy,
                config.demod_autofix,
                config.hue_deg,
            )?,
            (None, None) => {
                log::warn!("CRT emulation with neither modulator nor demodulator; using identity");
                Mat3::identity()
            }
        };

        if config.saturation != 1.0 {
            // The knob scales Pb and Pr around gray before demodulation.
            // It might instead apply to R-Y/B-Y after demodulation on
            // some chassis; no parameter for that yet.
            overall = &overall * &saturation_matrix(config.saturation, wr, wg, wb);
        }
        log::debug!("CRT overall matrix: {overall:?}");

        let inverse_overall = overall.inverted()?;

        Ok(Self {
            black_level,
            white_level,
            eotf_b,
            eotf_k,
            eotf_s,
            eotf_i,
            wr,
            wg,
            wb,
            overall,
            inverse_overall,
            clamp_low,
            clamp_high: config.clamp_high,
            clamp_high_enable: config.clamp_high_enable,
            zero_light_clamp,
            gamma_adjust: config.gamma,
            crush_enable: config.pedestal_crush_enable,
            crush_amount: config.pedestal_amount,
        })
    }

    /// The fitted BT.1886 `b` parameter.
    #[must_use]
    pub const fn eotf_b(&self) -> f64 {
        self.eotf_b
    }

    /// The NTSC 1953 white balance weights in use.
    #[must_use]
    pub const fn white_balance(&self) -> (f64, f64, f64) {
        (self.wr, self.wg, self.wb)
    }

    /// The BT.1886 Appendix 1 EOTF.
    ///
    /// More faithful than the Annex 1 function, which is just 2.4 gamma.
    /// Negative inputs are handled by sign flip in the fashion of
    /// IEC 61966-2-4 (xvYCC). Dynamic range is restored by chopping off
    /// the black lift and normalizing to 0-1.
    #[must_use]
    pub fn eotf_to_linear(&self, input: f64) -> f64 {
        let mut input = input + self.eotf_b;

        if self.zero_light_clamp && input < 0.0 {
            input = 0.0;
        }

        let flip = input < 0.0;
        if flip {
            input = -input;
        }

        let mut output = if input < 0.35 + self.eotf_b {
            self.eotf_k * self.eotf_s * input.powi(3)
        } else {
            self.eotf_k * input.powf(2.6)
        };

        if flip {
            output = -output;
        }

        output -= self.black_level;
        output /= self.white_level - self.black_level;
        snap_unit(output)
    }

    /// Inverse of [`Self::eotf_to_linear`].
    #[must_use]
    pub fn eotf_to_gamma(&self, input: f64) -> f64 {
        let mut input = input.mul_add(self.white_level - self.black_level, self.black_level);

        let flip = input < 0.0;
        if flip {
            input = -input;
        }

        let mut output = if input < self.eotf_i {
            ((1.0 / self.eotf_k) * (1.0 / self.eotf_s) * input).cbrt()
        } else {
            ((1.0 / self.eotf_k) * input).powf(1.0 / 2.6)
        };

        if flip {
            output = -output;
        }

        output -= self.eotf_b;
        snap_unit(output)
    }

    /// Remove the black pedestal, rescaling the remaining range to 0-1.
    #[must_use]
    pub fn crush_black(&self, input: &Vec3) -> Vec3 {
        if !self.crush_enable {
            return *input;
        }
        let scale = 1.0 - self.crush_amount;
        Vec3::from(
            ((input.x - self.crush_amount) / scale).max(0.0),
            ((input.y - self.crush_amount) / scale).max(0.0),
            ((input.z - self.crush_amount) / scale).max(0.0),
        )
    }

    /// Restore the black pedestal.
    #[must_use]
    pub fn uncrush_black(&self, input: &Vec3) -> Vec3 {
        if !self.crush_enable {
            return *input;
        }
        let scale = 1.0 - self.crush_amount;
        Vec3::from(
            input.x.mul_add(scale, self.crush_amount),
            input.y.mul_add(scale, self.crush_amount),
            input.z.mul_add(scale, self.crush_amount),
        )
    }

    fn clamp_rgb(&self, mut color: Vec3) -> Vec3 {
        // The low clamp is mandatory: at some point there are simply zero
        // volts driving the electron gun, and very negative values also
        // send the Jzazbz PQ function into NaN territory. The high clamp
        // is optional; compression handles overshoots if it is off.
        if self.clamp_high_enable {
            color.x = color.x.min(self.clamp_high);
            color.y = color.y.min(self.clamp_high);
            color.z = color.z.min(self.clamp_high);
        }
        color.x = color.x.max(self.clamp_low);
        color.y = color.y.max(self.clamp_low);
        color.z = color.z.max(self.clamp_low);
        color
    }

    fn gamma_knob(&self, color: Vec3, invert: bool) -> Vec3 {
        if self.gamma_adjust == 1.0 {
            return color;
        }
        let exponent = if invert {
            1.0 / self.gamma_adjust
        } else {
            self.gamma_adjust
        };
        let apply = |value: f64| -> f64 {
            // Odd-symmetric so undershoots keep their sign.
            if value < 0.0 {
                -((-value).powf(exponent))
            } else {
                value.powf(exponent)
            }
        };
        Vec3::from(apply(color.x), apply(color.y), apply(color.z))
    }

    /// Full forward emulation: gamma-space R'G'B' in, linear light out.
    #[must_use]
    pub fn gamma_to_linear(&self, input: &Vec3) -> Vec3 {
        let crushed = self.crush_black(input);
        let corrected = self.overall.transform(&crushed);
        let clamped = self.clamp_rgb(corrected);
        let adjusted = self.gamma_knob(clamped, false);
        Vec3::from(
            self.eotf_to_linear(adjusted.x),
            self.eotf_to_linear(adjusted.y),
            self.eotf_to_linear(adjusted.z),
        )
    }

    /// Full inverse emulation: linear light in, gamma-space R'G'B' out.
    ///
    /// `uncrush` restores the black pedestal; gamut boundary sampling
    /// suppresses it so the bottom of input space stays reachable.
    #[must_use]
    pub fn linear_to_gamma(&self, input: &Vec3, uncrush: bool) -> Vec3 {
        let encoded = Vec3::from(
            self.eotf_to_gamma(input.x),
            self.eotf_to_gamma(input.y),
            self.eotf_to_gamma(input.z),
        );
        let adjusted = self.gamma_knob(encoded, true);
        let uncorrected = self.inverse_overall.transform(&adjusted);
        if uncrush {
            return self.uncrush_black(&uncorrected);
        }
        uncorrected
    }
}

fn sanitize_levels(black: f64, white: f64) -> (f64, f64) {
    let mut black = black;
    let mut white = white;
    if black < 0.0 {
        log::warn!("Negative luminosity is impossible; setting CRT black level to 0");
        black = 0.0;
    }
    if white < 0.0 {
        log::warn!("Negative luminosity is impossible; setting CRT white level to 0");
        white = 0.0;
    }
    if black >= white {
        log::warn!("Black brighter than white is impossible; using default levels");
        black = 0.001;
        white = 1.0;
    }
    (black, white)
}

/// Brute force the `b` parameter of the BT.1886 Appendix 1 EOTF by
/// binary search over [0, 1].
#[must_use]
pub fn brute_force_1886_b(black_level: f64, white_level: f64) -> f64 {
    if black_level == 0.0 {
        return 0.0;
    }

    let mut floor = 0.0_f64;
    let mut ceiling = 1.0_f64;
    let mut guess;
    let mut iters = 0;
    loop {
        guess = (floor + ceiling) * 0.5;
        let result =
            (white_level / (1.0 + guess).powf(2.6)) * (0.35 + guess).powf(-0.4) * guess.powi(3);
        if result == black_level {
            break;
        }
        iters += 1;
        if iters > 100 {
            break;
        }
        if (result - black_level).abs() < 1e-16 {
            break;
        }
        if result > black_level {
            ceiling = guess;
        } else {
            floor = guess;
        }
    }
    guess
}

fn snap_unit(value: f64) -> f64 {
    if value != 0.0 && value.abs() < 1e-6 {
        return 0.0;
    }
    if value != 1.0 && (value - 1.0).abs() < 1e-6 {
        return 1.0;
    }
    value
}

/// The NTSC 1953 white balance weights at the selected precision.
///
/// # Errors
/// Fails if the NTSC primary matrix is not invertible (it is).
pub fn white_balance_weights(precision: YuvPrecision) -> Result<(f64, f64, f64), Error> {
    match precision {
        YuvPrecision::Crap => Ok((0.3, 0.59, 0.11)),
        YuvPrecision::Mid => Ok((0.299, 0.587, 0.114)),
        YuvPrecision::Full => {
            // The exact weights are the middle row of the NPM built from
            // the 1953 primaries and Illuminant C.
            let primaries = NamedGamut::Ntsc.primaries();
            let p = Mat3::from_rows([
                [primaries[0].x, primaries[1].x, primaries[2].x],
                [primaries[0].y, primaries[1].y, primaries[2].y],
                [primaries[0].z, primaries[1].z, primaries[2].z],
            ]);
            let inverse_p = p.inverted()?;
            let white = Whitepoint::IlluminantC.xy();
            let w = Vec3::from(white.x / white.y, 1.0, white.z / white.y);
            let factors = inverse_p.transform(&w);
            let npm = &p * &Mat3::from_diagonal(&factors);
            Ok((npm.at(1, 0), npm.at(1, 1), npm.at(1, 2)))
        }
    }
}

/// Idealized R'G'B' to Y'UV matrix at the selected precision.
///
/// # Errors
/// Fails if the NTSC primary matrix is not invertible (it is).
pub fn ideal_rgb_to_yuv(precision: YuvPrecision) -> Result<Mat3, Error> {
    let (wr, wg, wb) = white_balance_weights(precision)?;
    let rgb_to_ypbpr = Mat3::from_rows([
        [wr, wg, wb],
        [-wr, -wg, wr + wg],
        [wg + wb, -wg, -wb],
    ]);
    let ypbpr_to_yuv = Mat3::from_diagonal(&Vec3::from(1.0, U_SCALE, V_SCALE));
    Ok(&ypbpr_to_yuv * &rgb_to_ypbpr)
}

/// Idealized Y'UV to R'G'B' matrix at the selected precision.
///
/// # Errors
/// Fails if the idealized R'G'B' to Y'UV matrix is not invertible (it is).
pub fn ideal_yuv_to_rgb(precision: YuvPrecision) -> Result<Mat3, Error> {
    ideal_rgb_to_yuv(precision)?.inverted()
}

/// The unmodified demodulation angle (radians) and gain for green.
///
/// Datasheets truncate these; autocorrection restores full precision.
///
/// # Errors
/// Fails if the NTSC primary matrix is not invertible (it is).
pub fn vanilla_green(precision: YuvPrecision) -> Result<Vec2, Error> {
    let (wr, wg, _) = white_balance_weights(precision)?;
    let v_up = 1.0 / V_SCALE;
    let u_up = 1.0 / U_SCALE;

    let yg = (1.0 + ((1.0 - wg) / wg)) * -1.0 * v_up * wr;
    let xg = (u_up * wr) + ((1.0 - wg) * (1.0 / wg) * ((wr - 1.0) * u_up));
    let mut gain = yg.hypot(xg);
    gain /= u_up;
    let mut angle = yg.atan2(xg);
    // Pull the angle into the third quadrant where green demodulation
    // axes live.
    while angle < PI {
        angle += 0.5 * PI;
    }
    while angle > 1.5 * PI {
        angle -= 0.5 * PI;
    }
    Ok(Vec2::from(angle, gain))
}

/// Builds the modulator's R'G'B' to R'G'B' matrix.
///
/// The encoder's R'G'B'→Y'UV matrix is built from the datasheet's axis
/// angles and color/burst ratios, then composed with the idealized
/// Y'UV→R'G'B' decode. Rows are normalized to absorb datasheet rounding.
///
/// # Errors
/// Fails if the idealized Y'UV matrix is not invertible (it is).
pub fn modulator_matrix(modulator: Modulator, precision: YuvPrecision) -> Result<Mat3, Error> {
    let info = modulator.info();
    let red_angle = degrees_to_radians(info.angles[0]);
    let green_angle = degrees_to_radians(info.angles[1]);
    let blue_angle = degrees_to_radians(info.angles[2]);

    // Burst is a sine centered at 0 IRE peaking at half its
    // peak-to-peak voltage; to spec, burst peak over white is
    // 20 IRE / 100 IRE = 0.2. Compute it in case things are off spec.
    let burst_peak_over_white = info.burst_vpp / (2.0 * info.white_v);

    let red_mult = info.ratios[0] * burst_peak_over_white;
    let green_mult = info.ratios[1] * burst_peak_over_white;
    let blue_mult = info.ratios[2] * burst_peak_over_white;

    let (wr, wg, wb) = white_balance_weights(precision)?;
    let rgb_to_yuv = Mat3::from_rows([
        [wr, wg, wb],
        [
            red_mult * red_angle.cos(),
            green_mult * green_angle.cos(),
            blue_mult * blue_angle.cos(),
        ],
        [
            red_mult * red_angle.sin(),
            green_mult * green_angle.sin(),
            blue_mult * blue_angle.sin(),
        ],
    ]);

    let decode = ideal_yuv_to_rgb(precision)?;
    let matrix = (&decode * &rgb_to_yuv).row_normalized();
    log::debug!("CRT modulator matrix for {}: {matrix:?}", modulator.name());
    Ok(matrix)
}

/// Builds the demodulator's R'G'B' to R'G'B' color correction matrix.
///
/// # Errors
/// Fails if the idealized Y'UV matrix is not invertible (it is).
pub fn demodulator_matrix(
    demodulator: Demodulator,
    precision: YuvPrecision,
    renorm_policy: RenormPolicy,
    autofix: bool,
    hue_offset_deg: f64,
) -> Result<Mat3, Error> {
    let info = demodulator.info();
    let mut red_angle = degrees_to_radians(info.angles[0]);
    let mut green_angle = degrees_to_radians(info.angles[1]);
    let mut blue_angle = degrees_to_radians(info.angles[2]);

    let mut red_gain = info.gains[0];
    let mut green_gain = info.gains[1];
    let mut blue_gain = info.gains[2];

    // Where red or green looks unmodified but for datasheet truncation,
    // restore the full precision value.
    if autofix || demodulator == Demodulator::Dummy {
        if red_gain >= 0.55 && red_gain < 0.57 {
            let exact = U_SCALE / V_SCALE;
            log::warn!("Assuming red gain of {red_gain} really meant {exact}");
            red_gain = exact;
        }
        let angle_fix = info.angles[1] >= 235.0 && info.angles[1] <= 237.0;
        let gain_fix = green_gain >= 0.34 && green_gain <= 0.35;
        if angle_fix || gain_fix {
            let vanilla = vanilla_green(precision)?;
            if angle_fix {
                log::warn!(
                    "Assuming green angle of {} really meant {}",
                    info.angles[1],
                    vanilla.x.to_degrees()
                );
                green_angle = vanilla.x;
            }
            if gain_fix {
                log::warn!("Assuming green gain of {green_gain} really meant {}", vanilla.y);
                green_gain = vanilla.y;
            }
        }
    }

    // The analog hue knob rotates all three axes. Applied after
    // autocorrection (which replaces the green angle) but before
    // renormalization (which depends on where blue lands).
    if hue_offset_deg != 0.0 {
        let offset = degrees_to_radians(hue_offset_deg);
        red_angle += offset;
        green_angle += offset;
        blue_angle += offset;
    }

    // Gains near 2.03 are already absolute; anything below ~1.8 is
    // normalized to blue.
    if blue_gain < 1.8 {
        if blue_gain != 1.0 {
            log::warn!(
                "B-Y gain is {blue_gain} rather than 1.0; still assuming gains are \
                 normalized to blue"
            );
        }
        let u_up = 1.0 / U_SCALE;
        let v_up = 1.0 / V_SCALE;
        let mut norm_factor = u_up;

        let weird_gain = blue_gain != 1.0;
        let weird_angle = blue_angle != 0.0;
        let do_renorm = match renorm_policy {
            RenormPolicy::None => false,
            RenormPolicy::Insane => weird_gain && weird_angle,
            RenormPolicy::AngleNotZero => weird_angle,
            RenormPolicy::GainNotOne => weird_gain,
            RenormPolicy::Any => weird_gain || weird_angle,
        };
        if do_renorm {
            // The Y'UV upscale factors trace an ellipse with u on one
            // axis and v on the other; the radius at theta is
            // ab / sqrt((a sin theta)^2 + (b cos theta)^2).
            let a_up = if weird_angle {
                (u_up * v_up)
                    / ((u_up * blue_angle.sin()).powi(2) + (v_up * blue_angle.cos()).powi(2))
                        .sqrt()
            } else {
                u_up
            };
            norm_factor = a_up / blue_gain;
        }

        red_gain *= norm_factor;
        green_gain *= norm_factor;
        blue_gain *= norm_factor;
    } else {
        log::warn!("B-Y gain is {blue_gain}; assuming gains are not normalized");
    }

    // Depolarize each axis to UV coordinates and build Y'UV to R'G'B'.
    let yuv_to_rgb = Mat3::from_rows([
        [1.0, red_gain * red_angle.cos(), red_gain * red_angle.sin()],
        [
            1.0,
            green_gain * green_angle.cos(),
            green_gain * green_angle.sin(),
        ],
        [
            1.0,
            blue_gain * blue_angle.cos(),
            blue_gain * blue_angle.sin(),
        ],
    ]);

    // Compose with the idealized encode. This normalizes better than
    // Parker's construction, which puts all the error on blue.
    let encode = ideal_rgb_to_yuv(precision)?;
    let matrix = (&yuv_to_rgb * &encode).row_normalized();
    log::debug!(
        "CRT demodulator matrix for {}: {matrix:?}",
        demodulator.name()
    );
    Ok(matrix)
}

/// R'G'B' matrix scaling Pb and Pr around gray by `saturation`.
#[must_use]
pub fn saturation_matrix(saturation: f64, wr: f64, wg: f64, wb: f64) -> Mat3 {
    let delta = saturation - 1.0;
    Mat3::from_rows([
        [
            (1.0 - wr).mul_add(delta, 1.0),
            -wg * delta,
            -wb * delta,
        ],
        [
            -wr * delta,
            (1.0 - wg).mul_add(delta, 1.0),
            -wb * delta,
        ],
        [
            -wr * delta,
            -wg * delta,
            (1.0 - wb).mul_add(delta, 1.0),
        ],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_descriptor() -> CrtDescriptor {
        let config = CrtConfig {
            mode: CrtEmulationMode::Front,
            modulator: Some(Modulator::Cxa1145),
            demodulator: Some(Demodulator::Cxa1464asJp),
            ..CrtConfig::default()
        };
        CrtDescriptor::new(&config).unwrap()
    }

    #[test]
    fn test_brute_force_b_converges() {
        let b = brute_force_1886_b(0.001, 1.0);
        let residual = (1.0 / (1.0 + b).powf(2.6)) * (0.35 + b).powf(-0.4) * b.powi(3);
        assert!((residual - 0.001).abs() < 1e-12, "b {b}, residual {residual}");
        assert!(b > 0.09 && b < 0.11, "b is {b}");
    }

    #[test]
    fn test_brute_force_b_zero_black() {
        assert_eq!(brute_force_1886_b(0.0, 1.0), 0.0);
    }

    #[test]
    fn test_brute_force_b_monotonic() {
        let dim = brute_force_1886_b(0.0005, 1.0);
        let bright = brute_force_1886_b(0.002, 1.0);
        assert!(bright > dim);
    }

    #[test]
    fn test_eotf_round_trip() {
        let crt = default_descriptor();
        for i in 0..=100 {
            let x = f64::from(i) / 100.0;
            let back = crt.eotf_to_gamma(crt.eotf_to_linear(x));
            assert!((back - x).abs() < 2e-6, "x {x}, back {back}");
        }
    }

    #[test]
    fn test_eotf_endpoints() {
        let crt = default_descriptor();
        assert_eq!(crt.eotf_to_linear(0.0), 0.0);
        assert_eq!(crt.eotf_to_linear(1.0), 1.0);
    }

    #[test]
    fn test_white_balance_full_precision() {
        let (wr, wg, wb) = white_balance_weights(YuvPrecision::Full).unwrap();
        // The truncated 1953 constants round off these exact values.
        assert!((wr - 0.3).abs() < 0.01);
        assert!((wg - 0.59).abs() < 0.01);
        assert!((wb - 0.11).abs() < 0.01);
        assert!((wr + wg + wb - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ideal_yuv_round_trip() {
        let encode = ideal_rgb_to_yuv(YuvPrecision::Full).unwrap();
        let decode = ideal_yuv_to_rgb(YuvPrecision::Full).unwrap();
        let rgb = Vec3::from(0.25, 0.5, 0.75);
        let back = decode.transform(&encode.transform(&rgb));
        assert!(back.nearly_equal(&rgb));
    }

    #[test]
    fn test_vanilla_green_near_datasheet() {
        // Datasheets quote green around 236 degrees at 0.34-0.35 gain.
        let green = vanilla_green(YuvPrecision::Full).unwrap();
        let degrees = green.x.to_degrees();
        assert!(degrees > 234.0 && degrees < 238.0, "angle {degrees}");
        assert!(green.y > 0.33 && green.y < 0.36, "gain {}", green.y);
    }

    #[test]
    fn test_modulator_rows_sum_to_one() {
        let m = modulator_matrix(Modulator::Cxa1145, YuvPrecision::Full).unwrap();
        for row in 0..3 {
            let sum = m.at(row, 0) + m.at(row, 1) + m.at(row, 2);
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dummy_demodulator_nearly_identity() {
        // The dummy row autocorrects to the exact idealized values, so
        // its correction matrix should collapse to identity.
        let m = demodulator_matrix(
            Demodulator::Dummy,
            YuvPrecision::Full,
            RenormPolicy::GainNotOne,
            true,
            0.0,
        )
        .unwrap();
        for row in 0..3 {
            for col in 0..3 {
                let expected = if row == col { 1.0 } else { 0.0 };
                assert!(
                    (m.at(row, col) - expected).abs() < 0.02,
                    "({row},{col}) = {}",
                    m.at(row, col)
                );
            }
        }
    }

    #[test]
    fn test_saturation_matrix_neutral_on_gray() {
        let m = saturation_matrix(1.3, 0.3, 0.59, 0.11);
        let gray = m.transform(&Vec3::from(0.5, 0.5, 0.5));
        assert!(gray.nearly_equal(&Vec3::from(0.5, 0.5, 0.5)));
    }

    #[test]
    fn test_crush_round_trip() {
        let config = CrtConfig {
            mode: CrtEmulationMode::Front,
            demodulator: Some(Demodulator::Cxa1464asJp),
            pedestal_crush_enable: true,
            ..CrtConfig::default()
        };
        let crt = CrtDescriptor::new(&config).unwrap();
        let color = Vec3::from(0.3, 0.5, 0.9);
        let back = crt.uncrush_black(&crt.crush_black(&color));
        assert!(back.nearly_equal(&color));
    }

    #[test]
    fn test_emulation_round_trip() {
        let crt = default_descriptor();
        let samples = [
            Vec3::from(0.2, 0.4, 0.6),
            Vec3::from(0.9, 0.1, 0.5),
            Vec3::from(0.5, 0.5, 0.5),
        ];
        for rgb in &samples {
            let linear = crt.gamma_to_linear(rgb);
            let back = crt.linear_to_gamma(&linear, true);
            assert!(
                back.nearly_equal(rgb),
                "rgb {rgb:?}, linear {linear:?}, back {back:?}"
            );
        }
    }
}
