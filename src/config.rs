// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The recognized configuration surface.
//!
//! Parsing is the caller's business; these types deserialize from any
//! serde format and reject unknown keys. [`Config::validate`] checks
//! every rule a value must satisfy and reports the single rule an
//! offending value broke.

use serde::{Deserialize, Serialize};

use crate::color::cct::{xy_from_cct, Locus};
use crate::color::ucs::MpcdKind;
use crate::crt::{CrtConfig, CrtEmulationMode};
use crate::error::{Error, ErrorKind};
use crate::gamut::spiral::SpiralConfig;
use crate::mapping::{MapDirection, SafeZone};
use crate::math::Vec3;
use crate::nes::NesConfig;
use crate::tables::{CatKind, NamedGamut, Whitepoint};

/// Transfer function used for 8-bit interchange.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GammaMode {
    Linear,
    #[default]
    Srgb,
    Rec2084,
}

/// Overall mapping strategy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapMode {
    /// Matrix conversion only; out-of-gamut values clip.
    Clip,
    /// Chunghwa matrix applied outright in gamma space.
    CccA,
    /// Chunghwa correction blended in by primary proximity, with an
    /// exponential ramp.
    CccB,
    /// Chunghwa correction blended in by primary proximity, with a
    /// cubic hermite ramp.
    CccC,
    /// Region-selected Kinoshita matrix applied outright in gamma space.
    CccD,
    /// Kinoshita correction blended in by primary proximity.
    CccE,
    /// Perceptual gamut compression.
    #[default]
    Compress,
    /// Compression plus inverse expansion where the destination gamut
    /// is larger.
    Expand,
}

impl MapMode {
    /// True for the modes that run the perceptual mapper.
    #[must_use]
    pub const fn is_compression(self) -> bool {
        matches!(self, Self::Compress | Self::Expand)
    }

    /// True for the gamma-space correction circuit modes.
    #[must_use]
    pub const fn is_ccc(self) -> bool {
        matches!(
            self,
            Self::CccA | Self::CccB | Self::CccC | Self::CccD | Self::CccE
        )
    }
}

/// A gamut choice: a named set of primaries or custom chromaticities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GamutSelection {
    Named(NamedGamut),
    Custom {
        red: [f64; 2],
        green: [f64; 2],
        blue: [f64; 2],
    },
}

impl Default for GamutSelection {
    fn default() -> Self {
        Self::Named(NamedGamut::Srgb)
    }
}

impl GamutSelection {
    /// The (red, green, blue) primary chromaticities.
    #[must_use]
    pub fn primaries(&self) -> [Vec3; 3] {
        match self {
            Self::Named(named) => named.primaries(),
            Self::Custom { red, green, blue } => [
                Vec3::from(red[0], red[1], 1.0 - red[0] - red[1]),
                Vec3::from(green[0], green[1], 1.0 - green[0] - green[1]),
                Vec3::from(blue[0], blue[1], 1.0 - blue[0] - blue[1]),
            ],
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Named(named) => named.name().to_owned(),
            Self::Custom { .. } => "custom gamut".to_owned(),
        }
    }
}

/// A whitepoint choice: named, custom coordinate, or custom CCT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhitepointSelection {
    Named(Whitepoint),
    CustomXy {
        custom_xy: [f64; 2],
    },
    CustomCct {
        custom_cct: f64,
        #[serde(default)]
        locus: Locus,
        #[serde(default)]
        mpcd: f64,
        #[serde(default)]
        mpcd_kind: MpcdKind,
    },
}

impl Default for WhitepointSelection {
    fn default() -> Self {
        Self::Named(Whitepoint::D65)
    }
}

impl WhitepointSelection {
    /// Resolve to chromaticity coordinates.
    #[must_use]
    pub fn resolve(&self) -> Vec3 {
        match self {
            Self::Named(named) => named.xy(),
            Self::CustomXy { custom_xy } => Vec3::from(
                custom_xy[0],
                custom_xy[1],
                1.0 - custom_xy[0] - custom_xy[1],
            ),
            Self::CustomCct {
                custom_cct,
                locus,
                mpcd,
                mpcd_kind,
            } => xy_from_cct(*custom_cct, *locus, *mpcd, *mpcd_kind),
        }
    }
}

/// The full recognized option surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source_gamut: GamutSelection,
    pub dest_gamut: GamutSelection,
    pub source_whitepoint: WhitepointSelection,
    pub dest_whitepoint: WhitepointSelection,
    pub gamma_mode: GammaMode,
    /// SDR white brightness for rec2084, in nits.
    pub max_nits: f64,
    pub cat_kind: CatKind,
    pub map_mode: MapMode,
    pub map_direction: MapDirection,
    pub safe_zone: SafeZone,
    pub remap_factor: f64,
    pub remap_limit: f64,
    pub knee_factor: f64,
    pub soft_knee: bool,
    pub spiral_carisma: bool,
    pub spiral: SpiralConfig,
    pub crt: CrtConfig,
    pub nes: NesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_gamut: GamutSelection::default(),
            dest_gamut: GamutSelection::default(),
            source_whitepoint: WhitepointSelection::default(),
            dest_whitepoint: WhitepointSelection::default(),
            gamma_mode: GammaMode::Srgb,
            max_nits: 200.0,
            cat_kind: CatKind::Bradford,
            map_mode: MapMode::Compress,
            map_direction: MapDirection::Cusp,
            safe_zone: SafeZone::ConstDetail,
            remap_factor: 0.4,
            remap_limit: 0.8,
            knee_factor: 0.2,
            soft_knee: true,
            spiral_carisma: false,
            spiral: SpiralConfig::default(),
            crt: CrtConfig::default(),
            nes: NesConfig::default(),
        }
    }
}

impl Config {
    /// Default knob values matching the mapper's defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks every value against its allowed range and combination
    /// rules.
    ///
    /// # Errors
    /// Returns the single rule the first offending value violates.
    #[allow(clippy::too_many_lines)]
    pub fn validate(&self) -> Result<(), Error> {
        fn check_unit(value: f64, what: &str) -> Result<(), Error> {
            if value < 0.0 || value > 1.0 {
                return Err(Error::from_string(
                    ErrorKind::BadParamFloat,
                    format!("{what} must be in [0, 1], got {value}"),
                ));
            }
            Ok(())
        }

        check_unit(self.remap_factor, "remap-factor")?;
        check_unit(self.remap_limit, "remap-limit")?;
        check_unit(self.knee_factor, "knee-factor")?;

        if self.gamma_mode == GammaMode::Rec2084 && self.max_nits <= 0.0 {
            return Err(Error::from_string(
                ErrorKind::BadParamFloat,
                format!("max-nits must be positive for rec2084, got {}", self.max_nits),
            ));
        }

        check_unit(self.spiral.floor, "spiral floor")?;
        check_unit(self.spiral.ceiling, "spiral ceiling")?;
        if self.spiral.floor > self.spiral.ceiling {
            return Err(Error::with_message(
                ErrorKind::BadParamFloat,
                "spiral floor must not exceed the spiral ceiling",
            ));
        }
        if self.spiral.exponent < 0.0 {
            return Err(Error::with_message(
                ErrorKind::BadParamFloat,
                "spiral exponent must not be negative",
            ));
        }
        if self.spiral.max_scale <= 0.0 || self.spiral.max_scale > 1.0 {
            return Err(Error::from_string(
                ErrorKind::BadParamFloat,
                format!(
                    "spiral max-scale must be in (0, 1], got {}",
                    self.spiral.max_scale
                ),
            ));
        }
        if self.spiral_carisma && !self.map_mode.is_compression() {
            return Err(Error::with_message(
                ErrorKind::ImpossibleCombo,
                "spiral carisma requires the compress or expand map mode",
            ));
        }

        if self.crt.mode != CrtEmulationMode::None {
            if self.crt.modulator.is_none() && self.crt.demodulator.is_none() {
                return Err(Error::with_message(
                    ErrorKind::ImpossibleCombo,
                    "CRT emulation needs a modulator or a demodulator",
                ));
            }
            if self.crt.saturation <= 0.0 {
                return Err(Error::with_message(
                    ErrorKind::BadParamFloat,
                    "CRT saturation must be positive",
                ));
            }
            if self.crt.gamma <= 0.0 {
                return Err(Error::with_message(
                    ErrorKind::BadParamFloat,
                    "CRT gamma must be positive",
                ));
            }
            if self.crt.pedestal_amount < 0.0 || self.crt.pedestal_amount >= 1.0 {
                return Err(Error::with_message(
                    ErrorKind::BadParamFloat,
                    "CRT pedestal amount must be in [0, 1)",
                ));
            }
            if self.crt.clamp_high_enable && self.crt.clamp_low >= self.crt.clamp_high {
                return Err(Error::with_message(
                    ErrorKind::ImpossibleCombo,
                    "CRT low clamp must sit below the high clamp",
                ));
            }
        }

        for (selection, what) in [
            (&self.source_gamut, "source-gamut"),
            (&self.dest_gamut, "dest-gamut"),
        ] {
            if let GamutSelection::Custom { red, green, blue } = selection {
                for xy in [red, green, blue] {
                    if xy[0] <= 0.0 || xy[0] >= 1.0 || xy[1] <= 0.0 || xy[1] >= 1.0 {
                        return Err(Error::from_string(
                            ErrorKind::InvalidColor,
                            format!("{what} chromaticity ({}, {}) is not plottable", xy[0], xy[1]),
                        ));
                    }
                }
            }
        }

        for (selection, what) in [
            (&self.source_whitepoint, "source-whitepoint"),
            (&self.dest_whitepoint, "dest-whitepoint"),
        ] {
            match selection {
                WhitepointSelection::CustomXy { custom_xy } => {
                    if custom_xy[0] <= 0.0
                        || custom_xy[0] >= 1.0
                        || custom_xy[1] <= 0.0
                        || custom_xy[1] >= 1.0
                    {
                        return Err(Error::from_string(
                            ErrorKind::InvalidColor,
                            format!(
                                "{what} chromaticity ({}, {}) is not plottable",
                                custom_xy[0], custom_xy[1]
                            ),
                        ));
                    }
                }
                WhitepointSelection::CustomCct { custom_cct, .. } => {
                    if *custom_cct < 1000.0 || *custom_cct > 25000.0 {
                        return Err(Error::from_string(
                            ErrorKind::BadParamFloat,
                            format!("{what} CCT {custom_cct} is outside 1000K to 25000K"),
                        ));
                    }
                }
                WhitepointSelection::Named(_) => {}
            }
        }

        Ok(())
    }

    /// Classifies a serde deserialization failure into the error
    /// taxonomy, so callers using any serde format report consistent
    /// kinds.
    #[must_use]
    pub fn classify_parse_error(message: &str) -> Error {
        let kind = if message.contains("unknown field") {
            ErrorKind::UnknownParam
        } else if message.contains("missing field") {
            ErrorKind::MissingValue
        } else if message.contains("unknown variant") {
            ErrorKind::BadParamSelect
        } else if message.contains("invalid type: floating point")
            || message.contains("expected f64")
        {
            ErrorKind::BadParamFloat
        } else {
            ErrorKind::BadParamString
        };
        Error::from_string(kind, message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::new().validate().is_ok());
    }

    #[test]
    fn test_bad_knee_factor_rejected() {
        let config = Config {
            knee_factor: 1.5,
            ..Config::new()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParamFloat);
    }

    #[test]
    fn test_spiral_without_compression_rejected() {
        let config = Config {
            spiral_carisma: true,
            map_mode: MapMode::Clip,
            ..Config::new()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImpossibleCombo);
    }

    #[test]
    fn test_crt_without_chips_rejected() {
        let mut config = Config::new();
        config.crt.mode = CrtEmulationMode::Front;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImpossibleCombo);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "source_gamut": "p22-trinitron",
            "dest_gamut": "srgb",
            "source_whitepoint": "9300k27mpcd",
            "map_mode": "compress",
            "map_direction": "vpr",
            "safe_zone": "const-fidelity"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.source_gamut,
            GamutSelection::Named(NamedGamut::P22Trinitron)
        );
        assert_eq!(
            config.source_whitepoint,
            WhitepointSelection::Named(Whitepoint::W9300K27Mpcd)
        );
        assert_eq!(config.map_direction, MapDirection::Vpr);
        assert_eq!(config.safe_zone, SafeZone::ConstFidelity);
    }

    #[test]
    fn test_unknown_key_classified() {
        let json = r#"{ "frobnicate": true }"#;
        let err = serde_json::from_str::<Config>(json).unwrap_err();
        let classified = Config::classify_parse_error(&err.to_string());
        assert_eq!(classified.kind(), ErrorKind::UnknownParam);
    }

    #[test]
    fn test_unknown_variant_classified() {
        let json = r#"{ "map_direction": "sideways" }"#;
        let err = serde_json::from_str::<Config>(json).unwrap_err();
        let classified = Config::classify_parse_error(&err.to_string());
        assert_eq!(classified.kind(), ErrorKind::BadParamSelect);
    }

    #[test]
    fn test_custom_whitepoint_resolves() {
        let selection = WhitepointSelection::CustomCct {
            custom_cct: 6504.0,
            locus: Locus::Daylight,
            mpcd: 0.0,
            mpcd_kind: MpcdKind::Cie1960,
        };
        let xy = selection.resolve();
        assert!((xy.x - 0.31271).abs() < 1e-3);
        assert!((xy.y - 0.32902).abs() < 1e-3);
    }

    #[test]
    fn test_custom_gamut_json() {
        let json = r#"{
            "source_gamut": { "red": [0.67, 0.33], "green": [0.21, 0.71], "blue": [0.14, 0.08] }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let primaries = config.source_gamut.primaries();
        assert!((primaries[0].x - 0.67).abs() < 1e-12);
        assert!((primaries[1].y - 0.71).abs() < 1e-12);
    }
}
