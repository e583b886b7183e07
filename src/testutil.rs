// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Shared descriptors for tests. Boundary sampling is expensive, so the
//! test suite builds each one once.

use std::sync::OnceLock;

use crate::crt::CrtEmulationMode;
use crate::gamut::{GamutDescriptor, GamutParams};
use crate::mapping::MappingParams;
use crate::tables::{CatKind, NamedGamut, Whitepoint};
use crate::math::Vec3;

fn srgb_params(is_source: bool, other_whitepoint: Vec3) -> GamutParams {
    let [red, green, blue] = NamedGamut::Srgb.primaries();
    GamutParams {
        name: "sRGB".to_owned(),
        whitepoint: Whitepoint::D65.xy(),
        red,
        green,
        blue,
        other_whitepoint,
        is_source,
        cat_kind: CatKind::Bradford,
        compress_enabled: true,
        crt_mode: CrtEmulationMode::None,
        crt: None,
    }
}

/// An sRGB source descriptor (D65, no adaptation).
pub fn srgb_source() -> &'static GamutDescriptor {
    static GAMUT: OnceLock<GamutDescriptor> = OnceLock::new();
    GAMUT.get_or_init(|| {
        GamutDescriptor::new(srgb_params(true, Whitepoint::D65.xy())).unwrap()
    })
}

/// An sRGB destination descriptor (D65, no adaptation).
pub fn srgb_dest() -> &'static GamutDescriptor {
    static GAMUT: OnceLock<GamutDescriptor> = OnceLock::new();
    GAMUT.get_or_init(|| {
        GamutDescriptor::new(srgb_params(false, Whitepoint::D65.xy())).unwrap()
    })
}

/// An NTSC-J source descriptor: NTSC 1953 primaries at 9300K + 27 MPCD,
/// adapted into D65.
pub fn ntscj_source() -> &'static GamutDescriptor {
    static GAMUT: OnceLock<GamutDescriptor> = OnceLock::new();
    GAMUT.get_or_init(|| {
        let [red, green, blue] = NamedGamut::Ntsc.primaries();
        GamutDescriptor::new(GamutParams {
            name: "NTSC-J".to_owned(),
            whitepoint: Whitepoint::W9300K27Mpcd.xy(),
            red,
            green,
            blue,
            other_whitepoint: Whitepoint::D65.xy(),
            is_source: true,
            cat_kind: CatKind::Bradford,
            compress_enabled: true,
            crt_mode: CrtEmulationMode::None,
            crt: None,
        })
        .unwrap()
    })
}

/// The sRGB destination paired with [`ntscj_source`]; its
/// other-whitepoint is the NTSC-J white, so it carries the (identity
/// magnitude) adaptation chain the pairing implies.
pub fn srgb_dest_for_ntscj() -> &'static GamutDescriptor {
    static GAMUT: OnceLock<GamutDescriptor> = OnceLock::new();
    GAMUT.get_or_init(|| {
        GamutDescriptor::new(srgb_params(false, Whitepoint::W9300K27Mpcd.xy())).unwrap()
    })
}

/// Default compression parameters: CUSP direction, soft knee.
pub fn default_compress_params() -> MappingParams {
    MappingParams::default()
}
