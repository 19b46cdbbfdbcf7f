//! Survey variant records.
//!
//! A variant contributes only data: its name, dtype, native frame, mask mode
//! registries and defaults, default beam and where the two half-split maps
//! come from. All processing is shared.

use crate::beam::BeamSpec;
use crate::dtype::DtypeTag;
use crate::error::{MapperError, MapperResult};
use crate::modes::{MaskFamily, ModeRegistry};
use celestial_healpix::Frame;

/// Source layout of the two half-split maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfSplitLayout {
    pub hm1_layer: usize,
    pub hm2_layer: usize,
    /// Missing `file_hm1`/`file_hm2` fall back to `file_map`.
    pub default_to_map_file: bool,
}

#[derive(Debug, PartialEq)]
pub struct SurveyVariant {
    pub name: &'static str,
    pub dtype: DtypeTag,
    pub native_frame: Frame,
    pub gp_modes: ModeRegistry,
    pub ps_modes: ModeRegistry,
    pub default_gp_mode: &'static str,
    pub default_ps_modes: &'static [&'static str],
    pub default_beam_fwhm_arcmin: f64,
    pub half_split: HalfSplitLayout,
}

impl SurveyVariant {
    pub fn default_beam(&self) -> BeamSpec {
        BeamSpec::gaussian(self.default_beam_fwhm_arcmin)
    }
}

/// Planck 2018 SMICA temperature.
pub static P18_SMICA: SurveyVariant = SurveyVariant {
    name: "P18SMICA",
    dtype: DtypeTag::CmbTemperature,
    native_frame: Frame::Galactic,
    gp_modes: ModeRegistry::new(
        MaskFamily::GalacticPlane,
        &[
            ("0.2", 0),
            ("0.4", 1),
            ("0.6", 2),
            ("0.7", 3),
            ("0.8", 4),
            ("0.9", 5),
            ("0.97", 6),
            ("0.99", 7),
        ],
    ),
    ps_modes: ModeRegistry::new(
        MaskFamily::PointSource,
        &[("F100", 0), ("F143", 1), ("F217", 2), ("F353", 3)],
    ),
    default_gp_mode: "0.6",
    default_ps_modes: &["F100", "F143", "F217", "F353"],
    default_beam_fwhm_arcmin: 5.0,
    half_split: HalfSplitLayout {
        hm1_layer: 0,
        hm2_layer: 0,
        default_to_map_file: false,
    },
};

/// Planck 2015 MILCA Compton-y. Both halves live in the full map file.
pub static P15_TSZ: SurveyVariant = SurveyVariant {
    name: "P15tSZ",
    dtype: DtypeTag::CmbTsz,
    native_frame: Frame::Galactic,
    gp_modes: ModeRegistry::new(
        MaskFamily::GalacticPlane,
        &[("0.4", 0), ("0.5", 1), ("0.6", 2), ("0.7", 3)],
    ),
    ps_modes: ModeRegistry::new(MaskFamily::PointSource, &[("test", 0), ("default", 4)]),
    default_gp_mode: "0.5",
    default_ps_modes: &["default"],
    default_beam_fwhm_arcmin: 10.0,
    half_split: HalfSplitLayout {
        hm1_layer: 1,
        hm2_layer: 2,
        default_to_map_file: true,
    },
};

pub static VARIANTS: &[&SurveyVariant] = &[&P18_SMICA, &P15_TSZ];

pub fn variant_by_name(name: &str) -> MapperResult<&'static SurveyVariant> {
    VARIANTS
        .iter()
        .copied()
        .find(|v| v.name == name)
        .ok_or_else(|| {
            let known: Vec<_> = VARIANTS.iter().map(|v| v.name).collect();
            MapperError::configuration(format!(
                "unknown survey '{}' (known: {})",
                name,
                known.join(", ")
            ))
        })
}
