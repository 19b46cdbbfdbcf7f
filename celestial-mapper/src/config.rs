//! Mapper configuration.
//!
//! [`RawConfig`] mirrors the TOML document field for field. It is resolved
//! once into a [`SurveyConfig`], which fills every default from the survey
//! variant and is never mutated afterwards.

use crate::beam::BeamSpec;
use crate::dtype::DtypeTag;
use crate::error::{MapperError, MapperResult};
use crate::variants::{variant_by_name, SurveyVariant};
use celestial_healpix::{nside_to_order, Frame, FrameRotation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A galactic-plane mode given either as a bare label or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeSelection {
    Single(String),
    List(Vec<String>),
}

impl ModeSelection {
    fn into_labels(self) -> Vec<String> {
        match self {
            Self::Single(label) => vec![label],
            Self::List(labels) => labels,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub survey: Option<String>,
    pub nside: Option<u32>,
    pub coords: Option<String>,
    pub file_map: Option<PathBuf>,
    pub file_hm1: Option<PathBuf>,
    pub file_hm2: Option<PathBuf>,
    pub file_gp_mask: Option<PathBuf>,
    pub file_ps_mask: Option<PathBuf>,
    pub gp_mask_mode: Option<ModeSelection>,
    pub ps_mask_mode: Option<Vec<String>>,
    pub beam_info: Option<BeamSpec>,
    pub mask_name: Option<String>,
    pub path_rerun: Option<PathBuf>,
}

impl RawConfig {
    pub fn from_toml_str(text: &str) -> MapperResult<Self> {
        toml::from_str(text).map_err(|e| MapperError::configuration(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> MapperResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| MapperError::source_read(path, e))?;
        Self::from_toml_str(&text)
    }
}

/// One half of a half-split pair: a file and the layer to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerSource {
    pub path: PathBuf,
    pub layer: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurveyConfig {
    pub variant: &'static SurveyVariant,
    pub nside: u32,
    pub coords: Frame,
    pub file_map: PathBuf,
    pub file_hm1: Option<PathBuf>,
    pub file_hm2: Option<PathBuf>,
    pub file_gp_mask: Option<PathBuf>,
    pub file_ps_mask: Option<PathBuf>,
    /// Exactly one label is valid; longer lists are rejected when the
    /// galactic-plane mask is requested.
    pub gp_mask_mode: Vec<String>,
    pub ps_mask_mode: Vec<String>,
    pub beam: BeamSpec,
    pub mask_name: String,
    pub path_rerun: Option<PathBuf>,
}

impl SurveyConfig {
    pub fn resolve(raw: RawConfig) -> MapperResult<Self> {
        let survey = raw
            .survey
            .ok_or_else(|| MapperError::configuration("missing required option 'survey'"))?;
        let variant = variant_by_name(&survey)?;

        let nside = raw
            .nside
            .ok_or_else(|| MapperError::configuration("missing required option 'nside'"))?;
        nside_to_order(nside as u64).map_err(|e| MapperError::configuration(e.to_string()))?;

        let coords = match raw.coords.as_deref() {
            Some(code) => code
                .parse::<Frame>()
                .map_err(|e| MapperError::configuration(e.to_string()))?,
            None => Frame::Equatorial,
        };

        let file_map = raw
            .file_map
            .ok_or_else(|| MapperError::configuration("missing required option 'file_map'"))?;

        let gp_mask_mode = match raw.gp_mask_mode {
            Some(selection) => selection.into_labels(),
            None => vec![variant.default_gp_mode.to_string()],
        };
        let ps_mask_mode = raw.ps_mask_mode.unwrap_or_else(|| {
            variant
                .default_ps_modes
                .iter()
                .map(|s| s.to_string())
                .collect()
        });

        let beam = raw.beam_info.unwrap_or_else(|| variant.default_beam());
        beam.validate()?;

        let config = Self {
            variant,
            nside,
            coords,
            file_map,
            file_hm1: raw.file_hm1,
            file_hm2: raw.file_hm2,
            file_gp_mask: raw.file_gp_mask,
            file_ps_mask: raw.file_ps_mask,
            gp_mask_mode,
            ps_mask_mode,
            beam,
            mask_name: raw
                .mask_name
                .unwrap_or_else(|| format!("mask_{}", variant.name)),
            path_rerun: raw.path_rerun,
        };
        config.half_split_sources()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> MapperResult<Self> {
        Self::resolve(RawConfig::from_toml_file(path)?)
    }

    pub fn map_name(&self) -> &'static str {
        self.variant.name
    }

    pub fn dtype(&self) -> DtypeTag {
        self.variant.dtype
    }

    /// Rotation from the survey's native frame to the requested one.
    pub fn rotation(&self) -> FrameRotation {
        FrameRotation::between(self.variant.native_frame, self.coords)
    }

    pub fn signal_source(&self) -> LayerSource {
        LayerSource {
            path: self.file_map.clone(),
            layer: 0,
        }
    }

    pub fn half_split_sources(&self) -> MapperResult<[LayerSource; 2]> {
        let layout = &self.variant.half_split;
        let pick = |file: &Option<PathBuf>, key: &str| -> MapperResult<PathBuf> {
            match file {
                Some(path) => Ok(path.clone()),
                None if layout.default_to_map_file => Ok(self.file_map.clone()),
                None => Err(MapperError::configuration(format!(
                    "survey {} requires option '{}'",
                    self.variant.name, key
                ))),
            }
        };
        Ok([
            LayerSource {
                path: pick(&self.file_hm1, "file_hm1")?,
                layer: layout.hm1_layer,
            },
            LayerSource {
                path: pick(&self.file_hm2, "file_hm2")?,
                layer: layout.hm2_layer,
            },
        ])
    }
}
