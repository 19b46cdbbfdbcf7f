//! Mask selection by mode label.
//!
//! Masks are returned at the native resolution of their file; resampling is
//! the transform stage's job. A family whose mask file is not configured
//! yields `None`, meaning no masking.

use crate::config::SurveyConfig;
use crate::error::{MapperError, MapperResult};
use crate::reader::MapReader;
use celestial_healpix::HealpixMap;
use std::path::Path;
use tracing::debug;

pub struct MaskProvider<'a, R: MapReader> {
    config: &'a SurveyConfig,
    reader: &'a R,
}

impl<'a, R: MapReader> MaskProvider<'a, R> {
    pub fn new(config: &'a SurveyConfig, reader: &'a R) -> Self {
        Self { config, reader }
    }

    /// Product of every configured point-source layer.
    pub fn point_source_mask(&self) -> MapperResult<Option<HealpixMap>> {
        let labels = &self.config.ps_mask_mode;
        // Labels are resolved before any file is touched
        let layers = self.config.variant.ps_modes.resolve_all(labels)?;
        let path = match &self.config.file_ps_mask {
            Some(path) if !layers.is_empty() => path,
            _ => return Ok(None),
        };
        debug!(labels = ?labels, layers = ?layers, "building point-source mask");
        self.product_of_layers(path, &layers).map(Some)
    }

    pub fn galactic_plane_mask(&self) -> MapperResult<Option<HealpixMap>> {
        let label = match self.config.gp_mask_mode.as_slice() {
            [label] => label,
            labels => {
                return Err(MapperError::configuration(format!(
                    "gp_mask_mode takes exactly one label, got {}",
                    labels.len()
                )))
            }
        };
        let layer = self.config.variant.gp_modes.resolve(label)?;
        let Some(path) = &self.config.file_gp_mask else {
            return Ok(None);
        };
        debug!(label = %label, layer, "loading galactic-plane mask");
        self.reader.read_layer(path, layer).map(Some)
    }

    /// Galactic-plane × point-source mask at native resolution.
    pub fn combined_mask(&self) -> MapperResult<Option<HealpixMap>> {
        let gp = self.galactic_plane_mask()?;
        let ps = self.point_source_mask()?;
        Ok(match (gp, ps) {
            (Some(mut gp), Some(ps)) => {
                gp.multiply_in_place(&ps)?;
                Some(gp)
            }
            (gp, ps) => gp.or(ps),
        })
    }

    fn product_of_layers(&self, path: &Path, layers: &[usize]) -> MapperResult<HealpixMap> {
        let (first, rest) = layers
            .split_first()
            .ok_or_else(|| MapperError::configuration("no mask layers selected"))?;
        let mut mask = self.reader.read_layer(path, *first)?;
        for &layer in rest {
            mask.multiply_in_place(&self.reader.read_layer(path, layer)?)?;
        }
        Ok(mask)
    }
}
