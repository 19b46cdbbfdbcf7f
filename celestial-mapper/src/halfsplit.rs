//! Half-split (half-mission) map generation.
//!
//! Both halves run through the same pipeline: read one layer, multiply in
//! the point-source mask at native resolution, then rotate and downgrade.
//! Only the layer sources differ between survey variants.

use crate::config::{LayerSource, SurveyConfig};
use crate::error::{MapperError, MapperResult};
use crate::masks::MaskProvider;
use crate::reader::MapReader;
use crate::transform::TransformStage;
use celestial_healpix::HealpixMap;
use tracing::debug;

/// Two processed maps at the output resolution; `rows()[0]` is half 1.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfSplitPair {
    rows: [HealpixMap; 2],
}

impl HalfSplitPair {
    /// Fails unless both halves share one nside.
    pub fn new(first: HealpixMap, second: HealpixMap) -> MapperResult<Self> {
        if first.nside() != second.nside() {
            return Err(MapperError::Resampling(format!(
                "half-split maps disagree on nside: {} vs {}",
                first.nside(),
                second.nside()
            )));
        }
        Ok(Self {
            rows: [first, second],
        })
    }

    pub fn rows(&self) -> &[HealpixMap; 2] {
        &self.rows
    }

    pub fn first(&self) -> &HealpixMap {
        &self.rows[0]
    }

    pub fn second(&self) -> &HealpixMap {
        &self.rows[1]
    }

    pub fn nside(&self) -> u32 {
        self.rows[0].nside()
    }

    pub fn into_rows(self) -> [HealpixMap; 2] {
        self.rows
    }

    /// `(hm1 - hm2) / 2`: the signal cancels, the noise remains.
    pub fn noise_map(&self) -> MapperResult<HealpixMap> {
        Ok(self.rows[0].half_difference(&self.rows[1])?)
    }
}

/// Read `source`, apply the point-source mask and transform the result.
pub(crate) fn process_source<R: MapReader>(
    config: &SurveyConfig,
    reader: &R,
    stage: &TransformStage,
    source: &LayerSource,
) -> MapperResult<HealpixMap> {
    let mut map = reader.read_layer(&source.path, source.layer)?;
    if let Some(ps) = MaskProvider::new(config, reader).point_source_mask()? {
        map.multiply_in_place(&ps)?;
    }
    stage.apply(&map)
}

/// Builds a [`HalfSplitPair`] from the variant's half-split layer sources.
pub struct HalfSplitGenerator<'a, R: MapReader> {
    config: &'a SurveyConfig,
    reader: &'a R,
    stage: TransformStage,
}

impl<'a, R: MapReader> HalfSplitGenerator<'a, R> {
    pub fn new(config: &'a SurveyConfig, reader: &'a R) -> Self {
        Self {
            config,
            reader,
            stage: TransformStage::for_config(config),
        }
    }

    /// Process half 1, then half 2. The point-source mask is read once per
    /// half and nothing is cached here.
    pub fn generate(&self) -> MapperResult<HalfSplitPair> {
        let [hm1, hm2] = self.config.half_split_sources()?;
        debug!(survey = self.config.map_name(), "generating half 1");
        let first = process_source(self.config, self.reader, &self.stage, &hm1)?;
        debug!(survey = self.config.map_name(), "generating half 2");
        let second = process_source(self.config, self.reader, &self.stage, &hm2)?;
        HalfSplitPair::new(first, second)
    }
}
