use crate::beam::BeamSpec;
use crate::cache::{CacheGate, CacheKey, ProductKind};
use crate::config::{RawConfig, SurveyConfig};
use crate::dtype::DtypeTag;
use crate::error::{MapperError, MapperResult};
use crate::halfsplit::{process_source, HalfSplitGenerator, HalfSplitPair};
use crate::masks::MaskProvider;
use crate::reader::{FitsMapReader, MapReader};
use crate::transform::TransformStage;
use celestial_healpix::HealpixMap;
use std::path::Path;
use tracing::info;

/// Produces the analysis products of one survey configuration.
///
/// Every product is routed through the owned [`CacheGate`], so repeated
/// calls (and later runs sharing `path_rerun`) return stored results.
#[derive(Debug)]
pub struct Mapper<R: MapReader = FitsMapReader> {
    config: SurveyConfig,
    reader: R,
    cache: CacheGate,
}

impl Mapper<FitsMapReader> {
    /// Mapper reading its inputs from FITS files on disk.
    pub fn new(config: SurveyConfig) -> Self {
        Self::with_reader(config, FitsMapReader)
    }

    /// Resolve `raw` against its survey variant first.
    pub fn from_raw(raw: RawConfig) -> MapperResult<Self> {
        Ok(Self::new(SurveyConfig::resolve(raw)?))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> MapperResult<Self> {
        Ok(Self::new(SurveyConfig::from_toml_file(path)?))
    }
}

impl<R: MapReader> Mapper<R> {
    /// Mapper over any [`MapReader`]. The cache root and stored frame come
    /// from `config`.
    pub fn with_reader(config: SurveyConfig, reader: R) -> Self {
        let cache = CacheGate::new(config.path_rerun.clone()).with_coordsys(config.coords);
        Self {
            config,
            reader,
            cache,
        }
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    /// Primary map, point-source masked, rotated and downgraded.
    pub fn get_signal_map(&mut self) -> MapperResult<HealpixMap> {
        let key = CacheKey::for_product(ProductKind::Signal, &self.config)?;
        let (config, reader) = (&self.config, &self.reader);
        let maps = self.cache.get_or_compute(&key, || {
            info!(survey = config.map_name(), "generating signal map");
            let stage = TransformStage::for_config(config);
            Ok(vec![process_source(config, reader, &stage, &config.signal_source())?])
        })?;
        single(maps, ProductKind::Signal)
    }

    /// Both half-split maps, each point-source masked, rotated and downgraded
    /// the same way as the signal map.
    pub fn get_half_split_maps(&mut self) -> MapperResult<HalfSplitPair> {
        let key = CacheKey::for_product(ProductKind::HalfSplit, &self.config)?;
        let (config, reader) = (&self.config, &self.reader);
        let maps = self.cache.get_or_compute(&key, || {
            info!(survey = config.map_name(), "generating half-split maps");
            let pair = HalfSplitGenerator::new(config, reader).generate()?;
            Ok(pair.into_rows().to_vec())
        })?;
        let [first, second]: [HealpixMap; 2] = maps.try_into().map_err(|maps: Vec<HealpixMap>| {
            MapperError::Resampling(format!("expected 2 half-split maps, got {}", maps.len()))
        })?;
        HalfSplitPair::new(first, second)
    }

    /// Half-difference of the half-split pair, a signal-free noise estimate.
    pub fn get_noise_map(&mut self) -> MapperResult<HealpixMap> {
        self.get_half_split_maps()?.noise_map()
    }

    /// Galactic-plane × point-source mask at the output resolution. Without
    /// any mask file every pixel is kept.
    pub fn get_mask(&mut self) -> MapperResult<HealpixMap> {
        let key = CacheKey::for_product(ProductKind::Mask, &self.config)?;
        let (config, reader) = (&self.config, &self.reader);
        let maps = self.cache.get_or_compute(&key, || {
            info!(survey = config.map_name(), mask = %config.mask_name, "generating mask");
            let mask = match MaskProvider::new(config, reader).combined_mask()? {
                Some(native) => TransformStage::for_config(config).apply(&native)?,
                None => HealpixMap::filled(config.nside, 1.0)?,
            };
            Ok(vec![mask])
        })?;
        single(maps, ProductKind::Mask)
    }

    /// Instrument beam, from the config or the variant's default.
    pub fn get_beam_description(&self) -> &BeamSpec {
        &self.config.beam
    }

    /// Physical quantity of the variant's maps.
    pub fn get_dtype(&self) -> DtypeTag {
        self.config.dtype()
    }
}

fn single(maps: Vec<HealpixMap>, kind: ProductKind) -> MapperResult<HealpixMap> {
    let count = maps.len();
    let mut maps = maps.into_iter();
    match (maps.next(), maps.next()) {
        (Some(map), None) => Ok(map),
        _ => Err(MapperError::Resampling(format!(
            "expected one {} map, got {}",
            kind.slug(),
            count
        ))),
    }
}
