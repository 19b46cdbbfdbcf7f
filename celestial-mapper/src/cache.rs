//! Persisted derived products.
//!
//! Each product is stored as one gzip-compressed HEALPix FITS file under the
//! rerun directory. The file name combines a readable stem with a digest of
//! every configuration field the product depends on:
//!
//! ```text
//! {stem}_{sha256(fields)[..16]}.fits.gz
//! ```
//!
//! so a configuration change lands on a new file instead of silently reusing
//! a stale one. Entries are written to a temporary file in the same directory
//! and renamed into place.

use crate::config::{LayerSource, SurveyConfig};
use crate::error::{MapperError, MapperResult};
use celestial_healpix::fits::{self, MapFile};
use celestial_healpix::{Frame, HealpixError, HealpixMap, HealpixResult};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Bumped whenever the stored layout of a product changes.
const CACHE_FORMAT_VERSION: u32 = 1;

const DIGEST_HEX_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductKind {
    Mask,
    HalfSplit,
    Signal,
}

impl ProductKind {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::HalfSplit => "hm_maps",
            Self::Signal => "signal_map",
        }
    }

    /// Column names of the stored table, one per map.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Mask => &["MASK"],
            Self::HalfSplit => &["HM1", "HM2"],
            Self::Signal => &["SIGNAL"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ProductKind,
    stem: String,
    digest: String,
}

impl CacheKey {
    /// `fields` must hold everything the product depends on. Object keys are
    /// serialized in sorted order, so equal field sets give equal digests.
    pub fn new(kind: ProductKind, stem: impl Into<String>, fields: &Value) -> Self {
        let canonical = fields.to_string();
        let hash = Sha256::digest(canonical.as_bytes());
        let digest = to_hex(&hash);
        Self {
            kind,
            stem: stem.into(),
            digest: digest[..DIGEST_HEX_LEN].to_string(),
        }
    }

    /// Key for one of the mapper's products. Beam parameters never enter a
    /// digest: none of the stored products depend on them.
    pub fn for_product(kind: ProductKind, config: &SurveyConfig) -> MapperResult<Self> {
        let mut fields = json!({
            "format": CACHE_FORMAT_VERSION,
            "product": kind.slug(),
            "survey": config.map_name(),
            "native_frame": config.variant.native_frame.code(),
            "coords": config.coords.code(),
            "nside": config.nside,
            "ps_mask": {
                "file": optional_path(config.file_ps_mask.as_deref()),
                "modes": config.ps_mask_mode,
            },
        });
        let extra = match kind {
            ProductKind::Mask => json!({
                "gp_mask": {
                    "file": optional_path(config.file_gp_mask.as_deref()),
                    "modes": config.gp_mask_mode,
                },
            }),
            ProductKind::HalfSplit => {
                let [hm1, hm2] = config.half_split_sources()?;
                json!({ "sources": [source_fields(&hm1), source_fields(&hm2)] })
            }
            ProductKind::Signal => json!({ "sources": [source_fields(&config.signal_source())] }),
        };
        if let (Value::Object(base), Value::Object(extra)) = (&mut fields, extra) {
            base.extend(extra);
        }

        let stem = match kind {
            ProductKind::Mask => format!("{}_coord{}_ns{}", config.mask_name, config.coords, config.nside),
            _ => format!(
                "{}_{}_coord{}_ns{}",
                config.map_name(),
                kind.slug(),
                config.coords,
                config.nside
            ),
        };
        Ok(Self::new(kind, stem, &fields))
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.fits.gz", self.stem, self.digest)
    }
}

fn optional_path(path: Option<&Path>) -> Value {
    match path {
        Some(p) => path_bytes(p),
        None => Value::Null,
    }
}

/// Raw OS bytes as hex, so paths that are not valid UTF-8 stay distinct.
fn path_bytes(path: &Path) -> Value {
    Value::String(to_hex(path.as_os_str().as_encoded_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn source_fields(source: &LayerSource) -> Value {
    json!({
        "path": path_bytes(&source.path),
        "layer": source.layer,
    })
}

/// Compute-once gate in front of every derived product.
///
/// Lookups go memo, then disk, then producer. Without a rerun directory the
/// gate only memoizes in memory.
#[derive(Debug, Default)]
pub struct CacheGate {
    root: Option<PathBuf>,
    coordsys: Option<Frame>,
    memo: HashMap<CacheKey, Vec<HealpixMap>>,
}

impl CacheGate {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            coordsys: None,
            memo: HashMap::new(),
        }
    }

    /// Frame recorded in the `COORDSYS` keyword of stored files.
    pub fn with_coordsys(mut self, frame: Frame) -> Self {
        self.coordsys = Some(frame);
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn path_for(&self, key: &CacheKey) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(key.file_name()))
    }

    pub fn get_or_compute<F>(&mut self, key: &CacheKey, producer: F) -> MapperResult<Vec<HealpixMap>>
    where
        F: FnOnce() -> MapperResult<Vec<HealpixMap>>,
    {
        if let Some(maps) = self.memo.get(key) {
            debug!(product = key.kind().slug(), digest = key.digest(), "memo hit");
            return Ok(maps.clone());
        }

        let path = self.path_for(key);
        if let Some(path) = path.as_deref().filter(|p| p.exists()) {
            match load(path, key.kind()) {
                Ok(maps) => {
                    debug!(path = %path.display(), "cache hit");
                    self.memo.insert(key.clone(), maps.clone());
                    return Ok(maps);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "discarding unreadable cache entry"),
            }
        }

        let maps = producer()?;
        if let Some(path) = &path {
            self.persist(path, key.kind(), &maps)?;
            info!(path = %path.display(), product = key.kind().slug(), "stored product");
        }
        self.memo.insert(key.clone(), maps.clone());
        Ok(maps)
    }

    fn persist(&self, path: &Path, kind: ProductKind, maps: &[HealpixMap]) -> MapperResult<()> {
        let names = kind.columns();
        if maps.len() != names.len() {
            return Err(MapperError::cache(
                path,
                format!("{} expects {} maps, got {}", kind.slug(), names.len(), maps.len()),
            ));
        }
        let dir = path
            .parent()
            .ok_or_else(|| MapperError::cache(path, "cache path has no parent directory"))?;
        std::fs::create_dir_all(dir).map_err(|e| MapperError::cache(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MapperError::cache(dir, e))?;
        let columns: Vec<(&str, &HealpixMap)> = names.iter().copied().zip(maps).collect();
        fits::write_to(BufWriter::new(tmp.as_file_mut()), &columns, self.coordsys, true)
            .map_err(|e| MapperError::cache(path, e))?;
        tmp.persist(path).map_err(|e| MapperError::cache(path, e.error))?;
        Ok(())
    }
}

fn load(path: &Path, kind: ProductKind) -> HealpixResult<Vec<HealpixMap>> {
    let file = MapFile::open(path)?;
    let expected = kind.columns().len();
    if file.info().columns.len() != expected {
        return Err(HealpixError::InvalidFormat(format!(
            "{} entry has {} columns, expected {}",
            kind.slug(),
            file.info().columns.len(),
            expected
        )));
    }
    (0..expected).map(|layer| file.layer(layer)).collect()
}
