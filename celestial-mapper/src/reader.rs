//! Map input, behind a trait so pipelines can run on in-memory maps.

use crate::error::{MapperError, MapperResult};
use celestial_healpix::{fits, HealpixMap};
use std::path::Path;
use tracing::debug;

/// Loads one layer of a map file at its native resolution.
pub trait MapReader {
    fn read_layer(&self, path: &Path, layer: usize) -> MapperResult<HealpixMap>;
}

/// Reads HEALPix FITS tables (plain or gzip) from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsMapReader;

impl MapReader for FitsMapReader {
    fn read_layer(&self, path: &Path, layer: usize) -> MapperResult<HealpixMap> {
        debug!(path = %path.display(), layer, "reading map layer");
        fits::read_layer(path, layer).map_err(|e| MapperError::source_read(path, e))
    }
}

impl<R: MapReader + ?Sized> MapReader for &R {
    fn read_layer(&self, path: &Path, layer: usize) -> MapperResult<HealpixMap> {
        (**self).read_layer(path, layer)
    }
}
