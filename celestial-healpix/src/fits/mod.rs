//! HEALPix maps stored as FITS binary tables.
//!
//! This is the layout written by HEALPix, healpy and the Planck Legacy
//! Archive: an empty primary HDU followed by a `BINTABLE` extension whose
//! columns are full-sky maps, `PIXTYPE = 'HEALPIX'`, with `NSIDE` and
//! `ORDERING` in the extension header. Each column is one *layer*; layer
//! indices are 0-based column positions.
//!
//! - [`reader`]: [`MapFile`], [`read_layer`], [`read_info`]. Gzip input is
//!   detected by its magic bytes, RING maps are reordered to NESTED.
//! - [`writer`]: [`encode_maps`], [`write_maps`], [`write_to`]. Always
//!   writes NESTED `D` (float64) columns.

mod header;
pub mod reader;
pub mod writer;

pub use reader::{read_info, read_layer, ColumnInfo, MapFile, MapFileInfo, Ordering};
pub use writer::{encode_maps, write_maps, write_to};
