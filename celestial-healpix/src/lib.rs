//! HEALPix primitives for full-sky map processing.
//!
//! Maps live in memory as [`HealpixMap`] values in NESTED order. This crate
//! supplies the building blocks a map-production pipeline orchestrates:
//! reading and writing HEALPix FITS tables, rotating maps between celestial
//! frames, and degrading their resolution.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pixel`] | RING/NESTED conversion, pixel ↔ direction ([`ang2pix_nest`](pixel::ang2pix_nest), [`pix2vec_nest`](pixel::pix2vec_nest)) |
//! | [`map`] | [`HealpixMap`], [`ResampleMode`], [`UNSEEN`], `ud_grade` |
//! | [`rotation`] | [`Frame`], [`FrameRotation`], [`rotate_map`] |
//! | [`fits`] | [`read_layer`](fits::read_layer), [`write_maps`](fits::write_maps) |
//! | [`errors`] | [`HealpixError`] |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_healpix::{fits, rotate_map, Frame, FrameRotation, ResampleMode};
//!
//! let map = fits::read_layer("COM_CMB_IQU-smica-nosz_2048_R3.00_hm1.fits", 0)?;
//! let rotation = FrameRotation::between(Frame::Galactic, Frame::Equatorial);
//! let low = rotate_map(&map, &rotation).ud_grade(256, ResampleMode::Average)?;
//! ```

pub mod errors;
pub mod fits;
pub mod map;
pub mod pixel;
pub mod rotation;

pub use errors::{HealpixError, HealpixResult};
pub use map::{is_seen, HealpixMap, ResampleMode, UNSEEN};
pub use pixel::{npix, nside_to_order};
pub use rotation::{rotate_map, Frame, FrameRotation};
