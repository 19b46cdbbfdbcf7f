//! Survey map production on the HEALPix sphere.
//!
//! Turns raw full-sky survey maps into analysis-ready products: a signal map,
//! a half-split (half-mission) pair, the resolved analysis mask and the
//! half-difference noise map. Every product passes through the same fixed
//! pipeline (mask at native resolution, rotate, downgrade) and a cache gate
//! that persists it under a configuration-derived key.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | [`RawConfig`] (TOML) and the resolved, immutable [`SurveyConfig`] |
//! | [`variants`] | Survey records ([`P18_SMICA`](variants::P18_SMICA), [`P15_TSZ`](variants::P15_TSZ)) |
//! | [`modes`] | [`ModeRegistry`]: mask mode label → mask file layer |
//! | [`masks`] | [`MaskProvider`]: point-source, galactic-plane and combined masks |
//! | [`transform`] | [`TransformStage`]: rotate then downgrade |
//! | [`halfsplit`] | [`HalfSplitGenerator`] and [`HalfSplitPair`] |
//! | [`cache`] | [`CacheGate`] and fingerprinted [`CacheKey`]s |
//! | [`mapper`] | [`Mapper`], the public product accessors |
//! | [`beam`] | [`BeamSpec`] and its harmonic window |
//! | [`dtype`] | [`DtypeTag`] |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_mapper::Mapper;
//!
//! let mut mapper = Mapper::from_toml_file("smica.toml")?;
//! let pair = mapper.get_half_split_maps()?;
//! let mask = mapper.get_mask()?;
//! assert_eq!(pair.first().nside(), mask.nside());
//! ```
//!
//! # Features
//!
//! - **`cli`**: enables the `skymap` binary.

pub mod beam;
pub mod cache;
pub mod config;
pub mod dtype;
pub mod error;
pub mod halfsplit;
pub mod mapper;
pub mod masks;
pub mod modes;
pub mod reader;
pub mod transform;
pub mod variants;

pub use beam::{BeamComponent, BeamSpec};
pub use cache::{CacheGate, CacheKey, ProductKind};
pub use config::{LayerSource, ModeSelection, RawConfig, SurveyConfig};
pub use dtype::DtypeTag;
pub use error::{MapperError, MapperResult};
pub use halfsplit::{HalfSplitGenerator, HalfSplitPair};
pub use mapper::Mapper;
pub use masks::MaskProvider;
pub use modes::{MaskFamily, ModeRegistry};
pub use reader::{FitsMapReader, MapReader};
pub use transform::TransformStage;
pub use variants::{variant_by_name, SurveyVariant};
