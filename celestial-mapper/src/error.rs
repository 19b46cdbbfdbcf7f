//! Error taxonomy for map production.
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`UnknownMode`](MapperError::UnknownMode) | a mask mode label is absent from the survey's registry |
//! | [`Configuration`](MapperError::Configuration) | options are missing or mutually inconsistent |
//! | [`SourceRead`](MapperError::SourceRead) | an input file or layer is missing or corrupt |
//! | [`Resampling`](MapperError::Resampling) | upsampling was requested or resolutions disagree |
//! | [`Cache`](MapperError::Cache) | a derived product could not be persisted under the rerun path |
//!
//! Errors propagate unchanged from the stage that raised them; nothing in
//! this crate catches and re-labels them.

use crate::modes::MaskFamily;
use celestial_healpix::HealpixError;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Unknown {family} mask mode '{label}' (available: {available})")]
    UnknownMode {
        family: MaskFamily,
        label: String,
        available: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot read {path}: {message}")]
    SourceRead { path: String, message: String },

    #[error("Resampling error: {0}")]
    Resampling(String),

    #[error("Cache error at {path}: {message}")]
    Cache { path: String, message: String },
}

pub type MapperResult<T> = Result<T, MapperError>;

impl MapperError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn source_read(path: &Path, message: impl ToString) -> Self {
        Self::SourceRead {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    pub fn cache(path: &Path, message: impl ToString) -> Self {
        Self::Cache {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// In-memory primitive failures. Reads go through
/// [`MapperError::source_read`] instead so the offending path is kept.
impl From<HealpixError> for MapperError {
    fn from(err: HealpixError) -> Self {
        match err {
            HealpixError::UnknownFrame(_) => Self::Configuration(err.to_string()),
            e if e.is_resolution_error() => Self::Resampling(e.to_string()),
            e => Self::SourceRead {
                path: "<in-memory map>".to_string(),
                message: e.to_string(),
            },
        }
    }
}
