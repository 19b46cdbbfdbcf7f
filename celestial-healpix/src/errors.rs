use thiserror::Error;

/// Failures raised by the pixelization, resampling and map I/O primitives.
///
/// Errors fall into two families that callers usually route differently:
///
/// | Variant | Family |
/// |---------|--------|
/// | [`InvalidNside`](HealpixError::InvalidNside) | resolution |
/// | [`ResolutionMismatch`](HealpixError::ResolutionMismatch) | resolution |
/// | [`Upsampling`](HealpixError::Upsampling) | resolution |
/// | [`InvalidFormat`](HealpixError::InvalidFormat) | source data |
/// | [`MissingColumn`](HealpixError::MissingColumn) | source data |
/// | [`Io`](HealpixError::Io) | source data |
/// | [`UnknownFrame`](HealpixError::UnknownFrame) | configuration |
#[derive(Debug, Error)]
pub enum HealpixError {
    #[error("Invalid nside {0}: must be a power of two between 1 and 2^29")]
    InvalidNside(u64),

    #[error("Resolution mismatch in {operation}: expected nside {expected}, got {actual}")]
    ResolutionMismatch {
        operation: String,
        expected: u32,
        actual: u32,
    },

    #[error("Cannot upsample from nside {from} to nside {to}")]
    Upsampling { from: u32, to: u32 },

    #[error("Invalid HEALPix FITS data: {0}")]
    InvalidFormat(String),

    #[error("Layer {layer} not present: file has {available} column(s)")]
    MissingColumn { layer: usize, available: usize },

    #[error("Unknown coordinate frame '{0}': expected one of G, C, E")]
    UnknownFrame(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HealpixResult<T> = Result<T, HealpixError>;

impl HealpixError {
    pub fn mismatch(operation: &str, expected: u32, actual: u32) -> Self {
        Self::ResolutionMismatch {
            operation: operation.to_string(),
            expected,
            actual,
        }
    }

    /// Returns `true` for errors caused by the requested or encountered
    /// resolutions rather than by the contents of a source file.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidNside(_) | Self::ResolutionMismatch { .. } | Self::Upsampling { .. }
        )
    }
}
