//! The rotate-then-downgrade step shared by every map product.

use crate::config::SurveyConfig;
use crate::error::{MapperError, MapperResult};
use celestial_healpix::{rotate_map, FrameRotation, HealpixMap, ResampleMode};
use tracing::debug;

/// Rotation followed by downgrade, always in that order.
///
/// Rotation runs at the input's native resolution and the downgrade to
/// `nside_out` comes last, averaging the seen children of each output
/// pixel. Upsampling is refused.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformStage {
    rotation: FrameRotation,
    nside_out: u32,
}

impl TransformStage {
    pub fn new(rotation: FrameRotation, nside_out: u32) -> Self {
        Self { rotation, nside_out }
    }

    /// Stage taking a native map into the configured output frame and nside.
    pub fn for_config(config: &SurveyConfig) -> Self {
        Self::new(config.rotation(), config.nside)
    }

    pub fn apply(&self, map: &HealpixMap) -> MapperResult<HealpixMap> {
        if self.nside_out > map.nside() {
            return Err(MapperError::Resampling(format!(
                "requested nside {} exceeds native nside {}",
                self.nside_out,
                map.nside()
            )));
        }

        debug!(
            from = %self.rotation.from_frame(),
            to = %self.rotation.to_frame(),
            nside_in = map.nside(),
            nside_out = self.nside_out,
            "transforming map"
        );
        let rotated = rotate_map(map, &self.rotation);
        let out = rotated.ud_grade(self.nside_out, ResampleMode::Average)?;
        if out.nside() != self.nside_out {
            return Err(MapperError::Resampling(format!(
                "transform produced nside {}, expected {}",
                out.nside(),
                self.nside_out
            )));
        }
        Ok(out)
    }
}
