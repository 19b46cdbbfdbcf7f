use crate::error::MapperError;
use std::fmt;
use std::str::FromStr;

/// Physical quantity a mapper produces, as understood by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtypeTag {
    CmbTemperature,
    CmbTsz,
    CmbConvergence,
    GalaxyDensity,
    GalaxyShear,
    Generic,
}

impl DtypeTag {
    pub const ALL: [DtypeTag; 6] = [
        Self::CmbTemperature,
        Self::CmbTsz,
        Self::CmbConvergence,
        Self::GalaxyDensity,
        Self::GalaxyShear,
        Self::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CmbTemperature => "cmb_temperature",
            Self::CmbTsz => "cmb_tSZ",
            Self::CmbConvergence => "cmb_convergence",
            Self::GalaxyDensity => "galaxy_density",
            Self::GalaxyShear => "galaxy_shear",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for DtypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DtypeTag {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| MapperError::configuration(format!("unknown dtype '{}'", s)))
    }
}
