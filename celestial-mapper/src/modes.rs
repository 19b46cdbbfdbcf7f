//! Mask mode registries: label → layer index within a multi-layer mask file.

use crate::error::{MapperError, MapperResult};
use std::fmt;

/// Which kind of mask file a registry indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskFamily {
    GalacticPlane,
    PointSource,
}

impl fmt::Display for MaskFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GalacticPlane => f.write_str("galactic-plane"),
            Self::PointSource => f.write_str("point-source"),
        }
    }
}

/// Immutable lookup table for one mask family of one survey.
///
/// Lookups never fall back to a default: an unlisted label is an
/// [`MapperError::UnknownMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeRegistry {
    family: MaskFamily,
    entries: &'static [(&'static str, usize)],
}

impl ModeRegistry {
    pub const fn new(family: MaskFamily, entries: &'static [(&'static str, usize)]) -> Self {
        Self { family, entries }
    }

    pub fn family(&self) -> MaskFamily {
        self.family
    }

    /// Layer index for `label`. Matching is exact and case-sensitive.
    pub fn resolve(&self, label: &str) -> MapperResult<usize> {
        self.entries
            .iter()
            .find(|(name, _)| *name == label)
            .map(|&(_, layer)| layer)
            .ok_or_else(|| MapperError::UnknownMode {
                family: self.family,
                label: label.to_string(),
                available: self.labels().collect::<Vec<_>>().join(", "),
            })
    }

    /// Resolve several labels at once, failing on the first unknown one.
    pub fn resolve_all<S: AsRef<str>>(&self, labels: &[S]) -> MapperResult<Vec<usize>> {
        labels.iter().map(|l| self.resolve(l.as_ref())).collect()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(name, _)| *name == label)
    }

    /// Labels in table order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
