//! Instrument beam descriptions.
//!
//! A beam is an ordered list of components whose harmonic windows multiply.
//! In configuration files each component is a table tagged by `type`:
//!
//! ```toml
//! beam_info = [{ type = "Gaussian", FWHM_arcmin = 5.0 }]
//! ```

use crate::error::{MapperError, MapperResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BeamComponent {
    Gaussian {
        #[serde(rename = "FWHM_arcmin")]
        fwhm_arcmin: f64,
    },
}

impl BeamComponent {
    /// Window function value at multipole `ell`.
    pub fn window_at(&self, ell: u32) -> f64 {
        match self {
            Self::Gaussian { fwhm_arcmin } => {
                let sigma = gaussian_sigma(*fwhm_arcmin);
                let l = ell as f64;
                (-0.5 * l * (l + 1.0) * sigma * sigma).exp()
            }
        }
    }

    fn validate(&self) -> MapperResult<()> {
        match self {
            Self::Gaussian { fwhm_arcmin } if !(fwhm_arcmin.is_finite() && *fwhm_arcmin > 0.0) => {
                Err(MapperError::configuration(format!(
                    "Gaussian beam FWHM must be positive, got {} arcmin",
                    fwhm_arcmin
                )))
            }
            Self::Gaussian { .. } => Ok(()),
        }
    }
}

/// Gaussian width in radians for a FWHM in arcminutes.
fn gaussian_sigma(fwhm_arcmin: f64) -> f64 {
    (fwhm_arcmin / 60.0).to_radians() / (8.0 * std::f64::consts::LN_2).sqrt()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeamSpec {
    components: Vec<BeamComponent>,
}

impl BeamSpec {
    pub fn new(components: Vec<BeamComponent>) -> MapperResult<Self> {
        let spec = Self { components };
        spec.validate()?;
        Ok(spec)
    }

    pub fn gaussian(fwhm_arcmin: f64) -> Self {
        Self {
            components: vec![BeamComponent::Gaussian { fwhm_arcmin }],
        }
    }

    pub fn components(&self) -> &[BeamComponent] {
        &self.components
    }

    pub fn validate(&self) -> MapperResult<()> {
        self.components.iter().try_for_each(BeamComponent::validate)
    }

    /// Beam window `b_ell` for `ell = 0..=lmax`. An empty beam is a
    /// perfect instrument (all ones).
    pub fn window(&self, lmax: u32) -> Vec<f64> {
        (0..=lmax)
            .map(|ell| self.components.iter().map(|c| c.window_at(ell)).product())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Deserialize)]
    struct Holder {
        beam_info: BeamSpec,
    }

    #[test]
    fn test_deserialize_tagged_components() {
        let holder: Holder =
            toml::from_str(r#"beam_info = [{ type = "Gaussian", FWHM_arcmin = 5.0 }]"#).unwrap();
        assert_eq!(holder.beam_info, BeamSpec::gaussian(5.0));
    }

    #[test]
    fn test_unknown_component_type_is_rejected() {
        let parsed: Result<Holder, _> =
            toml::from_str(r#"beam_info = [{ type = "Airy", FWHM_arcmin = 5.0 }]"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_gaussian_window() {
        let beam = BeamSpec::gaussian(10.0);
        let window = beam.window(2000);
        assert_eq!(window.len(), 2001);
        assert_eq!(window[0], 1.0);
        assert!(window.windows(2).all(|w| w[1] <= w[0]));

        let sigma = (10.0f64 / 60.0).to_radians() / (8.0 * 2f64.ln()).sqrt();
        let expected = (-0.5 * 1000.0 * 1001.0 * sigma * sigma).exp();
        assert_relative_eq!(window[1000], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_components_multiply() {
        let combined = BeamSpec::new(vec![
            BeamComponent::Gaussian { fwhm_arcmin: 5.0 },
            BeamComponent::Gaussian { fwhm_arcmin: 10.0 },
        ])
        .unwrap();
        let a = BeamSpec::gaussian(5.0).window(500);
        let b = BeamSpec::gaussian(10.0).window(500);
        for (ell, w) in combined.window(500).iter().enumerate() {
            assert_relative_eq!(*w, a[ell] * b[ell], max_relative = 1e-12);
        }
    }

    #[test]
    fn test_empty_beam_is_unity() {
        assert!(BeamSpec::default().window(10).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_non_positive_fwhm() {
        assert!(BeamSpec::new(vec![BeamComponent::Gaussian { fwhm_arcmin: 0.0 }]).is_err());
        assert!(BeamSpec::new(vec![BeamComponent::Gaussian { fwhm_arcmin: f64::NAN }]).is_err());
    }
}
