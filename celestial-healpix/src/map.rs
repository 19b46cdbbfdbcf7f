//! Full-sky HEALPix maps and resolution changes.
//!
//! [`HealpixMap`] always stores values in NESTED order. Files written in RING
//! order are reordered on load (see [`HealpixMap::from_ring`]), which makes
//! degrading a map a matter of folding each group of `4^k` consecutive
//! children into their parent.

use crate::pixel::{nest2ring, npix, nside_to_order, ring2nest};
use crate::{HealpixError, HealpixResult};

/// Sentinel used by HEALPix for pixels with no data.
pub const UNSEEN: f64 = -1.6375e30;

/// How child pixels are folded into their parent when degrading a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMode {
    /// Mean of the valid children. Preserves intensity-like quantities.
    #[default]
    Average,
    /// Sum of the valid children. Preserves totals of counts maps.
    Sum,
}

/// A full-sky map in NESTED ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct HealpixMap {
    nside: u32,
    values: Vec<f64>,
}

/// Returns `true` when a pixel value carries data.
pub fn is_seen(value: f64) -> bool {
    value != UNSEEN && value.is_finite()
}

impl HealpixMap {
    /// Wrap NESTED-ordered values. Fails if `nside` is not a power of two or
    /// the value count is not `12 * nside^2`.
    pub fn new(nside: u32, values: Vec<f64>) -> HealpixResult<Self> {
        nside_to_order(nside as u64)?;
        let expected = npix(nside);
        if values.len() != expected {
            return Err(HealpixError::InvalidFormat(format!(
                "nside {} requires {} pixels, got {}",
                nside,
                expected,
                values.len()
            )));
        }
        Ok(Self { nside, values })
    }

    /// Caller guarantees `values.len() == npix(nside)` for a valid nside.
    pub(crate) fn from_parts(nside: u32, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), npix(nside));
        Self { nside, values }
    }

    /// A map with every pixel set to `value`.
    pub fn filled(nside: u32, value: f64) -> HealpixResult<Self> {
        nside_to_order(nside as u64)?;
        Ok(Self {
            nside,
            values: vec![value; npix(nside)],
        })
    }

    /// Build a map from RING-ordered values.
    pub fn from_ring(nside: u32, ring_values: &[f64]) -> HealpixResult<Self> {
        nside_to_order(nside as u64)?;
        let expected = npix(nside);
        if ring_values.len() != expected {
            return Err(HealpixError::InvalidFormat(format!(
                "nside {} requires {} pixels, got {}",
                nside,
                expected,
                ring_values.len()
            )));
        }
        let mut values = vec![0.0; expected];
        for (ipring, &value) in ring_values.iter().enumerate() {
            values[ring2nest(nside, ipring as u64) as usize] = value;
        }
        Ok(Self { nside, values })
    }

    /// Values reordered into the RING scheme.
    pub fn to_ring(&self) -> Vec<f64> {
        let mut ring = vec![0.0; self.values.len()];
        for (ipnest, &value) in self.values.iter().enumerate() {
            ring[nest2ring(self.nside, ipnest as u64) as usize] = value;
        }
        ring
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn order(&self) -> u32 {
        self.nside.trailing_zeros()
    }

    pub fn npix(&self) -> usize {
        self.values.len()
    }

    /// NESTED-ordered pixel values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Multiply `other` into this map pixel by pixel. Both maps must share
    /// the same nside.
    pub fn multiply_in_place(&mut self, other: &HealpixMap) -> HealpixResult<()> {
        if other.nside != self.nside {
            return Err(HealpixError::mismatch("multiply", self.nside, other.nside));
        }
        for (value, factor) in self.values.iter_mut().zip(&other.values) {
            *value *= factor;
        }
        Ok(())
    }

    /// Half the pixel-wise difference `(self - other) / 2`. Pixels unseen in
    /// either input are unseen in the output.
    pub fn half_difference(&self, other: &HealpixMap) -> HealpixResult<HealpixMap> {
        if other.nside != self.nside {
            return Err(HealpixError::mismatch(
                "half difference",
                self.nside,
                other.nside,
            ));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(&a, &b)| {
                if is_seen(a) && is_seen(b) {
                    (a - b) / 2.0
                } else {
                    UNSEEN
                }
            })
            .collect();
        Ok(Self {
            nside: self.nside,
            values,
        })
    }

    /// Change resolution to `nside_out`.
    ///
    /// Only degrading is supported: each output pixel combines its
    /// `(nside / nside_out)^2` children according to `mode`, skipping unseen
    /// children. A parent with no valid child is [`UNSEEN`]. Requesting the
    /// current nside returns a copy.
    ///
    /// # Errors
    /// [`HealpixError::Upsampling`] if `nside_out` exceeds the map's nside,
    /// [`HealpixError::InvalidNside`] if it is not a power of two.
    pub fn ud_grade(&self, nside_out: u32, mode: ResampleMode) -> HealpixResult<HealpixMap> {
        nside_to_order(nside_out as u64)?;
        if nside_out > self.nside {
            return Err(HealpixError::Upsampling {
                from: self.nside,
                to: nside_out,
            });
        }
        if nside_out == self.nside {
            return Ok(self.clone());
        }

        let children = (self.nside / nside_out) as usize;
        let children = children * children;

        let values = self
            .values
            .chunks_exact(children)
            .map(|group| {
                let mut total = 0.0;
                let mut count = 0usize;
                for &v in group.iter().filter(|&&v| is_seen(v)) {
                    total += v;
                    count += 1;
                }
                match (count, mode) {
                    (0, _) => UNSEEN,
                    (_, ResampleMode::Average) => total / count as f64,
                    (_, ResampleMode::Sum) => total,
                }
            })
            .collect();

        Ok(Self {
            nside: nside_out,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(nside: u32) -> HealpixMap {
        let values = (0..npix(nside)).map(|p| p as f64).collect();
        HealpixMap::new(nside, values).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = HealpixMap::new(2, vec![0.0; 47]).unwrap_err();
        assert!(err.to_string().contains("requires 48 pixels"));
        assert!(HealpixMap::new(3, vec![0.0; 108]).is_err());
    }

    #[test]
    fn test_ring_round_trip() {
        let map = ramp(4);
        let ring = map.to_ring();
        assert_eq!(HealpixMap::from_ring(4, &ring).unwrap(), map);
    }

    #[test]
    fn test_ud_grade_average() {
        let map = ramp(2);
        let low = map.ud_grade(1, ResampleMode::Average).unwrap();
        assert_eq!(low.nside(), 1);
        assert_eq!(low.npix(), 12);
        // Children of parent 0 are 0, 1, 2, 3
        assert_abs_diff_eq!(low.values()[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(low.values()[11], 45.5, epsilon = 1e-12);
    }

    #[test]
    fn test_ud_grade_sum_preserves_total() {
        let map = HealpixMap::filled(8, 1.0).unwrap();
        let low = map.ud_grade(2, ResampleMode::Sum).unwrap();
        let total: f64 = low.values().iter().sum();
        assert_abs_diff_eq!(total, npix(8) as f64, epsilon = 1e-9);
        assert_abs_diff_eq!(low.values()[0], 16.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ud_grade_skips_unseen() {
        let mut values = vec![2.0; npix(2)];
        values[0] = UNSEEN;
        values[1] = f64::NAN;
        values[4..8].copy_from_slice(&[UNSEEN; 4]);
        let map = HealpixMap::new(2, values).unwrap();
        let low = map.ud_grade(1, ResampleMode::Average).unwrap();
        assert_eq!(low.values()[0], 2.0);
        assert_eq!(low.values()[1], UNSEEN);
    }

    #[test]
    fn test_ud_grade_rejects_upsampling() {
        let map = ramp(2);
        let err = map.ud_grade(4, ResampleMode::Average).unwrap_err();
        assert!(matches!(err, HealpixError::Upsampling { from: 2, to: 4 }));
    }

    #[test]
    fn test_ud_grade_same_nside_is_copy() {
        let map = ramp(4);
        assert_eq!(map.ud_grade(4, ResampleMode::Average).unwrap(), map);
    }

    #[test]
    fn test_multiply_in_place() {
        let mut map = ramp(1);
        let mut mask_values = vec![1.0; 12];
        mask_values[3] = 0.0;
        let mask = HealpixMap::new(1, mask_values).unwrap();
        map.multiply_in_place(&mask).unwrap();
        assert_eq!(map.values()[3], 0.0);
        assert_eq!(map.values()[4], 4.0);

        let other = ramp(2);
        assert!(matches!(
            map.multiply_in_place(&other),
            Err(HealpixError::ResolutionMismatch { .. })
        ));
    }

    #[test]
    fn test_half_difference() {
        let a = HealpixMap::filled(1, 3.0).unwrap();
        let mut b_values = vec![1.0; 12];
        b_values[5] = UNSEEN;
        let b = HealpixMap::new(1, b_values).unwrap();
        let diff = a.half_difference(&b).unwrap();
        assert_eq!(diff.values()[0], 1.0);
        assert_eq!(diff.values()[5], UNSEEN);
    }
}
