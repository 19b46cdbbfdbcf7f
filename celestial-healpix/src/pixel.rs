//! HEALPix pixel index arithmetic.
//!
//! Conversions between the NESTED and RING numbering schemes and between
//! pixel indices and directions on the unit sphere, following Górski et al.
//! (2005), "HEALPix: A Framework for High-Resolution Discretization and Fast
//! Analysis of Data Distributed on the Sphere", ApJ 622, 759.
//!
//! Every function here works through the intermediate `(face, ix, iy)`
//! representation: one of the 12 base faces plus integer coordinates inside
//! that face. NESTED indices interleave the bits of `ix` and `iy` (a Z-order
//! curve per face); RING indices count pixels along iso-latitude rings from
//! the north pole.
//!
//! All `nside` arguments must be powers of two. Use [`nside_to_order`] to
//! validate user-supplied values before calling into this module.

use crate::{HealpixError, HealpixResult};
use std::f64::consts::{FRAC_PI_2, PI};

const TWOPI: f64 = 2.0 * PI;

/// Largest supported HEALPix order (nside = 2^29).
pub const MAX_ORDER: u32 = 29;

// Ring number (in units of nside) of the southern corner of each base face.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
// Longitude index (in units of pi/4) of the center of each base face.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Validate `nside` and return its order (`nside = 2^order`).
pub fn nside_to_order(nside: u64) -> HealpixResult<u32> {
    if nside == 0 || !nside.is_power_of_two() || nside > (1u64 << MAX_ORDER) {
        return Err(HealpixError::InvalidNside(nside));
    }
    Ok(nside.trailing_zeros())
}

/// Number of pixels on the full sphere at the given nside.
pub fn npix(nside: u32) -> usize {
    12 * nside as usize * nside as usize
}

/// Recover nside from a full-sky pixel count.
pub fn npix_to_nside(npix: usize) -> HealpixResult<u32> {
    if npix == 0 || npix % 12 != 0 {
        return Err(HealpixError::InvalidFormat(format!(
            "{} is not a valid HEALPix pixel count",
            npix
        )));
    }
    let nside = isqrt((npix / 12) as i64) as u64;
    if 12 * nside as usize * nside as usize != npix {
        return Err(HealpixError::InvalidFormat(format!(
            "{} is not a valid HEALPix pixel count",
            npix
        )));
    }
    nside_to_order(nside)?;
    Ok(nside as u32)
}

/// Convert a RING index to the NESTED index of the same pixel.
pub fn ring2nest(nside: u32, ipring: u64) -> u64 {
    let (ix, iy, face) = ring2xyf(nside as i64, ipring as i64);
    xyf2nest(ix as u64, iy as u64, face, nside.trailing_zeros())
}

/// Convert a NESTED index to the RING index of the same pixel.
pub fn nest2ring(nside: u32, ipnest: u64) -> u64 {
    let (ix, iy, face) = nest2xyf(ipnest, nside.trailing_zeros());
    xyf2ring(nside as i64, ix as i64, iy as i64, face) as u64
}

/// NESTED pixel containing the direction `(theta, phi)` (colatitude and
/// longitude in radians).
pub fn ang2pix_nest(nside: u32, theta: f64, phi: f64) -> u64 {
    zphi2nest(nside, libm::cos(theta), phi)
}

/// NESTED pixel containing the direction of `vec`. The vector need not be
/// normalized but must be non-zero.
pub fn vec2pix_nest(nside: u32, vec: [f64; 3]) -> u64 {
    let norm = libm::sqrt(vec[0] * vec[0] + vec[1] * vec[1] + vec[2] * vec[2]);
    let z = (vec[2] / norm).clamp(-1.0, 1.0);
    let phi = libm::atan2(vec[1], vec[0]);
    zphi2nest(nside, z, phi)
}

/// Unit vector pointing at the center of a NESTED pixel.
pub fn pix2vec_nest(nside: u32, ipnest: u64) -> [f64; 3] {
    let (z, phi) = nest2zphi(nside, ipnest);
    let sin_theta = libm::sqrt((1.0 - z) * (1.0 + z));
    [sin_theta * libm::cos(phi), sin_theta * libm::sin(phi), z]
}

/// Center of a NESTED pixel as `(theta, phi)` in radians.
pub fn pix2ang_nest(nside: u32, ipnest: u64) -> (f64, f64) {
    let (z, phi) = nest2zphi(nside, ipnest);
    (libm::acos(z), phi)
}

fn nest2zphi(nside: u32, ipnest: u64) -> (f64, f64) {
    let (ix, iy, face) = nest2xyf(ipnest, nside.trailing_zeros());
    let nside = nside as i64;
    let (ix, iy) = (ix as i64, iy as i64);
    let nl4 = 4 * nside;
    let fact2 = 4.0 / (12 * nside * nside) as f64;
    let fact1 = (2 * nside) as f64 * fact2;

    let jr = JRLL[face as usize] * nside - ix - iy - 1;
    let (nr, z, kshift) = if jr < nside {
        (jr, 1.0 - (jr * jr) as f64 * fact2, 0)
    } else if jr > 3 * nside {
        let nr = nl4 - jr;
        (nr, (nr * nr) as f64 * fact2 - 1.0, 0)
    } else {
        (nside, (2 * nside - jr) as f64 * fact1, (jr - nside) & 1)
    };

    let mut jp = (JPLL[face as usize] * nr + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    } else if jp < 1 {
        jp += nl4;
    }

    let phi = (jp as f64 - (kshift + 1) as f64 * 0.5) * (FRAC_PI_2 / nr as f64);
    (z, phi)
}

fn zphi2nest(nside: u32, z: f64, phi: f64) -> u64 {
    let order = nside.trailing_zeros();
    let nside_i = nside as i64;
    let za = libm::fabs(z);

    let mut tt = libm::fmod(phi, TWOPI);
    if tt < 0.0 {
        tt += TWOPI;
    }
    tt /= FRAC_PI_2;
    if tt >= 4.0 {
        tt -= 4.0;
    }

    let (face, ix, iy) = if za <= 2.0 / 3.0 {
        // Equatorial belt
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ifp = jp >> order;
        let ifm = jm >> order;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        let ix = jm & (nside_i - 1);
        let iy = nside_i - (jp & (nside_i - 1)) - 1;
        (face, ix, iy)
    } else {
        // Polar caps
        let ntt = (tt as i64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside as f64 * libm::sqrt(3.0 * (1.0 - za));
        let jp = ((tp * tmp) as i64).min(nside_i - 1);
        let jm = (((1.0 - tp) * tmp) as i64).min(nside_i - 1);
        if z >= 0.0 {
            (ntt, nside_i - jm - 1, nside_i - jp - 1)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    xyf2nest(ix as u64, iy as u64, face as u32, order)
}

pub(crate) fn xyf2nest(ix: u64, iy: u64, face: u32, order: u32) -> u64 {
    ((face as u64) << (2 * order)) + spread_bits(ix) + (spread_bits(iy) << 1)
}

pub(crate) fn nest2xyf(ipnest: u64, order: u32) -> (u64, u64, u32) {
    let face = (ipnest >> (2 * order)) as u32;
    let within = ipnest & ((1u64 << (2 * order)) - 1);
    (compress_bits(within), compress_bits(within >> 1), face)
}

fn ring2xyf(nside: i64, pix: i64) -> (i64, i64, u32) {
    let nl2 = 2 * nside;
    let ncap = 2 * nside * (nside - 1);
    let npix = 12 * nside * nside;

    let (iring, iphi, kshift, nr, face) = if pix < ncap {
        // North polar cap
        let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
        let iphi = (pix + 1) - 2 * iring * (iring - 1);
        (iring, iphi, 0, iring, (iphi - 1) / iring)
    } else if pix < npix - ncap {
        // Equatorial region
        let ip = pix - ncap;
        let tmp = ip / (4 * nside);
        let iring = tmp + nside;
        let iphi = ip - tmp * 4 * nside + 1;
        let kshift = (iring + nside) & 1;
        let ire = tmp + 1;
        let irm = nl2 + 1 - tmp;
        let ifm = (iphi - (ire >> 1) + nside - 1) / nside;
        let ifp = (iphi - (irm >> 1) + nside - 1) / nside;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (iring, iphi, kshift, nside, face)
    } else {
        // South polar cap
        let ip = npix - pix;
        let iring = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        (2 * nl2 - iring, iphi, 0, iring, 8 + (iphi - 1) / iring)
    };

    let irt = iring - JRLL[face as usize] * nside + 1;
    let mut ipt = 2 * iphi - JPLL[face as usize] * nr - kshift - 1;
    if ipt >= nl2 {
        ipt -= 8 * nside;
    }

    ((ipt - irt) >> 1, (-ipt - irt) >> 1, face as u32)
}

fn xyf2ring(nside: i64, ix: i64, iy: i64, face: u32) -> i64 {
    let nl4 = 4 * nside;
    let jr = JRLL[face as usize] * nside - ix - iy - 1;

    let (n_before, nr, shifted) = if jr < nside {
        (2 * jr * (jr - 1), jr, true)
    } else if jr < 3 * nside {
        (
            2 * nside * (nside - 1) + (jr - nside) * nl4,
            nside,
            ((jr - nside) & 1) == 0,
        )
    } else {
        let nr = nl4 - jr;
        (12 * nside * nside - 2 * nr * (nr + 1), nr, true)
    };
    let kshift = if shifted { 0 } else { 1 };

    let mut jp = (JPLL[face as usize] * nr + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    } else if jp < 1 {
        jp += nl4;
    }
    n_before + jp - 1
}

/// Interleave the low 32 bits of `v` with zeros (bit `i` moves to bit `2i`).
fn spread_bits(v: u64) -> u64 {
    let mut result = 0u64;
    for i in 0..32 {
        result |= ((v >> i) & 1) << (2 * i);
    }
    result
}

/// Inverse of [`spread_bits`]: collect the even bits of `v`.
fn compress_bits(v: u64) -> u64 {
    let mut result = 0u64;
    for i in 0..32 {
        result |= ((v >> (2 * i)) & 1) << i;
    }
    result
}

fn isqrt(v: i64) -> i64 {
    let mut r = libm::sqrt(v as f64) as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Ring-scheme pixel center computed directly from the ring layout, used
    /// to cross-check the face-based conversions.
    fn ring_center(nside: i64, pix: i64) -> (f64, f64) {
        let npix = 12 * nside * nside;
        let ncap = 2 * nside * (nside - 1);
        let fact2 = 4.0 / npix as f64;
        if pix < ncap {
            let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
            let iphi = (pix + 1) - 2 * iring * (iring - 1);
            let z = 1.0 - (iring * iring) as f64 * fact2;
            (z, (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64)
        } else if pix < npix - ncap {
            let ip = pix - ncap;
            let iring = ip / (4 * nside) + nside;
            let iphi = ip % (4 * nside) + 1;
            let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
            let z = (2 * nside - iring) as f64 * 2.0 / (3 * nside) as f64;
            (z, (iphi as f64 - fodd) * PI / (2 * nside) as f64)
        } else {
            let ip = npix - pix;
            let iring = (1 + isqrt(2 * ip - 1)) >> 1;
            let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
            let z = (iring * iring) as f64 * fact2 - 1.0;
            (z, (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64)
        }
    }

    #[test]
    fn test_nside_to_order() {
        assert_eq!(nside_to_order(1).unwrap(), 0);
        assert_eq!(nside_to_order(2048).unwrap(), 11);
        assert!(nside_to_order(0).is_err());
        assert!(nside_to_order(48).is_err());
        assert!(nside_to_order(1 << 30).is_err());
    }

    #[test]
    fn test_npix_to_nside() {
        assert_eq!(npix_to_nside(12).unwrap(), 1);
        assert_eq!(npix_to_nside(npix(256)).unwrap(), 256);
        assert!(npix_to_nside(13).is_err());
        assert!(npix_to_nside(12 * 9).is_err());
    }

    #[test]
    fn test_spread_compress_round_trip() {
        for v in [0u64, 1, 2, 3, 0b1011, 1023, 65535] {
            assert_eq!(compress_bits(spread_bits(v)), v);
        }
        assert_eq!(spread_bits(0b11), 0b101);
    }

    #[test]
    fn test_nside1_schemes_coincide() {
        for pix in 0..12 {
            assert_eq!(ring2nest(1, pix), pix);
            assert_eq!(nest2ring(1, pix), pix);
        }
    }

    #[test]
    fn test_ring2nest_first_ring_nside2() {
        let first_ring: Vec<u64> = (0..4).map(|p| ring2nest(2, p)).collect();
        assert_eq!(first_ring, vec![3, 7, 11, 15]);
    }

    #[test]
    fn test_ring_nest_inverse() {
        let nside = 8;
        let mut seen = HashSet::new();
        for pix in 0..npix(nside) as u64 {
            let nest = ring2nest(nside, pix);
            assert!(nest < npix(nside) as u64);
            assert!(seen.insert(nest), "duplicate nest index {}", nest);
            assert_eq!(nest2ring(nside, nest), pix);
        }
    }

    #[test]
    fn test_pixel_centers_map_back_to_themselves() {
        for nside in [1u32, 4, 16] {
            for pix in 0..npix(nside) as u64 {
                let v = pix2vec_nest(nside, pix);
                assert_eq!(vec2pix_nest(nside, v), pix, "nside {} pix {}", nside, pix);
            }
        }
    }

    #[test]
    fn test_ring_centers_agree_with_nest_lookup() {
        let nside = 4u32;
        for pix in 0..npix(nside) as i64 {
            let (z, phi) = ring_center(nside as i64, pix);
            assert_eq!(
                zphi2nest(nside, z, phi),
                ring2nest(nside, pix as u64),
                "ring pixel {}",
                pix
            );
        }
    }

    #[test]
    fn test_nside1_first_pixel_center() {
        let (theta, phi) = pix2ang_nest(1, 0);
        assert!((libm::cos(theta) - 2.0 / 3.0).abs() < 1e-12);
        assert!((phi - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_poles_and_negative_longitudes() {
        let nside = 32;
        let north = ang2pix_nest(nside, 0.0, 0.0);
        let south = ang2pix_nest(nside, PI, 0.0);
        assert!(north < npix(nside) as u64);
        assert!(south < npix(nside) as u64);
        assert_ne!(north, south);
        assert_eq!(
            ang2pix_nest(nside, 1.0, -0.5),
            ang2pix_nest(nside, 1.0, TWOPI - 0.5)
        );
    }
}
