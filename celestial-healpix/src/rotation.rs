//! Celestial frame rotations applied to whole maps.
//!
//! Three frames are supported, identified by their single-letter HEALPix
//! `COORDSYS` codes: Galactic (`G`), equatorial ICRS (`C`) and ecliptic
//! J2000 (`E`). Each frame is described by the matrix taking equatorial unit
//! vectors into that frame; the rotation between any two frames is
//! `A_to * A_from^T`.

use crate::map::HealpixMap;
use crate::pixel::{pix2vec_nest, vec2pix_nest};
use crate::{HealpixError, HealpixResult};
use std::fmt;
use std::str::FromStr;

/// ICRS → Galactic rotation (rows are the Galactic axes expressed in ICRS).
///
/// Liu, Zhu & Zhang (2011), A&A 526, A16; identical to ERFA `eraIcrs2g`.
#[allow(clippy::excessive_precision)]
const ICRS_TO_GALACTIC: [[f64; 3]; 3] = [
    [
        -0.054875560416215368492398900454,
        -0.873437090234885048760383168409,
        -0.483835015548713226831774175116,
    ],
    [
        0.494109427875583673525222371358,
        -0.444829629960011178146614061616,
        0.746982244497218890527388004556,
    ],
    [
        -0.867666149019004701181616534570,
        -0.198076373431201528180486091412,
        0.455983776175066922272100478348,
    ],
];

/// Mean obliquity of the ecliptic at J2000.0 (IAU 2006), arcseconds.
const OBLIQUITY_J2000_ARCSEC: f64 = 84381.406;

const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    Galactic,
    Equatorial,
    Ecliptic,
}

impl Frame {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Galactic => "G",
            Self::Equatorial => "C",
            Self::Ecliptic => "E",
        }
    }

    fn from_equatorial(&self) -> [[f64; 3]; 3] {
        match self {
            Self::Equatorial => IDENTITY,
            Self::Galactic => ICRS_TO_GALACTIC,
            Self::Ecliptic => {
                let eps = (OBLIQUITY_J2000_ARCSEC / 3600.0).to_radians();
                let (s, c) = libm::sincos(eps);
                [[1.0, 0.0, 0.0], [0.0, c, s], [0.0, -s, c]]
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frame {
    type Err = HealpixError;

    fn from_str(s: &str) -> HealpixResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "G" | "GALACTIC" => Ok(Self::Galactic),
            "C" | "Q" | "EQUATORIAL" | "CELESTIAL" => Ok(Self::Equatorial),
            "E" | "ECLIPTIC" => Ok(Self::Ecliptic),
            _ => Err(HealpixError::UnknownFrame(s.to_string())),
        }
    }
}

/// Rotation taking vectors expressed in one frame into another.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRotation {
    from: Frame,
    to: Frame,
    matrix: [[f64; 3]; 3],
}

impl FrameRotation {
    pub fn between(from: Frame, to: Frame) -> Self {
        let matrix = if from == to {
            IDENTITY
        } else {
            mat_mul_transpose(&to.from_equatorial(), &from.from_equatorial())
        };
        Self { from, to, matrix }
    }

    pub fn from_frame(&self) -> Frame {
        self.from
    }

    pub fn to_frame(&self) -> Frame {
        self.to
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    /// Express a `from`-frame vector in the `to` frame.
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Express a `to`-frame vector in the `from` frame.
    pub fn apply_inverse(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        [
            m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
            m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
            m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
        ]
    }
}

/// `a * b^T`
fn mat_mul_transpose(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[j][k]).sum();
        }
    }
    out
}

/// Re-pixelize `map` into the rotation's target frame at the same nside.
///
/// Every output pixel takes the value of the input pixel that contains the
/// inversely rotated direction of its center. An identity rotation returns
/// an unchanged copy.
pub fn rotate_map(map: &HealpixMap, rotation: &FrameRotation) -> HealpixMap {
    if rotation.is_identity() {
        return map.clone();
    }
    let nside = map.nside();
    let input = map.values();
    let values: Vec<f64> = (0..map.npix() as u64)
        .map(|pix| {
            let source = rotation.apply_inverse(pix2vec_nest(nside, pix));
            input[vec2pix_nest(nside, source) as usize]
        })
        .collect();
    HealpixMap::from_parts(nside, values)
}
