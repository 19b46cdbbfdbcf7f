use super::header::{pad_to_block, HeaderWriter};
use crate::map::HealpixMap;
use crate::rotation::Frame;
use crate::{HealpixError, HealpixResult};
use byteorder::{BigEndian, ByteOrder};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const ELEMENTS_PER_ROW: usize = 1024;

/// Serialize maps as a HEALPix FITS file: an empty primary HDU followed by a
/// BINTABLE with one `D` column per map, NESTED ordering.
///
/// All maps must share one nside.
pub fn encode_maps(columns: &[(&str, &HealpixMap)], coordsys: Option<Frame>) -> HealpixResult<Vec<u8>> {
    let (_, first) = columns
        .first()
        .ok_or_else(|| HealpixError::InvalidFormat("no maps to write".to_string()))?;
    let nside = first.nside();
    if let Some((_, other)) = columns.iter().find(|(_, m)| m.nside() != nside) {
        return Err(HealpixError::mismatch("write maps", nside, other.nside()));
    }

    let npix = first.npix();
    let repeat = if npix % ELEMENTS_PER_ROW == 0 {
        ELEMENTS_PER_ROW
    } else {
        npix
    };
    let nrows = npix / repeat;
    let row_len = columns.len() * repeat * 8;

    let mut primary = HeaderWriter::default();
    primary.logical("SIMPLE", true, "conforms to FITS standard");
    primary.integer("BITPIX", 8, "array data type");
    primary.integer("NAXIS", 0, "number of array dimensions");
    primary.logical("EXTEND", true, "");
    let mut out = primary.finish();

    let mut table = HeaderWriter::default();
    table.string("XTENSION", "BINTABLE", "binary table extension");
    table.integer("BITPIX", 8, "array data type");
    table.integer("NAXIS", 2, "number of array dimensions");
    table.integer("NAXIS1", row_len as i64, "length of dimension 1");
    table.integer("NAXIS2", nrows as i64, "length of dimension 2");
    table.integer("PCOUNT", 0, "number of group parameters");
    table.integer("GCOUNT", 1, "number of groups");
    table.integer("TFIELDS", columns.len() as i64, "number of table fields");
    for (i, (name, _)) in columns.iter().enumerate() {
        table.string(&format!("TTYPE{}", i + 1), name, "");
        table.string(&format!("TFORM{}", i + 1), &format!("{}D", repeat), "");
    }
    table.string("PIXTYPE", "HEALPIX", "HEALPIX pixelisation");
    table.string("ORDERING", "NESTED", "Pixel ordering scheme");
    if let Some(frame) = coordsys {
        table.string("COORDSYS", frame.code(), "Ecliptic, Galactic or Celestial");
    }
    table.string("EXTNAME", "xtension", "name of this binary table extension");
    table.integer("NSIDE", nside as i64, "Resolution parameter of HEALPIX");
    table.integer("FIRSTPIX", 0, "First pixel # (0 based)");
    table.integer("LASTPIX", npix as i64 - 1, "Last pixel # (0 based)");
    table.string("INDXSCHM", "IMPLICIT", "Indexing: IMPLICIT or EXPLICIT");
    table.string("OBJECT", "FULLSKY", "Sky coverage");
    out.extend_from_slice(&table.finish());

    let data_start = out.len();
    out.resize(data_start + pad_to_block(row_len * nrows), 0);
    let mut cursor = data_start;
    for row in 0..nrows {
        for (_, map) in columns {
            for &value in &map.values()[row * repeat..(row + 1) * repeat] {
                BigEndian::write_f64(&mut out[cursor..cursor + 8], value);
                cursor += 8;
            }
        }
    }

    Ok(out)
}

/// Write [`encode_maps`] output to `writer`, gzip-compressed if requested.
pub fn write_to<W: Write>(
    writer: W,
    columns: &[(&str, &HealpixMap)],
    coordsys: Option<Frame>,
    compress: bool,
) -> HealpixResult<()> {
    let bytes = encode_maps(columns, coordsys)?;
    if compress {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    Ok(())
}

/// Create (or truncate) `path` and write the maps to it.
pub fn write_maps(
    path: impl AsRef<Path>,
    columns: &[(&str, &HealpixMap)],
    coordsys: Option<Frame>,
    compress: bool,
) -> HealpixResult<()> {
    let file = File::create(path.as_ref())?;
    write_to(BufWriter::new(file), columns, coordsys, compress)
}
