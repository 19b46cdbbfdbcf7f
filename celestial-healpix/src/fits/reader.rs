use super::header::Header;
use crate::map::HealpixMap;
use crate::pixel::{npix, npix_to_nside, nside_to_order};
use crate::rotation::Frame;
use crate::{HealpixError, HealpixResult};
use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Pixel numbering scheme declared by a file's `ORDERING` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Ring,
    Nested,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub format: String,
}

/// Summary of a HEALPix map file, available without decoding any pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFileInfo {
    pub nside: u32,
    pub ordering: Ordering,
    pub coordsys: Option<Frame>,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Copy)]
enum ColumnType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl ColumnType {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'B' => Some(Self::Byte),
            'I' => Some(Self::Short),
            'J' => Some(Self::Int),
            'K' => Some(Self::Long),
            'E' => Some(Self::Float),
            'D' => Some(Self::Double),
            _ => None,
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }

    fn decode(&self, bytes: &[u8]) -> f64 {
        match self {
            Self::Byte => bytes[0] as f64,
            Self::Short => BigEndian::read_i16(bytes) as f64,
            Self::Int => BigEndian::read_i32(bytes) as f64,
            Self::Long => BigEndian::read_i64(bytes) as f64,
            Self::Float => BigEndian::read_f32(bytes) as f64,
            Self::Double => BigEndian::read_f64(bytes),
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    kind: ColumnType,
    repeat: usize,
    offset: usize,
    scale: f64,
    zero: f64,
}

/// A HEALPix FITS file loaded into memory.
///
/// The file is read (and gunzipped if needed) once on [`MapFile::open`];
/// each call to [`MapFile::layer`] decodes one column into a NESTED
/// [`HealpixMap`].
pub struct MapFile {
    bytes: Vec<u8>,
    info: MapFileInfo,
    columns: Vec<Column>,
    data_start: usize,
    row_len: usize,
    nrows: usize,
}

impl MapFile {
    pub fn open(path: impl AsRef<Path>) -> HealpixResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> HealpixResult<Self> {
        let bytes = if bytes.starts_with(&GZIP_MAGIC) {
            let mut decoded = Vec::new();
            GzDecoder::new(bytes.as_slice()).read_to_end(&mut decoded)?;
            decoded
        } else {
            bytes
        };

        let (primary, mut offset) = Header::parse(&bytes, 0)?;
        if primary.get("SIMPLE") != Some("T") {
            return Err(HealpixError::InvalidFormat(
                "primary header does not start with SIMPLE = T".to_string(),
            ));
        }
        offset = primary.next_hdu(offset)?;

        loop {
            if offset >= bytes.len() {
                return Err(HealpixError::InvalidFormat(
                    "no BINTABLE extension found".to_string(),
                ));
            }
            let (header, data_start) = Header::parse(&bytes, offset)?;
            if header.get("XTENSION") == Some("BINTABLE") {
                return Self::from_table(bytes, &header, data_start);
            }
            offset = header.next_hdu(data_start)?;
        }
    }

    fn from_table(bytes: Vec<u8>, header: &Header, data_start: usize) -> HealpixResult<Self> {
        if header.get("INDXSCHM") == Some("EXPLICIT") || header.get("OBJECT") == Some("PARTIAL") {
            return Err(HealpixError::InvalidFormat(
                "partial-sky (explicit index) maps are not supported".to_string(),
            ));
        }

        let row_len = header.require_usize("NAXIS1")?;
        let nrows = header.require_usize("NAXIS2")?;
        let tfields = header.require_usize("TFIELDS")?;

        let mut columns = Vec::with_capacity(tfields);
        let mut column_info = Vec::with_capacity(tfields);
        let mut offset = 0usize;
        for i in 1..=tfields {
            let format = header.get(&format!("TFORM{}", i)).ok_or_else(|| {
                HealpixError::InvalidFormat(format!("missing required keyword TFORM{}", i))
            })?;
            let (repeat, kind) = parse_tform(format)?;
            let name = header
                .get(&format!("TTYPE{}", i))
                .map(str::to_string)
                .unwrap_or_else(|| format!("COLUMN{}", i));
            columns.push(Column {
                kind,
                repeat,
                offset,
                scale: header.get_real(&format!("TSCAL{}", i))?.unwrap_or(1.0),
                zero: header.get_real(&format!("TZERO{}", i))?.unwrap_or(0.0),
            });
            column_info.push(ColumnInfo {
                name,
                format: format.to_string(),
            });
            offset = repeat
                .checked_mul(kind.size())
                .and_then(|width| offset.checked_add(width))
                .ok_or_else(|| overflow(&format!("TFORM{}", i)))?;
        }

        if offset != row_len {
            return Err(HealpixError::InvalidFormat(format!(
                "column widths sum to {} bytes but NAXIS1 = {}",
                offset, row_len
            )));
        }
        let data_end = row_len
            .checked_mul(nrows)
            .and_then(|size| size.checked_add(data_start))
            .ok_or_else(|| overflow("NAXIS2"))?;
        if data_end > bytes.len() {
            return Err(HealpixError::InvalidFormat(format!(
                "table data truncated: need {} bytes, file has {}",
                data_end,
                bytes.len()
            )));
        }

        let first = columns
            .first()
            .ok_or_else(|| HealpixError::InvalidFormat("table has no columns".to_string()))?;
        let total = first
            .repeat
            .checked_mul(nrows)
            .ok_or_else(|| overflow("NAXIS2"))?;
        let nside = match header.get_int("NSIDE")? {
            Some(nside) => {
                let nside = u32::try_from(nside)
                    .ok()
                    .filter(|&n| nside_to_order(n as u64).is_ok())
                    .ok_or_else(|| {
                        HealpixError::InvalidFormat(format!("invalid NSIDE = {}", nside))
                    })?;
                if npix(nside) != total {
                    return Err(HealpixError::InvalidFormat(format!(
                        "NSIDE = {} implies {} pixels but the table holds {}",
                        nside,
                        npix(nside),
                        total
                    )));
                }
                nside
            }
            None => npix_to_nside(total)?,
        };

        let ordering = match header.get("ORDERING") {
            Some("NESTED") | Some("NEST") => Ordering::Nested,
            Some("RING") => Ordering::Ring,
            Some(other) => {
                return Err(HealpixError::InvalidFormat(format!(
                    "unknown ORDERING '{}'",
                    other
                )))
            }
            None => {
                tracing::warn!("no ORDERING keyword, assuming RING");
                Ordering::Ring
            }
        };
        let coordsys = header.get("COORDSYS").and_then(|c| c.parse().ok());

        Ok(Self {
            bytes,
            info: MapFileInfo {
                nside,
                ordering,
                coordsys,
                columns: column_info,
            },
            columns,
            data_start,
            row_len,
            nrows,
        })
    }

    pub fn info(&self) -> &MapFileInfo {
        &self.info
    }

    /// Decode column `layer` (0-based) into a NESTED map.
    pub fn layer(&self, layer: usize) -> HealpixResult<HealpixMap> {
        let column = self
            .columns
            .get(layer)
            .ok_or(HealpixError::MissingColumn {
                layer,
                available: self.columns.len(),
            })?;

        let nside = self.info.nside;
        if column.repeat * self.nrows != npix(nside) {
            return Err(HealpixError::InvalidFormat(format!(
                "column {} holds {} values, expected {}",
                layer,
                column.repeat * self.nrows,
                npix(nside)
            )));
        }

        let size = column.kind.size();
        let scaled = column.scale != 1.0 || column.zero != 0.0;
        let mut values = Vec::with_capacity(npix(nside));
        for row in 0..self.nrows {
            let start = self.data_start + row * self.row_len + column.offset;
            for element in self.bytes[start..start + column.repeat * size].chunks_exact(size) {
                let raw = column.kind.decode(element);
                values.push(if scaled {
                    raw * column.scale + column.zero
                } else {
                    raw
                });
            }
        }

        match self.info.ordering {
            Ordering::Nested => HealpixMap::new(nside, values),
            Ordering::Ring => HealpixMap::from_ring(nside, &values),
        }
    }
}

fn overflow(keyword: &str) -> HealpixError {
    HealpixError::InvalidFormat(format!("{} gives a table size beyond addressable memory", keyword))
}

fn parse_tform(format: &str) -> HealpixResult<(usize, ColumnType)> {
    let format = format.trim();
    let digits: String = format.chars().take_while(|c| c.is_ascii_digit()).collect();
    let code = format[digits.len()..].chars().next().ok_or_else(|| {
        HealpixError::InvalidFormat(format!("TFORM '{}' is missing a data type", format))
    })?;
    let kind = ColumnType::from_code(code).ok_or_else(|| {
        HealpixError::InvalidFormat(format!(
            "TFORM '{}' is not a numeric map column type",
            format
        ))
    })?;
    let repeat = if digits.is_empty() {
        1
    } else {
        digits.parse().map_err(|_| {
            HealpixError::InvalidFormat(format!("invalid repeat count in TFORM '{}'", format))
        })?
    };
    Ok((repeat, kind))
}

/// Read one layer (table column) of a HEALPix map file.
pub fn read_layer(path: impl AsRef<Path>, layer: usize) -> HealpixResult<HealpixMap> {
    MapFile::open(path)?.layer(layer)
}

/// Read a file's resolution, ordering and column list.
pub fn read_info(path: impl AsRef<Path>) -> HealpixResult<MapFileInfo> {
    Ok(MapFile::open(path)?.info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tform() {
        let (repeat, kind) = parse_tform("1024E").unwrap();
        assert_eq!(repeat, 1024);
        assert_eq!(kind.size(), 4);
        let (repeat, kind) = parse_tform("D").unwrap();
        assert_eq!(repeat, 1);
        assert_eq!(kind.size(), 8);
        assert!(parse_tform("20A").is_err());
        assert!(parse_tform("12").is_err());
    }

    #[test]
    fn test_decode_big_endian() {
        assert_eq!(ColumnType::Float.decode(&1.5f32.to_be_bytes()), 1.5);
        assert_eq!(ColumnType::Short.decode(&(-3i16).to_be_bytes()), -3.0);
        assert_eq!(ColumnType::Double.decode(&0.1f64.to_be_bytes()), 0.1);
    }

    /// A one-column nside-1 table with the card `keyword` rewritten to `value`.
    fn patched_table(keyword: &str, value: &str) -> Vec<u8> {
        let map = HealpixMap::filled(1, 1.0).unwrap();
        let mut bytes = crate::fits::encode_maps(&[("I", &map)], None).unwrap();
        let card = bytes
            .chunks_exact(80)
            .position(|c| c.starts_with(format!("{:<8}=", keyword).as_bytes()))
            .unwrap_or_else(|| panic!("no {} card", keyword));
        let text = format!("{:<8}= {:>20}", keyword, value);
        let start = card * 80;
        bytes[start..start + 80].fill(b' ');
        bytes[start..start + text.len()].copy_from_slice(text.as_bytes());
        bytes
    }

    #[test]
    fn test_corrupt_sizes_are_format_errors() {
        for (keyword, value) in [
            ("NAXIS1", "-8"),
            ("NAXIS2", "4611686018427387904"),
            ("NAXIS2", "-1"),
            ("NSIDE", "-1"),
            ("NSIDE", "4294967296"),
            ("NSIDE", "3"),
            ("TFIELDS", "-2"),
            ("TFORM1", "'2305843009213693952D'"),
        ] {
            let result = MapFile::from_bytes(patched_table(keyword, value)).and_then(|f| f.layer(0));
            assert!(
                matches!(result, Err(HealpixError::InvalidFormat(_))),
                "{} = {}: {:?}",
                keyword,
                value,
                result.err()
            );
        }
    }

    #[test]
    fn test_patched_table_is_otherwise_valid() {
        let bytes = patched_table("NSIDE", "1");
        assert_eq!(MapFile::from_bytes(bytes).unwrap().layer(0).unwrap().npix(), 12);
    }

    #[test]
    fn test_rejects_non_fits() {
        let bytes = vec![b'X'; 2880];
        assert!(matches!(
            MapFile::from_bytes(bytes),
            Err(HealpixError::InvalidFormat(_))
        ));
    }
}
