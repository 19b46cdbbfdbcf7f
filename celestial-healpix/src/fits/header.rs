use crate::{HealpixError, HealpixResult};
use std::collections::HashMap;
use std::fmt::Write as _;

pub(crate) const CARD_SIZE: usize = 80;
pub(crate) const BLOCK_SIZE: usize = 2880;

/// Parsed header of one HDU. Keyword lookup is by exact (trimmed) name.
#[derive(Debug, Clone, Default)]
pub(crate) struct Header {
    values: HashMap<String, String>,
}

impl Header {
    /// Parse cards starting at `offset` up to and including the `END` card.
    /// Returns the header and the offset of the first byte after the padded
    /// header blocks.
    pub(crate) fn parse(data: &[u8], offset: usize) -> HealpixResult<(Self, usize)> {
        let mut header = Header::default();
        let mut pos = offset;

        loop {
            let card = data.get(pos..pos + CARD_SIZE).ok_or_else(|| {
                HealpixError::InvalidFormat("header ended before END card".to_string())
            })?;
            pos += CARD_SIZE;

            if !card.is_ascii() {
                return Err(HealpixError::InvalidFormat(
                    "non-ASCII byte in header card".to_string(),
                ));
            }
            let card = std::str::from_utf8(card).map_err(|_| {
                HealpixError::InvalidFormat("non-ASCII byte in header card".to_string())
            })?;
            let keyword = card[..8].trim_end();
            if keyword == "END" {
                break;
            }
            if &card[8..10] == "= " {
                header
                    .values
                    .insert(keyword.to_string(), parse_value(&card[10..]));
            }
        }

        Ok((header, pad_to_block(pos)))
    }

    pub(crate) fn get(&self, keyword: &str) -> Option<&str> {
        self.values.get(keyword).map(String::as_str)
    }

    pub(crate) fn get_int(&self, keyword: &str) -> HealpixResult<Option<i64>> {
        self.get(keyword)
            .map(|raw| {
                raw.parse::<i64>().map_err(|_| {
                    HealpixError::InvalidFormat(format!(
                        "keyword {} has non-integer value '{}'",
                        keyword, raw
                    ))
                })
            })
            .transpose()
    }

    pub(crate) fn require_int(&self, keyword: &str) -> HealpixResult<i64> {
        self.get_int(keyword)?.ok_or_else(|| {
            HealpixError::InvalidFormat(format!("missing required keyword {}", keyword))
        })
    }

    pub(crate) fn get_real(&self, keyword: &str) -> HealpixResult<Option<f64>> {
        self.get(keyword)
            .map(|raw| {
                raw.replace('D', "E").parse::<f64>().map_err(|_| {
                    HealpixError::InvalidFormat(format!(
                        "keyword {} has non-numeric value '{}'",
                        keyword, raw
                    ))
                })
            })
            .transpose()
    }

    pub(crate) fn require_usize(&self, keyword: &str) -> HealpixResult<usize> {
        let value = self.require_int(keyword)?;
        usize::try_from(value).map_err(|_| {
            HealpixError::InvalidFormat(format!("keyword {} = {} is not a valid size", keyword, value))
        })
    }

    /// Size in bytes of the data unit following this header, unpadded.
    pub(crate) fn data_size(&self) -> HealpixResult<usize> {
        let bitpix = self.require_int("BITPIX")?;
        let naxis = self.require_usize("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }
        let too_large =
            || HealpixError::InvalidFormat("header describes a data unit beyond addressable memory".to_string());
        let mut elements: usize = 1;
        for i in 1..=naxis {
            elements = elements
                .checked_mul(self.require_usize(&format!("NAXIS{}", i))?)
                .ok_or_else(too_large)?;
        }
        let pcount = match self.get_int("PCOUNT")? {
            Some(_) => self.require_usize("PCOUNT")?,
            None => 0,
        };
        let gcount = match self.get_int("GCOUNT")? {
            Some(_) => self.require_usize("GCOUNT")?,
            None => 1,
        };
        (bitpix.unsigned_abs() as usize / 8)
            .checked_mul(gcount)
            .and_then(|n| n.checked_mul(pcount.checked_add(elements)?))
            .ok_or_else(too_large)
    }

    /// Offset of the next HDU, given where this header's data unit starts.
    pub(crate) fn next_hdu(&self, data_start: usize) -> HealpixResult<usize> {
        self.data_size()?
            .checked_next_multiple_of(BLOCK_SIZE)
            .and_then(|padded| data_start.checked_add(padded))
            .ok_or_else(|| {
                HealpixError::InvalidFormat("header describes a data unit beyond addressable memory".to_string())
            })
    }
}

fn parse_value(field: &str) -> String {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        // Quoted string; '' is an escaped quote
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        return out.trim_end().to_string();
    }
    let value = match field.find('/') {
        Some(pos) => &field[..pos],
        None => field,
    };
    value.trim().to_string()
}

pub(crate) fn pad_to_block(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Accumulates fixed-format header cards.
#[derive(Debug, Default)]
pub(crate) struct HeaderWriter {
    buffer: Vec<u8>,
}

impl HeaderWriter {
    pub(crate) fn logical(&mut self, keyword: &str, value: bool, comment: &str) {
        let text = if value { "T" } else { "F" };
        self.card(keyword, &format!("{:>20}", text), comment);
    }

    pub(crate) fn integer(&mut self, keyword: &str, value: i64, comment: &str) {
        self.card(keyword, &format!("{:>20}", value), comment);
    }

    pub(crate) fn string(&mut self, keyword: &str, value: &str, comment: &str) {
        let escaped = value.replace('\'', "''");
        self.card(keyword, &format!("'{:<8}'", escaped), comment);
    }

    fn card(&mut self, keyword: &str, value: &str, comment: &str) {
        let mut card = String::with_capacity(CARD_SIZE);
        let _ = write!(card, "{:<8}= {}", keyword, value);
        if !comment.is_empty() {
            let _ = write!(card, " / {}", comment);
        }
        self.push_card(card);
    }

    fn push_card(&mut self, mut card: String) {
        card.truncate(CARD_SIZE);
        let bytes = card.as_bytes();
        self.buffer.extend_from_slice(bytes);
        self.buffer
            .extend(std::iter::repeat_n(b' ', CARD_SIZE - bytes.len()));
    }

    /// Append `END` and pad with spaces to a whole block.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.push_card("END".to_string());
        let padded = pad_to_block(self.buffer.len());
        self.buffer.resize(padded, b' ');
        self.buffer
    }
}
