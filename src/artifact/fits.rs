//! Minimal FITS primary-HDU reader.
//!
//! Only what the load generator needs: the header cards of the primary HDU and the
//! location/size of its data unit. Extensions are ignored.
//!
//! A FITS file is a sequence of 2880-byte blocks. The header is a run of 80-byte ASCII
//! cards terminated by an `END` card and padded to a block boundary; the data unit
//! follows and holds `|BITPIX|/8 * NAXIS1 * ... * NAXISn` bytes.

use std::collections::HashMap;
use thiserror::Error;

/// FITS block length in bytes.
pub const BLOCK_LEN: usize = 2880;

/// Header card length in bytes.
pub const CARD_LEN: usize = 80;

#[derive(Error, Debug, PartialEq)]
pub enum FitsError {
    #[error("file is empty or shorter than one header block")]
    Truncated,
    #[error("header has no END card")]
    MissingEnd,
    #[error("first card is not SIMPLE = T")]
    NotSimple,
    #[error("required keyword {0} is missing")]
    MissingKeyword(String),
    #[error("keyword {key} has an invalid value")]
    InvalidValue { key: String },
    #[error("data unit needs {expected} bytes but only {available} are present")]
    ShortDataUnit { expected: usize, available: usize },
}

/// Parsed value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Header of the primary HDU.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsHeader {
    values: HashMap<String, HeaderValue>,
    /// Header length including padding, i.e. the data unit offset.
    len: usize,
}

impl FitsHeader {
    /// Parse the primary header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FitsError> {
        if bytes.len() < BLOCK_LEN {
            return Err(FitsError::Truncated);
        }

        let mut values = HashMap::new();
        for (index, card) in bytes.chunks_exact(CARD_LEN).enumerate() {
            let keyword = String::from_utf8_lossy(&card[..8]).trim_end().to_string();

            if index == 0
                && (keyword != "SIMPLE" || parse_value(card) != Some(HeaderValue::Logical(true)))
            {
                return Err(FitsError::NotSimple);
            }

            if keyword == "END" {
                let used = (index + 1) * CARD_LEN;
                let len = used.div_ceil(BLOCK_LEN) * BLOCK_LEN;
                return Ok(Self { values, len });
            }

            if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" {
                continue;
            }
            if let Some(value) = parse_value(card) {
                values.entry(keyword).or_insert(value);
            }
        }

        Err(FitsError::MissingEnd)
    }

    /// Raw value of a keyword.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.values.get(key)
    }

    /// Integer-valued keyword.
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric keyword, integers widened to `f64`.
    pub fn real(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            HeaderValue::Integer(v) => Some(*v as f64),
            HeaderValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Required integer keyword.
    pub fn require_integer(&self, key: &str) -> Result<i64, FitsError> {
        match self.get(key) {
            None => Err(FitsError::MissingKeyword(key.to_string())),
            Some(HeaderValue::Integer(v)) => Ok(*v),
            Some(_) => Err(FitsError::InvalidValue {
                key: key.to_string(),
            }),
        }
    }

    /// Offset of the data unit from the start of the file.
    pub fn data_offset(&self) -> usize {
        self.len
    }

    /// Axis sizes `NAXIS1..=NAXISn`.
    pub fn axes(&self) -> Result<Vec<usize>, FitsError> {
        let naxis = self.require_integer("NAXIS")?;
        if !(0..=999).contains(&naxis) {
            return Err(FitsError::InvalidValue {
                key: "NAXIS".to_string(),
            });
        }
        (1..=naxis)
            .map(|axis| {
                let key = format!("NAXIS{axis}");
                let size = self.require_integer(&key)?;
                usize::try_from(size).map_err(|_| FitsError::InvalidValue { key })
            })
            .collect()
    }

    /// Size in bytes of the primary data unit (without padding).
    pub fn data_len(&self) -> Result<usize, FitsError> {
        let bitpix = self.require_integer("BITPIX")?;
        if ![8, 16, 32, 64, -32, -64].contains(&bitpix) {
            return Err(FitsError::InvalidValue {
                key: "BITPIX".to_string(),
            });
        }
        let axes = self.axes()?;
        if axes.is_empty() {
            return Ok(0);
        }
        let sample_len = bitpix.unsigned_abs() as usize / 8;
        axes.iter()
            .try_fold(sample_len, |acc, &size| acc.checked_mul(size))
            .ok_or(FitsError::InvalidValue {
                key: "NAXIS".to_string(),
            })
    }
}

/// Parse the value field of a card, or `None` for commentary/undefined cards.
fn parse_value(card: &[u8]) -> Option<HeaderValue> {
    if card.len() < 10 || &card[8..10] != b"= " {
        return None;
    }
    let field = String::from_utf8_lossy(&card[10..]);
    let field = field.trim_start();

    if let Some(rest) = field.strip_prefix('\'') {
        // Quoted string; '' is an escaped quote
        let mut text = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    text.push('\'');
                } else {
                    return Some(HeaderValue::Text(text.trim_end().to_string()));
                }
            } else {
                text.push(c);
            }
        }
        return None;
    }

    let raw = field.split('/').next().unwrap_or_default().trim();
    match raw {
        "" => None,
        "T" => Some(HeaderValue::Logical(true)),
        "F" => Some(HeaderValue::Logical(false)),
        _ => {
            if let Ok(v) = raw.parse::<i64>() {
                Some(HeaderValue::Integer(v))
            } else {
                raw.replace(['D', 'd'], "E")
                    .parse::<f64>()
                    .ok()
                    .map(HeaderValue::Real)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{card, fits_bytes, image};
    use super::*;

    #[test]
    fn parses_image_header() {
        let bytes = image(4, 3, Some("1.5"), Some("250"));
        let header = FitsHeader::parse(&bytes).unwrap();

        assert_eq!(header.integer("NAXIS1"), Some(4));
        assert_eq!(header.integer("NAXIS2"), Some(3));
        assert_eq!(header.real("EXPTIME"), Some(1.5));
        assert_eq!(header.real("FRMTIME"), Some(250.0));
        assert_eq!(header.data_offset(), BLOCK_LEN);
        assert_eq!(header.data_len().unwrap(), 4 * 3 * 2);
    }

    #[test]
    fn parses_strings_comments_and_exponents() {
        let cards = vec![
            card("SIMPLE", "T"),
            card("BITPIX", "8"),
            card("NAXIS", "0"),
            "OBJECT  = 'M3 / core''s'         / target".to_string(),
            format!("{} / seconds", card("EXPTIME", "2.5D-1")),
            "COMMENT   = not a value".to_string(),
        ];
        let header = FitsHeader::parse(&fits_bytes(&cards, &[])).unwrap();

        assert_eq!(
            header.get("OBJECT"),
            Some(&HeaderValue::Text("M3 / core's".to_string()))
        );
        assert_eq!(header.real("EXPTIME"), Some(0.25));
        assert_eq!(header.data_len().unwrap(), 0);
        assert!(header.get("COMMENT").is_none());
    }

    #[test]
    fn header_spanning_two_blocks() {
        let mut cards = vec![
            card("SIMPLE", "T"),
            card("BITPIX", "8"),
            card("NAXIS", "0"),
        ];
        for i in 0..40 {
            cards.push(card(&format!("KEY{i}"), &i.to_string()));
        }
        let header = FitsHeader::parse(&fits_bytes(&cards, &[])).unwrap();
        assert_eq!(header.data_offset(), 2 * BLOCK_LEN);
        assert_eq!(header.integer("KEY39"), Some(39));
    }

    #[test]
    fn rejects_non_fits_input() {
        assert_eq!(FitsHeader::parse(b"hello"), Err(FitsError::Truncated));

        let not_simple = fits_bytes(&[card("SIMPLE", "F")], &[]);
        assert_eq!(FitsHeader::parse(&not_simple), Err(FitsError::NotSimple));

        let mut no_end = vec![b' '; BLOCK_LEN];
        no_end[..30].copy_from_slice(card("SIMPLE", "T").as_bytes());
        assert_eq!(FitsHeader::parse(&no_end), Err(FitsError::MissingEnd));
    }

    #[test]
    fn missing_axis_is_reported() {
        let cards = vec![
            card("SIMPLE", "T"),
            card("BITPIX", "16"),
            card("NAXIS", "2"),
            card("NAXIS1", "4"),
        ];
        let header = FitsHeader::parse(&fits_bytes(&cards, &[])).unwrap();
        assert_eq!(
            header.data_len(),
            Err(FitsError::MissingKeyword("NAXIS2".to_string()))
        );
    }
}
