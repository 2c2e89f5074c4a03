//! RLP (Recursive Length Prefix) decoder.
//!
//! Prefix rules:
//! - `[0x00, 0x7f]`: the byte itself
//! - `[0x80, 0xb7]`: short string, `prefix - 0x80` bytes follow
//! - `[0xb8, 0xbf]`: long string, `prefix - 0xb7` length bytes then the data
//! - `[0xc0, 0xf7]`: short list, `prefix - 0xc0` bytes of items follow
//! - `[0xf8, 0xff]`: long list, `prefix - 0xf7` length bytes then the items
//!
//! Every length is checked against the bytes actually available, and list
//! items are decoded strictly inside their parent's payload.

use crate::error::EncodingError;

/// Maximum RLP nesting depth.
const MAX_DEPTH: usize = 16;

/// A decoded RLP item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    String(Vec<u8>),
    List(Vec<RlpItem>),
}

struct Header {
    offset: usize,
    length: usize,
    is_list: bool,
}

/// Decodes the first item of `input`, returning it with the number of bytes consumed.
pub fn decode(input: &[u8]) -> Result<(RlpItem, usize), EncodingError> {
    decode_at(input, 0, 0)
}

/// Decodes `input` as exactly one item.
pub fn decode_exact(input: &[u8]) -> Result<RlpItem, EncodingError> {
    let (item, consumed) = decode(input)?;
    if consumed != input.len() {
        return Err(EncodingError::RlpTrailingData {
            consumed,
            total: input.len(),
        });
    }
    Ok(item)
}

fn decode_at(input: &[u8], base: usize, depth: usize) -> Result<(RlpItem, usize), EncodingError> {
    if depth > MAX_DEPTH {
        return Err(EncodingError::RlpTooDeep {
            offset: base,
            max: MAX_DEPTH,
        });
    }
    let header = decode_header(input, base)?;
    let end = header
        .offset
        .checked_add(header.length)
        .ok_or(EncodingError::RlpLengthOverflow { offset: base })?;
    if input.len() < end {
        return Err(EncodingError::RlpTruncated {
            offset: base,
            needed: end,
            available: input.len(),
        });
    }
    let payload = &input[header.offset..end];

    if !header.is_list {
        return Ok((RlpItem::String(payload.to_vec()), end));
    }

    let mut items = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (item, consumed) =
            decode_at(&payload[pos..], base + header.offset + pos, depth + 1)?;
        items.push(item);
        pos += consumed;
    }
    Ok((RlpItem::List(items), end))
}

fn decode_header(input: &[u8], base: usize) -> Result<Header, EncodingError> {
    let prefix = *input.first().ok_or(EncodingError::RlpEmpty { offset: base })?;
    let header = match prefix {
        0x00..=0x7f => Header {
            offset: 0,
            length: 1,
            is_list: false,
        },
        0x80..=0xb7 => Header {
            offset: 1,
            length: (prefix - 0x80) as usize,
            is_list: false,
        },
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            Header {
                offset: 1 + len_of_len,
                length: read_length(input, len_of_len, base)?,
                is_list: false,
            }
        }
        0xc0..=0xf7 => Header {
            offset: 1,
            length: (prefix - 0xc0) as usize,
            is_list: true,
        },
        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            Header {
                offset: 1 + len_of_len,
                length: read_length(input, len_of_len, base)?,
                is_list: true,
            }
        }
    };
    Ok(header)
}

/// Reads the big-endian length that follows a long-form prefix.
fn read_length(input: &[u8], len_of_len: usize, base: usize) -> Result<usize, EncodingError> {
    if input.len() < 1 + len_of_len {
        return Err(EncodingError::RlpTruncated {
            offset: base,
            needed: 1 + len_of_len,
            available: input.len(),
        });
    }
    let mut length: usize = 0;
    for &b in &input[1..1 + len_of_len] {
        length = length
            .checked_mul(256)
            .and_then(|l| l.checked_add(b as usize))
            .ok_or(EncodingError::RlpLengthOverflow { offset: base })?;
    }
    Ok(length)
}

/// Number of bytes needed to write `n` in big-endian without leading zeros.
fn byte_len(mut n: usize) -> usize {
    let mut len = 0;
    while n > 0 {
        len += 1;
        n >>= 8;
    }
    len
}

fn prefixed_len(payload: usize) -> usize {
    if payload <= 55 {
        1 + payload
    } else {
        1 + byte_len(payload) + payload
    }
}

impl RlpItem {
    /// Length of the canonical encoding of this item.
    ///
    /// This can differ from the bytes consumed when the input used a
    /// non-minimal prefix.
    pub fn encoded_len(&self) -> usize {
        match self {
            RlpItem::String(data) => {
                if data.len() == 1 && data[0] <= 0x7f {
                    1
                } else {
                    prefixed_len(data.len())
                }
            }
            RlpItem::List(items) => prefixed_len(items.iter().map(RlpItem::encoded_len).sum()),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, RlpItem::List(_))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::String(data) => Some(data),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::String(_) => None,
        }
    }

    /// Interprets a string item as a big-endian unsigned integer.
    ///
    /// Returns `None` for lists and for values wider than 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        let data = self.as_bytes()?;
        let significant = match data.iter().position(|&b| b != 0) {
            Some(start) => &data[start..],
            None => return Some(0),
        };
        if significant.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[8 - significant.len()..].copy_from_slice(significant);
        Some(u64::from_be_bytes(buf))
    }
}
