use std::collections::HashMap;
use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;

use crate::DecodeError;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

// Nesting guard; structure files in the wild are a handful of levels deep.
const MAX_DEPTH: u32 = 128;

/// One node of the tag-typed tree serialization.
#[derive(Clone, Debug, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(Vec<Tag>),
    Compound(HashMap<String, Tag>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn as_compound(&self) -> Option<&HashMap<String, Tag>> {
        match self {
            Tag::Compound(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widening integer accessor: any integral tag reads as i32 when it
    /// fits. Format fields show up as Byte/Short/Int depending on the
    /// writer.
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Tag::Byte(v) => Some(i32::from(v)),
            Tag::Short(v) => Some(i32::from(v)),
            Tag::Int(v) => Some(v),
            Tag::Long(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[u8]> {
        match self {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Tag::IntArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Parsed tag tree: the named root compound of a structure payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedNbt {
    pub root_name: String,
    pub root: HashMap<String, Tag>,
}

impl ParsedNbt {
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.root.get(key)
    }
}

/// Parses raw bytes into a tag tree. Gzip payloads are detected by magic
/// bytes and inflated first. Never panics on malformed input.
pub fn parse(bytes: &[u8]) -> Result<ParsedNbt, DecodeError> {
    let inflated;
    let mut cursor: &[u8] = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|_| DecodeError::Truncated)?;
        inflated = out;
        &inflated
    } else {
        bytes
    };
    let r = &mut cursor;
    let root_type = read_u8(r)?;
    if root_type != TAG_COMPOUND {
        return Err(DecodeError::InvalidFormat);
    }
    let root_name = read_string(r)?;
    let root = read_compound(r, 0)?;
    Ok(ParsedNbt { root_name, root })
}

fn read_u8(r: &mut &[u8]) -> Result<u8, DecodeError> {
    r.read_u8().map_err(|_| DecodeError::Truncated)
}

fn read_string(r: &mut &[u8]) -> Result<String, DecodeError> {
    let len = r
        .read_u16::<BigEndian>()
        .map_err(|_| DecodeError::Truncated)? as usize;
    if r.len() < len {
        return Err(DecodeError::Truncated);
    }
    let (head, tail) = r.split_at(len);
    let s = std::str::from_utf8(head).map_err(|_| DecodeError::InvalidFormat)?;
    *r = tail;
    Ok(s.to_string())
}

fn read_len(r: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = r
        .read_i32::<BigEndian>()
        .map_err(|_| DecodeError::Truncated)?;
    if len < 0 {
        return Err(DecodeError::InvalidFormat);
    }
    Ok(len as usize)
}

fn read_compound(r: &mut &[u8], depth: u32) -> Result<HashMap<String, Tag>, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::InvalidFormat);
    }
    let mut out = HashMap::new();
    loop {
        let ty = read_u8(r)?;
        if ty == TAG_END {
            return Ok(out);
        }
        let name = read_string(r)?;
        let value = read_payload(r, ty, depth + 1)?;
        out.insert(name, value);
    }
}

fn read_payload(r: &mut &[u8], ty: u8, depth: u32) -> Result<Tag, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::InvalidFormat);
    }
    let err = |_| DecodeError::Truncated;
    Ok(match ty {
        TAG_BYTE => Tag::Byte(r.read_i8().map_err(err)?),
        TAG_SHORT => Tag::Short(r.read_i16::<BigEndian>().map_err(err)?),
        TAG_INT => Tag::Int(r.read_i32::<BigEndian>().map_err(err)?),
        TAG_LONG => Tag::Long(r.read_i64::<BigEndian>().map_err(err)?),
        TAG_FLOAT => Tag::Float(r.read_f32::<BigEndian>().map_err(err)?),
        TAG_DOUBLE => Tag::Double(r.read_f64::<BigEndian>().map_err(err)?),
        TAG_BYTE_ARRAY => {
            let len = read_len(r)?;
            if r.len() < len {
                return Err(DecodeError::Truncated);
            }
            let (head, tail) = r.split_at(len);
            let out = head.to_vec();
            *r = tail;
            Tag::ByteArray(out)
        }
        TAG_STRING => Tag::String(read_string(r)?),
        TAG_LIST => {
            let elem_ty = read_u8(r)?;
            let len = read_len(r)?;
            if elem_ty == TAG_END && len > 0 {
                return Err(DecodeError::InvalidFormat);
            }
            // Every element costs at least one byte on the wire.
            if len > r.len() && elem_ty != TAG_END {
                return Err(DecodeError::Truncated);
            }
            let mut out = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                out.push(read_payload(r, elem_ty, depth + 1)?);
            }
            Tag::List(out)
        }
        TAG_COMPOUND => Tag::Compound(read_compound(r, depth + 1)?),
        TAG_INT_ARRAY => {
            let len = read_len(r)?;
            if r.len() < len.saturating_mul(4) {
                return Err(DecodeError::Truncated);
            }
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(r.read_i32::<BigEndian>().map_err(err)?);
            }
            Tag::IntArray(out)
        }
        TAG_LONG_ARRAY => {
            let len = read_len(r)?;
            if r.len() < len.saturating_mul(8) {
                return Err(DecodeError::Truncated);
            }
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(r.read_i64::<BigEndian>().map_err(err)?);
            }
            Tag::LongArray(out)
        }
        _ => return Err(DecodeError::InvalidFormat),
    })
}
