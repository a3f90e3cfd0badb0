//! Typed argument values and their tag/payload encoding.
//!
//! Every argument starts with one tag byte. The high nibble names the kind,
//! the low nibble is a byte width: of the value itself for integers and
//! floats, of a following big-endian length field for strings and byte
//! arrays.
//!
//! | Kind      | Tags               | Payload                          |
//! |-----------|--------------------|----------------------------------|
//! | Integer   | 0x31 0x32 0x34 0x38 | two's complement, 1/2/4/8 bytes |
//! | Float     | 0x54 0x58          | IEEE-754 single / double         |
//! | Boolean   | 0x71               | 0x00 / 0x01                      |
//! | String    | 0x91 0x92 0x94     | length field + UTF-8 bytes       |
//! | ByteArray | 0xB1 0xB2 0xB4     | length field + raw bytes         |

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::codec::ARG_MAX;
use crate::error::{FrameError, Result};

pub const TAG_INT8: u8 = 0x31;
pub const TAG_INT16: u8 = 0x32;
pub const TAG_INT32: u8 = 0x34;
pub const TAG_INT64: u8 = 0x38;
pub const TAG_FLOAT32: u8 = 0x54;
pub const TAG_FLOAT64: u8 = 0x58;
pub const TAG_BOOLEAN: u8 = 0x71;
pub const TAG_STRING: u8 = 0x90;
pub const TAG_BYTE_ARRAY: u8 = 0xB0;
/// Base tag of the frame's text-length field.
pub const TAG_TEXT_LENGTH: u8 = 0x10;

/// The kind of a [`TypedValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    String,
    ByteArray,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
            ValueKind::ByteArray => "bytearray",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message argument.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    ByteArray(Vec<u8>),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Integer(_) => ValueKind::Integer,
            TypedValue::Float(_) => ValueKind::Float,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::String(_) => ValueKind::String,
            TypedValue::ByteArray(_) => ValueKind::ByteArray,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TypedValue::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    /// The tag byte this value is encoded with.
    pub fn tag(&self) -> u8 {
        match self {
            TypedValue::Integer(v) => integer_tag(*v),
            TypedValue::Float(v) => {
                if fits_f32(*v) {
                    TAG_FLOAT32
                } else {
                    TAG_FLOAT64
                }
            }
            TypedValue::Boolean(_) => TAG_BOOLEAN,
            TypedValue::String(v) => TAG_STRING | length_width(v.len()) as u8,
            TypedValue::ByteArray(v) => TAG_BYTE_ARRAY | length_width(v.len()) as u8,
        }
    }

    /// Number of bytes [`encode`](TypedValue::encode) appends.
    pub fn encoded_len(&self) -> usize {
        match self {
            TypedValue::Integer(_) | TypedValue::Float(_) => 1 + (self.tag() & 0x0F) as usize,
            TypedValue::Boolean(_) => 2,
            TypedValue::String(v) => 1 + length_width(v.len()) + v.len(),
            TypedValue::ByteArray(v) => 1 + length_width(v.len()) + v.len(),
        }
    }

    /// Append tag and payload to `dst`.
    ///
    /// Fails with [`FrameError::ArgumentTooLong`] before writing anything if a
    /// string or byte array exceeds [`ARG_MAX`].
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            TypedValue::Integer(v) => {
                let tag = integer_tag(*v);
                dst.put_u8(tag);
                match tag {
                    TAG_INT8 => dst.put_i8(*v as i8),
                    TAG_INT16 => dst.put_i16(*v as i16),
                    TAG_INT32 => dst.put_i32(*v as i32),
                    _ => dst.put_i64(*v),
                }
            }
            TypedValue::Float(v) => {
                if fits_f32(*v) {
                    dst.put_u8(TAG_FLOAT32);
                    dst.put_f32(*v as f32);
                } else {
                    dst.put_u8(TAG_FLOAT64);
                    dst.put_f64(*v);
                }
            }
            TypedValue::Boolean(v) => {
                dst.put_u8(TAG_BOOLEAN);
                dst.put_u8(u8::from(*v));
            }
            TypedValue::String(v) => {
                check_arg_len(ValueKind::String, v.len())?;
                put_length(dst, TAG_STRING, v.len());
                dst.put_slice(v.as_bytes());
            }
            TypedValue::ByteArray(v) => {
                check_arg_len(ValueKind::ByteArray, v.len())?;
                put_length(dst, TAG_BYTE_ARRAY, v.len());
                dst.put_slice(v);
            }
        }
        Ok(())
    }

    /// Decode the argument starting at `pos` inside a complete text region.
    ///
    /// Returns the value and the position just past it.
    pub fn decode(text: &[u8], pos: usize) -> Result<(TypedValue, usize)> {
        let tag = text[pos];
        let width = (tag & 0x0F) as usize;
        let body = pos + 1;

        match tag {
            TAG_INT8 | TAG_INT16 | TAG_INT32 | TAG_INT64 => {
                let raw = slice(text, body, width, pos)?;
                let value = match width {
                    1 => i64::from(raw[0] as i8),
                    2 => i64::from(i16::from_be_bytes([raw[0], raw[1]])),
                    4 => i64::from(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    _ => i64::from_be_bytes(to_array8(raw)),
                };
                Ok((TypedValue::Integer(value), body + width))
            }
            TAG_FLOAT32 => {
                let raw = slice(text, body, 4, pos)?;
                let value = f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
                Ok((TypedValue::Float(f64::from(value)), body + 4))
            }
            TAG_FLOAT64 => {
                let raw = slice(text, body, 8, pos)?;
                Ok((TypedValue::Float(f64::from_be_bytes(to_array8(raw))), body + 8))
            }
            TAG_BOOLEAN => {
                let raw = slice(text, body, 1, pos)?;
                Ok((TypedValue::Boolean(raw[0] != 0x00), body + 1))
            }
            0x91 | 0x92 | 0x94 | 0xB1 | 0xB2 | 0xB4 => {
                let len = match read_length(&text[body..], width)? {
                    Some(len) => len,
                    None => return Err(FrameError::ArgumentOverrun { offset: pos }),
                };
                let start = body + width;
                let raw = slice(text, start, len, pos)?;
                let value = if tag & 0xF0 == TAG_STRING {
                    TypedValue::String(String::from_utf8(raw.to_vec())?)
                } else {
                    TypedValue::ByteArray(raw.to_vec())
                };
                Ok((value, start + len))
            }
            other => Err(FrameError::UnknownTag(other)),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(v) => write!(f, "{v}"),
            TypedValue::Float(v) => write!(f, "{v:.6}"),
            TypedValue::Boolean(v) => write!(f, "{v}"),
            TypedValue::String(v) => f.write_str(v),
            TypedValue::ByteArray(v) => {
                for (i, b) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "0x{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for TypedValue {
            fn from(v: $t) -> Self {
                TypedValue::Integer(i64::from(v))
            }
        })*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Float(v)
    }
}

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        TypedValue::Float(f64::from(v))
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Boolean(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::String(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::String(v)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(v: Vec<u8>) -> Self {
        TypedValue::ByteArray(v)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(v: &[u8]) -> Self {
        TypedValue::ByteArray(v.to_vec())
    }
}

fn integer_tag(v: i64) -> u8 {
    if i8::try_from(v).is_ok() {
        TAG_INT8
    } else if i16::try_from(v).is_ok() {
        TAG_INT16
    } else if i32::try_from(v).is_ok() {
        TAG_INT32
    } else {
        TAG_INT64
    }
}

fn fits_f32(v: f64) -> bool {
    v.abs() <= f64::from(f32::MAX)
}

fn check_arg_len(kind: ValueKind, len: usize) -> Result<()> {
    if len > ARG_MAX {
        return Err(FrameError::ArgumentTooLong {
            kind: kind.as_str(),
            len,
            max: ARG_MAX,
        });
    }
    Ok(())
}

/// Width class of a length field: 1, 2 or 4 bytes.
pub(crate) fn length_width(len: usize) -> usize {
    if len <= i8::MAX as usize {
        1
    } else if len <= i16::MAX as usize {
        2
    } else {
        4
    }
}

/// Write `base | width` followed by `len` as a signed big-endian field.
///
/// Callers keep `len` within `i32::MAX`.
pub(crate) fn put_length(dst: &mut BytesMut, base: u8, len: usize) {
    let width = length_width(len);
    dst.put_u8(base | width as u8);
    match width {
        1 => dst.put_i8(len as i8),
        2 => dst.put_i16(len as i16),
        _ => dst.put_i32(len as i32),
    }
}

/// Read a signed big-endian length field of `width` bytes.
///
/// `Ok(None)` when fewer than `width` bytes are available.
pub(crate) fn read_length(src: &[u8], width: usize) -> Result<Option<usize>> {
    if src.len() < width {
        return Ok(None);
    }
    let value = match width {
        1 => i64::from(src[0] as i8),
        2 => i64::from(i16::from_be_bytes([src[0], src[1]])),
        _ => i64::from(i32::from_be_bytes([src[0], src[1], src[2], src[3]])),
    };
    if value < 0 {
        return Err(FrameError::InvalidLength(value));
    }
    Ok(Some(value as usize))
}

fn slice(text: &[u8], start: usize, len: usize, arg_offset: usize) -> Result<&[u8]> {
    match start.checked_add(len) {
        Some(end) if end <= text.len() => Ok(&text[start..end]),
        _ => Err(FrameError::ArgumentOverrun { offset: arg_offset }),
    }
}

fn to_array8(raw: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&raw[..8]);
    out
}
