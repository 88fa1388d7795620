use byteorder::{LittleEndian, ReadBytesExt};
use encoding::all::WINDOWS_1252;
use encoding::{DecoderTrap, Encoding};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Cursor;

use crate::error::{EventLogError, Result};
use crate::guid::Guid;
use crate::ntsid::Sid;
use crate::time::{filetime_to_timestamp, SystemTime};

/// The decoded payload of one value descriptor or substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    AnsiString(String),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Binary(Vec<u8>),
    Guid(Guid),
    Sid(String),
    HexInt32(u32),
    HexInt64(u64),
    SizeT(u64),
    FileTime(jiff::Timestamp),
    SysTime(jiff::Timestamp),
    /// A recursively-decoded BXML fragment rendered to its XML text form.
    BinXml(String),
    /// A list of scalars decoded from an array-flagged descriptor.
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::String(s) | Value::AnsiString(s) | Value::Sid(s) | Value::BinXml(s) => {
                write!(f, "{}", s)
            }
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Binary(b) => write!(f, "{}", hex_lower(b)),
            Value::Guid(g) => write!(f, "{}", g),
            Value::HexInt32(v) => write!(f, "0x{:x}", v),
            Value::HexInt64(v) => write!(f, "0x{:x}", v),
            Value::SizeT(v) => write!(f, "0x{:x}", v),
            Value::FileTime(ts) | Value::SysTime(ts) => write!(f, "{}", ts),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Numeric and boolean variants serialize natively; everything else (GUID,
/// SID, FILETIME, binary, strings) serializes as its display text, matching
/// the textual records the upstream JSON output has always produced.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::I8(v) => serializer.serialize_i8(*v),
            Value::U8(v) => serializer.serialize_u8(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F32(v) => serializer.serialize_f32(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// BXML's value-type tag byte; the high bit (0x80) marks an array of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueType(pub u8);

impl ValueType {
    pub const NULL: u8 = 0x00;
    pub const STRING: u8 = 0x01;
    pub const ANSI_STRING: u8 = 0x02;
    pub const I8: u8 = 0x03;
    pub const U8: u8 = 0x04;
    pub const I16: u8 = 0x05;
    pub const U16: u8 = 0x06;
    pub const I32: u8 = 0x07;
    pub const U32: u8 = 0x08;
    pub const I64: u8 = 0x09;
    pub const U64: u8 = 0x0a;
    pub const F32: u8 = 0x0b;
    pub const F64: u8 = 0x0c;
    pub const BOOL: u8 = 0x0d;
    pub const BINARY: u8 = 0x0e;
    pub const GUID: u8 = 0x0f;
    pub const SIZE_T: u8 = 0x10;
    pub const FILETIME: u8 = 0x11;
    pub const SYSTIME: u8 = 0x12;
    pub const SID: u8 = 0x13;
    pub const HEX_INT32: u8 = 0x14;
    pub const HEX_INT64: u8 = 0x15;
    pub const BINXML: u8 = 0x21;

    const ARRAY_FLAG: u8 = 0x80;

    pub fn base(self) -> u8 {
        self.0 & !Self::ARRAY_FLAG
    }

    pub fn is_array(self) -> bool {
        self.0 & Self::ARRAY_FLAG != 0
    }
}

/// Width in bytes of one element of a fixed-width scalar type, or `None` for
/// variable-width types (strings, binary, SID) that cannot be array-split generically.
fn fixed_width(base: u8) -> Option<usize> {
    match base {
        ValueType::I8 | ValueType::U8 | ValueType::BOOL => Some(1),
        ValueType::I16 | ValueType::U16 => Some(2),
        ValueType::I32 | ValueType::U32 | ValueType::F32 | ValueType::HEX_INT32 => Some(4),
        ValueType::I64
        | ValueType::U64
        | ValueType::F64
        | ValueType::FILETIME
        | ValueType::HEX_INT64 => Some(8),
        ValueType::GUID => Some(16),
        ValueType::SYSTIME => Some(16),
        _ => None,
    }
}

/// Decode `bytes` (exactly `size` bytes, already sliced by the caller) according
/// to `value_type`. Array-flagged descriptors repeat the scalar reader until the
/// slice is exhausted, except for STRING/ANSI_STRING which have no per-element
/// delimiter and are always decoded as a single string.
pub fn read_value(value_type: ValueType, bytes: &[u8], size_t_is_64_bit: bool) -> Result<Value> {
    let base = value_type.base();

    if value_type.is_array() && base != ValueType::STRING && base != ValueType::ANSI_STRING {
        let width = fixed_width(base)
            .ok_or_else(|| EventLogError::ValueDecode(format!("type 0x{:02x} has no fixed width for array decode", base)))?;
        if bytes.len() % width != 0 {
            return Err(EventLogError::ValueDecode(format!(
                "array of {} bytes does not evenly divide width {}",
                bytes.len(),
                width
            )));
        }
        let mut items = Vec::with_capacity(bytes.len() / width);
        for chunk in bytes.chunks(width) {
            items.push(read_scalar(base, chunk, size_t_is_64_bit)?);
        }
        return Ok(Value::Array(items));
    }

    read_scalar(base, bytes, size_t_is_64_bit)
}

fn read_scalar(base: u8, bytes: &[u8], size_t_is_64_bit: bool) -> Result<Value> {
    let mut cur = Cursor::new(bytes);
    match base {
        ValueType::NULL => Ok(Value::Null),
        ValueType::STRING => {
            let utf16: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            let s = String::from_utf16_lossy(&utf16);
            Ok(Value::String(s.trim_end_matches('\0').to_string()))
        }
        ValueType::ANSI_STRING => {
            let nul_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            let decoded = WINDOWS_1252
                .decode(&bytes[..nul_pos], DecoderTrap::Replace)
                .map_err(|e| EventLogError::ValueDecode(e.to_string()))?;
            Ok(Value::AnsiString(decoded))
        }
        ValueType::I8 => Ok(Value::I8(cur.read_i8()?)),
        ValueType::U8 => Ok(Value::U8(cur.read_u8()?)),
        ValueType::I16 => Ok(Value::I16(cur.read_i16::<LittleEndian>()?)),
        ValueType::U16 => Ok(Value::U16(cur.read_u16::<LittleEndian>()?)),
        ValueType::I32 => Ok(Value::I32(cur.read_i32::<LittleEndian>()?)),
        ValueType::U32 => Ok(Value::U32(cur.read_u32::<LittleEndian>()?)),
        ValueType::I64 => Ok(Value::I64(cur.read_i64::<LittleEndian>()?)),
        ValueType::U64 => Ok(Value::U64(cur.read_u64::<LittleEndian>()?)),
        ValueType::F32 => Ok(Value::F32(cur.read_f32::<LittleEndian>()?)),
        ValueType::F64 => Ok(Value::F64(cur.read_f64::<LittleEndian>()?)),
        ValueType::BOOL => {
            let raw = cur.read_u32::<LittleEndian>()?;
            Ok(Value::Bool(raw != 0))
        }
        ValueType::BINARY => Ok(Value::Binary(bytes.to_vec())),
        ValueType::GUID => {
            let arr: [u8; 16] = bytes
                .try_into()
                .map_err(|_| EventLogError::ValueDecode("guid requires 16 bytes".into()))?;
            Ok(Value::Guid(Guid::from_bytes(&arr)))
        }
        ValueType::SID => {
            let sid = Sid::from_reader(&mut cur)?;
            Ok(Value::Sid(sid.to_string()))
        }
        ValueType::HEX_INT32 => Ok(Value::HexInt32(cur.read_u32::<LittleEndian>()?)),
        ValueType::HEX_INT64 => Ok(Value::HexInt64(cur.read_u64::<LittleEndian>()?)),
        ValueType::SIZE_T => {
            let v = if size_t_is_64_bit || bytes.len() == 8 {
                cur.read_u64::<LittleEndian>()?
            } else {
                cur.read_u32::<LittleEndian>()? as u64
            };
            Ok(Value::SizeT(v))
        }
        ValueType::FILETIME => {
            let ticks = cur.read_u64::<LittleEndian>()?;
            Ok(Value::FileTime(filetime_to_timestamp(ticks)))
        }
        ValueType::SYSTIME => {
            let year = cur.read_u16::<LittleEndian>()?;
            let month = cur.read_u16::<LittleEndian>()?;
            let day_of_week = cur.read_u16::<LittleEndian>()?;
            let day = cur.read_u16::<LittleEndian>()?;
            let hour = cur.read_u16::<LittleEndian>()?;
            let minute = cur.read_u16::<LittleEndian>()?;
            let second = cur.read_u16::<LittleEndian>()?;
            let milliseconds = cur.read_u16::<LittleEndian>()?;
            let st = SystemTime {
                year,
                month,
                day_of_week,
                day,
                hour,
                minute,
                second,
                milliseconds,
            };
            let ts = st
                .to_timestamp()
                .ok_or_else(|| EventLogError::ValueDecode("invalid SYSTEMTIME fields".into()))?;
            Ok(Value::SysTime(ts))
        }
        other => Err(EventLogError::InvalidValueType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_guid_braced_uppercase() {
        let bytes: [u8; 16] = [
            0xef, 0xbe, 0xad, 0xde, 0x34, 0x12, 0x78, 0x56, 0, 1, 2, 3, 4, 5, 6, 7,
        ];
        let v = read_value(ValueType(ValueType::GUID), &bytes, false).unwrap();
        assert_eq!(
            v.to_string(),
            "{DEADBEEF-1234-5678-0001-020304050607}"
        );
    }

    #[test]
    fn decodes_bool_as_4_byte_windows_bool() {
        let bytes = 1u32.to_le_bytes();
        let v = read_value(ValueType(ValueType::BOOL), &bytes, false).unwrap();
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn decodes_array_of_u32() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        let v = read_value(ValueType(ValueType::U32 | 0x80), &bytes, false).unwrap();
        assert_eq!(v, Value::Array(vec![Value::U32(1), Value::U32(2)]));
    }

    #[test]
    fn array_flag_on_string_is_still_a_single_string() {
        let utf16: Vec<u8> = "hi".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let v = read_value(ValueType(ValueType::STRING | 0x80), &utf16, false).unwrap();
        assert_eq!(v, Value::String("hi".to_string()));
    }

    #[test]
    fn hex_int32_formats_as_0x_prefixed() {
        let bytes = 255u32.to_le_bytes();
        let v = read_value(ValueType(ValueType::HEX_INT32), &bytes, false).unwrap();
        assert_eq!(v.to_string(), "0xff");
    }
}
