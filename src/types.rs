//! Type tags, format mode and the decoded value model
//!
//! A [`TypeTag`] identifies how the raw bytes of an attribute or variable element
//! are interpreted. Decoding produces a [`Value`], which converts losslessly into
//! `serde_json::Value` (non-finite floats become `null`).

use crate::errors::{NcJsonError, Result};
use serde_json::Value as JsonValue;
use std::fmt;

/// The decodable element kinds of a NetCDF container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
    String,
    Vlen,
    Opaque,
    Enum,
    Compound,
}

impl TypeTag {
    /// Map a libnetcdf type (or user type class) code onto a tag.
    ///
    /// Codes follow `netcdf.h`: `NC_BYTE` = 1 through `NC_STRING` = 12 for atomic
    /// types, and the class codes `NC_VLEN` = 13 through `NC_COMPOUND` = 16.
    pub fn from_code(code: i32) -> Result<Self> {
        let tag = match code {
            1 => TypeTag::Byte,
            2 => TypeTag::Char,
            3 => TypeTag::Short,
            4 => TypeTag::Int,
            5 => TypeTag::Float,
            6 => TypeTag::Double,
            7 => TypeTag::UByte,
            8 => TypeTag::UShort,
            9 => TypeTag::UInt,
            10 => TypeTag::Int64,
            11 => TypeTag::UInt64,
            12 => TypeTag::String,
            13 => TypeTag::Vlen,
            14 => TypeTag::Opaque,
            15 => TypeTag::Enum,
            16 => TypeTag::Compound,
            other => return Err(NcJsonError::UnexpectedType { code: other }),
        };
        Ok(tag)
    }

    pub fn code(self) -> i32 {
        match self {
            TypeTag::Byte => 1,
            TypeTag::Char => 2,
            TypeTag::Short => 3,
            TypeTag::Int => 4,
            TypeTag::Float => 5,
            TypeTag::Double => 6,
            TypeTag::UByte => 7,
            TypeTag::UShort => 8,
            TypeTag::UInt => 9,
            TypeTag::Int64 => 10,
            TypeTag::UInt64 => 11,
            TypeTag::String => 12,
            TypeTag::Vlen => 13,
            TypeTag::Opaque => 14,
            TypeTag::Enum => 15,
            TypeTag::Compound => 16,
        }
    }

    /// Byte width of one element for fixed-width tags.
    pub fn width(self) -> Option<usize> {
        match self {
            TypeTag::Byte | TypeTag::Char | TypeTag::UByte => Some(1),
            TypeTag::Short | TypeTag::UShort => Some(2),
            TypeTag::Int | TypeTag::UInt | TypeTag::Float => Some(4),
            TypeTag::Double | TypeTag::Int64 | TypeTag::UInt64 => Some(8),
            TypeTag::String
            | TypeTag::Vlen
            | TypeTag::Opaque
            | TypeTag::Enum
            | TypeTag::Compound => None,
        }
    }

    /// True for tags that decode to a JSON number.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            TypeTag::Char
                | TypeTag::String
                | TypeTag::Vlen
                | TypeTag::Opaque
                | TypeTag::Enum
                | TypeTag::Compound
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Byte => "byte",
            TypeTag::Char => "char",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::UByte => "ubyte",
            TypeTag::UShort => "ushort",
            TypeTag::UInt => "uint",
            TypeTag::Int64 => "int64",
            TypeTag::UInt64 => "uint64",
            TypeTag::String => "string",
            TypeTag::Vlen => "vlen",
            TypeTag::Opaque => "opaque",
            TypeTag::Enum => "enum",
            TypeTag::Compound => "compound",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// On-disk layout family of an open file.
///
/// Only the newline rule of string escaping depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    /// classic, 64-bit offset, cdf5 and netCDF-4 classic model files
    #[default]
    Classic,
    /// netCDF-4 (HDF5-based) files using the enhanced model
    Modern,
}

impl FormatMode {
    /// `NC_FORMAT_NETCDF4` from `netcdf.h`
    pub const NETCDF4_FORMAT_CODE: i32 = 3;

    /// Classify the result of `nc_inq_format`.
    pub fn from_format_code(code: i32) -> Self {
        if code == Self::NETCDF4_FORMAT_CODE {
            FormatMode::Modern
        } else {
            FormatMode::Classic
        }
    }
}

/// A single decoded scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Byte(i8),
    Short(i16),
    Int(i32),
    Int64(i64),
    UByte(u8),
    UShort(u16),
    UInt(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Value {
    /// Numeric view of the value, used when handing grids to renderers.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Byte(v) => Some(f64::from(v)),
            Value::Short(v) => Some(f64::from(v)),
            Value::Int(v) => Some(f64::from(v)),
            Value::Int64(v) => Some(v as f64),
            Value::UByte(v) => Some(f64::from(v)),
            Value::UShort(v) => Some(f64::from(v)),
            Value::UInt(v) => Some(f64::from(v)),
            Value::UInt64(v) => Some(v as f64),
            Value::Float(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            Value::Null | Value::Str(_) => None,
        }
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Byte(v) => JsonValue::from(v),
            Value::Short(v) => JsonValue::from(v),
            Value::Int(v) => JsonValue::from(v),
            Value::Int64(v) => JsonValue::from(v),
            Value::UByte(v) => JsonValue::from(v),
            Value::UShort(v) => JsonValue::from(v),
            Value::UInt(v) => JsonValue::from(v),
            Value::UInt64(v) => JsonValue::from(v),
            Value::Float(v) => float_to_json(f64::from(v)),
            Value::Double(v) => float_to_json(v),
            Value::Str(s) => JsonValue::String(s),
        }
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
