//! Typed attribute decoding
//!
//! Attributes arrive as a type tag, an element count and a payload copied out of
//! the library. Decoding maps them onto a single [`Value`].
//!
//! Only the first element of a multi-valued attribute is decoded. This is a
//! known limitation of the JSON layout, not an oversight.

use crate::errors::{NcJsonError, Result};
use crate::escape::escape;
use crate::types::{FormatMode, TypeTag, Value};

/// Raw attribute contents as copied out of the file
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePayload {
    /// The attribute exists but carries no value
    Absent,
    /// `count * width` native-endian bytes for fixed-width tags, or the
    /// character run for `char`
    Fixed(Vec<u8>),
    /// Independently allocated strings; `None` marks a null pointer
    Strings(Vec<Option<Vec<u8>>>),
    /// User-defined types whose payload is never interpreted
    Opaque,
}

/// A named, typed side-value attached to a group or variable
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub tag: TypeTag,
    pub count: usize,
    pub payload: AttributePayload,
}

impl Attribute {
    pub fn new(name: impl Into<String>, tag: TypeTag, count: usize, payload: AttributePayload) -> Self {
        Self {
            name: name.into(),
            tag,
            count,
            payload,
        }
    }

    /// Text attribute stored as `char`, the way classic files hold strings.
    pub fn text(name: impl Into<String>, text: &str) -> Self {
        let bytes = text.as_bytes().to_vec();
        Self::new(name, TypeTag::Char, bytes.len(), AttributePayload::Fixed(bytes))
    }

    /// Single `double` attribute.
    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(
            name,
            TypeTag::Double,
            1,
            AttributePayload::Fixed(value.to_ne_bytes().to_vec()),
        )
    }

    pub fn decode(&self, mode: FormatMode) -> Result<Value> {
        decode(self.tag, self.count, &self.payload, mode)
    }
}

/// Decode one attribute value.
pub fn decode(tag: TypeTag, count: usize, payload: &AttributePayload, mode: FormatMode) -> Result<Value> {
    if count == 0 || matches!(payload, AttributePayload::Absent) {
        return Ok(Value::Null);
    }

    if let Some(text) = placeholder(tag) {
        return Ok(Value::Str(text.to_string()));
    }

    match (tag, payload) {
        (TypeTag::Char, AttributePayload::Fixed(bytes)) => Ok(Value::Str(escape(bytes, mode))),
        (TypeTag::String, AttributePayload::Strings(strings)) => match strings.first() {
            Some(Some(bytes)) => Ok(Value::Str(escape(bytes, mode))),
            Some(None) | None => Ok(Value::Null),
        },
        (tag, AttributePayload::Fixed(bytes)) if tag.is_numeric() => decode_scalar(tag, bytes),
        (tag, _) => Err(NcJsonError::Internal(format!(
            "payload does not match attribute type {}",
            tag
        ))),
    }
}

/// Fixed stand-in text for user-defined type classes, which are not decoded.
pub fn placeholder(tag: TypeTag) -> Option<&'static str> {
    match tag {
        TypeTag::Vlen => Some("udf VLEN"),
        TypeTag::Opaque => Some("udf OPAQUE"),
        TypeTag::Enum => Some("udf ENUM"),
        TypeTag::Compound => Some("udf COMPOUND"),
        _ => None,
    }
}

/// Decode the element at byte offset 0 of `bytes` as `tag`'s native type.
///
/// Only fixed-width numeric tags are decodable here; anything else is
/// reported as unsupported.
pub fn decode_scalar(tag: TypeTag, bytes: &[u8]) -> Result<Value> {
    let width = match tag.width() {
        Some(width) if tag.is_numeric() => width,
        _ => {
            return Err(NcJsonError::UnsupportedType {
                tag: tag.to_string(),
            })
        }
    };
    let raw = bytes.get(..width).ok_or_else(|| {
        NcJsonError::Internal(format!(
            "{} value needs {} bytes but only {} are available",
            tag,
            width,
            bytes.len()
        ))
    })?;

    let value = match tag {
        TypeTag::Byte => Value::Byte(i8::from_ne_bytes([raw[0]])),
        TypeTag::UByte => Value::UByte(raw[0]),
        TypeTag::Short => Value::Short(i16::from_ne_bytes(fixed(raw))),
        TypeTag::UShort => Value::UShort(u16::from_ne_bytes(fixed(raw))),
        TypeTag::Int => Value::Int(i32::from_ne_bytes(fixed(raw))),
        TypeTag::UInt => Value::UInt(u32::from_ne_bytes(fixed(raw))),
        TypeTag::Float => Value::Float(f32::from_ne_bytes(fixed(raw))),
        TypeTag::Double => Value::Double(f64::from_ne_bytes(fixed(raw))),
        TypeTag::Int64 => Value::Int64(i64::from_ne_bytes(fixed(raw))),
        TypeTag::UInt64 => Value::UInt64(u64::from_ne_bytes(fixed(raw))),
        other => {
            return Err(NcJsonError::UnsupportedType {
                tag: other.to_string(),
            })
        }
    };
    Ok(value)
}

fn fixed<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}
