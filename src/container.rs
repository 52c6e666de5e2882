//! Container model and the data source abstraction
//!
//! A [`Group`] is a snapshot of a container's dimensions, variables and
//! attributes in declaration order. A [`DataSource`] produces that snapshot and
//! reads hyperslabs of variable data as flat [`TypedBuffer`]s.
//!
//! [`MemorySource`] is an in-memory container, handy for tests and demos.

use crate::attributes::{decode_scalar, placeholder, Attribute};
use crate::escape::escape;
use crate::errors::{NcJsonError, Result};
use crate::types::{FormatMode, TypeTag, Value};
use std::collections::HashMap;

/// A named axis of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub size: usize,
    pub is_unlimited: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            is_unlimited: false,
        }
    }

    pub fn unlimited(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            is_unlimited: true,
        }
    }
}

/// A named, typed array; dimensions are outermost first
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub tag: TypeTag,
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
}

impl Variable {
    pub fn add_attribute(&mut self, attribute: Attribute) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.size).collect()
    }
}

/// Root or nested scope holding dimensions, variables and attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub dimensions: Vec<Dimension>,
    pub variables: Vec<Variable>,
    pub attributes: Vec<Attribute>,
    pub groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Element types that can be packed into a [`TypedBuffer`]
pub trait Element: Copy {
    const TAG: TypeTag;
    fn extend_ne(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TAG: TypeTag = TypeTag::$tag;
                fn extend_ne(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_element!(
    i8 => Byte,
    u8 => UByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
);

/// Flat row-major run of elements of a single type
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBuffer {
    tag: TypeTag,
    elements: Elements,
}

#[derive(Debug, Clone, PartialEq)]
enum Elements {
    /// Native-endian fixed-width numbers
    Numeric { width: usize, bytes: Vec<u8> },
    /// One byte per `char` element
    Chars { bytes: Vec<u8>, mode: FormatMode },
    /// Owned copies of `string` elements; `None` is a null pointer
    Strings { values: Vec<Option<Vec<u8>>>, mode: FormatMode },
    /// User-defined elements, reported by placeholder only
    Placeholder { len: usize },
}

impl TypedBuffer {
    /// Wrap raw bytes read for a fixed-width numeric `tag`.
    pub fn new(tag: TypeTag, bytes: Vec<u8>) -> Result<Self> {
        let width = match tag.width() {
            Some(width) if tag.is_numeric() => width,
            _ => {
                return Err(NcJsonError::UnsupportedType {
                    tag: tag.to_string(),
                })
            }
        };
        if bytes.len() % width != 0 {
            return Err(NcJsonError::Internal(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                tag
            )));
        }
        Ok(Self {
            tag,
            elements: Elements::Numeric { width, bytes },
        })
    }

    /// `char` elements, one per byte.
    pub fn chars(bytes: Vec<u8>, mode: FormatMode) -> Self {
        Self {
            tag: TypeTag::Char,
            elements: Elements::Chars { bytes, mode },
        }
    }

    /// `string` elements already copied out of the library.
    pub fn strings(values: Vec<Option<Vec<u8>>>, mode: FormatMode) -> Self {
        Self {
            tag: TypeTag::String,
            elements: Elements::Strings { values, mode },
        }
    }

    pub fn from_strs(values: &[&str], mode: FormatMode) -> Self {
        Self::strings(values.iter().map(|v| Some(v.as_bytes().to_vec())).collect(), mode)
    }

    /// `len` elements of a user-defined type class.
    pub fn placeholder(tag: TypeTag, len: usize) -> Result<Self> {
        if placeholder(tag).is_none() {
            return Err(NcJsonError::Internal(format!("{} is not a user-defined type class", tag)));
        }
        Ok(Self {
            tag,
            elements: Elements::Placeholder { len },
        })
    }

    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * std::mem::size_of::<T>());
        for &v in values {
            v.extend_ne(&mut bytes);
        }
        Self {
            tag: T::TAG,
            elements: Elements::Numeric {
                width: std::mem::size_of::<T>(),
                bytes,
            },
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn len(&self) -> usize {
        match &self.elements {
            Elements::Numeric { width, bytes } => bytes.len() / width,
            Elements::Chars { bytes, .. } => bytes.len(),
            Elements::Strings { values, .. } => values.len(),
            Elements::Placeholder { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode one element. Text goes through the same escaping as attributes.
    pub fn get(&self, index: usize) -> Result<Value> {
        let missing = || out_of_range(index, self.len());
        match &self.elements {
            Elements::Numeric { width, bytes } => {
                let raw = bytes.get(index * width..(index + 1) * width).ok_or_else(missing)?;
                decode_scalar(self.tag, raw)
            }
            Elements::Chars { bytes, mode } => {
                let byte = bytes.get(index).ok_or_else(missing)?;
                Ok(Value::Str(escape(std::slice::from_ref(byte), *mode)))
            }
            Elements::Strings { values, mode } => match values.get(index).ok_or_else(missing)? {
                Some(bytes) => Ok(Value::Str(escape(bytes, *mode))),
                None => Ok(Value::Null),
            },
            Elements::Placeholder { len } => {
                if index >= *len {
                    return Err(missing());
                }
                let text = placeholder(self.tag).ok_or_else(|| NcJsonError::UnsupportedType {
                    tag: self.tag.to_string(),
                })?;
                Ok(Value::Str(text.to_string()))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// New buffer holding the elements at `indices`, in that order.
    fn gather(&self, indices: &[usize]) -> Result<Self> {
        let len = self.len();
        let elements = match &self.elements {
            Elements::Numeric { width, bytes } => {
                let mut out = Vec::with_capacity(indices.len() * width);
                for &i in indices {
                    let raw = bytes
                        .get(i * width..(i + 1) * width)
                        .ok_or_else(|| out_of_range(i, len))?;
                    out.extend_from_slice(raw);
                }
                Elements::Numeric {
                    width: *width,
                    bytes: out,
                }
            }
            Elements::Chars { bytes, mode } => Elements::Chars {
                bytes: indices
                    .iter()
                    .map(|&i| bytes.get(i).copied().ok_or_else(|| out_of_range(i, len)))
                    .collect::<Result<_>>()?,
                mode: *mode,
            },
            Elements::Strings { values, mode } => Elements::Strings {
                values: indices
                    .iter()
                    .map(|&i| values.get(i).cloned().ok_or_else(|| out_of_range(i, len)))
                    .collect::<Result<_>>()?,
                mode: *mode,
            },
            Elements::Placeholder { .. } => {
                if let Some(&i) = indices.iter().find(|&&i| i >= len) {
                    return Err(out_of_range(i, len));
                }
                Elements::Placeholder { len: indices.len() }
            }
        };
        Ok(Self {
            tag: self.tag,
            elements,
        })
    }
}

fn out_of_range(index: usize, len: usize) -> NcJsonError {
    NcJsonError::Internal(format!(
        "element {} is outside a buffer of {} elements",
        index, len
    ))
}

/// Read-only access to one open container
pub trait DataSource {
    /// Layout family detected when the source was opened
    fn format_mode(&self) -> FormatMode;

    /// Snapshot of the root group
    fn root(&self) -> Result<Group>;

    /// Read `counts` elements per dimension starting at `offsets`, row-major.
    fn read(&self, variable: &Variable, offsets: &[usize], counts: &[usize]) -> Result<TypedBuffer>;
}

/// In-memory container built up the way a file is defined
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    mode: FormatMode,
    root: Group,
    data: HashMap<String, TypedBuffer>,
}

impl MemorySource {
    pub fn new(mode: FormatMode) -> Self {
        Self {
            mode,
            root: Group::new("/"),
            data: HashMap::new(),
        }
    }

    pub fn add_dimension(&mut self, name: &str, size: usize) {
        self.root.dimensions.push(Dimension::new(name, size));
    }

    pub fn add_unlimited_dimension(&mut self, name: &str, current_size: usize) {
        self.root.dimensions.push(Dimension::unlimited(name, current_size));
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.root.attributes.push(attribute);
    }

    pub fn add_group(&mut self, group: Group) {
        self.root.groups.push(group);
    }

    /// Define a variable over existing dimensions with its full row-major data.
    pub fn add_variable(&mut self, name: &str, dims: &[&str], data: TypedBuffer) -> Result<&mut Variable> {
        let dimensions = dims
            .iter()
            .map(|d| {
                self.root
                    .dimension(d)
                    .cloned()
                    .ok_or_else(|| NcJsonError::not_found("Dimension", *d))
            })
            .collect::<Result<Vec<_>>>()?;

        let expected: usize = dimensions.iter().map(|d| d.size).product();
        if data.len() != expected {
            return Err(NcJsonError::invalid_argument(format!(
                "variable '{}' needs {} elements but {} were given",
                name,
                expected,
                data.len()
            )));
        }

        self.data.insert(name.to_string(), data.clone());
        self.root.variables.push(Variable {
            name: name.to_string(),
            tag: data.tag(),
            dimensions,
            attributes: Vec::new(),
        });
        let last = self.root.variables.len() - 1;
        Ok(&mut self.root.variables[last])
    }
}

impl DataSource for MemorySource {
    fn format_mode(&self) -> FormatMode {
        self.mode
    }

    fn root(&self) -> Result<Group> {
        Ok(self.root.clone())
    }

    fn read(&self, variable: &Variable, offsets: &[usize], counts: &[usize]) -> Result<TypedBuffer> {
        let data = self
            .data
            .get(&variable.name)
            .ok_or_else(|| NcJsonError::not_found("Variable", variable.name.as_str()))?;
        let shape = variable.shape();
        if offsets.len() != shape.len() || counts.len() != shape.len() {
            return Err(NcJsonError::Internal(format!(
                "hyperslab rank {} does not match variable rank {}",
                offsets.len(),
                shape.len()
            )));
        }
        for ((&off, &count), &size) in offsets.iter().zip(counts).zip(&shape) {
            if off + count > size {
                return Err(NcJsonError::invalid_argument(format!(
                    "hyperslab {}..{} exceeds dimension size {}",
                    off,
                    off + count,
                    size
                )));
            }
        }

        let total: usize = counts.iter().product();
        let mut flats = Vec::with_capacity(total);
        if total > 0 {
            // Odometer over the hyperslab, last dimension fastest.
            let mut cursor = vec![0usize; shape.len()];
            for _ in 0..total {
                let flat = cursor
                    .iter()
                    .zip(offsets)
                    .zip(&shape)
                    .fold(0usize, |acc, ((&c, &off), &size)| acc * size + off + c);
                flats.push(flat);

                for axis in (0..cursor.len()).rev() {
                    cursor[axis] += 1;
                    if cursor[axis] < counts[axis] {
                        break;
                    }
                    cursor[axis] = 0;
                }
            }
        }
        data.gather(&flats)
    }
}
