//! N-dimensional slicing into nested JSON arrays
//!
//! A request fixes the leading dimensions of a variable with a prefix of
//! indices and leaves the trailing dimensions free. The free block is read as
//! one flat buffer and folded back into nested arrays, first free dimension
//! outermost.

use crate::container::{Dimension, TypedBuffer};
use crate::errors::{NcJsonError, Result};
use serde_json::Value as JsonValue;

/// Check that `index` addresses an element of `dim`.
pub fn validate_index(dim: &Dimension, index: usize) -> Result<()> {
    if index >= dim.size {
        return Err(NcJsonError::invalid_argument(format!(
            "Index {} is out of range for dimension '{}' of size {}",
            index, dim.name, dim.size
        )));
    }
    Ok(())
}

/// Start/count pairs for a prefix read: fixed positions read one element,
/// free positions read the whole dimension.
pub fn hyperslab(dims: &[Dimension], prefix: &[usize]) -> (Vec<usize>, Vec<usize>) {
    dims.iter()
        .enumerate()
        .map(|(i, dim)| match prefix.get(i) {
            Some(&index) => (index, 1),
            None => (0, dim.size),
        })
        .unzip()
}

/// Check that `prefix` fits the dimensions of variable `name`.
pub fn check_prefix(name: &str, dims: &[Dimension], prefix: &[usize]) -> Result<()> {
    if prefix.len() > dims.len() {
        return Err(NcJsonError::invalid_argument(format!(
            "Variable '{}' has {} dimensions but {} indices were supplied",
            name,
            dims.len(),
            prefix.len()
        )));
    }
    for (dim, &index) in dims.iter().zip(prefix) {
        validate_index(dim, index)?;
    }
    Ok(())
}

/// Read and reshape the block of variable `name` selected by `prefix`.
///
/// `read` receives the offsets and counts of the hyperslab and must return the
/// elements in row-major order. When the prefix covers every dimension the
/// single element is returned as a bare scalar.
pub fn slice<F>(name: &str, dims: &[Dimension], prefix: &[usize], read: F) -> Result<JsonValue>
where
    F: FnOnce(&[usize], &[usize]) -> Result<TypedBuffer>,
{
    check_prefix(name, dims, prefix)?;

    let (offsets, counts) = hyperslab(dims, prefix);
    let free: Vec<usize> = dims[prefix.len()..].iter().map(|d| d.size).collect();
    let total: usize = free.iter().product();

    let buffer = read(&offsets, &counts)?;
    if buffer.len() != total {
        return Err(NcJsonError::Internal(format!(
            "read returned {} elements but {} were requested",
            buffer.len(),
            total
        )));
    }

    if free.is_empty() {
        return Ok(buffer.get(0)?.into());
    }
    if total == 0 {
        return Ok(empty_nest(&free));
    }
    reshape(&buffer, &free)
}

/// Fold a flat buffer into nested arrays of the given shape.
///
/// Each element lands in the innermost list; a list that reaches its
/// dimension's length is closed and appended to its parent, and closing
/// carries outward until a level is not yet full.
pub fn reshape(buffer: &TypedBuffer, shape: &[usize]) -> Result<JsonValue> {
    let depth = shape.len();
    let mut levels: Vec<Vec<JsonValue>> = shape.iter().map(|&n| Vec::with_capacity(n)).collect();

    for element in buffer.iter() {
        levels[depth - 1].push(element?.into());

        let mut level = depth - 1;
        while level > 0 && levels[level].len() == shape[level] {
            let full = std::mem::replace(&mut levels[level], Vec::with_capacity(shape[level]));
            levels[level - 1].push(JsonValue::Array(full));
            level -= 1;
        }
    }

    let outer = levels.swap_remove(0);
    Ok(JsonValue::Array(outer))
}

// A zero-length dimension empties everything inside it but keeps the
// enclosing lists.
fn empty_nest(shape: &[usize]) -> JsonValue {
    match shape.split_first() {
        Some((&n, rest)) if n > 0 && !rest.is_empty() => {
            JsonValue::Array((0..n).map(|_| empty_nest(rest)).collect())
        }
        _ => JsonValue::Array(Vec::new()),
    }
}
