//! Request-level operations over one open container
//!
//! An [`Engine`] wraps a [`DataSource`] and answers the three requests the
//! server exposes: metadata, variable data by index prefix, and the numeric
//! inputs of the concentration image.

use crate::container::{DataSource, Group, TypedBuffer, Variable};
use crate::errors::{NcJsonError, Result};
use crate::metadata::describe;
use crate::netcdf_io::NetcdfFile;
use crate::slicer::{check_prefix, hyperslab, slice, validate_index};
use crate::types::FormatMode;
use ndarray::Array2;
use serde_json::{json, Value as JsonValue};
use std::path::Path;

/// Variable names the image request reads
pub const TIME_VAR: &str = "time";
pub const X_VAR: &str = "x";
pub const Y_VAR: &str = "y";
pub const Z_DIM: &str = "z";
pub const CONCENTRATION_VAR: &str = "concentration";

/// Numeric grids handed to the image renderer
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInputs {
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// `[y, x]` slab of the concentration field
    pub concentration: Array2<f64>,
}

impl ImageInputs {
    pub fn to_json(&self) -> JsonValue {
        let rows: Vec<Vec<f64>> = self.concentration.rows().into_iter().map(|r| r.to_vec()).collect();
        json!({
            "time": self.time,
            "x": self.x,
            "y": self.y,
            "concentration": rows,
        })
    }
}

/// Operations over one open container
#[derive(Debug)]
pub struct Engine<S> {
    source: S,
}

impl Engine<NetcdfFile> {
    /// Open a NetCDF file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(NetcdfFile::open(path)?))
    }
}

impl<S: DataSource> Engine<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn format_mode(&self) -> FormatMode {
        self.source.format_mode()
    }

    /// The whole container as a JSON tree.
    pub fn metadata(&self) -> Result<JsonValue> {
        describe(&self.source.root()?, self.source.format_mode())
    }

    /// Fail unless `index` addresses an element of the named root dimension.
    pub fn validate_dimension_index(&self, name: &str, index: usize) -> Result<()> {
        let root = self.source.root()?;
        check_dimension_index(&root, name, index)
    }

    /// Data of `variable` with its leading dimensions fixed by `prefix`.
    pub fn data(&self, variable: &str, prefix: &[usize]) -> Result<JsonValue> {
        let root = self.source.root()?;
        let var = find_variable(&root, variable)?;
        slice(&var.name, &var.dimensions, prefix, |offsets, counts| {
            self.source.read(var, offsets, counts)
        })
    }

    /// The time, x and y axes plus the concentration slab at
    /// `[time_index, z_index]`.
    pub fn image_inputs(&self, time_index: usize, z_index: usize) -> Result<ImageInputs> {
        let root = self.source.root()?;
        check_dimension_index(&root, TIME_VAR, time_index)?;
        check_dimension_index(&root, Z_DIM, z_index)?;

        let time = self.read_all(&root, TIME_VAR)?;
        let x = self.read_all(&root, X_VAR)?;
        let y = self.read_all(&root, Y_VAR)?;

        let var = find_variable(&root, CONCENTRATION_VAR)?;
        if var.dimensions.len() != 4 {
            return Err(NcJsonError::invalid_argument(format!(
                "Variable '{}' has {} dimensions, expected 4",
                CONCENTRATION_VAR,
                var.dimensions.len()
            )));
        }
        let prefix = [time_index, z_index];
        check_prefix(&var.name, &var.dimensions, &prefix)?;
        let (offsets, counts) = hyperslab(&var.dimensions, &prefix);
        let values = to_f64(&self.source.read(var, &offsets, &counts)?)?;
        let shape = (var.dimensions[2].size, var.dimensions[3].size);
        let concentration = Array2::from_shape_vec(shape, values)
            .map_err(|e| NcJsonError::Internal(format!("concentration slab has the wrong shape: {}", e)))?;

        Ok(ImageInputs {
            time,
            x,
            y,
            concentration,
        })
    }

    fn read_all(&self, root: &Group, name: &str) -> Result<Vec<f64>> {
        let var = find_variable(root, name)?;
        let (offsets, counts) = hyperslab(&var.dimensions, &[]);
        to_f64(&self.source.read(var, &offsets, &counts)?)
    }
}

fn find_variable<'a>(root: &'a Group, name: &str) -> Result<&'a Variable> {
    root.variable(name)
        .ok_or_else(|| NcJsonError::not_found("Variable", name))
}

fn check_dimension_index(root: &Group, name: &str, index: usize) -> Result<()> {
    let dim = root
        .dimension(name)
        .ok_or_else(|| NcJsonError::not_found("Dimension", name))?;
    validate_index(dim, index)
}

fn to_f64(buffer: &TypedBuffer) -> Result<Vec<f64>> {
    buffer
        .iter()
        .map(|v| {
            v?.as_f64().ok_or_else(|| NcJsonError::UnsupportedType {
                tag: buffer.tag().to_string(),
            })
        })
        .collect()
}
