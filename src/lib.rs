//! ncjson: read-only JSON access to NetCDF files
//!
//! ncjson exposes the dimensions, variables and attributes of a NetCDF file as
//! JSON, and serves variable data as nested JSON arrays selected by a prefix
//! of fixed indices.
//!
//! ## Key Features
//!
//! - **Typed Attribute Decoding**: every NetCDF attribute type maps onto a JSON value,
//!   with text escaped the way `ncdump` prints it
//! - **N-dimensional Slicing**: fix leading dimensions, get the rest back as nested arrays
//! - **Thread Confinement**: each worker thread owns its own libnetcdf handle
//! - **HTTP Surface**: `axum` routes for metadata, data and image inputs
//!
//! ## Module Organization
//!
//! - [`types`]: type tags, format mode and the decoded value model
//! - [`escape`]: display-safe rendering of character payloads
//! - [`attributes`]: attribute payloads and decoding
//! - [`container`]: the container model and the [`DataSource`] seam
//! - [`metadata`]: container description as a JSON tree
//! - [`slicer`]: index validation and nested array reconstruction
//! - [`netcdf_io`]: libnetcdf-backed data source
//! - [`engine`]: the request-level operations
//! - [`handles`]: per-thread handle cache
//! - [`parallel`]: worker configuration and the worker pool
//! - [`server`]: HTTP routes
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ncjson::prelude::*;
//!
//! let engine = Engine::open("concentration.timeseries.nc").unwrap();
//! let info = engine.metadata().unwrap();
//! println!("{}", info);
//!
//! // concentration[time=1, z=0, :, :]
//! let slab = engine.data("concentration", &[1, 0]).unwrap();
//! println!("{}", slab);
//! ```

pub mod attributes;
pub mod cli;
pub mod container;
pub mod engine;
pub mod errors;
pub mod escape;
pub mod handles;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod server;
pub mod slicer;
pub mod types;

pub use container::DataSource;
pub use errors::{NcJsonError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::attributes::{Attribute, AttributePayload};
    pub use crate::container::{DataSource, Dimension, Group, MemorySource, TypedBuffer, Variable};
    pub use crate::engine::{Engine, ImageInputs};
    pub use crate::errors::{ErrorKind, NcJsonError, Result};
    pub use crate::handles::HandleCache;
    pub use crate::netcdf_io::NetcdfFile;
    pub use crate::parallel::{WorkerConfig, WorkerPool};
    pub use crate::types::{FormatMode, TypeTag, Value};
}
