//! Read-only NetCDF file access through libnetcdf
//!
//! The high-level `netcdf` crate folds `char` and `string` attributes into one
//! value type and does not expose the file format, so this module talks to the
//! C library directly through `netcdf-sys`. Every buffer is copied into owned
//! Rust memory before the library's own allocations are released.
//!
//! A [`NetcdfFile`] is neither `Send` nor `Sync`: a libnetcdf handle must stay
//! on the thread that opened it.

use crate::attributes::{Attribute, AttributePayload};
use crate::container::{DataSource, Dimension, Group, TypedBuffer, Variable};
use crate::errors::{NcJsonError, Result};
use crate::types::{FormatMode, TypeTag};
use netcdf_sys as nc;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::{debug, warn};

/// `NC_MAX_NAME` plus the terminating NUL
const NAME_LEN: usize = 256 + 1;

/// First type id handed out to user-defined types (`NC_FIRSTUSERTYPEID`)
const FIRST_USER_TYPE_ID: c_int = 32;

/// Run one libnetcdf call while holding the library-wide lock.
///
/// libnetcdf and HDF5 are not thread-safe even across separate handles, so
/// every call goes through here. The lock is the reentrant one the `netcdf`
/// crate also takes. Only the C call and its status lookup are serialized;
/// copying and decoding happen after the lock is released.
fn checked_with_lock<F: FnOnce() -> c_int>(call: F) -> Result<()> {
    let _guard = nc::libnetcdf_lock.lock();
    check(call())
}

/// Turn a libnetcdf status code into a result.
fn check(status: c_int) -> Result<()> {
    if status == nc::NC_NOERR {
        return Ok(());
    }
    // SAFETY: nc_strerror returns a pointer to a static, NUL-terminated string.
    let message = unsafe { CStr::from_ptr(nc::nc_strerror(status)) }
        .to_string_lossy()
        .into_owned();
    Err(NcJsonError::NetCDF { status, message })
}

fn name_from_buffer(buf: &[c_char; NAME_LEN]) -> String {
    // SAFETY: libnetcdf writes a NUL-terminated name of at most NC_MAX_NAME bytes.
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| NcJsonError::invalid_argument(format!("Invalid name '{}'", name)))
}

/// Pointer array filled by `nc_get_att` or `nc_get_vara` for `NC_STRING` values, released
/// with `nc_free_string` when dropped.
struct StringArray {
    ptrs: Vec<*mut c_char>,
    filled: bool,
}

impl StringArray {
    fn new(len: usize) -> Self {
        Self {
            ptrs: vec![ptr::null_mut(); len],
            filled: false,
        }
    }

    fn copy_out(&self) -> Vec<Option<Vec<u8>>> {
        self.ptrs
            .iter()
            .map(|&p| {
                if p.is_null() {
                    None
                } else {
                    // SAFETY: non-null entries point at NUL-terminated strings
                    // allocated by libnetcdf and still owned by this array.
                    Some(unsafe { CStr::from_ptr(p) }.to_bytes().to_vec())
                }
            })
            .collect()
    }
}

impl Drop for StringArray {
    fn drop(&mut self) {
        if self.filled {
            let len = self.ptrs.len();
            let ptrs = self.ptrs.as_mut_ptr();
            // SAFETY: the pointers were filled by libnetcdf and are freed once.
            if let Err(e) = checked_with_lock(|| unsafe { nc::nc_free_string(len, ptrs) }) {
                warn!(error = %e, "nc_free_string failed");
            }
        }
    }
}

/// An open, read-only NetCDF file
#[derive(Debug)]
pub struct NetcdfFile {
    ncid: c_int,
    path: PathBuf,
    mode: FormatMode,
    _not_send: PhantomData<*const ()>,
}

impl NetcdfFile {
    /// Open `path` with `NC_NOWRITE` and detect its format.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let c_path = path
            .to_str()
            .ok_or_else(|| NcJsonError::invalid_argument(format!("Path {} is not valid UTF-8", path.display())))
            .and_then(c_name)?;

        let mut ncid: c_int = 0;
        // SAFETY: c_path is NUL-terminated and ncid is a valid out pointer.
        checked_with_lock(|| unsafe { nc::nc_open(c_path.as_ptr(), nc::NC_NOWRITE, &mut ncid) }).map_err(|e| match e {
            NcJsonError::NetCDF { status, message } => NcJsonError::NetCDF {
                status,
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })?;

        let mut file = Self {
            ncid,
            path: path.to_path_buf(),
            mode: FormatMode::Classic,
            _not_send: PhantomData,
        };

        let mut format: c_int = 0;
        // SAFETY: ncid is open; format is a valid out pointer.
        checked_with_lock(|| unsafe { nc::nc_inq_format(ncid, &mut format) })?;
        file.mode = FormatMode::from_format_code(format);

        debug!(path = %path.display(), mode = ?file.mode, "Opened NetCDF file");
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_group(&self, grpid: c_int, name: String, inherited_unlimited: &[c_int]) -> Result<Group> {
        let mut unlimited = inherited_unlimited.to_vec();
        unlimited.extend(self.unlimited_ids(grpid)?);

        let mut group = Group::new(name);

        for dimid in self.dimension_ids(grpid)? {
            group.dimensions.push(self.read_dimension(grpid, dimid, &unlimited)?);
        }

        let mut nvars: c_int = 0;
        // SAFETY: a null id array asks only for the count.
        checked_with_lock(|| unsafe { nc::nc_inq_varids(grpid, &mut nvars, ptr::null_mut()) })?;
        let mut varids = vec![0 as c_int; nvars as usize];
        if nvars > 0 {
            // SAFETY: varids has room for nvars entries.
            checked_with_lock(|| unsafe { nc::nc_inq_varids(grpid, &mut nvars, varids.as_mut_ptr()) })?;
        }
        varids.sort_unstable();
        for varid in varids {
            group.variables.push(self.read_variable(grpid, varid, &unlimited)?);
        }

        let mut natts: c_int = 0;
        // SAFETY: natts is a valid out pointer.
        checked_with_lock(|| unsafe { nc::nc_inq_natts(grpid, &mut natts) })?;
        for attnum in 0..natts {
            group.attributes.push(self.read_attribute(grpid, nc::NC_GLOBAL, attnum)?);
        }

        for (child, child_name) in self.child_groups(grpid)? {
            group.groups.push(self.read_group(child, child_name, &unlimited)?);
        }

        Ok(group)
    }

    fn dimension_ids(&self, grpid: c_int) -> Result<Vec<c_int>> {
        let mut ndims: c_int = 0;
        // SAFETY: a null id array asks only for the count.
        checked_with_lock(|| unsafe { nc::nc_inq_dimids(grpid, &mut ndims, ptr::null_mut(), 0) })?;
        let mut ids = vec![0 as c_int; ndims as usize];
        if ndims > 0 {
            // SAFETY: ids has room for ndims entries.
            checked_with_lock(|| unsafe { nc::nc_inq_dimids(grpid, &mut ndims, ids.as_mut_ptr(), 0) })?;
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn unlimited_ids(&self, grpid: c_int) -> Result<Vec<c_int>> {
        let mut count: c_int = 0;
        // SAFETY: a null id array asks only for the count.
        checked_with_lock(|| unsafe { nc::nc_inq_unlimdims(grpid, &mut count, ptr::null_mut()) })?;
        let mut ids = vec![0 as c_int; count as usize];
        if count > 0 {
            // SAFETY: ids has room for count entries.
            checked_with_lock(|| unsafe { nc::nc_inq_unlimdims(grpid, &mut count, ids.as_mut_ptr()) })?;
        }
        Ok(ids)
    }

    fn child_groups(&self, grpid: c_int) -> Result<Vec<(c_int, String)>> {
        let mut count: c_int = 0;
        // SAFETY: a null id array asks only for the count.
        checked_with_lock(|| unsafe { nc::nc_inq_grps(grpid, &mut count, ptr::null_mut()) })?;
        let mut ids = vec![0 as c_int; count as usize];
        if count > 0 {
            // SAFETY: ids has room for count entries.
            checked_with_lock(|| unsafe { nc::nc_inq_grps(grpid, &mut count, ids.as_mut_ptr()) })?;
        }
        ids.into_iter()
            .map(|id| {
                let mut buf = [0 as c_char; NAME_LEN];
                // SAFETY: buf holds NC_MAX_NAME + 1 bytes.
                checked_with_lock(|| unsafe { nc::nc_inq_grpname(id, buf.as_mut_ptr()) })?;
                Ok((id, name_from_buffer(&buf)))
            })
            .collect()
    }

    /// Dimensions are looked up from `grpid` so parent-group dimensions resolve too.
    fn read_dimension(&self, grpid: c_int, dimid: c_int, unlimited: &[c_int]) -> Result<Dimension> {
        let mut buf = [0 as c_char; NAME_LEN];
        let mut len: usize = 0;
        // SAFETY: buf holds NC_MAX_NAME + 1 bytes; len is a valid out pointer.
        checked_with_lock(|| unsafe { nc::nc_inq_dim(grpid, dimid, buf.as_mut_ptr(), &mut len) })?;
        Ok(Dimension {
            name: name_from_buffer(&buf),
            size: len,
            is_unlimited: unlimited.contains(&dimid),
        })
    }

    fn read_variable(&self, grpid: c_int, varid: c_int, unlimited: &[c_int]) -> Result<Variable> {
        let mut buf = [0 as c_char; NAME_LEN];
        let mut xtype: nc::nc_type = 0;
        let mut ndims: c_int = 0;
        let mut natts: c_int = 0;
        // SAFETY: null dimids asks only for the rank.
        checked_with_lock(|| unsafe {
            nc::nc_inq_var(
                grpid,
                varid,
                buf.as_mut_ptr(),
                &mut xtype,
                &mut ndims,
                ptr::null_mut(),
                &mut natts,
            )
        })?;

        let mut dimids = vec![0 as c_int; ndims as usize];
        if ndims > 0 {
            // SAFETY: dimids has room for ndims entries.
            checked_with_lock(|| unsafe {
                nc::nc_inq_vardimid(grpid, varid, dimids.as_mut_ptr())
            })?;
        }

        let dimensions = dimids
            .iter()
            .map(|&id| self.read_dimension(grpid, id, unlimited))
            .collect::<Result<Vec<_>>>()?;
        let attributes = (0..natts)
            .map(|attnum| self.read_attribute(grpid, varid, attnum))
            .collect::<Result<Vec<_>>>()?;

        Ok(Variable {
            name: name_from_buffer(&buf),
            tag: self.classify(grpid, xtype)?,
            dimensions,
            attributes,
        })
    }

    fn read_attribute(&self, grpid: c_int, varid: c_int, attnum: c_int) -> Result<Attribute> {
        let mut buf = [0 as c_char; NAME_LEN];
        // SAFETY: buf holds NC_MAX_NAME + 1 bytes.
        checked_with_lock(|| unsafe { nc::nc_inq_attname(grpid, varid, attnum, buf.as_mut_ptr()) })?;
        let name = name_from_buffer(&buf);

        let mut xtype: nc::nc_type = 0;
        let mut len: usize = 0;
        // SAFETY: buf is the NUL-terminated name just returned.
        checked_with_lock(|| unsafe { nc::nc_inq_att(grpid, varid, buf.as_ptr(), &mut xtype, &mut len) })?;
        let tag = self.classify(grpid, xtype)?;

        let payload = if len == 0 {
            AttributePayload::Absent
        } else {
            match tag {
                TypeTag::String => {
                    let mut strings = StringArray::new(len);
                    // SAFETY: the array has room for len string pointers.
                    checked_with_lock(|| unsafe {
                        nc::nc_get_att(grpid, varid, buf.as_ptr(), strings.ptrs.as_mut_ptr() as *mut c_void)
                    })?;
                    strings.filled = true;
                    AttributePayload::Strings(strings.copy_out())
                }
                TypeTag::Vlen | TypeTag::Opaque | TypeTag::Enum | TypeTag::Compound => AttributePayload::Opaque,
                fixed => {
                    let width = fixed.width().unwrap_or(1);
                    let mut bytes = vec![0u8; len * width];
                    // SAFETY: bytes holds len elements of the attribute's native width.
                    checked_with_lock(|| unsafe {
                        nc::nc_get_att(grpid, varid, buf.as_ptr(), bytes.as_mut_ptr() as *mut c_void)
                    })?;
                    AttributePayload::Fixed(bytes)
                }
            }
        };

        Ok(Attribute::new(name, tag, len, payload))
    }

    /// Map an `nc_type` to a tag, resolving user-defined types to their class.
    fn classify(&self, grpid: c_int, xtype: nc::nc_type) -> Result<TypeTag> {
        if (1..=12).contains(&xtype) {
            return TypeTag::from_code(xtype);
        }
        if xtype < FIRST_USER_TYPE_ID {
            return Err(NcJsonError::UnexpectedType { code: xtype });
        }
        let mut class: c_int = 0;
        // SAFETY: null outputs are skipped by libnetcdf; class is a valid out pointer.
        checked_with_lock(|| unsafe {
            nc::nc_inq_user_type(
                grpid,
                xtype,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut class,
            )
        })?;
        match TypeTag::from_code(class)? {
            tag @ (TypeTag::Vlen | TypeTag::Opaque | TypeTag::Enum | TypeTag::Compound) => Ok(tag),
            _ => Err(NcJsonError::UnexpectedType { code: class }),
        }
    }

    /// Read a hyperslab into `out`.
    ///
    /// # Safety
    ///
    /// `out` must have room for `counts.iter().product()` elements of the
    /// variable's in-memory type, and `offsets`/`counts` must match its rank.
    unsafe fn get_vara(&self, varid: c_int, offsets: &[usize], counts: &[usize], out: *mut c_void) -> Result<()> {
        checked_with_lock(|| unsafe {
            nc::nc_get_vara(self.ncid, varid, offsets.as_ptr(), counts.as_ptr(), out)
        })
    }
}

impl DataSource for NetcdfFile {
    fn format_mode(&self) -> FormatMode {
        self.mode
    }

    fn root(&self) -> Result<Group> {
        self.read_group(self.ncid, "/".to_string(), &[])
    }

    fn read(&self, variable: &Variable, offsets: &[usize], counts: &[usize]) -> Result<TypedBuffer> {
        if offsets.len() != variable.dimensions.len() || counts.len() != offsets.len() {
            return Err(NcJsonError::Internal(format!(
                "hyperslab rank {} does not match variable rank {}",
                offsets.len(),
                variable.dimensions.len()
            )));
        }

        let name = c_name(&variable.name)?;
        let mut varid: c_int = 0;
        // SAFETY: name is NUL-terminated; varid is a valid out pointer.
        checked_with_lock(|| unsafe { nc::nc_inq_varid(self.ncid, name.as_ptr(), &mut varid) })
            .map_err(|_| NcJsonError::not_found("Variable", variable.name.as_str()))?;

        let total: usize = counts.iter().product();
        match variable.tag {
            TypeTag::Vlen | TypeTag::Opaque | TypeTag::Enum | TypeTag::Compound => {
                TypedBuffer::placeholder(variable.tag, total)
            }
            TypeTag::String => {
                let mut strings = StringArray::new(total);
                if total > 0 {
                    // SAFETY: the array has room for `total` string pointers.
                    unsafe { self.get_vara(varid, offsets, counts, strings.ptrs.as_mut_ptr() as *mut c_void)? };
                    strings.filled = true;
                }
                Ok(TypedBuffer::strings(strings.copy_out(), self.mode))
            }
            TypeTag::Char => {
                let mut bytes = vec![0u8; total];
                if total > 0 {
                    // SAFETY: bytes holds `total` one-byte elements.
                    unsafe { self.get_vara(varid, offsets, counts, bytes.as_mut_ptr() as *mut c_void)? };
                }
                Ok(TypedBuffer::chars(bytes, self.mode))
            }
            numeric => {
                let width = numeric.width().ok_or_else(|| NcJsonError::UnsupportedType {
                    tag: numeric.to_string(),
                })?;
                let mut bytes = vec![0u8; total * width];
                if total > 0 {
                    // SAFETY: bytes holds `total` elements of the native width.
                    unsafe { self.get_vara(varid, offsets, counts, bytes.as_mut_ptr() as *mut c_void)? };
                }
                TypedBuffer::new(numeric, bytes)
            }
        }
    }
}

impl Drop for NetcdfFile {
    fn drop(&mut self) {
        let ncid = self.ncid;
        // SAFETY: ncid was opened by this value and is closed exactly once.
        match checked_with_lock(|| unsafe { nc::nc_close(ncid) }) {
            Ok(()) => debug!(path = %self.path.display(), "Closed NetCDF file"),
            Err(e) => warn!(error = %e, path = %self.path.display(), "nc_close failed"),
        }
    }
}
