//! Centralized error handling for ncjson
//!
//! Every engine operation returns [`Result`]. Errors are split into kinds so the
//! boundary can tell a bad request apart from a file the engine cannot decode.

use thiserror::Error;

/// Main error type for ncjson operations
#[derive(Error, Debug)]
pub enum NcJsonError {
    /// A named variable, dimension or attribute is absent from the container
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// A request asked for something the container cannot satisfy
    #[error("{message}")]
    InvalidArgument { message: String },

    /// A known type tag outside what the decoder handles on this path
    #[error("Unsupported type: {tag}")]
    UnsupportedType { tag: String },

    /// A type code outside the known enumeration entirely
    #[error("unexpected type {code}")]
    UnexpectedType { code: i32 },

    /// A libnetcdf call returned a non-zero status
    #[error("NetCDF error {status}: {message}")]
    NetCDF { status: i32, message: String },

    /// The worker pool could not run a job
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal invariant did not hold
    #[error("{0}")]
    Internal(String),
}

/// How the boundary should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caused by the request; report it back to the caller
    Client,
    /// The file holds data this engine does not decode
    Unsupported,
    /// A defect or environment failure; log it and reject uniformly
    Fatal,
}

impl NcJsonError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        NcJsonError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        NcJsonError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NcJsonError::NotFound { .. } | NcJsonError::InvalidArgument { .. } => ErrorKind::Client,
            NcJsonError::UnsupportedType { .. } => ErrorKind::Unsupported,
            NcJsonError::UnexpectedType { .. }
            | NcJsonError::NetCDF { .. }
            | NcJsonError::Worker(_)
            | NcJsonError::Io(_)
            | NcJsonError::Internal(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::Client
    }
}

/// Result type alias for ncjson operations
pub type Result<T> = std::result::Result<T, NcJsonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NcJsonError::not_found("Variable", "concentration");
        assert_eq!(err.to_string(), "Variable 'concentration' not found");

        let err = NcJsonError::UnexpectedType { code: 99 };
        assert_eq!(err.to_string(), "unexpected type 99");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(NcJsonError::invalid_argument("bad").kind(), ErrorKind::Client);
        assert_eq!(
            NcJsonError::UnsupportedType { tag: "char".into() }.kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(NcJsonError::UnexpectedType { code: 0 }.kind(), ErrorKind::Fatal);
        assert!(!NcJsonError::Worker("gone".into()).is_client_error());
    }
}
