use std::{io, path::PathBuf};

use thiserror::Error;

use crate::inference::TypeTag;

/// Failures raised while converting a single table.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error on {path:?}: {cause}")]
    Io { path: PathBuf, cause: io::Error },
    #[error("Malformed input in {path:?}: {message}")]
    Format { path: PathBuf, message: String },
    #[error("Malformed CSV in {path:?}: {cause}")]
    Csv { path: PathBuf, cause: csv::Error },
    /// Pass 2 rejected a value that pass 1 accepted for the resolved type.
    #[error(
        "Internal error: value '{value}' in column {column} no longer parses as {tag:?} ({reason})"
    )]
    InternalInvariant {
        column: usize,
        tag: TypeTag,
        value: String,
        reason: String,
    },
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, cause: io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            cause,
        }
    }

    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ConvertError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Reading CSV can fail on the underlying reader as well as on malformed
    /// records; keep the two apart so callers see the right kind.
    pub fn from_csv(path: impl Into<PathBuf>, cause: csv::Error) -> Self {
        let path = path.into();
        if cause.is_io_error() {
            match cause.into_kind() {
                csv::ErrorKind::Io(err) => ConvertError::Io { path, cause: err },
                other => ConvertError::format(path, format!("{other:?}")),
            }
        } else {
            ConvertError::Csv { path, cause }
        }
    }

    /// Only an invariant violation stops the whole run; everything else skips one table.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConvertError::InternalInvariant { .. })
    }

    pub fn is_format(&self) -> bool {
        matches!(self, ConvertError::Format { .. } | ConvertError::Csv { .. })
    }
}

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
