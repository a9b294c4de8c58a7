//! Error taxonomy shared by every backend.
//!
//! Backends translate their native failures into these variants so callers
//! can branch on [`ErrorKind`] without knowing which backend is active.

use std::io;

use crate::Reference;

/// Discriminant of an [`Error`], for matching without destructuring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedReference,
    PathEscapesRoot,
    NotFound,
    IsADirectory,
    NotADirectory,
    ParentMissing,
    DirectoryNotEmpty,
    ReadOnly,
    PermissionDenied,
    CorruptBlob,
    UnsupportedBlobVersion,
    Io,
}

/// Errors produced by references, trees, stores and the blob codec.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed reference {raw:?}: {message}")]
    MalformedReference { raw: String, message: String },

    #[error("path {path:?} escapes the namespace root")]
    PathEscapesRoot { path: String },

    #[error("{reference}: not found")]
    NotFound { reference: Reference },

    #[error("{reference}: is a directory")]
    IsADirectory { reference: Reference },

    #[error("{reference}: not a directory")]
    NotADirectory { reference: Reference },

    #[error("{reference}: parent directory does not exist")]
    ParentMissing { reference: Reference },

    #[error("{reference}: directory not empty")]
    DirectoryNotEmpty { reference: Reference },

    #[error("{reference}: {operation} on a read-only store")]
    ReadOnly {
        operation: &'static str,
        reference: Reference,
    },

    #[error("{reference}: permission denied")]
    PermissionDenied { reference: Reference },

    #[error("corrupt blob: {message}")]
    CorruptBlob { message: String },

    #[error("unsupported blob version {found} (this build reads version {supported})")]
    UnsupportedBlobVersion { found: u32, supported: u32 },

    #[error("{reference}: {source}")]
    Io {
        reference: Reference,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedReference { .. } => ErrorKind::MalformedReference,
            Error::PathEscapesRoot { .. } => ErrorKind::PathEscapesRoot,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::IsADirectory { .. } => ErrorKind::IsADirectory,
            Error::NotADirectory { .. } => ErrorKind::NotADirectory,
            Error::ParentMissing { .. } => ErrorKind::ParentMissing,
            Error::DirectoryNotEmpty { .. } => ErrorKind::DirectoryNotEmpty,
            Error::ReadOnly { .. } => ErrorKind::ReadOnly,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::CorruptBlob { .. } => ErrorKind::CorruptBlob,
            Error::UnsupportedBlobVersion { .. } => ErrorKind::UnsupportedBlobVersion,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn not_found(reference: &Reference) -> Self {
        Error::NotFound {
            reference: reference.clone(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptBlob {
            message: message.into(),
        }
    }

    /// Map a native I/O failure on `reference` onto the shared taxonomy.
    pub fn from_io(reference: &Reference, source: io::Error) -> Self {
        let reference = reference.clone();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound { reference },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { reference },
            io::ErrorKind::IsADirectory => Error::IsADirectory { reference },
            io::ErrorKind::NotADirectory => Error::NotADirectory { reference },
            io::ErrorKind::DirectoryNotEmpty => Error::DirectoryNotEmpty { reference },
            _ => Error::Io { reference, source },
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        let kind = match error.kind() {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::PermissionDenied | ErrorKind::ReadOnly => io::ErrorKind::PermissionDenied,
            ErrorKind::IsADirectory => io::ErrorKind::IsADirectory,
            ErrorKind::NotADirectory => io::ErrorKind::NotADirectory,
            ErrorKind::DirectoryNotEmpty => io::ErrorKind::DirectoryNotEmpty,
            ErrorKind::MalformedReference | ErrorKind::PathEscapesRoot => {
                io::ErrorKind::InvalidInput
            }
            ErrorKind::CorruptBlob | ErrorKind::UnsupportedBlobVersion => {
                io::ErrorKind::InvalidData
            }
            ErrorKind::ParentMissing | ErrorKind::Io => io::ErrorKind::Other,
        };
        match error {
            Error::Io { source, .. } => source,
            other => io::Error::new(kind, other),
        }
    }
}
