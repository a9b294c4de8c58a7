use std::io;

use http::StatusCode;
use packfs_core::{Error as StoreError, ErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Could not listen on {addr}: {message}")]
    Bind { addr: String, message: String },
}

impl Error {
    /// The status a static file server answers with for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Store(e) => match e.kind() {
                ErrorKind::NotFound
                | ErrorKind::NotADirectory
                | ErrorKind::MalformedReference
                | ErrorKind::PathEscapesRoot => StatusCode::NOT_FOUND,
                ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
