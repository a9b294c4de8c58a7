//! packfs core: references, metadata, trees and the capability interface.
//!
//! This layer defines what every backend shares:
//! - `Reference`: a namespaced, normalized virtual path (`ns:/a/b`)
//! - `FileInfo` / `FileMode`: sealed entry metadata
//! - `Tree` / `Entry`: the authoritative in-memory tree model
//! - `Reader` / `Writer`: the capability interface backends implement
//! - `Error` / `ErrorKind`: the failure taxonomy backends map onto
//!
//! # Example
//!
//! ```rust
//! use packfs_core::{Reader, Reference, Error, FileInfo};
//!
//! fn size_of(store: &dyn Reader, raw: &str) -> Result<u64, Error> {
//!     let info: FileInfo = store.stat(&Reference::parse(raw)?)?;
//!     Ok(info.size())
//! }
//! ```

pub use bytes::Bytes;

mod error;
mod file;
mod info;
mod namespace;
pub mod path;
mod traits;
pub mod tree;

pub use error::{Error, ErrorKind};
pub use file::{File, FileWriter, DEFAULT_FILE_PERM};
pub use info::{FileInfo, FileMode};
pub use namespace::Namespace;
pub use path::Reference;
pub use traits::{Reader, Store, Visitor, WalkStep, Writer};
pub use tree::{Entry, Tree, Walker, DEFAULT_DIR_PERM};
