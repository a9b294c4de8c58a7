//! packfs: files packaged into a program, served as if still on disk.
//!
//! Files are addressed by [`Reference`]s of the form `namespace:/path`. A
//! program reads them through the [`Reader`] trait from one of three
//! backends:
//!
//! - [`DiskStore`] while developing, straight from the source directory;
//! - [`MemStore`] while packaging, where [`pack`] collects the files and
//!   encodes them into an [`EncodedBlob`];
//! - [`CompiledStore`] in the shipped program, decoded from that blob
//!   (usually through [`Embedded`]).
//!
//! [`HttpDir`] serves any of them over HTTP exactly like a static file
//! server serves a directory.
//!
//! # Example
//!
//! ```rust
//! use packfs::{pack, read_file, CompiledStore, Namespace, Reference};
//!
//! let dir = tempfile::tempdir()?;
//! std::fs::write(dir.path().join("hello.txt"), "hello")?;
//!
//! let ns = Namespace::new("example.com/app", dir.path())?;
//! let blob = pack(ns, [(dir.path().join("hello.txt"), Reference::parse("/public/hello.txt")?)])?;
//!
//! let store = CompiledStore::from_blob(&blob)?;
//! assert_eq!(read_file(&store, &Reference::parse("/public/hello.txt")?)?, b"hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod embedded;
mod fs;
mod pack;

pub use embedded::Embedded;
pub use fs::{read_file, remove_all, write_file};
pub use pack::{capture, pack};

pub use packfs_codec::{EncodedBlob, TreeCodec};
pub use packfs_core::{
    reference, Bytes, Entry, Error, ErrorKind, File, FileInfo, FileMode, FileWriter, Namespace,
    Reader, Reference, Store, Tree, Visitor, WalkStep, Writer,
};
pub use packfs_http::{HttpDir, HttpServer};
pub use packfs_stores::{Backend, CompiledStore, DiskStore, MemStore};
