//! packfs backends
//!
//! Three interchangeable implementations of the
//! [`Reader`](packfs_core::Reader)/[`Writer`](packfs_core::Writer)
//! capability traits:
//!
//! - [`MemStore`]: the authoritative in-memory tree, used while packaging.
//! - [`DiskStore`]: live passthrough to a directory, for development.
//! - [`CompiledStore`]: a read-only tree decoded from an embedded blob.
//!
//! [`Backend`] wraps whichever one a program selects at startup.

pub mod backend;
pub mod compiled;
pub mod in_memory;
pub mod local_disk;

pub use backend::Backend;
pub use compiled::CompiledStore;
pub use in_memory::MemStore;
pub use local_disk::DiskStore;

pub use packfs_core::{Error, Namespace, Reference};
