//! Blob encoding for packfs trees
//!
//! A [`Tree`](packfs_core::Tree) is serialized to a self-describing text
//! blob that can be embedded in a program as a string literal and decoded
//! back at startup:
//!
//! ```text
//! packfs.v1.<crc32 of payload, 8 hex digits>.<base64(gzip(payload))>
//! ```
//!
//! The payload is JSON: the namespace descriptor followed by one record per
//! entry in walk order. Equal trees always encode to identical blobs, no
//! matter the order they were built in.
//!
//! # Example
//!
//! ```rust
//! use packfs_codec::TreeCodec;
//! use packfs_core::{reference, FileMode, Namespace, Tree};
//! use chrono::Utc;
//!
//! let mut tree = Tree::empty(Namespace::new("app", "/src/app").unwrap(), Utc::now());
//! tree.mkdir_all(&reference!("/public"), FileMode::dir(0o755), Utc::now()).unwrap();
//!
//! let codec = TreeCodec::new();
//! let blob = codec.encode(&tree).unwrap();
//! assert!(blob.as_str().starts_with("packfs.v1."));
//! assert_eq!(codec.decode(blob.as_bytes()).unwrap(), tree);
//! ```

mod codec;
mod record;

pub use codec::{EncodedBlob, TreeCodec, BLOB_MAGIC, BLOB_VERSION};

pub use packfs_core::{Error, Tree};
