//! Blobs compiled into the binary, decoded on first use.

use std::sync::OnceLock;

use packfs_core::Error;
use packfs_stores::CompiledStore;

/// A blob compiled into the program, decoded on first use.
///
/// Meant for statics:
///
/// ```rust,ignore
/// static ASSETS: Embedded = Embedded::new(include_str!("assets.packfs"));
///
/// fn main() {
///     let store = ASSETS.store().expect("corrupt asset blob");
///     // ...
/// }
/// ```
///
/// Decoding happens exactly once, even under concurrent first use; every
/// caller sees the same store or the same error.
pub struct Embedded {
    blob: &'static str,
    store: OnceLock<Result<CompiledStore, Error>>,
}

impl Embedded {
    pub const fn new(blob: &'static str) -> Self {
        Self {
            blob,
            store: OnceLock::new(),
        }
    }

    pub fn store(&self) -> Result<&CompiledStore, &Error> {
        self.store
            .get_or_init(|| CompiledStore::from_blob(self.blob.as_bytes()))
            .as_ref()
    }

    /// Whether the blob has been decoded yet.
    pub fn is_loaded(&self) -> bool {
        self.store.get().is_some()
    }
}

impl std::fmt::Debug for Embedded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedded")
            .field("blob_len", &self.blob.len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
