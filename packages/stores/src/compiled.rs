//! The read-only backend decoded from an embedded blob.

use std::sync::Arc;

use bytes::Bytes;

use packfs_codec::TreeCodec;
use packfs_core::{
    Error, File, FileInfo, FileMode, FileWriter, Namespace, Reader, Reference, Tree, Visitor,
    Writer,
};

use crate::in_memory::open_in;

/// A tree reconstructed once from an encoded blob and never modified.
///
/// Reads share the tree without locking; every write fails with
/// [`Error::ReadOnly`].
#[derive(Clone, Debug)]
pub struct CompiledStore {
    tree: Arc<Tree>,
}

impl CompiledStore {
    /// Decode `blob` eagerly. A program should refuse to start on error.
    pub fn from_blob(blob: impl AsRef<[u8]>) -> Result<Self, Error> {
        let tree = TreeCodec::new().decode(blob)?;
        log::debug!(
            "Loaded compiled tree for {} ({} entries)",
            tree.namespace().id(),
            tree.len()
        );
        Ok(Self::from_tree(tree))
    }

    pub fn from_tree(tree: Tree) -> Self {
        Self {
            tree: Arc::new(tree),
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn read_only(operation: &'static str, at: &Reference) -> Error {
        Error::ReadOnly {
            operation,
            reference: at.clone(),
        }
    }
}

impl Reader for CompiledStore {
    fn current(&self) -> &Namespace {
        self.tree.namespace()
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        self.tree.stat(at).cloned()
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        open_in(&self.tree, at)
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        self.tree.visit(root, visit)
    }
}

impl Writer for CompiledStore {
    fn mkdir_all(&self, at: &Reference, _mode: FileMode) -> Result<(), Error> {
        Err(Self::read_only("mkdir_all", at))
    }

    fn add(&self, at: &Reference, _info: FileInfo, _content: Bytes) -> Result<(), Error> {
        Err(Self::read_only("add", at))
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        Err(Self::read_only("create", at))
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        Err(Self::read_only("remove", at))
    }
}
