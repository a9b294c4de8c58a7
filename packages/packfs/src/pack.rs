//! Packaging: collecting files into a tree and encoding it.

use std::fs;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use packfs_codec::{EncodedBlob, TreeCodec};
use packfs_core::{
    Error, FileInfo, FileMode, Namespace, Reader, Reference, Tree, WalkStep, Writer,
    DEFAULT_DIR_PERM,
};
use packfs_stores::MemStore;

/// Directories that exist only because something was packed below them
/// carry no meaningful timestamp.
fn unset_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Read each `(source, reference)` pair from the local filesystem into a
/// fresh tree for `namespace` and encode it.
///
/// Sources ending in `.tmp` are skipped. Missing parent directories are
/// created. Leaves and directories keep the permission bits and
/// modification time of their source. The result depends only on the
/// files, not on the order of `files`.
pub fn pack<I, P>(namespace: Namespace, files: I) -> Result<EncodedBlob, Error>
where
    I: IntoIterator<Item = (P, Reference)>,
    P: AsRef<Path>,
{
    let store = MemStore::with_clock(namespace, unset_time);
    let mut count = 0usize;
    for (source, at) in files {
        let source = source.as_ref();
        if source.to_string_lossy().ends_with(".tmp") {
            log::debug!("Skipping temporary file {}", source.display());
            continue;
        }

        let metadata = fs::metadata(source).map_err(|e| Error::from_io(&at, e))?;
        let info = FileInfo::from_metadata(at.name(), &metadata);
        if let Some(parent) = at.parent() {
            store.mkdir_all(&parent, FileMode::dir(DEFAULT_DIR_PERM))?;
        }
        if metadata.is_dir() {
            store.insert_dir(&at, info)?;
        } else {
            let content = fs::read(source).map_err(|e| Error::from_io(&at, e))?;
            store.add(&at, info, Bytes::from(content))?;
        }
        count += 1;
    }
    log::debug!("Packed {} files for {}", count, store.current().id());
    TreeCodec::new().encode(&store.snapshot())
}

/// Copy everything a backend serves into a standalone tree.
pub fn capture(store: &dyn Reader) -> Result<Tree, Error> {
    let root = Reference::root();
    let mut tree = Tree::new(store.current().clone(), store.stat(&root)?);
    store.walk(&root, &mut |at, info| {
        if at.is_root() {
            return Ok(WalkStep::Continue);
        }
        if info.is_dir() {
            tree.insert_dir(at, info.clone())?;
        } else {
            let content = store.open(at)?.read_all()?;
            tree.insert_leaf(at, info.clone(), Bytes::from(content))?;
        }
        Ok(WalkStep::Continue)
    })?;
    Ok(tree)
}
