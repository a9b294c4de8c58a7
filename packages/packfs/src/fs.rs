//! Whole-file conveniences over the capability traits.

use std::io::Write;

use packfs_core::{Error, FileInfo, FileMode, Reader, Reference, Store, WalkStep, Writer};

/// Read a leaf in full.
pub fn read_file(store: &dyn Reader, at: &Reference) -> Result<Vec<u8>, Error> {
    store.open(at)?.read_all()
}

/// Create or replace a leaf with `content`. The parent must exist.
pub fn write_file(
    store: &dyn Writer,
    at: &Reference,
    content: &[u8],
    mode: FileMode,
) -> Result<FileInfo, Error> {
    let mut writer = store.create(at)?.with_mode(mode);
    writer
        .write_all(content)
        .map_err(|e| Error::from_io(at, e))?;
    writer.commit()
}

/// Remove `at` and everything below it, deepest entries first.
///
/// Stops at the first failure; entries removed until then stay removed.
pub fn remove_all(store: &dyn Store, at: &Reference) -> Result<(), Error> {
    let mut doomed = Vec::new();
    store.walk(at, &mut |reference, _| {
        doomed.push(reference.clone());
        Ok(WalkStep::Continue)
    })?;
    log::debug!("Removing {} entries under {}", doomed.len(), at);
    for reference in doomed.iter().rev() {
        store.remove(reference)?;
    }
    Ok(())
}
