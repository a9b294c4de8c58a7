//! Passthrough to a directory on the local filesystem.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use packfs_core::{
    Error, File, FileInfo, FileMode, FileWriter, Namespace, Reader, Reference, Visitor, WalkStep,
    Writer,
};

/// Serves a namespace straight from its `root_dir`.
///
/// Every read sees the live filesystem. Leaves are written to a temporary
/// sibling and renamed into place, so readers observe either the old or the
/// new content, never a mix.
#[derive(Clone, Debug)]
pub struct DiskStore {
    namespace: Namespace,
    root: PathBuf,
}

impl DiskStore {
    /// Serve `namespace.root_dir()`, which must be an existing directory.
    pub fn new(namespace: Namespace) -> Result<Self, Error> {
        let root = Reference::root();
        let attr = fs::metadata(namespace.root_dir()).map_err(|e| Error::from_io(&root, e))?;
        if !attr.is_dir() {
            return Err(Error::NotADirectory { reference: root });
        }
        let canonical = namespace
            .root_dir()
            .canonicalize()
            .map_err(|e| Error::from_io(&root, e))?;
        log::debug!("Serving {} from {}", namespace.id(), canonical.display());
        Ok(Self {
            namespace,
            root: canonical,
        })
    }

    /// The canonicalized directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native_path(&self, resolved: &Reference) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(resolved.components());
        path
    }

    /// Reference for a native path found under the root during a walk.
    ///
    /// `None` when a component is not valid UTF-8; such entries cannot be
    /// addressed and are left out.
    fn reference_for(&self, native: &Path) -> Result<Option<Reference>, Error> {
        let rel = native.strip_prefix(&self.root).unwrap_or(native);
        let mut reference = Reference::root().with_namespace(Some(self.namespace.id()));
        for part in rel.components() {
            let Some(name) = part.as_os_str().to_str() else {
                log::warn!("Skipping non-UTF-8 path {}", native.display());
                return Ok(None);
            };
            reference = reference.join(name)?;
        }
        Ok(Some(reference))
    }

    fn info(resolved: &Reference, metadata: &fs::Metadata) -> FileInfo {
        FileInfo::from_metadata(resolved.name(), metadata)
    }

    fn children(&self, at: &Reference, dir: &Path) -> Result<Vec<FileInfo>, Error> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::from_io(at, e))? {
            let entry = entry.map_err(|e| Error::from_io(at, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                log::warn!("Skipping non-UTF-8 path {}", entry.path().display());
                continue;
            };
            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                // Removed between listing and stat, or a dangling link.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::from_io(at, e)),
            };
            children.push(FileInfo::from_metadata(name, &metadata));
        }
        children.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    }

    /// The directory that will hold `resolved`, which must already exist.
    fn existing_parent(&self, at: &Reference, resolved: &Reference) -> Result<PathBuf, Error> {
        let Some(parent) = resolved.parent() else {
            return Err(Error::IsADirectory {
                reference: at.clone(),
            });
        };
        let path = self.native_path(&parent);
        match fs::metadata(&path) {
            Ok(attr) if attr.is_dir() => Ok(path),
            Ok(_) => Err(Error::NotADirectory { reference: parent }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ParentMissing {
                reference: at.clone(),
            }),
            Err(e) => Err(Error::from_io(at, e)),
        }
    }
}

impl Reader for DiskStore {
    fn current(&self) -> &Namespace {
        &self.namespace
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        let resolved = self.namespace.resolve(at)?;
        let metadata = fs::metadata(self.native_path(&resolved)).map_err(|e| Error::from_io(at, e))?;
        Ok(Self::info(&resolved, &metadata))
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        let resolved = self.namespace.resolve(at)?;
        let path = self.native_path(&resolved);
        let metadata = fs::metadata(&path).map_err(|e| Error::from_io(at, e))?;
        let info = Self::info(&resolved, &metadata);
        if metadata.is_dir() {
            let children = self.children(at, &path)?;
            return Ok(File::directory(at.clone(), info, children));
        }
        let file = fs::File::open(&path).map_err(|e| Error::from_io(at, e))?;
        Ok(File::from_disk(at.clone(), info, file))
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        let resolved = self.namespace.resolve(root)?;
        let start = self.native_path(&resolved);
        fs::metadata(&start).map_err(|e| Error::from_io(root, e))?;

        let mut entries = WalkDir::new(&start)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let at = match e.path() {
                        Some(path) => self.reference_for(path)?.unwrap_or_else(|| resolved.clone()),
                        None => resolved.clone(),
                    };
                    let source = io::Error::from(e);
                    if source.kind() == io::ErrorKind::NotFound {
                        // Vanished mid-walk.
                        continue;
                    }
                    return Err(Error::from_io(&at, source));
                }
            };
            let Some(reference) = self.reference_for(entry.path())? else {
                if entry.file_type().is_dir() {
                    entries.skip_current_dir();
                }
                continue;
            };
            let metadata = entry
                .metadata()
                .map_err(|e| Error::from_io(&reference, io::Error::from(e)))?;
            let info = Self::info(&reference, &metadata);
            match visit(&reference, &info)? {
                WalkStep::Continue => {}
                WalkStep::SkipDir => {
                    if metadata.is_dir() {
                        entries.skip_current_dir();
                    }
                }
                WalkStep::Stop => break,
            }
        }
        Ok(())
    }
}

impl Writer for DiskStore {
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error> {
        let resolved = self.namespace.resolve(at)?;
        let mut current = Reference::root().with_namespace(Some(self.namespace.id()));
        for component in resolved.components() {
            current = current.join(component)?;
            let path = self.native_path(&current);
            match fs::metadata(&path) {
                Ok(attr) if attr.is_dir() => continue,
                Ok(_) => return Err(Error::NotADirectory { reference: current }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::from_io(&current, e)),
            }
            match create_dir(&path, mode.perm()) {
                Ok(()) => log::debug!("Created directory {}", path.display()),
                // Lost a race with another creator.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
                Err(e) => return Err(Error::from_io(&current, e)),
            }
        }
        Ok(())
    }

    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error> {
        let resolved = self.namespace.resolve(at)?;
        let parent = self.existing_parent(at, &resolved)?;
        let path = self.native_path(&resolved);
        if path.is_dir() {
            return Err(Error::IsADirectory {
                reference: at.clone(),
            });
        }

        log::debug!("Writing {} ({} bytes)", path.display(), content.len());
        let io_err = |e| Error::from_io(at, e);
        let mut tmp = NamedTempFile::new_in(&parent).map_err(io_err)?;
        tmp.write_all(&content).map_err(io_err)?;
        set_permissions(tmp.path(), info.mode().perm()).map_err(io_err)?;
        tmp.as_file()
            .set_modified(SystemTime::from(info.mod_time()))
            .map_err(io_err)?;
        tmp.persist(&path).map_err(|e| Error::from_io(at, e.error))?;
        Ok(())
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        let resolved = self.namespace.resolve(at)?;
        Ok(FileWriter::new(self, resolved))
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        let resolved = self.namespace.resolve(at)?;
        if resolved.is_root() {
            return Err(Error::PermissionDenied {
                reference: at.clone(),
            });
        }
        let path = self.native_path(&resolved);
        let attr = fs::symlink_metadata(&path).map_err(|e| Error::from_io(at, e))?;
        log::debug!("Removing {}", path.display());
        let removed = if attr.is_dir() {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| Error::from_io(at, e))
    }
}

#[cfg(unix)]
fn create_dir(path: &Path, perm: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().mode(perm).create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path, _perm: u32) -> io::Result<()> {
    fs::create_dir(path)
}

#[cfg(unix)]
fn set_permissions(path: &Path, perm: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(perm))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _perm: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use packfs_core::{reference, ErrorKind};
    use std::io::Read;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskStore) {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::new("app", dir.path()).unwrap();
        let store = DiskStore::new(ns).unwrap();
        (dir, store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 7, 7, 7, 7, 7).unwrap()
    }

    fn add(store: &DiskStore, path: &str, body: &'static [u8]) {
        store
            .add(
                &Reference::parse(path).unwrap(),
                FileInfo::new("", 0, FileMode::file(0o640), t0()),
                Bytes::from_static(body),
            )
            .unwrap();
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();

        let err = DiskStore::new(Namespace::new("app", &file).unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        let err = DiskStore::new(Namespace::new("app", dir.path().join("nope")).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn root_is_named_slash() {
        let (_dir, store) = setup();
        let info = store.stat(&reference!("/")).unwrap();
        assert_eq!(info.name(), "/");
        assert!(info.is_dir());
    }

    #[test]
    fn add_writes_through_with_metadata() {
        let (dir, store) = setup();
        store.mkdir_all(&reference!("/a/b"), FileMode::dir(0o755)).unwrap();
        add(&store, "/a/b/f.txt", b"hello");

        let native = dir.path().join("a/b/f.txt");
        assert_eq!(fs::read(&native).unwrap(), b"hello");

        let info = store.stat(&reference!("/a/b/f.txt")).unwrap();
        assert_eq!(info.name(), "f.txt");
        assert_eq!(info.size(), 5);
        assert_eq!(info.mod_time(), t0());
        #[cfg(unix)]
        assert_eq!(info.mode().perm(), 0o640);
        assert!(!info.is_dir());
    }

    #[test]
    fn add_replaces_atomically_and_leaves_no_temp_files() {
        let (dir, store) = setup();
        add(&store, "/f", b"first");
        add(&store, "/f", b"second");
        assert_eq!(fs::read(dir.path().join("f")).unwrap(), b"second");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["f"]);
    }

    #[test]
    fn add_error_mapping() {
        let (_dir, store) = setup();
        let info = FileInfo::new("f", 0, FileMode::file(0o644), t0());
        let err = store
            .add(&reference!("/missing/f"), info.clone(), Bytes::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParentMissing);

        store.mkdir_all(&reference!("/d"), FileMode::dir(0o755)).unwrap();
        let err = store.add(&reference!("/d"), info.clone(), Bytes::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IsADirectory);

        add(&store, "/leaf", b"x");
        let err = store
            .add(&reference!("/leaf/f"), info, Bytes::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }

    #[test]
    fn mkdir_all_is_idempotent_and_respects_leaves() {
        let (dir, store) = setup();
        store.mkdir_all(&reference!("/x/y"), FileMode::dir(0o755)).unwrap();
        store.mkdir_all(&reference!("/x/y"), FileMode::dir(0o755)).unwrap();
        assert!(dir.path().join("x/y").is_dir());

        add(&store, "/x/leaf", b"1");
        let err = store
            .mkdir_all(&reference!("/x/leaf/z"), FileMode::dir(0o755))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }

    #[test]
    fn open_reads_live_state() {
        let (dir, store) = setup();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/b"), b"bb").unwrap();
        fs::write(dir.path().join("d/a"), b"a").unwrap();

        let d = store.open(&reference!("/d")).unwrap();
        let names: Vec<&str> = d.read_dir().unwrap().iter().map(FileInfo::name).collect();
        assert_eq!(names, ["a", "b"]);

        fs::write(dir.path().join("d/a"), b"changed").unwrap();
        let mut f = store.open(&reference!("/d/a")).unwrap();
        let mut body = String::new();
        f.read_to_string(&mut body).unwrap();
        assert_eq!(body, "changed");
        assert_eq!(f.stat().size(), 7);
    }

    #[test]
    fn remove_rules() {
        let (dir, store) = setup();
        store.mkdir_all(&reference!("/d"), FileMode::dir(0o755)).unwrap();
        add(&store, "/d/f", b"x");

        assert_eq!(
            store.remove(&reference!("/d")).unwrap_err().kind(),
            ErrorKind::DirectoryNotEmpty
        );
        store.remove(&reference!("/d/f")).unwrap();
        store.remove(&reference!("/d")).unwrap();
        assert!(!dir.path().join("d").exists());
        for _ in 0..2 {
            assert_eq!(
                store.remove(&reference!("/d")).unwrap_err().kind(),
                ErrorKind::NotFound
            );
        }
        assert_eq!(
            store.remove(&reference!("/")).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn walk_order_matches_tree_order() {
        let (_dir, store) = setup();
        store.mkdir_all(&reference!("/a/b"), FileMode::dir(0o755)).unwrap();
        add(&store, "/a.txt", b"1");
        add(&store, "/a/z", b"2");

        let mut seen = Vec::new();
        store
            .walk(&reference!("/"), &mut |r, _| {
                seen.push(r.path().to_string());
                Ok(WalkStep::Continue)
            })
            .unwrap();
        assert_eq!(seen, ["/", "/a", "/a/b", "/a/z", "/a.txt"]);

        let mut seen = Vec::new();
        store
            .walk(&reference!("/"), &mut |r, _| {
                seen.push(r.path().to_string());
                Ok(if r.path() == "/a" {
                    WalkStep::SkipDir
                } else {
                    WalkStep::Continue
                })
            })
            .unwrap();
        assert_eq!(seen, ["/", "/a", "/a.txt"]);
    }

    #[test]
    fn walk_references_carry_the_namespace() {
        let (_dir, store) = setup();
        add(&store, "/f", b"1");
        let mut seen = Vec::new();
        store
            .walk(&reference!("/"), &mut |r, _| {
                seen.push(r.to_string());
                Ok(WalkStep::Continue)
            })
            .unwrap();
        assert_eq!(seen, ["app:/", "app:/f"]);
    }

    #[test]
    fn foreign_namespace_is_not_found() {
        let (_dir, store) = setup();
        add(&store, "/f", b"1");
        assert_eq!(
            store.stat(&reference!("elsewhere:/f")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    fn walked(store: &DiskStore) -> Vec<Reference> {
        let mut seen = Vec::new();
        store
            .walk(&reference!("/"), &mut |r, _| {
                seen.push(r.clone());
                Ok(WalkStep::Continue)
            })
            .unwrap();
        seen
    }

    #[test]
    fn walk_keeps_whitespace_in_names() {
        let (dir, store) = setup();
        fs::write(dir.path().join("notes "), b"trailing").unwrap();
        fs::create_dir(dir.path().join(" drafts")).unwrap();

        let seen = walked(&store);
        let paths: Vec<&str> = seen.iter().map(Reference::path).collect();
        assert_eq!(paths, ["/", "/ drafts", "/notes "]);
        for r in &seen {
            store.stat(r).unwrap();
        }
        assert_eq!(store.stat(&seen[2]).unwrap().name(), "notes ");

        let mut f = store.open(&seen[2]).unwrap();
        assert_eq!(f.read_all().unwrap(), b"trailing");
        let listing = store.open(&reference!("/")).unwrap();
        let names: Vec<&str> = listing.read_dir().unwrap().iter().map(FileInfo::name).collect();
        assert_eq!(names, [" drafts", "notes "]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, store) = setup();
        let odd = dir.path().join(OsStr::from_bytes(b"bad\xff"));
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("inner"), b"x").unwrap();
        add(&store, "/ok", b"1");

        let paths: Vec<String> = walked(&store).iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, ["/", "/ok"]);

        let listing = store.open(&reference!("/")).unwrap();
        let names: Vec<&str> = listing.read_dir().unwrap().iter().map(FileInfo::name).collect();
        assert_eq!(names, ["ok"]);
    }
}
