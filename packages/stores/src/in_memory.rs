//! The in-memory tree store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use packfs_core::{
    Error, File, FileInfo, FileMode, FileWriter, Namespace, Reader, Reference, Tree, Visitor,
    Writer,
};

/// Source of timestamps for directories created by `mkdir_all`.
pub type Clock = fn() -> DateTime<Utc>;

/// A mutable tree held in memory.
///
/// Readers take a snapshot of the tree and release the lock immediately;
/// writers copy the tree on write if a snapshot is still alive, so an open
/// handle or a running walk never sees a half-applied change.
///
/// # Example
///
/// ```rust
/// use packfs_core::{reference, FileMode, Namespace, Reader, Writer};
/// use packfs_stores::MemStore;
/// use std::io::Write;
///
/// let store = MemStore::new(Namespace::new("app", "/src/app").unwrap());
/// store.mkdir_all(&reference!("/public"), FileMode::dir(0o755)).unwrap();
///
/// let mut w = store.create(&reference!("/public/index.html")).unwrap();
/// w.write_all(b"<h1>hi</h1>").unwrap();
/// w.commit().unwrap();
///
/// assert_eq!(store.stat(&reference!("/public/index.html")).unwrap().size(), 11);
/// ```
pub struct MemStore {
    namespace: Namespace,
    tree: RwLock<Arc<Tree>>,
    clock: Clock,
}

impl MemStore {
    /// An empty tree whose root is stamped with the current time.
    pub fn new(namespace: Namespace) -> Self {
        Self::with_clock(namespace, Utc::now)
    }

    /// An empty tree that stamps new directories using `clock`.
    pub fn with_clock(namespace: Namespace, clock: Clock) -> Self {
        let tree = Tree::empty(namespace.clone(), clock());
        Self {
            namespace,
            tree: RwLock::new(Arc::new(tree)),
            clock,
        }
    }

    /// Take ownership of an existing tree.
    pub fn from_tree(tree: Tree) -> Self {
        Self {
            namespace: tree.namespace().clone(),
            tree: RwLock::new(Arc::new(tree)),
            clock: Utc::now,
        }
    }

    /// The tree as it is right now. Later writes do not affect it.
    pub fn snapshot(&self) -> Arc<Tree> {
        Arc::clone(&self.tree.read())
    }

    /// Create or restamp a single directory with exactly `info`. The parent
    /// must exist.
    pub fn insert_dir(&self, at: &Reference, info: FileInfo) -> Result<(), Error> {
        self.update(|tree| tree.insert_dir(at, info))
    }

    fn update<T>(&self, op: impl FnOnce(&mut Tree) -> Result<T, Error>) -> Result<T, Error> {
        let mut guard = self.tree.write();
        op(Arc::make_mut(&mut guard))
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("namespace", &self.namespace)
            .field("entries", &self.tree.read().len())
            .finish()
    }
}

/// Open `at` in a tree snapshot.
pub(crate) fn open_in(tree: &Tree, at: &Reference) -> Result<File, Error> {
    let entry = tree.get(at)?;
    match entry.content() {
        Some(content) => Ok(File::from_bytes(
            at.clone(),
            entry.info().clone(),
            content.clone(),
        )),
        None => Ok(File::directory(
            at.clone(),
            entry.info().clone(),
            tree.children(at)?,
        )),
    }
}

impl Reader for MemStore {
    fn current(&self) -> &Namespace {
        &self.namespace
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        self.snapshot().stat(at).cloned()
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        open_in(&self.snapshot(), at)
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        self.snapshot().visit(root, visit)
    }
}

impl Writer for MemStore {
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error> {
        let now = (self.clock)();
        self.update(|tree| tree.mkdir_all(at, mode, now))
    }

    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error> {
        log::debug!("Adding {} ({} bytes)", at, content.len());
        self.update(|tree| tree.insert_leaf(at, info, content))
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        let resolved = self.namespace.resolve(at)?;
        Ok(FileWriter::new(self, resolved))
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        self.update(|tree| tree.remove(at)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use packfs_core::{reference, ErrorKind, WalkStep};
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::thread;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, 2, 2, 2, 2).unwrap()
    }

    fn store() -> MemStore {
        MemStore::with_clock(Namespace::new("app", "/src/app").unwrap(), fixed)
    }

    fn write(store: &MemStore, path: &str, body: &[u8]) {
        let mut w = store.create(&Reference::parse(path).unwrap()).unwrap();
        w.write_all(body).unwrap();
        w.commit().unwrap();
    }

    #[test]
    fn root_is_named_slash() {
        let info = store().stat(&reference!("/")).unwrap();
        assert_eq!(info.name(), "/");
        assert!(info.is_dir());
        assert_eq!(info.mod_time(), fixed());
    }

    #[test]
    fn mkdir_all_is_idempotent() {
        let s = store();
        s.mkdir_all(&reference!("/a/b/c"), FileMode::dir(0o700)).unwrap();
        let before = s.snapshot();
        s.mkdir_all(&reference!("/a/b/c"), FileMode::dir(0o755)).unwrap();
        assert_eq!(*before, *s.snapshot());
        assert_eq!(s.stat(&reference!("/a/b")).unwrap().mode().perm(), 0o700);
    }

    #[test]
    fn insert_dir_keeps_given_metadata() {
        let s = store();
        let t = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        s.insert_dir(&reference!("/d"), FileInfo::dir("whatever", 0o750, t))
            .unwrap();
        let info = s.stat(&reference!("/d")).unwrap();
        assert_eq!(info.name(), "d");
        assert_eq!(info.mod_time(), t);
        assert_eq!(info.mode().perm(), 0o750);
        assert_eq!(
            s.insert_dir(&reference!("/x/y"), FileInfo::dir("y", 0o755, t))
                .unwrap_err()
                .kind(),
            ErrorKind::ParentMissing
        );
    }

    #[test]
    fn mkdir_all_through_leaf_fails() {
        let s = store();
        write(&s, "/f", b"x");
        let err = s.mkdir_all(&reference!("/f/g"), FileMode::dir(0o755)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }

    #[test]
    fn add_requires_parent_and_refuses_directories() {
        let s = store();
        let err = s
            .add(
                &reference!("/missing/f"),
                FileInfo::new("f", 0, FileMode::file(0o644), fixed()),
                Bytes::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParentMissing);

        s.mkdir_all(&reference!("/d"), FileMode::dir(0o755)).unwrap();
        let err = s
            .add(
                &reference!("/d"),
                FileInfo::new("d", 0, FileMode::file(0o644), fixed()),
                Bytes::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IsADirectory);
    }

    #[test]
    fn overwrite_replaces_content() {
        let s = store();
        write(&s, "/f", b"first");
        write(&s, "/f", b"second!");
        let mut f = s.open(&reference!("/f")).unwrap();
        assert_eq!(f.read_all().unwrap(), b"second!");
        assert_eq!(s.stat(&reference!("/f")).unwrap().size(), 7);
    }

    #[test]
    fn open_handles() {
        let s = store();
        s.mkdir_all(&reference!("/d/sub"), FileMode::dir(0o755)).unwrap();
        write(&s, "/d/b.txt", b"bee");
        write(&s, "/d/a.txt", b"hello world");

        let dir = s.open(&reference!("/d")).unwrap();
        let names: Vec<&str> = dir.read_dir().unwrap().iter().map(FileInfo::name).collect();
        assert_eq!(names, ["a.txt", "b.txt", "sub"]);

        let mut f = s.open(&reference!("/d/a.txt")).unwrap();
        f.seek(SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        f.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "world");
    }

    #[test]
    fn open_handle_is_a_snapshot() {
        let s = store();
        write(&s, "/f", b"old");
        let mut f = s.open(&reference!("/f")).unwrap();
        write(&s, "/f", b"new content");
        assert_eq!(f.read_all().unwrap(), b"old");
    }

    #[test]
    fn remove_rules() {
        let s = store();
        s.mkdir_all(&reference!("/d"), FileMode::dir(0o755)).unwrap();
        write(&s, "/d/f", b"x");

        assert_eq!(
            s.remove(&reference!("/d")).unwrap_err().kind(),
            ErrorKind::DirectoryNotEmpty
        );
        s.remove(&reference!("/d/f")).unwrap();
        s.remove(&reference!("/d")).unwrap();
        for _ in 0..2 {
            assert_eq!(
                s.remove(&reference!("/d")).unwrap_err().kind(),
                ErrorKind::NotFound
            );
        }
        assert_eq!(
            s.remove(&reference!("/")).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn foreign_namespace_is_not_found() {
        let s = store();
        write(&s, "/f", b"x");
        assert!(s.stat(&reference!("app:/f")).is_ok());
        assert_eq!(
            s.stat(&reference!("other:/f")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(s.create(&reference!("other:/g")).is_err());
    }

    #[test]
    fn walk_skips_and_stops() {
        let s = store();
        s.mkdir_all(&reference!("/a/deep"), FileMode::dir(0o755)).unwrap();
        write(&s, "/a.txt", b"1");
        write(&s, "/b.txt", b"2");

        let mut seen = Vec::new();
        s.walk(&reference!("/"), &mut |r, info| {
            seen.push(r.path().to_string());
            Ok(match (info.is_dir(), r.path()) {
                (true, "/a") => WalkStep::SkipDir,
                (_, "/a.txt") => WalkStep::Stop,
                _ => WalkStep::Continue,
            })
        })
        .unwrap();
        assert_eq!(seen, ["/", "/a", "/a.txt"]);
    }

    #[test]
    fn walk_ignores_concurrent_writes() {
        let s = store();
        write(&s, "/a", b"1");
        write(&s, "/b", b"2");

        let mut seen = Vec::new();
        s.walk(&reference!("/"), &mut |r, _| {
            seen.push(r.path().to_string());
            if r.path() == "/a" {
                write(&s, "/c", b"3");
                s.remove(&reference!("/b")).unwrap();
            }
            Ok(WalkStep::Continue)
        })
        .unwrap();
        assert_eq!(seen, ["/", "/a", "/b"]);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let s = Arc::new(store());
        s.mkdir_all(&reference!("/d"), FileMode::dir(0o755)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    let r = Reference::parse(&format!("/d/f{i}")).unwrap();
                    let body = vec![b'x'; i * 10];
                    s.add(
                        &r,
                        FileInfo::new("", 0, FileMode::file(0o644), fixed()),
                        Bytes::from(body),
                    )
                    .unwrap();
                    let size = s.stat(&r).unwrap().size();
                    assert_eq!(size, (i * 10) as u64);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.open(&reference!("/d")).unwrap().read_dir().unwrap().len(), 8);
    }
}
