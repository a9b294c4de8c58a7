//! The capability interface every backend implements.

use std::sync::Arc;

use bytes::Bytes;

use crate::{Error, File, FileInfo, FileMode, FileWriter, Namespace, Reference};

/// What a walk visitor wants to happen next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WalkStep {
    #[default]
    Continue,
    /// Do not descend into the directory just visited. Ignored for leaves.
    SkipDir,
    /// End the walk successfully.
    Stop,
}

/// Callback invoked once per entry during [`Reader::walk`].
pub type Visitor<'a> = dyn FnMut(&Reference, &FileInfo) -> Result<WalkStep, Error> + 'a;

/// Read access to a tree of entries.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn Reader>`.
pub trait Reader: Send + Sync {
    /// The namespace this backend serves.
    fn current(&self) -> &Namespace;

    /// Metadata of one entry.
    ///
    /// # Errors
    ///
    /// * `NotFound` - nothing exists at `at`, or `at` names another namespace.
    fn stat(&self, at: &Reference) -> Result<FileInfo, Error>;

    /// Open a leaf for reading or a directory for listing.
    fn open(&self, at: &Reference) -> Result<File, Error>;

    /// Visit `root` and everything below it, depth-first, children in name
    /// order.
    ///
    /// A visitor error stops the walk and is returned. Walking again later
    /// produces the same order over whatever the tree holds by then.
    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error>;
}

/// Write access to a tree of entries.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn Writer>`.
pub trait Writer: Send + Sync {
    /// Create `at` and all missing ancestors as directories. Creating an
    /// existing directory is a no-op.
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error>;

    /// Insert or atomically replace the leaf at `at`.
    ///
    /// # Errors
    ///
    /// * `ParentMissing` - the parent directory does not exist.
    /// * `IsADirectory` - a directory already lives at `at`.
    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error>;

    /// Start writing a leaf. Nothing becomes visible until the writer is
    /// committed.
    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error>;

    /// Remove a leaf or an empty directory.
    ///
    /// # Errors
    ///
    /// * `NotFound` - nothing exists at `at`, on every attempt.
    /// * `DirectoryNotEmpty` - `at` is a directory with children.
    fn remove(&self, at: &Reference) -> Result<(), Error>;
}

/// Combined read/write access.
pub trait Store: Reader + Writer {}
impl<T: Reader + Writer + ?Sized> Store for T {}

// Blanket implementations for references and smart pointers

impl<T: Reader + ?Sized> Reader for &T {
    fn current(&self) -> &Namespace {
        (**self).current()
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        (**self).stat(at)
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        (**self).open(at)
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        (**self).walk(root, visit)
    }
}

impl<T: Writer + ?Sized> Writer for &T {
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error> {
        (**self).mkdir_all(at, mode)
    }

    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error> {
        (**self).add(at, info, content)
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        (**self).create(at)
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        (**self).remove(at)
    }
}

impl<T: Reader + ?Sized> Reader for Box<T> {
    fn current(&self) -> &Namespace {
        self.as_ref().current()
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        self.as_ref().stat(at)
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        self.as_ref().open(at)
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        self.as_ref().walk(root, visit)
    }
}

impl<T: Writer + ?Sized> Writer for Box<T> {
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error> {
        self.as_ref().mkdir_all(at, mode)
    }

    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error> {
        self.as_ref().add(at, info, content)
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        self.as_ref().create(at)
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        self.as_ref().remove(at)
    }
}

impl<T: Reader + ?Sized> Reader for Arc<T> {
    fn current(&self) -> &Namespace {
        self.as_ref().current()
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        self.as_ref().stat(at)
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        self.as_ref().open(at)
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        self.as_ref().walk(root, visit)
    }
}

impl<T: Writer + ?Sized> Writer for Arc<T> {
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error> {
        self.as_ref().mkdir_all(at, mode)
    }

    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error> {
        self.as_ref().add(at, info, content)
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        self.as_ref().create(at)
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        self.as_ref().remove(at)
    }
}
