//! Runtime selection between the three backends.

use bytes::Bytes;

use packfs_core::{
    Error, File, FileInfo, FileMode, FileWriter, Namespace, Reader, Reference, Visitor, Writer,
};

use crate::{CompiledStore, DiskStore, MemStore};

/// One of the backends, chosen once at startup.
#[derive(Debug)]
pub enum Backend {
    Memory(MemStore),
    Disk(DiskStore),
    Compiled(CompiledStore),
}

impl Backend {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Disk(_) => "disk",
            Backend::Compiled(_) => "compiled",
        }
    }

    fn reader(&self) -> &dyn Reader {
        match self {
            Backend::Memory(s) => s,
            Backend::Disk(s) => s,
            Backend::Compiled(s) => s,
        }
    }

    fn writer(&self) -> &dyn Writer {
        match self {
            Backend::Memory(s) => s,
            Backend::Disk(s) => s,
            Backend::Compiled(s) => s,
        }
    }
}

impl From<MemStore> for Backend {
    fn from(store: MemStore) -> Self {
        Backend::Memory(store)
    }
}

impl From<DiskStore> for Backend {
    fn from(store: DiskStore) -> Self {
        Backend::Disk(store)
    }
}

impl From<CompiledStore> for Backend {
    fn from(store: CompiledStore) -> Self {
        Backend::Compiled(store)
    }
}

impl Reader for Backend {
    fn current(&self) -> &Namespace {
        self.reader().current()
    }

    fn stat(&self, at: &Reference) -> Result<FileInfo, Error> {
        self.reader().stat(at)
    }

    fn open(&self, at: &Reference) -> Result<File, Error> {
        self.reader().open(at)
    }

    fn walk(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        self.reader().walk(root, visit)
    }
}

impl Writer for Backend {
    fn mkdir_all(&self, at: &Reference, mode: FileMode) -> Result<(), Error> {
        self.writer().mkdir_all(at, mode)
    }

    fn add(&self, at: &Reference, info: FileInfo, content: Bytes) -> Result<(), Error> {
        self.writer().add(at, info, content)
    }

    fn create(&self, at: &Reference) -> Result<FileWriter<'_>, Error> {
        self.writer().create(at)
    }

    fn remove(&self, at: &Reference) -> Result<(), Error> {
        self.writer().remove(at)
    }
}
