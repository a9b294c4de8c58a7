//! Handles returned by `open` and `create`.

use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{Error, FileInfo, FileMode, Reference, Writer};

/// Default permission bits for files written through [`FileWriter`].
pub const DEFAULT_FILE_PERM: u32 = 0o644;

/// An open entry.
///
/// Leaves are seekable byte readers; directories enumerate the metadata of
/// their children. Dropping a handle releases it and never fails.
pub struct File {
    reference: Reference,
    info: FileInfo,
    body: Body,
}

enum Body {
    Memory(Cursor<Bytes>),
    Disk(fs::File),
    Dir(Vec<FileInfo>),
}

impl File {
    /// A leaf backed by shared in-memory bytes.
    pub fn from_bytes(reference: Reference, info: FileInfo, content: Bytes) -> Self {
        Self {
            reference,
            info,
            body: Body::Memory(Cursor::new(content)),
        }
    }

    /// A leaf backed by an open native file.
    pub fn from_disk(reference: Reference, info: FileInfo, file: fs::File) -> Self {
        Self {
            reference,
            info,
            body: Body::Disk(file),
        }
    }

    /// A directory; `children` must already be ordered by name.
    pub fn directory(reference: Reference, info: FileInfo, children: Vec<FileInfo>) -> Self {
        Self {
            reference,
            info,
            body: Body::Dir(children),
        }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn stat(&self) -> &FileInfo {
        &self.info
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.body, Body::Dir(_))
    }

    /// Children of a directory handle, ordered by name.
    pub fn read_dir(&self) -> Result<&[FileInfo], Error> {
        match &self.body {
            Body::Dir(children) => Ok(children),
            _ => Err(Error::NotADirectory {
                reference: self.reference.clone(),
            }),
        }
    }

    /// Read the remaining content of a leaf.
    pub fn read_all(&mut self) -> Result<Vec<u8>, Error> {
        if self.is_dir() {
            return Err(self.is_a_directory());
        }
        let mut buf = Vec::with_capacity(self.info.size() as usize);
        self.read_to_end(&mut buf)
            .map_err(|e| Error::from_io(&self.reference, e))?;
        Ok(buf)
    }

    fn is_a_directory(&self) -> Error {
        Error::IsADirectory {
            reference: self.reference.clone(),
        }
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            Body::Memory(cursor) => cursor.read(buf),
            Body::Disk(file) => file.read(buf),
            Body::Dir(_) => Err(self.is_a_directory().into()),
        }
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.body {
            Body::Memory(cursor) => cursor.seek(pos),
            Body::Disk(file) => file.seek(pos),
            Body::Dir(_) => Err(self.is_a_directory().into()),
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            Body::Memory(_) => "memory",
            Body::Disk(_) => "disk",
            Body::Dir(_) => "dir",
        };
        f.debug_struct("File")
            .field("reference", &self.reference)
            .field("info", &self.info)
            .field("body", &kind)
            .finish()
    }
}

/// A pending write to a leaf.
///
/// Bytes are buffered until [`commit`](FileWriter::commit), which hands the
/// whole leaf to the store in one step. Dropping an uncommitted writer
/// discards it and leaves the previous entry (or its absence) untouched.
pub struct FileWriter<'a> {
    store: &'a dyn Writer,
    reference: Reference,
    mode: FileMode,
    mod_time: Option<DateTime<Utc>>,
    buffer: Vec<u8>,
    committed: bool,
}

impl<'a> FileWriter<'a> {
    pub fn new(store: &'a dyn Writer, reference: Reference) -> Self {
        Self {
            store,
            reference,
            mode: FileMode::file(DEFAULT_FILE_PERM),
            mod_time: None,
            buffer: Vec::new(),
            committed: false,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Stamp the leaf with `mod_time` instead of the commit time.
    #[must_use]
    pub fn with_mod_time(mut self, mod_time: DateTime<Utc>) -> Self {
        self.mod_time = Some(mod_time);
        self
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Publish the buffered bytes as the leaf's content.
    pub fn commit(mut self) -> Result<FileInfo, Error> {
        let content = Bytes::from(std::mem::take(&mut self.buffer));
        let info = FileInfo::new(
            self.reference.name(),
            content.len() as u64,
            self.mode,
            self.mod_time.unwrap_or_else(Utc::now),
        );
        self.store.add(&self.reference, info.clone(), content)?;
        self.committed = true;
        Ok(info)
    }
}

impl Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FileWriter<'_> {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("Discarding uncommitted write to {}", self.reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reference, ErrorKind};

    fn info(size: u64) -> FileInfo {
        FileInfo::new("f", size, FileMode::file(0o644), Utc::now())
    }

    #[test]
    fn memory_leaf_reads_and_seeks() {
        let mut f = File::from_bytes(reference!("/f"), info(11), Bytes::from_static(b"hello world"));
        f.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = String::new();
        f.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "world");

        f.seek(SeekFrom::End(-5)).unwrap();
        assert_eq!(f.read_all().unwrap(), b"world");
        assert!(f.read_dir().is_err());
    }

    #[test]
    fn disk_leaf_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"on disk").unwrap();
        let mut f = File::from_disk(reference!("/f"), info(7), fs::File::open(&path).unwrap());
        assert_eq!(f.read_all().unwrap(), b"on disk");
    }

    #[test]
    fn directory_handle_lists_but_does_not_read() {
        let children = vec![info(1).with_name("a"), info(2).with_name("b")];
        let mut d = File::directory(
            reference!("/d"),
            FileInfo::dir("d", 0o755, Utc::now()),
            children,
        );
        assert!(d.is_dir());
        assert_eq!(d.read_dir().unwrap().len(), 2);

        let err = d.read_all().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IsADirectory);

        let mut buf = [0u8; 4];
        let err = d.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
        assert!(d.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn debug_output_names_the_backing() {
        let f = File::from_bytes(reference!("/f"), info(0), Bytes::new());
        assert!(format!("{:?}", f).contains("memory"));
    }
}
