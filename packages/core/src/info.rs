//! File metadata: name, size, mode bits and modification time.

use std::fmt;
use std::fs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags::bitflags! {
    /// Entry type and permission bits.
    ///
    /// The directory bit is the top bit; the low nine bits are `rwxrwxrwx`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct FileMode: u32 {
        const DIR = 1 << 31;
        const PERM = 0o777;
    }
}

impl FileMode {
    /// A directory with the given permission bits.
    pub fn dir(perm: u32) -> Self {
        FileMode::DIR | FileMode::from_bits_retain(perm & FileMode::PERM.bits())
    }

    /// A regular file with the given permission bits.
    pub fn file(perm: u32) -> Self {
        FileMode::from_bits_retain(perm & FileMode::PERM.bits())
    }

    pub fn is_dir(self) -> bool {
        self.contains(FileMode::DIR)
    }

    pub fn perm(self) -> u32 {
        self.bits() & FileMode::PERM.bits()
    }
}

impl fmt::Display for FileMode {
    /// `ls -l` style: `drwxr-xr-x`, `-rw-r--r--`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(10);
        out.push(if self.is_dir() { 'd' } else { '-' });
        let perm = self.perm();
        for shift in [6, 3, 0] {
            let bits = (perm >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        f.write_str(&out)
    }
}

impl Serialize for FileMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        FileMode::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid mode bits {bits:#o}")))
    }
}

/// Metadata of one entry. Sealed once handed to a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    name: String,
    size: u64,
    mode: FileMode,
    mod_time: DateTime<Utc>,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, size: u64, mode: FileMode, mod_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            mode,
            mod_time,
        }
    }

    /// Directory metadata. Directory sizes are not meaningful and are zero.
    pub fn dir(name: impl Into<String>, perm: u32, mod_time: DateTime<Utc>) -> Self {
        Self::new(name, 0, FileMode::dir(perm), mod_time)
    }

    /// Build from native metadata, as read by the disk backend.
    pub fn from_metadata(name: impl Into<String>, metadata: &fs::Metadata) -> Self {
        let mod_time = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let perm = permission_bits(metadata);
        if metadata.is_dir() {
            Self::dir(name, perm, mod_time)
        } else {
            Self::new(name, metadata.len(), FileMode::file(perm), mod_time)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, false) => 0o755,
        (true, true) => 0o555,
        (false, false) => 0o644,
        (false, true) => 0o444,
    }
}
