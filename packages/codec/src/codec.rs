//! Tree <-> blob conversion.

use std::fmt;
use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use packfs_core::{Error, Reference, Tree};

use crate::record::{Payload, Record};

/// Leading tag of every blob, followed by the format version.
pub const BLOB_MAGIC: &str = "packfs.v";

/// The only blob version this crate reads and writes.
pub const BLOB_VERSION: u32 = 1;

/// An encoded tree.
///
/// Plain ASCII with no quotes or backslashes, so it can be pasted into a
/// source file as a string literal unchanged.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedBlob(String);

impl EncodedBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EncodedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EncodedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(32).collect();
        write!(f, "EncodedBlob({head}... {} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for EncodedBlob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<EncodedBlob> for String {
    fn from(blob: EncodedBlob) -> Self {
        blob.0
    }
}

/// Encodes trees to blobs and back.
#[derive(Clone, Copy, Debug)]
pub struct TreeCodec {
    level: u32,
}

impl Default for TreeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeCodec {
    /// Best compression.
    pub fn new() -> Self {
        Self { level: 9 }
    }

    /// Gzip level, 0 (store) through 9 (best). Larger values are clamped.
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    /// Serialize every entry of `tree`, in walk order.
    pub fn encode(&self, tree: &Tree) -> Result<EncodedBlob, Error> {
        let entries = tree
            .walk(&Reference::root())?
            .map(|(reference, entry)| Record {
                path: reference.path().to_string(),
                info: entry.info().clone(),
                content: entry.content().cloned(),
            })
            .collect();
        let payload = Payload {
            namespace: tree.namespace().clone(),
            entries,
        };
        let json = serde_json::to_vec(&payload).map_err(|e| Error::Io {
            reference: Reference::root(),
            source: e.into(),
        })?;
        let blob = self.seal(&json)?;
        log::debug!(
            "Encoded {} entries of {} into {} bytes",
            tree.len(),
            tree.namespace().id(),
            blob.0.len()
        );
        Ok(blob)
    }

    /// Rebuild a tree from a blob produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// * `UnsupportedBlobVersion` - the header names another format version.
    /// * `CorruptBlob` - anything else is wrong: bad header, truncated or
    ///   altered body, checksum mismatch, or records that do not form a
    ///   valid tree.
    pub fn decode(&self, blob: impl AsRef<[u8]>) -> Result<Tree, Error> {
        let json = unseal(blob.as_ref())?;
        let payload: Payload = serde_json::from_slice(&json)
            .map_err(|e| Error::corrupt(format!("invalid payload: {e}")))?;
        let tree = rebuild(payload)?;
        log::debug!("Decoded {} entries of {}", tree.len(), tree.namespace().id());
        Ok(tree)
    }

    /// Wrap a JSON payload in the blob envelope.
    pub(crate) fn seal(&self, json: &[u8]) -> Result<EncodedBlob, Error> {
        let checksum = crc32fast::hash(json);
        let mut gz = GzEncoder::new(Vec::new(), Compression::new(self.level));
        gz.write_all(json)
            .map_err(|e| Error::from_io(&Reference::root(), e))?;
        let compressed = gz
            .finish()
            .map_err(|e| Error::from_io(&Reference::root(), e))?;
        Ok(EncodedBlob(format!(
            "{BLOB_MAGIC}{BLOB_VERSION}.{checksum:08x}.{}",
            STANDARD.encode(compressed)
        )))
    }
}

fn unseal(blob: &[u8]) -> Result<Vec<u8>, Error> {
    let text = std::str::from_utf8(blob)
        .map_err(|_| Error::corrupt("blob is not ASCII text"))?
        .trim();
    let rest = text
        .strip_prefix(BLOB_MAGIC)
        .ok_or_else(|| Error::corrupt("missing blob header"))?;

    let (version, rest) = rest
        .split_once('.')
        .ok_or_else(|| Error::corrupt("truncated blob header"))?;
    let version: u32 = version
        .parse()
        .map_err(|_| Error::corrupt(format!("invalid blob version {version:?}")))?;
    if version != BLOB_VERSION {
        return Err(Error::UnsupportedBlobVersion {
            found: version,
            supported: BLOB_VERSION,
        });
    }

    let (checksum, body) = rest
        .split_once('.')
        .ok_or_else(|| Error::corrupt("truncated blob header"))?;
    if checksum.len() != 8 {
        return Err(Error::corrupt(format!("invalid checksum {checksum:?}")));
    }
    let expected = u32::from_str_radix(checksum, 16)
        .map_err(|_| Error::corrupt(format!("invalid checksum {checksum:?}")))?;

    let compressed = STANDARD
        .decode(body)
        .map_err(|e| Error::corrupt(format!("invalid base64 body: {e}")))?;
    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| Error::corrupt(format!("invalid compressed body: {e}")))?;

    let actual = crc32fast::hash(&json);
    if actual != expected {
        return Err(Error::corrupt(format!(
            "checksum mismatch: header says {expected:08x}, payload is {actual:08x}"
        )));
    }
    Ok(json)
}

fn rebuild(payload: Payload) -> Result<Tree, Error> {
    let mut records = payload.entries.into_iter();
    let root = records
        .next()
        .ok_or_else(|| Error::corrupt("blob holds no entries"))?;
    if root.path != "/" || !root.info.is_dir() || root.content.is_some() {
        return Err(Error::corrupt("first entry is not the root directory"));
    }
    let mut tree = Tree::new(payload.namespace, root.info.clone());
    check_sealed(&tree, &Reference::root(), &root)?;

    for record in records {
        let reference = Reference::parse(&record.path)
            .map_err(|e| Error::corrupt(format!("entry {:?}: {e}", record.path)))?;
        if reference.path() != record.path || reference.namespace().is_some() {
            return Err(Error::corrupt(format!("entry {:?} is not a clean path", record.path)));
        }
        if reference.is_root() || tree.get(&reference).is_ok() {
            return Err(Error::corrupt(format!("duplicate entry {:?}", record.path)));
        }

        let inserted = match (&record.content, record.info.is_dir()) {
            (None, true) => tree.insert_dir(&reference, record.info.clone()),
            (Some(content), false) => {
                tree.insert_leaf(&reference, record.info.clone(), content.clone())
            }
            (Some(_), true) => {
                return Err(Error::corrupt(format!("directory {:?} has content", record.path)));
            }
            (None, false) => {
                return Err(Error::corrupt(format!("leaf {:?} has no content", record.path)));
            }
        };
        inserted.map_err(|e| Error::corrupt(format!("entry {:?}: {e}", record.path)))?;
        check_sealed(&tree, &reference, &record)?;
    }
    Ok(tree)
}

/// The tree re-derives name, size and kind; a record must already agree.
fn check_sealed(tree: &Tree, reference: &Reference, record: &Record) -> Result<(), Error> {
    match tree.stat(reference) {
        Ok(info) if *info == record.info => Ok(()),
        _ => Err(Error::corrupt(format!(
            "metadata of {:?} does not match its entry",
            record.path
        ))),
    }
}
