//! The namespace descriptor a backend serves.

use std::path::{Path as FsPath, PathBuf};

use serde::{Deserialize, Serialize};

use crate::path::validate_namespace;
use crate::{Error, Reference};

/// Identifies the logical unit of files one backend instance represents.
///
/// Passed to every backend at construction and handed back unchanged by
/// [`Reader::current`](crate::Reader::current). Several namespaces may live
/// in one process, each behind its own backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    id: String,
    root_dir: PathBuf,
}

impl Namespace {
    /// `id` is the module-like identifier used before the `:` in references;
    /// `root_dir` is the directory the unit lives in on the packaging host.
    pub fn new(id: impl Into<String>, root_dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::MalformedReference {
                raw: id,
                message: "empty namespace id".to_string(),
            });
        }
        validate_namespace(&id).map_err(|message| Error::MalformedReference {
            raw: id.clone(),
            message,
        })?;
        Ok(Self {
            id,
            root_dir: root_dir.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_dir(&self) -> &FsPath {
        &self.root_dir
    }

    /// Whether `reference` addresses this namespace (explicitly or implicitly).
    pub fn owns(&self, reference: &Reference) -> bool {
        match reference.namespace() {
            None => true,
            Some(ns) => ns == self.id,
        }
    }

    /// Canonical form of a reference in this namespace: the namespace is
    /// always spelled out. Foreign references are not found here.
    pub fn resolve(&self, reference: &Reference) -> Result<Reference, Error> {
        if !self.owns(reference) {
            return Err(Error::not_found(reference));
        }
        Ok(reference.with_namespace(Some(&self.id)))
    }
}
