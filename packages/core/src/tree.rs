//! The authoritative in-memory tree of entries.
//!
//! A [`Tree`] maps normalized paths to [`Entry`] values. Directories list
//! their children by name and point back at their parent by path key, so
//! there are no ownership cycles: the map owns every entry, and the parent
//! link is a lookup only.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use chrono::Utc;
//! use packfs_core::{reference, FileInfo, FileMode, Namespace, Tree};
//!
//! let ns = Namespace::new("example.com/app", "/src/app").unwrap();
//! let now = Utc::now();
//! let mut tree = Tree::empty(ns, now);
//!
//! tree.mkdir_all(&reference!("/public/images"), FileMode::dir(0o755), now).unwrap();
//! tree.insert_leaf(
//!     &reference!("/public/index.html"),
//!     FileInfo::new("index.html", 0, FileMode::file(0o644), now),
//!     Bytes::from_static(b"<h1>hi</h1>"),
//! )
//! .unwrap();
//!
//! let paths: Vec<String> = tree
//!     .walk(&reference!("/"))
//!     .unwrap()
//!     .map(|(r, _)| r.path().to_string())
//!     .collect();
//! assert_eq!(paths, ["/", "/public", "/public/images", "/public/index.html"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{Error, FileInfo, FileMode, Namespace, Reference, Visitor, WalkStep};

/// Default permission bits for implicitly created directories.
pub const DEFAULT_DIR_PERM: u32 = 0o755;

/// One node of a [`Tree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Leaf {
        info: FileInfo,
        content: Bytes,
    },
    Dir {
        info: FileInfo,
        /// Path key of the containing directory; `None` for the root.
        parent: Option<String>,
        children: BTreeSet<String>,
    },
}

impl Entry {
    pub fn info(&self) -> &FileInfo {
        match self {
            Entry::Leaf { info, .. } | Entry::Dir { info, .. } => info,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Dir { .. })
    }

    /// Content bytes of a leaf; `None` for directories.
    pub fn content(&self) -> Option<&Bytes> {
        match self {
            Entry::Leaf { content, .. } => Some(content),
            Entry::Dir { .. } => None,
        }
    }

    /// Child names of a directory, in order; empty for leaves.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        let children = match self {
            Entry::Dir { children, .. } => Some(children),
            Entry::Leaf { .. } => None,
        };
        children.into_iter().flatten().map(String::as_str)
    }
}

/// A tree of entries scoped to one [`Namespace`].
///
/// Invariants: `/` always exists and is a directory, and every other entry's
/// parent directory exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    namespace: Namespace,
    entries: BTreeMap<String, Entry>,
}

impl Tree {
    /// A tree holding only its root directory, described by `root`.
    pub fn new(namespace: Namespace, root: FileInfo) -> Self {
        let perm = root.mode().perm();
        let info = root.with_name("/").with_size(0).with_mode(FileMode::dir(perm));
        let mut entries = BTreeMap::new();
        entries.insert(
            "/".to_string(),
            Entry::Dir {
                info,
                parent: None,
                children: BTreeSet::new(),
            },
        );
        Self { namespace, entries }
    }

    /// A tree with a default root directory stamped `mod_time`.
    pub fn empty(namespace: Namespace, mod_time: DateTime<Utc>) -> Self {
        Self::new(namespace, FileInfo::dir("/", DEFAULT_DIR_PERM, mod_time))
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Number of entries, the root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the root is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, reference: &Reference) -> Result<&Entry, Error> {
        let resolved = self.namespace.resolve(reference)?;
        self.entries
            .get(resolved.path())
            .ok_or_else(|| Error::not_found(reference))
    }

    pub fn stat(&self, reference: &Reference) -> Result<&FileInfo, Error> {
        self.get(reference).map(Entry::info)
    }

    /// Metadata of the immediate children of a directory, ordered by name.
    pub fn children(&self, reference: &Reference) -> Result<Vec<FileInfo>, Error> {
        let resolved = self.namespace.resolve(reference)?;
        let entry = self.get(reference)?;
        if !entry.is_dir() {
            return Err(Error::NotADirectory {
                reference: reference.clone(),
            });
        }
        Ok(entry
            .children()
            .filter_map(|name| self.entries.get(&child_key(resolved.path(), name)))
            .map(|child| child.info().clone())
            .collect())
    }

    /// Create `reference` and every missing ancestor as directories.
    ///
    /// Existing directories are left untouched.
    pub fn mkdir_all(
        &mut self,
        reference: &Reference,
        mode: FileMode,
        mod_time: DateTime<Utc>,
    ) -> Result<(), Error> {
        let resolved = self.namespace.resolve(reference)?;
        let mut current = "/".to_string();
        for component in resolved.components() {
            let next = child_key(&current, component);
            match self.entries.get(&next) {
                Some(Entry::Dir { .. }) => {}
                Some(Entry::Leaf { .. }) => {
                    return Err(Error::NotADirectory {
                        reference: resolved.join(&next)?,
                    });
                }
                None => {
                    let info = FileInfo::dir(component, mode.perm(), mod_time);
                    self.entries.insert(
                        next.clone(),
                        Entry::Dir {
                            info,
                            parent: Some(current.clone()),
                            children: BTreeSet::new(),
                        },
                    );
                    self.link(&current, component);
                }
            }
            current = next;
        }
        Ok(())
    }

    /// Insert or replace a leaf. The parent directory must already exist.
    ///
    /// The stored metadata is sealed: its name comes from the reference and
    /// its size from `content`.
    pub fn insert_leaf(
        &mut self,
        reference: &Reference,
        info: FileInfo,
        content: Bytes,
    ) -> Result<(), Error> {
        let resolved = self.namespace.resolve(reference)?;
        let key = resolved.path().to_string();
        let parent = self.existing_parent(reference, &resolved)?;

        if let Some(Entry::Dir { .. }) = self.entries.get(&key) {
            return Err(Error::IsADirectory {
                reference: reference.clone(),
            });
        }

        let perm = info.mode().perm();
        let info = info
            .with_name(resolved.name())
            .with_size(content.len() as u64)
            .with_mode(FileMode::file(perm));
        self.entries.insert(key, Entry::Leaf { info, content });
        self.link(&parent, resolved.name());
        Ok(())
    }

    /// Insert a single directory, or replace the metadata of an existing one.
    pub fn insert_dir(&mut self, reference: &Reference, info: FileInfo) -> Result<(), Error> {
        let resolved = self.namespace.resolve(reference)?;
        let perm = info.mode().perm();
        let info = info
            .with_name(resolved.name())
            .with_size(0)
            .with_mode(FileMode::dir(perm));

        if let Some(entry) = self.entries.get_mut(resolved.path()) {
            return match entry {
                Entry::Dir { info: existing, .. } => {
                    *existing = info;
                    Ok(())
                }
                Entry::Leaf { .. } => Err(Error::NotADirectory {
                    reference: reference.clone(),
                }),
            };
        }

        let parent = self.existing_parent(reference, &resolved)?;
        self.entries.insert(
            resolved.path().to_string(),
            Entry::Dir {
                info,
                parent: Some(parent.clone()),
                children: BTreeSet::new(),
            },
        );
        self.link(&parent, resolved.name());
        Ok(())
    }

    /// Remove a leaf or an empty directory.
    pub fn remove(&mut self, reference: &Reference) -> Result<Entry, Error> {
        let resolved = self.namespace.resolve(reference)?;
        if resolved.is_root() {
            return Err(Error::PermissionDenied {
                reference: reference.clone(),
            });
        }
        match self.entries.get(resolved.path()) {
            None => return Err(Error::not_found(reference)),
            Some(Entry::Dir { children, .. }) if !children.is_empty() => {
                return Err(Error::DirectoryNotEmpty {
                    reference: reference.clone(),
                });
            }
            Some(_) => {}
        }

        let removed = self
            .entries
            .remove(resolved.path())
            .ok_or_else(|| Error::not_found(reference))?;
        let parent_key = parent_key(resolved.path());
        if let Some(Entry::Dir { children, .. }) = self.entries.get_mut(&parent_key) {
            children.remove(resolved.name());
        }
        Ok(removed)
    }

    /// Depth-first walk from `root`, children in name order, `root` first.
    pub fn walk(&self, root: &Reference) -> Result<Walker<'_>, Error> {
        let resolved = self.namespace.resolve(root)?;
        if !self.entries.contains_key(resolved.path()) {
            return Err(Error::not_found(root));
        }
        Ok(Walker {
            tree: self,
            stack: vec![resolved.path().to_string()],
            pushed: 0,
        })
    }

    /// Run a [`Reader::walk`](crate::Reader::walk) visitor over [`Tree::walk`].
    pub fn visit(&self, root: &Reference, visit: &mut Visitor<'_>) -> Result<(), Error> {
        let mut walker = self.walk(root)?;
        while let Some((reference, entry)) = walker.next() {
            match visit(&reference, entry.info())? {
                WalkStep::Continue => {}
                WalkStep::SkipDir => walker.skip_dir(),
                WalkStep::Stop => break,
            }
        }
        Ok(())
    }

    fn existing_parent(&self, reference: &Reference, resolved: &Reference) -> Result<String, Error> {
        let Some(parent) = resolved.parent() else {
            return Err(Error::IsADirectory {
                reference: reference.clone(),
            });
        };
        match self.entries.get(parent.path()) {
            Some(Entry::Dir { .. }) => Ok(parent.path().to_string()),
            Some(Entry::Leaf { .. }) => Err(Error::NotADirectory { reference: parent }),
            None => Err(Error::ParentMissing {
                reference: reference.clone(),
            }),
        }
    }

    fn link(&mut self, parent: &str, name: &str) {
        if let Some(Entry::Dir { children, .. }) = self.entries.get_mut(parent) {
            children.insert(name.to_string());
        }
    }
}

/// Lazy depth-first iterator over a [`Tree`]. See [`Tree::walk`].
pub struct Walker<'a> {
    tree: &'a Tree,
    stack: Vec<String>,
    /// Children pushed for the most recently yielded directory.
    pushed: usize,
}

impl Walker<'_> {
    /// Do not descend into the directory yielded last.
    pub fn skip_dir(&mut self) {
        let keep = self.stack.len() - self.pushed;
        self.stack.truncate(keep);
        self.pushed = 0;
    }
}

impl<'a> Iterator for Walker<'a> {
    type Item = (Reference, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.stack.pop()?;
        let entry = self.tree.entries.get(&key)?;
        self.pushed = 0;
        if let Entry::Dir { children, .. } = entry {
            for name in children.iter().rev() {
                self.stack.push(child_key(&key, name));
            }
            self.pushed = children.len();
        }
        let reference = Reference::from_normalized(Some(self.tree.namespace.id()), key);
        Some((reference, entry))
    }
}

fn child_key(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_key(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}
