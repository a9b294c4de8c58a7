//! Namespaced references: `namespace:/path/inside/it`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Separator between the namespace and the path in the textual form.
pub const NAMESPACE_SEPARATOR: char = ':';

/// A namespaced, normalized virtual path.
///
/// The namespace names a logical unit of files (a module, a package). A
/// reference without a namespace means "whatever unit the backend serves";
/// backends resolve it against their [`Namespace`](crate::Namespace).
///
/// The path is always rooted at `/`, uses forward slashes only, and carries
/// no `.`/`..` components, duplicate slashes or trailing slash.
///
/// # Syntax
///
/// ```text
/// /path              current namespace
/// :/path             current namespace, explicit marker
/// example.com/m:/path  the namespace "example.com/m"
/// ```
///
/// # Examples
///
/// ```rust
/// use packfs_core::Reference;
///
/// let r = Reference::parse("example.com/app:/public//css/../index.html").unwrap();
/// assert_eq!(r.namespace(), Some("example.com/app"));
/// assert_eq!(r.path(), "/public/index.html");
/// assert_eq!(r.to_string(), "example.com/app:/public/index.html");
/// ```
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference {
    namespace: Option<String>,
    path: String,
}

impl Reference {
    /// Parse the textual form of a reference.
    ///
    /// Whitespace is an ordinary path character and is kept as written.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let (namespace, path) = split_namespace(raw);

        if let Some(ns) = namespace {
            validate_namespace(ns).map_err(|message| Error::MalformedReference {
                raw: raw.to_string(),
                message,
            })?;
        }

        if path.is_empty() {
            return Err(Error::MalformedReference {
                raw: raw.to_string(),
                message: "empty path".to_string(),
            });
        }
        if !path.starts_with('/') {
            return Err(Error::MalformedReference {
                raw: raw.to_string(),
                message: "path must start with '/'".to_string(),
            });
        }

        Ok(Reference {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            path: clean(path),
        })
    }

    /// Build a reference from a namespace and an absolute path.
    pub fn new(namespace: Option<&str>, path: &str) -> Result<Self, Error> {
        match namespace {
            Some(ns) if !ns.is_empty() => Self::parse(&format!("{ns}{NAMESPACE_SEPARATOR}{path}")),
            _ => Self::parse(path),
        }
    }

    /// Trusted constructor for paths that are already clean.
    pub(crate) fn from_normalized(namespace: Option<&str>, path: String) -> Self {
        debug_assert_eq!(clean(&path), path);
        Reference {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            path,
        }
    }

    /// The root of the current namespace.
    pub fn root() -> Self {
        Reference {
            namespace: None,
            path: "/".to_string(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// The last path component, or `/` for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        match self.path.rfind('/') {
            Some(i) => &self.path[i + 1..],
            None => &self.path,
        }
    }

    /// Path components below the root, in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|c| !c.is_empty())
    }

    /// The containing directory. `None` for the root.
    pub fn parent(&self) -> Option<Reference> {
        if self.is_root() {
            return None;
        }
        let cut = self.path.rfind('/').unwrap_or(0);
        let path = if cut == 0 {
            "/".to_string()
        } else {
            self.path[..cut].to_string()
        };
        Some(Reference {
            namespace: self.namespace.clone(),
            path,
        })
    }

    /// Resolve `rel` against this reference, treated as a directory.
    ///
    /// An absolute `rel` replaces the path but keeps the namespace. Climbing
    /// above `/` with `..` fails with [`Error::PathEscapesRoot`].
    ///
    /// ```rust
    /// use packfs_core::Reference;
    ///
    /// let base = Reference::parse("/public/images").unwrap();
    /// assert_eq!(base.join("../index.html").unwrap().path(), "/public/index.html");
    /// assert!(base.join("../../../etc").is_err());
    /// ```
    pub fn join(&self, rel: &str) -> Result<Reference, Error> {
        let joined = if rel.starts_with('/') {
            rel.to_string()
        } else {
            format!("{}/{}", self.path, rel)
        };
        let path = clean_within_root(&joined).ok_or_else(|| Error::PathEscapesRoot {
            path: joined.clone(),
        })?;
        Ok(Reference {
            namespace: self.namespace.clone(),
            path,
        })
    }

    /// Same path, different namespace.
    #[must_use]
    pub fn with_namespace(&self, namespace: Option<&str>) -> Reference {
        Reference {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            path: self.path.clone(),
        }
    }

    /// Whether `self` is `base` or lies underneath it (same namespace).
    pub fn starts_with(&self, base: &Reference) -> bool {
        if self.namespace != base.namespace {
            return false;
        }
        base.is_root()
            || self.path == base.path
            || (self.path.starts_with(&base.path)
                && self.path.as_bytes().get(base.path.len()) == Some(&b'/'))
    }
}

fn split_namespace(raw: &str) -> (Option<&str>, &str) {
    if raw.starts_with('/') {
        return (None, raw);
    }
    match raw.split_once(NAMESPACE_SEPARATOR) {
        Some((ns, path)) => (Some(ns), path),
        None => (None, raw),
    }
}

/// Check that a namespace identifier only uses module-path characters.
pub(crate) fn validate_namespace(ns: &str) -> Result<(), String> {
    if ns.starts_with('/') {
        return Err("namespace must not start with '/'".to_string());
    }
    for c in ns.chars() {
        let legal = c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '+' | '@' | '/' | '-');
        if !legal {
            return Err(format!("invalid character '{}' in namespace", c));
        }
    }
    Ok(())
}

/// Lexically clean a rooted path. `..` at the root stays at the root.
///
/// ```rust
/// use packfs_core::path::clean;
///
/// assert_eq!(clean("/a//b/./c/.."), "/a/b");
/// assert_eq!(clean("/../x"), "/x");
/// assert_eq!(clean(&clean("/a/../b/")), "/b");
/// ```
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    join_rooted(&parts)
}

/// Like [`clean`], but `None` when `..` would climb above the root.
fn clean_within_root(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(join_rooted(&parts))
}

fn join_rooted(parts: &[&str]) -> String {
    if parts.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}{}{}", ns, NAMESPACE_SEPARATOR, self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Reference::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a reference literal, panicking if it is malformed.
///
/// ```rust
/// use packfs_core::reference;
///
/// let r = reference!("/public/index.html");
/// assert_eq!(r.name(), "index.html");
/// ```
#[macro_export]
macro_rules! reference {
    ($s:expr) => {
        $crate::Reference::parse($s).expect("invalid reference literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn parse_three_forms() {
        let bare = Reference::parse("/public").unwrap();
        assert_eq!(bare.namespace(), None);
        assert_eq!(bare.path(), "/public");

        let marked = Reference::parse(":/public").unwrap();
        assert_eq!(marked, bare);

        let named = Reference::parse("github.com/acme/site:/public").unwrap();
        assert_eq!(named.namespace(), Some("github.com/acme/site"));
        assert_eq!(named.path(), "/public");
        assert_ne!(named, bare);
    }

    #[test]
    fn normalizes_slashes_and_dots() {
        assert_eq!(Reference::parse("//a///b/").unwrap().path(), "/a/b");
        assert_eq!(Reference::parse("/a/./b/../c").unwrap().path(), "/a/c");
        assert_eq!(Reference::parse("/..").unwrap().path(), "/");
        assert_eq!(Reference::parse("/").unwrap(), Reference::root());
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["/a//b/../c/", "/x/./y", "ns:/deep/../../z", "/"] {
            let once = Reference::parse(raw).unwrap();
            let twice = Reference::parse(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn colon_inside_a_bare_path_is_a_path_character() {
        let r = Reference::parse("/notes/10:30.txt").unwrap();
        assert_eq!(r.namespace(), None);
        assert_eq!(r.path(), "/notes/10:30.txt");
    }

    #[test]
    fn whitespace_is_part_of_the_path() {
        let r = Reference::parse("/notes ").unwrap();
        assert_eq!(r.path(), "/notes ");
        assert_eq!(r.name(), "notes ");
        assert_eq!(Reference::parse(&r.to_string()).unwrap(), r);
        assert_eq!(Reference::root().join("notes ").unwrap(), r);
        assert_eq!(Reference::parse("/ a/ b").unwrap().path(), "/ a/ b");
    }

    #[test]
    fn malformed_references_rejected() {
        for raw in ["", ":", "ns:", "relative/path", "ns:relative", "bad ns:/x", "a|b:/x"] {
            let err = Reference::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedReference, "{raw:?}");
        }
    }

    #[test]
    fn name_and_parent() {
        let r = reference!("/public/images/mark.png");
        assert_eq!(r.name(), "mark.png");
        assert_eq!(r.parent().unwrap().path(), "/public/images");
        assert_eq!(reference!("/public").parent().unwrap(), Reference::root());
        assert_eq!(Reference::root().parent(), None);
        assert_eq!(Reference::root().name(), "/");
    }

    #[test]
    fn parent_keeps_namespace() {
        let r = reference!("ns:/a/b");
        assert_eq!(r.parent().unwrap().namespace(), Some("ns"));
    }

    #[test]
    fn join_relative_and_absolute() {
        let base = reference!("ns:/public");
        assert_eq!(base.join("images/mark.png").unwrap().to_string(), "ns:/public/images/mark.png");
        assert_eq!(base.join("/templates").unwrap().to_string(), "ns:/templates");
        assert_eq!(base.join("..").unwrap().path(), "/");
        assert_eq!(base.join("").unwrap(), base);
    }

    #[test]
    fn join_escaping_root_fails() {
        let base = reference!("/public");
        let err = base.join("../../secret").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscapesRoot);

        let err = Reference::root().join("/../x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscapesRoot);
    }

    #[test]
    fn starts_with_respects_component_boundaries() {
        let base = reference!("/public");
        assert!(reference!("/public/index.html").starts_with(&base));
        assert!(base.starts_with(&base));
        assert!(!reference!("/publicity").starts_with(&base));
        assert!(reference!("/anything").starts_with(&Reference::root()));
        assert!(!reference!("ns:/public/x").starts_with(&base));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut refs = vec![reference!("/b"), reference!("/a/z"), reference!("/a")];
        refs.sort();
        let paths: Vec<&str> = refs.iter().map(Reference::path).collect();
        assert_eq!(paths, vec!["/a", "/a/z", "/b"]);
    }

    #[test]
    fn serde_uses_textual_form() {
        let r = reference!("ns:/a/b");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"ns:/a/b\"");
        let back: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<Reference>("\"nope\"").is_err());
    }

    #[test]
    fn new_with_namespace() {
        assert_eq!(Reference::new(Some("ns"), "/x").unwrap(), reference!("ns:/x"));
        assert_eq!(Reference::new(Some(""), "/x").unwrap(), reference!("/x"));
        assert_eq!(Reference::new(None, "/x").unwrap(), reference!(":/x"));
    }
}
