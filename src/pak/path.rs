#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

/// Archive-relative path.
///
/// Always normalized: forward slashes, no leading or trailing separator, no
/// empty, `.` or `..` segments. The archive root is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VfsPath(String);

impl VfsPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn new(raw: &str) -> Self {
        let raw = raw.replace('\\', "/");
        let mut parts: Vec<&str> = Vec::new();
        for seg in raw.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        Self(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(i) => Some(Self(self.0[..i].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Every proper ancestor, nearest first, ending with the root.
    pub fn ancestors(&self) -> Vec<VfsPath> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            cur = p.parent();
            out.push(p);
        }
        out
    }

    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(i) if i > 0 => Some(&name[i + 1..]),
            _ => None,
        }
    }

    pub fn join(&self, rel: &str) -> VfsPath {
        if self.is_root() {
            return Self::new(rel);
        }
        Self::new(&format!("{}/{}", self.0, rel))
    }

    /// Component-wise prefix test; every path starts with the root.
    pub fn starts_with(&self, base: &VfsPath) -> bool {
        let mut mine = self.components();
        base.components().all(|b| mine.next() == Some(b))
    }
}

impl Ord for VfsPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components().cmp(other.components())
    }
}

impl PartialOrd for VfsPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for VfsPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Split a raw reference into (is_absolute, path without the leading slash).
pub fn split_absolute(raw: &str) -> (bool, &str) {
    match raw.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, raw),
    }
}

pub fn should_include(path: &VfsPath, filters: &[String]) -> bool {
    filters.is_empty() || filters.iter().any(|f| !f.is_empty() && path.as_str().contains(f))
}
