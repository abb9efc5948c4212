#![forbid(unsafe_code)]

use std::fmt;

use crate::pak::path::VfsPath;

/// Unresolved address of an entry: the salted hash of its path.
///
/// Field order drives the derived ordering: salt first, then value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashAddr {
    pub salt: u16,
    pub value: u64,
}

impl HashAddr {
    pub fn new(value: u64, salt: u16) -> Self {
        Self { salt, value }
    }
}

impl fmt::Display for HashAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.salt == 0 {
            write!(f, "{:016x}", self.value)
        } else {
            write!(f, "{:016x}@{}", self.value, self.salt)
        }
    }
}

/// Map key of a [`VirtualFilesystem`](crate::pak::VirtualFilesystem) entry.
///
/// All `Hash` keys sort before all `Path` keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKey {
    Hash(HashAddr),
    Path(VfsPath),
}

impl EntryKey {
    pub fn hash(value: u64, salt: u16) -> Self {
        Self::Hash(HashAddr::new(value, salt))
    }

    pub fn path(p: impl Into<VfsPath>) -> Self {
        Self::Path(p.into())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    pub fn as_path(&self) -> Option<&VfsPath> {
        match self {
            Self::Path(p) => Some(p),
            Self::Hash(_) => None,
        }
    }

    pub fn as_hash(&self) -> Option<HashAddr> {
        match self {
            Self::Hash(h) => Some(*h),
            Self::Path(_) => None,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(h) => write!(f, "#{h}"),
            Self::Path(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_keys_sort_before_paths() {
        let mut keys = vec![
            EntryKey::path("b"),
            EntryKey::hash(5, 0),
            EntryKey::path("a"),
            EntryKey::hash(u64::MAX, 9),
            EntryKey::hash(1, 9),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                EntryKey::hash(5, 0),
                EntryKey::hash(1, 9),
                EntryKey::hash(u64::MAX, 9),
                EntryKey::path("a"),
                EntryKey::path("b"),
            ]
        );
    }

    #[test]
    fn display() {
        assert_eq!(EntryKey::hash(0xab, 0).to_string(), "#00000000000000ab");
        assert_eq!(EntryKey::hash(0xab, 3).to_string(), "#00000000000000ab@3");
        assert_eq!(EntryKey::path("x/y").to_string(), "/x/y");
    }
}
