#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::warn;

use crate::pak::entry::{DiscoveredPath, Entry};
use crate::pak::error::DuplicateKey;
use crate::pak::key::{EntryKey, HashAddr};
use crate::pak::path::VfsPath;

/// Known `(hash, salt) -> path` pairs.
pub type Dictionary = BTreeMap<HashAddr, VfsPath>;

/// Every entry of one archive, keyed by hash until its path is known.
///
/// Entries are owned by exactly one key; re-keying moves them.
#[derive(Debug, Default)]
pub struct VirtualFilesystem {
    entries: BTreeMap<EntryKey, Entry>,
    salt: u16,
}

impl VirtualFilesystem {
    pub fn new(salt: u16) -> Self {
        Self {
            entries: BTreeMap::new(),
            salt,
        }
    }

    pub fn salt(&self) -> u16 {
        self.salt
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: EntryKey, entry: Entry) -> Result<(), DuplicateKey> {
        if self.entries.contains_key(&key) {
            return Err(DuplicateKey(key));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &EntryKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_path(&self, path: &str) -> Option<&Entry> {
        self.entries.get(&EntryKey::path(path))
    }

    pub fn contains_key(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Entry)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.entries.keys()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut BTreeMap<EntryKey, Entry> {
        &mut self.entries
    }

    pub fn entries_all_resolved(&self) -> bool {
        self.entries.keys().all(EntryKey::is_resolved)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = HashAddr> + '_ {
        self.entries.keys().filter_map(EntryKey::as_hash)
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved().count()
    }

    /// Union of every entry's discovered paths.
    pub fn get_parsed_paths(&self) -> BTreeSet<DiscoveredPath> {
        let mut paths = BTreeSet::new();
        for entry in self.entries.values() {
            paths.extend(entry.discovered_paths.iter().cloned());
        }
        paths
    }

    /// Move every hash-keyed entry found in `dictionary` to its path key.
    ///
    /// Entries missing from the dictionary stay where they are. Returns how
    /// many entries were re-keyed.
    pub fn apply_dictionary(&mut self, dictionary: &Dictionary) -> usize {
        let mut resolved = 0;
        for (addr, path) in dictionary {
            let old = EntryKey::Hash(*addr);
            if !self.entries.contains_key(&old) {
                continue;
            }
            let new = EntryKey::Path(path.clone());
            if self.entries.contains_key(&new) {
                warn!(hash = %addr, path = %path, "path already taken, leaving entry unresolved");
                continue;
            }
            if let Some(mut entry) = self.entries.remove(&old) {
                entry.refine_type(path);
                self.entries.insert(new, entry);
                resolved += 1;
            }
        }
        resolved
    }

    /// Synthesize missing ancestor directories, then recompute every
    /// directory's listing from the resolved entries directly below it.
    pub fn rebuild_directories(&mut self) {
        let mut missing = BTreeSet::new();
        for path in self.entries.keys().filter_map(EntryKey::as_path) {
            for ancestor in path.ancestors() {
                match self.entries.get(&EntryKey::Path(ancestor.clone())) {
                    Some(e) if e.is_directory() => {}
                    Some(_) => {
                        warn!(path = %ancestor, "file stands where a directory is expected");
                    }
                    None => {
                        missing.insert(ancestor);
                    }
                }
            }
        }
        for path in missing {
            self.entries
                .insert(EntryKey::Path(path), Entry::placeholder_directory());
        }

        let mut children: BTreeMap<VfsPath, Vec<(String, bool)>> = BTreeMap::new();
        for (key, entry) in &self.entries {
            let Some(path) = key.as_path() else { continue };
            if let Some(parent) = path.parent() {
                children
                    .entry(parent)
                    .or_default()
                    .push((path.file_name().to_string(), entry.is_directory()));
            }
        }

        for (key, entry) in self.entries.iter_mut() {
            let Some(path) = key.as_path() else { continue };
            if !entry.is_directory() {
                continue;
            }
            let origin = entry.origin_hash;
            entry.discovered_paths = children
                .remove(path)
                .unwrap_or_default()
                .into_iter()
                .map(|(name, is_dir)| DiscoveredPath::new(&name, is_dir, origin))
                .collect();
        }
    }

    /// Remove directories under `root` with no resolved file below them.
    ///
    /// `root` itself always survives and non-directory entries are never
    /// touched. Returns how many directories were removed.
    pub fn prune_directories(&mut self, root: &VfsPath) -> usize {
        let mut live: HashSet<VfsPath> = HashSet::new();
        for (key, entry) in &self.entries {
            let Some(path) = key.as_path() else { continue };
            if entry.is_directory() {
                continue;
            }
            live.extend(path.ancestors());
        }

        let doomed: BTreeSet<VfsPath> = self
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                let path = key.as_path()?;
                let prunable = entry.is_directory()
                    && path != root
                    && path.starts_with(root)
                    && !live.contains(path);
                prunable.then(|| path.clone())
            })
            .collect();

        for path in &doomed {
            self.entries.remove(&EntryKey::Path(path.clone()));
        }

        // Keep surviving listings in step with what is left.
        for (key, entry) in self.entries.iter_mut() {
            let Some(path) = key.as_path() else { continue };
            if !entry.is_directory() {
                continue;
            }
            entry
                .discovered_paths
                .retain(|child| !(child.is_directory && doomed.contains(&path.join(child.path.as_str()))));
        }

        doomed.len()
    }
}
