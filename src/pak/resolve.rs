#![forbid(unsafe_code)]

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

use crate::pak::entry::Entry;
use crate::pak::hash::hash;
use crate::pak::key::{EntryKey, HashAddr};
use crate::pak::parser::Extractors;
use crate::pak::path::VfsPath;
use crate::pak::vfs::{Dictionary, VirtualFilesystem};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Parse entries on the rayon pool.
    pub parallel: bool,
    /// Directory kept by the final prune; everything outside it is left alone.
    pub root: VfsPath,
    /// Extra candidates tried every pass, e.g. from a dictionary file.
    pub seeds: BTreeSet<VfsPath>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            root: VfsPath::root(),
            seeds: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub passes: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub parse_failures: usize,
    pub pruned: usize,
}

/// Drives archives from hash keys toward path keys.
///
/// Each pass parses what can be parsed, hashes every candidate path and
/// re-keys the matches. Passes repeat while they make progress; afterwards
/// directories are rebuilt and pruned once.
#[derive(Clone, Default)]
pub struct Resolver {
    extractors: Extractors,
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            extractors: Extractors::default(),
            options,
        }
    }

    pub fn with_extractors(mut self, extractors: Extractors) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn resolve(&self, vfs: &mut VirtualFilesystem) -> ResolveReport {
        self.resolve_all(std::slice::from_mut(vfs))
    }

    /// Resolve several archives against one shared candidate pool.
    pub fn resolve_all(&self, archives: &mut [VirtualFilesystem]) -> ResolveReport {
        let mut report = ResolveReport::default();
        let before: usize = archives.iter().map(VirtualFilesystem::unresolved_count).sum();

        loop {
            report.passes += 1;
            for vfs in archives.iter_mut() {
                report.parse_failures += parse_pending(vfs, &self.extractors, self.options.parallel);
            }

            let mut candidates = self.options.seeds.clone();
            candidates.insert(VfsPath::root());
            for vfs in archives.iter() {
                candidates.extend(candidate_paths(vfs));
            }

            let mut progressed = 0;
            for vfs in archives.iter_mut() {
                let dictionary = build_dictionary(vfs, &candidates);
                progressed += vfs.apply_dictionary(&dictionary);
            }
            debug!(
                pass = report.passes,
                candidates = candidates.len(),
                resolved = progressed,
                "resolution pass"
            );
            if progressed == 0 {
                break;
            }
        }

        for vfs in archives.iter_mut() {
            vfs.rebuild_directories();
            report.pruned += vfs.prune_directories(&self.options.root);
        }

        report.unresolved = archives.iter().map(VirtualFilesystem::unresolved_count).sum();
        report.resolved = before.saturating_sub(report.unresolved);
        info!(
            passes = report.passes,
            resolved = report.resolved,
            unresolved = report.unresolved,
            parse_failures = report.parse_failures,
            "resolution finished"
        );
        report
    }
}

/// Parse every pending entry. Failures are logged and counted, never raised.
fn parse_pending(vfs: &mut VirtualFilesystem, extractors: &Extractors, parallel: bool) -> usize {
    let parse_one = |(key, entry): (&EntryKey, &mut Entry)| -> usize {
        match entry.parse(extractors) {
            Ok(_) => 0,
            Err(e) => {
                warn!(entry = %key, file_type = %entry.file_type(), error = %e, "entry parse failed");
                1
            }
        }
    };

    if parallel {
        vfs.entries_mut().par_iter_mut().map(parse_one).sum()
    } else {
        vfs.entries_mut().iter_mut().map(parse_one).sum()
    }
}

/// Absolute candidate paths implied by everything parsed so far.
///
/// Relative references are anchored at the entry that made them: a directory
/// anchors at itself, anything else at its parent. References whose origin is
/// still unresolved wait for a later pass. Every ancestor of a candidate is a
/// candidate too.
pub fn candidate_paths(vfs: &VirtualFilesystem) -> BTreeSet<VfsPath> {
    let mut anchors: BTreeMap<HashAddr, VfsPath> = BTreeMap::new();
    for (key, entry) in vfs.iter() {
        let (Some(path), Some(origin)) = (key.as_path(), entry.origin_hash) else {
            continue;
        };
        let base = if entry.is_directory() {
            Some(path.clone())
        } else {
            path.parent()
        };
        if let Some(base) = base {
            anchors.insert(origin, base);
        }
    }

    let mut out = BTreeSet::new();
    for found in vfs.get_parsed_paths() {
        let path = if found.is_absolute {
            found.path
        } else {
            match found.origin_hash {
                None => found.path,
                Some(origin) => match anchors.get(&origin) {
                    Some(base) => base.join(found.path.as_str()),
                    None => continue,
                },
            }
        };
        out.extend(path.ancestors());
        out.insert(path);
    }
    out
}

/// Match candidates against the archive's unresolved keys.
///
/// Candidates are tried in path order, so on a hash collision the first
/// path in that order wins.
pub fn build_dictionary(vfs: &VirtualFilesystem, candidates: &BTreeSet<VfsPath>) -> Dictionary {
    let unresolved: HashSet<HashAddr> = vfs.unresolved().collect();
    let mut dictionary = Dictionary::new();
    if unresolved.is_empty() {
        return dictionary;
    }
    for path in candidates {
        let addr = HashAddr::new(hash(path.as_str().as_bytes(), vfs.salt()), vfs.salt());
        if !unresolved.contains(&addr) {
            continue;
        }
        match dictionary.get(&addr) {
            None => {
                dictionary.insert(addr, path.clone());
            }
            Some(first) => {
                debug!(hash = %addr, kept = %first, dropped = %path, "hash collision");
            }
        }
    }
    dictionary
}
