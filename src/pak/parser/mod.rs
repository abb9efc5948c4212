#![forbid(unsafe_code)]

//! Content extractors: scan decoded file content for referenced paths.

use std::collections::BTreeSet;

use crate::pak::entry::{DiscoveredPath, FileType};
use crate::pak::error::ExtractError;
use crate::pak::key::HashAddr;

pub mod directory;
pub mod font;
pub mod mat;
pub mod pmd;
pub mod sii;
pub mod soundref;
mod text;
pub mod tobj;

pub type PathSet = BTreeSet<DiscoveredPath>;

/// Scan decoded bytes. `origin` is stamped on every returned candidate.
pub type ExtractFn = fn(&[u8], Option<HashAddr>) -> Result<PathSet, ExtractError>;

/// Capability table: which extractor handles which file type.
#[derive(Clone, Copy)]
pub struct Extractors {
    slots: [Option<ExtractFn>; FileType::COUNT],
}

impl Extractors {
    pub fn none() -> Self {
        Self {
            slots: [None; FileType::COUNT],
        }
    }

    pub fn get(&self, file_type: FileType) -> Option<ExtractFn> {
        self.slots[file_type.index()]
    }

    pub fn with(mut self, file_type: FileType, f: ExtractFn) -> Self {
        self.slots[file_type.index()] = Some(f);
        self
    }

    pub fn without(mut self, file_type: FileType) -> Self {
        self.slots[file_type.index()] = None;
        self
    }
}

impl Default for Extractors {
    fn default() -> Self {
        Self::none()
            .with(FileType::Directory, directory::find_paths)
            .with(FileType::Sii, sii::find_paths)
            .with(FileType::Mat, mat::find_paths)
            .with(FileType::Pmd, pmd::find_paths)
            .with(FileType::Tobj, tobj::find_paths)
            .with(FileType::SoundRef, soundref::find_paths)
            .with(FileType::Font, font::find_paths)
    }
}
