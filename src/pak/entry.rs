#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::pak::codec::{decompress, Codec};
use crate::pak::error::EntryError;
use crate::pak::key::HashAddr;
use crate::pak::parser::Extractors;
use crate::pak::path::{split_absolute, VfsPath};
use crate::pak::view::DataView;

/// Closed set of file types the resolver knows how to treat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileType {
    Generic,
    Directory,
    Sii,
    Mat,
    Pmd,
    Tobj,
    SoundRef,
    Font,
}

impl FileType {
    pub const COUNT: usize = 8;

    pub const ALL: [FileType; Self::COUNT] = [
        FileType::Generic,
        FileType::Directory,
        FileType::Sii,
        FileType::Mat,
        FileType::Pmd,
        FileType::Tobj,
        FileType::SoundRef,
        FileType::Font,
    ];

    /// Guess a file type from the path extension. Never yields `Directory`.
    pub fn from_path(path: &VfsPath) -> Self {
        match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("sii") | Some("sui") => FileType::Sii,
            Some("mat") => FileType::Mat,
            Some("pmd") => FileType::Pmd,
            Some("tobj") => FileType::Tobj,
            Some("soundref") => FileType::SoundRef,
            Some("font") => FileType::Font,
            _ => FileType::Generic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileType::Generic => "generic",
            FileType::Directory => "directory",
            FileType::Sii => "sii",
            FileType::Mat => "mat",
            FileType::Pmd => "pmd",
            FileType::Tobj => "tobj",
            FileType::SoundRef => "soundref",
            FileType::Font => "font",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown file type {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressAttr {
    pub codec: Codec,
    pub uncompressed_size: usize,
}

/// A path candidate found inside some entry's content.
///
/// Ordering is by path first, which fixes the order candidates are tried in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiscoveredPath {
    pub path: VfsPath,
    pub is_absolute: bool,
    pub is_directory: bool,
    /// Entry whose content produced this candidate.
    pub origin_hash: Option<HashAddr>,
}

impl DiscoveredPath {
    /// Build from a raw reference; a leading `/` marks it absolute.
    pub fn new(raw: &str, is_directory: bool, origin_hash: Option<HashAddr>) -> Self {
        let (is_absolute, rest) = split_absolute(raw);
        Self {
            path: VfsPath::new(rest),
            is_absolute,
            is_directory,
            origin_hash,
        }
    }
}

impl fmt::Display for DiscoveredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absolute {
            f.write_str("/")?;
        }
        f.write_str(self.path.as_str())?;
        if self.is_directory {
            f.write_str("/")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Not scanned yet; also where entries without an extractor wait.
    Pending,
    Parsed,
    /// Scanning failed once; never retried.
    Failed,
}

/// One archive item. Owned by exactly one key of a `VirtualFilesystem`.
#[derive(Debug)]
pub struct Entry {
    file_type: FileType,
    pub is_encrypted: bool,
    pub data: DataView,
    pub compress_attr: Option<CompressAttr>,
    pub discovered_paths: BTreeSet<DiscoveredPath>,
    /// Hash this entry was stored under, kept after it resolves.
    pub origin_hash: Option<HashAddr>,
    state: ParseState,
}

impl Entry {
    pub fn new(file_type: FileType, data: DataView) -> Self {
        Self {
            file_type,
            is_encrypted: false,
            data,
            compress_attr: None,
            discovered_paths: BTreeSet::new(),
            origin_hash: None,
            state: ParseState::Pending,
        }
    }

    /// Empty directory standing in for a missing ancestor.
    pub fn placeholder_directory() -> Self {
        let mut e = Self::new(FileType::Directory, DataView::empty());
        e.state = ParseState::Parsed;
        e
    }

    pub fn with_compression(mut self, attr: CompressAttr) -> Self {
        self.compress_attr = Some(attr);
        self
    }

    pub fn encrypted(mut self, yes: bool) -> Self {
        self.is_encrypted = yes;
        self
    }

    pub fn with_origin(mut self, hash: HashAddr) -> Self {
        self.origin_hash = Some(hash);
        self
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn parse_state(&self) -> ParseState {
        self.state
    }

    /// Size of the content once decoded.
    pub fn size(&self) -> usize {
        match self.compress_attr {
            Some(attr) => attr.uncompressed_size,
            None => self.data.len(),
        }
    }

    /// Give a generic entry the type its newly known path implies.
    pub(crate) fn refine_type(&mut self, path: &VfsPath) {
        if self.file_type == FileType::Generic {
            self.file_type = FileType::from_path(path);
        }
    }

    /// Content with compression undone.
    pub fn decoded(&self) -> Result<Cow<'_, [u8]>, EntryError> {
        if self.is_encrypted {
            return Err(EntryError::Encrypted);
        }
        match self.compress_attr {
            None => Ok(Cow::Borrowed(self.data.bytes())),
            Some(attr) => Ok(Cow::Owned(decompress(
                self.data.bytes(),
                attr.codec,
                Some(attr.uncompressed_size),
            )?)),
        }
    }

    /// Fill `discovered_paths` from content, at most once.
    ///
    /// Returns `Ok(false)` when nothing ran: already parsed or failed, or no
    /// extractor exists for the current type. A failure marks the entry so it
    /// is not attempted again.
    pub fn parse(&mut self, extractors: &Extractors) -> Result<bool, EntryError> {
        if self.state != ParseState::Pending {
            return Ok(false);
        }
        let Some(extract) = extractors.get(self.file_type) else {
            return Ok(false);
        };
        if self.data.is_empty() {
            self.state = ParseState::Parsed;
            return Ok(false);
        }

        let found = self
            .decoded()
            .and_then(|buf| extract(&buf, self.origin_hash).map_err(EntryError::from));
        match found {
            Ok(paths) => {
                self.discovered_paths = paths;
                self.state = ParseState::Parsed;
                Ok(true)
            }
            Err(e) => {
                self.state = ParseState::Failed;
                Err(e)
            }
        }
    }
}
