#![forbid(unsafe_code)]

mod codec;
mod entry;
mod error;
#[cfg(test)]
mod fixture;
mod format;
mod hash;
mod io;
mod key;
mod ops;
pub mod parser;
mod path;
mod read;
mod resolve;
mod vfs;
mod view;

pub use codec::{compress, decompress, Codec};
pub use entry::{CompressAttr, DiscoveredPath, Entry, FileType, ParseState};
pub use error::{CodecError, DecodeError, DuplicateKey, EntryError, ExtractError, PakError, PakResult};
pub use hash::{city_hash64, hash, ROOT_HASH};
pub use key::{EntryKey, HashAddr};
pub use path::VfsPath;
pub use read::decode;
pub use resolve::{build_dictionary, candidate_paths, ResolveOptions, ResolveReport, Resolver};
pub use vfs::{Dictionary, VirtualFilesystem};
pub use view::DataView;

pub use ops::{
    collect_archives, compress_files, decompress_files, entries, extract, hash_strings, list,
    load_dictionary, open, parse_files, resolve_inputs, EntryInfo, ExtractSummary, Resolved,
};
