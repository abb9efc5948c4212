#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::io::{u32_at, ByteReader};
use crate::pak::key::HashAddr;
use crate::pak::parser::text::lines;
use crate::pak::parser::PathSet;

const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?'];

/// Directory listing, names relative to the listing itself.
///
/// hashfs v1 stores one child per line with sub-directories prefixed by `*`.
/// hashfs v2 stores `[u32 count][count x u8 name length][names]` with
/// sub-directories prefixed by `/`.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    let names = match binary_names(buf) {
        Some(names) => names,
        None => lines(buf)
            .into_iter()
            .map(|l| match l.strip_prefix('*') {
                Some(rest) => (rest.to_string(), true),
                None => (l, false),
            })
            .collect(),
    };

    let mut set = PathSet::new();
    for (name, is_directory) in names {
        if name.is_empty() {
            continue;
        }
        if name.contains(INVALID) {
            return Err(ExtractError::InvalidName(name));
        }
        set.insert(DiscoveredPath::new(&name, is_directory, origin));
    }
    Ok(set)
}

/// Names of a binary listing, when `buf` is exactly one.
fn binary_names(buf: &[u8]) -> Option<Vec<(String, bool)>> {
    let count = u32_at(buf, 0)? as usize;
    let lens = buf.get(4..4usize.checked_add(count)?)?;
    let total: usize = lens.iter().map(|&l| usize::from(l)).sum();
    if 4 + count + total != buf.len() {
        return None;
    }

    let mut r = ByteReader::at(buf, 4 + count);
    let mut out = Vec::with_capacity(count);
    for &len in lens {
        let name = std::str::from_utf8(r.take(usize::from(len))?).ok()?;
        out.push(match name.strip_prefix('/') {
            Some(dir) => (dir.to_string(), true),
            None => (name.to_string(), false),
        });
    }
    Some(out)
}
