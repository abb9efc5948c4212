#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::io::{u32_at, ByteReader};
use crate::pak::key::HashAddr;
use crate::pak::parser::PathSet;

pub const PMD_VERSION: u32 = 4;

/// Sixteen u32 fields.
const HEADER_LEN: usize = 0x40;
const MATERIAL_COUNT: usize = 0x04;
const LOOK_COUNT: usize = 0x08;
const MATERIAL_OFFSET: usize = 0x38;

/// Model descriptor: `look_count * material_count` u32 offsets starting at
/// `material_offset`, each pointing at a NUL-terminated material path.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    if buf.len() < HEADER_LEN {
        return Err(ExtractError::Truncated {
            what: "pmd",
            need: HEADER_LEN,
            got: buf.len(),
        });
    }

    let field = |at| u32_at(buf, at).unwrap_or(0);
    let version = field(0);
    if version != PMD_VERSION {
        return Err(ExtractError::BadVersion {
            what: "pmd",
            expected: PMD_VERSION,
            found: version,
        });
    }

    let count = (field(MATERIAL_COUNT) as usize).saturating_mul(field(LOOK_COUNT) as usize);
    let table = field(MATERIAL_OFFSET) as usize;

    let mut set = PathSet::new();
    let mut offsets = ByteReader::at(buf, table);
    for _ in 0..count {
        let at = offsets.pos();
        let Some(target) = offsets.read_u32() else {
            return Err(ExtractError::OutOfBounds { what: "pmd", offset: at });
        };
        let path = c_string(buf, target as usize)?;
        if path.is_empty() {
            continue;
        }
        set.insert(DiscoveredPath::new(&path, false, origin));
    }
    Ok(set)
}

fn c_string(buf: &[u8], start: usize) -> Result<String, ExtractError> {
    let tail = buf
        .get(start..)
        .filter(|t| !t.is_empty())
        .ok_or(ExtractError::OutOfBounds { what: "pmd", offset: start })?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(ExtractError::OutOfBounds {
            what: "pmd",
            offset: buf.len(),
        })?;
    Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
}
