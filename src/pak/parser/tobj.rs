#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::io::ByteReader;
use crate::pak::key::HashAddr;
use crate::pak::parser::PathSet;

pub const TOBJ_SIGNATURE: u32 = 0x70b1_0a01;

const HEADER_LEN: usize = 40;
/// `[u32 length][u32 reserved]` after the header.
const TEXTURE_ATTR_LEN: usize = 8;

/// Texture object: a fixed header followed by the path of the image it wraps.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    let min = HEADER_LEN + TEXTURE_ATTR_LEN;
    if buf.len() < min {
        return Err(ExtractError::Truncated {
            what: "tobj",
            need: min,
            got: buf.len(),
        });
    }

    let mut r = ByteReader::new(buf);
    let signature = r.read_u32().unwrap_or(0);
    if signature != TOBJ_SIGNATURE {
        return Err(ExtractError::BadMagic {
            what: "tobj",
            found: signature,
        });
    }

    let mut r = ByteReader::at(buf, HEADER_LEN);
    let len = r.read_u32().unwrap_or(0) as usize;
    r.skip(4);
    let Some(raw) = r.take(len) else {
        return Err(ExtractError::Truncated {
            what: "tobj",
            need: min.saturating_add(len),
            got: buf.len(),
        });
    };

    let mut set = PathSet::new();
    let path = String::from_utf8_lossy(raw);
    if !path.is_empty() {
        set.insert(DiscoveredPath::new(&path, false, origin));
    }
    Ok(set)
}
