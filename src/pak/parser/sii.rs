#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::key::HashAddr;
use crate::pak::parser::text::{lines, quoted, records, strip_comment};
use crate::pak::parser::PathSet;

const BINARY_MAGIC: &[u8] = b"BSII";
const ENCRYPTED_MAGIC: &[u8] = b"ScsC";
const ENCODED_MAGIC: &[u8] = b"3nK";

const ICON_PREFIX: &str = "/material/ui/accessory/";

/// Text unit files: every quoted record value plus `@include` targets.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    if buf.starts_with(BINARY_MAGIC) {
        return Err(ExtractError::Unsupported("binary sii"));
    }
    if buf.starts_with(ENCRYPTED_MAGIC) || buf.starts_with(ENCODED_MAGIC) {
        return Err(ExtractError::Unsupported("encrypted sii"));
    }

    let mut set = PathSet::new();
    for (key, value) in records(buf) {
        let Some(mut value) = whole_quoted(&value).map(str::to_string) else {
            continue;
        };
        if key == "icon" {
            value = format!("{ICON_PREFIX}{value}.mat");
        }
        // `path|variant` style values carry a suffix that is not part of the path.
        if let Some(pipe) = value.find('|') {
            value.truncate(pipe);
        }
        if value.is_empty() || value == "/" {
            continue;
        }
        set.insert(DiscoveredPath::new(&value, false, origin));
    }

    for line in lines(buf) {
        let line = strip_comment(&line).trim();
        let Some(rest) = line.strip_prefix("@include") else {
            continue;
        };
        let rest = rest.trim();
        let target = quoted(rest).unwrap_or(rest);
        if !target.is_empty() {
            set.insert(DiscoveredPath::new(target, false, origin));
        }
    }
    Ok(set)
}

/// Value that is exactly one quoted string.
fn whole_quoted(value: &str) -> Option<&str> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .filter(|v| !v.contains('"'))
}
