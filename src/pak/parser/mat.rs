#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::key::HashAddr;
use crate::pak::parser::text::{quoted, records};
use crate::pak::parser::PathSet;

/// Material definitions, old (`texture: "x.tobj"`) and new
/// (`texture : "name" { source : "x.tobj" }`) syntax alike.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    let mut set = PathSet::new();
    for (key, value) in records(buf) {
        let key = key.trim_end_matches("[]");
        if key != "texture" && key != "source" {
            continue;
        }
        let Some(target) = quoted(&value) else {
            continue;
        };
        if target.to_ascii_lowercase().ends_with(".tobj") {
            set.insert(DiscoveredPath::new(target, false, origin));
        }
    }
    Ok(set)
}
