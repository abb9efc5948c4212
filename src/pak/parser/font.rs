#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::key::HashAddr;
use crate::pak::parser::text::lines;
use crate::pak::parser::PathSet;

/// Bitmap font descriptors: `image:<path>,<x>,<y>,...` records.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    let mut set = PathSet::new();
    for line in lines(buf) {
        let Some(at) = line.find("image:") else {
            continue;
        };
        let rest = &line[at + "image:".len()..];
        let image = rest.split(',').next().unwrap_or_default().trim();
        if !image.is_empty() {
            set.insert(DiscoveredPath::new(image, false, origin));
        }
    }
    Ok(set)
}
