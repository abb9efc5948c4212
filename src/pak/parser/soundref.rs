#![forbid(unsafe_code)]

use crate::pak::entry::DiscoveredPath;
use crate::pak::error::ExtractError;
use crate::pak::key::HashAddr;
use crate::pak::parser::text::{lines, quoted};
use crate::pak::parser::PathSet;

/// Sound references: `source="/sound/x.bank#event/name"`; the bank is the path.
pub fn find_paths(buf: &[u8], origin: Option<HashAddr>) -> Result<PathSet, ExtractError> {
    let mut set = PathSet::new();
    for line in lines(buf) {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "source" {
            continue;
        }
        let value = value.trim();
        let value = quoted(value).unwrap_or(value);
        let bank = value.split('#').next().unwrap_or_default();
        if !bank.is_empty() {
            set.insert(DiscoveredPath::new(bank, false, origin));
        }
    }
    Ok(set)
}
