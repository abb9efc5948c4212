#![forbid(unsafe_code)]

//! Shared line handling for the text formats.

use crate::pak::io::strip_bom;

/// Lines of a text file: BOM dropped, `\r` trimmed, invalid UTF-8 replaced.
pub(super) fn lines(buf: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(strip_bom(buf))
        .split('\n')
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect()
}

/// Contents of the first double-quoted string in `s`.
pub(super) fn quoted(s: &str) -> Option<&str> {
    let start = s.find('"')? + 1;
    let len = s[start..].find('"')?;
    Some(&s[start..start + len])
}

/// Strip a trailing `#` or `//` comment that is not inside quotes.
pub(super) fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'#' if !in_quotes => return &line[..i],
            b'/' if !in_quotes && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// `key: value` records. A value left empty after the colon continues on the
/// next non-empty line.
pub(super) fn records(buf: &[u8]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut pending: Option<String> = None;
    for raw in lines(buf) {
        let line = strip_comment(&raw).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(key) = pending.take() {
            out.push((key, line.to_string()));
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if value.is_empty() {
            pending = Some(key.to_string());
        } else {
            out.push((key.to_string(), value.to_string()));
        }
    }
    out
}
