#![forbid(unsafe_code)]

//! Rebuild a readable directory tree from hash-addressed game archives.

pub mod pak;
