#![forbid(unsafe_code)]

use thiserror::Error;

use crate::pak::key::EntryKey;

/// Two entries claimed the same key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate entry key: {0}")]
pub struct DuplicateKey(pub EntryKey);

/// A container was rejected while decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a valid {what}: expected at least {need} bytes, got {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },

    #[error("not a valid {what}: invalid {field}, expected {expected}, got {found}")]
    Field {
        what: &'static str,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("{what} at offset {offset} (len {len}) is outside the container ({size} bytes)")]
    OutOfBounds {
        what: String,
        offset: u64,
        len: u64,
        size: usize,
    },

    #[error("unknown container format (magic {0:02x?})")]
    UnknownFormat([u8; 4]),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{what} could not be inflated: {source}")]
    Table {
        what: &'static str,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Duplicate(#[from] DuplicateKey),
}

/// File content could not be scanned for paths.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a valid {what}: expected at least {need} bytes, got {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },

    #[error("not a valid {what}: bad signature {found:#010x}")]
    BadMagic { what: &'static str, found: u32 },

    #[error("not a valid {what}: expected version {expected}, got {found}")]
    BadVersion {
        what: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("not a valid {what}: offset {offset} out of bounds")]
    OutOfBounds { what: &'static str, offset: usize },

    #[error("name contains invalid characters: {0:?}")]
    InvalidName(String),

    #[error("unsupported {0}")]
    Unsupported(&'static str),
}

/// A compressed stream could not be inflated.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("corrupt {codec} stream: {source}")]
    Corrupt {
        codec: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{codec} compression failed: {source}")]
    Compress {
        codec: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{codec} stream inflated to {got} bytes, expected {expected}")]
    SizeMismatch {
        codec: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Why a single entry contributed no paths.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("entry is encrypted")]
    Encrypted,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug, Error)]
pub enum PakError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateKey),

    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type PakResult<T> = Result<T, PakError>;
