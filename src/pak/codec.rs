#![forbid(unsafe_code)]

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::pak::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    None,
    Zlib,
    Gzip,
    /// Headerless deflate, as stored in zip members.
    Raw,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Zlib => "zlib",
            Codec::Gzip => "gzip",
            Codec::Raw => "raw",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Codec::None, Codec::Zlib, Codec::Gzip, Codec::Raw]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown compression type {s:?} (none, zlib, gzip, raw)"))
    }
}

/// Compress `bytes` at the default level.
pub fn compress(bytes: &[u8], codec: Codec) -> Result<Vec<u8>, CodecError> {
    let fail = |source| CodecError::Compress {
        codec: codec.name(),
        source,
    };
    match codec {
        Codec::None => Ok(bytes.to_vec()),
        Codec::Zlib => {
            let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
            e.write_all(bytes).map_err(fail)?;
            e.finish().map_err(fail)
        }
        Codec::Gzip => {
            let mut e = GzEncoder::new(Vec::new(), Compression::default());
            e.write_all(bytes).map_err(fail)?;
            e.finish().map_err(fail)
        }
        Codec::Raw => {
            let mut e = DeflateEncoder::new(Vec::new(), Compression::default());
            e.write_all(bytes).map_err(fail)?;
            e.finish().map_err(fail)
        }
    }
}

/// Inflate `bytes`. With `expected` set, any other output length is an error.
pub fn decompress(bytes: &[u8], codec: Codec, expected: Option<usize>) -> Result<Vec<u8>, CodecError> {
    let out = match codec {
        Codec::None => bytes.to_vec(),
        Codec::Zlib => inflate(ZlibDecoder::new(bytes), codec, expected)?,
        Codec::Gzip => inflate(GzDecoder::new(bytes), codec, expected)?,
        Codec::Raw => inflate(DeflateDecoder::new(bytes), codec, expected)?,
    };

    if let Some(expected) = expected {
        if out.len() != expected {
            return Err(CodecError::SizeMismatch {
                codec: codec.name(),
                expected,
                got: out.len(),
            });
        }
    }
    Ok(out)
}

/// Largest up-front reservation; declared sizes come from untrusted headers.
const MAX_RESERVE: usize = 1 << 20;

fn inflate<R: Read>(reader: R, codec: Codec, expected: Option<usize>) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(expected.unwrap_or(0).min(MAX_RESERVE));
    let res = match expected {
        // One byte past the declared size is enough to report the mismatch.
        Some(n) => reader.take((n as u64).saturating_add(1)).read_to_end(&mut out),
        None => {
            let mut reader = reader;
            reader.read_to_end(&mut out)
        }
    };
    res.map_err(|source| CodecError::Corrupt {
        codec: codec.name(),
        source,
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    const TEXT: &[u8] = b"*def\n*vehicle\nversion.sii\nversion.sii\nversion.sii\n";

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
        e.write_all(data).unwrap();
        e.finish().unwrap()
    }

    #[test]
    fn inflates_each_codec() {
        assert_eq!(decompress(&zlib(TEXT), Codec::Zlib, Some(TEXT.len())).unwrap(), TEXT);

        let mut g = GzEncoder::new(Vec::new(), Compression::default());
        g.write_all(TEXT).unwrap();
        assert_eq!(decompress(&g.finish().unwrap(), Codec::Gzip, None).unwrap(), TEXT);

        let mut d = DeflateEncoder::new(Vec::new(), Compression::best());
        d.write_all(TEXT).unwrap();
        assert_eq!(decompress(&d.finish().unwrap(), Codec::Raw, None).unwrap(), TEXT);

        assert_eq!(decompress(TEXT, Codec::None, None).unwrap(), TEXT);
    }

    #[test]
    fn truncated_stream_fails_cleanly() {
        let z = zlib(TEXT);
        let err = decompress(&z[..z.len() / 2], Codec::Zlib, Some(TEXT.len())).unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { .. } | CodecError::SizeMismatch { .. }));
    }

    #[test]
    fn wrong_declared_size_is_reported() {
        let err = decompress(&zlib(TEXT), Codec::Zlib, Some(4)).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { expected: 4, got: 5, .. }));
    }

    #[test]
    fn compress_inverts_decompress() {
        for codec in [Codec::None, Codec::Zlib, Codec::Gzip, Codec::Raw] {
            let packed = compress(TEXT, codec).unwrap();
            assert_eq!(decompress(&packed, codec, Some(TEXT.len())).unwrap(), TEXT, "{codec}");
        }
        assert_eq!(compress(TEXT, Codec::Zlib).unwrap(), zlib(TEXT));
    }

    #[test]
    fn codec_names_parse() {
        assert_eq!("GZIP".parse::<Codec>().unwrap(), Codec::Gzip);
        assert_eq!("raw".parse::<Codec>().unwrap(), Codec::Raw);
        assert!("lz4".parse::<Codec>().is_err());
    }

    #[test]
    fn huge_declared_size_does_not_preallocate() {
        let err = decompress(&zlib(TEXT), Codec::Zlib, Some(usize::MAX - 1)).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decompress(b"definitely not zlib", Codec::Zlib, None).is_err());
    }
}
