#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::debug;

use crate::pak::codec::{decompress, Codec};
use crate::pak::entry::{CompressAttr, Entry, FileType};
use crate::pak::error::DecodeError;
use crate::pak::format::{
    EntryFlags, HashfsEntry, HashfsHeader, HashfsV2Entry, HashfsV2Header, MetaPlain, ZipMethod,
    HASHFS_ENTRY_LEN, HASHFS_HEADER_LEN, HASHFS_MAGIC, HASHFS_METHOD_CITY, HASHFS_V1, HASHFS_V2,
    HASHFS_V2_ENTRY_LEN, HASHFS_V2_HEADER_LEN, META_COMPRESS_NONE, META_COMPRESS_ZLIB,
    META_DIRECTORY, META_PLAIN, META_PLAIN_WORDS, META_SIZE_MASK, ZIP64_MARKER, ZIP_CENTRAL_LEN, ZIP_CENTRAL_MAGIC,
    ZIP_EOCD_LEN, ZIP_EOCD_MAGIC, ZIP_EOCD_SEARCH, ZIP_FLAG_ENCRYPTED, ZIP_LOCAL_LEN,
    ZIP_LOCAL_MAGIC,
};
use crate::pak::hash::hash;
use crate::pak::io::{u32_at, ByteReader};
use crate::pak::key::{EntryKey, HashAddr};
use crate::pak::path::VfsPath;
use crate::pak::vfs::VirtualFilesystem;
use crate::pak::view::DataView;

/// Decode a whole container held in memory. The format is picked by magic.
pub fn decode(bytes: Arc<[u8]>) -> Result<VirtualFilesystem, DecodeError> {
    let magic: [u8; 4] = bytes
        .get(..4)
        .and_then(|m| m.try_into().ok())
        .ok_or(DecodeError::Truncated {
            what: "container",
            need: 4,
            got: bytes.len(),
        })?;

    match magic {
        HASHFS_MAGIC => decode_hashfs(bytes),
        ZIP_LOCAL_MAGIC | ZIP_EOCD_MAGIC => decode_zip(bytes),
        other => Err(DecodeError::UnknownFormat(other)),
    }
}

fn decode_hashfs(bytes: Arc<[u8]>) -> Result<VirtualFilesystem, DecodeError> {
    let version = ByteReader::at(&bytes, 4).read_u16().ok_or(DecodeError::Truncated {
        what: "hashfs archive",
        need: 6,
        got: bytes.len(),
    })?;
    match version {
        HASHFS_V1 => decode_hashfs_v1(bytes),
        HASHFS_V2 => decode_hashfs_v2(bytes),
        other => Err(field(
            "hashfs archive",
            "version",
            format!("{HASHFS_V1} or {HASHFS_V2}"),
            other,
        )),
    }
}

fn check_signature(what: &'static str, magic: [u8; 4], method: [u8; 4]) -> Result<(), DecodeError> {
    if magic != HASHFS_MAGIC {
        return Err(field(what, "signature", magic_str(&HASHFS_MAGIC), magic_str(&magic)));
    }
    if method != HASHFS_METHOD_CITY {
        return Err(field(what, "hash method", magic_str(&HASHFS_METHOD_CITY), magic_str(&method)));
    }
    Ok(())
}

fn read_hashfs_header(buf: &[u8]) -> Result<HashfsHeader, DecodeError> {
    let truncated = || DecodeError::Truncated {
        what: "hashfs archive",
        need: HASHFS_HEADER_LEN,
        got: buf.len(),
    };
    let mut r = ByteReader::new(buf);
    let magic = r.read_exact::<4>().ok_or_else(truncated)?;
    let version = r.read_u16().ok_or_else(truncated)?;
    let salt = r.read_u16().ok_or_else(truncated)?;
    let method = r.read_exact::<4>().ok_or_else(truncated)?;
    let entry_count = r.read_u32().ok_or_else(truncated)?;
    let entry_table_offset = r.read_u64().ok_or_else(truncated)?;
    let _auth_offset = r.read_u64().ok_or_else(truncated)?;

    check_signature("hashfs archive", magic, method)?;

    Ok(HashfsHeader {
        version,
        salt,
        method,
        entry_count,
        entry_table_offset,
    })
}

fn read_hashfs_entry(r: &mut ByteReader<'_>) -> Option<HashfsEntry> {
    let hash = r.read_u64()?;
    let offset = r.read_u64()?;
    let flags = EntryFlags(r.read_u32()?);
    let _crc = r.read_u32()?;
    let size = r.read_u32()?;
    let compressed_size = r.read_u32()?;
    Some(HashfsEntry {
        hash,
        offset,
        flags,
        size,
        compressed_size,
    })
}

fn decode_hashfs_v1(bytes: Arc<[u8]>) -> Result<VirtualFilesystem, DecodeError> {
    let header = read_hashfs_header(&bytes)?;
    let size = bytes.len();

    let table_len = u64::from(header.entry_count) * HASHFS_ENTRY_LEN as u64;
    let table = usize::try_from(header.entry_table_offset)
        .ok()
        .filter(|_| header.entry_table_offset.saturating_add(table_len) <= size as u64)
        .ok_or_else(|| DecodeError::OutOfBounds {
            what: "entry table".to_string(),
            offset: header.entry_table_offset,
            len: table_len,
            size,
        })?;

    debug!(
        version = header.version,
        salt = header.salt,
        method = %magic_str(&header.method),
        entries = header.entry_count,
        "hashfs archive"
    );
    let mut vfs = VirtualFilesystem::new(header.salt);
    let mut r = ByteReader::at(&bytes, table);
    for _ in 0..header.entry_count {
        let raw = read_hashfs_entry(&mut r).ok_or(DecodeError::Truncated {
            what: "hashfs entry table",
            need: table + table_len as usize,
            got: size,
        })?;
        let addr = HashAddr::new(raw.hash, header.salt);

        let stored_len = if raw.flags.is_compressed() {
            raw.compressed_size
        } else {
            raw.size
        };
        let data = DataView::new(bytes.clone(), raw.offset, u64::from(stored_len)).ok_or_else(|| {
            DecodeError::OutOfBounds {
                what: format!("entry {addr}"),
                offset: raw.offset,
                len: u64::from(stored_len),
                size,
            }
        })?;

        let file_type = if raw.flags.is_directory() {
            FileType::Directory
        } else {
            FileType::Generic
        };
        let mut entry = Entry::new(file_type, data)
            .encrypted(raw.flags.is_encrypted())
            .with_origin(addr);
        if raw.flags.is_compressed() {
            entry = entry.with_compression(CompressAttr {
                codec: Codec::Zlib,
                uncompressed_size: raw.size as usize,
            });
        }
        vfs.insert(EntryKey::Hash(addr), entry)?;
    }
    Ok(vfs)
}

fn read_hashfs_v2_header(buf: &[u8]) -> Result<HashfsV2Header, DecodeError> {
    let truncated = || DecodeError::Truncated {
        what: "hashfs v2 archive",
        need: HASHFS_V2_HEADER_LEN,
        got: buf.len(),
    };
    let mut r = ByteReader::new(buf);
    let magic = r.read_exact::<4>().ok_or_else(truncated)?;
    let _version = r.read_u16().ok_or_else(truncated)?;
    let salt = r.read_u16().ok_or_else(truncated)?;
    let method = r.read_exact::<4>().ok_or_else(truncated)?;
    let entry_count = r.read_u32().ok_or_else(truncated)?;
    let entries_compressed_size = r.read_u32().ok_or_else(truncated)?;
    let metadata_count = r.read_u32().ok_or_else(truncated)?;
    let metadata_compressed_size = r.read_u32().ok_or_else(truncated)?;
    let entries_offset = r.read_u64().ok_or_else(truncated)?;
    let metadata_offset = r.read_u64().ok_or_else(truncated)?;
    let _auth_offset = r.read_u64().ok_or_else(truncated)?;
    let platform = r.read_u8().ok_or_else(truncated)?;

    check_signature("hashfs v2 archive", magic, method)?;

    Ok(HashfsV2Header {
        salt,
        entry_count,
        entries_compressed_size,
        metadata_count,
        metadata_compressed_size,
        entries_offset,
        metadata_offset,
        platform,
    })
}

fn read_hashfs_v2_entry(r: &mut ByteReader<'_>) -> Option<HashfsV2Entry> {
    let hash = r.read_u64()?;
    let meta_index = r.read_u32()?;
    let meta_count = r.read_u16()?;
    let flags = r.read_u8()?;
    let _pad = r.read_u8()?;
    Some(HashfsV2Entry {
        hash,
        meta_index,
        meta_count,
        flags,
    })
}

/// Inflate one of the zlib-packed v2 tables.
fn inflate_table(
    bytes: &Arc<[u8]>,
    what: &'static str,
    offset: u64,
    compressed: u32,
    len: u64,
) -> Result<Vec<u8>, DecodeError> {
    let out_of_bounds = || DecodeError::OutOfBounds {
        what: what.to_string(),
        offset,
        len: u64::from(compressed),
        size: bytes.len(),
    };
    let packed = DataView::new(bytes.clone(), offset, u64::from(compressed)).ok_or_else(out_of_bounds)?;
    let len = usize::try_from(len).map_err(|_| out_of_bounds())?;
    decompress(packed.bytes(), Codec::Zlib, Some(len)).map_err(|source| DecodeError::Table { what, source })
}

fn meta_word(meta: &[u8], index: usize) -> Option<u32> {
    u32_at(meta, index.checked_mul(4)?)
}

/// First plain or directory metadata record of an entry, if it has one.
fn read_meta_plain(meta: &[u8], entry: &HashfsV2Entry) -> Result<Option<MetaPlain>, DecodeError> {
    let truncated = |word: usize| DecodeError::Truncated {
        what: "hashfs v2 metadata table",
        need: word.saturating_add(1).saturating_mul(4),
        got: meta.len(),
    };
    for i in 0..usize::from(entry.meta_count) {
        let at = (entry.meta_index as usize).saturating_add(i);
        let header = meta_word(meta, at).ok_or_else(|| truncated(at))?;
        let kind = (header >> 24) as u8;
        if kind != META_PLAIN && kind != META_DIRECTORY {
            continue;
        }

        let body = (header & 0x00FF_FFFF) as usize;
        let mut words = [0u32; META_PLAIN_WORDS];
        for (j, w) in words.iter_mut().enumerate() {
            *w = meta_word(meta, body + j).ok_or_else(|| truncated(body + j))?;
        }
        return Ok(Some(MetaPlain {
            compressed_size: words[0] & META_SIZE_MASK,
            compress_type: (words[0] >> 28) as u8,
            size: words[1] & META_SIZE_MASK,
            offset: u64::from(words[3]) << 4,
        }));
    }
    Ok(None)
}

fn decode_hashfs_v2(bytes: Arc<[u8]>) -> Result<VirtualFilesystem, DecodeError> {
    let header = read_hashfs_v2_header(&bytes)?;
    let size = bytes.len();

    let entries = inflate_table(
        &bytes,
        "hashfs v2 entry table",
        header.entries_offset,
        header.entries_compressed_size,
        u64::from(header.entry_count) * HASHFS_V2_ENTRY_LEN as u64,
    )?;
    let meta = inflate_table(
        &bytes,
        "hashfs v2 metadata table",
        header.metadata_offset,
        header.metadata_compressed_size,
        u64::from(header.metadata_count) * 4,
    )?;

    debug!(
        salt = header.salt,
        platform = header.platform,
        entries = header.entry_count,
        metadata_words = header.metadata_count,
        "hashfs v2 archive"
    );
    let mut vfs = VirtualFilesystem::new(header.salt);
    let mut r = ByteReader::new(&entries);
    for _ in 0..header.entry_count {
        let raw = read_hashfs_v2_entry(&mut r).ok_or(DecodeError::Truncated {
            what: "hashfs v2 entry table",
            need: entries.len(),
            got: r.pos(),
        })?;
        let addr = HashAddr::new(raw.hash, header.salt);
        let file_type = if raw.is_directory() {
            FileType::Directory
        } else {
            FileType::Generic
        };

        let entry = match read_meta_plain(&meta, &raw)? {
            Some(plain) => {
                let (stored_len, compression) = match plain.compress_type {
                    META_COMPRESS_NONE => (plain.size, None),
                    META_COMPRESS_ZLIB => (
                        plain.compressed_size,
                        Some(CompressAttr {
                            codec: Codec::Zlib,
                            uncompressed_size: plain.size as usize,
                        }),
                    ),
                    other => {
                        return Err(DecodeError::Unsupported(format!(
                            "hashfs v2 compression type {other} for entry {addr}"
                        )))
                    }
                };
                let data = DataView::new(bytes.clone(), plain.offset, u64::from(stored_len)).ok_or_else(|| {
                    DecodeError::OutOfBounds {
                        what: format!("entry {addr}"),
                        offset: plain.offset,
                        len: u64::from(stored_len),
                        size,
                    }
                })?;
                let entry = Entry::new(file_type, data);
                match compression {
                    Some(attr) => entry.with_compression(attr),
                    None => entry,
                }
            }
            None => {
                debug!(entry = %addr, "no plain metadata, keeping entry without data");
                Entry::new(file_type, DataView::empty())
            }
        };
        vfs.insert(EntryKey::Hash(addr), entry.with_origin(addr))?;
    }
    Ok(vfs)
}

#[derive(Debug)]
struct ZipEocd {
    entry_count: u16,
    cd_size: u32,
    cd_offset: u32,
}

fn find_zip_eocd(buf: &[u8]) -> Result<ZipEocd, DecodeError> {
    if buf.len() < ZIP_EOCD_LEN {
        return Err(DecodeError::Truncated {
            what: "zip archive",
            need: ZIP_EOCD_LEN,
            got: buf.len(),
        });
    }
    let floor = buf.len().saturating_sub(ZIP_EOCD_SEARCH);
    let at = (floor..=buf.len() - ZIP_EOCD_LEN)
        .rev()
        .find(|&i| buf[i..i + 4] == ZIP_EOCD_MAGIC)
        .ok_or_else(|| DecodeError::Field {
            what: "zip archive",
            field: "end of central directory",
            expected: magic_str(&ZIP_EOCD_MAGIC),
            found: "nothing".to_string(),
        })?;

    let Some((disk, cd_disk, total, cd_size, cd_offset)) = read_eocd_fields(&mut ByteReader::at(buf, at + 4)) else {
        return Err(DecodeError::Truncated {
            what: "zip end of central directory",
            need: ZIP_EOCD_LEN,
            got: buf.len() - at,
        });
    };
    if disk != 0 || cd_disk != 0 {
        return Err(DecodeError::Unsupported("multi-disk zip archive".to_string()));
    }
    if cd_size == ZIP64_MARKER || cd_offset == ZIP64_MARKER {
        return Err(DecodeError::Unsupported("zip64 archive".to_string()));
    }
    Ok(ZipEocd {
        entry_count: total,
        cd_size,
        cd_offset,
    })
}

/// (disk, central directory disk, total entries, directory size, directory offset)
fn read_eocd_fields(r: &mut ByteReader<'_>) -> Option<(u16, u16, u16, u32, u32)> {
    let disk = r.read_u16()?;
    let cd_disk = r.read_u16()?;
    let _on_disk = r.read_u16()?;
    let total = r.read_u16()?;
    Some((disk, cd_disk, total, r.read_u32()?, r.read_u32()?))
}

#[derive(Debug)]
struct ZipRecord {
    flags: u16,
    method: u16,
    compressed_size: u32,
    size: u32,
    local_offset: u32,
    name: String,
}

fn read_zip_record(r: &mut ByteReader<'_>) -> Result<ZipRecord, DecodeError> {
    let at = r.pos();
    let truncated = || DecodeError::Truncated {
        what: "zip central directory",
        need: at + ZIP_CENTRAL_LEN,
        got: at,
    };
    let magic = r.read_exact::<4>().ok_or_else(truncated)?;
    if magic != ZIP_CENTRAL_MAGIC {
        return Err(field("zip central directory", "signature", magic_str(&ZIP_CENTRAL_MAGIC), magic_str(&magic)));
    }
    r.skip(4).ok_or_else(truncated)?;
    let flags = r.read_u16().ok_or_else(truncated)?;
    let method = r.read_u16().ok_or_else(truncated)?;
    r.skip(8).ok_or_else(truncated)?;
    let compressed_size = r.read_u32().ok_or_else(truncated)?;
    let size = r.read_u32().ok_or_else(truncated)?;
    let name_len = r.read_u16().ok_or_else(truncated)? as usize;
    let extra_len = r.read_u16().ok_or_else(truncated)? as usize;
    let comment_len = r.read_u16().ok_or_else(truncated)? as usize;
    r.skip(8).ok_or_else(truncated)?;
    let local_offset = r.read_u32().ok_or_else(truncated)?;
    let name = r.take(name_len).ok_or_else(truncated)?;
    let name = String::from_utf8_lossy(name).into_owned();
    r.skip(extra_len + comment_len).ok_or_else(truncated)?;

    Ok(ZipRecord {
        flags,
        method,
        compressed_size,
        size,
        local_offset,
        name,
    })
}

/// Offset of an entry's data, past its local header.
fn zip_data_offset(buf: &[u8], record: &ZipRecord) -> Result<u64, DecodeError> {
    let at = record.local_offset as usize;
    let out_of_bounds = || DecodeError::OutOfBounds {
        what: format!("local header of {}", record.name),
        offset: u64::from(record.local_offset),
        len: ZIP_LOCAL_LEN as u64,
        size: buf.len(),
    };
    let mut r = ByteReader::at(buf, at);
    let magic = r.read_exact::<4>().ok_or_else(out_of_bounds)?;
    if magic != ZIP_LOCAL_MAGIC {
        return Err(field("zip local header", "signature", magic_str(&ZIP_LOCAL_MAGIC), magic_str(&magic)));
    }
    let mut r = ByteReader::at(buf, at + 26);
    let name_len = r.read_u16().ok_or_else(out_of_bounds)?;
    let extra_len = r.read_u16().ok_or_else(out_of_bounds)?;
    Ok((at + ZIP_LOCAL_LEN) as u64 + u64::from(name_len) + u64::from(extra_len))
}

fn decode_zip(bytes: Arc<[u8]>) -> Result<VirtualFilesystem, DecodeError> {
    let eocd = find_zip_eocd(&bytes)?;
    let size = bytes.len();
    let cd_end = u64::from(eocd.cd_offset) + u64::from(eocd.cd_size);
    if cd_end > size as u64 {
        return Err(DecodeError::OutOfBounds {
            what: "central directory".to_string(),
            offset: u64::from(eocd.cd_offset),
            len: u64::from(eocd.cd_size),
            size,
        });
    }

    let mut vfs = VirtualFilesystem::new(0);
    let mut r = ByteReader::at(&bytes, eocd.cd_offset as usize);
    for _ in 0..eocd.entry_count {
        let record = read_zip_record(&mut r)?;
        if record.compressed_size == ZIP64_MARKER || record.size == ZIP64_MARKER {
            return Err(DecodeError::Unsupported(format!("zip64 entry {}", record.name)));
        }

        let is_directory = record.name.ends_with('/');
        let path = VfsPath::new(&record.name);
        if path.is_root() {
            continue;
        }

        let offset = zip_data_offset(&bytes, &record)?;
        let data = DataView::new(bytes.clone(), offset, u64::from(record.compressed_size)).ok_or_else(|| {
            DecodeError::OutOfBounds {
                what: format!("data of {}", record.name),
                offset,
                len: u64::from(record.compressed_size),
                size,
            }
        })?;

        let file_type = if is_directory {
            FileType::Directory
        } else {
            FileType::from_path(&path)
        };
        let origin = HashAddr::new(hash(path.as_str().as_bytes(), 0), 0);
        let mut entry = Entry::new(file_type, data)
            .encrypted(record.flags & ZIP_FLAG_ENCRYPTED != 0)
            .with_origin(origin);
        match ZipMethod::from_raw(record.method) {
            Some(ZipMethod::Stored) => {}
            Some(ZipMethod::Deflate) => {
                entry = entry.with_compression(CompressAttr {
                    codec: Codec::Raw,
                    uncompressed_size: record.size as usize,
                });
            }
            None => {
                return Err(DecodeError::Unsupported(format!(
                    "zip compression method {} for {}",
                    record.method, record.name
                )))
            }
        }
        vfs.insert(EntryKey::Path(path), entry)?;
    }
    Ok(vfs)
}

fn field(what: &'static str, name: &'static str, expected: impl ToString, found: impl ToString) -> DecodeError {
    DecodeError::Field {
        what,
        field: name,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn magic_str(magic: &[u8]) -> String {
    magic.escape_ascii().to_string()
}
